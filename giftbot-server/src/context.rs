// src/context.rs

//! Defines the global context (ServerContext): every long-lived component the
//! server wires together at startup.

use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use giftbot_core::captcha::OcrPool;
use giftbot_core::giftcode::{GameApiClient, SessionContext};
use giftbot_core::notification::WxPusherNotifier;
use giftbot_core::repositories::{
    SqliteGiftCodeRepository, SqliteNotificationRepository, SqlitePlayerRepository,
    SqliteTaskRepository,
};
use giftbot_core::services::{NotificationService, RedemptionEngine};
use giftbot_core::tasks::{RedeemCodesJob, Scheduler};
use giftbot_core::{Database, DefaultHttpClient, Error};

use crate::api::{AdminAuth, ApiState};
use crate::config::Config;

pub struct ServerContext {
    pub config: Config,
    pub db: Database,
    pub engine: Arc<RedemptionEngine>,
    pub scheduler: Arc<Scheduler>,
    pub notification_service: Option<Arc<NotificationService>>,

    pub players: Arc<SqlitePlayerRepository>,
    pub tasks: Arc<SqliteTaskRepository>,
    pub gift_codes: Arc<SqliteGiftCodeRepository>,
    pub notifications: Arc<SqliteNotificationRepository>,
}

impl ServerContext {
    pub async fn new(config: Config) -> Result<Self, Error> {
        // 1) Database
        let db = Database::new(&config.database.path, config.database.max_connections).await?;
        db.migrate().await?;

        let players = Arc::new(SqlitePlayerRepository::new(db.pool().clone()));
        let tasks = Arc::new(SqliteTaskRepository::new(db.pool().clone()));
        let gift_codes = Arc::new(SqliteGiftCodeRepository::new(db.pool().clone()));
        let notifications = Arc::new(SqliteNotificationRepository::new(db.pool().clone()));

        // 2) Outbound HTTP, shared by the game client, OCR vendors and notifier
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.game.request_timeout_secs))
            .build()?;

        let ocr = Arc::new(OcrPool::from_configs(&config.captcha.providers, client.clone())?);
        info!("OCR pool ready with providers {:?}", ocr.provider_names());

        // 3) Game client, sessions and the engine
        let api = Arc::new(GameApiClient::new(
            Arc::new(DefaultHttpClient::from_client(client.clone())),
            config.game.api_config(),
        ));
        let session_ctx = Arc::new(
            SessionContext::new(api, ocr, players.clone())
                .with_session_ttl(chrono::Duration::seconds(config.game.session_ttl_secs)),
        );
        let engine = Arc::new(
            RedemptionEngine::new(session_ctx, gift_codes.clone(), tasks.clone())
                .with_sentinels(config.game.sentinels.clone()),
        );

        // 4) Notifications are optional
        let notification_service = if config.notification.wxpusher.is_configured() {
            let notifier = WxPusherNotifier::new(client, config.notification.wxpusher.clone())?;
            Some(Arc::new(NotificationService::new(Arc::new(notifier), notifications.clone())))
        } else {
            warn!("WxPusher not configured; completion notifications are disabled");
            None
        };

        Ok(Self {
            config,
            db,
            engine,
            scheduler: Arc::new(Scheduler::new()),
            notification_service,
            players,
            tasks,
            gift_codes,
            notifications,
        })
    }

    /// Register the periodic redemption job with the scheduler.
    pub async fn start_jobs(&self) {
        let mut job = RedeemCodesJob::new(
            self.engine.clone(),
            self.tasks.clone(),
            self.players.clone(),
            Duration::from_secs(self.config.job.delay_secs),
            Duration::from_secs(self.config.job.period_secs),
        )
        .with_fallback_players(self.config.game.fallback_player_ids.clone());
        if let Some(service) = &self.notification_service {
            job = job.with_notifications(service.clone());
        }
        self.scheduler.register(Arc::new(job)).await;
    }

    pub fn api_state(&self) -> ApiState {
        let auth = if self.config.admin.is_enabled() {
            Some(Arc::new(AdminAuth::new(&self.config.admin)))
        } else {
            info!("admin.password_hash not set; admin API disabled");
            None
        };
        ApiState {
            db: self.db.clone(),
            engine: self.engine.clone(),
            players: self.players.clone(),
            tasks: self.tasks.clone(),
            gift_codes: self.gift_codes.clone(),
            notifications: self.notifications.clone(),
            auth,
            batch_concurrency: self.config.job.worker_pool_size,
        }
    }
}
