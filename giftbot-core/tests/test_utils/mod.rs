// Shared fakes for the integration tests: a scripted game backend, a fixed
// OCR provider, a recording notifier, an engine wired to in-memory SQLite and
// a local stub server for vendor HTTP APIs.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use async_trait::async_trait;
use giftbot_core::captcha::{OcrPool, OcrProvider};
use giftbot_core::giftcode::{CaptchaData, GameApi, PlayerData, RedeemResponse, SessionContext};
use giftbot_core::notification::Notifier;
use giftbot_core::repositories::{
    SqliteGiftCodeRepository, SqliteNotificationRepository, SqlitePlayerRepository,
    SqliteTaskRepository,
};
use giftbot_core::services::RedemptionEngine;
use giftbot_core::{Database, Error};

/// Game backend whose answers are scripted per player.
#[derive(Default)]
pub struct ScriptedGameApi {
    init_failures: HashSet<String>,
    answers: HashMap<String, (i64, String)>,
    panic_codes: HashSet<String>,
    redeem_delay: Option<Duration>,

    pub player_info_calls: Mutex<Vec<String>>,
    pub captcha_calls: Mutex<Vec<String>>,
    /// (player, code, captcha)
    pub redeem_calls: Mutex<Vec<(String, String, String)>>,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl ScriptedGameApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// `player_info` for this player fails with a transport error.
    pub fn fail_init_for(mut self, player_id: &str) -> Self {
        self.init_failures.insert(player_id.to_string());
        self
    }

    /// `redeem` for this player answers with `(code, msg)` instead of success.
    pub fn answer(mut self, player_id: &str, code: i64, msg: &str) -> Self {
        self.answers.insert(player_id.to_string(), (code, msg.to_string()));
        self
    }

    /// `redeem` of this gift code panics.
    pub fn panic_on_code(mut self, code: &str) -> Self {
        self.panic_codes.insert(code.to_string());
        self
    }

    pub fn with_redeem_delay(mut self, delay: Duration) -> Self {
        self.redeem_delay = Some(delay);
        self
    }

    pub fn redeemed_players(&self) -> Vec<String> {
        self.redeem_calls.lock().unwrap().iter().map(|(p, _, _)| p.clone()).collect()
    }

    pub fn redeem_count(&self) -> usize {
        self.redeem_calls.lock().unwrap().len()
    }

    pub fn external_call_count(&self) -> usize {
        self.player_info_calls.lock().unwrap().len()
            + self.captcha_calls.lock().unwrap().len()
            + self.redeem_calls.lock().unwrap().len()
    }
}

#[async_trait]
impl GameApi for ScriptedGameApi {
    async fn player_info(&self, player_id: &str) -> Result<PlayerData, Error> {
        self.player_info_calls.lock().unwrap().push(player_id.to_string());
        if self.init_failures.contains(player_id) {
            return Err(Error::ExternalApi(format!("connection reset while fetching {}", player_id)));
        }
        Ok(PlayerData {
            fid: player_id.parse().unwrap_or_default(),
            nickname: format!("player-{}", player_id),
            kid: 1000,
            avatar_image: String::new(),
        })
    }

    async fn captcha(&self, player_id: &str) -> Result<CaptchaData, Error> {
        self.captcha_calls.lock().unwrap().push(player_id.to_string());
        Ok(CaptchaData { img: "data:image/png;base64,QUJD".to_string() })
    }

    async fn redeem(&self, player_id: &str, code: &str, captcha_code: &str) -> Result<RedeemResponse, Error> {
        self.redeem_calls.lock().unwrap().push((
            player_id.to_string(),
            code.to_string(),
            captcha_code.to_string(),
        ));
        if self.panic_codes.contains(code) {
            panic!("backend exploded on {}", code);
        }

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.redeem_delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let (result_code, msg) = self
            .answers
            .get(player_id)
            .cloned()
            .unwrap_or((0, "SUCCESS".to_string()));
        Ok(RedeemResponse {
            code: result_code,
            msg,
            ..Default::default()
        })
    }
}

/// Always answers with the same text.
pub struct FixedOcr(pub String);

#[async_trait]
impl OcrProvider for FixedOcr {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn solve(&self, _image_base64: &str) -> Result<String, Error> {
        Ok(self.0.clone())
    }
}

/// Collects everything it is asked to send.
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<(String, String, String)>>,
    pub fail: bool,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn channel(&self) -> &str {
        "recording"
    }

    async fn send(&self, title: &str, summary: &str, content: &str) -> Result<String, Error> {
        self.sent.lock().unwrap().push((title.to_string(), summary.to_string(), content.to_string()));
        if self.fail {
            return Err(Error::ExternalApi("notifier offline".into()));
        }
        Ok("delivered".to_string())
    }
}

/// Everything a test needs, backed by one in-memory database.
pub struct Harness {
    pub db: Database,
    pub api: Arc<ScriptedGameApi>,
    pub engine: Arc<RedemptionEngine>,
    pub gift_codes: Arc<SqliteGiftCodeRepository>,
    pub players: Arc<SqlitePlayerRepository>,
    pub tasks: Arc<SqliteTaskRepository>,
    pub notifications: Arc<SqliteNotificationRepository>,
}

pub async fn harness(api: ScriptedGameApi) -> Result<Harness, Error> {
    harness_with_ocr(api, "x7k2").await
}

pub async fn harness_with_ocr(api: ScriptedGameApi, ocr_answer: &str) -> Result<Harness, Error> {
    let db = Database::new_in_memory().await?;
    db.migrate().await?;

    let gift_codes = Arc::new(SqliteGiftCodeRepository::new(db.pool().clone()));
    let players = Arc::new(SqlitePlayerRepository::new(db.pool().clone()));
    let tasks = Arc::new(SqliteTaskRepository::new(db.pool().clone()));
    let notifications = Arc::new(SqliteNotificationRepository::new(db.pool().clone()));

    let api = Arc::new(api);
    let providers: Vec<Arc<dyn OcrProvider>> = vec![Arc::new(FixedOcr(ocr_answer.to_string()))];
    let ocr = Arc::new(OcrPool::new(providers)?);
    let ctx = Arc::new(SessionContext::new(api.clone(), ocr, players.clone()));
    let engine = Arc::new(RedemptionEngine::new(ctx, gift_codes.clone(), tasks.clone()));

    Ok(Harness { db, api, engine, gift_codes, players, tasks, notifications })
}

/// Serve `router` on an ephemeral local port and return its base URL.
pub async fn serve_stub(router: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind stub listener");
    let addr = listener.local_addr().expect("stub address");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("stub server");
    });
    format!("http://{}", addr)
}

pub fn ids(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}
