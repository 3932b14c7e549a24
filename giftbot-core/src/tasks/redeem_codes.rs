// src/tasks/redeem_codes.rs

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Once};
use std::time::{Duration, Instant};
use async_trait::async_trait;
use chrono::Utc;
use futures_util::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use giftbot_common::traits::repository_traits::{PlayerRepository, TaskRepository};
use crate::services::{NotificationService, RedemptionEngine};
use crate::Error;
use super::scheduler::Job;

/// Used when no player has been registered yet, so the pipeline stays exercisable.
pub const DEFAULT_FALLBACK_PLAYER_IDS: &[&str] = &["366184723"];

static PANIC_CAPTURE: Once = Once::new();

thread_local! {
    static LAST_PANIC_TRACE: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// Chain a hook that keeps the location and backtrace of the latest panic on
/// this thread. `catch_unwind` polls inline, so the catching code reads it back
/// on the same thread.
fn install_panic_capture() {
    PANIC_CAPTURE.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let location = info
                .location()
                .map(|l| l.to_string())
                .unwrap_or_else(|| "unknown location".to_string());
            let trace = format!("at {}\n{}", location, Backtrace::force_capture());
            LAST_PANIC_TRACE.with(|slot| *slot.borrow_mut() = Some(trace));
            previous(info);
        }));
    });
}

fn take_panic_trace() -> String {
    LAST_PANIC_TRACE
        .with(|slot| slot.borrow_mut().take())
        .unwrap_or_else(|| "no stack captured".to_string())
}

/// Periodic sweep: every pending code against every known player.
pub struct RedeemCodesJob {
    engine: Arc<RedemptionEngine>,
    tasks: Arc<dyn TaskRepository>,
    players: Arc<dyn PlayerRepository>,
    notifications: Option<Arc<NotificationService>>,
    fallback_player_ids: Vec<String>,
    delay: Duration,
    period: Duration,
}

impl RedeemCodesJob {
    pub fn new(
        engine: Arc<RedemptionEngine>,
        tasks: Arc<dyn TaskRepository>,
        players: Arc<dyn PlayerRepository>,
        delay: Duration,
        period: Duration,
    ) -> Self {
        Self {
            engine,
            tasks,
            players,
            notifications: None,
            fallback_player_ids: DEFAULT_FALLBACK_PLAYER_IDS.iter().map(|s| s.to_string()).collect(),
            delay,
            period,
        }
    }

    pub fn with_notifications(mut self, service: Arc<NotificationService>) -> Self {
        self.notifications = Some(service);
        self
    }

    pub fn with_fallback_players(mut self, ids: Vec<String>) -> Self {
        self.fallback_player_ids = ids;
        self
    }

    /// Known players sorted by id, or the fallback list when there are none.
    async fn player_ids(&self) -> Result<Vec<String>, Error> {
        let mut ids = self.players.list_known_player_ids().await?;
        if ids.is_empty() {
            debug!("No registered players, using fallback list {:?}", self.fallback_player_ids);
            ids = self.fallback_player_ids.clone();
        }
        ids.sort();
        ids.dedup();
        Ok(ids)
    }

    /// Process one code with a panic boundary around it. A panic is logged and
    /// counted as a failed attempt; the sweep carries on with the next code.
    pub async fn process_code_safely(&self, code: &str, players: &[String]) {
        install_panic_capture();
        let started = Instant::now();
        info!("Processing code '{}' for {} player(s)", code, players.len());

        let outcome = AssertUnwindSafe(self.process_code(code, players))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!("Code '{}' failed: {}", code, e);
                self.bump_retry(code, &e.to_string()).await;
            }
            Err(panic) => {
                let msg = panic_message(panic.as_ref());
                error!("Panic while processing code '{}': {}\n{}", code, msg, take_panic_trace());
                self.bump_retry(code, &format!("panic: {}", msg)).await;
            }
        }
        info!("Finished code '{}' in {:?}", code, started.elapsed());
    }

    async fn process_code(&self, code: &str, players: &[String]) -> Result<(), Error> {
        let report = self.engine.attempt_code(code, players).await?;
        info!("Code '{}' summary:\n{}", code, report.summary);

        if !report.all_done {
            debug!("Code '{}' still pending", code);
            return Ok(());
        }

        // only the call that flips the task notifies
        let transitioned = self.tasks.update_task_complete(code, Utc::now()).await?;
        if !transitioned {
            debug!("Code '{}' was already complete", code);
            return Ok(());
        }
        info!("Code '{}' complete for all players", code);

        if let Some(service) = &self.notifications {
            let title = "Gift code redeemed";
            let summary = format!("Gift code [{}] redeemed", code);
            if let Err(e) = service.send_and_save(title, &summary, &report.summary).await {
                warn!("Completion notification for '{}' failed: {}", code, e);
            }
        }
        Ok(())
    }

    async fn bump_retry(&self, code: &str, message: &str) {
        match self.tasks.increment_task_retry(code, message).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => debug!("No task for code '{}' to record retry on", code),
            Err(e) => error!("Failed to record retry for code '{}': {}", code, e),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[async_trait]
impl Job for RedeemCodesJob {
    fn name(&self) -> &str {
        "redeem_codes"
    }

    fn delay(&self) -> Duration {
        self.delay
    }

    fn period(&self) -> Duration {
        self.period
    }

    async fn run(&self, cancel: &CancellationToken) {
        // 1) pending codes
        let codes = match self.tasks.list_pending_task_codes().await {
            Ok(c) => c,
            Err(e) => {
                error!("Could not list pending codes: {}", e);
                return;
            }
        };
        if codes.is_empty() {
            debug!("No pending gift codes");
            return;
        }

        // 2) players
        let players = match self.player_ids().await {
            Ok(p) => p,
            Err(e) => {
                error!("Could not list players: {}", e);
                return;
            }
        };

        // 3) one code at a time, checking for shutdown in between
        for code in codes {
            if cancel.is_cancelled() {
                info!("Shutdown requested, leaving remaining codes for the next run");
                break;
            }
            self.process_code_safely(&code, &players).await;
        }
    }
}
