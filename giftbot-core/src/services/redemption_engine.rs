// Drives one gift code across a list of players. Per-player failures are
// recorded against the task and never abort the rest of the batch.

use std::collections::HashSet;
use std::fmt::Write as _;
use std::sync::Arc;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, error, info, warn};
use giftbot_common::models::{GiftCodeStatus, PlayerProfile};
use giftbot_common::traits::repository_traits::{GiftCodeRepository, TaskRepository};
use crate::giftcode::{PlayerSession, RedeemResponse, SessionContext};
use crate::Error;

pub const DEFAULT_BATCH_CONCURRENCY: usize = 5;

/// Backend messages that carry meaning beyond "failed". The backend may reword
/// or localise them, so they are configurable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseSentinels {
    pub already_received: String,
    pub code_not_found: String,
}

impl Default for ResponseSentinels {
    fn default() -> Self {
        Self {
            already_received: "RECEIVED.".to_string(),
            code_not_found: "CDK NOT FOUND.".to_string(),
        }
    }
}

/// How one player's attempt at one code ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum PlayerOutcome {
    Redeemed,
    /// The backend says this account already has the reward.
    AlreadyRedeemed,
    /// A ledger entry already existed; no external call was made.
    AlreadyRecorded,
    /// The code does not exist for anyone.
    CodeNotFound,
    Failed(String),
}

impl PlayerOutcome {
    /// Terminal for this player (no further attempts needed).
    pub fn is_done(&self) -> bool {
        !matches!(self, PlayerOutcome::Failed(_))
    }

    pub fn is_success(&self) -> bool {
        matches!(
            self,
            PlayerOutcome::Redeemed | PlayerOutcome::AlreadyRedeemed | PlayerOutcome::AlreadyRecorded
        )
    }

    pub fn message(&self) -> String {
        match self {
            PlayerOutcome::Redeemed => "redeemed".to_string(),
            PlayerOutcome::AlreadyRedeemed | PlayerOutcome::AlreadyRecorded => "already redeemed".to_string(),
            PlayerOutcome::CodeNotFound => "code not found".to_string(),
            PlayerOutcome::Failed(msg) => msg.clone(),
        }
    }

    fn record_status(&self) -> Option<GiftCodeStatus> {
        match self {
            PlayerOutcome::Redeemed => Some(GiftCodeStatus::Redeemed),
            PlayerOutcome::AlreadyRedeemed => Some(GiftCodeStatus::AlreadyRedeemed),
            PlayerOutcome::CodeNotFound => Some(GiftCodeStatus::NotFound),
            PlayerOutcome::AlreadyRecorded | PlayerOutcome::Failed(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerAttempt {
    pub player_id: String,
    pub nickname: String,
    pub kingdom_id: i64,
    pub outcome: PlayerOutcome,
}

impl PlayerAttempt {
    pub fn summary_line(&self) -> String {
        format!(
            "fid:{}, nickname:{}, server:{} result:{}",
            self.player_id,
            self.nickname,
            self.kingdom_id,
            self.outcome.message()
        )
    }
}

/// Result of driving one code across a player list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttemptReport {
    pub code: String,
    /// Every player reached a terminal state, or the code was confirmed nonexistent.
    pub all_done: bool,
    pub not_found: bool,
    pub summary: String,
    pub attempts: Vec<PlayerAttempt>,
}

/// Outcome of a single ad-hoc redemption, as returned by the batch API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RedeemResult {
    pub fid: String,
    pub code: String,
    pub success: bool,
    pub message: String,
    pub nickname: String,
    pub kid: i64,
}

pub struct RedemptionEngine {
    ctx: Arc<SessionContext>,
    gift_codes: Arc<dyn GiftCodeRepository>,
    tasks: Arc<dyn TaskRepository>,
    sentinels: ResponseSentinels,
    /// player id => session. Rebuilt on restart; never a source of truth.
    sessions: DashMap<String, Arc<Mutex<PlayerSession>>>,
}

impl RedemptionEngine {
    pub fn new(
        ctx: Arc<SessionContext>,
        gift_codes: Arc<dyn GiftCodeRepository>,
        tasks: Arc<dyn TaskRepository>,
    ) -> Self {
        Self {
            ctx,
            gift_codes,
            tasks,
            sentinels: ResponseSentinels::default(),
            sessions: DashMap::new(),
        }
    }

    pub fn with_sentinels(mut self, sentinels: ResponseSentinels) -> Self {
        self.sentinels = sentinels;
        self
    }

    pub fn cached_session_count(&self) -> usize {
        self.sessions.len()
    }

    fn session_for(&self, player_id: &str) -> Arc<Mutex<PlayerSession>> {
        self.sessions
            .entry(player_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(PlayerSession::new(player_id, self.ctx.clone()))))
            .value()
            .clone()
    }

    /// Validate a new account against the game backend and store its profile.
    pub async fn register_player(&self, player_id: &str) -> Result<PlayerProfile, Error> {
        let player_id = player_id.trim();
        if player_id.is_empty() {
            return Err(Error::Validation("fid must not be empty".into()));
        }

        let session = self.session_for(player_id);
        let mut guard = session.lock().await;
        match guard.init().await {
            Ok(()) => guard
                .profile()
                .cloned()
                .ok_or_else(|| Error::Internal(format!("session for {} has no profile after init", player_id))),
            Err(e) => {
                drop(guard);
                self.sessions.remove(player_id);
                Err(e)
            }
        }
    }

    /// Attempt `code` for every player in order.
    ///
    /// A `CODE NOT FOUND` answer stops the loop: the code cannot exist for
    /// anyone, so the report is done without touching later players.
    pub async fn attempt_code(&self, code: &str, players: &[String]) -> Result<AttemptReport, Error> {
        let code = code.trim();
        if code.is_empty() {
            return Err(Error::Validation("gift code must not be empty".into()));
        }

        let mut attempts = Vec::with_capacity(players.len());
        let mut all_done = true;
        let mut not_found = false;

        for player_id in players {
            let attempt = self.attempt_for_player(code, player_id).await;

            match &attempt.outcome {
                PlayerOutcome::Failed(msg) => {
                    all_done = false;
                    self.record_failure(code, msg).await;
                }
                PlayerOutcome::CodeNotFound => not_found = true,
                _ => {}
            }
            attempts.push(attempt);

            if not_found {
                break;
            }
        }

        let mut summary = String::new();
        for attempt in &attempts {
            let _ = writeln!(summary, "{}", attempt.summary_line());
        }
        if not_found {
            all_done = true;
            let _ = writeln!(summary, "gift code {} does not exist", code);
        }

        Ok(AttemptReport {
            code: code.to_string(),
            all_done,
            not_found,
            summary: summary.trim_end().to_string(),
            attempts,
        })
    }

    /// A single ad-hoc redemption with the same outcome rules and bookkeeping.
    pub async fn redeem_for_player(&self, player_id: &str, code: &str) -> Result<RedeemResult, Error> {
        let code = code.trim();
        if code.is_empty() {
            return Err(Error::Validation("gift code must not be empty".into()));
        }

        let attempt = self.attempt_for_player(code, player_id).await;
        if let PlayerOutcome::Failed(msg) = &attempt.outcome {
            self.record_failure(code, msg).await;
        }

        Ok(RedeemResult {
            fid: attempt.player_id.clone(),
            code: code.to_string(),
            success: attempt.outcome.is_success(),
            message: attempt.outcome.message(),
            nickname: attempt.nickname,
            kid: attempt.kingdom_id,
        })
    }

    /// Redeem `code` for many players with at most `concurrency` in flight.
    /// Duplicate ids are dropped; results follow the first-seen order of `players`.
    pub async fn batch_redeem(
        self: &Arc<Self>,
        code: &str,
        players: &[String],
        concurrency: usize,
    ) -> Result<Vec<RedeemResult>, Error> {
        let code = code.trim().to_string();
        if code.is_empty() {
            return Err(Error::Validation("gift code must not be empty".into()));
        }

        let players = unique_players(players);
        let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
        let mut handles = Vec::with_capacity(players.len());

        for player_id in &players {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| Error::Internal(format!("batch semaphore closed: {}", e)))?;
            let engine = self.clone();
            let player = player_id.clone();
            let code = code.clone();
            handles.push((
                player_id.clone(),
                tokio::spawn(async move {
                    let _permit = permit;
                    engine.redeem_for_player(&player, &code).await
                }),
            ));
        }

        let mut results = Vec::with_capacity(handles.len());
        for (player_id, handle) in handles {
            let result = match handle.await {
                Ok(Ok(r)) => r,
                Ok(Err(e)) => self.failed_result(&player_id, &code, e.to_string()),
                Err(join_err) => {
                    error!("Batch worker for fid={} code={} crashed: {}", player_id, code, join_err);
                    let msg = format!("worker crashed: {}", join_err);
                    self.record_failure(&code, &msg).await;
                    self.failed_result(&player_id, &code, msg)
                }
            };
            results.push(result);
        }
        Ok(results)
    }

    fn failed_result(&self, player_id: &str, code: &str, message: String) -> RedeemResult {
        RedeemResult {
            fid: player_id.to_string(),
            code: code.to_string(),
            success: false,
            message,
            nickname: String::new(),
            kid: 0,
        }
    }

    async fn attempt_for_player(&self, code: &str, player_id: &str) -> PlayerAttempt {
        let outcome = self.run_attempt(code, player_id).await;

        let profile = self.profile_for(player_id).await;
        PlayerAttempt {
            player_id: player_id.to_string(),
            nickname: profile.as_ref().map(|p| p.nickname.clone()).unwrap_or_default(),
            kingdom_id: profile.as_ref().map(|p| p.kingdom_id).unwrap_or_default(),
            outcome,
        }
    }

    /// Check, submit and record under the player's session lock, so two
    /// callers racing on the same pair submit at most once.
    async fn run_attempt(&self, code: &str, player_id: &str) -> PlayerOutcome {
        let session = self.session_for(player_id);
        let mut guard = session.lock().await;

        // 1) idempotent short-circuit
        match self.gift_codes.is_gift_code_recorded(player_id, code).await {
            Ok(true) => {
                debug!("fid={} code={} already recorded, skipping", player_id, code);
                return PlayerOutcome::AlreadyRecorded;
            }
            Ok(false) => {}
            Err(e) => {
                error!("Ledger lookup failed for fid={} code={}: {}", player_id, code, e);
                return PlayerOutcome::Failed(e.to_string());
            }
        }

        // 2) one attempt on this player's session
        let outcome = match guard.redeem_code(code).await {
            Ok(resp) => self.interpret(player_id, code, &resp),
            Err(e) => {
                warn!("fid={} code={} attempt failed: {}", player_id, code, e);
                PlayerOutcome::Failed(e.to_string())
            }
        };

        // 3) ledger write; a failure here does not undo an external redemption
        if let Some(status) = outcome.record_status() {
            if let Err(e) = self
                .gift_codes
                .save_gift_code_record(player_id, code, status, &outcome.message())
                .await
            {
                error!("Failed to record fid={} code={} as {}: {}", player_id, code, status, e);
            }
        }
        outcome
    }

    fn interpret(&self, player_id: &str, code: &str, resp: &RedeemResponse) -> PlayerOutcome {
        if resp.code == 0 {
            info!("fid={} code={} redeemed", player_id, code);
            return PlayerOutcome::Redeemed;
        }
        if resp.msg == self.sentinels.already_received {
            info!("fid={} code={} already redeemed", player_id, code);
            return PlayerOutcome::AlreadyRedeemed;
        }
        if resp.msg == self.sentinels.code_not_found {
            info!("code={} does not exist (reported for fid={})", code, player_id);
            return PlayerOutcome::CodeNotFound;
        }

        warn!(
            "Unrecognized redemption result for fid={} code={}: code={} err_code={} msg='{}'",
            player_id, code, resp.code, resp.err_code, resp.msg
        );
        if resp.msg.trim().is_empty() {
            PlayerOutcome::Failed(format!("redemption failed with result code {}", resp.code))
        } else {
            PlayerOutcome::Failed(resp.msg.clone())
        }
    }

    /// Bump the task's retry counter. Ad-hoc codes without a task are ignored.
    async fn record_failure(&self, code: &str, message: &str) {
        match self.tasks.increment_task_retry(code, message).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => debug!("No task for code={}, retry not recorded", code),
            Err(e) => error!("Failed to record retry for code={}: {}", code, e),
        }
    }

    /// Profile for summaries: the live session if it is free, else storage.
    async fn profile_for(&self, player_id: &str) -> Option<PlayerProfile> {
        let cached = self.sessions.get(player_id).map(|s| s.value().clone());
        if let Some(session) = cached {
            if let Ok(guard) = session.try_lock() {
                if let Some(profile) = guard.profile() {
                    return Some(profile.clone());
                }
            }
        }
        self.ctx.players.get_player(player_id).await.ok().flatten()
    }
}

/// Trimmed, non-empty ids in first-seen order.
fn unique_players(players: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    players
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty() && seen.insert(p.to_string()))
        .map(str::to_string)
        .collect()
}
