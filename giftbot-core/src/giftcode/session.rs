use std::sync::Arc;
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};
use giftbot_common::models::PlayerProfile;
use giftbot_common::traits::repository_traits::PlayerRepository;
use crate::captcha::OcrPool;
use crate::Error;
use super::client::{GameApi, RedeemResponse};

/// Sessions older than this are re-initialised before the next attempt.
pub const DEFAULT_SESSION_TTL_SECS: i64 = 600;

/// Collaborators shared by every player session.
pub struct SessionContext {
    pub api: Arc<dyn GameApi>,
    pub ocr: Arc<OcrPool>,
    pub players: Arc<dyn PlayerRepository>,
    pub session_ttl: Duration,
}

impl SessionContext {
    pub fn new(
        api: Arc<dyn GameApi>,
        ocr: Arc<OcrPool>,
        players: Arc<dyn PlayerRepository>,
    ) -> Self {
        Self {
            api,
            ocr,
            players,
            session_ttl: Duration::seconds(DEFAULT_SESSION_TTL_SECS),
        }
    }

    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Active,
    Expired,
}

/// One game account's login state.
///
/// Not synchronised: `redeem_code` takes `&mut self`, so callers sharing a
/// session must hold it behind a lock.
pub struct PlayerSession {
    player_id: String,
    profile: Option<PlayerProfile>,
    expires_at: Option<DateTime<Utc>>,
    ctx: Arc<SessionContext>,
}

impl PlayerSession {
    pub fn new(player_id: &str, ctx: Arc<SessionContext>) -> Self {
        Self {
            player_id: player_id.to_string(),
            profile: None,
            expires_at: None,
            ctx,
        }
    }

    pub fn player_id(&self) -> &str {
        &self.player_id
    }

    pub fn profile(&self) -> Option<&PlayerProfile> {
        self.profile.as_ref()
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    pub fn state(&self) -> SessionState {
        match self.expires_at {
            None => SessionState::Uninitialized,
            Some(exp) if Utc::now() >= exp => SessionState::Expired,
            Some(_) => SessionState::Active,
        }
    }

    /// Fetch the player's profile, persist it, and start a fresh session window.
    pub async fn init(&mut self) -> Result<(), Error> {
        let data = self.ctx.api.player_info(&self.player_id).await?;
        let profile = PlayerProfile::new(&self.player_id, &data.nickname, data.kid, &data.avatar_image);

        self.ctx.players.upsert_player(&profile).await?;

        info!(
            "Session ready for fid={} nickname='{}' kid={}",
            self.player_id, profile.nickname, profile.kingdom_id
        );
        self.profile = Some(profile);
        self.expires_at = Some(Utc::now() + self.ctx.session_ttl);
        Ok(())
    }

    /// One redemption attempt: refresh the session if needed, solve a captcha,
    /// submit. The backend's answer is returned untouched.
    pub async fn redeem_code(&mut self, code: &str) -> Result<RedeemResponse, Error> {
        // 1) make sure the session is usable
        if self.state() != SessionState::Active {
            debug!("Session for fid={} is {:?}, initialising", self.player_id, self.state());
            self.init().await?;
        }

        // 2) captcha image
        let captcha = self.ctx.api.captcha(&self.player_id).await?;
        if captcha.img.trim().is_empty() {
            return Err(Error::ExternalApi(format!("captcha for {} came back empty", self.player_id)));
        }

        // 3) OCR; a blank answer would burn a real attempt, so stop here
        let recognized = self.ctx.ocr.solve(&captcha.img).await?;
        let recognized = recognized.trim();
        if recognized.is_empty() {
            return Err(Error::Captcha(format!("OCR returned no text for fid={}", self.player_id)));
        }
        debug!("fid={} captcha solved as '{}'", self.player_id, recognized);

        // 4) submit
        self.ctx.api.redeem(&self.player_id, code, recognized).await
    }
}
