//! Everything that talks to the game's gift-code backend: request signing,
//! the typed client behind the [`GameApi`] seam, and per-player sessions.

pub mod signing;
pub mod client;
pub mod session;

pub use client::{
    ApiEnvelope, CaptchaData, GameApi, GameApiClient, GameApiConfig, PlayerData, RedeemResponse,
};
pub use session::{PlayerSession, SessionContext, SessionState};
