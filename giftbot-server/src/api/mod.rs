//! Admin and legacy HTTP endpoints.

pub mod auth;
pub mod handlers;
pub mod response;
pub mod routes;

use std::sync::Arc;
use giftbot_common::traits::repository_traits::{
    GiftCodeRepository, NotificationRepository, PlayerRepository, TaskRepository,
};
use giftbot_core::services::RedemptionEngine;
use giftbot_core::Database;

pub use auth::AdminAuth;
pub use routes::build_router;

/// Shared handler state; cheap to clone.
#[derive(Clone)]
pub struct ApiState {
    pub db: Database,
    pub engine: Arc<RedemptionEngine>,
    pub players: Arc<dyn PlayerRepository>,
    pub tasks: Arc<dyn TaskRepository>,
    pub gift_codes: Arc<dyn GiftCodeRepository>,
    pub notifications: Arc<dyn NotificationRepository>,
    /// `None` leaves the admin routes unmounted.
    pub auth: Option<Arc<AdminAuth>>,
    pub batch_concurrency: usize,
}
