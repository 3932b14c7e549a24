pub mod redemption_engine;
pub mod notification_service;

pub use redemption_engine::{
    AttemptReport, PlayerAttempt, PlayerOutcome, RedeemResult, RedemptionEngine, ResponseSentinels,
    DEFAULT_BATCH_CONCURRENCY,
};
pub use notification_service::NotificationService;
