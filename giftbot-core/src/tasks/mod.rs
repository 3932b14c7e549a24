pub mod scheduler;
pub mod redeem_codes;

pub use scheduler::{Job, Scheduler};
pub use redeem_codes::{RedeemCodesJob, DEFAULT_FALLBACK_PLAYER_IDS};
