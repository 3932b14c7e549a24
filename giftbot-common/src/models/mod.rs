// src/models/mod.rs

pub mod player;
pub mod task;
pub mod gift_code;
pub mod notification;

pub use player::PlayerProfile;
pub use task::GiftCodeTask;
pub use gift_code::{GiftCodeRecord, GiftCodeStatus};
pub use notification::{NotificationRecord, NotificationStatus};
