// src/repositories/sqlite/mod.rs

pub mod gift_code;
pub mod player;
pub mod task;
pub mod notification;

pub use gift_code::SqliteGiftCodeRepository;
pub use player::SqlitePlayerRepository;
pub use task::SqliteTaskRepository;
pub use notification::SqliteNotificationRepository;
