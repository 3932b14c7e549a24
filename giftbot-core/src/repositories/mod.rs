pub mod sqlite;

pub use giftbot_common::traits::repository_traits::{
    GiftCodeRepository, NotificationRepository, PlayerRepository, TaskRepository,
};
pub use sqlite::{
    SqliteGiftCodeRepository, SqliteNotificationRepository, SqlitePlayerRepository,
    SqliteTaskRepository,
};
