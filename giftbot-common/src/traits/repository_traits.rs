use async_trait::async_trait;
use chrono::{DateTime, Utc};
use crate::error::Error;
use crate::models::{
    GiftCodeRecord, GiftCodeStatus, GiftCodeTask, NotificationRecord, PlayerProfile,
};

/// Idempotency ledger of (player, code) pairs that reached a terminal state.
#[async_trait]
pub trait GiftCodeRepository: Send + Sync {
    /// Insert-or-ignore: a second save for the same pair is a no-op.
    async fn save_gift_code_record(
        &self,
        player_id: &str,
        code: &str,
        status: GiftCodeStatus,
        message: &str,
    ) -> Result<(), Error>;
    async fn is_gift_code_recorded(&self, player_id: &str, code: &str) -> Result<bool, Error>;
    async fn list_gift_codes_by_player(&self, player_id: &str) -> Result<Vec<GiftCodeRecord>, Error>;
}

#[async_trait]
pub trait PlayerRepository: Send + Sync {
    /// Create-or-update keyed by `player_id`. `created_at` of an existing row is preserved.
    async fn upsert_player(&self, profile: &PlayerProfile) -> Result<(), Error>;
    async fn get_player(&self, player_id: &str) -> Result<Option<PlayerProfile>, Error>;
    async fn list_players(&self) -> Result<Vec<PlayerProfile>, Error>;
    /// Sorted ascending so redemption order is reproducible.
    async fn list_known_player_ids(&self) -> Result<Vec<String>, Error>;
}

#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// Returns `false` if a task for `code` already exists.
    async fn create_task(&self, code: &str) -> Result<bool, Error>;
    async fn list_pending_tasks(&self) -> Result<Vec<GiftCodeTask>, Error>;
    async fn list_pending_task_codes(&self) -> Result<Vec<String>, Error>;
    /// `Error::NotFound` if no task exists for `code`.
    async fn get_task_by_code(&self, code: &str) -> Result<GiftCodeTask, Error>;
    async fn update_task_retry(&self, code: &str, retry_count: i64, last_error: &str) -> Result<(), Error>;
    /// Atomic `retry_count + 1`. `Error::NotFound` if no task exists for `code`.
    async fn increment_task_retry(&self, code: &str, last_error: &str) -> Result<(), Error>;
    /// Returns `true` only for the call that moved the task from pending to complete.
    async fn update_task_complete(&self, code: &str, completed_at: DateTime<Utc>) -> Result<bool, Error>;
    async fn list_completed_tasks(&self, limit: i64) -> Result<Vec<GiftCodeTask>, Error>;
    /// Removes the task and its gift code records in one transaction.
    async fn delete_task(&self, code: &str) -> Result<(), Error>;
}

#[async_trait]
pub trait NotificationRepository: Send + Sync {
    /// Returns the stored row id.
    async fn save_notification(&self, record: &NotificationRecord) -> Result<i64, Error>;
    async fn list_notifications(&self, limit: i64) -> Result<Vec<NotificationRecord>, Error>;
}
