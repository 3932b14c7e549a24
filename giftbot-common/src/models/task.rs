use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A unit of redemption work for one code, shared across all players.
///
/// `retry_count` only ever grows; `is_complete` flips to `true` exactly once
/// and `completed_at` is set at the same moment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GiftCodeTask {
    pub code: String,
    pub is_complete: bool,
    pub retry_count: i64,
    pub last_error: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}
