use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Cached copy of a game account's public profile, keyed by `player_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerProfile {
    pub player_id: String,
    pub nickname: String,
    /// Kingdom (server) the account lives on.
    pub kingdom_id: i64,
    pub avatar_image: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PlayerProfile {
    pub fn new(player_id: &str, nickname: &str, kingdom_id: i64, avatar_image: &str) -> Self {
        let now = Utc::now();
        Self {
            player_id: player_id.to_string(),
            nickname: nickname.to_string(),
            kingdom_id,
            avatar_image: avatar_image.to_string(),
            created_at: now,
            updated_at: now,
        }
    }
}
