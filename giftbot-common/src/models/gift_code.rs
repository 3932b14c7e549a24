use std::fmt;
use std::str::FromStr;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Terminal state a (player, code) pair reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GiftCodeStatus {
    Redeemed,
    AlreadyRedeemed,
    NotFound,
}

impl GiftCodeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GiftCodeStatus::Redeemed => "redeemed",
            GiftCodeStatus::AlreadyRedeemed => "already_redeemed",
            GiftCodeStatus::NotFound => "not_found",
        }
    }
}

impl fmt::Display for GiftCodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GiftCodeStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "redeemed" => Ok(GiftCodeStatus::Redeemed),
            "already_redeemed" => Ok(GiftCodeStatus::AlreadyRedeemed),
            "not_found" => Ok(GiftCodeStatus::NotFound),
            other => Err(format!("unknown gift code status '{}'", other)),
        }
    }
}

/// Idempotency ledger entry: its existence means the pair is never attempted again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GiftCodeRecord {
    pub id: i64,
    pub player_id: String,
    pub code: String,
    pub status: GiftCodeStatus,
    pub message: String,
    pub created_at: DateTime<Utc>,
}
