use async_trait::async_trait;
use sqlx::{Pool, Row, Sqlite};
use giftbot_common::models::{GiftCodeRecord, GiftCodeStatus};
use giftbot_common::traits::repository_traits::GiftCodeRepository;
use crate::utils::time::{current_epoch_millis, from_epoch_millis};
use crate::Error;

#[derive(Clone)]
pub struct SqliteGiftCodeRepository {
    pool: Pool<Sqlite>,
}

impl SqliteGiftCodeRepository {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl GiftCodeRepository for SqliteGiftCodeRepository {
    async fn save_gift_code_record(
        &self,
        player_id: &str,
        code: &str,
        status: GiftCodeStatus,
        message: &str,
    ) -> Result<(), Error> {
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO gift_code_records (player_id, code, status, message, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
            .bind(player_id)
            .bind(code)
            .bind(status.as_str())
            .bind(message)
            .bind(current_epoch_millis())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn is_gift_code_recorded(&self, player_id: &str, code: &str) -> Result<bool, Error> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS cnt
            FROM gift_code_records
            WHERE player_id = ? AND code = ?
            "#,
        )
            .bind(player_id)
            .bind(code)
            .fetch_one(&self.pool)
            .await?;

        let cnt: i64 = row.try_get("cnt")?;
        Ok(cnt > 0)
    }

    async fn list_gift_codes_by_player(&self, player_id: &str) -> Result<Vec<GiftCodeRecord>, Error> {
        let rows = sqlx::query(
            r#"
            SELECT id, player_id, code, status, message, created_at
            FROM gift_code_records
            WHERE player_id = ?
            ORDER BY created_at DESC, id DESC
            "#,
        )
            .bind(player_id)
            .fetch_all(&self.pool)
            .await?;

        let mut result = Vec::new();
        for row in rows {
            let status_str: String = row.try_get("status")?;
            let status = status_str.parse::<GiftCodeStatus>().map_err(Error::Internal)?;
            result.push(GiftCodeRecord {
                id: row.try_get("id")?,
                player_id: row.try_get("player_id")?,
                code: row.try_get("code")?,
                status,
                message: row.try_get("message")?,
                created_at: from_epoch_millis(row.try_get::<i64, _>("created_at")?),
            });
        }
        Ok(result)
    }
}
