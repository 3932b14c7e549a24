use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Pool, Row, Sqlite};
use giftbot_common::models::GiftCodeTask;
use giftbot_common::traits::repository_traits::TaskRepository;
use crate::utils::time::{current_epoch_millis, from_epoch_millis, to_epoch_millis};
use crate::Error;

#[derive(Clone)]
pub struct SqliteTaskRepository {
    pool: Pool<Sqlite>,
}

impl SqliteTaskRepository {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    fn row_to_task(row: &SqliteRow) -> Result<GiftCodeTask, Error> {
        let completed_at: Option<i64> = row.try_get("completed_at")?;
        Ok(GiftCodeTask {
            code: row.try_get("code")?,
            is_complete: row.try_get("is_complete")?,
            retry_count: row.try_get("retry_count")?,
            last_error: row.try_get("last_error")?,
            created_at: from_epoch_millis(row.try_get::<i64, _>("created_at")?),
            updated_at: from_epoch_millis(row.try_get::<i64, _>("updated_at")?),
            completed_at: completed_at.map(from_epoch_millis),
        })
    }
}

#[async_trait]
impl TaskRepository for SqliteTaskRepository {
    async fn create_task(&self, code: &str) -> Result<bool, Error> {
        let code = code.trim();
        if code.is_empty() {
            return Err(Error::Validation("gift code must not be empty".into()));
        }

        let now = current_epoch_millis();
        let res = sqlx::query(
            r#"
            INSERT OR IGNORE INTO gift_code_tasks (code, is_complete, retry_count, last_error, created_at, updated_at)
            VALUES (?, 0, 0, '', ?, ?)
            "#,
        )
            .bind(code)
            .bind(now)
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(res.rows_affected() > 0)
    }

    async fn list_pending_tasks(&self) -> Result<Vec<GiftCodeTask>, Error> {
        let rows = sqlx::query(
            r#"
            SELECT code, is_complete, retry_count, last_error, created_at, updated_at, completed_at
            FROM gift_code_tasks
            WHERE is_complete = 0
            ORDER BY created_at ASC, code ASC
            "#,
        )
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(Self::row_to_task).collect()
    }

    async fn list_pending_task_codes(&self) -> Result<Vec<String>, Error> {
        let rows = sqlx::query(
            r#"
            SELECT code
            FROM gift_code_tasks
            WHERE is_complete = 0
            ORDER BY created_at ASC, code ASC
            "#,
        )
            .fetch_all(&self.pool)
            .await?;

        let mut codes = Vec::with_capacity(rows.len());
        for row in rows {
            codes.push(row.try_get("code")?);
        }
        Ok(codes)
    }

    async fn get_task_by_code(&self, code: &str) -> Result<GiftCodeTask, Error> {
        let row = sqlx::query(
            r#"
            SELECT code, is_complete, retry_count, last_error, created_at, updated_at, completed_at
            FROM gift_code_tasks
            WHERE code = ?
            "#,
        )
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(r) => Self::row_to_task(&r),
            None => Err(Error::NotFound(format!("task for code '{}'", code))),
        }
    }

    async fn update_task_retry(&self, code: &str, retry_count: i64, last_error: &str) -> Result<(), Error> {
        let res = sqlx::query(
            r#"
            UPDATE gift_code_tasks
            SET retry_count = ?, last_error = ?, updated_at = ?
            WHERE code = ?
            "#,
        )
            .bind(retry_count)
            .bind(last_error)
            .bind(current_epoch_millis())
            .bind(code)
            .execute(&self.pool)
            .await?;

        if res.rows_affected() == 0 {
            return Err(Error::NotFound(format!("task for code '{}'", code)));
        }
        Ok(())
    }

    async fn increment_task_retry(&self, code: &str, last_error: &str) -> Result<(), Error> {
        let res = sqlx::query(
            r#"
            UPDATE gift_code_tasks
            SET retry_count = retry_count + 1, last_error = ?, updated_at = ?
            WHERE code = ?
            "#,
        )
            .bind(last_error)
            .bind(current_epoch_millis())
            .bind(code)
            .execute(&self.pool)
            .await?;

        if res.rows_affected() == 0 {
            return Err(Error::NotFound(format!("task for code '{}'", code)));
        }
        Ok(())
    }

    async fn update_task_complete(&self, code: &str, completed_at: DateTime<Utc>) -> Result<bool, Error> {
        let res = sqlx::query(
            r#"
            UPDATE gift_code_tasks
            SET is_complete = 1, completed_at = ?, updated_at = ?
            WHERE code = ? AND is_complete = 0
            "#,
        )
            .bind(to_epoch_millis(completed_at))
            .bind(current_epoch_millis())
            .bind(code)
            .execute(&self.pool)
            .await?;

        Ok(res.rows_affected() > 0)
    }

    async fn list_completed_tasks(&self, limit: i64) -> Result<Vec<GiftCodeTask>, Error> {
        let rows = sqlx::query(
            r#"
            SELECT code, is_complete, retry_count, last_error, created_at, updated_at, completed_at
            FROM gift_code_tasks
            WHERE is_complete = 1
            ORDER BY completed_at DESC, code ASC
            LIMIT ?
            "#,
        )
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(Self::row_to_task).collect()
    }

    async fn delete_task(&self, code: &str) -> Result<(), Error> {
        let mut tx = self.pool.begin().await?;

        // 1) the task itself, so a missing code aborts before touching records
        let res = sqlx::query("DELETE FROM gift_code_tasks WHERE code = ?")
            .bind(code)
            .execute(&mut *tx)
            .await?;
        if res.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(Error::NotFound(format!("task for code '{}'", code)));
        }

        // 2) every ledger entry for that code
        sqlx::query("DELETE FROM gift_code_records WHERE code = ?")
            .bind(code)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}
