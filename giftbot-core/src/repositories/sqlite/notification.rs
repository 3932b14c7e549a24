use async_trait::async_trait;
use sqlx::{Pool, Row, Sqlite};
use giftbot_common::models::{NotificationRecord, NotificationStatus};
use giftbot_common::traits::repository_traits::NotificationRepository;
use crate::utils::time::{from_epoch_millis, to_epoch_millis};
use crate::Error;

#[derive(Clone)]
pub struct SqliteNotificationRepository {
    pool: Pool<Sqlite>,
}

impl SqliteNotificationRepository {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationRepository for SqliteNotificationRepository {
    async fn save_notification(&self, record: &NotificationRecord) -> Result<i64, Error> {
        let res = sqlx::query(
            r#"
            INSERT INTO notifications (channel, title, content, result, status, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
            .bind(&record.channel)
            .bind(&record.title)
            .bind(&record.content)
            .bind(&record.result)
            .bind(record.status.as_str())
            .bind(to_epoch_millis(record.created_at))
            .execute(&self.pool)
            .await?;

        Ok(res.last_insert_rowid())
    }

    async fn list_notifications(&self, limit: i64) -> Result<Vec<NotificationRecord>, Error> {
        let rows = sqlx::query(
            r#"
            SELECT id, channel, title, content, result, status, created_at
            FROM notifications
            ORDER BY created_at DESC, id DESC
            LIMIT ?
            "#,
        )
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        let mut result = Vec::new();
        for row in rows {
            let status_str: String = row.try_get("status")?;
            result.push(NotificationRecord {
                id: row.try_get("id")?,
                channel: row.try_get("channel")?,
                title: row.try_get("title")?,
                content: row.try_get("content")?,
                result: row.try_get("result")?,
                status: status_str.parse::<NotificationStatus>().map_err(Error::Internal)?,
                created_at: from_epoch_millis(row.try_get::<i64, _>("created_at")?),
            });
        }
        Ok(result)
    }
}
