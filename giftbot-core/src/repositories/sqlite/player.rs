// src/repositories/sqlite/player.rs

use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Pool, Row, Sqlite};
use giftbot_common::models::PlayerProfile;
use giftbot_common::traits::repository_traits::PlayerRepository;
use crate::utils::time::{from_epoch_millis, to_epoch_millis};
use crate::Error;

#[derive(Clone)]
pub struct SqlitePlayerRepository {
    pool: Pool<Sqlite>,
}

impl SqlitePlayerRepository {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    fn row_to_profile(row: &SqliteRow) -> Result<PlayerProfile, Error> {
        Ok(PlayerProfile {
            player_id: row.try_get("player_id")?,
            nickname: row.try_get("nickname")?,
            kingdom_id: row.try_get("kingdom_id")?,
            avatar_image: row.try_get("avatar_image")?,
            created_at: from_epoch_millis(row.try_get::<i64, _>("created_at")?),
            updated_at: from_epoch_millis(row.try_get::<i64, _>("updated_at")?),
        })
    }
}

#[async_trait]
impl PlayerRepository for SqlitePlayerRepository {
    async fn upsert_player(&self, profile: &PlayerProfile) -> Result<(), Error> {
        sqlx::query(
            r#"
            INSERT INTO players (player_id, nickname, kingdom_id, avatar_image, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT (player_id) DO UPDATE SET
                nickname = excluded.nickname,
                kingdom_id = excluded.kingdom_id,
                avatar_image = excluded.avatar_image,
                updated_at = excluded.updated_at
            "#,
        )
            .bind(&profile.player_id)
            .bind(&profile.nickname)
            .bind(profile.kingdom_id)
            .bind(&profile.avatar_image)
            .bind(to_epoch_millis(profile.created_at))
            .bind(to_epoch_millis(profile.updated_at))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_player(&self, player_id: &str) -> Result<Option<PlayerProfile>, Error> {
        let row = sqlx::query(
            r#"
            SELECT player_id, nickname, kingdom_id, avatar_image, created_at, updated_at
            FROM players
            WHERE player_id = ?
            "#,
        )
            .bind(player_id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(r) => Ok(Some(Self::row_to_profile(&r)?)),
            None => Ok(None),
        }
    }

    async fn list_players(&self) -> Result<Vec<PlayerProfile>, Error> {
        let rows = sqlx::query(
            r#"
            SELECT player_id, nickname, kingdom_id, avatar_image, created_at, updated_at
            FROM players
            ORDER BY player_id ASC
            "#,
        )
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(Self::row_to_profile).collect()
    }

    async fn list_known_player_ids(&self) -> Result<Vec<String>, Error> {
        let rows = sqlx::query("SELECT player_id FROM players ORDER BY player_id ASC")
            .fetch_all(&self.pool)
            .await?;

        let mut ids = Vec::with_capacity(rows.len());
        for row in rows {
            ids.push(row.try_get("player_id")?);
        }
        Ok(ids)
    }
}
