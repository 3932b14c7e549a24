// tests/repository_tests.rs

use chrono::{Duration, Utc};
use giftbot_common::models::{GiftCodeStatus, NotificationRecord, NotificationStatus, PlayerProfile};
use giftbot_common::traits::repository_traits::{
    GiftCodeRepository, NotificationRepository, PlayerRepository, TaskRepository,
};
use giftbot_core::repositories::{
    SqliteGiftCodeRepository, SqliteNotificationRepository, SqlitePlayerRepository,
    SqliteTaskRepository,
};
use giftbot_core::{Database, Error};
use tokio_test::{assert_err, assert_ok};

async fn fresh_db() -> Result<Database, Error> {
    let db = Database::new_in_memory().await?;
    db.migrate().await?;
    Ok(db)
}

#[tokio::test]
async fn test_create_task_is_idempotent_and_trims() -> Result<(), Error> {
    let db = fresh_db().await?;
    let repo = SqliteTaskRepository::new(db.pool().clone());

    assert!(repo.create_task("  VIP888 ").await?);
    assert!(!repo.create_task("VIP888").await?);
    assert!(matches!(repo.create_task("   ").await, Err(Error::Validation(_))));

    let task = repo.get_task_by_code("VIP888").await?;
    assert_eq!(task.retry_count, 0);
    assert!(!task.is_complete);
    assert_eq!(repo.list_pending_tasks().await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_missing_task_is_not_found() -> Result<(), Error> {
    let db = fresh_db().await?;
    let repo = SqliteTaskRepository::new(db.pool().clone());

    assert!(repo.get_task_by_code("GHOST").await.unwrap_err().is_not_found());
    assert!(repo.increment_task_retry("GHOST", "x").await.unwrap_err().is_not_found());
    assert!(repo.update_task_retry("GHOST", 3, "x").await.unwrap_err().is_not_found());
    assert!(repo.delete_task("GHOST").await.unwrap_err().is_not_found());
    Ok(())
}

#[tokio::test]
async fn test_retry_bookkeeping() -> Result<(), Error> {
    let db = fresh_db().await?;
    let repo = SqliteTaskRepository::new(db.pool().clone());
    repo.create_task("VIP888").await?;

    repo.increment_task_retry("VIP888", "first").await?;
    repo.increment_task_retry("VIP888", "second").await?;
    let task = repo.get_task_by_code("VIP888").await?;
    assert_eq!(task.retry_count, 2);
    assert_eq!(task.last_error, "second");

    repo.update_task_retry("VIP888", 10, "reset").await?;
    let task = repo.get_task_by_code("VIP888").await?;
    assert_eq!(task.retry_count, 10);
    assert_eq!(task.last_error, "reset");
    Ok(())
}

#[tokio::test]
async fn test_completion_happens_once() -> Result<(), Error> {
    let db = fresh_db().await?;
    let repo = SqliteTaskRepository::new(db.pool().clone());
    repo.create_task("A1").await?;
    repo.create_task("B2").await?;

    let done_at = Utc::now();
    assert!(repo.update_task_complete("A1", done_at).await?);
    assert!(!repo.update_task_complete("A1", done_at + Duration::hours(1)).await?);

    let a1 = repo.get_task_by_code("A1").await?;
    assert!(a1.is_complete);
    assert_eq!(a1.completed_at.map(|t| t.timestamp_millis()), Some(done_at.timestamp_millis()));

    assert_eq!(repo.list_pending_task_codes().await?, vec!["B2".to_string()]);
    let completed = repo.list_completed_tasks(100).await?;
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].code, "A1");
    assert!(repo.list_completed_tasks(0).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_delete_task_cascades_records() -> Result<(), Error> {
    let db = fresh_db().await?;
    let tasks = SqliteTaskRepository::new(db.pool().clone());
    let codes = SqliteGiftCodeRepository::new(db.pool().clone());

    tasks.create_task("VIP888").await?;
    codes.save_gift_code_record("1001", "VIP888", GiftCodeStatus::Redeemed, "redeemed").await?;
    codes.save_gift_code_record("1001", "OTHER", GiftCodeStatus::Redeemed, "redeemed").await?;

    assert_ok!(tasks.delete_task("VIP888").await);
    assert_err!(tasks.get_task_by_code("VIP888").await);
    assert!(!codes.is_gift_code_recorded("1001", "VIP888").await?);
    assert!(codes.is_gift_code_recorded("1001", "OTHER").await?);
    assert_err!(tasks.delete_task("VIP888").await);
    Ok(())
}

#[tokio::test]
async fn test_gift_code_records_are_unique_per_pair() -> Result<(), Error> {
    let db = fresh_db().await?;
    let codes = SqliteGiftCodeRepository::new(db.pool().clone());

    codes.save_gift_code_record("1001", "VIP888", GiftCodeStatus::AlreadyRedeemed, "already redeemed").await?;
    codes.save_gift_code_record("1001", "VIP888", GiftCodeStatus::Redeemed, "redeemed").await?;

    let records = codes.list_gift_codes_by_player("1001").await?;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, GiftCodeStatus::AlreadyRedeemed);
    assert!(!codes.is_gift_code_recorded("1002", "VIP888").await?);
    Ok(())
}

#[tokio::test]
async fn test_player_upsert_keeps_created_at() -> Result<(), Error> {
    let db = fresh_db().await?;
    let players = SqlitePlayerRepository::new(db.pool().clone());

    let mut first = PlayerProfile::new("2002", "Old", 1, "");
    first.created_at = Utc::now() - Duration::days(3);
    players.upsert_player(&first).await?;
    players.upsert_player(&PlayerProfile::new("2002", "New", 2, "https://a/b.png")).await?;
    players.upsert_player(&PlayerProfile::new("1001", "Other", 1, "")).await?;

    let stored = players.get_player("2002").await?.expect("player exists");
    assert_eq!(stored.nickname, "New");
    assert_eq!(stored.kingdom_id, 2);
    assert_eq!(stored.created_at.timestamp_millis(), first.created_at.timestamp_millis());

    assert_eq!(players.list_known_player_ids().await?, vec!["1001".to_string(), "2002".to_string()]);
    assert_eq!(players.list_players().await?.len(), 2);
    assert!(players.get_player("9999").await?.is_none());
    Ok(())
}

#[tokio::test]
async fn test_notifications_newest_first_with_limit() -> Result<(), Error> {
    let db = fresh_db().await?;
    let repo = SqliteNotificationRepository::new(db.pool().clone());

    for i in 0..3 {
        let record = NotificationRecord {
            id: 0,
            channel: "wxpusher".into(),
            title: format!("t{}", i),
            content: "c".into(),
            result: "ok".into(),
            status: NotificationStatus::Success,
            created_at: Utc::now() + Duration::seconds(i),
        };
        assert!(repo.save_notification(&record).await? > 0);
    }

    let listed = repo.list_notifications(2).await?;
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].title, "t2");
    assert_eq!(listed[1].title, "t1");
    Ok(())
}

#[tokio::test]
async fn test_database_ping() -> Result<(), Error> {
    let db = fresh_db().await?;
    db.ping().await?;
    db.close().await;
    Ok(())
}
