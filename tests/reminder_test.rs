//! Reminder engine properties: cancellation scoping, the retry budget and
//! the sweep worker's replied-client check.

mod common;

use sqlx::PgPool;
use support_core::config::ReminderConfig;
use support_core::constants::ReminderType;
use support_core::models::{Message, NewMessage, Reminder};
use support_core::reminders::{ReminderService, ReminderWorker};
use support_core::MessageType;
use uuid::Uuid;

async fn insert_user_message(pool: &PgPool, client_id: &str, content: &str) -> Message {
    let mut tx = pool.begin().await.unwrap();
    let message = Message::create(
        &mut tx,
        NewMessage {
            client_id: client_id.to_string(),
            content: content.to_string(),
            message_type: MessageType::User,
            is_first_message: false,
        },
    )
    .await
    .unwrap();
    tx.commit().await.unwrap();
    message
}

async fn make_due(pool: &PgPool, reminder_id: Uuid) {
    sqlx::query("UPDATE reminders SET scheduled_at = NOW() - INTERVAL '1 minute' WHERE id = $1")
        .bind(reminder_id)
        .execute(pool)
        .await
        .unwrap();
}

#[sqlx::test(migrations = "./migrations")]
async fn cancellation_after_m1_spares_m1s_own_reminder(pool: PgPool) {
    let service = ReminderService::new(pool.clone(), ReminderConfig::default());

    let m1 = insert_user_message(&pool, "client-1", "first question").await;
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    let m2 = insert_user_message(&pool, "client-1", "second question").await;

    let r1 = service
        .create("client-1", m1.id, ReminderType::Reminder15Min)
        .await
        .unwrap();
    let r2 = service
        .create("client-1", m2.id, ReminderType::Reminder15Min)
        .await
        .unwrap();

    let cancelled = service.cancel("client-1", Some(m1.id)).await.unwrap();
    assert_eq!(cancelled, 1);

    let r1 = Reminder::find_by_id(&pool, r1.id).await.unwrap().unwrap();
    let r2 = Reminder::find_by_id(&pool, r2.id).await.unwrap().unwrap();
    assert!(!r1.is_cancelled);
    assert!(r2.is_cancelled);
}

#[sqlx::test(migrations = "./migrations")]
async fn unscoped_cancellation_clears_everything_pending(pool: PgPool) {
    let service = ReminderService::new(pool.clone(), ReminderConfig::default());
    let m1 = insert_user_message(&pool, "client-1", "question").await;

    service.create_followups("client-1", m1.id).await.unwrap();
    assert_eq!(service.pending("client-1").await.unwrap().len(), 3);

    let cancelled = service.cancel("client-1", None).await.unwrap();
    assert_eq!(cancelled, 3);
    assert!(service.pending("client-1").await.unwrap().is_empty());
}

#[sqlx::test(migrations = "./migrations")]
async fn non_retryable_failure_is_terminal_immediately(pool: PgPool) {
    let service = ReminderService::new(pool.clone(), ReminderConfig::default());
    let m1 = insert_user_message(&pool, "client-1", "question").await;
    let reminder = service
        .create("client-1", m1.id, ReminderType::Reminder15Min)
        .await
        .unwrap();

    let terminal = service.record_failure(reminder.id, false).await.unwrap();
    assert!(terminal);

    let reminder = Reminder::find_by_id(&pool, reminder.id).await.unwrap().unwrap();
    assert!(reminder.is_cancelled);
    assert!(reminder.is_terminal());
}

#[sqlx::test(migrations = "./migrations")]
async fn retry_budget_exhaustion_cancels_the_reminder(pool: PgPool) {
    let service = ReminderService::new(pool.clone(), ReminderConfig::default());
    let m1 = insert_user_message(&pool, "client-1", "question").await;
    let reminder = service
        .create("client-1", m1.id, ReminderType::Reminder15Min)
        .await
        .unwrap();

    assert!(!service.record_failure(reminder.id, true).await.unwrap());
    assert!(!service.record_failure(reminder.id, true).await.unwrap());
    assert!(service.record_failure(reminder.id, true).await.unwrap());

    let reminder = Reminder::find_by_id(&pool, reminder.id).await.unwrap().unwrap();
    assert_eq!(reminder.failed_attempts, 3);
    assert!(reminder.is_cancelled);
}

#[sqlx::test(migrations = "./migrations")]
async fn sweep_cancels_reminders_for_clients_who_replied(pool: PgPool) {
    let service = ReminderService::new(pool.clone(), ReminderConfig::default());
    let m1 = insert_user_message(&pool, "client-1", "question").await;
    let reminder = service
        .create("client-1", m1.id, ReminderType::Reminder15Min)
        .await
        .unwrap();
    make_due(&pool, reminder.id).await;

    // The client wrote again after the reminder was created
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    insert_user_message(&pool, "client-1", "never mind, solved it").await;

    let config = common::test_config();
    let worker = ReminderWorker::new(
        pool.clone(),
        ReminderConfig::default(),
        common::delivery_service(&config),
        common::renderer(),
    );
    let outcome = worker.sweep_once().await.unwrap();

    assert_eq!(outcome.cancelled, 1);
    assert_eq!(outcome.sent, 0);
    let reminder = Reminder::find_by_id(&pool, reminder.id).await.unwrap().unwrap();
    assert!(reminder.is_cancelled);
}

#[sqlx::test(migrations = "./migrations")]
async fn sweep_commits_each_reminder_independently(pool: PgPool) {
    let service = ReminderService::new(pool.clone(), ReminderConfig::default());

    // One reminder that will be cancelled (the client replied) and one that
    // will fail delivery (no channel on record)
    let m1 = insert_user_message(&pool, "replied-client", "question").await;
    let r1 = service
        .create("replied-client", m1.id, ReminderType::Reminder15Min)
        .await
        .unwrap();
    make_due(&pool, r1.id).await;
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    insert_user_message(&pool, "replied-client", "figured it out").await;

    let m2 = insert_user_message(&pool, "silent-client", "other question").await;
    let r2 = service
        .create("silent-client", m2.id, ReminderType::Reminder15Min)
        .await
        .unwrap();
    make_due(&pool, r2.id).await;

    let config = common::test_config();
    let worker = ReminderWorker::new(
        pool.clone(),
        ReminderConfig::default(),
        common::delivery_service(&config),
        common::renderer(),
    );
    let outcome = worker.sweep_once().await.unwrap();

    // Each reminder gets its own transaction, so both dispositions land even
    // though one of the deliveries failed
    assert_eq!(outcome.cancelled, 1);
    assert_eq!(outcome.failed, 1);
    let r1 = Reminder::find_by_id(&pool, r1.id).await.unwrap().unwrap();
    let r2 = Reminder::find_by_id(&pool, r2.id).await.unwrap().unwrap();
    assert!(r1.is_cancelled);
    assert!(r2.failed_attempts >= 1);
}

#[sqlx::test(migrations = "./migrations")]
async fn sweep_records_failure_when_no_channel_exists(pool: PgPool) {
    let service = ReminderService::new(pool.clone(), ReminderConfig::default());
    let m1 = insert_user_message(&pool, "silent-client", "question").await;
    let reminder = service
        .create("silent-client", m1.id, ReminderType::Reminder15Min)
        .await
        .unwrap();
    make_due(&pool, reminder.id).await;

    let config = common::test_config();
    let worker = ReminderWorker::new(
        pool.clone(),
        ReminderConfig::default(),
        common::delivery_service(&config),
        common::renderer(),
    );
    let outcome = worker.sweep_once().await.unwrap();

    // No webhook endpoint is a non-retryable failure, so the reminder is
    // terminally cancelled
    assert_eq!(outcome.failed, 1);
    let reminder = Reminder::find_by_id(&pool, reminder.id).await.unwrap().unwrap();
    assert!(reminder.is_cancelled);
}
