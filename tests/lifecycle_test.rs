//! Dialog lifecycle scenario: open → farewell → close → reopen, with the
//! farewell duplicate guards and idempotent manual operations.

mod common;

use std::sync::Arc;

use sqlx::PgPool;
use support_core::config::DialogConfig;
use support_core::lifecycle::DialogLifecycle;
use support_core::models::ChatSession;
use support_core::DialogState;

fn lifecycle(pool: PgPool) -> DialogLifecycle {
    let config = common::test_config();
    DialogLifecycle::new(
        pool,
        DialogConfig::default(),
        common::delivery_service(&config),
        common::renderer(),
    )
}

async fn backdate_activity(pool: &PgPool, client_id: &str, minutes: i64) {
    sqlx::query(
        "UPDATE chat_sessions SET last_activity_at = NOW() - ($2 * INTERVAL '1 minute') \
         WHERE client_id = $1",
    )
    .bind(client_id)
    .bind(minutes)
    .execute(pool)
    .await
    .unwrap();
}

async fn backdate_farewell(pool: &PgPool, client_id: &str, minutes: i64) {
    sqlx::query(
        "UPDATE chat_sessions SET farewell_sent_at = NOW() - ($2 * INTERVAL '1 minute') \
         WHERE client_id = $1",
    )
    .bind(client_id)
    .bind(minutes)
    .execute(pool)
    .await
    .unwrap();
}

async fn session(pool: &PgPool, client_id: &str) -> ChatSession {
    ChatSession::find_by_client(pool, client_id)
        .await
        .unwrap()
        .unwrap()
}

#[sqlx::test(migrations = "./migrations")]
async fn full_lifecycle_open_farewell_close_reopen(pool: PgPool) {
    let lifecycle = lifecycle(pool.clone());

    lifecycle
        .update_activity("client-1", &common::channel())
        .await
        .unwrap();
    assert_eq!(session(&pool, "client-1").await.state(), DialogState::Open);

    // Past the farewell threshold but the farewell is fresh, so no close yet
    backdate_activity(&pool, "client-1", 10).await;
    let first = lifecycle.process_inactive_sessions().await.unwrap();
    assert_eq!(first.farewells_sent, 1);
    assert_eq!(first.dialogs_closed, 0);

    let s = session(&pool, "client-1").await;
    assert!(s.farewell_sent_at.is_some());
    assert_eq!(s.state(), DialogState::Open);

    // Once the farewell has stood for its window, the dialog closes
    backdate_farewell(&pool, "client-1", 2).await;
    let second = lifecycle.process_inactive_sessions().await.unwrap();
    assert_eq!(second.farewells_sent, 0);
    assert_eq!(second.dialogs_closed, 1);

    let s = session(&pool, "client-1").await;
    assert_eq!(s.state(), DialogState::Closed);
    assert!(s.closed_at.is_some());

    // New activity reopens with the lifecycle stamps cleared
    lifecycle
        .update_activity("client-1", &common::channel())
        .await
        .unwrap();
    let s = session(&pool, "client-1").await;
    assert_eq!(s.state(), DialogState::Open);
    assert!(s.closed_at.is_none());
    assert!(s.farewell_sent_at.is_none());
}

#[sqlx::test(migrations = "./migrations")]
async fn farewell_is_sent_exactly_once(pool: PgPool) {
    let lifecycle = lifecycle(pool.clone());

    lifecycle
        .update_activity("client-1", &common::channel())
        .await
        .unwrap();
    backdate_activity(&pool, "client-1", 10).await;

    let first = lifecycle.process_inactive_sessions().await.unwrap();
    let second = lifecycle.process_inactive_sessions().await.unwrap();
    assert_eq!(first.farewells_sent, 1);
    assert_eq!(second.farewells_sent, 0);

    let (count,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM messages WHERE client_id = $1 AND message_type = 'bot_auto'",
    )
    .bind("client-1")
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(count, 1);
}

#[sqlx::test(migrations = "./migrations")]
async fn concurrent_sweeps_send_one_farewell(pool: PgPool) {
    let lifecycle = Arc::new(lifecycle(pool.clone()));

    lifecycle
        .update_activity("client-1", &common::channel())
        .await
        .unwrap();
    backdate_activity(&pool, "client-1", 10).await;

    let a = {
        let lifecycle = Arc::clone(&lifecycle);
        tokio::spawn(async move { lifecycle.process_inactive_sessions().await })
    };
    let b = {
        let lifecycle = Arc::clone(&lifecycle);
        tokio::spawn(async move { lifecycle.process_inactive_sessions().await })
    };

    let sent = a.await.unwrap().unwrap().farewells_sent + b.await.unwrap().unwrap().farewells_sent;
    assert_eq!(sent, 1);
}

#[sqlx::test(migrations = "./migrations")]
async fn active_sessions_are_left_alone(pool: PgPool) {
    let lifecycle = lifecycle(pool.clone());

    lifecycle
        .update_activity("client-1", &common::channel())
        .await
        .unwrap();

    let outcome = lifecycle.process_inactive_sessions().await.unwrap();
    assert_eq!(outcome.farewells_sent, 0);
    assert_eq!(outcome.dialogs_closed, 0);
    assert_eq!(session(&pool, "client-1").await.state(), DialogState::Open);
}

#[sqlx::test(migrations = "./migrations")]
async fn manual_close_is_idempotent(pool: PgPool) {
    let lifecycle = lifecycle(pool.clone());

    lifecycle
        .update_activity("client-1", &common::channel())
        .await
        .unwrap();

    assert!(lifecycle.close_dialog("client-1").await.unwrap());
    assert!(!lifecycle.close_dialog("client-1").await.unwrap());
    assert_eq!(session(&pool, "client-1").await.state(), DialogState::Closed);

    let reopened = lifecycle.reopen_dialog("client-1").await.unwrap();
    assert_eq!(reopened.state(), DialogState::Open);
}
