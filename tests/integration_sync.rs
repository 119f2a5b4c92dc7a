//! Integration tests for the projection sync engine

use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;
use uuid::Uuid;

use user_registry::bus::EventBus;
use user_registry::domain::{EventMetadata, ProfileChanges, UserStatus};
use user_registry::event_store::EventStore;
use user_registry::handlers::{
    ChangeStatusCommand, ChangeStatusHandler, DeleteUserCommand, DeleteUserHandler,
    RecordLoginCommand, RecordLoginHandler, RegisterUserCommand, RegisterUserHandler,
    UpdateProfileCommand, UpdateProfileHandler, VerifyEmailCommand, VerifyEmailHandler,
};
use user_registry::projection::{
    CheckpointStore, ProjectionStore, SyncEngine, SyncError, PROJECTION_NAME,
};
use user_registry::repository::UserRepository;

mod common;

fn engine(pool: &PgPool) -> SyncEngine {
    SyncEngine::new(
        EventStore::new(pool.clone()),
        ProjectionStore::new(pool.clone()),
        CheckpointStore::new(pool.clone()),
        50,
        Duration::from_secs(30),
    )
}

fn register_command(email: &str) -> RegisterUserCommand {
    RegisterUserCommand::new(
        email.to_string(),
        "$argon2$stub".to_string(),
        "Alice".to_string(),
        "Smith".to_string(),
    )
    .with_phone("+15550100".to_string())
}

async fn register(pool: &PgPool, email: &str) -> Uuid {
    let repository = UserRepository::new(pool.clone(), EventBus::new());
    let handler = RegisterUserHandler::new(repository);
    handler
        .execute(register_command(email), &EventMetadata::new())
        .await
        .unwrap()
        .user_id
}

#[tokio::test]
async fn test_catch_up_builds_projection_from_registration() {
    let pool = common::setup_test_db().await;
    let user_id = register(&pool, "alice@example.com").await;

    let engine = engine(&pool);
    let projections = ProjectionStore::new(pool.clone());

    let report = engine.catch_up().await.unwrap();
    assert_eq!(report.applied, 1);

    let row = projections.get(user_id).await.unwrap().unwrap();
    assert_eq!(row.email, "alice@example.com");
    assert_eq!(row.display_name, "Alice Smith");
    assert_eq!(row.status, "pending_verification");
    assert_eq!(row.login_count, 0);
    assert_eq!(row.profile_completion, 100);
    assert_eq!(row.last_applied_event_version, 1);
}

#[tokio::test]
async fn test_verification_advances_status_and_watermark() {
    let pool = common::setup_test_db().await;
    let user_id = register(&pool, "bob@example.com").await;

    let repository = UserRepository::new(pool.clone(), EventBus::new());
    VerifyEmailHandler::new(repository)
        .execute(VerifyEmailCommand { user_id }, &EventMetadata::new())
        .await
        .unwrap();

    let engine = engine(&pool);
    let report = engine.catch_up().await.unwrap();
    assert_eq!(report.applied, 2);

    let row = ProjectionStore::new(pool.clone())
        .get(user_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.status, "accepted");
    assert_eq!(row.last_applied_event_version, 2);
}

#[tokio::test]
async fn test_login_counters_and_replay_idempotence() {
    let pool = common::setup_test_db().await;
    let user_id = register(&pool, "carol@example.com").await;

    let repository = UserRepository::new(pool.clone(), EventBus::new());
    let login = RecordLoginHandler::new(repository);
    let metadata = EventMetadata::new();

    login
        .execute(RecordLoginCommand::failure(user_id), &metadata)
        .await
        .unwrap();
    login
        .execute(RecordLoginCommand::failure(user_id), &metadata)
        .await
        .unwrap();
    login
        .execute(RecordLoginCommand::success(user_id), &metadata)
        .await
        .unwrap();

    let engine = engine(&pool);
    engine.catch_up().await.unwrap();

    let projections = ProjectionStore::new(pool.clone());
    let row = projections.get(user_id).await.unwrap().unwrap();
    assert_eq!(row.login_count, 1);
    // Success resets the failed-attempt counter
    assert_eq!(row.failed_login_attempts, 0);
    assert!(row.last_login_at.is_some());

    // Force redelivery of the whole log by rewinding the checkpoint;
    // watermarked writes must not double-count
    sqlx::query("UPDATE projection_checkpoints SET last_global_seq = 0 WHERE projection_name = $1")
        .bind(PROJECTION_NAME)
        .execute(&pool)
        .await
        .unwrap();

    let report = engine.catch_up().await.unwrap();
    assert_eq!(report.applied, 0);
    assert_eq!(report.skipped, 4);

    let row = projections.get(user_id).await.unwrap().unwrap();
    assert_eq!(row.login_count, 1);
    assert_eq!(row.failed_login_attempts, 0);
}

#[tokio::test]
async fn test_profile_update_recombines_display_name() {
    let pool = common::setup_test_db().await;
    let user_id = register(&pool, "dave@example.com").await;

    let repository = UserRepository::new(pool.clone(), EventBus::new());
    UpdateProfileHandler::new(repository)
        .execute(
            UpdateProfileCommand {
                user_id,
                changes: ProfileChanges {
                    last_name: Some("Wonder".to_string()),
                    ..Default::default()
                },
            },
            &EventMetadata::new(),
        )
        .await
        .unwrap();

    let engine = engine(&pool);
    engine.catch_up().await.unwrap();

    let row = ProjectionStore::new(pool.clone())
        .get(user_id)
        .await
        .unwrap()
        .unwrap();
    // Unchanged first name survives the merge
    assert_eq!(row.first_name, "Alice");
    assert_eq!(row.last_name, "Wonder");
    assert_eq!(row.display_name, "Alice Wonder");
    assert_eq!(row.profile_completion, 100);
}

#[tokio::test]
async fn test_delete_soft_deletes_projection() {
    let pool = common::setup_test_db().await;
    let user_id = register(&pool, "erin@example.com").await;

    let repository = UserRepository::new(pool.clone(), EventBus::new());
    DeleteUserHandler::new(repository)
        .execute(DeleteUserCommand { user_id }, &EventMetadata::new())
        .await
        .unwrap();

    let engine = engine(&pool);
    engine.catch_up().await.unwrap();

    let projections = ProjectionStore::new(pool.clone());
    let row = projections.get(user_id).await.unwrap().unwrap();
    assert!(row.deleted_at.is_some());
    assert_eq!(row.status, "blocked");

    // Deleted users drop out of email and status listings
    assert!(projections
        .get_by_email("erin@example.com")
        .await
        .unwrap()
        .is_none());
    let blocked = projections.find_by_status("blocked", 10, 0).await.unwrap();
    assert!(blocked.is_empty());
}

#[tokio::test]
async fn test_checkpoint_tracks_progress() {
    let pool = common::setup_test_db().await;
    register(&pool, "frank@example.com").await;
    let user_id = register(&pool, "grace@example.com").await;

    let repository = UserRepository::new(pool.clone(), EventBus::new());
    ChangeStatusHandler::new(repository)
        .execute(
            ChangeStatusCommand::new(user_id, UserStatus::Suspended)
                .with_reason("abuse report".to_string()),
            &EventMetadata::new(),
        )
        .await
        .unwrap();

    let engine = engine(&pool);
    engine.catch_up().await.unwrap();

    let checkpoints = CheckpointStore::new(pool.clone());
    let checkpoint = checkpoints.load(PROJECTION_NAME).await.unwrap().unwrap();
    assert_eq!(checkpoint.total_events_processed, 3);
    assert_eq!(checkpoint.error_count, 0);
    assert!(checkpoint.last_error.is_none());
    assert!(checkpoint.last_run_at.is_some());

    // Cursor sits at the newest event
    let max_seq: i64 = sqlx::query_scalar("SELECT MAX(global_seq) FROM events")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(checkpoint.last_global_seq, max_seq);

    // An idle run moves nothing but refreshes last_run_at
    let report = engine.catch_up().await.unwrap();
    assert_eq!(report.processed(), 0);
    let idle = checkpoints.load(PROJECTION_NAME).await.unwrap().unwrap();
    assert_eq!(idle.last_global_seq, checkpoint.last_global_seq);
    assert_eq!(idle.total_events_processed, 3);
}

#[tokio::test]
async fn test_rebuild_reconstructs_identical_projection() {
    let pool = common::setup_test_db().await;
    let user_id = register(&pool, "heidi@example.com").await;

    let repository = UserRepository::new(pool.clone(), EventBus::new());
    VerifyEmailHandler::new(repository.clone())
        .execute(VerifyEmailCommand { user_id }, &EventMetadata::new())
        .await
        .unwrap();
    RecordLoginHandler::new(repository)
        .execute(RecordLoginCommand::success(user_id), &EventMetadata::new())
        .await
        .unwrap();

    let engine = engine(&pool);
    engine.catch_up().await.unwrap();

    let projections = ProjectionStore::new(pool.clone());
    let before = projections.get(user_id).await.unwrap().unwrap();

    // Corrupt the row, then rebuild from the log
    sqlx::query("UPDATE user_projections SET login_count = 999, status = 'blocked' WHERE id = $1")
        .bind(user_id)
        .execute(&pool)
        .await
        .unwrap();

    let report = engine.rebuild().await.unwrap();
    assert_eq!(report.applied, 3);

    let after = projections.get(user_id).await.unwrap().unwrap();
    assert_eq!(after.status, before.status);
    assert_eq!(after.login_count, before.login_count);
    assert_eq!(after.last_applied_event_version, before.last_applied_event_version);

    // Rebuild resets the processed total to this replay
    let checkpoint = CheckpointStore::new(pool.clone())
        .load(PROJECTION_NAME)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(checkpoint.total_events_processed, 3);
}

#[tokio::test]
async fn test_unknown_event_type_is_skipped_and_checkpointed() {
    let pool = common::setup_test_db().await;
    let user_id = register(&pool, "ivan@example.com").await;

    // An event type this consumer does not know yet
    sqlx::query(
        r#"
        INSERT INTO events (aggregate_type, aggregate_id, version, event_type, event_data, metadata, occurred_at)
        VALUES ('User', $1, 2, 'UserAvatarChanged', '{"type": "UserAvatarChanged"}', '{}', NOW())
        "#,
    )
    .bind(user_id)
    .execute(&pool)
    .await
    .unwrap();

    let engine = engine(&pool);
    let report = engine.catch_up().await.unwrap();
    assert_eq!(report.applied, 1);
    assert_eq!(report.skipped, 1);

    // The checkpoint moved past the unknown event
    let checkpoint = CheckpointStore::new(pool.clone())
        .load(PROJECTION_NAME)
        .await
        .unwrap()
        .unwrap();
    let max_seq: i64 = sqlx::query_scalar("SELECT MAX(global_seq) FROM events")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(checkpoint.last_global_seq, max_seq);
}

#[tokio::test]
async fn test_malformed_payload_halts_run_and_records_failure() {
    let pool = common::setup_test_db().await;
    let user_id = register(&pool, "judy@example.com").await;

    // Known type, garbage payload: the log and the code disagree
    sqlx::query(
        r#"
        INSERT INTO events (aggregate_type, aggregate_id, version, event_type, event_data, metadata, occurred_at)
        VALUES ('User', $1, 2, 'UserLoginSuccess', '{"type": "UserLoginSuccess"}', '{}', NOW())
        "#,
    )
    .bind(user_id)
    .execute(&pool)
    .await
    .unwrap();

    let engine = engine(&pool);
    let result = engine.catch_up().await;
    assert!(result.is_err());

    let checkpoint = CheckpointStore::new(pool.clone())
        .load(PROJECTION_NAME)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(checkpoint.error_count, 1);
    assert!(checkpoint.last_error.is_some());
    // The registration before the bad event was applied and checkpointed;
    // the cursor stops just before the bad event
    assert_eq!(checkpoint.total_events_processed, 1);
    let bad_seq: i64 =
        sqlx::query_scalar("SELECT MAX(global_seq) FROM events WHERE aggregate_id = $1")
            .bind(user_id)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert!(checkpoint.last_global_seq < bad_seq);
}

#[tokio::test]
async fn test_overlapping_runs_are_skipped_and_rebuild_rejected() {
    let pool = common::setup_test_db().await;
    register(&pool, "leo@example.com").await;

    let engine = Arc::new(engine(&pool));

    // Hold an exclusive lock on the event log so the first run takes the
    // guard and then blocks on its event query
    let mut tx = pool.begin().await.unwrap();
    sqlx::query("LOCK TABLE events IN ACCESS EXCLUSIVE MODE")
        .execute(&mut *tx)
        .await
        .unwrap();

    let blocked = Arc::clone(&engine);
    let handle = tokio::spawn(async move { blocked.catch_up().await });

    // Wait until the spawned run owns the guard
    let mut waited = 0;
    while !engine.status().await.unwrap().syncing {
        waited += 1;
        assert!(waited < 500, "sync run never started");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    // A second catch-up is skipped, not queued
    let report = engine.catch_up().await.unwrap();
    assert_eq!(report.processed(), 0);

    // A rebuild against a busy engine fails fast
    assert!(matches!(
        engine.rebuild().await.unwrap_err(),
        SyncError::SyncInProgress
    ));

    // Release the lock; the original run completes normally
    drop(tx);
    let first = handle.await.unwrap().unwrap();
    assert_eq!(first.applied, 1);
    assert!(!engine.status().await.unwrap().syncing);
}

#[tokio::test]
async fn test_crash_resume_skips_already_applied_events() {
    let pool = common::setup_test_db().await;
    let user_id = register(&pool, "kate@example.com").await;

    let repository = UserRepository::new(pool.clone(), EventBus::new());
    let login = RecordLoginHandler::new(repository);
    login
        .execute(RecordLoginCommand::success(user_id), &EventMetadata::new())
        .await
        .unwrap();
    login
        .execute(RecordLoginCommand::success(user_id), &EventMetadata::new())
        .await
        .unwrap();

    let engine = engine(&pool);
    engine.catch_up().await.unwrap();

    // Simulate a crash between projection write and checkpoint advance:
    // rewind the cursor by one event
    let second_seq: i64 = sqlx::query_scalar(
        "SELECT global_seq FROM events ORDER BY global_seq DESC LIMIT 1 OFFSET 1",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    sqlx::query("UPDATE projection_checkpoints SET last_global_seq = $1 WHERE projection_name = $2")
        .bind(second_seq)
        .bind(PROJECTION_NAME)
        .execute(&pool)
        .await
        .unwrap();

    let report = engine.catch_up().await.unwrap();
    assert_eq!(report.applied, 0);
    assert_eq!(report.skipped, 1);

    let row = ProjectionStore::new(pool.clone())
        .get(user_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.login_count, 2);
}
