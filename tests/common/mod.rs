//! Common test utilities

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Setup test database - truncate tables and reset the sync checkpoint
pub async fn setup_test_db() -> PgPool {
    dotenvy::dotenv().ok();
    let database_url =
        std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for tests");

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("Failed to connect to DB");

    let mut tx = pool.begin().await.expect("Failed to begin transaction");

    // Clean up DB for fresh state
    sqlx::query("TRUNCATE TABLE events, users, user_projections CASCADE")
        .execute(&mut *tx)
        .await
        .expect("Failed to clean up DB");

    // Reset the sync checkpoint
    sqlx::query(
        r#"
        INSERT INTO projection_checkpoints (
            projection_name, last_global_seq, total_events_processed,
            error_count, last_error
        )
        VALUES ('user', 0, 0, 0, NULL)
        ON CONFLICT (projection_name) DO UPDATE SET
            last_global_seq = 0,
            total_events_processed = 0,
            error_count = 0,
            last_error = NULL
        "#,
    )
    .execute(&mut *tx)
    .await
    .expect("Failed to reset checkpoint");

    tx.commit().await.expect("Failed to commit transaction");

    pool
}
