use crm_server::test_support::TestDatabase;
use sqlx::migrate::Migrator;

static TEST_MIGRATOR: Migrator = sqlx::migrate!("./migrations");

#[tokio::test]
async fn migrations_apply_cleanly_and_rerun_idempotently() {
    let test_db = TestDatabase::new().await.expect("test database");

    // TestDatabase::new already ran the migrator once; a second run must be
    // a no-op rather than an error.
    TEST_MIGRATOR
        .run(test_db.pool())
        .await
        .expect("migrations rerun");

    let tables: i64 = sqlx::query_scalar(
        r#"SELECT COUNT(*) FROM sqlite_master
           WHERE type = 'table'
             AND name IN ('customers', 'contacts', 'tasks', 'deals', 'reminders',
                          'activities', 'leads', 'campaigns', 'campaign_steps',
                          'segments', 'campaign_logs')"#,
    )
    .fetch_one(test_db.pool())
    .await
    .expect("lookup succeeded");

    assert_eq!(tables, 11, "every CRM table should exist after migration");

    test_db.close().await;
}
