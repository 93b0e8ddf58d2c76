use rocket_db_pools::{Database, sqlx};

#[derive(Database)]
#[database("crm_db")]
pub struct CrmDb(sqlx::SqlitePool);

/// Embedded schema migrations, applied from an ignite fairing before the
/// server accepts traffic.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
