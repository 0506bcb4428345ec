use log::*;
use sqlx::{migrate::MigrateDatabase, Sqlite};
use bank_payment_engine::SqliteDatabase;

pub fn random_db_path() -> String {
    let dir = std::env::temp_dir();
    format!("sqlite://{}/bpg_test_store_{}.db", dir.display(), rand::random::<u64>())
}

/// Creates a fresh, migrated database at a random location.
pub async fn prepare_test_env() -> SqliteDatabase {
    dotenvy::from_filename(".env.test").ok();
    let _ = env_logger::try_init();
    let url = random_db_path();
    let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database");
    db.migrate().await.expect("Error running DB migrations");
    debug!("🚀️ Created test database {url}");
    db
}

pub async fn tear_down(mut db: SqliteDatabase) {
    let url = db.url().to_string();
    if let Err(e) = db.close().await {
        error!("🚀️ Failed to close database: {e}");
    }
    if let Err(e) = Sqlite::drop_database(&url).await {
        warn!("🚀️ Could not remove test database {url}: {e}");
    }
}
