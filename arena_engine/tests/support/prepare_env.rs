use log::*;
use sqlx::{migrate::MigrateDatabase, Sqlite};

use arena_engine::SqliteDatabase;

/// Creates a fresh, migrated database at a random path in the system temp dir and returns a
/// handle to it.
pub async fn prepare_test_db() -> SqliteDatabase {
    dotenvy::from_filename(".env.test").ok();
    let _ = env_logger::try_init();
    debug!("🚀️ Logging initialised");
    let url = random_db_path();
    create_database(&url).await;
    let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating connection to database");
    db.run_migrations().await.expect("Error running DB migrations");
    info!("🚀️ Migrations complete for {url}");
    db
}

pub fn random_db_path() -> String {
    let dir = std::env::temp_dir().join(format!("arena_test_store_{}.db", rand::random::<u64>()));
    format!("sqlite://{}", dir.display())
}

async fn create_database(url: &str) {
    if let Err(e) = Sqlite::drop_database(url).await {
        warn!("Error dropping database {url}: {e:?}");
    }
    Sqlite::create_database(url).await.expect("Error creating database");
    info!("🚀️ Created Sqlite database {url}");
}
