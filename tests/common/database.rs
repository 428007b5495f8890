//! Test database utilities

use anyhow::Result;
use etf_watchtower::database::DatabaseManager;
use tempfile::TempDir;

/// A database file in its own temporary directory, removed on drop
pub struct TestDatabase {
    pub db: DatabaseManager,
    pub path: String,
    _dir: TempDir,
}

/// Create a fresh on-disk database (WAL mode, same setup as the binary)
pub async fn init_fresh_test_database() -> Result<TestDatabase> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("watchtower_test.db").to_string_lossy().to_string();
    let db = DatabaseManager::new(&path).await?;

    Ok(TestDatabase { db, path, _dir: dir })
}
