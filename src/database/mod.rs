use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use std::str::FromStr;
use tracing::{debug, info, warn};

use crate::models::{DatabaseStats, FetchOutcome, FetchRun, Holding, HoldingsSnapshot, Provider};

/// SQLite store for holdings snapshots and the job run log
#[derive(Clone)]
pub struct DatabaseManager {
    pool: SqlitePool,
}

impl DatabaseManager {
    /// Open (or create) the database file and make sure the schema exists
    pub async fn new(database_path: &str) -> Result<Self> {
        let path = database_path.strip_prefix("sqlite:").unwrap_or(database_path);

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .acquire_timeout(std::time::Duration::from_secs(30))
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.create_schema().await?;
        info!("💾 Database initialized at {}", path);
        Ok(db)
    }

    /// Private in-memory database, used by tests and dry runs
    pub async fn in_memory() -> Result<Self> {
        // A single long-lived connection: every in-memory connection is its own database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(SqliteConnectOptions::from_str("sqlite::memory:")?)
            .await?;

        let db = Self { pool };
        db.create_schema().await?;
        Ok(db)
    }

    async fn create_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS etf_holdings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                etf_ticker TEXT NOT NULL,
                as_of_date DATE NOT NULL,
                holding_ticker TEXT NOT NULL,
                holding_name TEXT,
                shares REAL NOT NULL,
                provider TEXT NOT NULL,
                ingested_at DATETIME NOT NULL,
                UNIQUE(etf_ticker, as_of_date, holding_ticker)
            )
            "#
        ).execute(&self.pool).await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_etf_holdings_etf_date ON etf_holdings(etf_ticker, as_of_date)"
        ).execute(&self.pool).await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS fetch_runs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                etf_ticker TEXT NOT NULL,
                started_at DATETIME NOT NULL,
                finished_at DATETIME NOT NULL,
                outcome TEXT NOT NULL,
                as_of_date DATE,
                rows_stored INTEGER NOT NULL DEFAULT 0,
                error TEXT
            )
            "#
        ).execute(&self.pool).await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS metadata (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#
        ).execute(&self.pool).await?;

        Ok(())
    }

    /// Store a snapshot, replacing any rows already stored for the same
    /// (etf_ticker, as_of_date). Returns the number of rows now stored.
    pub async fn upsert_snapshot(&self, snapshot: &HoldingsSnapshot, provider: Provider) -> Result<i64> {
        if snapshot.is_empty() {
            warn!("{} {}: empty snapshot clears any stored rows", snapshot.etf_ticker, snapshot.as_of_date);
        }

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let replaced = sqlx::query("DELETE FROM etf_holdings WHERE etf_ticker = ? AND as_of_date = ?")
            .bind(&snapshot.etf_ticker)
            .bind(snapshot.as_of_date)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        for holding in &snapshot.holdings {
            // Repeated tickers inside one snapshot accumulate
            sqlx::query(
                r#"
                INSERT INTO etf_holdings (etf_ticker, as_of_date, holding_ticker, holding_name, shares, provider, ingested_at)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(etf_ticker, as_of_date, holding_ticker) DO UPDATE SET
                    holding_name = COALESCE(etf_holdings.holding_name, excluded.holding_name),
                    shares = etf_holdings.shares + excluded.shares,
                    ingested_at = excluded.ingested_at
                "#
            )
            .bind(&snapshot.etf_ticker)
            .bind(snapshot.as_of_date)
            .bind(&holding.ticker)
            .bind(&holding.name)
            .bind(holding.shares)
            .bind(provider.as_str())
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        let stored = sqlx::query("SELECT COUNT(*) as count FROM etf_holdings WHERE etf_ticker = ? AND as_of_date = ?")
            .bind(&snapshot.etf_ticker)
            .bind(snapshot.as_of_date)
            .fetch_one(&mut *tx)
            .await?
            .get::<i64, _>("count");

        tx.commit().await?;

        if replaced > 0 {
            debug!("{} {}: replaced {} existing rows", snapshot.etf_ticker, snapshot.as_of_date, replaced);
        }
        Ok(stored)
    }

    /// Latest snapshot date on or before `target` for one ETF
    pub async fn resolve_as_of_date(&self, etf_ticker: &str, target: NaiveDate) -> Result<Option<NaiveDate>> {
        let row = sqlx::query(
            "SELECT MAX(as_of_date) as as_of_date FROM etf_holdings WHERE etf_ticker = ? AND as_of_date <= ?"
        )
        .bind(etf_ticker)
        .bind(target)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.try_get::<Option<NaiveDate>, _>("as_of_date")?)
    }

    /// Latest snapshot date on or before `target`, resolved separately for every ETF
    pub async fn resolve_as_of_dates(&self, target: NaiveDate) -> Result<Vec<(String, NaiveDate)>> {
        let rows = sqlx::query(
            r#"
            SELECT etf_ticker, MAX(as_of_date) as as_of_date
            FROM etf_holdings
            WHERE as_of_date <= ?
            GROUP BY etf_ticker
            ORDER BY etf_ticker
            "#
        )
        .bind(target)
        .fetch_all(&self.pool)
        .await?;

        let mut resolved = Vec::with_capacity(rows.len());
        for row in rows {
            resolved.push((
                row.try_get::<String, _>("etf_ticker")?,
                row.try_get::<NaiveDate, _>("as_of_date")?,
            ));
        }
        Ok(resolved)
    }

    /// Latest snapshot date strictly before `before` for one ETF
    pub async fn previous_snapshot_date(&self, etf_ticker: &str, before: NaiveDate) -> Result<Option<NaiveDate>> {
        let row = sqlx::query(
            "SELECT MAX(as_of_date) as as_of_date FROM etf_holdings WHERE etf_ticker = ? AND as_of_date < ?"
        )
        .bind(etf_ticker)
        .bind(before)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.try_get::<Option<NaiveDate>, _>("as_of_date")?)
    }

    /// Load the snapshot stored for exactly this (etf_ticker, date)
    pub async fn load_snapshot(&self, etf_ticker: &str, as_of_date: NaiveDate) -> Result<Option<HoldingsSnapshot>> {
        let rows = sqlx::query(
            r#"
            SELECT holding_ticker, holding_name, shares
            FROM etf_holdings
            WHERE etf_ticker = ? AND as_of_date = ?
            ORDER BY holding_ticker
            "#
        )
        .bind(etf_ticker)
        .bind(as_of_date)
        .fetch_all(&self.pool)
        .await?;

        if rows.is_empty() {
            return Ok(None);
        }

        let holdings = rows
            .into_iter()
            .map(|r| Holding {
                ticker: r.get::<String, _>("holding_ticker"),
                name: r.get::<Option<String>, _>("holding_name"),
                shares: r.get::<f64, _>("shares"),
            })
            .collect();

        Ok(Some(HoldingsSnapshot::new(etf_ticker, as_of_date, holdings)))
    }

    /// All snapshot dates for an ETF, newest first
    pub async fn list_snapshot_dates(&self, etf_ticker: &str) -> Result<Vec<NaiveDate>> {
        let rows = sqlx::query(
            "SELECT DISTINCT as_of_date FROM etf_holdings WHERE etf_ticker = ? ORDER BY as_of_date DESC"
        )
        .bind(etf_ticker)
        .fetch_all(&self.pool)
        .await?;

        let mut dates = Vec::with_capacity(rows.len());
        for row in rows {
            dates.push(row.try_get::<NaiveDate, _>("as_of_date")?);
        }
        Ok(dates)
    }

    /// ETFs with at least one stored snapshot
    pub async fn list_etfs(&self) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT DISTINCT etf_ticker FROM etf_holdings ORDER BY etf_ticker")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(|r| r.get::<String, _>("etf_ticker")).collect())
    }

    pub async fn snapshot_row_count(&self, etf_ticker: &str, as_of_date: NaiveDate) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM etf_holdings WHERE etf_ticker = ? AND as_of_date = ?")
            .bind(etf_ticker)
            .bind(as_of_date)
            .fetch_one(&self.pool)
            .await?;

        Ok(row.get::<i64, _>("count"))
    }

    /// Delete snapshots older than `cutoff`, optionally for a single ETF
    pub async fn prune_snapshots_before(&self, etf_ticker: Option<&str>, cutoff: NaiveDate) -> Result<u64> {
        let result = match etf_ticker {
            Some(etf) => {
                sqlx::query("DELETE FROM etf_holdings WHERE etf_ticker = ? AND as_of_date < ?")
                    .bind(etf)
                    .bind(cutoff)
                    .execute(&self.pool)
                    .await?
            }
            None => {
                sqlx::query("DELETE FROM etf_holdings WHERE as_of_date < ?")
                    .bind(cutoff)
                    .execute(&self.pool)
                    .await?
            }
        };

        info!("🗑️  Pruned {} holding rows before {}", result.rows_affected(), cutoff);
        Ok(result.rows_affected())
    }

    /// Append an entry to the job run log
    pub async fn record_fetch_run(&self, run: &FetchRun) -> Result<i64> {
        let row = sqlx::query(
            r#"
            INSERT INTO fetch_runs (etf_ticker, started_at, finished_at, outcome, as_of_date, rows_stored, error)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING id
            "#
        )
        .bind(&run.etf_ticker)
        .bind(run.started_at)
        .bind(run.finished_at)
        .bind(run.outcome.as_str())
        .bind(run.as_of_date)
        .bind(run.rows_stored)
        .bind(&run.error)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.get::<i64, _>("id"))
    }

    /// Most recent job run log entries, newest first
    pub async fn recent_fetch_runs(&self, limit: i64) -> Result<Vec<FetchRun>> {
        let rows = sqlx::query(
            r#"
            SELECT id, etf_ticker, started_at, finished_at, outcome, as_of_date, rows_stored, error
            FROM fetch_runs
            ORDER BY id DESC
            LIMIT ?
            "#
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(fetch_run_from_row).collect()
    }

    /// Get metadata value
    pub async fn get_metadata(&self, key: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT value FROM metadata WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| r.get::<String, _>("value")))
    }

    /// Set metadata value
    pub async fn set_metadata(&self, key: &str, value: &str) -> Result<()> {
        let now = Utc::now().naive_utc();
        sqlx::query(
            r#"
            INSERT INTO metadata (key, value, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#
        )
        .bind(key)
        .bind(value)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get database statistics
    pub async fn get_stats(&self) -> Result<DatabaseStats> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(DISTINCT etf_ticker) as total_etfs,
                COUNT(*) as total_rows,
                MIN(as_of_date) as oldest_date,
                MAX(as_of_date) as newest_date
            FROM etf_holdings
            "#
        )
        .fetch_one(&self.pool)
        .await?;

        let snapshots = sqlx::query(
            "SELECT COUNT(*) as count FROM (SELECT DISTINCT etf_ticker, as_of_date FROM etf_holdings)"
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(DatabaseStats {
            total_etfs: row.get::<i64, _>("total_etfs") as usize,
            total_snapshots: snapshots.get::<i64, _>("count") as usize,
            total_holding_rows: row.get::<i64, _>("total_rows") as usize,
            oldest_snapshot_date: row.try_get::<Option<NaiveDate>, _>("oldest_date")?,
            newest_snapshot_date: row.try_get::<Option<NaiveDate>, _>("newest_date")?,
        })
    }

    /// Snapshot counts per ETF, used by the status command
    pub async fn snapshot_counts(&self) -> Result<HashMap<String, i64>> {
        let rows = sqlx::query(
            "SELECT etf_ticker, COUNT(DISTINCT as_of_date) as count FROM etf_holdings GROUP BY etf_ticker"
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| (r.get::<String, _>("etf_ticker"), r.get::<i64, _>("count")))
            .collect())
    }

    /// Close the database connection pool
    pub async fn close(self) {
        self.pool.close().await;
    }
}

fn fetch_run_from_row(r: &SqliteRow) -> Result<FetchRun> {
    let outcome = match r.try_get::<String, _>("outcome")?.as_str() {
        "stored" => FetchOutcome::Stored,
        _ => FetchOutcome::Failed,
    };

    Ok(FetchRun {
        id: Some(r.try_get::<i64, _>("id")?),
        etf_ticker: r.try_get::<String, _>("etf_ticker")?,
        started_at: r.try_get::<DateTime<Utc>, _>("started_at")?,
        finished_at: r.try_get::<DateTime<Utc>, _>("finished_at")?,
        outcome,
        as_of_date: r.try_get::<Option<NaiveDate>, _>("as_of_date")?,
        rows_stored: r.try_get::<i64, _>("rows_stored")?,
        error: r.try_get::<Option<String>, _>("error")?,
    })
}
