use anyhow::{anyhow, Result};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use etf_watchtower::config::{Config, EtfSource};
use etf_watchtower::database::DatabaseManager;
use etf_watchtower::export::{write_change_sets, OutputFormat};
use etf_watchtower::fetchers::{HoldingsFetcher, HttpHoldingsFetcher, LocalFileFetcher};
use etf_watchtower::models::Provider;
use etf_watchtower::utils::{last_weekday_on_or_before, parse_flexible_date};
use etf_watchtower::watchtower::job::LAST_RUN_KEY;
use etf_watchtower::watchtower::{backfill_directory, ingest_file, ChangeService, JobConfig, Scheduler, WatchtowerJob};

/// ETF holdings watchtower
#[derive(Parser)]
#[command(name = "etf-watchtower")]
#[command(version)]
#[command(about = "Collect ETF holdings snapshots and report what each fund bought and sold")]
#[command(long_about = "
Downloads the daily holdings files published by ETF providers, normalizes them
into (ticker, name, shares) rows, stores one snapshot per ETF and date in a
local SQLite database, and diffs snapshots to surface BUY/SELL activity.

Dates are resolved per ETF: asking for changes as of a date uses each fund's
latest snapshot on or before that date.

Examples:
  etf-watchtower fetch                         # fetch every configured ETF
  etf-watchtower fetch --etf ARKK --etf ARKW
  etf-watchtower import --etf SPY --file holdings-daily-us-en-spy.xlsx --provider spdr
  etf-watchtower changes --date 2026-10-14 --format csv
  etf-watchtower diff --etf ARKK --previous 2026-10-01
")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch and store today's holdings for configured ETFs
    Fetch {
        /// Only fetch these ETFs (repeatable)
        #[arg(long)]
        etf: Vec<String>,
    },
    /// Import a holdings file from disk
    Import {
        #[arg(long)]
        etf: String,
        #[arg(long)]
        file: PathBuf,
        /// File layout; defaults to the ETF's configured provider
        #[arg(long, value_enum)]
        provider: Option<Provider>,
        /// Snapshot date, overriding any date found in the file
        #[arg(long, value_parser = parse_date_arg)]
        date: Option<NaiveDate>,
    },
    /// Import a directory of archived files named <ETF>_<date>.csv|xlsx
    Backfill {
        #[arg(long)]
        dir: PathBuf,
        #[arg(long, value_enum)]
        provider: Option<Provider>,
    },
    /// Show changes for one ETF
    Diff {
        #[arg(long)]
        etf: String,
        /// Target date (defaults to today); the latest snapshot on or before it is used
        #[arg(long, value_parser = parse_date_arg)]
        date: Option<NaiveDate>,
        /// Compare against the snapshot on or before this date instead of the preceding one
        #[arg(long, value_parser = parse_date_arg)]
        previous: Option<NaiveDate>,
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },
    /// Show changes for every ETF as of a date
    Changes {
        #[arg(long, value_parser = parse_date_arg)]
        date: Option<NaiveDate>,
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },
    /// List stored snapshot dates for an ETF
    Dates {
        #[arg(long)]
        etf: String,
    },
    /// Database and job status
    Status,
    /// Run the fetch job on an interval until Ctrl-C
    Watch {
        #[arg(long)]
        interval_minutes: Option<u64>,
    },
    /// Delete snapshots older than a date
    Prune {
        #[arg(long, value_parser = parse_date_arg)]
        before: NaiveDate,
        #[arg(long)]
        etf: Option<String>,
    },
}

fn parse_date_arg(value: &str) -> Result<NaiveDate, String> {
    parse_flexible_date(value).ok_or_else(|| format!("unrecognized date '{}', expected YYYY-MM-DD", value))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so CSV/JSON output on stdout stays clean
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("etf_watchtower=info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("setting default subscriber failed");

    let cli = Cli::parse();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            eprintln!("❌ Configuration Error: {}", e);
            std::process::exit(1);
        }
    };

    let database = match DatabaseManager::new(&config.database_path).await {
        Ok(db) => db,
        Err(e) => {
            error!("Failed to initialize database: {}", e);
            eprintln!("❌ Database Error: {}", e);
            std::process::exit(1);
        }
    };

    let result = run(cli.command, &config, database.clone()).await;
    database.close().await;
    result
}

async fn run(command: Command, config: &Config, database: DatabaseManager) -> Result<()> {
    let today = Utc::now().date_naive();

    match command {
        Command::Fetch { etf } => {
            let sources = select_sources(EtfSource::load(&config.sources_path)?, &etf)?;
            let job = http_job(config, database)?;
            let report = job.run(&sources, last_weekday_on_or_before(today)).await?;

            println!(
                "✅ Stored {} snapshots ({} rows), {} failed",
                report.stored.len(),
                report.rows_stored(),
                report.failures.len()
            );
            for (etf, err) in &report.failures {
                println!("   ❌ {}: {}", etf, err);
            }
            if !report.stored.is_empty() || report.total_sources == 0 {
                Ok(())
            } else {
                Err(anyhow!("All {} fetches failed", report.total_sources))
            }
        }
        Command::Import { etf, file, provider, date } => {
            let sources = EtfSource::load(&config.sources_path)?;
            let provider = provider.unwrap_or_else(|| configured_provider(&sources, &etf));
            let raw = LocalFileFetcher::new(&file).read(&etf)?;
            let stored = ingest_file(&database, &raw, provider, today, date).await?;
            println!(
                "✅ Imported {} holdings for {} as of {} ({} rows skipped)",
                stored.rows_stored, stored.etf_ticker, stored.as_of_date, stored.skipped_rows
            );
            Ok(())
        }
        Command::Backfill { dir, provider } => {
            let sources = EtfSource::load(&config.sources_path)?;
            let report = backfill_directory(&database, &dir, &sources, provider).await?;

            println!(
                "✅ Backfilled {} snapshots, {} failed, {} files skipped",
                report.stored.len(),
                report.failures.len(),
                report.skipped_files.len()
            );
            for (path, err) in &report.failures {
                println!("   ❌ {}: {}", path.display(), err);
            }
            Ok(())
        }
        Command::Diff { etf, date, previous, format } => {
            let service = ChangeService::new(database);
            let target = date.unwrap_or(today);
            match service.changes_for_etf(&etf, target, previous).await? {
                Some(set) => write_change_sets(&[set], format, &mut std::io::stdout().lock()),
                None => {
                    eprintln!("Not enough snapshots for {} up to {}", etf.to_uppercase(), target);
                    Ok(())
                }
            }
        }
        Command::Changes { date, format } => {
            let service = ChangeService::new(database);
            let sets = service.changes_for_all(date.unwrap_or(today)).await?;
            write_change_sets(&sets, format, &mut std::io::stdout().lock())
        }
        Command::Dates { etf } => {
            let dates = database.list_snapshot_dates(&etf.to_uppercase()).await?;
            if dates.is_empty() {
                println!("No snapshots stored for {}", etf.to_uppercase());
            }
            for date in dates {
                let rows = database.snapshot_row_count(&etf.to_uppercase(), date).await?;
                println!("{}  {:>6} holdings", date, rows);
            }
            Ok(())
        }
        Command::Status => print_status(&database).await,
        Command::Watch { interval_minutes } => {
            let sources = EtfSource::load(&config.sources_path)?;
            let minutes = interval_minutes.unwrap_or(config.watch_interval_minutes).max(1);
            let job = http_job(config, database)?;

            info!("👀 Watching {} ETFs every {} minutes", sources.len(), minutes);
            Scheduler::new(job, sources, Duration::from_secs(minutes * 60))
                .run_forever()
                .await
        }
        Command::Prune { before, etf } => {
            let etf = etf.map(|e| e.to_uppercase());
            let removed = database.prune_snapshots_before(etf.as_deref(), before).await?;
            println!("🗑️  Removed {} holding rows before {}", removed, before);
            Ok(())
        }
    }
}

fn http_job(config: &Config, database: DatabaseManager) -> Result<WatchtowerJob> {
    let fetcher: Arc<dyn HoldingsFetcher> = Arc::new(HttpHoldingsFetcher::new(config)?);
    Ok(WatchtowerJob::new(fetcher, database, JobConfig::from(config)))
}

fn select_sources(sources: Vec<EtfSource>, wanted: &[String]) -> Result<Vec<EtfSource>> {
    if wanted.is_empty() {
        return Ok(sources);
    }

    let wanted: Vec<String> = wanted.iter().map(|e| e.to_uppercase()).collect();
    let selected: Vec<EtfSource> = sources
        .into_iter()
        .filter(|s| wanted.contains(&s.etf_ticker))
        .collect();

    if let Some(missing) = wanted.iter().find(|w| !selected.iter().any(|s| &s.etf_ticker == *w)) {
        return Err(anyhow!("{} is not in the source registry", missing));
    }
    Ok(selected)
}

fn configured_provider(sources: &[EtfSource], etf: &str) -> Provider {
    sources
        .iter()
        .find(|s| s.etf_ticker.eq_ignore_ascii_case(etf))
        .map(|s| s.provider)
        .unwrap_or(Provider::Generic)
}

async fn print_status(database: &DatabaseManager) -> Result<()> {
    let stats = database.get_stats().await?;
    let counts = database.snapshot_counts().await?;
    let last_run = database.get_metadata(LAST_RUN_KEY).await?;

    println!("📊 ETF WATCHTOWER STATUS");
    println!("========================");
    println!("ETFs:           {}", stats.total_etfs);
    println!("Snapshots:      {}", stats.total_snapshots);
    println!("Holding rows:   {}", stats.total_holding_rows);
    if let (Some(oldest), Some(newest)) = (stats.oldest_snapshot_date, stats.newest_snapshot_date) {
        println!("Date range:     {} → {}", oldest, newest);
    }
    println!("Last job run:   {}", last_run.as_deref().unwrap_or("never"));

    let mut etfs: Vec<_> = counts.into_iter().collect();
    etfs.sort();
    for (etf, snapshots) in etfs {
        println!("   {:<6} {:>4} snapshots", etf, snapshots);
    }

    let runs = database.recent_fetch_runs(10).await?;
    if !runs.is_empty() {
        println!("\nRecent fetches:");
        for run in runs {
            println!(
                "   {} {:<6} {:<7} {}",
                run.finished_at.format("%Y-%m-%d %H:%M"),
                run.etf_ticker,
                run.outcome.as_str(),
                run.error.as_deref().unwrap_or("")
            );
        }
    }
    Ok(())
}
