use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::{info, warn};
use url::Url;

use crate::models::Provider;

/// Configuration for the application
#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: String,
    pub sources_path: String,
    pub fetch_concurrency: usize,
    pub requests_per_minute: u32,
    pub retry_attempts: u32,
    pub http_timeout_secs: u64,
    pub watch_interval_minutes: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: "watchtower.db".to_string(),
            sources_path: "etf_sources.json".to_string(),
            fetch_concurrency: 4,
            requests_per_minute: 30,
            retry_attempts: 3,
            http_timeout_secs: 60,
            watch_interval_minutes: 360,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // Load .env file if it exists

        let defaults = Config::default();

        Ok(Config {
            database_path: std::env::var("DATABASE_PATH")
                .unwrap_or(defaults.database_path),
            sources_path: std::env::var("ETF_SOURCES_PATH")
                .unwrap_or(defaults.sources_path),
            fetch_concurrency: env_or("FETCH_CONCURRENCY", defaults.fetch_concurrency).max(1),
            requests_per_minute: env_or("REQUESTS_PER_MINUTE", defaults.requests_per_minute).max(1),
            retry_attempts: env_or("RETRY_ATTEMPTS", defaults.retry_attempts).max(1),
            http_timeout_secs: env_or("HTTP_TIMEOUT_SECS", defaults.http_timeout_secs),
            watch_interval_minutes: env_or("WATCH_INTERVAL_MINUTES", defaults.watch_interval_minutes).max(1),
        })
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// One fetchable fund in the source registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EtfSource {
    pub etf_ticker: String,
    pub provider: Provider,
    pub url: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl EtfSource {
    pub fn new(etf_ticker: &str, provider: Provider, url: &str) -> Self {
        Self {
            etf_ticker: etf_ticker.to_uppercase(),
            provider,
            url: url.to_string(),
            enabled: true,
        }
    }

    /// Built-in registry used when no sources file is present
    pub fn defaults() -> Vec<EtfSource> {
        const ARK_BASE: &str = "https://assets.ark-funds.com/fund-documents/funds-etf-csv";

        vec![
            EtfSource::new("ARKK", Provider::Ark, &format!("{}/ARK_INNOVATION_ETF_ARKK_HOLDINGS.csv", ARK_BASE)),
            EtfSource::new("ARKW", Provider::Ark, &format!("{}/ARK_NEXT_GENERATION_INTERNET_ETF_ARKW_HOLDINGS.csv", ARK_BASE)),
            EtfSource::new("ARKG", Provider::Ark, &format!("{}/ARK_GENOMIC_REVOLUTION_ETF_ARKG_HOLDINGS.csv", ARK_BASE)),
            EtfSource::new("ARKF", Provider::Ark, &format!("{}/ARK_FINTECH_INNOVATION_ETF_ARKF_HOLDINGS.csv", ARK_BASE)),
            EtfSource::new(
                "SPY",
                Provider::Spdr,
                "https://www.ssga.com/us/en/intermediary/library-content/products/fund-data/etfs/us/holdings-daily-us-en-spy.xlsx",
            ),
            EtfSource::new(
                "IVV",
                Provider::IShares,
                "https://www.ishares.com/us/products/239726/ishares-core-sp-500-etf/1467271812596.ajax?fileType=csv&fileName=IVV_holdings&dataType=fund",
            ),
        ]
    }

    /// Load the source registry from a JSON file, falling back to the defaults
    pub fn load(path: &str) -> Result<Vec<EtfSource>> {
        if !Path::new(path).exists() {
            info!("📋 No sources file at {}, using {} built-in sources", path, Self::defaults().len());
            return Ok(Self::defaults());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read sources file {}", path))?;
        let sources = Self::parse_registry(&content)
            .with_context(|| format!("Invalid sources file {}", path))?;

        info!("📋 Loaded {} ETF sources from {}", sources.len(), path);
        Ok(sources)
    }

    /// Parse and validate a JSON source registry
    pub fn parse_registry(content: &str) -> Result<Vec<EtfSource>> {
        let mut sources: Vec<EtfSource> = serde_json::from_str(content)?;
        let mut seen = HashSet::new();

        for source in &mut sources {
            source.etf_ticker = source.etf_ticker.trim().to_uppercase();
            if source.etf_ticker.is_empty() {
                return Err(anyhow!("Source with empty ETF ticker"));
            }
            if !seen.insert(source.etf_ticker.clone()) {
                return Err(anyhow!("Duplicate ETF ticker in sources: {}", source.etf_ticker));
            }
            Url::parse(&source.url)
                .map_err(|e| anyhow!("Invalid URL for {}: {}", source.etf_ticker, e))?;
            if !source.enabled {
                warn!("⏸️  {} is disabled in the sources file", source.etf_ticker);
            }
        }

        Ok(sources)
    }
}
