use anyhow::{anyhow, Result};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::Client;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::{HoldingsFetcher, RawHoldingsFile};
use crate::config::{Config, EtfSource};

// Several providers reject requests without a browser user agent
const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// Downloads holdings files over HTTP, paced by a shared rate limiter
#[derive(Clone)]
pub struct HttpHoldingsFetcher {
    client: Client,
    limiter: Arc<DefaultDirectRateLimiter>,
}

impl HttpHoldingsFetcher {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .user_agent(USER_AGENT)
            .build()?;

        let per_minute = NonZeroU32::new(config.requests_per_minute)
            .ok_or_else(|| anyhow!("REQUESTS_PER_MINUTE must be positive"))?;
        let limiter = Arc::new(RateLimiter::direct(Quota::per_minute(per_minute)));

        Ok(Self { client, limiter })
    }
}

#[async_trait::async_trait]
impl HoldingsFetcher for HttpHoldingsFetcher {
    async fn fetch(&self, source: &EtfSource) -> Result<RawHoldingsFile> {
        self.limiter.until_ready().await;

        debug!("🌐 GET {} for {}", source.url, source.etf_ticker);
        let response = self.client.get(&source.url).send().await?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "HTTP {} fetching holdings for {}",
                response.status(),
                source.etf_ticker
            ));
        }

        let bytes = response.bytes().await?.to_vec();
        if bytes.is_empty() {
            return Err(anyhow!("Empty holdings file for {}", source.etf_ticker));
        }

        let raw = RawHoldingsFile::new(&source.etf_ticker, &source.url, bytes);
        info!("📥 {}: downloaded {} bytes ({:?})", source.etf_ticker, raw.bytes.len(), raw.format);
        Ok(raw)
    }
}
