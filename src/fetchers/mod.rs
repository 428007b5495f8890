//! Holdings file fetchers
//!
//! A fetcher turns an [`EtfSource`] into raw file bytes. The HTTP fetcher is
//! used by the watchtower job; the local fetcher backs manual imports.

use anyhow::Result;
use std::path::{Path, PathBuf};

use crate::config::EtfSource;

pub mod http;
pub use http::HttpHoldingsFetcher;

/// Container format of a downloaded holdings file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Csv,
    Xlsx,
}

impl FileFormat {
    /// Sniff the format from file content. Xlsx files are zip archives.
    pub fn detect(bytes: &[u8]) -> Self {
        if bytes.starts_with(b"PK\x03\x04") {
            FileFormat::Xlsx
        } else {
            FileFormat::Csv
        }
    }
}

/// Holdings file as fetched, before parsing
#[derive(Debug, Clone)]
pub struct RawHoldingsFile {
    pub etf_ticker: String,
    pub origin: String,
    pub format: FileFormat,
    pub bytes: Vec<u8>,
}

impl RawHoldingsFile {
    pub fn new(etf_ticker: &str, origin: &str, bytes: Vec<u8>) -> Self {
        Self {
            etf_ticker: etf_ticker.to_uppercase(),
            origin: origin.to_string(),
            format: FileFormat::detect(&bytes),
            bytes,
        }
    }
}

/// Source of holdings files
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait HoldingsFetcher: Send + Sync {
    async fn fetch(&self, source: &EtfSource) -> Result<RawHoldingsFile>;
}

/// Reads holdings files from disk. The source URL is ignored; the file path
/// given at construction is used for every request.
pub struct LocalFileFetcher {
    path: PathBuf,
}

impl LocalFileFetcher {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn read(&self, etf_ticker: &str) -> Result<RawHoldingsFile> {
        let bytes = std::fs::read(&self.path)
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", self.path.display(), e))?;
        Ok(RawHoldingsFile::new(etf_ticker, &self.path.display().to_string(), bytes))
    }
}

#[async_trait::async_trait]
impl HoldingsFetcher for LocalFileFetcher {
    async fn fetch(&self, source: &EtfSource) -> Result<RawHoldingsFile> {
        self.read(&source.etf_ticker)
    }
}
