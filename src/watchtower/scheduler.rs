use anyhow::Result;
use chrono::Utc;
use std::future::Future;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use super::job::WatchtowerJob;
use crate::config::EtfSource;
use crate::utils::last_weekday_on_or_before;

/// Runs the watchtower job on a fixed interval until shut down
pub struct Scheduler {
    job: WatchtowerJob,
    sources: Vec<EtfSource>,
    interval: Duration,
}

impl Scheduler {
    pub fn new(job: WatchtowerJob, sources: Vec<EtfSource>, interval: Duration) -> Self {
        Self { job, sources, interval }
    }

    /// Run until Ctrl-C
    pub async fn run_forever(&self) -> Result<()> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
            }
        })
        .await
        .map(|_| ())
    }

    /// Run the job immediately, then once per interval, until `shutdown` completes.
    /// A run in progress is allowed to finish before shutting down.
    pub async fn run_until<F>(&self, shutdown: F) -> Result<u64>
    where
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        info!("⏰ Scheduler started, running every {:?}", self.interval);
        let mut runs = 0u64;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let run_date = last_weekday_on_or_before(Utc::now().date_naive());
                    match self.job.run(&self.sources, run_date).await {
                        Ok(report) if report.is_clean() => {}
                        Ok(report) => error!("Watchtower run finished with {} failures", report.failures.len()),
                        Err(e) => error!("Watchtower run failed: {:#}", e),
                    }
                    runs += 1;
                }
                _ = &mut shutdown => {
                    info!("🛑 Scheduler stopping after {} runs", runs);
                    break;
                }
            }
        }

        Ok(runs)
    }
}
