//! Run orchestration: partition the batch, spawn workers, join, report.

use crate::config::RunConfig;
use crate::driver::SessionFactory;
use crate::ledger::{Ledger, LedgerHandle};
use crate::partition::partition_campaigns;
use crate::types::{CampaignId, RunReport, RunStatus, TargetModel};
use crate::worker::Worker;
use anyhow::Result;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use url::Url;

/// Drives one full run: initializes the ledger, splits the campaign list
/// into per-worker partitions, runs every worker to completion, and
/// reports the overall outcome. Individual campaign failures never fail
/// the run; a worker-level fault downgrades it to partial failure.
pub struct Orchestrator<F: SessionFactory> {
    config: Arc<RunConfig>,
    factory: Arc<F>,
}

impl<F: SessionFactory> Orchestrator<F> {
    pub fn new(config: RunConfig, factory: Arc<F>) -> Self {
        Self {
            config: Arc::new(config),
            factory,
        }
    }

    pub async fn run(
        &self,
        campaigns: Vec<CampaignId>,
        models: Vec<TargetModel>,
        template_url: Url,
    ) -> Result<RunReport> {
        if self.config.workers == 0 {
            return Err(anyhow::anyhow!("worker count must be at least 1"));
        }

        let (ledger, writer) = Ledger::open(&self.config.ledger_path).await?;

        let total = campaigns.len();
        let partitions = partition_campaigns(&campaigns, self.config.workers);
        let workers = partitions.len();

        info!(
            workers,
            campaigns = total,
            models = models.len(),
            "Starting workers"
        );

        let models = Arc::new(models);
        let mut handles: Vec<(usize, JoinHandle<Result<()>>)> = Vec::new();

        for (id, partition) in partitions.into_iter().enumerate() {
            handles.push((
                id,
                self.spawn_worker(id, partition, models.clone(), template_url.clone(), &ledger),
            ));
        }

        let mut failed_workers = 0;
        for (id, handle) in handles {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    error!(worker = id, "Worker failed: {e:#}");
                    failed_workers += 1;
                }
                Err(e) => {
                    error!(worker = id, "Worker panicked: {e}");
                    failed_workers += 1;
                }
            }
        }

        // Every sender is gone once the workers have joined; draining the
        // writer guarantees the tail of the ledger is on disk.
        drop(ledger);
        if let Err(e) = writer.await {
            error!("Ledger writer task failed: {e}");
        }

        let status = if failed_workers == 0 {
            info!("ALL CAMPAIGNS DONE");
            RunStatus::Complete
        } else {
            warn!(failed_workers, "Run finished with worker failures");
            RunStatus::PartialFailure
        };

        Ok(RunReport {
            status,
            workers,
            failed_workers,
            campaigns: total,
        })
    }

    fn spawn_worker(
        &self,
        id: usize,
        partition: Vec<CampaignId>,
        models: Arc<Vec<TargetModel>>,
        template_url: Url,
        ledger: &LedgerHandle,
    ) -> JoinHandle<Result<()>> {
        let factory = self.factory.clone();
        let config = self.config.clone();
        let ledger = ledger.clone();

        tokio::spawn(async move {
            let driver = factory.open(id).await?;
            Worker {
                id,
                driver,
                partition,
                models,
                template_url,
                config,
                ledger,
            }
            .run()
            .await
        })
    }
}
