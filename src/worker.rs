//! One worker: an exclusively-owned session working through one partition.

use crate::config::RunConfig;
use crate::driver::SessionDriver;
use crate::ledger::LedgerHandle;
use crate::reset::{self, ResetScheduler};
use crate::retry::{self, RetryPolicy};
use crate::types::{CampaignId, TargetModel};
use crate::urls::construct_campaign_url;
use anyhow::Result;
use std::sync::Arc;
use tracing::info;
use url::Url;

/// Owns one session driver and one contiguous partition of the campaign
/// list, processing it strictly sequentially. Faults escaping the
/// per-campaign retry wrapper terminate only this worker.
pub struct Worker<D: SessionDriver> {
    pub id: usize,
    pub driver: D,
    pub partition: Vec<CampaignId>,
    pub models: Arc<Vec<TargetModel>>,
    pub template_url: Url,
    pub config: Arc<RunConfig>,
    pub ledger: LedgerHandle,
}

impl<D: SessionDriver> Worker<D> {
    pub async fn run(mut self) -> Result<()> {
        info!(
            worker = self.id,
            campaigns = self.partition.len(),
            "Worker starting"
        );

        self.driver.navigate(&self.template_url).await?;
        self.driver
            .wait_loaded(self.config.pacing.page_timeout)
            .await?;

        let mut reset = ResetScheduler::new(self.config.reset_every);
        let policy = RetryPolicy {
            max_retries: self.config.max_retries,
            backoff_base: self.config.backoff_base,
        };

        let partition = std::mem::take(&mut self.partition);
        for campaign in &partition {
            if reset.due_before_next() {
                reset::perform_reset(
                    &mut self.driver,
                    self.id,
                    &self.template_url,
                    &self.config.pacing,
                )
                .await?;
            }

            let campaign_url = construct_campaign_url(&self.template_url, campaign);
            retry::supervise(
                &policy,
                &mut self.driver,
                self.id,
                campaign,
                &campaign_url,
                &self.models,
                &self.config.pacing,
                &self.ledger,
            )
            .await?;

            // Load-shedding against the remote UI between campaigns.
            tokio::time::sleep(self.config.pacing.inter_campaign_pause).await;
        }

        self.driver.close().await?;
        info!(worker = self.id, "Worker finished");

        Ok(())
    }
}
