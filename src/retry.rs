//! Retry supervisor: bounded per-campaign retries with linear backoff.
//!
//! Backoff is linear in the attempt number, not exponential: the waits
//! exist to let the remote UI recover, not to ease network congestion,
//! and the linear schedule was tuned empirically against the console.

use crate::config::Pacing;
use crate::driver::SessionDriver;
use crate::executor;
use crate::ledger::LedgerHandle;
use crate::types::{AttemptRecord, AttemptStatus, CampaignId, TargetModel};
use anyhow::Result;
use std::time::Duration;
use tracing::{error, warn};
use url::Url;

/// Supervisor state. One campaign starts at `Attempting(1)` and ends in
/// exactly one of the terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    Attempting(u32),
    Succeeded,
    Exhausted,
}

impl RetryState {
    pub fn on_success(self) -> RetryState {
        RetryState::Succeeded
    }

    pub fn on_failure(self, max_retries: u32) -> RetryState {
        match self {
            RetryState::Attempting(n) if n < max_retries => RetryState::Attempting(n + 1),
            _ => RetryState::Exhausted,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_base: Duration,
}

impl RetryPolicy {
    /// Wait inserted after attempt `n` fails, before attempt `n + 1`.
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        self.backoff_base * attempt
    }
}

/// Flatten an error chain into one ledger-friendly line.
///
/// Messages carry page text and can contain multibyte characters, so the
/// cut must land on a char boundary.
fn error_summary(e: &anyhow::Error) -> String {
    let mut summary = format!("{e:#}").replace('\n', "; ");
    if summary.len() > 200 {
        let mut cut = 200;
        while !summary.is_char_boundary(cut) {
            cut -= 1;
        }
        summary.truncate(cut);
    }
    summary
}

/// Run one campaign's targeting under the retry policy.
///
/// Every attempt produces exactly one ledger row (SAVED or RETRY), and an
/// exhausted campaign produces one additional terminal SKIPPED row. The
/// only errors propagated from here are ledger failures; attempt failures
/// are consumed by the policy.
pub async fn supervise<D: SessionDriver>(
    policy: &RetryPolicy,
    driver: &mut D,
    worker_id: usize,
    campaign: &CampaignId,
    campaign_url: &Url,
    models: &[TargetModel],
    pacing: &Pacing,
    ledger: &LedgerHandle,
) -> Result<AttemptStatus> {
    let mut state = RetryState::Attempting(1);

    while let RetryState::Attempting(attempt) = state {
        match executor::apply_targeting(driver, worker_id, campaign, campaign_url, models, pacing)
            .await
        {
            Ok(summary) => {
                ledger
                    .append(AttemptRecord::new(
                        worker_id,
                        campaign.clone(),
                        attempt,
                        Some(summary),
                        AttemptStatus::Saved,
                        "OK",
                    ))
                    .await?;
                state = state.on_success();
            }
            Err(e) => {
                warn!(
                    worker = worker_id,
                    campaign = %campaign,
                    attempt,
                    "Attempt failed: {e:#}"
                );
                ledger
                    .append(AttemptRecord::new(
                        worker_id,
                        campaign.clone(),
                        attempt,
                        None,
                        AttemptStatus::Retry,
                        error_summary(&e),
                    ))
                    .await?;

                let next = state.on_failure(policy.max_retries);
                if next == RetryState::Exhausted {
                    ledger
                        .append(AttemptRecord::new(
                            worker_id,
                            campaign.clone(),
                            attempt,
                            None,
                            AttemptStatus::Skipped,
                            "MAX_RETRIES",
                        ))
                        .await?;
                    error!(worker = worker_id, campaign = %campaign, "Campaign skipped");
                } else {
                    tokio::time::sleep(policy.backoff_after(attempt)).await;
                }
                state = next;
            }
        }
    }

    Ok(match state {
        RetryState::Succeeded => AttemptStatus::Saved,
        RetryState::Exhausted => AttemptStatus::Skipped,
        RetryState::Attempting(_) => unreachable!("loop exits only on terminal states"),
    })
}
