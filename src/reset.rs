//! Scheduled session resets to counteract cumulative UI degradation.
//!
//! Long-running console sessions slowly decay (detached listeners, stale
//! overlays), so every N campaigns the worker bounces the session through
//! a blank page and back to the template view. The reset is scheduled
//! maintenance, not error recovery: it fires on the interval boundary
//! regardless of how previous campaigns went.

use crate::config::Pacing;
use crate::driver::{SessionDriver, blank_url};
use anyhow::Result;
use tracing::info;
use url::Url;

/// Per-worker reset cadence tracker.
#[derive(Debug)]
pub struct ResetScheduler {
    interval: u32,
    counter: u32,
}

impl ResetScheduler {
    pub fn new(interval: u32) -> Self {
        Self { interval, counter: 0 }
    }

    /// Advance to the next campaign; true when a hard reset is due before
    /// processing it. With interval 2 the reset lands before the 2nd, 4th,
    /// 6th… campaign and never before the 1st. Interval 0 disables resets.
    pub fn due_before_next(&mut self) -> bool {
        self.counter += 1;
        self.interval != 0 && self.counter % self.interval == 0
    }
}

/// Perform one hard reset: blank page, short pause, back to the template
/// view, wait for it to be ready.
pub async fn perform_reset<D: SessionDriver>(
    driver: &mut D,
    worker_id: usize,
    template_url: &Url,
    pacing: &Pacing,
) -> Result<()> {
    info!(worker = worker_id, "Resetting session state");

    driver.navigate(&blank_url()).await?;
    tokio::time::sleep(pacing.reset_pause).await;
    driver.navigate(template_url).await?;
    driver.wait_loaded(pacing.page_timeout).await?;

    Ok(())
}
