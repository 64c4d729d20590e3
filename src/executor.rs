//! Attempt executor: one full single-pass targeting application.
//!
//! Navigates to the campaign's settings view, digs down to the device
//! model surface, runs the selection engine, then commits (Done) and
//! persists (Save). Any step failing surfaces as one error to the retry
//! supervisor; a partial commit is never reported as success.

use crate::config::Pacing;
use crate::driver::{SessionDriver, Target};
use crate::selection::SelectionEngine;
use crate::types::{CampaignId, SelectionSummary, TargetModel};
use anyhow::{Context, Result};
use tracing::{debug, info};
use url::Url;

pub async fn apply_targeting<D: SessionDriver>(
    driver: &mut D,
    worker_id: usize,
    campaign: &CampaignId,
    campaign_url: &Url,
    models: &[TargetModel],
    pacing: &Pacing,
) -> Result<SelectionSummary> {
    info!(worker = worker_id, campaign = %campaign, "Applying targeting");

    driver.navigate(campaign_url).await?;
    driver.wait_loaded(pacing.page_timeout).await?;

    let additional = driver
        .wait_for(&Target::text("Additional settings"), pacing.page_timeout)
        .await?;
    driver.click(&additional).await?;

    let devices = driver
        .find(None, &Target::ExactText("Devices".into()))
        .await?
        .context("Devices section not found")?;
    driver.click(&devices).await?;

    let models_button = driver
        .find(None, &Target::ButtonWithText("Device Models".into()))
        .await?
        .context("Device Models button not found")?;
    driver.click(&models_button).await?;

    let modal = driver
        .wait_for(
            &Target::role("dialog", "Choose device models"),
            pacing.surface_timeout,
        )
        .await?;
    debug!(worker = worker_id, "Device modal opened");

    let summary = SelectionEngine::new(pacing).apply(driver, &modal, models).await?;

    let done = driver
        .find(Some(&modal), &Target::role("button", "Done"))
        .await?
        .context("Done button not found in dialog")?;
    driver.click(&done).await?;

    let save = driver
        .find(None, &Target::role("button", "Save"))
        .await?
        .context("Save button not found")?;
    driver.click(&save).await?;

    info!(
        worker = worker_id,
        campaign = %campaign,
        applied = summary.applied,
        skipped = summary.skipped,
        "Saved successfully"
    );

    Ok(summary)
}
