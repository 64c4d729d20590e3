// Core modules
pub mod config;
pub mod driver;
mod executor;
mod ledger;
mod partition;
mod reset;
mod retry;
mod selection;
mod types;
mod urls;

mod orchestrator;
mod worker;

// Re-export key types and functions
pub use config::{ConfigFile, Pacing, RunConfig, load_config_file, load_inputs, read_lines};
pub use driver::{SessionDriver, SessionFactory, WebDriverFactory};
pub use ledger::{LEDGER_HEADER, Ledger, LedgerHandle};
pub use orchestrator::Orchestrator;
pub use partition::partition_campaigns;
pub use retry::{RetryPolicy, RetryState};
pub use types::{
    AttemptRecord, AttemptStatus, CampaignId, RunReport, RunStatus, SelectionSummary, TargetModel,
};
pub use urls::{construct_campaign_url, parse_template_url};
pub use worker::Worker;

use std::sync::Arc;

/// Convenience function to run a full batch against a chromedriver endpoint.
///
/// Builds the WebDriver session factory and the orchestrator, then runs
/// every campaign to a terminal ledger row.
pub async fn run_batch(
    config: RunConfig,
    webdriver_url: url::Url,
    campaigns: Vec<CampaignId>,
    models: Vec<TargetModel>,
    template_url: url::Url,
) -> anyhow::Result<RunReport> {
    let factory = WebDriverFactory::new(webdriver_url, config.profile_root.clone())?;
    let orchestrator = Orchestrator::new(config, Arc::new(factory));
    orchestrator.run(campaigns, models, template_url).await
}
