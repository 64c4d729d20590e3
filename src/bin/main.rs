use anyhow::Result;
use campaign_targeter::{RunConfig, RunStatus, load_config_file, load_inputs, parse_template_url};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{Level, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "campaign-targeter")]
#[command(about = "Applies device-model targeting across ad campaigns in parallel")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply targeting to every campaign in the input list
    Run {
        /// Campaign settings template URL (campaignId is substituted per campaign)
        #[arg(long, env = "TARGETING_TEMPLATE_URL")]
        template_url: String,
        /// File with one campaign id per line
        #[arg(long, default_value = "campaigns.txt")]
        campaigns: PathBuf,
        /// File with one device model name per line
        #[arg(long, default_value = "models.txt")]
        models: PathBuf,
        /// chromedriver-compatible WebDriver endpoint
        #[arg(long, default_value = "http://localhost:9515/", env = "TARGETING_WEBDRIVER_URL")]
        webdriver_url: String,
        /// Optional JSON config file (flags below override it)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Number of parallel workers (at least 1)
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        workers: Option<u64>,
        #[arg(long)]
        max_retries: Option<u32>,
        /// Hard-reset the session every N campaigns (0 disables)
        #[arg(long)]
        reset_every: Option<u32>,
        /// Linear retry backoff base in seconds
        #[arg(long)]
        backoff_secs: Option<u64>,
        /// Root directory for per-worker browser profiles
        #[arg(long)]
        profile_root: Option<PathBuf>,
        /// Path of the append-only result ledger
        #[arg(long)]
        ledger: Option<PathBuf>,
    },
    /// Print the per-worker partition plan without touching any session
    Plan {
        #[arg(long, default_value = "campaigns.txt")]
        campaigns: PathBuf,
        #[arg(long, default_value = "models.txt")]
        models: PathBuf,
        #[arg(long)]
        config: Option<PathBuf>,
        /// Number of parallel workers (at least 1)
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        workers: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("campaign_targeter=info".parse()?),
        )
        .with_max_level(Level::INFO)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            template_url,
            campaigns,
            models,
            webdriver_url,
            config,
            workers,
            max_retries,
            reset_every,
            backoff_secs,
            profile_root,
            ledger,
        } => {
            let mut run_config = RunConfig::default();
            if let Some(file) = load_config_file(config.as_deref())? {
                run_config = run_config.apply_file(file)?;
            }
            if let Some(w) = workers {
                run_config.workers = w as usize;
            }
            if let Some(r) = max_retries {
                run_config.max_retries = r;
            }
            if let Some(i) = reset_every {
                run_config.reset_every = i;
            }
            if let Some(b) = backoff_secs {
                run_config.backoff_base = Duration::from_secs(b);
            }
            if let Some(p) = profile_root {
                run_config.profile_root = p;
            }
            if let Some(p) = ledger {
                run_config.ledger_path = p;
            }

            let template_url = parse_template_url(&template_url)?;
            let webdriver_url = url::Url::parse(webdriver_url.trim())?;
            let (campaign_ids, model_names) = load_inputs(&campaigns, &models)?;

            info!(
                workers = run_config.workers,
                campaigns = campaign_ids.len(),
                models = model_names.len(),
                ledger = %run_config.ledger_path.display(),
                "Starting targeting run"
            );

            let report = campaign_targeter::run_batch(
                run_config,
                webdriver_url,
                campaign_ids,
                model_names,
                template_url,
            )
            .await?;

            match report.status {
                RunStatus::Complete => {
                    println!(
                        "All campaigns done: {} campaigns across {} workers",
                        report.campaigns, report.workers
                    );
                }
                RunStatus::PartialFailure => {
                    warn!(
                        failed = report.failed_workers,
                        "Run finished with worker failures; check the ledger for gaps"
                    );
                    println!(
                        "Partial failure: {}/{} workers failed; see ledger for coverage",
                        report.failed_workers, report.workers
                    );
                    std::process::exit(1);
                }
            }
        }
        Commands::Plan {
            campaigns,
            models,
            config,
            workers,
        } => {
            let mut run_config = RunConfig::default();
            if let Some(file) = load_config_file(config.as_deref())? {
                run_config = run_config.apply_file(file)?;
            }
            if let Some(w) = workers {
                run_config.workers = w as usize;
            }

            let (campaign_ids, model_names) = load_inputs(&campaigns, &models)?;
            let partitions =
                campaign_targeter::partition_campaigns(&campaign_ids, run_config.workers);

            println!(
                "{} campaigns, {} models, {} workers",
                campaign_ids.len(),
                model_names.len(),
                partitions.len()
            );
            for (id, partition) in partitions.iter().enumerate() {
                let first = partition.first().map(|c| c.as_str()).unwrap_or("-");
                let last = partition.last().map(|c| c.as_str()).unwrap_or("-");
                println!(
                    "  worker {}: {} campaigns ({} .. {})",
                    id,
                    partition.len(),
                    first,
                    last
                );
            }
        }
    }

    Ok(())
}
