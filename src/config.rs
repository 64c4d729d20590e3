use crate::types::{CampaignId, TargetModel};
use serde::Deserialize;
use std::{env, fs, path::Path, path::PathBuf, time::Duration};

/// Fixed pauses and timeouts used against the remote UI.
///
/// Defaults are tuned for the real ads console; tests shrink them to keep
/// the suite fast. All waiting in the engine goes through these values so
/// nothing sleeps on a process-wide constant.
#[derive(Debug, Clone)]
pub struct Pacing {
    /// Settle after expanding a tree node (children render asynchronously).
    pub expand_settle: Duration,
    /// Settle after toggling a leaf checkbox.
    pub check_settle: Duration,
    /// Pause between campaigns within one worker (load-shedding).
    pub inter_campaign_pause: Duration,
    /// Pause on the blank page during a scheduled hard reset.
    pub reset_pause: Duration,
    /// Timeout for page-load completion and top-level settings widgets.
    pub page_timeout: Duration,
    /// Timeout for the model-selection dialog to become visible.
    pub surface_timeout: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            expand_settle: Duration::from_millis(200),
            check_settle: Duration::from_millis(60),
            inter_campaign_pause: Duration::from_millis(1500),
            reset_pause: Duration::from_secs(2),
            page_timeout: Duration::from_secs(20),
            surface_timeout: Duration::from_secs(15),
        }
    }
}

/// Resolved run configuration, passed explicitly into the orchestrator.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Number of parallel workers, each with its own isolated session.
    pub workers: usize,
    /// Per-campaign attempt ceiling for the retry supervisor.
    pub max_retries: u32,
    /// Hard-reset the session every N campaigns.
    pub reset_every: u32,
    /// Linear backoff base: attempt n waits `backoff_base * n` before n+1.
    pub backoff_base: Duration,
    /// Root directory holding one persistent browser profile per worker.
    pub profile_root: PathBuf,
    /// Path of the append-only result ledger.
    pub ledger_path: PathBuf,
    pub pacing: Pacing,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            workers: 3,
            max_retries: 3,
            reset_every: 2,
            backoff_base: Duration::from_secs(2),
            profile_root: PathBuf::from("chrome_user_data"),
            ledger_path: PathBuf::from("campaign_results.csv"),
            pacing: Pacing::default(),
        }
    }
}

/// On-disk config file shape. Every field is optional; anything absent
/// falls back to the built-in default, and CLI flags override both.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigFile {
    #[serde(default)]
    pub worker_count: Option<usize>,
    #[serde(default)]
    pub max_retries: Option<u32>,
    #[serde(default)]
    pub reset_interval: Option<u32>,
    #[serde(default)]
    pub backoff_base_secs: Option<u64>,
    #[serde(default)]
    pub profile_root: Option<PathBuf>,
    #[serde(default)]
    pub ledger_path: Option<PathBuf>,
}

impl RunConfig {
    /// Overlay values from a config file onto this configuration.
    ///
    /// Rejects values the engine cannot run with; a zero worker count
    /// must fail here with a readable message, not deep in partitioning.
    pub fn apply_file(mut self, file: ConfigFile) -> anyhow::Result<Self> {
        if let Some(w) = file.worker_count {
            if w == 0 {
                return Err(anyhow::anyhow!("workerCount must be at least 1"));
            }
            self.workers = w;
        }
        if let Some(r) = file.max_retries {
            self.max_retries = r;
        }
        if let Some(i) = file.reset_interval {
            self.reset_every = i;
        }
        if let Some(b) = file.backoff_base_secs {
            self.backoff_base = Duration::from_secs(b);
        }
        if let Some(p) = file.profile_root {
            self.profile_root = p;
        }
        if let Some(p) = file.ledger_path {
            self.ledger_path = p;
        }
        Ok(self)
    }
}

/// Locate `targeting.json`: explicit env override, then XDG config dir,
/// then the working directory. Absence is not an error; the file is optional.
pub fn resolve_config_path() -> Option<PathBuf> {
    if let Ok(p) = env::var("TARGETING_CONFIG") {
        return Some(PathBuf::from(p));
    }

    if let Ok(xdg) = env::var("XDG_CONFIG_HOME") {
        let candidate = PathBuf::from(xdg)
            .join("campaign-targeter")
            .join("targeting.json");
        if candidate.exists() {
            return Some(candidate);
        }
    }

    let candidate = PathBuf::from("targeting.json");
    if candidate.exists() {
        return Some(candidate);
    }

    None
}

/// Load the optional config file from an explicit path or the resolved default.
pub fn load_config_file(explicit: Option<&Path>) -> anyhow::Result<Option<ConfigFile>> {
    let path = match explicit {
        Some(p) => Some(p.to_path_buf()),
        None => resolve_config_path(),
    };

    let Some(path) = path else {
        return Ok(None);
    };

    let raw = fs::read_to_string(&path)
        .map_err(|e| anyhow::anyhow!("Could not read config file {}: {}", path.display(), e))?;
    let cfg: ConfigFile = serde_json::from_str(&raw)
        .map_err(|e| anyhow::anyhow!("Invalid config file {}: {}", path.display(), e))?;

    Ok(Some(cfg))
}

/// Read one entry per line, trimming whitespace and dropping blank lines.
pub fn read_lines(path: &Path) -> anyhow::Result<Vec<String>> {
    let raw = fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Could not read {}: {}", path.display(), e))?;

    Ok(raw
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect())
}

/// Load both input lists. Missing or empty input is fatal: starting a run
/// with nothing to target would spawn workers that can only do nothing.
pub fn load_inputs(
    campaigns_path: &Path,
    models_path: &Path,
) -> anyhow::Result<(Vec<CampaignId>, Vec<TargetModel>)> {
    let campaigns: Vec<CampaignId> = read_lines(campaigns_path)?
        .into_iter()
        .map(CampaignId::from)
        .collect();
    let models: Vec<TargetModel> = read_lines(models_path)?
        .into_iter()
        .map(TargetModel::from)
        .collect();

    if campaigns.is_empty() {
        return Err(anyhow::anyhow!(
            "Campaign list {} is empty",
            campaigns_path.display()
        ));
    }
    if models.is_empty() {
        return Err(anyhow::anyhow!(
            "Model list {} is empty",
            models_path.display()
        ));
    }

    Ok((campaigns, models))
}
