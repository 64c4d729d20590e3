//! NewType wrappers and core records shared across the targeting engine.
//!
//! The wrappers prevent accidental mixing of semantically different strings
//! (e.g., passing a device model name where a campaign id is expected).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Macro to generate a NewType wrapper with standard trait implementations.
macro_rules! newtype_string {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new instance.
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Get the inner value as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

newtype_string!(
    /// Opaque identifier of one campaign in the ads console.
    ///
    /// Unique within one input batch. It is substituted into the
    /// `campaignId` query parameter of the settings template URL.
    CampaignId
);

newtype_string!(
    /// Name of one device model, the atomic unit of targeting selection.
    ///
    /// Matched by label against leaf rows of the device-model tree.
    /// Re-selecting an already-checked model is a no-op.
    TargetModel
);

/// Terminal or intermediate outcome of one targeting attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttemptStatus {
    /// Targeting was applied and the campaign saved.
    Saved,
    /// The attempt failed and will be (or was) retried.
    Retry,
    /// Retries are exhausted; the campaign was abandoned.
    Skipped,
}

impl AttemptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptStatus::Saved => "SAVED",
            AttemptStatus::Retry => "RETRY",
            AttemptStatus::Skipped => "SKIPPED",
        }
    }

    /// Whether this status ends processing of the campaign.
    pub fn is_terminal(&self) -> bool {
        matches!(self, AttemptStatus::Saved | AttemptStatus::Skipped)
    }
}

impl fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counts produced by one pass of the selection engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SelectionSummary {
    /// Leaves toggled from unchecked to checked.
    pub applied: u32,
    /// Leaves not found, or already checked.
    pub skipped: u32,
}

/// One row of the result ledger. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptRecord {
    /// Local wall-clock time the record was produced, `%Y-%m-%d %H:%M:%S`.
    pub timestamp: String,
    pub worker_id: usize,
    pub campaign_id: CampaignId,
    /// 1-based attempt number within the campaign's retry loop.
    pub attempt: u32,
    /// None for RETRY/SKIPPED rows: no counts were finalized.
    pub counts: Option<SelectionSummary>,
    pub status: AttemptStatus,
    pub message: String,
}

impl AttemptRecord {
    pub fn new(
        worker_id: usize,
        campaign_id: CampaignId,
        attempt: u32,
        counts: Option<SelectionSummary>,
        status: AttemptStatus,
        message: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            worker_id,
            campaign_id,
            attempt,
            counts,
            status,
            message: message.into(),
        }
    }
}

/// Overall outcome of a run, reported once all workers have joined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Every worker ran its partition to completion.
    Complete,
    /// One or more workers terminated on a fault outside the per-campaign
    /// retry wrapper; the remaining workers finished normally.
    PartialFailure,
}

/// Summary returned by the orchestrator after all workers have joined.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub status: RunStatus,
    pub workers: usize,
    pub failed_workers: usize,
    pub campaigns: usize,
}
