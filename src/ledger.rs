//! Append-only result ledger shared by all workers.
//!
//! A single writer task owns the file and receives records over a channel,
//! so concurrent appends from different workers can never interleave
//! partial rows. Each append is acknowledged only after the row has been
//! written and flushed. The header is written once when the file is new;
//! re-running against an existing ledger appends below the prior history,
//! making the file a cumulative cross-run audit trail.

use crate::types::AttemptRecord;
use anyhow::Result;
use std::path::Path;
use std::time::Duration;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{error, warn};

pub const LEDGER_HEADER: &str =
    "timestamp,worker_id,campaign_id,attempt,applied,skipped,status,message";

/// A failed write is retried this many times before the append errors out;
/// losing a record would break the audit invariant silently.
const WRITE_ATTEMPTS: u32 = 3;
const WRITE_RETRY_PAUSE: Duration = Duration::from_millis(50);

struct Append {
    record: AttemptRecord,
    ack: oneshot::Sender<Result<()>>,
}

/// Cloneable sender side of the ledger; one per worker plus the orchestrator.
#[derive(Clone)]
pub struct LedgerHandle {
    tx: mpsc::Sender<Append>,
}

impl LedgerHandle {
    /// Append one record. Returns once the row is durably written.
    pub async fn append(&self, record: AttemptRecord) -> Result<()> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.tx
            .send(Append {
                record,
                ack: ack_tx,
            })
            .await
            .map_err(|_| anyhow::anyhow!("Ledger writer has shut down"))?;

        ack_rx
            .await
            .map_err(|_| anyhow::anyhow!("Ledger writer dropped an in-flight append"))?
    }
}

pub struct Ledger;

impl Ledger {
    /// Open the ledger file and spawn its writer task.
    ///
    /// The header row is written only when the file is new or empty. The
    /// writer task ends once every `LedgerHandle` has been dropped; await
    /// the returned join handle to be sure the tail of the file is flushed.
    pub async fn open(path: &Path) -> Result<(LedgerHandle, JoinHandle<()>)> {
        let has_content = match tokio::fs::metadata(path).await {
            Ok(meta) => meta.len() > 0,
            Err(_) => false,
        };

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map_err(|e| anyhow::anyhow!("Could not open ledger {}: {}", path.display(), e))?;

        if !has_content {
            file.write_all(format!("{LEDGER_HEADER}\n").as_bytes()).await?;
            file.flush().await?;
        }

        let (tx, rx) = mpsc::channel(64);
        let writer = tokio::spawn(writer_loop(file, rx));

        Ok((LedgerHandle { tx }, writer))
    }
}

async fn writer_loop(mut file: File, mut rx: mpsc::Receiver<Append>) {
    while let Some(Append { record, ack }) = rx.recv().await {
        let row = format_row(&record);
        let outcome = write_row(&mut file, &row).await;
        if let Err(e) = &outcome {
            error!(
                campaign = %record.campaign_id,
                "Ledger append failed after {WRITE_ATTEMPTS} attempts: {e:#}"
            );
        }
        // Receiver may have given up; nothing left to do then.
        let _ = ack.send(outcome);
    }
}

async fn write_row(file: &mut File, row: &str) -> Result<()> {
    let mut last_err = None;
    for attempt in 1..=WRITE_ATTEMPTS {
        let result = async {
            file.write_all(row.as_bytes()).await?;
            file.write_all(b"\n").await?;
            file.flush().await?;
            Ok::<(), std::io::Error>(())
        }
        .await;

        match result {
            Ok(()) => return Ok(()),
            Err(e) => {
                warn!(attempt, "Ledger write failed: {e}");
                last_err = Some(e);
                tokio::time::sleep(WRITE_RETRY_PAUSE).await;
            }
        }
    }

    Err(anyhow::anyhow!(
        "Ledger write failed: {}",
        last_err.expect("at least one attempt ran")
    ))
}

/// Render one record as a delimited row. Applied/skipped are empty for
/// RETRY and SKIPPED rows: no counts were finalized for a failed attempt.
pub fn format_row(record: &AttemptRecord) -> String {
    let (applied, skipped) = match record.counts {
        Some(c) => (c.applied.to_string(), c.skipped.to_string()),
        None => (String::new(), String::new()),
    };

    [
        csv_field(&record.timestamp),
        record.worker_id.to_string(),
        csv_field(record.campaign_id.as_str()),
        record.attempt.to_string(),
        applied,
        skipped,
        record.status.to_string(),
        csv_field(&record.message),
    ]
    .join(",")
}

fn csv_field(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}
