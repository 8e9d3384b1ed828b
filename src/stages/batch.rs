use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::config::BatchSettings;
use crate::io::save_dataset;
use crate::models::{ProposalRecord, StageKind, StageStatus};

/// Per-record unit of work of a resumable stage
#[async_trait]
pub trait RecordTask: Send + Sync {
    type Input: Send;
    type Output: Send;

    fn stage(&self) -> StageKind;

    /// What to send for this record, or `None` when it has nothing to work on
    fn input(&self, record: &ProposalRecord) -> Option<Self::Input>;

    /// The external call
    async fn run(&self, input: Self::Input) -> Result<Self::Output>;

    /// Store a successful result on the record
    fn apply(&self, record: &mut ProposalRecord, output: Self::Output);
}

/// Limits and checkpointing for one batch invocation
#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    /// Maximum external calls (`None` = no cap)
    pub max_items: Option<usize>,
    /// Pause between calls
    pub delay: Duration,
    /// Write a checkpoint after this many attempted records (0 = never)
    pub checkpoint_every: usize,
    /// Where checkpoints go
    pub checkpoint_path: Option<PathBuf>,
    /// Process records that failed on an earlier run
    pub retry_failed: bool,
    /// Restrict the batch to one proposal id
    pub only_id: Option<String>,
}

impl BatchOptions {
    pub fn from_settings(settings: &BatchSettings) -> Self {
        Self {
            max_items: settings.max_items,
            delay: settings.delay(),
            checkpoint_every: settings.checkpoint_every,
            ..Default::default()
        }
    }
}

/// Counts from one batch invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// External calls made
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Skipped because the stage is already done
    pub already_done: usize,
    /// Skipped because an earlier run failed and retry was not requested
    pub skipped_failed: usize,
    /// Skipped because there was nothing to send
    pub no_input: usize,
    /// Whether the item cap stopped the run early
    pub capped: bool,
}

/// Run `task` over `records`, skipping finished ones.
///
/// A failing record is marked and the loop moves on; nothing is retried
/// within a run.
pub async fn run_batch<T: RecordTask>(
    task: &T,
    records: &mut [ProposalRecord],
    options: &BatchOptions,
) -> Result<BatchReport> {
    let stage = task.stage();
    let total = records.len();
    let mut report = BatchReport::default();

    if let Some(only) = &options.only_id {
        if !records.iter().any(|r| &r.proposal_id == only) {
            anyhow::bail!("proposal_id not found: {}", only);
        }
    }

    for index in 0..total {
        let record = &records[index];
        if let Some(only) = &options.only_id {
            if &record.proposal_id != only {
                continue;
            }
        }

        match record.status(stage) {
            StageStatus::Done => {
                debug!("{}: {} already done, skip", record.proposal_id, stage.as_str());
                report.already_done += 1;
                continue;
            }
            StageStatus::Failed if !options.retry_failed => {
                debug!(
                    "{}: {} failed earlier ({}), skip",
                    record.proposal_id,
                    stage.as_str(),
                    record.error_marker(stage).unwrap_or("no detail")
                );
                report.skipped_failed += 1;
                continue;
            }
            _ => {}
        }

        let Some(input) = task.input(record) else {
            debug!("{}: nothing to send for {}, skip", record.proposal_id, stage.as_str());
            report.no_input += 1;
            continue;
        };

        if options.max_items.is_some_and(|max| report.attempted >= max) {
            info!(
                "Reached max items ({}), stopping {}",
                report.attempted,
                stage.as_str()
            );
            report.capped = true;
            break;
        }

        if report.attempted > 0 && !options.delay.is_zero() {
            tokio::time::sleep(options.delay).await;
        }

        report.attempted += 1;
        info!(
            "[{}/{}] {}: running {}",
            index + 1,
            total,
            records[index].proposal_id,
            stage.as_str()
        );

        match task.run(input).await {
            Ok(output) => {
                let record = &mut records[index];
                task.apply(record, output);
                record.mark_done(stage);
                report.succeeded += 1;
            }
            Err(e) => {
                let record = &mut records[index];
                warn!("{}: {} failed: {:#}", record.proposal_id, stage.as_str(), e);
                record.mark_failed(stage, format!("{:#}", e));
                report.failed += 1;
            }
        }

        if options.checkpoint_every > 0 && report.attempted % options.checkpoint_every == 0 {
            if let Some(path) = &options.checkpoint_path {
                save_dataset(path, records)?;
                info!("Checkpoint saved to {:?}", path);
            }
        }
    }

    info!(
        "{}: {} attempted, {} succeeded, {} failed, {} already done, {} skipped after earlier failure, {} without input",
        stage.as_str(),
        report.attempted,
        report.succeeded,
        report.failed,
        report.already_done,
        report.skipped_failed,
        report.no_input
    );

    Ok(report)
}
