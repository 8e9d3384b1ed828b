use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::PrepError;

/// Everything a stage needs to know about files, columns and limits.
///
/// Built once in `main` (defaults, then an optional JSON file, then CLI
/// overrides) and passed by reference into every stage entry point.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Directory all relative file names are resolved against
    pub data_dir: PathBuf,
    /// Fund number, used in proposal ids (`F14-0001`)
    pub fund: u32,
    pub files: FileLayout,
    pub columns: ColumnMap,
    /// Workbook sheets that are never ingested
    pub skip_sheets: Vec<String>,
    /// Display labels for truncated sheet names, applied by the merge stage
    pub challenge_labels: BTreeMap<String, String>,
    pub llm: LlmSettings,
    pub scrape: BatchSettings,
    pub structure: BatchSettings,
    pub translate: BatchSettings,
    pub multilang: BatchSettings,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let challenge_labels = [
            (
                "Cardano Use Cases Partners & Pr",
                "Cardano Use Cases: Partners & Products",
            ),
            ("Cardano Use Cases Concept", "Cardano Use Cases: Concept"),
            ("Cardano Open Developers", "Cardano Open: Developers"),
            ("Cardano Open Ecosystem", "Cardano Open: Ecosystem"),
            ("Sponsored by leftovers", "Sponsored by leftovers"),
            ("Withdrawn", "Withdrawn"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            data_dir: PathBuf::from("data"),
            fund: 14,
            files: FileLayout::default(),
            columns: ColumnMap::default(),
            skip_sheets: vec!["Template".to_string(), "テンプレート".to_string()],
            challenge_labels,
            llm: LlmSettings::default(),
            scrape: BatchSettings {
                max_items: None,
                delay_ms: 1000,
                checkpoint_every: 10,
            },
            structure: BatchSettings {
                max_items: Some(10),
                delay_ms: 1000,
                checkpoint_every: 5,
            },
            translate: BatchSettings {
                max_items: None,
                delay_ms: 500,
                checkpoint_every: 10,
            },
            multilang: BatchSettings {
                max_items: None,
                delay_ms: 500,
                checkpoint_every: 10,
            },
        }
    }
}

impl PipelineConfig {
    /// Load defaults, overlaid by the JSON file at `path` when given
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        if !path.exists() {
            return Err(PrepError::FileNotFound(path.to_path_buf()).into());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {:?}", path))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config: {:?}", path))
    }

    /// Resolve a file name against the data directory
    pub fn path(&self, file: &str) -> PathBuf {
        let candidate = Path::new(file);
        if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.data_dir.join(candidate)
        }
    }

    /// Proposal id for the raw row at zero-based `index`
    pub fn proposal_id(&self, index: usize) -> String {
        format!("F{}-{:04}", self.fund, index + 1)
    }
}

/// File names of each pipeline artifact, relative to `data_dir`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileLayout {
    pub source: String,
    pub raw_rows: String,
    pub proposals_en: String,
    pub proposals_ja: String,
    pub proposals_multi: String,
    pub site: String,
}

impl Default for FileLayout {
    fn default() -> Self {
        Self {
            source: "f14_results.xlsx".to_string(),
            raw_rows: "f14_results_raw.json".to_string(),
            proposals_en: "f14_proposals_en.json".to_string(),
            proposals_ja: "f14_proposals_ja.json".to_string(),
            proposals_multi: "f14_proposals_multi.json".to_string(),
            site: "f14_site.json".to_string(),
        }
    }
}

/// Spreadsheet column names feeding each record field
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnMap {
    pub title: String,
    pub challenge: String,
    pub summary: String,
    pub requested: String,
    pub votes_cast: String,
    pub yes: String,
    pub abstain: String,
    pub fund_depletion: String,
    pub status: String,
    pub meets_approval_threshold: String,
    pub not_funded_reason: String,
    pub url: String,
}

impl Default for ColumnMap {
    fn default() -> Self {
        Self {
            title: "Proposal".to_string(),
            challenge: "Challenge".to_string(),
            summary: "Summary".to_string(),
            requested: "Requested Ada".to_string(),
            votes_cast: "Votes Cast".to_string(),
            yes: "Yes".to_string(),
            abstain: "Abstain".to_string(),
            fund_depletion: "Fund Depletion".to_string(),
            status: "Status".to_string(),
            meets_approval_threshold: "Meets Approval Threshold".to_string(),
            not_funded_reason: "Reason for not funded".to_string(),
            url: "Proposal URL".to_string(),
        }
    }
}

/// Text generation service settings (the key itself comes from the environment)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub model: String,
    pub base_url: String,
    pub structure_temperature: f64,
    pub translate_temperature: f64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4.1-mini".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            structure_temperature: 0.3,
            translate_temperature: 0.2,
        }
    }
}

/// Self-imposed limits for a batch stage
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchSettings {
    /// Maximum external calls per invocation (`None` = no cap)
    pub max_items: Option<usize>,
    /// Pause between calls
    pub delay_ms: u64,
    /// Write the dataset after this many attempted records (0 = never)
    pub checkpoint_every: usize,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            max_items: None,
            delay_ms: 1000,
            checkpoint_every: 10,
        }
    }
}

impl BatchSettings {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}
