use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use anyhow::Result;
use serde_json::Value;
use tracing::info;

use crate::io::load_dataset;
use crate::models::{ProposalRecord, StageKind, StageStatus};

/// Text fields longer than this get a preview
pub const LONG_FIELD_CHARS: usize = 120;
/// Preview length
pub const PREVIEW_CHARS: usize = 400;

/// Per-stage record counts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub pending: usize,
    pub done: usize,
    pub failed: usize,
}

/// Long text field of the first record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPreview {
    pub key: String,
    pub chars: usize,
    pub preview: String,
}

/// Summary of a dataset file for debugging
#[derive(Debug, Clone, Default)]
pub struct InspectReport {
    pub total: usize,
    pub keys: Vec<String>,
    pub previews: Vec<FieldPreview>,
    pub stages: BTreeMap<StageKind, StatusCounts>,
}

impl InspectReport {
    pub fn from_records(records: &[ProposalRecord]) -> Result<Self> {
        let mut report = InspectReport {
            total: records.len(),
            ..Default::default()
        };

        if let Some(first) = records.first() {
            if let Value::Object(map) = serde_json::to_value(first)? {
                report.keys = map.keys().cloned().collect();
                report.keys.sort();
                for (key, value) in &map {
                    let Value::String(text) = value else { continue };
                    let chars = text.chars().count();
                    if chars > LONG_FIELD_CHARS {
                        report.previews.push(FieldPreview {
                            key: key.clone(),
                            chars,
                            preview: text.chars().take(PREVIEW_CHARS).collect(),
                        });
                    }
                }
            }
        }

        for stage in StageKind::ALL {
            let counts = report.stages.entry(stage).or_default();
            for record in records {
                match record.status(stage) {
                    StageStatus::Pending => counts.pending += 1,
                    StageStatus::Done => counts.done += 1,
                    StageStatus::Failed => counts.failed += 1,
                }
            }
        }

        Ok(report)
    }
}

impl fmt::Display for InspectReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Dataset Inspection")?;
        writeln!(f, "==================")?;
        writeln!(f, "Total proposals: {}", self.total)?;
        if self.total == 0 {
            return Ok(());
        }
        writeln!(f, "Keys: {:?}", self.keys)?;
        writeln!(f)?;

        writeln!(f, "Stage Status")?;
        writeln!(f, "------------")?;
        for (stage, counts) in &self.stages {
            writeln!(
                f,
                "{:<10} done {:>5}, failed {:>5}, pending {:>5}",
                stage.as_str(),
                counts.done,
                counts.failed,
                counts.pending
            )?;
        }

        if !self.previews.is_empty() {
            writeln!(f)?;
            writeln!(f, "Sample values")?;
            writeln!(f, "-------------")?;
            for field in &self.previews {
                writeln!(f)?;
                writeln!(f, "--- {} (len={}) ---", field.key, field.chars)?;
                writeln!(f, "{} ...", field.preview)?;
            }
        }
        Ok(())
    }
}

/// Load `path` and summarize it
pub fn execute_inspect(path: &Path) -> Result<InspectReport> {
    info!("Inspecting dataset {:?}", path);
    let records = load_dataset(path)?;
    InspectReport::from_records(&records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_counts_and_previews() {
        let long = "x".repeat(500);
        let records = vec![
            ProposalRecord {
                proposal_id: "F14-0001".to_string(),
                fund: 14,
                title_en: "Fix the bridge".to_string(),
                full_text_en: Some(long.clone()),
                about_structured_en: Some("## Overview".to_string()),
                ..Default::default()
            },
            ProposalRecord {
                proposal_id: "F14-0002".to_string(),
                fund: 14,
                title_en: "Wallet".to_string(),
                scrape_error: Some("404".to_string()),
                ..Default::default()
            },
        ];

        let report = InspectReport::from_records(&records).unwrap();

        assert_eq!(report.total, 2);
        assert!(report.keys.windows(2).all(|w| w[0] <= w[1]));
        assert!(report.keys.contains(&"full_text_en".to_string()));
        assert_eq!(report.previews.len(), 1);
        assert_eq!(report.previews[0].key, "full_text_en");
        assert_eq!(report.previews[0].chars, 500);
        assert_eq!(report.previews[0].preview.chars().count(), PREVIEW_CHARS);

        let scrape = &report.stages[&StageKind::Scrape];
        assert_eq!((scrape.done, scrape.failed, scrape.pending), (1, 1, 0));
        let structure = &report.stages[&StageKind::Structure];
        assert_eq!((structure.done, structure.pending), (1, 1));

        let text = report.to_string();
        assert!(text.contains("Total proposals: 2"));
        assert!(text.contains("--- full_text_en (len=500) ---"));
    }

    #[test]
    fn test_wrapped_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ja.json");
        std::fs::write(
            &path,
            r#"{"proposals": [{"proposal_id": "F14-0001", "title_ja": "橋"}]}"#,
        )
        .unwrap();

        let report = execute_inspect(&path).unwrap();
        assert_eq!(report.total, 1);
        assert!(report.keys.contains(&"title_ja".to_string()));
        assert!(report.previews.is_empty());
    }
}
