use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::config::{ColumnMap, PipelineConfig};
use crate::io::{load_dataset, load_raw_rows, save_dataset};
use crate::models::{ProposalRecord, RawRow};
use crate::normalize::{normalize_currency, normalize_number, normalize_text};

/// Result of the shape stage
#[derive(Debug)]
pub struct ShapeResult {
    pub records: Vec<ProposalRecord>,
    /// Rows without a title (totals, footers)
    pub dropped: usize,
    /// Records whose enrichment was carried over from the existing dataset
    pub carried_over: usize,
}

/// Map raw rows to proposal records; rows without a title are dropped.
///
/// The id comes from the row position, so dropped rows still consume one.
pub fn shape_rows(rows: &[RawRow], config: &PipelineConfig) -> (Vec<ProposalRecord>, usize) {
    let mut records = Vec::with_capacity(rows.len());
    let mut dropped = 0;

    for (index, row) in rows.iter().enumerate() {
        match shape_row(row, index, config) {
            Some(record) => records.push(record),
            None => {
                debug!("Row {} has no title, dropped", index + 1);
                dropped += 1;
            }
        }
    }

    (records, dropped)
}

/// Shape one raw row, or `None` when its title is empty
pub fn shape_row(row: &RawRow, index: usize, config: &PipelineConfig) -> Option<ProposalRecord> {
    let columns: &ColumnMap = &config.columns;
    let text = |column: &str| normalize_text(row.get(column));
    let optional = |column: &str, f: fn(&str) -> String| -> Option<String> {
        row.get(column).map(|v| f(&normalize_text(Some(v))))
    };

    let title = text(&columns.title);
    if title.is_empty() {
        return None;
    }

    Some(ProposalRecord {
        proposal_id: config.proposal_id(index),
        fund: config.fund,
        challenge: text(&columns.challenge),
        title_en: title,
        summary_en: text(&columns.summary),
        requested_ada: Some(normalize_currency(&text(&columns.requested))),
        votes_cast: optional(&columns.votes_cast, normalize_number),
        yes_amount: optional(&columns.yes, normalize_currency),
        abstain_amount: optional(&columns.abstain, normalize_currency),
        fund_depletion: optional(&columns.fund_depletion, normalize_currency),
        status: optional(&columns.status, str::to_string),
        meets_approval_threshold: optional(&columns.meets_approval_threshold, str::to_string),
        not_funded_reason: optional(&columns.not_funded_reason, str::to_string),
        proposal_url: optional(&columns.url, str::to_string),
        ..Default::default()
    })
}

/// Execute the shape stage: raw rows to the English dataset.
///
/// When `output` already holds a dataset, records with the same id keep the
/// fields later stages added and only the spreadsheet fields are refreshed.
/// An unreadable `output` is an error and is left untouched.
pub fn execute_shape(config: &PipelineConfig, input: &Path, output: &Path) -> Result<ShapeResult> {
    info!("Loading raw rows from {:?}", input);
    let rows = load_raw_rows(input)?;
    let (shaped, dropped) = shape_rows(&rows, config);
    info!("Shaped {} records ({} rows without title dropped)", shaped.len(), dropped);

    let mut existing: HashMap<String, ProposalRecord> = if output.exists() {
        load_dataset(output)
            .with_context(|| format!("Refusing to overwrite unreadable dataset {:?}", output))?
            .into_iter()
            .map(|r| (r.proposal_id.clone(), r))
            .collect()
    } else {
        HashMap::new()
    };
    let mut carried_over = 0;
    let records: Vec<ProposalRecord> = shaped
        .into_iter()
        .map(|record| match existing.remove(&record.proposal_id) {
            Some(mut previous) => {
                previous.refresh_shaped(record);
                carried_over += 1;
                previous
            }
            None => record,
        })
        .collect();

    if carried_over > 0 {
        info!("Kept enrichment of {} existing records", carried_over);
    }

    save_dataset(output, &records)?;
    info!("English dataset written to {:?}", output);

    Ok(ShapeResult {
        records,
        dropped,
        carried_over,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: serde_json::Value) -> RawRow {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_shape_scenario() {
        let config = PipelineConfig::default();
        let rows = vec![row(json!({"Proposal": "Fix the bridge", "Requested Ada": "739000"}))];

        let (records, dropped) = shape_rows(&rows, &config);

        assert_eq!(dropped, 0);
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.proposal_id, "F14-0001");
        assert_eq!(r.fund, 14);
        assert_eq!(r.title_en, "Fix the bridge");
        assert_eq!(r.requested_ada.as_deref(), Some("₳739,000"));
        assert_eq!(r.challenge, "");
        assert_eq!(r.summary_en, "");
    }

    #[test]
    fn test_rows_without_title_are_dropped() {
        let config = PipelineConfig::default();
        let rows = vec![
            row(json!({"Proposal": "A", "Requested Ada": 1000})),
            row(json!({"Proposal": null, "Requested Ada": 5000000})),
            row(json!({"Proposal": "nan"})),
            row(json!({"Proposal": "  B  ", "Challenge": "Cardano Open Developers"})),
        ];

        let (records, dropped) = shape_rows(&rows, &config);

        assert_eq!(dropped, 2);
        assert!(records.iter().all(|r| !r.title_en.is_empty()));
        let ids: Vec<&str> = records.iter().map(|r| r.proposal_id.as_str()).collect();
        assert_eq!(ids, vec!["F14-0001", "F14-0004"]);
        assert_eq!(records[1].title_en, "B");
        assert_eq!(records[1].challenge, "Cardano Open Developers");
    }

    #[test]
    fn test_voting_columns_normalized() {
        let config = PipelineConfig::default();
        let r = shape_row(
            &row(json!({
                "Proposal": "Wallet",
                "Requested Ada": "₳120,000",
                "Votes Cast": 1523,
                "Yes": 45000000.0,
                "Abstain": "nan",
                "Status": "FUNDED",
                "Proposal URL": "https://projectcatalyst.io/funds/14/x"
            })),
            0,
            &config,
        )
        .unwrap();

        assert_eq!(r.requested_ada.as_deref(), Some("₳120,000"));
        assert_eq!(r.votes_cast.as_deref(), Some("1,523"));
        assert_eq!(r.yes_amount.as_deref(), Some("₳45,000,000"));
        assert_eq!(r.abstain_amount.as_deref(), Some(""));
        assert_eq!(r.status.as_deref(), Some("FUNDED"));
        assert!(r.fund_depletion.is_none());
        assert_eq!(
            r.proposal_url.as_deref(),
            Some("https://projectcatalyst.io/funds/14/x")
        );
    }

    #[test]
    fn test_reshape_keeps_enrichment() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("raw.json");
        let output = dir.path().join("en.json");
        std::fs::write(
            &input,
            r#"[{"Proposal": "Fix the bridge", "Requested Ada": "739000"}]"#,
        )
        .unwrap();
        std::fs::write(
            &output,
            r###"[{"proposal_id": "F14-0001", "fund": 14, "title_en": "Old", "about_structured_en": "## Overview", "notes_en": "kept"}]"###,
        )
        .unwrap();

        let result = execute_shape(&PipelineConfig::default(), &input, &output).unwrap();

        assert_eq!(result.carried_over, 1);
        let r = &result.records[0];
        assert_eq!(r.title_en, "Fix the bridge");
        assert_eq!(r.about_structured_en.as_deref(), Some("## Overview"));
        assert_eq!(r.extra["notes_en"], "kept");
    }

    #[test]
    fn test_malformed_existing_dataset_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("raw.json");
        let output = dir.path().join("en.json");
        std::fs::write(&input, r#"[{"Proposal": "Fix the bridge"}]"#).unwrap();
        let hand_edited = r#"[{"proposal_id": "F14-0001", "full_text_en": "scraped",}]"#;
        std::fs::write(&output, hand_edited).unwrap();

        let err = execute_shape(&PipelineConfig::default(), &input, &output).unwrap_err();

        assert!(format!("{:#}", err).contains("malformed dataset"));
        assert_eq!(std::fs::read_to_string(&output).unwrap(), hand_edited);
    }
}
