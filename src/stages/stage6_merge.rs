use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::{info, warn};

use crate::io::{load_dataset, save_dataset};
use crate::models::ProposalRecord;

/// Result of the merge stage
#[derive(Debug)]
pub struct MergeResult {
    pub records: Vec<ProposalRecord>,
    /// Japanese records without an English counterpart
    pub unmatched: usize,
}

/// Merge one English record under its Japanese counterpart.
///
/// Every key present on the Japanese record wins; keys only the English
/// record carries are kept.
pub fn merge_record(en: Option<&ProposalRecord>, ja: &ProposalRecord) -> Result<ProposalRecord> {
    let mut merged = match en {
        Some(en) => to_object(en)?,
        None => serde_json::Map::new(),
    };
    merged.extend(to_object(ja)?);
    serde_json::from_value(Value::Object(merged))
        .with_context(|| format!("Failed to merge record {}", ja.proposal_id))
}

fn to_object(record: &ProposalRecord) -> Result<serde_json::Map<String, Value>> {
    match serde_json::to_value(record)? {
        Value::Object(map) => Ok(map),
        other => anyhow::bail!("record serialized to {other}, expected an object"),
    }
}

/// Display label for a challenge, or the name itself when unmapped
pub fn challenge_label<'a>(challenge: &'a str, labels: &'a BTreeMap<String, String>) -> &'a str {
    labels.get(challenge).map(String::as_str).unwrap_or(challenge)
}

/// Japanese order, English underlay, challenge names mapped to labels
pub fn merge_site(
    en: &[ProposalRecord],
    ja: &[ProposalRecord],
    labels: &BTreeMap<String, String>,
) -> Result<MergeResult> {
    let by_id: HashMap<&str, &ProposalRecord> =
        en.iter().map(|r| (r.proposal_id.as_str(), r)).collect();

    let mut unmatched = 0;
    let mut records = Vec::with_capacity(ja.len());
    for jp in ja {
        let base = by_id.get(jp.proposal_id.as_str()).copied();
        if base.is_none() {
            warn!("{}: no English record to merge", jp.proposal_id);
            unmatched += 1;
        }
        let mut merged = merge_record(base, jp)?;
        merged.challenge = challenge_label(&merged.challenge, labels).to_string();
        records.push(merged);
    }

    Ok(MergeResult { records, unmatched })
}

/// Execute the merge stage: English + Japanese datasets to the site dataset
pub fn execute_merge(
    en_path: &Path,
    ja_path: &Path,
    output: &Path,
    labels: &BTreeMap<String, String>,
) -> Result<MergeResult> {
    info!("Loading English dataset from {:?}", en_path);
    let en = load_dataset(en_path)?;
    info!("Loading Japanese dataset from {:?}", ja_path);
    let ja = load_dataset(ja_path)?;

    let result = merge_site(&en, &ja, labels)?;
    info!(
        "Merged {} records ({} without English counterpart)",
        result.records.len(),
        result.unmatched
    );

    save_dataset(output, &result.records)?;
    info!("Site dataset written to {:?}", output);
    Ok(result)
}
