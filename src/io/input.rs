use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::warn;

use crate::error::PrepError;
use crate::models::{ProposalRecord, RawRow};

/// Accepted on-disk shapes of a dataset
#[derive(Deserialize)]
#[serde(untagged)]
enum DatasetFile {
    Records(Vec<ProposalRecord>),
    Wrapped { proposals: Vec<ProposalRecord> },
}

/// Fail with "file not found" before attempting to read `path`
pub fn require_file(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(PrepError::FileNotFound(path.to_path_buf()).into());
    }
    Ok(())
}

/// Load a dataset file (a JSON array, or `{"proposals": [...]}`)
pub fn load_dataset(path: &Path) -> Result<Vec<ProposalRecord>> {
    require_file(path)?;
    let content =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read file: {:?}", path))?;
    parse_dataset(&content).map_err(|e| {
        PrepError::MalformedDataset {
            path: path.to_path_buf(),
            reason: e.to_string(),
        }
        .into()
    })
}

/// Parse dataset JSON
pub fn parse_dataset(json: &str) -> serde_json::Result<Vec<ProposalRecord>> {
    let file: DatasetFile = serde_json::from_str(json)?;
    Ok(match file {
        DatasetFile::Records(records) => records,
        DatasetFile::Wrapped { proposals } => proposals,
    })
}

/// Load raw spreadsheet rows written by the ingest stage
pub fn load_raw_rows(path: &Path) -> Result<Vec<RawRow>> {
    require_file(path)?;
    let content =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read file: {:?}", path))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse raw rows: {:?}", path))
}

/// Previous output of a stage, keyed by proposal id.
///
/// A missing file yields an empty cache. A malformed file is logged and
/// discarded so every record is treated as unprocessed.
pub fn load_reuse_cache(path: &Path) -> HashMap<String, ProposalRecord> {
    if !path.exists() {
        return HashMap::new();
    }
    match load_dataset(path) {
        Ok(records) => records
            .into_iter()
            .map(|r| (r.proposal_id.clone(), r))
            .collect(),
        Err(e) => {
            warn!("Ignoring previous output {:?}: {:#}", path, e);
            HashMap::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dataset_array() {
        let json = r#"[{"proposal_id": "F14-0001", "fund": 14, "title_en": "A"}]"#;
        let records = parse_dataset(json).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].title_en, "A");
    }

    #[test]
    fn test_parse_dataset_wrapped() {
        let json = r#"{"proposals": [{"proposal_id": "F14-0001"}, {"proposal_id": "F14-0002"}]}"#;
        let records = parse_dataset(json).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].proposal_id, "F14-0002");
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_dataset(Path::new("/nonexistent/f14.json")).unwrap_err();
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_malformed_cache_is_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f14_proposals_ja.json");
        std::fs::write(&path, "[{\"proposal_id\": \"F14-0001\", ").unwrap();

        assert!(load_reuse_cache(&path).is_empty());
    }

    #[test]
    fn test_cache_keyed_by_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f14_proposals_ja.json");
        std::fs::write(
            &path,
            r#"[{"proposal_id": "F14-0007", "title_ja": "橋の修理"}]"#,
        )
        .unwrap();

        let cache = load_reuse_cache(&path);
        assert_eq!(cache["F14-0007"].title_ja.as_deref(), Some("橋の修理"));
    }
}
