use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;
use serde::Serialize;

use crate::models::ProposalRecord;

/// Write `value` as 2-space indented JSON.
///
/// The content goes to a sibling `.tmp` file first and is renamed over
/// `path`, so an interrupted run never leaves a truncated dataset behind.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {:?}", parent))?;
        }
    }

    let tmp = sibling(path, "tmp");
    {
        let mut file = std::fs::File::create(&tmp)
            .with_context(|| format!("Failed to create file: {:?}", tmp))?;
        serde_json::to_writer_pretty(&mut file, value).context("Failed to write JSON")?;
        writeln!(file)?;
        file.sync_all()?;
    }
    std::fs::rename(&tmp, path)
        .with_context(|| format!("Failed to replace {:?} with {:?}", path, tmp))?;
    Ok(())
}

/// Write a whole dataset
pub fn save_dataset(path: &Path, records: &[ProposalRecord]) -> Result<()> {
    write_json(path, records)
}

/// `data/f14_proposals_ja.json` + `before_clean` -> `data/f14_proposals_ja.before_clean.json`
pub fn backup_path(path: &Path, label: &str) -> PathBuf {
    sibling(path, label)
}

fn sibling(path: &Path, label: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{}.{}.{}", stem, label, ext.to_string_lossy()),
        None => format!("{}.{}", stem, label),
    };
    path.with_file_name(name)
}

/// Copy `path` to `<stem>.<label>.json` unless that backup already exists.
///
/// Returns the backup path when one was written.
pub fn backup_once(path: &Path, label: &str) -> Result<Option<PathBuf>> {
    let backup = backup_path(path, label);
    if backup.exists() {
        return Ok(None);
    }
    std::fs::copy(path, &backup)
        .with_context(|| format!("Failed to back up {:?} to {:?}", path, backup))?;
    Ok(Some(backup))
}

/// Copy `path` to `<stem>.<label>.<timestamp>.json`
pub fn backup_timestamped(path: &Path, label: &str) -> Result<PathBuf> {
    let stamp = Local::now().format("%Y%m%dT%H%M%S");
    let backup = backup_path(path, &format!("{label}.{stamp}"));
    std::fs::copy(path, &backup)
        .with_context(|| format!("Failed to back up {:?} to {:?}", path, backup))?;
    Ok(backup)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::load_dataset;

    #[test]
    fn test_backup_path() {
        assert_eq!(
            backup_path(Path::new("data/f14_proposals_ja.json"), "backup"),
            PathBuf::from("data/f14_proposals_ja.backup.json")
        );
    }

    #[test]
    fn test_write_json_keeps_unicode_unescaped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        let record = ProposalRecord {
            proposal_id: "F14-0001".to_string(),
            title_ja: Some("橋の修理".to_string()),
            ..Default::default()
        };

        save_dataset(&path, &[record.clone()]).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("橋の修理"));
        assert!(text.contains("\n  {"));
        assert!(!dir.path().join("out.tmp.json").exists());
        assert_eq!(load_dataset(&path).unwrap(), vec![record]);
    }

    #[test]
    fn test_backup_once_does_not_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f14.json");
        std::fs::write(&path, "[1]").unwrap();

        let first = backup_once(&path, "before_structured").unwrap();
        assert!(first.is_some());

        std::fs::write(&path, "[2]").unwrap();
        assert!(backup_once(&path, "before_structured").unwrap().is_none());

        let backup = std::fs::read_to_string(dir.path().join("f14.before_structured.json")).unwrap();
        assert_eq!(backup, "[1]");
    }

    #[test]
    fn test_backup_timestamped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f14.json");
        std::fs::write(&path, "[]").unwrap();

        let backup = backup_timestamped(&path, "before_clean").unwrap();
        let name = backup.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("f14.before_clean."));
        assert!(name.ends_with(".json"));
        assert_eq!(std::fs::read_to_string(backup).unwrap(), "[]");
    }
}
