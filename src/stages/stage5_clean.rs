use std::path::Path;

use anyhow::Result;
use clap::ValueEnum;
use tracing::{debug, info};

use crate::io::{backup_timestamped, load_dataset, save_dataset};
use crate::models::ProposalRecord;

/// Backup label written before every clean run
pub const CLEAN_BACKUP_LABEL: &str = "before_clean";

const IDEOGRAPHIC_SPACE: char = '\u{3000}';
const DASHES: [char; 5] = ['-', '\u{2010}', '\u{2013}', '\u{2014}', '\u{2015}'];

/// Repair passes over the Japanese dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CleanPass {
    /// Remove U+3000 from every text field
    StripFullwidth,
    /// Move extra lines of a multi-line title into the summary
    SplitTitles,
    /// Recover placeholder titles from the first summary line
    RestoreTitles,
}

impl CleanPass {
    pub const ALL: [CleanPass; 3] = [
        CleanPass::StripFullwidth,
        CleanPass::SplitTitles,
        CleanPass::RestoreTitles,
    ];
}

/// Number of records each pass changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanReport {
    pub stripped: usize,
    pub split: usize,
    pub restored: usize,
}

/// A title that carries no content: empty or dashes only
pub fn is_placeholder_title(title: &str) -> bool {
    title.trim().chars().all(|c| DASHES.contains(&c))
}

/// Remove ideographic spaces from every text field
pub fn strip_fullwidth(record: &mut ProposalRecord) -> bool {
    let mut changed = false;
    record.for_each_text_mut(|text| {
        if text.contains(IDEOGRAPHIC_SPACE) {
            text.retain(|c| c != IDEOGRAPHIC_SPACE);
            changed = true;
        }
    });
    changed
}

/// Keep the first line of a multi-line `title_ja`, prepend the rest to
/// `summary_ja`
pub fn split_multiline_title(record: &mut ProposalRecord) -> bool {
    let Some(title) = record.title_ja.as_deref() else {
        return false;
    };
    let Some((first, rest)) = title.trim().split_once('\n') else {
        return false;
    };

    let first = first.trim().to_string();
    let rest = rest.trim().to_string();
    record.title_ja = Some(first);

    if !rest.is_empty() {
        let summary = record.summary_ja.as_deref().unwrap_or("").trim();
        record.summary_ja = Some(if summary.is_empty() {
            rest
        } else {
            format!("{}\n\n{}", rest, summary)
        });
    }
    true
}

/// Replace a placeholder `title_ja` with the first non-empty summary line
pub fn restore_title_from_summary(record: &mut ProposalRecord) -> bool {
    if !record.title_ja.as_deref().is_none_or(is_placeholder_title) {
        return false;
    }
    let Some(summary) = record.summary_ja.as_deref() else {
        return false;
    };

    let mut lines = summary.lines().map(str::trim).filter(|l| !l.is_empty());
    let Some(title) = lines.next() else {
        return false;
    };
    let title = title.to_string();
    let rest = lines.collect::<Vec<_>>().join("\n");

    record.title_ja = Some(title);
    record.summary_ja = Some(rest);
    true
}

/// Run the selected passes over `records`, in the fixed pass order
pub fn clean_records(records: &mut [ProposalRecord], passes: &[CleanPass]) -> CleanReport {
    let mut report = CleanReport::default();
    for pass in CleanPass::ALL {
        if !passes.contains(&pass) {
            continue;
        }
        for record in records.iter_mut() {
            let changed = match pass {
                CleanPass::StripFullwidth => strip_fullwidth(record),
                CleanPass::SplitTitles => split_multiline_title(record),
                CleanPass::RestoreTitles => restore_title_from_summary(record),
            };
            if !changed {
                continue;
            }
            debug!("{}: {:?} applied", record.proposal_id, pass);
            match pass {
                CleanPass::StripFullwidth => report.stripped += 1,
                CleanPass::SplitTitles => report.split += 1,
                CleanPass::RestoreTitles => report.restored += 1,
            }
        }
    }
    report
}

/// Execute the clean stage: back up `input`, repair, write to `output`
/// (or back to `input`)
pub fn execute_clean(
    input: &Path,
    output: Option<&Path>,
    passes: &[CleanPass],
) -> Result<CleanReport> {
    info!("Loading dataset from {:?}", input);
    let mut records = load_dataset(input)?;

    let backup = backup_timestamped(input, CLEAN_BACKUP_LABEL)?;
    info!("Backup created: {:?}", backup);

    let report = clean_records(&mut records, passes);
    info!(
        "Clean: {} records stripped of U+3000, {} titles split, {} titles restored",
        report.stripped, report.split, report.restored
    );

    let output = output.unwrap_or(input);
    save_dataset(output, &records)?;
    info!("Dataset written to {:?}", output);
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(title_ja: &str, summary_ja: &str) -> ProposalRecord {
        ProposalRecord {
            proposal_id: "F14-0001".to_string(),
            fund: 14,
            title_en: "Fix the bridge".to_string(),
            title_ja: Some(title_ja.to_string()),
            summary_ja: Some(summary_ja.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_placeholder_titles() {
        assert!(is_placeholder_title(""));
        assert!(is_placeholder_title("  ---  "));
        assert!(is_placeholder_title("—"));
        assert!(is_placeholder_title("‐–―"));
        assert!(!is_placeholder_title("橋の修理"));
        assert!(!is_placeholder_title("- 橋"));
    }

    #[test]
    fn test_strip_fullwidth_keeps_ascii_spaces() {
        let mut r = record("橋の\u{3000}修理 2025", "壊れた\u{3000}橋");
        r.extra
            .insert("notes_ja".to_string(), serde_json::Value::from("メモ\u{3000}"));

        assert!(strip_fullwidth(&mut r));

        assert_eq!(r.title_ja.as_deref(), Some("橋の修理 2025"));
        assert_eq!(r.summary_ja.as_deref(), Some("壊れた橋"));
        assert_eq!(r.extra["notes_ja"], "メモ");
        assert!(!strip_fullwidth(&mut r));
    }

    #[test]
    fn test_dash_title_restored_from_summary() {
        let mut r = record("---", "橋の修理\n\n古い橋を直します。\n  予算は少ないです。  ");

        assert!(restore_title_from_summary(&mut r));

        assert_eq!(r.title_ja.as_deref(), Some("橋の修理"));
        assert_eq!(
            r.summary_ja.as_deref(),
            Some("古い橋を直します。\n予算は少ないです。")
        );
        assert!(!restore_title_from_summary(&mut r));
    }

    #[test]
    fn test_placeholder_with_empty_summary_untouched() {
        let mut r = record("—", "  ");
        assert!(!restore_title_from_summary(&mut r));
        assert_eq!(r.title_ja.as_deref(), Some("—"));
    }

    #[test]
    fn test_split_multiline_title() {
        let mut r = record("橋の修理\n古い橋の補修計画", "予算は少ないです。");

        assert!(split_multiline_title(&mut r));

        assert_eq!(r.title_ja.as_deref(), Some("橋の修理"));
        assert_eq!(
            r.summary_ja.as_deref(),
            Some("古い橋の補修計画\n\n予算は少ないです。")
        );
        assert!(!split_multiline_title(&mut r));
    }

    #[test]
    fn test_passes_are_idempotent() {
        let mut records = vec![
            record("---", "タイトル\u{3000}A\n本文"),
            record("B\nつづき", ""),
            record("C", "ok"),
        ];

        let first = clean_records(&mut records, &CleanPass::ALL);
        assert_eq!(
            first,
            CleanReport {
                stripped: 1,
                split: 1,
                restored: 1
            }
        );
        assert_eq!(records[0].title_ja.as_deref(), Some("タイトルA"));
        assert_eq!(records[1].summary_ja.as_deref(), Some("つづき"));

        let snapshot = records.clone();
        assert_eq!(clean_records(&mut records, &CleanPass::ALL), CleanReport::default());
        assert_eq!(records, snapshot);
    }

    #[test]
    fn test_execute_clean_writes_backup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f14_proposals_ja.json");
        std::fs::write(
            &path,
            r#"[{"proposal_id": "F14-0001", "fund": 14, "title_ja": "―", "summary_ja": "橋　の修理\n本文"}]"#,
        )
        .unwrap();

        let report = execute_clean(&path, None, &[CleanPass::RestoreTitles]).unwrap();
        assert_eq!(report.restored, 1);
        assert_eq!(report.stripped, 0);

        let records = load_dataset(&path).unwrap();
        assert_eq!(records[0].title_ja.as_deref(), Some("橋\u{3000}の修理"));

        let backups: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|name| name.starts_with("f14_proposals_ja.before_clean."))
            .collect();
        assert_eq!(backups.len(), 1);
    }
}
