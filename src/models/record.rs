use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Raw spreadsheet row: column name to cell value, in header order
pub type RawRow = serde_json::Map<String, Value>;

/// Pipeline stages that track per-record progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    /// Web content extraction
    Scrape,
    /// LLM structured summary
    Structure,
    /// Title/summary translation
    Translate,
    /// Structured summary translation and simplification
    Multilang,
}

impl StageKind {
    pub const ALL: [StageKind; 4] = [
        StageKind::Scrape,
        StageKind::Structure,
        StageKind::Translate,
        StageKind::Multilang,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StageKind::Scrape => "scrape",
            StageKind::Structure => "structure",
            StageKind::Translate => "translate",
            StageKind::Multilang => "multilang",
        }
    }
}

/// Progress of one record through one stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Pending,
    Done,
    Failed,
}

/// One grant proposal, enriched in place by successive stages
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProposalRecord {
    pub proposal_id: String,
    #[serde(default)]
    pub fund: u32,
    #[serde(default)]
    pub challenge: String,
    #[serde(default)]
    pub title_en: String,
    #[serde(default)]
    pub summary_en: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested_ada: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub votes_cast: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub yes_amount: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abstain_amount: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fund_depletion: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meets_approval_threshold: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_funded_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proposal_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub problem_en: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solution_en: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub about_en: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_en: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_text_en: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub about_structured_en: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub about_structured_ja: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub about_structured_ja_elp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub about_structured_es_elp: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_ja: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary_ja: Option<String>,

    #[serde(rename = "_scrape_error", default, skip_serializing_if = "Option::is_none")]
    pub scrape_error: Option<String>,
    #[serde(rename = "_structure_error", default, skip_serializing_if = "Option::is_none")]
    pub structure_error: Option<String>,
    #[serde(rename = "_translate_error", default, skip_serializing_if = "Option::is_none")]
    pub translate_error: Option<String>,
    #[serde(rename = "_multilang_error", default, skip_serializing_if = "Option::is_none")]
    pub multilang_error: Option<String>,

    /// Explicit per-stage progress; absent entries are inferred from fields
    #[serde(rename = "_status", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub stage_status: BTreeMap<StageKind, StageStatus>,

    /// Keys this crate does not model, carried through untouched
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

fn filled(field: &Option<String>) -> bool {
    field.as_deref().is_some_and(|s| !s.trim().is_empty())
}

impl ProposalRecord {
    /// Current status of this record for `stage`
    pub fn status(&self, stage: StageKind) -> StageStatus {
        if let Some(status) = self.stage_status.get(&stage) {
            return *status;
        }
        if self.has_output(stage) {
            StageStatus::Done
        } else if self.error_marker(stage).is_some() {
            StageStatus::Failed
        } else {
            StageStatus::Pending
        }
    }

    /// Whether the fields a stage writes are already populated
    pub fn has_output(&self, stage: StageKind) -> bool {
        match stage {
            StageKind::Scrape => filled(&self.full_text_en),
            StageKind::Structure => filled(&self.about_structured_en),
            StageKind::Translate => {
                filled(&self.title_ja)
                    && (self.summary_en.trim().is_empty() || filled(&self.summary_ja))
            }
            StageKind::Multilang => {
                filled(&self.about_structured_ja)
                    && filled(&self.about_structured_ja_elp)
                    && filled(&self.about_structured_es_elp)
            }
        }
    }

    pub fn error_marker(&self, stage: StageKind) -> Option<&str> {
        match stage {
            StageKind::Scrape => self.scrape_error.as_deref(),
            StageKind::Structure => self.structure_error.as_deref(),
            StageKind::Translate => self.translate_error.as_deref(),
            StageKind::Multilang => self.multilang_error.as_deref(),
        }
    }

    fn error_marker_mut(&mut self, stage: StageKind) -> &mut Option<String> {
        match stage {
            StageKind::Scrape => &mut self.scrape_error,
            StageKind::Structure => &mut self.structure_error,
            StageKind::Translate => &mut self.translate_error,
            StageKind::Multilang => &mut self.multilang_error,
        }
    }

    pub fn mark_done(&mut self, stage: StageKind) {
        self.stage_status.insert(stage, StageStatus::Done);
        *self.error_marker_mut(stage) = None;
    }

    pub fn mark_failed(&mut self, stage: StageKind, error: impl Into<String>) {
        self.stage_status.insert(stage, StageStatus::Failed);
        *self.error_marker_mut(stage) = Some(error.into());
    }

    /// Copy the outputs of `stage` from `other`, along with its progress
    pub fn adopt_stage(&mut self, stage: StageKind, other: &ProposalRecord) {
        match stage {
            StageKind::Scrape => {
                self.problem_en.clone_from(&other.problem_en);
                self.solution_en.clone_from(&other.solution_en);
                self.about_en.clone_from(&other.about_en);
                self.team_en.clone_from(&other.team_en);
                self.full_text_en.clone_from(&other.full_text_en);
            }
            StageKind::Structure => {
                self.about_structured_en.clone_from(&other.about_structured_en);
            }
            StageKind::Translate => {
                self.title_ja.clone_from(&other.title_ja);
                self.summary_ja.clone_from(&other.summary_ja);
            }
            StageKind::Multilang => {
                self.about_structured_ja.clone_from(&other.about_structured_ja);
                self.about_structured_ja_elp
                    .clone_from(&other.about_structured_ja_elp);
                self.about_structured_es_elp
                    .clone_from(&other.about_structured_es_elp);
            }
        }
        *self.error_marker_mut(stage) = other.error_marker(stage).map(str::to_string);
        match other.stage_status.get(&stage) {
            Some(status) => {
                self.stage_status.insert(stage, *status);
            }
            None => {
                self.stage_status.remove(&stage);
            }
        }
    }

    /// Refresh the spreadsheet-derived fields from a freshly shaped record,
    /// keeping everything later stages added
    pub fn refresh_shaped(&mut self, shaped: ProposalRecord) {
        self.fund = shaped.fund;
        self.challenge = shaped.challenge;
        self.title_en = shaped.title_en;
        if !shaped.summary_en.is_empty() || self.summary_en.is_empty() {
            self.summary_en = shaped.summary_en;
        }
        self.requested_ada = shaped.requested_ada;
        self.votes_cast = shaped.votes_cast;
        self.yes_amount = shaped.yes_amount;
        self.abstain_amount = shaped.abstain_amount;
        self.fund_depletion = shaped.fund_depletion;
        self.status = shaped.status;
        self.meets_approval_threshold = shaped.meets_approval_threshold;
        self.not_funded_reason = shaped.not_funded_reason;
        self.proposal_url = shaped.proposal_url;
    }

    /// Visit every free-text field, including unmodelled string values
    pub fn for_each_text_mut(&mut self, mut f: impl FnMut(&mut String)) {
        f(&mut self.challenge);
        f(&mut self.title_en);
        f(&mut self.summary_en);
        for field in [
            &mut self.requested_ada,
            &mut self.votes_cast,
            &mut self.yes_amount,
            &mut self.abstain_amount,
            &mut self.fund_depletion,
            &mut self.status,
            &mut self.meets_approval_threshold,
            &mut self.not_funded_reason,
            &mut self.problem_en,
            &mut self.solution_en,
            &mut self.about_en,
            &mut self.team_en,
            &mut self.full_text_en,
            &mut self.about_structured_en,
            &mut self.about_structured_ja,
            &mut self.about_structured_ja_elp,
            &mut self.about_structured_es_elp,
            &mut self.title_ja,
            &mut self.summary_ja,
        ] {
            if let Some(text) = field.as_mut() {
                f(text);
            }
        }
        for value in self.extra.values_mut() {
            if let Value::String(text) = value {
                f(text);
            }
        }
    }

    /// Non-empty `*_en` fields other than title, summary and the structured
    /// document, sorted by key
    pub fn english_sections(&self) -> Vec<(String, &str)> {
        let mut sections: Vec<(String, &str)> = [
            ("about_en", &self.about_en),
            ("full_text_en", &self.full_text_en),
            ("problem_en", &self.problem_en),
            ("solution_en", &self.solution_en),
            ("team_en", &self.team_en),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.as_deref().map(|v| (key.to_string(), v)))
        .collect();

        for (key, value) in &self.extra {
            if let Value::String(text) = value {
                if key.ends_with("_en") {
                    sections.push((key.clone(), text.as_str()));
                }
            }
        }

        sections.retain(|(_, value)| !value.trim().is_empty());
        sections.sort_by(|a, b| a.0.cmp(&b.0));
        sections
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str) -> ProposalRecord {
        ProposalRecord {
            proposal_id: id.to_string(),
            fund: 14,
            title_en: "Fix the bridge".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_status_inferred_from_fields() {
        let mut r = record("F14-0001");
        assert_eq!(r.status(StageKind::Structure), StageStatus::Pending);

        r.about_structured_en = Some("## Overview".to_string());
        assert_eq!(r.status(StageKind::Structure), StageStatus::Done);

        r.multilang_error = Some("timeout".to_string());
        assert_eq!(r.status(StageKind::Multilang), StageStatus::Failed);
    }

    #[test]
    fn test_explicit_status_wins() {
        let mut r = record("F14-0001");
        r.about_structured_en = Some("partial".to_string());
        r.stage_status.insert(StageKind::Structure, StageStatus::Pending);
        assert_eq!(r.status(StageKind::Structure), StageStatus::Pending);
    }

    #[test]
    fn test_mark_done_clears_marker() {
        let mut r = record("F14-0001");
        r.mark_failed(StageKind::Scrape, "404");
        assert_eq!(r.scrape_error.as_deref(), Some("404"));
        assert_eq!(r.status(StageKind::Scrape), StageStatus::Failed);

        r.mark_done(StageKind::Scrape);
        assert!(r.scrape_error.is_none());
        assert_eq!(r.status(StageKind::Scrape), StageStatus::Done);
    }

    #[test]
    fn test_unknown_keys_survive() {
        let json = r#"{
            "proposal_id": "F14-0002",
            "fund": 14,
            "title_en": "Wallet",
            "milestones_en": "M1",
            "_multilang_error": "bad json",
            "_status": {"structure": "done"}
        }"#;
        let r: ProposalRecord = serde_json::from_str(json).unwrap();
        assert_eq!(r.extra.get("milestones_en"), Some(&Value::from("M1")));
        assert_eq!(r.multilang_error.as_deref(), Some("bad json"));
        assert_eq!(r.status(StageKind::Structure), StageStatus::Done);

        let back = serde_json::to_value(&r).unwrap();
        assert_eq!(back["milestones_en"], "M1");
        assert_eq!(back["_status"]["structure"], "done");
        assert!(back.get("about_structured_en").is_none());
    }

    #[test]
    fn test_english_sections_sorted_and_filtered() {
        let mut r = record("F14-0003");
        r.team_en = Some("Alice".to_string());
        r.problem_en = Some("  ".to_string());
        r.extra
            .insert("budget_breakdown_en".to_string(), Value::from("100 ADA"));

        let keys: Vec<String> = r.english_sections().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["budget_breakdown_en", "team_en"]);
    }
}
