use serde::Deserialize;

use crate::error::PrepError;
use crate::models::ProposalRecord;

/// System prompt for the structured-document pass
pub const STRUCTURE_SYSTEM_PROMPT: &str = r#"You are an assistant that restructures long, messy proposal form text
from Project Catalyst into a clean, readable Markdown document.
You MUST keep the meaning accurate, but improve structure and readability."#;

/// Instructions placed before the proposal text
pub const STRUCTURE_INSTRUCTIONS: &str = r###"The English text below was copied from a Project Catalyst proposal form.
Reformat it into an easy-to-read summary document without changing its meaning.

Output format rules:

Start with a "## 📌 Proposal Overview" section that lists, as bullet points:

- Category
- Title
- Requested Budget
- Duration
- Original Language
- Open Source (License)

Then create the following headings, in this order:

## 1. Problem Statement
## 2. Proposed Solution
## 3. Collaborations & Team
## 4. Expected Impact
## 5. Key Performance Metrics (KPIs)
## 6. Milestones (Summary Table)
## 7. Budget Breakdown
## 8. Value for Money

Prefer summarising and organising over copying: use bullet points and short paragraphs.
Render the milestones as a Markdown table.

Reformat the following text:
"###;

/// Build the user prompt for the structured-document pass
pub fn build_structure_prompt(wall_text: &str) -> String {
    format!("{}\n{}", STRUCTURE_INSTRUCTIONS, wall_text)
}

/// Source text for the structured-document pass.
///
/// Uses `full_text_en` when present, otherwise joins the other English
/// sections as `Label:\nvalue` blocks.
pub fn build_wall_text(record: &ProposalRecord) -> String {
    if let Some(full) = record.full_text_en.as_deref() {
        let full = full.trim();
        if !full.is_empty() {
            return full.to_string();
        }
    }

    record
        .english_sections()
        .into_iter()
        .filter(|(key, _)| key != "full_text_en")
        .map(|(key, value)| format!("{}:\n{}\n", section_label(&key), value.trim()))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// `problem_statement_en` -> `Problem Statement`
pub fn section_label(key: &str) -> String {
    let base = key.strip_suffix("_en").unwrap_or(key);
    base.split('_')
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Build the prompt translating a title or summary into Japanese
pub fn build_translation_prompt(text: &str) -> String {
    format!(
        "You are a translator for the Cardano community in Japan.\n\
         Translate the following Project Catalyst proposal text into natural Japanese.\n\
         Target readers are Cardano holders and community members.\n\
         Keep it clear, respectful, and slightly explanatory, but not too long.\n\n\
         ---\n{}\n---",
        text
    )
}

/// Build the prompt producing the three translated/simplified documents
pub fn build_multilang_prompt(about_en: &str) -> String {
    format!(
        r#"You are a translator and simplifier.

Input is MARKDOWN in English that explains a Cardano Catalyst proposal
under the key `about_structured_en`.

Please:

1. Translate it into natural Japanese for adults.
2. Create an Easy Japanese version (やさしい日本語, ELP style):
   - short sentences
   - simple words
   - keep headings
   - briefly explain difficult words
3. Create an Easy Spanish version (Español fácil, ELP style):
   - short sentences
   - simple words
   - keep headings
   - briefly explain difficult words

Return JSON with this exact shape:

{{
  "ja": "MARKDOWN in Japanese",
  "ja_elp": "MARKDOWN in Easy Japanese",
  "es_elp": "MARKDOWN in Easy Spanish"
}}

Do NOT include any keys other than ja, ja_elp, es_elp.
Do NOT wrap the JSON in code fences.
Do NOT explain the JSON, just output raw JSON.

Here is `about_structured_en` in Markdown.
The content is between the markers [ABOUT_START] and [ABOUT_END].

[ABOUT_START]
{}
[ABOUT_END]
"#,
        about_en
    )
}

/// Parsed reply of the multilingual pass
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MultilangDocs {
    #[serde(default)]
    pub ja: String,
    #[serde(default)]
    pub ja_elp: String,
    #[serde(default)]
    pub es_elp: String,
}

/// Parse the multilingual reply, tolerating a surrounding code fence.
///
/// All three documents must be present and non-empty.
pub fn parse_multilang_response(text: &str) -> Result<MultilangDocs, PrepError> {
    let body = strip_code_fence(text);
    let docs: MultilangDocs = serde_json::from_str(body)
        .map_err(|e| PrepError::BadResponse(format!("multilingual reply is not JSON: {e}")))?;
    let docs = MultilangDocs {
        ja: docs.ja.trim().to_string(),
        ja_elp: docs.ja_elp.trim().to_string(),
        es_elp: docs.es_elp.trim().to_string(),
    };
    for (key, text) in [("ja", &docs.ja), ("ja_elp", &docs.ja_elp), ("es_elp", &docs.es_elp)] {
        if text.is_empty() {
            return Err(PrepError::BadResponse(format!(
                "multilingual reply has no `{key}` document"
            )));
        }
    }
    Ok(docs)
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // drop the info string (```json)
    let rest = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_section_label() {
        assert_eq!(section_label("problem_statement_en"), "Problem Statement");
        assert_eq!(section_label("team_en"), "Team");
        assert_eq!(section_label("KPI_en"), "Kpi");
    }

    #[test]
    fn test_wall_text_prefers_full_text() {
        let record = ProposalRecord {
            proposal_id: "F14-0001".to_string(),
            full_text_en: Some("  ## Problem\n\nBroken  ".to_string()),
            team_en: Some("Alice".to_string()),
            ..Default::default()
        };
        assert_eq!(build_wall_text(&record), "## Problem\n\nBroken");
    }

    #[test]
    fn test_wall_text_from_sections() {
        let record = ProposalRecord {
            proposal_id: "F14-0001".to_string(),
            title_en: "Fix the bridge".to_string(),
            problem_en: Some("Broken".to_string()),
            team_en: Some("Alice".to_string()),
            ..Default::default()
        };
        assert_eq!(build_wall_text(&record), "Problem:\nBroken\n\nTeam:\nAlice");
    }

    #[test]
    fn test_wall_text_empty_record() {
        let record = ProposalRecord {
            proposal_id: "F14-0001".to_string(),
            title_en: "Fix the bridge".to_string(),
            ..Default::default()
        };
        assert_eq!(build_wall_text(&record), "");
    }

    #[test]
    fn test_prompts_embed_source() {
        assert!(build_structure_prompt("WALL").ends_with("\nWALL"));
        assert!(build_translation_prompt("Fix the bridge").contains("---\nFix the bridge\n---"));
        let multi = build_multilang_prompt("## Overview");
        assert!(multi.contains("[ABOUT_START]\n## Overview\n[ABOUT_END]"));
        assert!(multi.contains("\"ja_elp\""));
    }

    #[test]
    fn test_parse_multilang_plain_and_fenced() {
        let plain = r#"{"ja": " 概要 ", "ja_elp": "かんたん", "es_elp": "Fácil"}"#;
        let docs = parse_multilang_response(plain).unwrap();
        assert_eq!(docs.ja, "概要");
        assert_eq!(docs.es_elp, "Fácil");

        let fenced = format!("```json\n{}\n```", plain);
        assert_eq!(parse_multilang_response(&fenced).unwrap(), docs);
    }

    #[test]
    fn test_parse_multilang_rejects_prose() {
        assert!(parse_multilang_response("Sure! Here is the translation.").is_err());
    }

    #[test]
    fn test_parse_multilang_rejects_partial_reply() {
        let err = parse_multilang_response(r#"{"ja": "概要"}"#).unwrap_err();
        assert!(err.to_string().contains("ja_elp"));

        let blank = r#"{"ja": "概要", "ja_elp": "がいよう", "es_elp": "  "}"#;
        assert!(parse_multilang_response(blank).is_err());
    }
}
