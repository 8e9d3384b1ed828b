use std::collections::HashSet;

use scraper::{ElementRef, Html, Node, Selector};

use crate::error::{PrepError, PrepResult};

/// Section blocks starting with these belong to vote cards and the footer
pub const SECTION_BOILERPLATE: &[&str] = &[
    "Total to date",
    "View current challenges",
    "Sign up to receive news",
    "We collect personal data",
    "Follow us",
];

/// Lines starting with these are dropped from the whole-page text
pub const PAGE_BOILERPLATE: &[&str] = &[
    "View current challenges",
    "Sign up to receive news",
    "We collect personal data",
    "Follow us",
    "Thank you for subscribing",
];

/// Labelled sections of a proposal page plus the whole-page text
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScrapedPage {
    pub problem: String,
    pub solution: String,
    pub about: String,
    pub team: String,
    pub full_text: String,
}

/// Extract every section the enrich stage stores
pub fn extract_page(html: &str) -> PrepResult<ScrapedPage> {
    let document = Html::parse_document(html);
    Ok(ScrapedPage {
        problem: section_text(&document, "Problem")?,
        solution: section_text(&document, "Solution")?,
        about: section_text(&document, "About this idea")?,
        team: section_text(&document, "Team")?,
        full_text: full_text(&document)?,
    })
}

/// Text under the first `h2` mentioning `label`, up to the next `h2`
pub fn extract_section(html: &str, label: &str) -> PrepResult<String> {
    section_text(&Html::parse_document(html), label)
}

/// Whole-page text, preferring question/answer blocks over `main`
pub fn extract_full_text(html: &str) -> PrepResult<String> {
    full_text(&Html::parse_document(html))
}

fn selector(css: &str) -> PrepResult<Selector> {
    Selector::parse(css).map_err(|e| PrepError::Selector(format!("{css}: {e:?}")))
}

fn section_text(document: &Html, label: &str) -> PrepResult<String> {
    let h2 = selector("h2")?;
    let needle = label.to_lowercase();

    let Some(heading) = document
        .select(&h2)
        .find(|h| element_text(*h, " ").to_lowercase().contains(&needle))
    else {
        return Ok(String::new());
    };

    let mut parts = Vec::new();
    let mut seen = HashSet::new();

    for sibling in heading.next_siblings() {
        let Some(element) = ElementRef::wrap(sibling) else {
            continue;
        };
        let name = element.value().name();
        if name == "h2" {
            break;
        }
        if name != "p" && name != "div" {
            continue;
        }

        let text = element_text(element, " ");
        if text.is_empty() || starts_with_any(&text, SECTION_BOILERPLATE) {
            continue;
        }
        if seen.insert(text.clone()) {
            parts.push(text);
        }
    }

    Ok(parts.join("\n\n"))
}

fn full_text(document: &Html) -> PrepResult<String> {
    let qa_selector = selector(r#"[data-testid="question-answer"]"#)?;
    let question_selector = selector("h2, h3, h4")?;
    let answer_selector = selector(r#"[data-testid="answer"]"#)?;

    let qa_blocks: Vec<ElementRef> = document.select(&qa_selector).collect();

    let raw_text = if !qa_blocks.is_empty() {
        let mut blocks = Vec::new();
        for block in qa_blocks {
            let question = block
                .select(&question_selector)
                .next()
                .map(|q| element_text(q, " "))
                .unwrap_or_default();
            let answer_el = block.select(&answer_selector).next().unwrap_or(block);
            let answer = element_text(answer_el, "\n");
            if answer.is_empty() {
                continue;
            }
            if !question.is_empty() {
                blocks.push(format!("## {question}"));
            }
            blocks.push(answer);
        }
        blocks.join("\n\n")
    } else {
        let main = selector("main")?;
        match document.select(&main).next() {
            Some(main) => element_text(main, "\n"),
            None => element_text(document.root_element(), "\n"),
        }
    };

    let mut lines = Vec::new();
    let mut seen = HashSet::new();
    for line in raw_text.lines().map(str::trim) {
        if line.is_empty() || starts_with_any(line, PAGE_BOILERPLATE) {
            continue;
        }
        if seen.insert(line) {
            lines.push(line);
        }
    }

    Ok(lines.join("\n\n"))
}

/// Trimmed, non-empty text nodes of `element`, joined by `separator`.
/// Script and style contents are not text.
fn element_text(element: ElementRef<'_>, separator: &str) -> String {
    let mut pieces: Vec<&str> = Vec::new();
    for node in element.descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let hidden = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .is_some_and(|e| matches!(e.name(), "script" | "style" | "noscript"))
        });
        if hidden {
            continue;
        }
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            pieces.push(trimmed);
        }
    }
    pieces.join(separator)
}

fn starts_with_any(text: &str, prefixes: &[&str]) -> bool {
    prefixes.iter().any(|p| text.starts_with(p))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><body>
<nav>Menu</nav>
<main>
  <h1>Fix the bridge</h1>
  <h2>Problem</h2>
  <p>The bridge is broken.</p>
  <div>Total to date: 12,000 ₳</div>
  <p></p>
  <p>The bridge is broken.</p>
  <div>Nobody can <b>cross</b> it.</div>
  <span>ignored inline</span>
  <h2>Solution</h2>
  <p>Rebuild it.</p>
  <h2>Team</h2>
  <p>Alice and Bob.</p>
  <p>Follow us on social media</p>
</main>
<footer><p>Sign up to receive news</p></footer>
</body></html>"#;

    #[test]
    fn test_section_stops_at_next_h2() {
        let problem = extract_section(PAGE, "problem").unwrap();
        assert_eq!(problem, "The bridge is broken.\n\nNobody can cross it.");

        let solution = extract_section(PAGE, "Solution").unwrap();
        assert_eq!(solution, "Rebuild it.");
    }

    #[test]
    fn test_section_drops_boilerplate() {
        let team = extract_section(PAGE, "Team").unwrap();
        assert_eq!(team, "Alice and Bob.");
    }

    #[test]
    fn test_missing_section_is_empty() {
        assert_eq!(extract_section(PAGE, "About this idea").unwrap(), "");
    }

    #[test]
    fn test_full_text_falls_back_to_main() {
        let text = extract_full_text(PAGE).unwrap();
        assert!(text.starts_with("Fix the bridge\n\nProblem"));
        assert!(!text.contains("Menu"));
        assert!(!text.contains("Follow us"));
        assert_eq!(text.matches("The bridge is broken.").count(), 1);
    }

    #[test]
    fn test_full_text_prefers_question_answer_blocks() {
        let html = r#"<html><body><main>
<p>Noise outside the form</p>
<section data-testid="question-answer">
  <h3>What is the problem?</h3>
  <div data-testid="answer"><p>Broken bridge</p><p>Long detour</p></div>
</section>
<section data-testid="question-answer">
  <h3>Empty question</h3>
  <div data-testid="answer"></div>
</section>
<section data-testid="question-answer">
  <div>Answer without heading</div>
</section>
</main></body></html>"#;

        let text = extract_full_text(html).unwrap();
        assert_eq!(
            text,
            "## What is the problem?\n\nBroken bridge\n\nLong detour\n\nAnswer without heading"
        );
    }

    #[test]
    fn test_full_text_whole_page_without_main() {
        let html = "<html><head><script>var x = 1;</script></head><body><p>Only</p><p>Only</p><p>Thank you for subscribing</p></body></html>";
        assert_eq!(extract_full_text(html).unwrap(), "Only");
    }

    #[test]
    fn test_extract_page_collects_sections() {
        let page = extract_page(PAGE).unwrap();
        assert_eq!(page.solution, "Rebuild it.");
        assert_eq!(page.about, "");
        assert!(!page.full_text.is_empty());
    }
}
