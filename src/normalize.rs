use serde_json::Value;

/// Glyph prefixed to every amount of ada
pub const CURRENCY_GLYPH: char = '₳';

/// Render a raw cell as text; missing and `nan`-like values become empty
pub fn normalize_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            if is_missing_marker(trimmed) {
                String::new()
            } else {
                trimmed.to_string()
            }
        }
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(other) => other.to_string(),
    }
}

fn is_missing_marker(text: &str) -> bool {
    ["nan", "none", "null"]
        .iter()
        .any(|marker| text.eq_ignore_ascii_case(marker))
}

/// Parse `text` as a number and re-render it with thousands separators.
///
/// Integral values lose any trailing `.0`. Text that is not a number is
/// returned trimmed.
pub fn normalize_number(text: &str) -> String {
    let trimmed = text.trim();
    match group_number(trimmed) {
        Some(grouped) => grouped,
        None => trimmed.to_string(),
    }
}

/// Render an amount as `₳1,234`; already-prefixed text is returned unchanged
pub fn normalize_currency(text: &str) -> String {
    if text.trim_start().starts_with(CURRENCY_GLYPH) {
        return text.to_string();
    }
    let trimmed = text.trim();
    match group_number(trimmed) {
        Some(grouped) => format!("{CURRENCY_GLYPH}{grouped}"),
        None => trimmed.to_string(),
    }
}

fn group_number(text: &str) -> Option<String> {
    let cleaned: String = text
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    let value: f64 = cleaned.parse().ok()?;
    if !value.is_finite() {
        return None;
    }

    let sign = if value < 0.0 { "-" } else { "" };
    let magnitude = value.abs();
    if magnitude.fract() == 0.0 {
        return Some(format!("{sign}{}", group_digits(&format!("{magnitude:.0}"))));
    }

    let rendered = magnitude.to_string();
    let (int_part, frac_part) = rendered.split_once('.')?;
    Some(format!("{sign}{}.{frac_part}", group_digits(int_part)))
}

/// Insert `,` every three digits from the right
fn group_digits(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_text_missing_values() {
        assert_eq!(normalize_text(None), "");
        assert_eq!(normalize_text(Some(&Value::Null)), "");
        assert_eq!(normalize_text(Some(&json!("nan"))), "");
        assert_eq!(normalize_text(Some(&json!(" NaN "))), "");
        assert_eq!(normalize_text(Some(&json!("None"))), "");
        assert_eq!(normalize_text(Some(&json!("  Funded "))), "Funded");
        assert_eq!(normalize_text(Some(&json!(42))), "42");
    }

    #[test]
    fn test_normalize_number_groups_integral_values() {
        assert_eq!(normalize_number("1000000"), "1,000,000");
        assert_eq!(normalize_number("739000.0"), "739,000");
        assert_eq!(normalize_number("1,234"), "1,234");
        assert_eq!(normalize_number("999"), "999");
        assert_eq!(normalize_number("-12345"), "-12,345");
        assert!(!normalize_number("1000000").contains('.'));
    }

    #[test]
    fn test_normalize_number_keeps_fraction() {
        assert_eq!(normalize_number("1234.5"), "1,234.5");
        assert_eq!(normalize_number("0.25"), "0.25");
    }

    #[test]
    fn test_normalize_number_falls_back_to_text() {
        assert_eq!(normalize_number(" n/a "), "n/a");
        assert_eq!(normalize_number(""), "");
    }

    #[test]
    fn test_currency_prefixed_is_identity() {
        for input in ["₳739,000", "₳1", "₳ 12 345", "₳not a number"] {
            assert_eq!(normalize_currency(input), input);
        }
    }

    #[test]
    fn test_currency_from_plain_number() {
        assert_eq!(normalize_currency("739000"), "₳739,000");
        assert_eq!(normalize_currency("50000.0"), "₳50,000");
        assert_eq!(normalize_currency(""), "");
        assert_eq!(normalize_currency("TBD"), "TBD");
    }
}
