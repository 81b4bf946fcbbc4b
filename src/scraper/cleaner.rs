//! Total coercions from human-formatted cell text to typed values.
//!
//! None of these functions fail: anything they cannot read comes back as
//! `None`, which the schema layer stores as [`Value::Absent`].
//!
//! [`Value::Absent`]: crate::models::Value::Absent

use regex::Regex;
use std::sync::LazyLock;

static PERCENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[-+]?(?:(?:\d{1,3}(?:,\d{3})+|\d+)(?:\.\d+)?|\.\d+)\s*%").expect("static regex")
});

static DIGIT_GROUP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([-+]?)(\d[\d,]*(?:\.\d+)?)(\s*[kKmMbB])?").expect("static regex"));

static AS_OF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)As of\s+([A-Za-z]{3}\s+\d{1,2},\s+\d{4}\s+\d{1,2}:\d{2}(?:\s*(?:AM|PM))?)")
        .expect("static regex")
});

static CURRENCY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)((?:\b(?:rs\.?|pkr|ngn|usd|eur|gbp)|[$€£₦₹])\s*\d[\d,]*(?:\.\d+)?)")
        .expect("static regex")
});

/// Unicode variants sources use for minus and thin spaces.
fn canonical_chars(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '\u{2212}' | '\u{2012}' | '\u{2013}' => '-',
            '\u{00a0}' | '\u{202f}' | '\u{2009}' => ' ',
            other => other,
        })
        .collect()
}

fn is_placeholder(s: &str) -> bool {
    let s = s.trim();
    s.is_empty()
        || s.chars().all(|c| matches!(c, '-' | '—' | '–' | '.'))
        || s.eq_ignore_ascii_case("n/a")
        || s.eq_ignore_ascii_case("na")
}

/// "1,234.50" → 1234.5 | "NGN 610.00" → 610.0 | "--" → None
///
/// Thousands separators are dropped, then the first run of
/// `[0-9+-.eE]` that holds a digit and parses to a finite number wins.
pub fn to_float(s: &str) -> Option<f64> {
    let s = canonical_chars(s);
    if is_placeholder(&s) {
        return None;
    }
    let cleaned = s.replace(',', "");

    cleaned
        .split(|c: char| !(c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E')))
        .filter(|run| run.chars().any(|c| c.is_ascii_digit()))
        .find_map(|run| {
            // "Rs." leaves a stray '.', words leave stray 'e's
            let run = run.trim_start_matches(['e', 'E', '.']);
            let run = run.trim_end_matches(['e', 'E', '+', '-', '.']);
            run.parse::<f64>().ok().filter(|f| f.is_finite())
        })
}

/// Char before byte offset `at` belongs to a number, so a match starting
/// there would be a fragment of it.
fn glued_to_number(s: &str, at: usize) -> bool {
    s[..at]
        .chars()
        .next_back()
        .is_some_and(|c| c.is_ascii_digit() || c == ',' || c == '.')
}

/// "-3.2%" → -3.2 | "(+1.05 %)" → 1.05 | "1,234.5%" → 1234.5 | "0.75" → 0.75
///
/// Text holding a `%` with no readable number before it is None.
pub fn to_percentage(s: &str) -> Option<f64> {
    let s = canonical_chars(s);
    if !s.contains('%') {
        return to_float(&s);
    }
    let m = PERCENT.find_iter(&s).find(|m| !glued_to_number(&s, m.start()))?;
    let number: String = m
        .as_str()
        .chars()
        .filter(|c| !matches!(c, ',' | '%') && !c.is_whitespace())
        .collect();
    number.parse::<f64>().ok().filter(|f| f.is_finite())
}

/// "12,000" → 12000 | "1,234 reviews" → 1234 | "1.2M" → 1,200,000
///
/// Takes the last digit group in the text, so counts trailing a label
/// ("Rated by 4,102") are found. A K/M/B letter starting a word ("5 books")
/// is not a suffix. Fractions without a suffix and ranges ("5-10") are None.
pub fn to_integer(s: &str) -> Option<i64> {
    let s = canonical_chars(s);
    if is_placeholder(&s) {
        return None;
    }
    let caps = DIGIT_GROUP.captures_iter(&s).last()?;
    let sign = caps.get(1)?;
    if !sign.as_str().is_empty() && glued_to_number(&s, sign.start()) {
        return None;
    }
    let negative = sign.as_str() == "-";
    let number = caps[2].replace(',', "");

    let suffix = caps
        .get(3)
        .filter(|m| !s[m.end()..].chars().next().is_some_and(char::is_alphabetic))
        .map(|m| m.as_str().trim().to_ascii_lowercase());
    let multiplier = match suffix.as_deref() {
        Some("k") => 1_000.0,
        Some("m") => 1_000_000.0,
        Some("b") => 1_000_000_000.0,
        _ => 1.0,
    };

    let value = if !number.contains('.') && multiplier == 1.0 {
        number.parse::<i64>().ok()?
    } else {
        let f = number.parse::<f64>().ok()? * multiplier;
        if !f.is_finite() || f.abs() >= i64::MAX as f64 {
            return None;
        }
        if multiplier == 1.0 && f.fract() != 0.0 {
            return None;
        }
        f.round() as i64
    };

    Some(if negative { -value } else { value })
}

/// First currency-prefixed amount, kept as text: "Rs.  1,299 -40%" → "Rs. 1,299"
pub fn to_currency(s: &str) -> Option<String> {
    let s = canonical_chars(s);
    let m = CURRENCY.find(&s)?;
    Some(m.as_str().split_whitespace().collect::<Vec<_>>().join(" "))
}

/// "As of Oct 14, 2026 3:45 PM" stamp in page text.
pub fn to_as_of(text: &str) -> Option<String> {
    let caps = AS_OF.captures(text)?;
    Some(caps[1].split_whitespace().collect::<Vec<_>>().join(" "))
}

/// Whitespace-collapsed text; None when nothing is left.
pub fn to_text(s: &str) -> Option<String> {
    let s = canonical_chars(s);
    let joined = s.split_whitespace().collect::<Vec<_>>().join(" ");
    if joined.is_empty() { None } else { Some(joined) }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_float() {
        assert_eq!(to_float("1,234.50"), Some(1234.5));
        assert_eq!(to_float("NGN 1,234.56"), Some(1234.56));
        assert_eq!(to_float("Rs. 299"), Some(299.0));
        assert_eq!(to_float("-12.5"), Some(-12.5));
        assert_eq!(to_float("\u{2212}0.8"), Some(-0.8));
        assert_eq!(to_float("+1.5e3"), Some(1500.0));
        assert_eq!(to_float("--"), None);
        assert_eq!(to_float(""), None);
        assert_eq!(to_float("   "), None);
        assert_eq!(to_float("N/A"), None);
        assert_eq!(to_float("value"), None);
        assert_eq!(to_float("1e999"), None);
    }

    #[test]
    fn test_to_percentage() {
        assert_eq!(to_percentage("-3.2%"), Some(-3.2));
        assert_eq!(to_percentage("(+1.05 %)"), Some(1.05));
        assert_eq!(to_percentage("12.1 (0.45%)"), Some(0.45));
        assert_eq!(to_percentage("0.75"), Some(0.75));
        assert_eq!(to_percentage("%"), None);
        assert_eq!(to_percentage(""), None);
    }

    #[test]
    fn test_to_percentage_never_guesses() {
        assert_eq!(to_percentage("-.5%"), Some(-0.5));
        assert_eq!(to_percentage("1,234.5%"), Some(1234.5));
        assert_eq!(to_percentage("1,2345%"), None);
        assert_eq!(to_percentage("5-10%"), None);
        assert_eq!(to_percentage("n/a %"), None);
    }

    #[test]
    fn test_to_integer() {
        assert_eq!(to_integer("12,000"), Some(12000));
        assert_eq!(to_integer("1,234 reviews"), Some(1234));
        assert_eq!(to_integer("Rated by 4,102"), Some(4102));
        assert_eq!(to_integer("-45"), Some(-45));
        assert_eq!(to_integer("1.2M"), Some(1_200_000));
        assert_eq!(to_integer("345K"), Some(345_000));
        assert_eq!(to_integer("1.5B"), Some(1_500_000_000));
        assert_eq!(to_integer("-"), None);
        assert_eq!(to_integer("none"), None);
        assert_eq!(to_integer("99999999999999999999999"), None);
    }

    #[test]
    fn test_to_integer_never_guesses() {
        assert_eq!(to_integer("1,234reviews"), Some(1234));
        assert_eq!(to_integer("5 books"), Some(5));
        assert_eq!(to_integer("2.5k sold"), Some(2500));
        assert_eq!(to_integer("(57)"), Some(57));
        assert_eq!(to_integer("12.0"), Some(12));
        assert_eq!(to_integer("5-10"), None);
        assert_eq!(to_integer("1.5"), None);
        assert_eq!(to_integer("1.2Million"), None);
    }

    #[test]
    fn test_to_as_of() {
        assert_eq!(
            to_as_of("Indices As of  Oct 14, 2026 3:45 PM (delayed)"),
            Some("Oct 14, 2026 3:45 PM".into())
        );
        assert_eq!(to_as_of("as of Jan 2, 2026 09:30"), Some("Jan 2, 2026 09:30".into()));
        assert_eq!(to_as_of("As of today"), None);
    }

    #[test]
    fn test_to_currency() {
        assert_eq!(to_currency("Rs.  1,299 -40%"), Some("Rs. 1,299".into()));
        assert_eq!(to_currency("only $12.50 today"), Some("$12.50".into()));
        assert_eq!(to_currency("PKR 300"), Some("PKR 300".into()));
        assert_eq!(to_currency("free"), None);
        assert_eq!(to_currency("24 hours 5 left"), None);
    }

    #[test]
    fn test_to_text() {
        assert_eq!(to_text("  Karachi \n  Stock\u{00a0}Exchange "), Some("Karachi Stock Exchange".into()));
        assert_eq!(to_text(" \t "), None);
    }

    #[test]
    fn test_coercions_are_total() {
        let junk = [
            "", " ", "-", "--", "—", "+", ".", "e", "%", "1-2", "..5..", "++--", "∞", "NaN",
            "inf", "12abc34", "💥", "1,2,3,,", "-.e+", "9".repeat(400).as_str(),
        ]
        .map(String::from);
        for s in &junk {
            if let Some(f) = to_float(s) {
                assert!(f.is_finite(), "{s:?}");
            }
            if let Some(f) = to_percentage(s) {
                assert!(f.is_finite(), "{s:?}");
            }
            let _ = to_integer(s);
            let _ = to_currency(s);
        }
    }
}
