use std::str::FromStr;
use std::sync::OnceLock;

use billscan_core::DecimalMarker;
use regex::Regex;
use rust_decimal::Decimal;
use thiserror::Error;

// ── Compiled regex cache ─────────────────────────────────────────────────────

macro_rules! re {
    ($name:ident, $pat:expr) => {
        fn $name() -> &'static Regex {
            static R: OnceLock<Regex> = OnceLock::new();
            R.get_or_init(|| Regex::new($pat).expect("invalid regex"))
        }
    };
}

re!(re_currency,
    r"(?i)(?:₹|\$|€|£|¥|\brs\.?|\binr\b|\busd\b|\beur\b|\bgbp\b)");
// Indian bills print whole-rupee amounts as `500/-`.
re!(re_whole_suffix,
    r"/-$");
re!(re_signed_shape,
    r"^[(\-]?\d[\d.,]*\)?-?$");
re!(re_unsigned_body,
    r"^\d[\d.,]*$");

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NumberError {
    #[error("empty value")]
    Empty,
    #[error("`{0}` is not a number")]
    NotANumber(String),
    #[error("`{0}` is negative")]
    Negative(String),
    #[error("`{0}` has more than one decimal marker")]
    MultipleDecimalMarkers(String),
    #[error("`{0}` has misplaced digit grouping")]
    MisplacedGrouping(String),
}

/// Removes currency symbols, currency codes and the whole-amount suffix.
pub fn strip_currency(text: &str) -> String {
    let stripped = re_currency().replace_all(text.trim(), "");
    let stripped = re_whole_suffix().replace(stripped.trim(), "");
    stripped.trim().to_string()
}

/// True when the text is a bare number, optionally signed or carrying a
/// currency symbol. Used for classification only; locale rules apply at parse time.
pub fn looks_numeric(text: &str) -> bool {
    re_signed_shape().is_match(&strip_currency(text))
}

/// Parses a printed amount under the given decimal convention.
///
/// Never guesses: a value that could be read two ways is an error.
pub fn parse_number(text: &str, marker: DecimalMarker) -> Result<Decimal, NumberError> {
    let s = strip_currency(text);
    if s.is_empty() {
        return Err(NumberError::Empty);
    }
    if s.starts_with('-') || s.ends_with('-') || (s.starts_with('(') && s.ends_with(')')) {
        return Err(NumberError::Negative(text.to_string()));
    }
    if !re_unsigned_body().is_match(&s) {
        return Err(NumberError::NotANumber(text.to_string()));
    }

    let mut parts = s.split(marker.as_char());
    let integer = parts.next().unwrap_or_default();
    let fraction = parts.next();
    if parts.next().is_some() {
        return Err(NumberError::MultipleDecimalMarkers(text.to_string()));
    }

    let grouping = marker.grouping_char();
    if fraction.is_some_and(|f| f.contains(grouping)) {
        return Err(NumberError::MisplacedGrouping(text.to_string()));
    }
    let digits = ungroup(integer, grouping)
        .ok_or_else(|| NumberError::MisplacedGrouping(text.to_string()))?;

    let canonical = match fraction {
        Some(f) if !f.is_empty() => format!("{digits}.{f}"),
        _ => digits,
    };
    Decimal::from_str(&canonical).map_err(|_| NumberError::NotANumber(text.to_string()))
}

/// Joins thousands groups. The last group must be three digits; inner groups
/// may be two or three so that lakh grouping (`1,00,000`) is accepted.
fn ungroup(integer: &str, grouping: char) -> Option<String> {
    let groups: Vec<&str> = integer.split(grouping).collect();
    if groups.len() == 1 {
        return (!integer.is_empty()).then(|| integer.to_string());
    }
    let (first, rest) = groups.split_first()?;
    let (last, middle) = rest.split_last()?;
    let first_ok = (1..=3).contains(&first.len());
    let middle_ok = middle.iter().all(|g| g.len() == 2 || g.len() == 3);
    if first_ok && middle_ok && last.len() == 3 {
        Some(groups.concat())
    } else {
        None
    }
}
