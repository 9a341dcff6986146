use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Character that separates the integer part from the fraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecimalMarker {
    Dot,
    Comma,
}

/// Language codes whose printed numbers use a decimal comma.
const COMMA_LANGUAGES: &[&str] = &[
    "de", "fr", "es", "it", "pt", "nl", "ru", "pl", "tr", "id", "da", "sv", "fi", "nb", "no",
    "cs", "sk", "ro", "hu", "uk", "el", "bg", "hr", "sl", "vi",
];

impl DecimalMarker {
    pub fn as_char(self) -> char {
        match self {
            DecimalMarker::Dot => '.',
            DecimalMarker::Comma => ',',
        }
    }

    /// The thousands separator that goes with this marker.
    pub fn grouping_char(self) -> char {
        match self {
            DecimalMarker::Dot => ',',
            DecimalMarker::Comma => '.',
        }
    }

    /// Derives the marker from an OCR language hint such as `en`, `de-DE` or `pt_BR`.
    pub fn for_language(lang: &str) -> Self {
        let primary = lang
            .split(['-', '_'])
            .next()
            .unwrap_or_default()
            .trim()
            .to_lowercase();
        if COMMA_LANGUAGES.contains(&primary.as_str()) {
            DecimalMarker::Comma
        } else {
            DecimalMarker::Dot
        }
    }
}

/// Vertical bandwidth used when grouping fragments into rows.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowTolerance {
    /// Fixed distance in image pixels.
    Pixels(f64),
    /// Fraction of the candidate fragment's own height.
    HeightFraction(f64),
}

impl RowTolerance {
    pub fn band_for(self, fragment_height: f64) -> f64 {
        match self {
            RowTolerance::Pixels(px) => px,
            RowTolerance::HeightFraction(f) => f * fragment_height.max(0.0),
        }
    }

    fn value(self) -> f64 {
        match self {
            RowTolerance::Pixels(v) | RowTolerance::HeightFraction(v) => v,
        }
    }
}

impl Default for RowTolerance {
    fn default() -> Self {
        RowTolerance::Pixels(10.0)
    }
}

/// How a row with exactly two numeric fields is split into rate and amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairPolicy {
    /// Left is the rate, right is the amount.
    #[default]
    Positional,
    /// The smaller value is the rate. Falls back to positional when either
    /// value does not parse.
    Magnitude,
}

pub const DEFAULT_SUBTOTAL_KEYWORDS: &[&str] = &[
    "total",
    "subtotal",
    "sub total",
    "sub-total",
    "grand total",
    "balance due",
    "amount due",
    "amount payable",
    "net payable",
];

/// Tunables for the row-reconstruction and validation pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// OCR language hint. Only affects numeric locale.
    pub ocr_language: String,
    /// Overrides the marker derived from `ocr_language`.
    pub decimal_marker: Option<DecimalMarker>,
    /// Allowed relative mismatch between quantity × rate and amount.
    pub amount_tolerance: f64,
    /// Case-insensitive substrings that mark aggregate rows.
    pub subtotal_keywords: Vec<String>,
    pub row_tolerance: RowTolerance,
    pub pair_policy: PairPolicy,
    /// Boxes with the same text overlapping at least this much are one detection.
    pub duplicate_overlap_iou: f64,
    /// Candidates below this confidence are dropped. 0 disables the floor.
    pub min_confidence: f64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            ocr_language: "en".to_string(),
            decimal_marker: None,
            amount_tolerance: 0.05,
            subtotal_keywords: DEFAULT_SUBTOTAL_KEYWORDS
                .iter()
                .map(|k| k.to_string())
                .collect(),
            row_tolerance: RowTolerance::default(),
            pair_policy: PairPolicy::default(),
            duplicate_overlap_iou: 0.5,
            min_confidence: 0.0,
        }
    }
}

impl ExtractionConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: ExtractionConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        tracing::debug!("Loaded extraction config from {}", path.display());
        Ok(config)
    }

    pub fn decimal_marker(&self) -> DecimalMarker {
        self.decimal_marker
            .unwrap_or_else(|| DecimalMarker::for_language(&self.ocr_language))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.amount_tolerance.is_finite() || self.amount_tolerance < 0.0 {
            return Err(invalid("amount_tolerance", "must be a non-negative number"));
        }
        let band = self.row_tolerance.value();
        if !band.is_finite() || band <= 0.0 {
            return Err(invalid("row_tolerance", "must be a positive number"));
        }
        if !(self.duplicate_overlap_iou > 0.0 && self.duplicate_overlap_iou <= 1.0) {
            return Err(invalid("duplicate_overlap_iou", "must lie in (0, 1]"));
        }
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(invalid("min_confidence", "must lie in [0, 1]"));
        }
        if self.subtotal_keywords.is_empty() {
            return Err(invalid("subtotal_keywords", "must list at least one keyword"));
        }
        if self.subtotal_keywords.iter().any(|k| k.trim().is_empty()) {
            return Err(invalid("subtotal_keywords", "keywords must not be blank"));
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid { field, reason: reason.to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = ExtractionConfig::default();
        config.validate().unwrap();
        assert_eq!(config.amount_tolerance, 0.05);
        assert_eq!(config.decimal_marker(), DecimalMarker::Dot);
        assert!(config.subtotal_keywords.iter().any(|k| k == "grand total"));
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = ExtractionConfig::from_toml_str("amount_tolerance = 0.1").unwrap();
        assert_eq!(config.amount_tolerance, 0.1);
        assert_eq!(config.row_tolerance, RowTolerance::Pixels(10.0));
        assert_eq!(config.pair_policy, PairPolicy::Positional);
    }

    #[test]
    fn full_toml() {
        let toml = r#"
            ocr_language = "de"
            pair_policy = "magnitude"
            row_tolerance = { height_fraction = 0.6 }
            subtotal_keywords = ["summe", "gesamt"]
        "#;
        let config = ExtractionConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.decimal_marker(), DecimalMarker::Comma);
        assert_eq!(config.pair_policy, PairPolicy::Magnitude);
        assert_eq!(config.row_tolerance, RowTolerance::HeightFraction(0.6));
        assert_eq!(config.subtotal_keywords, vec!["summe", "gesamt"]);
    }

    #[test]
    fn explicit_marker_overrides_language() {
        let config = ExtractionConfig::from_toml_str(
            "ocr_language = \"fr\"\ndecimal_marker = \"dot\"",
        )
        .unwrap();
        assert_eq!(config.decimal_marker(), DecimalMarker::Dot);
    }

    #[test]
    fn rejects_out_of_range_values() {
        assert!(matches!(
            ExtractionConfig::from_toml_str("amount_tolerance = -0.1"),
            Err(ConfigError::Invalid { field: "amount_tolerance", .. })
        ));
        assert!(matches!(
            ExtractionConfig::from_toml_str("row_tolerance = { pixels = 0.0 }"),
            Err(ConfigError::Invalid { field: "row_tolerance", .. })
        ));
        assert!(matches!(
            ExtractionConfig::from_toml_str("duplicate_overlap_iou = 1.5"),
            Err(ConfigError::Invalid { field: "duplicate_overlap_iou", .. })
        ));
        assert!(matches!(
            ExtractionConfig::from_toml_str("subtotal_keywords = [\"  \"]"),
            Err(ConfigError::Invalid { field: "subtotal_keywords", .. })
        ));
        assert!(matches!(
            ExtractionConfig::from_toml_str("subtotal_keywords = []"),
            Err(ConfigError::Invalid { field: "subtotal_keywords", .. })
        ));
    }

    #[test]
    fn rejects_malformed_toml() {
        assert!(matches!(
            ExtractionConfig::from_toml_str("amount_tolerance = \"lots\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "min_confidence = 0.4").unwrap();
        let config = ExtractionConfig::from_file(file.path()).unwrap();
        assert_eq!(config.min_confidence, 0.4);
    }

    #[test]
    fn language_hint_variants() {
        assert_eq!(DecimalMarker::for_language("de-DE"), DecimalMarker::Comma);
        assert_eq!(DecimalMarker::for_language("pt_BR"), DecimalMarker::Comma);
        assert_eq!(DecimalMarker::for_language("EN"), DecimalMarker::Dot);
        assert_eq!(DecimalMarker::for_language("hi"), DecimalMarker::Dot);
        assert_eq!(DecimalMarker::for_language(""), DecimalMarker::Dot);
    }

    #[test]
    fn height_fraction_band_scales_with_height() {
        assert_eq!(RowTolerance::HeightFraction(0.5).band_for(20.0), 10.0);
        assert_eq!(RowTolerance::Pixels(7.0).band_for(100.0), 7.0);
    }
}
