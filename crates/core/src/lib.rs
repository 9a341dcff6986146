pub mod config;
pub mod money;

pub use config::{
    ConfigError, DecimalMarker, ExtractionConfig, PairPolicy, RowTolerance,
    DEFAULT_SUBTOTAL_KEYWORDS,
};
pub use money::Money;
