pub mod columns;
pub mod extract;
pub mod fragment;
pub mod numeric;
pub mod parse;
pub mod pipeline;
pub mod recognizer;
pub mod rows;
pub mod types;
pub mod validate;
mod util;

pub use columns::{AssignedCell, ColumnAssigner, ColumnAssignment, FragmentKind, LayoutIssue, Slot};
pub use extract::{
    DocumentOutcome, ExtractionError, ExtractionIssue, Extractor, PageInput, PageOutcome,
    PageReport,
};
pub use fragment::{Bounds, FragmentBox, FragmentDefect, TextFragment};
pub use numeric::{looks_numeric, parse_number, strip_currency, NumberError};
pub use parse::{RowParser, UnparseableReason};
pub use pipeline::{BillPipeline, PipelineError};
pub use recognizer::{LazyRecognizer, MockRecognizer, OcrBackend, OcrError};
pub use rows::{Row, RowClusterer};
pub use types::{BillItem, CandidateItem, ExtractionResult, PageLineItems, PageType};
pub use validate::{RejectReason, Rejection, ValidatedPage, Validator};
