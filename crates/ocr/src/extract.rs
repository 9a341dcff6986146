use billscan_core::{ExtractionConfig, Money};
use serde::Deserialize;
use thiserror::Error;

use crate::columns::{ColumnAssigner, LayoutIssue};
use crate::fragment::{FragmentDefect, TextFragment};
use crate::parse::{RowParser, UnparseableReason};
use crate::rows::RowClusterer;
use crate::types::{ExtractionResult, PageLineItems, PageType};
use crate::validate::{Rejection, Validator};

/// Input that breaks the OCR contract. Noisy bills never produce this.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("page {page}: fragment {index} is malformed: {reason}")]
    InvalidFragment { page: String, index: usize, reason: FragmentDefect },
}

/// Recoverable problems met while reading a page. The affected row is
/// skipped and extraction carries on.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExtractionIssue {
    #[error("no text detected")]
    EmptyInput,
    #[error("row {row}: {reason}")]
    UnparseableRow { row: usize, reason: UnparseableReason },
    #[error("row {row}: {numeric_fields} numeric fields do not fit quantity, rate, amount")]
    AmbiguousColumnAssignment { row: usize, numeric_fields: usize },
    #[error("row {row}: no numeric fields")]
    NonItemRow { row: usize },
}

/// One page of OCR output as handed over by the recognizer or an API caller.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PageInput {
    #[serde(default)]
    pub page_no: Option<String>,
    #[serde(default)]
    pub page_type: Option<PageType>,
    pub fragments: Vec<TextFragment>,
}

/// Diagnostics for one page. Kept out of `ExtractionResult`.
#[derive(Debug, Clone, PartialEq)]
pub struct PageReport {
    pub page_no: String,
    pub fragments: usize,
    pub rows: usize,
    pub issues: Vec<ExtractionIssue>,
    pub rejections: Vec<Rejection>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageOutcome {
    pub page: PageLineItems,
    pub reconciled: Money,
    pub report: PageReport,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentOutcome {
    pub result: ExtractionResult,
    pub reports: Vec<PageReport>,
}

/// Runs clusterer → assigner → parser → validator over a page's fragments.
///
/// Holds configuration only; every call is a pure function of its input, so a
/// single extractor can be shared across threads and requests.
pub struct Extractor {
    clusterer: RowClusterer,
    assigner: ColumnAssigner,
    parser: RowParser,
    validator: Validator,
}

impl Extractor {
    pub fn new(config: &ExtractionConfig) -> Self {
        let marker = config.decimal_marker();
        Self {
            clusterer: RowClusterer::new(config.row_tolerance),
            assigner: ColumnAssigner::new(config.pair_policy, marker, config.duplicate_overlap_iou),
            parser: RowParser::new(marker),
            validator: Validator::new(config),
        }
    }

    pub fn run_page(
        &self,
        page_no: &str,
        page_type: PageType,
        fragments: &[TextFragment],
    ) -> Result<PageOutcome, ExtractionError> {
        for (index, fragment) in fragments.iter().enumerate() {
            fragment.check().map_err(|reason| ExtractionError::InvalidFragment {
                page: page_no.to_string(),
                index,
                reason,
            })?;
        }

        let mut issues = Vec::new();
        if fragments.is_empty() {
            tracing::warn!("Page {page_no}: no text detected");
            issues.push(ExtractionIssue::EmptyInput);
        }

        let rows = self.clusterer.cluster(fragments);
        let mut candidates = Vec::with_capacity(rows.len());
        for (idx, row) in rows.iter().enumerate() {
            let assignment = match self.assigner.assign(row) {
                Ok(a) => a,
                Err(LayoutIssue::NoNumericFields) => {
                    issues.push(ExtractionIssue::NonItemRow { row: idx });
                    continue;
                }
                Err(LayoutIssue::TooManyNumericFields(n)) => {
                    issues.push(ExtractionIssue::AmbiguousColumnAssignment {
                        row: idx,
                        numeric_fields: n,
                    });
                    continue;
                }
            };
            match self.parser.parse(&assignment, idx) {
                Ok(candidate) => candidates.push(candidate),
                Err(reason) => issues.push(ExtractionIssue::UnparseableRow { row: idx, reason }),
            }
        }
        for issue in &issues {
            tracing::debug!("Page {page_no}: {issue}");
        }

        let validated = self.validator.validate(candidates);
        tracing::info!(
            "Page {}: {} fragments, {} rows, {} items, reconciled {}",
            page_no,
            fragments.len(),
            rows.len(),
            validated.items.len(),
            validated.reconciled
        );

        Ok(PageOutcome {
            page: PageLineItems {
                page_no: page_no.to_string(),
                page_type,
                bill_items: validated.items,
            },
            reconciled: validated.reconciled,
            report: PageReport {
                page_no: page_no.to_string(),
                fragments: fragments.len(),
                rows: rows.len(),
                issues,
                rejections: validated.rejections,
            },
        })
    }

    /// Extracts every page independently. A document with no pages reports a
    /// single empty page so callers always see the page structure.
    pub fn extract_document(
        &self,
        pages: &[PageInput],
    ) -> Result<DocumentOutcome, ExtractionError> {
        let empty = [PageInput { page_no: None, page_type: None, fragments: Vec::new() }];
        let pages = if pages.is_empty() { &empty[..] } else { pages };

        let outcomes = pages
            .iter()
            .enumerate()
            .map(|(idx, page)| {
                let page_no = page.page_no.clone().unwrap_or_else(|| (idx + 1).to_string());
                self.run_page(&page_no, page.page_type.unwrap_or_default(), &page.fragments)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut reports = Vec::with_capacity(outcomes.len());
        let mut totals = Vec::with_capacity(outcomes.len());
        for outcome in outcomes {
            reports.push(outcome.report);
            totals.push((outcome.page, outcome.reconciled));
        }
        let result = ExtractionResult::from_pages(totals);
        tracing::info!(
            "Extracted {} items across {} pages, reconciled {}",
            result.total_item_count,
            result.pagewise_line_items.len(),
            result.reconciled_amount
        );
        Ok(DocumentOutcome { result, reports })
    }
}
