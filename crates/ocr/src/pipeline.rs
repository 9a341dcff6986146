use std::path::Path;

use billscan_core::ExtractionConfig;
use thiserror::Error;

use crate::extract::{DocumentOutcome, ExtractionError, Extractor, PageInput, PageOutcome};
use crate::recognizer::{OcrBackend, OcrError};
use crate::types::PageType;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("OCR recognition failed: {0}")]
    Ocr(#[from] OcrError),
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
}

/// Orchestrates: read → OCR → extract, for scanned bill pages.
pub struct BillPipeline<R: OcrBackend> {
    recognizer: R,
    extractor: Extractor,
}

impl<R: OcrBackend> BillPipeline<R> {
    pub fn new(recognizer: R, config: &ExtractionConfig) -> Self {
        Self { recognizer, extractor: Extractor::new(config) }
    }

    /// Process a page image on disk.
    pub async fn process_file(
        &self,
        path: &Path,
        page_no: &str,
        page_type: PageType,
    ) -> Result<PageOutcome, PipelineError> {
        let bytes = tokio::fs::read(path).await?;
        self.process_bytes(&bytes, page_no, page_type)
    }

    /// Process raw image bytes of a single page.
    pub fn process_bytes(
        &self,
        data: &[u8],
        page_no: &str,
        page_type: PageType,
    ) -> Result<PageOutcome, PipelineError> {
        let fragments = self.recognizer.recognize(data)?;
        tracing::debug!("Page {page_no}: OCR returned {} fragments", fragments.len());
        Ok(self.extractor.run_page(page_no, page_type, &fragments)?)
    }

    /// Process a multi-page bill, one image per page, numbered from 1.
    pub fn process_document(&self, images: &[Vec<u8>]) -> Result<DocumentOutcome, PipelineError> {
        let pages = images
            .iter()
            .enumerate()
            .map(|(idx, data)| {
                Ok(PageInput {
                    page_no: Some((idx + 1).to_string()),
                    page_type: None,
                    fragments: self.recognizer.recognize(data)?,
                })
            })
            .collect::<Result<Vec<_>, OcrError>>()?;
        Ok(self.extractor.extract_document(&pages)?)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fragment::{FragmentBox, TextFragment};
    use crate::recognizer::{LazyRecognizer, MockRecognizer};

    fn frag(text: &str, x: f64, y: f64, confidence: f64) -> TextFragment {
        TextFragment::new(text, FragmentBox::rect(x, y, 40.0, 12.0), confidence)
    }

    fn consultation() -> Vec<TextFragment> {
        vec![
            frag("Consultation Fee", 0.0, 100.0, 0.95),
            frag("1", 180.0, 101.0, 0.99),
            frag("500.00", 240.0, 99.0, 0.97),
            frag("500.00", 300.0, 100.0, 0.98),
        ]
    }

    #[tokio::test]
    async fn process_file_reads_and_extracts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page1.png");
        std::fs::write(&path, b"not really a png").unwrap();

        let pipeline =
            BillPipeline::new(MockRecognizer::new(consultation()), &ExtractionConfig::default());
        let outcome = pipeline.process_file(&path, "1", PageType::BillDetail).await.unwrap();

        assert_eq!(outcome.page.bill_items.len(), 1);
        let item = &outcome.page.bill_items[0];
        assert_eq!(
            (item.item_quantity, item.item_rate, item.item_amount, item.confidence),
            (1.0, 500.0, 500.0, 0.95)
        );
    }

    #[tokio::test]
    async fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = BillPipeline::new(MockRecognizer::new(vec![]), &ExtractionConfig::default());
        let err = pipeline
            .process_file(&dir.path().join("absent.png"), "1", PageType::BillDetail)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Io(_)));
    }

    #[test]
    fn engine_failure_surfaces_as_ocr_error() {
        let recognizer: LazyRecognizer<MockRecognizer> =
            LazyRecognizer::new(|| Err(OcrError::Init("no model".into())));
        let pipeline = BillPipeline::new(recognizer, &ExtractionConfig::default());
        let err = pipeline.process_bytes(b"img", "1", PageType::BillDetail).unwrap_err();
        assert!(matches!(err, PipelineError::Ocr(OcrError::Init(_))));
    }

    #[test]
    fn malformed_ocr_output_is_an_extraction_error() {
        let pipeline = BillPipeline::new(
            MockRecognizer::new(vec![frag("x", f64::NAN, 0.0, 0.9)]),
            &ExtractionConfig::default(),
        );
        let err = pipeline.process_bytes(b"img", "3", PageType::Pharmacy).unwrap_err();
        assert_eq!(
            err.to_string(),
            "page 3: fragment 0 is malformed: box has a non-finite coordinate"
        );
    }

    #[test]
    fn process_document_numbers_pages() {
        let pipeline =
            BillPipeline::new(MockRecognizer::new(consultation()), &ExtractionConfig::default());
        let outcome = pipeline.process_document(&[b"p1".to_vec(), b"p2".to_vec()]).unwrap();
        let pages: Vec<&str> = outcome
            .result
            .pagewise_line_items
            .iter()
            .map(|p| p.page_no.as_str())
            .collect();
        assert_eq!(pages, vec!["1", "2"]);
        assert_eq!(outcome.result.total_item_count, 2);
        assert_eq!(outcome.result.reconciled_amount, 1000.0);
    }
}
