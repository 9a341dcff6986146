use std::cmp::Ordering;

use billscan_core::RowTolerance;

use crate::fragment::TextFragment;

/// Fragments believed to sit on one physical line of the bill.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// Left-to-right.
    pub fragments: Vec<TextFragment>,
    /// Mean vertical midpoint of the members.
    pub y_center: f64,
    /// Band used when the row was opened.
    pub y_tolerance: f64,
}

struct OpenRow<'a> {
    members: Vec<&'a TextFragment>,
    sum_y: f64,
    y_tolerance: f64,
}

impl<'a> OpenRow<'a> {
    fn start(fragment: &'a TextFragment, y_tolerance: f64) -> Self {
        Self { members: vec![fragment], sum_y: fragment.center_y(), y_tolerance }
    }

    fn mean_y(&self) -> f64 {
        self.sum_y / self.members.len() as f64
    }

    fn push(&mut self, fragment: &'a TextFragment) {
        self.sum_y += fragment.center_y();
        self.members.push(fragment);
    }

    fn close(self) -> Row {
        let y_center = self.mean_y();
        let mut fragments: Vec<TextFragment> = self.members.into_iter().cloned().collect();
        fragments.sort_by(|a, b| a.center_x().total_cmp(&b.center_x()));
        Row { fragments, y_center, y_tolerance: self.y_tolerance }
    }
}

/// Single-pass vertical clustering. Assumes the page is roughly axis-aligned;
/// de-skew happens upstream.
pub struct RowClusterer {
    tolerance: RowTolerance,
}

impl RowClusterer {
    pub fn new(tolerance: RowTolerance) -> Self {
        Self { tolerance }
    }

    /// Groups a page's fragments into rows, top to bottom.
    pub fn cluster(&self, fragments: &[TextFragment]) -> Vec<Row> {
        let mut ordered: Vec<(usize, &TextFragment)> = fragments.iter().enumerate().collect();
        ordered.sort_by(|(ia, a), (ib, b)| by_reading_position(a, b).then(ia.cmp(ib)));

        let mut rows = Vec::new();
        let mut open: Option<OpenRow> = None;

        for (_, fragment) in ordered {
            let band = self.tolerance.band_for(fragment.height());
            match open.as_mut() {
                Some(row) if (fragment.center_y() - row.mean_y()).abs() <= band => {
                    row.push(fragment);
                }
                _ => {
                    if let Some(done) = open.replace(OpenRow::start(fragment, band)) {
                        rows.push(done.close());
                    }
                }
            }
        }
        if let Some(done) = open {
            rows.push(done.close());
        }

        tracing::debug!("Grouped {} fragments into {} rows", fragments.len(), rows.len());
        rows
    }
}

fn by_reading_position(a: &TextFragment, b: &TextFragment) -> Ordering {
    a.center_y()
        .total_cmp(&b.center_y())
        .then_with(|| a.center_x().total_cmp(&b.center_x()))
}
