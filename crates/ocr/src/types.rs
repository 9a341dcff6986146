use billscan_core::Money;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PageType {
    #[default]
    #[serde(rename = "Bill Detail")]
    BillDetail,
    #[serde(rename = "Final Bill")]
    FinalBill,
    #[serde(rename = "Pharmacy")]
    Pharmacy,
}

impl std::fmt::Display for PageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PageType::BillDetail => write!(f, "Bill Detail"),
            PageType::FinalBill => write!(f, "Final Bill"),
            PageType::Pharmacy => write!(f, "Pharmacy"),
        }
    }
}

/// A parsed row that has not yet been validated. Values stay exact until
/// they leave the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateItem {
    pub item_name: String,
    pub item_quantity: Option<Decimal>,
    pub item_rate: Option<Decimal>,
    pub item_amount: Option<Decimal>,
    /// Weakest contributing fragment.
    pub confidence: f64,
    /// Index of the source row on its page.
    pub row: usize,
}

impl CandidateItem {
    /// Rounded line amount, or zero when absent.
    pub fn amount(&self) -> Money {
        Money::from_decimal(self.item_amount.unwrap_or_default())
    }

    /// Final form. A missing quantity reads as one unit and a missing rate as
    /// the amount per unit.
    pub fn to_bill_item(&self) -> BillItem {
        let amount = self.amount();
        let quantity = self.item_quantity.unwrap_or(Decimal::ONE);
        let rate = self.item_rate.unwrap_or_else(|| {
            amount.amount().checked_div(quantity).unwrap_or(amount.amount())
        });
        BillItem {
            item_name: self.item_name.clone(),
            item_amount: amount.to_f64(),
            item_rate: rate.to_f64().unwrap_or_default(),
            item_quantity: quantity.to_f64().unwrap_or_default(),
            confidence: self.confidence.clamp(0.0, 1.0),
        }
    }
}

/// Individual line item on a bill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillItem {
    pub item_name: String,
    /// Net amount post discounts.
    pub item_amount: f64,
    pub item_rate: f64,
    pub item_quantity: f64,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageLineItems {
    pub page_no: String,
    pub page_type: PageType,
    pub bill_items: Vec<BillItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub pagewise_line_items: Vec<PageLineItems>,
    pub total_item_count: usize,
    /// Sum of every accepted item amount.
    pub reconciled_amount: f64,
}

impl ExtractionResult {
    /// Builds the document result from validated pages and their subtotals.
    pub fn from_pages(pages: Vec<(PageLineItems, Money)>) -> Self {
        let total_item_count = pages.iter().map(|(p, _)| p.bill_items.len()).sum();
        let reconciled: Money = pages.iter().map(|(_, subtotal)| *subtotal).sum();
        ExtractionResult {
            pagewise_line_items: pages.into_iter().map(|(p, _)| p).collect(),
            total_item_count,
            reconciled_amount: Money::from_decimal(reconciled.amount()).to_f64(),
        }
    }
}
