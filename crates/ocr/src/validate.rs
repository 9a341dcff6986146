use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;

use billscan_core::{ExtractionConfig, Money};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;

use crate::types::{BillItem, CandidateItem};
use crate::util::normalized_key;

/// Floor for the divisor of the relative amount check (one cent).
fn amount_epsilon() -> Decimal {
    Decimal::new(1, 2)
}

#[derive(Debug, Clone, PartialEq)]
pub enum RejectReason {
    /// Aggregate row such as a subtotal; keeping it would double-count.
    Stoplisted { keyword: String },
    BelowConfidenceFloor { confidence: f64 },
    ZeroValue,
    /// `expected` is `None` when quantity × rate is too large to represent.
    ArithmeticMismatch { expected: Option<Decimal>, actual: Decimal },
    Duplicate { kept_row: usize },
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::Stoplisted { keyword } => {
                write!(f, "matches stoplist keyword '{keyword}'")
            }
            RejectReason::BelowConfidenceFloor { confidence } => {
                write!(f, "confidence {confidence:.2} is below the floor")
            }
            RejectReason::ZeroValue => write!(f, "zero amount with no quantity"),
            RejectReason::ArithmeticMismatch { expected: Some(expected), actual } => {
                write!(f, "quantity × rate = {expected} but amount is {actual}")
            }
            RejectReason::ArithmeticMismatch { expected: None, actual } => {
                write!(f, "quantity × rate overflows but amount is {actual}")
            }
            RejectReason::Duplicate { kept_row } => write!(f, "duplicate of row {kept_row}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    pub row: usize,
    pub item_name: String,
    pub reason: RejectReason,
}

/// Accepted items for one page and what was thrown away on the way.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedPage {
    pub items: Vec<BillItem>,
    /// Sum of accepted amounts, at currency precision.
    pub reconciled: Money,
    pub rejections: Vec<Rejection>,
}

pub struct Validator {
    amount_tolerance: Decimal,
    keywords: Vec<String>,
    min_confidence: f64,
}

impl Validator {
    pub fn new(config: &ExtractionConfig) -> Self {
        Self {
            amount_tolerance: Decimal::from_f64(config.amount_tolerance).unwrap_or(Decimal::ZERO),
            keywords: config
                .subtotal_keywords
                .iter()
                .map(|k| normalized_key(k))
                .collect(),
            min_confidence: config.min_confidence,
        }
    }

    /// Filters, checks and deduplicates a page's candidates, in row order.
    pub fn validate(&self, candidates: Vec<CandidateItem>) -> ValidatedPage {
        let mut rejections = Vec::new();
        let mut checked = Vec::with_capacity(candidates.len());

        for candidate in candidates {
            match self.check(&candidate) {
                Some(reason) => rejections.push(reject(&candidate, reason)),
                None => checked.push(candidate),
            }
        }

        let survivors = dedup(checked, &mut rejections);
        for r in &rejections {
            tracing::debug!("Rejected row {} ({}): {}", r.row, r.item_name, r.reason);
        }

        let reconciled: Money = survivors.iter().map(CandidateItem::amount).sum();
        ValidatedPage {
            items: survivors.iter().map(CandidateItem::to_bill_item).collect(),
            reconciled,
            rejections,
        }
    }

    fn check(&self, candidate: &CandidateItem) -> Option<RejectReason> {
        let name = normalized_key(&candidate.item_name);
        if let Some(keyword) = self.keywords.iter().find(|k| name.contains(k.as_str())) {
            return Some(RejectReason::Stoplisted { keyword: keyword.clone() });
        }

        if candidate.confidence < self.min_confidence {
            return Some(RejectReason::BelowConfidenceFloor { confidence: candidate.confidence });
        }

        let amount = candidate.item_amount.unwrap_or_default();
        let has_quantity = candidate.item_quantity.is_some_and(|q| !q.is_zero());
        if amount.is_zero() && !has_quantity {
            return Some(RejectReason::ZeroValue);
        }

        if let (Some(q), Some(r), Some(a)) =
            (candidate.item_quantity, candidate.item_rate, candidate.item_amount)
        {
            let expected = q.checked_mul(r);
            let deviation = expected
                .and_then(|e| (e - a).abs().checked_div(a.max(amount_epsilon())));
            if deviation.map_or(true, |d| d > self.amount_tolerance) {
                return Some(RejectReason::ArithmeticMismatch { expected, actual: a });
            }
        }
        None
    }
}

fn reject(candidate: &CandidateItem, reason: RejectReason) -> Rejection {
    Rejection { row: candidate.row, item_name: candidate.item_name.clone(), reason }
}

/// Same normalized name and same amount at currency precision means the same
/// physical line read twice. The most confident read wins; ties go to the
/// earlier row. Survivors keep their row order.
fn dedup(candidates: Vec<CandidateItem>, rejections: &mut Vec<Rejection>) -> Vec<CandidateItem> {
    let mut best: HashMap<(String, Money), usize> = HashMap::new();

    for (pos, candidate) in candidates.iter().enumerate() {
        let key = (normalized_key(&candidate.item_name), candidate.amount());
        match best.entry(key) {
            Entry::Vacant(slot) => {
                slot.insert(pos);
            }
            Entry::Occupied(mut slot) => {
                let current = &candidates[*slot.get()];
                let wins = candidate.confidence > current.confidence
                    || (candidate.confidence == current.confidence && candidate.row < current.row);
                if wins {
                    let reason = RejectReason::Duplicate { kept_row: candidate.row };
                    rejections.push(reject(current, reason));
                    slot.insert(pos);
                } else {
                    let reason = RejectReason::Duplicate { kept_row: current.row };
                    rejections.push(reject(candidate, reason));
                }
            }
        }
    }

    let mut winners: Vec<usize> = best.into_values().collect();
    winners.sort_unstable();
    let mut candidates: Vec<Option<CandidateItem>> = candidates.into_iter().map(Some).collect();
    winners
        .into_iter()
        .filter_map(|pos| candidates[pos].take())
        .collect()
}
