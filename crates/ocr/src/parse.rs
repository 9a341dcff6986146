use billscan_core::DecimalMarker;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::columns::{ColumnAssignment, Slot};
use crate::numeric::{parse_number, NumberError};
use crate::types::CandidateItem;

/// Decimal places kept for a quantity inferred as amount ÷ rate.
const INFERRED_QUANTITY_DP: u32 = 4;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnparseableReason {
    #[error("row has no item name")]
    MissingName,
    #[error("{slot}: {error}")]
    InvalidNumber { slot: Slot, error: NumberError },
    #[error("{slot}: `{text}` is negative")]
    NegativeValue { slot: Slot, text: String },
    #[error("amount is missing and cannot be inferred")]
    MissingAmount,
    #[error("inferred {slot} is too large to represent")]
    Overflow { slot: Slot },
}

/// Turns an assigned row into a candidate line item.
pub struct RowParser {
    marker: DecimalMarker,
}

impl RowParser {
    pub fn new(marker: DecimalMarker) -> Self {
        Self { marker }
    }

    pub fn parse(
        &self,
        assignment: &ColumnAssignment,
        row: usize,
    ) -> Result<CandidateItem, UnparseableReason> {
        let item_name = assignment.name();
        if item_name.is_empty() {
            return Err(UnparseableReason::MissingName);
        }

        let mut quantity = self.value(assignment, Slot::Quantity)?;
        let rate = self.value(assignment, Slot::Rate)?;
        let mut amount = self.value(assignment, Slot::Amount)?;

        match (quantity, rate, amount) {
            (None, Some(r), Some(a)) if !r.is_zero() => {
                let q = a
                    .checked_div(r)
                    .ok_or(UnparseableReason::Overflow { slot: Slot::Quantity })?;
                quantity = Some(q.round_dp(INFERRED_QUANTITY_DP).normalize());
            }
            // The assigner always fills the amount slot first, so only direct
            // callers reach this arm.
            (Some(q), Some(r), None) => {
                let a = q
                    .checked_mul(r)
                    .ok_or(UnparseableReason::Overflow { slot: Slot::Amount })?;
                amount = Some(a);
            }
            _ => {}
        }
        if amount.is_none() {
            return Err(UnparseableReason::MissingAmount);
        }

        // Any one misread fragment spoils the row, so the row is only as
        // trustworthy as its weakest contributor.
        let confidence = [Slot::Name, Slot::Quantity, Slot::Rate, Slot::Amount]
            .into_iter()
            .flat_map(|slot| assignment.in_slot(slot))
            .map(|f| f.confidence)
            .fold(1.0_f64, f64::min);

        Ok(CandidateItem {
            item_name,
            item_quantity: quantity,
            item_rate: rate,
            item_amount: amount,
            confidence,
            row,
        })
    }

    fn value(
        &self,
        assignment: &ColumnAssignment,
        slot: Slot,
    ) -> Result<Option<Decimal>, UnparseableReason> {
        assignment
            .get(slot)
            .map(|f| parse_number(&f.text, self.marker))
            .transpose()
            .map_err(|error| match error {
                NumberError::Negative(text) => UnparseableReason::NegativeValue { slot, text },
                error => UnparseableReason::InvalidNumber { slot, error },
            })
    }
}
