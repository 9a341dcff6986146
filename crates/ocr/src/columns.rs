//! Semantic column assignment within a row.
//!
//! Layout assumption: numeric columns read left to right as quantity, rate,
//! amount. Positions are relative to the row, not fixed pixel columns, since
//! tables drift across a photographed page. Bills laid out in a different
//! order are not supported.

use billscan_core::{DecimalMarker, PairPolicy};
use thiserror::Error;

use crate::fragment::TextFragment;
use crate::numeric::{looks_numeric, parse_number};
use crate::rows::Row;
use crate::util::{collapse_whitespace, normalized_key};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Name,
    Quantity,
    Rate,
    Amount,
    Unknown,
}

impl std::fmt::Display for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Slot::Name => write!(f, "name"),
            Slot::Quantity => write!(f, "quantity"),
            Slot::Rate => write!(f, "rate"),
            Slot::Amount => write!(f, "amount"),
            Slot::Unknown => write!(f, "unknown"),
        }
    }
}

/// Content shape of a single fragment, decided without looking at its neighbours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentKind {
    Numeric,
    Text,
}

impl FragmentKind {
    pub fn of(fragment: &TextFragment) -> Self {
        if looks_numeric(&fragment.text) {
            FragmentKind::Numeric
        } else {
            FragmentKind::Text
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssignedCell {
    pub slot: Slot,
    pub fragment: TextFragment,
}

/// A row's fragments, left to right, each tagged with its slot.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnAssignment {
    pub cells: Vec<AssignedCell>,
}

impl ColumnAssignment {
    pub fn in_slot(&self, slot: Slot) -> impl Iterator<Item = &TextFragment> {
        self.cells
            .iter()
            .filter(move |c| c.slot == slot)
            .map(|c| &c.fragment)
    }

    pub fn get(&self, slot: Slot) -> Option<&TextFragment> {
        self.in_slot(slot).next()
    }

    /// Name fragments joined with single spaces.
    pub fn name(&self) -> String {
        let joined = self
            .in_slot(Slot::Name)
            .map(|f| f.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        collapse_whitespace(&joined)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LayoutIssue {
    #[error("row has no numeric fields")]
    NoNumericFields,
    #[error("row has {0} numeric fields, expected 1 to 3")]
    TooManyNumericFields(usize),
}

pub struct ColumnAssigner {
    pair_policy: PairPolicy,
    marker: DecimalMarker,
    duplicate_overlap_iou: f64,
}

impl ColumnAssigner {
    pub fn new(pair_policy: PairPolicy, marker: DecimalMarker, duplicate_overlap_iou: f64) -> Self {
        Self { pair_policy, marker, duplicate_overlap_iou }
    }

    pub fn assign(&self, row: &Row) -> Result<ColumnAssignment, LayoutIssue> {
        let mut fragments: Vec<&TextFragment> = row
            .fragments
            .iter()
            .filter(|f| !f.text.trim().is_empty())
            .collect();
        fragments.sort_by(|a, b| a.center_x().total_cmp(&b.center_x()));
        let fragments = self.collapse_overlaps(fragments);

        let kinds: Vec<FragmentKind> = fragments.iter().map(|f| FragmentKind::of(f)).collect();

        // Leftmost maximal run of text fragments.
        let name_span = kinds.iter().position(|k| *k == FragmentKind::Text).map(|start| {
            let len = kinds[start..]
                .iter()
                .take_while(|k| **k == FragmentKind::Text)
                .count();
            start..start + len
        });

        let mut slots: Vec<Slot> = Vec::with_capacity(fragments.len());
        let mut numeric = Vec::new();
        for (idx, kind) in kinds.iter().enumerate() {
            let slot = match (kind, &name_span) {
                (_, Some(span)) if span.contains(&idx) => Slot::Name,
                // Serial-number columns sit left of the name.
                (FragmentKind::Numeric, Some(span)) if idx < span.start => Slot::Unknown,
                (FragmentKind::Numeric, _) => {
                    numeric.push(idx);
                    Slot::Unknown
                }
                (FragmentKind::Text, _) => Slot::Unknown,
            };
            slots.push(slot);
        }

        match numeric.as_slice() {
            [] => return Err(LayoutIssue::NoNumericFields),
            [amount] => slots[*amount] = Slot::Amount,
            [left, right] => {
                let left_is_rate = self.split_pair(fragments[*left], fragments[*right]);
                let (rate, amount) = if left_is_rate { (*left, *right) } else { (*right, *left) };
                slots[rate] = Slot::Rate;
                slots[amount] = Slot::Amount;
            }
            [quantity, rate, amount] => {
                slots[*quantity] = Slot::Quantity;
                slots[*rate] = Slot::Rate;
                slots[*amount] = Slot::Amount;
            }
            more => return Err(LayoutIssue::TooManyNumericFields(more.len())),
        }

        let cells = fragments
            .into_iter()
            .zip(slots)
            .map(|(fragment, slot)| AssignedCell { slot, fragment: fragment.clone() })
            .collect();
        Ok(ColumnAssignment { cells })
    }

    /// Returns true when the left value of a two-number row is the rate.
    fn split_pair(&self, left: &TextFragment, right: &TextFragment) -> bool {
        match self.pair_policy {
            PairPolicy::Positional => true,
            PairPolicy::Magnitude => {
                let left = parse_number(&left.text, self.marker);
                let right = parse_number(&right.text, self.marker);
                match (left, right) {
                    (Ok(l), Ok(r)) => l <= r,
                    _ => true,
                }
            }
        }
    }

    /// Merges boxes that are the same detection reported twice. Keeps the
    /// more confident copy in the position of the first one seen.
    fn collapse_overlaps<'a>(&self, fragments: Vec<&'a TextFragment>) -> Vec<&'a TextFragment> {
        let mut kept: Vec<&TextFragment> = Vec::with_capacity(fragments.len());
        for fragment in fragments {
            let key = normalized_key(&fragment.text);
            let twin = kept.iter_mut().find(|k| {
                normalized_key(&k.text) == key
                    && k.bounds().iou(&fragment.bounds()) >= self.duplicate_overlap_iou
            });
            match twin {
                Some(existing) if fragment.confidence > existing.confidence => *existing = fragment,
                Some(_) => {}
                None => kept.push(fragment),
            }
        }
        kept
    }
}
