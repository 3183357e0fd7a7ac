//! NOT_IN group state and row processor.
//!
//! For each group the aggregate keeps two deduplicated sets of owned byte
//! strings:
//!
//! - `references`: every non-null `reference` argument seen so far.
//! - `values`: every non-null `value` argument that has never appeared as a
//!   reference in the group and was not paired with an identical reference on
//!   its own row.
//!
//! Once a byte string has been seen as a reference it is removed from
//! `values` and can never enter it again, so the final contents do not depend
//! on row order.

use serde::Serialize;

use super::byte_set::ByteSet;
use super::{Finalized, ResultShape, UdfAggregate};
use crate::error::{Result, UdfError};
use crate::ffi::udf::{ArgMetadata, Row};

/// Argument slot of the value column.
pub const VALUE_ARG: usize = 0;
/// Argument slot of the reference column.
pub const REFERENCE_ARG: usize = 1;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct NotIn {
    values: ByteSet,
    references: ByteSet,
}

/// What a single row changed. Used for trace logging and tests.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RowEffect {
    pub removed_value: bool,
    pub inserted_value: bool,
    pub inserted_reference: bool,
}

/// Sorted, hex-encoded view of a group for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupSnapshot {
    pub values: Vec<String>,
    pub references: Vec<String>,
}

impl NotIn {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a state whose sets already hold one slot each, so the first
    /// row of the first group does not need to grow them.
    pub fn try_new() -> Result<Self> {
        let values = ByteSet::try_with_capacity(1)?;
        let references = ByteSet::try_with_capacity(1)?;
        Ok(Self { values, references })
    }

    /// Apply one `(value, reference)` row. `None` is SQL NULL.
    ///
    /// On error, removals already applied stay applied and the failed insert
    /// leaves its set untouched. The reference insert is still attempted when
    /// only the value copy failed; the first error is returned.
    pub fn add_row(&mut self, value: Option<&[u8]>, reference: Option<&[u8]>) -> Result<RowEffect> {
        let value_seen_as_ref = value.is_some_and(|v| self.references.contains(v));
        let reference_seen_as_ref = reference.is_some_and(|r| self.references.contains(r));
        let value_seen_as_val = value.is_some_and(|v| self.values.contains(v));

        let mut effect = RowEffect::default();

        if let Some(r) = reference {
            effect.removed_value = self.values.remove(r);
        }

        let self_match = matches!((value, reference), (Some(v), Some(r)) if v == r);

        let mut first_error: Option<UdfError> = None;

        if let Some(v) = value {
            if !value_seen_as_ref && !value_seen_as_val && !self_match {
                match self.values.try_insert(v) {
                    Ok(inserted) => effect.inserted_value = inserted,
                    Err(e) => first_error = Some(e),
                }
            }
        }

        if let Some(r) = reference {
            if !reference_seen_as_ref {
                match self.references.try_insert(r) {
                    Ok(inserted) => effect.inserted_reference = inserted,
                    Err(e) => {
                        first_error.get_or_insert(e);
                    }
                }
            }
        }

        #[cfg(feature = "debug-logs")]
        log::trace!(
            "NOT_IN row: value={:?} reference={:?} effect={:?}",
            value.map(hex::encode),
            reference.map(hex::encode),
            effect
        );

        match first_error {
            Some(e) => Err(e),
            None => Ok(effect),
        }
    }

    /// Empty both sets for a new group.
    pub fn clear(&mut self) {
        self.values.clear();
        self.references.clear();
    }

    pub fn values(&self) -> &ByteSet {
        &self.values
    }

    pub fn references(&self) -> &ByteSet {
        &self.references
    }

    pub fn contains_value(&self, bytes: &[u8]) -> bool {
        self.values.contains(bytes)
    }

    pub fn contains_reference(&self, bytes: &[u8]) -> bool {
        self.references.contains(bytes)
    }

    pub fn snapshot(&self) -> GroupSnapshot {
        GroupSnapshot {
            values: self.values.sorted().into_iter().map(hex::encode).collect(),
            references: self
                .references
                .sorted()
                .into_iter()
                .map(hex::encode)
                .collect(),
        }
    }
}

impl UdfAggregate for NotIn {
    const NAME: &'static str = "NOT_IN";
    const ARG_COUNT: usize = 2;

    fn init(args: &mut ArgMetadata<'_>) -> Result<(Self, ResultShape)> {
        args.coerce_all_to_string();
        let shape = ResultShape {
            maybe_null: true,
            max_length: args.max_length(VALUE_ARG),
        };
        let state = Self::try_new()?;
        Ok((state, shape))
    }

    fn clear(&mut self) {
        NotIn::clear(self);
    }

    fn add(&mut self, row: &Row<'_>) -> Result<()> {
        self.add_row(row.get(VALUE_ARG), row.get(REFERENCE_ARG))
            .map(|_| ())
    }

    fn finalize(&mut self) -> Finalized<'_> {
        if log::log_enabled!(log::Level::Debug) {
            match serde_json::to_string(&self.snapshot()) {
                Ok(json) => log::debug!("NOT_IN group finalized: {}", json),
                Err(e) => log::debug!("NOT_IN group snapshot failed: {}", e),
            }
        }
        Finalized::Untouched
    }
}
