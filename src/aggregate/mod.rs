//! Aggregate state machines and the trait the C ABI shims drive.
//!
//! # State Lifecycle
//!
//! 1. [`UdfAggregate::init`] validates argument metadata and creates the state
//!    (once per statement).
//! 2. [`UdfAggregate::clear`] starts a new group.
//! 3. [`UdfAggregate::add`] is called once per row of the group.
//! 4. [`UdfAggregate::finalize`] produces the group result.
//! 5. The state is dropped at deinit.
//!
//! The host serializes every call for one instance, so implementations are
//! plain `&mut self` state with no interior locking.

pub mod byte_set;
pub mod not_in;

pub use byte_set::ByteSet;
pub use not_in::{GroupSnapshot, NotIn, RowEffect};

use std::os::raw::c_ulong;

use crate::error::Result;
use crate::ffi::udf::{ArgMetadata, Row};

/// Result shape published to the host from init.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResultShape {
    pub maybe_null: bool,
    pub max_length: c_ulong,
}

/// What finalize hands back to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Finalized<'a> {
    /// Return the host's result buffer as-is; `length` and `is_null` are not written.
    Untouched,
    /// SQL NULL.
    Null,
    /// A byte string, valid until the next call on the same instance.
    Bytes(&'a [u8]),
}

/// An aggregate that can be exported through the aggregate-UDF C ABI.
pub trait UdfAggregate: Sized {
    /// Function name used in host-visible messages.
    const NAME: &'static str;

    /// Exact number of SQL arguments accepted.
    const ARG_COUNT: usize;

    /// Declare argument coercions and build a fresh state. Arity has already
    /// been checked against [`Self::ARG_COUNT`].
    fn init(args: &mut ArgMetadata<'_>) -> Result<(Self, ResultShape)>;

    /// Reset for a new group.
    fn clear(&mut self);

    /// Process one row. Errors are row-local: the host keeps calling.
    fn add(&mut self, row: &Row<'_>) -> Result<()>;

    /// Produce the group result.
    fn finalize(&mut self) -> Finalized<'_>;
}
