//! # NOT_IN aggregate UDF
//!
//! A loadable aggregate function for MySQL-compatible servers. Per group it
//! tracks every distinct `value` that never shows up as a `reference` in the
//! same group:
//!
//! ```sql
//! SELECT grp, NOT_IN(value_col, reference_col) FROM t GROUP BY grp;
//! ```
//!
//! ## Architecture
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`aggregate`] | Group state (`NotIn`), owned byte-string sets, the `UdfAggregate` lifecycle trait |
//! | [`ffi`] | `UDF_INIT` / `UDF_ARGS` mirrors, generic lifecycle shims, exported `not_in*` symbols |
//! | [`error`] | Error taxonomy and host-visible messages |
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `real-result` | No | Export a `double`-returning finalize for `RETURNS REAL` registrations |
//! | `debug-logs` | No | Per-row `trace!` logging |

// Crate-level lint configuration: the C ABI prototypes are dictated by the host.
#![allow(clippy::missing_safety_doc, clippy::too_many_arguments)]

pub mod aggregate;
pub mod error;
pub mod ffi;

pub use aggregate::{ByteSet, GroupSnapshot, NotIn, RowEffect, UdfAggregate};
pub use error::{ErrorKind, Result, UdfError};

// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get library version
pub fn get_version() -> &'static str {
    VERSION
}
