//! Error taxonomy shared by the aggregate state and the C ABI layer.
//!
//! The `Display` text of each variant is exactly what the host sees in its
//! message buffer, so every message stays under 80 bytes.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UdfError {
    #[error("wrong number of arguments: {name}() requires {expected} arguments")]
    WrongArgumentCount {
        name: &'static str,
        expected: usize,
    },
    #[error("Couldn't allocate memory")]
    StateAlloc,
    #[error("Couldn't allocate string")]
    StringAlloc,
    #[error("Couldn't reallocate memory")]
    SetGrowth,
    #[error("Internal error in {0}()")]
    Internal(&'static str),
}

/// Coarse classification used by the ABI layer to decide how loud a failure is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Wrong call shape. Fatal to the statement.
    Argument,
    /// Allocation failure. Fatal from init, row-local from add.
    Resource,
    /// Host handed over a malformed descriptor, or a panic was caught at the C boundary.
    Internal,
}

impl ErrorKind {
    /// Level the ABI shims log a failure of this kind at.
    pub fn log_level(self) -> log::Level {
        match self {
            ErrorKind::Argument => log::Level::Warn,
            ErrorKind::Resource | ErrorKind::Internal => log::Level::Error,
        }
    }
}

impl UdfError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            UdfError::WrongArgumentCount { .. } => ErrorKind::Argument,
            UdfError::StateAlloc | UdfError::StringAlloc | UdfError::SetGrowth => {
                ErrorKind::Resource
            }
            UdfError::Internal(_) => ErrorKind::Internal,
        }
    }
}

pub type Result<T> = std::result::Result<T, UdfError>;
