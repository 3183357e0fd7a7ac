// Aggregate-UDF C ABI (MySQL / MariaDB loadable functions)
pub mod udf;

// Exported NOT_IN symbols
pub mod not_in;

pub use not_in::*;
