//! Error handling foundation for satu.
//!
//! Only the `Result` alias lives here. Each crate defines its own error
//! enums in an `error` module and returns them wrapped in a rootcause
//! `Report`, mapping lower-layer failures into its own variants.

use rootcause::Report;

/// A Result type alias using rootcause's Report for error handling.
pub type Result<T, C = ()> = std::result::Result<T, Report<C>>;
