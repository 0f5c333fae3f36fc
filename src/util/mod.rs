//! Utility types and functions.
//!
//! This module contains fundamental types used throughout the library:
//! - [`DType`] - Element types of binary arrays
//! - [`Shape`] - Array dimensions
//! - [`Error`] / [`Result`] - Error handling
//! - [`init_tracing`] - Log subscriber setup

mod dtype;
mod error;
mod logging;
mod shape;

pub use dtype::*;
pub use error::*;
pub use logging::*;
pub use shape::*;
