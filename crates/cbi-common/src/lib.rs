//! CBI Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared error handling and logging bootstrap for the CBI workspace.
//!
//! - **Error Handling**: [`CbiError`] and the [`Result`] alias
//! - **Logging**: `tracing` subscriber setup driven by `LOG_*` variables

pub mod error;
pub mod logging;

pub use error::{CbiError, Result};
