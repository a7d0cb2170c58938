//! PMD Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared error handling and logging for the PMD workspace.
//!
//! # Overview
//!
//! - **Error Handling**: the [`PmdError`] taxonomy and [`Result`] alias
//! - **Logging**: tracing subscriber configuration and initialization
//!
//! # Example
//!
//! ```no_run
//! use pmd_common::logging::{init_logging, LogConfig};
//! use pmd_common::{PmdError, Result};
//!
//! fn require_inputs(count: usize) -> Result<()> {
//!     if count == 0 {
//!         return Err(PmdError::MissingInput);
//!     }
//!     Ok(())
//! }
//!
//! fn main() -> anyhow::Result<()> {
//!     let _guard = init_logging(&LogConfig::from_env()?)?;
//!     require_inputs(1)?;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod logging;

// Re-export commonly used types
pub use error::{PmdError, Result};
