//! DWH Common Library
//!
//! Shared utilities and error handling for the warehouse load tooling.
//!
//! # Overview
//!
//! - **Error Handling**: [`DwhError`] and the [`Result`] alias
//! - **Logging**: tracing subscriber setup shared by every binary
//! - **Checksums**: SHA-256 digests of files handed to object storage
//!
//! # Example
//!
//! ```no_run
//! use dwh_common::checksum::sha256_file;
//! use dwh_common::Result;
//!
//! fn describe(path: &str) -> Result<()> {
//!     let digest = sha256_file(path)?;
//!     tracing::info!(path, digest = %digest, "Computed checksum");
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod checksum;
pub mod error;
pub mod logging;

// Re-export commonly used types
pub use error::{DwhError, Result};
