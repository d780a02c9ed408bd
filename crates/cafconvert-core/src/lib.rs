//! cafconvert-core: shared types, errors, configuration and naming policy.
//!
//! This crate is the foundational dependency for the other cafconvert crates,
//! providing:
//!
//! - **Errors**: a unified [`Error`] that maps onto HTTP status classes
//! - **Configuration**: the TOML-backed [`config::Config`]
//! - **Request ids**: [`RequestId`] naming each request's transient namespace
//! - **Naming**: eligibility checks, filename sanitization and output names
//!
//! # Examples
//!
//! ```
//! use cafconvert_core::naming::{is_eligible, output_file_name, sanitize_filename};
//!
//! assert!(is_eligible("voice memo.caf"));
//! let safe = sanitize_filename("voice memo.caf");
//! assert_eq!(safe, "voice_memo.caf");
//! assert_eq!(output_file_name(&safe), "voice_memo.mp3");
//! ```

pub mod config;
pub mod error;
pub mod ids;
pub mod naming;

// Re-export the most commonly used items at the crate root.
pub use error::{Error, Result};
pub use ids::*;
