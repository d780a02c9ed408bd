//! cafconvert - convert Core Audio Format uploads to MP3
//!
//! This library crate exposes the batch orchestrator and the HTTP transport
//! for the binary and for integration testing.

pub mod batch;
pub mod server;
