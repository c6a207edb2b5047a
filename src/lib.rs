//! WISDOM: Polymarket crowd-prediction tracker.
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod error;
pub mod classifier;
pub mod format;
pub mod platforms;
pub mod worker;
pub mod llm;
pub mod publisher;
pub mod engine;
