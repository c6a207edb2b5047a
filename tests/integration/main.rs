//! Integration tests for the WISDOM crate.
//!
//! Everything runs against in-memory fakes; no network access.

mod classifier;
mod fakes;
mod pipeline;
mod scheduler;
