//! Vidrelay - channel relay pipeline
//!
//! Finds videos published on a source channel since the last checkpoint,
//! downloads them, brands them with an overlay and a closing segment, and
//! republishes them. This library crate exposes the pipeline for the binary
//! and for integration testing.

pub mod auth;
pub mod checkpoint;
pub mod config;
pub mod error;
pub mod fetch;
pub mod ledger;
pub mod orchestrator;
pub mod publish;
pub mod source;
pub mod transform;
pub mod youtube;
