//! Vidrelay-Common: Shared types, constants, and utilities.
//!
//! This crate provides common functionality used across vidrelay:
//!
//! - **Typed IDs**: Wrappers for source video ids and destination ids
//! - **Core Types**: Video records, local assets, pipeline stages, visibility
//! - **Path Utilities**: Deterministic asset naming and atomic file writes
//! - **Error Handling**: Common error types and result aliases
//!
//! # Examples
//!
//! ```
//! use vidrelay_common::{Stage, VideoId};
//! use vidrelay_common::paths::raw_asset_name;
//!
//! let id = VideoId::new("dQw4w9WgXcQ");
//! assert_eq!(raw_asset_name(&id), "dQw4w9WgXcQ.mp4");
//! assert_eq!(Stage::Download.to_string(), "download");
//! ```

pub mod error;
pub mod ids;
pub mod paths;
pub mod types;

pub use error::{Error, Result};
pub use ids::*;
pub use types::*;
