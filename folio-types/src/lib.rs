//! Core type definitions for Folio.
//!
//! This crate defines the plugin-agnostic primitives used throughout the
//! document engine:
//! - Document identifiers (UUID v7, rendered as strings inside documents)
//! - Monotonic version identifiers for version snapshots
//! - RFC 3339 timestamps used for `createdAt`, soft-delete markers and
//!   scheduled publishing
//!
//! Schema, document and storage types live in `folio-model` and
//! `folio-storage`, not here.

mod ids;
mod timestamp;

pub use ids::{DocumentId, VersionId};
pub use timestamp::Timestamp;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("invalid version id: {0}")]
    InvalidVersionId(String),
}
