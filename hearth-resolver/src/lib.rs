//! Declarative artifact acquisition for Hearth addons.
//!
//! Addons name external libraries as `group:artifact:version[:classifier]`
//! coordinates; the resolver expands each coordinate into its transitive
//! closure against the repository working set, verifies checksums, and
//! materialises everything into a shared on-disk cache.

pub mod cache;
pub mod coordinate;
pub mod metadata;
pub mod repository;
pub mod resolver;

pub use cache::ArtifactCache;
pub use coordinate::ArtifactCoordinate;
pub use metadata::ArtifactMetadata;
pub use repository::{Repository, CENTRAL_URL};
pub use resolver::{ArtifactResolver, Resolution, ResolvedArtifact};

/// Per-coordinate resolution errors. A failing coordinate never aborts its
/// siblings; the engine aggregates and reports the full list.
#[derive(Debug)]
pub enum ResolverError {
    /// The coordinate string is not `group:artifact:version[:classifier]`.
    InvalidCoordinate(String),
    /// No repository in the working set could supply the artifact.
    Unresolved { coordinate: String, reason: String },
    /// The downloaded bytes do not match the published checksum.
    Mismatch {
        coordinate: String,
        expected: String,
        actual: String,
    },
}

impl std::fmt::Display for ResolverError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolverError::InvalidCoordinate(input) => {
                write!(f, "invalid artifact coordinate '{input}'")
            }
            ResolverError::Unresolved { coordinate, reason } => {
                write!(f, "could not resolve {coordinate}: {reason}")
            }
            ResolverError::Mismatch {
                coordinate,
                expected,
                actual,
            } => write!(
                f,
                "checksum mismatch for {coordinate}: expected {expected}, got {actual}"
            ),
        }
    }
}

impl std::error::Error for ResolverError {}
