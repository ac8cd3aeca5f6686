//! Durable blob storage for generated artifacts.
//!
//! - [`provider`]: the [`BlobStore`](provider::BlobStore) collaborator
//!   seam and the retrying [`ArtifactStore`](provider::ArtifactStore)
//!   adapter the orchestrator uses.
//! - [`http`]: Supabase Storage REST implementation.
//! - [`memory`]: in-memory implementation with failure injection.
//! - [`keys`]: collision-resistant object keys.

pub mod http;
pub mod keys;
pub mod memory;
pub mod provider;

pub use provider::{ArtifactStore, BlobStore, StorageError, StoredArtifact};
