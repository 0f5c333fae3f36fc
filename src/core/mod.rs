//! Core layer - session-independent building blocks.
//!
//! This module provides:
//! - [`ArrayCache`] - Content-addressed, reference-counted array store
//! - [`ObjectRegistry`] - Stable ids for scene object instances
//! - [`compress`] / [`decompress`] - Payload compression
//! - [`SyncSettings`] - Per-session configuration

mod cache;
mod compression;
mod registry;
mod settings;

pub use cache::{ArrayCache, ArrayKey, CacheStats, LiveSet, Payload, SampleDigest};
pub use compression::{compress, decompress};
pub use registry::{ObjectId, ObjectRegistry};
pub use settings::{SyncSettings, DEFAULT_MAX_VOLUME_MB};
