//! # Scene Sync
//!
//! Incremental synchronization of a renderer scene graph with a remote
//! client.
//!
//! The host owns a graph of shared [`scene::SceneNode`]s (render window,
//! renderers, actors, mappers, datasets, lookup tables, volumes). A
//! [`sync::SyncSession`] walks that graph and produces a JSON property tree
//! plus the binary arrays it references. Arrays live once in a
//! content-addressed [`core::ArrayCache`], so repeated passes over an
//! unchanged scene carry no payload at all, and arrays that fall out of every
//! session's live set are evicted and reported back to the client.
//!
//! ## Modules
//!
//! - [`util`] - Basic types (dtypes, shapes, errors, logging)
//! - [`core`] - Array cache, object ids, compression, settings
//! - [`scene`] - The input scene graph
//! - [`sync`] - Graph walk, rule dispatch and sessions
//! - [`volume`] - Volume subsampling and wire records
//! - [`export`] - Self-contained scene archives
//!
//! ## Example
//!
//! ```
//! use scene_sync::prelude::*;
//!
//! let window = SceneWindow::new();
//! let points = DataArray::from_slice("Points", &[0.0f32, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0], 3);
//! let data = SceneNode::new(PolyData { points: Some(points), ..Default::default() });
//! let mapper = SceneNode::new(Mapper { input: Some(data), ..Default::default() });
//! window.add_actors([SceneNode::new(Actor { mapper: Some(mapper), ..Default::default() })]);
//!
//! let mut session = SyncSession::new(SyncSettings::default());
//! let first = session.snapshot_window(&window).unwrap();
//! assert_eq!(first.arrays.len(), 1);
//!
//! // Nothing changed: same tree, no payloads.
//! let second = session.snapshot_window(&window).unwrap();
//! assert!(second.arrays.is_empty());
//! assert_eq!(first.scene, second.scene);
//! ```

pub mod core;
pub mod export;
pub mod scene;
pub mod sync;
pub mod util;
pub mod volume;

// Re-export commonly used types
pub use util::{init_tracing, DType, Error, Result, Shape};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::core::{ArrayCache, ArrayKey, LiveSet, ObjectId, ObjectRegistry, Payload, SyncSettings};
    pub use crate::export::{export_archive, export_scene, SceneArchive};
    pub use crate::scene::*;
    pub use crate::sync::{CancelToken, RenderTarget, RuleTable, Snapshot, SyncSession};
    pub use crate::util::{DType, Error, Result, Shape};
    pub use crate::volume::{NearestZoom, Resample, Subsampler, VolumeRecord};
}
