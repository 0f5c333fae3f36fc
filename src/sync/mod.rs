//! Scene graph serialization.
//!
//! A [`SyncSession`] walks the node graph with a [`RuleTable`], writes array
//! payloads into the [`ArrayCache`](crate::core::ArrayCache) and returns a
//! [`Snapshot`]: the property tree, the payloads the client is missing and
//! the keys it should drop.
//!
//! # Example
//!
//! ```
//! use scene_sync::prelude::*;
//!
//! let window = SceneWindow::new();
//! let mut session = SyncSession::new(SyncSettings::default());
//! let snap = session.snapshot_window(&window).unwrap();
//! assert_eq!(snap.scene["properties"]["numberOfLayers"], 2);
//! ```

mod context;
mod rules;
mod serializer;
mod session;

pub use context::{CancelToken, WalkContext, WalkStats};
pub use rules::{Child, ChildrenFn, PropertiesFn, Rule, RuleTable, Slot};
pub use serializer::{referenced_keys, NUMBER_OF_LAYERS};
pub use session::{NullRenderTarget, RenderTarget, Snapshot, SyncSession};
