//! Input scene graph.
//!
//! The host engine builds and mutates this graph; the serializer only reads it
//! at walk time.
//! - [`SceneNode`] / [`NodeData`] - Shared, mutable graph nodes
//! - [`DataArray`] - Typed attribute buffers
//! - [`LookupTable`] / [`ColorMapper`] - Scalar coloring
//! - [`Camera`] / [`CameraState`] - View state
//! - [`SceneWindow`] - Helpers over a render window

mod array;
mod camera;
mod color;
mod node;
mod window;

pub use array::{value_range, DataArray};
pub use camera::{Camera, CameraState};
pub use color::{rgb_to_hex, unit_rgb_to_hex, ColorMapper, LookupTable};
pub use node::{
    Actor, ActorProperty, ImageData, Interpolation, Mapper, NodeData, NodeKind, NodeRef, PolyData,
    RenderWindow, Renderer, Representation, ScalarBar, ScalarMode, SceneNode, Volume,
    VolumeProperty,
};
pub use window::SceneWindow;
