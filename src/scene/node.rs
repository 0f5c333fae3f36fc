//! Renderer object graph nodes.
//!
//! The graph is owned and mutated by the host. Nodes are shared through
//! `Arc`, which is also what gives them their identity: the same `Arc`
//! instance always serializes under the same object id.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use glam::DVec3;
use parking_lot::{RwLock, RwLockReadGuard};

use super::array::DataArray;
use super::camera::Camera;
use super::color::LookupTable;

/// Shared handle to a scene node.
pub type NodeRef = Arc<SceneNode>;

/// Kind tag of a node, used to pick its serialization rule.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeKind {
    RenderWindow,
    Renderer,
    Actor,
    Volume,
    ScalarBar,
    Mapper,
    PolyData,
    ImageData,
    LookupTable,
    Camera,
    Other,
}

impl NodeKind {
    /// Class name the client instantiates.
    pub const fn class_name(self) -> &'static str {
        match self {
            Self::RenderWindow => "vtkRenderWindow",
            Self::Renderer => "vtkRenderer",
            Self::Actor => "vtkActor",
            Self::Volume => "vtkVolume",
            Self::ScalarBar => "vtkScalarBarActor",
            Self::Mapper => "vtkPolyDataMapper",
            Self::PolyData => "vtkPolyData",
            Self::ImageData => "vtkImageData",
            Self::LookupTable => "vtkLookupTable",
            Self::Camera => "vtkCamera",
            Self::Other => "vtkObject",
        }
    }
}

/// Top-level window holding renderers.
#[derive(Clone, Debug, Default)]
pub struct RenderWindow {
    pub renderers: Vec<NodeRef>,
    pub size: [u32; 2],
}

/// One renderer (viewport) with its view props.
#[derive(Clone, Debug)]
pub struct Renderer {
    pub background: [f64; 3],
    pub view_props: Vec<NodeRef>,
    pub active_camera: Option<NodeRef>,
    pub layer: u32,
    pub interactive: bool,
}

impl Default for Renderer {
    fn default() -> Self {
        Self {
            background: [0.32, 0.34, 0.43],
            view_props: Vec::new(),
            active_camera: None,
            layer: 0,
            interactive: true,
        }
    }
}

/// How an actor's surface is drawn.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Representation {
    Points = 0,
    Wireframe = 1,
    #[default]
    Surface = 2,
}

/// Surface appearance of an actor.
#[derive(Clone, Debug, PartialEq)]
pub struct ActorProperty {
    pub color: [f64; 3],
    pub opacity: f64,
    pub representation: Representation,
    pub point_size: f64,
    pub line_width: f64,
    pub edge_visibility: bool,
    pub ambient: f64,
    pub diffuse: f64,
    pub specular: f64,
    pub specular_power: f64,
}

impl Default for ActorProperty {
    fn default() -> Self {
        Self {
            color: [1.0, 1.0, 1.0],
            opacity: 1.0,
            representation: Representation::Surface,
            point_size: 1.0,
            line_width: 1.0,
            edge_visibility: false,
            ambient: 0.0,
            diffuse: 1.0,
            specular: 0.0,
            specular_power: 1.0,
        }
    }
}

/// Geometry prop.
#[derive(Clone, Debug)]
pub struct Actor {
    pub mapper: Option<NodeRef>,
    pub property: ActorProperty,
    pub visibility: bool,
    pub position: DVec3,
    pub orientation: DVec3,
    pub scale: DVec3,
}

impl Default for Actor {
    fn default() -> Self {
        Self {
            mapper: None,
            property: ActorProperty::default(),
            visibility: true,
            position: DVec3::ZERO,
            orientation: DVec3::ZERO,
            scale: DVec3::ONE,
        }
    }
}

/// Which attribute location feeds mapper coloring.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ScalarMode {
    #[default]
    Default = 0,
    UsePointData = 1,
    UseCellData = 2,
    UsePointFieldData = 3,
    UseCellFieldData = 4,
}

/// Maps a dataset to renderable primitives.
#[derive(Clone, Debug)]
pub struct Mapper {
    pub input: Option<NodeRef>,
    pub lookup_table: Option<NodeRef>,
    pub scalar_range: [f64; 2],
    pub scalar_visibility: bool,
    pub scalar_mode: ScalarMode,
    pub color_by_array: Option<String>,
}

impl Default for Mapper {
    fn default() -> Self {
        Self {
            input: None,
            lookup_table: None,
            scalar_range: [0.0, 1.0],
            scalar_visibility: true,
            scalar_mode: ScalarMode::Default,
            color_by_array: None,
        }
    }
}

/// Polygonal dataset.
#[derive(Clone, Debug, Default)]
pub struct PolyData {
    pub points: Option<DataArray>,
    pub verts: Option<DataArray>,
    pub lines: Option<DataArray>,
    pub polys: Option<DataArray>,
    pub strips: Option<DataArray>,
    pub point_data: Vec<DataArray>,
    pub cell_data: Vec<DataArray>,
    pub active_scalars: Option<String>,
    pub active_normals: Option<String>,
}

impl PolyData {
    /// Axis-aligned bounds of the points.
    pub fn bounds(&self) -> Option<(DVec3, DVec3)> {
        let points = self.points.as_ref()?;
        if points.components() != 3 || points.num_tuples() == 0 {
            return None;
        }
        let mut min = DVec3::splat(f64::INFINITY);
        let mut max = DVec3::splat(f64::NEG_INFINITY);
        for t in 0..points.num_tuples() {
            let p = DVec3::new(
                points.value(t * 3)?,
                points.value(t * 3 + 1)?,
                points.value(t * 3 + 2)?,
            );
            min = min.min(p);
            max = max.max(p);
        }
        Some((min, max))
    }
}

/// Regular grid dataset. Scalars are stored x-fastest.
#[derive(Clone, Debug)]
pub struct ImageData {
    /// Point counts along x, y, z.
    pub dimensions: [usize; 3],
    pub spacing: DVec3,
    pub origin: DVec3,
    pub scalars: Option<DataArray>,
}

impl Default for ImageData {
    fn default() -> Self {
        Self {
            dimensions: [0, 0, 0],
            spacing: DVec3::ONE,
            origin: DVec3::ZERO,
            scalars: None,
        }
    }
}

impl ImageData {
    /// Axis-aligned bounds of the grid.
    pub fn bounds(&self) -> Option<(DVec3, DVec3)> {
        if self.dimensions.contains(&0) {
            return None;
        }
        let cells = DVec3::new(
            (self.dimensions[0] - 1) as f64,
            (self.dimensions[1] - 1) as f64,
            (self.dimensions[2] - 1) as f64,
        );
        let far = self.origin + cells * self.spacing;
        Some((self.origin.min(far), self.origin.max(far)))
    }
}

/// Ray-cast volume interpolation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Interpolation {
    Nearest = 0,
    Linear = 1,
    #[default]
    FastLinear = 2,
}

/// Shading parameters of a volume.
#[derive(Clone, Debug, PartialEq)]
pub struct VolumeProperty {
    pub shade: bool,
    pub ambient: f64,
    pub diffuse: f64,
    pub specular: f64,
    pub specular_power: f64,
    pub interpolation: Interpolation,
    /// Distance between ray samples, relative to voxel size.
    pub sampling: f64,
    pub edge_gradient: f64,
}

impl Default for VolumeProperty {
    fn default() -> Self {
        Self {
            shade: true,
            ambient: 0.2,
            diffuse: 0.7,
            specular: 0.3,
            specular_power: 8.0,
            interpolation: Interpolation::FastLinear,
            sampling: 0.4,
            edge_gradient: 0.4,
        }
    }
}

/// Volumetric prop rendering an image dataset.
#[derive(Clone, Debug)]
pub struct Volume {
    pub input: Option<NodeRef>,
    pub lookup_table: Option<NodeRef>,
    pub property: VolumeProperty,
    pub visibility: bool,
}

impl Default for Volume {
    fn default() -> Self {
        Self {
            input: None,
            lookup_table: None,
            property: VolumeProperty::default(),
            visibility: true,
        }
    }
}

/// Color legend overlay.
#[derive(Clone, Debug, Default)]
pub struct ScalarBar {
    pub title: String,
    pub lookup_table: Option<NodeRef>,
    pub visibility: bool,
}

/// Payload of a scene node.
#[derive(Clone, Debug)]
pub enum NodeData {
    RenderWindow(RenderWindow),
    Renderer(Renderer),
    Actor(Actor),
    Volume(Volume),
    ScalarBar(ScalarBar),
    Mapper(Mapper),
    PolyData(PolyData),
    ImageData(ImageData),
    LookupTable(LookupTable),
    Camera(Camera),
    /// Object of a class with no serialization rule.
    Other { class_name: String },
}

impl NodeData {
    /// Kind tag.
    pub fn kind(&self) -> NodeKind {
        match self {
            Self::RenderWindow(_) => NodeKind::RenderWindow,
            Self::Renderer(_) => NodeKind::Renderer,
            Self::Actor(_) => NodeKind::Actor,
            Self::Volume(_) => NodeKind::Volume,
            Self::ScalarBar(_) => NodeKind::ScalarBar,
            Self::Mapper(_) => NodeKind::Mapper,
            Self::PolyData(_) => NodeKind::PolyData,
            Self::ImageData(_) => NodeKind::ImageData,
            Self::LookupTable(_) => NodeKind::LookupTable,
            Self::Camera(_) => NodeKind::Camera,
            Self::Other { .. } => NodeKind::Other,
        }
    }

    /// Class name reported to the client.
    pub fn class_name(&self) -> &str {
        match self {
            Self::Other { class_name } => class_name,
            other => other.kind().class_name(),
        }
    }
}

macro_rules! impl_from_data {
    ($($t:ident),* $(,)?) => {
        $(impl From<$t> for NodeData {
            fn from(v: $t) -> Self {
                NodeData::$t(v)
            }
        })*
    };
}

impl_from_data!(
    RenderWindow, Renderer, Actor, Volume, ScalarBar, Mapper, PolyData, ImageData, LookupTable,
    Camera,
);

/// A node of the renderer graph.
///
/// Payload lives behind a `RwLock` so the host can mutate in place while
/// keeping the `Arc` (and therefore the object id). Every [`modify`] bumps
/// the modification counter, which the serializer uses to skip unchanged
/// nodes.
///
/// [`modify`]: SceneNode::modify
#[derive(Debug)]
pub struct SceneNode {
    data: RwLock<NodeData>,
    mtime: AtomicU64,
}

impl SceneNode {
    /// Wrap node data in a new shared node.
    pub fn new(data: impl Into<NodeData>) -> NodeRef {
        Arc::new(Self { data: RwLock::new(data.into()), mtime: AtomicU64::new(1) })
    }

    /// Object of a class the serializer has no rule for.
    pub fn other(class_name: impl Into<String>) -> NodeRef {
        Self::new(NodeData::Other { class_name: class_name.into() })
    }

    /// Read access to the payload.
    #[inline]
    pub fn read(&self) -> RwLockReadGuard<'_, NodeData> {
        self.data.read()
    }

    /// Mutate the payload and mark the node modified.
    pub fn modify<R>(&self, f: impl FnOnce(&mut NodeData) -> R) -> R {
        let mut data = self.data.write();
        let r = f(&mut data);
        self.mtime.fetch_add(1, Ordering::AcqRel);
        r
    }

    /// Mark modified without changing the payload.
    pub fn touch(&self) {
        self.mtime.fetch_add(1, Ordering::AcqRel);
    }

    /// Modification counter.
    #[inline]
    pub fn mtime(&self) -> u64 {
        self.mtime.load(Ordering::Acquire)
    }

    #[inline]
    pub fn kind(&self) -> NodeKind {
        self.data.read().kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modify_bumps_mtime() {
        let node = SceneNode::new(Actor::default());
        let t0 = node.mtime();
        node.modify(|d| {
            if let NodeData::Actor(a) = d {
                a.visibility = false;
            }
        });
        assert!(node.mtime() > t0);
        assert_eq!(node.kind(), NodeKind::Actor);
        assert!(matches!(&*node.read(), NodeData::Actor(a) if !a.visibility));
    }

    #[test]
    fn test_class_names() {
        assert_eq!(SceneNode::new(Camera::default()).read().class_name(), "vtkCamera");
        assert_eq!(SceneNode::other("vtkCubeAxesActor").read().class_name(), "vtkCubeAxesActor");
    }

    #[test]
    fn test_bounds() {
        let pd = PolyData {
            points: Some(DataArray::from_slice("Points", &[0.0f32, -1.0, 2.0, 3.0, 1.0, -2.0], 3)),
            ..Default::default()
        };
        let (min, max) = pd.bounds().unwrap();
        assert_eq!(min, DVec3::new(0.0, -1.0, -2.0));
        assert_eq!(max, DVec3::new(3.0, 1.0, 2.0));

        let img = ImageData { dimensions: [3, 3, 2], spacing: DVec3::new(0.5, 1.0, 2.0), ..Default::default() };
        assert_eq!(img.bounds().unwrap().1, DVec3::new(1.0, 2.0, 2.0));
    }
}
