//! Convenience handle over a render window node.

use std::sync::Arc;

use glam::DVec3;

use super::camera::{Camera, CameraState};
use super::color::ColorMapper;
use super::node::{NodeData, NodeKind, NodeRef, RenderWindow, Renderer, SceneNode};

/// Handle to a render window with helpers for its first renderer.
///
/// All mutations go through [`SceneNode::modify`], so the next snapshot sees
/// them as dirty.
#[derive(Clone, Debug)]
pub struct SceneWindow {
    window: NodeRef,
}

impl SceneWindow {
    /// New window with one renderer and a default camera.
    pub fn new() -> Self {
        let camera = SceneNode::new(Camera::default());
        let renderer = SceneNode::new(Renderer { active_camera: Some(camera), ..Default::default() });
        let window = SceneNode::new(RenderWindow { renderers: vec![renderer], size: [300, 300] });
        Self { window }
    }

    /// Wrap an existing window node. Returns `None` for other node kinds.
    pub fn from_node(window: NodeRef) -> Option<Self> {
        (window.kind() == NodeKind::RenderWindow).then_some(Self { window })
    }

    /// The window node (root of the scene graph).
    #[inline]
    pub fn node(&self) -> &NodeRef {
        &self.window
    }

    /// First renderer of the window.
    pub fn renderer(&self) -> Option<NodeRef> {
        match &*self.window.read() {
            NodeData::RenderWindow(w) => w.renderers.first().cloned(),
            _ => None,
        }
    }

    fn with_renderer<R>(&self, f: impl FnOnce(&mut Renderer) -> R) -> Option<R> {
        let renderer = self.renderer()?;
        renderer.modify(|d| match d {
            NodeData::Renderer(r) => Some(f(r)),
            _ => None,
        })
    }

    fn read_renderer<R>(&self, f: impl FnOnce(&Renderer) -> R) -> Option<R> {
        let renderer = self.renderer()?;
        let data = renderer.read();
        match &*data {
            NodeData::Renderer(r) => Some(f(r)),
            _ => None,
        }
    }

    /// Set the renderer background.
    pub fn set_background(&self, r: f64, g: f64, b: f64) {
        self.with_renderer(|ren| ren.background = [r, g, b]);
    }

    /// Append view props to the renderer.
    pub fn add_actors(&self, actors: impl IntoIterator<Item = NodeRef>) {
        let actors: Vec<NodeRef> = actors.into_iter().collect();
        self.with_renderer(|ren| ren.view_props.extend(actors));
    }

    /// Remove the given props (by instance).
    pub fn remove_actors(&self, actors: &[NodeRef]) {
        self.with_renderer(|ren| {
            ren.view_props.retain(|p| !actors.iter().any(|a| Arc::ptr_eq(a, p)));
        });
    }

    /// Remove every actor, leaving other view props (volumes, scalar bars) alone.
    pub fn remove_all_actors(&self) {
        let actors = self.actors();
        self.remove_actors(&actors);
    }

    /// Geometry actors of the renderer, in insertion order.
    pub fn actors(&self) -> Vec<NodeRef> {
        self.read_renderer(|ren| {
            ren.view_props
                .iter()
                .filter(|p| p.kind() == NodeKind::Actor)
                .cloned()
                .collect()
        })
        .unwrap_or_default()
    }

    /// All view props of the renderer.
    pub fn view_props(&self) -> Vec<NodeRef> {
        self.read_renderer(|ren| ren.view_props.clone()).unwrap_or_default()
    }

    /// Active camera node.
    pub fn camera(&self) -> Option<NodeRef> {
        self.read_renderer(|ren| ren.active_camera.clone()).flatten()
    }

    /// Replace the active camera node.
    pub fn set_camera(&self, camera: NodeRef) {
        self.with_renderer(|ren| ren.active_camera = Some(camera));
    }

    /// Share `other`'s camera: both windows then serialize the same camera object.
    pub fn link_camera(&self, other: &SceneWindow) {
        if let Some(cam) = other.camera() {
            self.set_camera(cam);
        }
    }

    /// Give this window its own camera again, initialized from `state` or
    /// copied from the previously shared camera.
    pub fn unlink_camera(&self, state: Option<&CameraState>) {
        let mut fresh = self
            .camera()
            .and_then(|c| {
                let data = c.read();
                match &*data {
                    NodeData::Camera(cam) => Some(cam.clone()),
                    _ => None,
                }
            })
            .unwrap_or_default();
        if let Some(state) = state {
            state.apply_to(&mut fresh);
        }
        self.set_camera(SceneNode::new(fresh));
    }

    /// Current camera state, if the renderer has a camera.
    pub fn camera_state(&self) -> Option<CameraState> {
        let cam = self.camera()?;
        let data = cam.read();
        match &*data {
            NodeData::Camera(c) => Some(CameraState::from(c)),
            _ => None,
        }
    }

    /// Bounds of all visible geometry and volumes.
    pub fn visible_bounds(&self) -> Option<(DVec3, DVec3)> {
        let mut acc: Option<(DVec3, DVec3)> = None;
        for prop in self.view_props() {
            let Some(b) = prop_bounds(&prop) else { continue };
            acc = Some(match acc {
                None => b,
                Some((lo, hi)) => (lo.min(b.0), hi.max(b.1)),
            });
        }
        acc
    }

    /// Point the camera at the visible scene bounds.
    pub fn reset_camera(&self) {
        let Some((min, max)) = self.visible_bounds() else { return };
        if let Some(cam) = self.camera() {
            cam.modify(|d| {
                if let NodeData::Camera(c) = d {
                    c.reset_to_bounds(min, max);
                }
            });
        }
    }

    /// One color mapper per scalar bar with a lookup table.
    pub fn color_mappers(&self) -> Vec<ColorMapper> {
        let mut out = Vec::new();
        for prop in self.view_props() {
            let data = prop.read();
            let NodeData::ScalarBar(bar) = &*data else { continue };
            let Some(lut) = &bar.lookup_table else { continue };
            let table = lut.read();
            if let NodeData::LookupTable(t) = &*table {
                out.push(ColorMapper::from_table(bar.title.clone(), t));
            }
        }
        out
    }
}

impl Default for SceneWindow {
    fn default() -> Self {
        Self::new()
    }
}

fn prop_bounds(prop: &NodeRef) -> Option<(DVec3, DVec3)> {
    let input = match &*prop.read() {
        NodeData::Actor(a) if a.visibility => {
            let mapper = a.mapper.clone()?;
            let data = mapper.read();
            match &*data {
                NodeData::Mapper(m) => m.input.clone()?,
                _ => return None,
            }
        }
        NodeData::Volume(v) if v.visibility => v.input.clone()?,
        _ => return None,
    };
    let data = input.read();
    match &*data {
        NodeData::PolyData(pd) => pd.bounds(),
        NodeData::ImageData(img) => img.bounds(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{Actor, DataArray, LookupTable, Mapper, PolyData, ScalarBar};

    fn triangle_actor() -> NodeRef {
        let pd = SceneNode::new(PolyData {
            points: Some(DataArray::from_slice("Points", &[0.0f32, 0.0, 0.0, 2.0, 0.0, 0.0, 0.0, 2.0, 0.0], 3)),
            ..Default::default()
        });
        let mapper = SceneNode::new(Mapper { input: Some(pd), ..Default::default() });
        SceneNode::new(Actor { mapper: Some(mapper), ..Default::default() })
    }

    #[test]
    fn test_add_remove_actors() {
        let win = SceneWindow::new();
        let a = triangle_actor();
        let b = triangle_actor();
        let bar = SceneNode::new(ScalarBar::default());
        win.add_actors([a.clone(), b.clone(), bar]);
        assert_eq!(win.actors().len(), 2);

        win.remove_actors(&[a]);
        assert_eq!(win.actors().len(), 1);
        assert!(Arc::ptr_eq(&win.actors()[0], &b));

        win.remove_all_actors();
        assert!(win.actors().is_empty());
        assert_eq!(win.view_props().len(), 1);
    }

    #[test]
    fn test_link_and_unlink_camera() {
        let a = SceneWindow::new();
        let b = SceneWindow::new();
        b.link_camera(&a);
        assert!(Arc::ptr_eq(&a.camera().unwrap(), &b.camera().unwrap()));

        let mut state = a.camera_state().unwrap();
        state.view_angle = 45.0;
        b.unlink_camera(Some(&state));
        assert!(!Arc::ptr_eq(&a.camera().unwrap(), &b.camera().unwrap()));
        assert_eq!(b.camera_state().unwrap().view_angle, 45.0);
        assert_eq!(a.camera_state().unwrap().view_angle, 30.0);
    }

    #[test]
    fn test_reset_camera_targets_bounds() {
        let win = SceneWindow::new();
        win.add_actors([triangle_actor()]);
        win.reset_camera();
        let state = win.camera_state().unwrap();
        assert_eq!(state.focal_point, [1.0, 1.0, 0.0]);
    }

    #[test]
    fn test_color_mappers_from_scalar_bars() {
        let win = SceneWindow::new();
        let lut = SceneNode::new(LookupTable::grayscale(4, [0.0, 10.0]));
        win.add_actors([
            SceneNode::new(ScalarBar { title: "Temp".into(), lookup_table: Some(lut), visibility: true }),
            SceneNode::new(ScalarBar { title: "NoTable".into(), lookup_table: None, visibility: true }),
        ]);
        let maps = win.color_mappers();
        assert_eq!(maps.len(), 1);
        assert_eq!(maps[0].name, "Temp");
        assert_eq!(maps[0].high, 10.0);
        assert_eq!(maps[0].palette.len(), 4);
    }
}
