//! Per-kind serialization rules.
//!
//! A [`Rule`] turns one node into its property map and lists the child nodes
//! the walk must follow. The [`RuleTable`] dispatches on [`NodeKind`];
//! kinds without an entry are skipped by the walk with a warning.

use std::collections::HashMap;

use glam::DVec3;
use serde_json::{json, Map, Value};

use super::context::WalkContext;
use crate::scene::{
    Actor, CameraState, DataArray, ImageData, LookupTable, Mapper, NodeData, NodeKind, NodeRef,
    PolyData, RenderWindow, Renderer, ScalarBar, Volume,
};
use crate::util::{Result, Shape};

/// Where a child's id is written in the parent's properties.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Slot {
    /// Single id under this key.
    Field(&'static str),
    /// Id appended to the list under this key.
    List(&'static str),
}

/// A child node to serialize after its parent.
#[derive(Clone, Debug)]
pub struct Child {
    pub slot: Slot,
    pub node: NodeRef,
}

impl Child {
    fn field(name: &'static str, node: &NodeRef) -> Self {
        Self { slot: Slot::Field(name), node: NodeRef::clone(node) }
    }

    fn list(name: &'static str, node: &NodeRef) -> Self {
        Self { slot: Slot::List(name), node: NodeRef::clone(node) }
    }
}

/// Property extraction for one node.
pub type PropertiesFn = fn(&NodeData, &mut WalkContext<'_>) -> Result<Map<String, Value>>;
/// Child enumeration for one node.
pub type ChildrenFn = fn(&NodeData, &mut WalkContext<'_>) -> Vec<Child>;

/// Serialization rule of one node kind.
#[derive(Clone, Copy)]
pub struct Rule {
    pub properties: PropertiesFn,
    pub children: ChildrenFn,
}

impl Rule {
    pub const fn new(properties: PropertiesFn, children: ChildrenFn) -> Self {
        Self { properties, children }
    }
}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Rule")
    }
}

/// Dispatch table from node kind to rule.
#[derive(Clone, Debug)]
pub struct RuleTable {
    rules: HashMap<NodeKind, Rule>,
}

impl RuleTable {
    /// Table with no rules.
    pub fn empty() -> Self {
        Self { rules: HashMap::new() }
    }

    /// Rules for every built-in node kind.
    pub fn standard() -> Self {
        let mut t = Self::empty();
        t.register(NodeKind::RenderWindow, Rule::new(render_window_props, render_window_children));
        t.register(NodeKind::Renderer, Rule::new(renderer_props, renderer_children));
        t.register(NodeKind::Actor, Rule::new(actor_props, actor_children));
        t.register(NodeKind::Volume, Rule::new(volume_props, volume_children));
        t.register(NodeKind::ScalarBar, Rule::new(scalar_bar_props, scalar_bar_children));
        t.register(NodeKind::Mapper, Rule::new(mapper_props, mapper_children));
        t.register(NodeKind::PolyData, Rule::new(poly_data_props, no_children));
        t.register(NodeKind::ImageData, Rule::new(image_data_props, no_children));
        t.register(NodeKind::LookupTable, Rule::new(lookup_table_props, no_children));
        t.register(NodeKind::Camera, Rule::new(camera_props, no_children));
        t
    }

    /// Install a rule, returning the one it replaces.
    pub fn register(&mut self, kind: NodeKind, rule: Rule) -> Option<Rule> {
        self.rules.insert(kind, rule)
    }

    pub fn remove(&mut self, kind: NodeKind) -> Option<Rule> {
        self.rules.remove(&kind)
    }

    #[inline]
    pub fn get(&self, kind: NodeKind) -> Option<&Rule> {
        self.rules.get(&kind)
    }

    pub fn supports(&self, kind: NodeKind) -> bool {
        self.rules.contains_key(&kind)
    }
}

impl Default for RuleTable {
    fn default() -> Self {
        Self::standard()
    }
}

fn no_children(_: &NodeData, _: &mut WalkContext<'_>) -> Vec<Child> {
    Vec::new()
}

fn props(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn vec3(v: DVec3) -> Value {
    json!([v.x, v.y, v.z])
}

// ---------------------------------------------------------------------------
// Window, renderer, props
// ---------------------------------------------------------------------------

fn render_window_props(data: &NodeData, _: &mut WalkContext<'_>) -> Result<Map<String, Value>> {
    let NodeData::RenderWindow(w) = data else { return Ok(Map::new()) };
    let RenderWindow { size, .. } = w;
    Ok(props(json!({ "size": size, "renderers": [] })))
}

fn render_window_children(data: &NodeData, _: &mut WalkContext<'_>) -> Vec<Child> {
    let NodeData::RenderWindow(w) = data else { return Vec::new() };
    w.renderers.iter().map(|r| Child::list("renderers", r)).collect()
}

fn renderer_props(data: &NodeData, _: &mut WalkContext<'_>) -> Result<Map<String, Value>> {
    let NodeData::Renderer(r) = data else { return Ok(Map::new()) };
    let Renderer { background, layer, interactive, .. } = r;
    Ok(props(json!({
        "background": background,
        "layer": layer,
        "interactive": interactive,
        "viewProps": [],
    })))
}

fn renderer_children(data: &NodeData, ctx: &mut WalkContext<'_>) -> Vec<Child> {
    let NodeData::Renderer(r) = data else { return Vec::new() };
    let mut out = Vec::with_capacity(r.view_props.len() + 1);
    match &r.active_camera {
        Some(cam) => out.push(Child::field("activeCamera", cam)),
        None => ctx.missing("vtkRenderer", "activeCamera"),
    }
    out.extend(r.view_props.iter().map(|p| Child::list("viewProps", p)));
    out
}

fn actor_props(data: &NodeData, _: &mut WalkContext<'_>) -> Result<Map<String, Value>> {
    let NodeData::Actor(a) = data else { return Ok(Map::new()) };
    let Actor { property: p, visibility, position, orientation, scale, .. } = a;
    Ok(props(json!({
        "visibility": visibility,
        "position": vec3(*position),
        "orientation": vec3(*orientation),
        "scale": vec3(*scale),
        "property": {
            "color": p.color,
            "opacity": p.opacity,
            "representation": p.representation as u8,
            "pointSize": p.point_size,
            "lineWidth": p.line_width,
            "edgeVisibility": p.edge_visibility,
            "ambient": p.ambient,
            "diffuse": p.diffuse,
            "specular": p.specular,
            "specularPower": p.specular_power,
        },
    })))
}

fn actor_children(data: &NodeData, ctx: &mut WalkContext<'_>) -> Vec<Child> {
    let NodeData::Actor(a) = data else { return Vec::new() };
    match &a.mapper {
        Some(m) => vec![Child::field("mapper", m)],
        None => {
            ctx.missing("vtkActor", "mapper");
            Vec::new()
        }
    }
}

fn volume_props(data: &NodeData, _: &mut WalkContext<'_>) -> Result<Map<String, Value>> {
    let NodeData::Volume(v) = data else { return Ok(Map::new()) };
    let Volume { property: p, visibility, .. } = v;
    Ok(props(json!({
        "visibility": visibility,
        "property": {
            "shade": p.shade,
            "ambient": p.ambient,
            "diffuse": p.diffuse,
            "specular": p.specular,
            "specularPower": p.specular_power,
            "interpolationType": p.interpolation as u8,
            "sampleDistance": p.sampling,
            "edgeGradient": p.edge_gradient,
        },
    })))
}

fn volume_children(data: &NodeData, ctx: &mut WalkContext<'_>) -> Vec<Child> {
    let NodeData::Volume(v) = data else { return Vec::new() };
    let mut out = Vec::with_capacity(2);
    match &v.input {
        Some(i) => out.push(Child::field("input", i)),
        None => ctx.missing("vtkVolume", "input"),
    }
    if let Some(lut) = &v.lookup_table {
        out.push(Child::field("lookupTable", lut));
    }
    out
}

fn scalar_bar_props(data: &NodeData, _: &mut WalkContext<'_>) -> Result<Map<String, Value>> {
    let NodeData::ScalarBar(b) = data else { return Ok(Map::new()) };
    let ScalarBar { title, visibility, .. } = b;
    Ok(props(json!({ "title": title, "visibility": visibility })))
}

fn scalar_bar_children(data: &NodeData, ctx: &mut WalkContext<'_>) -> Vec<Child> {
    let NodeData::ScalarBar(b) = data else { return Vec::new() };
    match &b.lookup_table {
        Some(lut) => vec![Child::field("lookupTable", lut)],
        None => {
            ctx.missing("vtkScalarBarActor", "lookupTable");
            Vec::new()
        }
    }
}

// ---------------------------------------------------------------------------
// Mapper and datasets
// ---------------------------------------------------------------------------

fn mapper_props(data: &NodeData, _: &mut WalkContext<'_>) -> Result<Map<String, Value>> {
    let NodeData::Mapper(m) = data else { return Ok(Map::new()) };
    let Mapper { scalar_range, scalar_visibility, scalar_mode, color_by_array, .. } = m;
    let mut out = props(json!({
        "scalarRange": scalar_range,
        "scalarVisibility": scalar_visibility,
        "scalarMode": *scalar_mode as u8,
    }));
    if let Some(name) = color_by_array {
        out.insert("colorByArrayName".into(), json!(name));
    }
    Ok(out)
}

fn mapper_children(data: &NodeData, ctx: &mut WalkContext<'_>) -> Vec<Child> {
    let NodeData::Mapper(m) = data else { return Vec::new() };
    let mut out = Vec::with_capacity(2);
    match &m.input {
        Some(i) => out.push(Child::field("input", i)),
        None => ctx.missing("vtkPolyDataMapper", "input"),
    }
    if let Some(lut) = &m.lookup_table {
        out.push(Child::field("lookupTable", lut));
    }
    out
}

/// False (with a warning) for an array that is not a whole number of tuples.
fn is_complete(ctx: &mut WalkContext<'_>, owner: &str, array: &DataArray) -> bool {
    if array.is_complete() {
        return true;
    }
    tracing::warn!(
        owner,
        name = array.name(),
        bytes = array.bytes().len(),
        components = array.components(),
        "array is not a whole number of tuples, left out"
    );
    ctx.missing(owner, array.name());
    false
}

/// Reference to a complete array, `None` when it had to be left out.
fn checked_ref(ctx: &mut WalkContext<'_>, owner: &str, array: &DataArray) -> Result<Option<Value>> {
    if !is_complete(ctx, owner, array) {
        return Ok(None);
    }
    ctx.array_ref(array).map(Some)
}

fn field_entry(
    ctx: &mut WalkContext<'_>,
    owner: &str,
    location: &str,
    registration: &str,
    array: &DataArray,
) -> Result<Option<Value>> {
    let Some(mut entry) = checked_ref(ctx, owner, array)? else {
        return Ok(None);
    };
    if let Value::Object(map) = &mut entry {
        map.insert("location".into(), json!(location));
        map.insert("registration".into(), json!(registration));
    }
    Ok(Some(entry))
}

fn poly_data_props(data: &NodeData, ctx: &mut WalkContext<'_>) -> Result<Map<String, Value>> {
    let NodeData::PolyData(pd) = data else { return Ok(Map::new()) };
    let PolyData { points, verts, lines, polys, strips, point_data, cell_data, active_scalars, active_normals } = pd;

    let mut out = Map::new();
    match points {
        Some(p) => {
            if let Some(r) = checked_ref(ctx, "vtkPolyData", p)? {
                out.insert("points".into(), r);
            }
        }
        None => ctx.missing("vtkPolyData", "points"),
    }
    for (name, cells) in [("verts", verts), ("lines", lines), ("polys", polys), ("strips", strips)] {
        if let Some(c) = cells {
            if let Some(r) = checked_ref(ctx, "vtkPolyData", c)? {
                out.insert(name.into(), r);
            }
        }
    }

    let mut fields = Vec::with_capacity(point_data.len() + cell_data.len());
    for array in point_data {
        let registration = if active_scalars.as_deref() == Some(array.name()) {
            "setScalars"
        } else if active_normals.as_deref() == Some(array.name()) {
            "setNormals"
        } else {
            "addArray"
        };
        fields.extend(field_entry(ctx, "vtkPolyData", "pointData", registration, array)?);
    }
    for array in cell_data {
        fields.extend(field_entry(ctx, "vtkPolyData", "cellData", "addArray", array)?);
    }
    out.insert("fields".into(), Value::Array(fields));
    Ok(out)
}

/// Image data goes out as a C-order (z, y, x) grid, subsampled to the
/// session's volume budget.
fn image_data_props(data: &NodeData, ctx: &mut WalkContext<'_>) -> Result<Map<String, Value>> {
    let NodeData::ImageData(img) = data else { return Ok(Map::new()) };
    let ImageData { dimensions: [nx, ny, nz], spacing, origin, scalars } = img;

    let mut out = props(json!({
        "dimensions": [nx, ny, nz],
        "spacing": vec3(*spacing),
        "origin": vec3(*origin),
        "fields": [],
    }));
    let Some(scalars) = scalars else {
        ctx.missing("vtkImageData", "scalars");
        return Ok(out);
    };

    let points = nx.checked_mul(*ny).and_then(|v| v.checked_mul(*nz));
    let expected = match points {
        Some(n) if n == scalars.num_tuples() && scalars.is_complete() => n,
        _ => {
            tracing::warn!(
                name = scalars.name(),
                tuples = scalars.num_tuples(),
                dimensions = ?[nx, ny, nz],
                "scalars do not match image dimensions, left out"
            );
            ctx.missing("vtkImageData", "scalars");
            return Ok(out);
        }
    };

    let field = if scalars.components() == 1 && expected > 0 {
        let desc = ctx.subsampler().describe(
            scalars.bytes(),
            scalars.dtype(),
            [*nz, *ny, *nx],
            DVec3::new(spacing.z, spacing.y, spacing.x),
            DVec3::new(origin.z, origin.y, origin.x),
        )?;
        let [dz, dy, dx] = desc.dims;
        let s = desc.spacing;
        out.insert("dimensions".into(), json!([dx, dy, dz]));
        out.insert("spacing".into(), json!([s.z, s.y, s.x]));
        out.insert("extent".into(), json!([0, dx - 1, 0, dy - 1, 0, dz - 1]));
        out.insert("originalDimensions".into(), json!([nx, ny, nz]));
        out.insert("dataRange".into(), json!([desc.data_range.0, desc.data_range.1]));

        let shape = Shape::d3(dz, dy, dx);
        let mut entry = ctx.buffer_ref(scalars.name(), &desc.bytes, desc.dtype, &shape, 1)?;
        if let Value::Object(map) = &mut entry {
            map.insert("location".into(), json!("pointData"));
            map.insert("registration".into(), json!("setScalars"));
        }
        entry
    } else {
        tracing::debug!(name = scalars.name(), "multi-component image scalars sent without subsampling");
        if let Some((lo, hi)) = scalars.value_range() {
            out.insert("dataRange".into(), json!([lo, hi]));
        }
        match field_entry(ctx, "vtkImageData", "pointData", "setScalars", scalars)? {
            Some(entry) => entry,
            None => return Ok(out),
        }
    };
    out.insert("fields".into(), json!([field]));
    Ok(out)
}

fn lookup_table_props(data: &NodeData, _: &mut WalkContext<'_>) -> Result<Map<String, Value>> {
    let NodeData::LookupTable(lut) = data else { return Ok(Map::new()) };
    let LookupTable { table, range } = lut;
    let mut out = props(json!({
        "range": range,
        "numberOfColors": table.len(),
        "palette": lut.palette(),
    }));
    if table.iter().any(|c| c[3] != 255) {
        let alpha: Vec<f64> = table.iter().map(|c| c[3] as f64 / 255.0).collect();
        out.insert("alpha".into(), json!(alpha));
    }
    Ok(out)
}

fn camera_props(data: &NodeData, _: &mut WalkContext<'_>) -> Result<Map<String, Value>> {
    let NodeData::Camera(c) = data else { return Ok(Map::new()) };
    Ok(props(serde_json::to_value(CameraState::from(c))?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_table_covers_known_kinds() {
        let table = RuleTable::standard();
        for kind in [
            NodeKind::RenderWindow,
            NodeKind::Renderer,
            NodeKind::Actor,
            NodeKind::Volume,
            NodeKind::ScalarBar,
            NodeKind::Mapper,
            NodeKind::PolyData,
            NodeKind::ImageData,
            NodeKind::LookupTable,
            NodeKind::Camera,
        ] {
            assert!(table.supports(kind), "{kind:?}");
        }
        assert!(!table.supports(NodeKind::Other));
    }

    #[test]
    fn test_register_replaces() {
        let mut table = RuleTable::empty();
        assert!(table.register(NodeKind::Camera, Rule::new(camera_props, no_children)).is_none());
        assert!(table.register(NodeKind::Camera, Rule::new(camera_props, no_children)).is_some());
        assert!(table.remove(NodeKind::Camera).is_some());
        assert!(table.get(NodeKind::Camera).is_none());
    }
}
