//! Integration tests for scene export archives.

use std::fs;

use tempfile::TempDir;

use scene_sync::core::{ArrayCache, SyncSettings};
use scene_sync::export::{export_archive, export_scene, SceneArchive};
use scene_sync::scene::{Actor, DataArray, Mapper, PolyData, SceneNode, SceneWindow};
use scene_sync::sync::SyncSession;
use scene_sync::{DType, Error, Result, Shape};

fn window_with_mesh() -> SceneWindow {
    let pd = SceneNode::new(PolyData {
        points: Some(DataArray::from_slice("Points", &[0.0f64, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0], 3)),
        polys: Some(DataArray::from_slice("polys", &[3u32, 0, 1, 2], 1)),
        point_data: vec![DataArray::from_slice("Temperature", &[10i16, 20, 30], 1)],
        ..Default::default()
    });
    let mapper = SceneNode::new(Mapper { input: Some(pd), ..Default::default() });
    let window = SceneWindow::new();
    window.add_actors([SceneNode::new(Actor { mapper: Some(mapper), ..Default::default() })]);
    window
}

#[test]
fn test_export_scene_round_trip() -> Result<()> {
    let dir = TempDir::new()?;
    let window = window_with_mesh();
    let mut session = SyncSession::new(SyncSettings::default());
    let snap = session.snapshot_window(&window)?;

    let path = export_scene(&session, dir.path().join("mesh"))?;
    assert_eq!(path.extension().and_then(|e| e.to_str()), Some("sync"));
    assert!(path.exists());

    let archive = SceneArchive::open(&path)?;
    assert_eq!(&archive.index, session.last_scene().expect("scene"));
    assert_eq!(archive.index["properties"]["numberOfLayers"], 2);
    assert_eq!(archive.arrays.len(), 3);
    assert!(archive.missing_arrays().is_empty());

    // Archive holds raw bytes, whatever the session sent.
    for key in snap.referenced_keys() {
        let raw = session.cache().get(&key, false)?;
        assert_eq!(archive.array(&key), Some(raw.bytes.as_slice()));
    }
    Ok(())
}

#[test]
fn test_export_keeps_extension() -> Result<()> {
    let dir = TempDir::new()?;
    let mut session = SyncSession::new(SyncSettings::default());
    session.snapshot_window(&window_with_mesh())?;

    let path = export_scene(&session, dir.path().join("scene.sync"))?;
    assert_eq!(path, dir.path().join("scene.sync"));
    Ok(())
}

#[test]
fn test_export_without_snapshot_fails() {
    let dir = TempDir::new().expect("temp dir");
    let session = SyncSession::new(SyncSettings::default());
    assert!(export_scene(&session, dir.path().join("empty")).is_err());
}

#[test]
fn test_export_archive_subset() -> Result<()> {
    let dir = TempDir::new()?;
    let cache = ArrayCache::new();
    let a = cache.put(&[1, 2, 3, 4, 5, 6], DType::Uint8, &Shape::d2(2, 3))?;
    let b = cache.put(&[9; 8], DType::Float64, &Shape::d1(1))?;
    let scene = serde_json::json!({
        "properties": { "a": { "hash": a.to_string() }, "b": { "hash": b.to_string() } }
    });

    let path = dir.path().join("partial.sync");
    let stats = export_archive(&scene, &cache, [a], &path)?;
    assert_eq!(stats.arrays, 1);
    assert_eq!(stats.bytes, 6);

    let archive = SceneArchive::open(&path)?;
    assert_eq!(archive.array(&a), Some(&[1u8, 2, 3, 4, 5, 6][..]));
    assert_eq!(archive.missing_arrays(), vec![b]);
    Ok(())
}

#[test]
fn test_open_errors_are_retryable() {
    let dir = TempDir::new().expect("temp dir");

    let missing = SceneArchive::open(dir.path().join("nope.sync")).expect_err("missing file");
    assert!(matches!(missing, Error::Io(_)));
    assert!(missing.is_retryable());

    let garbage = dir.path().join("garbage.sync");
    fs::write(&garbage, b"definitely not a zip file").expect("write");
    let err = SceneArchive::open(&garbage).expect_err("not a zip");
    assert!(matches!(err, Error::Archive(_)));
    assert!(err.is_retryable());
}
