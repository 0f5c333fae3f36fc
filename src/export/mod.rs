//! Scene export archives.
//!
//! A scene archive is a zip container (deflate) with the property tree at
//! `index.json` and every referenced array at `data/<key>`, stored as raw
//! bytes so a viewer can load the scene without a live session.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, Write};
use std::path::{Path, PathBuf};

use serde_json::Value;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::core::{ArrayCache, ArrayKey};
use crate::sync::{referenced_keys, SyncSession};
use crate::util::{Error, Result};

/// Entry holding the property tree.
pub const INDEX_ENTRY: &str = "index.json";
/// Directory holding array payloads.
pub const DATA_DIR: &str = "data";
/// Extension of exported scene files.
pub const SCENE_EXTENSION: &str = "sync";

/// Upper bound on the buffer reserved from an entry's declared size.
const MAX_PREALLOC: u64 = 64 << 20;

/// Export statistics
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExportStats {
    pub arrays: usize,
    /// Uncompressed payload bytes.
    pub bytes: usize,
}

/// Write a scene archive into `writer` and return it.
///
/// Every key must be present in `cache`.
pub fn write_archive<W: Write + Seek>(
    writer: W,
    scene: &Value,
    cache: &ArrayCache,
    keys: impl IntoIterator<Item = ArrayKey>,
) -> Result<(W, ExportStats)> {
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut zip = ZipWriter::new(writer);
    let mut stats = ExportStats::default();

    zip.start_file(INDEX_ENTRY, options)?;
    zip.write_all(&serde_json::to_vec(scene)?)?;

    for key in keys {
        let payload = cache.get(&key, false)?;
        zip.start_file(format!("{DATA_DIR}/{key}"), options)?;
        zip.write_all(&payload.bytes)?;
        stats.arrays += 1;
        stats.bytes += payload.bytes.len();
    }

    let writer = zip.finish()?;
    Ok((writer, stats))
}

/// Write a scene archive to `path`.
#[tracing::instrument(skip_all)]
pub fn export_archive(
    scene: &Value,
    cache: &ArrayCache,
    keys: impl IntoIterator<Item = ArrayKey>,
    path: impl AsRef<Path>,
) -> Result<ExportStats> {
    let path = path.as_ref();
    let file = BufWriter::new(File::create(path)?);
    let (mut file, stats) = write_archive(file, scene, cache, keys)?;
    file.flush()?;
    tracing::info!(path = %path.display(), arrays = stats.arrays, bytes = stats.bytes, "scene archive written");
    Ok(stats)
}

/// `filename` with the scene extension appended unless it already has it.
pub fn scene_path(filename: impl AsRef<Path>) -> PathBuf {
    let filename = filename.as_ref();
    if filename.extension().is_some_and(|e| e == SCENE_EXTENSION) {
        return filename.to_path_buf();
    }
    let mut name = filename.as_os_str().to_owned();
    name.push(".");
    name.push(SCENE_EXTENSION);
    PathBuf::from(name)
}

/// Export the last snapshot of `session` with all arrays it references.
///
/// Returns the path written.
pub fn export_scene(session: &SyncSession, filename: impl AsRef<Path>) -> Result<PathBuf> {
    if session.is_closed() {
        return Err(Error::SessionClosed);
    }
    let scene = session
        .last_scene()
        .ok_or_else(|| Error::other("no snapshot taken yet, nothing to export"))?;
    let path = scene_path(filename);
    export_archive(scene, session.cache(), referenced_keys(scene), &path)?;
    Ok(path)
}

/// A scene archive read back into memory.
#[derive(Clone, Debug)]
pub struct SceneArchive {
    pub index: Value,
    pub arrays: BTreeMap<ArrayKey, Vec<u8>>,
}

impl SceneArchive {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        tracing::debug!(path = %path.display(), "opening scene archive");
        Self::from_reader(BufReader::new(File::open(path)?))
    }

    pub fn from_reader<R: Read + Seek>(reader: R) -> Result<Self> {
        let mut zip = ZipArchive::new(reader)?;
        let mut index = None;
        let mut arrays = BTreeMap::new();

        for i in 0..zip.len() {
            let mut entry = zip.by_index(i)?;
            if entry.is_dir() {
                continue;
            }
            let name = entry.name().to_string();
            // Declared entry sizes are not trusted.
            let mut buf = Vec::with_capacity(entry.size().min(MAX_PREALLOC) as usize);
            entry.read_to_end(&mut buf)?;

            if name == INDEX_ENTRY {
                index = Some(serde_json::from_slice(&buf)?);
                continue;
            }
            let key = name
                .strip_prefix(DATA_DIR)
                .and_then(|rest| rest.strip_prefix('/'))
                .and_then(ArrayKey::from_hex);
            match key {
                Some(key) => {
                    arrays.insert(key, buf);
                }
                None => tracing::debug!(entry = %name, "unrecognized archive entry ignored"),
            }
        }

        let index = index.ok_or_else(|| Error::other(format!("archive has no {INDEX_ENTRY}")))?;
        Ok(Self { index, arrays })
    }

    /// Raw bytes of one array.
    pub fn array(&self, key: &ArrayKey) -> Option<&[u8]> {
        self.arrays.get(key).map(Vec::as_slice)
    }

    /// Keys the index references but the archive lacks.
    pub fn missing_arrays(&self) -> Vec<ArrayKey> {
        referenced_keys(&self.index)
            .into_iter()
            .filter(|k| !self.arrays.contains_key(k))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::{DType, Shape};
    use std::io::Cursor;

    #[test]
    fn test_scene_path() {
        assert_eq!(scene_path("out/scene"), PathBuf::from("out/scene.sync"));
        assert_eq!(scene_path("scene.sync"), PathBuf::from("scene.sync"));
        assert_eq!(scene_path("scene.json"), PathBuf::from("scene.json.sync"));
    }

    #[test]
    fn test_in_memory_round_trip() {
        let cache = ArrayCache::new();
        let key = cache.put(&[1, 2, 3, 4], DType::Uint8, &Shape::d1(4)).unwrap();
        let scene = serde_json::json!({ "properties": { "points": { "hash": key.to_string() } } });

        let (cursor, stats) = write_archive(Cursor::new(Vec::new()), &scene, &cache, [key]).unwrap();
        assert_eq!(stats, ExportStats { arrays: 1, bytes: 4 });

        let archive = SceneArchive::from_reader(Cursor::new(cursor.into_inner())).unwrap();
        assert_eq!(archive.index, scene);
        assert_eq!(archive.array(&key), Some(&[1u8, 2, 3, 4][..]));
        assert!(archive.missing_arrays().is_empty());
    }

    #[test]
    fn test_entry_capacity_is_capped() {
        let cache = ArrayCache::new();
        let data: Vec<u8> = (0..200_000u32).map(|v| (v % 253) as u8).collect();
        let key = cache.put(&data, DType::Uint8, &Shape::d1(data.len())).unwrap();
        let scene = serde_json::json!({ "properties": { "a": { "hash": key.to_string() } } });

        let (cursor, _) = write_archive(Cursor::new(Vec::new()), &scene, &cache, [key]).unwrap();
        let archive = SceneArchive::from_reader(Cursor::new(cursor.into_inner())).unwrap();
        assert_eq!(archive.array(&key), Some(data.as_slice()));
        assert!(MAX_PREALLOC < u64::from(u32::MAX));
    }

    #[test]
    fn test_unknown_key_fails() {
        let cache = ArrayCache::new();
        let key = ArrayKey::from_digest([7; 16]);
        let err = write_archive(Cursor::new(Vec::new()), &Value::Null, &cache, [key]);
        assert!(matches!(err, Err(Error::ArrayNotFound(_))));
    }

    #[test]
    fn test_missing_index() {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        zip.start_file("data/readme.txt", SimpleFileOptions::default()).unwrap();
        zip.write_all(b"hello").unwrap();
        let bytes = zip.finish().unwrap().into_inner();
        assert!(SceneArchive::from_reader(Cursor::new(bytes)).is_err());
    }
}
