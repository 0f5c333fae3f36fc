//! Session settings.

use serde::{Deserialize, Serialize};

use crate::util::Result;

/// Default volume transfer budget in megabytes (two bytes per voxel of a 256^3 grid).
pub const DEFAULT_MAX_VOLUME_MB: f64 = (256.0 * 256.0 * 256.0) * 2.0 / 1e6;

/// Knobs of one synchronization session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    /// Send array payloads zlib-compressed when that makes them smaller.
    pub compress_arrays: bool,
    /// Zlib level used when the session creates its own cache.
    pub compression_level: u32,
    /// Volumes larger than this are subsampled before transfer.
    pub max_volume_mb: f64,
    /// Add debug fields (Rust node kind, modification counter) to every record.
    pub debug: bool,
    /// Prefix for object ids; a random UUID is used when empty.
    pub id_root: String,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            compress_arrays: true,
            compression_level: 6,
            max_volume_mb: DEFAULT_MAX_VOLUME_MB,
            debug: false,
            id_root: String::new(),
        }
    }
}

impl SyncSettings {
    /// Parse settings from a JSON fragment; missing keys keep their defaults.
    pub fn from_json(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let s = SyncSettings::default();
        assert!(s.compress_arrays);
        assert!((s.max_volume_mb - 33.554432).abs() < 1e-9);
    }

    #[test]
    fn test_partial_json() {
        let s = SyncSettings::from_json(r#"{"max_volume_mb": 64, "debug": true}"#).unwrap();
        assert_eq!(s.max_volume_mb, 64.0);
        assert!(s.debug);
        assert_eq!(s.compression_level, 6);
        assert!(SyncSettings::from_json("{").is_err());
    }
}
