//! Content-addressed binary array cache.
//!
//! Every array that leaves the scene graph is stored once, keyed by a digest
//! of its dtype, shape and bytes. Entries are reference counted by their
//! holders (one [`LiveSet`] per sync session, plus anonymous [`ArrayCache::put`]
//! callers); entries that drop to zero references become evictable and are
//! purged by [`ArrayCache::release_evictable`], which reports the keys so the
//! client can drop its copies too.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use md5::{Digest, Md5};
use parking_lot::Mutex;

use super::compression;
use crate::util::{DType, Error, Result, Shape};

/// 128-bit digest used as content key.
pub type SampleDigest = [u8; 16];

/// Content-derived key of a cached array.
///
/// MD5 over the dtype tag, the shape and the raw bytes. Equal content always
/// yields the same key; a key match with different content is reported as
/// [`Error::KeyCollision`] instead of being trusted.
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct ArrayKey {
    digest: SampleDigest,
}

impl ArrayKey {
    /// Compute the key of a buffer.
    pub fn compute(bytes: &[u8], dtype: DType, shape: &Shape) -> Self {
        let mut hasher = Md5::new();
        hasher.update([dtype.tag()]);
        hasher.update((shape.rank() as u64).to_le_bytes());
        for &d in shape.sizes() {
            hasher.update((d as u64).to_le_bytes());
        }
        hasher.update(bytes);
        Self { digest: hasher.finalize().into() }
    }

    /// Wrap an existing digest.
    pub const fn from_digest(digest: SampleDigest) -> Self {
        Self { digest }
    }

    /// Parse the 32-character hex form.
    pub fn from_hex(s: &str) -> Option<Self> {
        if s.len() != 32 || !s.is_ascii() {
            return None;
        }
        let mut digest = [0u8; 16];
        for (i, byte) in digest.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&s[i * 2..i * 2 + 2], 16).ok()?;
        }
        Some(Self { digest })
    }

    /// Digest bytes.
    pub fn digest(&self) -> &SampleDigest {
        &self.digest
    }
}

impl fmt::Display for ArrayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.digest {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for ArrayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ArrayKey({self})")
    }
}

/// Bytes handed to the transport for one array.
#[derive(Clone, Debug)]
pub struct Payload {
    /// Raw or zlib-compressed bytes.
    pub bytes: Arc<Vec<u8>>,
    /// True when `bytes` is a zlib stream.
    pub compressed: bool,
}

#[derive(Clone)]
enum Compressed {
    NotComputed,
    Smaller(Arc<Vec<u8>>),
    NotSmaller,
}

struct CacheEntry {
    dtype: DType,
    shape: Shape,
    raw: Arc<Vec<u8>>,
    compressed: Compressed,
    ref_count: usize,
    last_seen: u64,
}

/// Keys one holder (a sync session) currently keeps alive.
#[derive(Debug, Default)]
pub struct LiveSet {
    pub(crate) keys: HashSet<ArrayKey>,
}

impl LiveSet {
    /// Create an empty live set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the holder currently references `key`.
    #[inline]
    pub fn contains(&self, key: &ArrayKey) -> bool {
        self.keys.contains(key)
    }

    /// Number of live keys.
    #[inline]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Iterate over live keys (unordered).
    pub fn iter(&self) -> impl Iterator<Item = &ArrayKey> {
        self.keys.iter()
    }
}

/// Snapshot of cache occupancy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub raw_bytes: usize,
    pub compressed_bytes: usize,
    pub evictable: usize,
    pub version: u64,
}

struct CacheInner {
    entries: HashMap<ArrayKey, CacheEntry>,
    version: u64,
}

/// Thread-safe content-addressed array store.
///
/// One `parking_lot::Mutex` serializes all reference count changes, so a single
/// cache can be shared between sessions through an `Arc`.
pub struct ArrayCache {
    inner: Mutex<CacheInner>,
    compression_level: u32,
}

impl ArrayCache {
    /// Create a cache compressing payloads at level 6.
    pub fn new() -> Self {
        Self::with_compression_level(6)
    }

    /// Create a cache with an explicit zlib level (0 disables compression).
    pub fn with_compression_level(level: u32) -> Self {
        Self {
            inner: Mutex::new(CacheInner { entries: HashMap::new(), version: 0 }),
            compression_level: level.min(9),
        }
    }

    /// Store a buffer (or add a reference to an identical stored one).
    pub fn put(&self, bytes: &[u8], dtype: DType, shape: &Shape) -> Result<ArrayKey> {
        let key = ArrayKey::compute(bytes, dtype, shape);
        self.put_keyed(key, Arc::new(bytes.to_vec()), dtype, shape)
    }

    /// Like [`put`](Self::put) but shares an already reference-counted buffer.
    pub fn put_shared(&self, bytes: Arc<Vec<u8>>, dtype: DType, shape: &Shape) -> Result<ArrayKey> {
        let key = ArrayKey::compute(&bytes, dtype, shape);
        self.put_keyed(key, bytes, dtype, shape)
    }

    pub(crate) fn put_keyed(
        &self,
        key: ArrayKey,
        bytes: Arc<Vec<u8>>,
        dtype: DType,
        shape: &Shape,
    ) -> Result<ArrayKey> {
        let expected = shape.byte_len(dtype.num_bytes());
        if expected != bytes.len() {
            return Err(Error::ShapeMismatch { expected, actual: bytes.len() });
        }

        let mut inner = self.inner.lock();
        let version = inner.version;
        if let Some(entry) = inner.entries.get_mut(&key) {
            let same = entry.dtype == dtype
                && entry.shape == *shape
                && (Arc::ptr_eq(&entry.raw, &bytes) || entry.raw.as_slice() == bytes.as_slice());
            if !same {
                tracing::error!(%key, "content key collision");
                return Err(Error::KeyCollision { key: key.to_string() });
            }
            entry.ref_count += 1;
            entry.last_seen = version;
            return Ok(key);
        }

        tracing::trace!(%key, bytes = bytes.len(), %dtype, "cache insert");
        inner.entries.insert(
            key,
            CacheEntry {
                dtype,
                shape: shape.clone(),
                raw: bytes,
                compressed: Compressed::NotComputed,
                ref_count: 1,
                last_seen: version,
            },
        );
        Ok(key)
    }

    /// Fetch a payload, compressing lazily on first compressed request.
    pub fn get(&self, key: &ArrayKey, want_compressed: bool) -> Result<Payload> {
        let raw = {
            let inner = self.inner.lock();
            let entry = inner
                .entries
                .get(key)
                .ok_or_else(|| Error::ArrayNotFound(key.to_string()))?;
            if !want_compressed || self.compression_level == 0 {
                return Ok(Payload { bytes: Arc::clone(&entry.raw), compressed: false });
            }
            match &entry.compressed {
                Compressed::Smaller(c) => {
                    return Ok(Payload { bytes: Arc::clone(c), compressed: true });
                }
                Compressed::NotSmaller => {
                    return Ok(Payload { bytes: Arc::clone(&entry.raw), compressed: false });
                }
                Compressed::NotComputed => Arc::clone(&entry.raw),
            }
        };

        // Compress without holding the lock; other sessions keep going.
        let state = match compression::compress(&raw, self.compression_level)? {
            Some(c) => Compressed::Smaller(Arc::new(c)),
            None => Compressed::NotSmaller,
        };

        let mut inner = self.inner.lock();
        if let Some(entry) = inner.entries.get_mut(key) {
            if matches!(entry.compressed, Compressed::NotComputed) {
                entry.compressed = state.clone();
            }
        }
        Ok(match state {
            Compressed::Smaller(c) => Payload { bytes: c, compressed: true },
            _ => Payload { bytes: raw, compressed: false },
        })
    }

    /// Drop one reference taken by an anonymous [`put`](Self::put).
    pub fn release(&self, key: &ArrayKey) -> Result<()> {
        let mut inner = self.inner.lock();
        let entry = inner
            .entries
            .get_mut(key)
            .ok_or_else(|| Error::ArrayNotFound(key.to_string()))?;
        entry.ref_count = entry.ref_count.saturating_sub(1);
        Ok(())
    }

    /// Replace a holder's live set after a full graph walk.
    ///
    /// Keys that were in `live` but are absent from `keys` lose one reference;
    /// every key in `keys` is stamped with the new cache version. Keys entering
    /// the set must already have been acquired with `put`.
    pub fn mark_live_set(&self, live: &mut LiveSet, keys: impl IntoIterator<Item = ArrayKey>) -> u64 {
        let next: HashSet<ArrayKey> = keys.into_iter().collect();
        let mut inner = self.inner.lock();
        inner.version += 1;
        let version = inner.version;

        for key in live.keys.difference(&next) {
            if let Some(entry) = inner.entries.get_mut(key) {
                entry.ref_count = entry.ref_count.saturating_sub(1);
                if entry.ref_count == 0 {
                    tracing::debug!(%key, "array evictable");
                }
            }
        }
        for key in &next {
            match inner.entries.get_mut(key) {
                Some(entry) => entry.last_seen = version,
                None => tracing::warn!(%key, "live set names an array the cache does not hold"),
            }
        }
        live.keys = next;
        version
    }

    /// Purge all zero-reference entries and return their keys (sorted).
    pub fn release_evictable(&self) -> Vec<ArrayKey> {
        let mut inner = self.inner.lock();
        let mut evicted: Vec<ArrayKey> = inner
            .entries
            .iter()
            .filter(|(_, e)| e.ref_count == 0)
            .map(|(k, _)| *k)
            .collect();
        for key in &evicted {
            inner.entries.remove(key);
        }
        evicted.sort();
        if !evicted.is_empty() {
            tracing::debug!(count = evicted.len(), "released evictable arrays");
        }
        evicted
    }

    /// Check whether a key is stored.
    #[inline]
    pub fn contains(&self, key: &ArrayKey) -> bool {
        self.inner.lock().entries.contains_key(key)
    }

    /// Current reference count of a key.
    pub fn ref_count(&self, key: &ArrayKey) -> Option<usize> {
        self.inner.lock().entries.get(key).map(|e| e.ref_count)
    }

    /// Cache version at which the key was last seen live.
    pub fn last_seen(&self, key: &ArrayKey) -> Option<u64> {
        self.inner.lock().entries.get(key).map(|e| e.last_seen)
    }

    /// Dtype and shape of a stored array.
    pub fn describe(&self, key: &ArrayKey) -> Option<(DType, Shape)> {
        self.inner
            .lock()
            .entries
            .get(key)
            .map(|e| (e.dtype, e.shape.clone()))
    }

    /// All stored keys, sorted.
    pub fn keys(&self) -> Vec<ArrayKey> {
        let mut keys: Vec<_> = self.inner.lock().entries.keys().copied().collect();
        keys.sort();
        keys
    }

    /// Number of stored entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Zlib level used for compressed payloads.
    #[inline]
    pub fn compression_level(&self) -> u32 {
        self.compression_level
    }

    /// Occupancy summary.
    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        let mut stats = CacheStats { version: inner.version, ..Default::default() };
        for entry in inner.entries.values() {
            stats.entries += 1;
            stats.raw_bytes += entry.raw.len();
            if let Compressed::Smaller(c) = &entry.compressed {
                stats.compressed_bytes += c.len();
            }
            if entry.ref_count == 0 {
                stats.evictable += 1;
            }
        }
        stats
    }
}

impl Default for ArrayCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn floats(values: &[f32]) -> Vec<u8> {
        bytemuck::cast_slice(values).to_vec()
    }

    #[test]
    fn test_put_twice_shares_entry() {
        let cache = ArrayCache::new();
        let data = floats(&[1.0, 2.0, 3.0]);
        let shape = Shape::d2(1, 3);

        let k1 = cache.put(&data, DType::Float32, &shape).unwrap();
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.ref_count(&k1), Some(1));

        let k2 = cache.put(&data, DType::Float32, &shape).unwrap();
        assert_eq!(k1, k2);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.ref_count(&k1), Some(2));
    }

    #[test]
    fn test_key_depends_on_dtype_and_shape() {
        let bytes = [0u8; 8];
        let a = ArrayKey::compute(&bytes, DType::Float32, &Shape::d2(2, 1));
        let b = ArrayKey::compute(&bytes, DType::Int32, &Shape::d2(2, 1));
        let c = ArrayKey::compute(&bytes, DType::Float32, &Shape::d2(1, 2));
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_hex_round_trip() {
        let key = ArrayKey::compute(b"abc", DType::Uint8, &Shape::d1(3));
        let hex = key.to_string();
        assert_eq!(hex.len(), 32);
        assert_eq!(ArrayKey::from_hex(&hex), Some(key));
        assert_eq!(ArrayKey::from_hex("zz"), None);
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let cache = ArrayCache::new();
        let err = cache.put(&[0u8; 5], DType::Float32, &Shape::d1(2)).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { expected: 8, actual: 5 }));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_forged_collision_is_fatal() {
        let cache = ArrayCache::new();
        let shape = Shape::d1(4);
        let key = cache.put(b"AAAA", DType::Uint8, &shape).unwrap();

        let err = cache
            .put_keyed(key, Arc::new(b"BBBB".to_vec()), DType::Uint8, &shape)
            .unwrap_err();
        assert!(matches!(err, Error::KeyCollision { .. }));
        assert_eq!(cache.ref_count(&key), Some(1));
        assert_eq!(cache.get(&key, false).unwrap().bytes.as_slice(), b"AAAA");
    }

    #[test]
    fn test_live_set_eviction() {
        let cache = ArrayCache::new();
        let mut live = LiveSet::new();
        let shape = Shape::d1(4);
        let k = cache.put(b"keep", DType::Uint8, &shape).unwrap();
        let gone = cache.put(b"gone", DType::Uint8, &shape).unwrap();

        cache.mark_live_set(&mut live, [k, gone]);
        assert!(cache.release_evictable().is_empty());

        cache.mark_live_set(&mut live, [k]);
        assert_eq!(cache.ref_count(&gone), Some(0));
        assert_eq!(cache.stats().evictable, 1);

        assert_eq!(cache.release_evictable(), vec![gone]);
        assert!(!cache.contains(&gone));
        assert!(cache.release_evictable().is_empty());
        assert!(cache.contains(&k));
    }

    #[test]
    fn test_other_holder_keeps_entry() {
        let cache = ArrayCache::new();
        let shape = Shape::d1(3);
        let mut a = LiveSet::new();
        let mut b = LiveSet::new();

        let k = cache.put(b"abc", DType::Uint8, &shape).unwrap();
        cache.put(b"abc", DType::Uint8, &shape).unwrap();
        cache.mark_live_set(&mut a, [k]);
        cache.mark_live_set(&mut b, [k]);

        cache.mark_live_set(&mut a, []);
        assert!(cache.release_evictable().is_empty());
        assert_eq!(cache.ref_count(&k), Some(1));

        cache.mark_live_set(&mut b, []);
        assert_eq!(cache.release_evictable(), vec![k]);
    }

    #[test]
    fn test_last_seen_tracks_version() {
        let cache = ArrayCache::new();
        let mut live = LiveSet::new();
        let k = cache.put(b"x", DType::Uint8, &Shape::d1(1)).unwrap();
        assert_eq!(cache.last_seen(&k), Some(0));
        let v = cache.mark_live_set(&mut live, [k]);
        assert_eq!(v, 1);
        assert_eq!(cache.last_seen(&k), Some(1));
    }

    #[test]
    fn test_lazy_compression() {
        let cache = ArrayCache::new();
        let data = vec![7u8; 4096];
        let k = cache.put(&data, DType::Uint8, &Shape::d1(4096)).unwrap();
        assert_eq!(cache.stats().compressed_bytes, 0);

        let raw = cache.get(&k, false).unwrap();
        assert!(!raw.compressed);
        assert_eq!(raw.bytes.as_slice(), data.as_slice());

        let packed = cache.get(&k, true).unwrap();
        assert!(packed.compressed);
        assert!(packed.bytes.len() < data.len());
        assert_eq!(compression::decompress(&packed.bytes).unwrap(), data);
        assert_eq!(cache.stats().compressed_bytes, packed.bytes.len());

        let again = cache.get(&k, true).unwrap();
        assert!(Arc::ptr_eq(&again.bytes, &packed.bytes));
    }

    #[test]
    fn test_get_missing() {
        let cache = ArrayCache::new();
        let key = ArrayKey::from_digest([1; 16]);
        assert!(matches!(cache.get(&key, false), Err(Error::ArrayNotFound(_))));
        assert!(cache.release(&key).is_err());
    }

    #[test]
    fn test_shared_between_threads() {
        let cache = Arc::new(ArrayCache::new());
        let shape = Shape::d1(16);
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let shape = shape.clone();
                std::thread::spawn(move || cache.put(&[3u8; 16], DType::Uint8, &shape).unwrap())
            })
            .collect();
        let keys: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(keys.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(cache.ref_count(&keys[0]), Some(8));
    }
}
