//! Synchronization session producing repeated snapshots for one client.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use serde_json::Value;

use super::context::{CancelToken, Memo, WalkContext, WalkStats};
use super::rules::RuleTable;
use super::serializer::{referenced_keys, serialize_root};
use crate::core::{ArrayCache, ArrayKey, LiveSet, ObjectId, ObjectRegistry, Payload, SyncSettings};
use crate::scene::{ColorMapper, NodeRef, SceneWindow};
use crate::util::{Error, Result};
use crate::volume::Subsampler;

/// Host-side rendering facility the session drives around each walk.
pub trait RenderTarget: Send {
    /// Bring the graph up to date (an offscreen render) before it is walked.
    fn prepare(&mut self, root: &NodeRef) -> Result<()>;

    /// Free rendering resources; called once when the session closes.
    fn release(&mut self);
}

/// Render target that does no rendering.
#[derive(Debug, Default)]
pub struct NullRenderTarget {
    frames: u64,
    released: bool,
}

impl NullRenderTarget {
    /// Number of `prepare` calls so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn is_released(&self) -> bool {
        self.released
    }
}

impl RenderTarget for NullRenderTarget {
    fn prepare(&mut self, _root: &NodeRef) -> Result<()> {
        self.frames += 1;
        Ok(())
    }

    fn release(&mut self) {
        self.released = true;
    }
}

/// Result of one serialization pass.
#[derive(Debug)]
pub struct Snapshot {
    /// Property tree with `properties.numberOfLayers` at the top.
    pub scene: Value,
    /// Payloads the client does not have yet, by content key.
    pub arrays: BTreeMap<ArrayKey, Payload>,
    /// Keys the client should drop.
    pub evicted: Vec<ArrayKey>,
    /// Session version after this pass.
    pub version: u64,
    pub stats: WalkStats,
}

impl Snapshot {
    /// Every array key referenced by the scene, in key order.
    pub fn referenced_keys(&self) -> Vec<ArrayKey> {
        referenced_keys(&self.scene)
    }
}

/// Serialization state for one client.
///
/// The session keeps object ids stable across passes, holds one reference
/// per live array in the (possibly shared) cache, and remembers which
/// payloads it already handed out so later snapshots only carry the delta.
pub struct SyncSession {
    settings: SyncSettings,
    registry: ObjectRegistry,
    cache: Arc<ArrayCache>,
    live: LiveSet,
    sent: HashSet<ArrayKey>,
    /// Keys that left the live set while other holders still kept them.
    pending_release: HashSet<ArrayKey>,
    memo: HashMap<ObjectId, Memo>,
    rules: RuleTable,
    subsampler: Subsampler,
    target: Box<dyn RenderTarget>,
    version: u64,
    last_scene: Option<Value>,
    closed: bool,
}

impl SyncSession {
    /// Session with its own cache.
    pub fn new(settings: SyncSettings) -> Self {
        let cache = Arc::new(ArrayCache::with_compression_level(settings.compression_level));
        Self::with_cache(settings, cache)
    }

    /// Session sharing `cache` with other sessions.
    pub fn with_cache(settings: SyncSettings, cache: Arc<ArrayCache>) -> Self {
        let registry = if settings.id_root.is_empty() {
            ObjectRegistry::new()
        } else {
            ObjectRegistry::with_root(settings.id_root.clone())
        };
        let subsampler = Subsampler::new(settings.max_volume_mb);
        tracing::debug!(root = registry.root(), "sync session created");
        Self {
            settings,
            registry,
            cache,
            live: LiveSet::new(),
            sent: HashSet::new(),
            pending_release: HashSet::new(),
            memo: HashMap::new(),
            rules: RuleTable::standard(),
            subsampler,
            target: Box::new(NullRenderTarget::default()),
            version: 0,
            last_scene: None,
            closed: false,
        }
    }

    pub fn with_render_target(mut self, target: Box<dyn RenderTarget>) -> Self {
        self.target = target;
        self
    }

    pub fn with_subsampler(mut self, subsampler: Subsampler) -> Self {
        self.subsampler = subsampler;
        self.memo.clear();
        self
    }

    pub fn with_rules(mut self, rules: RuleTable) -> Self {
        self.rules = rules;
        self.memo.clear();
        self
    }

    /// Rule table; changing it invalidates remembered node properties.
    pub fn rules_mut(&mut self) -> &mut RuleTable {
        self.memo.clear();
        &mut self.rules
    }

    #[inline]
    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    #[inline]
    pub fn cache(&self) -> &Arc<ArrayCache> {
        &self.cache
    }

    #[inline]
    pub fn registry(&self) -> &ObjectRegistry {
        &self.registry
    }

    /// Number of completed passes.
    #[inline]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Keys this session currently holds in the cache.
    pub fn live_keys(&self) -> Vec<ArrayKey> {
        let mut keys: Vec<_> = self.live.iter().copied().collect();
        keys.sort();
        keys
    }

    /// Scene tree of the last completed pass.
    pub fn last_scene(&self) -> Option<&Value> {
        self.last_scene.as_ref()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            Err(Error::SessionClosed)
        } else {
            Ok(())
        }
    }

    /// Serialize the graph under `root`.
    pub fn snapshot(&mut self, root: &NodeRef) -> Result<Snapshot> {
        self.snapshot_with(root, &HashSet::new(), None)
    }

    /// Serialize a window's graph.
    pub fn snapshot_window(&mut self, window: &SceneWindow) -> Result<Snapshot> {
        self.snapshot(window.node())
    }

    /// Serialize the graph under `root`.
    ///
    /// Keys in `exclude` are known to the caller and never carried as
    /// payloads. When `cancel` fires the pass stops at the next array, all
    /// references it acquired are returned, and the session is left as it
    /// was before the call.
    pub fn snapshot_with(
        &mut self,
        root: &NodeRef,
        exclude: &HashSet<ArrayKey>,
        cancel: Option<&CancelToken>,
    ) -> Result<Snapshot> {
        self.ensure_open()?;
        let _span = tracing::debug_span!("snapshot", version = self.version + 1).entered();
        self.target.prepare(root)?;

        let mut ctx = WalkContext::new(
            &mut self.registry,
            &self.cache,
            &self.live,
            &self.rules,
            &self.memo,
            &self.subsampler,
            &self.settings,
            cancel,
        );
        let scene = match serialize_root(root, &mut ctx) {
            Ok(scene) => scene,
            Err(e) => {
                ctx.rollback();
                if matches!(e, Error::Interrupted) {
                    tracing::info!("snapshot interrupted, acquired arrays released");
                }
                return Err(e);
            }
        };
        let touched = std::mem::take(&mut ctx.touched);
        let memo = std::mem::take(&mut ctx.memo_next);
        let stats = ctx.stats;
        drop(ctx);

        // Keys leaving this session's live set.
        let dropped: Vec<ArrayKey> = self.live.iter().filter(|k| !touched.contains(*k)).copied().collect();
        self.cache.mark_live_set(&mut self.live, touched.iter().copied());
        self.pending_release.extend(dropped);
        self.pending_release.retain(|k| !touched.contains(k));
        self.cache.release_evictable();

        let mut evicted: Vec<ArrayKey> =
            self.pending_release.iter().filter(|k| !self.cache.contains(k)).copied().collect();
        evicted.sort();
        for key in &evicted {
            self.pending_release.remove(key);
            self.sent.remove(key);
        }

        let mut arrays = BTreeMap::new();
        for key in &touched {
            if self.sent.contains(key) || exclude.contains(key) {
                continue;
            }
            arrays.insert(*key, self.cache.get(key, self.settings.compress_arrays)?);
            self.sent.insert(*key);
        }

        self.memo = memo;
        self.registry.prune();
        self.version += 1;
        self.last_scene = Some(scene.clone());

        tracing::debug!(
            nodes = stats.nodes,
            arrays = stats.arrays,
            payloads = arrays.len(),
            evicted = evicted.len(),
            skipped = stats.skipped_unsupported,
            "snapshot done"
        );
        Ok(Snapshot { scene, arrays, evicted, version: self.version, stats })
    }

    /// Payloads for keys the client asked for again.
    ///
    /// Returns the payloads found and the keys the cache no longer has.
    pub fn fetch_arrays(
        &mut self,
        keys: impl IntoIterator<Item = ArrayKey>,
    ) -> Result<(BTreeMap<ArrayKey, Payload>, Vec<ArrayKey>)> {
        self.ensure_open()?;
        let mut found = BTreeMap::new();
        let mut missing = Vec::new();
        for key in keys {
            match self.cache.get(&key, self.settings.compress_arrays) {
                Ok(payload) => {
                    found.insert(key, payload);
                    self.sent.insert(key);
                }
                Err(Error::ArrayNotFound(_)) => missing.push(key),
                Err(e) => return Err(e),
            }
        }
        if !missing.is_empty() {
            tracing::debug!(count = missing.len(), "requested arrays no longer cached");
        }
        Ok((found, missing))
    }

    /// Mark keys as unknown to the client so the next pass resends them.
    pub fn forget_sent(&mut self, keys: impl IntoIterator<Item = ArrayKey>) {
        for key in keys {
            self.sent.remove(&key);
        }
    }

    /// Color mappers of the scalar bars in `window`.
    pub fn color_mappers(&self, window: &SceneWindow) -> Vec<ColorMapper> {
        window.color_mappers()
    }

    /// Release cache references and rendering resources.
    ///
    /// Idempotent; later snapshots fail with [`Error::SessionClosed`].
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.cache.mark_live_set(&mut self.live, std::iter::empty());
        let purged = self.cache.release_evictable();
        self.target.release();
        self.sent.clear();
        self.pending_release.clear();
        self.memo.clear();
        self.registry.clear();
        tracing::debug!(purged = purged.len(), "sync session closed");
    }
}

impl Drop for SyncSession {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for SyncSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncSession")
            .field("root", &self.registry.root())
            .field("version", &self.version)
            .field("live", &self.live.len())
            .field("sent", &self.sent.len())
            .field("closed", &self.closed)
            .finish()
    }
}
