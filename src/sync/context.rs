//! Per-walk state shared by all serialization rules.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::{json, Value};

use super::rules::RuleTable;
use crate::core::{ArrayCache, ArrayKey, LiveSet, ObjectId, ObjectRegistry, SyncSettings};
use crate::scene::DataArray;
use crate::util::{DType, Error, Result, Shape};
use crate::volume::Subsampler;

/// Cooperative cancellation flag, checked before every array is cached.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation of the walk holding this token.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Counters collected during one walk.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WalkStats {
    /// Nodes serialized (each instance once).
    pub nodes: usize,
    /// Nodes skipped for lack of a rule.
    pub skipped_unsupported: usize,
    /// Absent sub-objects (actor without mapper and the like).
    pub missing_subresources: usize,
    /// Array references emitted.
    pub arrays: usize,
    /// Arrays newly acquired from the cache during this walk.
    pub new_arrays: usize,
    /// Nodes whose properties were reused from the previous walk.
    pub reused_nodes: usize,
}

/// Properties of a node as of a given modification counter.
#[derive(Clone, Debug)]
pub(crate) struct Memo {
    pub mtime: u64,
    pub properties: serde_json::Map<String, Value>,
    pub arrays: Vec<ArrayKey>,
}

/// State of one graph walk.
///
/// Rules use it to turn arrays into cache references and to report missing
/// sub-objects.
pub struct WalkContext<'a> {
    pub(crate) registry: &'a mut ObjectRegistry,
    pub(crate) cache: &'a ArrayCache,
    pub(crate) live: &'a LiveSet,
    pub(crate) rules: &'a RuleTable,
    pub(crate) memo: &'a HashMap<ObjectId, Memo>,
    pub(crate) memo_next: HashMap<ObjectId, Memo>,
    pub(crate) emitted: HashSet<ObjectId>,
    pub(crate) touched: BTreeSet<ArrayKey>,
    pub(crate) acquired: Vec<ArrayKey>,
    pub(crate) node_arrays: Vec<ArrayKey>,
    pub(crate) stats: WalkStats,
    subsampler: &'a Subsampler,
    settings: &'a SyncSettings,
    cancel: Option<&'a CancelToken>,
}

impl<'a> WalkContext<'a> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        registry: &'a mut ObjectRegistry,
        cache: &'a ArrayCache,
        live: &'a LiveSet,
        rules: &'a RuleTable,
        memo: &'a HashMap<ObjectId, Memo>,
        subsampler: &'a Subsampler,
        settings: &'a SyncSettings,
        cancel: Option<&'a CancelToken>,
    ) -> Self {
        Self {
            registry,
            cache,
            live,
            rules,
            memo,
            memo_next: HashMap::new(),
            emitted: HashSet::new(),
            touched: BTreeSet::new(),
            acquired: Vec::new(),
            node_arrays: Vec::new(),
            stats: WalkStats::default(),
            subsampler,
            settings,
            cancel,
        }
    }

    /// Session settings.
    #[inline]
    pub fn settings(&self) -> &SyncSettings {
        self.settings
    }

    /// Volume subsampler of the session.
    #[inline]
    pub fn subsampler(&self) -> &Subsampler {
        self.subsampler
    }

    /// Record an absent sub-object; the owning record is emitted without it.
    pub fn missing(&mut self, owner: &str, field: &str) {
        self.stats.missing_subresources += 1;
        tracing::debug!(owner, field, "sub-object missing, field left out");
    }

    /// Push a data array through the cache and return its reference record.
    pub fn array_ref(&mut self, array: &DataArray) -> Result<Value> {
        self.buffer_ref(array.name(), array.bytes(), array.dtype(), &array.shape(), array.components())
    }

    /// Push a raw buffer through the cache and return its reference record.
    pub fn buffer_ref(
        &mut self,
        name: &str,
        bytes: &Arc<Vec<u8>>,
        dtype: DType,
        shape: &Shape,
        components: usize,
    ) -> Result<Value> {
        if self.cancel.is_some_and(|c| c.is_cancelled()) {
            return Err(Error::Interrupted);
        }

        let key = ArrayKey::compute(bytes, dtype, shape);
        if !self.live.contains(&key) && !self.touched.contains(&key) {
            self.cache.put_keyed(key, Arc::clone(bytes), dtype, shape)?;
            self.acquired.push(key);
            self.stats.new_arrays += 1;
        }
        self.touched.insert(key);
        self.node_arrays.push(key);
        self.stats.arrays += 1;

        Ok(json!({
            "hash": key.to_string(),
            "name": name,
            "dataType": dtype.js_name(),
            "numberOfComponents": components,
            "size": shape.num_elements(),
            "shape": shape.sizes(),
        }))
    }

    /// Give back references acquired by an aborted walk.
    pub(crate) fn rollback(&mut self) {
        for key in self.acquired.drain(..) {
            if let Err(e) = self.cache.release(&key) {
                tracing::warn!(%key, error = %e, "rollback of aborted walk");
            }
        }
    }
}
