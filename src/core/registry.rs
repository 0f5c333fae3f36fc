//! Stable object identities across serialization passes.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

/// Identifier handed to the client for one scene object.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(String);

impl ObjectId {
    /// String form used in the property tree.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self.0)
    }
}

struct Slot {
    object: Weak<dyn Any + Send + Sync>,
    id: ObjectId,
}

/// Maps object instances (by `Arc` identity) to identifiers.
///
/// Identifiers are `<root>-<n>` with a monotonic `n`; they are never reused,
/// even after the object they named is dropped and its address recycled.
pub struct ObjectRegistry {
    root: String,
    next: u64,
    slots: HashMap<usize, Slot>,
}

impl ObjectRegistry {
    /// Create a registry with a fresh random root.
    pub fn new() -> Self {
        Self::with_root(uuid::Uuid::new_v4().simple().to_string())
    }

    /// Create a registry with a caller-provided root.
    pub fn with_root(root: impl Into<String>) -> Self {
        Self { root: root.into(), next: 1, slots: HashMap::new() }
    }

    /// Prefix shared by all ids of this registry.
    #[inline]
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Return the id of `object`, minting one on first sight.
    pub fn get_or_assign_id<T: Any + Send + Sync>(&mut self, object: &Arc<T>) -> ObjectId {
        let addr = Arc::as_ptr(object) as *const () as usize;
        if let Some(slot) = self.slots.get(&addr) {
            // A dead slot means the address now belongs to a new instance.
            if slot.object.strong_count() > 0 {
                return slot.id.clone();
            }
        }

        let id = ObjectId(format!("{}-{}", self.root, self.next));
        self.next += 1;
        let weak: Weak<dyn Any + Send + Sync> = Arc::downgrade(object) as Weak<dyn Any + Send + Sync>;
        self.slots.insert(addr, Slot { object: weak, id: id.clone() });
        id
    }

    /// Id previously assigned to `object`, if any.
    pub fn lookup<T: Any + Send + Sync>(&self, object: &Arc<T>) -> Option<ObjectId> {
        let addr = Arc::as_ptr(object) as *const () as usize;
        self.slots
            .get(&addr)
            .filter(|slot| slot.object.strong_count() > 0)
            .map(|slot| slot.id.clone())
    }

    /// Forget entries whose objects were dropped. Returns how many were removed.
    pub fn prune(&mut self) -> usize {
        let before = self.slots.len();
        self.slots.retain(|_, slot| slot.object.strong_count() > 0);
        before - self.slots.len()
    }

    /// Number of tracked objects (including not yet pruned dead ones).
    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Forget every entry. The counter keeps running.
    pub fn clear(&mut self) {
        self.slots.clear();
    }
}

impl Default for ObjectRegistry {
    fn default() -> Self {
        Self::new()
    }
}
