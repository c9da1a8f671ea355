//! Cross-file aggregate data.
//!
//! Aggregate rules need to see what every file contributed at once, so
//! instead of one silo per file the [`AggregateStore`] keeps a single ordered
//! composite value: URI → (rule key → aggregate terms). Top-level keys are
//! interned `Arc<str>` handles so snapshots and filtered views share key
//! allocations instead of re-creating them on every read.
//!
//! Invariant: the composite's keys are exactly the URIs that contributed
//! non-empty data. Setting empty data is a no-op.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use serde_json::Value;

/// Aggregate terms produced for one file, keyed by rule identifier
/// (e.g. `imports/unresolved-import`).
pub type AggregateData = IndexMap<String, Vec<Value>>;

/// The shared composite: URI → aggregate data, in insertion order.
pub type Aggregates = IndexMap<Arc<str>, AggregateData>;

/// Whether `data` carries nothing worth storing.
pub fn is_empty_data(data: &AggregateData) -> bool {
    data.values().all(Vec::is_empty)
}

#[derive(Default)]
struct Inner {
    composite: Aggregates,
    interned: HashSet<Arc<str>>,
}

impl Inner {
    fn intern(&mut self, key: &str) -> Arc<str> {
        if let Some(existing) = self.interned.get(key) {
            return Arc::clone(existing);
        }
        let handle: Arc<str> = Arc::from(key);
        self.interned.insert(Arc::clone(&handle));
        handle
    }

    fn forget(&mut self, key: &str) {
        self.interned.remove(key);
    }
}

/// Keyed view over one shared aggregate composite.
pub struct AggregateStore {
    inner: RwLock<Inner>,
}

impl Default for AggregateStore {
    fn default() -> Self {
        AggregateStore::new()
    }
}

impl AggregateStore {
    /// Create an empty store.
    pub fn new() -> Self {
        AggregateStore {
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Aggregate data contributed by `uri`.
    pub fn get(&self, uri: &str) -> Option<AggregateData> {
        self.inner.read().composite.get(uri).cloned()
    }

    /// Whether `uri` contributed data.
    pub fn contains(&self, uri: &str) -> bool {
        self.inner.read().composite.contains_key(uri)
    }

    /// Replace the data contributed by `uri`. Empty data is ignored.
    pub fn set(&self, uri: &str, data: AggregateData) {
        if is_empty_data(&data) {
            return;
        }
        let mut inner = self.inner.write();
        let key = inner.intern(uri);
        inner.composite.insert(key, data);
    }

    /// Drop everything `uri` contributed. Missing keys are a no-op.
    pub fn delete(&self, uri: &str) -> Option<AggregateData> {
        let mut inner = self.inner.write();
        let removed = inner.composite.shift_remove(uri);
        if removed.is_some() {
            inner.forget(uri);
        }
        removed
    }

    /// Move `old`'s data to `new`, overwriting whatever `new` held.
    ///
    /// Missing `old` is a silent no-op. Returns whether anything moved.
    pub fn rename_key(&self, old: &str, new: &str) -> bool {
        let mut inner = self.inner.write();
        match inner.composite.shift_remove(old) {
            Some(data) => {
                inner.forget(old);
                let key = inner.intern(new);
                inner.composite.insert(key, data);
                true
            }
            None => false,
        }
    }

    /// Read-modify-write of one URI's data under the exclusive lock.
    ///
    /// Returning empty data removes the URI, keeping the key invariant.
    pub fn update_value<F>(&self, uri: &str, transform: F)
    where
        F: FnOnce(Option<&AggregateData>) -> AggregateData,
    {
        let mut inner = self.inner.write();
        let updated = transform(inner.composite.get(uri));
        if is_empty_data(&updated) {
            if inner.composite.shift_remove(uri).is_some() {
                inner.forget(uri);
            }
            return;
        }
        let key = inner.intern(uri);
        inner.composite.insert(key, updated);
    }

    /// Snapshot of the whole composite.
    pub fn clone_composite(&self) -> Aggregates {
        self.inner.read().composite.clone()
    }

    /// A new composite holding only the entries for `uris`, in store order.
    ///
    /// The store itself is not modified. Requested URIs without data are
    /// simply absent from the result.
    pub fn keep<S: AsRef<str>>(&self, uris: &[S]) -> Aggregates {
        let wanted: HashSet<&str> = uris.iter().map(AsRef::as_ref).collect();
        self.inner
            .read()
            .composite
            .iter()
            .filter(|(key, _)| wanted.contains(&***key))
            .map(|(key, data)| (Arc::clone(key), data.clone()))
            .collect()
    }

    /// Replace the whole composite, rebuilding the interning table.
    ///
    /// Used when aggregates are recomputed from scratch. Entries with empty
    /// data are dropped on the way in.
    pub fn reset(&self, composite: Aggregates) {
        let mut rebuilt = Inner::default();
        for (key, data) in composite {
            if is_empty_data(&data) {
                continue;
            }
            let key = rebuilt.intern(&key);
            rebuilt.composite.insert(key, data);
        }
        *self.inner.write() = rebuilt;
    }

    /// URIs that contributed data, in store order.
    pub fn uris(&self) -> Vec<String> {
        self.inner
            .read()
            .composite
            .keys()
            .map(|key| key.to_string())
            .collect()
    }

    /// Number of contributing URIs.
    pub fn len(&self) -> usize {
        self.inner.read().composite.len()
    }

    /// Whether no URI contributed data.
    pub fn is_empty(&self) -> bool {
        self.inner.read().composite.is_empty()
    }
}

impl fmt::Debug for AggregateStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AggregateStore")
            .field("uris", &self.len())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
