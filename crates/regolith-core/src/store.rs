//! Concurrency-safe keyed containers.
//!
//! A [`KeyedStore`] owns one reader/writer lock and guards only its own map.
//! There is no lock ordering between stores and no cross-store transaction:
//! composite operations built from several stores (see
//! [`StateCache`](crate::cache::StateCache)) are sequences of individually safe
//! single-store operations.
//!
//! Partial updates go through [`KeyedStore::update_value`], which runs the
//! transform while holding the exclusive lock so no concurrent writer to the
//! same store can be lost between the read and the write.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

use parking_lot::RwLock;
use tracing::trace;

/// A named, independently locked map.
pub struct KeyedStore<K, V> {
    name: &'static str,
    entries: RwLock<HashMap<K, V>>,
}

impl<K, V> KeyedStore<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Create an empty store. `name` only appears in logs.
    pub fn new(name: &'static str) -> Self {
        KeyedStore {
            name,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Name given at construction.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Get a copy of the value stored under `key`.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.entries.read().get(key).cloned()
    }

    /// Whether `key` has a value.
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.entries.read().contains_key(key)
    }

    /// Store `value` under `key`, replacing any previous value.
    pub fn set(&self, key: K, value: V) {
        self.entries.write().insert(key, value);
    }

    /// Remove `key`, returning the value it held. Missing keys are a no-op.
    pub fn delete<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.entries.write().remove(key)
    }

    /// Snapshot of every entry, safe to iterate without holding the lock.
    pub fn clone_map(&self) -> HashMap<K, V> {
        self.entries.read().clone()
    }

    /// Move the value under `old` to `new`.
    ///
    /// If `old` has no value this is a silent no-op. If `new` already has a
    /// value it is overwritten. Returns whether anything moved.
    pub fn rename_key<Q>(&self, old: &Q, new: K) -> bool
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        let mut entries = self.entries.write();
        match entries.remove(old) {
            Some(value) => {
                if entries.insert(new, value).is_some() {
                    trace!(store = self.name, "rename overwrote existing entry");
                }
                true
            }
            None => false,
        }
    }

    /// Read-modify-write under the exclusive lock.
    ///
    /// `transform` receives the current value (if any) and returns the value
    /// to store. No other writer can interleave between the read and the write.
    pub fn update_value<F>(&self, key: K, transform: F)
    where
        F: FnOnce(Option<&V>) -> V,
    {
        let mut entries = self.entries.write();
        let updated = transform(entries.get(&key));
        entries.insert(key, updated);
    }

    /// Store `value` under `key` unless it already holds an equal value.
    ///
    /// The comparison and the write happen under one exclusive lock, so of
    /// several writers storing the same value only the first sees a change.
    pub fn set_if_changed(&self, key: K, value: V) -> bool
    where
        V: PartialEq,
    {
        let mut entries = self.entries.write();
        if entries.get(&key) == Some(&value) {
            return false;
        }
        entries.insert(key, value);
        true
    }

    /// Remove every entry.
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl<K, V> fmt::Debug for KeyedStore<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyedStore")
            .field("name", &self.name)
            .field("len", &self.entries.read().len())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> KeyedStore<String, String> {
        KeyedStore::new("test")
    }

    mod basic_operations {
        use super::*;

        #[test]
        fn set_then_get() {
            let s = store();
            s.set("file:///a.rego".to_string(), "package a".to_string());
            assert_eq!(s.get("file:///a.rego").as_deref(), Some("package a"));
            assert!(s.contains("file:///a.rego"));
            assert_eq!(s.len(), 1);
        }

        #[test]
        fn delete_is_idempotent() {
            let s = store();
            s.set("a".to_string(), "x".to_string());
            assert_eq!(s.delete("a").as_deref(), Some("x"));
            assert_eq!(s.delete("a"), None);
            assert!(s.is_empty());
        }

        #[test]
        fn clone_map_is_detached() {
            let s = store();
            s.set("a".to_string(), "1".to_string());
            let snapshot = s.clone_map();
            s.set("b".to_string(), "2".to_string());
            assert_eq!(snapshot.len(), 1);
            assert_eq!(s.len(), 2);
        }
    }

    mod rename {
        use super::*;

        #[test]
        fn moves_value() {
            let s = store();
            s.set("old".to_string(), "content".to_string());
            assert!(s.rename_key("old", "new".to_string()));
            assert_eq!(s.get("old"), None);
            assert_eq!(s.get("new").as_deref(), Some("content"));
        }

        #[test]
        fn missing_key_is_noop() {
            let s = store();
            s.set("other".to_string(), "x".to_string());
            assert!(!s.rename_key("old", "new".to_string()));
            assert_eq!(s.get("new"), None);
            assert_eq!(s.len(), 1);
        }

        #[test]
        fn overwrites_existing_target() {
            let s = store();
            s.set("old".to_string(), "moved".to_string());
            s.set("new".to_string(), "stale".to_string());
            assert!(s.rename_key("old", "new".to_string()));
            assert_eq!(s.get("new").as_deref(), Some("moved"));
            assert_eq!(s.len(), 1);
        }
    }

    mod set_if_changed {
        use super::*;

        #[test]
        fn equal_value_is_not_a_change() {
            let s = store();
            assert!(s.set_if_changed("k".to_string(), "a".to_string()));
            assert!(!s.set_if_changed("k".to_string(), "a".to_string()));
            assert!(s.set_if_changed("k".to_string(), "b".to_string()));
            assert_eq!(s.get("k").as_deref(), Some("b"));
        }

        #[test]
        fn concurrent_identical_writes_change_once() {
            let s = store();
            let changes = std::sync::atomic::AtomicUsize::new(0);
            std::thread::scope(|scope| {
                for _ in 0..8 {
                    scope.spawn(|| {
                        if s.set_if_changed("k".to_string(), "same".to_string()) {
                            changes.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                        }
                    });
                }
            });
            assert_eq!(changes.into_inner(), 1);
        }
    }

    mod update_value {
        use super::*;

        #[test]
        fn sees_prior_value() {
            let s: KeyedStore<String, Vec<u32>> = KeyedStore::new("numbers");
            s.update_value("k".to_string(), |prev| {
                assert!(prev.is_none());
                vec![1]
            });
            s.update_value("k".to_string(), |prev| {
                let mut next = prev.cloned().unwrap_or_default();
                next.push(2);
                next
            });
            assert_eq!(s.get("k"), Some(vec![1, 2]));
        }

        #[test]
        fn concurrent_updates_are_not_lost() {
            let s: KeyedStore<String, u64> = KeyedStore::new("counter");
            std::thread::scope(|scope| {
                for _ in 0..8 {
                    scope.spawn(|| {
                        for _ in 0..500 {
                            s.update_value("n".to_string(), |prev| prev.copied().unwrap_or(0) + 1);
                        }
                    });
                }
            });
            assert_eq!(s.get("n"), Some(8 * 500));
        }
    }
}
