// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! In-memory [`ObjectStore`] for unit tests.
//!
//! Objects are kept as JSON keyed by `(kind, namespace, name)`. Writes behave like the
//! API server where reconcilers can observe it: `resourceVersion` is bumped on every
//! write and checked on replace and status updates, `replace` never touches status,
//! and `update_status` touches nothing else.

use super::{ManagedObject, ObjectStore};
use crate::errors::{Error, Result};
use async_trait::async_trait;
use kube::ResourceExt;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Mutex;

type Key = (String, String, String);

/// Number of writes issued against the store, by operation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WriteCounts {
    pub creates: usize,
    pub updates: usize,
    pub status_updates: usize,
    pub deletes: usize,
}

impl WriteCounts {
    #[must_use]
    pub fn total(&self) -> usize {
        self.creates + self.updates + self.status_updates + self.deletes
    }
}

#[derive(Default)]
struct State {
    objects: BTreeMap<Key, Value>,
    next_version: u64,
    writes: WriteCounts,
    pending_status_conflicts: usize,
}

impl State {
    fn bump(&mut self, value: &mut Value) {
        self.next_version += 1;
        value["metadata"]["resourceVersion"] = Value::String(self.next_version.to_string());
    }
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

fn key<K: ManagedObject>(namespace: &str, name: &str) -> Key {
    (K::kind(&()).to_string(), namespace.to_string(), name.to_string())
}

fn stored_version(value: &Value) -> Option<&str> {
    value["metadata"]["resourceVersion"].as_str()
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an object as-is, without counting a write.
    ///
    /// A `resourceVersion` and `uid` are assigned when the object has none.
    pub fn seed<K: ManagedObject>(&self, namespace: &str, object: &K) {
        let mut state = self.state.lock().unwrap();
        let mut value = serde_json::to_value(object).unwrap();
        value["metadata"]["namespace"] = Value::String(namespace.to_string());
        if value["metadata"]["uid"].is_null() {
            value["metadata"]["uid"] = Value::String(format!("uid-{}", object.name_any()));
        }
        if value["metadata"]["resourceVersion"].is_null() {
            state.bump(&mut value);
        }
        state
            .objects
            .insert(key::<K>(namespace, &object.name_any()), value);
    }

    /// Read an object without going through the async trait.
    #[must_use]
    pub fn object<K: ManagedObject>(&self, namespace: &str, name: &str) -> Option<K> {
        let state = self.state.lock().unwrap();
        state
            .objects
            .get(&key::<K>(namespace, name))
            .map(|v| serde_json::from_value(v.clone()).unwrap())
    }

    #[must_use]
    pub fn contains<K: ManagedObject>(&self, namespace: &str, name: &str) -> bool {
        self.object::<K>(namespace, name).is_some()
    }

    #[must_use]
    pub fn writes(&self) -> WriteCounts {
        self.state.lock().unwrap().writes
    }

    /// Make the next status update fail as if another writer got there first.
    pub fn fail_next_status_update_with_conflict(&self) {
        self.state.lock().unwrap().pending_status_conflicts += 1;
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn get<K: ManagedObject>(&self, namespace: &str, name: &str) -> Result<Option<K>> {
        let state = self.state.lock().unwrap();
        state
            .objects
            .get(&key::<K>(namespace, name))
            .map(|v| serde_json::from_value(v.clone()))
            .transpose()
            .map_err(Error::from)
    }

    async fn list<K: ManagedObject>(&self, namespace: &str) -> Result<Vec<K>> {
        let state = self.state.lock().unwrap();
        let kind = K::kind(&()).to_string();
        state
            .objects
            .iter()
            .filter(|((k, ns, _), _)| *k == kind && ns == namespace)
            .map(|(_, v)| serde_json::from_value(v.clone()).map_err(Error::from))
            .collect()
    }

    async fn create<K: ManagedObject>(&self, namespace: &str, object: &K) -> Result<K> {
        let name = object.name_any();
        let key = key::<K>(namespace, &name);
        let mut state = self.state.lock().unwrap();
        if state.objects.contains_key(&key) {
            return Err(Error::conflict::<K>(namespace, &name));
        }

        let mut value = serde_json::to_value(object)?;
        value["metadata"]["namespace"] = Value::String(namespace.to_string());
        value["metadata"]["uid"] = Value::String(format!("uid-{name}"));
        state.bump(&mut value);
        state.writes.creates += 1;
        state.objects.insert(key, value.clone());
        Ok(serde_json::from_value(value)?)
    }

    async fn replace<K: ManagedObject>(&self, namespace: &str, object: &K) -> Result<K> {
        let name = object.name_any();
        let key = key::<K>(namespace, &name);
        let mut state = self.state.lock().unwrap();
        let Some(existing) = state.objects.get(&key).cloned() else {
            return Err(Error::not_found::<K>(namespace, &name));
        };
        if let Some(rv) = object.resource_version() {
            if stored_version(&existing) != Some(rv.as_str()) {
                return Err(Error::conflict::<K>(namespace, &name));
            }
        }

        let mut value = serde_json::to_value(object)?;
        value["metadata"]["namespace"] = Value::String(namespace.to_string());
        value["metadata"]["uid"] = existing["metadata"]["uid"].clone();
        if let Some(map) = value.as_object_mut() {
            match existing.get("status") {
                Some(status) => {
                    map.insert("status".to_string(), status.clone());
                }
                None => {
                    map.remove("status");
                }
            }
        }
        state.bump(&mut value);
        state.writes.updates += 1;
        state.objects.insert(key, value.clone());
        Ok(serde_json::from_value(value)?)
    }

    async fn update_status<K: ManagedObject>(&self, namespace: &str, object: &K) -> Result<K> {
        let name = object.name_any();
        let key = key::<K>(namespace, &name);
        let mut state = self.state.lock().unwrap();
        if state.pending_status_conflicts > 0 {
            state.pending_status_conflicts -= 1;
            return Err(Error::conflict::<K>(namespace, &name));
        }
        let Some(mut stored) = state.objects.get(&key).cloned() else {
            return Err(Error::not_found::<K>(namespace, &name));
        };
        if let Some(rv) = object.resource_version() {
            if stored_version(&stored) != Some(rv.as_str()) {
                return Err(Error::conflict::<K>(namespace, &name));
            }
        }

        let value = serde_json::to_value(object)?;
        stored["status"] = value.get("status").cloned().unwrap_or_default();
        state.bump(&mut stored);
        state.writes.status_updates += 1;
        state.objects.insert(key, stored.clone());
        Ok(serde_json::from_value(stored)?)
    }

    async fn delete<K: ManagedObject>(&self, namespace: &str, name: &str) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        let removed = state.objects.remove(&key::<K>(namespace, name)).is_some();
        if removed {
            state.writes.deletes += 1;
        }
        Ok(removed)
    }
}
