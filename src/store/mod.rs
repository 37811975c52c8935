// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Cluster access seam used by every reconciler.
//!
//! Reconcilers never talk to `kube::Api` directly. They go through [`ObjectStore`],
//! which exposes the handful of typed, namespaced operations reconciliation needs:
//!
//! - [`ObjectStore::get`] returns `None` for a missing object instead of an error
//! - [`ObjectStore::replace`] and [`ObjectStore::update_status`] carry the object's
//!   `resourceVersion`, so a concurrent writer surfaces as [`Error::Conflict`](crate::errors::Error::Conflict)
//! - [`ObjectStore::delete`] reports whether anything was actually deleted
//!
//! [`KubeStore`] is the production implementation. Unit tests use the in-memory
//! `MemoryStore`, which also counts writes so idempotence can be asserted.

pub mod api_store;

#[cfg(test)]
pub mod memory;

pub use api_store::KubeStore;

use crate::errors::Result;
use async_trait::async_trait;
use kube::core::NamespaceResourceScope;
use kube::Resource;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;

/// A statically typed, namespaced Kubernetes object the operator can manage.
pub trait ManagedObject:
    Resource<DynamicType = (), Scope = NamespaceResourceScope>
    + Clone
    + Debug
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
}

impl<K> ManagedObject for K where
    K: Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + Clone
        + Debug
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static
{
}

/// Typed access to the objects stored in the cluster.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch an object, or `None` if it does not exist.
    async fn get<K: ManagedObject>(&self, namespace: &str, name: &str) -> Result<Option<K>>;

    /// List every object of kind `K` in `namespace`.
    async fn list<K: ManagedObject>(&self, namespace: &str) -> Result<Vec<K>>;

    /// Create a new object.
    async fn create<K: ManagedObject>(&self, namespace: &str, object: &K) -> Result<K>;

    /// Replace an existing object. Its `resourceVersion` must still be current.
    async fn replace<K: ManagedObject>(&self, namespace: &str, object: &K) -> Result<K>;

    /// Write the status of `object`, pinned to its `resourceVersion`.
    async fn update_status<K: ManagedObject>(&self, namespace: &str, object: &K) -> Result<K>;

    /// Delete an object. Returns `false` if it did not exist.
    async fn delete<K: ManagedObject>(&self, namespace: &str, name: &str) -> Result<bool>;
}
