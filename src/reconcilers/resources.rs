// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Generic create-or-update-on-diff for Kubernetes resources.
//!
//! Every component step hands a freshly computed *desired* object to
//! [`reconcile_resource`] together with a *mutator*. The mutator merges the managed
//! fields of the desired object into the *existing* object read from the cluster and
//! reports whether anything changed:
//!
//! - object absent: the desired object is created as-is
//! - mutator returns `true`: the merged existing object is written back with its
//!   `resourceVersion`, so a concurrent writer surfaces as a conflict
//! - mutator returns `false`: nothing is written
//!
//! Mutators overwrite only the fields the operator owns. Fields assigned by the
//! cluster (cluster IPs, volume names, defaulted values) or set by other controllers
//! are left untouched, which is what keeps a second pass over an unchanged spec
//! write-free.
//!
//! # Example
//!
//! ```rust,no_run
//! use threescale_operator::reconcilers::resources::{configmap_mutator, reconcile_resource};
//! use threescale_operator::store::ObjectStore;
//! use k8s_openapi::api::core::v1::ConfigMap;
//!
//! async fn example<S: ObjectStore>(store: &S, desired: ConfigMap) {
//!     reconcile_resource(store, "3scale", desired, configmap_mutator).await.unwrap();
//! }
//! ```

use crate::errors::Result;
use crate::metrics;
use crate::store::{ManagedObject, ObjectStore};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{
    ConfigMap, Container, PersistentVolumeClaim, ResourceRequirements, Secret, Service,
    ServiceAccount,
};
use k8s_openapi::api::policy::v1::PodDisruptionBudget;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::{Resource, ResourceExt};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Merges the managed fields of `desired` into `existing`; returns whether it changed.
pub type Mutator<K> = fn(&mut K, &K) -> bool;

/// What [`reconcile_resource`] did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResourceChange {
    Created,
    Updated,
    Unchanged,
}

/// Converge one object towards `desired`.
///
/// # Errors
///
/// Returns [`Error::Conflict`](crate::errors::Error::Conflict) if the object changed
/// between read and write, or any store error.
pub async fn reconcile_resource<K, S>(
    store: &S,
    namespace: &str,
    desired: K,
    mutator: Mutator<K>,
) -> Result<ResourceChange>
where
    K: ManagedObject,
    S: ObjectStore,
{
    let name = desired.name_any();
    let kind = K::kind(&());

    match store.get::<K>(namespace, &name).await? {
        None => {
            store.create(namespace, &desired).await?;
            info!("Created {} {}/{}", kind, namespace, name);
            metrics::record_resource_created(&kind);
            Ok(ResourceChange::Created)
        }
        Some(mut existing) => {
            if !mutator(&mut existing, &desired) {
                debug!(kind = %kind, namespace = %namespace, name = %name, "Resource up to date");
                return Ok(ResourceChange::Unchanged);
            }
            store.replace(namespace, &existing).await?;
            info!("Updated {} {}/{}", kind, namespace, name);
            metrics::record_resource_updated(&kind);
            Ok(ResourceChange::Updated)
        }
    }
}

/// Delete `name` if it exists; returns whether anything was deleted.
///
/// # Errors
///
/// Propagates store errors.
pub async fn delete_resource<K, S>(store: &S, namespace: &str, name: &str) -> Result<bool>
where
    K: ManagedObject,
    S: ObjectStore,
{
    let deleted = store.delete::<K>(namespace, name).await?;
    if deleted {
        let kind = K::kind(&());
        info!("Deleted {} {}/{}", kind, namespace, name);
        metrics::record_resource_deleted(&kind);
    }
    Ok(deleted)
}

// ============================================================================
// Metadata helpers
// ============================================================================

/// Insert every desired key into `existing`, keeping keys it does not mention.
fn merge_string_map(
    existing: &mut Option<BTreeMap<String, String>>,
    desired: Option<&BTreeMap<String, String>>,
) -> bool {
    let Some(desired) = desired.filter(|d| !d.is_empty()) else {
        return false;
    };
    let existing = existing.get_or_insert_with(BTreeMap::new);
    let mut changed = false;
    for (key, value) in desired {
        if existing.get(key) != Some(value) {
            existing.insert(key.clone(), value.clone());
            changed = true;
        }
    }
    changed
}

/// Merge desired labels and annotations into `existing`, keeping foreign keys.
pub fn ensure_object_meta(existing: &mut ObjectMeta, desired: &ObjectMeta) -> bool {
    let labels = merge_string_map(&mut existing.labels, desired.labels.as_ref());
    let annotations = merge_string_map(&mut existing.annotations, desired.annotations.as_ref());
    labels || annotations
}

/// Make sure every desired owner reference is present on `existing`.
pub fn ensure_owner_reference(existing: &mut ObjectMeta, desired: &ObjectMeta) -> bool {
    let Some(desired_refs) = desired.owner_references.as_ref() else {
        return false;
    };
    let refs = existing.owner_references.get_or_insert_with(Vec::new);
    let mut changed = false;
    for desired_ref in desired_refs {
        match refs.iter_mut().find(|r| r.uid == desired_ref.uid) {
            Some(r) if r == desired_ref => {}
            Some(r) => {
                *r = desired_ref.clone();
                changed = true;
            }
            None => {
                refs.push(desired_ref.clone());
                changed = true;
            }
        }
    }
    changed
}

/// Metadata-only mutator: labels, annotations and owner references.
pub fn meta_mutator<K: Resource>(existing: &mut K, desired: &K) -> bool {
    let meta = ensure_object_meta(existing.meta_mut(), desired.meta());
    let owner = ensure_owner_reference(existing.meta_mut(), desired.meta());
    meta || owner
}

/// Assign `desired` to `existing` when they differ.
fn sync_field<T: PartialEq + Clone>(existing: &mut T, desired: &T) -> bool {
    if existing == desired {
        return false;
    }
    *existing = desired.clone();
    true
}

/// Like [`sync_field`], but an empty `resources: {}` equals an unset one.
///
/// The API server returns `{}` for containers created without requirements.
fn sync_resources(
    existing: &mut Option<ResourceRequirements>,
    desired: &Option<ResourceRequirements>,
) -> bool {
    let empty = ResourceRequirements::default();
    if existing.as_ref().unwrap_or(&empty) == desired.as_ref().unwrap_or(&empty) {
        return false;
    }
    existing.clone_from(desired);
    true
}

// ============================================================================
// Per-kind mutators
// ============================================================================

fn container_mutator(existing: &mut Container, desired: &Container) -> bool {
    let mut changed = false;
    changed |= sync_field(&mut existing.image, &desired.image);
    changed |= sync_field(&mut existing.args, &desired.args);
    changed |= sync_field(&mut existing.command, &desired.command);
    changed |= sync_field(&mut existing.env, &desired.env);
    changed |= sync_field(&mut existing.ports, &desired.ports);
    changed |= sync_resources(&mut existing.resources, &desired.resources);
    changed
}

/// Deployment mutator: replicas, pod template annotations and containers by name.
pub fn deployment_mutator(existing: &mut Deployment, desired: &Deployment) -> bool {
    let mut changed = meta_mutator(existing, desired);

    let Some(desired_spec) = desired.spec.as_ref() else {
        return changed;
    };
    let spec = existing.spec.get_or_insert_with(Default::default);
    changed |= sync_field(&mut spec.replicas, &desired_spec.replicas);

    let desired_annotations = desired_spec
        .template
        .metadata
        .as_ref()
        .and_then(|m| m.annotations.as_ref());
    let template_meta = spec.template.metadata.get_or_insert_with(Default::default);
    changed |= merge_string_map(&mut template_meta.annotations, desired_annotations);

    let Some(desired_pod) = desired_spec.template.spec.as_ref() else {
        return changed;
    };
    let pod = spec.template.spec.get_or_insert_with(Default::default);
    for desired_container in &desired_pod.containers {
        match pod
            .containers
            .iter_mut()
            .find(|c| c.name == desired_container.name)
        {
            Some(container) => changed |= container_mutator(container, desired_container),
            None => {
                pod.containers.push(desired_container.clone());
                changed = true;
            }
        }
    }
    changed
}

/// Service mutator: ports, selector and type. Cluster-assigned IPs are kept.
pub fn service_mutator(existing: &mut Service, desired: &Service) -> bool {
    let mut changed = meta_mutator(existing, desired);
    let Some(desired_spec) = desired.spec.as_ref() else {
        return changed;
    };
    let spec = existing.spec.get_or_insert_with(Default::default);
    changed |= sync_field(&mut spec.ports, &desired_spec.ports);
    changed |= sync_field(&mut spec.selector, &desired_spec.selector);
    changed |= sync_field(&mut spec.type_, &desired_spec.type_);
    changed
}

pub fn configmap_mutator(existing: &mut ConfigMap, desired: &ConfigMap) -> bool {
    let meta = meta_mutator(existing, desired);
    let data = sync_field(&mut existing.data, &desired.data);
    meta || data
}

/// Secret mutator: adds missing keys and never rewrites an existing value.
///
/// Generated credentials are random, so the desired values of keys already present
/// are meaningless and must not replace what is stored.
pub fn secret_mutator(existing: &mut Secret, desired: &Secret) -> bool {
    let mut changed = meta_mutator(existing, desired);
    let Some(desired_data) = desired.string_data.as_ref() else {
        return changed;
    };
    for (key, value) in desired_data {
        let present = existing.data.as_ref().is_some_and(|d| d.contains_key(key))
            || existing
                .string_data
                .as_ref()
                .is_some_and(|d| d.contains_key(key));
        if !present {
            existing
                .string_data
                .get_or_insert_with(BTreeMap::new)
                .insert(key.clone(), value.clone());
            changed = true;
        }
    }
    changed
}

/// PVC specs are immutable once bound; only metadata is converged.
pub fn pvc_mutator(existing: &mut PersistentVolumeClaim, desired: &PersistentVolumeClaim) -> bool {
    meta_mutator(existing, desired)
}

pub fn pdb_mutator(existing: &mut PodDisruptionBudget, desired: &PodDisruptionBudget) -> bool {
    let meta = meta_mutator(existing, desired);
    let spec = sync_field(&mut existing.spec, &desired.spec);
    meta || spec
}

/// ServiceAccount mutator: adds desired image pull secrets, keeps injected ones.
pub fn service_account_mutator(existing: &mut ServiceAccount, desired: &ServiceAccount) -> bool {
    let mut changed = meta_mutator(existing, desired);
    let Some(desired_secrets) = desired.image_pull_secrets.as_ref() else {
        return changed;
    };
    let secrets = existing.image_pull_secrets.get_or_insert_with(Vec::new);
    for secret in desired_secrets {
        if !secrets.iter().any(|s| s.name == secret.name) {
            secrets.push(secret.clone());
            changed = true;
        }
    }
    changed
}

#[cfg(test)]
#[path = "resources_tests.rs"]
mod resources_tests;
