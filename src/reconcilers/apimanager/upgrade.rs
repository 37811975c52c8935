// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Operator version transitions for an `APIManager`.
//!
//! The operator version last applied to a resource is recorded in the
//! [`OPERATOR_VERSION_ANNOTATION`] annotation, next to the 3scale release in
//! [`THREESCALE_VERSION_ANNOTATION`]. Only an upgrade from
//! [`PREVIOUS_OPERATOR_VERSION`] is supported:
//!
//! | Recorded version | Action |
//! |---|---|
//! | current | nothing to do |
//! | none | fresh install, stamp annotations |
//! | previous | delete obsolete objects, then stamp annotations |
//! | anything else | [`Error::UnsupportedUpgrade`], nothing written |
//!
//! Annotations are only stamped once the migration found nothing left to delete,
//! so an interrupted upgrade resumes on the next pass.

use crate::constants::{OPERATOR_VERSION, PREVIOUS_OPERATOR_VERSION, THREESCALE_RELEASE};
use crate::crd::APIManager;
use crate::errors::{Error, Result};
use crate::labels::{OPERATOR_VERSION_ANNOTATION, THREESCALE_VERSION_ANNOTATION};
use crate::reconcilers::resources::delete_resource;
use crate::store::ObjectStore;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use kube::ResourceExt;
use tracing::{debug, info, warn};

/// Wildcard router of the previous release, replaced by per-service routes.
pub const OBSOLETE_WILDCARD_ROUTER: &str = "apicast-wildcard-router";

/// Where an `APIManager` stands relative to the running operator version.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpgradeState {
    /// Annotations match the running operator; the pipeline may run.
    Current,
    /// Migration work was done this pass and must be re-checked.
    InProgress,
    /// Annotations were just stamped; the next pass runs the pipeline.
    Completed,
}

/// Operator version recorded on `apim`, if any.
#[must_use]
pub fn recorded_operator_version(apim: &APIManager) -> Option<&str> {
    apim.annotations()
        .get(OPERATOR_VERSION_ANNOTATION)
        .map(String::as_str)
}

/// Whether both version annotations match the running operator.
#[must_use]
pub fn is_current(apim: &APIManager) -> bool {
    let annotations = apim.annotations();
    annotations.get(OPERATOR_VERSION_ANNOTATION).map(String::as_str) == Some(OPERATOR_VERSION)
        && annotations.get(THREESCALE_VERSION_ANNOTATION).map(String::as_str)
            == Some(THREESCALE_RELEASE)
}

/// Run the upgrade state machine for `apim`.
///
/// # Errors
///
/// - [`Error::UnsupportedUpgrade`] when the recorded version cannot be migrated
/// - [`Error::Conflict`] when stamping the annotations races another writer
/// - any store error from the migration
pub async fn reconcile_upgrade<S: ObjectStore>(store: &S, apim: &APIManager) -> Result<UpgradeState> {
    if is_current(apim) {
        return Ok(UpgradeState::Current);
    }

    let namespace = apim.namespace().unwrap_or_default();
    let name = apim.name_any();

    match recorded_operator_version(apim) {
        None => {
            info!(namespace = %namespace, name = %name, "No recorded operator version, treating as fresh install");
        }
        Some(OPERATOR_VERSION) => {
            debug!(namespace = %namespace, name = %name, "Release annotation out of date, restamping");
        }
        Some(PREVIOUS_OPERATOR_VERSION) => {
            info!(
                namespace = %namespace,
                name = %name,
                from = PREVIOUS_OPERATOR_VERSION,
                to = OPERATOR_VERSION,
                "Upgrading APIManager"
            );
            if migrate_from_previous(store, &namespace).await? {
                return Ok(UpgradeState::InProgress);
            }
        }
        Some(other) => {
            warn!(
                namespace = %namespace,
                name = %name,
                recorded = %other,
                "Refusing to upgrade from unsupported operator version"
            );
            return Err(Error::UnsupportedUpgrade {
                from: other.to_string(),
                to: OPERATOR_VERSION.to_string(),
                supported: PREVIOUS_OPERATOR_VERSION.to_string(),
            });
        }
    }

    stamp_versions(store, apim).await?;
    Ok(UpgradeState::Completed)
}

/// Delete objects the current release no longer uses.
///
/// Returns whether anything was deleted.
async fn migrate_from_previous<S: ObjectStore>(store: &S, namespace: &str) -> Result<bool> {
    let deployment =
        delete_resource::<Deployment, _>(store, namespace, OBSOLETE_WILDCARD_ROUTER).await?;
    let service =
        delete_resource::<Service, _>(store, namespace, OBSOLETE_WILDCARD_ROUTER).await?;
    if deployment || service {
        info!(namespace = %namespace, "Deleted obsolete {}", OBSOLETE_WILDCARD_ROUTER);
    }
    Ok(deployment || service)
}

async fn stamp_versions<S: ObjectStore>(store: &S, apim: &APIManager) -> Result<()> {
    let mut updated = apim.clone();
    let annotations = updated.annotations_mut();
    annotations.insert(
        OPERATOR_VERSION_ANNOTATION.to_string(),
        OPERATOR_VERSION.to_string(),
    );
    annotations.insert(
        THREESCALE_VERSION_ANNOTATION.to_string(),
        THREESCALE_RELEASE.to_string(),
    );
    store
        .replace(&apim.namespace().unwrap_or_default(), &updated)
        .await?;
    info!(
        name = %apim.name_any(),
        operator_version = OPERATOR_VERSION,
        release = THREESCALE_RELEASE,
        "Stamped APIManager version annotations"
    );
    Ok(())
}

#[cfg(test)]
#[path = "upgrade_tests.rs"]
mod upgrade_tests;
