// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `OpenAPI` import reconciliation.
//!
//! Each pass loads the referenced document, builds the desired `Backend` and
//! `Product`, and converges both. Both objects are computed and validated before
//! anything is written, so a bad document never leaves a half-imported pair.
//!
//! Generated objects are named `<k8s name of the title>-<OpenAPI uid>` and are
//! owned by the `OpenAPI` resource, so they are garbage collected with it.
//!
//! The `Ready` condition reports the result:
//!
//! | Status | Reason | When |
//! |---|---|---|
//! | `True` | `Imported` | both objects converged |
//! | `False` | `InvalidOpenAPI` | the document could not be loaded or parsed |
//! | `False` | `ValidationFailed` | a generated object failed validation |

pub mod backend;
pub mod product;
pub mod source;

use crate::constants::{
    CAPABILITIES_API_GROUP_VERSION, KIND_OPENAPI, REQUEUE_SHORT_SECS, REQUEUE_STEADY_SECS,
};
use crate::crd::{validate_dns1123_label, OpenAPI, OpenAPIStatus};
use crate::errors::{Error, Result};
use crate::labels::{K8S_MANAGED_BY, K8S_NAME, K8S_PART_OF, MANAGED_BY_OPENAPI, PART_OF_THREESCALE};
use crate::openapi::{
    k8s_name_from_openapi_title, parse_openapi_document, system_name_from_openapi_title,
    OpenApiDocument,
};
use crate::reconcilers::resources::{meta_mutator, reconcile_resource};
use crate::reconcilers::status::{conditions_equal, update_condition_in_memory};
use crate::store::ObjectStore;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::core::object::HasSpec;
use kube::{Resource, ResourceExt};
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::time::Duration;
use tracing::{debug, info, warn};

use self::backend::{backend_mutator, desired_backend};
use self::product::{desired_product, product_mutator};
use self::source::load_openapi_source;

pub const CONDITION_READY: &str = "Ready";
pub const REASON_IMPORTED: &str = "Imported";
pub const REASON_INVALID_OPENAPI: &str = "InvalidOpenAPI";
pub const REASON_VALIDATION_FAILED: &str = "ValidationFailed";

/// How an import pass ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ImportOutcome {
    /// The `OpenAPI` resource no longer exists.
    NotFound,
    /// Backend and Product converged.
    Imported { product: String, backend: String },
    /// A generated object changed under us.
    WriteConflict,
    /// The import succeeded but the status write lost a race.
    StatusConflict,
}

impl ImportOutcome {
    #[must_use]
    pub fn requeue(&self) -> Option<Duration> {
        match self {
            Self::NotFound => None,
            Self::Imported { .. } => Some(Duration::from_secs(REQUEUE_STEADY_SECS)),
            Self::WriteConflict | Self::StatusConflict => {
                Some(Duration::from_secs(REQUEUE_SHORT_SECS))
            }
        }
    }

    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Imported { .. } => "imported",
            Self::WriteConflict => "write_conflict",
            Self::StatusConflict => "status_conflict",
        }
    }
}

// ============================================================================
// Shared builder helpers
// ============================================================================

/// `spec.productSystemName` when set, otherwise derived from the document title.
pub(crate) fn desired_system_name(openapi: &OpenAPI, document: &OpenApiDocument) -> String {
    match &openapi.spec.product_system_name {
        Some(name) if !name.is_empty() => name.clone(),
        _ => system_name_from_openapi_title(&document.info.title),
    }
}

/// Object name `<title>-<uid>`, rejected unless it is a valid DNS label.
///
/// Names are never truncated: with a 36 character uid only 26 characters remain
/// for the title.
pub(crate) fn desired_object_name<K>(openapi: &OpenAPI, document: &OpenApiDocument) -> Result<String>
where
    K: Resource<DynamicType = ()>,
{
    let name = format!(
        "{}-{}",
        k8s_name_from_openapi_title(&document.info.title),
        openapi.uid().unwrap_or_default()
    );
    let reasons = validate_dns1123_label(&name);
    if reasons.is_empty() {
        Ok(name)
    } else {
        Err(Error::Validation {
            kind: K::kind(&()).to_string(),
            name,
            reasons,
        })
    }
}

/// Namespace, labels and controller owner reference for a generated object.
pub(crate) fn desired_object_meta(openapi: &OpenAPI, name: &str) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: openapi.namespace(),
        labels: Some(BTreeMap::from([
            (K8S_MANAGED_BY.to_string(), MANAGED_BY_OPENAPI.to_string()),
            (K8S_PART_OF.to_string(), PART_OF_THREESCALE.to_string()),
            (K8S_NAME.to_string(), openapi.name_any()),
        ])),
        owner_references: Some(vec![OwnerReference {
            api_version: CAPABILITIES_API_GROUP_VERSION.to_string(),
            kind: KIND_OPENAPI.to_string(),
            name: openapi.name_any(),
            uid: openapi.uid().unwrap_or_default(),
            controller: Some(true),
            block_owner_deletion: Some(true),
        }]),
        ..Default::default()
    }
}

/// Converge metadata plus the complete spec of a generated object.
pub(crate) fn spec_mutator<K>(existing: &mut K, desired: &K) -> bool
where
    K: Resource<DynamicType = ()> + HasSpec,
    K::Spec: PartialEq + Clone + Debug,
{
    let mut changed = meta_mutator(existing, desired);
    if existing.spec() != desired.spec() {
        info!(
            kind = %K::kind(&()),
            name = %desired.name_any(),
            existing = ?existing.spec(),
            desired = ?desired.spec(),
            "Spec has changed"
        );
        *existing.spec_mut() = desired.spec().clone();
        changed = true;
    }
    changed
}

// ============================================================================
// Reconciliation
// ============================================================================

/// Load, parse, build and converge. Nothing is written if any step before the
/// writes fails.
async fn import<S: ObjectStore>(
    store: &S,
    http_client: &reqwest::Client,
    openapi: &OpenAPI,
) -> Result<(String, String)> {
    let namespace = openapi.namespace().unwrap_or_default();

    let raw = load_openapi_source(store, http_client, openapi).await?;
    let document = parse_openapi_document(&raw)?;
    let backend = desired_backend(openapi, &document)?;
    let product = desired_product(openapi, &document, &backend)?;

    let backend_name = backend.name_any();
    let product_name = product.name_any();
    reconcile_resource(store, &namespace, backend, backend_mutator).await?;
    reconcile_resource(store, &namespace, product, product_mutator).await?;
    Ok((product_name, backend_name))
}

/// `Ready=False` reason for errors the user has to fix, `None` for the rest.
fn failure_reason(error: &Error) -> Option<&'static str> {
    match error {
        Error::Validation { .. } => Some(REASON_VALIDATION_FAILED),
        Error::OpenApiDocument(_)
        | Error::UndeclaredServerVariable { .. }
        | Error::Yaml(_)
        | Error::Serialization(_)
        | Error::Http(_)
        | Error::NotFound { .. } => Some(REASON_INVALID_OPENAPI),
        _ => None,
    }
}

fn next_status(openapi: &OpenAPI) -> OpenAPIStatus {
    let mut status = openapi.status.clone().unwrap_or_default();
    status.observed_generation = openapi.metadata.generation;
    status
}

fn imported_status(openapi: &OpenAPI, product: &str, backend: &str) -> OpenAPIStatus {
    let mut status = next_status(openapi);
    update_condition_in_memory(
        &mut status.conditions,
        CONDITION_READY,
        "True",
        REASON_IMPORTED,
        "Product and Backend are synchronized with the OpenAPI document",
    );
    status.product_resource_name = Some(product.to_string());
    status.backend_resource_name = Some(backend.to_string());
    status
}

/// Previously imported names are kept: those objects still exist.
fn failed_status(openapi: &OpenAPI, reason: &str, message: &str) -> OpenAPIStatus {
    let mut status = next_status(openapi);
    update_condition_in_memory(&mut status.conditions, CONDITION_READY, "False", reason, message);
    status
}

fn status_equal(current: &OpenAPIStatus, desired: &OpenAPIStatus) -> bool {
    current.observed_generation == desired.observed_generation
        && current.product_resource_name == desired.product_resource_name
        && current.backend_resource_name == desired.backend_resource_name
        && conditions_equal(&current.conditions, &desired.conditions)
}

/// Write `desired` unless it matches the recorded status. Returns whether a
/// conflict prevented the write.
async fn write_status<S: ObjectStore>(
    store: &S,
    openapi: &OpenAPI,
    desired: OpenAPIStatus,
) -> Result<bool> {
    let current = openapi.status.clone().unwrap_or_default();
    if status_equal(&current, &desired) {
        debug!(name = %openapi.name_any(), "OpenAPI status unchanged, skipping update");
        return Ok(false);
    }

    let mut updated = openapi.clone();
    updated.status = Some(desired);
    match store
        .update_status(&openapi.namespace().unwrap_or_default(), &updated)
        .await
    {
        Ok(_) => Ok(false),
        Err(e) if e.is_conflict() => {
            warn!(name = %openapi.name_any(), "OpenAPI status write conflict, requeueing");
            Ok(true)
        }
        Err(e) => Err(e),
    }
}

/// Run one import pass for the `OpenAPI` resource `namespace/name`.
///
/// # Errors
///
/// Document and validation failures are recorded in the `Ready` condition and then
/// returned, so the controller retries with backoff. Write conflicts are not errors.
pub async fn reconcile_openapi<S: ObjectStore>(
    store: &S,
    http_client: &reqwest::Client,
    namespace: &str,
    name: &str,
) -> Result<ImportOutcome> {
    let Some(openapi) = store.get::<OpenAPI>(namespace, name).await? else {
        debug!(namespace = %namespace, name = %name, "OpenAPI not found, nothing to do");
        return Ok(ImportOutcome::NotFound);
    };

    info!(namespace = %namespace, name = %name, "Reconciling OpenAPI");

    match import(store, http_client, &openapi).await {
        Ok((product, backend)) => {
            let status = imported_status(&openapi, &product, &backend);
            if write_status(store, &openapi, status).await? {
                return Ok(ImportOutcome::StatusConflict);
            }
            info!(namespace = %namespace, name = %name, product = %product, backend = %backend, "Imported OpenAPI document");
            Ok(ImportOutcome::Imported { product, backend })
        }
        Err(e) if e.is_conflict() => {
            warn!(namespace = %namespace, name = %name, error = %e, "Write conflict during import, requeueing");
            Ok(ImportOutcome::WriteConflict)
        }
        Err(e) => {
            if let Some(reason) = failure_reason(&e) {
                warn!(namespace = %namespace, name = %name, reason = reason, error = %e, "OpenAPI import failed");
                let status = failed_status(&openapi, reason, &e.to_string());
                write_status(store, &openapi, status).await?;
            }
            Err(e)
        }
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod mod_tests;
