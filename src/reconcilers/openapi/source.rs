// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Loading the raw OpenAPI document referenced by an `OpenAPI` resource.

use crate::constants::DEFAULT_OPENAPI_CONFIGMAP_KEY;
use crate::crd::{ConfigMapKeyReference, OpenAPI};
use crate::errors::{Error, Result};
use crate::store::ObjectStore;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::ResourceExt;
use tracing::{debug, info};

/// Read the document text from the ConfigMap or URL named in `spec.openapiRef`.
///
/// # Errors
///
/// - [`Error::OpenApiDocument`] when the reference is ambiguous or missing, or the
///   ConfigMap lacks the key
/// - [`Error::NotFound`] when the ConfigMap does not exist
/// - [`Error::Http`] when the URL cannot be fetched
pub async fn load_openapi_source<S: ObjectStore>(
    store: &S,
    http_client: &reqwest::Client,
    openapi: &OpenAPI,
) -> Result<String> {
    let reference = &openapi.spec.openapi_ref;
    match (&reference.config_map_ref, &reference.url) {
        (Some(config_map), None) => {
            let namespace = openapi.namespace().unwrap_or_default();
            read_config_map(store, &namespace, config_map).await
        }
        (None, Some(url)) => fetch_url(http_client, url).await,
        (Some(_), Some(_)) => Err(Error::OpenApiDocument(
            "spec.openapiRef: configMapRef and url are mutually exclusive".to_string(),
        )),
        (None, None) => Err(Error::OpenApiDocument(
            "spec.openapiRef: one of configMapRef or url is required".to_string(),
        )),
    }
}

async fn read_config_map<S: ObjectStore>(
    store: &S,
    namespace: &str,
    reference: &ConfigMapKeyReference,
) -> Result<String> {
    let key = reference
        .key
        .as_deref()
        .unwrap_or(DEFAULT_OPENAPI_CONFIGMAP_KEY);
    debug!(namespace = %namespace, configmap = %reference.name, key = %key, "Reading OpenAPI document from ConfigMap");

    let config_map = store
        .get::<ConfigMap>(namespace, &reference.name)
        .await?
        .ok_or_else(|| Error::not_found::<ConfigMap>(namespace, &reference.name))?;

    config_map
        .data
        .and_then(|mut data| data.remove(key))
        .ok_or_else(|| {
            Error::OpenApiDocument(format!(
                "ConfigMap {namespace}/{} has no key '{key}'",
                reference.name
            ))
        })
}

/// Fetch a document over HTTP(S). Non-success status codes are errors.
///
/// # Errors
///
/// Returns [`Error::Http`] on transport failures or non-2xx responses.
pub async fn fetch_url(http_client: &reqwest::Client, url: &str) -> Result<String> {
    info!(url = %url, "Fetching OpenAPI document");
    let body = http_client
        .get(url)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;
    debug!(url = %url, bytes = body.len(), "Fetched OpenAPI document");
    Ok(body)
}

#[cfg(test)]
#[path = "source_tests.rs"]
mod source_tests;
