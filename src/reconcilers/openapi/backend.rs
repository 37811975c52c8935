// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `Backend` generated from an OpenAPI document.

use super::{desired_object_meta, desired_object_name, desired_system_name, spec_mutator};
use crate::crd::{Backend, BackendSpec, OpenAPI};
use crate::errors::{Error, Result};
use crate::openapi::{render_openapi_server_url, OpenApiDocument};
use kube::ResourceExt;
use tracing::debug;

/// Compute the desired `Backend`.
///
/// The private base URL is `spec.privateBaseURL` when set, otherwise the first
/// document server rendered with its variable defaults.
///
/// # Errors
///
/// - [`Error::Validation`] when the synthesized name is not a DNS label or the
///   backend fails semantic validation
/// - [`Error::UndeclaredServerVariable`] when the server URL cannot be rendered
pub fn desired_backend(openapi: &OpenAPI, document: &OpenApiDocument) -> Result<Backend> {
    let name = desired_object_name::<Backend>(openapi, document)?;

    let private_base_url = match &openapi.spec.private_base_url {
        Some(url) if !url.is_empty() => url.clone(),
        _ => render_openapi_server_url(document.first_server())?,
    };

    let title = &document.info.title;
    let mut backend = Backend {
        metadata: desired_object_meta(openapi, &name),
        spec: BackendSpec {
            name: format!("{title} Backend"),
            system_name: desired_system_name(openapi, document),
            private_base_url,
            description: format!("Backend of {title}"),
            provider_account_ref: openapi.spec.provider_account_ref.clone(),
        },
        status: None,
    };
    backend.set_defaults();

    let reasons = backend.validate();
    if !reasons.is_empty() {
        return Err(Error::Validation {
            kind: "Backend".to_string(),
            name,
            reasons,
        });
    }

    debug!(name = %backend.name_any(), url = %backend.spec.private_base_url, "Built desired Backend");
    Ok(backend)
}

/// Metadata, owner reference and the whole spec; status is left alone.
pub fn backend_mutator(existing: &mut Backend, desired: &Backend) -> bool {
    spec_mutator(existing, desired)
}
