// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `Product` generated from an OpenAPI document.
//!
//! The gateway is self-managed as soon as the `OpenAPI` resource sets a public
//! base URL, and hosted otherwise. Authentication follows the first global
//! security requirement the product can express.

use super::{desired_object_meta, desired_object_name, desired_system_name, spec_mutator};
use crate::crd::{
    ApicastHostedSpec, ApicastSelfManagedSpec, AuthenticationSpec, Backend, BackendUsageSpec,
    OidcSpec, OpenAPI, Product, ProductDeploymentSpec, ProductSpec, UserKeyAuthenticationSpec,
};
use crate::errors::{Error, Result};
use crate::openapi::{ApiKeyLocation, OpenApiDocument, SecurityScheme};
use kube::ResourceExt;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Issuer type used for OpenID Connect and OAuth2 schemes.
pub const DEFAULT_OIDC_ISSUER_TYPE: &str = "rest";

fn non_empty(value: Option<&String>) -> Option<String> {
    value.filter(|v| !v.is_empty()).cloned()
}

/// Discovery document suffix stripped from `openIdConnectUrl` to get the issuer.
const OIDC_DISCOVERY_SUFFIX: &str = "/.well-known/openid-configuration";

/// Issuer endpoint for an OIDC or OAuth2 requirement.
///
/// `spec.oidcIssuerEndpoint` wins. Otherwise an `openIdConnect` scheme falls
/// back to the issuer behind its `openIdConnectUrl`; `oauth2` has no fallback.
#[must_use]
pub fn oidc_issuer_endpoint(openapi: &OpenAPI, scheme: &SecurityScheme) -> Option<String> {
    if let Some(endpoint) = non_empty(openapi.spec.oidc_issuer_endpoint.as_ref()) {
        return Some(endpoint);
    }
    let SecurityScheme::OpenIdConnect {
        open_id_connect_url,
    } = scheme
    else {
        return None;
    };
    let issuer = open_id_connect_url
        .strip_suffix(OIDC_DISCOVERY_SUFFIX)
        .unwrap_or(open_id_connect_url.as_str());
    let parsed = url::Url::parse(issuer).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return None;
    }
    warn!(
        issuer = %issuer,
        "oidcIssuerEndpoint not set, using the issuer from openIdConnectUrl"
    );
    Some(issuer.to_string())
}

/// Authentication derived from the document's global security requirements.
///
/// `None` when the document declares no requirement the product can express.
#[must_use]
pub fn desired_authentication(
    openapi: &OpenAPI,
    document: &OpenApiDocument,
) -> Option<AuthenticationSpec> {
    for requirement in document.global_security_requirements() {
        match requirement.scheme {
            SecurityScheme::ApiKey { name, location } => {
                let credentials = match location {
                    ApiKeyLocation::Query => "query",
                    ApiKeyLocation::Header => "headers",
                    ApiKeyLocation::Cookie => {
                        warn!(scheme = %requirement.name, "Cookie API keys are not supported, skipping");
                        continue;
                    }
                };
                return Some(AuthenticationSpec {
                    user_key: Some(UserKeyAuthenticationSpec {
                        auth_user_key: Some(name.clone()),
                        credentials: Some(credentials.to_string()),
                    }),
                    ..Default::default()
                });
            }
            SecurityScheme::OpenIdConnect { .. } | SecurityScheme::OAuth2 {} => {
                let Some(issuer_endpoint) = oidc_issuer_endpoint(openapi, requirement.scheme)
                else {
                    warn!(
                        scheme = %requirement.name,
                        "No issuer endpoint set and none derivable from the document, skipping"
                    );
                    continue;
                };
                return Some(AuthenticationSpec {
                    oidc: Some(OidcSpec {
                        issuer_type: DEFAULT_OIDC_ISSUER_TYPE.to_string(),
                        issuer_endpoint,
                    }),
                    ..Default::default()
                });
            }
            SecurityScheme::Http { scheme } => {
                debug!(scheme = %scheme, "HTTP security scheme has no product equivalent, skipping");
            }
            SecurityScheme::Unsupported => {
                debug!(scheme = %requirement.name, "Unsupported security scheme type, skipping");
            }
        }
    }
    None
}

/// Gateway deployment mode and its authentication.
#[must_use]
pub fn desired_deployment(openapi: &OpenAPI, document: &OpenApiDocument) -> ProductDeploymentSpec {
    let authentication = desired_authentication(openapi, document);
    let production = non_empty(openapi.spec.production_public_base_url.as_ref());
    let staging = non_empty(openapi.spec.staging_public_base_url.as_ref());

    if production.is_some() || staging.is_some() {
        ProductDeploymentSpec {
            apicast_hosted: None,
            apicast_self_managed: Some(ApicastSelfManagedSpec {
                staging_public_base_url: staging,
                production_public_base_url: production,
                authentication,
            }),
        }
    } else {
        ProductDeploymentSpec {
            apicast_hosted: Some(ApicastHostedSpec { authentication }),
            apicast_self_managed: None,
        }
    }
}

/// Compute the desired `Product`, routing `/` to `backend`.
///
/// # Errors
///
/// Returns [`Error::Validation`] when the synthesized name is not a DNS label or
/// the product fails semantic validation.
pub fn desired_product(
    openapi: &OpenAPI,
    document: &OpenApiDocument,
    backend: &Backend,
) -> Result<Product> {
    let name = desired_object_name::<Product>(openapi, document)?;

    let mut product = Product {
        metadata: desired_object_meta(openapi, &name),
        spec: ProductSpec {
            name: document.info.title.clone(),
            system_name: desired_system_name(openapi, document),
            description: document.info.description.clone(),
            deployment: Some(desired_deployment(openapi, document)),
            backend_usages: BTreeMap::from([(
                backend.spec.system_name.clone(),
                BackendUsageSpec {
                    path: "/".to_string(),
                },
            )]),
            provider_account_ref: openapi.spec.provider_account_ref.clone(),
        },
        status: None,
    };
    product.set_defaults();

    let reasons = product.validate();
    if !reasons.is_empty() {
        return Err(Error::Validation {
            kind: "Product".to_string(),
            name,
            reasons,
        });
    }

    debug!(name = %product.name_any(), "Built desired Product");
    Ok(product)
}

/// Metadata, owner reference and the whole spec; status is left alone.
pub fn product_mutator(existing: &mut Product, desired: &Product) -> bool {
    spec_mutator(existing, desired)
}

#[cfg(test)]
#[path = "product_tests.rs"]
mod product_tests;
