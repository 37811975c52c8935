// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Custom Resource Definitions (CRDs) for 3scale API management.
//!
//! # Resource Types
//!
//! ## Platform
//!
//! - [`APIManager`] - Declares a complete 3scale installation (gateway, backend,
//!   system console, async workers, caches and databases)
//!
//! ## Capabilities
//!
//! - [`OpenAPI`] - Imports an OpenAPI document as a 3scale product and backend
//! - [`Product`] - A 3scale product (API exposed through the gateway)
//! - [`Backend`] - A 3scale backend (upstream API implementation)
//!
//! # Example: Declaring an APIManager
//!
//! ```rust,no_run
//! use threescale_operator::crd::{APIManagerSpec, SystemDatabaseSpec, SystemSpec};
//!
//! let spec = APIManagerSpec {
//!     wildcard_domain: "apps.example.com".to_string(),
//!     system: Some(SystemSpec {
//!         database: Some(SystemDatabaseSpec {
//!             postgresql: Some(Default::default()),
//!             ..Default::default()
//!         }),
//!         ..Default::default()
//!     }),
//!     ..Default::default()
//! };
//! ```

use crate::constants::{
    DEFAULT_APP_LABEL, DEFAULT_REPLICAS, DEFAULT_TENANT_NAME, DNS1123_LABEL_MAX_LENGTH,
};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Condition represents an observation of a resource's current state.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition. Common types include: Ready, Available.
    pub r#type: String,

    /// Status of the condition: True, False, or Unknown.
    pub status: String,

    /// Brief CamelCase reason for the condition's last transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Human-readable message indicating details about the transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Last time the condition transitioned from one status to another (RFC3339 format).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
}

// ============================================================================
// APIManager
// ============================================================================

/// `APIManager` declares the desired state of a complete 3scale platform.
///
/// # Example
///
/// ```yaml
/// apiVersion: apps.3scale.net/v1alpha1
/// kind: APIManager
/// metadata:
///   name: example-apimanager
/// spec:
///   wildcardDomain: apps.example.com
///   system:
///     database:
///       postgresql: {}
///   monitoring:
///     enabled: true
/// ```
#[derive(CustomResource, Clone, Debug, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
#[kube(
    group = "apps.3scale.net",
    version = "v1alpha1",
    kind = "APIManager",
    plural = "apimanagers",
    namespaced,
    derive = "PartialEq",
    doc = "APIManager declares a 3scale API management platform. The operator converges gateway, backend, system, zync, caches and databases towards this declaration."
)]
#[kube(status = "APIManagerStatus")]
#[serde(rename_all = "camelCase")]
pub struct APIManagerSpec {
    /// Root domain used to build the public endpoints of every component.
    pub wildcard_domain: String,

    /// Value of the `app` label put on every managed object.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_label: Option<String>,

    /// Name of the default tenant created on first boot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_name: Option<String>,

    /// Whether containers get CPU/memory requests and limits.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_requirements_enabled: Option<bool>,

    /// Image pull secret attached to the `amp` service account.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_pull_secret: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apicast: Option<ApicastSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend: Option<BackendComponentSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<SystemSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zync: Option<ZyncSpec>,

    /// When enabled, Redis and the system database are external and user supplied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub high_availability: Option<HighAvailabilitySpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monitoring: Option<MonitoringSpec>,
}

/// APIcast gateway configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApicastSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(range(min = 0))]
    pub staging_replicas: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(range(min = 0))]
    pub production_replicas: Option<i32>,
}

/// Backend (apisonator) configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BackendComponentSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redis_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(range(min = 0))]
    pub listener_replicas: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(range(min = 0))]
    pub worker_replicas: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(range(min = 0))]
    pub cron_replicas: Option<i32>,
}

/// System (porta) configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SystemSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redis_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memcached_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(range(min = 0))]
    pub app_replicas: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(range(min = 0))]
    pub sidekiq_replicas: Option<i32>,

    /// Internal database selection. MySQL is used when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<SystemDatabaseSpec>,
}

/// Internal system database selection.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SystemDatabaseSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mysql: Option<DatabaseImageSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postgresql: Option<DatabaseImageSpec>,
}

/// Image override for an internal database.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseImageSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// Zync configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ZyncSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postgresql_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(range(min = 0))]
    pub app_replicas: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(range(min = 0))]
    pub que_replicas: Option<i32>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HighAvailabilitySpec {
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MonitoringSpec {
    #[serde(default)]
    pub enabled: bool,
}

/// Observed state of an `APIManager`.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct APIManagerStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,

    /// Readiness of every Deployment owned by this `APIManager`.
    #[serde(default)]
    pub deployments: DeploymentsStatus,
}

/// Owned deployments grouped by readiness. Each list is sorted by name.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentsStatus {
    #[serde(default)]
    pub ready: Vec<String>,
    #[serde(default)]
    pub starting: Vec<String>,
    #[serde(default)]
    pub stopped: Vec<String>,
}

/// Internal database flavour selected by the spec.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DatabaseFlavor {
    MySql,
    PostgreSql,
}

/// Set `field` to `value` when it is unset. Returns whether it changed.
fn default_field<T>(field: &mut Option<T>, value: T) -> bool {
    if field.is_some() {
        return false;
    }
    *field = Some(value);
    true
}

impl APIManager {
    /// Fill unset spec fields with their defaults.
    ///
    /// Returns `true` if any field was set, in which case the resource must be
    /// persisted and reconciled again before anything else happens.
    pub fn set_defaults(&mut self) -> bool {
        let spec = &mut self.spec;
        let mut changed = false;

        changed |= default_field(&mut spec.app_label, DEFAULT_APP_LABEL.to_string());
        changed |= default_field(&mut spec.tenant_name, DEFAULT_TENANT_NAME.to_string());
        changed |= default_field(&mut spec.resource_requirements_enabled, true);

        changed |= default_field(&mut spec.apicast, ApicastSpec::default());
        if let Some(apicast) = spec.apicast.as_mut() {
            changed |= default_field(&mut apicast.staging_replicas, DEFAULT_REPLICAS);
            changed |= default_field(&mut apicast.production_replicas, DEFAULT_REPLICAS);
        }

        changed |= default_field(&mut spec.backend, BackendComponentSpec::default());
        if let Some(backend) = spec.backend.as_mut() {
            changed |= default_field(&mut backend.listener_replicas, DEFAULT_REPLICAS);
            changed |= default_field(&mut backend.worker_replicas, DEFAULT_REPLICAS);
            changed |= default_field(&mut backend.cron_replicas, DEFAULT_REPLICAS);
        }

        changed |= default_field(&mut spec.system, SystemSpec::default());
        if let Some(system) = spec.system.as_mut() {
            changed |= default_field(&mut system.app_replicas, DEFAULT_REPLICAS);
            changed |= default_field(&mut system.sidekiq_replicas, DEFAULT_REPLICAS);
        }

        changed |= default_field(&mut spec.zync, ZyncSpec::default());
        if let Some(zync) = spec.zync.as_mut() {
            changed |= default_field(&mut zync.app_replicas, DEFAULT_REPLICAS);
            changed |= default_field(&mut zync.que_replicas, DEFAULT_REPLICAS);
        }

        if changed {
            debug!("APIManager spec defaults applied");
        }
        changed
    }

    /// External databases are in use when high availability is enabled.
    #[must_use]
    pub fn is_external_database_enabled(&self) -> bool {
        self.spec
            .high_availability
            .as_ref()
            .is_some_and(|ha| ha.enabled)
    }

    #[must_use]
    pub fn is_monitoring_enabled(&self) -> bool {
        self.spec.monitoring.as_ref().is_some_and(|m| m.enabled)
    }

    /// Internal database flavour; PostgreSQL only when explicitly requested.
    #[must_use]
    pub fn database_flavor(&self) -> DatabaseFlavor {
        let postgresql = self
            .spec
            .system
            .as_ref()
            .and_then(|s| s.database.as_ref())
            .is_some_and(|db| db.postgresql.is_some());
        if postgresql {
            DatabaseFlavor::PostgreSql
        } else {
            DatabaseFlavor::MySql
        }
    }

    #[must_use]
    pub fn app_label(&self) -> &str {
        self.spec.app_label.as_deref().unwrap_or(DEFAULT_APP_LABEL)
    }

    #[must_use]
    pub fn tenant_name(&self) -> &str {
        self.spec.tenant_name.as_deref().unwrap_or(DEFAULT_TENANT_NAME)
    }

    #[must_use]
    pub fn resource_requirements_enabled(&self) -> bool {
        self.spec.resource_requirements_enabled.unwrap_or(true)
    }
}

// ============================================================================
// OpenAPI importer
// ============================================================================

/// `OpenAPI` imports an OpenAPI 3 document as a 3scale `Product` and `Backend`.
///
/// # Example
///
/// ```yaml
/// apiVersion: capabilities.3scale.net/v1beta1
/// kind: OpenAPI
/// metadata:
///   name: petstore
/// spec:
///   openapiRef:
///     url: https://petstore3.swagger.io/api/v3/openapi.json
///   productionPublicBaseURL: https://api.example.com
/// ```
#[derive(CustomResource, Clone, Debug, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
#[kube(
    group = "capabilities.3scale.net",
    version = "v1beta1",
    kind = "OpenAPI",
    plural = "openapis",
    namespaced,
    derive = "PartialEq",
    doc = "OpenAPI imports an OpenAPI 3 document and keeps a Product and a Backend synchronized with it."
)]
#[kube(status = "OpenAPIStatus")]
#[serde(rename_all = "camelCase")]
pub struct OpenAPISpec {
    /// Where to read the OpenAPI document from.
    pub openapi_ref: OpenAPIRefSpec,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_account_ref: Option<LocalObjectReference>,

    /// Overrides the system name derived from the document title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_system_name: Option<String>,

    /// When either public base URL is set the product uses a self-managed gateway.
    #[serde(
        default,
        rename = "productionPublicBaseURL",
        skip_serializing_if = "Option::is_none"
    )]
    pub production_public_base_url: Option<String>,

    #[serde(
        default,
        rename = "stagingPublicBaseURL",
        skip_serializing_if = "Option::is_none"
    )]
    pub staging_public_base_url: Option<String>,

    /// Overrides the backend private base URL rendered from the document servers.
    #[serde(default, rename = "privateBaseURL", skip_serializing_if = "Option::is_none")]
    pub private_base_url: Option<String>,

    /// Issuer endpoint used when the document declares an OpenID Connect scheme.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oidc_issuer_endpoint: Option<String>,
}

/// Source of the OpenAPI document. Exactly one field must be set.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OpenAPIRefSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_map_ref: Option<ConfigMapKeyReference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConfigMapKeyReference {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LocalObjectReference {
    pub name: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OpenAPIStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_resource_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend_resource_name: Option<String>,
}

// ============================================================================
// Backend
// ============================================================================

#[derive(CustomResource, Clone, Debug, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
#[kube(
    group = "capabilities.3scale.net",
    version = "v1beta1",
    kind = "Backend",
    plural = "backends",
    namespaced,
    derive = "PartialEq",
    doc = "Backend is a 3scale backend API: the upstream implementation a product routes to."
)]
#[kube(status = "CapabilityStatus")]
#[serde(rename_all = "camelCase")]
pub struct BackendSpec {
    pub name: String,

    #[serde(default)]
    pub system_name: String,

    /// Upstream base URL: an absolute http(s) URL or an absolute path.
    #[serde(rename = "privateBaseURL")]
    pub private_base_url: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_account_ref: Option<LocalObjectReference>,
}

/// Status shared by `Product` and `Backend`; written by their own controllers.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

impl Backend {
    /// Fill unset fields. The system name falls back to the sanitized name.
    pub fn set_defaults(&mut self) {
        if self.spec.system_name.is_empty() {
            self.spec.system_name = crate::openapi::system_name_from_openapi_title(&self.spec.name);
        }
    }

    /// Semantic validation. Returns one message per problem found.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.spec.name.is_empty() {
            errors.push("spec.name: Required value".to_string());
        }
        if self.spec.system_name.is_empty() {
            errors.push("spec.systemName: Required value".to_string());
        }
        if !is_valid_private_base_url(&self.spec.private_base_url) {
            errors.push(format!(
                "spec.privateBaseURL: Invalid value: \"{}\": must be an absolute http(s) URL or an absolute path",
                self.spec.private_base_url
            ));
        }
        errors
    }
}

// ============================================================================
// Product
// ============================================================================

#[derive(CustomResource, Clone, Debug, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
#[kube(
    group = "capabilities.3scale.net",
    version = "v1beta1",
    kind = "Product",
    plural = "products",
    namespaced,
    derive = "PartialEq",
    doc = "Product is a 3scale product: an API exposed to consumers through an APIcast gateway."
)]
#[kube(status = "CapabilityStatus")]
#[serde(rename_all = "camelCase")]
pub struct ProductSpec {
    pub name: String,

    #[serde(default)]
    pub system_name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment: Option<ProductDeploymentSpec>,

    /// Backends used by this product, keyed by backend system name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub backend_usages: BTreeMap<String, BackendUsageSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_account_ref: Option<LocalObjectReference>,
}

/// Gateway deployment mode. Exactly one field must be set.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProductDeploymentSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apicast_hosted: Option<ApicastHostedSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apicast_self_managed: Option<ApicastSelfManagedSpec>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApicastHostedSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authentication: Option<AuthenticationSpec>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApicastSelfManagedSpec {
    #[serde(
        default,
        rename = "stagingPublicBaseURL",
        skip_serializing_if = "Option::is_none"
    )]
    pub staging_public_base_url: Option<String>,
    #[serde(
        default,
        rename = "productionPublicBaseURL",
        skip_serializing_if = "Option::is_none"
    )]
    pub production_public_base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authentication: Option<AuthenticationSpec>,
}

/// Product authentication mode. Exactly one field is expected to be set.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationSpec {
    #[serde(default, rename = "userkey", skip_serializing_if = "Option::is_none")]
    pub user_key: Option<UserKeyAuthenticationSpec>,
    #[serde(default, rename = "appKeyAppID", skip_serializing_if = "Option::is_none")]
    pub app_key_app_id: Option<AppKeyAppIdAuthenticationSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oidc: Option<OidcSpec>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserKeyAuthenticationSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_user_key: Option<String>,
    /// `headers` or `query`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AppKeyAppIdAuthenticationSpec {
    #[serde(default, rename = "appID", skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_key: Option<String>,
    /// `headers`, `query` or `authorization`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OidcSpec {
    /// `keycloak` or `rest`
    pub issuer_type: String,
    pub issuer_endpoint: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BackendUsageSpec {
    pub path: String,
}

impl Product {
    /// Fill unset fields. A product without deployment mode uses the hosted gateway.
    pub fn set_defaults(&mut self) {
        if self.spec.system_name.is_empty() {
            self.spec.system_name = crate::openapi::system_name_from_openapi_title(&self.spec.name);
        }
        if self.spec.deployment.is_none() {
            self.spec.deployment = Some(ProductDeploymentSpec {
                apicast_hosted: Some(ApicastHostedSpec::default()),
                apicast_self_managed: None,
            });
        }
    }

    /// Semantic validation. Returns one message per problem found.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.spec.name.is_empty() {
            errors.push("spec.name: Required value".to_string());
        }
        if self.spec.system_name.is_empty() {
            errors.push("spec.systemName: Required value".to_string());
        }

        let Some(deployment) = &self.spec.deployment else {
            errors.push("spec.deployment: Required value".to_string());
            return errors;
        };

        let authentication = match (&deployment.apicast_hosted, &deployment.apicast_self_managed) {
            (Some(_), Some(_)) => {
                errors.push(
                    "spec.deployment: Invalid value: apicastHosted and apicastSelfManaged are mutually exclusive"
                        .to_string(),
                );
                None
            }
            (None, None) => {
                errors.push(
                    "spec.deployment: Invalid value: one of apicastHosted or apicastSelfManaged is required"
                        .to_string(),
                );
                None
            }
            (Some(hosted), None) => hosted.authentication.as_ref(),
            (None, Some(self_managed)) => {
                for (field, value) in [
                    (
                        "stagingPublicBaseURL",
                        &self_managed.staging_public_base_url,
                    ),
                    (
                        "productionPublicBaseURL",
                        &self_managed.production_public_base_url,
                    ),
                ] {
                    if let Some(value) = value {
                        if !is_absolute_http_url(value) {
                            errors.push(format!(
                                "spec.deployment.apicastSelfManaged.{field}: Invalid value: \"{value}\": must be an absolute http(s) URL"
                            ));
                        }
                    }
                }
                self_managed.authentication.as_ref()
            }
        };

        if let Some(oidc) = authentication.and_then(|a| a.oidc.as_ref()) {
            if !is_absolute_http_url(&oidc.issuer_endpoint) {
                errors.push(format!(
                    "spec.deployment.authentication.oidc.issuerEndpoint: Invalid value: \"{}\": must be an absolute http(s) URL",
                    oidc.issuer_endpoint
                ));
            }
        }

        errors
    }
}

// ============================================================================
// Validation helpers
// ============================================================================

fn is_absolute_http_url(value: &str) -> bool {
    url::Url::parse(value).is_ok_and(|u| matches!(u.scheme(), "http" | "https") && u.has_host())
}

fn is_valid_private_base_url(value: &str) -> bool {
    value.starts_with('/') || is_absolute_http_url(value)
}

/// Validate `value` as an RFC 1123 DNS label.
///
/// Returns one message per violated rule; an empty vector means the label is valid.
#[must_use]
pub fn validate_dns1123_label(value: &str) -> Vec<String> {
    let mut errors = Vec::new();
    if value.len() > DNS1123_LABEL_MAX_LENGTH {
        errors.push(format!(
            "must be no more than {DNS1123_LABEL_MAX_LENGTH} characters"
        ));
    }

    let bytes = value.as_bytes();
    let valid_chars = bytes
        .iter()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-');
    let alnum = |b: Option<&u8>| b.is_some_and(|b| b.is_ascii_lowercase() || b.is_ascii_digit());
    if !valid_chars || !alnum(bytes.first()) || !alnum(bytes.last()) {
        errors.push(
            "a lowercase RFC 1123 label must consist of lower case alphanumeric characters or '-', and must start and end with an alphanumeric character (e.g. 'my-name',  or '123-abc')"
                .to_string(),
        );
    }
    errors
}

#[cfg(test)]
#[path = "crd_tests.rs"]
mod crd_tests;
