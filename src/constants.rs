// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the 3scale operator.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// API Constants
// ============================================================================

/// API group for the `APIManager` CRD
pub const APPS_API_GROUP: &str = "apps.3scale.net";

/// Fully qualified API version of the `APIManager` CRD
pub const APPS_API_GROUP_VERSION: &str = "apps.3scale.net/v1alpha1";

/// API group for the capabilities CRDs (`OpenAPI`, `Product`, `Backend`)
pub const CAPABILITIES_API_GROUP: &str = "capabilities.3scale.net";

/// Fully qualified API version of the capabilities CRDs
pub const CAPABILITIES_API_GROUP_VERSION: &str = "capabilities.3scale.net/v1beta1";

/// Kind name for `APIManager` resource
pub const KIND_APIMANAGER: &str = "APIManager";

/// Kind name for `OpenAPI` resource
pub const KIND_OPENAPI: &str = "OpenAPI";

/// Kind name for `Product` resource
pub const KIND_PRODUCT: &str = "Product";

/// Kind name for `Backend` resource
pub const KIND_BACKEND: &str = "Backend";

/// Field manager reported on writes made by this operator
pub const FIELD_MANAGER: &str = "threescale-operator";

// ============================================================================
// Version Constants
// ============================================================================

/// Version of this operator, recorded on every converged `APIManager`
pub const OPERATOR_VERSION: &str = "0.8.0";

/// The only operator version an in-place upgrade is supported from
pub const PREVIOUS_OPERATOR_VERSION: &str = "0.7.0";

/// 3scale release deployed by this operator version
pub const THREESCALE_RELEASE: &str = "2.8";

// ============================================================================
// APIManager Spec Defaults
// ============================================================================

/// Default value for `spec.appLabel`
pub const DEFAULT_APP_LABEL: &str = "3scale-api-management";

/// Default value for `spec.tenantName`
pub const DEFAULT_TENANT_NAME: &str = "3scale";

/// Default replica count for every managed deployment
pub const DEFAULT_REPLICAS: i32 = 1;

/// Service account shared by every 3scale pod
pub const SERVICE_ACCOUNT_NAME: &str = "amp";

// ============================================================================
// Default Images
// ============================================================================

pub const DEFAULT_APICAST_IMAGE: &str = "quay.io/3scale/apicast:3scale-2.8.0-GA";
pub const DEFAULT_BACKEND_IMAGE: &str = "quay.io/3scale/apisonator:3scale-2.8.0-GA";
pub const DEFAULT_SYSTEM_IMAGE: &str = "quay.io/3scale/porta:3scale-2.8.0-GA";
pub const DEFAULT_ZYNC_IMAGE: &str = "quay.io/3scale/zync:3scale-2.8.0-GA";
pub const DEFAULT_BACKEND_REDIS_IMAGE: &str = "centos/redis-32-centos7";
pub const DEFAULT_SYSTEM_REDIS_IMAGE: &str = "centos/redis-32-centos7";
pub const DEFAULT_SYSTEM_MEMCACHED_IMAGE: &str = "memcached:1.5";
pub const DEFAULT_SYSTEM_MYSQL_IMAGE: &str = "centos/mysql-57-centos7";
pub const DEFAULT_SYSTEM_POSTGRESQL_IMAGE: &str = "centos/postgresql-10-centos7";
pub const DEFAULT_ZYNC_POSTGRESQL_IMAGE: &str = "centos/postgresql-10-centos7";

// ============================================================================
// Component Ports
// ============================================================================

pub const APICAST_GATEWAY_PORT: i32 = 8080;
pub const APICAST_MANAGEMENT_PORT: i32 = 8090;
pub const APICAST_METRICS_PORT: i32 = 9421;
pub const BACKEND_LISTENER_PORT: i32 = 3000;
pub const BACKEND_METRICS_PORT: i32 = 9394;
pub const SYSTEM_PROVIDER_PORT: i32 = 3000;
pub const SYSTEM_DEVELOPER_PORT: i32 = 3001;
pub const SYSTEM_MASTER_PORT: i32 = 3002;
pub const SYSTEM_METRICS_PORT: i32 = 9394;
pub const MEMCACHED_PORT: i32 = 11211;
pub const MYSQL_PORT: i32 = 3306;
pub const POSTGRESQL_PORT: i32 = 5432;
pub const REDIS_PORT: i32 = 6379;
pub const ZYNC_PORT: i32 = 8080;

// ============================================================================
// Storage Constants
// ============================================================================

/// Requested size for Redis persistent volumes
pub const REDIS_STORAGE_SIZE: &str = "1Gi";

/// Requested size for the system database persistent volume
pub const DATABASE_STORAGE_SIZE: &str = "1Gi";

/// Requested size for the shared system file storage
pub const SYSTEM_STORAGE_SIZE: &str = "100Mi";

/// Length of generated passwords and tokens
pub const GENERATED_SECRET_LENGTH: usize = 16;

/// Length of generated Rails `SECRET_KEY_BASE` values
pub const GENERATED_KEY_BASE_LENGTH: usize = 128;

// ============================================================================
// OpenAPI Import Constants
// ============================================================================

/// ConfigMap key read when `openapiRef.configMapRef.key` is omitted
pub const DEFAULT_OPENAPI_CONFIGMAP_KEY: &str = "openapi.yaml";

/// Base URL used when an OpenAPI document declares no servers
pub const DEFAULT_OPENAPI_SERVER_URL: &str = "/";

/// Maximum length of a DNS-1123 label
pub const DNS1123_LABEL_MAX_LENGTH: usize = 63;

// ============================================================================
// Controller Requeue Constants
// ============================================================================

/// Requeue delay after an explicit requeue request (defaults, upgrade, incomplete step)
pub const REQUEUE_SHORT_SECS: u64 = 5;

/// Periodic resync interval for converged resources (5 minutes)
pub const REQUEUE_STEADY_SECS: u64 = 300;

/// Requeue duration for controller errors (30 seconds)
pub const ERROR_REQUEUE_DURATION_SECS: u64 = 30;

// ============================================================================
// Runtime Constants
// ============================================================================

/// Number of Tokio worker threads for the controller runtime
pub const TOKIO_WORKER_THREADS: usize = 4;

/// Default bind address for the Prometheus metrics endpoint
pub const DEFAULT_METRICS_ADDR: &str = "0.0.0.0:8080";
