// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error types for the 3scale operator.
//!
//! Reconcilers classify failures so the orchestrator can decide what happens next:
//!
//! - [`Error::NotFound`] - the object is gone; benign for the top-level resource
//! - [`Error::Conflict`] - an optimistic-concurrency write lost a race; requeue
//! - [`Error::Validation`] - a derived object is invalid; nothing is written
//! - [`Error::UnsupportedUpgrade`] - the recorded operator version cannot be migrated
//! - everything else is a transient infrastructure failure and is retried with backoff

use thiserror::Error;

/// Result alias used throughout the library.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised while reconciling 3scale resources.
#[derive(Error, Debug)]
pub enum Error {
    /// The requested object does not exist in the cluster.
    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        /// Kind of the missing object
        kind: String,
        /// Namespace that was searched
        namespace: String,
        /// Name of the missing object
        name: String,
    },

    /// A write was rejected because the stored object changed since it was read.
    ///
    /// The local copy must be discarded and the reconciliation requeued.
    #[error("conflict writing {kind} {namespace}/{name}: the object has been modified")]
    Conflict {
        /// Kind of the conflicting object
        kind: String,
        /// Namespace of the conflicting object
        namespace: String,
        /// Name of the conflicting object
        name: String,
    },

    /// A desired object failed validation before any write was attempted.
    #[error("invalid {kind} '{name}': {}", reasons.join("; "))]
    Validation {
        /// Kind of the invalid object
        kind: String,
        /// Name (possibly synthesized) of the invalid object
        name: String,
        /// Every validation failure found, aggregated
        reasons: Vec<String>,
    },

    /// The recorded operator version cannot be upgraded in place.
    #[error(
        "unsupported upgrade from operator version '{from}' to '{to}': only upgrades from '{supported}' are supported"
    )]
    UnsupportedUpgrade {
        /// Version recorded on the resource
        from: String,
        /// Version of the running operator
        to: String,
        /// The single version an upgrade is accepted from
        supported: String,
    },

    /// The OpenAPI document could not be loaded or is semantically unusable.
    #[error("invalid OpenAPI document: {0}")]
    OpenApiDocument(String),

    /// A server URL template references a variable with no declared default.
    #[error("server URL template '{url}' references undeclared variable '{variable}'")]
    UndeclaredServerVariable {
        /// The URL template being rendered
        url: String,
        /// The variable without a declaration
        variable: String,
    },

    /// Kubernetes API failure.
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    /// JSON (de)serialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parse failure of an OpenAPI document.
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP failure fetching a remote OpenAPI document.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    /// Build a [`Error::NotFound`] for kind `K`.
    pub fn not_found<K>(namespace: &str, name: &str) -> Self
    where
        K: kube::Resource<DynamicType = ()>,
    {
        Self::NotFound {
            kind: K::kind(&()).to_string(),
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }

    /// Build a [`Error::Conflict`] for kind `K`.
    pub fn conflict<K>(namespace: &str, name: &str) -> Self
    where
        K: kube::Resource<DynamicType = ()>,
    {
        Self::Conflict {
            kind: K::kind(&()).to_string(),
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }

    /// Returns `true` if this error is an optimistic-concurrency conflict.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        match self {
            Self::Conflict { .. } => true,
            Self::Kube(kube::Error::Api(ae)) => ae.code == 409,
            _ => false,
        }
    }

    /// Returns `true` if this error means the object does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound { .. } => true,
            Self::Kube(kube::Error::Api(ae)) => ae.code == 404,
            _ => false,
        }
    }

    /// Short, stable classification used as a metrics label.
    #[must_use]
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::Conflict { .. } => "conflict",
            Self::Validation { .. } => "validation",
            Self::UnsupportedUpgrade { .. } => "unsupported_upgrade",
            Self::OpenApiDocument(_) | Self::UndeclaredServerVariable { .. } | Self::Yaml(_) => {
                "openapi"
            }
            Self::Kube(_) => "kube_api",
            Self::Serialization(_) => "serialization",
            Self::Http(_) => "http",
        }
    }
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod errors_tests;
