// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Shared context for all controllers.
//!
//! Every controller receives an `Arc<Context>` holding the Kubernetes client, the
//! [`KubeStore`] the reconcilers read and write through, and the HTTP client used
//! to fetch URL-sourced OpenAPI documents.

use crate::store::KubeStore;
use kube::Client;
use std::time::Duration;

/// Shared context passed to all controllers.
#[derive(Clone)]
pub struct Context {
    /// Kubernetes client for API operations
    pub client: Client,

    /// Cluster access for the reconcilers
    pub store: KubeStore,

    /// HTTP client for OpenAPI documents referenced by URL
    pub http_client: reqwest::Client,

    /// Requeue delay after a retryable reconciliation error
    pub error_requeue: Duration,
}

impl Context {
    #[must_use]
    pub fn new(client: Client, http_client: reqwest::Client, error_requeue: Duration) -> Self {
        Self {
            store: KubeStore::new(client.clone()),
            client,
            http_client,
            error_requeue,
        }
    }
}
