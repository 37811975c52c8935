// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Ordered chain of component steps converging an `APIManager`.
//!
//! The pipeline is rebuilt on every pass from the current spec. Branch selection
//! (internal vs. external databases, MySQL vs. PostgreSQL) happens once, in
//! [`build_pipeline`], so it cannot change while the chain runs.
//!
//! Steps run strictly in order. The first step reporting [`StepOutcome::Incomplete`]
//! stops the chain; later steps assume every earlier one has been applied.

use crate::apimanager_resources::{resolve_images, Images};
use crate::crd::{APIManager, DatabaseFlavor};
use crate::errors::Result;
use crate::metrics;
use crate::reconcilers::resources::{delete_resource, reconcile_resource, Mutator, ResourceChange};
use crate::store::{ManagedObject, ObjectStore};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::ResourceExt;
use std::time::Instant;
use tracing::{debug, info};

use super::components::{
    apicast::ApicastReconciler,
    backend::BackendReconciler,
    high_availability::HighAvailabilityReconciler,
    images::ImagesReconciler,
    memcached::MemcachedReconciler,
    monitoring::MonitoringReconciler,
    redis::RedisReconciler,
    system::SystemReconciler,
    system_database::{
        SystemMySqlImageReconciler, SystemMySqlReconciler, SystemPostgreSqlImageReconciler,
        SystemPostgreSqlReconciler,
    },
    zync::ZyncReconciler,
};

/// Result of a single component step.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    /// Everything this step owns has been converged.
    Complete,
    /// A dependency is not ready yet; the pass must stop and be retried.
    Incomplete { reason: String },
}

/// Result of running the whole chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PipelineResult {
    Complete,
    Incomplete { step: &'static str, reason: String },
}

/// Read-only context handed to every step of one pass.
pub struct LogicReconciler<'a, S: ObjectStore> {
    pub store: &'a S,
    pub apim: &'a APIManager,
    pub namespace: String,
    pub images: Images,
}

impl<'a, S: ObjectStore> LogicReconciler<'a, S> {
    #[must_use]
    pub fn new(store: &'a S, apim: &'a APIManager) -> Self {
        Self {
            store,
            apim,
            namespace: apim.namespace().unwrap_or_default(),
            images: resolve_images(apim),
        }
    }

    /// Converge one desired object in the `APIManager` namespace.
    ///
    /// # Errors
    ///
    /// Propagates store errors, including write conflicts.
    pub async fn reconcile<K: ManagedObject>(
        &self,
        desired: K,
        mutator: Mutator<K>,
    ) -> Result<ResourceChange> {
        reconcile_resource(self.store, &self.namespace, desired, mutator).await
    }

    /// Delete an object the current spec no longer asks for.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub async fn remove<K: ManagedObject>(&self, name: &str) -> Result<bool> {
        delete_resource::<K, S>(self.store, &self.namespace, name).await
    }

    /// Check that Secret `name` exists and carries every key in `keys`.
    ///
    /// Returns the reason the step must wait, or `None` when the Secret is usable.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub async fn require_secret(&self, name: &str, keys: &[&str]) -> Result<Option<String>> {
        let Some(secret) = self.store.get::<Secret>(&self.namespace, name).await? else {
            return Ok(Some(format!("Secret {name} not found")));
        };

        let missing: Vec<&str> = keys
            .iter()
            .copied()
            .filter(|key| {
                let in_data = secret.data.as_ref().is_some_and(|d| d.contains_key(*key));
                let in_string_data = secret
                    .string_data
                    .as_ref()
                    .is_some_and(|d| d.contains_key(*key));
                !in_data && !in_string_data
            })
            .collect();

        if missing.is_empty() {
            Ok(None)
        } else {
            Ok(Some(format!(
                "Secret {name} is missing keys: {}",
                missing.join(", ")
            )))
        }
    }
}

/// One infrastructure concern of the platform.
#[async_trait]
pub trait SubReconciler<S: ObjectStore>: Send + Sync {
    /// Stable name used in logs, metrics and outcomes.
    fn name(&self) -> &'static str;

    /// Converge every object this step owns.
    async fn reconcile(&self, base: &LogicReconciler<'_, S>) -> Result<StepOutcome>;
}

/// Where the system database and Redis instances come from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DatabaseMode {
    /// Deployed and owned by the operator.
    Internal(DatabaseFlavor),
    /// Supplied by the user; the high-availability step takes over.
    External,
}

impl DatabaseMode {
    #[must_use]
    pub fn from_apimanager(apim: &APIManager) -> Self {
        if apim.is_external_database_enabled() {
            Self::External
        } else {
            Self::Internal(apim.database_flavor())
        }
    }
}

/// Build the ordered step list for `apim`.
#[must_use]
pub fn build_pipeline<S: ObjectStore>(apim: &APIManager) -> Vec<Box<dyn SubReconciler<S>>> {
    let mode = DatabaseMode::from_apimanager(apim);
    debug!(mode = ?mode, "Building APIManager pipeline");

    let mut steps: Vec<Box<dyn SubReconciler<S>>> = vec![Box::new(ImagesReconciler)];

    match mode {
        DatabaseMode::Internal(flavor) => {
            steps.push(Box::new(RedisReconciler));
            match flavor {
                DatabaseFlavor::MySql => {
                    steps.push(Box::new(SystemMySqlReconciler));
                    steps.push(Box::new(SystemMySqlImageReconciler));
                }
                DatabaseFlavor::PostgreSql => {
                    steps.push(Box::new(SystemPostgreSqlReconciler));
                    steps.push(Box::new(SystemPostgreSqlImageReconciler));
                }
            }
        }
        DatabaseMode::External => steps.push(Box::new(HighAvailabilityReconciler)),
    }

    steps.push(Box::new(BackendReconciler));
    steps.push(Box::new(MemcachedReconciler));
    steps.push(Box::new(SystemReconciler));
    steps.push(Box::new(ZyncReconciler));
    steps.push(Box::new(ApicastReconciler));
    steps.push(Box::new(MonitoringReconciler));
    steps
}

/// Run `steps` in order, stopping at the first incomplete one.
///
/// # Errors
///
/// Returns the first step error; later steps are not run.
pub async fn run_pipeline<S: ObjectStore>(
    steps: &[Box<dyn SubReconciler<S>>],
    base: &LogicReconciler<'_, S>,
) -> Result<PipelineResult> {
    for step in steps {
        let start = Instant::now();
        debug!(step = step.name(), "Running pipeline step");
        let outcome = step.reconcile(base).await?;
        metrics::record_step_duration(step.name(), start.elapsed());

        if let StepOutcome::Incomplete { reason } = outcome {
            info!(
                step = step.name(),
                reason = %reason,
                "Pipeline step incomplete, stopping this pass"
            );
            return Ok(PipelineResult::Incomplete {
                step: step.name(),
                reason,
            });
        }
    }
    Ok(PipelineResult::Complete)
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod pipeline_tests;
