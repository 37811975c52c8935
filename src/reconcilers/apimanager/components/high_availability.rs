// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! High-availability mode: external Redis and system database.
//!
//! Replaces the internal Redis and database steps. The connection Secrets must be
//! created by the user; until they exist with every expected key the pass stops here.

use crate::apimanager_resources::{build_object_meta, build_selector_labels, ComponentRef};
use crate::crd::APIManager;
use crate::errors::Result;
use crate::reconcilers::apimanager::components::redis::{
    BACKEND_REDIS, BACKEND_REDIS_QUEUES_URL_KEY, BACKEND_REDIS_STORAGE_URL_KEY, SYSTEM_REDIS,
    SYSTEM_REDIS_URL_KEY,
};
use crate::reconcilers::apimanager::components::system_database::{
    DATABASE_URL_KEY, SYSTEM_DATABASE_SECRET,
};
use crate::reconcilers::apimanager::pipeline::{LogicReconciler, StepOutcome, SubReconciler};
use crate::reconcilers::resources::pdb_mutator;
use crate::store::ObjectStore;
use async_trait::async_trait;
use k8s_openapi::api::policy::v1::{PodDisruptionBudget, PodDisruptionBudgetSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use tracing::info;

/// Stateless deployments protected by a disruption budget.
pub const PDB_DEPLOYMENTS: [(&str, ComponentRef); 8] = [
    ("backend-listener", ComponentRef::new("backend", "listener")),
    ("backend-worker", ComponentRef::new("backend", "worker")),
    ("system-app", ComponentRef::new("system", "app")),
    ("system-sidekiq", ComponentRef::new("system", "sidekiq")),
    ("zync", ComponentRef::new("zync", "zync")),
    ("zync-que", ComponentRef::new("zync", "zync-que")),
    ("apicast-staging", ComponentRef::new("apicast", "staging")),
    ("apicast-production", ComponentRef::new("apicast", "production")),
];

/// User-supplied Secrets and the keys each must carry.
const REQUIRED_SECRETS: [(&str, &[&str]); 3] = [
    (
        BACKEND_REDIS,
        &[BACKEND_REDIS_STORAGE_URL_KEY, BACKEND_REDIS_QUEUES_URL_KEY],
    ),
    (SYSTEM_REDIS, &[SYSTEM_REDIS_URL_KEY]),
    (SYSTEM_DATABASE_SECRET, &[DATABASE_URL_KEY]),
];

#[must_use]
pub fn desired_pdb(apim: &APIManager, deployment: &str, component: ComponentRef) -> PodDisruptionBudget {
    PodDisruptionBudget {
        metadata: build_object_meta(apim, deployment, component),
        spec: Some(PodDisruptionBudgetSpec {
            max_unavailable: Some(IntOrString::Int(1)),
            selector: Some(LabelSelector {
                match_labels: Some(build_selector_labels(deployment)),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub struct HighAvailabilityReconciler;

#[async_trait]
impl<S: ObjectStore> SubReconciler<S> for HighAvailabilityReconciler {
    fn name(&self) -> &'static str {
        "high-availability"
    }

    async fn reconcile(&self, base: &LogicReconciler<'_, S>) -> Result<StepOutcome> {
        for (secret, keys) in REQUIRED_SECRETS {
            if let Some(reason) = base.require_secret(secret, keys).await? {
                info!(secret = %secret, "Waiting for external database Secret");
                return Ok(StepOutcome::Incomplete { reason });
            }
        }

        for (deployment, component) in PDB_DEPLOYMENTS {
            base.reconcile(desired_pdb(base.apim, deployment, component), pdb_mutator)
                .await?;
        }
        Ok(StepOutcome::Complete)
    }
}
