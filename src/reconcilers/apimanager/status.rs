// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Deployment readiness summary for an `APIManager` status.

use crate::crd::{APIManager, APIManagerStatus, DeploymentsStatus};
use crate::errors::Result;
use crate::reconcilers::status::{conditions_equal, update_condition_in_memory};
use crate::store::ObjectStore;
use k8s_openapi::api::apps::v1::Deployment;
use kube::ResourceExt;
use tracing::{debug, info};

pub const CONDITION_AVAILABLE: &str = "Available";
pub const REASON_DEPLOYMENTS_READY: &str = "DeploymentsReady";
pub const REASON_DEPLOYMENTS_NOT_READY: &str = "DeploymentsNotReady";

/// Whether the status aggregator had to write.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusChange {
    Updated,
    Unchanged,
}

fn is_owned_by(deployment: &Deployment, owner_uid: &str) -> bool {
    deployment
        .owner_references()
        .iter()
        .any(|r| r.uid == owner_uid)
}

/// Group the Deployments owned by `owner_uid` into stopped, starting and ready.
///
/// Names are sorted so the summary does not depend on list order.
#[must_use]
pub fn deployment_status(deployments: &[Deployment], owner_uid: &str) -> DeploymentsStatus {
    let mut owned: Vec<&Deployment> = deployments
        .iter()
        .filter(|d| is_owned_by(d, owner_uid))
        .collect();
    owned.sort_by_key(|d| d.name_any());

    let mut status = DeploymentsStatus::default();
    for deployment in owned {
        let desired = deployment
            .spec
            .as_ref()
            .and_then(|s| s.replicas)
            .unwrap_or(1);
        let ready = deployment
            .status
            .as_ref()
            .and_then(|s| s.ready_replicas)
            .unwrap_or(0);

        let bucket = if desired == 0 {
            &mut status.stopped
        } else if ready < desired {
            &mut status.starting
        } else {
            &mut status.ready
        };
        bucket.push(deployment.name_any());
    }
    status
}

/// Compute the full desired status, keeping condition timestamps that did not move.
#[must_use]
pub fn desired_status(apim: &APIManager, deployments: DeploymentsStatus) -> APIManagerStatus {
    let mut conditions = apim
        .status
        .as_ref()
        .map(|s| s.conditions.clone())
        .unwrap_or_default();

    if deployments.starting.is_empty() && deployments.stopped.is_empty() {
        update_condition_in_memory(
            &mut conditions,
            CONDITION_AVAILABLE,
            "True",
            REASON_DEPLOYMENTS_READY,
            "All deployments are ready",
        );
    } else {
        let mut waiting = deployments.starting.clone();
        waiting.extend(deployments.stopped.iter().cloned());
        update_condition_in_memory(
            &mut conditions,
            CONDITION_AVAILABLE,
            "False",
            REASON_DEPLOYMENTS_NOT_READY,
            &format!("Deployments not ready: {}", waiting.join(", ")),
        );
    }

    APIManagerStatus {
        conditions,
        deployments,
    }
}

/// Recompute the `APIManager` status and write it only if it changed.
///
/// # Errors
///
/// Returns [`Error::Conflict`](crate::errors::Error::Conflict) if the `APIManager`
/// changed since it was read, or any store error.
pub async fn reconcile_status<S: ObjectStore>(store: &S, apim: &APIManager) -> Result<StatusChange> {
    let namespace = apim.namespace().unwrap_or_default();
    let owner_uid = apim.uid().unwrap_or_default();

    let deployments = store.list::<Deployment>(&namespace).await?;
    let desired = desired_status(apim, deployment_status(&deployments, &owner_uid));

    let current = apim.status.clone().unwrap_or_default();
    if current.deployments == desired.deployments
        && conditions_equal(&current.conditions, &desired.conditions)
    {
        debug!(name = %apim.name_any(), "APIManager status unchanged, skipping update");
        return Ok(StatusChange::Unchanged);
    }

    let mut updated = apim.clone();
    updated.status = Some(desired);
    store.update_status(&namespace, &updated).await?;
    info!(
        namespace = %namespace,
        name = %apim.name_any(),
        "Updated APIManager status"
    );
    Ok(StatusChange::Updated)
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod status_tests;
