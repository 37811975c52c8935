// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `APIManager` reconciliation.
//!
//! One pass of [`reconcile_apimanager`] runs, in order:
//!
//! 1. **Fetch** - a missing `APIManager` is a no-op
//! 2. **Defaults** - newly filled defaults are persisted and the pass ends, so the
//!    next pass sees a stable spec
//! 3. **Upgrade** - while the recorded operator version differs from the running one,
//!    the pass ends after the migration step (see [`upgrade`])
//! 4. **Pipeline** - the ordered component steps (see [`pipeline`])
//! 5. **Status** - deployment readiness, written only when it changed
//!
//! Every step is idempotent and there is no checkpoint between passes: each pass
//! recomputes everything from the current spec. Write conflicts are never fatal;
//! they end the pass with a requeue so the next pass starts from a fresh read.

pub mod components;
pub mod pipeline;
pub mod status;
pub mod upgrade;

use crate::constants::{REQUEUE_SHORT_SECS, REQUEUE_STEADY_SECS};
use crate::crd::APIManager;
use crate::errors::{Error, Result};
use crate::store::ObjectStore;
use kube::ResourceExt;
use std::time::Duration;
use tracing::{debug, info, warn};

use self::pipeline::{build_pipeline, run_pipeline, LogicReconciler, PipelineResult};
use self::status::{reconcile_status, StatusChange};
use self::upgrade::{reconcile_upgrade, UpgradeState};

/// How a reconciliation pass ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The `APIManager` no longer exists.
    NotFound,
    /// Defaults were written to the spec.
    DefaultsApplied,
    /// Upgrade migration work was done and must be re-checked.
    Upgrading,
    /// Version annotations were stamped.
    UpgradeCompleted,
    /// A component step is waiting for a dependency.
    PipelineIncomplete { step: &'static str, reason: String },
    /// Another writer changed an object during the pass.
    WriteConflict,
    /// The pipeline completed and the status was written.
    StatusUpdated,
    /// The pipeline completed and the status was already current.
    UpToDate,
    /// The pipeline completed but the status write lost a race.
    StatusConflict,
}

impl ReconcileOutcome {
    /// When to run the next pass, or `None` to wait for a watch event.
    #[must_use]
    pub fn requeue(&self) -> Option<Duration> {
        match self {
            Self::NotFound => None,
            Self::DefaultsApplied
            | Self::Upgrading
            | Self::UpgradeCompleted
            | Self::PipelineIncomplete { .. }
            | Self::WriteConflict
            | Self::StatusConflict => Some(Duration::from_secs(REQUEUE_SHORT_SECS)),
            Self::StatusUpdated | Self::UpToDate => Some(Duration::from_secs(REQUEUE_STEADY_SECS)),
        }
    }

    /// Label used for requeue metrics.
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::DefaultsApplied => "defaults_applied",
            Self::Upgrading => "upgrading",
            Self::UpgradeCompleted => "upgrade_completed",
            Self::PipelineIncomplete { .. } => "pipeline_incomplete",
            Self::WriteConflict => "write_conflict",
            Self::StatusUpdated => "status_updated",
            Self::UpToDate => "up_to_date",
            Self::StatusConflict => "status_conflict",
        }
    }
}

/// Turn a write conflict into `outcome`; every other error is propagated.
fn on_conflict<T>(result: Result<T>, outcome: ReconcileOutcome) -> Result<Result<T, ReconcileOutcome>> {
    match result {
        Ok(value) => Ok(Ok(value)),
        Err(e) if e.is_conflict() => {
            warn!(error = %e, "Write conflict, requeueing");
            Ok(Err(outcome))
        }
        Err(e) => Err(e),
    }
}

/// Run one reconciliation pass for the `APIManager` `namespace/name`.
///
/// # Errors
///
/// Returns every error except write conflicts, which end the pass with
/// [`ReconcileOutcome::WriteConflict`] or [`ReconcileOutcome::StatusConflict`].
pub async fn reconcile_apimanager<S: ObjectStore>(
    store: &S,
    namespace: &str,
    name: &str,
) -> Result<ReconcileOutcome> {
    let Some(mut apim) = store.get::<APIManager>(namespace, name).await? else {
        debug!(namespace = %namespace, name = %name, "APIManager not found, nothing to do");
        return Ok(ReconcileOutcome::NotFound);
    };

    info!(namespace = %namespace, name = %name, "Reconciling APIManager");

    if apim.set_defaults() {
        if let Err(outcome) = on_conflict(
            store.replace(namespace, &apim).await,
            ReconcileOutcome::WriteConflict,
        )? {
            return Ok(outcome);
        }
        info!(namespace = %namespace, name = %name, "Applied APIManager defaults");
        return Ok(ReconcileOutcome::DefaultsApplied);
    }

    match on_conflict(
        reconcile_upgrade(store, &apim).await,
        ReconcileOutcome::WriteConflict,
    )? {
        Err(outcome) => return Ok(outcome),
        Ok(UpgradeState::InProgress) => return Ok(ReconcileOutcome::Upgrading),
        Ok(UpgradeState::Completed) => return Ok(ReconcileOutcome::UpgradeCompleted),
        Ok(UpgradeState::Current) => {}
    }

    let base = LogicReconciler::new(store, &apim);
    let steps = build_pipeline(&apim);
    match on_conflict(
        run_pipeline(&steps, &base).await,
        ReconcileOutcome::WriteConflict,
    )? {
        Err(outcome) => return Ok(outcome),
        Ok(PipelineResult::Incomplete { step, reason }) => {
            return Ok(ReconcileOutcome::PipelineIncomplete { step, reason });
        }
        Ok(PipelineResult::Complete) => {}
    }

    match on_conflict(
        reconcile_status(store, &apim).await,
        ReconcileOutcome::StatusConflict,
    )? {
        Err(outcome) => Ok(outcome),
        Ok(StatusChange::Updated) => Ok(ReconcileOutcome::StatusUpdated),
        Ok(StatusChange::Unchanged) => {
            debug!(name = %apim.name_any(), "APIManager up to date");
            Ok(ReconcileOutcome::UpToDate)
        }
    }
}

/// Error classification used by the controller wrapper.
#[must_use]
pub fn is_terminal(error: &Error) -> bool {
    matches!(error, Error::UnsupportedUpgrade { .. } | Error::Validation { .. })
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod mod_tests;
