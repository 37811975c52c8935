// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Metrics endpoints of the platform components.
//!
//! Only active when `spec.monitoring.enabled` is set. Disabling it again removes
//! the metrics Services and the scrape configuration.

use crate::apimanager_resources::{build_configmap, build_service, ComponentRef};
use crate::constants::{APICAST_METRICS_PORT, BACKEND_METRICS_PORT, SYSTEM_METRICS_PORT};
use crate::crd::APIManager;
use crate::errors::Result;
use crate::reconcilers::apimanager::components::apicast::APICAST_PRODUCTION;
use crate::reconcilers::apimanager::components::backend::BACKEND_LISTENER;
use crate::reconcilers::apimanager::components::system::SYSTEM_APP;
use crate::reconcilers::apimanager::pipeline::{LogicReconciler, StepOutcome, SubReconciler};
use crate::reconcilers::resources::{configmap_mutator, service_mutator};
use crate::store::ObjectStore;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{ConfigMap, Service};
use std::collections::BTreeMap;
use tracing::debug;

pub const SCRAPE_CONFIG: &str = "threescale-scrape-config";

/// `(service, target deployment, port, component)` of every metrics endpoint.
const METRICS_ENDPOINTS: [(&str, &str, i32, ComponentRef); 3] = [
    (
        "backend-listener-metrics",
        BACKEND_LISTENER,
        BACKEND_METRICS_PORT,
        ComponentRef::new("backend", "listener"),
    ),
    (
        "apicast-production-metrics",
        APICAST_PRODUCTION,
        APICAST_METRICS_PORT,
        ComponentRef::new("apicast", "production"),
    ),
    (
        "system-app-metrics",
        SYSTEM_APP,
        SYSTEM_METRICS_PORT,
        ComponentRef::new("system", "app"),
    ),
];

const COMPONENT: ComponentRef = ComponentRef::new("monitoring", "scrape-config");

#[must_use]
pub fn desired_metrics_services(apim: &APIManager) -> Vec<Service> {
    METRICS_ENDPOINTS
        .iter()
        .map(|(service, target, port, component)| {
            build_service(apim, service, *component, target, &[("metrics", *port, *port)])
        })
        .collect()
}

/// Prometheus static scrape configuration listing every metrics Service.
#[must_use]
pub fn desired_scrape_configmap(apim: &APIManager) -> ConfigMap {
    let namespace = apim.metadata.namespace.as_deref().unwrap_or_default();
    let jobs: String = METRICS_ENDPOINTS
        .iter()
        .map(|(service, _, port, _)| {
            format!(
                "  - job_name: {service}\n    static_configs:\n      - targets: ['{service}.{namespace}.svc:{port}']\n"
            )
        })
        .collect();
    let config = format!("scrape_configs:\n{jobs}");
    build_configmap(
        apim,
        SCRAPE_CONFIG,
        COMPONENT,
        BTreeMap::from([("prometheus.yml".to_string(), config)]),
    )
}

pub struct MonitoringReconciler;

#[async_trait]
impl<S: ObjectStore> SubReconciler<S> for MonitoringReconciler {
    fn name(&self) -> &'static str {
        "monitoring"
    }

    async fn reconcile(&self, base: &LogicReconciler<'_, S>) -> Result<StepOutcome> {
        if !base.apim.is_monitoring_enabled() {
            debug!("Monitoring disabled, removing leftovers");
            for (service, ..) in METRICS_ENDPOINTS {
                base.remove::<Service>(service).await?;
            }
            base.remove::<ConfigMap>(SCRAPE_CONFIG).await?;
            return Ok(StepOutcome::Complete);
        }
        for service in desired_metrics_services(base.apim) {
            base.reconcile(service, service_mutator).await?;
        }
        base.reconcile(desired_scrape_configmap(base.apim), configmap_mutator)
            .await?;
        Ok(StepOutcome::Complete)
    }
}
