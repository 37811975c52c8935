// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Memcached cache used by the system console.

use crate::apimanager_resources::{
    build_container, build_deployment, build_service, resource_requirements, ComponentRef,
    DeploymentParams,
};
use crate::constants::MEMCACHED_PORT;
use crate::crd::APIManager;
use crate::errors::Result;
use crate::reconcilers::apimanager::pipeline::{LogicReconciler, StepOutcome, SubReconciler};
use crate::reconcilers::resources::{deployment_mutator, service_mutator};
use crate::store::ObjectStore;
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;

pub const SYSTEM_MEMCACHE: &str = "system-memcache";

const COMPONENT: ComponentRef = ComponentRef::new("system", "memcache");

#[must_use]
pub fn desired_memcached_deployment(apim: &APIManager, image: &str) -> Deployment {
    let container = build_container(
        "memcache",
        image,
        &[("memcache", MEMCACHED_PORT)],
        vec![],
        Some(vec!["memcached".to_string(), "-m".to_string(), "64".to_string()]),
        resource_requirements(apim, ("50m", "64Mi"), ("250m", "96Mi")),
    );
    build_deployment(
        apim,
        COMPONENT,
        DeploymentParams {
            name: SYSTEM_MEMCACHE.to_string(),
            replicas: 1,
            containers: vec![container],
            ..Default::default()
        },
    )
}

pub struct MemcachedReconciler;

#[async_trait]
impl<S: ObjectStore> SubReconciler<S> for MemcachedReconciler {
    fn name(&self) -> &'static str {
        "memcached"
    }

    async fn reconcile(&self, base: &LogicReconciler<'_, S>) -> Result<StepOutcome> {
        base.reconcile(
            desired_memcached_deployment(base.apim, &base.images.system_memcached),
            deployment_mutator,
        )
        .await?;
        base.reconcile(
            build_service(
                base.apim,
                SYSTEM_MEMCACHE,
                COMPONENT,
                SYSTEM_MEMCACHE,
                &[("memcache", MEMCACHED_PORT, MEMCACHED_PORT)],
            ),
            service_mutator,
        )
        .await?;
        Ok(StepOutcome::Complete)
    }
}
