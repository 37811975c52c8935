// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Backend (apisonator): listener, worker and cron.

use crate::apimanager_resources::{
    build_configmap, build_container, build_deployment, build_secret, build_service,
    env_from_configmap, env_from_secret, public_host, random_alphanumeric,
    resource_requirements, ComponentRef, DeploymentParams,
};
use crate::constants::{BACKEND_LISTENER_PORT, GENERATED_SECRET_LENGTH};
use crate::crd::APIManager;
use crate::errors::Result;
use crate::reconcilers::apimanager::components::redis::{
    BACKEND_REDIS, BACKEND_REDIS_QUEUES_URL_KEY, BACKEND_REDIS_STORAGE_URL_KEY,
};
use crate::reconcilers::apimanager::components::replicas;
use crate::reconcilers::apimanager::pipeline::{LogicReconciler, StepOutcome, SubReconciler};
use crate::reconcilers::resources::{
    configmap_mutator, deployment_mutator, secret_mutator, service_mutator,
};
use crate::store::ObjectStore;
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, EnvVar, Secret};
use std::collections::BTreeMap;

pub const BACKEND_LISTENER: &str = "backend-listener";
pub const BACKEND_WORKER: &str = "backend-worker";
pub const BACKEND_CRON: &str = "backend-cron";
pub const BACKEND_INTERNAL_API_SECRET: &str = "backend-internal-api";
pub const BACKEND_LISTENER_SECRET: &str = "backend-listener";
pub const BACKEND_ENVIRONMENT_CONFIGMAP: &str = "backend-environment";

pub const INTERNAL_API_USERNAME_KEY: &str = "username";
pub const INTERNAL_API_PASSWORD_KEY: &str = "password";

const LISTENER: ComponentRef = ComponentRef::new("backend", "listener");
const WORKER: ComponentRef = ComponentRef::new("backend", "worker");
const CRON: ComponentRef = ComponentRef::new("backend", "cron");

#[must_use]
pub fn desired_internal_api_secret(apim: &APIManager) -> Secret {
    build_secret(
        apim,
        BACKEND_INTERNAL_API_SECRET,
        LISTENER,
        BTreeMap::from([
            (INTERNAL_API_USERNAME_KEY.to_string(), "3scale_api_user".to_string()),
            (
                INTERNAL_API_PASSWORD_KEY.to_string(),
                random_alphanumeric(GENERATED_SECRET_LENGTH),
            ),
        ]),
    )
}

#[must_use]
pub fn desired_listener_secret(apim: &APIManager) -> Secret {
    build_secret(
        apim,
        BACKEND_LISTENER_SECRET,
        LISTENER,
        BTreeMap::from([
            (
                "service_endpoint".to_string(),
                format!("http://{BACKEND_LISTENER}:{BACKEND_LISTENER_PORT}"),
            ),
            (
                "route_endpoint".to_string(),
                format!("https://{}", public_host(apim, &format!("backend-{}", apim.tenant_name()))),
            ),
        ]),
    )
}

#[must_use]
pub fn desired_environment_configmap(apim: &APIManager) -> ConfigMap {
    build_configmap(
        apim,
        BACKEND_ENVIRONMENT_CONFIGMAP,
        LISTENER,
        BTreeMap::from([
            ("RACK_ENV".to_string(), "production".to_string()),
            ("PUMA_WORKERS".to_string(), "16".to_string()),
        ]),
    )
}

fn backend_env() -> Vec<EnvVar> {
    vec![
        env_from_configmap("RACK_ENV", BACKEND_ENVIRONMENT_CONFIGMAP, "RACK_ENV"),
        env_from_secret("CONFIG_REDIS_PROXY", BACKEND_REDIS, BACKEND_REDIS_STORAGE_URL_KEY),
        env_from_secret(
            "CONFIG_QUEUES_MASTER_NAME",
            BACKEND_REDIS,
            BACKEND_REDIS_QUEUES_URL_KEY,
        ),
        env_from_secret(
            "CONFIG_INTERNAL_API_USER",
            BACKEND_INTERNAL_API_SECRET,
            INTERNAL_API_USERNAME_KEY,
        ),
        env_from_secret(
            "CONFIG_INTERNAL_API_PASSWORD",
            BACKEND_INTERNAL_API_SECRET,
            INTERNAL_API_PASSWORD_KEY,
        ),
    ]
}

#[must_use]
pub fn desired_listener_deployment(apim: &APIManager, image: &str) -> Deployment {
    let mut env = backend_env();
    env.push(env_from_configmap(
        "PUMA_WORKERS",
        BACKEND_ENVIRONMENT_CONFIGMAP,
        "PUMA_WORKERS",
    ));
    let args = ["bin/3scale_backend", "start", "-e", "production", "-p", "3000", "-x", "/dev/stdout"]
        .map(String::from)
        .to_vec();
    let container = build_container(
        BACKEND_LISTENER,
        image,
        &[("http", BACKEND_LISTENER_PORT)],
        env,
        Some(args),
        resource_requirements(apim, ("500m", "550Mi"), ("1", "700Mi")),
    );
    let spec = apim.spec.backend.as_ref();
    build_deployment(
        apim,
        LISTENER,
        DeploymentParams {
            name: BACKEND_LISTENER.to_string(),
            replicas: replicas(spec.and_then(|b| b.listener_replicas)),
            containers: vec![container],
            ..Default::default()
        },
    )
}

#[must_use]
pub fn desired_worker_deployment(apim: &APIManager, image: &str) -> Deployment {
    let container = build_container(
        BACKEND_WORKER,
        image,
        &[],
        backend_env(),
        Some(vec!["bin/3scale_backend_worker".to_string(), "run".to_string()]),
        resource_requirements(apim, ("150m", "50Mi"), ("1", "300Mi")),
    );
    let spec = apim.spec.backend.as_ref();
    build_deployment(
        apim,
        WORKER,
        DeploymentParams {
            name: BACKEND_WORKER.to_string(),
            replicas: replicas(spec.and_then(|b| b.worker_replicas)),
            containers: vec![container],
            ..Default::default()
        },
    )
}

#[must_use]
pub fn desired_cron_deployment(apim: &APIManager, image: &str) -> Deployment {
    let container = build_container(
        BACKEND_CRON,
        image,
        &[],
        backend_env(),
        Some(vec!["backend-cron".to_string()]),
        resource_requirements(apim, ("50m", "40Mi"), ("150m", "80Mi")),
    );
    let spec = apim.spec.backend.as_ref();
    build_deployment(
        apim,
        CRON,
        DeploymentParams {
            name: BACKEND_CRON.to_string(),
            replicas: replicas(spec.and_then(|b| b.cron_replicas)),
            containers: vec![container],
            ..Default::default()
        },
    )
}

pub struct BackendReconciler;

#[async_trait]
impl<S: ObjectStore> SubReconciler<S> for BackendReconciler {
    fn name(&self) -> &'static str {
        "backend"
    }

    async fn reconcile(&self, base: &LogicReconciler<'_, S>) -> Result<StepOutcome> {
        if let Some(reason) = base
            .require_secret(
                BACKEND_REDIS,
                &[BACKEND_REDIS_STORAGE_URL_KEY, BACKEND_REDIS_QUEUES_URL_KEY],
            )
            .await?
        {
            return Ok(StepOutcome::Incomplete { reason });
        }

        let apim = base.apim;
        let image = base.images.backend.as_str();
        base.reconcile(desired_internal_api_secret(apim), secret_mutator)
            .await?;
        base.reconcile(desired_listener_secret(apim), secret_mutator)
            .await?;
        base.reconcile(desired_environment_configmap(apim), configmap_mutator)
            .await?;
        base.reconcile(desired_listener_deployment(apim, image), deployment_mutator)
            .await?;
        base.reconcile(desired_worker_deployment(apim, image), deployment_mutator)
            .await?;
        base.reconcile(desired_cron_deployment(apim, image), deployment_mutator)
            .await?;
        base.reconcile(
            build_service(
                apim,
                BACKEND_LISTENER,
                LISTENER,
                BACKEND_LISTENER,
                &[("http", BACKEND_LISTENER_PORT, BACKEND_LISTENER_PORT)],
            ),
            service_mutator,
        )
        .await?;
        Ok(StepOutcome::Complete)
    }
}

#[cfg(test)]
#[path = "backend_tests.rs"]
mod backend_tests;
