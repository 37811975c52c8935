// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! System (porta): admin portal, developer portal, master console and sidekiq.
//!
//! Both system Deployments carry the hash of `system-environment` on their pod
//! template, so editing the environment rolls the pods.

use crate::apimanager_resources::{
    build_configmap, build_container, build_deployment, build_pvc, build_secret, build_service,
    config_hash, env_from_configmap, env_from_secret, pvc_volume, random_alphanumeric,
    resource_requirements, volume_mount, ComponentRef, DeploymentParams,
};
use crate::constants::{
    BACKEND_LISTENER_PORT, GENERATED_KEY_BASE_LENGTH, GENERATED_SECRET_LENGTH, MEMCACHED_PORT,
    SYSTEM_DEVELOPER_PORT, SYSTEM_MASTER_PORT, SYSTEM_PROVIDER_PORT, SYSTEM_STORAGE_SIZE,
    THREESCALE_RELEASE,
};
use crate::crd::APIManager;
use crate::errors::Result;
use crate::labels::CONFIG_HASH_ANNOTATION;
use crate::reconcilers::apimanager::components::backend::{
    BACKEND_INTERNAL_API_SECRET, BACKEND_LISTENER, INTERNAL_API_PASSWORD_KEY,
    INTERNAL_API_USERNAME_KEY,
};
use crate::reconcilers::apimanager::components::memcached::SYSTEM_MEMCACHE;
use crate::reconcilers::apimanager::components::redis::{SYSTEM_REDIS, SYSTEM_REDIS_URL_KEY};
use crate::reconcilers::apimanager::components::replicas;
use crate::reconcilers::apimanager::components::system_database::{
    DATABASE_URL_KEY, SYSTEM_DATABASE_SECRET,
};
use crate::reconcilers::apimanager::pipeline::{LogicReconciler, StepOutcome, SubReconciler};
use crate::reconcilers::resources::{
    configmap_mutator, deployment_mutator, pvc_mutator, secret_mutator, service_mutator,
};
use crate::store::ObjectStore;
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, EnvVar, Secret};
use std::collections::BTreeMap;

pub const SYSTEM_APP: &str = "system-app";
pub const SYSTEM_SIDEKIQ: &str = "system-sidekiq";
pub const SYSTEM_PROVIDER: &str = "system-provider";
pub const SYSTEM_MASTER: &str = "system-master";
pub const SYSTEM_DEVELOPER: &str = "system-developer";
pub const SYSTEM_STORAGE: &str = "system-storage";
pub const SYSTEM_ENVIRONMENT_CONFIGMAP: &str = "system-environment";
pub const SYSTEM_SEED_SECRET: &str = "system-seed";
pub const SYSTEM_APP_SECRET: &str = "system-app";
pub const SYSTEM_EVENTS_HOOK_SECRET: &str = "system-events-hook";
pub const SYSTEM_MASTER_APICAST_SECRET: &str = "system-master-apicast";

pub const MASTER_APICAST_ACCESS_TOKEN_KEY: &str = "ACCESS_TOKEN";
pub const MASTER_APICAST_BASE_URL_KEY: &str = "BASE_URL";

const APP: ComponentRef = ComponentRef::new("system", "app");
const SIDEKIQ: ComponentRef = ComponentRef::new("system", "sidekiq");

/// Seed credentials for the master and tenant admin accounts.
#[must_use]
pub fn desired_seed_secret(apim: &APIManager) -> Secret {
    let token = || random_alphanumeric(GENERATED_SECRET_LENGTH);
    build_secret(
        apim,
        SYSTEM_SEED_SECRET,
        APP,
        BTreeMap::from([
            ("MASTER_DOMAIN".to_string(), "master".to_string()),
            ("MASTER_USER".to_string(), "master".to_string()),
            ("MASTER_PASSWORD".to_string(), token()),
            ("MASTER_ACCESS_TOKEN".to_string(), token()),
            ("TENANT_NAME".to_string(), apim.tenant_name().to_string()),
            ("ADMIN_USER".to_string(), "admin".to_string()),
            ("ADMIN_PASSWORD".to_string(), token()),
            ("ADMIN_ACCESS_TOKEN".to_string(), token()),
        ]),
    )
}

#[must_use]
pub fn desired_app_secret(apim: &APIManager) -> Secret {
    build_secret(
        apim,
        SYSTEM_APP_SECRET,
        APP,
        BTreeMap::from([(
            "SECRET_KEY_BASE".to_string(),
            random_alphanumeric(GENERATED_KEY_BASE_LENGTH),
        )]),
    )
}

#[must_use]
pub fn desired_events_hook_secret(apim: &APIManager) -> Secret {
    build_secret(
        apim,
        SYSTEM_EVENTS_HOOK_SECRET,
        APP,
        BTreeMap::from([
            (
                "URL".to_string(),
                format!("http://{SYSTEM_MASTER}:{SYSTEM_MASTER_PORT}/master/events/import"),
            ),
            (
                "PASSWORD".to_string(),
                random_alphanumeric(GENERATED_SECRET_LENGTH),
            ),
        ]),
    )
}

/// Token APIcast uses to pull its configuration from the master console.
#[must_use]
pub fn desired_master_apicast_secret(apim: &APIManager) -> Secret {
    build_secret(
        apim,
        SYSTEM_MASTER_APICAST_SECRET,
        APP,
        BTreeMap::from([
            (
                MASTER_APICAST_ACCESS_TOKEN_KEY.to_string(),
                random_alphanumeric(GENERATED_SECRET_LENGTH),
            ),
            (
                MASTER_APICAST_BASE_URL_KEY.to_string(),
                format!("http://{SYSTEM_MASTER}:{SYSTEM_MASTER_PORT}"),
            ),
            (
                "PROXY_CONFIGS_ENDPOINT".to_string(),
                format!("http://{SYSTEM_MASTER}:{SYSTEM_MASTER_PORT}/master/api/proxy/configs"),
            ),
        ]),
    )
}

#[must_use]
pub fn environment_data(apim: &APIManager) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("AMP_RELEASE".to_string(), THREESCALE_RELEASE.to_string()),
        ("APICAST_REGISTRY_URL".to_string(), "http://apicast-staging:8090/policies".to_string()),
        (
            "BACKEND_URL".to_string(),
            format!("http://{BACKEND_LISTENER}:{BACKEND_LISTENER_PORT}"),
        ),
        ("FORCE_SSL".to_string(), "false".to_string()),
        (
            "MEMCACHE_SERVERS".to_string(),
            format!("{SYSTEM_MEMCACHE}:{MEMCACHED_PORT}"),
        ),
        ("PROVIDER_PLAN".to_string(), "enterprise".to_string()),
        ("RAILS_ENV".to_string(), "production".to_string()),
        ("RAILS_LOG_LEVEL".to_string(), "info".to_string()),
        ("RAILS_LOG_TO_STDOUT".to_string(), "true".to_string()),
        ("SSL_CERT_DIR".to_string(), "/etc/pki/tls/certs".to_string()),
        (
            "THREESCALE_SUPERDOMAIN".to_string(),
            apim.spec.wildcard_domain.clone(),
        ),
    ])
}

#[must_use]
pub fn desired_environment_configmap(apim: &APIManager) -> ConfigMap {
    build_configmap(apim, SYSTEM_ENVIRONMENT_CONFIGMAP, APP, environment_data(apim))
}

fn system_env(apim: &APIManager) -> Vec<EnvVar> {
    let mut env: Vec<EnvVar> = environment_data(apim)
        .keys()
        .map(|key| env_from_configmap(key, SYSTEM_ENVIRONMENT_CONFIGMAP, key))
        .collect();
    env.extend([
        env_from_secret("DATABASE_URL", SYSTEM_DATABASE_SECRET, DATABASE_URL_KEY),
        env_from_secret("REDIS_URL", SYSTEM_REDIS, SYSTEM_REDIS_URL_KEY),
        env_from_secret("SECRET_KEY_BASE", SYSTEM_APP_SECRET, "SECRET_KEY_BASE"),
        env_from_secret("MASTER_DOMAIN", SYSTEM_SEED_SECRET, "MASTER_DOMAIN"),
        env_from_secret("MASTER_USER", SYSTEM_SEED_SECRET, "MASTER_USER"),
        env_from_secret("MASTER_PASSWORD", SYSTEM_SEED_SECRET, "MASTER_PASSWORD"),
        env_from_secret("MASTER_ACCESS_TOKEN", SYSTEM_SEED_SECRET, "MASTER_ACCESS_TOKEN"),
        env_from_secret("TENANT_NAME", SYSTEM_SEED_SECRET, "TENANT_NAME"),
        env_from_secret("USER_LOGIN", SYSTEM_SEED_SECRET, "ADMIN_USER"),
        env_from_secret("USER_PASSWORD", SYSTEM_SEED_SECRET, "ADMIN_PASSWORD"),
        env_from_secret("ADMIN_ACCESS_TOKEN", SYSTEM_SEED_SECRET, "ADMIN_ACCESS_TOKEN"),
        env_from_secret(
            "APICAST_ACCESS_TOKEN",
            SYSTEM_MASTER_APICAST_SECRET,
            MASTER_APICAST_ACCESS_TOKEN_KEY,
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
        env_from_secret("EVENTS_SHARED_SECRET", SYSTEM_EVENTS_HOOK_SECRET, "PASSWORD"),
    ]);
    env
}

fn template_annotations(apim: &APIManager) -> BTreeMap<String, String> {
    BTreeMap::from([(
        CONFIG_HASH_ANNOTATION.to_string(),
        config_hash(&environment_data(apim)),
    )])
}

#[must_use]
pub fn desired_app_deployment(apim: &APIManager, image: &str) -> Deployment {
    let mut container = build_container(
        SYSTEM_APP,
        image,
        &[
            ("provider", SYSTEM_PROVIDER_PORT),
            ("developer", SYSTEM_DEVELOPER_PORT),
            ("master", SYSTEM_MASTER_PORT),
        ],
        system_env(apim),
        Some(vec!["env".to_string(), "TENANT_MODE=multitenant".to_string(), "unicorn".to_string()]),
        resource_requirements(apim, ("50m", "600Mi"), ("1", "800Mi")),
    );
    container.volume_mounts = Some(vec![volume_mount("system-storage", "/opt/system/public/system")]);

    build_deployment(
        apim,
        APP,
        DeploymentParams {
            name: SYSTEM_APP.to_string(),
            replicas: replicas(apim.spec.system.as_ref().and_then(|s| s.app_replicas)),
            containers: vec![container],
            volumes: vec![pvc_volume("system-storage", SYSTEM_STORAGE)],
            template_annotations: template_annotations(apim),
            recreate: false,
        },
    )
}

#[must_use]
pub fn desired_sidekiq_deployment(apim: &APIManager, image: &str) -> Deployment {
    let mut container = build_container(
        SYSTEM_SIDEKIQ,
        image,
        &[],
        system_env(apim),
        Some(vec!["rake".to_string(), "sidekiq:worker".to_string(), "RAILS_MAX_THREADS=25".to_string()]),
        resource_requirements(apim, ("100m", "500Mi"), ("1", "2Gi")),
    );
    container.volume_mounts = Some(vec![volume_mount("system-storage", "/opt/system/public/system")]);

    build_deployment(
        apim,
        SIDEKIQ,
        DeploymentParams {
            name: SYSTEM_SIDEKIQ.to_string(),
            replicas: replicas(apim.spec.system.as_ref().and_then(|s| s.sidekiq_replicas)),
            containers: vec![container],
            volumes: vec![pvc_volume("system-storage", SYSTEM_STORAGE)],
            template_annotations: template_annotations(apim),
            recreate: false,
        },
    )
}

pub struct SystemReconciler;

#[async_trait]
impl<S: ObjectStore> SubReconciler<S> for SystemReconciler {
    fn name(&self) -> &'static str {
        "system"
    }

    async fn reconcile(&self, base: &LogicReconciler<'_, S>) -> Result<StepOutcome> {
        let dependencies: [(&str, &[&str]); 3] = [
            (SYSTEM_DATABASE_SECRET, &[DATABASE_URL_KEY]),
            (SYSTEM_REDIS, &[SYSTEM_REDIS_URL_KEY]),
            (
                BACKEND_INTERNAL_API_SECRET,
                &[INTERNAL_API_USERNAME_KEY, INTERNAL_API_PASSWORD_KEY],
            ),
        ];
        for (secret, keys) in dependencies {
            if let Some(reason) = base.require_secret(secret, keys).await? {
                return Ok(StepOutcome::Incomplete { reason });
            }
        }

        let apim = base.apim;
        let image = base.images.system.as_str();
        for secret in [
            desired_seed_secret(apim),
            desired_app_secret(apim),
            desired_events_hook_secret(apim),
            desired_master_apicast_secret(apim),
        ] {
            base.reconcile(secret, secret_mutator).await?;
        }
        base.reconcile(desired_environment_configmap(apim), configmap_mutator)
            .await?;
        base.reconcile(
            build_pvc(apim, SYSTEM_STORAGE, APP, "ReadWriteMany", SYSTEM_STORAGE_SIZE),
            pvc_mutator,
        )
        .await?;
        base.reconcile(desired_app_deployment(apim, image), deployment_mutator)
            .await?;
        base.reconcile(desired_sidekiq_deployment(apim, image), deployment_mutator)
            .await?;

        for (service, port) in [
            (SYSTEM_PROVIDER, SYSTEM_PROVIDER_PORT),
            (SYSTEM_MASTER, SYSTEM_MASTER_PORT),
            (SYSTEM_DEVELOPER, SYSTEM_DEVELOPER_PORT),
        ] {
            base.reconcile(
                build_service(apim, service, APP, SYSTEM_APP, &[("http", port, port)]),
                service_mutator,
            )
            .await?;
        }
        Ok(StepOutcome::Complete)
    }
}

#[cfg(test)]
#[path = "system_tests.rs"]
mod system_tests;
