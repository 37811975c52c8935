// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Zync: pushes domain changes from system to the routing layer.

use crate::apimanager_resources::{
    build_container, build_deployment, build_secret, build_service, env_from_secret, env_value,
    random_alphanumeric, resource_requirements, volume_mount, ComponentRef, DeploymentParams,
};
use crate::constants::{GENERATED_KEY_BASE_LENGTH, GENERATED_SECRET_LENGTH, POSTGRESQL_PORT, ZYNC_PORT};
use crate::crd::APIManager;
use crate::errors::Result;
use crate::reconcilers::apimanager::components::replicas;
use crate::reconcilers::apimanager::pipeline::{LogicReconciler, StepOutcome, SubReconciler};
use crate::reconcilers::resources::{deployment_mutator, secret_mutator, service_mutator};
use crate::store::ObjectStore;
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{EmptyDirVolumeSource, EnvVar, Secret, Volume};
use std::collections::BTreeMap;

pub const ZYNC: &str = "zync";
pub const ZYNC_QUE: &str = "zync-que";
pub const ZYNC_DATABASE: &str = "zync-database";
pub const ZYNC_SECRET: &str = "zync";

const ZYNC_COMPONENT: ComponentRef = ComponentRef::new("zync", "zync");
const QUE_COMPONENT: ComponentRef = ComponentRef::new("zync", "zync-que");
const DATABASE_COMPONENT: ComponentRef = ComponentRef::new("zync", "database");

/// Credentials shared by zync, zync-que and their database.
#[must_use]
pub fn desired_zync_secret(apim: &APIManager) -> Secret {
    let password = random_alphanumeric(GENERATED_SECRET_LENGTH);
    build_secret(
        apim,
        ZYNC_SECRET,
        ZYNC_COMPONENT,
        BTreeMap::from([
            (
                "DATABASE_URL".to_string(),
                format!("postgresql://zync:{password}@{ZYNC_DATABASE}:{POSTGRESQL_PORT}/zync_production"),
            ),
            ("ZYNC_DATABASE_PASSWORD".to_string(), password),
            (
                "SECRET_KEY_BASE".to_string(),
                random_alphanumeric(GENERATED_SECRET_LENGTH),
            ),
            (
                "ZYNC_AUTHENTICATION_TOKEN".to_string(),
                random_alphanumeric(GENERATED_KEY_BASE_LENGTH),
            ),
        ]),
    )
}

fn zync_env() -> Vec<EnvVar> {
    vec![
        env_value("RAILS_LOG_TO_STDOUT", "true"),
        env_value("RAILS_ENV", "production"),
        env_from_secret("DATABASE_URL", ZYNC_SECRET, "DATABASE_URL"),
        env_from_secret("SECRET_KEY_BASE", ZYNC_SECRET, "SECRET_KEY_BASE"),
        env_from_secret(
            "ZYNC_AUTHENTICATION_TOKEN",
            ZYNC_SECRET,
            "ZYNC_AUTHENTICATION_TOKEN",
        ),
    ]
}

#[must_use]
pub fn desired_zync_deployment(apim: &APIManager, image: &str) -> Deployment {
    let container = build_container(
        ZYNC,
        image,
        &[("http", ZYNC_PORT)],
        zync_env(),
        None,
        resource_requirements(apim, ("150m", "250M"), ("1", "512Mi")),
    );
    build_deployment(
        apim,
        ZYNC_COMPONENT,
        DeploymentParams {
            name: ZYNC.to_string(),
            replicas: replicas(apim.spec.zync.as_ref().and_then(|z| z.app_replicas)),
            containers: vec![container],
            ..Default::default()
        },
    )
}

#[must_use]
pub fn desired_que_deployment(apim: &APIManager, image: &str) -> Deployment {
    let container = build_container(
        ZYNC_QUE,
        image,
        &[],
        zync_env(),
        Some(vec!["bin/rake".to_string(), "que".to_string()]),
        resource_requirements(apim, ("250m", "250M"), ("1", "512Mi")),
    );
    build_deployment(
        apim,
        QUE_COMPONENT,
        DeploymentParams {
            name: ZYNC_QUE.to_string(),
            replicas: replicas(apim.spec.zync.as_ref().and_then(|z| z.que_replicas)),
            containers: vec![container],
            ..Default::default()
        },
    )
}

#[must_use]
pub fn desired_database_deployment(apim: &APIManager, image: &str) -> Deployment {
    let mut container = build_container(
        "postgresql",
        image,
        &[("postgresql", POSTGRESQL_PORT)],
        vec![
            env_value("POSTGRESQL_USER", "zync"),
            env_from_secret("POSTGRESQL_PASSWORD", ZYNC_SECRET, "ZYNC_DATABASE_PASSWORD"),
            env_value("POSTGRESQL_DATABASE", "zync_production"),
        ],
        None,
        resource_requirements(apim, ("50m", "250M"), ("250m", "2G")),
    );
    container.volume_mounts = Some(vec![volume_mount(
        "zync-database-data",
        "/var/lib/pgsql/data",
    )]);

    build_deployment(
        apim,
        DATABASE_COMPONENT,
        DeploymentParams {
            name: ZYNC_DATABASE.to_string(),
            replicas: 1,
            containers: vec![container],
            volumes: vec![Volume {
                name: "zync-database-data".to_string(),
                empty_dir: Some(EmptyDirVolumeSource::default()),
                ..Default::default()
            }],
            recreate: true,
            ..Default::default()
        },
    )
}

pub struct ZyncReconciler;

#[async_trait]
impl<S: ObjectStore> SubReconciler<S> for ZyncReconciler {
    fn name(&self) -> &'static str {
        "zync"
    }

    async fn reconcile(&self, base: &LogicReconciler<'_, S>) -> Result<StepOutcome> {
        let apim = base.apim;
        base.reconcile(desired_zync_secret(apim), secret_mutator)
            .await?;
        base.reconcile(
            desired_database_deployment(apim, &base.images.zync_postgresql),
            deployment_mutator,
        )
        .await?;
        base.reconcile(desired_zync_deployment(apim, &base.images.zync), deployment_mutator)
            .await?;
        base.reconcile(desired_que_deployment(apim, &base.images.zync), deployment_mutator)
            .await?;
        base.reconcile(
            build_service(apim, ZYNC, ZYNC_COMPONENT, ZYNC, &[("8080-tcp", ZYNC_PORT, ZYNC_PORT)]),
            service_mutator,
        )
        .await?;
        base.reconcile(
            build_service(
                apim,
                ZYNC_DATABASE,
                DATABASE_COMPONENT,
                ZYNC_DATABASE,
                &[("postgresql", POSTGRESQL_PORT, POSTGRESQL_PORT)],
            ),
            service_mutator,
        )
        .await?;
        Ok(StepOutcome::Complete)
    }
}
