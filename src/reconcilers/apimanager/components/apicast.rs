// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! APIcast staging and production gateways.
//!
//! Both gateways pull their configuration from the system master console with the
//! token in `system-master-apicast`, so this step waits for the system step.

use crate::apimanager_resources::{
    build_configmap, build_container, build_deployment, build_service, env_from_configmap,
    env_from_secret, env_value, resource_requirements, ComponentRef, DeploymentParams,
};
use crate::constants::{APICAST_GATEWAY_PORT, APICAST_MANAGEMENT_PORT, APICAST_METRICS_PORT};
use crate::crd::APIManager;
use crate::errors::Result;
use crate::reconcilers::apimanager::components::replicas;
use crate::reconcilers::apimanager::components::system::{
    MASTER_APICAST_ACCESS_TOKEN_KEY, MASTER_APICAST_BASE_URL_KEY, SYSTEM_MASTER_APICAST_SECRET,
};
use crate::reconcilers::apimanager::pipeline::{LogicReconciler, StepOutcome, SubReconciler};
use crate::reconcilers::resources::{configmap_mutator, deployment_mutator, service_mutator};
use crate::store::ObjectStore;
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::ConfigMap;
use std::collections::BTreeMap;

pub const APICAST_STAGING: &str = "apicast-staging";
pub const APICAST_PRODUCTION: &str = "apicast-production";
pub const APICAST_ENVIRONMENT_CONFIGMAP: &str = "apicast-environment";

/// Gateway flavour; staging reloads its configuration on every request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApicastEnvironment {
    Staging,
    Production,
}

impl ApicastEnvironment {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Staging => APICAST_STAGING,
            Self::Production => APICAST_PRODUCTION,
        }
    }

    fn component(self) -> ComponentRef {
        match self {
            Self::Staging => ComponentRef::new("apicast", "staging"),
            Self::Production => ComponentRef::new("apicast", "production"),
        }
    }

    fn threescale_environment(self) -> &'static str {
        match self {
            Self::Staging => "staging",
            Self::Production => "production",
        }
    }

    fn configuration_loader(self) -> &'static str {
        match self {
            Self::Staging => "lazy",
            Self::Production => "boot",
        }
    }

    fn cache_ttl(self) -> &'static str {
        match self {
            Self::Staging => "0",
            Self::Production => "300",
        }
    }

    fn replicas(self, apim: &APIManager) -> i32 {
        let spec = apim.spec.apicast.as_ref();
        replicas(match self {
            Self::Staging => spec.and_then(|a| a.staging_replicas),
            Self::Production => spec.and_then(|a| a.production_replicas),
        })
    }
}

#[must_use]
pub fn desired_environment_configmap(apim: &APIManager) -> ConfigMap {
    build_configmap(
        apim,
        APICAST_ENVIRONMENT_CONFIGMAP,
        ApicastEnvironment::Production.component(),
        BTreeMap::from([
            ("APICAST_MANAGEMENT_API".to_string(), "status".to_string()),
            ("OPENSSL_VERIFY".to_string(), "false".to_string()),
            ("APICAST_RESPONSE_CODES".to_string(), "true".to_string()),
        ]),
    )
}

#[must_use]
pub fn desired_apicast_deployment(
    apim: &APIManager,
    environment: ApicastEnvironment,
    image: &str,
) -> Deployment {
    let env = vec![
        env_from_secret(
            "THREESCALE_PORTAL_ENDPOINT",
            SYSTEM_MASTER_APICAST_SECRET,
            MASTER_APICAST_BASE_URL_KEY,
        ),
        env_from_secret(
            "APICAST_ACCESS_TOKEN",
            SYSTEM_MASTER_APICAST_SECRET,
            MASTER_APICAST_ACCESS_TOKEN_KEY,
        ),
        env_value("THREESCALE_DEPLOYMENT_ENV", environment.threescale_environment()),
        env_value("APICAST_CONFIGURATION_LOADER", environment.configuration_loader()),
        env_value("APICAST_CONFIGURATION_CACHE", environment.cache_ttl()),
        env_value("APICAST_EXTENDED_METRICS", "true"),
        env_from_configmap(
            "APICAST_MANAGEMENT_API",
            APICAST_ENVIRONMENT_CONFIGMAP,
            "APICAST_MANAGEMENT_API",
        ),
        env_from_configmap("OPENSSL_VERIFY", APICAST_ENVIRONMENT_CONFIGMAP, "OPENSSL_VERIFY"),
        env_from_configmap(
            "APICAST_RESPONSE_CODES",
            APICAST_ENVIRONMENT_CONFIGMAP,
            "APICAST_RESPONSE_CODES",
        ),
    ];
    let resources = match environment {
        ApicastEnvironment::Staging => {
            resource_requirements(apim, ("50m", "64Mi"), ("100m", "128Mi"))
        }
        ApicastEnvironment::Production => {
            resource_requirements(apim, ("500m", "64Mi"), ("1", "128Mi"))
        }
    };
    let container = build_container(
        environment.name(),
        image,
        &[
            ("proxy", APICAST_GATEWAY_PORT),
            ("management", APICAST_MANAGEMENT_PORT),
            ("metrics", APICAST_METRICS_PORT),
        ],
        env,
        None,
        resources,
    );

    build_deployment(
        apim,
        environment.component(),
        DeploymentParams {
            name: environment.name().to_string(),
            replicas: environment.replicas(apim),
            containers: vec![container],
            ..Default::default()
        },
    )
}

pub struct ApicastReconciler;

#[async_trait]
impl<S: ObjectStore> SubReconciler<S> for ApicastReconciler {
    fn name(&self) -> &'static str {
        "apicast"
    }

    async fn reconcile(&self, base: &LogicReconciler<'_, S>) -> Result<StepOutcome> {
        if let Some(reason) = base
            .require_secret(
                SYSTEM_MASTER_APICAST_SECRET,
                &[MASTER_APICAST_ACCESS_TOKEN_KEY, MASTER_APICAST_BASE_URL_KEY],
            )
            .await?
        {
            return Ok(StepOutcome::Incomplete { reason });
        }

        let apim = base.apim;
        base.reconcile(desired_environment_configmap(apim), configmap_mutator)
            .await?;
        for environment in [ApicastEnvironment::Staging, ApicastEnvironment::Production] {
            base.reconcile(
                desired_apicast_deployment(apim, environment, &base.images.apicast),
                deployment_mutator,
            )
            .await?;
            base.reconcile(
                build_service(
                    apim,
                    environment.name(),
                    environment.component(),
                    environment.name(),
                    &[
                        ("gateway", APICAST_GATEWAY_PORT, APICAST_GATEWAY_PORT),
                        ("management", APICAST_MANAGEMENT_PORT, APICAST_MANAGEMENT_PORT),
                    ],
                ),
                service_mutator,
            )
            .await?;
        }
        Ok(StepOutcome::Complete)
    }
}
