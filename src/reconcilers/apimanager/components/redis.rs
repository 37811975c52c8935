// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Internal Redis instances for backend and system.
//!
//! Skipped entirely when external databases are configured; the
//! high-availability step then expects the same Secrets to be user supplied.

use crate::apimanager_resources::{
    build_configmap, build_container, build_deployment, build_pvc, build_secret, build_service,
    pvc_volume, resource_requirements, volume_mount, ComponentRef, DeploymentParams,
};
use crate::constants::{REDIS_PORT, REDIS_STORAGE_SIZE};
use crate::crd::APIManager;
use crate::errors::Result;
use crate::reconcilers::apimanager::pipeline::{LogicReconciler, StepOutcome, SubReconciler};
use crate::reconcilers::resources::{
    configmap_mutator, deployment_mutator, pvc_mutator, secret_mutator, service_mutator,
};
use crate::store::ObjectStore;
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, ConfigMapVolumeSource, Secret, Volume};
use std::collections::BTreeMap;

pub const BACKEND_REDIS: &str = "backend-redis";
pub const SYSTEM_REDIS: &str = "system-redis";
pub const REDIS_CONFIG: &str = "redis-config";

pub const BACKEND_REDIS_STORAGE_URL_KEY: &str = "REDIS_STORAGE_URL";
pub const BACKEND_REDIS_QUEUES_URL_KEY: &str = "REDIS_QUEUES_URL";
pub const SYSTEM_REDIS_URL_KEY: &str = "URL";

const REDIS_CONF: &str = "protected-mode no\n\nport 6379\n\ntimeout 0\ntcp-keepalive 300\n\ndaemonize no\nsupervised no\n\nloglevel notice\n\ndatabases 16\n\nsave 900 1\nsave 300 10\nsave 60 10000\n\nstop-writes-on-bgsave-error yes\n\nrdbcompression yes\nrdbchecksum yes\n\ndbfilename dump.rdb\n\nslave-serve-stale-data yes\nslave-read-only yes\n\nrepl-diskless-sync no\nrepl-disable-tcp-nodelay no\n\nappendonly yes\nappendfilename \"appendonly.aof\"\nappendfsync everysec\nno-appendfsync-on-rewrite no\nauto-aof-rewrite-percentage 100\nauto-aof-rewrite-min-size 64mb\naof-load-truncated yes\n\nlua-time-limit 5000\n\nactiverehashing no\n\naof-rewrite-incremental-fsync yes\ndir /var/lib/redis/data\n";

/// Which Redis instance is being built.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RedisInstance {
    Backend,
    System,
}

impl RedisInstance {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Backend => BACKEND_REDIS,
            Self::System => SYSTEM_REDIS,
        }
    }

    fn component(self) -> ComponentRef {
        match self {
            Self::Backend => ComponentRef::new("backend", "redis"),
            Self::System => ComponentRef::new("system", "redis"),
        }
    }

    fn storage_claim(self) -> String {
        format!("{}-storage", self.name())
    }
}

/// Connection Secret consumed by the components talking to this instance.
#[must_use]
pub fn desired_redis_secret(apim: &APIManager, instance: RedisInstance) -> Secret {
    let host = format!("redis://{}:{REDIS_PORT}", instance.name());
    let data = match instance {
        RedisInstance::Backend => BTreeMap::from([
            (BACKEND_REDIS_STORAGE_URL_KEY.to_string(), format!("{host}/0")),
            (BACKEND_REDIS_QUEUES_URL_KEY.to_string(), format!("{host}/1")),
        ]),
        RedisInstance::System => {
            BTreeMap::from([(SYSTEM_REDIS_URL_KEY.to_string(), format!("{host}/1"))])
        }
    };
    build_secret(apim, instance.name(), instance.component(), data)
}

#[must_use]
pub fn desired_redis_configmap(apim: &APIManager) -> ConfigMap {
    build_configmap(
        apim,
        REDIS_CONFIG,
        ComponentRef::new("system", "redis"),
        BTreeMap::from([("redis.conf".to_string(), REDIS_CONF.to_string())]),
    )
}

#[must_use]
pub fn desired_redis_deployment(apim: &APIManager, instance: RedisInstance, image: &str) -> Deployment {
    let mut container = build_container(
        instance.name(),
        image,
        &[("redis", REDIS_PORT)],
        vec![],
        Some(vec![
            "/opt/rh/rh-redis32/root/usr/bin/redis-server".to_string(),
            "/etc/redis.d/redis.conf".to_string(),
            "--daemonize".to_string(),
            "no".to_string(),
        ]),
        resource_requirements(apim, ("150m", "256Mi"), ("2", "32Gi")),
    );
    container.volume_mounts = Some(vec![
        volume_mount("redis-storage", "/var/lib/redis/data"),
        volume_mount("redis-config", "/etc/redis.d/"),
    ]);

    build_deployment(
        apim,
        instance.component(),
        DeploymentParams {
            name: instance.name().to_string(),
            replicas: 1,
            containers: vec![container],
            volumes: vec![
                pvc_volume("redis-storage", &instance.storage_claim()),
                Volume {
                    name: "redis-config".into(),
                    config_map: Some(ConfigMapVolumeSource {
                        name: REDIS_CONFIG.into(),
                        ..Default::default()
                    }),
                    ..Default::default()
                },
            ],
            recreate: true,
            ..Default::default()
        },
    )
}

pub struct RedisReconciler;

#[async_trait]
impl<S: ObjectStore> SubReconciler<S> for RedisReconciler {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn reconcile(&self, base: &LogicReconciler<'_, S>) -> Result<StepOutcome> {
        let apim = base.apim;
        base.reconcile(desired_redis_configmap(apim), configmap_mutator)
            .await?;

        for (instance, image) in [
            (RedisInstance::Backend, base.images.backend_redis.as_str()),
            (RedisInstance::System, base.images.system_redis.as_str()),
        ] {
            let component = instance.component();
            base.reconcile(desired_redis_secret(apim, instance), secret_mutator)
                .await?;
            base.reconcile(
                build_pvc(
                    apim,
                    &instance.storage_claim(),
                    component,
                    "ReadWriteOnce",
                    REDIS_STORAGE_SIZE,
                ),
                pvc_mutator,
            )
            .await?;
            base.reconcile(
                desired_redis_deployment(apim, instance, image),
                deployment_mutator,
            )
            .await?;
            base.reconcile(
                build_service(
                    apim,
                    instance.name(),
                    component,
                    instance.name(),
                    &[("redis", REDIS_PORT, REDIS_PORT)],
                ),
                service_mutator,
            )
            .await?;
        }
        Ok(StepOutcome::Complete)
    }
}
