// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Kubernetes resource builders for `APIManager` components.
//!
//! Every function here is pure: it turns an `APIManager` plus a few component
//! parameters into a desired object. Component steps compose these builders and hand
//! the result to the reconcile primitive.
//!
//! All objects share the same conventions:
//! - labels `app`, `threescale_component`, `threescale_component_element` plus the
//!   standard `app.kubernetes.io/*` set
//! - a single controller owner reference to the `APIManager`
//! - pods are selected with `deployment: <name>`

use crate::constants::{
    APPS_API_GROUP_VERSION, DEFAULT_APICAST_IMAGE, DEFAULT_BACKEND_IMAGE,
    DEFAULT_BACKEND_REDIS_IMAGE, DEFAULT_SYSTEM_IMAGE, DEFAULT_SYSTEM_MEMCACHED_IMAGE,
    DEFAULT_SYSTEM_MYSQL_IMAGE, DEFAULT_SYSTEM_POSTGRESQL_IMAGE, DEFAULT_SYSTEM_REDIS_IMAGE,
    DEFAULT_ZYNC_IMAGE, DEFAULT_ZYNC_POSTGRESQL_IMAGE, KIND_APIMANAGER, SERVICE_ACCOUNT_NAME,
};
use crate::crd::APIManager;
use crate::labels::{
    APP_LABEL, DEPLOYMENT_SELECTOR, K8S_COMPONENT, K8S_MANAGED_BY, K8S_NAME, K8S_PART_OF,
    MANAGED_BY_APIMANAGER, PART_OF_THREESCALE, THREESCALE_COMPONENT, THREESCALE_COMPONENT_ELEMENT,
};
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec, DeploymentStrategy};
use k8s_openapi::api::core::v1::{
    ConfigMap, ConfigMapKeySelector, Container, ContainerPort, EnvVar, EnvVarSource,
    PersistentVolumeClaim, PersistentVolumeClaimSpec, PersistentVolumeClaimVolumeSource, PodSpec,
    PodTemplateSpec, ResourceRequirements, Secret, SecretKeySelector, Service, ServicePort,
    ServiceSpec, Volume, VolumeMount, VolumeResourceRequirements,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta, OwnerReference};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::ResourceExt;
use rand::distr::{Alphanumeric, SampleString};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use tracing::debug;

/// Component and element a managed object belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ComponentRef {
    pub component: &'static str,
    pub element: &'static str,
}

impl ComponentRef {
    #[must_use]
    pub const fn new(component: &'static str, element: &'static str) -> Self {
        Self { component, element }
    }
}

/// Builds the standard label set for an object of `component`.
#[must_use]
pub fn build_labels(apim: &APIManager, component: ComponentRef) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    labels.insert(APP_LABEL.into(), apim.app_label().into());
    labels.insert(THREESCALE_COMPONENT.into(), component.component.into());
    labels.insert(THREESCALE_COMPONENT_ELEMENT.into(), component.element.into());
    labels.insert(K8S_NAME.into(), component.element.into());
    labels.insert(K8S_COMPONENT.into(), component.component.into());
    labels.insert(K8S_MANAGED_BY.into(), MANAGED_BY_APIMANAGER.into());
    labels.insert(K8S_PART_OF.into(), PART_OF_THREESCALE.into());
    labels
}

/// Pod selector for the Deployment called `name`.
#[must_use]
pub fn build_selector_labels(name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([(DEPLOYMENT_SELECTOR.to_string(), name.to_string())])
}

/// A single controller owner reference pointing to the `APIManager`.
#[must_use]
pub fn build_owner_references(apim: &APIManager) -> Vec<OwnerReference> {
    vec![OwnerReference {
        api_version: APPS_API_GROUP_VERSION.to_string(),
        kind: KIND_APIMANAGER.to_string(),
        name: apim.name_any(),
        uid: apim.metadata.uid.clone().unwrap_or_default(),
        controller: Some(true),
        block_owner_deletion: Some(true),
    }]
}

/// Metadata shared by every object owned by `apim`.
#[must_use]
pub fn build_object_meta(apim: &APIManager, name: &str, component: ComponentRef) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: apim.namespace(),
        labels: Some(build_labels(apim, component)),
        owner_references: Some(build_owner_references(apim)),
        ..Default::default()
    }
}

// ============================================================================
// Images
// ============================================================================

/// Images resolved from spec overrides and compiled-in defaults.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Images {
    pub apicast: String,
    pub backend: String,
    pub backend_redis: String,
    pub system: String,
    pub system_redis: String,
    pub system_memcached: String,
    pub system_mysql: String,
    pub system_postgresql: String,
    pub zync: String,
    pub zync_postgresql: String,
}

/// Resolve every image used by the platform.
#[must_use]
pub fn resolve_images(apim: &APIManager) -> Images {
    let spec = &apim.spec;
    let pick = |value: Option<&String>, default: &str| {
        value.cloned().unwrap_or_else(|| default.to_string())
    };

    let system = spec.system.as_ref();
    let database = system.and_then(|s| s.database.as_ref());
    Images {
        apicast: pick(spec.apicast.as_ref().and_then(|a| a.image.as_ref()), DEFAULT_APICAST_IMAGE),
        backend: pick(spec.backend.as_ref().and_then(|b| b.image.as_ref()), DEFAULT_BACKEND_IMAGE),
        backend_redis: pick(
            spec.backend.as_ref().and_then(|b| b.redis_image.as_ref()),
            DEFAULT_BACKEND_REDIS_IMAGE,
        ),
        system: pick(system.and_then(|s| s.image.as_ref()), DEFAULT_SYSTEM_IMAGE),
        system_redis: pick(system.and_then(|s| s.redis_image.as_ref()), DEFAULT_SYSTEM_REDIS_IMAGE),
        system_memcached: pick(
            system.and_then(|s| s.memcached_image.as_ref()),
            DEFAULT_SYSTEM_MEMCACHED_IMAGE,
        ),
        system_mysql: pick(
            database.and_then(|d| d.mysql.as_ref()).and_then(|m| m.image.as_ref()),
            DEFAULT_SYSTEM_MYSQL_IMAGE,
        ),
        system_postgresql: pick(
            database.and_then(|d| d.postgresql.as_ref()).and_then(|p| p.image.as_ref()),
            DEFAULT_SYSTEM_POSTGRESQL_IMAGE,
        ),
        zync: pick(spec.zync.as_ref().and_then(|z| z.image.as_ref()), DEFAULT_ZYNC_IMAGE),
        zync_postgresql: pick(
            spec.zync.as_ref().and_then(|z| z.postgresql_image.as_ref()),
            DEFAULT_ZYNC_POSTGRESQL_IMAGE,
        ),
    }
}

// ============================================================================
// Containers and environment
// ============================================================================

#[must_use]
pub fn env_value(name: &str, value: impl Into<String>) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: Some(value.into()),
        value_from: None,
    }
}

#[must_use]
pub fn env_from_secret(name: &str, secret: &str, key: &str) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: None,
        value_from: Some(EnvVarSource {
            secret_key_ref: Some(SecretKeySelector {
                name: secret.to_string(),
                key: key.to_string(),
                optional: None,
            }),
            ..Default::default()
        }),
    }
}

#[must_use]
pub fn env_from_configmap(name: &str, configmap: &str, key: &str) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: None,
        value_from: Some(EnvVarSource {
            config_map_key_ref: Some(ConfigMapKeySelector {
                name: configmap.to_string(),
                key: key.to_string(),
                optional: None,
            }),
            ..Default::default()
        }),
    }
}

/// CPU/memory requests and limits, or nothing when the `APIManager` disables them.
#[must_use]
pub fn resource_requirements(
    apim: &APIManager,
    requests: (&str, &str),
    limits: (&str, &str),
) -> Option<ResourceRequirements> {
    if !apim.resource_requirements_enabled() {
        return None;
    }
    let quantities = |(cpu, memory): (&str, &str)| {
        BTreeMap::from([
            ("cpu".to_string(), Quantity(cpu.to_string())),
            ("memory".to_string(), Quantity(memory.to_string())),
        ])
    };
    Some(ResourceRequirements {
        requests: Some(quantities(requests)),
        limits: Some(quantities(limits)),
        ..Default::default()
    })
}

/// Build a container listening on the given named TCP ports.
#[must_use]
pub fn build_container(
    name: &str,
    image: &str,
    ports: &[(&str, i32)],
    env: Vec<EnvVar>,
    args: Option<Vec<String>>,
    resources: Option<ResourceRequirements>,
) -> Container {
    let ports = (!ports.is_empty()).then(|| {
        ports
            .iter()
            .map(|(port_name, port)| ContainerPort {
                name: Some((*port_name).to_string()),
                container_port: *port,
                protocol: Some("TCP".into()),
                ..Default::default()
            })
            .collect()
    });

    Container {
        name: name.to_string(),
        image: Some(image.to_string()),
        image_pull_policy: Some("IfNotPresent".into()),
        args,
        env: (!env.is_empty()).then_some(env),
        ports,
        resources,
        ..Default::default()
    }
}

// ============================================================================
// Workloads
// ============================================================================

/// Everything that varies between component Deployments.
#[derive(Clone, Debug, Default)]
pub struct DeploymentParams {
    pub name: String,
    pub replicas: i32,
    pub containers: Vec<Container>,
    pub volumes: Vec<Volume>,
    pub template_annotations: BTreeMap<String, String>,
    /// Stateful components use `Recreate` so two pods never share a volume.
    pub recreate: bool,
}

#[must_use]
pub fn build_deployment(
    apim: &APIManager,
    component: ComponentRef,
    params: DeploymentParams,
) -> Deployment {
    debug!(
        name = %params.name,
        component = %component.component,
        replicas = params.replicas,
        "Building Deployment for APIManager"
    );

    let selector = build_selector_labels(&params.name);
    let mut pod_labels = build_labels(apim, component);
    pod_labels.extend(selector.clone());

    Deployment {
        metadata: build_object_meta(apim, &params.name, component),
        spec: Some(DeploymentSpec {
            replicas: Some(params.replicas),
            selector: LabelSelector {
                match_labels: Some(selector),
                ..Default::default()
            },
            strategy: params.recreate.then(|| DeploymentStrategy {
                type_: Some("Recreate".into()),
                ..Default::default()
            }),
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(pod_labels),
                    annotations: (!params.template_annotations.is_empty())
                        .then_some(params.template_annotations),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    service_account_name: Some(SERVICE_ACCOUNT_NAME.into()),
                    containers: params.containers,
                    volumes: (!params.volumes.is_empty()).then_some(params.volumes),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// `ClusterIP` Service in front of Deployment `target`. Ports are `(name, port, target)`.
#[must_use]
pub fn build_service(
    apim: &APIManager,
    name: &str,
    component: ComponentRef,
    target: &str,
    ports: &[(&str, i32, i32)],
) -> Service {
    Service {
        metadata: build_object_meta(apim, name, component),
        spec: Some(ServiceSpec {
            selector: Some(build_selector_labels(target)),
            ports: Some(
                ports
                    .iter()
                    .map(|(port_name, port, target_port)| ServicePort {
                        name: Some((*port_name).to_string()),
                        port: *port,
                        target_port: Some(IntOrString::Int(*target_port)),
                        protocol: Some("TCP".into()),
                        ..Default::default()
                    })
                    .collect(),
            ),
            type_: Some("ClusterIP".into()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[must_use]
pub fn build_configmap(
    apim: &APIManager,
    name: &str,
    component: ComponentRef,
    data: BTreeMap<String, String>,
) -> ConfigMap {
    ConfigMap {
        metadata: build_object_meta(apim, name, component),
        data: Some(data),
        ..Default::default()
    }
}

/// Opaque Secret written through `stringData`.
#[must_use]
pub fn build_secret(
    apim: &APIManager,
    name: &str,
    component: ComponentRef,
    string_data: BTreeMap<String, String>,
) -> Secret {
    Secret {
        metadata: build_object_meta(apim, name, component),
        string_data: Some(string_data),
        type_: Some("Opaque".into()),
        ..Default::default()
    }
}

#[must_use]
pub fn build_pvc(
    apim: &APIManager,
    name: &str,
    component: ComponentRef,
    access_mode: &str,
    size: &str,
) -> PersistentVolumeClaim {
    PersistentVolumeClaim {
        metadata: build_object_meta(apim, name, component),
        spec: Some(PersistentVolumeClaimSpec {
            access_modes: Some(vec![access_mode.to_string()]),
            resources: Some(VolumeResourceRequirements {
                requests: Some(BTreeMap::from([(
                    "storage".to_string(),
                    Quantity(size.to_string()),
                )])),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Pod volume backed by the claim `claim`.
#[must_use]
pub fn pvc_volume(name: &str, claim: &str) -> Volume {
    Volume {
        name: name.to_string(),
        persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
            claim_name: claim.to_string(),
            read_only: None,
        }),
        ..Default::default()
    }
}

#[must_use]
pub fn volume_mount(name: &str, path: &str) -> VolumeMount {
    VolumeMount {
        name: name.to_string(),
        mount_path: path.to_string(),
        ..Default::default()
    }
}

// ============================================================================
// Generated values
// ============================================================================

/// Random alphanumeric string used for generated credentials.
#[must_use]
pub fn random_alphanumeric(len: usize) -> String {
    Alphanumeric.sample_string(&mut rand::rng(), len)
}

/// Stable SHA-256 hex digest of a configuration map.
///
/// Used as a pod template annotation so pods restart when their configuration changes.
#[must_use]
pub fn config_hash(data: &BTreeMap<String, String>) -> String {
    let mut hasher = Sha256::new();
    for (key, value) in data {
        hasher.update(key.as_bytes());
        hasher.update([0u8]);
        hasher.update(value.as_bytes());
        hasher.update([0u8]);
    }
    format!("{:x}", hasher.finalize())
}

/// Public host of a route under the `APIManager` wildcard domain.
#[must_use]
pub fn public_host(apim: &APIManager, prefix: &str) -> String {
    format!("{prefix}.{}", apim.spec.wildcard_domain)
}

#[cfg(test)]
#[path = "apimanager_resources_tests.rs"]
mod apimanager_resources_tests;
