// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `resources.rs`

#[cfg(test)]
mod tests {
    use crate::metrics;
    use crate::reconcilers::resources::*;
    use crate::store::memory::MemoryStore;
    use crate::store::ObjectStore;
    use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
    use k8s_openapi::api::core::v1::{
        ConfigMap, Container, LocalObjectReference, PersistentVolumeClaim, PodSpec,
        PodTemplateSpec, ResourceRequirements, Secret, Service, ServiceAccount, ServicePort, ServiceSpec,
    };
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
    use k8s_openapi::ByteString;
    use std::collections::BTreeMap;

    const TEST_NAMESPACE: &str = "test-namespace";

    fn meta(name: &str) -> ObjectMeta {
        ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(TEST_NAMESPACE.to_string()),
            labels: Some(BTreeMap::from([("app".to_string(), "3scale".to_string())])),
            owner_references: Some(vec![OwnerReference {
                api_version: "apps.3scale.net/v1alpha1".into(),
                kind: "APIManager".into(),
                name: "example".into(),
                uid: "owner-uid".into(),
                controller: Some(true),
                block_owner_deletion: Some(true),
            }]),
            ..Default::default()
        }
    }

    fn configmap(name: &str, value: &str) -> ConfigMap {
        ConfigMap {
            metadata: meta(name),
            data: Some(BTreeMap::from([("key".to_string(), value.to_string())])),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_creates_missing_object() {
        let store = MemoryStore::new();

        let change = reconcile_resource(
            &store,
            TEST_NAMESPACE,
            configmap("cm", "v1"),
            configmap_mutator,
        )
        .await
        .unwrap();

        assert_eq!(change, ResourceChange::Created);
        assert_eq!(store.writes().creates, 1);
        assert!(store.contains::<ConfigMap>(TEST_NAMESPACE, "cm"));
    }

    #[tokio::test]
    async fn test_delete_resource_counts_only_real_deletions() {
        let store = MemoryStore::new();
        store.seed(
            TEST_NAMESPACE,
            &PersistentVolumeClaim {
                metadata: meta("old-storage"),
                ..Default::default()
            },
        );
        let deleted_total = || {
            metrics::RESOURCES_DELETED_TOTAL
                .with_label_values(&["PersistentVolumeClaim"])
                .get()
        };
        let before = deleted_total();

        let first =
            delete_resource::<PersistentVolumeClaim, _>(&store, TEST_NAMESPACE, "old-storage")
                .await
                .unwrap();
        let second =
            delete_resource::<PersistentVolumeClaim, _>(&store, TEST_NAMESPACE, "old-storage")
                .await
                .unwrap();

        assert!(first);
        assert!(!second);
        assert!(!store.contains::<PersistentVolumeClaim>(TEST_NAMESPACE, "old-storage"));
        assert_eq!(store.writes().deletes, 1);
        assert!(deleted_total() >= before + 1.0);
    }

    #[tokio::test]
    async fn test_second_pass_is_write_free() {
        let store = MemoryStore::new();
        reconcile_resource(&store, TEST_NAMESPACE, configmap("cm", "v1"), configmap_mutator)
            .await
            .unwrap();
        let before = store.writes();

        let change =
            reconcile_resource(&store, TEST_NAMESPACE, configmap("cm", "v1"), configmap_mutator)
                .await
                .unwrap();

        assert_eq!(change, ResourceChange::Unchanged);
        assert_eq!(store.writes(), before);
    }

    #[tokio::test]
    async fn test_changed_data_is_written_back() {
        let store = MemoryStore::new();
        reconcile_resource(&store, TEST_NAMESPACE, configmap("cm", "v1"), configmap_mutator)
            .await
            .unwrap();

        let change =
            reconcile_resource(&store, TEST_NAMESPACE, configmap("cm", "v2"), configmap_mutator)
                .await
                .unwrap();

        assert_eq!(change, ResourceChange::Updated);
        let stored: ConfigMap = store.object(TEST_NAMESPACE, "cm").unwrap();
        assert_eq!(stored.data.unwrap()["key"], "v2");
    }

    #[tokio::test]
    async fn test_stale_replace_is_a_conflict() {
        let store = MemoryStore::new();
        let created = store
            .create(TEST_NAMESPACE, &configmap("cm", "v1"))
            .await
            .unwrap();
        store
            .replace(TEST_NAMESPACE, &created)
            .await
            .unwrap();

        let err = store.replace(TEST_NAMESPACE, &created).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[test]
    fn test_object_meta_keeps_foreign_labels() {
        let mut existing = meta("cm");
        existing
            .labels
            .as_mut()
            .unwrap()
            .insert("team".into(), "payments".into());
        let mut desired = meta("cm");
        desired
            .labels
            .as_mut()
            .unwrap()
            .insert("threescale_component".into(), "system".into());

        assert!(ensure_object_meta(&mut existing, &desired));
        let labels = existing.labels.unwrap();
        assert_eq!(labels["team"], "payments");
        assert_eq!(labels["threescale_component"], "system");
    }

    #[test]
    fn test_owner_reference_added_once() {
        let mut existing = ObjectMeta {
            name: Some("cm".into()),
            ..Default::default()
        };
        let desired = meta("cm");

        assert!(ensure_owner_reference(&mut existing, &desired));
        assert!(!ensure_owner_reference(&mut existing, &desired));
        assert_eq!(existing.owner_references.unwrap().len(), 1);
    }

    #[test]
    fn test_secret_mutator_never_rewrites_values() {
        let mut existing = Secret {
            metadata: meta("system-seed"),
            data: Some(BTreeMap::from([(
                "ADMIN_PASSWORD".to_string(),
                ByteString(b"kept".to_vec()),
            )])),
            ..Default::default()
        };
        let desired = Secret {
            metadata: meta("system-seed"),
            string_data: Some(BTreeMap::from([
                ("ADMIN_PASSWORD".to_string(), "regenerated".to_string()),
                ("ADMIN_USER".to_string(), "admin".to_string()),
            ])),
            ..Default::default()
        };

        assert!(secret_mutator(&mut existing, &desired));
        assert_eq!(
            existing.data.as_ref().unwrap()["ADMIN_PASSWORD"],
            ByteString(b"kept".to_vec())
        );
        let added = existing.string_data.as_ref().unwrap();
        assert_eq!(added.len(), 1);
        assert_eq!(added["ADMIN_USER"], "admin");

        assert!(!secret_mutator(&mut existing, &desired));
    }

    #[test]
    fn test_service_mutator_keeps_cluster_ip() {
        let port = |p: i32| ServicePort {
            name: Some("http".into()),
            port: p,
            protocol: Some("TCP".into()),
            ..Default::default()
        };
        let mut existing = Service {
            metadata: meta("svc"),
            spec: Some(ServiceSpec {
                cluster_ip: Some("10.0.0.12".into()),
                ports: Some(vec![port(3000)]),
                ..Default::default()
            }),
            ..Default::default()
        };
        let desired = Service {
            metadata: meta("svc"),
            spec: Some(ServiceSpec {
                ports: Some(vec![port(3001)]),
                ..Default::default()
            }),
            ..Default::default()
        };

        assert!(service_mutator(&mut existing, &desired));
        let spec = existing.spec.unwrap();
        assert_eq!(spec.cluster_ip.as_deref(), Some("10.0.0.12"));
        assert_eq!(spec.ports.unwrap()[0].port, 3001);
    }

    fn deployment(image: &str, replicas: i32, containers: Vec<&str>) -> Deployment {
        Deployment {
            metadata: meta("backend-listener"),
            spec: Some(DeploymentSpec {
                replicas: Some(replicas),
                template: PodTemplateSpec {
                    metadata: None,
                    spec: Some(PodSpec {
                        containers: containers
                            .into_iter()
                            .map(|name| Container {
                                name: name.to_string(),
                                image: Some(image.to_string()),
                                ..Default::default()
                            })
                            .collect(),
                        ..Default::default()
                    }),
                },
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_deployment_mutator_converges_managed_fields() {
        let mut existing = deployment("old:1", 1, vec!["listener", "sidecar"]);
        let desired = deployment("new:2", 3, vec!["listener"]);

        assert!(deployment_mutator(&mut existing, &desired));
        let spec = existing.spec.as_ref().unwrap();
        assert_eq!(spec.replicas, Some(3));
        let containers = &spec.template.spec.as_ref().unwrap().containers;
        assert_eq!(containers.len(), 2);
        assert_eq!(containers[0].image.as_deref(), Some("new:2"));
        assert_eq!(containers[1].name, "sidecar");
        assert_eq!(containers[1].image.as_deref(), Some("old:1"));

        assert!(!deployment_mutator(&mut existing, &desired));
    }

    #[test]
    fn test_deployment_mutator_treats_empty_resources_as_unset() {
        let mut existing = deployment("img:1", 1, vec!["listener"]);
        existing.spec.as_mut().unwrap().template.spec.as_mut().unwrap().containers[0]
            .resources = Some(ResourceRequirements::default());
        let desired = deployment("img:1", 1, vec!["listener"]);

        assert!(!deployment_mutator(&mut existing, &desired));
    }

    #[test]
    fn test_deployment_mutator_clears_dropped_requirements() {
        let mut existing = deployment("img:1", 1, vec!["listener"]);
        existing.spec.as_mut().unwrap().template.spec.as_mut().unwrap().containers[0]
            .resources = Some(ResourceRequirements {
            limits: Some(BTreeMap::from([(
                "cpu".to_string(),
                k8s_openapi::apimachinery::pkg::api::resource::Quantity("1".into()),
            )])),
            ..Default::default()
        });
        let desired = deployment("img:1", 1, vec!["listener"]);

        assert!(deployment_mutator(&mut existing, &desired));
        let container = &existing.spec.unwrap().template.spec.unwrap().containers[0];
        assert!(container.resources.is_none());
    }

    #[test]
    fn test_service_account_keeps_injected_pull_secrets() {
        let pull = |name: &str| LocalObjectReference {
            name: name.to_string(),
        };
        let mut existing = ServiceAccount {
            metadata: meta("amp"),
            image_pull_secrets: Some(vec![pull("amp-dockercfg-x7k2")]),
            ..Default::default()
        };
        let desired = ServiceAccount {
            metadata: meta("amp"),
            image_pull_secrets: Some(vec![pull("threescale-registry-auth")]),
            ..Default::default()
        };

        assert!(service_account_mutator(&mut existing, &desired));
        assert_eq!(existing.image_pull_secrets.as_ref().unwrap().len(), 2);
        assert!(!service_account_mutator(&mut existing, &desired));
    }
}
