// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for the `APIManager` orchestrator

#[cfg(test)]
mod tests {
    use crate::constants::{REQUEUE_SHORT_SECS, REQUEUE_STEADY_SECS};
    use crate::crd::{APIManager, APIManagerSpec, HighAvailabilitySpec, MonitoringSpec};
    use crate::reconcilers::apimanager::components::monitoring::SCRAPE_CONFIG;
    use crate::labels::OPERATOR_VERSION_ANNOTATION;
    use crate::reconcilers::apimanager::upgrade::OBSOLETE_WILDCARD_ROUTER;
    use crate::reconcilers::apimanager::*;
    use crate::store::memory::MemoryStore;
    use k8s_openapi::api::apps::v1::Deployment;
    use k8s_openapi::api::core::v1::{ConfigMap, ResourceRequirements, Secret, Service};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use std::collections::BTreeMap;
    use std::time::Duration;

    const NS: &str = "3scale";
    const NAME: &str = "example";

    fn seed_apimanager(store: &MemoryStore, spec: APIManagerSpec) {
        let apim = APIManager::new(
            NAME,
            APIManagerSpec {
                wildcard_domain: "apps.example.com".into(),
                ..spec
            },
        );
        store.seed(NS, &apim);
    }

    async fn pass(store: &MemoryStore) -> ReconcileOutcome {
        reconcile_apimanager(store, NS, NAME).await.unwrap()
    }

    /// Run passes until the pipeline completes; returns every outcome seen.
    async fn converge(store: &MemoryStore) -> Vec<ReconcileOutcome> {
        let mut outcomes = Vec::new();
        for _ in 0..10 {
            let outcome = pass(store).await;
            let done = matches!(
                outcome,
                ReconcileOutcome::StatusUpdated | ReconcileOutcome::UpToDate
            );
            outcomes.push(outcome);
            if done {
                break;
            }
        }
        outcomes
    }

    #[tokio::test]
    async fn test_missing_apimanager_is_a_no_op() {
        let store = MemoryStore::new();

        let outcome = pass(&store).await;

        assert_eq!(outcome, ReconcileOutcome::NotFound);
        assert_eq!(outcome.requeue(), None);
        assert_eq!(store.writes().total(), 0);
    }

    #[tokio::test]
    async fn test_fresh_install_converges_in_order() {
        let store = MemoryStore::new();
        seed_apimanager(&store, APIManagerSpec::default());

        let outcomes = converge(&store).await;

        assert_eq!(
            outcomes,
            vec![
                ReconcileOutcome::DefaultsApplied,
                ReconcileOutcome::UpgradeCompleted,
                ReconcileOutcome::StatusUpdated,
            ]
        );
        for name in [
            "backend-listener",
            "system-app",
            "system-mysql",
            "zync",
            "apicast-production",
        ] {
            assert!(store.contains::<Deployment>(NS, name), "{name}");
        }
        assert!(store.contains::<Secret>(NS, "system-master-apicast"));
    }

    #[tokio::test]
    async fn test_converged_pass_is_write_free() {
        let store = MemoryStore::new();
        seed_apimanager(&store, APIManagerSpec::default());
        converge(&store).await;
        let before = store.writes();

        let outcome = pass(&store).await;

        assert_eq!(outcome, ReconcileOutcome::UpToDate);
        assert_eq!(outcome.requeue(), Some(Duration::from_secs(REQUEUE_STEADY_SECS)));
        assert_eq!(store.writes(), before);
    }

    #[tokio::test]
    async fn test_disabled_requirements_survive_server_defaulting() {
        let store = MemoryStore::new();
        seed_apimanager(
            &store,
            APIManagerSpec {
                resource_requirements_enabled: Some(false),
                ..Default::default()
            },
        );
        converge(&store).await;

        // The API server reports `resources: {}` for containers created without any.
        let mut listener: Deployment = store.object(NS, "backend-listener").unwrap();
        let pod = listener.spec.as_mut().unwrap().template.spec.as_mut().unwrap();
        assert!(pod.containers[0].resources.is_none());
        pod.containers[0].resources = Some(ResourceRequirements::default());
        store.seed(NS, &listener);
        let before = store.writes();

        let outcome = pass(&store).await;

        assert_eq!(outcome, ReconcileOutcome::UpToDate);
        assert_eq!(store.writes(), before);
    }

    #[tokio::test]
    async fn test_disabling_monitoring_removes_its_objects() {
        let store = MemoryStore::new();
        seed_apimanager(
            &store,
            APIManagerSpec {
                monitoring: Some(MonitoringSpec { enabled: true }),
                ..Default::default()
            },
        );
        converge(&store).await;
        assert!(store.contains::<Service>(NS, "backend-listener-metrics"));
        assert!(store.contains::<ConfigMap>(NS, SCRAPE_CONFIG));

        let mut apim: APIManager = store.object(NS, NAME).unwrap();
        apim.spec.monitoring = Some(MonitoringSpec { enabled: false });
        store.seed(NS, &apim);
        converge(&store).await;

        for service in [
            "backend-listener-metrics",
            "apicast-production-metrics",
            "system-app-metrics",
        ] {
            assert!(!store.contains::<Service>(NS, service), "{service} left behind");
        }
        assert!(!store.contains::<ConfigMap>(NS, SCRAPE_CONFIG));
        assert!(store.contains::<Service>(NS, "backend-listener"));

        let before = store.writes();
        assert_eq!(pass(&store).await, ReconcileOutcome::UpToDate);
        assert_eq!(store.writes(), before);
    }

    #[tokio::test]
    async fn test_defaults_pass_writes_nothing_else() {
        let store = MemoryStore::new();
        seed_apimanager(&store, APIManagerSpec::default());

        assert_eq!(pass(&store).await, ReconcileOutcome::DefaultsApplied);

        let writes = store.writes();
        assert_eq!(writes.updates, 1);
        assert_eq!(writes.total(), 1);
    }

    #[tokio::test]
    async fn test_upgrade_blocks_pipeline() {
        let store = MemoryStore::new();
        let mut apim = APIManager::new(
            NAME,
            APIManagerSpec {
                wildcard_domain: "apps.example.com".into(),
                ..Default::default()
            },
        );
        apim.set_defaults();
        apim.metadata.annotations = Some(BTreeMap::from([(
            OPERATOR_VERSION_ANNOTATION.to_string(),
            "0.7.0".to_string(),
        )]));
        store.seed(NS, &apim);
        store.seed(
            NS,
            &Service {
                metadata: ObjectMeta {
                    name: Some(OBSOLETE_WILDCARD_ROUTER.into()),
                    ..Default::default()
                },
                ..Default::default()
            },
        );

        let outcome = pass(&store).await;

        assert_eq!(outcome, ReconcileOutcome::Upgrading);
        assert_eq!(outcome.requeue(), Some(Duration::from_secs(REQUEUE_SHORT_SECS)));
        assert!(!store.contains::<Deployment>(NS, "backend-listener"));
        assert_eq!(pass(&store).await, ReconcileOutcome::UpgradeCompleted);
    }

    #[tokio::test]
    async fn test_unsupported_upgrade_is_an_error() {
        let store = MemoryStore::new();
        let mut apim = APIManager::new(NAME, APIManagerSpec::default());
        apim.set_defaults();
        apim.metadata.annotations = Some(BTreeMap::from([(
            OPERATOR_VERSION_ANNOTATION.to_string(),
            "0.6.0".to_string(),
        )]));
        store.seed(NS, &apim);

        let err = reconcile_apimanager(&store, NS, NAME).await.unwrap_err();

        assert!(is_terminal(&err));
        assert_eq!(store.writes().total(), 0);
    }

    #[tokio::test]
    async fn test_high_availability_waits_for_user_secrets() {
        let store = MemoryStore::new();
        seed_apimanager(
            &store,
            APIManagerSpec {
                high_availability: Some(HighAvailabilitySpec { enabled: true }),
                ..Default::default()
            },
        );

        let outcomes = converge(&store).await;

        assert_eq!(
            outcomes.last(),
            Some(&ReconcileOutcome::PipelineIncomplete {
                step: "high-availability",
                reason: "Secret backend-redis not found".into(),
            })
        );
        assert!(!store.contains::<Deployment>(NS, "backend-redis"));
        assert!(!store.contains::<Deployment>(NS, "backend-listener"));
    }

    #[tokio::test]
    async fn test_status_conflict_requeues() {
        let store = MemoryStore::new();
        seed_apimanager(&store, APIManagerSpec::default());
        pass(&store).await;
        pass(&store).await;
        store.fail_next_status_update_with_conflict();

        let outcome = pass(&store).await;

        assert_eq!(outcome, ReconcileOutcome::StatusConflict);
        assert!(outcome.requeue().is_some());
        assert_eq!(pass(&store).await, ReconcileOutcome::StatusUpdated);
    }
}
