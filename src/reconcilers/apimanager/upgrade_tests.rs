// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `upgrade.rs`

#[cfg(test)]
mod tests {
    use crate::constants::{OPERATOR_VERSION, THREESCALE_RELEASE};
    use crate::crd::{APIManager, APIManagerSpec};
    use crate::labels::{OPERATOR_VERSION_ANNOTATION, THREESCALE_VERSION_ANNOTATION};
    use crate::reconcilers::apimanager::upgrade::*;
    use crate::store::memory::MemoryStore;
    use k8s_openapi::api::apps::v1::Deployment;
    use k8s_openapi::api::core::v1::Service;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use kube::ResourceExt;
    use std::collections::BTreeMap;

    const NS: &str = "3scale";

    fn apimanager(operator_version: Option<&str>) -> APIManager {
        let mut apim = APIManager::new("example", APIManagerSpec::default());
        apim.metadata.namespace = Some(NS.into());
        if let Some(version) = operator_version {
            apim.metadata.annotations = Some(BTreeMap::from([
                (OPERATOR_VERSION_ANNOTATION.to_string(), version.to_string()),
                (THREESCALE_VERSION_ANNOTATION.to_string(), "2.7".to_string()),
            ]));
        }
        apim
    }

    fn seeded(store: &MemoryStore, operator_version: Option<&str>) -> APIManager {
        store.seed(NS, &apimanager(operator_version));
        store.object(NS, "example").unwrap()
    }

    fn wildcard_router_meta() -> ObjectMeta {
        ObjectMeta {
            name: Some(OBSOLETE_WILDCARD_ROUTER.into()),
            namespace: Some(NS.into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_current_version_is_a_no_op() {
        let store = MemoryStore::new();
        let mut apim = apimanager(Some(OPERATOR_VERSION));
        apim.annotations_mut().insert(
            THREESCALE_VERSION_ANNOTATION.to_string(),
            THREESCALE_RELEASE.to_string(),
        );
        store.seed(NS, &apim);

        let state = reconcile_upgrade(&store, &apim).await.unwrap();

        assert_eq!(state, UpgradeState::Current);
        assert_eq!(store.writes().total(), 0);
    }

    #[tokio::test]
    async fn test_fresh_install_stamps_annotations() {
        let store = MemoryStore::new();
        let apim = seeded(&store, None);

        let state = reconcile_upgrade(&store, &apim).await.unwrap();

        assert_eq!(state, UpgradeState::Completed);
        let stored: APIManager = store.object(NS, "example").unwrap();
        assert!(is_current(&stored));
        assert_eq!(recorded_operator_version(&stored), Some(OPERATOR_VERSION));
    }

    #[tokio::test]
    async fn test_previous_version_removes_wildcard_router_first() {
        let store = MemoryStore::new();
        let apim = seeded(&store, Some("0.7.0"));
        store.seed(
            NS,
            &Deployment {
                metadata: wildcard_router_meta(),
                ..Default::default()
            },
        );
        store.seed(
            NS,
            &Service {
                metadata: wildcard_router_meta(),
                ..Default::default()
            },
        );

        let first = reconcile_upgrade(&store, &apim).await.unwrap();
        assert_eq!(first, UpgradeState::InProgress);
        assert!(!store.contains::<Deployment>(NS, OBSOLETE_WILDCARD_ROUTER));
        assert!(!store.contains::<Service>(NS, OBSOLETE_WILDCARD_ROUTER));
        let unchanged: APIManager = store.object(NS, "example").unwrap();
        assert_eq!(recorded_operator_version(&unchanged), Some("0.7.0"));

        let second = reconcile_upgrade(&store, &unchanged).await.unwrap();
        assert_eq!(second, UpgradeState::Completed);
        let stamped: APIManager = store.object(NS, "example").unwrap();
        assert!(is_current(&stamped));
    }

    #[tokio::test]
    async fn test_unsupported_version_is_rejected_without_writes() {
        for version in ["0.5.0", "0.9.0"] {
            let store = MemoryStore::new();
            let apim = seeded(&store, Some(version));

            let err = reconcile_upgrade(&store, &apim).await.unwrap_err();

            assert_eq!(err.error_type(), "unsupported_upgrade", "{version}");
            assert_eq!(store.writes().total(), 0);
        }
    }

    #[tokio::test]
    async fn test_stale_object_stamp_is_a_conflict() {
        let store = MemoryStore::new();
        let apim = seeded(&store, None);
        reconcile_upgrade(&store, &apim).await.unwrap();

        let err = reconcile_upgrade(&store, &apim).await.unwrap_err();

        assert!(err.is_conflict());
    }
}
