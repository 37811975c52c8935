// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `openapi/mod.rs`

#[cfg(test)]
mod tests {
    use crate::crd::{
        Backend, ConfigMapKeyReference, OpenAPI, OpenAPIRefSpec, OpenAPISpec, Product,
    };
    use crate::openapi::parse_openapi_document;
    use crate::reconcilers::openapi::backend::{backend_mutator, desired_backend};
    use crate::reconcilers::openapi::product::desired_product;
    use crate::reconcilers::openapi::*;
    use crate::reconcilers::status::find_condition;
    use crate::store::memory::MemoryStore;
    use k8s_openapi::api::core::v1::ConfigMap;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use std::collections::BTreeMap;

    const NS: &str = "apis";
    const UID: &str = "6a1b2c3d-4e5f-4a0b-8c1d-2e3f4a5b6c7d";
    const PETSTORE: &str = r"
openapi: 3.0.2
info:
  title: Petstore
  description: Pets as a service
servers:
  - url: https://{region}.petstore.example.com/v1
    variables:
      region:
        default: eu
security:
  - api_key: []
components:
  securitySchemes:
    api_key:
      type: apiKey
      name: X-API-KEY
      in: header
";

    fn openapi(spec: OpenAPISpec) -> OpenAPI {
        let mut openapi = OpenAPI::new(
            "petstore",
            OpenAPISpec {
                openapi_ref: OpenAPIRefSpec {
                    config_map_ref: Some(ConfigMapKeyReference {
                        name: "petstore-openapi".into(),
                        key: None,
                    }),
                    url: None,
                },
                ..spec
            },
        );
        openapi.metadata.namespace = Some(NS.into());
        openapi.metadata.uid = Some(UID.into());
        openapi.metadata.generation = Some(1);
        openapi
    }

    fn document_configmap(document: &str) -> ConfigMap {
        ConfigMap {
            metadata: ObjectMeta {
                name: Some("petstore-openapi".into()),
                namespace: Some(NS.into()),
                ..Default::default()
            },
            data: Some(BTreeMap::from([(
                "openapi.yaml".to_string(),
                document.to_string(),
            )])),
            ..Default::default()
        }
    }

    fn seeded(spec: OpenAPISpec, document: &str) -> MemoryStore {
        let store = MemoryStore::new();
        store.seed(NS, &openapi(spec));
        store.seed(NS, &document_configmap(document));
        store
    }

    fn generated_name() -> String {
        format!("petstore-{UID}")
    }

    async fn run(store: &MemoryStore) -> crate::errors::Result<ImportOutcome> {
        reconcile_openapi(store, &reqwest::Client::new(), NS, "petstore").await
    }

    #[tokio::test]
    async fn test_missing_openapi_is_not_found() {
        let store = MemoryStore::new();

        assert_eq!(run(&store).await.unwrap(), ImportOutcome::NotFound);
        assert_eq!(ImportOutcome::NotFound.requeue(), None);
    }

    #[tokio::test]
    async fn test_import_creates_backend_and_product() {
        let store = seeded(OpenAPISpec::default(), PETSTORE);

        let outcome = run(&store).await.unwrap();

        let name = generated_name();
        assert_eq!(
            outcome,
            ImportOutcome::Imported {
                product: name.clone(),
                backend: name.clone(),
            }
        );

        let backend: Backend = store.object(NS, &name).unwrap();
        assert_eq!(backend.spec.name, "Petstore Backend");
        assert_eq!(backend.spec.system_name, "petstore");
        assert_eq!(
            backend.spec.private_base_url,
            "https://eu.petstore.example.com/v1"
        );
        let owner = &backend.metadata.owner_references.as_ref().unwrap()[0];
        assert_eq!(owner.kind, "OpenAPI");
        assert_eq!(owner.uid, UID);

        let product: Product = store.object(NS, &name).unwrap();
        assert_eq!(product.spec.name, "Petstore");
        assert_eq!(product.spec.description, "Pets as a service");
        assert_eq!(product.spec.backend_usages["petstore"].path, "/");
        let hosted = product
            .spec
            .deployment
            .as_ref()
            .unwrap()
            .apicast_hosted
            .as_ref()
            .unwrap();
        let user_key = hosted
            .authentication
            .as_ref()
            .unwrap()
            .user_key
            .as_ref()
            .unwrap();
        assert_eq!(user_key.auth_user_key.as_deref(), Some("X-API-KEY"));
        assert_eq!(user_key.credentials.as_deref(), Some("headers"));

        let status = store.object::<OpenAPI>(NS, "petstore").unwrap().status.unwrap();
        let ready = find_condition(&status.conditions, CONDITION_READY).unwrap();
        assert_eq!(ready.status, "True");
        assert_eq!(ready.reason.as_deref(), Some(REASON_IMPORTED));
        assert_eq!(status.product_resource_name.as_deref(), Some(name.as_str()));
        assert_eq!(status.observed_generation, Some(1));
    }

    #[tokio::test]
    async fn test_second_import_is_write_free() {
        let store = seeded(OpenAPISpec::default(), PETSTORE);
        run(&store).await.unwrap();
        let before = store.writes();

        let outcome = run(&store).await.unwrap();

        assert!(matches!(outcome, ImportOutcome::Imported { .. }));
        assert_eq!(store.writes(), before);
    }

    #[tokio::test]
    async fn test_overrides_flow_into_generated_objects() {
        let store = seeded(
            OpenAPISpec {
                product_system_name: Some("pets".into()),
                private_base_url: Some("https://pets.internal:8443".into()),
                production_public_base_url: Some("https://api.pets.example.com".into()),
                ..Default::default()
            },
            PETSTORE,
        );

        run(&store).await.unwrap();

        let name = generated_name();
        let backend: Backend = store.object(NS, &name).unwrap();
        assert_eq!(backend.spec.system_name, "pets");
        assert_eq!(backend.spec.private_base_url, "https://pets.internal:8443");

        let product: Product = store.object(NS, &name).unwrap();
        assert_eq!(product.spec.system_name, "pets");
        assert!(product.spec.backend_usages.contains_key("pets"));
        let deployment = product.spec.deployment.unwrap();
        assert!(deployment.apicast_hosted.is_none());
        let self_managed = deployment.apicast_self_managed.unwrap();
        assert_eq!(
            self_managed.production_public_base_url.as_deref(),
            Some("https://api.pets.example.com")
        );
        assert!(self_managed.staging_public_base_url.is_none());
        assert!(self_managed.authentication.is_some());
    }

    #[tokio::test]
    async fn test_long_title_is_rejected_before_any_write() {
        let document = PETSTORE.replace(
            "title: Petstore",
            "title: The Extremely Comprehensive Petstore API",
        );
        let store = seeded(OpenAPISpec::default(), &document);

        let err = run(&store).await.unwrap_err();

        assert!(matches!(err, crate::errors::Error::Validation { .. }));
        assert_eq!(store.writes().creates, 0);
        assert_eq!(store.writes().status_updates, 1);
        let status = store.object::<OpenAPI>(NS, "petstore").unwrap().status.unwrap();
        let ready = find_condition(&status.conditions, CONDITION_READY).unwrap();
        assert_eq!(ready.status, "False");
        assert_eq!(ready.reason.as_deref(), Some(REASON_VALIDATION_FAILED));
        assert!(status.product_resource_name.is_none());
    }

    #[tokio::test]
    async fn test_invalid_document_sets_ready_false() {
        let store = seeded(OpenAPISpec::default(), "swagger: '2.0'\ninfo:\n  title: Old\n");

        let err = run(&store).await.unwrap_err();

        assert_eq!(err.error_type(), "openapi");
        assert_eq!(store.writes().creates, 0);
        let status = store.object::<OpenAPI>(NS, "petstore").unwrap().status.unwrap();
        let ready = find_condition(&status.conditions, CONDITION_READY).unwrap();
        assert_eq!(ready.reason.as_deref(), Some(REASON_INVALID_OPENAPI));
    }

    #[tokio::test]
    async fn test_repeated_failure_writes_status_once() {
        let store = seeded(OpenAPISpec::default(), "swagger: '2.0'\ninfo:\n  title: Old\n");
        run(&store).await.unwrap_err();
        let before = store.writes();

        run(&store).await.unwrap_err();

        assert_eq!(store.writes(), before);
    }

    #[tokio::test]
    async fn test_undeclared_server_variable_is_invalid() {
        let document = PETSTORE.replace("{region}.petstore", "{zone}.petstore");
        let store = seeded(OpenAPISpec::default(), &document);

        let err = run(&store).await.unwrap_err();

        assert!(matches!(
            err,
            crate::errors::Error::UndeclaredServerVariable { .. }
        ));
        assert_eq!(store.writes().creates, 0);
    }

    #[tokio::test]
    async fn test_status_conflict_requeues() {
        let store = seeded(OpenAPISpec::default(), PETSTORE);
        store.fail_next_status_update_with_conflict();

        let outcome = run(&store).await.unwrap();

        assert_eq!(outcome, ImportOutcome::StatusConflict);
        assert!(outcome.requeue().is_some());
        assert_eq!(store.writes().creates, 2);
    }

    #[test]
    fn test_backend_mutator_keeps_foreign_labels() {
        let document = parse_openapi_document(PETSTORE).unwrap();
        let owner = openapi(OpenAPISpec::default());
        let desired = desired_backend(&owner, &document).unwrap();
        let mut existing = desired.clone();
        existing
            .metadata
            .labels
            .as_mut()
            .unwrap()
            .insert("team".into(), "pets".into());
        existing.spec.private_base_url = "https://stale.example.com".into();

        assert!(backend_mutator(&mut existing, &desired));
        assert_eq!(existing.metadata.labels.as_ref().unwrap()["team"], "pets");
        assert_eq!(existing.spec, desired.spec);
        assert!(!backend_mutator(&mut existing, &desired));
    }

    #[test]
    fn test_document_without_servers_routes_to_root() {
        let document = parse_openapi_document("openapi: 3.0.0\ninfo:\n  title: Echo\n").unwrap();
        let owner = openapi(OpenAPISpec::default());

        let backend = desired_backend(&owner, &document).unwrap();
        let product = desired_product(&owner, &document, &backend).unwrap();

        assert_eq!(backend.spec.private_base_url, "/");
        let deployment = product.spec.deployment.unwrap();
        assert!(deployment.apicast_hosted.unwrap().authentication.is_none());
    }

    #[test]
    fn test_object_name_must_be_a_dns_label() {
        let document = parse_openapi_document(
            "openapi: 3.0.0\ninfo:\n  title: A Title That Is Far Too Long For A Label\n",
        )
        .unwrap();

        let err = desired_object_name::<Product>(&openapi(OpenAPISpec::default()), &document)
            .unwrap_err();

        match err {
            crate::errors::Error::Validation { kind, reasons, .. } => {
                assert_eq!(kind, "Product");
                assert_eq!(reasons, vec!["must be no more than 63 characters".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
