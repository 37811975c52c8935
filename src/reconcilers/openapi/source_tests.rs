// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `source.rs`

#[cfg(test)]
mod tests {
    use crate::crd::{ConfigMapKeyReference, OpenAPI, OpenAPIRefSpec, OpenAPISpec};
    use crate::reconcilers::openapi::source::*;
    use crate::store::memory::MemoryStore;
    use k8s_openapi::api::core::v1::ConfigMap;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use std::collections::BTreeMap;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const NS: &str = "apis";
    const DOCUMENT: &str = "openapi: 3.0.0\ninfo:\n  title: Echo\n";

    fn openapi(reference: OpenAPIRefSpec) -> OpenAPI {
        let mut openapi = OpenAPI::new(
            "echo",
            OpenAPISpec {
                openapi_ref: reference,
                ..Default::default()
            },
        );
        openapi.metadata.namespace = Some(NS.into());
        openapi
    }

    fn config_map(key: &str) -> ConfigMap {
        ConfigMap {
            metadata: ObjectMeta {
                name: Some("echo-openapi".into()),
                namespace: Some(NS.into()),
                ..Default::default()
            },
            data: Some(BTreeMap::from([(key.to_string(), DOCUMENT.to_string())])),
            ..Default::default()
        }
    }

    fn config_map_ref(key: Option<&str>) -> OpenAPIRefSpec {
        OpenAPIRefSpec {
            config_map_ref: Some(ConfigMapKeyReference {
                name: "echo-openapi".into(),
                key: key.map(String::from),
            }),
            url: None,
        }
    }

    #[tokio::test]
    async fn test_reads_default_configmap_key() {
        let store = MemoryStore::new();
        store.seed(NS, &config_map("openapi.yaml"));

        let raw = load_openapi_source(&store, &reqwest::Client::new(), &openapi(config_map_ref(None)))
            .await
            .unwrap();

        assert_eq!(raw, DOCUMENT);
    }

    #[tokio::test]
    async fn test_reads_custom_configmap_key() {
        let store = MemoryStore::new();
        store.seed(NS, &config_map("spec.json"));

        let raw = load_openapi_source(
            &store,
            &reqwest::Client::new(),
            &openapi(config_map_ref(Some("spec.json"))),
        )
        .await
        .unwrap();

        assert_eq!(raw, DOCUMENT);
    }

    #[tokio::test]
    async fn test_missing_configmap_is_not_found() {
        let store = MemoryStore::new();

        let err = load_openapi_source(&store, &reqwest::Client::new(), &openapi(config_map_ref(None)))
            .await
            .unwrap_err();

        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_missing_configmap_key_is_rejected() {
        let store = MemoryStore::new();
        store.seed(NS, &config_map("other.yaml"));

        let err = load_openapi_source(&store, &reqwest::Client::new(), &openapi(config_map_ref(None)))
            .await
            .unwrap_err();

        assert!(err.to_string().contains("has no key 'openapi.yaml'"));
    }

    #[tokio::test]
    async fn test_reference_must_name_exactly_one_source() {
        let store = MemoryStore::new();
        let client = reqwest::Client::new();

        let neither = load_openapi_source(&store, &client, &openapi(OpenAPIRefSpec::default()))
            .await
            .unwrap_err();
        assert!(neither.to_string().contains("is required"));

        let mut both = config_map_ref(None);
        both.url = Some("https://example.com/openapi.yaml".into());
        let both = load_openapi_source(&store, &client, &openapi(both))
            .await
            .unwrap_err();
        assert!(both.to_string().contains("mutually exclusive"));
    }

    #[tokio::test]
    async fn test_fetches_document_from_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/openapi.yaml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(DOCUMENT))
            .expect(1)
            .mount(&server)
            .await;
        let reference = OpenAPIRefSpec {
            config_map_ref: None,
            url: Some(format!("{}/openapi.yaml", server.uri())),
        };

        let raw = load_openapi_source(&MemoryStore::new(), &reqwest::Client::new(), &openapi(reference))
            .await
            .unwrap();

        assert_eq!(raw, DOCUMENT);
    }

    #[tokio::test]
    async fn test_http_error_status_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing.yaml"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = fetch_url(&reqwest::Client::new(), &format!("{}/missing.yaml", server.uri()))
            .await
            .unwrap_err();

        assert_eq!(err.error_type(), "http");
    }
}
