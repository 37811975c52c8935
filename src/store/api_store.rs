// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! [`ObjectStore`] implementation backed by the Kubernetes API server.

use super::{ManagedObject, ObjectStore};
use crate::constants::FIELD_MANAGER;
use crate::errors::{Error, Result};
use async_trait::async_trait;
use kube::api::{DeleteParams, ListParams, Patch, PatchParams, PostParams};
use kube::{Api, Client, ResourceExt};
use serde_json::json;
use tracing::{debug, info};

/// Object store talking to the API server through a shared [`Client`].
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api<K: ManagedObject>(&self, namespace: &str) -> Api<K> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

fn post_params() -> PostParams {
    PostParams {
        field_manager: Some(FIELD_MANAGER.to_string()),
        ..Default::default()
    }
}

/// Translate API status codes the reconcilers care about into typed errors.
fn classify<K: ManagedObject>(err: kube::Error, namespace: &str, name: &str) -> Error {
    match &err {
        kube::Error::Api(ae) if ae.code == 409 => Error::conflict::<K>(namespace, name),
        kube::Error::Api(ae) if ae.code == 404 => Error::not_found::<K>(namespace, name),
        _ => Error::Kube(err),
    }
}

#[async_trait]
impl ObjectStore for KubeStore {
    async fn get<K: ManagedObject>(&self, namespace: &str, name: &str) -> Result<Option<K>> {
        Ok(self.api::<K>(namespace).get_opt(name).await?)
    }

    async fn list<K: ManagedObject>(&self, namespace: &str) -> Result<Vec<K>> {
        let list = self
            .api::<K>(namespace)
            .list(&ListParams::default())
            .await?;
        Ok(list.items)
    }

    async fn create<K: ManagedObject>(&self, namespace: &str, object: &K) -> Result<K> {
        let name = object.name_any();
        debug!(kind = %K::kind(&()), namespace = %namespace, name = %name, "Creating resource");
        self.api::<K>(namespace)
            .create(&post_params(), object)
            .await
            .map_err(|e| classify::<K>(e, namespace, &name))
    }

    async fn replace<K: ManagedObject>(&self, namespace: &str, object: &K) -> Result<K> {
        let name = object.name_any();
        debug!(kind = %K::kind(&()), namespace = %namespace, name = %name, "Replacing resource");
        self.api::<K>(namespace)
            .replace(&name, &post_params(), object)
            .await
            .map_err(|e| classify::<K>(e, namespace, &name))
    }

    async fn update_status<K: ManagedObject>(&self, namespace: &str, object: &K) -> Result<K> {
        let name = object.name_any();
        let value = serde_json::to_value(object)?;
        let patch = json!({
            "metadata": { "resourceVersion": object.resource_version() },
            "status": value.get("status").cloned().unwrap_or_default(),
        });

        debug!(kind = %K::kind(&()), namespace = %namespace, name = %name, "Patching status");
        let params = PatchParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..Default::default()
        };
        self.api::<K>(namespace)
            .patch_status(&name, &params, &Patch::Merge(&patch))
            .await
            .map_err(|e| classify::<K>(e, namespace, &name))
    }

    async fn delete<K: ManagedObject>(&self, namespace: &str, name: &str) -> Result<bool> {
        match self
            .api::<K>(namespace)
            .delete(name, &DeleteParams::default())
            .await
        {
            Ok(_) => {
                info!("Deleted {} {}/{}", K::kind(&()), namespace, name);
                Ok(true)
            }
            Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
