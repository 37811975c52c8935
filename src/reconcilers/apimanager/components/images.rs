// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Image set resolution and the shared `amp` service account.

use crate::apimanager_resources::{build_configmap, build_object_meta, ComponentRef, Images};
use crate::constants::SERVICE_ACCOUNT_NAME;
use crate::crd::APIManager;
use crate::errors::Result;
use crate::reconcilers::apimanager::pipeline::{LogicReconciler, StepOutcome, SubReconciler};
use crate::reconcilers::resources::{configmap_mutator, service_account_mutator};
use crate::store::ObjectStore;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{ConfigMap, LocalObjectReference, ServiceAccount};
use std::collections::BTreeMap;

pub const IMAGES_CONFIGMAP: &str = "amp-images";

const COMPONENT: ComponentRef = ComponentRef::new("amp-images", "images");

/// ConfigMap recording the image resolved for every component.
#[must_use]
pub fn desired_images_configmap(apim: &APIManager, images: &Images) -> ConfigMap {
    let data = BTreeMap::from([
        ("apicast".to_string(), images.apicast.clone()),
        ("backend".to_string(), images.backend.clone()),
        ("backend-redis".to_string(), images.backend_redis.clone()),
        ("system".to_string(), images.system.clone()),
        ("system-redis".to_string(), images.system_redis.clone()),
        ("system-memcached".to_string(), images.system_memcached.clone()),
        ("zync".to_string(), images.zync.clone()),
        ("zync-database-postgresql".to_string(), images.zync_postgresql.clone()),
    ]);
    build_configmap(apim, IMAGES_CONFIGMAP, COMPONENT, data)
}

#[must_use]
pub fn desired_service_account(apim: &APIManager) -> ServiceAccount {
    ServiceAccount {
        metadata: build_object_meta(apim, SERVICE_ACCOUNT_NAME, COMPONENT),
        image_pull_secrets: apim.spec.image_pull_secret.as_ref().map(|name| {
            vec![LocalObjectReference {
                name: name.clone(),
            }]
        }),
        ..Default::default()
    }
}

pub struct ImagesReconciler;

#[async_trait]
impl<S: ObjectStore> SubReconciler<S> for ImagesReconciler {
    fn name(&self) -> &'static str {
        "images"
    }

    async fn reconcile(&self, base: &LogicReconciler<'_, S>) -> Result<StepOutcome> {
        base.reconcile(
            desired_images_configmap(base.apim, &base.images),
            configmap_mutator,
        )
        .await?;
        base.reconcile(desired_service_account(base.apim), service_account_mutator)
            .await?;
        Ok(StepOutcome::Complete)
    }
}
