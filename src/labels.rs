// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Common label and annotation constants used across all reconcilers.
//!
//! This module defines standard Kubernetes labels and 3scale-specific labels/annotations
//! to ensure consistency across all resources created by the operator.

// ============================================================================
// Kubernetes Standard Labels
// https://kubernetes.io/docs/concepts/overview/working-with-objects/common-labels/
// ============================================================================

/// Standard label for the component name within the architecture (e.g., "backend", "system")
pub const K8S_COMPONENT: &str = "app.kubernetes.io/component";

/// Standard label for the tool being used to manage the operation of an application
pub const K8S_MANAGED_BY: &str = "app.kubernetes.io/managed-by";

/// Standard label for the name of the application
pub const K8S_NAME: &str = "app.kubernetes.io/name";

/// Standard label for the name of a higher-level application this one is part of
pub const K8S_PART_OF: &str = "app.kubernetes.io/part-of";

// ============================================================================
// Kubernetes Standard Label Values
// ============================================================================

/// Value for `app.kubernetes.io/part-of` on every managed object
pub const PART_OF_THREESCALE: &str = "3scale";

/// Value for `app.kubernetes.io/managed-by` on objects owned by an `APIManager`
pub const MANAGED_BY_APIMANAGER: &str = "APIManager";

/// Value for `app.kubernetes.io/managed-by` on objects generated from an `OpenAPI`
pub const MANAGED_BY_OPENAPI: &str = "OpenAPI";

// ============================================================================
// 3scale Labels
// ============================================================================

/// Label carrying the `APIManager` application label (`spec.appLabel`)
pub const APP_LABEL: &str = "app";

/// Label identifying the platform component (backend, system, zync, apicast...)
pub const THREESCALE_COMPONENT: &str = "threescale_component";

/// Label identifying the element inside a component (listener, worker, app...)
pub const THREESCALE_COMPONENT_ELEMENT: &str = "threescale_component_element";

/// Pod selector label; its value is the name of the owning Deployment
pub const DEPLOYMENT_SELECTOR: &str = "deployment";

// ============================================================================
// 3scale Annotations
// ============================================================================

/// Annotation recording the 3scale release last applied to an `APIManager`
pub const THREESCALE_VERSION_ANNOTATION: &str = "apps.3scale.net/apimanager-threescale-version";

/// Annotation recording the operator version last applied to an `APIManager`
pub const OPERATOR_VERSION_ANNOTATION: &str = "apps.3scale.net/threescale-operator-version";

/// Pod template annotation holding the hash of the configuration a pod was started with
pub const CONFIG_HASH_ANNOTATION: &str = "apps.3scale.net/config-hash";
