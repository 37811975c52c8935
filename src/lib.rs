// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

#![allow(unexpected_cfgs)]

//! # threescale-operator - 3scale API Management Operator for Kubernetes
//!
//! A Kubernetes operator written in Rust that deploys and upgrades the 3scale API
//! management platform from a single `APIManager` resource, and imports OpenAPI
//! documents as 3scale `Product` and `Backend` resources.
//!
//! ## Overview
//!
//! - Custom Resource Definitions for `APIManager`, `OpenAPI`, `Product` and `Backend`
//! - An ordered chain of component reconcilers (redis, databases, backend, system,
//!   zync, apicast, monitoring) with a version-gated upgrade step in front
//! - Status aggregation from the deployments an `APIManager` owns
//! - OpenAPI 3 parsing and server URL rendering
//!
//! ## Modules
//!
//! - [`crd`] - Custom Resource Definition types
//! - [`reconcilers`] - Reconciliation logic for each resource type
//! - [`apimanager_resources`] - Builders for the Kubernetes objects of a deployment
//! - [`openapi`] - OpenAPI document model and helpers
//! - [`store`] - Cluster access seam used by every reconciler
//! - [`context`] - Shared controller context
//!
//! ## Example
//!
//! ```rust,no_run
//! use threescale_operator::crd::{APIManager, APIManagerSpec};
//!
//! let mut apim = APIManager::new(
//!     "example",
//!     APIManagerSpec {
//!         wildcard_domain: "apps.example.com".to_string(),
//!         ..Default::default()
//!     },
//! );
//! apim.set_defaults();
//! ```

pub mod apimanager_resources;
pub mod constants;
pub mod context;
pub mod crd;
pub mod errors;
pub mod labels;
pub mod metrics;
pub mod openapi;
pub mod reconcilers;
pub mod store;
