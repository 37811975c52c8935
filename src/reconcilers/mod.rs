// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Kubernetes reconciliation logic for 3scale resources.
//!
//! Each reconciler reads its resource through an [`ObjectStore`](crate::store::ObjectStore),
//! converges the objects it owns, and reports the result in the resource status.
//!
//! # Reconciliation Architecture
//!
//! 1. **Read** - Fetch the resource; a missing resource ends the pass
//! 2. **Build** - Compute every desired object from the spec
//! 3. **Converge** - Create missing objects, update those that differ
//! 4. **Status** - Write status only when it changed
//!
//! # Available Reconcilers
//!
//! - [`reconcile_apimanager`] - Deploys a complete 3scale installation
//! - [`reconcile_openapi`] - Imports an OpenAPI document as a `Product` and `Backend`
//!
//! # Example: Using a Reconciler
//!
//! ```rust,no_run
//! use threescale_operator::reconcilers::reconcile_apimanager;
//! use threescale_operator::store::KubeStore;
//!
//! async fn reconcile(store: KubeStore) -> anyhow::Result<()> {
//!     let outcome = reconcile_apimanager(&store, "3scale", "example").await?;
//!     println!("{}", outcome.reason());
//!     Ok(())
//! }
//! ```

pub mod apimanager;
pub mod openapi;
pub mod resources;
pub mod status;

pub use apimanager::{is_terminal, reconcile_apimanager, ReconcileOutcome};
pub use openapi::{reconcile_openapi, ImportOutcome};
