// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Component steps of the `APIManager` pipeline, one module per concern.

pub mod apicast;
pub mod backend;
pub mod high_availability;
pub mod images;
pub mod memcached;
pub mod monitoring;
pub mod redis;
pub mod system;
pub mod system_database;
pub mod zync;

use crate::constants::DEFAULT_REPLICAS;

/// Replica count from an optional spec field.
pub(crate) fn replicas(value: Option<i32>) -> i32 {
    value.unwrap_or(DEFAULT_REPLICAS)
}
