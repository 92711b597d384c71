// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Maps a `GatewayServiceConfig` change to the clusters that must be revisited.
//!
//! The controller keeps a reflector cache of every `Cluster`. When the
//! provider's configuration changes, each cached cluster that is in scope or
//! still carries the gateway finalizer is queued. A cache that has not synced
//! yet yields no requests. Those clusters are picked up again by the
//! `RESYNC_INTERVAL` requeue that `reconcile_cluster` returns after converging.

use std::sync::Arc;

use kube::runtime::reflector::ObjectRef;
use kube::ResourceExt;
use tracing::debug;

use crate::crd::{Cluster, GatewayServiceConfig};
use crate::selector::should_reconcile;

/// Returns the clusters to requeue after `config` changed.
///
/// Configurations that belong to another provider produce no requests.
#[must_use]
pub fn clusters_to_requeue(
    provider_name: &str,
    config: &GatewayServiceConfig,
    clusters: &[Arc<Cluster>],
) -> Vec<ObjectRef<Cluster>> {
    if config.name_any() != provider_name {
        debug!(
            config = %config.name_any(),
            provider = provider_name,
            "Ignoring configuration of another provider"
        );
        return Vec::new();
    }

    let requests: Vec<ObjectRef<Cluster>> = clusters
        .iter()
        .filter(|cluster| should_reconcile(&config.spec.clusters, cluster))
        .map(|cluster| ObjectRef::<Cluster>::from_obj(cluster))
        .collect();

    debug!(
        config = %config.name_any(),
        clusters = requests.len(),
        "Configuration changed, requeueing clusters"
    );
    requests
}

#[cfg(test)]
#[path = "fanout_tests.rs"]
mod fanout_tests;
