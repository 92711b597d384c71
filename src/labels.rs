// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Common label constants used on every object the gateway service creates.
//!
//! Objects written to platform or target clusters carry the standard Kubernetes
//! labels plus a cluster label, so they can be listed back during cleanup.

use std::collections::BTreeMap;

use crate::constants::CONTROLLER_NAME;

// ============================================================================
// Kubernetes Standard Labels
// https://kubernetes.io/docs/concepts/overview/working-with-objects/common-labels/
// ============================================================================

/// Standard label for the component name within the architecture
pub const K8S_COMPONENT: &str = "app.kubernetes.io/component";

/// Standard label for the tool being used to manage the operation of an application
pub const K8S_MANAGED_BY: &str = "app.kubernetes.io/managed-by";

/// Standard label for the name of a higher-level application this one is part of
pub const K8S_PART_OF: &str = "app.kubernetes.io/part-of";

// ============================================================================
// Label Values
// ============================================================================

/// Value for `app.kubernetes.io/part-of`
pub const PART_OF_OPENMCP: &str = "openmcp";

/// Component value for chart delivery objects on the platform cluster
pub const COMPONENT_CONTROL_PLANE: &str = "control-plane";

/// Component value for data plane objects on the target cluster
pub const COMPONENT_DATA_PLANE: &str = "data-plane";

/// Component value for copied secrets
pub const COMPONENT_CREDENTIALS: &str = "credentials";

// ============================================================================
// Gateway-Specific Labels
// ============================================================================

/// Label naming the `Cluster` (as `namespace.name`) an object was created for
pub const GATEWAY_CLUSTER_LABEL: &str = "gateway.openmcp.cloud/cluster";

/// Builds the label set for an object owned by the given cluster.
///
/// The cluster label value is `namespace.name`, which stays within the
/// 63 character limit for all names produced by the cluster inventory.
#[must_use]
pub fn managed_labels(cluster_namespace: &str, cluster_name: &str, component: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        (K8S_MANAGED_BY.to_string(), CONTROLLER_NAME.to_string()),
        (K8S_PART_OF.to_string(), PART_OF_OPENMCP.to_string()),
        (K8S_COMPONENT.to_string(), component.to_string()),
        (
            GATEWAY_CLUSTER_LABEL.to_string(),
            format!("{cluster_namespace}.{cluster_name}"),
        ),
    ])
}

/// Selector matching everything this controller manages with the given component.
#[must_use]
pub fn managed_selector(component: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        (K8S_MANAGED_BY.to_string(), CONTROLLER_NAME.to_string()),
        (K8S_COMPONENT.to_string(), component.to_string()),
    ])
}
