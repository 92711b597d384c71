// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Cluster term matching.
//!
//! Decides whether a [`Cluster`] is in scope of the `GatewayServiceConfig`.
//! A cluster is in scope if any term matches it. Within a selector, purpose and
//! labels must both match.
//!
//! # Example
//!
//! ```rust,no_run
//! use platform_service_gateway::crd::{Cluster, ClusterTerm};
//! use platform_service_gateway::selector::should_reconcile;
//!
//! # fn example(terms: &[ClusterTerm], cluster: &Cluster) {
//! if should_reconcile(terms, cluster) {
//!     println!("cluster needs a visit");
//! }
//! # }
//! ```

use std::collections::BTreeMap;

use kube::ResourceExt;

use crate::constants::{DEFAULT_NAMESPACE, GATEWAY_FINALIZER};
use crate::crd::{Cluster, ClusterRef, ClusterSelector, ClusterTerm};
use crate::reconcilers::finalizers::has_finalizer;

/// Returns true if any term matches the cluster.
#[must_use]
pub fn in_scope(terms: &[ClusterTerm], cluster: &Cluster) -> bool {
    terms.iter().any(|term| term_matches(term, cluster))
}

/// Returns true if the cluster has to be visited.
///
/// Finalized clusters are always visited, so a cluster that dropped out of
/// scope still gets its resources torn down and its finalizer removed.
#[must_use]
pub fn should_reconcile(terms: &[ClusterTerm], cluster: &Cluster) -> bool {
    has_finalizer(&cluster.metadata, GATEWAY_FINALIZER) || in_scope(terms, cluster)
}

fn term_matches(term: &ClusterTerm, cluster: &Cluster) -> bool {
    term.cluster_ref
        .as_ref()
        .is_some_and(|r| ref_matches(r, cluster))
        || term
            .selector
            .as_ref()
            .is_some_and(|s| selector_matches(s, cluster))
}

fn ref_matches(cluster_ref: &ClusterRef, cluster: &Cluster) -> bool {
    let namespace = cluster.namespace().unwrap_or_default();
    normalized(&cluster_ref.name, &cluster_ref.namespace) == normalized(&cluster.name_any(), &namespace)
}

fn normalized<'a>(name: &'a str, namespace: &'a str) -> (&'a str, &'a str) {
    if namespace.is_empty() {
        (name, DEFAULT_NAMESPACE)
    } else {
        (name, namespace)
    }
}

fn selector_matches(selector: &ClusterSelector, cluster: &Cluster) -> bool {
    purpose_matches(selector.match_purpose.as_deref(), cluster)
        && labels_match(selector.match_labels.as_ref(), cluster.labels())
}

fn purpose_matches(purpose: Option<&str>, cluster: &Cluster) -> bool {
    match purpose {
        None | Some("") => true,
        Some(purpose) => cluster.spec.purposes.iter().any(|p| p == purpose),
    }
}

fn labels_match(wanted: Option<&BTreeMap<String, String>>, labels: &BTreeMap<String, String>) -> bool {
    wanted.is_none_or(|wanted| wanted.iter().all(|(k, v)| labels.get(k) == Some(v)))
}

#[cfg(test)]
#[path = "selector_tests.rs"]
mod selector_tests;
