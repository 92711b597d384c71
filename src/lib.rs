// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! # Platform Service Gateway - Envoy Gateway for the cluster inventory
//!
//! A Kubernetes controller that provisions Envoy Gateway on remote clusters.
//! It runs on the platform cluster, watches the `Cluster` inventory and, for
//! every cluster selected by its `GatewayServiceConfig`, installs the Envoy
//! Gateway control plane through Flux chart delivery and applies the data
//! plane (`GatewayClass`, `EnvoyProxy`, `Gateway`) on the target cluster.
//!
//! ## Modules
//!
//! - [`crd`] - `GatewayServiceConfig` plus the external `Cluster` and `AccessRequest` types
//! - [`selector`] - cluster term matching
//! - [`store`] - remote object store client, registry and envelope helpers
//! - [`gateway`] - Envoy Gateway lifecycle and the objects it consists of
//! - [`access`] - access to target clusters
//! - [`reconcilers`] - the `Cluster` reconciler and configuration fan-out
//! - [`events`] - Kubernetes Events on `Cluster` objects
//! - [`metrics`] - Prometheus metrics
//! - [`context`] - shared controller context
//!
//! ## Example
//!
//! ```rust,no_run
//! use platform_service_gateway::crd::{ClusterSelector, ClusterTerm};
//!
//! // Select every cluster with the "platform" purpose
//! let term = ClusterTerm {
//!     selector: Some(ClusterSelector {
//!         match_labels: None,
//!         match_purpose: Some("platform".to_string()),
//!     }),
//!     cluster_ref: None,
//! };
//! ```

pub mod access;
pub mod constants;
pub mod context;
pub mod crd;
pub mod errors;
pub mod events;
pub mod gateway;
pub mod labels;
pub mod metrics;
pub mod reconcilers;
pub mod selector;
pub mod store;
