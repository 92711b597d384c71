// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Reconciliation logic for gateway provisioning.
//!
//! The controller watches `Cluster` objects on the platform and provisions
//! Envoy Gateway on every cluster selected by the provider's
//! `GatewayServiceConfig`.
//!
//! # Reconciliation Architecture
//!
//! 1. **Watch** - `Cluster` changes, plus `GatewayServiceConfig` changes fanned
//!    out to the affected clusters
//! 2. **Reconcile** - derive the desired objects from the configuration
//! 3. **Apply** - create or update them on the platform and the target cluster
//! 4. **Report** - publish Events on the `Cluster`
//!
//! Every pass re-derives its state from the remote stores; nothing is carried
//! over in memory between passes.
//!
//! # Available Reconcilers
//!
//! - [`reconcile_cluster`] - converges or tears down the gateway of one cluster
//! - [`clusters_to_requeue`] - maps a configuration change to cluster requests
//!
//! # Example: Using a Reconciler
//!
//! ```rust,no_run
//! use platform_service_gateway::context::Context;
//! use platform_service_gateway::gateway::ClusterIdentity;
//! use platform_service_gateway::reconcilers::reconcile_cluster;
//!
//! async fn visit(ctx: &Context) -> anyhow::Result<()> {
//!     let action = reconcile_cluster(ctx, &ClusterIdentity::new("bar", "foo")).await?;
//!     println!("next: {action:?}");
//!     Ok(())
//! }
//! ```

pub mod cluster;
pub mod fanout;
pub mod finalizers;
pub mod resources;

pub use cluster::reconcile_cluster;
pub use fanout::clusters_to_requeue;
