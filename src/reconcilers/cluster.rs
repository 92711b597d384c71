// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `Cluster` reconciler.
//!
//! One pass over a `Cluster` on the platform:
//!
//! 1. Load the cluster. A missing cluster ends the pass.
//! 2. Honor the operation annotation (`ignore` stops, `reconcile` is consumed).
//! 3. Load the provider's `GatewayServiceConfig` and skip clusters that are
//!    neither in scope nor finalized.
//! 4. Tear down if the cluster is being deleted or fell out of scope,
//!    otherwise converge. Converging acquires access to the target cluster,
//!    teardown only uses access that still exists.
//!
//! The `Cluster` has no status for the gateway; progress is reported through
//! Events. Retryable conditions become requeues with the carried delay, fatal
//! errors are returned to the controller.

use std::time::Instant;

use k8s_openapi::api::core::v1::ObjectReference;
use kube::api::DynamicObject;
use kube::runtime::controller::Action;
use kube::runtime::events::EventType;
use kube::Resource;
use tracing::{debug, error, info};

use crate::access::AccessState;
use crate::constants::{
    GATEWAY_FINALIZER, GATEWAY_OPERATION_ANNOTATION, KIND_CLUSTER, OPERATION_ANNOTATION,
    OPERATION_IGNORE, OPERATION_RECONCILE, RESYNC_INTERVAL,
};
use crate::context::Context;
use crate::crd::{Cluster, GatewayServiceConfig};
use crate::errors::Error;
use crate::events::{actions, reasons};
use crate::gateway::{ClusterIdentity, Gateway};
use crate::metrics;
use crate::reconcilers::finalizers::{ensure_finalizer, remove_finalizer};
use crate::selector::{in_scope, should_reconcile};
use crate::store::Envelope;

/// Reconciles one `Cluster` and maps the outcome to a controller [`Action`].
///
/// - converged: requeue after [`RESYNC_INTERVAL`]
/// - missing, ignored, out of scope, torn down: wait for the next change
/// - retryable condition: requeue after its delay
///
/// # Errors
///
/// Returns the fatal error unchanged. The controller's error policy decides
/// when to retry.
pub async fn reconcile_cluster(ctx: &Context, cluster: &ClusterIdentity) -> Result<Action, Error> {
    let started = Instant::now();
    info!(cluster = %cluster, "Starting reconcile");

    match reconcile(ctx, cluster).await {
        Ok(Some(action)) => {
            metrics::record_reconciliation_success(KIND_CLUSTER, started.elapsed());
            Ok(action)
        }
        Ok(None) => {
            metrics::record_reconciliation_skipped(KIND_CLUSTER);
            Ok(Action::await_change())
        }
        Err(Error::NotFound { object }) => {
            info!(cluster = %cluster, object = %object, "Resource not found");
            metrics::record_reconciliation_skipped(KIND_CLUSTER);
            Ok(Action::await_change())
        }
        Err(e) => match e.requeue_after() {
            Some(requeue_after) => {
                info!(
                    cluster = %cluster,
                    requeue_after = ?requeue_after,
                    "Handling retryable error: {}",
                    e
                );
                metrics::record_reconciliation_requeue(KIND_CLUSTER, e.reason());
                Ok(Action::requeue(requeue_after))
            }
            None => {
                error!(cluster = %cluster, error = %e, "Failed to reconcile Cluster");
                metrics::record_reconciliation_error(KIND_CLUSTER, started.elapsed());
                metrics::record_error(KIND_CLUSTER, e.reason());
                Err(e)
            }
        },
    }
}

/// Runs one pass. `Ok(None)` means nothing was done.
async fn reconcile(ctx: &Context, id: &ClusterIdentity) -> Result<Option<Action>, Error> {
    let platform = ctx.platform.as_ref();
    let mut obj = platform.get(&id.key()).await?;

    if let Some((key, operation)) = operation_annotation(&obj) {
        match operation.as_str() {
            OPERATION_IGNORE => {
                info!(cluster = %id, "Ignoring resource due to ignore operation annotation");
                return Ok(None);
            }
            OPERATION_RECONCILE => {
                debug!(cluster = %id, annotation = key, "Removing reconcile operation annotation");
                obj.remove_annotation(key);
                obj = platform.update(&obj).await?;
            }
            _ => {}
        }
    }

    let cluster: Cluster = obj
        .clone()
        .try_parse()
        .map_err(|e| Error::invalid(format!("malformed Cluster {id}: {e}")))?;
    let config = load_config(ctx).await?;
    let terms = config.as_ref().map(|c| c.spec.clusters.as_slice()).unwrap_or_default();

    if !should_reconcile(terms, &cluster) {
        debug!(cluster = %id, "Ignoring cluster: no gateway finalizer and no matching config entry");
        return Ok(None);
    }
    let wanted = in_scope(terms, &cluster);

    let tear_down = obj.is_deleting() || !wanted;
    let access = if tear_down {
        debug!(cluster = %id, "Looking up existing access to cluster");
        ctx.broker.lookup(id).await?
    } else {
        info!(cluster = %id, "Acquiring access to cluster");
        Some(ctx.broker.acquire(id).await?)
    };
    let access = match access {
        Some(AccessState::Ready(access)) => Some(access),
        Some(AccessState::Pending { retry_after }) => {
            return Err(Error::NotYetAvailable {
                reason: format!("access to cluster {id} is not yet available"),
                requeue_after: retry_after,
            })
        }
        None => None,
    };

    let gateway = Gateway {
        cluster: id.clone(),
        spec: config.map(|c| c.spec),
        platform: ctx.platform.clone(),
        access,
        provider_namespace: ctx.settings.provider_namespace.clone(),
    };
    let reference = cluster.object_ref(&());

    if tear_down {
        teardown(ctx, &gateway, &mut obj, &reference).await
    } else {
        converge(ctx, &gateway, &mut obj, &reference).await
    }
}

/// Gateway-scoped annotation first; the generic one only if it is absent.
fn operation_annotation(obj: &DynamicObject) -> Option<(&'static str, String)> {
    [GATEWAY_OPERATION_ANNOTATION, OPERATION_ANNOTATION]
        .into_iter()
        .find_map(|key| obj.annotation(key).map(|value| (key, value.to_string())))
}

/// Loads the provider's configuration. A missing configuration scopes out every cluster.
async fn load_config(ctx: &Context) -> Result<Option<GatewayServiceConfig>, Error> {
    let key = ctx.settings.config_key();
    match ctx.platform.get(&key).await {
        Ok(obj) => obj
            .try_parse()
            .map(Some)
            .map_err(|e| Error::invalid(format!("malformed {key}: {e}"))),
        Err(e) if e.is_not_found() || e.is_kind_not_registered() => {
            debug!(config = %key, "No gateway configuration found");
            Ok(None)
        }
        Err(e) => Err(Error::fatal(e)),
    }
}

async fn converge(
    ctx: &Context,
    gateway: &Gateway,
    obj: &mut DynamicObject,
    reference: &ObjectReference,
) -> Result<Option<Action>, Error> {
    ensure_finalizer(ctx.platform.as_ref(), obj, GATEWAY_FINALIZER).await?;

    gateway.install_or_update().await?;
    gateway.configure().await?;

    ctx.events
        .publish(
            reference,
            EventType::Normal,
            reasons::GATEWAY_INSTALLED,
            actions::INSTALL_GATEWAY,
            Some("Gateway installed successfully".to_string()),
        )
        .await;
    info!(cluster = %gateway.cluster, "Gateway installed");
    Ok(Some(Action::requeue(RESYNC_INTERVAL)))
}

async fn teardown(
    ctx: &Context,
    gateway: &Gateway,
    obj: &mut DynamicObject,
    reference: &ObjectReference,
) -> Result<Option<Action>, Error> {
    // Without access the target objects are out of reach
    if gateway.access.is_some() {
        if let Err(e) = gateway.cleanup().await {
            report_remaining(ctx, reference, &e).await;
            return Err(e);
        }
    } else {
        info!(cluster = %gateway.cluster, "No access to cluster left, skipping gateway cleanup");
    }
    if let Err(e) = gateway.uninstall().await {
        report_remaining(ctx, reference, &e).await;
        return Err(e);
    }
    ctx.broker.release(&gateway.cluster).await?;

    remove_finalizer(ctx.platform.as_ref(), obj, GATEWAY_FINALIZER).await?;

    ctx.events
        .publish(
            reference,
            EventType::Normal,
            reasons::GATEWAY_UNINSTALLED,
            actions::UNINSTALL_GATEWAY,
            Some("Gateway uninstalled successfully".to_string()),
        )
        .await;
    info!(cluster = %gateway.cluster, "Gateway uninstalled");
    Ok(Some(Action::await_change()))
}

async fn report_remaining(ctx: &Context, reference: &ObjectReference, err: &Error) {
    if !err.is_remaining_resources() {
        return;
    }
    ctx.events
        .publish(
            reference,
            EventType::Normal,
            reasons::REMAINING_RESOURCES,
            actions::UNINSTALL_GATEWAY,
            Some(err.to_string()),
        )
        .await;
}

#[cfg(test)]
#[path = "cluster_tests.rs"]
mod cluster_tests;
