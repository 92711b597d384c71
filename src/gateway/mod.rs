// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Envoy Gateway lifecycle for one target cluster.
//!
//! [`Gateway`] composes the [`recipes`] with the apply/delete primitives:
//!
//! - [`Gateway::install_or_update`] - control plane namespace and pull secrets
//!   on the target, chart source and release on the platform
//! - [`Gateway::configure`] - `GatewayClass`, `EnvoyProxy` and `Gateway` on the target
//! - [`Gateway::cleanup`] - removes the data plane objects from the target
//! - [`Gateway::uninstall`] - removes the chart delivery objects from the platform
//!
//! Apply failures caused by a kind the remote store does not serve yet are
//! turned into a retryable condition; every other failure is returned as is.

use std::fmt;
use std::sync::Arc;

use kube::api::DynamicObject;
use tracing::{debug, info};

use crate::access::TargetAccess;
use crate::constants::{
    DEPLOYMENT_NAMESPACE, GATEWAY_NAMESPACE, KIND_CLUSTER, KIND_NOT_REGISTERED_BACKOFF,
    KIND_SECRET,
};
use crate::crd::GatewayServiceConfigSpec;
use crate::errors::Error;
use crate::labels::{managed_selector, COMPONENT_CREDENTIALS};
use crate::reconcilers::resources::{apply_all, ensure_deleted};
use crate::store::{ObjectKey, ObjectStore};

pub mod recipes;

/// Name and namespace of a `Cluster`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ClusterIdentity {
    pub namespace: String,
    pub name: String,
}

impl ClusterIdentity {
    #[must_use]
    pub fn new(namespace: &str, name: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }

    /// Key of the `Cluster` object on the platform.
    #[must_use]
    pub fn key(&self) -> ObjectKey {
        ObjectKey::namespaced(KIND_CLUSTER, &self.namespace, &self.name)
    }
}

impl fmt::Display for ClusterIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Gateway manager bound to one cluster and its stores.
///
/// Only [`Gateway::uninstall`] works without target access.
pub struct Gateway {
    pub cluster: ClusterIdentity,
    /// Provider configuration. Only needed to install and configure.
    pub spec: Option<GatewayServiceConfigSpec>,
    pub platform: Arc<dyn ObjectStore>,
    /// Access to the target cluster. Absent once it has been withdrawn.
    pub access: Option<TargetAccess>,
    /// Namespace holding the configured source secrets.
    pub provider_namespace: String,
}

impl Gateway {
    fn spec(&self) -> Result<&GatewayServiceConfigSpec, Error> {
        self.spec
            .as_ref()
            .ok_or_else(|| Error::invalid(format!("no gateway configuration for cluster {}", self.cluster)))
    }

    fn access(&self) -> Result<&TargetAccess, Error> {
        self.access
            .as_ref()
            .ok_or_else(|| Error::invalid(format!("no access to cluster {}", self.cluster)))
    }

    async fn source_secret(&self, name: &str) -> Result<DynamicObject, Error> {
        let key = ObjectKey::namespaced(KIND_SECRET, &self.provider_namespace, name);
        self.platform.get(&key).await.map_err(Error::fatal)
    }

    /// Installs or updates the Envoy Gateway control plane.
    ///
    /// Copies the configured pull secrets to the target and the chart
    /// credentials next to the chart source, then applies the chart source and
    /// release as one batch.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotYetAvailable`] while a kind is not served, and
    /// [`Error::Fatal`] for any other failure.
    pub async fn install_or_update(&self) -> Result<(), Error> {
        let spec = self.spec()?;
        let access = self.access()?;
        let target = access.store.as_ref();
        info!(cluster = %self.cluster, tag = %spec.envoy_gateway.chart.tag, "Installing Envoy Gateway");

        let mut ops = vec![recipes::namespace(&self.cluster, DEPLOYMENT_NAMESPACE).on(target)];

        for pull_secret in spec.image_pull_secrets() {
            let source = self.source_secret(&pull_secret.name).await?;
            ops.push(
                recipes::copied_secret(&self.cluster, recipes::pull_secret_key(&pull_secret.name), &source)
                    .on(target),
            );
        }

        let credentials = match &spec.envoy_gateway.chart.secret_ref {
            Some(secret_ref) => {
                let source = self.source_secret(&secret_ref.name).await?;
                let key = recipes::chart_credentials_key(&self.cluster);
                let name = key.name.clone();
                ops.push(recipes::copied_secret(&self.cluster, key, &source));
                Some(name)
            }
            None => None,
        };

        ops.push(recipes::oci_repository(
            &self.cluster,
            &spec.envoy_gateway.chart,
            credentials,
        ));
        ops.push(recipes::helm_release(&self.cluster, spec, &access.kubeconfig_secret));

        apply_all(self.platform.as_ref(), ops)
            .await
            .map_err(|e| e.retry_if_unregistered(KIND_NOT_REGISTERED_BACKOFF))?;
        debug!(cluster = %self.cluster, "Envoy Gateway control plane applied");
        Ok(())
    }

    /// Applies the data plane objects on the target cluster.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotYetAvailable`] while the Gateway API or Envoy Gateway
    /// CRDs are not served, and [`Error::Fatal`] for any other failure.
    pub async fn configure(&self) -> Result<(), Error> {
        let spec = self.spec()?;
        let target = self.access()?.store.as_ref();
        info!(
            cluster = %self.cluster,
            base_domain = %recipes::base_domain(&self.cluster, spec),
            "Configuring gateway"
        );

        let ops = vec![
            recipes::namespace(&self.cluster, GATEWAY_NAMESPACE),
            recipes::gateway_class(&self.cluster),
            recipes::envoy_proxy(&self.cluster, spec),
            recipes::gateway(&self.cluster, spec),
        ];

        apply_all(target, ops)
            .await
            .map_err(|e| e.retry_if_unregistered(KIND_NOT_REGISTERED_BACKOFF))?;
        Ok(())
    }

    /// Deletes the data plane objects and the copied pull secrets from the target.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RemainingResources`] until every object is gone.
    pub async fn cleanup(&self) -> Result<(), Error> {
        let target = self.access()?.store.as_ref();
        info!(cluster = %self.cluster, "Cleaning up gateway");

        let mut keys = vec![
            recipes::gateway_key(),
            recipes::envoy_proxy_key(),
            recipes::gateway_class_key(),
        ];
        let copies = target
            .list(
                KIND_SECRET,
                Some(DEPLOYMENT_NAMESPACE),
                &managed_selector(COMPONENT_CREDENTIALS),
            )
            .await
            .map_err(Error::fatal)?;
        for copy in &copies {
            keys.push(ObjectKey::from_object(copy).map_err(Error::fatal)?);
        }

        ensure_deleted(target, &keys).await
    }

    /// Deletes the chart delivery objects from the platform.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RemainingResources`] until every object is gone.
    pub async fn uninstall(&self) -> Result<(), Error> {
        info!(cluster = %self.cluster, "Uninstalling Envoy Gateway");

        let keys = [
            recipes::helm_release_key(&self.cluster),
            recipes::oci_repository_key(&self.cluster),
            recipes::chart_credentials_key(&self.cluster),
        ];
        ensure_deleted(self.platform.as_ref(), &keys).await
    }
}
