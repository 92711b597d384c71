// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Access to target clusters.
//!
//! The reconciler never talks to a target cluster directly. It asks an
//! [`AccessBroker`] for a store, and the broker answers either with a ready
//! store or with a hint to come back later.
//!
//! [`AccessRequestBroker`] obtains access through the cluster inventory: it
//! maintains one `AccessRequest` per cluster on the platform, waits until the
//! request is granted, then builds a store from the issued kubeconfig.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use kube::api::DynamicObject;
use tracing::{debug, info, warn};

use crate::constants::{
    ACCESS_CLUSTER_ROLE, ACCESS_PENDING_BACKOFF, ACCESS_PHASE_DENIED, ACCESS_PHASE_GRANTED,
    GATEWAY_SUFFIX, KIND_ACCESS_REQUEST, KIND_SECRET, KUBECONFIG_SECRET_KEY,
};
use crate::crd::{
    AccessRequestSpec, AccessRequestStatus, NamespacedObjectReference, RoleRef, TokenConfig,
};
use crate::errors::Error;
use crate::gateway::ClusterIdentity;
use crate::labels::{managed_labels, COMPONENT_CREDENTIALS};
use crate::reconcilers::resources::{create_or_update, ensure_deleted};
use crate::store::{Envelope, KubeStore, ObjectKey, ObjectStore, Registry, StoreError};

/// Ready access to a target cluster.
#[derive(Clone)]
pub struct TargetAccess {
    /// Store for the target cluster.
    pub store: Arc<dyn ObjectStore>,
    /// Secret in the cluster's namespace on the platform holding the kubeconfig.
    pub kubeconfig_secret: String,
}

/// Outcome of [`AccessBroker::acquire`] and [`AccessBroker::lookup`].
pub enum AccessState {
    Pending { retry_after: Duration },
    Ready(TargetAccess),
}

/// Hands out target cluster stores.
#[async_trait]
pub trait AccessBroker: Send + Sync {
    /// Requests access to the cluster, or refreshes an existing request.
    ///
    /// Must be idempotent.
    async fn acquire(&self, cluster: &ClusterIdentity) -> Result<AccessState, Error>;

    /// Reads the access already held for the cluster without requesting any.
    ///
    /// Returns `None` when no access exists or it is being withdrawn.
    async fn lookup(&self, cluster: &ClusterIdentity) -> Result<Option<AccessState>, Error>;

    /// Withdraws access to the cluster.
    ///
    /// Returns [`Error::RemainingResources`] until the withdrawal is complete.
    async fn release(&self, cluster: &ClusterIdentity) -> Result<(), Error>;
}

/// Builds a target store from a kubeconfig document.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, kubeconfig: &str) -> Result<Arc<dyn ObjectStore>, StoreError>;
}

/// [`Connector`] producing [`KubeStore`]s with the target registry.
pub struct KubeconfigConnector {
    registry: Arc<Registry>,
}

impl KubeconfigConnector {
    #[must_use]
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Registry::target()),
        }
    }
}

impl Default for KubeconfigConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connector for KubeconfigConnector {
    async fn connect(&self, kubeconfig: &str) -> Result<Arc<dyn ObjectStore>, StoreError> {
        let store = KubeStore::from_kubeconfig(kubeconfig, self.registry.clone()).await?;
        Ok(Arc::new(store))
    }
}

/// [`AccessBroker`] backed by `AccessRequest` objects on the platform.
pub struct AccessRequestBroker {
    platform: Arc<dyn ObjectStore>,
    provider_name: String,
    connector: Arc<dyn Connector>,
}

impl AccessRequestBroker {
    #[must_use]
    pub fn new(
        platform: Arc<dyn ObjectStore>,
        provider_name: &str,
        connector: Arc<dyn Connector>,
    ) -> Self {
        Self {
            platform,
            provider_name: provider_name.to_string(),
            connector,
        }
    }

    /// `AccessRequest` for the cluster: `<provider>.gateway.<cluster>` in the cluster's namespace.
    #[must_use]
    pub fn request_key(&self, cluster: &ClusterIdentity) -> ObjectKey {
        ObjectKey::namespaced(
            KIND_ACCESS_REQUEST,
            &cluster.namespace,
            &format!("{}.{GATEWAY_SUFFIX}.{}", self.provider_name, cluster.name),
        )
    }

    fn desired_spec(cluster: &ClusterIdentity) -> AccessRequestSpec {
        AccessRequestSpec {
            cluster_ref: Some(NamespacedObjectReference {
                name: cluster.name.clone(),
                namespace: cluster.namespace.clone(),
            }),
            token: Some(TokenConfig {
                role_refs: vec![RoleRef {
                    kind: "ClusterRole".to_string(),
                    name: ACCESS_CLUSTER_ROLE.to_string(),
                    namespace: None,
                }],
            }),
        }
    }

    /// Reads the kubeconfig from the granted secret.
    async fn read_kubeconfig(&self, secret: &ObjectKey) -> Result<String, Error> {
        let obj = self.platform.get(secret).await.map_err(Error::fatal)?;
        let encoded: Option<String> = obj
            .parse_field(&["data", KUBECONFIG_SECRET_KEY])
            .map_err(Error::fatal)?;
        let Some(encoded) = encoded else {
            return Err(Error::invalid(format!(
                "{secret} has no {KUBECONFIG_SECRET_KEY} key"
            )));
        };
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| Error::invalid(format!("{secret} holds invalid base64: {e}")))?;
        String::from_utf8(decoded)
            .map_err(|e| Error::invalid(format!("{secret} holds a non UTF-8 kubeconfig: {e}")))
    }

    /// Maps the request's status to an [`AccessState`].
    async fn resolve(
        &self,
        cluster: &ClusterIdentity,
        key: &ObjectKey,
        request: &DynamicObject,
    ) -> Result<AccessState, Error> {
        let status: AccessRequestStatus = request
            .parse_field(&["status"])
            .map_err(Error::fatal)?
            .unwrap_or_default();

        match (status.phase.as_deref(), status.secret_ref) {
            (Some(ACCESS_PHASE_DENIED), _) => {
                warn!(cluster = %cluster, request = %key, "Cluster access was denied");
                Err(Error::invalid(format!("{key} was denied")))
            }
            (Some(ACCESS_PHASE_GRANTED), Some(secret_ref)) => {
                let namespace = secret_ref.namespace.as_deref().unwrap_or(&cluster.namespace);
                let secret = ObjectKey::namespaced(KIND_SECRET, namespace, &secret_ref.name);
                let kubeconfig = self.read_kubeconfig(&secret).await?;
                let store = self
                    .connector
                    .connect(&kubeconfig)
                    .await
                    .map_err(Error::fatal)?;
                debug!(cluster = %cluster, secret = %secret, "Cluster access granted");
                Ok(AccessState::Ready(TargetAccess {
                    store,
                    kubeconfig_secret: secret_ref.name,
                }))
            }
            (phase, _) => {
                info!(
                    cluster = %cluster,
                    request = %key,
                    phase = phase.unwrap_or("<none>"),
                    "Waiting for cluster access"
                );
                Ok(AccessState::Pending {
                    retry_after: ACCESS_PENDING_BACKOFF,
                })
            }
        }
    }
}

#[async_trait]
impl AccessBroker for AccessRequestBroker {
    async fn acquire(&self, cluster: &ClusterIdentity) -> Result<AccessState, Error> {
        let key = self.request_key(cluster);
        let spec = Self::desired_spec(cluster);
        let labels = managed_labels(&cluster.namespace, &cluster.name, COMPONENT_CREDENTIALS);

        let (_, request) = create_or_update(
            self.platform.as_ref(),
            &key,
            Box::new(move |obj: &mut DynamicObject| {
                obj.merge_labels(&labels);
                obj.store_field(&["spec"], &spec).map_err(Error::fatal)
            }),
        )
        .await?;

        self.resolve(cluster, &key, &request).await
    }

    async fn lookup(&self, cluster: &ClusterIdentity) -> Result<Option<AccessState>, Error> {
        let key = self.request_key(cluster);
        let request = match self.platform.get(&key).await {
            Ok(request) => request,
            Err(e) if e.is_not_found() || e.is_kind_not_registered() => return Ok(None),
            Err(e) => return Err(Error::fatal(e)),
        };
        if request.is_deleting() {
            debug!(cluster = %cluster, request = %key, "Cluster access is being withdrawn");
            return Ok(None);
        }
        self.resolve(cluster, &key, &request).await.map(Some)
    }

    async fn release(&self, cluster: &ClusterIdentity) -> Result<(), Error> {
        info!(cluster = %cluster, "Releasing cluster access");
        ensure_deleted(self.platform.as_ref(), &[self.request_key(cluster)]).await
    }
}

/// Broker handing out a fixed store, for unit tests.
#[cfg(test)]
pub struct StaticBroker {
    access: std::sync::Mutex<Option<TargetAccess>>,
    releases: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl StaticBroker {
    pub fn ready(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            access: std::sync::Mutex::new(Some(TargetAccess {
                store,
                kubeconfig_secret: "access-kubeconfig".to_string(),
            })),
            releases: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    pub fn pending() -> Self {
        Self {
            access: std::sync::Mutex::new(None),
            releases: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    pub fn releases(&self) -> usize {
        self.releases.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
#[async_trait]
impl AccessBroker for StaticBroker {
    async fn acquire(&self, _cluster: &ClusterIdentity) -> Result<AccessState, Error> {
        let access = self.access.lock().expect("broker lock poisoned").clone();
        Ok(match access {
            Some(access) => AccessState::Ready(access),
            None => AccessState::Pending {
                retry_after: ACCESS_PENDING_BACKOFF,
            },
        })
    }

    async fn lookup(&self, cluster: &ClusterIdentity) -> Result<Option<AccessState>, Error> {
        if self.releases() > 0 {
            return Ok(None);
        }
        self.acquire(cluster).await.map(Some)
    }

    async fn release(&self, _cluster: &ClusterIdentity) -> Result<(), Error> {
        self.releases
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
#[path = "access_tests.rs"]
mod access_tests;
