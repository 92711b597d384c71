// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! kube-rs backed [`ObjectStore`].
//!
//! Kinds are resolved through API discovery. Successful lookups are cached for
//! the lifetime of the store; misses are not, so a CRD installed after the
//! first attempt is picked up by the next call.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use kube::api::{Api, DeleteParams, DynamicObject, ListParams, PostParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::discovery::{self, ApiResource, Scope};
use kube::{Client, Config};
use tokio::sync::RwLock;
use tracing::debug;

use super::{ObjectKey, ObjectStore, Registry, StoreError};

/// Store talking to a Kubernetes API server.
pub struct KubeStore {
    client: Client,
    registry: Arc<Registry>,
    resolved: RwLock<HashMap<String, (ApiResource, bool)>>,
}

impl KubeStore {
    #[must_use]
    pub fn new(client: Client, registry: Arc<Registry>) -> Self {
        Self {
            client,
            registry,
            resolved: RwLock::new(HashMap::new()),
        }
    }

    /// Builds a store from a kubeconfig document.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Access`] if the kubeconfig cannot be parsed or no
    /// client can be built from it.
    pub async fn from_kubeconfig(yaml: &str, registry: Arc<Registry>) -> Result<Self, StoreError> {
        let kubeconfig = Kubeconfig::from_yaml(yaml)
            .map_err(|e| StoreError::Access(format!("invalid kubeconfig: {e}")))?;
        let config = Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
            .await
            .map_err(|e| StoreError::Access(format!("unusable kubeconfig: {e}")))?;
        let client = Client::try_from(config)
            .map_err(|e| StoreError::Access(format!("failed to build client: {e}")))?;
        Ok(Self::new(client, registry))
    }

    async fn resolve(&self, kind: &str) -> Result<(ApiResource, bool), StoreError> {
        if let Some(hit) = self.resolved.read().await.get(kind) {
            return Ok(hit.clone());
        }

        let info = self.registry.lookup(kind)?;
        match discovery::pinned_kind(&self.client, &info.gvk()).await {
            Ok((resource, caps)) => {
                let resolved = (resource, matches!(caps.scope, Scope::Namespaced));
                self.resolved
                    .write()
                    .await
                    .insert(kind.to_string(), resolved.clone());
                debug!(kind = %kind, api_version = %info.api_version(), "Resolved kind via discovery");
                Ok(resolved)
            }
            Err(kube::Error::Discovery(_)) => Err(StoreError::KindNotRegistered {
                kind: kind.to_string(),
            }),
            Err(kube::Error::Api(ref e)) if e.code == 404 => Err(StoreError::KindNotRegistered {
                kind: kind.to_string(),
            }),
            Err(e) => Err(StoreError::Api(e)),
        }
    }

    async fn api(&self, kind: &str, namespace: Option<&str>) -> Result<Api<DynamicObject>, StoreError> {
        let (resource, namespaced) = self.resolve(kind).await?;
        Ok(match (namespaced, namespace) {
            (true, Some(ns)) => Api::namespaced_with(self.client.clone(), ns, &resource),
            _ => Api::all_with(self.client.clone(), &resource),
        })
    }
}

/// Maps a kube error on a keyed request to a [`StoreError`].
pub(crate) fn classify(err: kube::Error, key: &ObjectKey) -> StoreError {
    match err {
        kube::Error::Api(ref e) if e.code == 404 => StoreError::NotFound { key: key.clone() },
        kube::Error::Api(ref e) if e.code == 409 && e.reason == "AlreadyExists" => {
            StoreError::AlreadyExists { key: key.clone() }
        }
        kube::Error::Api(ref e) if e.code == 409 => StoreError::Conflict {
            key: key.clone(),
            message: e.message.clone(),
        },
        other => StoreError::Api(other),
    }
}

/// Renders a label map as a selector string.
fn label_selector(labels: &BTreeMap<String, String>) -> String {
    labels
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(",")
}

#[async_trait]
impl ObjectStore for KubeStore {
    fn registry(&self) -> &Registry {
        &self.registry
    }

    async fn get(&self, key: &ObjectKey) -> Result<DynamicObject, StoreError> {
        self.registry.validate(key)?;
        let api = self.api(&key.kind, key.namespace.as_deref()).await?;
        let mut obj = api.get(&key.name).await.map_err(|e| classify(e, key))?;
        fill_types(&self.registry, &key.kind, &mut obj)?;
        Ok(obj)
    }

    async fn list(
        &self,
        kind: &str,
        namespace: Option<&str>,
        labels: &BTreeMap<String, String>,
    ) -> Result<Vec<DynamicObject>, StoreError> {
        let api = self.api(kind, namespace).await?;
        let mut params = ListParams::default();
        if !labels.is_empty() {
            params = params.labels(&label_selector(labels));
        }
        let list = api.list(&params).await.map_err(StoreError::Api)?;
        list.items
            .into_iter()
            .map(|mut obj| {
                fill_types(&self.registry, kind, &mut obj)?;
                Ok(obj)
            })
            .collect()
    }

    async fn create(&self, obj: &DynamicObject) -> Result<DynamicObject, StoreError> {
        let key = ObjectKey::from_object(obj)?;
        self.registry.validate(&key)?;
        let api = self.api(&key.kind, key.namespace.as_deref()).await?;
        let mut created = api
            .create(&PostParams::default(), obj)
            .await
            .map_err(|e| classify(e, &key))?;
        fill_types(&self.registry, &key.kind, &mut created)?;
        Ok(created)
    }

    async fn update(&self, obj: &DynamicObject) -> Result<DynamicObject, StoreError> {
        let key = ObjectKey::from_object(obj)?;
        self.registry.validate(&key)?;
        let api = self.api(&key.kind, key.namespace.as_deref()).await?;
        let mut updated = api
            .replace(&key.name, &PostParams::default(), obj)
            .await
            .map_err(|e| classify(e, &key))?;
        fill_types(&self.registry, &key.kind, &mut updated)?;
        Ok(updated)
    }

    async fn delete(&self, key: &ObjectKey) -> Result<(), StoreError> {
        self.registry.validate(key)?;
        let api = self.api(&key.kind, key.namespace.as_deref()).await?;
        api.delete(&key.name, &DeleteParams::background())
            .await
            .map_err(|e| classify(e, key))?;
        Ok(())
    }
}

/// List items come back without type meta; restore it from the registry.
fn fill_types(registry: &Registry, kind: &str, obj: &mut DynamicObject) -> Result<(), StoreError> {
    if obj.types.as_ref().is_none_or(|t| t.kind.is_empty()) {
        let info = registry.lookup(kind)?;
        obj.types = Some(kube::core::TypeMeta {
            api_version: info.api_version(),
            kind: info.kind.clone(),
        });
    }
    Ok(())
}

#[cfg(test)]
#[path = "kubernetes_tests.rs"]
mod kubernetes_tests;
