// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! In-memory [`ObjectStore`] for unit tests.
//!
//! Emulates the parts of an API server the controller depends on:
//! resource versions and conflicts, asynchronous deletion, finalizers, kinds
//! that are not served yet, and a write counter to detect no-op updates.
//! Deletes only mark objects; tests finish them with [`MemoryStore::complete_deletions`]
//! or [`MemoryStore::purge`].

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use async_trait::async_trait;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::api::DynamicObject;
use kube::core::Status;

use super::{ObjectKey, ObjectStore, Registry, StoreError};

#[derive(Default)]
struct State {
    objects: BTreeMap<ObjectKey, DynamicObject>,
    uninstalled: BTreeSet<String>,
    forbidden: BTreeSet<String>,
    version: u64,
    writes: usize,
    deletes: usize,
}

pub struct MemoryStore {
    registry: Registry,
    state: Mutex<State>,
}

/// Fixed timestamp used for deletion markers.
pub fn deletion_time() -> Time {
    serde_json::from_value(serde_json::json!("2025-01-01T00:00:00Z")).expect("valid timestamp")
}

impl MemoryStore {
    pub fn new(registry: Registry) -> Self {
        Self {
            registry,
            state: Mutex::new(State::default()),
        }
    }

    pub fn platform() -> Self {
        Self::new(Registry::platform())
    }

    pub fn target() -> Self {
        Self::new(Registry::target())
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().expect("memory store lock poisoned")
    }

    /// Makes the server stop serving a kind, as if its CRD were missing.
    pub fn uninstall_kind(&self, kind: &str) {
        self.state().uninstalled.insert(kind.to_string());
    }

    pub fn install_kind(&self, kind: &str) {
        self.state().uninstalled.remove(kind);
    }

    /// Rejects every write to a kind with HTTP 403.
    pub fn forbid_writes(&self, kind: &str) {
        self.state().forbidden.insert(kind.to_string());
    }

    /// Seeds an object without counting a write.
    pub fn insert(&self, mut obj: DynamicObject) -> ObjectKey {
        let key = ObjectKey::from_object(&obj).expect("fixture needs kind and name");
        self.registry.validate(&key).expect("fixture kind must be registered");
        let mut state = self.state();
        state.version += 1;
        obj.metadata.resource_version = Some(state.version.to_string());
        state.objects.insert(key.clone(), obj);
        key
    }

    /// Raw view of an object, including objects marked for deletion.
    pub fn object(&self, key: &ObjectKey) -> Option<DynamicObject> {
        self.state().objects.get(key).cloned()
    }

    pub fn contains(&self, key: &ObjectKey) -> bool {
        self.state().objects.contains_key(key)
    }

    pub fn is_marked_for_deletion(&self, key: &ObjectKey) -> bool {
        self.state()
            .objects
            .get(key)
            .is_some_and(|o| o.metadata.deletion_timestamp.is_some())
    }

    pub fn keys(&self) -> Vec<ObjectKey> {
        self.state().objects.keys().cloned().collect()
    }

    /// Number of creates and updates performed through the store API.
    pub fn writes(&self) -> usize {
        self.state().writes
    }

    /// Number of accepted deletes.
    pub fn deletes(&self) -> usize {
        self.state().deletes
    }

    /// Removes every marked object that has no finalizers left.
    pub fn complete_deletions(&self) {
        self.state().objects.retain(|_, o| {
            o.metadata.deletion_timestamp.is_none()
                || o.metadata.finalizers.as_ref().is_some_and(|f| !f.is_empty())
        });
    }

    /// Removes an object regardless of its state.
    pub fn purge(&self, key: &ObjectKey) {
        self.state().objects.remove(key);
    }

    fn check(&self, state: &State, key: &ObjectKey) -> Result<(), StoreError> {
        self.registry.validate(key)?;
        if state.uninstalled.contains(&key.kind) {
            return Err(StoreError::KindNotRegistered {
                kind: key.kind.clone(),
            });
        }
        Ok(())
    }

    fn check_write(&self, state: &State, key: &ObjectKey) -> Result<(), StoreError> {
        self.check(state, key)?;
        if state.forbidden.contains(&key.kind) {
            return Err(StoreError::Api(kube::Error::Api(
                Status::failure(&format!("writes to {} are forbidden", key.kind), "Forbidden")
                    .with_code(403)
                    .boxed(),
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    fn registry(&self) -> &Registry {
        &self.registry
    }

    async fn get(&self, key: &ObjectKey) -> Result<DynamicObject, StoreError> {
        let state = self.state();
        self.check(&state, key)?;
        state
            .objects
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound { key: key.clone() })
    }

    async fn list(
        &self,
        kind: &str,
        namespace: Option<&str>,
        labels: &BTreeMap<String, String>,
    ) -> Result<Vec<DynamicObject>, StoreError> {
        let state = self.state();
        self.registry.lookup(kind)?;
        if state.uninstalled.contains(kind) {
            return Err(StoreError::KindNotRegistered {
                kind: kind.to_string(),
            });
        }
        Ok(state
            .objects
            .iter()
            .filter(|(key, _)| key.kind == kind)
            .filter(|(key, _)| namespace.is_none() || key.namespace.as_deref() == namespace)
            .filter(|(_, obj)| {
                let current = obj.metadata.labels.clone().unwrap_or_default();
                labels.iter().all(|(k, v)| current.get(k) == Some(v))
            })
            .map(|(_, obj)| obj.clone())
            .collect())
    }

    async fn create(&self, obj: &DynamicObject) -> Result<DynamicObject, StoreError> {
        let key = ObjectKey::from_object(obj)?;
        let mut state = self.state();
        self.check_write(&state, &key)?;
        if state.objects.contains_key(&key) {
            return Err(StoreError::AlreadyExists { key });
        }
        state.version += 1;
        state.writes += 1;
        let mut created = obj.clone();
        created.metadata.resource_version = Some(state.version.to_string());
        created.metadata.deletion_timestamp = None;
        state.objects.insert(key, created.clone());
        Ok(created)
    }

    async fn update(&self, obj: &DynamicObject) -> Result<DynamicObject, StoreError> {
        let key = ObjectKey::from_object(obj)?;
        let mut state = self.state();
        self.check_write(&state, &key)?;
        let Some(current) = state.objects.get(&key) else {
            return Err(StoreError::NotFound { key });
        };
        if obj
            .metadata
            .resource_version
            .as_ref()
            .is_some_and(|rv| Some(rv) != current.metadata.resource_version.as_ref())
        {
            return Err(StoreError::Conflict {
                key,
                message: "the object has been modified".to_string(),
            });
        }
        let deletion_timestamp = current.metadata.deletion_timestamp.clone();

        state.version += 1;
        state.writes += 1;
        let mut updated = obj.clone();
        updated.metadata.resource_version = Some(state.version.to_string());
        updated.metadata.deletion_timestamp = deletion_timestamp;

        let finalized = updated.metadata.deletion_timestamp.is_some()
            && updated.metadata.finalizers.as_ref().is_none_or(Vec::is_empty);
        if finalized {
            state.objects.remove(&key);
        } else {
            state.objects.insert(key, updated.clone());
        }
        Ok(updated)
    }

    async fn delete(&self, key: &ObjectKey) -> Result<(), StoreError> {
        let mut state = self.state();
        self.check_write(&state, key)?;
        let Some(current) = state.objects.get_mut(key) else {
            return Err(StoreError::NotFound { key: key.clone() });
        };
        if current.metadata.deletion_timestamp.is_none() {
            current.metadata.deletion_timestamp = Some(deletion_time());
        }
        state.deletes += 1;
        Ok(())
    }
}
