// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Client model for the remote declarative stores.
//!
//! Every object the controller touches is addressed by an [`ObjectKey`] and
//! carried as a [`DynamicObject`] envelope: typed metadata plus an opaque JSON
//! attribute mapping. Stores resolve kinds through an explicit [`Registry`]
//! handed to them at construction.
//!
//! - [`ObjectStore`] - `get`/`list`/`create`/`update`/`delete` by key
//! - [`kubernetes::KubeStore`] - kube-rs backed store
//! - `memory::MemoryStore` - in-memory store used by unit tests

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use kube::api::DynamicObject;
use kube::ResourceExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

pub mod kubernetes;
#[cfg(test)]
pub mod memory;
pub mod registry;

pub use kubernetes::KubeStore;
pub use registry::{KindInfo, Registry};

/// Identity of a remote object.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectKey {
    pub kind: String,
    pub namespace: Option<String>,
    pub name: String,
}

impl ObjectKey {
    /// Key of a namespaced object.
    #[must_use]
    pub fn namespaced(kind: &str, namespace: &str, name: &str) -> Self {
        Self {
            kind: kind.to_string(),
            namespace: Some(namespace.to_string()),
            name: name.to_string(),
        }
    }

    /// Key of a cluster-scoped object.
    #[must_use]
    pub fn cluster(kind: &str, name: &str) -> Self {
        Self {
            kind: kind.to_string(),
            namespace: None,
            name: name.to_string(),
        }
    }

    /// Derives the key from an envelope. Requires kind and name to be set.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Invalid`] if the object has no kind or no name.
    pub fn from_object(obj: &DynamicObject) -> Result<Self, StoreError> {
        let kind = obj
            .types
            .as_ref()
            .map(|t| t.kind.clone())
            .filter(|k| !k.is_empty())
            .ok_or_else(|| StoreError::Invalid("object has no kind".to_string()))?;
        let name = obj
            .metadata
            .name
            .clone()
            .filter(|n| !n.is_empty())
            .ok_or_else(|| StoreError::Invalid(format!("{kind} has no name")))?;
        Ok(Self {
            kind,
            namespace: obj.metadata.namespace.clone().filter(|ns| !ns.is_empty()),
            name,
        })
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}/{}/{}", self.kind, ns, self.name),
            None => write!(f, "{}/{}", self.kind, self.name),
        }
    }
}

/// Errors returned by an [`ObjectStore`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{key} not found")]
    NotFound { key: ObjectKey },

    /// The kind is known to the registry but the server does not serve it (yet).
    #[error("kind {kind} is not registered on the server")]
    KindNotRegistered { kind: String },

    /// The kind is not part of the registry the store was built with.
    #[error("kind {kind} is not part of the registry")]
    UnknownKind { kind: String },

    #[error("{key} already exists")]
    AlreadyExists { key: ObjectKey },

    #[error("conflict writing {key}: {message}")]
    Conflict { key: ObjectKey, message: String },

    #[error("invalid object: {0}")]
    Invalid(String),

    #[error("failed to build cluster access: {0}")]
    Access(String),

    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("kubernetes API error: {0}")]
    Api(#[from] kube::Error),
}

impl StoreError {
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    #[must_use]
    pub fn is_kind_not_registered(&self) -> bool {
        matches!(self, Self::KindNotRegistered { .. })
    }
}

/// Client of one remote declarative store.
///
/// `delete` is asynchronous: an accepted delete does not mean the object is
/// gone. Absence is confirmed only by a later `get` returning
/// [`StoreError::NotFound`].
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Registry used to resolve kinds.
    fn registry(&self) -> &Registry;

    async fn get(&self, key: &ObjectKey) -> Result<DynamicObject, StoreError>;

    /// Lists objects of a kind, optionally in one namespace, matching all given labels.
    async fn list(
        &self,
        kind: &str,
        namespace: Option<&str>,
        labels: &BTreeMap<String, String>,
    ) -> Result<Vec<DynamicObject>, StoreError>;

    async fn create(&self, obj: &DynamicObject) -> Result<DynamicObject, StoreError>;

    /// Replaces the object. The store rejects stale `resourceVersion`s.
    async fn update(&self, obj: &DynamicObject) -> Result<DynamicObject, StoreError>;

    async fn delete(&self, key: &ObjectKey) -> Result<(), StoreError>;
}

/// Accessors on the opaque attribute mapping of an envelope.
pub trait Envelope {
    /// Reads a nested field, e.g. `&["spec", "chartRef", "name"]`.
    fn field(&self, path: &[&str]) -> Option<&Value>;

    /// Writes a nested field, creating intermediate objects as needed.
    fn set_field(&mut self, path: &[&str], value: Value);

    /// Removes a nested field, returning its previous value.
    fn remove_field(&mut self, path: &[&str]) -> Option<Value>;

    /// Deserializes a nested field. `Ok(None)` if the field is absent.
    fn parse_field<T: DeserializeOwned>(&self, path: &[&str]) -> Result<Option<T>, StoreError>;

    /// Serializes and writes a nested field.
    fn store_field<T: Serialize>(&mut self, path: &[&str], value: &T) -> Result<(), StoreError>;

    fn annotation(&self, key: &str) -> Option<&str>;

    fn set_annotation(&mut self, key: &str, value: &str);

    /// Returns true if the annotation was present.
    fn remove_annotation(&mut self, key: &str) -> bool;

    /// Merges the given labels into the object's labels.
    fn merge_labels(&mut self, labels: &BTreeMap<String, String>);

    fn is_deleting(&self) -> bool;
}

impl Envelope for DynamicObject {
    fn field(&self, path: &[&str]) -> Option<&Value> {
        path.iter().try_fold(&self.data, |value, segment| value.get(segment))
    }

    fn set_field(&mut self, path: &[&str], value: Value) {
        let Some((last, parents)) = path.split_last() else {
            self.data = value;
            return;
        };
        let mut current = &mut self.data;
        for segment in parents {
            current = ensure_object(current)
                .entry((*segment).to_string())
                .or_insert_with(|| Value::Object(Map::new()));
        }
        ensure_object(current).insert((*last).to_string(), value);
    }

    fn remove_field(&mut self, path: &[&str]) -> Option<Value> {
        let (last, parents) = path.split_last()?;
        let parent = parents
            .iter()
            .try_fold(&mut self.data, |value, segment| value.get_mut(segment))?;
        parent.as_object_mut()?.remove(*last)
    }

    fn parse_field<T: DeserializeOwned>(&self, path: &[&str]) -> Result<Option<T>, StoreError> {
        match self.field(path) {
            Some(Value::Null) | None => Ok(None),
            Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
        }
    }

    fn store_field<T: Serialize>(&mut self, path: &[&str], value: &T) -> Result<(), StoreError> {
        self.set_field(path, serde_json::to_value(value)?);
        Ok(())
    }

    fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations().get(key).map(String::as_str)
    }

    fn set_annotation(&mut self, key: &str, value: &str) {
        self.annotations_mut()
            .insert(key.to_string(), value.to_string());
    }

    fn remove_annotation(&mut self, key: &str) -> bool {
        let removed = self
            .metadata
            .annotations
            .as_mut()
            .and_then(|a| a.remove(key))
            .is_some();
        if self.metadata.annotations.as_ref().is_some_and(BTreeMap::is_empty) {
            self.metadata.annotations = None;
        }
        removed
    }

    fn merge_labels(&mut self, labels: &BTreeMap<String, String>) {
        let current = self.labels_mut();
        for (k, v) in labels {
            current.insert(k.clone(), v.clone());
        }
    }

    fn is_deleting(&self) -> bool {
        self.metadata.deletion_timestamp.is_some()
    }
}

fn ensure_object(value: &mut Value) -> &mut Map<String, Value> {
    if !value.is_object() {
        *value = Value::Object(Map::new());
    }
    match value {
        Value::Object(map) => map,
        _ => unreachable!("value was just replaced with an object"),
    }
}
