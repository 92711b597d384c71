// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Explicit kind registry.
//!
//! A [`Registry`] is built once per process and handed to every store. There is
//! no global scheme: a store can only address the kinds of its own registry.

use std::collections::BTreeMap;

use kube::api::{ApiResource, DynamicObject};
use kube::core::{GroupVersionKind, TypeMeta};
use serde_json::{Map, Value};

use super::{ObjectKey, StoreError};
use crate::constants::{
    API_GROUP, API_VERSION, CLUSTERS_API_GROUP, ENVOY_GATEWAY_API_GROUP, KIND_ACCESS_REQUEST,
    KIND_CLUSTER, KIND_ENVOY_PROXY, KIND_GATEWAY, KIND_GATEWAY_CLASS, KIND_GATEWAY_SERVICE_CONFIG,
    KIND_HELM_RELEASE, KIND_NAMESPACE, KIND_OCI_REPOSITORY, KIND_SECRET,
};

/// API group of the Flux source controller
pub const FLUX_SOURCE_GROUP: &str = "source.toolkit.fluxcd.io";

/// API group of the Flux helm controller
pub const FLUX_HELM_GROUP: &str = "helm.toolkit.fluxcd.io";

/// API group of the Gateway API
pub const GATEWAY_API_GROUP: &str = "gateway.networking.k8s.io";

/// Group, version, plural and scope of one kind.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KindInfo {
    pub group: String,
    pub version: String,
    pub kind: String,
    pub plural: String,
    pub namespaced: bool,
}

impl KindInfo {
    #[must_use]
    pub fn new(group: &str, version: &str, kind: &str, plural: &str, namespaced: bool) -> Self {
        Self {
            group: group.to_string(),
            version: version.to_string(),
            kind: kind.to_string(),
            plural: plural.to_string(),
            namespaced,
        }
    }

    /// `group/version`, or just `version` for the core group.
    #[must_use]
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }

    #[must_use]
    pub fn gvk(&self) -> GroupVersionKind {
        GroupVersionKind::gvk(&self.group, &self.version, &self.kind)
    }

    #[must_use]
    pub fn api_resource(&self) -> ApiResource {
        ApiResource::from_gvk_with_plural(&self.gvk(), &self.plural)
    }
}

/// Set of kinds a store can address.
#[derive(Clone, Debug, Default)]
pub struct Registry {
    kinds: BTreeMap<String, KindInfo>,
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a kind, replacing any previous entry with the same kind name.
    #[must_use]
    pub fn with(mut self, info: KindInfo) -> Self {
        self.kinds.insert(info.kind.clone(), info);
        self
    }

    /// Kinds read and written on the platform cluster.
    #[must_use]
    pub fn platform() -> Self {
        Self::new()
            .with(KindInfo::new(CLUSTERS_API_GROUP, "v1alpha1", KIND_CLUSTER, "clusters", true))
            .with(KindInfo::new(
                CLUSTERS_API_GROUP,
                "v1alpha1",
                KIND_ACCESS_REQUEST,
                "accessrequests",
                true,
            ))
            .with(KindInfo::new(
                API_GROUP,
                API_VERSION,
                KIND_GATEWAY_SERVICE_CONFIG,
                "gatewayserviceconfigs",
                false,
            ))
            .with(KindInfo::new("", "v1", KIND_SECRET, "secrets", true))
            .with(KindInfo::new(
                FLUX_SOURCE_GROUP,
                "v1",
                KIND_OCI_REPOSITORY,
                "ocirepositories",
                true,
            ))
            .with(KindInfo::new(FLUX_HELM_GROUP, "v2", KIND_HELM_RELEASE, "helmreleases", true))
    }

    /// Kinds written on a target cluster.
    #[must_use]
    pub fn target() -> Self {
        Self::new()
            .with(KindInfo::new("", "v1", KIND_NAMESPACE, "namespaces", false))
            .with(KindInfo::new("", "v1", KIND_SECRET, "secrets", true))
            .with(KindInfo::new(
                GATEWAY_API_GROUP,
                "v1",
                KIND_GATEWAY_CLASS,
                "gatewayclasses",
                false,
            ))
            .with(KindInfo::new(GATEWAY_API_GROUP, "v1", KIND_GATEWAY, "gateways", true))
            .with(KindInfo::new(
                ENVOY_GATEWAY_API_GROUP,
                "v1alpha1",
                KIND_ENVOY_PROXY,
                "envoyproxies",
                true,
            ))
    }

    /// Looks up a kind.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnknownKind`] if the kind is not registered.
    pub fn lookup(&self, kind: &str) -> Result<&KindInfo, StoreError> {
        self.kinds.get(kind).ok_or_else(|| StoreError::UnknownKind {
            kind: kind.to_string(),
        })
    }

    /// Checks that the key's scope matches the kind's scope.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnknownKind`] or [`StoreError::Invalid`].
    pub fn validate(&self, key: &ObjectKey) -> Result<&KindInfo, StoreError> {
        let info = self.lookup(&key.kind)?;
        match (info.namespaced, key.namespace.is_some()) {
            (true, false) => Err(StoreError::Invalid(format!("{key} requires a namespace"))),
            (false, true) => Err(StoreError::Invalid(format!(
                "{key} is cluster-scoped and cannot have a namespace"
            ))),
            _ => Ok(info),
        }
    }

    /// Builds an empty envelope for the key: type meta, name and namespace only.
    ///
    /// # Errors
    ///
    /// Returns an error if the key does not validate against the registry.
    pub fn new_object(&self, key: &ObjectKey) -> Result<DynamicObject, StoreError> {
        let info = self.validate(key)?;
        let mut obj = DynamicObject::new(&key.name, &info.api_resource());
        obj.types = Some(TypeMeta {
            api_version: info.api_version(),
            kind: info.kind.clone(),
        });
        obj.metadata.namespace.clone_from(&key.namespace);
        obj.data = Value::Object(Map::new());
        Ok(obj)
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod registry_tests;
