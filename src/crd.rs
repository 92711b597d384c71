// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Custom Resource Definitions (CRDs) used by the gateway platform service.
//!
//! # Resource Types
//!
//! ## Owned
//!
//! - [`GatewayServiceConfig`] - Provider configuration: chart coordinates, image
//!   overrides, DNS base domain and the cluster terms selecting target clusters
//!
//! ## External
//!
//! These kinds belong to the cluster inventory. They are declared here so the
//! controller can watch them and read their fields; their CRDs are installed by
//! the inventory itself.
//!
//! - [`Cluster`] - A remote cluster registered on the platform
//! - [`AccessRequest`] - A request for credentials on a [`Cluster`]
//!
//! # Example: Selecting clusters
//!
//! ```rust,no_run
//! use platform_service_gateway::crd::{ClusterRef, ClusterSelector, ClusterTerm};
//! use std::collections::BTreeMap;
//!
//! let terms = vec![
//!     ClusterTerm {
//!         selector: Some(ClusterSelector {
//!             match_labels: Some(BTreeMap::from([("env".to_string(), "prod".to_string())])),
//!             match_purpose: Some("workload".to_string()),
//!         }),
//!         cluster_ref: None,
//!     },
//!     ClusterTerm {
//!         selector: None,
//!         cluster_ref: Some(ClusterRef {
//!             name: "onboarding".to_string(),
//!             namespace: "default".to_string(),
//!         }),
//!     },
//! ];
//! ```

use std::collections::BTreeMap;

use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::{CustomResource, CustomResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::constants::{
    CLUSTER_LABEL, CLUSTER_PURPOSE_PLATFORM, DEFAULT_CHART_URL, DEFAULT_NAMESPACE, DEFAULT_TLS_PORT,
};

/// Reference to an object in the same namespace as the referrer.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct LocalObjectReference {
    /// Name of the referent.
    pub name: String,
}

// ============================================================================
// GatewayServiceConfig
// ============================================================================

/// `GatewayServiceConfig` configures the gateway platform service.
///
/// One configuration exists per provider; the controller reads the object whose
/// name equals its provider name. The object is cluster-scoped.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "gateway.openmcp.cloud",
    version = "v1alpha1",
    kind = "GatewayServiceConfig",
    plural = "gatewayserviceconfigs",
    doc = "GatewayServiceConfig is the configuration of the Gateway platform service. It defines the Envoy Gateway chart to deploy, image overrides, the DNS base domain and which clusters get a gateway."
)]
#[serde(rename_all = "camelCase")]
pub struct GatewayServiceConfigSpec {
    /// Envoy Gateway configuration.
    pub envoy_gateway: EnvoyGatewayConfig,

    /// Clusters that should be included in the gateway configuration.
    ///
    /// A cluster is in scope if any term matches it.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub clusters: Vec<ClusterTerm>,

    /// Gateway configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway: Option<GatewayConfig>,

    /// DNS configuration.
    pub dns: DnsConfig,
}

/// One entry of the cluster list: either a selector or a direct reference.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClusterTerm {
    /// Selector for multiple clusters using labels and purpose.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<ClusterSelector>,

    /// Reference to a single cluster.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_ref: Option<ClusterRef>,
}

/// Selects clusters by labels and purpose. Both must match.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSelector {
    /// Labels the cluster must carry. Extra labels on the cluster are ignored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_labels: Option<BTreeMap<String, String>>,

    /// Purpose the cluster must list. Empty matches any cluster.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_purpose: Option<String>,
}

/// Direct reference to a `Cluster`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClusterRef {
    /// Name of the referenced Cluster.
    #[schemars(length(min = 1))]
    pub name: String,

    /// Namespace of the referenced Cluster.
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

/// Envoy Gateway deployment settings.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EnvoyGatewayConfig {
    /// Overrides container image locations for Envoy components.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<ImagesConfig>,

    /// Chart configuration for Envoy Gateway.
    pub chart: EnvoyGatewayChart,
}

/// Location of the Envoy Gateway Helm chart.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EnvoyGatewayChart {
    /// URL of the chart.
    #[serde(default = "default_chart_url")]
    pub url: String,

    /// Tag of the chart. Example: 1.5.4
    #[schemars(length(min = 1))]
    pub tag: String,

    /// Secret in the provider namespace holding credentials for the chart registry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_ref: Option<LocalObjectReference>,
}

impl Default for EnvoyGatewayChart {
    fn default() -> Self {
        Self {
            url: default_chart_url(),
            tag: String::new(),
            secret_ref: None,
        }
    }
}

fn default_chart_url() -> String {
    DEFAULT_CHART_URL.to_string()
}

/// Image overrides for Envoy components.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImagesConfig {
    /// Envoy proxy image. Example: docker.io/envoyproxy/envoy:distroless-v1.35.3
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,

    /// Envoy Gateway image. Example: docker.io/envoyproxy/gateway:v1.5.1
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway: Option<String>,

    /// Rate limit image. Example: docker.io/envoyproxy/ratelimit:e74a664a
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<String>,

    /// Secrets in the provider namespace holding registry credentials.
    ///
    /// They are copied to every target cluster.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub image_pull_secrets: Vec<LocalObjectReference>,
}

/// Data plane settings.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    /// Port on which the gateway listens for TLS traffic. Defaults to 9443.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_port: Option<i32>,
}

/// DNS settings.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DnsConfig {
    /// Domain from which cluster subdomains are derived. Example: dev.openmcp.example.com
    #[schemars(length(min = 1))]
    pub base_domain: String,
}

impl GatewayServiceConfigSpec {
    /// TLS listener port, falling back to the default.
    #[must_use]
    pub fn tls_port(&self) -> i32 {
        self.gateway
            .as_ref()
            .and_then(|g| g.tls_port)
            .filter(|port| *port > 0)
            .unwrap_or(DEFAULT_TLS_PORT)
    }

    /// Pull secrets referenced by the image overrides.
    #[must_use]
    pub fn image_pull_secrets(&self) -> &[LocalObjectReference] {
        self.envoy_gateway
            .images
            .as_ref()
            .map_or(&[], |images| images.image_pull_secrets.as_slice())
    }
}

/// Returns the `GatewayServiceConfig` CRD labeled for the platform cluster.
#[must_use]
pub fn gateway_service_config_crd() -> CustomResourceDefinition {
    let mut crd = GatewayServiceConfig::crd();
    crd.metadata
        .labels
        .get_or_insert_with(BTreeMap::new)
        .insert(CLUSTER_LABEL.to_string(), CLUSTER_PURPOSE_PLATFORM.to_string());
    crd
}

// ============================================================================
// Cluster (external)
// ============================================================================

/// Spec of an inventory `Cluster`. Only the fields read by this controller.
#[derive(CustomResource, Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "clusters.openmcp.cloud",
    version = "v1alpha1",
    kind = "Cluster",
    plural = "clusters",
    namespaced,
    doc = "Cluster represents a remote cluster registered in the cluster inventory."
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSpec {
    /// Cluster profile.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,

    /// Free-form purposes of the cluster, e.g. `platform` or `workload`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub purposes: Vec<String>,

    /// Tenancy of the cluster.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenancy: Option<String>,
}

// ============================================================================
// AccessRequest (external)
// ============================================================================

/// Spec of an `AccessRequest`.
#[derive(CustomResource, Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "clusters.openmcp.cloud",
    version = "v1alpha1",
    kind = "AccessRequest",
    plural = "accessrequests",
    namespaced,
    doc = "AccessRequest requests credentials for a Cluster."
)]
#[kube(status = "AccessRequestStatus")]
#[serde(rename_all = "camelCase")]
pub struct AccessRequestSpec {
    /// The cluster access is requested for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_ref: Option<NamespacedObjectReference>,

    /// Token based access.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<TokenConfig>,
}

/// Reference to a namespaced object.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct NamespacedObjectReference {
    pub name: String,
    pub namespace: String,
}

/// Requested token permissions.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenConfig {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub role_refs: Vec<RoleRef>,
}

/// Reference to a (cluster) role.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RoleRef {
    pub kind: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

/// Status of an `AccessRequest`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccessRequestStatus {
    /// `Pending`, `Granted` or `Denied`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,

    /// Secret holding the issued kubeconfig.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_ref: Option<SecretReference>,
}

/// Reference to a secret, optionally in another namespace.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SecretReference {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

#[cfg(test)]
#[path = "crd_tests.rs"]
mod crd_tests;
