// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the gateway platform service.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

use std::time::Duration;

// ============================================================================
// API Constants
// ============================================================================

/// API group of the `GatewayServiceConfig` CRD
pub const API_GROUP: &str = "gateway.openmcp.cloud";

/// API version of the `GatewayServiceConfig` CRD
pub const API_VERSION: &str = "v1alpha1";

/// API group of the cluster inventory (`Cluster`, `AccessRequest`)
pub const CLUSTERS_API_GROUP: &str = "clusters.openmcp.cloud";

/// Root group of the platform, used to derive annotation and finalizer keys
pub const OPENMCP_GROUP: &str = "openmcp.cloud";

/// Kind name for the `Cluster` resource
pub const KIND_CLUSTER: &str = "Cluster";

/// Kind name for the `AccessRequest` resource
pub const KIND_ACCESS_REQUEST: &str = "AccessRequest";

/// Kind name for the `GatewayServiceConfig` resource
pub const KIND_GATEWAY_SERVICE_CONFIG: &str = "GatewayServiceConfig";

/// Core kinds
pub const KIND_NAMESPACE: &str = "Namespace";
pub const KIND_SECRET: &str = "Secret";

/// Flux kinds consumed by the chart delivery controllers
pub const KIND_OCI_REPOSITORY: &str = "OCIRepository";
pub const KIND_HELM_RELEASE: &str = "HelmRelease";

/// Gateway API and Envoy Gateway kinds
pub const KIND_GATEWAY_CLASS: &str = "GatewayClass";
pub const KIND_GATEWAY: &str = "Gateway";
pub const KIND_ENVOY_PROXY: &str = "EnvoyProxy";

// ============================================================================
// Finalizers and Annotations
// ============================================================================

/// Finalizer placed on a `Cluster` while gateway resources exist for it
pub const GATEWAY_FINALIZER: &str = "platformservice.openmcp.cloud/gateway";

/// Generic operation annotation understood by every platform service
pub const OPERATION_ANNOTATION: &str = "openmcp.cloud/operation";

/// Gateway-scoped operation annotation, takes precedence over the generic one
pub const GATEWAY_OPERATION_ANNOTATION: &str = "gateway.openmcp.cloud/operation";

/// Operation annotation value: skip the resource entirely
pub const OPERATION_IGNORE: &str = "ignore";

/// Operation annotation value: force a reconciliation and clear the annotation
pub const OPERATION_RECONCILE: &str = "reconcile";

/// Annotation on the `Gateway` carrying the computed base domain
pub const BASE_DOMAIN_ANNOTATION: &str = "dns.openmcp.cloud/base-domain";

/// Annotation on the `Gateway` carrying the TLS listener port
pub const TLS_PORT_ANNOTATION: &str = "dns.openmcp.cloud/tls-port";

/// Label put on CRDs to map them to the platform cluster
pub const CLUSTER_LABEL: &str = "openmcp.cloud/cluster";

/// Value of [`CLUSTER_LABEL`] for platform CRDs
pub const CLUSTER_PURPOSE_PLATFORM: &str = "platform";

/// Fallback namespace for cluster references without one
pub const DEFAULT_NAMESPACE: &str = "default";

// ============================================================================
// Envoy Gateway Deployment
// ============================================================================

/// Namespace of the Envoy Gateway control plane on the target cluster
pub const DEPLOYMENT_NAMESPACE: &str = "envoy-gateway-system";

/// Helm release name of the Envoy Gateway chart
pub const HELM_RELEASE_NAME: &str = "eg";

/// Default chart location
pub const DEFAULT_CHART_URL: &str = "oci://docker.io/envoyproxy/gateway-helm";

/// OCI layer media type of Helm charts
pub const HELM_CHART_MEDIA_TYPE: &str = "application/vnd.cncf.helm.chart.content.v1.tar+gzip";

/// Reconcile interval of the chart source
pub const OCI_REPOSITORY_INTERVAL: &str = "10h";

/// Reconcile interval of the chart release
pub const HELM_RELEASE_INTERVAL: &str = "1h";

/// Install and upgrade remediation retries of the chart release
pub const HELM_REMEDIATION_RETRIES: i64 = 3;

/// Suffix of control plane objects derived from the cluster name
pub const GATEWAY_SUFFIX: &str = "gateway";

/// Suffix of the copied chart credential
pub const CHART_CREDENTIALS_SUFFIX: &str = "gateway-chart";

/// Secret key holding the kubeconfig of a granted access request
pub const KUBECONFIG_SECRET_KEY: &str = "kubeconfig";

// ============================================================================
// Gateway Data Plane
// ============================================================================

/// Namespace of the data plane objects on the target cluster
pub const GATEWAY_NAMESPACE: &str = "openmcp-system";

/// Name of the `GatewayClass`
pub const GATEWAY_CLASS_NAME: &str = "envoy-gateway";

/// Controller name handled by Envoy Gateway
pub const GATEWAY_CLASS_CONTROLLER_NAME: &str = "gateway.envoyproxy.io/gatewayclass-controller";

/// Name of the `Gateway` and of its `EnvoyProxy` parameters
pub const GATEWAY_NAME: &str = "default";

/// API group of `EnvoyProxy`
pub const ENVOY_GATEWAY_API_GROUP: &str = "gateway.envoyproxy.io";

/// Name of the TLS listener
pub const TLS_LISTENER_NAME: &str = "tls";

/// Default TLS passthrough port
pub const DEFAULT_TLS_PORT: i32 = 9443;

// ============================================================================
// Access
// ============================================================================

/// Cluster role bound to the access token of the target cluster
pub const ACCESS_CLUSTER_ROLE: &str = "cluster-admin";

/// `AccessRequest` phase once credentials have been issued
pub const ACCESS_PHASE_GRANTED: &str = "Granted";

/// `AccessRequest` phase when the request was rejected
pub const ACCESS_PHASE_DENIED: &str = "Denied";

// ============================================================================
// Controller Timing
// ============================================================================

/// Wait hint while a kind is not served by the remote store yet
pub const KIND_NOT_REGISTERED_BACKOFF: Duration = Duration::from_secs(10);

/// Wait hint while deletions are pending
pub const REMAINING_RESOURCES_BACKOFF: Duration = Duration::from_secs(10);

/// Wait hint while an access request is being processed
pub const ACCESS_PENDING_BACKOFF: Duration = Duration::from_secs(5);

/// Bounded re-sync horizon after a successful convergence
pub const RESYNC_INTERVAL: Duration = Duration::from_secs(3600);

/// Requeue delay applied by the controller error policy
pub const ERROR_REQUEUE_DURATION: Duration = Duration::from_secs(30);

// ============================================================================
// Runtime
// ============================================================================

/// Name used for logs, events and field management
pub const CONTROLLER_NAME: &str = "platform-service-gateway";

/// Worker threads of the Tokio runtime
pub const TOKIO_WORKER_THREADS: usize = 4;

/// Default address of the metrics endpoint
pub const DEFAULT_METRICS_BIND_ADDRESS: &str = "0.0.0.0:8080";
