// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Desired state of every object the gateway service manages.
//!
//! Each builder returns the identity of one object plus a mutator that sets its
//! desired fields. Builders do no I/O: they are functions of the configuration
//! and the cluster identity only, so applying them twice yields the same state.
//!
//! Mutators set individual fields rather than whole specs where the remote
//! controller is known to default fields, so server-side defaults do not cause
//! an update on every pass.

use std::collections::BTreeMap;

use kube::api::DynamicObject;
use serde_json::{json, Map, Value};

use super::ClusterIdentity;
use crate::constants::{
    BASE_DOMAIN_ANNOTATION, CHART_CREDENTIALS_SUFFIX, DEPLOYMENT_NAMESPACE, ENVOY_GATEWAY_API_GROUP,
    GATEWAY_CLASS_CONTROLLER_NAME, GATEWAY_CLASS_NAME, GATEWAY_NAME, GATEWAY_NAMESPACE,
    GATEWAY_SUFFIX, HELM_CHART_MEDIA_TYPE, HELM_RELEASE_INTERVAL, HELM_RELEASE_NAME,
    HELM_REMEDIATION_RETRIES, KIND_ENVOY_PROXY, KIND_GATEWAY, KIND_GATEWAY_CLASS,
    KIND_HELM_RELEASE, KIND_NAMESPACE, KIND_OCI_REPOSITORY, KIND_SECRET, KUBECONFIG_SECRET_KEY,
    OCI_REPOSITORY_INTERVAL, TLS_LISTENER_NAME, TLS_PORT_ANNOTATION,
};
use crate::crd::{EnvoyGatewayChart, GatewayServiceConfigSpec};
use crate::labels::{
    managed_labels, COMPONENT_CONTROL_PLANE, COMPONENT_CREDENTIALS, COMPONENT_DATA_PLANE,
};
use crate::reconcilers::resources::ApplyOperation;
use crate::store::{Envelope, ObjectKey};

// ============================================================================
// Identities
// ============================================================================

/// `OCIRepository` holding the chart, in the cluster's namespace.
#[must_use]
pub fn oci_repository_key(cluster: &ClusterIdentity) -> ObjectKey {
    ObjectKey::namespaced(
        KIND_OCI_REPOSITORY,
        &cluster.namespace,
        &format!("{}.{GATEWAY_SUFFIX}", cluster.name),
    )
}

/// `HelmRelease` deploying the chart, in the cluster's namespace.
#[must_use]
pub fn helm_release_key(cluster: &ClusterIdentity) -> ObjectKey {
    ObjectKey::namespaced(
        KIND_HELM_RELEASE,
        &cluster.namespace,
        &format!("{}.{GATEWAY_SUFFIX}", cluster.name),
    )
}

/// Copy of the chart registry credentials, in the cluster's namespace.
#[must_use]
pub fn chart_credentials_key(cluster: &ClusterIdentity) -> ObjectKey {
    ObjectKey::namespaced(
        KIND_SECRET,
        &cluster.namespace,
        &format!("{}.{CHART_CREDENTIALS_SUFFIX}", cluster.name),
    )
}

/// Copy of an image pull secret on the target cluster.
#[must_use]
pub fn pull_secret_key(name: &str) -> ObjectKey {
    ObjectKey::namespaced(KIND_SECRET, DEPLOYMENT_NAMESPACE, name)
}

#[must_use]
pub fn namespace_key(name: &str) -> ObjectKey {
    ObjectKey::cluster(KIND_NAMESPACE, name)
}

#[must_use]
pub fn gateway_class_key() -> ObjectKey {
    ObjectKey::cluster(KIND_GATEWAY_CLASS, GATEWAY_CLASS_NAME)
}

#[must_use]
pub fn envoy_proxy_key() -> ObjectKey {
    ObjectKey::namespaced(KIND_ENVOY_PROXY, GATEWAY_NAMESPACE, GATEWAY_NAME)
}

#[must_use]
pub fn gateway_key() -> ObjectKey {
    ObjectKey::namespaced(KIND_GATEWAY, GATEWAY_NAMESPACE, GATEWAY_NAME)
}

/// Subdomain handed to the cluster: `<name>.<namespace>.<base domain>`.
#[must_use]
pub fn base_domain(cluster: &ClusterIdentity, spec: &GatewayServiceConfigSpec) -> String {
    format!("{}.{}.{}", cluster.name, cluster.namespace, spec.dns.base_domain)
}

// ============================================================================
// Shared
// ============================================================================

/// Namespace on the target cluster.
#[must_use]
pub fn namespace(cluster: &ClusterIdentity, name: &str) -> ApplyOperation<'static> {
    let labels = managed_labels(&cluster.namespace, &cluster.name, COMPONENT_DATA_PLANE);
    ApplyOperation::new(
        namespace_key(name),
        Box::new(move |obj: &mut DynamicObject| {
            obj.merge_labels(&labels);
            Ok(())
        }),
    )
}

/// Copy of `source` under `key`: same type and data, managed labels.
#[must_use]
pub fn copied_secret(
    cluster: &ClusterIdentity,
    key: ObjectKey,
    source: &DynamicObject,
) -> ApplyOperation<'static> {
    let labels = managed_labels(&cluster.namespace, &cluster.name, COMPONENT_CREDENTIALS);
    let secret_type = source.field(&["type"]).cloned();
    let data = source
        .field(&["data"])
        .cloned()
        .unwrap_or_else(|| Value::Object(Map::new()));

    ApplyOperation::new(
        key,
        Box::new(move |obj: &mut DynamicObject| {
            obj.merge_labels(&labels);
            if let Some(secret_type) = secret_type {
                obj.set_field(&["type"], secret_type);
            }
            obj.set_field(&["data"], data);
            Ok(())
        }),
    )
}

// ============================================================================
// Control plane (platform cluster)
// ============================================================================

/// `OCIRepository` pointing at the Envoy Gateway chart.
///
/// `credentials` names the copied chart credential in the cluster namespace.
#[must_use]
pub fn oci_repository(
    cluster: &ClusterIdentity,
    chart: &EnvoyGatewayChart,
    credentials: Option<String>,
) -> ApplyOperation<'static> {
    let labels = managed_labels(&cluster.namespace, &cluster.name, COMPONENT_CONTROL_PLANE);
    let url = chart.url.clone();
    let tag = chart.tag.clone();

    ApplyOperation::new(
        oci_repository_key(cluster),
        Box::new(move |obj: &mut DynamicObject| {
            obj.merge_labels(&labels);
            obj.set_field(&["spec", "interval"], json!(OCI_REPOSITORY_INTERVAL));
            obj.set_field(
                &["spec", "layerSelector"],
                json!({ "mediaType": HELM_CHART_MEDIA_TYPE, "operation": "copy" }),
            );
            obj.set_field(&["spec", "url"], json!(url));
            obj.set_field(&["spec", "ref"], json!({ "tag": tag }));
            match credentials {
                Some(name) => obj.set_field(&["spec", "secretRef"], json!({ "name": name })),
                None => {
                    obj.remove_field(&["spec", "secretRef"]);
                }
            }
            Ok(())
        }),
    )
}

/// `HelmRelease` installing the chart on the target cluster through its kubeconfig.
#[must_use]
pub fn helm_release(
    cluster: &ClusterIdentity,
    spec: &GatewayServiceConfigSpec,
    kubeconfig_secret: &str,
) -> ApplyOperation<'static> {
    let labels = managed_labels(&cluster.namespace, &cluster.name, COMPONENT_CONTROL_PLANE);
    let repository = oci_repository_key(cluster).name;
    let values = helm_values(spec);
    let kubeconfig_secret = kubeconfig_secret.to_string();

    ApplyOperation::new(
        helm_release_key(cluster),
        Box::new(move |obj: &mut DynamicObject| {
            obj.merge_labels(&labels);
            obj.set_field(&["spec", "interval"], json!(HELM_RELEASE_INTERVAL));
            obj.set_field(
                &["spec", "install", "remediation", "retries"],
                json!(HELM_REMEDIATION_RETRIES),
            );
            obj.set_field(
                &["spec", "upgrade", "remediation", "retries"],
                json!(HELM_REMEDIATION_RETRIES),
            );
            obj.set_field(&["spec", "releaseName"], json!(HELM_RELEASE_NAME));
            obj.set_field(&["spec", "storageNamespace"], json!(DEPLOYMENT_NAMESPACE));
            obj.set_field(&["spec", "targetNamespace"], json!(DEPLOYMENT_NAMESPACE));
            obj.set_field(
                &["spec", "chartRef"],
                json!({ "kind": KIND_OCI_REPOSITORY, "name": repository }),
            );
            obj.set_field(&["spec", "values"], values);
            obj.set_field(
                &["spec", "kubeConfig"],
                json!({ "secretRef": { "name": kubeconfig_secret, "key": KUBECONFIG_SECRET_KEY } }),
            );
            Ok(())
        }),
    )
}

/// Helm values: image overrides and pull secrets.
#[must_use]
pub fn helm_values(spec: &GatewayServiceConfigSpec) -> Value {
    let mut images = Map::new();
    if let Some(overrides) = &spec.envoy_gateway.images {
        if let Some(image) = overrides.gateway.as_deref().filter(|i| !i.is_empty()) {
            images.insert("envoyGateway".to_string(), json!({ "image": image }));
        }
        if let Some(image) = overrides.rate_limit.as_deref().filter(|i| !i.is_empty()) {
            images.insert("ratelimit".to_string(), json!({ "image": image }));
        }
    }

    json!({
        "global": {
            "images": images,
            "imagePullSecrets": spec.image_pull_secrets(),
        }
    })
}

// ============================================================================
// Data plane (target cluster)
// ============================================================================

/// `GatewayClass` handled by Envoy Gateway.
#[must_use]
pub fn gateway_class(cluster: &ClusterIdentity) -> ApplyOperation<'static> {
    let labels = managed_labels(&cluster.namespace, &cluster.name, COMPONENT_DATA_PLANE);
    ApplyOperation::new(
        gateway_class_key(),
        Box::new(move |obj: &mut DynamicObject| {
            obj.merge_labels(&labels);
            obj.set_field(&["spec", "controllerName"], json!(GATEWAY_CLASS_CONTROLLER_NAME));
            Ok(())
        }),
    )
}

/// `EnvoyProxy` parameters: proxy image override and pull secrets.
#[must_use]
pub fn envoy_proxy(
    cluster: &ClusterIdentity,
    spec: &GatewayServiceConfigSpec,
) -> ApplyOperation<'static> {
    let labels = managed_labels(&cluster.namespace, &cluster.name, COMPONENT_DATA_PLANE);

    let mut deployment = Map::new();
    if let Some(image) = spec
        .envoy_gateway
        .images
        .as_ref()
        .and_then(|i| i.proxy.as_deref())
        .filter(|i| !i.is_empty())
    {
        deployment.insert("container".to_string(), json!({ "image": image }));
    }
    deployment.insert(
        "pod".to_string(),
        json!({ "imagePullSecrets": spec.image_pull_secrets() }),
    );
    let provider = json!({
        "type": "Kubernetes",
        "kubernetes": { "envoyDeployment": deployment },
    });

    ApplyOperation::new(
        envoy_proxy_key(),
        Box::new(move |obj: &mut DynamicObject| {
            obj.merge_labels(&labels);
            obj.set_field(&["spec", "provider"], provider);
            Ok(())
        }),
    )
}

/// `Gateway` with a single TLS passthrough listener.
///
/// The computed base domain and the listener port are published as
/// annotations for the DNS integration.
#[must_use]
pub fn gateway(cluster: &ClusterIdentity, spec: &GatewayServiceConfigSpec) -> ApplyOperation<'static> {
    let labels = managed_labels(&cluster.namespace, &cluster.name, COMPONENT_DATA_PLANE);
    let annotations = BTreeMap::from([
        (BASE_DOMAIN_ANNOTATION.to_string(), base_domain(cluster, spec)),
        (TLS_PORT_ANNOTATION.to_string(), spec.tls_port().to_string()),
    ]);
    let listeners = json!([{
        "name": TLS_LISTENER_NAME,
        "port": spec.tls_port(),
        "protocol": "TLS",
        "tls": { "mode": "Passthrough" },
        "allowedRoutes": { "namespaces": { "from": "All" } },
    }]);

    ApplyOperation::new(
        gateway_key(),
        Box::new(move |obj: &mut DynamicObject| {
            obj.merge_labels(&labels);
            for (key, value) in &annotations {
                obj.set_annotation(key, value);
            }
            obj.set_field(&["spec", "gatewayClassName"], json!(GATEWAY_CLASS_NAME));
            obj.set_field(&["spec", "listeners"], listeners);
            obj.set_field(
                &["spec", "infrastructure", "parametersRef"],
                json!({
                    "group": ENVOY_GATEWAY_API_GROUP,
                    "kind": KIND_ENVOY_PROXY,
                    "name": GATEWAY_NAME,
                }),
            );
            Ok(())
        }),
    )
}

#[cfg(test)]
#[path = "recipes_tests.rs"]
mod recipes_tests;
