// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `recipes.rs`

#[cfg(test)]
mod tests {
    use crate::crd::{
        DnsConfig, EnvoyGatewayChart, EnvoyGatewayConfig, GatewayConfig, GatewayServiceConfigSpec,
        ImagesConfig, LocalObjectReference,
    };
    use crate::gateway::recipes::*;
    use crate::gateway::ClusterIdentity;
    use crate::reconcilers::resources::ApplyOperation;
    use crate::store::{Envelope, Registry};
    use kube::api::DynamicObject;
    use serde_json::json;

    fn cluster() -> ClusterIdentity {
        ClusterIdentity::new("bar", "foo")
    }

    fn create_test_spec() -> GatewayServiceConfigSpec {
        GatewayServiceConfigSpec {
            envoy_gateway: EnvoyGatewayConfig {
                images: Some(ImagesConfig {
                    proxy: Some("envoy:v1".to_string()),
                    gateway: Some("gateway:v1".to_string()),
                    rate_limit: None,
                    image_pull_secrets: vec![LocalObjectReference {
                        name: "regcred".to_string(),
                    }],
                }),
                chart: EnvoyGatewayChart {
                    tag: "1.5.4".to_string(),
                    ..Default::default()
                },
            },
            clusters: vec![],
            gateway: None,
            dns: DnsConfig {
                base_domain: "dev.example.com".to_string(),
            },
        }
    }

    /// Runs a recipe against an empty envelope from the given registry.
    fn render(op: ApplyOperation<'static>, registry: &Registry) -> DynamicObject {
        let mut obj = registry.new_object(&op.key).unwrap();
        (op.mutate)(&mut obj).unwrap();
        obj
    }

    #[test]
    fn test_identities_derive_from_cluster() {
        assert_eq!(oci_repository_key(&cluster()).to_string(), "OCIRepository/bar/foo.gateway");
        assert_eq!(helm_release_key(&cluster()).to_string(), "HelmRelease/bar/foo.gateway");
        assert_eq!(
            chart_credentials_key(&cluster()).to_string(),
            "Secret/bar/foo.gateway-chart"
        );
        assert_eq!(gateway_key().to_string(), "Gateway/openmcp-system/default");
        assert_eq!(envoy_proxy_key().to_string(), "EnvoyProxy/openmcp-system/default");
        assert_eq!(gateway_class_key().to_string(), "GatewayClass/envoy-gateway");
    }

    #[test]
    fn test_gateway_listener_and_annotations() {
        let obj = render(gateway(&cluster(), &create_test_spec()), &Registry::target());

        assert_eq!(
            obj.annotation("dns.openmcp.cloud/base-domain"),
            Some("foo.bar.dev.example.com")
        );
        assert_eq!(obj.annotation("dns.openmcp.cloud/tls-port"), Some("9443"));
        assert_eq!(obj.field(&["spec", "gatewayClassName"]), Some(&json!("envoy-gateway")));
        assert_eq!(
            obj.field(&["spec", "listeners"]),
            Some(&json!([{
                "name": "tls",
                "port": 9443,
                "protocol": "TLS",
                "tls": { "mode": "Passthrough" },
                "allowedRoutes": { "namespaces": { "from": "All" } }
            }]))
        );
        assert_eq!(
            obj.field(&["spec", "infrastructure", "parametersRef"]),
            Some(&json!({ "group": "gateway.envoyproxy.io", "kind": "EnvoyProxy", "name": "default" }))
        );
    }

    #[test]
    fn test_gateway_uses_configured_port() {
        let mut spec = create_test_spec();
        spec.gateway = Some(GatewayConfig { tls_port: Some(8443) });

        let obj = render(gateway(&cluster(), &spec), &Registry::target());

        assert_eq!(obj.field(&["spec", "listeners"]).unwrap()[0]["port"], json!(8443));
        assert_eq!(obj.annotation("dns.openmcp.cloud/tls-port"), Some("8443"));
    }

    #[test]
    fn test_gateway_class_controller() {
        let obj = render(gateway_class(&cluster()), &Registry::target());
        assert_eq!(
            obj.field(&["spec", "controllerName"]),
            Some(&json!("gateway.envoyproxy.io/gatewayclass-controller"))
        );
    }

    #[test]
    fn test_envoy_proxy_images_and_pull_secrets() {
        let obj = render(envoy_proxy(&cluster(), &create_test_spec()), &Registry::target());

        assert_eq!(
            obj.field(&["spec", "provider"]),
            Some(&json!({
                "type": "Kubernetes",
                "kubernetes": {
                    "envoyDeployment": {
                        "container": { "image": "envoy:v1" },
                        "pod": { "imagePullSecrets": [ { "name": "regcred" } ] }
                    }
                }
            }))
        );
    }

    #[test]
    fn test_envoy_proxy_without_overrides() {
        let mut spec = create_test_spec();
        spec.envoy_gateway.images = None;

        let obj = render(envoy_proxy(&cluster(), &spec), &Registry::target());

        let deployment = obj.field(&["spec", "provider", "kubernetes", "envoyDeployment"]).unwrap();
        assert!(deployment.get("container").is_none());
        assert_eq!(deployment["pod"]["imagePullSecrets"], json!([]));
    }

    #[test]
    fn test_oci_repository_fields() {
        let spec = create_test_spec();
        let obj = render(
            oci_repository(&cluster(), &spec.envoy_gateway.chart, Some("foo.gateway-chart".to_string())),
            &Registry::platform(),
        );

        assert_eq!(obj.field(&["spec", "interval"]), Some(&json!("10h")));
        assert_eq!(
            obj.field(&["spec", "url"]),
            Some(&json!("oci://docker.io/envoyproxy/gateway-helm"))
        );
        assert_eq!(obj.field(&["spec", "ref", "tag"]), Some(&json!("1.5.4")));
        assert_eq!(
            obj.field(&["spec", "layerSelector", "mediaType"]),
            Some(&json!("application/vnd.cncf.helm.chart.content.v1.tar+gzip"))
        );
        assert_eq!(
            obj.field(&["spec", "secretRef", "name"]),
            Some(&json!("foo.gateway-chart"))
        );
    }

    #[test]
    fn test_oci_repository_drops_stale_secret_ref() {
        let spec = create_test_spec();
        let registry = Registry::platform();
        let op = oci_repository(&cluster(), &spec.envoy_gateway.chart, None);
        let mut obj = registry.new_object(&op.key).unwrap();
        obj.set_field(&["spec", "secretRef"], json!({ "name": "old" }));

        (op.mutate)(&mut obj).unwrap();

        assert_eq!(obj.field(&["spec", "secretRef"]), None);
    }

    #[test]
    fn test_helm_release_fields() {
        let obj = render(
            helm_release(&cluster(), &create_test_spec(), "access-foo"),
            &Registry::platform(),
        );

        assert_eq!(obj.field(&["spec", "releaseName"]), Some(&json!("eg")));
        assert_eq!(
            obj.field(&["spec", "targetNamespace"]),
            Some(&json!("envoy-gateway-system"))
        );
        assert_eq!(
            obj.field(&["spec", "chartRef"]),
            Some(&json!({ "kind": "OCIRepository", "name": "foo.gateway" }))
        );
        assert_eq!(
            obj.field(&["spec", "kubeConfig"]),
            Some(&json!({ "secretRef": { "name": "access-foo", "key": "kubeconfig" } }))
        );
        assert_eq!(
            obj.field(&["spec", "install", "remediation", "retries"]),
            Some(&json!(3))
        );
    }

    #[test]
    fn test_helm_values() {
        let values = helm_values(&create_test_spec());

        assert_eq!(
            values,
            json!({
                "global": {
                    "images": { "envoyGateway": { "image": "gateway:v1" } },
                    "imagePullSecrets": [ { "name": "regcred" } ]
                }
            })
        );
    }

    #[test]
    fn test_copied_secret_copies_type_and_data() {
        let registry = Registry::target();
        let mut source = Registry::platform()
            .new_object(&crate::store::ObjectKey::namespaced("Secret", "openmcp-system", "regcred"))
            .unwrap();
        source.set_field(&["type"], json!("kubernetes.io/dockerconfigjson"));
        source.set_field(&["data"], json!({ ".dockerconfigjson": "e30=" }));

        let obj = render(
            copied_secret(&cluster(), pull_secret_key("regcred"), &source),
            &registry,
        );

        assert_eq!(obj.metadata.namespace.as_deref(), Some("envoy-gateway-system"));
        assert_eq!(obj.field(&["type"]), Some(&json!("kubernetes.io/dockerconfigjson")));
        assert_eq!(obj.field(&["data", ".dockerconfigjson"]), Some(&json!("e30=")));
        assert_eq!(
            obj.metadata
                .labels
                .as_ref()
                .and_then(|l| l.get("app.kubernetes.io/component"))
                .map(String::as_str),
            Some("credentials")
        );
    }

    #[test]
    fn test_recipes_are_deterministic() {
        let spec = create_test_spec();
        let first = render(gateway(&cluster(), &spec), &Registry::target());
        let second = render(gateway(&cluster(), &spec), &Registry::target());

        assert_eq!(
            serde_json::to_value(&first).unwrap(),
            serde_json::to_value(&second).unwrap()
        );
    }
}
