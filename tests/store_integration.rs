// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Integration tests for the Kubernetes-backed object store
//!
//! These tests exercise the apply and delete primitives against a live cluster.
//! They only use core kinds, so no Flux or Gateway API CRDs are required.
//!
//! Run with: cargo test --test store_integration -- --ignored

mod common;

use common::{cleanup_test_namespace, create_test_namespace, get_kube_client_or_skip, wait_for_ready};
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::api::{Api, DynamicObject, Patch, PatchParams};
use kube::ResourceExt;
use platform_service_gateway::constants::KIND_SECRET;
use platform_service_gateway::crd::gateway_service_config_crd;
use platform_service_gateway::errors::Error;
use platform_service_gateway::reconcilers::resources::{
    create_or_update, ensure_deleted, OperationResult,
};
use platform_service_gateway::store::{Envelope, KubeStore, ObjectKey, ObjectStore, Registry};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

const TEST_NAMESPACE: &str = "psg-store-integration";

fn secret_mutator() -> Box<dyn FnOnce(&mut DynamicObject) -> Result<(), Error> + Send> {
    Box::new(|obj: &mut DynamicObject| {
        obj.set_field(&["type"], json!("Opaque"));
        obj.set_field(&["stringData"], json!({ "token": "integration" }));
        Ok(())
    })
}

#[tokio::test]
#[ignore = "requires a Kubernetes cluster"]
async fn test_create_or_update_and_ensure_deleted() {
    let Some(client) = get_kube_client_or_skip().await else {
        return;
    };
    create_test_namespace(&client, TEST_NAMESPACE)
        .await
        .expect("Failed to create test namespace");

    let store = KubeStore::new(client.clone(), Arc::new(Registry::target()));
    let key = ObjectKey::namespaced(KIND_SECRET, TEST_NAMESPACE, "apply-me");

    let (result, created) = create_or_update(&store, &key, secret_mutator())
        .await
        .expect("Failed to create secret");
    assert_eq!(result, OperationResult::Created);
    assert_eq!(created.name_any(), "apply-me");

    // The server moves stringData into data, so compare a stable field instead
    let fetched = store.get(&key).await.expect("Secret should exist");
    assert_eq!(fetched.field(&["type"]), Some(&json!("Opaque")));

    let mut remaining = true;
    for _ in 0..10 {
        match ensure_deleted(&store, std::slice::from_ref(&key)).await {
            Ok(()) => {
                remaining = false;
                break;
            }
            Err(e) if e.is_remaining_resources() => {
                wait_for_ready(Duration::from_secs(1)).await;
            }
            Err(e) => panic!("Unexpected error deleting secret: {e}"),
        }
    }
    assert!(!remaining, "Secret should be gone after ensure_deleted");

    // Deleting an absent object is a no-op
    ensure_deleted(&store, &[key])
        .await
        .expect("Second ensure_deleted should succeed");

    cleanup_test_namespace(&client, TEST_NAMESPACE)
        .await
        .expect("Failed to cleanup test namespace");
}

#[tokio::test]
#[ignore = "requires a Kubernetes cluster"]
async fn test_gateway_service_config_crd_installs() {
    let Some(client) = get_kube_client_or_skip().await else {
        return;
    };

    let crd = gateway_service_config_crd();
    let crds: Api<CustomResourceDefinition> = Api::all(client.clone());
    crds.patch(
        &crd.name_any(),
        &PatchParams::apply("platform-service-gateway-test").force(),
        &Patch::Apply(&crd),
    )
    .await
    .expect("Failed to apply GatewayServiceConfig CRD");
    wait_for_ready(Duration::from_secs(3)).await;

    let store = KubeStore::new(client, Arc::new(Registry::platform()));
    let err = store
        .get(&ObjectKey::cluster("GatewayServiceConfig", "does-not-exist"))
        .await
        .expect_err("No configuration should exist under this name");
    assert!(err.is_not_found(), "Expected NotFound, got {err}");
}
