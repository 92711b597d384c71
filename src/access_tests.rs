// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `access.rs`

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::json;

    use crate::access::*;
    use crate::crd::AccessRequestSpec;
    use crate::errors::Error;
    use crate::gateway::ClusterIdentity;
    use crate::store::memory::MemoryStore;
    use crate::store::{Envelope, ObjectKey, ObjectStore, StoreError};

    const KUBECONFIG: &str = "apiVersion: v1\nkind: Config\n";

    /// Connector that remembers the kubeconfig it was handed.
    #[derive(Default)]
    struct RecordingConnector {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Connector for RecordingConnector {
        async fn connect(&self, kubeconfig: &str) -> Result<Arc<dyn ObjectStore>, StoreError> {
            self.seen.lock().unwrap().push(kubeconfig.to_string());
            Ok(Arc::new(MemoryStore::target()))
        }
    }

    struct Fixture {
        platform: Arc<MemoryStore>,
        connector: Arc<RecordingConnector>,
        broker: AccessRequestBroker,
    }

    fn setup() -> Fixture {
        let platform = Arc::new(MemoryStore::platform());
        let connector = Arc::new(RecordingConnector::default());
        let broker = AccessRequestBroker::new(
            platform.clone() as Arc<dyn ObjectStore>,
            "gateway",
            connector.clone() as Arc<dyn Connector>,
        );
        Fixture {
            platform,
            connector,
            broker,
        }
    }

    fn cluster() -> ClusterIdentity {
        ClusterIdentity::new("bar", "foo")
    }

    /// Sets the status of the request as the access controller would.
    fn set_status(platform: &MemoryStore, key: &ObjectKey, status: serde_json::Value) {
        let mut request = platform.object(key).unwrap();
        request.set_field(&["status"], status);
        platform.insert(request);
    }

    fn insert_kubeconfig_secret(platform: &MemoryStore, name: &str, encoded: &str) {
        let key = ObjectKey::namespaced("Secret", "bar", name);
        let mut secret = platform.registry().new_object(&key).unwrap();
        secret.set_field(&["data"], json!({ "kubeconfig": encoded }));
        platform.insert(secret);
    }

    #[test]
    fn test_request_key_names_provider_and_cluster() {
        let fixture = setup();
        assert_eq!(
            fixture.broker.request_key(&cluster()).to_string(),
            "AccessRequest/bar/gateway.gateway.foo"
        );
    }

    #[tokio::test]
    async fn test_acquire_creates_request_and_waits() {
        let fixture = setup();

        let state = fixture.broker.acquire(&cluster()).await.unwrap();

        assert!(matches!(
            state,
            AccessState::Pending { retry_after } if retry_after == Duration::from_secs(5)
        ));
        let request = fixture
            .platform
            .object(&fixture.broker.request_key(&cluster()))
            .unwrap();
        let spec: AccessRequestSpec = request.parse_field(&["spec"]).unwrap().unwrap();
        let cluster_ref = spec.cluster_ref.unwrap();
        assert_eq!(cluster_ref.name, "foo");
        assert_eq!(cluster_ref.namespace, "bar");
        let role = &spec.token.unwrap().role_refs[0];
        assert_eq!(role.kind, "ClusterRole");
        assert_eq!(role.name, "cluster-admin");
    }

    #[tokio::test]
    async fn test_acquire_is_idempotent_while_pending() {
        let fixture = setup();

        fixture.broker.acquire(&cluster()).await.unwrap();
        fixture.broker.acquire(&cluster()).await.unwrap();

        assert_eq!(fixture.platform.writes(), 1);
    }

    #[tokio::test]
    async fn test_acquire_granted_builds_target_store() {
        let fixture = setup();
        fixture.broker.acquire(&cluster()).await.unwrap();
        let key = fixture.broker.request_key(&cluster());
        set_status(
            &fixture.platform,
            &key,
            json!({ "phase": "Granted", "secretRef": { "name": "access-1", "namespace": "bar" } }),
        );
        insert_kubeconfig_secret(&fixture.platform, "access-1", "YXBpVmVyc2lvbjogdjEKa2luZDogQ29uZmlnCg==");

        let AccessState::Ready(access) = fixture.broker.acquire(&cluster()).await.unwrap() else {
            panic!("expected access to be ready");
        };

        assert_eq!(access.kubeconfig_secret, "access-1");
        assert_eq!(*fixture.connector.seen.lock().unwrap(), vec![KUBECONFIG.to_string()]);
    }

    #[tokio::test]
    async fn test_acquire_granted_without_secret_waits() {
        let fixture = setup();
        fixture.broker.acquire(&cluster()).await.unwrap();
        let key = fixture.broker.request_key(&cluster());
        set_status(&fixture.platform, &key, json!({ "phase": "Granted" }));

        let state = fixture.broker.acquire(&cluster()).await.unwrap();

        assert!(matches!(state, AccessState::Pending { .. }));
        assert!(fixture.connector.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_acquire_denied_is_fatal() {
        let fixture = setup();
        fixture.broker.acquire(&cluster()).await.unwrap();
        let key = fixture.broker.request_key(&cluster());
        set_status(&fixture.platform, &key, json!({ "phase": "Denied" }));

        let err = fixture.broker.acquire(&cluster()).await.err().unwrap();

        assert!(matches!(err, Error::Fatal { .. }));
    }

    #[tokio::test]
    async fn test_acquire_with_corrupt_kubeconfig_is_fatal() {
        let fixture = setup();
        fixture.broker.acquire(&cluster()).await.unwrap();
        let key = fixture.broker.request_key(&cluster());
        set_status(
            &fixture.platform,
            &key,
            json!({ "phase": "Granted", "secretRef": { "name": "access-1" } }),
        );
        insert_kubeconfig_secret(&fixture.platform, "access-1", "not base64!");

        let err = fixture.broker.acquire(&cluster()).await.err().unwrap();

        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_release_deletes_request_until_gone() {
        let fixture = setup();
        fixture.broker.acquire(&cluster()).await.unwrap();

        let err = fixture.broker.release(&cluster()).await.unwrap_err();
        assert!(err.is_remaining_resources());

        fixture.platform.complete_deletions();
        fixture.broker.release(&cluster()).await.unwrap();
    }

    #[tokio::test]
    async fn test_lookup_never_creates_a_request() {
        let fixture = setup();

        assert!(fixture.broker.lookup(&cluster()).await.unwrap().is_none());
        assert_eq!(fixture.platform.writes(), 0);
        assert!(!fixture
            .platform
            .contains(&fixture.broker.request_key(&cluster())));
    }

    #[tokio::test]
    async fn test_lookup_returns_granted_access() {
        let fixture = setup();
        fixture.broker.acquire(&cluster()).await.unwrap();
        let key = fixture.broker.request_key(&cluster());
        set_status(
            &fixture.platform,
            &key,
            json!({ "phase": "Granted", "secretRef": { "name": "access-1" } }),
        );
        insert_kubeconfig_secret(&fixture.platform, "access-1", "YXBpVmVyc2lvbjogdjEKa2luZDogQ29uZmlnCg==");
        let writes = fixture.platform.writes();

        let state = fixture.broker.lookup(&cluster()).await.unwrap();

        assert!(matches!(state, Some(AccessState::Ready(_))));
        assert_eq!(fixture.platform.writes(), writes);
    }

    #[tokio::test]
    async fn test_lookup_after_release_finds_nothing() {
        let fixture = setup();
        fixture.broker.acquire(&cluster()).await.unwrap();
        let key = fixture.broker.request_key(&cluster());
        set_status(
            &fixture.platform,
            &key,
            json!({ "phase": "Granted", "secretRef": { "name": "access-1" } }),
        );
        insert_kubeconfig_secret(&fixture.platform, "access-1", "YXBpVmVyc2lvbjogdjEKa2luZDogQ29uZmlnCg==");

        assert!(fixture.broker.release(&cluster()).await.is_err());
        assert!(fixture.platform.is_marked_for_deletion(&key));
        assert!(fixture.broker.lookup(&cluster()).await.unwrap().is_none());

        fixture.platform.complete_deletions();
        assert!(fixture.broker.lookup(&cluster()).await.unwrap().is_none());
        fixture.broker.release(&cluster()).await.unwrap();
    }

    #[tokio::test]
    async fn test_static_broker_counts_releases() {
        let broker = StaticBroker::pending();

        broker.release(&cluster()).await.unwrap();

        assert_eq!(broker.releases(), 1);
        assert!(matches!(
            broker.acquire(&cluster()).await.unwrap(),
            AccessState::Pending { .. }
        ));
        assert!(broker.lookup(&cluster()).await.unwrap().is_none());
    }
}
