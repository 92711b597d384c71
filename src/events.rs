// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Kubernetes Events emitted on `Cluster` objects.
//!
//! The `Cluster` has no status fields for the gateway, so significant lifecycle
//! changes are reported as Events instead. Publishing never fails the
//! reconciliation: errors are logged and dropped.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ObjectReference;
use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use kube::Client;
use tracing::warn;

/// Publishes Kubernetes Events.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publishes an event about `resource_ref`. Failures are only logged.
    async fn publish(
        &self,
        resource_ref: &ObjectReference,
        type_: EventType,
        reason: &str,
        action: &str,
        note: Option<String>,
    );
}

/// [`EventPublisher`] backed by `kube::runtime::events::Recorder`.
pub struct KubeEventPublisher {
    recorder: Recorder,
}

impl KubeEventPublisher {
    /// `controller_name` is reported as the event's reporting component.
    #[must_use]
    pub fn new(client: Client, controller_name: &str) -> Self {
        let reporter = Reporter {
            controller: controller_name.to_string(),
            instance: std::env::var("POD_NAME").ok(),
        };
        Self {
            recorder: Recorder::new(client, reporter),
        }
    }
}

#[async_trait]
impl EventPublisher for KubeEventPublisher {
    async fn publish(
        &self,
        resource_ref: &ObjectReference,
        type_: EventType,
        reason: &str,
        action: &str,
        note: Option<String>,
    ) {
        let event = Event {
            type_,
            reason: reason.to_string(),
            note,
            action: action.to_string(),
            secondary: None,
        };
        if let Err(e) = self.recorder.publish(&event, resource_ref).await {
            warn!(reason, action, error = %e, "Failed to publish Kubernetes event");
        }
    }
}

/// Drops every event.
pub struct NoopEventPublisher;

#[async_trait]
impl EventPublisher for NoopEventPublisher {
    async fn publish(
        &self,
        _resource_ref: &ObjectReference,
        _type_: EventType,
        _reason: &str,
        _action: &str,
        _note: Option<String>,
    ) {
    }
}

/// Event reasons, shown in the REASON column of `kubectl get events`.
pub mod reasons {
    /// Control plane and data plane converged
    pub const GATEWAY_INSTALLED: &str = "GatewayInstalled";
    /// Teardown finished and the finalizer was removed
    pub const GATEWAY_UNINSTALLED: &str = "GatewayUninstalled";
    /// Teardown is waiting for deletions to complete
    pub const REMAINING_RESOURCES: &str = "RemainingResources";
}

/// Event actions.
pub mod actions {
    pub const INSTALL_GATEWAY: &str = "InstallGateway";
    pub const UNINSTALL_GATEWAY: &str = "UninstallGateway";
}

/// An event captured by [`RecordingEventPublisher`].
#[cfg(test)]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordedEvent {
    pub object: String,
    pub reason: String,
    pub action: String,
    pub note: Option<String>,
}

/// Keeps published events in memory, for unit tests.
#[cfg(test)]
#[derive(Default)]
pub struct RecordingEventPublisher {
    events: std::sync::Mutex<Vec<RecordedEvent>>,
}

#[cfg(test)]
impl RecordingEventPublisher {
    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.lock().expect("recorder lock poisoned").clone()
    }

    pub fn reasons(&self) -> Vec<String> {
        self.events().into_iter().map(|e| e.reason).collect()
    }
}

#[cfg(test)]
#[async_trait]
impl EventPublisher for RecordingEventPublisher {
    async fn publish(
        &self,
        resource_ref: &ObjectReference,
        _type_: EventType,
        reason: &str,
        action: &str,
        note: Option<String>,
    ) {
        let object = format!(
            "{}/{}",
            resource_ref.namespace.as_deref().unwrap_or_default(),
            resource_ref.name.as_deref().unwrap_or_default()
        );
        self.events
            .lock()
            .expect("recorder lock poisoned")
            .push(RecordedEvent {
                object,
                reason: reason.to_string(),
                action: action.to_string(),
                note,
            });
    }
}

#[cfg(test)]
#[path = "events_tests.rs"]
mod events_tests;
