// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Shared context for the cluster controller.
//!
//! The reconciler receives an `Arc<Context>` holding everything it talks to:
//! the platform store, the access broker for target clusters, the event
//! publisher and the provider settings.

use std::fmt;
use std::sync::Arc;

use crate::access::AccessBroker;
use crate::constants::KIND_GATEWAY_SERVICE_CONFIG;
use crate::events::EventPublisher;
use crate::store::{ObjectKey, ObjectStore};

/// Provider settings, fixed for the lifetime of the process.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settings {
    /// Name of this provider. Also the name of its `GatewayServiceConfig`.
    pub provider_name: String,
    /// Namespace the provider runs in. Source secrets are read from here.
    pub provider_namespace: String,
    /// Environment name, informational only.
    pub environment: String,
}

impl Settings {
    /// Key of the provider's `GatewayServiceConfig`.
    #[must_use]
    pub fn config_key(&self) -> ObjectKey {
        ObjectKey::cluster(KIND_GATEWAY_SERVICE_CONFIG, &self.provider_name)
    }
}

/// Shared context passed to the reconciler.
#[derive(Clone)]
pub struct Context {
    /// Store for the platform cluster
    pub platform: Arc<dyn ObjectStore>,

    /// Hands out stores for target clusters
    pub broker: Arc<dyn AccessBroker>,

    /// Publishes Events on `Cluster` objects
    pub events: Arc<dyn EventPublisher>,

    pub settings: Settings,
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod context_tests;
