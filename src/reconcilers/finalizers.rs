// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Finalizer management on object envelopes.
//!
//! The metadata helpers are pure and report whether they changed anything.
//! [`ensure_finalizer`] and [`remove_finalizer`] write the object back through
//! the store only when the finalizer list actually changed.
//!
//! # Example
//!
//! ```rust,ignore
//! use platform_service_gateway::reconcilers::finalizers::ensure_finalizer;
//!
//! const FINALIZER: &str = "platformservice.openmcp.cloud/gateway";
//!
//! async fn converge(store: &dyn ObjectStore, mut cluster: DynamicObject) -> Result<(), Error> {
//!     ensure_finalizer(store, &mut cluster, FINALIZER).await?;
//!     // Create remote resources...
//!     Ok(())
//! }
//! ```

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::DynamicObject;
use tracing::info;

use crate::errors::Error;
use crate::store::{ObjectKey, ObjectStore};

/// Returns true if the finalizer is present.
#[must_use]
pub fn has_finalizer(meta: &ObjectMeta, finalizer: &str) -> bool {
    meta.finalizers
        .as_ref()
        .is_some_and(|f| f.iter().any(|x| x == finalizer))
}

/// Adds the finalizer. Returns true if it was missing.
pub fn add_finalizer(meta: &mut ObjectMeta, finalizer: &str) -> bool {
    if has_finalizer(meta, finalizer) {
        return false;
    }
    meta.finalizers
        .get_or_insert_with(Vec::new)
        .push(finalizer.to_string());
    true
}

/// Removes the finalizer. Returns true if it was present.
pub fn remove_finalizer_from(meta: &mut ObjectMeta, finalizer: &str) -> bool {
    let Some(finalizers) = meta.finalizers.as_mut() else {
        return false;
    };
    let before = finalizers.len();
    finalizers.retain(|f| f != finalizer);
    before != finalizers.len()
}

/// Adds a finalizer to the object and persists it if it was missing.
///
/// On write, `obj` is replaced by the stored version.
///
/// # Errors
///
/// Returns an error if the update is rejected by the store.
pub async fn ensure_finalizer(
    store: &dyn ObjectStore,
    obj: &mut DynamicObject,
    finalizer: &str,
) -> Result<bool, Error> {
    if !add_finalizer(&mut obj.metadata, finalizer) {
        return Ok(false);
    }

    let key = ObjectKey::from_object(obj)?;
    info!("Adding finalizer {} to {}", finalizer, key);
    *obj = store.update(obj).await?;
    Ok(true)
}

/// Removes a finalizer from the object and persists it if it was present.
///
/// # Errors
///
/// Returns an error if the update is rejected by the store.
pub async fn remove_finalizer(
    store: &dyn ObjectStore,
    obj: &mut DynamicObject,
    finalizer: &str,
) -> Result<bool, Error> {
    if !remove_finalizer_from(&mut obj.metadata, finalizer) {
        return Ok(false);
    }

    let key = ObjectKey::from_object(obj)?;
    info!("Removing finalizer {} from {}", finalizer, key);
    *obj = store.update(obj).await?;
    Ok(true)
}

#[cfg(test)]
#[path = "finalizers_tests.rs"]
mod finalizers_tests;
