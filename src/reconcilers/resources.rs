// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Apply and delete primitives for remote objects.
//!
//! These functions are resource-agnostic: they work on [`ObjectKey`]s and
//! envelope mutators, against any [`ObjectStore`].
//!
//! - [`create_or_update`] fetches or initializes an object, runs a mutator and
//!   writes only if something changed
//! - [`apply_all`] runs a batch of such operations, possibly across stores,
//!   and stops at the first error
//! - [`ensure_deleted`] issues deletes and reports objects whose deletion is
//!   still pending as [`Error::RemainingResources`]
//!
//! # Example
//!
//! ```rust,ignore
//! use platform_service_gateway::reconcilers::resources::{apply_all, ApplyOperation};
//!
//! async fn example(platform: &dyn ObjectStore, target: &dyn ObjectStore) -> Result<(), Error> {
//!     let ops = vec![
//!         ApplyOperation::new(namespace_key, Box::new(|_| Ok(()))).on(target),
//!         ApplyOperation::new(release_key, release_mutator),
//!     ];
//!     apply_all(platform, ops).await?;
//!     Ok(())
//! }
//! ```

use kube::api::DynamicObject;
use tracing::{debug, info};

use crate::constants::REMAINING_RESOURCES_BACKOFF;
use crate::errors::Error;
use crate::metrics;
use crate::store::{ObjectKey, ObjectStore};

/// Sets the desired fields of an object. Must be idempotent.
pub type Mutator = Box<dyn FnOnce(&mut DynamicObject) -> Result<(), Error> + Send>;

/// Outcome of [`create_or_update`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperationResult {
    Created,
    Updated,
    Unchanged,
}

impl OperationResult {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Unchanged => "unchanged",
        }
    }
}

/// Create or update an object so that it matches the mutator's output.
///
/// The object is fetched, or initialized from the store's registry if absent.
/// The mutator then sets the desired fields. The object is created if it did
/// not exist, updated if the mutator changed it, and left alone otherwise.
///
/// # Errors
///
/// Returns [`Error::Fatal`] if the mutator changes the object's identity, if the
/// mutator fails, or if the store rejects a read or write. A kind the store
/// does not serve surfaces as `Fatal` wrapping `KindNotRegistered`.
pub async fn create_or_update(
    store: &dyn ObjectStore,
    key: &ObjectKey,
    mutate: Mutator,
) -> Result<(OperationResult, DynamicObject), Error> {
    let existing = match store.get(key).await {
        Ok(obj) => Some(obj),
        Err(e) if e.is_not_found() => None,
        Err(e) => return Err(Error::fatal(e)),
    };

    let mut desired = match &existing {
        Some(obj) => obj.clone(),
        None => store.registry().new_object(key).map_err(Error::fatal)?,
    };
    mutate(&mut desired)?;

    let mutated_key = ObjectKey::from_object(&desired).map_err(Error::fatal)?;
    if mutated_key != *key {
        return Err(Error::invalid(format!(
            "mutator changed the identity of {key} to {mutated_key}"
        )));
    }

    let Some(existing) = existing else {
        let created = store.create(&desired).await.map_err(Error::fatal)?;
        info!("Created {}", key);
        metrics::record_object_operation(&key.kind, OperationResult::Created.as_str());
        return Ok((OperationResult::Created, created));
    };

    let before = serde_json::to_value(&existing).map_err(|e| Error::fatal(e.into()))?;
    let after = serde_json::to_value(&desired).map_err(|e| Error::fatal(e.into()))?;
    if before == after {
        debug!("{} is up to date", key);
        return Ok((OperationResult::Unchanged, existing));
    }

    let updated = store.update(&desired).await.map_err(Error::fatal)?;
    info!("Updated {}", key);
    metrics::record_object_operation(&key.kind, OperationResult::Updated.as_str());
    Ok((OperationResult::Updated, updated))
}

/// One step of an [`apply_all`] batch.
pub struct ApplyOperation<'a> {
    /// Identity of the object. Only kind, namespace and name are taken from here.
    pub key: ObjectKey,
    /// Sets every other field.
    pub mutate: Mutator,
    /// Overrides the batch's default store.
    pub store: Option<&'a dyn ObjectStore>,
}

impl<'a> ApplyOperation<'a> {
    #[must_use]
    pub fn new(key: ObjectKey, mutate: Mutator) -> Self {
        Self {
            key,
            mutate,
            store: None,
        }
    }

    /// Operation that only makes sure the object exists.
    #[must_use]
    pub fn ensure_exists(key: ObjectKey) -> Self {
        Self::new(key, Box::new(|_: &mut DynamicObject| Ok(())))
    }

    /// Binds the operation to another store.
    #[must_use]
    pub fn on<'b>(self, store: &'b dyn ObjectStore) -> ApplyOperation<'b> {
        ApplyOperation {
            key: self.key,
            mutate: self.mutate,
            store: Some(store),
        }
    }
}

/// Applies operations in order, stopping at the first failure.
///
/// The error is returned unchanged. Because every operation is idempotent, the
/// caller can retry the whole batch.
///
/// # Errors
///
/// Returns the first error raised by [`create_or_update`].
pub async fn apply_all(
    default_store: &dyn ObjectStore,
    ops: Vec<ApplyOperation<'_>>,
) -> Result<Vec<(ObjectKey, OperationResult)>, Error> {
    let mut results = Vec::with_capacity(ops.len());
    for op in ops {
        let store = op.store.unwrap_or(default_store);
        let (result, _) = create_or_update(store, &op.key, op.mutate).await?;
        results.push((op.key, result));
    }
    Ok(results)
}

/// Deletes the given objects.
///
/// Objects that are already gone, or whose kind is not served by the store,
/// count as deleted. Every other accepted delete leaves the object pending,
/// since deletion is asynchronous; those objects are returned in
/// [`Error::RemainingResources`]. Call again with the same keys until this
/// returns `Ok`.
///
/// # Errors
///
/// Returns [`Error::RemainingResources`] while deletions are pending, or
/// [`Error::Fatal`] if a delete is rejected.
pub async fn ensure_deleted(store: &dyn ObjectStore, keys: &[ObjectKey]) -> Result<(), Error> {
    let mut remaining = Vec::new();
    for key in keys {
        match store.delete(key).await {
            Ok(()) => {
                debug!("Deletion of {} accepted", key);
                metrics::record_object_operation(&key.kind, "deleted");
                remaining.push(key.clone());
            }
            Err(e) if e.is_not_found() || e.is_kind_not_registered() => {}
            Err(e) => return Err(Error::fatal(e)),
        }
    }

    if remaining.is_empty() {
        return Ok(());
    }
    Err(Error::RemainingResources {
        objects: remaining,
        requeue_after: REMAINING_RESOURCES_BACKOFF,
    })
}

#[cfg(test)]
#[path = "resources_tests.rs"]
mod resources_tests;
