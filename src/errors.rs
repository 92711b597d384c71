// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error type shared by the lifecycle manager and the cluster reconciler.
//!
//! The error is a closed union. Callers match on the variant to decide how to
//! proceed:
//!
//! - [`Error::NotFound`] is benign and ends a reconciliation successfully
//! - [`Error::NotYetAvailable`] and [`Error::RemainingResources`] are retryable
//!   and carry the delay after which the reconciliation should run again
//! - [`Error::Fatal`] wraps any other store error and is returned unchanged

use std::time::Duration;

use crate::store::{ObjectKey, StoreError};

/// Errors produced while reconciling a cluster.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The object does not exist.
    ///
    /// Returned when the reconciled object itself is gone. Ends the
    /// reconciliation without error.
    #[error("{object} not found")]
    NotFound {
        /// The missing object
        object: ObjectKey,
    },

    /// A prerequisite is not available yet.
    ///
    /// Returned while cluster access has not been granted, or while the remote
    /// store does not serve a kind the recipes need. Nothing was changed.
    #[error("{reason}")]
    NotYetAvailable {
        /// What is being waited for
        reason: String,
        /// Delay before the next attempt
        requeue_after: Duration,
    },

    /// Deletions were accepted but the objects still exist.
    ///
    /// The same teardown call must be repeated until it succeeds.
    #[error("deletion of the following resources is still pending: [{}]", join_keys(.objects))]
    RemainingResources {
        /// Objects whose deletion is still pending
        objects: Vec<ObjectKey>,
        /// Delay before the next attempt
        requeue_after: Duration,
    },

    /// Any other failure.
    #[error("{cause}")]
    Fatal {
        #[source]
        cause: StoreError,
    },
}

fn join_keys(keys: &[ObjectKey]) -> String {
    keys.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl Error {
    /// Wraps a store error as a fatal error.
    #[must_use]
    pub fn fatal(cause: StoreError) -> Self {
        Self::Fatal { cause }
    }

    /// Fatal error for an invalid object or configuration.
    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Fatal {
            cause: StoreError::Invalid(message.into()),
        }
    }

    /// Delay after which a retryable error should be retried.
    #[must_use]
    pub fn requeue_after(&self) -> Option<Duration> {
        match self {
            Self::NotYetAvailable { requeue_after, .. }
            | Self::RemainingResources { requeue_after, .. } => Some(*requeue_after),
            Self::NotFound { .. } | Self::Fatal { .. } => None,
        }
    }

    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.requeue_after().is_some()
    }

    #[must_use]
    pub fn is_remaining_resources(&self) -> bool {
        matches!(self, Self::RemainingResources { .. })
    }

    /// Turns a "kind not registered" failure into a retryable condition.
    ///
    /// Other errors are returned unchanged.
    #[must_use]
    pub fn retry_if_unregistered(self, requeue_after: Duration) -> Self {
        match self {
            Self::Fatal {
                cause: StoreError::KindNotRegistered { kind },
            } => Self::NotYetAvailable {
                reason: format!("kind {kind} is not registered yet"),
                requeue_after,
            },
            other => other,
        }
    }

    /// Short label for metrics and logs.
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::NotYetAvailable { .. } => "not_yet_available",
            Self::RemainingResources { .. } => "remaining_resources",
            Self::Fatal { .. } => "fatal",
        }
    }
}

impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { key } => Self::NotFound { object: key },
            cause => Self::Fatal { cause },
        }
    }
}

impl From<kube::Error> for Error {
    fn from(err: kube::Error) -> Self {
        Self::Fatal {
            cause: StoreError::Api(err),
        }
    }
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod errors_tests;
