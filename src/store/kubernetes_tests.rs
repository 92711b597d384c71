// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `store/kubernetes.rs`

#[cfg(test)]
mod tests {
    use crate::store::kubernetes::classify;
    use crate::store::{ObjectKey, StoreError};

    fn api_error(code: u16, reason: &str) -> kube::Error {
        kube::Error::Api(
            kube::core::Status::failure(&format!("{reason} message"), reason)
                .with_code(code)
                .boxed(),
        )
    }

    #[test]
    fn test_classify_not_found() {
        let key = ObjectKey::namespaced("Secret", "a", "b");
        assert!(matches!(
            classify(api_error(404, "NotFound"), &key),
            StoreError::NotFound { key: k } if k == key
        ));
    }

    #[test]
    fn test_classify_conflicts() {
        let key = ObjectKey::namespaced("Secret", "a", "b");
        assert!(matches!(
            classify(api_error(409, "AlreadyExists"), &key),
            StoreError::AlreadyExists { .. }
        ));
        assert!(matches!(
            classify(api_error(409, "Conflict"), &key),
            StoreError::Conflict { .. }
        ));
    }

    #[test]
    fn test_classify_other_errors_are_passed_through() {
        let key = ObjectKey::namespaced("Secret", "a", "b");
        assert!(matches!(
            classify(api_error(403, "Forbidden"), &key),
            StoreError::Api(_)
        ));
    }
}
