// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `store/registry.rs`

#[cfg(test)]
mod tests {
    use crate::store::{KindInfo, ObjectKey, Registry, StoreError};

    #[test]
    fn test_core_group_api_version() {
        let info = KindInfo::new("", "v1", "Secret", "secrets", true);
        assert_eq!(info.api_version(), "v1");

        let info = KindInfo::new("helm.toolkit.fluxcd.io", "v2", "HelmRelease", "helmreleases", true);
        assert_eq!(info.api_version(), "helm.toolkit.fluxcd.io/v2");
    }

    #[test]
    fn test_platform_and_target_registries_are_disjoint_where_expected() {
        let platform = Registry::platform();
        let target = Registry::target();

        assert!(platform.lookup("HelmRelease").is_ok());
        assert!(target.lookup("HelmRelease").is_err());
        assert!(target.lookup("EnvoyProxy").is_ok());
        assert!(platform.lookup("EnvoyProxy").is_err());
        assert!(platform.lookup("Secret").is_ok() && target.lookup("Secret").is_ok());
    }

    #[test]
    fn test_validate_checks_scope() {
        let registry = Registry::target();

        assert!(matches!(
            registry.validate(&ObjectKey::namespaced("Namespace", "a", "b")),
            Err(StoreError::Invalid(_))
        ));
        assert!(matches!(
            registry.validate(&ObjectKey::cluster("Gateway", "b")),
            Err(StoreError::Invalid(_))
        ));
        assert!(registry
            .validate(&ObjectKey::namespaced("Gateway", "a", "b"))
            .is_ok());
    }

    #[test]
    fn test_new_object_sets_type_meta() {
        let obj = Registry::target()
            .new_object(&ObjectKey::namespaced("EnvoyProxy", "openmcp-system", "default"))
            .unwrap();

        let types = obj.types.unwrap();
        assert_eq!(types.api_version, "gateway.envoyproxy.io/v1alpha1");
        assert_eq!(types.kind, "EnvoyProxy");
        assert_eq!(obj.metadata.namespace.as_deref(), Some("openmcp-system"));
        assert_eq!(obj.metadata.name.as_deref(), Some("default"));
    }

    #[test]
    fn test_with_replaces_entries() {
        let registry = Registry::new()
            .with(KindInfo::new("a.io", "v1", "Thing", "things", true))
            .with(KindInfo::new("a.io", "v2", "Thing", "things", false));

        assert_eq!(registry.lookup("Thing").unwrap().version, "v2");
    }
}
