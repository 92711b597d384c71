// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! CRD YAML Generator
//!
//! Generates the `GatewayServiceConfig` CRD YAML from the Rust types in src/crd.rs,
//! so deploy/crds/ stays in sync with the code.
//!
//! Usage:
//!   cargo run --bin crdgen

use platform_service_gateway::crd::gateway_service_config_crd;
use std::fs;
use std::path::Path;

const COPYRIGHT_HEADER: &str = "# Copyright (c) 2025 Erick Bourgeois, firestoned
# SPDX-License-Identifier: MIT
#
# This file is AUTO-GENERATED from src/crd.rs
# DO NOT EDIT MANUALLY - Run `cargo run --bin crdgen` to regenerate
#
";

const OUTPUT_FILE: &str = "gatewayserviceconfigs.crd.yaml";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let output_dir = Path::new("deploy/crds");
    fs::create_dir_all(output_dir)?;

    println!("Generating CRD YAML files from src/crd.rs...");

    let yaml = serde_yaml::to_string(&gateway_service_config_crd())?;
    let content = format!("{COPYRIGHT_HEADER}{yaml}");
    fs::write(output_dir.join(OUTPUT_FILE), content)?;
    println!("  ✓ Generated {OUTPUT_FILE}");

    println!("\nNext steps:");
    println!("  1. Review the generated file");
    println!("  2. Install it on the platform cluster with: kubectl apply -f deploy/crds/");
    println!("     or run: platform-service-gateway init");

    Ok(())
}
