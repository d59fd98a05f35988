//! Constants used throughout the vax core crate.
//!
//! This module contains file and directory names for the policy set and record files, plus the
//! name reported for the catch-all rule.

/// Default directory holding `catalog.yaml` and `diseases/`.
pub const DEFAULT_POLICY_DIR: &str = "policies";

/// Default directory for record files when no explicit directory is configured.
pub const DEFAULT_RECORDS_DIR: &str = "records";

/// Filename of the dose-requirement catalog inside the policy directory.
pub const CATALOG_FILENAME: &str = "catalog.yaml";

/// Subdirectory of the policy directory holding one YAML file per disease.
pub const DISEASES_DIR_NAME: &str = "diseases";

/// Extension of record and policy files.
pub const YAML_EXTENSION: &str = "yaml";

/// Name reported when no specific rule applied.
pub const CATCH_ALL_RULE_NAME: &str = "catch-all";
