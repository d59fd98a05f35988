//! Policy wire/boundary support for the eligibility engine.
//!
//! This crate provides **wire models** and **translation helpers** for the on-disk YAML files
//! that configure the engine:
//! - the dose-requirement catalog (`catalog.yaml`)
//! - one disease configuration per programme (`diseases/<disease>.yaml`)
//!
//! This crate focuses on:
//! - strict serialisation/deserialisation (`#[serde(deny_unknown_fields)]`)
//! - translation between the wire structs and the domain-level carriers consumed by `vax-core`
//! - structural validation of policies (unique ids, sane offsets, consistent flags)
//!
//! It does not evaluate anything; rule evaluation lives in `vax-core`.

pub mod catalog;
pub mod disease;

// Re-export facades
pub use catalog::Catalog;
pub use disease::DiseasePolicy;

// Re-export public domain-level types
pub use catalog::{CatalogData, DoseRequirement, DoseStep, ProductRequirement};
pub use disease::{
    AgeGatedConfig, AllowList, DiseaseConfig, OffsetPair, PolicyFlags, ProductSchedule,
    RulesConfig, ScheduleConfig, StageOffsets, TierConfig, TwoPhaseConfig,
};

use serde::de::DeserializeOwned;

/// Errors returned by the `vax-policy` boundary crate.
#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid YAML: {0}")]
    InvalidYaml(#[from] serde_yaml::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("translation error: {0}")]
    Translation(String),

    #[error("invalid policy: {0}")]
    InvalidPolicy(String),
}

/// Type alias for Results that can fail with a [`PolicyError`].
pub type PolicyResult<T> = Result<T, PolicyError>;

/// Deserialize a strict wire struct, reporting the path of the first mismatching field.
///
/// `what` names the document in the error message (for example "Catalog").
pub(crate) fn parse_wire<T: DeserializeOwned>(yaml_text: &str, what: &str) -> PolicyResult<T> {
    let deserializer = serde_yaml::Deserializer::from_str(yaml_text);

    match serde_path_to_error::deserialize::<_, T>(deserializer) {
        Ok(parsed) => Ok(parsed),
        Err(err) => {
            let path = err.path().to_string();
            let source = err.into_inner();
            let path = if path.is_empty() || path == "." {
                "<root>"
            } else {
                path.as_str()
            };
            Err(PolicyError::Translation(format!(
                "{what} schema mismatch at {path}: {source}"
            )))
        }
    }
}
