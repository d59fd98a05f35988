//! Core runtime configuration.
//!
//! This module defines configuration that should be resolved once at process startup and then
//! passed into core services. Nothing in the engine reads environment variables; binaries turn
//! `VAX_*` values into a [`CoreConfig`] and a loaded [`PolicySet`] before any record is touched.

use crate::constants::{
    CATALOG_FILENAME, DEFAULT_POLICY_DIR, DISEASES_DIR_NAME, YAML_EXTENSION,
};
use crate::{EngineError, EngineResult};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use vax_policy::{Catalog, CatalogData, DiseaseConfig, DiseasePolicy};

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    policy_dir: PathBuf,
    records_dir: PathBuf,
    worker_threads: usize,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    pub fn new(
        policy_dir: PathBuf,
        records_dir: PathBuf,
        worker_threads: usize,
    ) -> EngineResult<Self> {
        if worker_threads == 0 {
            return Err(EngineError::InvalidInput(
                "worker_threads must be at least 1".into(),
            ));
        }

        Ok(Self {
            policy_dir,
            records_dir,
            worker_threads,
        })
    }

    pub fn policy_dir(&self) -> &Path {
        &self.policy_dir
    }

    pub fn catalog_path(&self) -> PathBuf {
        self.policy_dir.join(CATALOG_FILENAME)
    }

    pub fn diseases_dir(&self) -> PathBuf {
        self.policy_dir.join(DISEASES_DIR_NAME)
    }

    pub fn records_dir(&self) -> &Path {
        &self.records_dir
    }

    pub fn worker_threads(&self) -> usize {
        self.worker_threads
    }
}

/// Resolve the policy directory without reading environment variables.
///
/// If `override_dir` is provided, it must be a directory containing `catalog.yaml`.
/// Otherwise this searches for `policies/` relative to the current working directory and
/// then walks up from `CARGO_MANIFEST_DIR`.
pub fn resolve_policy_dir(override_dir: Option<PathBuf>) -> EngineResult<PathBuf> {
    fn looks_like_policy_dir(path: &Path) -> bool {
        path.is_dir() && path.join(CATALOG_FILENAME).is_file()
    }

    if let Some(policy_dir) = override_dir {
        if looks_like_policy_dir(&policy_dir) {
            return Ok(policy_dir);
        }
        return Err(EngineError::InvalidInput(format!(
            "policy directory override {} is not valid (must contain {CATALOG_FILENAME})",
            policy_dir.display()
        )));
    }

    let cwd_relative = PathBuf::from(DEFAULT_POLICY_DIR);
    if looks_like_policy_dir(&cwd_relative) {
        return Ok(cwd_relative);
    }

    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    for ancestor in manifest_dir.ancestors() {
        let candidate = ancestor.join(DEFAULT_POLICY_DIR);
        if looks_like_policy_dir(&candidate) {
            return Ok(candidate);
        }
    }

    Err(EngineError::InvalidInput(format!(
        "could not locate {DEFAULT_POLICY_DIR}/ directory with {CATALOG_FILENAME}"
    )))
}

/// Parse the worker count from an optional string value.
///
/// If `value` is `None` or empty/whitespace, returns the available parallelism (at least 1).
pub fn worker_threads_from_env_value(value: Option<String>) -> EngineResult<usize> {
    let value = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());

    match value {
        Some(v) => match v.parse::<usize>() {
            Ok(0) | Err(_) => Err(EngineError::InvalidInput(format!(
                "worker count must be a positive integer, got {v:?}"
            ))),
            Ok(n) => Ok(n),
        },
        None => Ok(std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)),
    }
}

/// Catalog plus every disease configuration of one policy directory.
#[derive(Clone, Debug)]
pub struct PolicySet {
    pub catalog: CatalogData,
    pub diseases: Vec<DiseaseConfig>,
}

/// Loads `catalog.yaml` and every `diseases/*.yaml` below `policy_dir`.
///
/// Disease files are read in file-name order. Unlike record files, a broken policy file is an
/// error: computing with a partial policy set would silently drop a disease.
pub fn load_policy_set(policy_dir: &Path) -> EngineResult<PolicySet> {
    let catalog_path = policy_dir.join(CATALOG_FILENAME);
    let catalog = Catalog::parse(&read_to_string(&catalog_path)?).map_err(|source| {
        EngineError::PolicyFile {
            path: catalog_path.clone(),
            source,
        }
    })?;

    let diseases_dir = policy_dir.join(DISEASES_DIR_NAME);
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(&diseases_dir).map_err(EngineError::FileRead)? {
        let path = entry.map_err(EngineError::FileRead)?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == YAML_EXTENSION) {
            paths.push(path);
        }
    }
    paths.sort();

    let mut seen = BTreeSet::new();
    let mut diseases = Vec::with_capacity(paths.len());
    for path in paths {
        let config = DiseasePolicy::parse(&read_to_string(&path)?).map_err(|source| {
            EngineError::PolicyFile {
                path: path.clone(),
                source,
            }
        })?;
        if !seen.insert(config.disease.clone()) {
            return Err(EngineError::InvalidInput(format!(
                "disease {} is configured twice ({})",
                config.disease,
                path.display()
            )));
        }
        diseases.push(config);
    }

    if diseases.is_empty() {
        return Err(EngineError::InvalidInput(format!(
            "no disease policies found in {}",
            diseases_dir.display()
        )));
    }

    Ok(PolicySet { catalog, diseases })
}

fn read_to_string(path: &Path) -> EngineResult<String> {
    std::fs::read_to_string(path).map_err(EngineError::FileRead)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const CATALOG: &str = r#"products:
  - product: fluad
    tier: approved
    doses: [{ given: 0, still_needed: 1 }, { given: 1, still_needed: 0 }]
"#;

    const FLU: &str = r#"disease: influenza
protection_duration: 12 months
rules:
  age_gated_booster:
    min_age: 65
    first_dose: { public: 0 days }
    subsequent: { public: 12 months }
    products: { adult: [fluad] }
"#;

    fn policy_dir(diseases: &[(&str, &str)]) -> TempDir {
        let dir = TempDir::new().expect("create temp dir");
        fs::write(dir.path().join(CATALOG_FILENAME), CATALOG).expect("write catalog");
        let diseases_dir = dir.path().join(DISEASES_DIR_NAME);
        fs::create_dir(&diseases_dir).expect("create diseases dir");
        for (name, contents) in diseases {
            fs::write(diseases_dir.join(name), contents).expect("write disease");
        }
        dir
    }

    #[test]
    fn core_config_rejects_zero_workers() {
        let err = CoreConfig::new(PathBuf::from("p"), PathBuf::from("r"), 0)
            .expect_err("should reject");
        assert!(matches!(err, EngineError::InvalidInput(msg) if msg.contains("worker_threads")));
    }

    #[test]
    fn core_config_derives_policy_paths() {
        let cfg = CoreConfig::new(PathBuf::from("policies"), PathBuf::from("records"), 2)
            .expect("valid config");
        assert_eq!(cfg.catalog_path(), PathBuf::from("policies/catalog.yaml"));
        assert_eq!(cfg.diseases_dir(), PathBuf::from("policies/diseases"));
        assert_eq!(cfg.worker_threads(), 2);
    }

    #[test]
    fn worker_threads_parsing() {
        assert_eq!(
            worker_threads_from_env_value(Some(" 4 ".into())).expect("parse"),
            4
        );
        assert!(worker_threads_from_env_value(None).expect("default") >= 1);
        assert!(worker_threads_from_env_value(Some("   ".into())).expect("blank") >= 1);
        assert!(worker_threads_from_env_value(Some("0".into())).is_err());
        assert!(worker_threads_from_env_value(Some("many".into())).is_err());
    }

    #[test]
    fn resolve_policy_dir_accepts_valid_override() {
        let dir = policy_dir(&[("influenza.yaml", FLU)]);
        let resolved =
            resolve_policy_dir(Some(dir.path().to_path_buf())).expect("valid override");
        assert_eq!(resolved, dir.path());
    }

    #[test]
    fn resolve_policy_dir_rejects_override_without_catalog() {
        let dir = TempDir::new().expect("create temp dir");
        let err = resolve_policy_dir(Some(dir.path().to_path_buf())).expect_err("should reject");
        assert!(matches!(err, EngineError::InvalidInput(msg) if msg.contains(CATALOG_FILENAME)));
    }

    #[test]
    fn loads_policy_set_ignoring_other_files() {
        let dir = policy_dir(&[("influenza.yaml", FLU), ("README.txt", "not a policy")]);
        let set = load_policy_set(dir.path()).expect("load policy set");
        assert_eq!(set.catalog.products.len(), 1);
        assert_eq!(set.diseases.len(), 1);
        assert_eq!(set.diseases[0].disease.as_str(), "influenza");
    }

    #[test]
    fn duplicate_disease_is_rejected() {
        let dir = policy_dir(&[("a.yaml", FLU), ("b.yaml", FLU)]);
        let err = load_policy_set(dir.path()).expect_err("should reject");
        assert!(matches!(err, EngineError::InvalidInput(msg) if msg.contains("configured twice")));
    }

    #[test]
    fn broken_policy_file_names_the_path() {
        let dir = policy_dir(&[("influenza.yaml", "disease: influenza\n")]);
        let err = load_policy_set(dir.path()).expect_err("should reject");
        match err {
            EngineError::PolicyFile { path, .. } => assert!(path.ends_with("influenza.yaml")),
            other => panic!("expected PolicyFile error, got {other:?}"),
        }
    }
}
