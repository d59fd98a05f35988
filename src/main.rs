use std::path::PathBuf;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vax_core::{
    BatchRecomputer, CoreConfig, EngineRegistry, RecordFile, SystemClock, load_policy_set,
    load_records_dir, resolve_policy_dir, worker_threads_from_env_value,
};

/// Main entry point for the scheduled recomputation run
///
/// Loads the policy set once, recomputes every record file in the records directory on a
/// bounded worker pool and writes the successful results back in place.
///
/// # Environment Variables
/// - `VAX_POLICY_DIR`: directory holding `catalog.yaml` and `diseases/` (default: `policies`)
/// - `VAX_RECORDS_DIR`: directory of record files (default: `records`)
/// - `VAX_WORKERS`: worker threads (default: available parallelism)
///
/// Exits with an error when the policy set is invalid or any record failed.
fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive("vax=info".parse()?))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let policy_dir = resolve_policy_dir(std::env::var_os("VAX_POLICY_DIR").map(PathBuf::from))?;
    let records_dir = std::env::var_os("VAX_RECORDS_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(vax_core::constants::DEFAULT_RECORDS_DIR));
    let workers = worker_threads_from_env_value(std::env::var("VAX_WORKERS").ok())?;
    let config = CoreConfig::new(policy_dir, records_dir, workers)?;

    tracing::info!("++ Loading policies from {}", config.policy_dir().display());
    let policies = load_policy_set(config.policy_dir())?;
    let registry = EngineRegistry::from_policy_set(policies, Arc::new(SystemClock));

    tracing::info!("++ Recomputing records in {}", config.records_dir().display());
    let (paths, mut records): (Vec<PathBuf>, Vec<_>) =
        load_records_dir(config.records_dir())?.into_iter().unzip();
    let recomputer = BatchRecomputer::new(config.worker_threads())?;
    let report = recomputer.recompute_all(&registry, &mut records);

    for (path, record) in paths.iter().zip(&records) {
        if report.failures.iter().any(|f| f.record_id == record.id()) {
            continue;
        }
        RecordFile::write(path, record)?;
    }

    for failure in &report.failures {
        tracing::error!("Recompute error for {}: {}", failure.record_id, failure.error);
    }
    if !report.is_clean() {
        anyhow::bail!("{} of {} records failed", report.failures.len(), records.len());
    }

    Ok(())
}
