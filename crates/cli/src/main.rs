use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use vax_core::{
    load_policy_set, load_records_dir, resolve_policy_dir, BatchRecomputer, BatchReport,
    Calculation, Clock, EngineRegistry, FixedClock, ImmunizationRecord, RecordFile, SystemClock,
};

#[derive(Parser)]
#[command(name = "vax")]
#[command(about = "Vaccination eligibility engine CLI")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute protection for one record file
    Compute {
        /// Record file (YAML)
        record: PathBuf,
        /// Policy directory (defaults to VAX_POLICY_DIR or ./policies)
        #[arg(long)]
        policy_dir: Option<PathBuf>,
        /// Evaluation date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        today: Option<NaiveDate>,
        /// Store the computed protection and status back into the record file
        #[arg(long)]
        write: bool,
    },
    /// Validate the catalog and every disease policy
    CheckPolicy {
        /// Policy directory (defaults to VAX_POLICY_DIR or ./policies)
        #[arg(long)]
        policy_dir: Option<PathBuf>,
    },
    /// Clear the locked completion route of a record
    ResetCompletion {
        /// Record file (YAML)
        record: PathBuf,
    },
    /// Mark a new record as checked by staff
    MarkControlled {
        /// Record file (YAML)
        record: PathBuf,
    },
    /// Recompute every record file in a directory
    Batch {
        /// Records directory (defaults to VAX_RECORDS_DIR or ./records)
        #[arg(long)]
        records_dir: Option<PathBuf>,
        /// Policy directory (defaults to VAX_POLICY_DIR or ./policies)
        #[arg(long)]
        policy_dir: Option<PathBuf>,
        /// Worker threads (defaults to VAX_WORKERS or the available parallelism)
        #[arg(long)]
        workers: Option<usize>,
        /// Evaluation date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        today: Option<NaiveDate>,
    },
}

fn clock_for(today: Option<NaiveDate>) -> Arc<dyn Clock> {
    match today {
        Some(day) => Arc::new(FixedClock::on(day)),
        None => Arc::new(SystemClock),
    }
}

fn registry_for(
    policy_dir: Option<PathBuf>,
    today: Option<NaiveDate>,
) -> Result<EngineRegistry, Box<dyn std::error::Error>> {
    let override_dir = policy_dir.or_else(|| std::env::var_os("VAX_POLICY_DIR").map(PathBuf::from));
    let policy_dir = resolve_policy_dir(override_dir)?;
    let policies = load_policy_set(&policy_dir)?;
    Ok(EngineRegistry::from_policy_set(policies, clock_for(today)))
}

fn print_calculation(record: &ImmunizationRecord, calculation: &Calculation) {
    fn show(date: Option<NaiveDate>) -> String {
        date.map_or_else(|| "-".to_string(), |d| d.to_string())
    }

    let protection = &calculation.protection;
    println!("Record: {} ({})", record.id(), record.disease());
    println!("Rule: {}", calculation.rule);
    println!("Missing doses: {}", calculation.completion.missing_doses);
    println!("Completion: {:?}", calculation.completion.kind);
    println!("Reference date: {}", show(calculation.reference_date));
    println!("Immunized until: {}", show(protection.immunized_until()));
    println!("Next dose (public): {}", show(protection.next_dose_public()));
    println!("Next dose (self-pay): {}", show(protection.next_dose_self_pay()));
    let products: Vec<&str> = protection
        .allowed_products()
        .iter()
        .map(|p| p.as_str())
        .collect();
    println!("Allowed products: {}", products.join(", "));
    println!("Notify on eligibility: {}", protection.notify_on_eligibility());
}

fn update_record(
    path: &Path,
    change: impl FnOnce(&mut ImmunizationRecord) -> Result<(), vax_core::EngineError>,
) -> Result<ImmunizationRecord, Box<dyn std::error::Error>> {
    let mut record = RecordFile::read(path)?;
    change(&mut record)?;
    RecordFile::write(path, &record)?;
    Ok(record)
}

/// Turns a batch with failed records into an error so the process exits non-zero.
fn ensure_clean(report: &BatchReport, total: usize) -> Result<(), Box<dyn std::error::Error>> {
    if report.is_clean() {
        return Ok(());
    }
    Err(format!("{} of {} records failed", report.failures.len(), total).into())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Compute {
            record,
            policy_dir,
            today,
            write,
        }) => {
            let registry = registry_for(policy_dir, today)?;
            let mut loaded = RecordFile::read(&record)?;
            let calculation = if write {
                let calculation = registry.recompute(&mut loaded)?;
                RecordFile::write(&record, &loaded)?;
                calculation
            } else {
                registry.engine_for(loaded.disease())?.calculate(&loaded)?
            };
            print_calculation(&loaded, &calculation);
        }
        Some(Commands::CheckPolicy { policy_dir }) => {
            let override_dir =
                policy_dir.or_else(|| std::env::var_os("VAX_POLICY_DIR").map(PathBuf::from));
            let policy_dir = resolve_policy_dir(override_dir)?;
            match load_policy_set(&policy_dir) {
                Ok(policies) => {
                    println!(
                        "Policy directory {} is valid: {} products, {} diseases",
                        policy_dir.display(),
                        policies.catalog.products.len(),
                        policies.diseases.len()
                    );
                    for config in &policies.diseases {
                        let rules = vax_core::rule_set_for(config);
                        println!("  {}: {}", config.disease, rules.rule_names().join(" > "));
                    }
                }
                Err(e) => {
                    eprintln!("Error checking policy: {}", e);
                    std::process::exit(1);
                }
            }
        }
        Some(Commands::ResetCompletion { record }) => {
            let updated = update_record(&record, |r| {
                r.reset_completion();
                Ok(())
            })
            .map_err(|e| format!("Error resetting completion: {e}"))?;
            println!("Reset completion for record: {}", updated.id());
        }
        Some(Commands::MarkControlled { record }) => {
            let updated = update_record(&record, ImmunizationRecord::mark_controlled)
                .map_err(|e| format!("Error marking record as controlled: {e}"))?;
            println!("Marked record {} as controlled", updated.id());
        }
        Some(Commands::Batch {
            records_dir,
            policy_dir,
            workers,
            today,
        }) => {
            let registry = registry_for(policy_dir, today)?;
            let records_dir = records_dir
                .or_else(|| std::env::var_os("VAX_RECORDS_DIR").map(PathBuf::from))
                .unwrap_or_else(|| PathBuf::from(vax_core::constants::DEFAULT_RECORDS_DIR));
            let workers = match workers {
                Some(n) => n,
                None => vax_core::worker_threads_from_env_value(std::env::var("VAX_WORKERS").ok())?,
            };

            let (paths, mut records): (Vec<PathBuf>, Vec<ImmunizationRecord>) =
                load_records_dir(&records_dir)?.into_iter().unzip();
            let report = BatchRecomputer::new(workers)?.recompute_all(&registry, &mut records);

            for (path, record) in paths.iter().zip(&records) {
                if report.failures.iter().all(|f| f.record_id != record.id()) {
                    RecordFile::write(path, record)?;
                }
            }

            println!("Recomputed {} records", report.recomputed);
            for failure in &report.failures {
                eprintln!("  {}: {}", failure.record_id, failure.error);
            }
            ensure_clean(&report, records.len())?;
        }
        None => {
            println!("Use 'vax --help' for commands");
        }
    }

    Ok(())
}
