//! Batch recomputation.
//!
//! Records are independent, so a batch fans out across a bounded rayon pool. Each record is
//! borrowed mutably by exactly one worker; a failing record is reported and left untouched
//! while the rest of the batch continues.

use crate::catalog::ProductCatalog;
use crate::clock::Clock;
use crate::config::PolicySet;
use crate::error::{EngineError, EngineResult};
use crate::record::ImmunizationRecord;
use crate::service::{Calculation, ProtectionEngine};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;
use vax_types::DiseaseId;

/// One engine per configured disease.
#[derive(Clone, Debug, Default)]
pub struct EngineRegistry {
    engines: BTreeMap<DiseaseId, ProtectionEngine>,
}

impl EngineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds an engine for every disease of the policy set, sharing one catalog and clock.
    pub fn from_policy_set(policies: PolicySet, clock: Arc<dyn Clock>) -> Self {
        let catalog = Arc::new(ProductCatalog::new(policies.catalog));
        let engines = policies
            .diseases
            .into_iter()
            .map(|config| {
                let disease = config.disease.clone();
                let engine =
                    ProtectionEngine::new(config, Arc::clone(&catalog), Arc::clone(&clock));
                (disease, engine)
            })
            .collect();
        Self { engines }
    }

    /// Adds or replaces the engine for its disease.
    pub fn insert(&mut self, engine: ProtectionEngine) -> Option<ProtectionEngine> {
        self.engines.insert(engine.config().disease.clone(), engine)
    }

    pub fn get(&self, disease: &DiseaseId) -> Option<&ProtectionEngine> {
        self.engines.get(disease)
    }

    pub fn diseases(&self) -> impl Iterator<Item = &DiseaseId> {
        self.engines.keys()
    }

    pub fn engine_for(&self, disease: &DiseaseId) -> EngineResult<&ProtectionEngine> {
        self.get(disease)
            .ok_or_else(|| EngineError::UnknownDisease(disease.clone()))
    }

    /// Recomputes a record with the engine of its disease.
    pub fn recompute(&self, record: &mut ImmunizationRecord) -> EngineResult<Calculation> {
        self.engine_for(record.disease())?.recompute(record)
    }
}

/// A record that could not be recomputed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchFailure {
    pub record_id: Uuid,
    pub error: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub recomputed: usize,
    pub failures: Vec<BatchFailure>,
}

impl BatchReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Runs batch recomputations on a dedicated, bounded thread pool.
#[derive(Debug)]
pub struct BatchRecomputer {
    pool: rayon::ThreadPool,
    workers: usize,
}

impl BatchRecomputer {
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidInput`] for zero workers, or
    /// [`EngineError::WorkerPool`] if the pool cannot be built.
    pub fn new(workers: usize) -> EngineResult<Self> {
        if workers == 0 {
            return Err(EngineError::InvalidInput(
                "batch recomputation needs at least one worker".into(),
            ));
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|index| format!("vax-batch-{index}"))
            .build()
            .map_err(EngineError::WorkerPool)?;
        Ok(Self { pool, workers })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Recomputes every record; failures are collected in record order.
    pub fn recompute_all(
        &self,
        registry: &EngineRegistry,
        records: &mut [ImmunizationRecord],
    ) -> BatchReport {
        let results: Vec<Result<(), BatchFailure>> = self.pool.install(|| {
            records
                .par_iter_mut()
                .map(|record| {
                    registry
                        .recompute(record)
                        .map(|_| ())
                        .map_err(|e| BatchFailure {
                            record_id: record.id(),
                            error: e.to_string(),
                        })
                })
                .collect()
        });

        let mut report = BatchReport::default();
        for result in results {
            match result {
                Ok(()) => report.recomputed += 1,
                Err(failure) => report.failures.push(failure),
            }
        }

        tracing::info!(
            recomputed = report.recomputed,
            failed = report.failures.len(),
            workers = self.workers,
            "batch recomputation finished"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::record::{Person, VaccinationDose};
    use chrono::NaiveDate;
    use vax_policy::{Catalog, DiseasePolicy};
    use vax_types::ProductId;

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

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn registry() -> EngineRegistry {
        let policies = PolicySet {
            catalog: Catalog::parse(CATALOG).expect("parse catalog"),
            diseases: vec![DiseasePolicy::parse(FLU).expect("parse policy")],
        };
        EngineRegistry::from_policy_set(policies, Arc::new(FixedClock::on(date(2023, 10, 1))))
    }

    fn flu_record(dose_on: NaiveDate) -> ImmunizationRecord {
        let mut record = ImmunizationRecord::new(
            DiseaseId::new("influenza").expect("valid disease"),
            false,
            Person::born_on(date(1950, 1, 1)),
        );
        record.append_booster(VaccinationDose::local(
            dose_on,
            ProductId::new("fluad").expect("valid product"),
        ));
        record
    }

    #[test]
    fn zero_workers_is_rejected() {
        let err = BatchRecomputer::new(0).expect_err("should reject");
        assert!(matches!(err, EngineError::InvalidInput(_)));
    }

    #[test]
    fn recomputes_all_records_and_reports_failures() {
        let registry = registry();
        let unknown = ImmunizationRecord::new(
            DiseaseId::new("measles").expect("valid disease"),
            false,
            Person::default(),
        );
        let unknown_id = unknown.id();
        let mut records = vec![
            flu_record(date(2023, 1, 1)),
            unknown,
            flu_record(date(2022, 11, 1)),
        ];

        let report = BatchRecomputer::new(2)
            .expect("build pool")
            .recompute_all(&registry, &mut records);

        assert_eq!(report.recomputed, 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].record_id, unknown_id);
        assert!(report.failures[0].error.contains("measles"));
        assert_eq!(
            records[0].protection().and_then(|p| p.next_dose_public()),
            Some(date(2024, 1, 1))
        );
        assert!(records[1].protection().is_none());
    }

    #[test]
    fn batch_matches_sequential_recomputation() {
        let registry = registry();
        let mut batch: Vec<_> = (1..=12).map(|m| flu_record(date(2022, m, 1))).collect();
        let mut sequential = batch.clone();

        let report = BatchRecomputer::new(4)
            .expect("build pool")
            .recompute_all(&registry, &mut batch);
        assert!(report.is_clean());

        for record in &mut sequential {
            registry.recompute(record).expect("recompute");
        }
        for (a, b) in batch.iter().zip(&sequential) {
            assert_eq!(a.protection(), b.protection());
            assert_eq!(a.status(), b.status());
        }
    }
}
