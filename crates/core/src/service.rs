//! Per-disease protection engine.
//!
//! One [`ProtectionEngine`] serves one disease. It is assembled from the disease configuration,
//! the shared product catalog, an immutable [`RuleSet`] and a clock, and it never changes after
//! construction. Engines are cheap to clone and safe to share across threads.
//!
//! [`ProtectionEngine::calculate`] is a pure function of the record, the configuration and
//! "today". [`ProtectionEngine::recompute`] additionally runs the status guard and, only when
//! that succeeds, swaps the new protection and status into the record.

use crate::catalog::ProductCatalog;
use crate::clock::Clock;
use crate::completion::{evaluate_completion, CompletionOutcome};
use crate::diseases::rule_set_for;
use crate::error::{EngineError, EngineResult};
use crate::protection::{Protection, SelfPayCutover};
use crate::record::{ImmunizationRecord, Person};
use crate::rules::{RuleContext, RuleSet};
use crate::status::StatusGuard;
use crate::timeline::ImmunizationTimeline;
use chrono::NaiveDate;
use std::sync::Arc;
use vax_policy::DiseaseConfig;

/// Result of one calculation, with the trace of how it was reached.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Calculation {
    pub protection: Protection,
    pub completion: CompletionOutcome,

    /// Name of the rule that produced `protection`.
    pub rule: String,

    pub reference_date: Option<NaiveDate>,
}

#[derive(Clone, Debug)]
pub struct ProtectionEngine {
    config: Arc<DiseaseConfig>,
    catalog: Arc<ProductCatalog>,
    rules: Arc<RuleSet>,
    clock: Arc<dyn Clock>,
}

impl ProtectionEngine {
    /// Builds the engine with the rule set derived from `config`.
    pub fn new(config: DiseaseConfig, catalog: Arc<ProductCatalog>, clock: Arc<dyn Clock>) -> Self {
        let rules = rule_set_for(&config);
        Self::with_rule_set(config, catalog, rules, clock)
    }

    /// Builds the engine with an explicit rule set.
    pub fn with_rule_set(
        config: DiseaseConfig,
        catalog: Arc<ProductCatalog>,
        rules: RuleSet,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            catalog,
            rules: Arc::new(rules),
            clock,
        }
    }

    pub fn config(&self) -> &DiseaseConfig {
        &self.config
    }

    pub fn rule_set(&self) -> &RuleSet {
        &self.rules
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    /// An empty record for this engine's disease.
    pub fn new_record(&self, person: Person) -> ImmunizationRecord {
        ImmunizationRecord::new(
            self.config.disease.clone(),
            self.config.flags.two_phase_primary,
            person,
        )
    }

    /// Computes protection and completion without touching the record.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::DiseaseMismatch`] for a record of another disease, or
    /// [`EngineError::InvalidInput`] if the record's two-phase flag disagrees with the disease.
    pub fn calculate(&self, record: &ImmunizationRecord) -> EngineResult<Calculation> {
        self.calculate_on(record, self.clock.today())
    }

    /// Recalculates the record and stores the result.
    ///
    /// On error the record is left untouched.
    ///
    /// # Errors
    ///
    /// As [`ProtectionEngine::calculate`], plus [`EngineError::IllegalStatusTransition`] when the
    /// locked completion route would change.
    pub fn recompute(&self, record: &mut ImmunizationRecord) -> EngineResult<Calculation> {
        let today = self.clock.today();
        let calculation = self.calculate_on(record, today)?;
        let status = StatusGuard::transition(
            record.status(),
            &calculation.completion,
            &calculation.protection,
            today,
        )?;
        record.replace_outcome(calculation.protection.clone(), status);
        Ok(calculation)
    }

    fn calculate_on(
        &self,
        record: &ImmunizationRecord,
        today: NaiveDate,
    ) -> EngineResult<Calculation> {
        if record.disease() != &self.config.disease {
            return Err(EngineError::DiseaseMismatch {
                expected: self.config.disease.clone(),
                found: record.disease().clone(),
            });
        }
        if record.supports_two_phase_primary() != self.config.flags.two_phase_primary {
            return Err(EngineError::InvalidInput(format!(
                "record {} disagrees with disease {} on two-phase primary series",
                record.id(),
                self.config.disease
            )));
        }

        let timeline = ImmunizationTimeline::build(record);
        let completion = evaluate_completion(record, &timeline, &self.catalog, &self.config.flags);
        let ctx = RuleContext::new(record, &timeline, &completion, &self.config, today);
        let reference_date = ctx.reference_date();
        let outcome = self.rules.evaluate(&ctx);

        let protection = match self.config.self_pay_cutover {
            Some(cutover) => SelfPayCutover::new(cutover).apply(
                outcome.protection,
                record.protection(),
                reference_date,
                today,
            ),
            None => outcome.protection,
        };

        tracing::debug!(
            record = %record.id(),
            disease = %self.config.disease,
            rule = %outcome.rule,
            missing_doses = completion.missing_doses,
            "protection calculated"
        );

        Ok(Calculation {
            protection,
            completion,
            rule: outcome.rule,
            reference_date,
        })
    }
}
