use crate::completion::CompletionOutcome;
use crate::record::ImmunizationRecord;
use crate::timeline::ImmunizationTimeline;
use chrono::NaiveDate;
use vax_policy::DiseaseConfig;
use vax_types::{PriorityCode, ProductId};

/// Everything a rule may look at, computed once per calculation.
#[derive(Clone, Copy, Debug)]
pub struct RuleContext<'a> {
    record: &'a ImmunizationRecord,
    timeline: &'a ImmunizationTimeline<'a>,
    completion: &'a CompletionOutcome,
    config: &'a DiseaseConfig,
    today: NaiveDate,
}

impl<'a> RuleContext<'a> {
    pub fn new(
        record: &'a ImmunizationRecord,
        timeline: &'a ImmunizationTimeline<'a>,
        completion: &'a CompletionOutcome,
        config: &'a DiseaseConfig,
        today: NaiveDate,
    ) -> Self {
        Self {
            record,
            timeline,
            completion,
            config,
            today,
        }
    }

    pub fn record(&self) -> &'a ImmunizationRecord {
        self.record
    }

    pub fn timeline(&self) -> &'a ImmunizationTimeline<'a> {
        self.timeline
    }

    pub fn completion(&self) -> &'a CompletionOutcome {
        self.completion
    }

    pub fn config(&self) -> &'a DiseaseConfig {
        self.config
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    /// Age on the evaluation day, not on the date of any dose.
    pub fn age(&self) -> Option<u32> {
        self.record.person().age_on(self.today)
    }

    /// Immunocompromised according to the person or the external certificate.
    pub fn is_immunocompromised(&self) -> bool {
        self.record.person().immunocompromised
            || self
                .record
                .certificate()
                .is_some_and(|certificate| certificate.immunocompromised)
    }

    pub fn has_priority_code(&self, codes: &[PriorityCode]) -> bool {
        codes
            .iter()
            .any(|code| self.record.person().priority_codes.contains(code))
    }

    pub fn primary_complete(&self) -> bool {
        self.completion.is_complete()
    }

    /// Any dose or certificate on record.
    pub fn holds_protection(&self) -> bool {
        !self.timeline.is_empty()
    }

    /// Boosters given so far. Primary-series slots are never counted.
    pub fn booster_count(&self) -> usize {
        self.record.boosters().len()
    }

    pub fn total_doses(&self) -> u32 {
        self.timeline.total_doses()
    }

    /// Product of the most recent dose-like entry, if it names one.
    pub fn latest_product(&self) -> Option<&'a ProductId> {
        self.timeline.latest().and_then(|entry| entry.product())
    }

    pub fn accelerated(&self) -> bool {
        self.config.flags.accelerated_schedule_capable && self.record.accelerated_schedule()
    }

    /// Date the offsets are counted from.
    ///
    /// The latest dose-like entry, where an undated certificate counts as today; moved later by
    /// the latest illness when the disease lets illness count toward the reference date.
    pub fn reference_date(&self) -> Option<NaiveDate> {
        let latest_entry = self
            .timeline
            .latest()
            .map(|entry| entry.date().unwrap_or(self.today));
        let latest_illness = self
            .timeline
            .latest_illness()
            .filter(|_| self.config.flags.illness_counts_toward_reference);
        latest_entry.max(latest_illness)
    }

    /// End of protection: only for a completed primary series.
    pub fn immunized_until(&self) -> Option<NaiveDate> {
        if !self.primary_complete() {
            return None;
        }
        let reference = self.reference_date()?;
        let until = self.config.protection_duration.add_to(reference);
        if until.is_none() {
            tracing::warn!(
                %reference,
                duration = %self.config.protection_duration,
                "protection duration overflows the calendar"
            );
        }
        until
    }
}
