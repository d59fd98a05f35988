//! Immunization record read model.
//!
//! One [`ImmunizationRecord`] holds everything known about one person for one disease: local
//! doses, an optional external certificate, illness episodes, and the last computed
//! [`Protection`] together with the dossier status.
//!
//! ## Invariants
//!
//! - Primary-series slots exist only for diseases with a two-phase primary series.
//! - Booster sequence indices are strictly increasing. New boosters are appended; a correction
//!   replaces one entry, and only a changed date can reorder the list.
//! - Protection is never patched: each recomputation swaps in a new shared value.

use crate::error::{EngineError, EngineResult};
use crate::protection::Protection;
use crate::status::{DossierStatus, StatusGuard};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use uuid::Uuid;
use vax_types::{ApprovalTier, DiseaseId, PriorityCode, ProductId};

/// Where the evidence for a dose comes from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DoseSource {
    /// Administered and documented inside the programme.
    Local,
    /// Reported from outside the programme with a known date.
    External,
    /// Childhood immunization with unverifiable details.
    UnknownChildhood,
}

/// One administered dose.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VaccinationDose {
    pub administered_on: NaiveDate,
    pub product: ProductId,
    pub source: DoseSource,
    pub primary_series: bool,
}

impl VaccinationDose {
    /// A locally administered dose that is not part of the primary series.
    pub fn local(administered_on: NaiveDate, product: ProductId) -> Self {
        Self {
            administered_on,
            product,
            source: DoseSource::Local,
            primary_series: false,
        }
    }

    pub fn with_source(mut self, source: DoseSource) -> Self {
        self.source = source;
        self
    }

    pub fn as_primary(mut self) -> Self {
        self.primary_series = true;
        self
    }
}

/// Product stated on an external certificate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CertifiedProduct {
    Known(ProductId),
    /// The product is not named; only its approval tier is known.
    Unknown(ApprovalTier),
}

/// Self-reported or imported evidence of doses received outside the programme.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExternalCertificate {
    pub product: CertifiedProduct,
    pub reported_doses: u32,
    pub recovered: bool,

    /// `None` means "the doses happened, the date is unknown".
    pub last_dose_date: Option<NaiveDate>,

    pub immunocompromised: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct IllnessEpisode {
    pub date: NaiveDate,
}

/// Person attributes the rules depend on.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Person {
    pub birth_date: Option<NaiveDate>,
    pub priority_codes: BTreeSet<PriorityCode>,
    pub immunocompromised: bool,
}

impl Person {
    pub fn born_on(birth_date: NaiveDate) -> Self {
        Self {
            birth_date: Some(birth_date),
            ..Self::default()
        }
    }

    /// Completed years of age on `day`, or `None` without a birth date (or before birth).
    pub fn age_on(&self, day: NaiveDate) -> Option<u32> {
        let birth = self.birth_date?;
        if day < birth {
            return None;
        }
        let mut years = day.year() - birth.year();
        if (day.month(), day.day()) < (birth.month(), birth.day()) {
            years -= 1;
        }
        u32::try_from(years).ok()
    }
}

/// An entry of the booster list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BoosterDose {
    sequence: u32,
    dose: VaccinationDose,
}

impl BoosterDose {
    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    pub fn dose(&self) -> &VaccinationDose {
        &self.dose
    }
}

/// One of the two primary-series slots.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrimarySlot {
    First,
    Second,
}

impl PrimarySlot {
    fn index(self) -> usize {
        match self {
            PrimarySlot::First => 0,
            PrimarySlot::Second => 1,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ImmunizationRecord {
    id: Uuid,
    disease: DiseaseId,
    two_phase_primary: bool,
    person: Person,
    primary: [Option<VaccinationDose>; 2],
    boosters: Vec<BoosterDose>,
    certificate: Option<ExternalCertificate>,
    illnesses: Vec<IllnessEpisode>,
    accelerated_schedule: bool,
    protection: Option<Arc<Protection>>,
    status: DossierStatus,
}

impl ImmunizationRecord {
    /// Creates an empty record with a fresh id.
    ///
    /// `two_phase_primary` must match the disease configuration; the engine rejects records
    /// where it does not.
    pub fn new(disease: DiseaseId, two_phase_primary: bool, person: Person) -> Self {
        Self::with_id(Uuid::new_v4(), disease, two_phase_primary, person)
    }

    pub fn with_id(id: Uuid, disease: DiseaseId, two_phase_primary: bool, person: Person) -> Self {
        Self {
            id,
            disease,
            two_phase_primary,
            person,
            primary: [None, None],
            boosters: Vec::new(),
            certificate: None,
            illnesses: Vec::new(),
            accelerated_schedule: false,
            protection: None,
            status: DossierStatus::default(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn disease(&self) -> &DiseaseId {
        &self.disease
    }

    pub fn supports_two_phase_primary(&self) -> bool {
        self.two_phase_primary
    }

    pub fn person(&self) -> &Person {
        &self.person
    }

    /// Mutable access for corrections of birth date, priority groups or immunocompromised state.
    pub fn person_mut(&mut self) -> &mut Person {
        &mut self.person
    }

    pub fn primary_dose(&self, slot: PrimarySlot) -> Option<&VaccinationDose> {
        self.primary[slot.index()].as_ref()
    }

    /// Fills or replaces a primary-series slot. The stored dose is always flagged as primary.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::PrimarySlotsUnsupported`] for diseases without a two-phase
    /// primary series.
    pub fn set_primary_dose(
        &mut self,
        slot: PrimarySlot,
        dose: VaccinationDose,
    ) -> EngineResult<()> {
        if !self.two_phase_primary {
            return Err(EngineError::PrimarySlotsUnsupported(self.disease.clone()));
        }
        self.primary[slot.index()] = Some(dose.as_primary());
        Ok(())
    }

    /// Removes a primary-series dose entered by mistake.
    pub fn clear_primary_dose(&mut self, slot: PrimarySlot) -> Option<VaccinationDose> {
        self.primary[slot.index()].take()
    }

    pub fn boosters(&self) -> &[BoosterDose] {
        &self.boosters
    }

    /// Appends a dose to the booster list and returns its sequence index.
    pub fn append_booster(&mut self, dose: VaccinationDose) -> u32 {
        let sequence = self.boosters.last().map_or(1, |b| b.sequence + 1);
        self.boosters.push(BoosterDose { sequence, dose });
        sequence
    }

    /// Appends a booster with an explicit sequence index (used when loading stored records).
    pub(crate) fn push_booster_with_sequence(
        &mut self,
        sequence: u32,
        dose: VaccinationDose,
    ) -> EngineResult<()> {
        if let Some(last) = self.boosters.last() {
            if sequence <= last.sequence {
                return Err(EngineError::InvalidInput(format!(
                    "booster sequence {sequence} must be greater than {}",
                    last.sequence
                )));
            }
        }
        self.boosters.push(BoosterDose { sequence, dose });
        Ok(())
    }

    /// Replaces the booster with the given sequence index.
    ///
    /// If the corrected date breaks chronological order, the list is re-sorted by date and the
    /// sequence indices are renumbered from 1.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownBooster`] if no booster has that sequence index.
    pub fn correct_booster(&mut self, sequence: u32, dose: VaccinationDose) -> EngineResult<()> {
        let entry = self
            .boosters
            .iter_mut()
            .find(|b| b.sequence == sequence)
            .ok_or(EngineError::UnknownBooster(sequence))?;
        entry.dose = dose;

        let in_order = self
            .boosters
            .windows(2)
            .all(|pair| pair[0].dose.administered_on <= pair[1].dose.administered_on);
        if !in_order {
            self.boosters.sort_by_key(|b| b.dose.administered_on);
            for (index, booster) in self.boosters.iter_mut().enumerate() {
                booster.sequence = u32::try_from(index)
                    .unwrap_or(u32::MAX)
                    .saturating_add(1);
            }
        }
        Ok(())
    }

    pub fn certificate(&self) -> Option<&ExternalCertificate> {
        self.certificate.as_ref()
    }

    /// Adds, replaces, or (with `None`) removes the external certificate. Returns the previous one.
    pub fn set_certificate(
        &mut self,
        certificate: Option<ExternalCertificate>,
    ) -> Option<ExternalCertificate> {
        std::mem::replace(&mut self.certificate, certificate)
    }

    /// Illness episodes in insertion order.
    pub fn illnesses(&self) -> &[IllnessEpisode] {
        &self.illnesses
    }

    pub fn add_illness(&mut self, episode: IllnessEpisode) {
        self.illnesses.push(episode);
    }

    /// Corrects the date of the illness episode at `index` (insertion order).
    pub fn correct_illness(&mut self, index: usize, date: NaiveDate) -> EngineResult<()> {
        let episode = self
            .illnesses
            .get_mut(index)
            .ok_or(EngineError::UnknownIllness(index))?;
        episode.date = date;
        Ok(())
    }

    pub fn accelerated_schedule(&self) -> bool {
        self.accelerated_schedule
    }

    pub fn set_accelerated_schedule(&mut self, accelerated: bool) {
        self.accelerated_schedule = accelerated;
    }

    pub fn protection(&self) -> Option<&Protection> {
        self.protection.as_deref()
    }

    /// Shared handle to the current protection, for readers that outlive a recomputation.
    pub fn protection_handle(&self) -> Option<Arc<Protection>> {
        self.protection.clone()
    }

    pub fn status(&self) -> &DossierStatus {
        &self.status
    }

    /// The explicit "unset" transition required before a different completion route can be
    /// locked in.
    pub fn reset_completion(&mut self) {
        self.status = StatusGuard::reset(&self.status);
    }

    /// Marks the dossier as checked by staff.
    pub fn mark_controlled(&mut self) -> EngineResult<()> {
        self.status = StatusGuard::mark_controlled(&self.status)?;
        Ok(())
    }

    /// Swaps in a freshly computed protection and status; returns the replaced protection.
    pub(crate) fn replace_outcome(
        &mut self,
        protection: Protection,
        status: DossierStatus,
    ) -> Option<Arc<Protection>> {
        self.status = status;
        self.protection.replace(Arc::new(protection))
    }

    /// Restores a stored outcome without evaluating anything (used when loading record files).
    pub(crate) fn restore_outcome(
        &mut self,
        protection: Option<Protection>,
        status: DossierStatus,
    ) {
        self.protection = protection.map(Arc::new);
        self.status = status;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn product(id: &str) -> ProductId {
        ProductId::new(id).expect("valid product")
    }

    fn record(two_phase: bool) -> ImmunizationRecord {
        ImmunizationRecord::new(
            DiseaseId::new("covid-19").expect("valid disease"),
            two_phase,
            Person::born_on(date(1990, 6, 15)),
        )
    }

    #[test]
    fn age_counts_completed_years() {
        let person = Person::born_on(date(1990, 6, 15));
        assert_eq!(person.age_on(date(2024, 6, 14)), Some(33));
        assert_eq!(person.age_on(date(2024, 6, 15)), Some(34));
        assert_eq!(person.age_on(date(1980, 1, 1)), None);
        assert_eq!(Person::default().age_on(date(2024, 1, 1)), None);
    }

    #[test]
    fn primary_slots_require_two_phase_disease() {
        let mut booster_only = record(false);
        let err = booster_only
            .set_primary_dose(
                PrimarySlot::First,
                VaccinationDose::local(date(2024, 1, 1), product("fluad")),
            )
            .expect_err("should reject primary slot");
        assert!(matches!(err, EngineError::PrimarySlotsUnsupported(_)));

        let mut two_phase = record(true);
        two_phase.set_primary_dose(
            PrimarySlot::First,
            VaccinationDose::local(date(2024, 1, 1), product("comirnaty")),
        )
        .expect("two-phase record accepts primary dose");
        let stored = two_phase.primary_dose(PrimarySlot::First).expect("slot filled");
        assert!(stored.primary_series);
    }

    #[test]
    fn boosters_get_increasing_sequence_numbers() {
        let mut rec = record(true);
        let first = rec.append_booster(VaccinationDose::local(date(2023, 1, 1), product("fluad")));
        let second = rec.append_booster(VaccinationDose::local(date(2023, 9, 1), product("fluad")));
        assert_eq!((first, second), (1, 2));
        assert_eq!(rec.boosters()[1].sequence(), 2);
    }

    #[test]
    fn correcting_booster_date_reorders_and_renumbers() {
        let mut rec = record(true);
        rec.append_booster(VaccinationDose::local(date(2023, 1, 1), product("comirnaty")));
        rec.append_booster(VaccinationDose::local(date(2023, 9, 1), product("spikevax")));

        rec.correct_booster(1, VaccinationDose::local(date(2023, 12, 1), product("comirnaty")))
            .expect("booster exists");

        let boosters = rec.boosters();
        assert_eq!(boosters[0].dose().product.as_str(), "spikevax");
        assert_eq!(boosters[0].sequence(), 1);
        assert_eq!(boosters[1].dose().administered_on, date(2023, 12, 1));
        assert_eq!(boosters[1].sequence(), 2);
    }

    #[test]
    fn correcting_booster_in_place_keeps_sequence() {
        let mut rec = record(true);
        rec.append_booster(VaccinationDose::local(date(2023, 1, 1), product("comirnaty")));
        rec.append_booster(VaccinationDose::local(date(2023, 9, 1), product("comirnaty")));

        rec.correct_booster(2, VaccinationDose::local(date(2023, 9, 2), product("spikevax")))
            .expect("booster exists");
        assert_eq!(rec.boosters()[1].sequence(), 2);
        assert_eq!(rec.boosters()[1].dose().product.as_str(), "spikevax");

        let err = rec
            .correct_booster(7, VaccinationDose::local(date(2023, 9, 2), product("spikevax")))
            .expect_err("unknown booster");
        assert!(matches!(err, EngineError::UnknownBooster(7)));
    }

    #[test]
    fn explicit_sequence_must_increase() {
        let mut rec = record(false);
        rec.push_booster_with_sequence(
            3,
            VaccinationDose::local(date(2023, 1, 1), product("fluad")),
        )
        .expect("first booster");
        let err = rec
            .push_booster_with_sequence(
                3,
                VaccinationDose::local(date(2024, 1, 1), product("fluad")),
            )
            .expect_err("repeated sequence");
        assert!(matches!(err, EngineError::InvalidInput(_)));
        let next = rec.append_booster(VaccinationDose::local(date(2024, 1, 1), product("fluad")));
        assert_eq!(next, 4);
    }

    #[test]
    fn set_certificate_returns_previous() {
        let mut rec = record(true);
        let certificate = ExternalCertificate {
            product: CertifiedProduct::Unknown(ApprovalTier::Approved),
            reported_doses: 2,
            recovered: false,
            last_dose_date: None,
            immunocompromised: false,
        };
        assert!(rec.set_certificate(Some(certificate.clone())).is_none());
        assert_eq!(rec.set_certificate(None), Some(certificate));
        assert!(rec.certificate().is_none());
    }
}
