//! Chronological view over an immunization record.
//!
//! The timeline borrows from the record and is rebuilt for every calculation. Local doses (primary
//! slots first, then boosters) and the external certificate become dose-like entries; illness
//! episodes are kept as a separate sorted list.

use crate::record::{
    CertifiedProduct, ExternalCertificate, ImmunizationRecord, PrimarySlot, VaccinationDose,
};
use chrono::NaiveDate;
use vax_types::ProductId;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimelineEntry<'a> {
    Dose(&'a VaccinationDose),
    Certificate(&'a ExternalCertificate),
}

impl<'a> TimelineEntry<'a> {
    /// `None` only for a certificate without a last-dose date.
    pub fn date(&self) -> Option<NaiveDate> {
        match self {
            TimelineEntry::Dose(dose) => Some(dose.administered_on),
            TimelineEntry::Certificate(certificate) => certificate.last_dose_date,
        }
    }

    /// Product of the entry, if it names one.
    pub fn product(&self) -> Option<&'a ProductId> {
        match self {
            TimelineEntry::Dose(dose) => Some(&dose.product),
            TimelineEntry::Certificate(certificate) => match &certificate.product {
                CertifiedProduct::Known(id) => Some(id),
                CertifiedProduct::Unknown(_) => None,
            },
        }
    }

    /// Number of doses the entry stands for.
    pub fn dose_count(&self) -> u32 {
        match self {
            TimelineEntry::Dose(_) => 1,
            TimelineEntry::Certificate(certificate) => certificate.reported_doses,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ImmunizationTimeline<'a> {
    entries: Vec<TimelineEntry<'a>>,
    illnesses: Vec<NaiveDate>,
}

impl<'a> ImmunizationTimeline<'a> {
    pub fn build(record: &'a ImmunizationRecord) -> Self {
        let primary = [
            record.primary_dose(PrimarySlot::First),
            record.primary_dose(PrimarySlot::Second),
        ];
        let mut entries: Vec<TimelineEntry<'a>> = primary
            .into_iter()
            .flatten()
            .chain(record.boosters().iter().map(|booster| booster.dose()))
            .map(TimelineEntry::Dose)
            .chain(record.certificate().map(TimelineEntry::Certificate))
            .collect();
        // stable: ties keep insertion order; `None` sorts first
        entries.sort_by_key(|entry| entry.date());

        let mut illnesses: Vec<NaiveDate> = record.illnesses().iter().map(|i| i.date).collect();
        illnesses.sort_unstable();

        Self { entries, illnesses }
    }

    pub fn entries(&self) -> &[TimelineEntry<'a>] {
        &self.entries
    }

    /// Dose entries only, in timeline order.
    pub fn doses(&self) -> impl Iterator<Item = &'a VaccinationDose> + '_ {
        self.entries.iter().filter_map(|entry| match entry {
            TimelineEntry::Dose(dose) => Some(*dose),
            TimelineEntry::Certificate(_) => None,
        })
    }

    pub fn latest(&self) -> Option<&TimelineEntry<'a>> {
        self.entries.last()
    }

    pub fn illnesses(&self) -> &[NaiveDate] {
        &self.illnesses
    }

    pub fn latest_illness(&self) -> Option<NaiveDate> {
        self.illnesses.last().copied()
    }

    /// Doses across all entries, counting each certificate with its reported doses.
    pub fn total_doses(&self) -> u32 {
        self.entries.iter().map(TimelineEntry::dose_count).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
