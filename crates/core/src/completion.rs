//! Primary-series completion.
//!
//! Decides from the timeline whether the primary series is complete and, if so, which evidence
//! completed it. The route is what the status guard locks into the dossier.

use crate::catalog::ProductCatalog;
use crate::record::{
    CertifiedProduct, DoseSource, ExternalCertificate, ImmunizationRecord, VaccinationDose,
};
use crate::timeline::{ImmunizationTimeline, TimelineEntry};
use serde::{Deserialize, Serialize};
use vax_policy::PolicyFlags;
use vax_types::{ApprovalTier, ProductId};

/// Which evidence completed the primary series.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionRoute {
    /// Local doses only.
    LocalSeries,
    /// External evidence alone was enough.
    ExternalOnly,
    /// External evidence topped up with local doses.
    ExternalAndLocal,
    /// As `ExternalAndLocal`, with the certificate stating a recovered illness.
    ExternalLocalAndRecovered,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompletionKind {
    Incomplete,
    Complete(CompletionRoute),
}

impl CompletionKind {
    pub fn route(&self) -> Option<CompletionRoute> {
        match self {
            CompletionKind::Incomplete => None,
            CompletionKind::Complete(route) => Some(*route),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CompletionOutcome {
    pub missing_doses: u32,
    pub kind: CompletionKind,

    /// Counted local doses.
    pub local_doses: u32,

    /// Counted external doses, certificate doses included.
    pub external_doses: u32,
}

impl CompletionOutcome {
    pub fn is_complete(&self) -> bool {
        matches!(self.kind, CompletionKind::Complete(_))
    }
}

/// Evaluates primary-series completion for a record.
///
/// Diseases with a two-phase primary series only count doses flagged as primary-series doses;
/// every other disease counts all doses. Doses with a non-local source count as external
/// evidence.
///
/// The timeline is walked in order and the route is taken from the evidence on record when the
/// series first becomes complete. Later doses are boosters and never change the route.
pub fn evaluate_completion(
    record: &ImmunizationRecord,
    timeline: &ImmunizationTimeline<'_>,
    catalog: &ProductCatalog,
    flags: &PolicyFlags,
) -> CompletionOutcome {
    let recovered = flags.illness_counts_toward_primary && !timeline.illnesses().is_empty();
    let mut evidence = Evidence::default();
    let mut completed_by = None;
    let mut latest_assessment = None;

    for entry in timeline.entries() {
        match entry {
            TimelineEntry::Dose(dose) => {
                if flags.two_phase_primary && !dose.primary_series {
                    continue;
                }
                evidence.add_dose(dose);
            }
            TimelineEntry::Certificate(certificate) => evidence.certificate = Some(certificate),
        }

        let assessment = evidence.assess(catalog, recovered);
        let (_, kind) = assessment;
        if completed_by.is_none() && kind != CompletionKind::Incomplete {
            completed_by = Some(assessment);
        }
        latest_assessment = Some(assessment);
    }

    let (missing_doses, kind) = completed_by.or(latest_assessment).unwrap_or_else(|| {
        let full = catalog.full_series(&CertifiedProduct::Unknown(ApprovalTier::Approved));
        (full, CompletionKind::Incomplete)
    });

    let reported = record
        .certificate()
        .map_or(0, |certificate| certificate.reported_doses);

    CompletionOutcome {
        missing_doses,
        kind,
        local_doses: evidence.local,
        external_doses: evidence.external.saturating_add(reported),
    }
}

/// Counted evidence up to some point of the timeline.
#[derive(Default)]
struct Evidence<'a> {
    local: u32,
    external: u32,
    latest_product: Option<&'a ProductId>,
    certificate: Option<&'a ExternalCertificate>,
}

impl<'a> Evidence<'a> {
    fn add_dose(&mut self, dose: &'a VaccinationDose) {
        match dose.source {
            DoseSource::Local => self.local = self.local.saturating_add(1),
            DoseSource::External | DoseSource::UnknownChildhood => {
                self.external = self.external.saturating_add(1);
            }
        }
        self.latest_product = Some(&dose.product);
    }

    fn assess(&self, catalog: &ProductCatalog, recovered: bool) -> (u32, CompletionKind) {
        if let Some(certificate) = self.certificate {
            let external_doses = certificate.reported_doses.saturating_add(self.external);
            let missing_external =
                catalog.missing_doses(&certificate.product, external_doses, certificate.recovered);
            if missing_external == 0 {
                return (0, CompletionKind::Complete(CompletionRoute::ExternalOnly));
            }

            let missing = missing_external.saturating_sub(self.local);
            let kind = match missing {
                0 if certificate.recovered => {
                    CompletionKind::Complete(CompletionRoute::ExternalLocalAndRecovered)
                }
                0 => CompletionKind::Complete(CompletionRoute::ExternalAndLocal),
                _ => CompletionKind::Incomplete,
            };
            return (missing, kind);
        }

        let Some(product) = self.latest_product else {
            let full = catalog.full_series(&CertifiedProduct::Unknown(ApprovalTier::Approved));
            return (full, CompletionKind::Incomplete);
        };
        let doses = self.local.saturating_add(self.external);
        let product = CertifiedProduct::Known(product.clone());
        let missing = catalog.missing_doses(&product, doses, recovered);

        let kind = match (missing, self.local, self.external) {
            (0, _, 0) => CompletionKind::Complete(CompletionRoute::LocalSeries),
            (0, 0, _) => CompletionKind::Complete(CompletionRoute::ExternalOnly),
            (0, _, _) => CompletionKind::Complete(CompletionRoute::ExternalAndLocal),
            _ => CompletionKind::Incomplete,
        };
        (missing, kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{IllnessEpisode, Person, PrimarySlot};
    use chrono::NaiveDate;
    use vax_policy::Catalog;
    use vax_types::DiseaseId;

    const CATALOG: &str = r#"products:
  - product: comirnaty
    tier: approved
    doses:
      - { given: 0, still_needed: 2 }
      - { given: 1, still_needed: 1 }
      - { given: 2, still_needed: 0 }
  - product: jcovden
    tier: approved
    doses:
      - { given: 0, still_needed: 1 }
      - { given: 1, still_needed: 0 }
unknown_products:
  - tier: approved
    doses:
      - { given: 0, still_needed: 2 }
      - { given: 1, still_needed: 1 }
      - { given: 2, still_needed: 0 }
  - tier: provisionally_approved
    doses:
      - { given: 0, still_needed: 4 }
      - { given: 4, still_needed: 0 }
"#;

    fn catalog() -> ProductCatalog {
        ProductCatalog::new(Catalog::parse(CATALOG).expect("parse catalog"))
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn product(id: &str) -> ProductId {
        ProductId::new(id).expect("valid product")
    }

    fn two_phase_flags() -> PolicyFlags {
        PolicyFlags {
            two_phase_primary: true,
            ..PolicyFlags::default()
        }
    }

    fn record() -> ImmunizationRecord {
        ImmunizationRecord::new(
            DiseaseId::new("covid-19").expect("valid disease"),
            true,
            Person::born_on(date(1990, 1, 1)),
        )
    }

    fn evaluate(record: &ImmunizationRecord, flags: &PolicyFlags) -> CompletionOutcome {
        let timeline = ImmunizationTimeline::build(record);
        evaluate_completion(record, &timeline, &catalog(), flags)
    }

    #[test]
    fn empty_record_misses_full_series() {
        let outcome = evaluate(&record(), &two_phase_flags());
        assert_eq!(outcome.kind, CompletionKind::Incomplete);
        assert_eq!(outcome.missing_doses, 2);
    }

    #[test]
    fn two_local_doses_complete_local_series() {
        let mut rec = record();
        rec.set_primary_dose(
            PrimarySlot::First,
            VaccinationDose::local(date(2021, 1, 1), product("comirnaty")),
        )
        .expect("slot");
        rec.set_primary_dose(
            PrimarySlot::Second,
            VaccinationDose::local(date(2021, 2, 1), product("comirnaty")),
        )
        .expect("slot");

        let outcome = evaluate(&rec, &two_phase_flags());
        assert_eq!(outcome.kind, CompletionKind::Complete(CompletionRoute::LocalSeries));
        assert_eq!(outcome.local_doses, 2);
    }

    #[test]
    fn single_dose_product_completes_immediately() {
        let mut rec = record();
        rec.set_primary_dose(
            PrimarySlot::First,
            VaccinationDose::local(date(2021, 1, 1), product("jcovden")),
        )
        .expect("slot");
        let outcome = evaluate(&rec, &two_phase_flags());
        assert_eq!(outcome.kind, CompletionKind::Complete(CompletionRoute::LocalSeries));
    }

    #[test]
    fn boosters_do_not_count_toward_two_phase_primary() {
        let mut rec = record();
        rec.set_primary_dose(
            PrimarySlot::First,
            VaccinationDose::local(date(2021, 1, 1), product("comirnaty")),
        )
        .expect("slot");
        rec.append_booster(VaccinationDose::local(date(2021, 9, 1), product("comirnaty")));

        let outcome = evaluate(&rec, &two_phase_flags());
        assert_eq!(outcome.kind, CompletionKind::Incomplete);
        assert_eq!(outcome.missing_doses, 1);

        let booster_only = evaluate(&rec, &PolicyFlags::default());
        assert!(booster_only.is_complete());
    }

    #[test]
    fn external_and_local_doses_combine() {
        let mut rec = record();
        rec.set_certificate(Some(ExternalCertificate {
            product: CertifiedProduct::Known(product("comirnaty")),
            reported_doses: 1,
            recovered: false,
            last_dose_date: Some(date(2021, 1, 1)),
            immunocompromised: false,
        }));
        rec.set_primary_dose(
            PrimarySlot::First,
            VaccinationDose::local(date(2021, 2, 1), product("comirnaty")),
        )
        .expect("slot");

        let outcome = evaluate(&rec, &two_phase_flags());
        assert_eq!(outcome.kind, CompletionKind::Complete(CompletionRoute::ExternalAndLocal));
        assert_eq!(outcome.external_doses, 1);
        assert_eq!(outcome.local_doses, 1);
    }

    #[test]
    fn external_shortfall_is_reduced_by_local_doses() {
        let mut rec = record();
        rec.set_certificate(Some(ExternalCertificate {
            product: CertifiedProduct::Unknown(ApprovalTier::ProvisionallyApproved),
            reported_doses: 2,
            recovered: true,
            last_dose_date: None,
            immunocompromised: false,
        }));
        rec.set_primary_dose(
            PrimarySlot::First,
            VaccinationDose::local(date(2021, 2, 1), product("comirnaty")),
        )
        .expect("slot");

        let outcome = evaluate(&rec, &two_phase_flags());
        assert_eq!(outcome.missing_doses, 3);
        assert_eq!(outcome.kind, CompletionKind::Incomplete);

        rec.set_primary_dose(
            PrimarySlot::Second,
            VaccinationDose::local(date(2021, 3, 1), product("comirnaty")),
        )
        .expect("slot");
        let outcome = evaluate(&rec, &two_phase_flags());
        assert_eq!(outcome.missing_doses, 2);
    }

    #[test]
    fn certificate_alone_completes_externally() {
        let mut rec = record();
        rec.set_certificate(Some(ExternalCertificate {
            product: CertifiedProduct::Known(product("comirnaty")),
            reported_doses: 1,
            recovered: true,
            last_dose_date: None,
            immunocompromised: false,
        }));

        let outcome = evaluate(&rec, &two_phase_flags());
        assert_eq!(outcome.kind, CompletionKind::Complete(CompletionRoute::ExternalOnly));
        assert_eq!(outcome.missing_doses, 0);
    }

    #[test]
    fn recovered_certificate_with_local_top_up() {
        let mut rec = record();
        rec.set_certificate(Some(ExternalCertificate {
            product: CertifiedProduct::Unknown(ApprovalTier::Approved),
            reported_doses: 0,
            recovered: true,
            last_dose_date: None,
            immunocompromised: false,
        }));
        rec.set_primary_dose(
            PrimarySlot::First,
            VaccinationDose::local(date(2021, 2, 1), product("comirnaty")),
        )
        .expect("slot");
        rec.set_primary_dose(
            PrimarySlot::Second,
            VaccinationDose::local(date(2021, 3, 1), product("comirnaty")),
        )
        .expect("slot");

        let outcome = evaluate(&rec, &two_phase_flags());
        assert_eq!(
            outcome.kind,
            CompletionKind::Complete(CompletionRoute::ExternalLocalAndRecovered)
        );
    }

    #[test]
    fn illness_counts_toward_primary_only_when_flagged() {
        let mut rec = record();
        rec.set_primary_dose(
            PrimarySlot::First,
            VaccinationDose::local(date(2021, 1, 1), product("comirnaty")),
        )
        .expect("slot");
        rec.add_illness(IllnessEpisode { date: date(2020, 11, 1) });

        assert!(!evaluate(&rec, &two_phase_flags()).is_complete());

        let flags = PolicyFlags {
            illness_counts_toward_primary: true,
            ..two_phase_flags()
        };
        assert_eq!(
            evaluate(&rec, &flags).kind,
            CompletionKind::Complete(CompletionRoute::LocalSeries)
        );
    }

    #[test]
    fn external_source_doses_without_certificate() {
        let mut rec = record();
        rec.set_primary_dose(
            PrimarySlot::First,
            VaccinationDose::local(date(2021, 1, 1), product("comirnaty"))
                .with_source(DoseSource::External),
        )
        .expect("slot");
        rec.set_primary_dose(
            PrimarySlot::Second,
            VaccinationDose::local(date(2021, 2, 1), product("comirnaty"))
                .with_source(DoseSource::UnknownChildhood),
        )
        .expect("slot");
        assert_eq!(
            evaluate(&rec, &two_phase_flags()).kind,
            CompletionKind::Complete(CompletionRoute::ExternalOnly)
        );

        rec.set_primary_dose(
            PrimarySlot::Second,
            VaccinationDose::local(date(2021, 2, 1), product("comirnaty")),
        )
        .expect("slot");
        assert_eq!(
            evaluate(&rec, &two_phase_flags()).kind,
            CompletionKind::Complete(CompletionRoute::ExternalAndLocal)
        );
    }

    #[test]
    fn later_doses_do_not_change_how_the_series_was_completed() {
        let mut rec = ImmunizationRecord::new(
            DiseaseId::new("influenza").expect("valid disease"),
            false,
            Person::born_on(date(1950, 1, 1)),
        );
        rec.append_booster(
            VaccinationDose::local(date(2022, 10, 1), product("jcovden"))
                .with_source(DoseSource::External),
        );
        rec.append_booster(VaccinationDose::local(date(2023, 9, 30), product("jcovden")));

        let outcome = evaluate(&rec, &PolicyFlags::default());
        assert_eq!(outcome.kind, CompletionKind::Complete(CompletionRoute::ExternalOnly));
        assert_eq!(outcome.missing_doses, 0);
        assert_eq!(outcome.local_doses, 1);
        assert_eq!(outcome.external_doses, 1);
    }

    #[test]
    fn local_series_is_kept_when_a_later_certificate_is_recorded() {
        let mut rec = record();
        rec.set_primary_dose(
            PrimarySlot::First,
            VaccinationDose::local(date(2021, 1, 1), product("jcovden")),
        )
        .expect("slot");
        rec.set_certificate(Some(ExternalCertificate {
            product: CertifiedProduct::Known(product("comirnaty")),
            reported_doses: 2,
            recovered: false,
            last_dose_date: Some(date(2021, 6, 1)),
            immunocompromised: false,
        }));

        let outcome = evaluate(&rec, &two_phase_flags());
        assert_eq!(outcome.kind, CompletionKind::Complete(CompletionRoute::LocalSeries));
        assert_eq!(outcome.external_doses, 2);
    }
}
