//! Record file wire model and translation helpers.
//!
//! One YAML file holds one [`ImmunizationRecord`], including its last computed protection and
//! dossier status. Wire structs are private and strict (`deny_unknown_fields`); schema errors
//! name the failing path.
//!
//! Notes:
//! - A certificate names either `product` or `tier`, never both.
//! - Primary slots are always written with `primary_series` implied; boosters carry it only
//!   when set.

use crate::completion::CompletionRoute;
use crate::constants::YAML_EXTENSION;
use crate::protection::Protection;
use crate::record::{
    CertifiedProduct, DoseSource, ExternalCertificate, IllnessEpisode, ImmunizationRecord, Person,
    PrimarySlot, VaccinationDose,
};
use crate::status::{DossierStatus, ProgressState};
use crate::{EngineError, EngineResult};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;
use vax_types::{ApprovalTier, DiseaseId, PriorityCode, ProductId};

// ============================================================================
// Public RecordFile operations
// ============================================================================

/// Record file operations.
///
/// This is a zero-sized type used for namespacing record-file operations.
pub struct RecordFile;

impl RecordFile {
    /// Parse a record from YAML text.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::RecordSchema`] if the YAML does not match the wire schema or a
    /// certificate names both or neither of `product` and `tier`. Record invariants (primary
    /// slots on a two-phase disease, increasing booster sequence) surface as their own errors.
    pub fn parse(yaml_text: &str) -> EngineResult<ImmunizationRecord> {
        let deserializer = serde_yaml::Deserializer::from_str(yaml_text);
        let wire: RecordWire = serde_path_to_error::deserialize(deserializer).map_err(|e| {
            let path = e.path().to_string();
            let inner = e.into_inner();
            EngineError::RecordSchema(format!("record schema mismatch at {path}: {inner}"))
        })?;
        wire_to_domain(wire)
    }

    /// Render a record as YAML text.
    pub fn render(record: &ImmunizationRecord) -> EngineResult<String> {
        serde_yaml::to_string(&domain_to_wire(record)).map_err(EngineError::YamlSerialization)
    }

    pub fn read(path: &Path) -> EngineResult<ImmunizationRecord> {
        let text = std::fs::read_to_string(path).map_err(EngineError::FileRead)?;
        Self::parse(&text)
    }

    pub fn write(path: &Path, record: &ImmunizationRecord) -> EngineResult<()> {
        let text = Self::render(record)?;
        std::fs::write(path, text).map_err(EngineError::FileWrite)
    }
}

/// Reads every `*.yaml` record in `dir`, in file-name order.
///
/// Files that cannot be parsed are skipped with a warning.
pub fn load_records_dir(dir: &Path) -> EngineResult<Vec<(PathBuf, ImmunizationRecord)>> {
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(EngineError::FileRead)? {
        let path = entry.map_err(EngineError::FileRead)?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == YAML_EXTENSION) {
            paths.push(path);
        }
    }
    paths.sort();

    let mut records = Vec::with_capacity(paths.len());
    for path in paths {
        match RecordFile::read(&path) {
            Ok(record) => records.push((path, record)),
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "skipping unreadable record file"
                );
            }
        }
    }
    Ok(records)
}

// ============================================================================
// Wire types (internal)
// ============================================================================

fn local_source() -> DoseSource {
    DoseSource::Local
}

fn is_local(source: &DoseSource) -> bool {
    *source == DoseSource::Local
}

fn is_false(value: &bool) -> bool {
    !*value
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct RecordWire {
    id: Uuid,
    disease: DiseaseId,
    #[serde(default, skip_serializing_if = "is_false")]
    two_phase_primary: bool,
    #[serde(default)]
    person: PersonWire,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    primary_first: Option<DoseWire>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    primary_second: Option<DoseWire>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    boosters: Vec<BoosterWire>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    certificate: Option<CertificateWire>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    illnesses: Vec<NaiveDate>,
    #[serde(default, skip_serializing_if = "is_false")]
    accelerated_schedule: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    protection: Option<ProtectionWire>,
    #[serde(default)]
    status: StatusWire,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct PersonWire {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    birth_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    priority_codes: Vec<PriorityCode>,
    #[serde(default, skip_serializing_if = "is_false")]
    immunocompromised: bool,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct DoseWire {
    administered_on: NaiveDate,
    product: ProductId,
    #[serde(default = "local_source", skip_serializing_if = "is_local")]
    source: DoseSource,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct BoosterWire {
    sequence: u32,
    administered_on: NaiveDate,
    product: ProductId,
    #[serde(default = "local_source", skip_serializing_if = "is_local")]
    source: DoseSource,
    #[serde(default, skip_serializing_if = "is_false")]
    primary_series: bool,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct CertificateWire {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    product: Option<ProductId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tier: Option<ApprovalTier>,
    reported_doses: u32,
    #[serde(default, skip_serializing_if = "is_false")]
    recovered: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_dose_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "is_false")]
    immunocompromised: bool,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct ProtectionWire {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    immunized_until: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    next_dose_public: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    next_dose_self_pay: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    allowed_products: Vec<ProductId>,
    #[serde(default, skip_serializing_if = "is_false")]
    notify_on_eligibility: bool,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct StatusWire {
    #[serde(default)]
    progress: ProgressState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    completion: Option<CompletionRoute>,
}

// ============================================================================
// Helper functions (internal)
// ============================================================================

fn dose_to_domain(wire: DoseWire) -> VaccinationDose {
    VaccinationDose::local(wire.administered_on, wire.product).with_source(wire.source)
}

fn dose_to_wire(dose: &VaccinationDose) -> DoseWire {
    DoseWire {
        administered_on: dose.administered_on,
        product: dose.product.clone(),
        source: dose.source,
    }
}

fn certificate_to_domain(wire: CertificateWire) -> EngineResult<ExternalCertificate> {
    let product = match (wire.product, wire.tier) {
        (Some(product), None) => CertifiedProduct::Known(product),
        (None, Some(tier)) => CertifiedProduct::Unknown(tier),
        _ => {
            return Err(EngineError::RecordSchema(
                "certificate must name exactly one of product or tier".into(),
            ))
        }
    };
    Ok(ExternalCertificate {
        product,
        reported_doses: wire.reported_doses,
        recovered: wire.recovered,
        last_dose_date: wire.last_dose_date,
        immunocompromised: wire.immunocompromised,
    })
}

fn certificate_to_wire(certificate: &ExternalCertificate) -> CertificateWire {
    let (product, tier) = match &certificate.product {
        CertifiedProduct::Known(product) => (Some(product.clone()), None),
        CertifiedProduct::Unknown(tier) => (None, Some(*tier)),
    };
    CertificateWire {
        product,
        tier,
        reported_doses: certificate.reported_doses,
        recovered: certificate.recovered,
        last_dose_date: certificate.last_dose_date,
        immunocompromised: certificate.immunocompromised,
    }
}

fn wire_to_domain(wire: RecordWire) -> EngineResult<ImmunizationRecord> {
    let person = Person {
        birth_date: wire.person.birth_date,
        priority_codes: wire.person.priority_codes.into_iter().collect(),
        immunocompromised: wire.person.immunocompromised,
    };
    let mut record =
        ImmunizationRecord::with_id(wire.id, wire.disease, wire.two_phase_primary, person);

    if let Some(dose) = wire.primary_first {
        record.set_primary_dose(PrimarySlot::First, dose_to_domain(dose))?;
    }
    if let Some(dose) = wire.primary_second {
        record.set_primary_dose(PrimarySlot::Second, dose_to_domain(dose))?;
    }
    for booster in wire.boosters {
        let dose = VaccinationDose {
            administered_on: booster.administered_on,
            product: booster.product,
            source: booster.source,
            primary_series: booster.primary_series,
        };
        record.push_booster_with_sequence(booster.sequence, dose)?;
    }
    if let Some(certificate) = wire.certificate {
        record.set_certificate(Some(certificate_to_domain(certificate)?));
    }
    for date in wire.illnesses {
        record.add_illness(IllnessEpisode { date });
    }
    record.set_accelerated_schedule(wire.accelerated_schedule);

    let protection = wire.protection.map(|p| {
        Protection::from_parts(
            p.immunized_until,
            p.next_dose_public,
            p.next_dose_self_pay,
            p.allowed_products.into_iter().collect(),
            p.notify_on_eligibility,
        )
    });
    let status = DossierStatus::from_parts(wire.status.progress, wire.status.completion);
    record.restore_outcome(protection, status);

    Ok(record)
}

fn domain_to_wire(record: &ImmunizationRecord) -> RecordWire {
    let person = record.person();
    RecordWire {
        id: record.id(),
        disease: record.disease().clone(),
        two_phase_primary: record.supports_two_phase_primary(),
        person: PersonWire {
            birth_date: person.birth_date,
            priority_codes: person.priority_codes.iter().cloned().collect(),
            immunocompromised: person.immunocompromised,
        },
        primary_first: record.primary_dose(PrimarySlot::First).map(dose_to_wire),
        primary_second: record.primary_dose(PrimarySlot::Second).map(dose_to_wire),
        boosters: record
            .boosters()
            .iter()
            .map(|booster| BoosterWire {
                sequence: booster.sequence(),
                administered_on: booster.dose().administered_on,
                product: booster.dose().product.clone(),
                source: booster.dose().source,
                primary_series: booster.dose().primary_series,
            })
            .collect(),
        certificate: record.certificate().map(certificate_to_wire),
        illnesses: record.illnesses().iter().map(|i| i.date).collect(),
        accelerated_schedule: record.accelerated_schedule(),
        protection: record.protection().map(|p| ProtectionWire {
            immunized_until: p.immunized_until(),
            next_dose_public: p.next_dose_public(),
            next_dose_self_pay: p.next_dose_self_pay(),
            allowed_products: p.allowed_products().iter().cloned().collect(),
            notify_on_eligibility: p.notify_on_eligibility(),
        }),
        status: StatusWire {
            progress: record.status().progress(),
            completion: record.status().completion(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const RECORD: &str = r#"id: 5f0c8a52-3b1e-4d55-9a0e-0f4f3c2b7e11
disease: covid-19
two_phase_primary: true
person:
  birth_date: 1980-04-02
  priority_codes: [P1]
primary_first:
  administered_on: 2021-05-01
  product: comirnaty
  source: external
primary_second:
  administered_on: 2021-06-01
  product: comirnaty
boosters:
  - sequence: 1
    administered_on: 2021-12-01
    product: spikevax
certificate:
  tier: provisionally_approved
  reported_doses: 2
  recovered: true
illnesses: [2022-03-01]
protection:
  immunized_until: 2022-12-01
  next_dose_public: 2022-04-01
  allowed_products: [comirnaty]
status:
  progress: booster_eligible
  completion: external_only
"#;

    #[test]
    fn parses_full_record() {
        let record = RecordFile::parse(RECORD).expect("parse record");
        assert_eq!(record.disease().as_str(), "covid-19");
        assert!(record.supports_two_phase_primary());

        let first = record.primary_dose(PrimarySlot::First).expect("first slot");
        assert_eq!(first.source, DoseSource::External);
        assert!(first.primary_series);
        assert_eq!(record.boosters()[0].dose().product.as_str(), "spikevax");
        assert!(!record.boosters()[0].dose().primary_series);

        let certificate = record.certificate().expect("certificate");
        assert_eq!(
            certificate.product,
            CertifiedProduct::Unknown(ApprovalTier::ProvisionallyApproved)
        );
        assert_eq!(certificate.last_dose_date, None);

        let protection = record.protection().expect("protection");
        assert_eq!(protection.next_dose_self_pay(), None);
        assert_eq!(record.status().progress(), ProgressState::BoosterEligible);
        assert_eq!(record.status().completion(), Some(CompletionRoute::ExternalOnly));
    }

    #[test]
    fn render_then_parse_preserves_record() {
        let record = RecordFile::parse(RECORD).expect("parse record");
        let rendered = RecordFile::render(&record).expect("render");
        let reparsed = RecordFile::parse(&rendered).expect("reparse");

        assert_eq!(reparsed.id(), record.id());
        assert_eq!(reparsed.person(), record.person());
        assert_eq!(reparsed.boosters(), record.boosters());
        assert_eq!(reparsed.certificate(), record.certificate());
        assert_eq!(reparsed.protection(), record.protection());
        assert_eq!(reparsed.status(), record.status());
    }

    #[test]
    fn certificate_needs_product_or_tier() {
        let input = RECORD.replace("  tier: provisionally_approved\n", "");
        let err = RecordFile::parse(&input).expect_err("should reject");
        assert!(matches!(err, EngineError::RecordSchema(msg) if msg.contains("exactly one")));
    }

    #[test]
    fn unknown_key_reports_path() {
        let input = RECORD.replace(
            "  priority_codes: [P1]\n",
            "  priority_codes: [P1]\n  shoe_size: 42\n",
        );
        let err = RecordFile::parse(&input).expect_err("should reject");
        match err {
            EngineError::RecordSchema(msg) => assert!(msg.contains("person")),
            other => panic!("expected RecordSchema error, got {other:?}"),
        }
    }

    #[test]
    fn primary_slots_rejected_for_booster_only_disease() {
        let input = RECORD.replace("two_phase_primary: true\n", "");
        let err = RecordFile::parse(&input).expect_err("should reject");
        assert!(matches!(err, EngineError::PrimarySlotsUnsupported(_)));
    }

    #[test]
    fn write_then_read_and_directory_loading() {
        let dir = TempDir::new().expect("create temp dir");
        let record = RecordFile::parse(RECORD).expect("parse record");
        RecordFile::write(&dir.path().join("a.yaml"), &record).expect("write record");
        fs::write(dir.path().join("b.yaml"), "id: not-a-uuid\n").expect("write broken file");
        fs::write(dir.path().join("notes.txt"), "ignored").expect("write other file");

        let loaded = load_records_dir(dir.path()).expect("load records");
        assert_eq!(loaded.len(), 1);
        assert!(loaded[0].0.ends_with("a.yaml"));
        assert_eq!(loaded[0].1.id(), record.id());
    }
}
