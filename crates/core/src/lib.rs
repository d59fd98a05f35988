//! # Vax Core
//!
//! Eligibility rule engine for a multi-disease vaccination programme.
//!
//! Given one person's immunization history for one disease, the engine decides whether the
//! primary series is complete and computes the next publicly funded and self-pay dose dates, the
//! end of protection, and the products allowed for the next dose.
//!
//! This crate contains:
//! - the record read model and its chronological timeline
//! - primary-series completion against the dose-requirement catalog
//! - the ordered rule chain and the per-disease rule providers
//! - the per-disease [`ProtectionEngine`] and the dossier [`StatusGuard`]
//! - startup configuration, YAML record files and parallel batch recomputation
//!
//! **No API concerns**: HTTP exposure, persistence mapping and notification delivery live
//! outside this crate. The engine never reads the environment or the system clock on its own.

pub mod batch;
pub mod catalog;
pub mod clock;
pub mod completion;
pub mod config;
pub mod constants;
pub mod diseases;
pub mod error;
pub mod protection;
pub mod record;
pub mod record_file;
pub mod rules;
pub mod service;
pub mod status;
pub mod timeline;

pub use batch::{BatchFailure, BatchRecomputer, BatchReport, EngineRegistry};
pub use catalog::ProductCatalog;
pub use clock::{Clock, FixedClock, SystemClock};
pub use completion::{evaluate_completion, CompletionKind, CompletionOutcome, CompletionRoute};
pub use config::{
    load_policy_set, resolve_policy_dir, worker_threads_from_env_value, CoreConfig, PolicySet,
};
pub use diseases::{rule_set_for, DiseaseRuleProvider};
pub use error::{EngineError, EngineResult};
pub use protection::{Protection, SelfPayCutover};
pub use record::{
    BoosterDose, CertifiedProduct, DoseSource, ExternalCertificate, IllnessEpisode,
    ImmunizationRecord, Person, PrimarySlot, VaccinationDose,
};
pub use record_file::{load_records_dir, RecordFile};
pub use rules::{CatchAllRule, EligibilityRule, RuleContext, RuleOutcome, RuleSet};
pub use service::{Calculation, ProtectionEngine};
pub use status::{DossierStatus, ProgressState, StatusGuard};
pub use timeline::{ImmunizationTimeline, TimelineEntry};
