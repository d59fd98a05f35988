//! Disease configuration wire models and translation helpers.
//!
//! A disease configuration carries everything the engine needs to build the rule chain for one
//! programme: policy flags, the protection duration, the optional global self-pay cutover, and
//! exactly one rule family:
//! - `two_phase_primary`: ordered tiers (priority groups, age thresholds) evaluated after a
//!   completed two-dose primary series
//! - `age_gated_booster`: booster-list-only diseases gated on a minimum age
//! - `schedule_dependent`: per-product dosing schedules with an optional accelerated variant
//!
//! Offsets are written as `<amount> <unit>`; a missing `self_pay` offset equals the public one.

use crate::{parse_wire, PolicyError, PolicyResult};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use vax_types::{DiseaseId, NonEmptyText, Offset, PriorityCode, ProductId};

// ============================================================================
// Public domain-level types
// ============================================================================

/// Domain-level carrier for one disease configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiseaseConfig {
    pub disease: DiseaseId,

    /// How long a completed series (or booster) protects, counted from the reference date.
    pub protection_duration: Offset,

    /// Publicly funded eligibility reached on or after this date is suppressed.
    pub self_pay_cutover: Option<NaiveDate>,

    /// Whether the catch-all rule grants eligibility from today.
    pub fallback_eligible_from_today: bool,

    pub flags: PolicyFlags,

    pub rules: RulesConfig,
}

/// Per-disease switches that change how evidence is interpreted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PolicyFlags {
    /// Records carry two dedicated primary-series slots ahead of the booster list.
    pub two_phase_primary: bool,

    /// Illness episodes can move the reference date for booster offsets.
    pub illness_counts_toward_reference: bool,

    /// A recorded illness counts as "recovered" for primary-series completion of local doses.
    pub illness_counts_toward_primary: bool,

    /// Records flagged for the accelerated schedule use the accelerated offsets.
    pub accelerated_schedule_capable: bool,
}

/// Rule family of a disease.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RulesConfig {
    TwoPhasePrimary(TwoPhaseConfig),
    AgeGatedBooster(AgeGatedConfig),
    ScheduleDependent(ScheduleConfig),
}

/// Public and self-pay offsets of one rule.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OffsetPair {
    pub public: Offset,
    pub self_pay: Offset,
}

impl OffsetPair {
    /// Both offsets equal.
    pub fn same(offset: Offset) -> Self {
        Self {
            public: offset,
            self_pay: offset,
        }
    }
}

/// Products allowed for the next dose, split by age.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AllowList {
    pub adult: Vec<ProductId>,
    pub pediatric: Vec<ProductId>,

    /// People of at least this age get the adult list.
    pub adult_from_age: u32,
}

impl AllowList {
    /// Only an adult list; applies to every age.
    pub fn adult_only(products: Vec<ProductId>) -> Self {
        Self {
            adult: products,
            pediatric: Vec::new(),
            adult_from_age: 0,
        }
    }

    /// Products for a person of `age` years. Unknown age gets the adult list.
    pub fn for_age(&self, age: Option<u32>) -> &[ProductId] {
        match age {
            Some(age) if age < self.adult_from_age => &self.pediatric,
            _ => &self.adult,
        }
    }
}

/// One tier of a two-phase primary disease.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TierConfig {
    pub name: NonEmptyText,

    /// Minimum age on the evaluation day. Ignored when `priority_codes` is non-empty.
    pub min_age: Option<u32>,

    /// Explicit priority groups; membership in any of them overrides the age threshold.
    pub priority_codes: Vec<PriorityCode>,

    /// Required immunocompromised state, if any.
    pub immunocompromised: Option<bool>,

    /// Offsets for boosters after the first one.
    pub offsets: OffsetPair,

    /// Offsets when no booster has been given yet. Defaults to `offsets`.
    pub first_booster: Option<OffsetPair>,

    /// Tier-specific allow-list, overriding the disease-wide one.
    pub products: Option<AllowList>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TwoPhaseConfig {
    pub products: AllowList,

    /// Tiers in priority order; the first applicable tier wins.
    pub tiers: Vec<TierConfig>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AgeGatedConfig {
    pub min_age: u32,

    /// Offsets when the person holds no protection yet (anchored on today).
    pub first_dose: OffsetPair,

    /// Offsets once any dose or certificate is on record.
    pub subsequent: OffsetPair,

    /// Offsets for protected, immunocompromised people. Takes precedence over `subsequent`.
    pub immunocompromised: Option<OffsetPair>,

    pub products: AllowList,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScheduleConfig {
    pub min_age: Option<u32>,

    /// Offsets for a person without any dose; every scheduled product is allowed.
    pub initial: OffsetPair,

    pub schedules: Vec<ProductSchedule>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProductSchedule {
    pub product: ProductId,
    pub standard: StageOffsets,
    pub accelerated: Option<StageOffsets>,
}

/// Offsets from the latest dose, by how many doses are on record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StageOffsets {
    /// After dose 1.
    pub second_dose: OffsetPair,
    /// After dose 2.
    pub first_booster: OffsetPair,
    /// After dose 3 and later.
    pub subsequent_boosters: OffsetPair,
}

// ============================================================================
// Public DiseasePolicy operations
// ============================================================================

/// Disease configuration operations.
///
/// This is a zero-sized type used for namespacing disease-configuration operations.
pub struct DiseasePolicy;

impl DiseasePolicy {
    /// Parse a disease configuration from YAML text.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::Translation`] on schema mismatch (naming the failing path), or
    /// [`PolicyError::InvalidPolicy`] if:
    /// - not exactly one rule family is configured,
    /// - `flags.two_phase_primary` disagrees with the rule family,
    /// - `flags.accelerated_schedule_capable` is set for a non-schedule disease,
    /// - a tier list or schedule list is empty, or names/products repeat,
    /// - a self-pay offset is larger than its public offset in the same unit.
    pub fn parse(yaml_text: &str) -> PolicyResult<DiseaseConfig> {
        let wire: DiseaseWire = parse_wire(yaml_text, "Disease policy")?;
        wire_to_domain(wire)
    }

    /// Render a disease configuration as YAML text.
    pub fn render(config: &DiseaseConfig) -> PolicyResult<String> {
        let wire = domain_to_wire(config);
        serde_yaml::to_string(&wire).map_err(|e| {
            PolicyError::Translation(format!("Failed to serialize disease policy: {e}"))
        })
    }
}

// ============================================================================
// Wire types (internal)
// ============================================================================

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
struct DiseaseWire {
    disease: DiseaseId,
    protection_duration: Offset,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    self_pay_cutover: Option<NaiveDate>,
    #[serde(default)]
    fallback_eligible_from_today: bool,
    #[serde(default)]
    flags: FlagsWire,
    rules: RulesWire,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
struct FlagsWire {
    #[serde(default)]
    two_phase_primary: bool,
    #[serde(default)]
    illness_counts_toward_reference: bool,
    #[serde(default)]
    illness_counts_toward_primary: bool,
    #[serde(default)]
    accelerated_schedule_capable: bool,
}

/// Exactly one member must be present.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
struct RulesWire {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    two_phase_primary: Option<TwoPhaseWire>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    age_gated_booster: Option<AgeGatedWire>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    schedule_dependent: Option<ScheduleWire>,
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
struct OffsetPairWire {
    public: Offset,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    self_pay: Option<Offset>,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
struct AllowListWire {
    adult: Vec<ProductId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pediatric: Vec<ProductId>,
    #[serde(default)]
    adult_from_age: u32,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
struct TierWire {
    name: NonEmptyText,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    min_age: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    priority_codes: Vec<PriorityCode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    immunocompromised: Option<bool>,
    offsets: OffsetPairWire,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    first_booster: Option<OffsetPairWire>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    products: Option<AllowListWire>,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
struct TwoPhaseWire {
    products: AllowListWire,
    tiers: Vec<TierWire>,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
struct AgeGatedWire {
    min_age: u32,
    first_dose: OffsetPairWire,
    subsequent: OffsetPairWire,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    immunocompromised: Option<OffsetPairWire>,
    products: AllowListWire,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
struct ScheduleWire {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    min_age: Option<u32>,
    initial: OffsetPairWire,
    schedules: Vec<ProductScheduleWire>,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
struct ProductScheduleWire {
    product: ProductId,
    standard: StageOffsetsWire,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    accelerated: Option<StageOffsetsWire>,
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
struct StageOffsetsWire {
    second_dose: OffsetPairWire,
    first_booster: OffsetPairWire,
    subsequent_boosters: OffsetPairWire,
}

// ============================================================================
// Helper functions (internal)
// ============================================================================

fn offsets_to_domain(label: &str, wire: OffsetPairWire) -> PolicyResult<OffsetPair> {
    let self_pay = wire.self_pay.unwrap_or(wire.public);
    // Offsets in different units cannot be compared without a reference date; the engine
    // clamps those at calculation time.
    if self_pay.unit() == wire.public.unit() && self_pay.amount() > wire.public.amount() {
        return Err(PolicyError::InvalidPolicy(format!(
            "{label}: self-pay offset {self_pay} is later than public offset {}",
            wire.public
        )));
    }
    Ok(OffsetPair {
        public: wire.public,
        self_pay,
    })
}

fn offsets_to_wire(pair: &OffsetPair) -> OffsetPairWire {
    OffsetPairWire {
        public: pair.public,
        self_pay: (pair.self_pay != pair.public).then_some(pair.self_pay),
    }
}

fn allow_list_to_domain(label: &str, wire: AllowListWire) -> PolicyResult<AllowList> {
    if wire.adult.is_empty() {
        return Err(PolicyError::InvalidPolicy(format!(
            "{label}: adult product list cannot be empty"
        )));
    }
    Ok(AllowList {
        adult: wire.adult,
        pediatric: wire.pediatric,
        adult_from_age: wire.adult_from_age,
    })
}

fn allow_list_to_wire(list: &AllowList) -> AllowListWire {
    AllowListWire {
        adult: list.adult.clone(),
        pediatric: list.pediatric.clone(),
        adult_from_age: list.adult_from_age,
    }
}

fn stages_to_domain(label: &str, wire: StageOffsetsWire) -> PolicyResult<StageOffsets> {
    Ok(StageOffsets {
        second_dose: offsets_to_domain(&format!("{label}.second_dose"), wire.second_dose)?,
        first_booster: offsets_to_domain(&format!("{label}.first_booster"), wire.first_booster)?,
        subsequent_boosters: offsets_to_domain(
            &format!("{label}.subsequent_boosters"),
            wire.subsequent_boosters,
        )?,
    })
}

fn stages_to_wire(stages: &StageOffsets) -> StageOffsetsWire {
    StageOffsetsWire {
        second_dose: offsets_to_wire(&stages.second_dose),
        first_booster: offsets_to_wire(&stages.first_booster),
        subsequent_boosters: offsets_to_wire(&stages.subsequent_boosters),
    }
}

fn two_phase_to_domain(wire: TwoPhaseWire) -> PolicyResult<TwoPhaseConfig> {
    if wire.tiers.is_empty() {
        return Err(PolicyError::InvalidPolicy(
            "two_phase_primary: at least one tier is required".into(),
        ));
    }

    let products = allow_list_to_domain("two_phase_primary.products", wire.products)?;
    let mut names = BTreeSet::new();
    let mut tiers = Vec::with_capacity(wire.tiers.len());
    for tier in wire.tiers {
        let label = format!("tier {}", tier.name);
        if !names.insert(tier.name.clone()) {
            return Err(PolicyError::InvalidPolicy(format!("{label} is listed twice")));
        }
        tiers.push(TierConfig {
            offsets: offsets_to_domain(&label, tier.offsets)?,
            first_booster: tier
                .first_booster
                .map(|fb| offsets_to_domain(&format!("{label}.first_booster"), fb))
                .transpose()?,
            products: tier
                .products
                .map(|p| allow_list_to_domain(&format!("{label}.products"), p))
                .transpose()?,
            name: tier.name,
            min_age: tier.min_age,
            priority_codes: tier.priority_codes,
            immunocompromised: tier.immunocompromised,
        });
    }

    Ok(TwoPhaseConfig { products, tiers })
}

fn age_gated_to_domain(wire: AgeGatedWire) -> PolicyResult<AgeGatedConfig> {
    Ok(AgeGatedConfig {
        min_age: wire.min_age,
        first_dose: offsets_to_domain("age_gated_booster.first_dose", wire.first_dose)?,
        subsequent: offsets_to_domain("age_gated_booster.subsequent", wire.subsequent)?,
        immunocompromised: wire
            .immunocompromised
            .map(|o| offsets_to_domain("age_gated_booster.immunocompromised", o))
            .transpose()?,
        products: allow_list_to_domain("age_gated_booster.products", wire.products)?,
    })
}

fn schedule_to_domain(wire: ScheduleWire) -> PolicyResult<ScheduleConfig> {
    if wire.schedules.is_empty() {
        return Err(PolicyError::InvalidPolicy(
            "schedule_dependent: at least one product schedule is required".into(),
        ));
    }

    let mut seen = BTreeSet::new();
    let mut schedules = Vec::with_capacity(wire.schedules.len());
    for schedule in wire.schedules {
        let label = format!("schedule {}", schedule.product);
        if !seen.insert(schedule.product.clone()) {
            return Err(PolicyError::InvalidPolicy(format!("{label} is listed twice")));
        }
        schedules.push(ProductSchedule {
            standard: stages_to_domain(&format!("{label}.standard"), schedule.standard)?,
            accelerated: schedule
                .accelerated
                .map(|a| stages_to_domain(&format!("{label}.accelerated"), a))
                .transpose()?,
            product: schedule.product,
        });
    }

    Ok(ScheduleConfig {
        min_age: wire.min_age,
        initial: offsets_to_domain("schedule_dependent.initial", wire.initial)?,
        schedules,
    })
}

fn wire_to_domain(wire: DiseaseWire) -> PolicyResult<DiseaseConfig> {
    let rules = match (
        wire.rules.two_phase_primary,
        wire.rules.age_gated_booster,
        wire.rules.schedule_dependent,
    ) {
        (Some(two_phase), None, None) => {
            RulesConfig::TwoPhasePrimary(two_phase_to_domain(two_phase)?)
        }
        (None, Some(age_gated), None) => {
            RulesConfig::AgeGatedBooster(age_gated_to_domain(age_gated)?)
        }
        (None, None, Some(schedule)) => {
            RulesConfig::ScheduleDependent(schedule_to_domain(schedule)?)
        }
        _ => {
            return Err(PolicyError::InvalidPolicy(format!(
                "{}: exactly one of two_phase_primary, age_gated_booster, \
                 schedule_dependent is required",
                wire.disease
            )))
        }
    };

    let flags = PolicyFlags {
        two_phase_primary: wire.flags.two_phase_primary,
        illness_counts_toward_reference: wire.flags.illness_counts_toward_reference,
        illness_counts_toward_primary: wire.flags.illness_counts_toward_primary,
        accelerated_schedule_capable: wire.flags.accelerated_schedule_capable,
    };

    let is_two_phase = matches!(rules, RulesConfig::TwoPhasePrimary(_));
    if flags.two_phase_primary != is_two_phase {
        return Err(PolicyError::InvalidPolicy(format!(
            "{}: flags.two_phase_primary must be set exactly for two_phase_primary rules",
            wire.disease
        )));
    }
    if flags.accelerated_schedule_capable && !matches!(rules, RulesConfig::ScheduleDependent(_)) {
        return Err(PolicyError::InvalidPolicy(format!(
            "{}: flags.accelerated_schedule_capable requires schedule_dependent rules",
            wire.disease
        )));
    }

    Ok(DiseaseConfig {
        disease: wire.disease,
        protection_duration: wire.protection_duration,
        self_pay_cutover: wire.self_pay_cutover,
        fallback_eligible_from_today: wire.fallback_eligible_from_today,
        flags,
        rules,
    })
}

fn domain_to_wire(config: &DiseaseConfig) -> DiseaseWire {
    let mut rules = RulesWire {
        two_phase_primary: None,
        age_gated_booster: None,
        schedule_dependent: None,
    };

    match &config.rules {
        RulesConfig::TwoPhasePrimary(two_phase) => {
            rules.two_phase_primary = Some(TwoPhaseWire {
                products: allow_list_to_wire(&two_phase.products),
                tiers: two_phase
                    .tiers
                    .iter()
                    .map(|tier| TierWire {
                        name: tier.name.clone(),
                        min_age: tier.min_age,
                        priority_codes: tier.priority_codes.clone(),
                        immunocompromised: tier.immunocompromised,
                        offsets: offsets_to_wire(&tier.offsets),
                        first_booster: tier.first_booster.as_ref().map(offsets_to_wire),
                        products: tier.products.as_ref().map(allow_list_to_wire),
                    })
                    .collect(),
            });
        }
        RulesConfig::AgeGatedBooster(age_gated) => {
            rules.age_gated_booster = Some(AgeGatedWire {
                min_age: age_gated.min_age,
                first_dose: offsets_to_wire(&age_gated.first_dose),
                subsequent: offsets_to_wire(&age_gated.subsequent),
                immunocompromised: age_gated.immunocompromised.as_ref().map(offsets_to_wire),
                products: allow_list_to_wire(&age_gated.products),
            });
        }
        RulesConfig::ScheduleDependent(schedule) => {
            rules.schedule_dependent = Some(ScheduleWire {
                min_age: schedule.min_age,
                initial: offsets_to_wire(&schedule.initial),
                schedules: schedule
                    .schedules
                    .iter()
                    .map(|s| ProductScheduleWire {
                        product: s.product.clone(),
                        standard: stages_to_wire(&s.standard),
                        accelerated: s.accelerated.as_ref().map(stages_to_wire),
                    })
                    .collect(),
            });
        }
    }

    DiseaseWire {
        disease: config.disease.clone(),
        protection_duration: config.protection_duration,
        self_pay_cutover: config.self_pay_cutover,
        fallback_eligible_from_today: config.fallback_eligible_from_today,
        flags: FlagsWire {
            two_phase_primary: config.flags.two_phase_primary,
            illness_counts_toward_reference: config.flags.illness_counts_toward_reference,
            illness_counts_toward_primary: config.flags.illness_counts_toward_primary,
            accelerated_schedule_capable: config.flags.accelerated_schedule_capable,
        },
        rules,
    }
}
