//! Rule providers for the supported disease policy families.
//!
//! Each provider turns one rule family of a [`DiseaseConfig`] into an ordered list of rules.
//! [`rule_set_for`] picks the provider and closes the chain with the catch-all rule.

mod age_gated;
mod schedule;
mod two_phase;

pub use age_gated::AgeGatedBoosterRules;
pub use schedule::{ScheduleDependentRules, ScheduleStage, ScheduleStageRule};
pub use two_phase::TwoPhasePrimaryRules;

use crate::rules::{CatchAllRule, EligibilityRule, RuleSet};
use vax_policy::{AllowList, DiseaseConfig, RulesConfig};

pub trait DiseaseRuleProvider {
    /// Rules in priority order, without the catch-all.
    fn rules(&self) -> Vec<Box<dyn EligibilityRule>>;

    /// Products offered when the catch-all grants eligibility from today.
    fn fallback_products(&self) -> AllowList;

    fn rule_set(&self, fallback_eligible_from_today: bool) -> RuleSet {
        let catch_all = if fallback_eligible_from_today {
            CatchAllRule::eligible_from_today(self.fallback_products())
        } else {
            CatchAllRule::new()
        };
        let mut rule_set = RuleSet::new(catch_all);
        for rule in self.rules() {
            rule_set.push(rule);
        }
        rule_set
    }
}

/// Builds the immutable rule set for a disease configuration.
pub fn rule_set_for(config: &DiseaseConfig) -> RuleSet {
    let fallback = config.fallback_eligible_from_today;
    match &config.rules {
        RulesConfig::TwoPhasePrimary(two_phase) => {
            TwoPhasePrimaryRules::new(two_phase.clone()).rule_set(fallback)
        }
        RulesConfig::AgeGatedBooster(age_gated) => {
            AgeGatedBoosterRules::new(age_gated.clone()).rule_set(fallback)
        }
        RulesConfig::ScheduleDependent(schedule) => {
            ScheduleDependentRules::new(schedule.clone()).rule_set(fallback)
        }
    }
}
