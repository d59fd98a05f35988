use super::DiseaseRuleProvider;
use crate::rules::{EligibilityRule, OffsetRule, RulePredicate};
use vax_policy::{AgeGatedConfig, AllowList};

/// Booster-list-only diseases. Below the minimum age only the catch-all applies, whatever doses
/// are on record.
#[derive(Clone, Debug)]
pub struct AgeGatedBoosterRules {
    config: AgeGatedConfig,
}

impl AgeGatedBoosterRules {
    pub fn new(config: AgeGatedConfig) -> Self {
        Self { config }
    }

    fn gate(&self) -> RulePredicate {
        RulePredicate::default().min_age(Some(self.config.min_age))
    }
}

impl DiseaseRuleProvider for AgeGatedBoosterRules {
    fn rules(&self) -> Vec<Box<dyn EligibilityRule>> {
        let mut rules: Vec<Box<dyn EligibilityRule>> = Vec::new();

        if let Some(offsets) = self.config.immunocompromised {
            rules.push(Box::new(OffsetRule::new(
                "immunocompromised-booster",
                self.gate().holds_protection(true).immunocompromised(Some(true)),
                offsets,
                self.config.products.clone(),
            )));
        }
        rules.push(Box::new(OffsetRule::new(
            "subsequent-dose",
            self.gate().holds_protection(true),
            self.config.subsequent,
            self.config.products.clone(),
        )));
        rules.push(Box::new(OffsetRule::new(
            "first-dose",
            self.gate().holds_protection(false),
            self.config.first_dose,
            self.config.products.clone(),
        )));

        rules
    }

    fn fallback_products(&self) -> AllowList {
        self.config.products.clone()
    }
}
