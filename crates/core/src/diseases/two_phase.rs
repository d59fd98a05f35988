use super::DiseaseRuleProvider;
use crate::rules::{EligibilityRule, OffsetRule, RulePredicate};
use vax_policy::{AllowList, TwoPhaseConfig};

/// Tiers evaluated once the two-dose primary series is complete.
///
/// Boosters after the first are unlimited; the tier's regular offsets apply to each of them.
#[derive(Clone, Debug)]
pub struct TwoPhasePrimaryRules {
    config: TwoPhaseConfig,
}

impl TwoPhasePrimaryRules {
    pub fn new(config: TwoPhaseConfig) -> Self {
        Self { config }
    }
}

impl DiseaseRuleProvider for TwoPhasePrimaryRules {
    fn rules(&self) -> Vec<Box<dyn EligibilityRule>> {
        self.config
            .tiers
            .iter()
            .map(|tier| {
                let predicate = RulePredicate::default()
                    .min_age(tier.min_age)
                    .priority_codes(tier.priority_codes.clone())
                    .immunocompromised(tier.immunocompromised)
                    .requires_complete_primary();
                let products = tier
                    .products
                    .clone()
                    .unwrap_or_else(|| self.config.products.clone());
                let rule = OffsetRule::new(tier.name.as_str(), predicate, tier.offsets, products)
                    .with_first_booster(tier.first_booster);
                Box::new(rule) as Box<dyn EligibilityRule>
            })
            .collect()
    }

    fn fallback_products(&self) -> AllowList {
        self.config.products.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vax_policy::{OffsetPair, TierConfig};
    use vax_types::{NonEmptyText, Offset, ProductId};

    fn tier(name: &str, min_age: u32) -> TierConfig {
        TierConfig {
            name: NonEmptyText::new(name).expect("valid name"),
            min_age: Some(min_age),
            priority_codes: Vec::new(),
            immunocompromised: None,
            offsets: OffsetPair::same(Offset::months(6)),
            first_booster: None,
            products: None,
        }
    }

    #[test]
    fn one_rule_per_tier_in_order() {
        let provider = TwoPhasePrimaryRules::new(TwoPhaseConfig {
            products: AllowList::adult_only(vec![
                ProductId::new("comirnaty").expect("valid product")
            ]),
            tiers: vec![tier("age-80", 80), tier("age-65", 65), tier("age-12", 12)],
        });
        let rule_set = provider.rule_set(false);
        assert_eq!(
            rule_set.rule_names(),
            vec!["age-80", "age-65", "age-12", "catch-all"]
        );
    }
}
