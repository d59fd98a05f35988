use super::DiseaseRuleProvider;
use crate::protection::Protection;
use crate::rules::{
    offset_protection, EligibilityRule, OffsetRule, RuleContext, RulePredicate,
};
use vax_policy::{AllowList, OffsetPair, ProductSchedule, ScheduleConfig, StageOffsets};

/// Position in a product's dosing schedule, by doses on record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScheduleStage {
    SecondDose,
    FirstBooster,
    SubsequentBooster,
}

impl ScheduleStage {
    /// `None` without any dose.
    pub fn for_doses(doses: u32) -> Option<Self> {
        match doses {
            0 => None,
            1 => Some(ScheduleStage::SecondDose),
            2 => Some(ScheduleStage::FirstBooster),
            _ => Some(ScheduleStage::SubsequentBooster),
        }
    }

    fn offsets(self, stages: &StageOffsets) -> OffsetPair {
        match self {
            ScheduleStage::SecondDose => stages.second_dose,
            ScheduleStage::FirstBooster => stages.first_booster,
            ScheduleStage::SubsequentBooster => stages.subsequent_boosters,
        }
    }
}

/// Continues the schedule of the product used for the most recent dose. Only that product is
/// offered for the next dose.
#[derive(Clone, Debug)]
pub struct ScheduleStageRule {
    name: String,
    predicate: RulePredicate,
    schedule: ProductSchedule,
}

impl ScheduleStageRule {
    pub fn new(schedule: ProductSchedule, min_age: Option<u32>) -> Self {
        Self {
            name: format!("{}-schedule", schedule.product),
            predicate: RulePredicate::default()
                .min_age(min_age)
                .holds_protection(true),
            schedule,
        }
    }

    fn stages(&self, ctx: &RuleContext<'_>) -> &StageOffsets {
        match &self.schedule.accelerated {
            Some(accelerated) if ctx.accelerated() => accelerated,
            _ => &self.schedule.standard,
        }
    }
}

impl EligibilityRule for ScheduleStageRule {
    fn name(&self) -> &str {
        &self.name
    }

    fn applies(&self, ctx: &RuleContext<'_>) -> bool {
        ctx.latest_product() == Some(&self.schedule.product) && self.predicate.matches(ctx)
    }

    fn calculate(&self, ctx: &RuleContext<'_>) -> Protection {
        let products = AllowList::adult_only(vec![self.schedule.product.clone()]);
        match ScheduleStage::for_doses(ctx.total_doses()) {
            Some(stage) => offset_protection(ctx, &stage.offsets(self.stages(ctx)), &products),
            None => Protection::immunized_only(ctx.immunized_until()),
        }
    }
}

/// Per-product dosing schedules with an optional accelerated variant.
#[derive(Clone, Debug)]
pub struct ScheduleDependentRules {
    config: ScheduleConfig,
}

impl ScheduleDependentRules {
    pub fn new(config: ScheduleConfig) -> Self {
        Self { config }
    }

    fn all_products(&self) -> AllowList {
        AllowList::adult_only(
            self.config
                .schedules
                .iter()
                .map(|schedule| schedule.product.clone())
                .collect(),
        )
    }
}

impl DiseaseRuleProvider for ScheduleDependentRules {
    fn rules(&self) -> Vec<Box<dyn EligibilityRule>> {
        let mut rules: Vec<Box<dyn EligibilityRule>> = vec![Box::new(OffsetRule::new(
            "initial",
            RulePredicate::default()
                .min_age(self.config.min_age)
                .holds_protection(false),
            self.config.initial,
            self.all_products(),
        ))];
        rules.extend(self.config.schedules.iter().map(|schedule| {
            Box::new(ScheduleStageRule::new(schedule.clone(), self.config.min_age))
                as Box<dyn EligibilityRule>
        }));
        rules
    }

    fn fallback_products(&self) -> AllowList {
        self.all_products()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_follows_dose_count() {
        assert_eq!(ScheduleStage::for_doses(0), None);
        assert_eq!(ScheduleStage::for_doses(1), Some(ScheduleStage::SecondDose));
        assert_eq!(ScheduleStage::for_doses(2), Some(ScheduleStage::FirstBooster));
        assert_eq!(ScheduleStage::for_doses(7), Some(ScheduleStage::SubsequentBooster));
    }
}
