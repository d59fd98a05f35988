use super::{EligibilityRule, RuleContext, RulePredicate};
use crate::constants::CATCH_ALL_RULE_NAME;
use crate::protection::Protection;
use vax_policy::{AllowList, OffsetPair};

/// Applies the rule's offsets from the reference date (or today when there is none).
pub fn offset_protection(
    ctx: &RuleContext<'_>,
    offsets: &OffsetPair,
    products: &AllowList,
) -> Protection {
    let anchor = ctx.reference_date().unwrap_or(ctx.today());
    let public = offsets.public.add_to(anchor);
    let self_pay = offsets.self_pay.add_to(anchor);
    if public.is_none() || self_pay.is_none() {
        tracing::warn!(
            %anchor,
            public = %offsets.public,
            self_pay = %offsets.self_pay,
            "offset overflows the calendar"
        );
    }

    Protection::new(
        ctx.immunized_until(),
        public,
        self_pay,
        products.for_age(ctx.age()).iter().cloned(),
        ctx.today(),
    )
}

/// A predicate plus fixed offsets; the building block of the configured rule families.
#[derive(Clone, Debug)]
pub struct OffsetRule {
    name: String,
    predicate: RulePredicate,
    offsets: OffsetPair,
    first_booster: Option<OffsetPair>,
    products: AllowList,
}

impl OffsetRule {
    pub fn new(
        name: impl Into<String>,
        predicate: RulePredicate,
        offsets: OffsetPair,
        products: AllowList,
    ) -> Self {
        Self {
            name: name.into(),
            predicate,
            offsets,
            first_booster: None,
            products,
        }
    }

    /// Offsets used while no booster has been given.
    pub fn with_first_booster(mut self, first_booster: Option<OffsetPair>) -> Self {
        self.first_booster = first_booster;
        self
    }
}

impl EligibilityRule for OffsetRule {
    fn name(&self) -> &str {
        &self.name
    }

    fn applies(&self, ctx: &RuleContext<'_>) -> bool {
        self.predicate.matches(ctx)
    }

    fn calculate(&self, ctx: &RuleContext<'_>) -> Protection {
        let offsets = match self.first_booster {
            Some(first_booster) if ctx.booster_count() == 0 => first_booster,
            _ => self.offsets,
        };
        offset_protection(ctx, &offsets, &self.products)
    }
}

/// Last rule of every chain; always applies.
#[derive(Clone, Debug)]
pub struct CatchAllRule {
    eligible_from_today: bool,
    products: AllowList,
}

impl CatchAllRule {
    /// Reports at most the end of protection.
    pub fn new() -> Self {
        Self {
            eligible_from_today: false,
            products: AllowList::adult_only(Vec::new()),
        }
    }

    /// Also grants eligibility from today for `products`.
    pub fn eligible_from_today(products: AllowList) -> Self {
        Self {
            eligible_from_today: true,
            products,
        }
    }
}

impl Default for CatchAllRule {
    fn default() -> Self {
        Self::new()
    }
}

impl EligibilityRule for CatchAllRule {
    fn name(&self) -> &str {
        CATCH_ALL_RULE_NAME
    }

    fn applies(&self, _ctx: &RuleContext<'_>) -> bool {
        true
    }

    fn calculate(&self, ctx: &RuleContext<'_>) -> Protection {
        if !self.eligible_from_today {
            return Protection::immunized_only(ctx.immunized_until());
        }
        Protection::new(
            ctx.immunized_until(),
            Some(ctx.today()),
            Some(ctx.today()),
            self.products.for_age(ctx.age()).iter().cloned(),
            ctx.today(),
        )
    }
}
