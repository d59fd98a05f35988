use super::RuleContext;
use vax_types::PriorityCode;

/// Applicability test shared by the configured rules.
///
/// All set conditions must hold. A non-empty priority-code list replaces the age threshold;
/// an age threshold with an unknown birth date never matches.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RulePredicate {
    pub min_age: Option<u32>,
    pub priority_codes: Vec<PriorityCode>,
    pub immunocompromised: Option<bool>,
    pub requires_complete_primary: bool,
    pub holds_protection: Option<bool>,
}

impl RulePredicate {
    pub fn min_age(mut self, min_age: Option<u32>) -> Self {
        self.min_age = min_age;
        self
    }

    pub fn priority_codes(mut self, codes: Vec<PriorityCode>) -> Self {
        self.priority_codes = codes;
        self
    }

    pub fn immunocompromised(mut self, immunocompromised: Option<bool>) -> Self {
        self.immunocompromised = immunocompromised;
        self
    }

    pub fn requires_complete_primary(mut self) -> Self {
        self.requires_complete_primary = true;
        self
    }

    pub fn holds_protection(mut self, holds: bool) -> Self {
        self.holds_protection = Some(holds);
        self
    }

    pub fn matches(&self, ctx: &RuleContext<'_>) -> bool {
        if self.requires_complete_primary && !ctx.primary_complete() {
            return false;
        }
        if self
            .holds_protection
            .is_some_and(|holds| holds != ctx.holds_protection())
        {
            return false;
        }
        if self
            .immunocompromised
            .is_some_and(|required| required != ctx.is_immunocompromised())
        {
            return false;
        }

        if !self.priority_codes.is_empty() {
            return ctx.has_priority_code(&self.priority_codes);
        }
        match self.min_age {
            Some(min_age) => ctx.age().is_some_and(|age| age >= min_age),
            None => true,
        }
    }
}
