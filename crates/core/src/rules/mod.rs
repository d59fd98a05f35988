//! Eligibility rule chain.
//!
//! A [`RuleSet`] is an ordered list of boxed [`EligibilityRule`]s that always ends in a
//! [`CatchAllRule`]. Evaluation walks the list and the first applicable rule produces the
//! [`Protection`]. Rule sets are immutable once built and are handed to the engine at
//! construction.

mod context;
mod predicate;
mod standard;

pub use context::RuleContext;
pub use predicate::RulePredicate;
pub use standard::{offset_protection, CatchAllRule, OffsetRule};

use crate::protection::Protection;
use std::fmt;

/// One step of the chain.
pub trait EligibilityRule: Send + Sync + fmt::Debug {
    /// Name reported in the calculation trace.
    fn name(&self) -> &str;

    /// Whether this rule decides the outcome for `ctx`. Missing data means "does not apply".
    fn applies(&self, ctx: &RuleContext<'_>) -> bool;

    fn calculate(&self, ctx: &RuleContext<'_>) -> Protection;
}

/// Protection plus the name of the rule that produced it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RuleOutcome {
    pub rule: String,
    pub protection: Protection,
}

#[derive(Debug)]
pub struct RuleSet {
    rules: Vec<Box<dyn EligibilityRule>>,
    catch_all: CatchAllRule,
}

impl RuleSet {
    pub fn new(catch_all: CatchAllRule) -> Self {
        Self {
            rules: Vec::new(),
            catch_all,
        }
    }

    /// Appends a rule behind the ones already added.
    pub fn with_rule(mut self, rule: impl EligibilityRule + 'static) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    pub fn push(&mut self, rule: Box<dyn EligibilityRule>) {
        self.rules.push(rule);
    }

    /// Rule names in evaluation order, catch-all last.
    pub fn rule_names(&self) -> Vec<&str> {
        self.rules
            .iter()
            .map(|rule| rule.name())
            .chain(std::iter::once(self.catch_all.name()))
            .collect()
    }

    /// Number of rules, catch-all included.
    pub fn len(&self) -> usize {
        self.rules.len() + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn evaluate(&self, ctx: &RuleContext<'_>) -> RuleOutcome {
        let rule: &dyn EligibilityRule = self
            .rules
            .iter()
            .map(|rule| rule.as_ref())
            .find(|rule| rule.applies(ctx))
            .unwrap_or(&self.catch_all);

        tracing::debug!(
            rule = rule.name(),
            disease = %ctx.record().disease(),
            record = %ctx.record().id(),
            "eligibility rule selected"
        );

        RuleOutcome {
            rule: rule.name().to_owned(),
            protection: rule.calculate(ctx),
        }
    }
}
