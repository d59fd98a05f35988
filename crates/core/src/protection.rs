//! Protection value object and the global self-pay cutover.
//!
//! A [`Protection`] is computed from scratch on every recomputation and swapped into the record
//! as a whole. Its constructor enforces that the self-pay date never lies after the public date.

use chrono::NaiveDate;
use std::collections::BTreeSet;
use vax_types::ProductId;

/// Result of one eligibility calculation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Protection {
    immunized_until: Option<NaiveDate>,
    next_dose_public: Option<NaiveDate>,
    next_dose_self_pay: Option<NaiveDate>,
    allowed_products: BTreeSet<ProductId>,
    notify_on_eligibility: bool,
}

impl Protection {
    /// Builds a protection, clamping the self-pay date to the public date.
    ///
    /// `notify_on_eligibility` is derived: it is set when a public date exists and lies after
    /// `today`.
    pub fn new(
        immunized_until: Option<NaiveDate>,
        next_dose_public: Option<NaiveDate>,
        next_dose_self_pay: Option<NaiveDate>,
        allowed_products: impl IntoIterator<Item = ProductId>,
        today: NaiveDate,
    ) -> Self {
        let next_dose_self_pay = match (next_dose_self_pay, next_dose_public) {
            (Some(self_pay), Some(public)) => Some(self_pay.min(public)),
            (self_pay, _) => self_pay,
        };
        Self {
            immunized_until,
            next_dose_public,
            next_dose_self_pay,
            allowed_products: allowed_products.into_iter().collect(),
            notify_on_eligibility: next_dose_public.is_some_and(|public| public > today),
        }
    }

    /// Only an end of protection; no next dose is scheduled.
    pub fn immunized_only(immunized_until: Option<NaiveDate>) -> Self {
        Self {
            immunized_until,
            ..Self::default()
        }
    }

    /// A copy with a different public date; the self-pay clamp and notification flag are
    /// re-derived.
    pub fn with_public_date(&self, next_dose_public: Option<NaiveDate>, today: NaiveDate) -> Self {
        Self::new(
            self.immunized_until,
            next_dose_public,
            self.next_dose_self_pay,
            self.allowed_products.iter().cloned(),
            today,
        )
    }

    /// Reassembles a stored protection without re-deriving anything.
    pub(crate) fn from_parts(
        immunized_until: Option<NaiveDate>,
        next_dose_public: Option<NaiveDate>,
        next_dose_self_pay: Option<NaiveDate>,
        allowed_products: BTreeSet<ProductId>,
        notify_on_eligibility: bool,
    ) -> Self {
        Self {
            immunized_until,
            next_dose_public,
            next_dose_self_pay,
            allowed_products,
            notify_on_eligibility,
        }
    }

    pub fn immunized_until(&self) -> Option<NaiveDate> {
        self.immunized_until
    }

    pub fn next_dose_public(&self) -> Option<NaiveDate> {
        self.next_dose_public
    }

    pub fn next_dose_self_pay(&self) -> Option<NaiveDate> {
        self.next_dose_self_pay
    }

    pub fn allowed_products(&self) -> &BTreeSet<ProductId> {
        &self.allowed_products
    }

    pub fn notify_on_eligibility(&self) -> bool {
        self.notify_on_eligibility
    }

    /// Protected through `day` (inclusive).
    pub fn is_protected_on(&self, day: NaiveDate) -> bool {
        self.immunized_until.is_some_and(|until| day <= until)
    }

    pub fn is_publicly_eligible_on(&self, day: NaiveDate) -> bool {
        self.next_dose_public.is_some_and(|public| public <= day)
    }

    pub fn is_self_pay_eligible_on(&self, day: NaiveDate) -> bool {
        self.next_dose_self_pay.is_some_and(|self_pay| self_pay <= day)
    }
}

/// Date from which newly reached public eligibility is no longer granted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SelfPayCutover(NaiveDate);

impl SelfPayCutover {
    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }

    /// Applies the cutover to a freshly computed protection.
    ///
    /// A public date on or after the cutover is removed. A public date granted by `previous` is
    /// kept instead when it lies before the cutover, has already been reached by `today`, and no
    /// dose was recorded after it (`reference` not later than the granted date). Self-pay dates
    /// are left alone.
    pub fn apply(
        &self,
        computed: Protection,
        previous: Option<&Protection>,
        reference: Option<NaiveDate>,
        today: NaiveDate,
    ) -> Protection {
        let Some(public) = computed.next_dose_public() else {
            return computed;
        };
        if public < self.0 {
            return computed;
        }

        let granted = previous
            .and_then(Protection::next_dose_public)
            .filter(|granted| *granted < self.0 && *granted <= today)
            .filter(|granted| reference.map_or(true, |reference| reference <= *granted));

        computed.with_public_date(granted, today)
    }
}
