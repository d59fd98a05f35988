//! Dose-requirement lookup.
//!
//! Wraps the parsed [`CatalogData`] with indexes and answers "how many doses are still missing".
//! Lookups never fail: anything unresolvable falls back to a full primary series.

use crate::record::CertifiedProduct;
use std::collections::BTreeMap;
use vax_policy::{CatalogData, DoseRequirement};
use vax_types::{ApprovalTier, ProductId};

#[derive(Clone, Debug)]
pub struct ProductCatalog {
    default_full_series: u32,
    products: BTreeMap<ProductId, DoseRequirement>,
    unknown_products: BTreeMap<ApprovalTier, DoseRequirement>,
}

impl ProductCatalog {
    pub fn new(data: CatalogData) -> Self {
        let products = data
            .products
            .into_iter()
            .map(|entry| (entry.product, entry.requirement))
            .collect();
        Self {
            default_full_series: data.default_full_series,
            products,
            unknown_products: data.unknown_products,
        }
    }

    pub fn requirement(&self, product: &CertifiedProduct) -> Option<&DoseRequirement> {
        match product {
            CertifiedProduct::Known(id) => self.products.get(id),
            CertifiedProduct::Unknown(tier) => self.unknown_products.get(tier),
        }
    }

    /// Doses needed by somebody without any evidence for `product`.
    pub fn full_series(&self, product: &CertifiedProduct) -> u32 {
        self.requirement(product)
            .and_then(DoseRequirement::full_series)
            .unwrap_or(self.default_full_series)
    }

    /// Doses still missing after `doses` doses of `product`.
    ///
    /// A recovered person with at least one dose gets one dose credited, unless the product
    /// disables the recovery bonus. The row with the largest `doses_given` not above the adjusted
    /// count decides; without such a row the full series is missing.
    pub fn missing_doses(&self, product: &CertifiedProduct, doses: u32, recovered: bool) -> u32 {
        let Some(requirement) = self.requirement(product) else {
            tracing::warn!(
                product = ?product,
                default = self.default_full_series,
                "product is not in the dose-requirement catalog; assuming a full series"
            );
            return self.default_full_series;
        };

        let adjusted = if recovered && doses > 0 && requirement.recovery_bonus {
            doses.saturating_add(1)
        } else {
            doses
        };

        requirement
            .steps
            .iter()
            .rev()
            .find(|step| step.doses_given <= adjusted)
            .map(|step| step.doses_still_needed)
            .unwrap_or_else(|| self.full_series(product))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vax_policy::Catalog;

    const CATALOG: &str = r#"default_full_series: 2
products:
  - product: comirnaty
    tier: approved
    doses:
      - { given: 0, still_needed: 2 }
      - { given: 1, still_needed: 1 }
      - { given: 2, still_needed: 0 }
  - product: jcovden
    tier: approved
    recovery_bonus: false
    doses:
      - { given: 0, still_needed: 1 }
      - { given: 1, still_needed: 0 }
  - product: nuvaxovid
    tier: approved
    recovery_bonus: false
    doses:
      - { given: 0, still_needed: 2 }
      - { given: 1, still_needed: 1 }
      - { given: 2, still_needed: 0 }
  - product: late-start
    tier: approved
    doses:
      - { given: 2, still_needed: 1 }
      - { given: 3, still_needed: 0 }
unknown_products:
  - tier: approved
    doses:
      - { given: 0, still_needed: 2 }
      - { given: 1, still_needed: 1 }
      - { given: 2, still_needed: 0 }
  - tier: provisionally_approved
    doses:
      - { given: 0, still_needed: 4 }
      - { given: 4, still_needed: 0 }
"#;

    fn catalog() -> ProductCatalog {
        ProductCatalog::new(Catalog::parse(CATALOG).expect("parse catalog"))
    }

    fn known(id: &str) -> CertifiedProduct {
        CertifiedProduct::Known(ProductId::new(id).expect("valid product"))
    }

    #[test]
    fn counts_down_through_the_table() {
        let catalog = catalog();
        assert_eq!(catalog.missing_doses(&known("comirnaty"), 0, false), 2);
        assert_eq!(catalog.missing_doses(&known("comirnaty"), 1, false), 1);
        assert_eq!(catalog.missing_doses(&known("comirnaty"), 2, false), 0);
        assert_eq!(catalog.missing_doses(&known("comirnaty"), 5, false), 0);
    }

    #[test]
    fn recovery_bonus_requires_a_dose_and_the_product_flag() {
        let catalog = catalog();
        assert_eq!(catalog.missing_doses(&known("comirnaty"), 1, true), 0);
        assert_eq!(catalog.missing_doses(&known("comirnaty"), 0, true), 2);
        assert_eq!(catalog.missing_doses(&known("nuvaxovid"), 1, true), 1);
    }

    #[test]
    fn single_dose_product_completes_after_one_dose() {
        assert_eq!(catalog().missing_doses(&known("jcovden"), 1, false), 0);
    }

    #[test]
    fn unknown_product_uses_tier_table() {
        let catalog = catalog();
        let provisional = CertifiedProduct::Unknown(ApprovalTier::ProvisionallyApproved);
        assert_eq!(catalog.missing_doses(&provisional, 2, false), 4);
        assert_eq!(catalog.missing_doses(&provisional, 4, false), 0);
        let approved = CertifiedProduct::Unknown(ApprovalTier::Approved);
        assert_eq!(catalog.missing_doses(&approved, 1, true), 0);
    }

    #[test]
    fn unresolvable_lookups_fall_back_to_full_series() {
        let catalog = catalog();
        assert_eq!(catalog.missing_doses(&known("not-in-catalog"), 3, false), 2);
        // no row for fewer than 2 doses: the largest requirement in the table applies
        assert_eq!(catalog.missing_doses(&known("late-start"), 1, false), 1);
        assert_eq!(catalog.full_series(&known("late-start")), 1);
    }
}
