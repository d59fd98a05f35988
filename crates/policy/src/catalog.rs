//! Dose-requirement catalog wire models and translation helpers.
//!
//! The catalog declares, per vaccine product, how many doses are still needed after a given
//! number of doses: a `(doses given -> doses still needed)` table. Products whose identity is
//! unknown are resolved against a per-approval-tier table instead.
//!
//! Notes:
//! - `recovery_bonus` defaults to `true`; setting it to `false` disables the "+1 dose for a
//!   recovered person" rule for that product only.
//! - Tables are stored sorted by `doses_given`.

use crate::{parse_wire, PolicyError, PolicyResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use vax_types::{ApprovalTier, ProductId};

/// Doses still needed when no table entry resolves and nothing better is known.
pub const DEFAULT_FULL_SERIES: u32 = 2;

// ============================================================================
// Public domain-level types
// ============================================================================

/// One row of a dose-requirement table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DoseStep {
    pub doses_given: u32,
    pub doses_still_needed: u32,
}

/// A dose-requirement table plus its recovery-bonus flag.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DoseRequirement {
    /// Whether a recovered person gets one extra dose credited.
    pub recovery_bonus: bool,

    /// Table rows, sorted ascending by `doses_given` with no duplicates.
    pub steps: Vec<DoseStep>,
}

impl DoseRequirement {
    /// Doses needed by somebody without any evidence: the row for zero doses given, or the
    /// largest requirement in the table when that row is missing.
    pub fn full_series(&self) -> Option<u32> {
        self.steps
            .iter()
            .find(|step| step.doses_given == 0)
            .or_else(|| self.steps.iter().max_by_key(|step| step.doses_still_needed))
            .map(|step| step.doses_still_needed)
    }
}

/// Catalog entry for one vaccine product.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProductRequirement {
    pub product: ProductId,
    pub tier: ApprovalTier,
    pub requirement: DoseRequirement,
}

/// Domain-level carrier for the whole dose-requirement catalog.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CatalogData {
    /// Fallback when a lookup cannot be resolved at all.
    pub default_full_series: u32,

    /// Known products, unique by id.
    pub products: Vec<ProductRequirement>,

    /// Tables for certificates naming no product, keyed by the approval tier they state.
    pub unknown_products: BTreeMap<ApprovalTier, DoseRequirement>,
}

// ============================================================================
// Public Catalog operations
// ============================================================================

/// Catalog operations.
///
/// This is a zero-sized type used for namespacing catalog-related operations.
pub struct Catalog;

impl Catalog {
    /// Parse a dose-requirement catalog from YAML text.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::Translation`] if the YAML does not match the wire schema (the
    /// message names the failing path), or [`PolicyError::InvalidPolicy`] if:
    /// - a product id is listed twice,
    /// - an unknown-product tier is listed twice,
    /// - a table is empty or repeats a `given` value,
    /// - `default_full_series` is zero.
    pub fn parse(yaml_text: &str) -> PolicyResult<CatalogData> {
        let wire: CatalogWire = parse_wire(yaml_text, "Catalog")?;
        wire_to_domain(wire)
    }

    /// Render a catalog as YAML text.
    pub fn render(data: &CatalogData) -> PolicyResult<String> {
        let wire = domain_to_wire(data);
        serde_yaml::to_string(&wire)
            .map_err(|e| PolicyError::Translation(format!("Failed to serialize catalog: {e}")))
    }
}

// ============================================================================
// Wire types (internal)
// ============================================================================

fn default_full_series() -> u32 {
    DEFAULT_FULL_SERIES
}

fn default_true() -> bool {
    true
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
struct CatalogWire {
    #[serde(default = "default_full_series")]
    default_full_series: u32,
    products: Vec<ProductWire>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    unknown_products: Vec<UnknownProductWire>,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
struct ProductWire {
    product: ProductId,
    tier: ApprovalTier,
    #[serde(default = "default_true")]
    recovery_bonus: bool,
    doses: Vec<DoseStepWire>,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
struct UnknownProductWire {
    tier: ApprovalTier,
    #[serde(default = "default_true")]
    recovery_bonus: bool,
    doses: Vec<DoseStepWire>,
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
struct DoseStepWire {
    given: u32,
    still_needed: u32,
}

// ============================================================================
// Helper functions (internal)
// ============================================================================

fn steps_to_domain(label: &str, doses: Vec<DoseStepWire>) -> PolicyResult<Vec<DoseStep>> {
    if doses.is_empty() {
        return Err(PolicyError::InvalidPolicy(format!(
            "{label}: dose table cannot be empty"
        )));
    }

    let mut seen = BTreeSet::new();
    let mut steps = Vec::with_capacity(doses.len());
    for dose in doses {
        if !seen.insert(dose.given) {
            return Err(PolicyError::InvalidPolicy(format!(
                "{label}: dose table lists given={} twice",
                dose.given
            )));
        }
        steps.push(DoseStep {
            doses_given: dose.given,
            doses_still_needed: dose.still_needed,
        });
    }
    steps.sort_by_key(|step| step.doses_given);
    Ok(steps)
}

fn steps_to_wire(steps: &[DoseStep]) -> Vec<DoseStepWire> {
    steps
        .iter()
        .map(|step| DoseStepWire {
            given: step.doses_given,
            still_needed: step.doses_still_needed,
        })
        .collect()
}

fn wire_to_domain(wire: CatalogWire) -> PolicyResult<CatalogData> {
    if wire.default_full_series == 0 {
        return Err(PolicyError::InvalidPolicy(
            "default_full_series must be at least 1".into(),
        ));
    }

    let mut ids = BTreeSet::new();
    let mut products = Vec::with_capacity(wire.products.len());
    for product in wire.products {
        if !ids.insert(product.product.clone()) {
            return Err(PolicyError::InvalidPolicy(format!(
                "product {} is listed twice",
                product.product
            )));
        }
        let steps = steps_to_domain(product.product.as_str(), product.doses)?;
        products.push(ProductRequirement {
            product: product.product,
            tier: product.tier,
            requirement: DoseRequirement {
                recovery_bonus: product.recovery_bonus,
                steps,
            },
        });
    }

    let mut unknown_products = BTreeMap::new();
    for unknown in wire.unknown_products {
        let label = format!("unknown product ({})", unknown.tier);
        let requirement = DoseRequirement {
            recovery_bonus: unknown.recovery_bonus,
            steps: steps_to_domain(&label, unknown.doses)?,
        };
        if unknown_products.insert(unknown.tier, requirement).is_some() {
            return Err(PolicyError::InvalidPolicy(format!("{label} is listed twice")));
        }
    }

    Ok(CatalogData {
        default_full_series: wire.default_full_series,
        products,
        unknown_products,
    })
}

fn domain_to_wire(data: &CatalogData) -> CatalogWire {
    CatalogWire {
        default_full_series: data.default_full_series,
        products: data
            .products
            .iter()
            .map(|p| ProductWire {
                product: p.product.clone(),
                tier: p.tier,
                recovery_bonus: p.requirement.recovery_bonus,
                doses: steps_to_wire(&p.requirement.steps),
            })
            .collect(),
        unknown_products: data
            .unknown_products
            .iter()
            .map(|(tier, requirement)| UnknownProductWire {
                tier: *tier,
                recovery_bonus: requirement.recovery_bonus,
                doses: steps_to_wire(&requirement.steps),
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"default_full_series: 2
products:
  - product: comirnaty
    tier: approved
    doses:
      - given: 2
        still_needed: 0
      - given: 0
        still_needed: 2
      - given: 1
        still_needed: 1
  - product: jcovden
    tier: approved
    recovery_bonus: false
    doses:
      - given: 0
        still_needed: 1
      - given: 1
        still_needed: 0
unknown_products:
  - tier: provisionally_approved
    doses:
      - given: 0
        still_needed: 4
"#;

    #[test]
    fn parses_sample_catalog_and_sorts_steps() {
        let data = Catalog::parse(SAMPLE).expect("parse catalog");
        assert_eq!(data.products.len(), 2);

        let comirnaty = &data.products[0];
        assert!(comirnaty.requirement.recovery_bonus);
        let given: Vec<u32> = comirnaty
            .requirement
            .steps
            .iter()
            .map(|s| s.doses_given)
            .collect();
        assert_eq!(given, vec![0, 1, 2]);

        assert!(!data.products[1].requirement.recovery_bonus);
        assert_eq!(
            data.unknown_products[&ApprovalTier::ProvisionallyApproved].full_series(),
            Some(4)
        );
    }

    #[test]
    fn render_then_parse_preserves_catalog() {
        let data = Catalog::parse(SAMPLE).expect("parse catalog");
        let rendered = Catalog::render(&data).expect("render catalog");
        assert_eq!(Catalog::parse(&rendered).expect("reparse"), data);
    }

    #[test]
    fn rejects_duplicate_product() {
        let input = r#"products:
  - product: comirnaty
    tier: approved
    doses: [{ given: 0, still_needed: 2 }]
  - product: comirnaty
    tier: approved
    doses: [{ given: 0, still_needed: 2 }]
"#;
        let err = Catalog::parse(input).expect_err("should reject duplicate");
        assert!(matches!(err, PolicyError::InvalidPolicy(msg) if msg.contains("listed twice")));
    }

    #[test]
    fn rejects_repeated_given_value() {
        let input = r#"products:
  - product: comirnaty
    tier: approved
    doses: [{ given: 0, still_needed: 2 }, { given: 0, still_needed: 1 }]
"#;
        let err = Catalog::parse(input).expect_err("should reject repeated row");
        assert!(matches!(err, PolicyError::InvalidPolicy(msg) if msg.contains("given=0")));
    }

    #[test]
    fn strict_validation_reports_path_of_unknown_key() {
        let input = r#"products:
  - product: comirnaty
    tier: approved
    doses: [{ given: 0, still_needed: 2 }]
    colour: blue
"#;
        let err = Catalog::parse(input).expect_err("should reject unknown key");
        match err {
            PolicyError::Translation(msg) => {
                assert!(msg.contains("products[0]"));
                assert!(msg.contains("colour"));
            }
            other => panic!("expected Translation error, got {other:?}"),
        }
    }

    #[test]
    fn full_series_falls_back_to_largest_requirement() {
        let requirement = DoseRequirement {
            recovery_bonus: true,
            steps: vec![
                DoseStep {
                    doses_given: 1,
                    doses_still_needed: 2,
                },
                DoseStep {
                    doses_given: 3,
                    doses_still_needed: 0,
                },
            ],
        };
        assert_eq!(requirement.full_series(), Some(2));
    }
}
