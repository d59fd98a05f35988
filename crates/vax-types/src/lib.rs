//! Validated primitive types shared across the vaccination workspace.
//!
//! These types guarantee their invariants once constructed, so the policy boundary and the
//! engine never have to re-check them:
//! - [`NonEmptyText`]: trimmed, non-empty free text (rule names, labels)
//! - [`DiseaseId`], [`ProductId`], [`PriorityCode`]: whitespace-free identifiers
//! - [`Offset`]: a calendar offset such as `11 months` or `14 days`
//! - [`ApprovalTier`]: regulatory approval level of a vaccine product

mod codes;
mod offset;

pub use codes::{CodeError, DiseaseId, PriorityCode, ProductId};
pub use offset::{Offset, OffsetError, OffsetUnit};

/// Rejected free-text input.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TextError {
    #[error("text cannot be empty")]
    Empty,

    #[error("text cannot span several lines: {0:?}")]
    Multiline(String),
}

/// Trimmed single-line label, used for tier names and other human-facing policy labels.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NonEmptyText(String);

impl NonEmptyText {
    /// # Errors
    ///
    /// [`TextError::Empty`] for blank input, [`TextError::Multiline`] when a line break remains
    /// after trimming.
    pub fn new(input: impl AsRef<str>) -> Result<Self, TextError> {
        let label = input.as_ref().trim();
        match label {
            "" => Err(TextError::Empty),
            l if l.contains(['\n', '\r']) => Err(TextError::Multiline(l.to_owned())),
            l => Ok(Self(l.to_owned())),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for NonEmptyText {
    type Error = TextError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<NonEmptyText> for String {
    fn from(label: NonEmptyText) -> Self {
        label.0
    }
}

impl std::fmt::Display for NonEmptyText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Regulatory approval level of a vaccine product.
///
/// Products with an unknown identity (for example a foreign certificate that only states "an
/// approved vaccine") are resolved against a per-tier dose table instead of a product table.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalTier {
    /// Fully approved by the national regulator (or an equivalent listing).
    Approved,
    /// Provisionally or emergency approved; typically needs more doses when in doubt.
    ProvisionallyApproved,
}

impl std::fmt::Display for ApprovalTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApprovalTier::Approved => write!(f, "approved"),
            ApprovalTier::ProvisionallyApproved => write!(f, "provisionally_approved"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_empty_text_trims_input() {
        let text = NonEmptyText::new("  age-65  ").expect("valid text");
        assert_eq!(text.as_str(), "age-65");
    }

    #[test]
    fn non_empty_text_rejects_whitespace() {
        let err = NonEmptyText::new("   ").expect_err("should reject whitespace");
        assert!(matches!(err, TextError::Empty));
    }

    #[test]
    fn non_empty_text_rejects_line_breaks() {
        let err = NonEmptyText::new("age\n65").expect_err("should reject");
        assert!(matches!(err, TextError::Multiline(_)));
    }

    #[test]
    fn non_empty_text_deserialize_rejects_empty() {
        let err = serde_json::from_str::<NonEmptyText>("\"\"").expect_err("should reject empty");
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn approval_tier_uses_snake_case() {
        let json = serde_json::to_string(&ApprovalTier::ProvisionallyApproved).expect("serialize");
        assert_eq!(json, "\"provisionally_approved\"");
        assert_eq!(
            ApprovalTier::ProvisionallyApproved.to_string(),
            "provisionally_approved"
        );
    }
}
