//! Declarative field constraints. Rules are checked in declaration order and the first
//! violation wins.

use crate::resource::{ObjectMeta, OwnerScope};
use regex::Regex;
use std::fmt::Display;
use std::ops::RangeInclusive;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct Violation {
    pub field: String,
    pub message: String,
}

impl Violation {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Accumulates the first failed constraint.
///
/// ```
/// use resource_pipeline::validation::Rules;
///
/// let result = Rules::new()
///     .required("metadata.name", "")
///     .max_len("spec.description", "short", 10)
///     .finish();
/// assert_eq!(result.unwrap_err().field, "metadata.name");
/// ```
#[derive(Debug, Default)]
#[must_use]
pub struct Rules {
    first: Option<Violation>,
}

impl Rules {
    pub fn new() -> Self {
        Self::default()
    }

    fn fail(&mut self, field: &str, message: String) {
        if self.first.is_none() {
            self.first = Some(Violation::new(field, message));
        }
    }

    pub fn required(mut self, field: &str, value: &str) -> Self {
        if value.trim().is_empty() {
            self.fail(field, "value is required".to_string());
        }
        self
    }

    pub fn max_len(mut self, field: &str, value: &str, max: usize) -> Self {
        if value.chars().count() > max {
            self.fail(field, format!("value length must be at most {max} characters"));
        }
        self
    }

    /// Empty values are left to `required`.
    pub fn pattern(mut self, field: &str, value: &str, re: &Regex) -> Self {
        if !value.is_empty() && !re.is_match(value) {
            self.fail(field, format!("value does not match regex pattern `{}`", re.as_str()));
        }
        self
    }

    pub fn range<N>(mut self, field: &str, value: N, range: RangeInclusive<N>) -> Self
    where
        N: PartialOrd + Display,
    {
        if !range.contains(&value) {
            self.fail(
                field,
                format!(
                    "value must be between {} and {} inclusive",
                    range.start(),
                    range.end()
                ),
            );
        }
        self
    }

    /// Cross-field or otherwise custom constraint.
    pub fn check(mut self, field: &str, ok: bool, message: impl Into<String>) -> Self {
        if !ok {
            self.fail(field, message.into());
        }
        self
    }

    pub fn finish(self) -> Result<(), Violation> {
        match self.first {
            Some(v) => Err(v),
            None => Ok(()),
        }
    }
}

/// Constraints every resource's metadata must satisfy.
pub fn validate_metadata(meta: &ObjectMeta) -> Result<(), Violation> {
    let org_ok = match &meta.owner_scope {
        OwnerScope::Platform => true,
        OwnerScope::Organization { org } => !org.trim().is_empty(),
    };
    Rules::new()
        .required("metadata.name", &meta.name)
        .max_len("metadata.name", &meta.name, 253)
        .max_len("metadata.slug", &meta.slug, 63)
        .check(
            "metadata.owner_scope",
            org_ok,
            "organization scope requires an org",
        )
        .check(
            "metadata.labels",
            meta.labels.keys().all(|k| !k.is_empty()),
            "label keys must not be empty",
        )
        .finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_violation_wins() {
        let err = Rules::new()
            .max_len("a", "abcdef", 3)
            .required("b", "")
            .finish()
            .unwrap_err();
        assert_eq!(err.field, "a");
        assert!(err.message.contains("at most 3"));
    }

    #[test]
    fn test_range_and_pattern() {
        let re = Regex::new(r"^[a-z]+$").unwrap();
        assert!(Rules::new().range("turns", 5, 1..=10).finish().is_ok());
        assert!(Rules::new().range("turns", 0, 1..=10).finish().is_err());
        assert!(Rules::new().pattern("model", "", &re).finish().is_ok());
        assert!(Rules::new().pattern("model", "GPT", &re).finish().is_err());
    }

    #[test]
    fn test_metadata_rules() {
        let mut meta = ObjectMeta::named("My Agent");
        assert!(validate_metadata(&meta).is_ok());

        meta.owner_scope = OwnerScope::Organization { org: " ".into() };
        assert_eq!(
            validate_metadata(&meta).unwrap_err().field,
            "metadata.owner_scope"
        );

        meta.name.clear();
        assert_eq!(validate_metadata(&meta).unwrap_err().field, "metadata.name");
    }
}
