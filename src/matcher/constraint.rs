//! Per-parameter constraints.
//!
//! Constraints are checked after the trie has selected a route; a binding that
//! fails its constraint turns the whole match into a 404. They never influence
//! which branch the trie explores.

use {
    crate::Result,
    regex::Regex,
    std::{fmt, sync::Arc},
    uuid::Uuid,
};

/// A validation rule for one path parameter.
#[derive(Clone)]
pub enum Constraint {
    /// ASCII digits only.
    Numeric,
    /// ASCII letters only.
    Alpha,
    /// ASCII letters and digits only.
    Alphanumeric,
    /// A UUID in any of the standard textual forms.
    Uuid,
    /// The whole value must match the expression.
    Regex(Regex),
    /// The value must equal one of the listed options.
    OneOf(Vec<String>),
    /// Arbitrary predicate.
    Custom(Arc<dyn Fn(&str) -> bool + Send + Sync>),
}

impl Constraint {
    /// Builds a regex constraint anchored at both ends.
    pub fn regex(pattern: &str) -> Result<Self> {
        Ok(Constraint::Regex(Regex::new(&format!("^(?:{pattern})$"))?))
    }

    /// Builds an enumeration constraint.
    pub fn one_of<I, S>(options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Constraint::OneOf(options.into_iter().map(Into::into).collect())
    }

    /// Builds a constraint from a predicate.
    pub fn custom<F>(predicate: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        Constraint::Custom(Arc::new(predicate))
    }

    /// Returns true if `value` satisfies the constraint.
    pub fn check(&self, value: &str) -> bool {
        match self {
            Constraint::Numeric => !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()),
            Constraint::Alpha => !value.is_empty() && value.bytes().all(|b| b.is_ascii_alphabetic()),
            Constraint::Alphanumeric => {
                !value.is_empty() && value.bytes().all(|b| b.is_ascii_alphanumeric())
            }
            Constraint::Uuid => Uuid::try_parse(value).is_ok(),
            Constraint::Regex(regex) => regex.is_match(value),
            Constraint::OneOf(options) => options.iter().any(|o| o == value),
            Constraint::Custom(predicate) => predicate(value),
        }
    }
}

impl fmt::Debug for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constraint::Numeric => write!(f, "Numeric"),
            Constraint::Alpha => write!(f, "Alpha"),
            Constraint::Alphanumeric => write!(f, "Alphanumeric"),
            Constraint::Uuid => write!(f, "Uuid"),
            Constraint::Regex(regex) => write!(f, "Regex({})", regex.as_str()),
            Constraint::OneOf(options) => write!(f, "OneOf({options:?})"),
            Constraint::Custom(_) => write!(f, "Custom"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric() {
        assert!(Constraint::Numeric.check("42"));
        assert!(!Constraint::Numeric.check("4a"));
        assert!(!Constraint::Numeric.check(""));
    }

    #[test]
    fn test_alpha_and_alphanumeric() {
        assert!(Constraint::Alpha.check("abc"));
        assert!(!Constraint::Alpha.check("abc1"));
        assert!(Constraint::Alphanumeric.check("abc1"));
        assert!(!Constraint::Alphanumeric.check("abc-1"));
    }

    #[test]
    fn test_uuid() {
        assert!(Constraint::Uuid.check("67e55044-10b1-426f-9247-bb680e5fe0c8"));
        assert!(!Constraint::Uuid.check("not-a-uuid"));
    }

    #[test]
    fn test_regex_is_anchored() {
        let constraint = Constraint::regex("[a-z]{2}-[0-9]+").unwrap();
        assert!(constraint.check("ab-12"));
        assert!(!constraint.check("xab-12"));
        assert!(!constraint.check("ab-12x"));
    }

    #[test]
    fn test_invalid_regex_is_an_error() {
        assert!(Constraint::regex("(").is_err());
    }

    #[test]
    fn test_one_of_and_custom() {
        let constraint = Constraint::one_of(["asc", "desc"]);
        assert!(constraint.check("asc"));
        assert!(!constraint.check("up"));

        let even = Constraint::custom(|v| v.parse::<u32>().is_ok_and(|n| n % 2 == 0));
        assert!(even.check("4"));
        assert!(!even.check("5"));
    }
}
