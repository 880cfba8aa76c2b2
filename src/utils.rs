//!
//! Utility functions shared across the crate.
//!
//! This module provides:
//! - [`replace_handlebars_with_env`] - Template substitution for environment variables
//! - [`new_request_id`] - Time-ordered UUIDv7 request identifiers
//! - [`http_date`] - IMF-fixdate formatting for date-valued headers
//!

use {
    chrono::{DateTime, Utc},
    regex::{Captures, Regex},
    std::{env, sync::LazyLock},
    uuid::{ContextV7, Timestamp, Uuid},
};

/// Regular expression pattern for matching handlebars-style environment variable references.
/// Matches patterns like `{{ VAR_NAME }}` with optional whitespace around the variable name.
/// Variable names must be uppercase letters, digits, or underscores (standard env var naming).
static HANDLEBAR_REGEXP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*([A-Z0-9_]+)\s*\}\}").unwrap());

/// Replaces handlebars-style placeholders with environment variable values.
///
/// Searches through the input string for patterns like `{{ VAR_NAME }}` and replaces
/// them with the corresponding environment variable value. Variable names are
/// case-sensitive and must consist of uppercase letters, digits, or underscores.
///
/// Whitespace around the variable name is allowed: `{{VAR}}`, `{{ VAR }}`, and
/// `{{  VAR  }}` are all valid and equivalent.
///
/// # Examples
///
/// ```
/// use axum_dispatch::replace_handlebars_with_env;
///
/// // Missing variables become empty strings
/// let template = "Value: {{ MISSING_VAR }}";
/// let result = replace_handlebars_with_env(template);
/// assert_eq!(result, "Value: ");
/// ```
pub fn replace_handlebars_with_env(input: &str) -> String {
    HANDLEBAR_REGEXP
        .replace_all(input, |caps: &Captures| {
            let var_name = &caps[1];
            env::var(var_name).unwrap_or_else(|_| {
                tracing::warn!(
                    variable = %var_name,
                    "Environment variable not found, substituting with empty string"
                );
                String::new()
            })
        })
        .to_string()
}

/// Generates a new request identifier.
///
/// UUIDv7 values are time-ordered, so identifiers sort by creation time and
/// can be correlated across services.
pub fn new_request_id() -> String {
    let cx = ContextV7::new().with_additional_precision();
    Uuid::new_v7(Timestamp::now(cx)).to_string()
}

/// Formats a timestamp as an HTTP-date (`Sun, 06 Nov 1994 08:49:37 GMT`).
pub fn http_date(value: &DateTime<Utc>) -> String {
    value.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}
