//! Route pattern parsing.
//!
//! Patterns are split on `/` into literal, parameter and wildcard segments.
//! Both the colon style (`/users/:id`, `/files/*path`) and the brace style
//! used by axum (`/users/{id}`, `/files/{*path}`) are accepted.

use crate::{Error, Result};
use std::fmt;

/// One segment of a route pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Matches the exact text.
    Literal(Box<str>),
    /// Matches one non-empty path segment and binds it.
    Param(Box<str>),
    /// Matches the remainder of the path (possibly empty) and binds it.
    Wildcard(Box<str>),
}

/// A parsed and validated route pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    raw: String,
    segments: Vec<Segment>,
}

impl Pattern {
    /// Parses `pattern`, optionally ignoring a single trailing slash.
    ///
    /// Fails when the pattern does not start with `/`, contains an empty
    /// segment, has an unnamed or invalid parameter, repeats a parameter
    /// name, or has a wildcard anywhere but last.
    pub fn parse(pattern: &str, trim_trailing_slash: bool) -> Result<Self> {
        if !pattern.starts_with('/') {
            return Err(Error::invalid_pattern(format!(
                "route pattern `{pattern}` must start with '/'"
            )));
        }

        let mut body = &pattern[1..];
        if trim_trailing_slash {
            body = body.strip_suffix('/').unwrap_or(body);
        }

        let mut segments = Vec::new();
        if !body.is_empty() {
            let parts: Vec<&str> = body.split('/').collect();
            let last = parts.len() - 1;
            for (i, part) in parts.iter().enumerate() {
                let segment = parse_segment(pattern, part, i == last)?;
                if matches!(segment, Segment::Wildcard(_)) && i != last {
                    return Err(Error::invalid_pattern(format!(
                        "wildcard must be the last segment of `{pattern}`"
                    )));
                }
                segments.push(segment);
            }
        }

        let mut seen: Vec<&str> = Vec::new();
        for segment in &segments {
            if let Segment::Param(name) | Segment::Wildcard(name) = segment {
                if seen.contains(&&**name) {
                    return Err(Error::invalid_pattern(format!(
                        "parameter `{name}` appears more than once in `{pattern}`"
                    )));
                }
                seen.push(name);
            }
        }

        let mut raw = String::with_capacity(pattern.len());
        raw.push('/');
        raw.push_str(body);

        Ok(Self { raw, segments })
    }

    /// Normalized pattern text.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Parsed segments in order.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Returns true if the pattern has no parameter or wildcard segment.
    pub fn is_static(&self) -> bool {
        self.segments
            .iter()
            .all(|s| matches!(s, Segment::Literal(_)))
    }

    /// Names of the parameter and wildcard segments, in order.
    pub fn param_names(&self) -> Vec<Box<str>> {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Param(name) | Segment::Wildcard(name) => Some(name.clone()),
                Segment::Literal(_) => None,
            })
            .collect()
    }

    /// Pattern with parameter names erased. Two patterns with the same shape
    /// match exactly the same paths.
    pub fn shape(&self) -> String {
        let mut shape = String::with_capacity(self.raw.len());
        for segment in &self.segments {
            shape.push('/');
            match segment {
                Segment::Literal(text) => shape.push_str(text),
                Segment::Param(_) => shape.push(':'),
                Segment::Wildcard(_) => shape.push('*'),
            }
        }
        if shape.is_empty() {
            shape.push('/');
        }
        shape
    }

    /// Fills parameters into the pattern, producing a concrete path.
    pub fn expand(&self, params: &[(&str, &str)]) -> Result<String> {
        if self.segments.is_empty() {
            return Ok("/".into());
        }
        let mut path = String::with_capacity(self.raw.len());
        for segment in &self.segments {
            path.push('/');
            match segment {
                Segment::Literal(text) => path.push_str(text),
                Segment::Param(name) | Segment::Wildcard(name) => {
                    let value = params
                        .iter()
                        .find(|(key, _)| *key == &**name)
                        .map(|(_, value)| *value)
                        .ok_or_else(|| {
                            Error::invalid_input(format!(
                                "missing value for parameter `{name}` of `{}`",
                                self.raw
                            ))
                        })?;
                    if matches!(segment, Segment::Param(_)) && (value.is_empty() || value.contains('/')) {
                        return Err(Error::invalid_input(format!(
                            "value for parameter `{name}` must be a single non-empty segment"
                        )));
                    }
                    path.push_str(value.trim_start_matches('/'));
                }
            }
        }
        Ok(path)
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn parse_segment(pattern: &str, part: &str, is_last: bool) -> Result<Segment> {
    if part.is_empty() {
        // A trailing empty segment means the pattern keeps its trailing slash.
        if is_last {
            return Ok(Segment::Literal(Box::from("")));
        }
        return Err(Error::invalid_pattern(format!(
            "route pattern `{pattern}` contains an empty segment"
        )));
    }

    let (kind, name) = if let Some(name) = part.strip_prefix(':') {
        ('p', name)
    } else if let Some(name) = part.strip_prefix('*') {
        ('w', name)
    } else if let Some(inner) = part.strip_prefix('{').and_then(|p| p.strip_suffix('}')) {
        match inner.strip_prefix('*') {
            Some(name) => ('w', name),
            None => ('p', inner),
        }
    } else {
        if part.contains(['{', '}']) {
            return Err(Error::invalid_pattern(format!(
                "segment `{part}` of `{pattern}` mixes literal text and a parameter"
            )));
        }
        return Ok(Segment::Literal(Box::from(part)));
    };

    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(Error::invalid_pattern(format!(
            "invalid parameter name `{name}` in `{pattern}`"
        )));
    }

    Ok(match kind {
        'p' => Segment::Param(Box::from(name)),
        _ => Segment::Wildcard(Box::from(name)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use proptest::prelude::*;

    #[test]
    fn test_parse_static() {
        let pattern = Pattern::parse("/users/me", true).unwrap();
        assert!(pattern.is_static());
        assert_eq!(pattern.as_str(), "/users/me");
        assert_eq!(pattern.shape(), "/users/me");
    }

    #[test]
    fn test_parse_root() {
        let pattern = Pattern::parse("/", true).unwrap();
        assert!(pattern.segments().is_empty());
        assert_eq!(pattern.as_str(), "/");
        assert_eq!(pattern.shape(), "/");
    }

    #[test]
    fn test_parse_params_and_wildcard() {
        let pattern = Pattern::parse("/users/:id/files/*path", true).unwrap();
        assert_eq!(
            pattern.segments(),
            &[
                Segment::Literal("users".into()),
                Segment::Param("id".into()),
                Segment::Literal("files".into()),
                Segment::Wildcard("path".into()),
            ]
        );
        assert_eq!(pattern.param_names(), vec![Box::from("id"), Box::from("path")]);
        assert_eq!(pattern.shape(), "/users/:/files/*");
    }

    #[test]
    fn test_brace_syntax_matches_colon_syntax() {
        let colon = Pattern::parse("/users/:id/*rest", true).unwrap();
        let brace = Pattern::parse("/users/{id}/{*rest}", true).unwrap();
        assert_eq!(colon.segments(), brace.segments());
    }

    #[test]
    fn test_trailing_slash_policy() {
        let trimmed = Pattern::parse("/users/", true).unwrap();
        assert_eq!(trimmed.as_str(), "/users");

        let kept = Pattern::parse("/users/", false).unwrap();
        assert_eq!(kept.as_str(), "/users/");
        assert_eq!(kept.segments().len(), 2);
    }

    #[test]
    fn test_wildcard_must_be_terminal() {
        let err = Pattern::parse("/files/*path/edit", true).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidPattern);
        assert!(err.to_string().contains("last segment"));
    }

    #[test]
    fn test_duplicate_param_names_rejected() {
        let err = Pattern::parse("/a/:id/b/:id", true).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidPattern);
        let err = Pattern::parse("/a/:id/*id", true).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidPattern);
    }

    #[test]
    fn test_malformed_patterns_rejected() {
        for bad in ["users", "/a//b", "/:", "/*", "/a/:bad-name", "/x{id}", "/{}"] {
            assert!(Pattern::parse(bad, true).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn test_same_shape_for_renamed_params() {
        let a = Pattern::parse("/users/:id", true).unwrap();
        let b = Pattern::parse("/users/:uid", true).unwrap();
        assert_eq!(a.shape(), b.shape());
    }

    #[test]
    fn test_expand() {
        let pattern = Pattern::parse("/users/:id/files/*path", true).unwrap();
        let path = pattern
            .expand(&[("id", "42"), ("path", "a/b/c")])
            .unwrap();
        assert_eq!(path, "/users/42/files/a/b/c");

        let err = pattern.expand(&[("id", "42")]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        let err = pattern.expand(&[("id", "4/2"), ("path", "")]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    proptest! {
        /// Parsing never panics, whatever the input.
        #[test]
        fn parse_never_panics(s in ".*") {
            let _ = Pattern::parse(&s, true);
        }

        /// Literal-only patterns round-trip to their normalized form.
        #[test]
        fn literal_patterns_roundtrip(parts in prop::collection::vec("[a-z0-9]{1,8}", 0..6)) {
            let raw = format!("/{}", parts.join("/"));
            let pattern = Pattern::parse(&raw, true).unwrap();
            prop_assert!(pattern.is_static());
            prop_assert_eq!(pattern.as_str(), raw.as_str());
        }
    }
}
