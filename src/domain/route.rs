//! Route patterns: one compiler/matcher pair per page.
//!
//! Supported segment forms:
//!
//! - `/literal`
//! - `/:name` exactly one segment
//! - `/:name?` optional segment
//! - `/:name*` zero or more trailing segments
//! - `/:name+` one or more trailing segments
//!
//! Params hold decoded text. Compiled paths are percent-encoded, so a request for
//! `/caf%C3%A9` and the value `café` land on the same path.

use std::collections::BTreeMap;
use std::collections::HashSet;
use std::fmt;

use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};
use serde::{Deserialize, Serialize};

use super::error::RouteError;

/// Bytes escaped inside a single path segment.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

fn encode_segment(segment: &str) -> String {
    utf8_percent_encode(segment, SEGMENT).to_string()
}

/// Named parameters extracted from, or compiled into, a path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PathParams(BTreeMap<String, String>);

impl PathParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>, const N: usize> From<[(K, V); N]> for PathParams {
    fn from(pairs: [(K, V); N]) -> Self {
        let mut params = Self::new();
        for (name, value) in pairs {
            params.insert(name, value);
        }
        params
    }
}

impl fmt::Display for PathParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (index, (name, value)) in self.0.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{name}={value}")?;
        }
        f.write_str("}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Modifier {
    One,
    Optional,
    ZeroOrMore,
    OneOrMore,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param { name: String, modifier: Modifier },
}

/// A parsed route pattern. Parsing fails fast; matching and compiling never panic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePattern {
    source: String,
    segments: Vec<Segment>,
}

impl RoutePattern {
    pub fn parse(pattern: &str) -> Result<Self, RouteError> {
        let Some(rest) = pattern.strip_prefix('/') else {
            return Err(RouteError::malformed(pattern, "pattern must start with `/`"));
        };

        let rest = rest.strip_suffix('/').unwrap_or(rest);
        let mut segments = Vec::new();
        let mut seen = HashSet::new();

        if !rest.is_empty() {
            let raw: Vec<&str> = rest.split('/').collect();
            let last = raw.len() - 1;
            for (index, part) in raw.into_iter().enumerate() {
                let segment = parse_segment(pattern, part)?;
                if let Segment::Param { name, modifier } = &segment {
                    if !seen.insert(name.clone()) {
                        return Err(RouteError::malformed(
                            pattern,
                            format!("duplicate param `{name}`"),
                        ));
                    }
                    let repeating = matches!(modifier, Modifier::ZeroOrMore | Modifier::OneOrMore);
                    if repeating && index != last {
                        return Err(RouteError::malformed(
                            pattern,
                            format!("repeating param `{name}` must be the last segment"),
                        ));
                    }
                }
                segments.push(segment);
            }
        }

        Ok(Self {
            source: pattern.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Names of every param declared by the pattern, in order.
    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Param { name, .. } => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    pub fn compile(&self, params: &PathParams) -> Result<String, RouteError> {
        let mut parts: Vec<String> = Vec::with_capacity(self.segments.len());

        for segment in &self.segments {
            match segment {
                Segment::Literal(literal) => parts.push(encode_segment(literal)),
                Segment::Param { name, modifier } => {
                    let value = params.get(name).filter(|value| !value.is_empty());
                    match (modifier, value) {
                        (Modifier::One | Modifier::Optional, Some(value)) => {
                            if value.contains('/') {
                                return Err(RouteError::InvalidParam {
                                    pattern: self.source.clone(),
                                    name: name.clone(),
                                    value: value.to_string(),
                                });
                            }
                            parts.push(encode_segment(value));
                        }
                        (Modifier::ZeroOrMore | Modifier::OneOrMore, Some(value)) => {
                            let encoded: Vec<String> = value
                                .trim_matches('/')
                                .split('/')
                                .map(encode_segment)
                                .collect();
                            parts.push(encoded.join("/"));
                        }
                        (Modifier::Optional | Modifier::ZeroOrMore, None) => {}
                        (Modifier::One | Modifier::OneOrMore, None) => {
                            return Err(RouteError::MissingParam {
                                pattern: self.source.clone(),
                                name: name.clone(),
                            });
                        }
                    }
                }
            }
        }

        Ok(format!("/{}", parts.join("/")))
    }

    /// Match a request path, returning the decoded params. A segment that is not
    /// valid UTF-8 once decoded, or that decodes to a `/`, never matches.
    pub fn matches(&self, path: &str) -> Option<PathParams> {
        let trimmed = path.trim_start_matches('/');
        let trimmed = trimmed.strip_suffix('/').unwrap_or(trimmed);
        let parts: Vec<String> = if trimmed.is_empty() {
            Vec::new()
        } else {
            trimmed
                .split('/')
                .map(|part| {
                    percent_decode_str(part)
                        .decode_utf8()
                        .ok()
                        .filter(|decoded| !decoded.contains('/'))
                        .map(|decoded| decoded.into_owned())
                })
                .collect::<Option<Vec<_>>>()?
        };

        let mut params = PathParams::new();
        match_from(&self.segments, &parts, &mut params).then_some(params)
    }
}

impl fmt::Display for RoutePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn parse_segment(pattern: &str, part: &str) -> Result<Segment, RouteError> {
    if part.is_empty() {
        return Err(RouteError::malformed(pattern, "empty path segment"));
    }

    let Some(spec) = part.strip_prefix(':') else {
        if part.contains(':') {
            return Err(RouteError::malformed(
                pattern,
                format!("unexpected `:` inside literal segment `{part}`"),
            ));
        }
        return Ok(Segment::Literal(part.to_string()));
    };

    let (name, modifier) = match spec.chars().last() {
        Some('?') => (&spec[..spec.len() - 1], Modifier::Optional),
        Some('*') => (&spec[..spec.len() - 1], Modifier::ZeroOrMore),
        Some('+') => (&spec[..spec.len() - 1], Modifier::OneOrMore),
        _ => (spec, Modifier::One),
    };

    if name.is_empty() {
        return Err(RouteError::malformed(pattern, "param name must not be empty"));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(RouteError::malformed(
            pattern,
            format!("param name `{name}` may only contain ASCII letters, digits and `_`"),
        ));
    }

    Ok(Segment::Param {
        name: name.to_string(),
        modifier,
    })
}

fn match_from(segments: &[Segment], parts: &[String], params: &mut PathParams) -> bool {
    let Some((segment, rest)) = segments.split_first() else {
        return parts.is_empty();
    };

    match segment {
        Segment::Literal(literal) => match parts.split_first() {
            Some((part, remaining)) if part == literal => match_from(rest, remaining, params),
            _ => false,
        },
        Segment::Param { name, modifier } => match modifier {
            Modifier::One => match parts.split_first() {
                Some((part, remaining)) if !part.is_empty() => {
                    params.insert(name.clone(), part.as_str());
                    match_from(rest, remaining, params)
                }
                _ => false,
            },
            Modifier::Optional => {
                if let Some((part, remaining)) = parts.split_first()
                    && !part.is_empty()
                {
                    let mut attempt = params.clone();
                    attempt.insert(name.clone(), part.as_str());
                    if match_from(rest, remaining, &mut attempt) {
                        *params = attempt;
                        return true;
                    }
                }
                match_from(rest, parts, params)
            }
            Modifier::ZeroOrMore | Modifier::OneOrMore => {
                if parts.iter().any(|part| part.is_empty()) {
                    return false;
                }
                if parts.is_empty() {
                    return *modifier == Modifier::ZeroOrMore;
                }
                params.insert(name.clone(), parts.join("/"));
                true
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_rejects_missing_leading_slash() {
        let err = RoutePattern::parse("posts/:slug").expect_err("malformed pattern");
        assert!(matches!(err, RouteError::Malformed { .. }));
    }

    #[test]
    fn parse_rejects_duplicate_and_misplaced_params() {
        assert!(RoutePattern::parse("/:a/:a").is_err());
        assert!(RoutePattern::parse("/:rest*/tail").is_err());
        assert!(RoutePattern::parse("/a//b").is_err());
        assert!(RoutePattern::parse("/:").is_err());
        assert!(RoutePattern::parse("/:bad-name").is_err());
    }

    #[test]
    fn root_pattern_matches_only_root() {
        let route = RoutePattern::parse("/").expect("valid pattern");
        assert_eq!(route.matches("/"), Some(PathParams::new()));
        assert_eq!(route.matches("/x"), None);
        assert_eq!(route.compile(&PathParams::new()).expect("compiles"), "/");
    }

    #[test]
    fn single_param_round_trips() {
        let route = RoutePattern::parse("/posts/:slug").expect("valid pattern");
        let params = route.matches("/posts/hello/").expect("matches");
        assert_eq!(params.get("slug"), Some("hello"));
        assert_eq!(route.compile(&params).expect("compiles"), "/posts/hello");
        assert_eq!(route.matches("/posts"), None);
        assert_eq!(route.matches("/posts/a/b"), None);
    }

    #[test]
    fn optional_param_may_be_absent() {
        let route = RoutePattern::parse("/docs/:lang?/index").expect("valid pattern");
        assert_eq!(
            route.matches("/docs/fr/index").and_then(|p| p.get("lang").map(String::from)),
            Some("fr".to_string())
        );
        assert_eq!(route.matches("/docs/index"), Some(PathParams::new()));
        assert_eq!(
            route.compile(&PathParams::new()).expect("compiles"),
            "/docs/index"
        );
    }

    #[test]
    fn repeating_params_capture_the_tail() {
        let any = RoutePattern::parse("/files/:rest*").expect("valid pattern");
        assert_eq!(any.matches("/files"), Some(PathParams::new()));
        assert_eq!(
            any.matches("/files/a/b/c"),
            Some(PathParams::from([("rest", "a/b/c")]))
        );

        let some = RoutePattern::parse("/files/:rest+").expect("valid pattern");
        assert_eq!(some.matches("/files"), None);
        assert_eq!(
            some.compile(&PathParams::from([("rest", "a/b")]))
                .expect("compiles"),
            "/files/a/b"
        );
    }

    #[test]
    fn compile_rejects_missing_and_multi_segment_values() {
        let route = RoutePattern::parse("/:slug").expect("valid pattern");
        assert!(matches!(
            route.compile(&PathParams::new()),
            Err(RouteError::MissingParam { .. })
        ));
        assert!(matches!(
            route.compile(&PathParams::from([("slug", "a/b")])),
            Err(RouteError::InvalidParam { .. })
        ));
    }

    #[test]
    fn encoded_segments_decode_into_params() {
        let route = RoutePattern::parse("/posts/:slug").expect("valid pattern");

        let params = route.matches("/posts/caf%C3%A9").expect("matches");
        assert_eq!(params.get("slug"), Some("café"));
        assert_eq!(route.compile(&params).expect("compiles"), "/posts/caf%C3%A9");

        let params = route.matches("/posts/hello%20world").expect("matches");
        assert_eq!(params.get("slug"), Some("hello world"));
        assert_eq!(
            route.compile(&PathParams::from([("slug", "hello world")]))
                .expect("compiles"),
            "/posts/hello%20world"
        );
    }

    #[test]
    fn lowercase_escapes_compile_to_one_canonical_path() {
        let route = RoutePattern::parse("/:slug").expect("valid pattern");
        let params = route.matches("/caf%c3%a9").expect("matches");
        assert_eq!(route.compile(&params).expect("compiles"), "/caf%C3%A9");
    }

    #[test]
    fn undecodable_or_slash_segments_do_not_match() {
        let route = RoutePattern::parse("/:slug").expect("valid pattern");
        assert_eq!(route.matches("/%FF"), None);
        assert_eq!(route.matches("/a%2Fb"), None);

        let tail = RoutePattern::parse("/files/:rest+").expect("valid pattern");
        let params = tail.matches("/files/my%20docs/r%C3%A9sum%C3%A9").expect("matches");
        assert_eq!(params.get("rest"), Some("my docs/résumé"));
        assert_eq!(
            tail.compile(&params).expect("compiles"),
            "/files/my%20docs/r%C3%A9sum%C3%A9"
        );
    }

    #[test]
    fn params_display_in_key_order() {
        let params = PathParams::from([("b", "2"), ("a", "1")]);
        assert_eq!(params.to_string(), "{a=1, b=2}");
    }
}
