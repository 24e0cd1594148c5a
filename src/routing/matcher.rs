//! Host and path matching primitives.
//!
//! # Responsibilities
//! - Normalize Host header values (lowercase, no port)
//! - Match host patterns (exact, or `*.suffix` wildcard)
//! - Match paths by prefix or exact equality, raw or percent-decoded
//!
//! # Design Decisions
//! - Host matching is case-insensitive (RFC 9110)
//! - Path matching is case-sensitive
//! - No regex to guarantee O(n) matching

use std::borrow::Cow;

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};

/// Characters escaped when a decoded path has to be put back on the wire.
const PATH: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Lowercase a Host header value and strip any port.
pub fn normalize_host(raw: &str) -> String {
    let raw = raw.trim();
    let host = if let Some(rest) = raw.strip_prefix('[') {
        // [v6]:port
        match rest.find(']') {
            Some(end) => &raw[..end + 2],
            None => raw,
        }
    } else {
        match raw.rsplit_once(':') {
            Some((host, port)) if port.chars().all(|c| c.is_ascii_digit()) => host,
            _ => raw,
        }
    };
    host.trim_end_matches('.').to_ascii_lowercase()
}

/// A virtual host selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostPattern {
    /// Exact hostname, stored lowercase.
    Exact(String),
    /// `*.example.org`, stored as the lowercase suffix `.example.org`.
    Wildcard(String),
}

impl HostPattern {
    pub fn parse(pattern: &str) -> Self {
        let pattern = pattern.to_ascii_lowercase();
        match pattern.strip_prefix('*') {
            Some(suffix) if suffix.starts_with('.') => HostPattern::Wildcard(suffix.to_string()),
            _ => HostPattern::Exact(pattern),
        }
    }

    /// `host` must already be normalized.
    pub fn matches(&self, host: &str) -> bool {
        match self {
            HostPattern::Exact(expected) => host == expected,
            HostPattern::Wildcard(suffix) => {
                // One label only: *.example.org matches a.example.org, not a.b.example.org.
                host.strip_suffix(suffix.as_str())
                    .is_some_and(|label| !label.is_empty() && !label.contains('.'))
            }
        }
    }
}

impl std::fmt::Display for HostPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HostPattern::Exact(host) => f.write_str(host),
            HostPattern::Wildcard(suffix) => write!(f, "*{}", suffix),
        }
    }
}

/// A request path as received, with its percent-decoded form alongside.
#[derive(Debug, Clone)]
pub struct RequestPath<'a> {
    raw: &'a str,
    decoded: Cow<'a, str>,
}

impl<'a> RequestPath<'a> {
    pub fn new(raw: &'a str) -> Self {
        let decoded = percent_decode_str(raw)
            .decode_utf8()
            .unwrap_or(Cow::Borrowed(raw));
        Self { raw, decoded }
    }

    /// The path exactly as the client sent it.
    pub fn raw(&self) -> &'a str {
        self.raw
    }

    pub fn decoded(&self) -> &str {
        &self.decoded
    }
}

/// Path condition of a rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathMatcher {
    path: String,
    exact: bool,
}

impl PathMatcher {
    pub fn prefix(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            exact: false,
        }
    }

    pub fn exact(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            exact: true,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.path
    }

    pub fn is_exact(&self) -> bool {
        self.exact
    }

    /// Ordering key: exact paths first, then longer prefixes.
    pub fn specificity(&self) -> (bool, usize) {
        (self.exact, self.path.len())
    }

    pub fn matches(&self, path: &RequestPath<'_>) -> bool {
        if self.exact {
            path.raw() == self.path || path.decoded() == self.path
        } else {
            path.raw().starts_with(&self.path) || path.decoded().starts_with(&self.path)
        }
    }

    /// Replace the matched part of `path` with `replacement`.
    ///
    /// The raw form is preferred so escapes survive untouched; when only the
    /// decoded form matched, the remainder is escaped again.
    pub fn rewrite(&self, path: &RequestPath<'_>, replacement: &str) -> String {
        if let Some(rest) = path.raw().strip_prefix(self.path.as_str()) {
            return join_path(replacement, rest);
        }
        match path.decoded().strip_prefix(self.path.as_str()) {
            Some(rest) => {
                let rest = utf8_percent_encode(rest, PATH).to_string();
                join_path(replacement, &rest)
            }
            None => path.raw().to_string(),
        }
    }
}

fn join_path(base: &str, rest: &str) -> String {
    match (base.ends_with('/'), rest.starts_with('/')) {
        (true, true) => format!("{}{}", base, &rest[1..]),
        (false, false) if !rest.is_empty() => format!("{}/{}", base, rest),
        _ => format!("{}{}", base, rest),
    }
}
