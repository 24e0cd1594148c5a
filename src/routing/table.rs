//! Compiled rule table.
//!
//! # Responsibilities
//! - Expand configured rules into one rule per virtual host
//! - Bucket rules by host; sort each bucket once by path specificity
//! - Answer redirect and route lookups without allocation or locking
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(1) exact host lookup via HashMap, wildcards scanned only on a miss
//! - Within a bucket: exact paths, then longest prefix, then declaration order

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use axum::http::uri::Authority;

use crate::config::{ConfigError, GatewayConfig, RedirectConfig, RouteConfig, Scheme, ValidationError};
use crate::config::validation::validate_config;
use crate::routing::matcher::{HostPattern, PathMatcher, RequestPath};

/// A backend service address, always reached over plain HTTP.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backend(Authority);

impl Backend {
    pub fn authority(&self) -> &Authority {
        &self.0
    }
}

impl FromStr for Backend {
    type Err = axum::http::uri::InvalidUri;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Authority::from_str(s).map(Backend)
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0.as_str())
    }
}

/// Maps a (host, path) pair to a backend.
#[derive(Debug, Clone)]
pub struct RouteRule {
    pub host: HostPattern,
    pub path: PathMatcher,
    pub backend: Backend,
    pub cacheable: bool,
    pub cache_ttl: Option<Duration>,
    pub cors: bool,
    pub rewrite: Option<String>,
}

/// Sends a (host, path) pair to its canonical scheme and host.
#[derive(Debug, Clone)]
pub struct RedirectRule {
    pub host: HostPattern,
    pub path: PathMatcher,
    pub when_scheme: Option<Scheme>,
    pub target_scheme: Scheme,
    pub target_host: String,
    pub preserve_path: bool,
}

impl RedirectRule {
    fn applies_to(&self, scheme: Scheme) -> bool {
        self.when_scheme.map_or(true, |expected| expected == scheme)
    }
}

#[derive(Debug, Default)]
struct HostRules {
    redirects: Vec<RedirectRule>,
    routes: Vec<RouteRule>,
}

impl HostRules {
    fn sort(&mut self) {
        // sort_by is stable, so equal specificity keeps declaration order.
        self.redirects
            .sort_by(|a, b| b.path.specificity().cmp(&a.path.specificity()));
        self.routes
            .sort_by(|a, b| b.path.specificity().cmp(&a.path.specificity()));
    }

    fn redirect(&self, scheme: Scheme, path: &RequestPath<'_>) -> Option<&RedirectRule> {
        self.redirects
            .iter()
            .find(|rule| rule.applies_to(scheme) && rule.path.matches(path))
    }

    fn route(&self, path: &RequestPath<'_>) -> Option<&RouteRule> {
        self.routes.iter().find(|rule| rule.path.matches(path))
    }
}

/// Immutable, pre-sorted redirect and route rules.
#[derive(Debug, Default)]
pub struct RuleTable {
    exact: HashMap<String, HostRules>,
    /// Sorted longest suffix first.
    wildcard: Vec<(HostPattern, HostRules)>,
}

impl RuleTable {
    /// Validate `config` and compile its rules.
    pub fn from_config(config: &GatewayConfig) -> Result<Self, ConfigError> {
        validate_config(config).map_err(ConfigError::Validation)?;

        let mut table = RuleTable::default();
        for (index, route) in config.routes.iter().enumerate() {
            for rule in compile_route(index, route)? {
                table.bucket(&rule.host).routes.push(rule);
            }
        }
        for redirect in &config.redirects {
            for rule in compile_redirect(redirect) {
                table.bucket(&rule.host).redirects.push(rule);
            }
        }

        for rules in table.exact.values_mut() {
            rules.sort();
        }
        for (_, rules) in table.wildcard.iter_mut() {
            rules.sort();
        }
        table
            .wildcard
            .sort_by_key(|(pattern, _)| std::cmp::Reverse(pattern.to_string().len()));

        tracing::debug!(
            exact_hosts = table.exact.len(),
            wildcard_hosts = table.wildcard.len(),
            "Rule table compiled"
        );
        Ok(table)
    }

    fn bucket(&mut self, pattern: &HostPattern) -> &mut HostRules {
        match pattern {
            HostPattern::Exact(host) => self.exact.entry(host.clone()).or_default(),
            HostPattern::Wildcard(_) => {
                let position = self.wildcard.iter().position(|(p, _)| p == pattern);
                let index = match position {
                    Some(index) => index,
                    None => {
                        self.wildcard.push((pattern.clone(), HostRules::default()));
                        self.wildcard.len() - 1
                    }
                };
                &mut self.wildcard[index].1
            }
        }
    }

    /// Most specific bucket holding a rule `pick` accepts: the exact host
    /// first, then wildcards, longest suffix first. The result borrows only
    /// the table.
    fn find_in_buckets<'t, T>(
        &'t self,
        host: &str,
        mut pick: impl FnMut(&'t HostRules) -> Option<&'t T>,
    ) -> Option<&'t T> {
        if let Some(found) = self.exact.get(host).and_then(&mut pick) {
            return Some(found);
        }
        self.wildcard
            .iter()
            .filter(|(pattern, _)| pattern.matches(host))
            .find_map(|(_, rules)| pick(rules))
    }

    /// First redirect rule matching a request; `host` must be normalized.
    pub fn lookup_redirect(&self, host: &str, scheme: Scheme, path: &RequestPath<'_>) -> Option<&RedirectRule> {
        self.find_in_buckets(host, |rules| rules.redirect(scheme, path))
    }

    /// First route rule matching a request; `host` must be normalized.
    pub fn lookup_route(&self, host: &str, path: &RequestPath<'_>) -> Option<&RouteRule> {
        self.find_in_buckets(host, |rules| rules.route(path))
    }

    /// Number of distinct host buckets.
    pub fn host_count(&self) -> usize {
        self.exact.len() + self.wildcard.len()
    }
}

fn path_matcher(path: &str, exact: bool) -> PathMatcher {
    if exact {
        PathMatcher::exact(path)
    } else {
        PathMatcher::prefix(path)
    }
}

fn compile_route(index: usize, route: &RouteConfig) -> Result<Vec<RouteRule>, ConfigError> {
    let backend: Backend = route.backend.parse().map_err(|_| {
        ConfigError::Validation(vec![ValidationError::InvalidBackend {
            index,
            backend: route.backend.clone(),
        }])
    })?;

    Ok(route
        .hosts
        .iter()
        .map(|host| RouteRule {
            host: HostPattern::parse(host),
            path: path_matcher(&route.path_prefix, route.exact),
            backend: backend.clone(),
            cacheable: route.cacheable,
            cache_ttl: route.cache_ttl_secs.map(Duration::from_secs),
            cors: route.cors,
            rewrite: route.rewrite.clone(),
        })
        .collect())
}

fn compile_redirect(redirect: &RedirectConfig) -> Vec<RedirectRule> {
    let path = redirect.path_prefix.as_deref().unwrap_or("/");
    redirect
        .hosts
        .iter()
        .map(|host| RedirectRule {
            host: HostPattern::parse(host),
            path: path_matcher(path, redirect.exact),
            when_scheme: redirect.when_scheme,
            target_scheme: redirect.target_scheme,
            target_host: redirect.target_host.to_ascii_lowercase(),
            preserve_path: redirect.preserve_path,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;

    fn table(toml: &str) -> RuleTable {
        RuleTable::from_config(&parse_config(toml).unwrap()).unwrap()
    }

    fn backend_for(table: &RuleTable, host: &str, path: &str) -> Option<String> {
        table
            .lookup_route(host, &RequestPath::new(path))
            .map(|rule| rule.backend.to_string())
    }

    #[test]
    fn test_longest_prefix_wins_regardless_of_order() {
        let table = table(
            r#"
            [[routes]]
            hosts = ["api.example.org"]
            path_prefix = "/routing-data/v2/hsl/"
            backend = "data-hsl:8080"

            [[routes]]
            hosts = ["api.example.org"]
            path_prefix = "/routing-data/v2/hsl/router-config.json"
            backend = "data-hsl:8080"
            cors = true

            [[routes]]
            hosts = ["api.example.org"]
            path_prefix = "/"
            backend = "site:8080"
            "#,
        );

        let rule = table
            .lookup_route("api.example.org", &RequestPath::new("/routing-data/v2/hsl/router-config.json"))
            .unwrap();
        assert!(rule.cors);

        let rule = table
            .lookup_route("api.example.org", &RequestPath::new("/routing-data/v2/hsl/router-hsl.zip"))
            .unwrap();
        assert!(!rule.cors);
        assert_eq!(rule.backend.to_string(), "data-hsl:8080");

        assert_eq!(
            backend_for(&table, "api.example.org", "/elsewhere").as_deref(),
            Some("site:8080")
        );
    }

    #[test]
    fn test_equal_length_ties_keep_declaration_order() {
        // "/%41" matches the raw path, "/A/x" the decoded one; both are 4 bytes long.
        let first = table(
            r#"
            [[routes]]
            hosts = ["api.example.org"]
            path_prefix = "/%41"
            backend = "raw:1"

            [[routes]]
            hosts = ["api.example.org"]
            path_prefix = "/A/x"
            backend = "decoded:2"
            "#,
        );
        assert_eq!(backend_for(&first, "api.example.org", "/%41/xy").as_deref(), Some("raw:1"));

        let second = table(
            r#"
            [[routes]]
            hosts = ["api.example.org"]
            path_prefix = "/A/x"
            backend = "decoded:2"

            [[routes]]
            hosts = ["api.example.org"]
            path_prefix = "/%41"
            backend = "raw:1"
            "#,
        );
        assert_eq!(backend_for(&second, "api.example.org", "/%41/xy").as_deref(), Some("decoded:2"));
    }

    #[test]
    fn test_first_declared_redirect_wins() {
        let table = table(
            r#"
            [[redirects]]
            hosts = ["m.example.org"]
            when_scheme = "http"
            target_scheme = "https"
            target_host = "first.example.org"

            [[redirects]]
            hosts = ["m.example.org"]
            target_scheme = "https"
            target_host = "second.example.org"
            "#,
        );
        let path = RequestPath::new("/kissa");
        let rule = table.lookup_redirect("m.example.org", Scheme::Http, &path).unwrap();
        assert_eq!(rule.target_host, "first.example.org");
        let rule = table.lookup_redirect("m.example.org", Scheme::Https, &path).unwrap();
        assert_eq!(rule.target_host, "second.example.org");
    }

    #[test]
    fn test_wildcard_longest_prefix() {
        let table = table(
            r#"
            [[routes]]
            hosts = ["*.example.org"]
            path_prefix = "/"
            backend = "root:1"

            [[routes]]
            hosts = ["*.example.org"]
            path_prefix = "/a"
            backend = "a:1"
            "#,
        );
        assert_eq!(backend_for(&table, "w.example.org", "/ab").as_deref(), Some("a:1"));
        assert_eq!(backend_for(&table, "w.example.org", "/b").as_deref(), Some("root:1"));
    }

    #[test]
    fn test_exact_beats_longer_prefix() {
        let table = table(
            r#"
            [[routes]]
            hosts = ["a.example.org"]
            path_prefix = "/sw.js"
            exact = true
            backend = "exact:1"
            cacheable = true

            [[routes]]
            hosts = ["a.example.org"]
            path_prefix = "/sw.js.map/long/prefix"
            backend = "prefix:1"
            "#,
        );
        let rule = table.lookup_route("a.example.org", &RequestPath::new("/sw.js")).unwrap();
        assert!(rule.cacheable);
        assert_eq!(backend_for(&table, "a.example.org", "/sw.js.map"), None);
    }

    #[test]
    fn test_host_scoped() {
        let table = table(
            r#"
            [[routes]]
            hosts = ["api.example.org"]
            path_prefix = "/routing/"
            backend = "otp:8080"

            [[routes]]
            hosts = ["dev-api.example.org"]
            path_prefix = "/routing/"
            backend = "otp-next:8080"
            "#,
        );
        assert_eq!(backend_for(&table, "api.example.org", "/routing/x").as_deref(), Some("otp:8080"));
        assert_eq!(
            backend_for(&table, "dev-api.example.org", "/routing/x").as_deref(),
            Some("otp-next:8080")
        );
        assert_eq!(backend_for(&table, "other.example.org", "/routing/x"), None);
        assert_eq!(table.host_count(), 2);
    }

    #[test]
    fn test_exact_host_preferred_over_wildcard() {
        let table = table(
            r#"
            [[routes]]
            hosts = ["*.example.org"]
            backend = "wild:1"

            [[routes]]
            hosts = ["Special.Example.org"]
            path_prefix = "/only/"
            backend = "special:1"
            "#,
        );
        assert_eq!(
            backend_for(&table, "special.example.org", "/only/here").as_deref(),
            Some("special:1")
        );
        // Falls through to the wildcard when the exact host has no matching rule.
        assert_eq!(backend_for(&table, "special.example.org", "/").as_deref(), Some("wild:1"));
        assert_eq!(backend_for(&table, "x.example.org", "/").as_deref(), Some("wild:1"));
    }

    #[test]
    fn test_matched_rule_outlives_lookup_inputs() {
        let table = table(
            r#"
            [[routes]]
            hosts = ["*.example.org"]
            backend = "wild:1"
            "#,
        );
        let rule = {
            let host = String::from("tiles.example.org");
            let path = String::from("/styles/v1/");
            table.lookup_route(&host, &RequestPath::new(&path))
        };
        assert_eq!(rule.map(|r| r.backend.to_string()).as_deref(), Some("wild:1"));
    }

    #[test]
    fn test_redirect_scheme_condition() {
        let table = table(
            r#"
            [[redirects]]
            hosts = ["opas.example.org"]
            when_scheme = "http"
            target_scheme = "https"
            target_host = "opas.example.org"
            "#,
        );
        let path = RequestPath::new("/kissa");
        assert!(table.lookup_redirect("opas.example.org", Scheme::Http, &path).is_some());
        assert!(table.lookup_redirect("opas.example.org", Scheme::Https, &path).is_none());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = GatewayConfig::default();
        config.redirects.push(RedirectConfig {
            hosts: vec!["a.example.org".into()],
            path_prefix: None,
            exact: false,
            when_scheme: None,
            target_scheme: Scheme::Https,
            target_host: "b.example.org/oops".into(),
            preserve_path: true,
        });
        let err = RuleTable::from_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }
}
