//! Match patterns
//!
//! The blocklist is expressed in the host's match-pattern grammar:
//! `<all_urls>` or `scheme://host/path`. Matching is exact or wildcard-glob
//! only; there is no regex or filter-list syntax.

use crate::error::PatternError;
use crate::types::SchemeMask;
use crate::url::{extract_host, extract_path_and_query, extract_scheme, scheme_from_name};

pub const ALL_URLS: &str = "<all_urls>";

/// Prefix the host's wildcard scheme matcher uses. It does not cover
/// `ws://` or `wss://`.
pub const WILDCARD_SCHEME_PREFIX: &str = "*://";

#[derive(Debug, Clone, PartialEq, Eq)]
enum HostPattern {
    Any,
    /// `*.example.com`: the domain itself and every subdomain
    Suffix(String),
    Exact(String),
}

/// A validated match pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchPattern {
    source: String,
    schemes: SchemeMask,
    host: HostPattern,
    path: String,
}

impl MatchPattern {
    pub fn parse(pattern: &str) -> Result<Self, PatternError> {
        let source = pattern.trim();
        if source == ALL_URLS {
            return Ok(Self {
                source: source.to_string(),
                schemes: SchemeMask::ALL,
                host: HostPattern::Any,
                path: "/*".to_string(),
            });
        }

        let (scheme, rest) = source
            .split_once("://")
            .ok_or_else(|| PatternError::MissingScheme(source.to_string()))?;

        let schemes = if scheme == "*" {
            SchemeMask::WILDCARD
        } else {
            scheme_from_name(scheme)
                .ok_or_else(|| PatternError::UnsupportedScheme(scheme.to_string()))?
        };

        let (host, path) = match rest.find('/') {
            Some(pos) => (&rest[..pos], &rest[pos..]),
            None => return Err(PatternError::MissingPath(source.to_string())),
        };

        let host = if host == "*" {
            HostPattern::Any
        } else if let Some(domain) = host.strip_prefix("*.") {
            if domain.is_empty() || domain.contains('*') {
                return Err(PatternError::InvalidHost(host.to_string()));
            }
            HostPattern::Suffix(domain.to_ascii_lowercase())
        } else if host.contains('*') || host.contains(':') {
            return Err(PatternError::InvalidHost(host.to_string()));
        } else if host.is_empty() && schemes != SchemeMask::FILE {
            return Err(PatternError::InvalidHost(host.to_string()));
        } else {
            HostPattern::Exact(host.to_ascii_lowercase())
        };

        Ok(Self {
            source: source.to_string(),
            schemes,
            host,
            path: path.to_string(),
        })
    }

    /// The pattern text as configured.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn matches(&self, url: &str) -> bool {
        let scheme = match extract_scheme(url) {
            Some(scheme) => scheme,
            None => return false,
        };
        if !self.schemes.intersects(scheme) {
            return false;
        }

        // data: URLs carry no host; only <all_urls> and data:// patterns get here
        if scheme == SchemeMask::DATA {
            return self.host == HostPattern::Any;
        }

        let host = extract_host(url).unwrap_or("");
        let host_ok = match &self.host {
            HostPattern::Any => true,
            HostPattern::Exact(expected) => host.eq_ignore_ascii_case(expected),
            HostPattern::Suffix(domain) => {
                host.eq_ignore_ascii_case(domain)
                    || (host.len() > domain.len()
                        && host.as_bytes()[host.len() - domain.len() - 1] == b'.'
                        && host[host.len() - domain.len()..].eq_ignore_ascii_case(domain))
            }
        };

        host_ok && glob_match(&self.path, extract_path_and_query(url))
    }
}

/// Glob match where `*` matches any run of characters, including none.
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let p = pattern.as_bytes();
    let t = text.as_bytes();
    let (mut pi, mut ti) = (0usize, 0usize);
    let mut star: Option<(usize, usize)> = None;

    while ti < t.len() {
        if pi < p.len() && p[pi] == b'*' {
            star = Some((pi, ti));
            pi += 1;
        } else if pi < p.len() && p[pi] == t[ti] {
            pi += 1;
            ti += 1;
        } else if let Some((star_pi, star_ti)) = star {
            pi = star_pi + 1;
            ti = star_ti + 1;
            star = Some((star_pi, star_ti + 1));
        } else {
            return false;
        }
    }

    p[pi..].iter().all(|&b| b == b'*')
}

/// Explicit `ws://` and `wss://` equivalents of every wildcard-scheme pattern.
///
/// `*://tracker.example/*` yields `ws://tracker.example/*` and
/// `wss://tracker.example/*`; patterns with an explicit scheme yield nothing.
pub fn websocket_patterns<S: AsRef<str>>(patterns: &[S]) -> Vec<String> {
    let mut out = Vec::new();
    for pattern in patterns {
        if let Some(rest) = pattern.as_ref().trim().strip_prefix(WILDCARD_SCHEME_PREFIX) {
            out.push(format!("ws://{rest}"));
            out.push(format!("wss://{rest}"));
        }
    }
    out
}

/// Parse every pattern, keeping the valid ones and returning the rejected
/// ones with their error.
pub fn compile_patterns<S: AsRef<str>>(
    patterns: &[S],
) -> (Vec<MatchPattern>, Vec<PatternError>) {
    let mut valid = Vec::with_capacity(patterns.len());
    let mut rejected = Vec::new();
    for pattern in patterns {
        match MatchPattern::parse(pattern.as_ref()) {
            Ok(parsed) => valid.push(parsed),
            Err(e) => rejected.push(e),
        }
    }
    (valid, rejected)
}

// =============================================================================
// Blocklist Files
// =============================================================================

/// A line of a blocklist file that could not be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedLine {
    pub line: usize,
    pub error: PatternError,
}

/// Parse a plain-text blocklist: one pattern per line, `#` and `!` comments.
/// Duplicates are dropped, first occurrence wins.
pub fn parse_blocklist(text: &str) -> (Vec<String>, Vec<RejectedLine>) {
    let mut patterns: Vec<String> = Vec::new();
    let mut rejected = Vec::new();

    for (idx, raw_line) in text.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
            continue;
        }

        match MatchPattern::parse(line) {
            Ok(parsed) => {
                if !patterns.iter().any(|p| p == parsed.as_str()) {
                    patterns.push(parsed.as_str().to_string());
                }
            }
            Err(error) => rejected.push(RejectedLine {
                line: idx + 1,
                error,
            }),
        }
    }

    (patterns, rejected)
}
