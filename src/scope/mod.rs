//! Wildcard-domain scope matching.
//!
//! Everything discovered by the pipeline passes through this check before it
//! is persisted; candidates rejected here are silently dropped, never stored
//! as "out of scope". Matching is deliberately permissive: a candidate is in
//! scope if it matches the pattern as a glob OR if it is a subdomain of the
//! pattern with its wildcard prefix stripped.

use regex::Regex;

/// A set of wildcard patterns with their glob regexes compiled once.
pub struct ScopeMatcher {
    entries: Vec<ScopeEntry>,
}

struct ScopeEntry {
    /// Bare domain: the pattern with leading `*` / `.` characters removed.
    bare: String,
    glob: Option<Regex>,
}

/// Build the glob regex for one pattern: `*.` matches one or more leading
/// labels, any other `*` matches a run of non-dot characters.
fn glob_regex(pattern: &str) -> Option<Regex> {
    let escaped = regex::escape(pattern)
        .replace(r"\*\.", r"(?:[^.]+\.)")
        .replace(r"\*", r"[^.]*");
    Regex::new(&format!("^{}$", escaped)).ok()
}

/// Reduce a URL or host to a lowercase hostname.
fn host_of(candidate: &str) -> String {
    let mut host = candidate;
    if let Some(rest) = host.strip_prefix("https://").or_else(|| host.strip_prefix("http://")) {
        host = rest;
    }
    let host = host.split('/').next().unwrap_or(host);
    let host = host.split(':').next().unwrap_or(host);
    host.to_ascii_lowercase()
}

impl ScopeMatcher {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let entries = patterns
            .into_iter()
            .map(|p| {
                let p = p.as_ref().to_ascii_lowercase();
                ScopeEntry {
                    bare: p.trim_start_matches(['*', '.']).to_string(),
                    glob: glob_regex(&p),
                }
            })
            .collect();
        Self { entries }
    }

    /// True when the candidate host (or URL) falls inside any pattern.
    pub fn contains(&self, candidate: &str) -> bool {
        let host = host_of(candidate);
        self.entries.iter().any(|e| {
            if let Some(re) = &e.glob {
                if re.is_match(&host) {
                    return true;
                }
            }
            !e.bare.is_empty() && host.ends_with(&format!(".{}", e.bare))
        })
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The single implicit pattern trusted when no scope entries exist: the
/// task's own target widened to `*.<target>` (bare target when it has no dot).
pub fn implicit_patterns(target: &str) -> Vec<String> {
    if target.contains('.') {
        vec![format!("*.{}", target)]
    } else {
        vec![target.to_string()]
    }
}

/// One-shot form of [`ScopeMatcher::contains`].
pub fn in_scope(candidate: &str, patterns: &[String]) -> bool {
    ScopeMatcher::new(patterns).contains(candidate)
}
