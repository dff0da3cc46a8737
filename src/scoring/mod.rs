//! Explainable triage scoring for findings.
//!
//! Pure additive rule set evaluated in a fixed order, so identical inputs
//! always produce the identical score and the identical `reasons` trail.
//! The score is advisory triage for the UI, not a security verdict.

use crate::models::{ProbeMeta, Severity};

/// Tag boosts, evaluated in order. Each entry fires at most once when any of
/// its markers appears (case-insensitive containment) in the tag list.
const TAG_RULES: &[(&[&str], i32)] = &[
    (&["takeover"], 30),
    (&["exposure"], 12),
    (&["misconfig"], 8),
    (&["default-cred", "weak-auth"], 10),
];

/// Sensitive URL-path fragments, checked in order; first match only.
const SENSITIVE_PATHS: &[&str] = &[
    ".git",
    ".svn",
    ".env",
    "wp-config",
    "config.json",
    "config.yml",
    "backup",
    ".bak",
    "dump.sql",
    "phpmyadmin",
    "admin",
    "console",
    "actuator",
    "server-status",
];

/// Sensitive query-parameter names; each present name adds its boost.
const SENSITIVE_PARAMS: &[&str] = &[
    "token",
    "key",
    "secret",
    "redirect",
    "redirect_uri",
    "callback",
    "access_token",
    "jwt",
    "api_key",
    "auth",
    "sig",
];

/// Environment words in the hostname. Dev-like wins over prod-like.
const DEV_WORDS: &[&str] = &[
    "dev", "staging", "stage", "test", "qa", "uat", "sandbox", "demo", "preprod",
];
const PROD_WORDS: &[&str] = &["prod", "production", "live"];

const NOTABLE_STATUS: &[i64] = &[401, 403, 405, 500];

const API_TITLES: &[&str] = &["swagger", "openapi", "graphql"];

const ADMIN_TITLES: &[&str] = &[
    "grafana", "kibana", "jenkins", "phpmyadmin", "adminer", "traefik", "airflow", "minio",
];

const STORAGE_TECH: &[&str] = &["s3", "minio", "object storage", "cloud storage"];

fn split_url(matched: &str) -> (String, String, String) {
    let lower = matched.to_ascii_lowercase();
    let without_scheme = lower
        .strip_prefix("https://")
        .or_else(|| lower.strip_prefix("http://"))
        .unwrap_or(&lower);
    let (host_port, rest) = match without_scheme.find('/') {
        Some(i) => (&without_scheme[..i], &without_scheme[i..]),
        None => (without_scheme, ""),
    };
    let host = host_port.split(':').next().unwrap_or(host_port).to_string();
    let (path, query) = match rest.find('?') {
        Some(i) => (rest[..i].to_string(), rest[i + 1..].to_string()),
        None => (rest.to_string(), String::new()),
    };
    (host, path, query)
}

/// Score one finding. `tags` come from the scanner's check metadata,
/// `matched` is the location the check fired on, and `probe` is whatever the
/// probing stage recorded for that exact URL, if anything.
pub fn score_finding(
    severity: Severity,
    tags: &[String],
    matched: &str,
    probe: Option<&ProbeMeta>,
) -> (i64, Vec<String>) {
    let mut score: i32 = 0;
    let mut reasons = Vec::new();
    let add = |s: &mut i32, r: &mut Vec<String>, tag: String, n: i32| {
        *s += n;
        r.push(format!("{}(+{})", tag, n));
    };

    let base = severity.base_score();
    if base > 0 {
        add(&mut score, &mut reasons, format!("severity:{}", severity), base);
    }

    let tag_blob = tags.join(",").to_ascii_lowercase();
    for (markers, boost) in TAG_RULES {
        if let Some(hit) = markers.iter().find(|m| tag_blob.contains(**m)) {
            add(&mut score, &mut reasons, format!("tag:{}", hit), *boost);
        }
    }

    let (host, path, query) = split_url(matched);

    if let Some(frag) = SENSITIVE_PATHS.iter().find(|f| path.contains(**f)) {
        add(&mut score, &mut reasons, format!("path:{}", frag), 15);
    }

    if !query.is_empty() {
        let mut seen = Vec::new();
        for pair in query.split('&') {
            let name = pair.split('=').next().unwrap_or("");
            if SENSITIVE_PARAMS.contains(&name) && !seen.contains(&name) {
                seen.push(name);
                add(&mut score, &mut reasons, format!("param:{}", name), 6);
            }
        }
    }

    if let Some(word) = DEV_WORDS.iter().find(|w| host.contains(**w)) {
        add(&mut score, &mut reasons, format!("host:{}", word), 8);
    } else if let Some(word) = PROD_WORDS.iter().find(|w| host.contains(**w)) {
        add(&mut score, &mut reasons, format!("host:{}", word), 4);
    }

    if let Some(meta) = probe {
        let title = meta
            .title
            .as_deref()
            .map(|t| t.to_ascii_lowercase())
            .unwrap_or_default();
        let dir_listing = title.contains("index of");
        if dir_listing {
            add(&mut score, &mut reasons, "probe:dir-listing".into(), 12);
        }
        if let Some(code) = meta.status_code {
            if NOTABLE_STATUS.contains(&code) {
                add(&mut score, &mut reasons, format!("probe:status-{}", code), 3);
            }
        }
        if API_TITLES.iter().any(|t| title.contains(*t)) {
            add(&mut score, &mut reasons, "probe:api-surface".into(), 10);
        }
        if ADMIN_TITLES.iter().any(|t| title.contains(*t)) {
            add(&mut score, &mut reasons, "probe:admin-tool".into(), 10);
        }
        if let Some(len) = meta.content_length {
            if (1..=300).contains(&len) {
                add(&mut score, &mut reasons, "probe:tiny-body".into(), 4);
            } else if len >= 2_000_000 {
                add(&mut score, &mut reasons, "probe:huge-body".into(), 4);
            }
        }
        let tech_blob = meta.tech.join(",").to_ascii_lowercase();
        if STORAGE_TECH.iter().any(|t| tech_blob.contains(*t)) {
            add(&mut score, &mut reasons, "probe:object-storage".into(), 6);
        }
        if meta.webserver.is_some() && dir_listing {
            add(&mut score, &mut reasons, "probe:open-dir-server".into(), 8);
        }
    }

    (score.clamp(0, 100) as i64, reasons)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tags(t: &[&str]) -> Vec<String> {
        t.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_critical_takeover_clamps_to_100() {
        let (score, reasons) = score_finding(
            Severity::Critical,
            &tags(&["takeover"]),
            "https://cname.example.com",
            None,
        );
        assert_eq!(score, 100);
        assert_eq!(reasons, vec!["severity:critical(+90)", "tag:takeover(+30)"]);
    }

    #[test]
    fn test_deterministic_reason_order() {
        let meta = ProbeMeta::from_json(json!({
            "url": "https://dev.example.com/.git/config",
            "status_code": 403,
            "content_length": 42,
            "title": "Index of /.git",
            "webserver": "nginx"
        }))
        .unwrap();
        let run = || {
            score_finding(
                Severity::Medium,
                &tags(&["exposure", "misconfig"]),
                "https://dev.example.com/.git/config?token=abc",
                Some(&meta),
            )
        };
        let (s1, r1) = run();
        let (s2, r2) = run();
        assert_eq!(s1, s2);
        assert_eq!(r1, r2);
        assert_eq!(
            r1,
            vec![
                "severity:medium(+45)",
                "tag:exposure(+12)",
                "tag:misconfig(+8)",
                "path:.git(+15)",
                "param:token(+6)",
                "host:dev(+8)",
                "probe:dir-listing(+12)",
                "probe:status-403(+3)",
                "probe:tiny-body(+4)",
                "probe:open-dir-server(+8)",
            ]
        );
        // 45+12+8+15+6+8+12+3+4+8 = 121, clamped
        assert_eq!(s1, 100);
    }

    #[test]
    fn test_unknown_severity_scores_zero_base() {
        let (score, reasons) = score_finding(Severity::Unknown, &[], "https://example.com", None);
        assert_eq!(score, 0);
        assert!(reasons.is_empty());
    }

    #[test]
    fn test_env_boosts_mutually_exclusive() {
        // "preprod" contains both a dev word and "prod"; dev-like wins.
        let (_, reasons) =
            score_finding(Severity::Info, &[], "https://preprod.example.com/x", None);
        assert!(reasons.contains(&"host:preprod(+8)".to_string()));
        assert!(!reasons.iter().any(|r| r.starts_with("host:prod(")));
    }

    #[test]
    fn test_param_boosts_cumulative() {
        let (score, reasons) = score_finding(
            Severity::Low,
            &[],
            "https://a.example.com/cb?redirect=1&token=2&token=3&page=4",
            None,
        );
        // 20 + 6 + 6: duplicate names count once, unknown names not at all
        assert_eq!(score, 32);
        assert_eq!(
            reasons,
            vec!["severity:low(+20)", "param:redirect(+6)", "param:token(+6)"]
        );
    }

    #[test]
    fn test_path_boost_first_match_only() {
        let (score, reasons) = score_finding(
            Severity::Info,
            &[],
            "https://a.example.com/.git/backup/admin",
            None,
        );
        assert_eq!(score, 5 + 15);
        assert_eq!(reasons, vec!["severity:info(+5)", "path:.git(+15)"]);
    }

    #[test]
    fn test_probe_absent_means_no_probe_reasons() {
        let (_, reasons) = score_finding(Severity::High, &[], "https://a.example.com", None);
        assert!(!reasons.iter().any(|r| r.starts_with("probe:")));
    }

    #[test]
    fn test_score_never_negative() {
        let (score, _) = score_finding(Severity::Unknown, &[], "x", None);
        assert_eq!(score, 0);
    }
}
