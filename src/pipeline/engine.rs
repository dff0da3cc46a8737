use std::collections::{BTreeSet, HashMap};
use std::io::Write;
use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use super::tasklog::TaskLog;
use super::tools::{ToolOutput, ToolRunner};
use crate::config::HiveConfig;
use crate::db::Database;
use crate::errors::HiveError;
use crate::models::{fingerprint, label_for, AssetKind, Finding, ProbeMeta, Severity, TaskStatus};
use crate::scope::{implicit_patterns, ScopeMatcher};
use crate::scoring::score_finding;

/// Counts carried into the terminal status note.
#[derive(Debug, Default)]
struct StageTotals {
    hosts: usize,
    urls: usize,
    findings: usize,
}

/// Runs one task's multi-stage recon/scan sequence: enumeration, resolution,
/// probing, crawling/historical mining, active scanning. Stages are strictly
/// ordered and non-skippable; each feeds the next through the accumulated
/// in-memory sets. Everything persisted passes the scope matcher first.
pub struct PipelineEngine {
    db: Database,
    tools: Arc<dyn ToolRunner>,
    config: HiveConfig,
}

impl PipelineEngine {
    pub fn new(db: Database, tools: Arc<dyn ToolRunner>, config: HiveConfig) -> Self {
        Self { db, tools, config }
    }

    /// Execute the pipeline for one claimed task. Whatever happens inside,
    /// the task ends in a terminal state: the error path records `error`
    /// durably before the fault propagates, so a fault in this process can
    /// never leave the task stuck `running`.
    pub async fn run(&self, task_id: &str, target: &str) -> Result<(), HiveError> {
        let log = match TaskLog::create(&self.config.log_dir, task_id).await {
            Ok(l) => Some(l),
            Err(e) => {
                warn!(task_id, error = %e, "Task log unavailable, continuing without");
                None
            }
        };

        let outcome = self.run_stages(task_id, target, log.as_ref()).await;
        match &outcome {
            Ok(totals) => {
                let note = format!(
                    "complete: {} hosts, {} urls, {} findings",
                    totals.hosts, totals.urls, totals.findings
                );
                self.db.set_status(task_id, TaskStatus::Done, &note)?;
                if let Some(l) = &log {
                    let _ = l.append(&note).await;
                }
                info!(task_id, target, hosts = totals.hosts, urls = totals.urls,
                      findings = totals.findings, "Pipeline complete");
            }
            Err(e) => {
                let note = format!("fault: {}", e);
                self.db.set_status(task_id, TaskStatus::Error, &note)?;
                if let Some(l) = &log {
                    let _ = l.append(&note).await;
                }
                warn!(task_id, target, error = %e, "Pipeline failed");
            }
        }

        if let Some(log) = &log {
            self.archive_log(task_id, log).await;
        }
        outcome.map(|_| ())
    }

    async fn run_stages(
        &self,
        task_id: &str,
        target: &str,
        log: Option<&TaskLog>,
    ) -> Result<StageTotals, HiveError> {
        let mut patterns = self.db.scope_patterns()?;
        if patterns.is_empty() {
            patterns = implicit_patterns(target);
        }
        let scope = ScopeMatcher::new(&patterns);
        let mut totals = StageTotals::default();

        // Stage 1: enumeration
        self.enter_stage(task_id, "enumeration", log).await?;
        let enumerated = self
            .tool("subfinder", &["-silent", "-d", target], None, log)
            .await;
        let candidates: BTreeSet<String> = lines_of(&enumerated.stdout);

        // Stage 2: resolution — only resolving names survive
        self.enter_stage(task_id, "resolution", log).await?;
        let hosts: BTreeSet<String> = if candidates.is_empty() {
            BTreeSet::new()
        } else {
            let joined = candidates.iter().cloned().collect::<Vec<_>>().join("\n");
            let resolved = self.tool("dnsx", &["-silent"], Some(&joined), log).await;
            lines_of(&resolved.stdout)
        };
        for host in &hosts {
            if scope.contains(host) && self.db.insert_asset(task_id, AssetKind::Host, host)? {
                totals.hosts += 1;
            }
        }

        // Stage 3: probing — rich metadata retained per URL for scoring
        self.enter_stage(task_id, "probing", log).await?;
        let mut urls: BTreeSet<String> = BTreeSet::new();
        let mut probes: HashMap<String, ProbeMeta> = HashMap::new();
        if !hosts.is_empty() {
            let joined = hosts.iter().cloned().collect::<Vec<_>>().join("\n");
            let probed = self
                .tool(
                    "httpx",
                    &[
                        "-silent",
                        "-json",
                        "-follow-host-redirects",
                        "-no-color",
                        "-ports",
                        &self.config.probe_ports,
                    ],
                    Some(&joined),
                    log,
                )
                .await;
            for line in probed.stdout.lines() {
                let Ok(value) = serde_json::from_str::<Value>(line) else { continue };
                let Some(meta) = ProbeMeta::from_json(value) else { continue };
                if scope.contains(&meta.url) {
                    if self.db.insert_asset(task_id, AssetKind::Url, &meta.url)? {
                        totals.urls += 1;
                    }
                    urls.insert(meta.url.clone());
                    probes.insert(meta.url.clone(), meta);
                }
            }
        }

        // Stage 4: crawling + historical URL mining
        self.enter_stage(task_id, "crawl/history", log).await?;
        if !urls.is_empty() {
            let joined = urls.iter().cloned().collect::<Vec<_>>().join("\n");
            let crawled = self
                .tool(
                    "katana",
                    &["-silent", "-jc", "-ef", "png,jpg,svg,css,woff,ico", "-d", "2", "-kf"],
                    Some(&joined),
                    log,
                )
                .await;
            for line in crawled.stdout.lines() {
                if let Some(url) = crawl_url_of(line) {
                    if scope.contains(&url) {
                        if self.db.insert_asset(task_id, AssetKind::Url, &url)? {
                            totals.urls += 1;
                        }
                        urls.insert(url);
                    }
                }
            }
        }
        let historical = [
            self.tool(
                "gau",
                &["--threads", "20", "--subs", "--providers", "wayback,commoncrawl,otx", target],
                None,
                log,
            )
            .await,
            self.tool("waybackurls", &[target], None, log).await,
        ];
        for output in &historical {
            for line in output.stdout.lines() {
                let url = line.trim();
                if url.starts_with("http") && scope.contains(url) {
                    if self.db.insert_asset(task_id, AssetKind::Url, url)? {
                        totals.urls += 1;
                    }
                    urls.insert(url.to_string());
                }
            }
        }

        // Stage 5: active scanning over the accumulated in-scope URL set
        self.enter_stage(task_id, "active-scan", log).await?;
        let mut list = tempfile::NamedTempFile::new()?;
        for url in &urls {
            writeln!(list, "{}", url)?;
        }
        list.flush()?;
        let list_path = list.path().to_string_lossy().to_string();
        let templates = self.config.templates_dir.to_string_lossy().to_string();
        let custom = self.config.custom_templates_dir.to_string_lossy().to_string();
        let scanned = self
            .tool(
                "nuclei",
                &[
                    "-silent",
                    "-jsonl",
                    "-rate-limit",
                    "200",
                    "-retry",
                    "1",
                    "-templates",
                    &templates,
                    "-templates",
                    &custom,
                    "-list",
                    &list_path,
                ],
                None,
                log,
            )
            .await;

        for line in scanned.stdout.lines() {
            let Ok(value) = serde_json::from_str::<Value>(line) else { continue };
            if let Some(finding) = self.finding_of(task_id, &value, &scope, &probes) {
                if self.db.insert_finding(&finding)? {
                    totals.findings += 1;
                }
            }
        }

        Ok(totals)
    }

    /// Build a finding from one active-scan result line. Returns None when
    /// the matched location is empty or out of scope — such results are
    /// discarded, never persisted.
    fn finding_of(
        &self,
        task_id: &str,
        value: &Value,
        scope: &ScopeMatcher,
        probes: &HashMap<String, ProbeMeta>,
    ) -> Option<Finding> {
        let info = value.get("info");
        let name = info
            .and_then(|i| i.get("name"))
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();
        let severity = Severity::parse(
            info.and_then(|i| i.get("severity"))
                .and_then(Value::as_str)
                .unwrap_or("info"),
        );
        let matched = value
            .get("matched-at")
            .or_else(|| value.get("host"))
            .or_else(|| value.get("url"))
            .and_then(Value::as_str)
            .unwrap_or("");
        if matched.is_empty() || !scope.contains(matched) {
            return None;
        }

        let tags: Vec<String> = match info.and_then(|i| i.get("tags")) {
            Some(Value::Array(a)) => a
                .iter()
                .filter_map(Value::as_str)
                .map(|s| s.to_string())
                .collect(),
            Some(Value::String(s)) => s.split(',').map(|s| s.trim().to_string()).collect(),
            _ => Vec::new(),
        };
        let template_id = value
            .get("template-id")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();

        let (score, reasons) = score_finding(severity, &tags, matched, probes.get(matched));
        Some(Finding {
            task_id: task_id.to_string(),
            tool: "nuclei".to_string(),
            fingerprint: fingerprint(&template_id, matched),
            title: name,
            detail: matched.to_string(),
            severity,
            label: label_for(severity).to_string(),
            raw: value.clone(),
            score,
            reasons,
        })
    }

    /// Push the stage label into the task record (visible live progress,
    /// refreshes the heartbeat) and mirror it to the task log.
    async fn enter_stage(
        &self,
        task_id: &str,
        stage: &str,
        log: Option<&TaskLog>,
    ) -> Result<(), HiveError> {
        self.db.set_status(task_id, TaskStatus::Running, stage)?;
        if let Some(l) = log {
            let _ = l.append(&format!("stage: {}", stage)).await;
        }
        info!(task_id, stage, "Stage started");
        Ok(())
    }

    /// Invoke one collaborator, tolerating every failure mode: a spawn
    /// error, a non-zero exit, or stderr noise is logged and the stage
    /// continues with whatever partial stdout exists.
    async fn tool(
        &self,
        program: &str,
        args: &[&str],
        stdin: Option<&str>,
        log: Option<&TaskLog>,
    ) -> ToolOutput {
        let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        let output = match self.tools.run(program, &args, stdin).await {
            Ok(out) => out,
            Err(e) => {
                warn!(program, error = %e, "Collaborator invocation failed, continuing");
                if let Some(l) = log {
                    let _ = l.append(&format!("{}: invocation failed: {}", program, e)).await;
                }
                return ToolOutput::default();
            }
        };
        if let Some(code) = output.exit_code {
            if code != 0 {
                warn!(program, code, "Collaborator exited non-zero, using partial output");
            }
        }
        if let Some(l) = log {
            if !output.stderr.trim().is_empty() {
                let _ = l.append(&format!("{} stderr: {}", program, output.stderr.trim())).await;
            }
        }
        output
    }

    /// Hand the finished task log to the archival collaborator, if one is
    /// configured. Archival failure is advisory only.
    async fn archive_log(&self, task_id: &str, log: &TaskLog) {
        let Some(cmd) = &self.config.archive_cmd else { return };
        let args = vec![
            task_id.to_string(),
            log.path().to_string_lossy().to_string(),
        ];
        match self.tools.run(cmd, &args, None).await {
            Ok(out) if out.exit_code == Some(0) => {
                info!(task_id, "Task log archived");
            }
            Ok(out) => {
                warn!(task_id, code = ?out.exit_code, "Log archival exited non-zero");
            }
            Err(e) => {
                warn!(task_id, error = %e, "Log archival failed");
            }
        }
    }
}

fn lines_of(stdout: &str) -> BTreeSet<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

/// Extract a URL from one crawler output line: JSON with either a raw
/// `request` string ("GET https://…"), a `url`, or a `source` field.
/// Malformed lines yield None and are skipped, not fatal.
fn crawl_url_of(line: &str) -> Option<String> {
    let value: Value = serde_json::from_str(line).ok()?;
    if let Some(req) = value.get("request").and_then(Value::as_str) {
        return req.split_whitespace().nth(1).map(str::to_string);
    }
    value
        .get("url")
        .or_else(|| value.get("source"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lines_of_trims_and_drops_blanks() {
        let set = lines_of("a.example.com\n\n  b.example.com  \n");
        assert_eq!(set.len(), 2);
        assert!(set.contains("b.example.com"));
    }

    #[test]
    fn test_crawl_url_of_variants() {
        assert_eq!(
            crawl_url_of(r#"{"request":"GET https://a.example.com/x HTTP/1.1"}"#),
            Some("https://a.example.com/x".to_string())
        );
        assert_eq!(
            crawl_url_of(r#"{"url":"https://b.example.com/"}"#),
            Some("https://b.example.com/".to_string())
        );
        assert_eq!(
            crawl_url_of(r#"{"source":"https://c.example.com/"}"#),
            Some("https://c.example.com/".to_string())
        );
        assert_eq!(crawl_url_of("not json"), None);
    }
}
