//! pytest execution and JUnit result collection
//!
//! Each run gets `runs/run_<id>/` holding `run.log` (combined stdout/stderr)
//! and `results.xml` (pytest `--junitxml`).

use once_cell::sync::Lazy;
use regex_lite::Regex;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, info, warn};

use vv_common::storage::{JUNIT_XML, RUN_LOG};
use vv_common::{Error, ExecutionConfig, Outcome, Result, Storage};

/// What a pytest invocation produced
#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    /// pytest exit code; `None` when killed or terminated by a signal
    pub exit_code: Option<i32>,
    pub timed_out: bool,
    pub duration_ms: u64,
    pub junit_path: PathBuf,
    pub log_path: PathBuf,
    /// Parsed JUnit report, when pytest wrote one
    pub report: Option<JunitReport>,
}

impl ExecutionOutcome {
    pub fn succeeded(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }
}

#[derive(Debug, Clone)]
pub struct ExecutionService {
    storage: Storage,
    python: String,
    timeout: Duration,
}

impl ExecutionService {
    pub fn new(storage: Storage, config: &ExecutionConfig) -> Self {
        Self {
            storage,
            python: config.python.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    /// Run `<python> -m pytest -q --junitxml=<run_dir>/results.xml <scripts…>`
    pub async fn run_scripts(&self, run_id: i64, script_paths: &[PathBuf]) -> Result<ExecutionOutcome> {
        let run_dir = self.storage.run_dir(run_id)?;
        let junit_path = run_dir.join(JUNIT_XML);
        let log_path = run_dir.join(RUN_LOG);

        let log = std::fs::File::create(&log_path)?;
        let log_err = log.try_clone()?;

        let mut cmd = Command::new(&self.python);
        cmd.arg("-m")
            .arg("pytest")
            .arg("-q")
            .arg(format!("--junitxml={}", junit_path.display()))
            .args(script_paths)
            .stdin(Stdio::null())
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(log_err))
            .kill_on_drop(true);

        info!("Run {}: executing {} script(s)", run_id, script_paths.len());
        debug!("Run {}: {:?}", run_id, cmd);

        let start = Instant::now();
        let mut child = cmd
            .spawn()
            .map_err(|e| Error::Execution(format!("failed to start {}: {}", self.python, e)))?;

        let (exit_code, timed_out) = match tokio::time::timeout(self.timeout, child.wait()).await {
            Ok(status) => (status?.code(), false),
            Err(_) => {
                warn!("Run {}: timed out after {}s, killing pytest", run_id, self.timeout.as_secs());
                let _ = child.kill().await;
                append_log_line(
                    &log_path,
                    &format!("Run timed out after {}s and was terminated", self.timeout.as_secs()),
                )
                .await;
                (None, true)
            }
        };
        let duration_ms = start.elapsed().as_millis() as u64;

        let report = match tokio::fs::read_to_string(&junit_path).await {
            Ok(xml) => Some(JunitReport::parse(&xml)),
            Err(_) => None,
        };

        info!(
            "Run {}: pytest finished with exit code {:?} in {}ms",
            run_id, exit_code, duration_ms
        );

        Ok(ExecutionOutcome {
            exit_code,
            timed_out,
            duration_ms,
            junit_path,
            log_path,
            report,
        })
    }
}

async fn append_log_line(path: &Path, line: &str) {
    use tokio::io::AsyncWriteExt;
    if let Ok(mut file) = tokio::fs::OpenOptions::new().append(true).open(path).await {
        let _ = file.write_all(format!("\n{}\n", line).as_bytes()).await;
    }
}

// ============================================================================
// JUnit XML
// ============================================================================

static CASE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<testcase\b([^>]*?)(?:/>|>(.*?)</testcase>)").expect("static regex")
});
static CHILD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<(failure|error|skipped)\b([^>]*?)(?:/>|>)").expect("static regex")
});
static ATTR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"([A-Za-z_][\w.-]*)\s*=\s*"([^"]*)""#).expect("static regex")
});

/// One `<testcase>` element
#[derive(Debug, Clone, PartialEq)]
pub struct JunitCase {
    pub classname: String,
    pub name: String,
    pub file: Option<String>,
    pub time_ms: Option<i64>,
    pub outcome: Outcome,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct JunitReport {
    pub cases: Vec<JunitCase>,
}

/// Outcome of one script derived from its testcases
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptVerdict {
    pub outcome: Outcome,
    pub duration_ms: Option<i64>,
    pub message: Option<String>,
}

impl JunitReport {
    /// Lenient parse of pytest's JUnit XML; unreadable input yields no cases
    pub fn parse(xml: &str) -> Self {
        let cases = CASE_RE
            .captures_iter(xml)
            .map(|cap| {
                let attrs = parse_attributes(cap.get(1).map_or("", |m| m.as_str()));
                let body = cap.get(2).map_or("", |m| m.as_str());

                let mut outcome = Outcome::Passed;
                let mut message = None;
                for child in CHILD_RE.captures_iter(body) {
                    let kind = match &child[1] {
                        "error" => Outcome::Error,
                        "failure" => Outcome::Failed,
                        _ => Outcome::Skipped,
                    };
                    if rank(kind) > rank(outcome) {
                        outcome = kind;
                        message = parse_attributes(&child[2])
                            .into_iter()
                            .find(|(k, _)| k == "message")
                            .map(|(_, v)| v);
                    }
                }

                let get = |key: &str| {
                    attrs
                        .iter()
                        .find(|(k, _)| k == key)
                        .map(|(_, v)| v.clone())
                };
                JunitCase {
                    classname: get("classname").unwrap_or_default(),
                    name: get("name").unwrap_or_default(),
                    file: get("file"),
                    time_ms: get("time")
                        .and_then(|t| t.parse::<f64>().ok())
                        .map(|secs| (secs * 1000.0).round() as i64),
                    outcome,
                    message,
                }
            })
            .collect();

        Self { cases }
    }

    /// Testcases that came from the given script file.
    ///
    /// Matches on the `tc_<id>` directory plus module stem appearing in the
    /// dotted classname, or on the `file` attribute when pytest recorded it.
    /// Collection errors carry an empty classname and the dotted module path
    /// in `name`.
    pub fn cases_for_script(&self, script_path: &Path) -> Vec<&JunitCase> {
        let stem = script_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let dir = script_path
            .parent()
            .and_then(|p| p.file_name())
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let file_suffix = format!("{}/{}.py", dir, stem);

        self.cases
            .iter()
            .filter(|case| {
                if let Some(file) = &case.file {
                    if file.replace('\\', "/").ends_with(&file_suffix) {
                        return true;
                    }
                }
                let dotted = if case.classname.is_empty() {
                    &case.name
                } else {
                    &case.classname
                };
                let segments: Vec<&str> = dotted.split('.').collect();
                segments.windows(2).any(|w| w[0] == dir && w[1] == stem)
            })
            .collect()
    }

    /// Combine a script's testcases: error beats failure beats pass; a
    /// script whose cases were all skipped is skipped.
    pub fn verdict_for_script(&self, script_path: &Path) -> Option<ScriptVerdict> {
        let cases = self.cases_for_script(script_path);
        if cases.is_empty() {
            return None;
        }

        let outcome = if cases.iter().any(|c| c.outcome == Outcome::Error) {
            Outcome::Error
        } else if cases.iter().any(|c| c.outcome == Outcome::Failed) {
            Outcome::Failed
        } else if cases.iter().all(|c| c.outcome == Outcome::Skipped) {
            Outcome::Skipped
        } else {
            Outcome::Passed
        };

        let duration_ms = cases
            .iter()
            .filter_map(|c| c.time_ms)
            .reduce(|a, b| a + b);

        let message = cases
            .iter()
            .filter(|c| c.outcome == outcome)
            .find_map(|c| c.message.clone());

        Some(ScriptVerdict {
            outcome,
            duration_ms,
            message,
        })
    }
}

fn rank(outcome: Outcome) -> u8 {
    match outcome {
        Outcome::Error => 3,
        Outcome::Failed => 2,
        Outcome::Skipped => 1,
        _ => 0,
    }
}

fn parse_attributes(raw: &str) -> Vec<(String, String)> {
    ATTR_RE
        .captures_iter(raw)
        .map(|c| (c[1].to_string(), unescape_xml(&c[2])))
        .collect()
}

fn unescape_xml(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&#10;", "\n")
        .replace("&amp;", "&")
}
