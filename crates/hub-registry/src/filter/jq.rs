//! Filter evaluation through the external `jq` binary.
//!
//! Records are piped on stdin as JSON Lines and `jq -c <expr>` output is read
//! back one value per line. The call runs on a private current-thread tokio
//! runtime so that it can be bounded by a timeout while the rest of the
//! registry stays synchronous.

use std::process::Stdio;
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use super::RecordFilter;
use crate::errors::FilterError;

/// Install hint shown when the binary cannot be spawned.
pub const JQ_REMEDY: &str = "brew install jq (macOS) or apt install jq (Linux)";

/// Shells out to `jq`.
#[derive(Clone, Debug)]
pub struct JqFilter {
    program: String,
    timeout: Duration,
}

impl Default for JqFilter {
    fn default() -> Self {
        Self::new("jq", Duration::from_secs(10))
    }
}

impl JqFilter {
    /// Filter running `program` with an upper bound of `timeout` per call.
    #[must_use]
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    /// Check that the binary can be spawned, without evaluating anything.
    pub fn probe(&self) -> Result<(), FilterError> {
        match std::process::Command::new(&self.program)
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
        {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(FilterError::EvaluatorMissing {
                    program: self.program.clone(),
                    remedy: JQ_REMEDY,
                })
            }
            Err(e) => Err(FilterError::Io(e)),
        }
    }

    fn timeout_ms(&self) -> u64 {
        u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX)
    }

    async fn evaluate(&self, input: Vec<u8>, expression: &str) -> Result<Vec<u8>, FilterError> {
        let mut cmd = tokio::process::Command::new(&self.program);
        let _ = cmd
            .arg("-c")
            .arg(expression)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                FilterError::EvaluatorMissing {
                    program: self.program.clone(),
                    remedy: JQ_REMEDY,
                }
            } else {
                FilterError::Io(e)
            }
        })?;

        // A filter that exits early closes the pipe; that is not an error.
        if let Some(mut stdin) = child.stdin.take() {
            let _writer = tokio::spawn(async move {
                let _ = stdin.write_all(&input).await;
                let _ = stdin.shutdown().await;
            });
        }

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(output) => output?,
            Err(_) => {
                warn!(program = %self.program, timeout_ms = self.timeout_ms(), "filter timed out");
                return Err(FilterError::Timeout {
                    timeout_ms: self.timeout_ms(),
                });
            }
        };

        if !output.status.success() {
            return Err(FilterError::Failed {
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(output.stdout)
    }
}

impl RecordFilter for JqFilter {
    fn name(&self) -> &'static str {
        "jq"
    }

    fn filter(&self, records: Vec<Value>, expression: &str) -> Result<Vec<Value>, FilterError> {
        let start = Instant::now();
        let mut input = Vec::new();
        for record in &records {
            serde_json::to_writer(&mut input, record)?;
            input.push(b'\n');
        }

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_io()
            .enable_time()
            .build()?;
        let stdout = runtime.block_on(self.evaluate(input, expression))?;

        let mut out = Vec::new();
        for line in String::from_utf8_lossy(&stdout).lines() {
            if line.trim().is_empty() {
                continue;
            }
            out.push(serde_json::from_str(line)?);
        }
        debug!(
            inputs = records.len(),
            outputs = out.len(),
            elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            "jq filter applied"
        );
        Ok(out)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn jq_available() -> bool {
        std::process::Command::new("jq")
            .arg("--version")
            .output()
            .is_ok_and(|o| o.status.success())
    }

    #[cfg(unix)]
    fn script(dir: &tempfile::TempDir, body: &str) -> String {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.path().join("fake-jq");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn missing_binary_is_configuration_error() {
        let filter = JqFilter::new("definitely-not-a-jq-binary", Duration::from_secs(1));
        let err = filter.filter(vec![json!({})], ".").unwrap_err();
        assert_matches!(err, FilterError::EvaluatorMissing { ref program, .. } if program == "definitely-not-a-jq-binary");
        assert!(err.is_configuration());
        assert_matches!(filter.probe(), Err(FilterError::EvaluatorMissing { .. }));
    }

    #[test]
    fn real_jq_selects() {
        if !jq_available() {
            return;
        }
        let records = vec![json!({"evt": "a", "n": 1}), json!({"evt": "b", "n": 2})];
        let out = JqFilter::default()
            .filter(records, r#"select(.evt == "b") | .n"#)
            .unwrap();
        assert_eq!(out, vec![json!(2)]);
    }

    #[test]
    fn real_jq_reports_bad_expression() {
        if !jq_available() {
            return;
        }
        let err = JqFilter::default().filter(vec![json!({})], "select(").unwrap_err();
        assert_matches!(err, FilterError::Failed { .. });
    }

    #[cfg(unix)]
    #[test]
    fn slow_filter_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let program = script(&dir, "sleep 5");
        let filter = JqFilter::new(program, Duration::from_millis(100));
        let err = filter.filter(vec![json!({})], ".").unwrap_err();
        assert_matches!(err, FilterError::Timeout { timeout_ms: 100 });
    }

    #[cfg(unix)]
    #[test]
    fn nonzero_exit_carries_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let program = script(&dir, "echo 'compile error' >&2; exit 3");
        let err = JqFilter::new(program, Duration::from_secs(5))
            .filter(vec![json!({})], ".")
            .unwrap_err();
        assert_matches!(err, FilterError::Failed { ref stderr } if stderr == "compile error");
    }

    #[cfg(unix)]
    #[test]
    fn non_json_output_is_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let program = script(&dir, "cat >/dev/null; echo not-json");
        let err = JqFilter::new(program, Duration::from_secs(5))
            .filter(vec![json!({})], ".")
            .unwrap_err();
        assert_matches!(err, FilterError::Decode(_));
    }

    #[cfg(unix)]
    #[test]
    fn records_arrive_on_stdin() {
        let dir = tempfile::tempdir().unwrap();
        let program = script(&dir, "cat");
        let records = vec![json!({"a": 1}), json!({"b": [1, 2]})];
        let out = JqFilter::new(program, Duration::from_secs(5))
            .filter(records.clone(), ".")
            .unwrap();
        assert_eq!(out, records);
    }
}
