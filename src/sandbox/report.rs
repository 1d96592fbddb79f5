//! Results printed by the sandbox harness between sentinel markers.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::process::SandboxOutput;

pub const BEGIN_MARKER: &str = "--- BEGIN JSON RESULTS ---";
pub const END_MARKER: &str = "--- END JSON RESULTS ---";

/// Pull the JSON payload out of harness stdout.
///
/// Generated code may print freely before the harness does, so the last
/// begin marker wins.
pub fn extract_marked_json(stdout: &str) -> Result<Value, String> {
    let start = stdout
        .rfind(BEGIN_MARKER)
        .ok_or_else(|| "JSON markers not found in output".to_string())?;
    let body = &stdout[start + BEGIN_MARKER.len()..];
    let end = body
        .find(END_MARKER)
        .ok_or_else(|| "JSON markers not found in output".to_string())?;
    serde_json::from_str(body[..end].trim())
        .map_err(|e| format!("Invalid JSON between result markers: {}", e))
}

/// A test whose assertion failed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestFailure {
    pub name: String,
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub details: String,
}

/// Anything other than an assertion failure: exceptions, import errors,
/// timeouts, a non-zero exit, an unreadable harness payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestErrorRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub details: String,
}

impl TestErrorRecord {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: None,
            kind: kind.into(),
            message: message.into(),
            details: String::new(),
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = details.into();
        self
    }
}

#[derive(Debug, Default, Deserialize)]
struct HarnessTestPayload {
    #[serde(default)]
    passed: Vec<String>,
    #[serde(default)]
    failed: Vec<TestFailure>,
    #[serde(default)]
    errors: Vec<TestErrorRecord>,
}

/// Outcome of running a test suite against generated code.
///
/// # Invariants
/// - `all_passed` iff `passed` is non-empty and both `failed` and `errors` are empty
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TestReport {
    pub all_passed: bool,
    pub passed: Vec<String>,
    pub failed: Vec<TestFailure>,
    pub errors: Vec<TestErrorRecord>,
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
}

impl TestReport {
    pub fn from_output(output: &SandboxOutput) -> Self {
        let mut report = TestReport {
            stdout: output.stdout.clone(),
            stderr: output.stderr.clone(),
            ..Default::default()
        };

        match extract_marked_json(&output.stdout)
            .and_then(|v| serde_json::from_value::<HarnessTestPayload>(v).map_err(|e| e.to_string()))
        {
            Ok(payload) => {
                report.passed = payload.passed;
                report.failed = payload.failed;
                report.errors = payload.errors;
            }
            Err(message) => report
                .errors
                .push(TestErrorRecord::new("HarnessOutput", message).with_details(&output.stderr)),
        }

        push_process_errors(&mut report.errors, output);
        report.all_passed =
            !report.passed.is_empty() && report.failed.is_empty() && report.errors.is_empty();
        report
    }

    /// Human-readable summary for retry prompts.
    pub fn summary(&self) -> String {
        let mut lines = vec![format!(
            "passed: {}, failed: {}, errors: {}",
            self.passed.len(),
            self.failed.len(),
            self.errors.len()
        )];
        for failure in &self.failed {
            lines.push(format!("FAILED {}: {}", failure.name, failure.error));
        }
        for error in &self.errors {
            let name = error.name.as_deref().unwrap_or("run");
            lines.push(format!("ERROR {} ({}): {}", name, error.kind, error.message));
        }
        lines.join("\n")
    }
}

/// Outcome of running a generated tool's `main()`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolRunReport {
    pub success: bool,
    #[serde(default)]
    pub output: Value,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
}

#[derive(Debug, Default, Deserialize)]
struct HarnessToolPayload {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    output: Value,
    #[serde(default)]
    error: Option<String>,
}

impl ToolRunReport {
    pub fn from_output(output: &SandboxOutput) -> Self {
        let mut report = ToolRunReport {
            stdout: output.stdout.clone(),
            stderr: output.stderr.clone(),
            ..Default::default()
        };

        match extract_marked_json(&output.stdout)
            .and_then(|v| serde_json::from_value::<HarnessToolPayload>(v).map_err(|e| e.to_string()))
        {
            Ok(payload) => {
                report.success = payload.success;
                report.output = payload.output;
                report.error = payload.error;
            }
            Err(message) => report.error = Some(message),
        }

        let mut process_errors = Vec::new();
        push_process_errors(&mut process_errors, output);
        if !process_errors.is_empty() {
            report.success = false;
            let extra = process_errors
                .iter()
                .map(|e| e.message.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            report.error = Some(match report.error.take() {
                Some(existing) => format!("{}; {}", existing, extra),
                None => extra,
            });
        }
        report
    }

    /// Output rendered as text: strings verbatim, everything else as JSON.
    pub fn output_text(&self) -> String {
        match &self.output {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }
}

fn push_process_errors(errors: &mut Vec<TestErrorRecord>, output: &SandboxOutput) {
    if output.timed_out {
        errors.push(TestErrorRecord::new("Timeout", output.stderr.clone()));
        return;
    }
    match output.exit_code {
        Some(0) => {}
        Some(code) => errors.push(
            TestErrorRecord::new("ExitStatus", format!("Process exited with code {}", code))
                .with_details(&output.stderr),
        ),
        None => errors.push(
            TestErrorRecord::new("ExitStatus", "Process terminated by signal")
                .with_details(&output.stderr),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(stdout: &str, exit_code: i32) -> SandboxOutput {
        SandboxOutput {
            exit_code: Some(exit_code),
            stdout: stdout.to_string(),
            stderr: String::new(),
            timed_out: false,
        }
    }

    fn wrap(payload: &str) -> String {
        format!("noise\n{}\n{}\n{}\n", BEGIN_MARKER, payload, END_MARKER)
    }

    #[test]
    fn test_all_passed_requires_at_least_one_pass() {
        let report = TestReport::from_output(&output(
            &wrap(r#"{"passed": ["test_add"], "failed": [], "errors": []}"#),
            0,
        ));
        assert!(report.all_passed);

        let empty = TestReport::from_output(&output(
            &wrap(r#"{"passed": [], "failed": [], "errors": []}"#),
            0,
        ));
        assert!(!empty.all_passed);
    }

    #[test]
    fn test_failures_and_errors_are_kept_apart() {
        let payload = r#"{
            "passed": ["test_a"],
            "failed": [{"name": "test_b", "error": "1 != 2", "details": "tb"}],
            "errors": [{"name": "test_c", "type": "ZeroDivisionError", "message": "division by zero", "details": "tb"}]
        }"#;
        let report = TestReport::from_output(&output(&wrap(payload), 0));
        assert!(!report.all_passed);
        assert_eq!(report.failed[0].name, "test_b");
        assert_eq!(report.errors[0].kind, "ZeroDivisionError");
        assert!(report.summary().contains("FAILED test_b: 1 != 2"));
    }

    #[test]
    fn test_missing_markers_become_error_entry() {
        let report = TestReport::from_output(&output("Traceback: SyntaxError", 1));
        assert!(!report.all_passed);
        assert_eq!(report.errors[0].kind, "HarnessOutput");
        assert!(report.errors[0].message.contains("JSON markers not found"));
        assert_eq!(report.errors[1].kind, "ExitStatus");
    }

    #[test]
    fn test_last_begin_marker_wins() {
        let stdout = format!(
            "{}\nnot json\n{}\n{}",
            BEGIN_MARKER,
            END_MARKER,
            wrap(r#"{"passed": ["test_x"]}"#)
        );
        let value = extract_marked_json(&stdout).unwrap();
        assert_eq!(value["passed"][0], "test_x");
    }

    #[test]
    fn test_timeout_reported_as_error() {
        let report = TestReport::from_output(&SandboxOutput {
            exit_code: None,
            stdout: String::new(),
            stderr: "Execution timed out after 30s".to_string(),
            timed_out: true,
        });
        assert!(report.errors.iter().any(|e| e.kind == "Timeout"));
    }

    #[test]
    fn test_tool_report_reads_output() {
        let report = ToolRunReport::from_output(&output(
            &wrap(r#"{"success": true, "output": "42", "error": null}"#),
            0,
        ));
        assert!(report.success);
        assert_eq!(report.output_text(), "42");
    }

    #[test]
    fn test_tool_report_nonzero_exit_is_failure() {
        let report = ToolRunReport::from_output(&output(
            &wrap(r#"{"success": true, "output": 1}"#),
            137,
        ));
        assert!(!report.success);
        assert!(report.error.unwrap().contains("137"));
    }
}
