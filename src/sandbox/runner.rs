use super::harness::{self, ENTRYPOINT, SOLUTION_MODULE};
use super::process::{run_entrypoint, SandboxConfig, SandboxError, SandboxResult};
use super::report::ToolRunReport;

/// Runs generated code that defines `main()` and captures its return value.
#[derive(Debug, Clone, Default)]
pub struct ToolRunner {
    config: SandboxConfig,
}

impl ToolRunner {
    pub fn new(config: SandboxConfig) -> Self {
        Self { config }
    }

    /// Execute `code` in a fresh sandbox workspace.
    ///
    /// Exceptions, timeouts and a missing `main` are reported through
    /// `ToolRunReport::error`; `Err` means the sandbox itself could not run.
    pub async fn execute(&self, code: &str) -> SandboxResult<ToolRunReport> {
        let workspace = tempfile::Builder::new()
            .prefix("rexia-tool-")
            .tempdir()
            .map_err(SandboxError::Workspace)?;
        let dir = workspace.path();
        tokio::fs::write(dir.join(format!("{}.py", SOLUTION_MODULE)), code).await?;
        tokio::fs::write(dir.join(ENTRYPOINT), harness::tool_harness()).await?;

        let output = run_entrypoint(&self.config, dir, ENTRYPOINT).await?;
        let report = ToolRunReport::from_output(&output);
        if report.success {
            tracing::debug!("Generated tool returned: {}", report.output_text());
        } else {
            tracing::info!(
                "Generated tool failed: {}",
                report.error.as_deref().unwrap_or("unknown error")
            );
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::process::command_on_path;

    fn host_runner() -> Option<ToolRunner> {
        if !command_on_path("python3") {
            eprintln!("python3 not available, skipping sandbox run");
            return None;
        }
        Some(ToolRunner::new(SandboxConfig::host()))
    }

    #[tokio::test]
    async fn test_main_return_value_is_output() {
        let Some(runner) = host_runner() else { return };
        let report = runner
            .execute("def main():\n    print('chatter')\n    return sum(range(10))\n")
            .await
            .unwrap();
        assert!(report.success, "{:?}", report.error);
        assert_eq!(report.output_text(), "45");
    }

    #[tokio::test]
    async fn test_exception_is_reported() {
        let Some(runner) = host_runner() else { return };
        let report = runner
            .execute("def main():\n    raise ValueError('nope')\n")
            .await
            .unwrap();
        assert!(!report.success);
        assert_eq!(report.error.as_deref(), Some("ValueError: nope"));
    }

    #[tokio::test]
    async fn test_missing_main_is_reported() {
        let Some(runner) = host_runner() else { return };
        let report = runner.execute("x = 1\n").await.unwrap();
        assert!(!report.success);
        assert!(report.error.unwrap().contains("AttributeError"));
    }

    #[tokio::test]
    async fn test_timeout_is_reported() {
        let Some(_) = host_runner() else { return };
        let runner = ToolRunner::new(SandboxConfig {
            timeout: std::time::Duration::from_millis(500),
            ..SandboxConfig::host()
        });
        let report = runner
            .execute("import time\n\ndef main():\n    time.sleep(10)\n")
            .await
            .unwrap();
        assert!(!report.success);
        assert!(report.error.unwrap().contains("timed out"));
    }
}
