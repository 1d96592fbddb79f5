use std::path::Path;

use super::harness::{self, ENTRYPOINT, SOLUTION_MODULE, TEST_MODULE};
use super::process::{run_entrypoint, SandboxConfig, SandboxError, SandboxResult};
use super::report::TestReport;

/// A Python test class and its source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestSuite {
    class_name: String,
    source: String,
}

impl TestSuite {
    /// # Errors
    /// `SandboxError::InvalidSuite` if the class name is not an identifier or
    /// the source does not define it.
    pub fn new(class_name: impl Into<String>, source: impl Into<String>) -> SandboxResult<Self> {
        let class_name = class_name.into();
        let source = source.into();
        if !harness::is_identifier(&class_name) {
            return Err(SandboxError::InvalidSuite(format!(
                "'{}' is not a valid class name",
                class_name
            )));
        }
        if !source.contains(&format!("class {}", class_name)) {
            return Err(SandboxError::InvalidSuite(format!(
                "source does not define class {}",
                class_name
            )));
        }
        Ok(Self { class_name, source })
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

/// Runs a test suite against generated code inside the sandbox.
#[derive(Debug, Clone, Default)]
pub struct CodeTester {
    config: SandboxConfig,
}

impl CodeTester {
    pub fn new(config: SandboxConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// Write `code`, the suite and the harness to a fresh workspace and run them.
    ///
    /// # Postconditions
    /// - Test outcomes, timeouts and unreadable harness output are all in the
    ///   returned report; `Err` means the sandbox itself could not run
    pub async fn execute(&self, code: &str, suite: &TestSuite) -> SandboxResult<TestReport> {
        let workspace = tempfile::Builder::new()
            .prefix("rexia-test-")
            .tempdir()
            .map_err(SandboxError::Workspace)?;
        write_test_workspace(workspace.path(), code, suite).await?;

        let output = run_entrypoint(&self.config, workspace.path(), ENTRYPOINT).await?;
        let report = TestReport::from_output(&output);

        tracing::info!(
            suite = suite.class_name(),
            passed = report.passed.len(),
            failed = report.failed.len(),
            errors = report.errors.len(),
            "Test run finished"
        );
        Ok(report)
    }
}

async fn write_test_workspace(dir: &Path, code: &str, suite: &TestSuite) -> SandboxResult<()> {
    tokio::fs::write(dir.join(format!("{}.py", SOLUTION_MODULE)), code).await?;
    tokio::fs::write(
        dir.join(format!("{}.py", TEST_MODULE)),
        harness::test_module_source(suite.source()),
    )
    .await?;
    tokio::fs::write(dir.join(ENTRYPOINT), harness::test_harness(suite.class_name())).await?;
    Ok(())
}
