//! Test-driven worker: writes code until a given test class passes.

use std::time::Duration;

use async_trait::async_trait;

use super::code_tool::fix_code_prompt;
use super::{prompts, Worker, WorkerContext, WorkerError, WorkerOutput, DEFAULT_RETRY_DELAY};
use crate::llm::Model;
use crate::sandbox::{CodeTester, TestSuite};
use crate::structure::{
    invoke_structured, StructuredError, StructuredOutput, StructuredResponse,
    DEFAULT_MAX_ATTEMPTS,
};

pub const DEFAULT_TDD_ATTEMPTS: u32 = 5;

/// Generates an implementation and runs the suite against it in the sandbox,
/// feeding failures back until every test passes.
///
/// # Preconditions
/// - A suite must be set before `create_prompt`; otherwise
///   `WorkerError::MissingTestSuite`
pub struct TddWorker {
    model: Model,
    tester: CodeTester,
    suite: Option<TestSuite>,
    max_attempts: u32,
    structured_attempts: u32,
    retry_delay: Duration,
}

impl TddWorker {
    pub fn new(model: Model, tester: CodeTester) -> Self {
        Self {
            model,
            tester,
            suite: None,
            max_attempts: DEFAULT_TDD_ATTEMPTS,
            structured_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    pub fn with_test_suite(mut self, suite: TestSuite) -> Self {
        self.suite = Some(suite);
        self
    }

    pub fn set_test_suite(&mut self, suite: TestSuite) {
        self.suite = Some(suite);
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_structured_attempts(mut self, attempts: u32) -> Self {
        self.structured_attempts = attempts.max(1);
        self
    }

    /// Fixed pause before every retry.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    fn suite(&self) -> Result<&TestSuite, WorkerError> {
        self.suite.as_ref().ok_or(WorkerError::MissingTestSuite)
    }
}

#[async_trait]
impl Worker for TddWorker {
    fn default_name(&self) -> &str {
        "tdd"
    }

    async fn create_prompt(&self, ctx: &WorkerContext<'_>) -> Result<String, WorkerError> {
        let suite = self.suite()?;
        Ok(prompts::assemble(
            prompts::TDD,
            Some(StructuredResponse::format_hint()),
            &[("Tests", suite.source())],
            ctx,
        ))
    }

    async fn act(
        &self,
        _ctx: &WorkerContext<'_>,
        prompt: &str,
        name: &str,
    ) -> Result<WorkerOutput, WorkerError> {
        let suite = self.suite()?;
        let mut current_prompt = prompt.to_string();
        let mut last_error = String::new();

        for attempt in 1..=self.max_attempts {
            if attempt > 1 {
                tracing::debug!("Retrying in {:?}", self.retry_delay);
                tokio::time::sleep(self.retry_delay).await;
            }
            let response: StructuredResponse =
                match invoke_structured(&self.model, &current_prompt, self.structured_attempts).await
                {
                    Ok(response) => response,
                    Err(StructuredError::MaxAttempts { last_error: e, .. }) => {
                        tracing::info!("TDD attempt {} produced no usable JSON: {}", attempt, e);
                        last_error = e.to_string();
                        continue;
                    }
                    Err(e) => return Err(e.into()),
                };

            let code = response.answer.as_text();
            if self.model.is_verbose() {
                tracing::info!("Code to test (attempt {}):\n{}", attempt, code);
            }

            let report = self.tester.execute(&code, suite).await?;
            if report.all_passed {
                tracing::info!(
                    "All {} tests passed on attempt {}",
                    report.passed.len(),
                    attempt
                );
                return Ok(WorkerOutput::new(name, &serde_json::to_string(&response)?));
            }

            last_error = report.summary();
            tracing::info!("TDD attempt {} failed:\n{}", attempt, last_error);
            current_prompt = fix_code_prompt(prompt, &serde_json::to_string(&response)?, &last_error);
        }

        Err(WorkerError::AttemptsExhausted {
            attempts: self.max_attempts,
            last_error,
        })
    }
}
