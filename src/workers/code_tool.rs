//! Worker that writes a small Python program, runs it in the sandbox and
//! shares what it returned.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use super::{prompts, Worker, WorkerContext, WorkerError, WorkerOutput, DEFAULT_RETRY_DELAY};
use crate::llm::Model;
use crate::sandbox::ToolRunner;
use crate::structure::{
    invoke_structured, StructuredError, StructuredOutput, StructuredResponse,
    DEFAULT_MAX_ATTEMPTS,
};

pub const DEFAULT_CODE_TOOL_ATTEMPTS: u32 = 3;

/// Generates code defining `main()` and runs it through a [`ToolRunner`].
///
/// Failed runs are fed back to the model with the error until the code runs
/// or the attempts are used up.
pub struct CodeToolWorker {
    model: Model,
    runner: ToolRunner,
    max_attempts: u32,
    structured_attempts: u32,
    retry_delay: Duration,
}

impl CodeToolWorker {
    pub fn new(model: Model, runner: ToolRunner) -> Self {
        Self {
            model,
            runner,
            max_attempts: DEFAULT_CODE_TOOL_ATTEMPTS,
            structured_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    /// Generate-and-run attempts.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Structured-output attempts inside each generate-and-run attempt.
    pub fn with_structured_attempts(mut self, attempts: u32) -> Self {
        self.structured_attempts = attempts.max(1);
        self
    }

    /// Fixed pause before every retry.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }
}

pub(crate) fn fix_code_prompt(original: &str, previous: &str, error: &str) -> String {
    format!(
        "The Python code within the answer field of this JSON object returned an error.\n\n\
         Original prompt:\n{original}\n\n\
         JSON Object:\n{previous}\n\n\
         Error:\n{error}\n\n\
         Please return the full previous JSON object with the answer updated to fix this error."
    )
}

#[async_trait]
impl Worker for CodeToolWorker {
    fn default_name(&self) -> &str {
        "code_tool"
    }

    async fn create_prompt(&self, ctx: &WorkerContext<'_>) -> Result<String, WorkerError> {
        Ok(prompts::assemble(
            prompts::CODE_TOOL,
            Some(StructuredResponse::format_hint()),
            &[],
            ctx,
        ))
    }

    async fn act(
        &self,
        _ctx: &WorkerContext<'_>,
        prompt: &str,
        name: &str,
    ) -> Result<WorkerOutput, WorkerError> {
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
                        tracing::info!("Code tool attempt {} produced no usable JSON: {}", attempt, e);
                        last_error = e.to_string();
                        continue;
                    }
                    Err(e) => return Err(e.into()),
                };

            let code = response.answer.as_text();
            if self.model.is_verbose() {
                tracing::info!("Code to execute (attempt {}):\n{}", attempt, code);
            }

            let report = self.runner.execute(&code).await?;
            if report.success {
                tracing::info!("Code tool succeeded on attempt {}", attempt);
                let payload = json!({
                    "agent_response": response,
                    "tool_results": {
                        "success": true,
                        "output": report.output,
                        "error": report.error,
                    },
                });
                return Ok(WorkerOutput::new(name, &serde_json::to_string(&payload)?));
            }

            last_error = report
                .error
                .clone()
                .unwrap_or_else(|| "code did not run successfully".to_string());
            tracing::info!("Code tool attempt {} failed: {}", attempt, last_error);
            current_prompt = fix_code_prompt(prompt, &serde_json::to_string(&response)?, &last_error);
        }

        Err(WorkerError::AttemptsExhausted {
            attempts: self.max_attempts,
            last_error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::{scripted_model, ScriptedClient};
    use crate::memory::WorkingMemory;
    use crate::sandbox::{command_on_path, SandboxConfig};

    fn host_runner() -> Option<ToolRunner> {
        if !command_on_path("python3") {
            eprintln!("python3 not available, skipping sandbox run");
            return None;
        }
        Some(ToolRunner::new(SandboxConfig::host()))
    }

    #[tokio::test]
    async fn test_retries_with_error_then_succeeds() {
        let Some(runner) = host_runner() else { return };
        let (model, client) = scripted_model([
            r#"{"answer": ["def helper():", "    return 1"], "confidence_score": 60}"#,
            r#"{"answer": ["def main():", "    return 6 * 7"], "confidence_score": 90}"#,
        ]);
        let worker = CodeToolWorker::new(model, runner).with_retry_delay(Duration::ZERO);
        let memory = WorkingMemory::default();
        let ctx = WorkerContext {
            task: "multiply six by seven",
            messages: &[],
            memory: &memory,
        };

        let prompt = worker.create_prompt(&ctx).await.unwrap();
        let output = worker.act(&ctx, &prompt, "code_tool").await.unwrap();

        let payload: serde_json::Value =
            serde_json::from_str(output.message.strip_prefix("code_tool: ").unwrap()).unwrap();
        assert_eq!(payload["tool_results"]["success"], true);
        assert_eq!(payload["tool_results"]["output"], 42);

        let prompts = client.prompts();
        assert_eq!(prompts.len(), 2);
        assert!(prompts[1].contains("returned an error"));
        assert!(prompts[1].contains("def helper():"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_attempts_are_an_error() {
        let client = ScriptedClient::with_fallback(Vec::<String>::new(), "no json here");
        let model = Model::new(client.clone(), "scripted");
        let worker = CodeToolWorker::new(model, ToolRunner::default())
            .with_max_attempts(2)
            .with_structured_attempts(1);
        let memory = WorkingMemory::default();
        let ctx = WorkerContext {
            task: "t",
            messages: &[],
            memory: &memory,
        };

        let err = worker.act(&ctx, "p", "code_tool").await.unwrap_err();
        assert!(matches!(err, WorkerError::AttemptsExhausted { attempts: 2, .. }));
        assert_eq!(client.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_between_attempts() {
        let client = ScriptedClient::with_fallback(Vec::<String>::new(), "no json here");
        let worker = CodeToolWorker::new(Model::new(client.clone(), "scripted"), ToolRunner::default())
            .with_max_attempts(3)
            .with_structured_attempts(1)
            .with_retry_delay(Duration::from_millis(750));
        let memory = WorkingMemory::default();
        let ctx = WorkerContext {
            task: "t",
            messages: &[],
            memory: &memory,
        };

        let start = tokio::time::Instant::now();
        let err = worker.act(&ctx, "p", "code_tool").await.unwrap_err();

        assert!(matches!(err, WorkerError::AttemptsExhausted { attempts: 3, .. }));
        assert_eq!(client.calls(), 3);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(1500), "waited {:?}", elapsed);
        assert!(elapsed < Duration::from_millis(2250), "waited {:?}", elapsed);
    }

    #[tokio::test]
    async fn test_transport_error_is_not_retried() {
        let client = ScriptedClient::failing("connection refused");
        let worker = CodeToolWorker::new(Model::new(client.clone(), "scripted"), ToolRunner::default());
        let memory = WorkingMemory::default();
        let ctx = WorkerContext {
            task: "t",
            messages: &[],
            memory: &memory,
        };

        let err = worker.act(&ctx, "p", "code_tool").await.unwrap_err();
        assert!(matches!(err, WorkerError::Structured(StructuredError::Model(_))));
        assert_eq!(client.calls(), 1);
    }
}
