use async_trait::async_trait;

use super::TaskAgent;
use crate::channel::TaskStatus;
use crate::llm::Model;
use crate::memory::WorkingMemory;
use crate::structure::{parse_structured, StructuredResponse};
use crate::workflows::{Workflow, WorkflowError, WorkflowKind, WorkflowOptions, WorkflowOutcome};

/// Drop the `"{worker}: "` prefix from a channel message.
pub fn strip_worker_prefix(message: &str) -> &str {
    match message.split_once(": ") {
        Some((name, payload))
            if !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') =>
        {
            payload
        }
        _ => message,
    }
}

/// Runs a workflow and keeps a working memory across runs.
///
/// # Invariants
/// - The memory outlives individual tasks; each completed run adds its result
pub struct Agent {
    workflow: Box<dyn Workflow>,
    memory: WorkingMemory,
}

impl Agent {
    pub fn new(workflow: Box<dyn Workflow>) -> Self {
        Self {
            workflow,
            memory: WorkingMemory::default(),
        }
    }

    /// An agent running a fresh workflow of `kind`.
    pub fn with_kind(kind: WorkflowKind, task: &str, model: &Model, options: &WorkflowOptions) -> Self {
        Self::new(kind.build(task, model, options))
    }

    pub fn with_memory(mut self, memory: WorkingMemory) -> Self {
        self.memory = memory;
        self
    }

    pub fn task(&self) -> &str {
        self.workflow.channel().task()
    }

    pub fn kind(&self) -> WorkflowKind {
        self.workflow.kind()
    }

    pub fn memory(&self) -> &WorkingMemory {
        &self.memory
    }

    pub fn status(&self) -> TaskStatus {
        self.workflow.channel().status()
    }

    /// Run the workflow over the current task and return the channel messages.
    pub async fn run_workflow(&mut self) -> Result<&[String], WorkflowError> {
        self.run_outcome().await?;
        Ok(self.workflow.channel().messages())
    }

    async fn run_outcome(&mut self) -> Result<WorkflowOutcome, WorkflowError> {
        let outcome = self.workflow.run(&mut self.memory).await?;
        tracing::debug!(
            kind = %self.workflow.kind(),
            status = %outcome.status,
            "Workflow finished after {} iteration(s)",
            outcome.iterations
        );
        Ok(outcome)
    }

    /// Last message of the latest run.
    pub fn get_task_result(&self) -> Option<&str> {
        self.workflow.channel().last()
    }

    /// Run the workflow (on `task` if given) and parse its result.
    ///
    /// `Ok(None)` when the run was rejected or its result is not a structured
    /// response.
    pub async fn reflect(
        &mut self,
        task: Option<&str>,
    ) -> Result<Option<StructuredResponse>, WorkflowError> {
        if let Some(task) = task {
            self.workflow.set_task(task);
        }
        let outcome = self.run_outcome().await?;
        if outcome.status != TaskStatus::Completed {
            return Ok(None);
        }

        match parse_structured::<StructuredResponse>(strip_worker_prefix(&outcome.result)) {
            Ok(response) => Ok(Some(response)),
            Err(e) => {
                tracing::warn!("Task result is not a structured response: {}", e);
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl TaskAgent for Agent {
    /// The answer text when the result is a structured response, otherwise
    /// the raw result without its worker prefix.
    async fn invoke(&mut self, task: &str) -> anyhow::Result<String> {
        self.workflow.set_task(task);
        let outcome = self.run_outcome().await?;
        let payload = strip_worker_prefix(&outcome.result);
        if outcome.status == TaskStatus::Rejected {
            anyhow::bail!("task was rejected: {}", payload);
        }
        Ok(match parse_structured::<StructuredResponse>(payload) {
            Ok(response) if !response.answer.is_empty() => response.answer.as_text(),
            _ => payload.to_string(),
        })
    }
}
