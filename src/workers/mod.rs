//! Workers: stateless prompt builders and response parsers bound to a model.
//!
//! One trait, several variants. Most workers differ only in their
//! instructions and are a [`PromptWorker`] with a [`PromptRole`]; the tool,
//! code-tool and TDD workers add behaviour around the model call and have
//! their own types.
//!
//! Every worker's message has the form `"{name}: {payload}"`.

mod code_tool;
pub(crate) mod prompts;
mod tdd;
mod tool;

pub use code_tool::{CodeToolWorker, DEFAULT_CODE_TOOL_ATTEMPTS};
pub use tdd::{TddWorker, DEFAULT_TDD_ATTEMPTS};
pub use tool::ToolWorker;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::llm::Model;
use crate::memory::{PlanStore, WorkingMemory};
use crate::sandbox::SandboxError;
use crate::structure::{
    clean_response, invoke_structured, ApprovalResponse, ApprovalStatus, StructuredError,
    StructuredOutput, StructuredResponse, DEFAULT_MAX_ATTEMPTS,
};

/// Pause before each generate-and-run retry of the code-tool and TDD workers.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error(transparent)]
    Structured(#[from] StructuredError),

    #[error("model invocation failed: {0:#}")]
    Model(anyhow::Error),

    #[error(transparent)]
    Sandbox(#[from] SandboxError),

    #[error("failed to encode worker response: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("TDD worker has no test suite")]
    MissingTestSuite,

    #[error("generated code still failing after {attempts} attempts: {last_error}")]
    AttemptsExhausted { attempts: u32, last_error: String },
}

/// What a worker sees when building its prompt.
#[derive(Debug, Clone, Copy)]
pub struct WorkerContext<'a> {
    pub task: &'a str,
    pub messages: &'a [String],
    pub memory: &'a WorkingMemory,
}

/// A worker's contribution to the channel.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerOutput {
    /// `"{name}: {payload}"`.
    pub message: String,
    /// Set only by approval workers.
    pub approval: Option<ApprovalStatus>,
}

impl WorkerOutput {
    pub fn new(name: &str, payload: &str) -> Self {
        Self {
            message: format!("{}: {}", name, payload),
            approval: None,
        }
    }
}

/// Base trait for all workers.
///
/// # Invariants
/// - Workers hold no per-task state; everything comes from the context
/// - Errors are returned, never swallowed into a message
#[async_trait]
pub trait Worker: Send + Sync {
    /// Name used when a component does not give one.
    fn default_name(&self) -> &str;

    async fn create_prompt(&self, ctx: &WorkerContext<'_>) -> Result<String, WorkerError>;

    /// Invoke the model (and anything around it) and produce the message.
    async fn act(
        &self,
        ctx: &WorkerContext<'_>,
        prompt: &str,
        name: &str,
    ) -> Result<WorkerOutput, WorkerError>;
}

/// Workers that differ only in their instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptRole {
    Plan,
    Work,
    Reflect,
    Approve,
    Finalise,
    Code,
    Team,
    /// Free text with `<sub-task>` tags, not JSON.
    TaskPlanning,
}

impl PromptRole {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Plan => "plan",
            Self::Work => "work",
            Self::Reflect => "reflect",
            Self::Approve => "approve",
            Self::Finalise => "finalise",
            Self::Code => "code",
            Self::Team => "team",
            Self::TaskPlanning => "task_planning",
        }
    }

    fn instructions(&self) -> &'static str {
        match self {
            Self::Plan => prompts::PLAN,
            Self::Work => prompts::WORK,
            Self::Reflect => prompts::REFLECT,
            Self::Approve => prompts::APPROVE,
            Self::Finalise => prompts::FINALISE,
            Self::Code => prompts::CODE,
            Self::Team => prompts::TEAM,
            Self::TaskPlanning => prompts::TASK_PLANNING,
        }
    }

    fn format_hint(&self) -> Option<&'static str> {
        match self {
            Self::Approve => Some(ApprovalResponse::format_hint()),
            Self::TaskPlanning => None,
            _ => Some(StructuredResponse::format_hint()),
        }
    }
}

/// A worker defined by its role's instructions and response type.
pub struct PromptWorker {
    role: PromptRole,
    model: Model,
    max_attempts: u32,
    plan_store: Option<Arc<dyn PlanStore>>,
}

impl PromptWorker {
    pub fn new(role: PromptRole, model: Model) -> Self {
        Self {
            role,
            model,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            plan_store: None,
        }
    }

    pub fn plan(model: Model) -> Self {
        Self::new(PromptRole::Plan, model)
    }

    pub fn work(model: Model) -> Self {
        Self::new(PromptRole::Work, model)
    }

    pub fn reflect(model: Model) -> Self {
        Self::new(PromptRole::Reflect, model)
    }

    pub fn approve(model: Model) -> Self {
        Self::new(PromptRole::Approve, model)
    }

    pub fn finalise(model: Model) -> Self {
        Self::new(PromptRole::Finalise, model)
    }

    pub fn code(model: Model) -> Self {
        Self::new(PromptRole::Code, model)
    }

    pub fn team(model: Model) -> Self {
        Self::new(PromptRole::Team, model)
    }

    pub fn task_planning(model: Model) -> Self {
        Self::new(PromptRole::TaskPlanning, model)
    }

    /// Structured-output attempts per call, repairs included.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Previous plans are shown to, and new plans saved by, the plan role.
    pub fn with_plan_store(mut self, store: Arc<dyn PlanStore>) -> Self {
        self.plan_store = Some(store);
        self
    }

    pub fn role(&self) -> PromptRole {
        self.role
    }

    async fn previous_plan(&self, task: &str) -> Option<String> {
        if self.role != PromptRole::Plan {
            return None;
        }
        let store = self.plan_store.as_ref()?;
        match store.latest_plan(task).await {
            Ok(plan) => plan,
            Err(e) => {
                tracing::warn!("Could not read previous plan: {:#}", e);
                None
            }
        }
    }

    async fn remember_plan(&self, task: &str, response: &StructuredResponse) {
        let Some(store) = self.plan_store.as_ref() else {
            return;
        };
        if response.plan.is_empty() {
            return;
        }
        if let Err(e) = store.save_plan(task, &response.plan.join("\n")).await {
            tracing::warn!("Could not save plan: {:#}", e);
        }
    }
}

#[async_trait]
impl Worker for PromptWorker {
    fn default_name(&self) -> &str {
        self.role.name()
    }

    async fn create_prompt(&self, ctx: &WorkerContext<'_>) -> Result<String, WorkerError> {
        let previous_plan = self.previous_plan(ctx.task).await.unwrap_or_default();
        Ok(prompts::assemble(
            self.role.instructions(),
            self.role.format_hint(),
            &[("Previous Plan", previous_plan.as_str())],
            ctx,
        ))
    }

    async fn act(
        &self,
        ctx: &WorkerContext<'_>,
        prompt: &str,
        name: &str,
    ) -> Result<WorkerOutput, WorkerError> {
        match self.role {
            PromptRole::Approve => {
                let approval: ApprovalResponse =
                    invoke_structured(&self.model, prompt, self.max_attempts).await?;
                tracing::info!(worker = name, status = approval.status.as_str(), "Approval verdict");
                let mut output = WorkerOutput::new(name, &serde_json::to_string(&approval)?);
                output.approval = Some(approval.status);
                Ok(output)
            }
            PromptRole::TaskPlanning => {
                let raw = self.model.invoke(prompt).await.map_err(WorkerError::Model)?;
                Ok(WorkerOutput::new(name, &clean_response(&raw)))
            }
            _ => {
                let response: StructuredResponse =
                    invoke_structured(&self.model, prompt, self.max_attempts).await?;
                if self.role == PromptRole::Plan {
                    self.remember_plan(ctx.task, &response).await;
                }
                Ok(WorkerOutput::new(name, &serde_json::to_string(&response)?))
            }
        }
    }
}
