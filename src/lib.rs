//! # rexia-flow
//!
//! Orchestrates LLM "workers" to complete a task.
//!
//! This library provides:
//! - A complexity router that sends each task to a base or complex model
//! - Workflows that pass one collaboration channel through ordered workers
//! - A reflect loop (plan, work, review, approve) with an iteration cap
//! - Structured-output parsing with a repair loop
//! - Sandboxed execution of generated Python, for tools and for unit tests
//!
//! ## Architecture
//!
//! ```text
//!        ┌──────────────────────────────────┐
//!        │   Agency (manager + agents)      │
//!        └────────────────┬─────────────────┘
//!                         │ assignments
//!                         ▼
//!        ┌──────────────────────────────────┐
//!        │   Agent (workflow + memory)      │
//!        └────────────────┬─────────────────┘
//!                         │
//!                         ▼
//!        ┌──────────────────────────────────┐
//!        │   Workflow → Components          │
//!        │   (CollaborationChannel)         │
//!        └────────────────┬─────────────────┘
//!                         │
//!              ┌──────────┴──────────┐
//!              ▼                     ▼
//!        ┌───────────┐        ┌─────────────┐
//!        │  Model    │        │  Sandbox    │
//!        └───────────┘        └─────────────┘
//! ```
//!
//! ## Modules
//! - `routing`: task complexity scoring and model selection
//! - `workflows`: staged, reflect and task-breakdown workflows
//! - `workers`: prompt construction and structured actions per role
//! - `structure`: JSON cleaning, parsing and the repair loop
//! - `sandbox`: isolated Python test and tool execution

pub mod agency;
pub mod agents;
pub mod channel;
pub mod config;
pub mod llm;
pub mod memory;
pub mod routing;
pub mod sandbox;
pub mod structure;
pub mod tools;
pub mod workers;
pub mod workflows;

pub use agency::{Agency, AgentInfo, ManagerAgent};
pub use agents::{Agent, TaskAgent};
pub use channel::{CollaborationChannel, TaskStatus};
pub use config::Config;
pub use llm::{Model, OpenAiCompatibleClient};
pub use memory::{InMemoryPlanStore, PlanStore, WorkingMemory};
pub use routing::{ModelTier, TaskComplexityRouter};
pub use workflows::{Workflow, WorkflowKind, WorkflowOptions, WorkflowOutcome};
