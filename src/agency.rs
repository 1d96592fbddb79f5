//! Agency: a manager that splits a task across named agents and reports back.
//!
//! The manager asks its model for assignments as JSON
//! (`{"assignments": [{"agent", "task"}], "summary"}`), runs them in order,
//! gives each agent the previous agent's result as context, then asks the
//! model to summarise the collected results.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::agents::TaskAgent;
use crate::channel::{CollaborationChannel, TaskStatus};
use crate::llm::Model;
use crate::structure::{
    invoke_structured, ParseError, StructuredError, StructuredOutput, DEFAULT_MAX_ATTEMPTS,
};

#[derive(Debug, Error)]
pub enum AssignmentError {
    #[error("no agent found with name: {0}")]
    UnknownAgent(String),

    #[error("assignment for agent {0} has no task")]
    EmptyTask(String),
}

#[derive(Debug, Error)]
pub enum AgencyError {
    #[error("task is empty")]
    EmptyTask,

    #[error("failed to plan assignments: {0}")]
    Planning(#[from] StructuredError),

    #[error(transparent)]
    Assignment(#[from] AssignmentError),

    #[error("error executing assignment for agent {name}: {source:#}")]
    Agent {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to present results: {0:#}")]
    Report(anyhow::Error),
}

/// A managed agent and what it is good at.
pub struct AgentInfo {
    pub agent: Box<dyn TaskAgent>,
    pub name: String,
    pub description: String,
}

impl AgentInfo {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        agent: impl TaskAgent + 'static,
    ) -> Self {
        Self {
            agent: Box::new(agent),
            name: name.into(),
            description: description.into(),
        }
    }
}

/// One resolved assignment: which agent (by index into the manager's list)
/// runs which sub-task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentAssignment {
    pub agent: usize,
    pub name: String,
    pub task: String,
}

/// The manager model's raw assignment list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssignmentPlan {
    pub assignments: Vec<PlannedAssignment>,
    #[serde(default)]
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedAssignment {
    pub agent: String,
    #[serde(default)]
    pub task: String,
}

impl StructuredOutput for AssignmentPlan {
    fn from_value(value: Value) -> Result<Self, ParseError> {
        let plan: AssignmentPlan =
            serde_json::from_value(value).map_err(|e| ParseError::Schema(e.to_string()))?;
        if plan.assignments.is_empty() {
            return Err(ParseError::Schema("\"assignments\" is empty".to_string()));
        }
        Ok(plan)
    }

    fn format_hint() -> &'static str {
        r#"{
    "assignments": [
        {"agent": "agent name", "task": "instruction for that agent"}
    ],
    "summary": "how the sub-tasks together complete the main task"
}"#
    }
}

const ASSIGNMENT_INSTRUCTIONS: &str = "\
You are a task manager. Break the main task into sub-tasks and assign each one
to the most suitable agent from the list below. Only use the listed agents and
only the capabilities their descriptions give them. Every sub-task must be
something an AI agent can do without human help, phrased as an instruction to
that agent. Sub-tasks run in the order you list them, and each agent sees the
result of the agent before it, so order them accordingly. Cover every part of
the main task.";

const REPORT_INSTRUCTIONS: &str = "\
Collate and report the results of a collaborative task. Below are the results
each agent produced. Write a clear, well-structured summary covering how the
task was approached, the key findings and decisions, the final outcome, and
any further recommendations.";

/// Plans, executes and reports on assignments.
pub struct ManagerAgent {
    model: Model,
    agents: Vec<AgentInfo>,
    channel: CollaborationChannel,
    max_attempts: u32,
}

impl ManagerAgent {
    pub fn new(model: Model, agents: Vec<AgentInfo>) -> Self {
        Self {
            model,
            agents,
            channel: CollaborationChannel::new(""),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn assign_task(&mut self, task: &str) {
        self.channel.set_task(task);
        self.channel.clear();
        self.channel.set_status(TaskStatus::Pending);
    }

    pub fn channel(&self) -> &CollaborationChannel {
        &self.channel
    }

    pub fn agent_names(&self) -> Vec<&str> {
        self.agents.iter().map(|a| a.name.as_str()).collect()
    }

    fn agents_list(&self) -> String {
        self.agents
            .iter()
            .enumerate()
            .map(|(i, a)| format!("{}. Name: {}\n   Description: {}", i + 1, a.name, a.description))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn assignment_prompt(&self) -> String {
        format!(
            "{}\n\nStructure your response as a single JSON object in exactly this format, with nothing outside it:\n{}\n\nMain Task: {}\n\nAvailable Agents:\n{}",
            ASSIGNMENT_INSTRUCTIONS,
            AssignmentPlan::format_hint(),
            self.channel.task(),
            self.agents_list()
        )
    }

    fn find_agent(&self, name: &str) -> Option<usize> {
        let wanted = name.trim();
        self.agents
            .iter()
            .position(|a| a.name == wanted)
            .or_else(|| {
                self.agents
                    .iter()
                    .position(|a| a.name.eq_ignore_ascii_case(wanted))
            })
    }

    /// Resolve every planned assignment to a known agent.
    ///
    /// # Errors
    /// The first assignment naming an unknown agent, or with an empty task.
    pub fn resolve_assignments(
        &self,
        plan: &AssignmentPlan,
    ) -> Result<Vec<AgentAssignment>, AssignmentError> {
        plan.assignments
            .iter()
            .map(|planned| {
                let agent = self
                    .find_agent(&planned.agent)
                    .ok_or_else(|| AssignmentError::UnknownAgent(planned.agent.clone()))?;
                if planned.task.trim().is_empty() {
                    return Err(AssignmentError::EmptyTask(planned.agent.clone()));
                }
                Ok(AgentAssignment {
                    agent,
                    name: self.agents[agent].name.clone(),
                    task: planned.task.trim().to_string(),
                })
            })
            .collect()
    }

    /// Plan assignments for the current task and run them in order.
    pub async fn manage_agents(&mut self) -> Result<(), AgencyError> {
        if self.channel.task().trim().is_empty() {
            return Err(AgencyError::EmptyTask);
        }
        self.channel.set_status(TaskStatus::Working);

        let result = self.plan_and_execute().await;
        self.channel.set_status(if result.is_ok() {
            TaskStatus::Completed
        } else {
            TaskStatus::Rejected
        });
        result
    }

    async fn plan_and_execute(&mut self) -> Result<(), AgencyError> {
        let plan: AssignmentPlan =
            invoke_structured(&self.model, &self.assignment_prompt(), self.max_attempts).await?;
        let assignments = self.resolve_assignments(&plan)?;
        tracing::info!(
            "Manager planned {} assignment(s): {}",
            assignments.len(),
            plan.summary
        );

        for assignment in &assignments {
            self.execute_assignment(assignment).await?;
        }
        Ok(())
    }

    async fn execute_assignment(&mut self, assignment: &AgentAssignment) -> Result<(), AgencyError> {
        let previous = self.channel.last().unwrap_or_default();
        let task = format!("{}\n\nPrevious Task Results: {}", assignment.task, previous);
        tracing::info!(agent = %assignment.name, "Executing assignment: {}", assignment.task);

        let result = self.agents[assignment.agent]
            .agent
            .invoke(&task)
            .await
            .map_err(|source| AgencyError::Agent {
                name: assignment.name.clone(),
                source,
            })?;
        self.channel.put(result);
        Ok(())
    }

    /// Ask the model to summarise the collected results.
    pub async fn present_results(&self) -> Result<String, AgencyError> {
        let messages = self
            .channel
            .messages()
            .iter()
            .enumerate()
            .map(|(i, m)| format!("Message {}:\n{}\n", i + 1, m))
            .collect::<Vec<_>>()
            .join("\n");
        let prompt = format!(
            "{}\n\nMain Task: {}\n\nResults:\n{}",
            REPORT_INSTRUCTIONS,
            self.channel.task(),
            messages
        );
        self.model.invoke(&prompt).await.map_err(AgencyError::Report)
    }
}

/// A task plus the manager that delivers it.
pub struct Agency {
    task: String,
    manager: ManagerAgent,
}

impl Agency {
    pub fn new(task: impl Into<String>, agents: Vec<AgentInfo>, manager_model: Model) -> Self {
        Self {
            task: task.into(),
            manager: ManagerAgent::new(manager_model, agents),
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.manager = self.manager.with_max_attempts(max_attempts);
        self
    }

    pub fn task(&self) -> &str {
        &self.task
    }

    pub fn manager(&self) -> &ManagerAgent {
        &self.manager
    }

    /// Run the agency on its task, or on `task` if given, and return the
    /// manager's summary report.
    pub async fn invoke(&mut self, task: Option<&str>) -> Result<String, AgencyError> {
        if let Some(task) = task {
            self.task = task.to_string();
        }
        tracing::info!("Agency working on task: {}", self.task);
        self.manager.assign_task(&self.task);
        self.manager.manage_agents().await?;
        self.manager.present_results().await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use super::*;
    use crate::llm::mock::scripted_model;

    struct Recorder {
        reply: &'static str,
        seen: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl TaskAgent for Recorder {
        async fn invoke(&mut self, task: &str) -> anyhow::Result<String> {
            self.seen.lock().unwrap().push(task.to_string());
            Ok(self.reply.to_string())
        }
    }

    struct Broken;

    #[async_trait]
    impl TaskAgent for Broken {
        async fn invoke(&mut self, _task: &str) -> anyhow::Result<String> {
            anyhow::bail!("model unavailable")
        }
    }

    fn recorder(reply: &'static str) -> (Recorder, Arc<Mutex<Vec<String>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        (
            Recorder {
                reply,
                seen: seen.clone(),
            },
            seen,
        )
    }

    #[tokio::test]
    async fn test_assignments_run_in_order_with_previous_result() {
        let (researcher, research_seen) = recorder("three venues found");
        let (writer, writer_seen) = recorder("invitation drafted");
        let (model, client) = scripted_model([
            r#"{"assignments": [
                {"agent": "Researcher", "task": "Find venues"},
                {"agent": "writer", "task": "Draft the invitation"}
            ], "summary": "research then write"}"#,
            "Summary report",
        ]);
        let mut agency = Agency::new(
            "Organise a party",
            vec![
                AgentInfo::new("Researcher", "finds information", researcher),
                AgentInfo::new("Writer", "writes text", writer),
            ],
            model,
        );

        let report = agency.invoke(None).await.unwrap();

        assert_eq!(report, "Summary report");
        assert_eq!(
            research_seen.lock().unwrap()[0],
            "Find venues\n\nPrevious Task Results: "
        );
        assert_eq!(
            writer_seen.lock().unwrap()[0],
            "Draft the invitation\n\nPrevious Task Results: three venues found"
        );
        assert_eq!(agency.manager().channel().status(), TaskStatus::Completed);

        let prompts = client.prompts();
        assert!(prompts[0].contains("1. Name: Researcher\n   Description: finds information"));
        assert!(prompts[1].contains("Message 2:\ninvitation drafted"));
    }

    #[tokio::test]
    async fn test_unknown_agent_is_an_assignment_error() {
        let (researcher, seen) = recorder("x");
        let (model, _) = scripted_model([
            r#"{"assignments": [{"agent": "Designer", "task": "Draw"}], "summary": ""}"#,
        ]);
        let mut agency = Agency::new(
            "t",
            vec![AgentInfo::new("Researcher", "finds information", researcher)],
            model,
        );

        let err = agency.invoke(None).await.unwrap_err();
        assert!(matches!(
            err,
            AgencyError::Assignment(AssignmentError::UnknownAgent(ref name)) if name == "Designer"
        ));
        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(agency.manager().channel().status(), TaskStatus::Rejected);
    }

    #[tokio::test]
    async fn test_agent_failure_names_agent() {
        let (model, _) = scripted_model([
            r#"{"assignments": [{"agent": "Broken", "task": "Do it"}]}"#,
        ]);
        let mut agency = Agency::new("t", vec![AgentInfo::new("Broken", "fails", Broken)], model);

        let err = agency.invoke(Some("new task")).await.unwrap_err();
        assert_eq!(agency.task(), "new task");
        assert!(err.to_string().contains("agent Broken: model unavailable"));
    }

    #[tokio::test]
    async fn test_empty_assignment_list_is_repaired() {
        let (researcher, _) = recorder("done");
        let (model, client) = scripted_model([
            r#"{"assignments": []}"#,
            r#"{"assignments": [{"agent": "Researcher", "task": "Look"}]}"#,
            "report",
        ]);
        let mut agency = Agency::new(
            "t",
            vec![AgentInfo::new("Researcher", "finds information", researcher)],
            model,
        );

        assert_eq!(agency.invoke(None).await.unwrap(), "report");
        assert_eq!(client.calls(), 3);
    }
}
