//! Worker that asks the model which registered tools to call, then calls them.

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use super::{prompts, Worker, WorkerContext, WorkerError, WorkerOutput};
use crate::llm::Model;
use crate::structure::{
    invoke_structured, StructuredOutput, ToolCallPlan, ToolCallRecord, DEFAULT_MAX_ATTEMPTS,
};

/// Dispatches model-chosen calls through the model's tool registry.
///
/// The message payload is a JSON object keyed by call id; each entry is
/// `{"name", "result"}` or `{"name", "error"}`. Unknown tools and failing
/// calls are recorded as errors and do not abort the other calls.
pub struct ToolWorker {
    model: Model,
    max_attempts: u32,
}

impl ToolWorker {
    pub fn new(model: Model) -> Self {
        Self {
            model,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    async fn dispatch(&self, call: &ToolCallRecord) -> Value {
        let Some(tool) = self.model.tools().get(&call.name) else {
            tracing::warn!(
                "Tool '{}' not found; available: {}",
                call.name,
                self.model.tools().names().join(", ")
            );
            return json!({ "name": call.name, "error": format!("Tool '{}' not found", call.name) });
        };

        let args = match &call.args {
            Value::Null => Value::Object(Map::new()),
            other => other.clone(),
        };
        tracing::info!(tool = %call.name, id = %call.id, "Calling tool");
        match tool.call(args).await {
            Ok(result) => json!({ "name": call.name, "result": result }),
            Err(e) => {
                tracing::warn!(tool = %call.name, "Tool call failed: {:#}", e);
                json!({ "name": call.name, "error": format!("{:#}", e) })
            }
        }
    }
}

fn fresh_call_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

#[async_trait]
impl Worker for ToolWorker {
    fn default_name(&self) -> &str {
        "tool"
    }

    async fn create_prompt(&self, ctx: &WorkerContext<'_>) -> Result<String, WorkerError> {
        let tools = self.model.tools().describe_for_prompt();
        Ok(prompts::assemble(
            prompts::TOOL,
            Some(ToolCallPlan::format_hint()),
            &[("Available Tools", tools.as_str())],
            ctx,
        ))
    }

    async fn act(
        &self,
        _ctx: &WorkerContext<'_>,
        prompt: &str,
        name: &str,
    ) -> Result<WorkerOutput, WorkerError> {
        let plan: ToolCallPlan = invoke_structured(&self.model, prompt, self.max_attempts).await?;

        let mut results = Map::new();
        for mut call in plan.tool_calls {
            if call.id.trim().is_empty() || results.contains_key(&call.id) {
                call.id = fresh_call_id();
            }
            let outcome = self.dispatch(&call).await;
            results.insert(call.id, outcome);
        }

        let payload = serde_json::to_string(&Value::Object(results))?;
        if self.model.is_verbose() {
            tracing::info!("{}: tool results {}", name, payload);
        }
        Ok(WorkerOutput::new(name, &payload))
    }
}
