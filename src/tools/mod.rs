//! Tool system for workers.
//!
//! Tools are called by the tool worker: the model is shown every registered
//! tool's descriptor, replies with a JSON list of calls, and the worker
//! dispatches each call through the [`ToolRegistry`].

mod python;

pub use python::RunPython;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

/// Trait for implementing tools.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool.
    fn name(&self) -> &str;

    /// A description of what this tool does.
    fn description(&self) -> &str;

    /// JSON schema for the tool's arguments.
    fn parameters_schema(&self) -> Value;

    /// Descriptor shown to the model when it chooses tools.
    fn to_tool_descriptor(&self) -> Value {
        json!({
            "name": self.name(),
            "description": self.description(),
            "parameters": self.parameters_schema(),
        })
    }

    /// Example of the call shape the model should produce.
    fn to_function_call(&self) -> Value {
        json!({ "name": self.name() })
    }

    /// Execute the tool with the given arguments.
    async fn call(&self, args: Value) -> anyhow::Result<String>;
}

/// Registry of available tools, ordered by name.
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Register a tool, replacing any tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), tool).is_some() {
            tracing::warn!("Tool '{}' registered twice; keeping the latest", name);
        }
    }

    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.register(tool);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// One line per tool: name, descriptor and example call.
    pub fn describe_for_prompt(&self) -> String {
        self.tools
            .values()
            .map(|tool| {
                format!(
                    "Tool: {}, Object: {}, Function Call: {}",
                    tool.name(),
                    tool.to_tool_descriptor(),
                    tool.to_function_call()
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Echoes its `text` argument back, upper-cased.
    pub struct Shout;

    #[async_trait]
    impl Tool for Shout {
        fn name(&self) -> &str {
            "shout"
        }

        fn description(&self) -> &str {
            "Upper-cases the given text"
        }

        fn parameters_schema(&self) -> Value {
            json!({
                "type": "object",
                "properties": { "text": { "type": "string" } },
                "required": ["text"]
            })
        }

        async fn call(&self, args: Value) -> anyhow::Result<String> {
            let text = args["text"]
                .as_str()
                .ok_or_else(|| anyhow::anyhow!("Missing 'text' argument"))?;
            Ok(text.to_uppercase())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::Shout;
    use super::*;

    #[test]
    fn test_registry_lookup() {
        let registry = ToolRegistry::empty().with_tool(Arc::new(Shout));
        assert_eq!(registry.len(), 1);
        assert!(registry.get("shout").is_some());
        assert!(registry.get("whisper").is_none());
    }

    #[test]
    fn test_describe_for_prompt_lists_call_shape() {
        let registry = ToolRegistry::empty().with_tool(Arc::new(Shout));
        let description = registry.describe_for_prompt();
        assert!(description.starts_with("Tool: shout, Object: "));
        assert!(description.contains(r#"Function Call: {"name":"shout"}"#));
        assert!(description.contains("Upper-cases the given text"));
    }

    #[tokio::test]
    async fn test_tool_call_validates_args() {
        assert_eq!(Shout.call(json!({"text": "hi"})).await.unwrap(), "HI");
        assert!(Shout.call(json!({})).await.is_err());
    }
}
