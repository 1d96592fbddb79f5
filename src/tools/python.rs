//! Sandboxed Python execution tool.

use async_trait::async_trait;
use serde_json::{json, Value};

use super::Tool;
use crate::sandbox::{join_code_lines, ToolRunner};

/// Run a Python snippet that defines `main()` and return what it returns.
pub struct RunPython {
    runner: ToolRunner,
}

impl RunPython {
    pub fn new(runner: ToolRunner) -> Self {
        Self { runner }
    }
}

/// Accepts the code either as one string or as a list of lines.
fn code_from_args(args: &Value) -> anyhow::Result<String> {
    match &args["code"] {
        Value::String(code) => Ok(code.clone()),
        Value::Array(lines) => {
            let lines = lines
                .iter()
                .map(|l| {
                    l.as_str()
                        .ok_or_else(|| anyhow::anyhow!("'code' lines must be strings"))
                })
                .collect::<anyhow::Result<Vec<_>>>()?;
            Ok(join_code_lines(&lines))
        }
        _ => Err(anyhow::anyhow!("Missing 'code' argument")),
    }
}

#[async_trait]
impl Tool for RunPython {
    fn name(&self) -> &str {
        "run_python"
    }

    fn description(&self) -> &str {
        "Run Python code in an isolated sandbox without network access. The code must define main(); its return value is the result."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "code": {
                    "type": "string",
                    "description": "Python source defining a main() function"
                }
            },
            "required": ["code"]
        })
    }

    fn to_function_call(&self) -> Value {
        json!({
            "name": self.name(),
            "args": { "code": "def main():\n    return 6 * 7" }
        })
    }

    async fn call(&self, args: Value) -> anyhow::Result<String> {
        let code = code_from_args(&args)?;
        tracing::info!("Running sandboxed python ({} bytes)", code.len());

        let report = self.runner.execute(&code).await?;
        if report.success {
            Ok(report.output_text())
        } else {
            Err(anyhow::anyhow!(
                "Python run failed: {}",
                report.error.unwrap_or_else(|| "unknown error".to_string())
            ))
        }
    }
}
