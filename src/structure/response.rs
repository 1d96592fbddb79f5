//! Typed responses workers ask models for.
//!
//! Parsing is tolerant of the shapes models actually emit: lists given as a
//! single string, numbers given as strings, `"chain of reasoning"` with spaces,
//! code answers given as a list of lines. Ranges are not negotiable: a
//! confidence outside `0..=100` is rejected so the repair loop can ask again.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{ParseError, StructuredOutput};

/// The `answer` field: prose, or code as a list of lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Answer {
    Text(String),
    Lines(Vec<String>),
}

impl Default for Answer {
    fn default() -> Self {
        Answer::Text(String::new())
    }
}

impl Answer {
    /// The answer as one string; lines are joined with newlines.
    pub fn as_text(&self) -> String {
        match self {
            Answer::Text(text) => text.clone(),
            Answer::Lines(lines) => lines.join("\n"),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Answer::Text(text) => text.trim().is_empty(),
            Answer::Lines(lines) => lines.iter().all(|l| l.trim().is_empty()),
        }
    }

    fn from_value(value: Value) -> Self {
        match value {
            Value::Null => Answer::default(),
            Value::String(text) => Answer::Text(text),
            Value::Array(items) => Answer::Lines(items.into_iter().map(value_to_text).collect()),
            other => Answer::Text(other.to_string()),
        }
    }
}

/// One tool invocation requested by a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub name: String,
    #[serde(default)]
    pub args: Value,
    #[serde(default)]
    pub id: String,
}

/// The general worker response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructuredResponse {
    pub question: String,
    pub plan: Vec<String>,
    pub answer: Answer,
    pub confidence_score: u8,
    pub chain_of_reasoning: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRecord>,
}

impl StructuredOutput for StructuredResponse {
    fn from_value(value: Value) -> Result<Self, ParseError> {
        let mut object = into_object(value)?;

        let question = take_any(&mut object, &["question", "task"])
            .map(value_to_text)
            .unwrap_or_default();
        let plan = take_any(&mut object, &["plan"])
            .map(string_list)
            .unwrap_or_default();
        let answer = take_any(&mut object, &["answer"])
            .map(Answer::from_value)
            .unwrap_or_default();
        let confidence_score = confidence(take_any(&mut object, &["confidence_score", "confidence"]))?;
        let chain_of_reasoning = take_any(&mut object, &["chain_of_reasoning", "chain of reasoning"])
            .map(string_list)
            .unwrap_or_default();
        let tool_calls = take_any(&mut object, &["tool_calls"])
            .map(tool_call_list)
            .transpose()?
            .unwrap_or_default();

        Ok(Self {
            question,
            plan,
            answer,
            confidence_score,
            chain_of_reasoning,
            tool_calls,
        })
    }

    fn format_hint() -> &'static str {
        r#"{
    "question": "string",
    "plan": ["string"],
    "answer": "string",
    "confidence_score": "integer between 0 and 100",
    "chain_of_reasoning": ["string"]
}"#
    }
}

/// Verdict of the approval step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalStatus {
    /// The answer is accepted; stop.
    Completed,
    /// Keep iterating.
    Working,
    /// The task cannot be completed; stop.
    Rejected,
}

impl ApprovalStatus {
    /// Exact match on the status word; `"NOT COMPLETED"` is `Working`.
    pub fn parse(value: &str) -> Option<Self> {
        let normalised = value.trim().to_uppercase().replace(|c: char| c == '-' || c == ' ', "_");
        match normalised.as_str() {
            "COMPLETED" | "COMPLETE" | "APPROVED" | "ACCEPTED" => Some(Self::Completed),
            "WORKING" | "NOT_COMPLETED" | "IN_PROGRESS" | "CONTINUE" | "REVISE" => {
                Some(Self::Working)
            }
            "REJECTED" | "REJECT" | "FAILED" => Some(Self::Rejected),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "COMPLETED",
            Self::Working => "WORKING",
            Self::Rejected => "REJECTED",
        }
    }
}

/// The approval step's structured verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalResponse {
    pub status: ApprovalStatus,
    pub feedback: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accepted_answer: Option<String>,
    pub confidence_score: u8,
    pub chain_of_reasoning: Vec<String>,
}

impl StructuredOutput for ApprovalResponse {
    fn from_value(value: Value) -> Result<Self, ParseError> {
        let mut object = into_object(value)?;

        let raw_status = take_any(&mut object, &["status", "approval"])
            .ok_or_else(|| ParseError::Schema("missing \"status\"".to_string()))?;
        let status_text = value_to_text(raw_status);
        let status = ApprovalStatus::parse(&status_text).ok_or_else(|| {
            ParseError::Schema(format!(
                "status must be one of COMPLETED, WORKING, REJECTED; got {:?}",
                status_text
            ))
        })?;

        let feedback = take_any(&mut object, &["feedback", "reason"])
            .map(value_to_text)
            .unwrap_or_default();
        let accepted_answer = take_any(&mut object, &["accepted_answer", "accepted answer"])
            .map(value_to_text)
            .filter(|a| !a.trim().is_empty());
        let confidence_score = confidence(take_any(&mut object, &["confidence_score", "confidence"]))?;
        let chain_of_reasoning = take_any(&mut object, &["chain_of_reasoning", "chain of reasoning"])
            .map(string_list)
            .unwrap_or_default();

        Ok(Self {
            status,
            feedback,
            accepted_answer,
            confidence_score,
            chain_of_reasoning,
        })
    }

    fn format_hint() -> &'static str {
        r#"{
    "status": "COMPLETED | WORKING | REJECTED",
    "feedback": "string",
    "accepted_answer": "string, the final answer when status is COMPLETED",
    "confidence_score": "integer between 0 and 100",
    "chain_of_reasoning": ["string"]
}"#
    }
}

/// The tool worker's list of calls.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolCallPlan {
    pub tool_calls: Vec<ToolCallRecord>,
}

impl StructuredOutput for ToolCallPlan {
    fn from_value(value: Value) -> Result<Self, ParseError> {
        let mut object = into_object(value)?;
        let calls = take_any(&mut object, &["tool_calls"])
            .ok_or_else(|| ParseError::Schema("missing \"tool_calls\"".to_string()))?;
        Ok(Self {
            tool_calls: tool_call_list(calls)?,
        })
    }

    fn format_hint() -> &'static str {
        r#"{
    "tool_calls": [
        {"name": "tool name", "args": {"argument": "value"}, "id": "unique hex id"}
    ]
}"#
    }
}

fn into_object(value: Value) -> Result<Map<String, Value>, ParseError> {
    match value {
        Value::Object(object) => Ok(object),
        other => Err(ParseError::Schema(format!(
            "expected a JSON object, got {}",
            json_kind(&other)
        ))),
    }
}

/// Remove and return the first present key, skipping nulls.
fn take_any(object: &mut Map<String, Value>, keys: &[&str]) -> Option<Value> {
    keys.iter()
        .filter_map(|key| object.remove(*key))
        .find(|value| !value.is_null())
}

fn value_to_text(value: Value) -> String {
    match value {
        Value::String(text) => text,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn string_list(value: Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.into_iter().map(value_to_text).collect(),
        Value::Null => Vec::new(),
        other => {
            let text = value_to_text(other);
            if text.trim().is_empty() {
                Vec::new()
            } else {
                vec![text]
            }
        }
    }
}

fn confidence(value: Option<Value>) -> Result<u8, ParseError> {
    let score = match value {
        None => return Ok(0),
        Some(Value::Number(n)) => n
            .as_f64()
            .ok_or_else(|| ParseError::Schema("confidence_score is not a number".to_string()))?,
        Some(Value::String(s)) => s.trim().trim_end_matches('%').parse::<f64>().map_err(|_| {
            ParseError::Schema(format!("confidence_score {:?} is not a number", s))
        })?,
        Some(other) => {
            return Err(ParseError::Schema(format!(
                "confidence_score must be a number, got {}",
                json_kind(&other)
            )))
        }
    };
    if !(0.0..=100.0).contains(&score) {
        return Err(ParseError::ConfidenceOutOfRange(score));
    }
    Ok(score.round() as u8)
}

fn tool_call_list(value: Value) -> Result<Vec<ToolCallRecord>, ParseError> {
    let items = match value {
        Value::Array(items) => items,
        Value::Null => return Ok(Vec::new()),
        other => {
            return Err(ParseError::Schema(format!(
                "tool_calls must be a list, got {}",
                json_kind(&other)
            )))
        }
    };

    items
        .into_iter()
        .map(|item| match item {
            Value::String(name) => Ok(ToolCallRecord {
                name,
                args: Value::Object(Map::new()),
                id: String::new(),
            }),
            Value::Object(mut object) => {
                let name = take_any(&mut object, &["name", "tool"])
                    .map(value_to_text)
                    .filter(|n| !n.trim().is_empty())
                    .ok_or_else(|| ParseError::Schema("tool call without a name".to_string()))?;
                let args = take_any(&mut object, &["args", "arguments"])
                    .unwrap_or_else(|| Value::Object(Map::new()));
                let id = take_any(&mut object, &["id"])
                    .map(value_to_text)
                    .unwrap_or_default();
                Ok(ToolCallRecord { name, args, id })
            }
            other => Err(ParseError::Schema(format!(
                "tool call must be an object, got {}",
                json_kind(&other)
            ))),
        })
        .collect()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_full_response_parses() {
        let response = StructuredResponse::from_value(json!({
            "question": "What is the capital of France?",
            "plan": ["Recall European capitals"],
            "answer": "Paris",
            "confidence_score": 95,
            "chain of reasoning": ["France's capital is Paris"]
        }))
        .unwrap();

        assert_eq!(response.answer.as_text(), "Paris");
        assert_eq!(response.confidence_score, 95);
        assert_eq!(response.chain_of_reasoning, vec!["France's capital is Paris"]);
    }

    #[test]
    fn test_confidence_out_of_range_is_rejected() {
        for bad in [json!(101), json!(-1), json!("150")] {
            let err = StructuredResponse::from_value(json!({
                "answer": "x",
                "confidence_score": bad
            }))
            .unwrap_err();
            assert!(matches!(err, ParseError::ConfidenceOutOfRange(_)), "{:?}", err);
        }
    }

    #[test]
    fn test_lenient_shapes() {
        let response = StructuredResponse::from_value(json!({
            "task": "write code",
            "plan": "single step",
            "answer": ["def main():", "    return 1"],
            "confidence_score": "80",
        }))
        .unwrap();

        assert_eq!(response.question, "write code");
        assert_eq!(response.plan, vec!["single step"]);
        assert_eq!(response.answer.as_text(), "def main():\n    return 1");
        assert_eq!(response.confidence_score, 80);
    }

    #[test]
    fn test_non_object_is_schema_error() {
        assert!(matches!(
            StructuredResponse::from_value(json!(["a"])),
            Err(ParseError::Schema(_))
        ));
    }

    #[test]
    fn test_approval_status_is_exact() {
        assert_eq!(ApprovalStatus::parse("COMPLETED"), Some(ApprovalStatus::Completed));
        assert_eq!(ApprovalStatus::parse("not completed"), Some(ApprovalStatus::Working));
        assert_eq!(ApprovalStatus::parse("rejected"), Some(ApprovalStatus::Rejected));
        assert_eq!(ApprovalStatus::parse("COMPLETED, mostly"), None);
    }

    #[test]
    fn test_approval_response_accepts_legacy_keys() {
        let approval = ApprovalResponse::from_value(json!({
            "approval": "NOT COMPLETED",
            "accepted answer": "",
            "confidence_score": 40,
        }))
        .unwrap();
        assert_eq!(approval.status, ApprovalStatus::Working);
        assert_eq!(approval.accepted_answer, None);

        assert!(ApprovalResponse::from_value(json!({"status": "maybe"})).is_err());
        assert!(ApprovalResponse::from_value(json!({"feedback": "ok"})).is_err());
    }

    #[test]
    fn test_approval_serialises_tagged_status() {
        let approval = ApprovalResponse {
            status: ApprovalStatus::Completed,
            feedback: "good".into(),
            accepted_answer: Some("Paris".into()),
            confidence_score: 90,
            chain_of_reasoning: vec![],
        };
        let value = serde_json::to_value(&approval).unwrap();
        assert_eq!(value["status"], "COMPLETED");
    }

    #[test]
    fn test_tool_call_plan() {
        let plan = ToolCallPlan::from_value(json!({
            "tool_calls": [
                {"name": "shout", "args": {"text": "hi"}, "id": "a1"},
                "run_python"
            ]
        }))
        .unwrap();
        assert_eq!(plan.tool_calls.len(), 2);
        assert_eq!(plan.tool_calls[0].args["text"], "hi");
        assert_eq!(plan.tool_calls[1].name, "run_python");

        assert!(ToolCallPlan::from_value(json!({"tool_calls": [{"args": {}}]})).is_err());
    }
}
