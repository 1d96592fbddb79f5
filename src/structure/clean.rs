//! Normalisation of raw model text before JSON parsing.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use super::ParseError;

fn system_token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Chat-template control tokens: `<|im_end|>`, `<s>`, `</s>`.
    RE.get_or_init(|| Regex::new(r"<\|[^|<>]*\|>|</?s>").expect("static regex"))
}

fn fence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^\s*```[A-Za-z0-9_+-]*\s*$").expect("static regex"))
}

/// Remove chat-template control tokens that appear outside JSON string
/// literals. Text inside `"..."` is kept byte for byte.
pub fn remove_system_tokens(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut segment_start = 0;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => {
                    in_string = false;
                    out.push_str(&text[segment_start..=i]);
                    segment_start = i + 1;
                }
                _ => {}
            }
        } else if c == '"' {
            out.push_str(&system_token_re().replace_all(&text[segment_start..i], ""));
            in_string = true;
            segment_start = i;
        }
    }

    let rest = &text[segment_start..];
    if in_string {
        out.push_str(rest);
    } else {
        out.push_str(&system_token_re().replace_all(rest, ""));
    }
    out
}

/// Remove Markdown code fence lines (```` ```json ````, ```` ```python ````, ```` ``` ````).
pub fn strip_tags(text: &str) -> String {
    fence_re().replace_all(text, "").trim().to_string()
}

/// Both of the above, trimmed.
pub fn clean_response(text: &str) -> String {
    strip_tags(&remove_system_tokens(text)).trim().to_string()
}

/// First balanced `{...}` object in `text`, honouring string literals.
///
/// If the text opens an object that never closes, the remainder from the
/// opening brace is returned so [`repair_json`] can attempt to close it.
pub fn extract_json_string(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    Some(&text[start..])
}

/// Best-effort fixes for the mistakes models make most: trailing commas,
/// truncated output, and smart quotes around keys.
pub fn repair_json(text: &str) -> String {
    let text = text
        .replace(|c: char| c == '\u{201c}' || c == '\u{201d}', "\"")
        .replace(|c: char| c == '\u{2018}' || c == '\u{2019}', "'");

    let mut out = String::with_capacity(text.len() + 8);
    let mut closers: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for c in text.chars() {
        if in_string {
            out.push(c);
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            '{' => {
                closers.push('}');
                out.push(c);
            }
            '[' => {
                closers.push(']');
                out.push(c);
            }
            '}' | ']' => {
                trim_trailing_comma(&mut out);
                if closers.last() == Some(&c) {
                    closers.pop();
                }
                out.push(c);
            }
            _ => out.push(c),
        }
    }

    if in_string {
        if escaped {
            out.pop();
        }
        out.push('"');
    }
    while let Some(closer) = closers.pop() {
        trim_trailing_comma(&mut out);
        out.push(closer);
    }
    out
}

fn trim_trailing_comma(out: &mut String) {
    let trimmed_len = out.trim_end().len();
    if out[..trimmed_len].ends_with(',') {
        out.truncate(trimmed_len - 1);
    }
}

/// Clean, extract and parse the first JSON object in model text, repairing it
/// if strict parsing fails.
pub fn parse_json_lenient(text: &str) -> Result<Value, ParseError> {
    let unfenced = strip_tags(text);
    let extracted = extract_json_string(&unfenced).ok_or(ParseError::NoJson)?;
    let cleaned = remove_system_tokens(extracted);
    let candidate = cleaned.as_str();

    match serde_json::from_str::<Value>(candidate) {
        Ok(value) => Ok(value),
        Err(strict_err) => {
            let repaired = repair_json(candidate);
            serde_json::from_str::<Value>(&repaired).map_err(|_| {
                tracing::debug!("JSON repair failed; original error: {}", strict_err);
                ParseError::Syntax(strict_err.to_string())
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_tags_removes_fences() {
        assert_eq!(strip_tags("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(
            strip_tags("```python\ndef main():\n    return 1\n```"),
            "def main():\n    return 1"
        );
    }

    #[test]
    fn test_remove_system_tokens() {
        assert_eq!(remove_system_tokens("<|im_start|>hi<|im_end|>"), "hi");
        assert_eq!(remove_system_tokens("<s>answer</s>"), "answer");
        assert_eq!(
            remove_system_tokens("<sub-task>keep</sub-task>"),
            "<sub-task>keep</sub-task>"
        );
        assert_eq!(
            remove_system_tokens(r#"{"a": "<|eot|> and <s>"}<|im_end|>"#),
            r#"{"a": "<|eot|> and <s>"}"#
        );
    }

    #[test]
    fn test_tags_inside_string_values_survive() {
        let text = r#"<|im_start|>{"answer": "Wrap it in <code> tags, then <br> and Vec<T>", "note": "<div></div>"}<|im_end|>"#;
        let value = parse_json_lenient(text).unwrap();
        assert_eq!(value["answer"], "Wrap it in <code> tags, then <br> and Vec<T>");
        assert_eq!(value["note"], "<div></div>");
    }

    #[test]
    fn test_extract_json_skips_prose_and_braces_in_strings() {
        let text = r#"Sure! {"answer": "use {braces}", "n": {"x": 1}} trailing"#;
        assert_eq!(
            extract_json_string(text),
            Some(r#"{"answer": "use {braces}", "n": {"x": 1}}"#)
        );
        assert_eq!(extract_json_string("no json here"), None);
    }

    #[test]
    fn test_repair_trailing_commas_and_truncation() {
        let fixed = repair_json(r#"{"plan": ["a", "b",], "answer": "x",}"#);
        let value: Value = serde_json::from_str(&fixed).unwrap();
        assert_eq!(value["plan"][1], "b");

        let fixed = repair_json(r#"{"answer": "Paris", "chain_of_reasoning": ["capital"#);
        let value: Value = serde_json::from_str(&fixed).unwrap();
        assert_eq!(value["chain_of_reasoning"][0], "capital");
    }

    #[test]
    fn test_parse_json_lenient() {
        let value = parse_json_lenient("```json\n{\"answer\": \"Paris\",}\n```").unwrap();
        assert_eq!(value["answer"], "Paris");

        assert!(matches!(
            parse_json_lenient("plain words"),
            Err(ParseError::NoJson)
        ));
        assert!(matches!(
            parse_json_lenient("{\"a\": tru}"),
            Err(ParseError::Syntax(_))
        ));
    }
}
