//! Python entrypoints written next to generated code.
//!
//! Both harnesses import the generated module, run it, and print one JSON
//! document between the result markers so the host never has to interpret
//! free-form output.

use super::report::{BEGIN_MARKER, END_MARKER};

/// Module name the generated code is written under.
pub const SOLUTION_MODULE: &str = "solution";
/// Module name the test suite is written under.
pub const TEST_MODULE: &str = "test_solution";
pub const ENTRYPOINT: &str = "main.py";

/// Test file contents: the suite with the solution's names in scope.
pub fn test_module_source(suite_source: &str) -> String {
    format!("from {} import *\n\n{}\n", SOLUTION_MODULE, suite_source)
}

/// Entrypoint that runs every `test_*` method of `class_name`.
///
/// Assertion failures land in `failed`; any other exception, including one
/// raised while importing the solution, lands in `errors`.
pub fn test_harness(class_name: &str) -> String {
    format!(
        r#"import json
import traceback

results = {{"passed": [], "failed": [], "errors": []}}

try:
    import {test_module}
    suite_class = getattr({test_module}, {class_literal})
    instance = suite_class()
except Exception as exc:
    results["errors"].append({{
        "name": "<import>",
        "type": type(exc).__name__,
        "message": str(exc),
        "details": traceback.format_exc(),
    }})
else:
    for name in sorted(dir(instance)):
        if not name.startswith("test_"):
            continue
        method = getattr(instance, name)
        if not callable(method):
            continue
        try:
            if hasattr(instance, "setUp"):
                instance.setUp()
            method()
            results["passed"].append(name)
        except AssertionError as exc:
            results["failed"].append({{
                "name": name,
                "error": str(exc),
                "details": traceback.format_exc(),
            }})
        except Exception as exc:
            results["errors"].append({{
                "name": name,
                "type": type(exc).__name__,
                "message": str(exc),
                "details": traceback.format_exc(),
            }})
        finally:
            if hasattr(instance, "tearDown"):
                try:
                    instance.tearDown()
                except Exception:
                    pass

print({begin:?})
print(json.dumps(results, default=repr))
print({end:?})
"#,
        test_module = TEST_MODULE,
        class_literal = python_string(class_name),
        begin = BEGIN_MARKER,
        end = END_MARKER,
    )
}

/// Entrypoint that calls the solution's `main()` and reports its return value.
pub fn tool_harness() -> String {
    format!(
        r#"import json
import traceback

result = {{"success": False, "output": None, "error": None}}

try:
    import {solution}
    result["output"] = {solution}.main()
    result["success"] = True
except Exception as exc:
    result["error"] = "%s: %s" % (type(exc).__name__, exc)
    result["details"] = traceback.format_exc()

print({begin:?})
print(json.dumps(result, default=repr))
print({end:?})
"#,
        solution = SOLUTION_MODULE,
        begin = BEGIN_MARKER,
        end = END_MARKER,
    )
}

/// Quote `value` as a Python string literal.
fn python_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

/// True if `name` is a valid Python identifier (ASCII subset).
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_harness_embeds_class_and_markers() {
        let harness = test_harness("TestAdd");
        assert!(harness.contains(r#"getattr(test_solution, "TestAdd")"#));
        assert!(harness.contains(r#"print("--- BEGIN JSON RESULTS ---")"#));
        assert!(harness.contains(r#"print("--- END JSON RESULTS ---")"#));
        assert!(harness.contains("except AssertionError"));
    }

    #[test]
    fn test_tool_harness_calls_main() {
        let harness = tool_harness();
        assert!(harness.contains("import solution"));
        assert!(harness.contains("solution.main()"));
    }

    #[test]
    fn test_test_module_imports_solution() {
        let source = test_module_source("class TestX:\n    pass");
        assert!(source.starts_with("from solution import *"));
    }

    #[test]
    fn test_identifier_check() {
        assert!(is_identifier("TestCalculator"));
        assert!(is_identifier("_T1"));
        assert!(!is_identifier("1Test"));
        assert!(!is_identifier("Test-Case"));
        assert!(!is_identifier(""));
    }
}
