//! Sandboxed execution of model-generated Python.
//!
//! [`CodeTester`] runs a test class against generated code; [`ToolRunner`]
//! runs generated code's `main()` and returns its value. Both write a temporary
//! workspace, launch it through [`process`] and read back the JSON the harness
//! prints between [`BEGIN_MARKER`] and [`END_MARKER`].

mod harness;
mod process;
mod report;
mod runner;
mod tester;

pub use process::{
    run_entrypoint, SandboxBackend, SandboxConfig, SandboxError, SandboxOutput, SandboxResult,
};
pub use report::{
    extract_marked_json, TestErrorRecord, TestFailure, TestReport, ToolRunReport, BEGIN_MARKER,
    END_MARKER,
};
pub use runner::ToolRunner;
#[cfg(test)]
pub(crate) use process::command_on_path;
pub use tester::{CodeTester, TestSuite};

/// Join code delivered as a list of lines.
pub fn join_code_lines<S: AsRef<str>>(lines: &[S]) -> String {
    let mut code = lines
        .iter()
        .map(|l| l.as_ref())
        .collect::<Vec<_>>()
        .join("\n");
    code.push('\n');
    code
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_code_lines() {
        assert_eq!(
            join_code_lines(&["def main():", "    return 1"]),
            "def main():\n    return 1\n"
        );
    }
}
