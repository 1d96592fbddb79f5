//! Isolated execution of a generated Python entrypoint.
//!
//! The workspace directory is mounted read-only at `/app` and the entrypoint is
//! run with no network, a memory ceiling, a CPU quota and a wall-clock timeout.
//! Three backends are supported: Docker, systemd-nspawn and a plain host
//! process for machines without a container runtime.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use thiserror::Error;
use tokio::process::Command;

/// Mount point of the workspace inside the sandbox.
pub const SANDBOX_APP_DIR: &str = "/app";

const CPU_PERIOD_MICROS: u64 = 100_000;

#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("Failed to prepare sandbox workspace: {0}")]
    Workspace(#[from] std::io::Error),

    #[error("{program} not found on PATH; install it or pick another sandbox backend")]
    RuntimeMissing { program: String },

    #[error("Failed to launch {program}: {message}")]
    Launch { program: String, message: String },

    #[error("nspawn backend requires SANDBOX_ROOT to point at a container root filesystem")]
    MissingRoot,

    #[error("Invalid test suite: {0}")]
    InvalidSuite(String),
}

pub type SandboxResult<T> = Result<T, SandboxError>;

/// Where generated code runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SandboxBackend {
    Docker,
    Nspawn,
    /// Plain child process; only the timeout applies.
    Host,
}

impl SandboxBackend {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "docker" | "container" => Some(Self::Docker),
            "nspawn" | "systemd-nspawn" => Some(Self::Nspawn),
            "host" | "local" | "none" => Some(Self::Host),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Docker => "docker",
            Self::Nspawn => "nspawn",
            Self::Host => "host",
        }
    }
}

/// Resource limits and runtime selection for sandboxed runs.
#[derive(Debug, Clone)]
pub struct SandboxConfig {
    pub backend: SandboxBackend,
    /// Docker image with a Python interpreter.
    pub image: String,
    /// Root filesystem for the nspawn backend.
    pub nspawn_root: Option<PathBuf>,
    /// Interpreter used inside the sandbox.
    pub python: String,
    pub timeout: Duration,
    pub memory_mb: u64,
    /// CPU time per 100ms period, in microseconds.
    pub cpu_quota: u64,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            backend: SandboxBackend::Docker,
            image: "python:3.12-slim".to_string(),
            nspawn_root: None,
            python: "python3".to_string(),
            timeout: Duration::from_secs(30),
            memory_mb: 128,
            cpu_quota: 50_000,
        }
    }
}

impl SandboxConfig {
    /// Host-process sandbox, used where no container runtime exists.
    pub fn host() -> Self {
        Self {
            backend: SandboxBackend::Host,
            ..Self::default()
        }
    }
}

/// Raw result of one sandboxed run.
#[derive(Debug, Clone, Default)]
pub struct SandboxOutput {
    /// `None` when the process was killed or timed out.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
}

/// Program and arguments for running `entrypoint` from `workspace`.
///
/// `container_name` is used by the Docker backend so a timed-out container
/// can be killed by name.
pub fn command_line(
    config: &SandboxConfig,
    workspace: &Path,
    entrypoint: &str,
    container_name: &str,
) -> SandboxResult<(String, Vec<String>)> {
    match config.backend {
        SandboxBackend::Docker => {
            let args = vec![
                "run".to_string(),
                "--rm".to_string(),
                format!("--name={}", container_name),
                "--network=none".to_string(),
                format!("--memory={}m", config.memory_mb),
                format!("--cpu-period={}", CPU_PERIOD_MICROS),
                format!("--cpu-quota={}", config.cpu_quota),
                "-e".to_string(),
                "PYTHONDONTWRITEBYTECODE=1".to_string(),
                "-v".to_string(),
                format!("{}:{}:ro", workspace.display(), SANDBOX_APP_DIR),
                "-w".to_string(),
                SANDBOX_APP_DIR.to_string(),
                config.image.clone(),
                config.python.clone(),
                entrypoint.to_string(),
            ];
            Ok(("docker".to_string(), args))
        }
        SandboxBackend::Nspawn => {
            let root = config.nspawn_root.as_ref().ok_or(SandboxError::MissingRoot)?;
            let cpu_percent = (config.cpu_quota * 100 / CPU_PERIOD_MICROS).max(1);
            let args = vec![
                "-D".to_string(),
                root.display().to_string(),
                "--quiet".to_string(),
                "--ephemeral".to_string(),
                "--timezone=off".to_string(),
                "--private-network".to_string(),
                format!("--bind-ro={}:{}", workspace.display(), SANDBOX_APP_DIR),
                format!("--chdir={}", SANDBOX_APP_DIR),
                format!("--property=MemoryMax={}M", config.memory_mb),
                format!("--property=CPUQuota={}%", cpu_percent),
                "--setenv=PYTHONDONTWRITEBYTECODE=1".to_string(),
                config.python.clone(),
                entrypoint.to_string(),
            ];
            Ok(("systemd-nspawn".to_string(), args))
        }
        SandboxBackend::Host => Ok((
            config.python.clone(),
            vec!["-B".to_string(), entrypoint.to_string()],
        )),
    }
}

/// Run `entrypoint` (a file inside `workspace`) under the configured backend.
///
/// A timeout is reported through [`SandboxOutput::timed_out`], not as an error;
/// errors are reserved for failures to start the sandbox at all.
pub async fn run_entrypoint(
    config: &SandboxConfig,
    workspace: &Path,
    entrypoint: &str,
) -> SandboxResult<SandboxOutput> {
    let container_name = format!("rexia-sandbox-{}", uuid::Uuid::new_v4().simple());
    let (program, args) = command_line(config, workspace, entrypoint, &container_name)?;

    if !command_on_path(&program) {
        return Err(SandboxError::RuntimeMissing { program });
    }

    let mut cmd = Command::new(&program);
    cmd.args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if config.backend == SandboxBackend::Host {
        cmd.current_dir(workspace).env("PYTHONDONTWRITEBYTECODE", "1");
    }

    tracing::debug!(
        backend = config.backend.as_str(),
        "Running sandboxed entrypoint: {} {}",
        program,
        args.join(" ")
    );

    match tokio::time::timeout(config.timeout, cmd.output()).await {
        Ok(Ok(output)) => Ok(SandboxOutput {
            exit_code: output.status.code(),
            stdout: sanitize_output(&output.stdout),
            stderr: sanitize_output(&output.stderr),
            timed_out: false,
        }),
        Ok(Err(e)) => Err(SandboxError::Launch {
            program,
            message: e.to_string(),
        }),
        Err(_) => {
            tracing::warn!(
                "Sandboxed run timed out after {:?} ({})",
                config.timeout,
                config.backend.as_str()
            );
            if config.backend == SandboxBackend::Docker {
                kill_container(&container_name).await;
            }
            Ok(SandboxOutput {
                exit_code: None,
                stdout: String::new(),
                stderr: format!("Execution timed out after {:?}", config.timeout),
                timed_out: true,
            })
        }
    }
}

async fn kill_container(name: &str) {
    let result = Command::new("docker")
        .args(["kill", name])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;
    if let Err(e) = result {
        tracing::warn!("Failed to kill timed-out container {}: {}", name, e);
    }
}

pub(crate) fn command_on_path(cmd: &str) -> bool {
    if cmd.contains('/') {
        return Path::new(cmd).is_file();
    }
    std::env::var("PATH")
        .map(|path_var| {
            path_var
                .split(':')
                .filter(|dir| !dir.trim().is_empty())
                .any(|dir| PathBuf::from(dir).join(cmd).is_file())
        })
        .unwrap_or(false)
}

/// Lossy UTF-8 with control characters other than newline and tab removed.
fn sanitize_output(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .chars()
        .filter(|&c| c == '\n' || c == '\r' || c == '\t' || (c >= ' ' && c != '\u{FFFD}'))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_parse() {
        assert_eq!(SandboxBackend::parse("Docker"), Some(SandboxBackend::Docker));
        assert_eq!(SandboxBackend::parse("systemd-nspawn"), Some(SandboxBackend::Nspawn));
        assert_eq!(SandboxBackend::parse("host"), Some(SandboxBackend::Host));
        assert_eq!(SandboxBackend::parse("podman"), None);
    }

    #[test]
    fn test_docker_command_isolates_network_and_mounts_read_only() {
        let config = SandboxConfig::default();
        let (program, args) =
            command_line(&config, Path::new("/tmp/ws"), "main.py", "rexia-x").unwrap();

        assert_eq!(program, "docker");
        assert!(args.contains(&"--network=none".to_string()));
        assert!(args.contains(&"--memory=128m".to_string()));
        assert!(args.contains(&"--cpu-quota=50000".to_string()));
        assert!(args.contains(&"/tmp/ws:/app:ro".to_string()));
        assert!(args.contains(&"python:3.12-slim".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("main.py"));
    }

    #[test]
    fn test_nspawn_requires_root() {
        let config = SandboxConfig {
            backend: SandboxBackend::Nspawn,
            ..SandboxConfig::default()
        };
        let err = command_line(&config, Path::new("/tmp/ws"), "main.py", "n").unwrap_err();
        assert!(matches!(err, SandboxError::MissingRoot));
    }

    #[test]
    fn test_nspawn_command_limits() {
        let config = SandboxConfig {
            backend: SandboxBackend::Nspawn,
            nspawn_root: Some(PathBuf::from("/var/lib/machines/py")),
            ..SandboxConfig::default()
        };
        let (program, args) = command_line(&config, Path::new("/tmp/ws"), "main.py", "n").unwrap();
        assert_eq!(program, "systemd-nspawn");
        assert!(args.contains(&"--private-network".to_string()));
        assert!(args.contains(&"--bind-ro=/tmp/ws:/app".to_string()));
        assert!(args.contains(&"--property=CPUQuota=50%".to_string()));
    }

    #[test]
    fn test_sanitize_output_strips_control_chars() {
        assert_eq!(sanitize_output(b"ok\x00\x07\n"), "ok\n");
    }

    #[tokio::test]
    async fn test_missing_runtime_is_an_error() {
        let config = SandboxConfig {
            backend: SandboxBackend::Host,
            python: "definitely-not-a-python-binary".to_string(),
            ..SandboxConfig::default()
        };
        let dir = tempfile::tempdir().unwrap();
        let err = run_entrypoint(&config, dir.path(), "main.py").await.unwrap_err();
        assert!(matches!(err, SandboxError::RuntimeMissing { .. }));
    }
}
