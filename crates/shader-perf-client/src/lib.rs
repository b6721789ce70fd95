pub mod gpu;
pub mod report_store;
pub mod settings;

pub use gpu::{GpuArchitecture, GpuModel};
pub use report_store::{sanitize_file_stem, write_stage_pair, ReportStore, StagePaths};
pub use settings::{AnalyzerSettings, SettingsError, SettingsStore};

use std::{
    ffi::OsString,
    fmt,
    path::{Path, PathBuf},
    process::Stdio,
    time::Duration,
};

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tokio::{
    io::{AsyncRead, AsyncReadExt},
    process::Command,
    task::JoinHandle,
};
use tracing::{debug, instrument, warn};

/// Executable name used when no explicit compiler path is configured.
pub const DEFAULT_EXECUTABLE: &str = "malioc";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// How long to keep reading pipes after a timed-out child was killed.
const DRAIN_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum CompilerError {
    #[error("failed to start offline compiler `{executable}`: {source}")]
    Spawn {
        executable: String,
        #[source]
        source: std::io::Error,
    },
    #[error("offline compiler I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct CompilerConfig {
    pub executable: PathBuf,
    pub timeout: Duration,
    /// GPU model passed with `-c`; `None` lets the compiler pick its default target.
    pub gpu_model: Option<String>,
    /// Adds `-d` for the compiler's verbose output.
    pub verbose: bool,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            executable: PathBuf::from(DEFAULT_EXECUTABLE),
            timeout: DEFAULT_TIMEOUT,
            gpu_model: None,
            verbose: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "code", rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    /// Non-zero exit; `None` when the process was terminated by a signal.
    Failed(Option<i32>),
    TimedOut,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Success => write!(f, "success"),
            RunStatus::Failed(Some(code)) => write!(f, "exit code {code}"),
            RunStatus::Failed(None) => write!(f, "terminated by signal"),
            RunStatus::TimedOut => write!(f, "timed out"),
        }
    }
}

/// Captured result of one compiler invocation.
#[derive(Debug, Clone, Serialize)]
pub struct CompilerOutput {
    pub stdout: String,
    pub stderr: String,
    pub status: RunStatus,
}

impl CompilerOutput {
    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Success
    }

    /// Text to feed the metrics extractor: stdout on success, both streams otherwise.
    pub fn report_text(&self) -> String {
        if self.is_success() {
            return self.stdout.clone();
        }
        [self.stderr.trim_end(), self.stdout.trim_end()]
            .into_iter()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Anything able to produce a diagnostic report for a shader stage file.
#[async_trait]
pub trait ShaderCompiler: Send + Sync {
    async fn analyze(&self, path: &Path) -> Result<CompilerOutput, CompilerError>;
}

#[derive(Debug, Clone, Default)]
pub struct OfflineCompiler {
    config: CompilerConfig,
}

impl OfflineCompiler {
    pub fn with_config(config: CompilerConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn new() -> Self {
        Self::with_config(CompilerConfig::default())
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Command-line arguments for analyzing `path`.
    pub fn arguments(&self, path: &Path) -> Vec<OsString> {
        let mut args = vec![path.as_os_str().to_os_string()];
        if let Some(model) = self.config.gpu_model.as_deref().filter(|m| !m.is_empty()) {
            args.push(OsString::from("-c"));
            args.push(OsString::from(model));
        }
        if self.config.verbose {
            args.push(OsString::from("-d"));
        }
        args
    }

    /// Runs `--version`; a successful status means the installation is usable.
    pub async fn version(&self) -> Result<CompilerOutput, CompilerError> {
        self.run(vec![OsString::from("--version")]).await
    }

    async fn run(&self, args: Vec<OsString>) -> Result<CompilerOutput, CompilerError> {
        let executable = &self.config.executable;
        debug!(
            target: "shader_perf_client",
            executable = %executable.display(),
            args = ?args,
            "spawning offline compiler"
        );

        let mut child = Command::new(executable)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| CompilerError::Spawn {
                executable: executable.display().to_string(),
                source,
            })?;

        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = match tokio::time::timeout(self.config.timeout, child.wait()).await {
            Ok(result) => {
                let status = result?;
                if status.success() {
                    RunStatus::Success
                } else {
                    RunStatus::Failed(status.code())
                }
            }
            Err(_) => {
                warn!(
                    target: "shader_perf_client",
                    executable = %executable.display(),
                    timeout_secs = self.config.timeout.as_secs_f64(),
                    "offline compiler timed out; killing process"
                );
                if let Err(error) = child.kill().await {
                    warn!(target: "shader_perf_client", error = %error, "failed to kill compiler");
                }
                RunStatus::TimedOut
            }
        };

        let grace = (status == RunStatus::TimedOut).then_some(DRAIN_GRACE);
        let output = CompilerOutput {
            stdout: collect(stdout, grace).await,
            stderr: collect(stderr, grace).await,
            status,
        };
        debug!(
            target: "shader_perf_client",
            status = %output.status,
            stdout_bytes = output.stdout.len(),
            stderr_bytes = output.stderr.len(),
            "offline compiler finished"
        );
        Ok(output)
    }
}

#[async_trait]
impl ShaderCompiler for OfflineCompiler {
    #[instrument(name = "offline_compiler.analyze", skip(self))]
    async fn analyze(&self, path: &Path) -> Result<CompilerOutput, CompilerError> {
        self.run(self.arguments(path)).await
    }
}

fn drain<R>(stream: Option<R>) -> JoinHandle<String>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buffer = Vec::new();
        if let Some(mut stream) = stream {
            if let Err(error) = stream.read_to_end(&mut buffer).await {
                debug!(target: "shader_perf_client", error = %error, "pipe read interrupted");
            }
        }
        String::from_utf8_lossy(&buffer).into_owned()
    })
}

async fn collect(handle: JoinHandle<String>, grace: Option<Duration>) -> String {
    match grace {
        Some(limit) => match tokio::time::timeout(limit, handle).await {
            Ok(joined) => joined.unwrap_or_default(),
            Err(_) => String::new(),
        },
        None => handle.await.unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arguments_include_gpu_and_verbose_flags() {
        let compiler = OfflineCompiler::with_config(CompilerConfig {
            gpu_model: Some("Mali-G78".to_string()),
            verbose: true,
            ..CompilerConfig::default()
        });
        let args = compiler.arguments(Path::new("/tmp/shader.frag"));
        assert_eq!(
            args,
            vec![
                OsString::from("/tmp/shader.frag"),
                OsString::from("-c"),
                OsString::from("Mali-G78"),
                OsString::from("-d"),
            ]
        );
    }

    #[test]
    fn empty_gpu_model_is_not_forwarded() {
        let compiler = OfflineCompiler::with_config(CompilerConfig {
            gpu_model: Some(String::new()),
            ..CompilerConfig::default()
        });
        assert_eq!(compiler.arguments(Path::new("a.vert")).len(), 1);
    }

    #[test]
    fn failed_report_text_keeps_both_streams() {
        let output = CompilerOutput {
            stdout: "partial\n".to_string(),
            stderr: "error: bad token\n".to_string(),
            status: RunStatus::Failed(Some(1)),
        };
        assert_eq!(output.report_text(), "error: bad token\npartial");
        assert!(!output.is_success());
    }

    #[test]
    fn run_status_display() {
        assert_eq!(RunStatus::Failed(Some(3)).to_string(), "exit code 3");
        assert_eq!(RunStatus::TimedOut.to_string(), "timed out");
    }
}
