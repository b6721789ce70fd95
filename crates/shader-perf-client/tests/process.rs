#![cfg(unix)]

use std::{path::PathBuf, time::Duration};

use shader_perf_client::{
    CompilerConfig, CompilerError, OfflineCompiler, RunStatus, ShaderCompiler,
};
use tempfile::tempdir;

// `/bin/sh <script> [-c model] [-d]` stands in for the real compiler: the stage
// path becomes the script and the extra flags become positional parameters.
fn shell_compiler(timeout: Duration) -> OfflineCompiler {
    OfflineCompiler::with_config(CompilerConfig {
        executable: PathBuf::from("/bin/sh"),
        timeout,
        gpu_model: Some("Mali-G78".to_string()),
        verbose: false,
    })
}

fn write_script(dir: &std::path::Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, body).expect("write script");
    path
}

#[tokio::test]
async fn successful_run_captures_stdout() {
    let dir = tempdir().expect("tempdir");
    let script = write_script(
        dir.path(),
        "ok.sh",
        "printf 'Work registers: 18\\nBound: T\\n'\nprintf 'gpu=%s %s\\n' \"$1\" \"$2\" >&2\n",
    );

    let output = shell_compiler(Duration::from_secs(10))
        .analyze(&script)
        .await
        .expect("run");

    assert_eq!(output.status, RunStatus::Success);
    assert!(output.stdout.contains("Work registers: 18"));
    assert_eq!(output.stderr.trim(), "gpu=-c Mali-G78");
    assert_eq!(output.report_text(), output.stdout);
}

#[tokio::test]
async fn non_zero_exit_is_a_labelled_failure() {
    let dir = tempdir().expect("tempdir");
    let script = write_script(
        dir.path(),
        "fail.sh",
        "echo 'compiled 0 lines'\necho 'ERROR: syntax error' >&2\nexit 3\n",
    );

    let output = shell_compiler(Duration::from_secs(10))
        .analyze(&script)
        .await
        .expect("run");

    assert_eq!(output.status, RunStatus::Failed(Some(3)));
    let text = output.report_text();
    assert!(text.contains("ERROR: syntax error"));
    assert!(text.contains("compiled 0 lines"));
}

#[tokio::test]
async fn timeout_kills_process_and_keeps_partial_output() {
    let dir = tempdir().expect("tempdir");
    let script = write_script(
        dir.path(),
        "slow.sh",
        "echo 'partial report'\nexec sleep 10\n",
    );

    let output = shell_compiler(Duration::from_millis(500))
        .analyze(&script)
        .await
        .expect("run");

    assert_eq!(output.status, RunStatus::TimedOut);
    assert!(output.stdout.contains("partial report"));
}

#[tokio::test]
async fn missing_executable_is_a_hard_error() {
    let compiler = OfflineCompiler::with_config(CompilerConfig {
        executable: PathBuf::from("/nonexistent/malioc"),
        ..CompilerConfig::default()
    });

    let error = compiler
        .analyze(std::path::Path::new("shader.frag"))
        .await
        .expect_err("spawn should fail");
    assert!(matches!(error, CompilerError::Spawn { .. }));
    assert!(error.to_string().contains("/nonexistent/malioc"));
}
