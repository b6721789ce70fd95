use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use shader_perf_client::{CompilerError, CompilerOutput, RunStatus, ShaderCompiler};
use shader_perf_core::{
    AnalysisOptions, AnalysisPipeline, DumpDirectoryProvider, ShaderPlatform, StageOutcome,
};
use tempfile::tempdir;

const VERTEX_REPORT: &str = "Architecture: Valhall\nWork registers: 20\n16-bit arithmetic: 80%\n";
const FRAGMENT_REPORT: &str =
    "Architecture: Valhall\nWork registers: 40\n16-bit arithmetic: 80%\nBound: T\n";

const DUMP: &str = "\
Pass: Forward
Keywords: FOG_LINEAR
#ifdef VERTEX
#version 300 es
void main() { gl_Position = vec4(0.0); }
#endif
#ifdef FRAGMENT
#version 300 es
precision mediump float;
#endif
Pass: Base
Keywords:
#ifdef VERTEX
#version 300 es
void main() {}
#endif
#ifdef FRAGMENT
#version 300 es
void main() {}
#endif
";

#[derive(Default)]
struct CannedCompiler {
    fail_fragment: bool,
    calls: Mutex<Vec<PathBuf>>,
}

#[async_trait]
impl ShaderCompiler for CannedCompiler {
    async fn analyze(&self, path: &Path) -> Result<CompilerOutput, CompilerError> {
        self.calls.lock().expect("calls").push(path.to_path_buf());
        let fragment = path.extension().is_some_and(|ext| ext == "frag");
        if fragment && self.fail_fragment {
            return Ok(CompilerOutput {
                stdout: String::new(),
                stderr: "ERROR: 0:2: syntax error".to_string(),
                status: RunStatus::Failed(Some(1)),
            });
        }
        Ok(CompilerOutput {
            stdout: if fragment { FRAGMENT_REPORT } else { VERTEX_REPORT }.to_string(),
            stderr: String::new(),
            status: RunStatus::Success,
        })
    }
}

struct MissingCompiler;

#[async_trait]
impl ShaderCompiler for MissingCompiler {
    async fn analyze(&self, _path: &Path) -> Result<CompilerOutput, CompilerError> {
        Err(CompilerError::Spawn {
            executable: "malioc".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        })
    }
}

fn pipeline(compiler: Arc<dyn ShaderCompiler>, work_dir: &Path, include_all: bool) -> AnalysisPipeline {
    AnalysisPipeline::new(
        compiler,
        AnalysisOptions {
            work_dir: work_dir.to_path_buf(),
            include_all_variants: include_all,
            concurrency: 2,
        },
    )
}

#[tokio::test]
async fn blob_analysis_keeps_first_variant_by_default() {
    let dir = tempdir().expect("tempdir");
    let compiler = Arc::new(CannedCompiler::default());
    let analyses = pipeline(compiler.clone(), dir.path(), false)
        .analyze_blob(DUMP)
        .await
        .expect("analysis");

    assert_eq!(analyses.len(), 1);
    let variant = analyses[0].variant.as_ref().expect("variant info");
    assert_eq!(variant.label(), "Base");
    assert!(analyses[0].is_success());
    assert_eq!(compiler.calls.lock().expect("calls").len(), 2);

    let vertex = std::fs::read_to_string(dir.path().join("Base_0.vert")).expect("vertex file");
    assert_eq!(vertex, "#version 310 es\nvoid main() {}");
}

#[tokio::test]
async fn blob_analysis_covers_all_variants_in_order() {
    let dir = tempdir().expect("tempdir");
    let analyses = pipeline(Arc::new(CannedCompiler::default()), dir.path(), true)
        .analyze_blob(DUMP)
        .await
        .expect("analysis");

    let labels: Vec<_> = analyses
        .iter()
        .filter_map(|analysis| analysis.variant.as_ref().map(|info| info.label()))
        .collect();
    assert_eq!(labels, vec!["Base", "Forward [FOG_LINEAR]"]);

    for analysis in &analyses {
        assert_eq!(analysis.fragment.metrics.work_registers, 40);
        let categories: Vec<_> = analysis.suggestions.iter().map(|s| s.category.as_str()).collect();
        assert_eq!(categories, vec!["Register optimization", "Texture optimization"]);
    }
    assert!(dir.path().join("Forward_1.frag").exists());
}

#[tokio::test]
async fn dump_without_pairs_yields_nothing() {
    let dir = tempdir().expect("tempdir");
    let compiler = Arc::new(CannedCompiler::default());
    let analyses = pipeline(compiler.clone(), dir.path(), true)
        .analyze_blob("Pass: Lonely\n#ifdef VERTEX\nvoid main() {}\n#endif\n")
        .await
        .expect("analysis");
    assert!(analyses.is_empty());
    assert!(compiler.calls.lock().expect("calls").is_empty());
}

#[tokio::test]
async fn failed_stage_is_reported_not_raised() {
    let dir = tempdir().expect("tempdir");
    let compiler = Arc::new(CannedCompiler {
        fail_fragment: true,
        ..CannedCompiler::default()
    });
    let vertex = dir.path().join("a.vert");
    let fragment = dir.path().join("a.frag");
    std::fs::write(&vertex, "void main() {}").expect("write");
    std::fs::write(&fragment, "void main() {").expect("write");

    let analysis = pipeline(compiler, dir.path(), false)
        .analyze_files(&vertex, &fragment)
        .await;

    assert!(analysis.vertex.is_success());
    assert_eq!(
        analysis.fragment.outcome,
        StageOutcome::Failed {
            reason: "exit code 1".to_string(),
            output: "ERROR: 0:2: syntax error".to_string(),
        }
    );
    assert_eq!(analysis.fragment.metrics.work_registers, 0);
    // Default fragment metrics still feed the rules.
    assert!(analysis
        .suggestions
        .iter()
        .any(|s| s.category == "Precision optimization"));
}

#[tokio::test]
async fn spawn_errors_become_failed_stages() {
    let dir = tempdir().expect("tempdir");
    let analysis = pipeline(Arc::new(MissingCompiler), dir.path(), false)
        .analyze_files(&dir.path().join("x.vert"), &dir.path().join("x.frag"))
        .await;

    assert!(!analysis.is_success());
    match &analysis.vertex.outcome {
        StageOutcome::Failed { reason, .. } => assert!(reason.contains("malioc")),
        StageOutcome::Analyzed => panic!("expected failure"),
    }
}

#[tokio::test]
async fn shader_analysis_reads_from_provider() {
    let dumps = tempdir().expect("dumps");
    let work = tempdir().expect("work");
    std::fs::write(dumps.path().join("Custom_Water.txt"), DUMP).expect("write dump");
    let provider = DumpDirectoryProvider::new(dumps.path());

    let analyses = pipeline(Arc::new(CannedCompiler::default()), work.path(), false)
        .analyze_shader(&provider, "Custom/Water", ShaderPlatform::Gles3)
        .await
        .expect("analysis");
    assert_eq!(analyses.len(), 1);

    let error = pipeline(Arc::new(CannedCompiler::default()), work.path(), false)
        .analyze_shader(&provider, "Custom/Missing", ShaderPlatform::Gles3)
        .await
        .expect_err("missing dump");
    assert!(error.to_string().contains("Custom/Missing"));
}
