//! End-to-end analysis: dump text in, per-variant metrics and suggestions out.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result};
use futures::{stream, StreamExt, TryStreamExt};
use shader_perf_client::{write_stage_pair, ShaderCompiler};
use tracing::{debug, info, instrument, warn};

use crate::{
    analysis::{StageAnalysis, VariantAnalysis, VariantInfo},
    source::{ShaderPlatform, ShaderSourceProvider},
    variants::{segment_variants, ShaderVariant, Stage},
};

const DEFAULT_CONCURRENCY: usize = 4;

#[derive(Debug, Clone)]
pub struct AnalysisOptions {
    /// Directory that receives the extracted `.vert`/`.frag` files.
    pub work_dir: PathBuf,
    pub include_all_variants: bool,
    /// Variants analyzed at once; each variant runs two compiler processes.
    pub concurrency: usize,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            work_dir: std::env::temp_dir().join("shader-perf"),
            include_all_variants: false,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

#[derive(Clone)]
pub struct AnalysisPipeline {
    compiler: Arc<dyn ShaderCompiler>,
    options: AnalysisOptions,
}

impl AnalysisPipeline {
    pub fn new(compiler: Arc<dyn ShaderCompiler>, options: AnalysisOptions) -> Self {
        Self { compiler, options }
    }

    pub fn options(&self) -> &AnalysisOptions {
        &self.options
    }

    /// Runs the compiler on one stage file. Tool failures become a failed outcome.
    #[instrument(name = "pipeline.analyze_stage", skip(self))]
    pub async fn analyze_stage(&self, stage: Stage, path: &Path) -> StageAnalysis {
        match self.compiler.analyze(path).await {
            Ok(output) => {
                if !output.is_success() {
                    warn!(
                        target: "shader_perf_core",
                        %stage,
                        status = %output.status,
                        "offline compiler did not produce a clean report"
                    );
                }
                StageAnalysis::from_output(stage, Some(path.to_path_buf()), &output)
            }
            Err(error) => {
                warn!(
                    target: "shader_perf_core",
                    %stage,
                    error = %error,
                    "offline compiler could not be run"
                );
                StageAnalysis::failed(stage, Some(path.to_path_buf()), error.to_string())
            }
        }
    }

    /// Analyzes stage files that already exist on disk.
    pub async fn analyze_files(&self, vertex_path: &Path, fragment_path: &Path) -> VariantAnalysis {
        let (vertex, fragment) = tokio::join!(
            self.analyze_stage(Stage::Vertex, vertex_path),
            self.analyze_stage(Stage::Fragment, fragment_path)
        );
        VariantAnalysis::new(None, vertex, fragment)
    }

    /// Writes the variant's stage sources under `<work_dir>/<stem>.*` and analyzes them.
    pub async fn analyze_variant(&self, variant: &ShaderVariant, stem: &str) -> Result<VariantAnalysis> {
        let paths = write_stage_pair(
            &self.options.work_dir,
            stem,
            &variant.vertex_source,
            &variant.fragment_source,
        )
        .await
        .with_context(|| format!("failed to write stage files for variant {}", variant.label()))?;

        let (vertex, fragment) = tokio::join!(
            self.analyze_stage(Stage::Vertex, &paths.vertex),
            self.analyze_stage(Stage::Fragment, &paths.fragment)
        );
        Ok(VariantAnalysis::new(Some(VariantInfo::from(variant)), vertex, fragment))
    }

    /// Segments a compiled dump and analyzes its variants in (pass, keywords) order.
    pub async fn analyze_blob(&self, text: &str) -> Result<Vec<VariantAnalysis>> {
        let variants = select_variants(segment_variants(text), self.options.include_all_variants);
        if variants.is_empty() {
            warn!(target: "shader_perf_core", "no vertex/fragment pairs found in dump");
            return Ok(Vec::new());
        }

        info!(
            target: "shader_perf_core",
            variants = variants.len(),
            concurrency = self.options.concurrency,
            "analyzing shader variants"
        );

        stream::iter(variants.iter().enumerate())
            .map(|(index, variant)| async move {
                self.analyze_variant(variant, &variant.file_stem(index)).await
            })
            .buffered(self.options.concurrency.max(1))
            .try_collect()
            .await
    }

    /// Fetches the compiled dump for `shader` and analyzes it.
    #[instrument(name = "pipeline.analyze_shader", skip(self, provider))]
    pub async fn analyze_shader(
        &self,
        provider: &dyn ShaderSourceProvider,
        shader: &str,
        platform: ShaderPlatform,
    ) -> Result<Vec<VariantAnalysis>> {
        let text = provider
            .compile_shader_source(shader, platform, self.options.include_all_variants)
            .await
            .with_context(|| format!("failed to obtain compiled source for `{shader}`"))?;
        debug!(target: "shader_perf_core", bytes = text.len(), "compiled source ready");
        self.analyze_blob(&text).await
    }
}

/// Builds an analysis from compiler reports saved by an earlier run.
pub fn analyze_reports(vertex_report: &str, fragment_report: &str) -> VariantAnalysis {
    VariantAnalysis::new(
        None,
        StageAnalysis::from_report(Stage::Vertex, vertex_report),
        StageAnalysis::from_report(Stage::Fragment, fragment_report),
    )
}

/// Sorts by (pass, keywords); keeps only the first unless `include_all`.
pub fn select_variants(mut variants: Vec<ShaderVariant>, include_all: bool) -> Vec<ShaderVariant> {
    variants.sort_by(|a, b| (&a.pass_name, &a.keywords).cmp(&(&b.pass_name, &b.keywords)));
    if !include_all {
        variants.truncate(1);
    }
    variants
}
