use std::{path::PathBuf, sync::Arc};

use shader_perf_client::{AnalyzerSettings, OfflineCompiler};
use tracing::debug;

pub mod analysis;
pub mod extract;
pub mod markdown;
pub mod metrics;
pub mod pipeline;
pub mod report;
pub mod source;
pub mod suggestions;
pub mod variants;
pub mod version;

pub use analysis::{StageAnalysis, StageOutcome, VariantAnalysis, VariantInfo};
pub use extract::{extract_section, extract_stage};
pub use metrics::{extract_metrics, PerformanceMetrics, ShaderProperty};
pub use pipeline::{analyze_reports, AnalysisOptions, AnalysisPipeline};
pub use report::{render_report, ReportHeader};
pub use source::{DumpDirectoryProvider, ShaderPlatform, ShaderSourceProvider, SourceError};
pub use suggestions::{generate_suggestions, OptimizationSuggestion, Priority};
pub use variants::{segment_variants, ShaderVariant, Stage};
pub use version::normalize_version;

/// Builds a pipeline backed by the offline compiler described in `settings`.
///
/// Stage files land in `work_dir`, or in a `stages` folder next to the saved reports.
pub fn bootstrap(settings: &AnalyzerSettings, work_dir: Option<PathBuf>) -> AnalysisPipeline {
    let compiler = OfflineCompiler::with_config(settings.compiler_config());
    let options = AnalysisOptions {
        work_dir: work_dir.unwrap_or_else(|| settings.output_dir.join("stages")),
        include_all_variants: settings.include_all_variants,
        ..AnalysisOptions::default()
    };
    debug!(
        target: "shader_perf_core",
        compiler = ?compiler.config().executable,
        work_dir = ?options.work_dir,
        include_all_variants = options.include_all_variants,
        "pipeline ready"
    );
    AnalysisPipeline::new(Arc::new(compiler), options)
}
