use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use indicatif::ProgressBar;
use output::{OutputFormat, Renderer};
use progress::spinner;
use serde::Serialize;
use shader_perf_client::{
    write_stage_pair, AnalyzerSettings, GpuArchitecture, GpuModel, OfflineCompiler, ReportStore,
    SettingsStore,
};
use shader_perf_core::{
    analyze_reports, bootstrap, pipeline::select_variants, render_report, segment_variants,
    DumpDirectoryProvider, ReportHeader, ShaderPlatform, VariantAnalysis,
};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Debug, Parser, Clone)]
#[command(
    name = "shader-perf",
    version,
    about = "Analyze compiled shader variants with the Mali offline compiler."
)]
struct Cli {
    /// Preferred renderer for command output.
    #[arg(long, global = true, value_enum, default_value = "markdown")]
    format: OutputFormat,
    /// Disable ANSI colors in CLI output.
    #[arg(long, global = true)]
    no_color: bool,
    /// Suppress non-critical CLI output.
    #[arg(long, global = true)]
    quiet: bool,
    /// Disable progress indicators for long-running tasks.
    #[arg(long, global = true)]
    no_progress: bool,
    /// Settings file to use instead of the per-user default.
    #[arg(long, global = true)]
    settings: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand, Clone)]
enum Command {
    /// Split a compiled shader dump into per-variant `.vert`/`.frag` files.
    Extract {
        dump: PathBuf,
        #[arg(long)]
        out: PathBuf,
    },
    /// Run the offline compiler on a vertex/fragment pair.
    Analyze {
        #[arg(long)]
        vertex: PathBuf,
        #[arg(long)]
        fragment: PathBuf,
        /// Target GPU model (see `gpus`).
        #[arg(long)]
        gpu: Option<String>,
        /// Write the Markdown report to the output directory.
        #[arg(long)]
        save: bool,
    },
    /// Analyze a shader from its compiled dump.
    Shader {
        name: String,
        /// Directory holding `<shader>.txt` dumps.
        #[arg(long, default_value = ".")]
        dump_dir: PathBuf,
        #[arg(long, default_value = "gles3", value_parser = parse_platform)]
        platform: ShaderPlatform,
        /// Analyze every variant instead of the first one.
        #[arg(long)]
        all_variants: bool,
        #[arg(long)]
        gpu: Option<String>,
        /// Where extracted stage files are written.
        #[arg(long)]
        work_dir: Option<PathBuf>,
        #[arg(long)]
        save: bool,
    },
    /// Derive metrics and suggestions from saved compiler reports.
    Inspect {
        #[arg(long)]
        vertex_report: PathBuf,
        #[arg(long)]
        fragment_report: PathBuf,
    },
    /// List the GPU models the offline compiler can target.
    Gpus {
        #[arg(long, value_parser = parse_architecture)]
        architecture: Option<GpuArchitecture>,
    },
    /// Verify the offline compiler installation.
    Check,
    /// Show or change persisted analyzer settings.
    Settings {
        #[command(subcommand)]
        command: SettingsCommand,
    },
    /// Generate shell completion scripts.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Debug, Subcommand, Clone)]
enum SettingsCommand {
    /// Print the effective settings.
    Show,
    /// Persist a single setting.
    Set { key: String, value: String },
}

#[derive(Clone, Debug, Serialize)]
struct ExtractedVariant {
    label: String,
    vertex: PathBuf,
    fragment: PathBuf,
}

#[derive(Clone, Debug, Serialize)]
struct CompilerCheck {
    executable: String,
    available: bool,
    version: Option<String>,
    detail: Option<String>,
}

impl Cli {
    fn progress_enabled(&self) -> bool {
        !self.quiet && !self.no_progress
    }

    fn settings_store(&self) -> SettingsStore {
        self.settings
            .clone()
            .map_or_else(SettingsStore::default_location, SettingsStore::new)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli)?;

    if cli.no_color {
        std::env::set_var("NO_COLOR", "1");
    }

    let store = cli.settings_store();
    let settings = store
        .load()
        .with_context(|| format!("failed to load settings from {:?}", store.path()))?;
    let renderer = Renderer::new(cli.format);

    match &cli.command {
        Command::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(*shell, &mut command, "shader-perf", &mut std::io::stdout());
            Ok(())
        }
        Command::Extract { dump, out } => handle_extract(dump, out, &cli, &renderer).await,
        Command::Analyze {
            vertex,
            fragment,
            gpu,
            save,
        } => {
            let settings = with_gpu(settings, gpu.as_deref());
            handle_analyze(vertex, fragment, *save, &cli, &renderer, &settings).await
        }
        Command::Shader {
            name,
            dump_dir,
            platform,
            all_variants,
            gpu,
            work_dir,
            save,
        } => {
            let mut settings = with_gpu(settings, gpu.as_deref());
            settings.include_all_variants |= *all_variants;
            let provider = DumpDirectoryProvider::new(dump_dir.clone());
            handle_shader(
                name,
                &provider,
                *platform,
                work_dir.clone(),
                *save,
                &cli,
                &renderer,
                &settings,
            )
            .await
        }
        Command::Inspect {
            vertex_report,
            fragment_report,
        } => handle_inspect(vertex_report, fragment_report, &cli, &renderer, &settings),
        Command::Gpus { architecture } => {
            if cli.quiet {
                return Ok(());
            }
            let models: Vec<GpuModel> = match architecture {
                Some(architecture) => GpuModel::by_architecture(*architecture).copied().collect(),
                None => GpuModel::all().to_vec(),
            };
            renderer.gpus(&models)
        }
        Command::Check => handle_check(&cli, &renderer, &settings).await,
        Command::Settings { command } => {
            handle_settings_command(command.clone(), &cli, &renderer, &store, settings)
        }
    }
}

async fn handle_extract(dump: &Path, out: &Path, cli: &Cli, renderer: &Renderer) -> Result<()> {
    let text = fs::read_to_string(dump).with_context(|| format!("failed to read {dump:?}"))?;
    let variants = select_variants(segment_variants(&text), true);
    if variants.is_empty() {
        warn!(
            target: "shader_perf_cli",
            dump = %dump.display(),
            "no vertex/fragment pairs found"
        );
    }

    let mut extracted = Vec::with_capacity(variants.len());
    for (index, variant) in variants.iter().enumerate() {
        let paths = write_stage_pair(
            out,
            &variant.file_stem(index),
            &variant.vertex_source,
            &variant.fragment_source,
        )
        .await?;
        extracted.push(ExtractedVariant {
            label: variant.label(),
            vertex: paths.vertex,
            fragment: paths.fragment,
        });
    }

    info!(
        target: "shader_perf_cli",
        variants = extracted.len(),
        out = %out.display(),
        "extracted stage files"
    );
    if cli.quiet {
        return Ok(());
    }
    renderer.extracted(&extracted)
}

async fn handle_analyze(
    vertex: &Path,
    fragment: &Path,
    save: bool,
    cli: &Cli,
    renderer: &Renderer,
    settings: &AnalyzerSettings,
) -> Result<()> {
    let pipeline = bootstrap(settings, None);
    let spinner = spinner(cli.progress_enabled(), "Running offline compiler...");
    let analysis = pipeline.analyze_files(vertex, fragment).await;
    finish_spinner(spinner, Some(stage_summary(&analysis)));

    let shader = vertex
        .file_stem()
        .map_or_else(|| "shader".to_string(), |stem| stem.to_string_lossy().into_owned());
    let header = ReportHeader::new(shader, settings.gpu_model.clone());
    emit(&header, &[analysis], save, cli, renderer, settings).await
}

#[allow(clippy::too_many_arguments)]
async fn handle_shader(
    name: &str,
    provider: &DumpDirectoryProvider,
    platform: ShaderPlatform,
    work_dir: Option<PathBuf>,
    save: bool,
    cli: &Cli,
    renderer: &Renderer,
    settings: &AnalyzerSettings,
) -> Result<()> {
    let pipeline = bootstrap(settings, work_dir);
    let spinner = spinner(cli.progress_enabled(), format!("Analyzing `{name}`..."));
    let result = pipeline.analyze_shader(provider, name, platform).await;
    let analyses = match result {
        Ok(analyses) => {
            finish_spinner(
                spinner,
                Some(format!("Analyzed {} variant(s) of `{name}`", analyses.len())),
            );
            analyses
        }
        Err(error) => {
            finish_spinner(spinner, None);
            return Err(error.context(format!("analysis of `{name}` failed")));
        }
    };

    let header = ReportHeader::new(name, settings.gpu_model.clone());
    emit(&header, &analyses, save, cli, renderer, settings).await
}

fn handle_inspect(
    vertex_report: &Path,
    fragment_report: &Path,
    cli: &Cli,
    renderer: &Renderer,
    settings: &AnalyzerSettings,
) -> Result<()> {
    let vertex = fs::read_to_string(vertex_report)
        .with_context(|| format!("failed to read {vertex_report:?}"))?;
    let fragment = fs::read_to_string(fragment_report)
        .with_context(|| format!("failed to read {fragment_report:?}"))?;
    let analysis = analyze_reports(&vertex, &fragment);

    if cli.quiet {
        return Ok(());
    }
    let shader = vertex_report
        .file_stem()
        .map_or_else(|| "shader".to_string(), |stem| stem.to_string_lossy().into_owned());
    let header = ReportHeader::new(shader, settings.gpu_model.clone());
    renderer.analyses(&header, &[analysis])
}

async fn handle_check(cli: &Cli, renderer: &Renderer, settings: &AnalyzerSettings) -> Result<()> {
    let compiler = OfflineCompiler::with_config(settings.compiler_config());
    let executable = compiler.config().executable.display().to_string();
    let spinner = spinner(cli.progress_enabled(), format!("Checking `{executable}`..."));

    let check = match compiler.version().await {
        Ok(output) if output.is_success() => CompilerCheck {
            executable,
            available: true,
            version: output
                .stdout
                .lines()
                .map(str::trim)
                .find(|line| !line.is_empty())
                .map(str::to_string),
            detail: None,
        },
        Ok(output) => CompilerCheck {
            executable,
            available: false,
            version: None,
            detail: Some(format!("{}: {}", output.status, output.report_text().trim())),
        },
        Err(error) => CompilerCheck {
            executable,
            available: false,
            version: None,
            detail: Some(error.to_string()),
        },
    };
    finish_spinner(spinner, None);

    if !cli.quiet {
        renderer.compiler_check(&check)?;
    }
    if !check.available {
        anyhow::bail!("offline compiler `{}` is not usable", check.executable);
    }
    Ok(())
}

fn handle_settings_command(
    command: SettingsCommand,
    cli: &Cli,
    renderer: &Renderer,
    store: &SettingsStore,
    mut settings: AnalyzerSettings,
) -> Result<()> {
    match command {
        SettingsCommand::Show => {}
        SettingsCommand::Set { key, value } => {
            settings.set(&key, &value)?;
            store
                .save(&settings)
                .with_context(|| format!("failed to save settings to {:?}", store.path()))?;
            info!(
                target: "shader_perf_cli",
                key = %key,
                path = %store.path().display(),
                "setting updated"
            );
        }
    }
    if cli.quiet {
        return Ok(());
    }
    renderer.settings(store.path(), &settings)
}

async fn emit(
    header: &ReportHeader,
    analyses: &[VariantAnalysis],
    save: bool,
    cli: &Cli,
    renderer: &Renderer,
    settings: &AnalyzerSettings,
) -> Result<()> {
    if save {
        let store = ReportStore::new(settings.output_dir.clone());
        let path = store
            .write(&header.shader, &render_report(header, analyses))
            .await?;
        info!(target: "shader_perf_cli", path = %path.display(), "report saved");
        if !cli.quiet {
            eprintln!("Report saved to {}", path.display());
        }
    }
    if cli.quiet {
        return Ok(());
    }
    renderer.analyses(header, analyses)
}

/// Applies a `--gpu` override, normalizing known model names.
fn with_gpu(mut settings: AnalyzerSettings, gpu: Option<&str>) -> AnalyzerSettings {
    if let Some(name) = gpu {
        settings.gpu_model = Some(match GpuModel::find(name) {
            Some(model) => model.name.to_string(),
            None => {
                warn!(
                    target: "shader_perf_cli",
                    gpu = name,
                    "GPU model not in catalog; passing it to the compiler unchanged"
                );
                name.to_string()
            }
        });
    }
    settings
}

fn stage_summary(analysis: &VariantAnalysis) -> String {
    let state = |ok: bool| if ok { "ok" } else { "failed" };
    format!(
        "Vertex {}, fragment {}",
        state(analysis.vertex.is_success()),
        state(analysis.fragment.is_success())
    )
}

fn parse_platform(value: &str) -> Result<ShaderPlatform, String> {
    ShaderPlatform::from_str_loose(value).ok_or_else(|| {
        format!("unknown platform `{value}` (expected gles3, gles2, vulkan or metal)")
    })
}

fn parse_architecture(value: &str) -> Result<GpuArchitecture, String> {
    GpuArchitecture::from_str_loose(value)
        .ok_or_else(|| format!("unknown architecture `{value}` (expected midgard, bifrost or valhall)"))
}

fn init_tracing(cli: &Cli) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,shader_perf_cli=info"));
    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .without_time()
        .with_ansi(!cli.no_color)
        .compact()
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|error| anyhow!("failed to initialize logging: {error}"))
}

fn finish_spinner(spinner: Option<ProgressBar>, message: Option<String>) {
    if let Some(progress) = spinner {
        if let Some(msg) = message {
            progress.finish_with_message(msg);
        } else {
            progress.finish_and_clear();
        }
    }
}

mod output {
    use std::path::Path;

    use anyhow::Result;
    use clap::ValueEnum;
    use serde::Serialize;
    use serde_json::{self, Value};
    use shader_perf_client::{AnalyzerSettings, GpuModel};
    use shader_perf_core::{
        render_report, ReportHeader, StageAnalysis, StageOutcome, VariantAnalysis,
    };

    use crate::{CompilerCheck, ExtractedVariant};

    #[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
    pub enum OutputFormat {
        Json,
        Markdown,
        Text,
    }

    #[derive(Copy, Clone, Debug)]
    pub struct Renderer {
        format: OutputFormat,
    }

    #[derive(Serialize)]
    struct AnalysisPayload<'a> {
        shader: &'a str,
        gpu_model: Option<&'a str>,
        generated_at: String,
        variants: &'a [VariantAnalysis],
    }

    impl Renderer {
        pub fn new(format: OutputFormat) -> Self {
            Self { format }
        }

        pub fn analyses(&self, header: &ReportHeader, analyses: &[VariantAnalysis]) -> Result<()> {
            match self.format {
                OutputFormat::Json => {
                    let payload = AnalysisPayload {
                        shader: &header.shader,
                        gpu_model: header.gpu_model.as_deref(),
                        generated_at: header.timestamp(),
                        variants: analyses,
                    };
                    println!("{}", serde_json::to_string_pretty(&payload)?);
                }
                OutputFormat::Markdown => {
                    print!("{}", render_report(header, analyses));
                }
                OutputFormat::Text => {
                    print!("{}", analyses_text(header, analyses));
                }
            }
            Ok(())
        }

        pub fn extracted(&self, variants: &[ExtractedVariant]) -> Result<()> {
            match self.format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(variants)?);
                }
                OutputFormat::Markdown => {
                    println!("| Variant | Vertex | Fragment |");
                    println!("| --- | --- | --- |");
                    for variant in variants {
                        println!(
                            "| {} | `{}` | `{}` |",
                            variant.label,
                            variant.vertex.display(),
                            variant.fragment.display()
                        );
                    }
                }
                OutputFormat::Text => {
                    if variants.is_empty() {
                        println!("No variants extracted.");
                    }
                    for variant in variants {
                        println!("• {}", variant.label);
                        println!("  {}", variant.vertex.display());
                        println!("  {}", variant.fragment.display());
                    }
                }
            }
            Ok(())
        }

        pub fn gpus(&self, models: &[GpuModel]) -> Result<()> {
            match self.format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(models)?);
                }
                OutputFormat::Markdown => {
                    println!("| GPU | Architecture |");
                    println!("| --- | --- |");
                    for model in models {
                        println!("| {} | {} |", model.name, model.architecture);
                    }
                }
                OutputFormat::Text => {
                    for model in models {
                        println!("{:<12} {}", model.name, model.architecture);
                    }
                }
            }
            Ok(())
        }

        pub fn compiler_check(&self, check: &CompilerCheck) -> Result<()> {
            match self.format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(check)?);
                }
                OutputFormat::Markdown => {
                    println!("| Property | Value |");
                    println!("| --- | --- |");
                    println!("| Executable | `{}` |", check.executable);
                    println!("| Available | {} |", check.available);
                    println!("| Version | {} |", check.version.as_deref().unwrap_or("n/a"));
                    if let Some(detail) = &check.detail {
                        println!("| Detail | {} |", sanitize(detail));
                    }
                }
                OutputFormat::Text => {
                    if check.available {
                        println!(
                            "{} is available ({})",
                            check.executable,
                            check.version.as_deref().unwrap_or("unknown version")
                        );
                    } else {
                        println!("{} is not usable", check.executable);
                        if let Some(detail) = &check.detail {
                            println!("  {detail}");
                        }
                    }
                }
            }
            Ok(())
        }

        pub fn settings(&self, path: &Path, settings: &AnalyzerSettings) -> Result<()> {
            let values = settings_values(settings)?;
            match self.format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(settings)?);
                }
                OutputFormat::Markdown => {
                    println!("Settings file: `{}`", path.display());
                    println!();
                    println!("| Setting | Value |");
                    println!("| --- | --- |");
                    for (key, value) in values {
                        println!("| {key} | {value} |");
                    }
                }
                OutputFormat::Text => {
                    println!("Settings file: {}", path.display());
                    for (key, value) in values {
                        println!("  {key}: {value}");
                    }
                }
            }
            Ok(())
        }
    }

    fn settings_values(settings: &AnalyzerSettings) -> Result<Vec<(&'static str, String)>> {
        let value = serde_json::to_value(settings)?;
        Ok(AnalyzerSettings::KEYS
            .iter()
            .map(|key| {
                let rendered = match value.get(*key) {
                    Some(Value::String(text)) => text.clone(),
                    Some(Value::Null) | None => "(unset)".to_string(),
                    Some(other) => other.to_string(),
                };
                (*key, rendered)
            })
            .collect())
    }

    pub(crate) fn analyses_text(header: &ReportHeader, analyses: &[VariantAnalysis]) -> String {
        let mut lines = vec![format!(
            "{} ({})",
            header.shader,
            header.gpu_model.as_deref().unwrap_or("auto-detected GPU")
        )];
        if analyses.is_empty() {
            lines.push("  no variants analyzed".to_string());
        }
        for analysis in analyses {
            if let Some(info) = &analysis.variant {
                lines.push(format!("Variant {}", info.label()));
            }
            for stage in analysis.stages() {
                lines.push(stage_line(stage));
            }
            if analysis.suggestions.is_empty() {
                lines.push("  no suggestions".to_string());
            }
            let mut ranked = analysis.suggestions.clone();
            shader_perf_core::suggestions::rank(&mut ranked);
            for suggestion in &ranked {
                lines.push(format!(
                    "  [{}] {}: {}",
                    suggestion.priority, suggestion.category, suggestion.issue
                ));
            }
        }
        let mut text = lines.join("\n");
        text.push('\n');
        text
    }

    fn stage_line(stage: &StageAnalysis) -> String {
        let metrics = &stage.metrics;
        let summary = format!(
            "registers {}/{}, 16-bit {:.1}%, cycles {:.2}/{:.2}/{:.2}, bound {}",
            metrics.work_registers,
            metrics.uniform_registers,
            metrics.sixteen_bit_arithmetic,
            metrics.total_cycles,
            metrics.shortest_path_cycles,
            metrics.longest_path_cycles,
            if metrics.bottleneck_unit.is_empty() {
                "n/a"
            } else {
                metrics.bottleneck_unit.as_str()
            }
        );
        match &stage.outcome {
            StageOutcome::Analyzed => format!("  {}: {summary}", stage.stage),
            StageOutcome::Failed { reason, .. } => {
                format!("  {}: failed ({reason}); {summary}", stage.stage)
            }
        }
    }

    fn sanitize(value: &str) -> String {
        value
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

mod progress {
    use std::time::Duration;

    use indicatif::{ProgressBar, ProgressStyle};

    pub fn spinner(message_enabled: bool, message: impl Into<String>) -> Option<ProgressBar> {
        if !message_enabled {
            return None;
        }
        let progress = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        progress.set_style(style);
        progress.set_message(message.into());
        progress.enable_steady_tick(Duration::from_millis(80));
        Some(progress)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_shader_command_with_platform() {
        let cli = Cli::try_parse_from([
            "shader-perf",
            "--format",
            "json",
            "shader",
            "Custom/Water",
            "--platform",
            "GLES2",
            "--all-variants",
        ])
        .expect("parse");
        assert_eq!(cli.format, OutputFormat::Json);
        match cli.command {
            Command::Shader {
                name,
                platform,
                all_variants,
                ..
            } => {
                assert_eq!(name, "Custom/Water");
                assert_eq!(platform, ShaderPlatform::Gles2);
                assert!(all_variants);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_platform() {
        assert!(Cli::try_parse_from(["shader-perf", "shader", "X", "--platform", "d3d11"]).is_err());
    }

    #[test]
    fn gpu_override_uses_catalog_name() {
        let settings = with_gpu(AnalyzerSettings::default(), Some("g78"));
        assert_eq!(settings.gpu_model.as_deref(), Some("Mali-G78"));
        let settings = with_gpu(AnalyzerSettings::default(), Some("Mali-G999"));
        assert_eq!(settings.gpu_model.as_deref(), Some("Mali-G999"));
        assert_eq!(with_gpu(AnalyzerSettings::default(), None).gpu_model, None);
    }

    #[test]
    fn settings_flag_selects_store() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("settings.json");
        let cli = Cli::try_parse_from([
            "shader-perf",
            "--settings",
            path.to_str().expect("utf8 path"),
            "settings",
            "show",
        ])
        .expect("parse");
        assert_eq!(cli.settings_store().path(), path.as_path());
    }

    #[test]
    fn text_output_lists_ranked_suggestions() {
        let analysis = analyze_reports("Work registers: 40", "Stack spilling: 16 bytes\n16-bit arithmetic: 90%");
        let header = ReportHeader::new("Water", None);
        let text = output::analyses_text(&header, &[analysis]);
        let critical = text.find("[CRITICAL] Memory optimization").expect("critical");
        let high = text.find("[HIGH] Register optimization").expect("high");
        assert!(critical < high);
        assert!(text.starts_with("Water (auto-detected GPU)\n  Vertex: registers 40/0"));
    }
}
