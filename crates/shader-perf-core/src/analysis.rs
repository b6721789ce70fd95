use std::path::PathBuf;

use serde::Serialize;
use shader_perf_client::CompilerOutput;

use crate::{
    metrics::{extract_metrics, PerformanceMetrics},
    suggestions::{generate_suggestions, OptimizationSuggestion},
    variants::{ShaderVariant, Stage},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StageOutcome {
    Analyzed,
    /// The compiler could not produce a report; `output` holds whatever it printed.
    Failed { reason: String, output: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct StageAnalysis {
    pub stage: Stage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_path: Option<PathBuf>,
    pub outcome: StageOutcome,
    pub metrics: PerformanceMetrics,
    #[serde(skip)]
    pub raw_report: String,
}

impl StageAnalysis {
    /// Metrics are scraped from whatever text the run produced, even on failure.
    pub fn from_output(stage: Stage, source_path: Option<PathBuf>, output: &CompilerOutput) -> Self {
        let raw_report = output.report_text();
        let outcome = if output.is_success() {
            StageOutcome::Analyzed
        } else {
            StageOutcome::Failed {
                reason: output.status.to_string(),
                output: raw_report.trim().to_string(),
            }
        };
        Self {
            stage,
            source_path,
            outcome,
            metrics: extract_metrics(&raw_report),
            raw_report,
        }
    }

    /// Wraps report text captured by an earlier run.
    pub fn from_report(stage: Stage, report: &str) -> Self {
        Self {
            stage,
            source_path: None,
            outcome: StageOutcome::Analyzed,
            metrics: extract_metrics(report),
            raw_report: report.to_string(),
        }
    }

    pub fn failed(stage: Stage, source_path: Option<PathBuf>, reason: impl Into<String>) -> Self {
        Self {
            stage,
            source_path,
            outcome: StageOutcome::Failed {
                reason: reason.into(),
                output: String::new(),
            },
            metrics: PerformanceMetrics::default(),
            raw_report: String::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome == StageOutcome::Analyzed
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VariantInfo {
    pub pass_name: String,
    pub keywords: String,
}

impl VariantInfo {
    pub fn label(&self) -> String {
        if self.keywords.is_empty() {
            self.pass_name.clone()
        } else {
            format!("{} [{}]", self.pass_name, self.keywords)
        }
    }
}

impl From<&ShaderVariant> for VariantInfo {
    fn from(variant: &ShaderVariant) -> Self {
        Self {
            pass_name: variant.pass_name.clone(),
            keywords: variant.keywords.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct VariantAnalysis {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant: Option<VariantInfo>,
    pub vertex: StageAnalysis,
    pub fragment: StageAnalysis,
    pub suggestions: Vec<OptimizationSuggestion>,
}

impl VariantAnalysis {
    pub fn new(variant: Option<VariantInfo>, vertex: StageAnalysis, fragment: StageAnalysis) -> Self {
        let suggestions = generate_suggestions(&vertex.metrics, &fragment.metrics);
        Self {
            variant,
            vertex,
            fragment,
            suggestions,
        }
    }

    pub fn stages(&self) -> [&StageAnalysis; 2] {
        [&self.vertex, &self.fragment]
    }

    pub fn is_success(&self) -> bool {
        self.vertex.is_success() && self.fragment.is_success()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shader_perf_client::RunStatus;

    #[test]
    fn failed_output_keeps_text_and_scrapes_defaults() {
        let output = CompilerOutput {
            stdout: String::new(),
            stderr: "ERROR: 0:3: syntax error".to_string(),
            status: RunStatus::Failed(Some(1)),
        };
        let analysis = StageAnalysis::from_output(Stage::Fragment, None, &output);
        assert!(!analysis.is_success());
        assert_eq!(
            analysis.outcome,
            StageOutcome::Failed {
                reason: "exit code 1".to_string(),
                output: "ERROR: 0:3: syntax error".to_string(),
            }
        );
        assert_eq!(analysis.metrics, PerformanceMetrics::default());
    }

    #[test]
    fn variant_analysis_derives_suggestions() {
        let vertex = StageAnalysis::from_report(Stage::Vertex, "Work registers: 40");
        let fragment = StageAnalysis::from_report(Stage::Fragment, "16-bit arithmetic: 90%");
        let analysis = VariantAnalysis::new(None, vertex, fragment);
        assert!(analysis.is_success());
        assert_eq!(analysis.suggestions.len(), 1);
        assert_eq!(analysis.suggestions[0].category, "Register optimization");
    }

    #[test]
    fn json_shape_tags_stage_outcome() {
        let analysis = StageAnalysis::failed(Stage::Vertex, None, "timed out");
        let value = serde_json::to_value(&analysis).expect("json");
        assert_eq!(value["stage"], "vertex");
        assert_eq!(value["outcome"]["status"], "failed");
        assert_eq!(value["outcome"]["reason"], "timed out");
        assert!(value.get("source_path").is_none());
        assert!(value.get("raw_report").is_none());
    }

    #[test]
    fn variant_info_label() {
        let info = VariantInfo {
            pass_name: "FORWARD".to_string(),
            keywords: String::new(),
        };
        assert_eq!(info.label(), "FORWARD");
    }
}
