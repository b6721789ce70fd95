//! Markdown report combining per-stage metrics and ranked suggestions.

use time::{format_description::well_known::Rfc3339, OffsetDateTime};

use crate::{
    analysis::{StageAnalysis, StageOutcome, VariantAnalysis},
    markdown,
    metrics::{PerformanceMetrics, ShaderProperty},
    suggestions::{rank, OptimizationSuggestion},
};

const NOT_AVAILABLE: &str = "n/a";

#[derive(Debug, Clone)]
pub struct ReportHeader {
    pub shader: String,
    /// `None` renders as auto-detect.
    pub gpu_model: Option<String>,
    pub generated_at: OffsetDateTime,
}

impl ReportHeader {
    pub fn new(shader: impl Into<String>, gpu_model: Option<String>) -> Self {
        Self {
            shader: shader.into(),
            gpu_model,
            generated_at: OffsetDateTime::now_utc(),
        }
    }

    /// RFC 3339 rendering of `generated_at`.
    pub fn timestamp(&self) -> String {
        self.generated_at
            .format(&Rfc3339)
            .unwrap_or_else(|_| self.generated_at.to_string())
    }
}

pub fn render_report(header: &ReportHeader, analyses: &[VariantAnalysis]) -> String {
    let generated = header.timestamp();

    let mut lines = vec![
        markdown::header(1, "Shader Performance Report"),
        String::new(),
        markdown::bold("Shader", &header.shader),
        markdown::bold(
            "GPU Model",
            header.gpu_model.as_deref().unwrap_or("Auto-detect"),
        ),
        markdown::bold("Generated", &generated),
    ];

    if analyses.is_empty() {
        lines.push(String::new());
        lines.push("No shader variants were analyzed.".to_string());
    }

    for analysis in analyses {
        let level = match &analysis.variant {
            Some(info) => {
                lines.push(String::new());
                lines.push(markdown::header(2, &format!("Variant: {}", info.label())));
                3
            }
            None => 2,
        };
        for stage in analysis.stages() {
            push_stage(&mut lines, level, stage);
        }
        push_suggestions(&mut lines, level, &analysis.suggestions);
    }

    let mut text = lines.join("\n");
    text.push('\n');
    text
}

fn push_stage(lines: &mut Vec<String>, level: usize, stage: &StageAnalysis) {
    lines.push(String::new());
    lines.push(markdown::header(level, &format!("{} Shader", stage.stage)));
    lines.push(String::new());

    if let StageOutcome::Failed { reason, output } = &stage.outcome {
        lines.push(format!("> Analysis failed ({reason})"));
        lines.push(String::new());
        if !output.is_empty() {
            lines.push("```text".to_string());
            lines.push(output.clone());
            lines.push("```".to_string());
            lines.push(String::new());
        }
    }

    lines.extend(markdown::table_header(&["Metric", "Value"]));
    for (label, value) in metric_rows(&stage.metrics) {
        lines.push(markdown::table_row(&[label, &value]));
    }
}

fn metric_rows(metrics: &PerformanceMetrics) -> Vec<(&'static str, String)> {
    let or_na = |value: &str| {
        if value.is_empty() {
            NOT_AVAILABLE.to_string()
        } else {
            value.to_string()
        }
    };

    let mut rows = vec![
        ("Architecture", or_na(&metrics.architecture)),
        ("Work registers", metrics.work_registers.to_string()),
        ("Uniform registers", metrics.uniform_registers.to_string()),
        (
            "16-bit arithmetic",
            format!("{:.1}%", metrics.sixteen_bit_arithmetic),
        ),
        (
            "Total instruction cycles",
            format!("{:.2}", metrics.total_cycles),
        ),
        (
            "Shortest path cycles",
            format!("{:.2}", metrics.shortest_path_cycles),
        ),
        (
            "Longest path cycles",
            format!("{:.2}", metrics.longest_path_cycles),
        ),
        ("Bottleneck unit", or_na(&metrics.bottleneck_unit)),
        (
            "Stack spilling",
            markdown::yes_no(metrics.has_stack_spilling).to_string(),
        ),
    ];
    rows.extend(ShaderProperty::all().iter().map(|property| {
        (
            property.label(),
            markdown::yes_no(metrics.property(*property)).to_string(),
        )
    }));
    rows
}

fn push_suggestions(lines: &mut Vec<String>, level: usize, suggestions: &[OptimizationSuggestion]) {
    lines.push(String::new());
    lines.push(markdown::header(level, "Optimization Suggestions"));
    lines.push(String::new());

    if suggestions.is_empty() {
        lines.push("No optimization opportunities detected.".to_string());
        return;
    }

    let mut ranked = suggestions.to_vec();
    rank(&mut ranked);
    for (index, suggestion) in ranked.iter().enumerate() {
        if index > 0 {
            lines.push(String::new());
        }
        lines.push(markdown::header(
            level + 1,
            &format!(
                "{} [{}] {}",
                suggestion.priority.icon(),
                suggestion.priority.label(),
                suggestion.category
            ),
        ));
        lines.push(markdown::bullet("Issue", &suggestion.issue));
        lines.push(markdown::bullet("Suggestion", &suggestion.suggestion));
        lines.push(markdown::bullet("Expected impact", &suggestion.expected_impact));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        analysis::{StageAnalysis, VariantInfo},
        variants::Stage,
    };
    use time::macros::datetime;

    fn header() -> ReportHeader {
        ReportHeader {
            shader: "Custom/Water".to_string(),
            gpu_model: None,
            generated_at: datetime!(2024-03-05 07:08:09 UTC),
        }
    }

    #[test]
    fn header_lines_come_first() {
        let report = render_report(&header(), &[]);
        assert!(report.starts_with(
            "# Shader Performance Report\n\n**Shader:** Custom/Water\n**GPU Model:** Auto-detect\n**Generated:** 2024-03-05T07:08:09Z\n"
        ));
        assert!(report.contains("No shader variants were analyzed."));
    }

    #[test]
    fn suggestions_are_ranked_in_report() {
        let vertex = StageAnalysis::from_report(Stage::Vertex, "Work registers: 40\n16-bit arithmetic: 90%");
        let fragment = StageAnalysis::from_report(Stage::Fragment, "Stack spilling: 8 bytes\n16-bit arithmetic: 90%");
        let analysis = VariantAnalysis::new(None, vertex, fragment);
        let report = render_report(&header(), &[analysis]);

        let critical = report.find("[CRITICAL] Memory optimization").expect("critical");
        let high = report.find("[HIGH] Register optimization").expect("high");
        assert!(critical < high);
        assert!(report.contains("## Vertex Shader"));
        assert!(report.contains("| Stack spilling | yes |"));
    }

    #[test]
    fn failed_stage_renders_reason_and_default_metrics() {
        let vertex = StageAnalysis::from_report(Stage::Vertex, "Work registers: 8\n");
        let fragment = StageAnalysis::failed(Stage::Fragment, None, "timed out");
        let analysis = VariantAnalysis::new(
            Some(VariantInfo {
                pass_name: "FORWARD".to_string(),
                keywords: "FOG_LINEAR".to_string(),
            }),
            vertex,
            fragment,
        );
        let report = render_report(&header(), &[analysis]);

        assert!(report.contains("## Variant: FORWARD [FOG_LINEAR]"));
        assert!(report.contains("### Fragment Shader\n\n> Analysis failed (timed out)\n\n| Metric | Value |"));
        assert!(report.contains("| Work registers | 0 |"));
        assert!(report.contains("| Bottleneck unit | n/a |"));
    }
}
