//! Best-effort scrape of offline compiler reports into [`PerformanceMetrics`].
//!
//! Every rule is independent and order-irrelevant. A field whose rule does not match,
//! or whose captured value does not parse, keeps its default, so "absent" and "zero"
//! are indistinguishable in the result.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::debug;

/// Architecture names in match priority order.
pub const ARCHITECTURES: &[&str] = &["Bifrost", "Valhall", "Midgard"];

const STACK_SPILLING: &str = "Stack spilling";
const STACK_SPILLING_FALSE: &str = "Stack spilling: false";

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PerformanceMetrics {
    pub work_registers: u32,
    pub uniform_registers: u32,
    /// Share of arithmetic performed at 16-bit precision, in percent.
    pub sixteen_bit_arithmetic: f64,
    pub total_cycles: f64,
    pub shortest_path_cycles: f64,
    pub longest_path_cycles: f64,
    /// Upper-cased unit code such as `A`, `T`, `LS` or `V`; empty when not reported.
    pub bottleneck_unit: String,
    pub architecture: String,
    pub has_stack_spilling: bool,
    pub has_uniform_computation: bool,
    pub has_side_effects: bool,
    pub modifies_coverage: bool,
    pub uses_late_zs_test: bool,
    pub uses_late_zs_update: bool,
    pub reads_color_buffer: bool,
}

/// Boolean shader properties reported as `<Property>: true`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderProperty {
    UniformComputation,
    SideEffects,
    ModifiesCoverage,
    LateZsTest,
    LateZsUpdate,
    ReadsColorBuffer,
}

impl ShaderProperty {
    pub fn all() -> &'static [ShaderProperty] {
        &[
            ShaderProperty::UniformComputation,
            ShaderProperty::SideEffects,
            ShaderProperty::ModifiesCoverage,
            ShaderProperty::LateZsTest,
            ShaderProperty::LateZsUpdate,
            ShaderProperty::ReadsColorBuffer,
        ]
    }

    /// Exact phrase whose presence sets the flag.
    pub fn phrase(&self) -> &'static str {
        match self {
            ShaderProperty::UniformComputation => "Has uniform computation: true",
            ShaderProperty::SideEffects => "Has side-effects: true",
            ShaderProperty::ModifiesCoverage => "Modifies coverage: true",
            ShaderProperty::LateZsTest => "Uses late ZS test: true",
            ShaderProperty::LateZsUpdate => "Uses late ZS update: true",
            ShaderProperty::ReadsColorBuffer => "Reads color buffer: true",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ShaderProperty::UniformComputation => "Uniform computation",
            ShaderProperty::SideEffects => "Side effects",
            ShaderProperty::ModifiesCoverage => "Modifies coverage",
            ShaderProperty::LateZsTest => "Late ZS test",
            ShaderProperty::LateZsUpdate => "Late ZS update",
            ShaderProperty::ReadsColorBuffer => "Reads color buffer",
        }
    }
}

impl PerformanceMetrics {
    pub fn property(&self, property: ShaderProperty) -> bool {
        match property {
            ShaderProperty::UniformComputation => self.has_uniform_computation,
            ShaderProperty::SideEffects => self.has_side_effects,
            ShaderProperty::ModifiesCoverage => self.modifies_coverage,
            ShaderProperty::LateZsTest => self.uses_late_zs_test,
            ShaderProperty::LateZsUpdate => self.uses_late_zs_update,
            ShaderProperty::ReadsColorBuffer => self.reads_color_buffer,
        }
    }

    fn property_mut(&mut self, property: ShaderProperty) -> &mut bool {
        match property {
            ShaderProperty::UniformComputation => &mut self.has_uniform_computation,
            ShaderProperty::SideEffects => &mut self.has_side_effects,
            ShaderProperty::ModifiesCoverage => &mut self.modifies_coverage,
            ShaderProperty::LateZsTest => &mut self.uses_late_zs_test,
            ShaderProperty::LateZsUpdate => &mut self.uses_late_zs_update,
            ShaderProperty::ReadsColorBuffer => &mut self.reads_color_buffer,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Field {
    WorkRegisters,
    UniformRegisters,
    SixteenBitArithmetic,
    TotalCycles,
    ShortestPathCycles,
    LongestPathCycles,
    BottleneckUnit,
}

impl Field {
    /// Stores `raw` into the record; false when it does not parse.
    fn apply(self, metrics: &mut PerformanceMetrics, raw: &str) -> bool {
        fn float(raw: &str) -> Option<f64> {
            raw.parse::<f64>().ok().filter(|value| value.is_finite())
        }

        match self {
            Field::WorkRegisters => raw.parse::<u32>().map(|v| metrics.work_registers = v).is_ok(),
            Field::UniformRegisters => raw.parse::<u32>().map(|v| metrics.uniform_registers = v).is_ok(),
            Field::SixteenBitArithmetic => float(raw)
                .map(|v| metrics.sixteen_bit_arithmetic = v)
                .is_some(),
            Field::TotalCycles => float(raw).map(|v| metrics.total_cycles = v).is_some(),
            Field::ShortestPathCycles => {
                float(raw).map(|v| metrics.shortest_path_cycles = v).is_some()
            }
            Field::LongestPathCycles => {
                float(raw).map(|v| metrics.longest_path_cycles = v).is_some()
            }
            Field::BottleneckUnit => {
                metrics.bottleneck_unit = raw.to_ascii_uppercase();
                true
            }
        }
    }
}

static RULES: Lazy<Vec<(Field, Regex)>> = Lazy::new(|| {
    let rule = |field, pattern: &str| {
        (
            field,
            Regex::new(pattern).expect("metrics patterns are valid regexes"),
        )
    };
    vec![
        rule(Field::WorkRegisters, r"(?i)Work registers\s*:\s*(\d+)"),
        rule(Field::UniformRegisters, r"(?i)Uniform registers\s*:\s*(\d+)"),
        rule(
            Field::SixteenBitArithmetic,
            r"(?i)16-bit arithmetic\s*:\s*([\d.]+)\s*%",
        ),
        rule(Field::TotalCycles, r"(?i)Total instruction cycles\s*:\s*([\d.]+)"),
        rule(Field::ShortestPathCycles, r"(?i)Shortest path cycles\s*:\s*([\d.]+)"),
        rule(Field::LongestPathCycles, r"(?i)Longest path cycles\s*:\s*([\d.]+)"),
        rule(Field::BottleneckUnit, r"(?i)\bBound\s*:\s*([A-Za-z]+)"),
    ]
});

/// Scrapes a compiler report. Never fails; unmatched fields stay at their defaults.
pub fn extract_metrics(report: &str) -> PerformanceMetrics {
    let mut metrics = PerformanceMetrics::default();
    if report.is_empty() {
        return metrics;
    }

    for (field, pattern) in RULES.iter() {
        if let Some(value) = pattern.captures(report).and_then(|caps| caps.get(1)) {
            if !field.apply(&mut metrics, value.as_str()) {
                debug!(
                    target: "shader_perf_core",
                    field = ?field,
                    value = value.as_str(),
                    "ignoring unparseable metric"
                );
            }
        }
    }

    for property in ShaderProperty::all() {
        *metrics.property_mut(*property) = report.contains(property.phrase());
    }

    // Any mention counts unless the report explicitly says it does not spill.
    metrics.has_stack_spilling =
        report.contains(STACK_SPILLING) && !report.contains(STACK_SPILLING_FALSE);

    metrics.architecture = ARCHITECTURES
        .iter()
        .find(|name| report.contains(**name))
        .map(|name| (*name).to_string())
        .unwrap_or_default();

    metrics
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_labeled_values() {
        let metrics = extract_metrics(
            "Work registers : 18\nUniform registers : 4\n16-bit arithmetic : 62.5%\nBound : T\n",
        );
        assert_eq!(
            metrics,
            PerformanceMetrics {
                work_registers: 18,
                uniform_registers: 4,
                sixteen_bit_arithmetic: 62.5,
                bottleneck_unit: "T".to_string(),
                ..PerformanceMetrics::default()
            }
        );
    }

    #[test]
    fn labels_match_case_insensitively_and_units_upper_case() {
        let metrics = extract_metrics(
            "WORK REGISTERS: 40\ntotal instruction cycles: 12.25\nshortest path cycles:3\nLONGEST PATH CYCLES : 7.5\nbound: ls",
        );
        assert_eq!(metrics.work_registers, 40);
        assert!((metrics.total_cycles - 12.25).abs() < f64::EPSILON);
        assert!((metrics.shortest_path_cycles - 3.0).abs() < f64::EPSILON);
        assert!((metrics.longest_path_cycles - 7.5).abs() < f64::EPSILON);
        assert_eq!(metrics.bottleneck_unit, "LS");
    }

    #[test]
    fn unparseable_values_stay_default() {
        let metrics = extract_metrics("16-bit arithmetic : 1.2.3%\nTotal instruction cycles : .\n");
        assert_eq!(metrics, PerformanceMetrics::default());
    }

    #[test]
    fn empty_and_error_text_give_defaults() {
        assert_eq!(extract_metrics(""), PerformanceMetrics::default());
        assert_eq!(
            extract_metrics("ERROR: 0:12: 'foo' : undeclared identifier"),
            PerformanceMetrics::default()
        );
    }

    #[test]
    fn explicit_zero_is_indistinguishable_from_absent() {
        assert_eq!(
            extract_metrics("Work registers: 0").work_registers,
            extract_metrics("nothing").work_registers
        );
    }

    #[test]
    fn property_flags_need_exact_phrase() {
        let metrics = extract_metrics(
            "Has side-effects: true\nUses late ZS test: true\nUses late ZS update: false\nReads color buffer: TRUE",
        );
        assert!(metrics.has_side_effects);
        assert!(metrics.uses_late_zs_test);
        assert!(!metrics.uses_late_zs_update);
        assert!(!metrics.reads_color_buffer);
        assert!(!metrics.has_uniform_computation);
        assert!(metrics.property(ShaderProperty::SideEffects));
    }

    #[test]
    fn stack_spilling_requires_missing_false_qualifier() {
        assert!(extract_metrics("Stack spilling: 16 bytes").has_stack_spilling);
        assert!(!extract_metrics("Stack spilling: false").has_stack_spilling);
        assert!(!extract_metrics("no spill info").has_stack_spilling);
        // Prose mentions are flagged too.
        assert!(extract_metrics("Stack spilling was not evaluated").has_stack_spilling);
    }

    #[test]
    fn architecture_priority_order() {
        assert_eq!(extract_metrics("Architecture: Valhall").architecture, "Valhall");
        assert_eq!(
            extract_metrics("Midgard legacy, now Bifrost").architecture,
            "Bifrost"
        );
        assert_eq!(extract_metrics("Architecture: Avalon").architecture, "");
    }
}
