use std::fmt;

use serde::Serialize;

use crate::metrics::PerformanceMetrics;

/// Work registers above this count reduce the number of threads a core can keep in flight.
pub const MAX_WORK_REGISTERS: u32 = 32;
pub const MIN_SIXTEEN_BIT_PERCENT: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    pub fn label(&self) -> &'static str {
        match self {
            Priority::Low => "LOW",
            Priority::Medium => "MEDIUM",
            Priority::High => "HIGH",
            Priority::Critical => "CRITICAL",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            Priority::Low => "🟢",
            Priority::Medium => "🟡",
            Priority::High => "🟠",
            Priority::Critical => "🔴",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptimizationSuggestion {
    pub priority: Priority,
    pub category: String,
    pub issue: String,
    pub suggestion: String,
    pub expected_impact: String,
}

struct Rule {
    priority: Priority,
    category: &'static str,
    issue: &'static str,
    suggestion: &'static str,
    expected_impact: &'static str,
    applies: fn(&PerformanceMetrics, &PerformanceMetrics) -> bool,
}

impl Rule {
    fn to_suggestion(&self) -> OptimizationSuggestion {
        OptimizationSuggestion {
            priority: self.priority,
            category: self.category.to_string(),
            issue: self.issue.to_string(),
            suggestion: self.suggestion.to_string(),
            expected_impact: self.expected_impact.to_string(),
        }
    }
}

fn register_pressure(vertex: &PerformanceMetrics, fragment: &PerformanceMetrics) -> bool {
    vertex.work_registers > MAX_WORK_REGISTERS || fragment.work_registers > MAX_WORK_REGISTERS
}

fn low_precision_share(_: &PerformanceMetrics, fragment: &PerformanceMetrics) -> bool {
    fragment.sixteen_bit_arithmetic < MIN_SIXTEEN_BIT_PERCENT
}

fn stack_spilling(vertex: &PerformanceMetrics, fragment: &PerformanceMetrics) -> bool {
    vertex.has_stack_spilling || fragment.has_stack_spilling
}

fn arithmetic_bound(_: &PerformanceMetrics, fragment: &PerformanceMetrics) -> bool {
    fragment.bottleneck_unit == "A"
}

fn texture_bound(_: &PerformanceMetrics, fragment: &PerformanceMetrics) -> bool {
    fragment.bottleneck_unit == "T"
}

fn load_store_bound(_: &PerformanceMetrics, fragment: &PerformanceMetrics) -> bool {
    fragment.bottleneck_unit == "LS"
}

fn late_depth(_: &PerformanceMetrics, fragment: &PerformanceMetrics) -> bool {
    fragment.uses_late_zs_test || fragment.uses_late_zs_update
}

fn side_effects(_: &PerformanceMetrics, fragment: &PerformanceMetrics) -> bool {
    fragment.has_side_effects
}

static RULES: &[Rule] = &[
    Rule {
        priority: Priority::High,
        category: "Register optimization",
        issue: "Work register usage exceeds 32, which halves the threads each shader core can run concurrently.",
        suggestion: "Shorten variable lifetimes, split long computations, and avoid large local arrays or deeply unrolled loops.",
        expected_impact: "Doubles thread occupancy and improves latency hiding.",
        applies: register_pressure,
    },
    Rule {
        priority: Priority::Medium,
        category: "Precision optimization",
        issue: "Less than half of the fragment arithmetic runs at 16-bit precision.",
        suggestion: "Declare colors, normals and UV math as mediump (half) where full precision is not required.",
        expected_impact: "Up to twice the arithmetic throughput and lower register usage.",
        applies: low_precision_share,
    },
    Rule {
        priority: Priority::Critical,
        category: "Memory optimization",
        issue: "Register pressure forces the shader to spill to stack memory.",
        suggestion: "Reduce live variables, remove dynamically indexed arrays, and simplify control flow so values fit in registers.",
        expected_impact: "Eliminates slow memory round trips that stall every thread.",
        applies: stack_spilling,
    },
    Rule {
        priority: Priority::High,
        category: "Arithmetic optimization",
        issue: "The fragment shader is bound by the arithmetic unit.",
        suggestion: "Move per-pixel constants to the vertex shader or uniforms, use cheaper approximations of transcendental functions, and bake lookups into textures.",
        expected_impact: "Shorter arithmetic critical path and higher fill rate.",
        applies: arithmetic_bound,
    },
    Rule {
        priority: Priority::High,
        category: "Texture optimization",
        issue: "The fragment shader is bound by the texture unit.",
        suggestion: "Reduce the number of samples, use mipmaps and compressed formats, and prefer bilinear over trilinear or anisotropic filtering.",
        expected_impact: "Fewer texture cycles per pixel and lower memory bandwidth.",
        applies: texture_bound,
    },
    Rule {
        priority: Priority::Medium,
        category: "Memory-access optimization",
        issue: "The fragment shader is bound by the load/store unit.",
        suggestion: "Pack uniform and buffer data, avoid scattered buffer reads, and cache repeated loads in local variables.",
        expected_impact: "Fewer load/store cycles and less memory traffic.",
        applies: load_store_bound,
    },
    Rule {
        priority: Priority::High,
        category: "Depth-test optimization",
        issue: "The fragment shader forces late depth/stencil testing or updates.",
        suggestion: "Avoid discard, alpha-to-coverage and depth writes from the shader so early ZS testing can cull hidden fragments.",
        expected_impact: "Hidden fragments are rejected before shading, reducing overdraw cost.",
        applies: late_depth,
    },
    Rule {
        priority: Priority::Medium,
        category: "Side-effect optimization",
        issue: "The fragment shader has side effects such as image or buffer stores.",
        suggestion: "Move writes to a compute pass or guard them so the driver can keep hidden surface removal enabled.",
        expected_impact: "Restores early fragment culling and reduces wasted shading.",
        applies: side_effects,
    },
];

/// Evaluates the rule table in order; every matching rule contributes one suggestion.
pub fn generate_suggestions(
    vertex: &PerformanceMetrics,
    fragment: &PerformanceMetrics,
) -> Vec<OptimizationSuggestion> {
    RULES
        .iter()
        .filter(|rule| (rule.applies)(vertex, fragment))
        .map(Rule::to_suggestion)
        .collect()
}

/// Highest priority first, keeping rule order within a priority.
pub fn rank(suggestions: &mut [OptimizationSuggestion]) {
    suggestions.sort_by(|a, b| b.priority.cmp(&a.priority));
}
