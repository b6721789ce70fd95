//! Splits a compiled shader dump into vertex/fragment pairs per pass and keyword set.

use std::{collections::HashMap, fmt};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use shader_perf_client::sanitize_file_stem;
use tracing::debug;

use crate::{
    analysis::VariantInfo,
    extract::{capture_region, finish_section, split_lines, END_MARKER, FRAGMENT_MARKER, VERTEX_MARKER},
    version::normalize_version,
};

/// Pass name used until the dump declares one.
pub const UNNAMED_PASS: &str = "(unnamed)";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Vertex,
    Fragment,
}

impl Stage {
    pub fn all() -> &'static [Stage] {
        &[Stage::Vertex, Stage::Fragment]
    }

    pub fn marker(&self) -> &'static str {
        match self {
            Stage::Vertex => VERTEX_MARKER,
            Stage::Fragment => FRAGMENT_MARKER,
        }
    }

    /// File extension the offline compiler uses to infer the stage.
    pub fn extension(&self) -> &'static str {
        match self {
            Stage::Vertex => "vert",
            Stage::Fragment => "frag",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Stage::Vertex => "Vertex",
            Stage::Fragment => "Fragment",
        }
    }

    fn from_marker(trimmed: &str) -> Option<Self> {
        match trimmed {
            VERTEX_MARKER => Some(Stage::Vertex),
            FRAGMENT_MARKER => Some(Stage::Fragment),
            _ => None,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Bucket identity. Keywords are compared as raw strings, so token order matters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VariantKey {
    pub pass_name: String,
    pub keywords: String,
}

impl VariantKey {
    pub fn compose(pass_name: &str, global_keywords: &str, local_keywords: &str) -> Self {
        let keywords = match (global_keywords.is_empty(), local_keywords.is_empty()) {
            (false, false) => format!("{global_keywords} {local_keywords}"),
            (false, true) => global_keywords.to_string(),
            (true, false) => local_keywords.to_string(),
            (true, true) => String::new(),
        };
        Self {
            pass_name: pass_name.to_string(),
            keywords,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShaderVariant {
    pub vertex_source: String,
    pub fragment_source: String,
    pub pass_name: String,
    pub keywords: String,
}

impl ShaderVariant {
    /// `Pass` or `Pass [KEYWORDS]`.
    pub fn label(&self) -> String {
        VariantInfo::from(self).label()
    }

    pub fn file_stem(&self, index: usize) -> String {
        sanitize_file_stem(&format!("{}_{index}", self.pass_name))
    }
}

static INLINE_PASS_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)^\s*Pass\s*\{\s*Name\s+"([^"]*)""#).expect("inline pass name regex")
});
static NAME_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)^\s*Name\s+"([^"]*)""#).expect("name line regex"));
static PASS_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*Pass\s*:\s*(.*?)\s*$").expect("pass line regex"));
static SUBSHADER_PASS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\W*SubShader\s+\d+\b.*?\bpass\s+\d+\b(?:\s*'([^']*)')?")
        .expect("subshader pass regex")
});
static LOCAL_KEYWORDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\W*Local\s+Keywords\s*:(.*)$").expect("local keywords regex")
});
static KEYWORDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\W*(?:Global\s+)?Keywords\s*:(.*)$").expect("keywords regex")
});

/// Forward-only metadata accumulator for one `segment_variants` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanState {
    pass_name: String,
    keywords: String,
    local_keywords: String,
}

impl Default for ScanState {
    fn default() -> Self {
        Self {
            pass_name: UNNAMED_PASS.to_string(),
            keywords: String::new(),
            local_keywords: String::new(),
        }
    }
}

impl ScanState {
    pub fn pass_name(&self) -> &str {
        &self.pass_name
    }

    pub fn keywords(&self) -> &str {
        &self.keywords
    }

    pub fn local_keywords(&self) -> &str {
        &self.local_keywords
    }

    pub fn key(&self) -> VariantKey {
        VariantKey::compose(&self.pass_name, &self.keywords, &self.local_keywords)
    }

    /// Applies a metadata line. Returns false when the line carries no metadata.
    pub fn observe(&mut self, line: &str) -> bool {
        if let Some(caps) = INLINE_PASS_NAME.captures(line) {
            self.pass_name = caps[1].to_string();
        } else if let Some(caps) = NAME_LINE.captures(line) {
            self.pass_name = caps[1].to_string();
        } else if let Some(caps) = PASS_LINE.captures(line) {
            self.pass_name = caps[1].to_string();
        } else if let Some(caps) = SUBSHADER_PASS.captures(line) {
            if let Some(name) = caps.get(1) {
                self.pass_name = name.as_str().to_string();
            }
        } else if let Some(caps) = LOCAL_KEYWORDS.captures(line) {
            self.local_keywords = caps[1].trim().to_string();
        } else if let Some(caps) = KEYWORDS.captures(line) {
            self.keywords = caps[1].trim().to_string();
        } else {
            return false;
        }
        true
    }
}

type Buckets = HashMap<VariantKey, Vec<String>>;

/// Groups every stage section under the metadata in effect when it started and pairs
/// vertex/fragment sections positionally within each group.
///
/// Output order follows hash-map iteration and is not source order.
pub fn segment_variants(text: &str) -> Vec<ShaderVariant> {
    if text.is_empty() {
        return Vec::new();
    }

    let lines = split_lines(text);
    let mut state = ScanState::default();
    let mut vertex = Buckets::new();
    let mut fragment = Buckets::new();

    let mut index = 0;
    while index < lines.len() {
        let Some(stage) = Stage::from_marker(lines[index].trim()) else {
            state.observe(lines[index]);
            index += 1;
            continue;
        };

        let region = capture_region(&lines, index, END_MARKER);
        index = region.next_index;
        let section = finish_section(&region);
        let source = normalize_version(&section).into_owned();

        let buckets = match stage {
            Stage::Vertex => &mut vertex,
            Stage::Fragment => &mut fragment,
        };
        buckets.entry(state.key()).or_default().push(source);
    }

    pair_buckets(vertex, fragment)
}

fn pair_buckets(vertex: Buckets, mut fragment: Buckets) -> Vec<ShaderVariant> {
    let mut variants = Vec::new();
    for (key, vertex_sources) in vertex {
        let Some(fragment_sources) = fragment.remove(&key) else {
            debug!(
                target: "shader_perf_core",
                pass = %key.pass_name,
                keywords = %key.keywords,
                "vertex sections without fragment counterpart"
            );
            continue;
        };

        if vertex_sources.len() != fragment_sources.len() {
            debug!(
                target: "shader_perf_core",
                pass = %key.pass_name,
                keywords = %key.keywords,
                vertex = vertex_sources.len(),
                fragment = fragment_sources.len(),
                "dropping unpaired sections"
            );
        }

        for (vertex_source, fragment_source) in vertex_sources.into_iter().zip(fragment_sources) {
            variants.push(ShaderVariant {
                vertex_source,
                fragment_source,
                pass_name: key.pass_name.clone(),
                keywords: key.keywords.clone(),
            });
        }
    }
    variants
}
