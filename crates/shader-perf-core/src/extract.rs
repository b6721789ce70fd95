//! Balanced extraction of `#ifdef STAGE ... #endif` regions from compiled shader dumps.
//!
//! Regions may contain nested preprocessor blocks; every `#if`, `#ifdef` or `#ifndef`
//! line opens one more level that a later end marker has to close before the outer
//! region ends.

use tracing::debug;

use crate::variants::Stage;

pub const VERTEX_MARKER: &str = "#ifdef VERTEX";
pub const FRAGMENT_MARKER: &str = "#ifdef FRAGMENT";
pub const END_MARKER: &str = "#endif";

/// Lines of one region, outer start and end markers included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedRegion<'a> {
    pub lines: Vec<&'a str>,
    /// Index of the first line after the region.
    pub next_index: usize,
    /// False when the text ended before the region was closed.
    pub balanced: bool,
}

/// Splits on `\n`, `\r` and `\r\n`, dropping empty entries.
pub fn split_lines(text: &str) -> Vec<&str> {
    text.split(['\r', '\n'])
        .filter(|line| !line.is_empty())
        .collect()
}

fn opens_block(trimmed: &str) -> bool {
    // `#ifdef` and `#ifndef` share the `#if` prefix.
    trimmed.starts_with("#if")
}

/// Captures the region whose start marker sits at `lines[start]`.
pub fn capture_region<'a>(lines: &[&'a str], start: usize, end_marker: &str) -> CapturedRegion<'a> {
    let mut captured = Vec::new();
    let mut depth = 0usize;
    let mut index = start;

    while index < lines.len() {
        let line = lines[index];
        let trimmed = line.trim();
        captured.push(line);
        index += 1;

        if captured.len() == 1 || opens_block(trimmed) {
            depth += 1;
        } else if trimmed == end_marker {
            depth -= 1;
            if depth == 0 {
                return CapturedRegion {
                    lines: captured,
                    next_index: index,
                    balanced: true,
                };
            }
        }
    }

    debug!(
        target: "shader_perf_core",
        start,
        open_blocks = depth,
        "region ran to end of text without a balanced end marker"
    );
    CapturedRegion {
        lines: captured,
        next_index: index,
        balanced: false,
    }
}

/// Strips the outer marker lines and whitespace-only lines, then joins with `\n`.
pub fn finish_section(region: &CapturedRegion<'_>) -> String {
    if region.lines.len() < 2 {
        return String::new();
    }
    let inner = &region.lines[1..region.lines.len() - 1];
    let joined = inner
        .iter()
        .filter(|line| !line.trim().is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("\n");
    joined.trim_end_matches(['\n', '\r']).to_string()
}

/// Returns the content of the first region opened by `start_marker`.
///
/// Empty input, empty markers and a missing start marker all give an empty string.
pub fn extract_section(text: &str, start_marker: &str, end_marker: &str) -> String {
    if text.is_empty() || start_marker.is_empty() || end_marker.is_empty() {
        return String::new();
    }

    let lines = split_lines(text);
    lines
        .iter()
        .position(|line| line.trim() == start_marker)
        .map(|start| finish_section(&capture_region(&lines, start, end_marker)))
        .unwrap_or_default()
}

pub fn extract_stage(text: &str, stage: Stage) -> String {
    extract_section(text, stage.marker(), END_MARKER)
}
