use std::borrow::Cow;

use once_cell::sync::Lazy;
use regex::Regex;

static GLES_300: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(#version\s+)300(\s+es\b)").expect("version directive regex"));

/// Rewrites `#version 300 es` to `#version 310 es`, which the offline compiler accepts.
///
/// Only the version number changes; the surrounding whitespace is kept as written.
pub fn normalize_version(source: &str) -> Cow<'_, str> {
    GLES_300.replace_all(source, "${1}310${2}")
}
