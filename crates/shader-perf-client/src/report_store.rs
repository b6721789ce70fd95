use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use time::{macros::format_description, OffsetDateTime};
use tokio::fs;
use tracing::debug;

/// Writes formatted reports into a flat output directory.
#[derive(Debug, Clone)]
pub struct ReportStore {
    root: PathBuf,
}

/// Locations of one extracted vertex/fragment pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagePaths {
    pub vertex: PathBuf,
    pub fragment: PathBuf,
}

impl ReportStore {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn write(&self, shader: &str, contents: &str) -> Result<PathBuf> {
        self.write_at(shader, contents, OffsetDateTime::now_utc())
            .await
    }

    /// Writes `<shader>_<YYYYMMDD_HHMMSS>.md` and returns its path.
    pub async fn write_at(
        &self,
        shader: &str,
        contents: &str,
        at: OffsetDateTime,
    ) -> Result<PathBuf> {
        fs::create_dir_all(&self.root)
            .await
            .with_context(|| format!("failed to create report dir {:?}", self.root))?;

        let stamp = at
            .format(format_description!(
                "[year][month][day]_[hour][minute][second]"
            ))
            .context("failed to format report timestamp")?;
        let path = self
            .root
            .join(format!("{}_{stamp}.md", sanitize_file_stem(shader)));
        fs::write(&path, contents)
            .await
            .with_context(|| format!("failed to write report {path:?}"))?;

        debug!(target: "shader_perf_client", file = ?path, "wrote report");
        Ok(path)
    }
}

/// Writes `<stem>.vert` and `<stem>.frag` under `dir`, creating it if needed.
pub async fn write_stage_pair(
    dir: &Path,
    stem: &str,
    vertex: &str,
    fragment: &str,
) -> Result<StagePaths> {
    fs::create_dir_all(dir)
        .await
        .with_context(|| format!("failed to create stage dir {dir:?}"))?;

    let stem = sanitize_file_stem(stem);
    let paths = StagePaths {
        vertex: dir.join(format!("{stem}.vert")),
        fragment: dir.join(format!("{stem}.frag")),
    };
    fs::write(&paths.vertex, vertex)
        .await
        .with_context(|| format!("failed to write {:?}", paths.vertex))?;
    fs::write(&paths.fragment, fragment)
        .await
        .with_context(|| format!("failed to write {:?}", paths.fragment))?;

    debug!(
        target: "shader_perf_client",
        vertex = ?paths.vertex,
        fragment = ?paths.fragment,
        "wrote stage sources"
    );
    Ok(paths)
}

/// Maps arbitrary shader names (`Custom/Water Surface`) onto a safe file stem.
pub fn sanitize_file_stem(name: &str) -> String {
    let mut stem = String::with_capacity(name.len());
    for ch in name.trim().chars() {
        if ch.is_ascii_alphanumeric() || ch == '-' || ch == '.' {
            stem.push(ch);
        } else if !stem.ends_with('_') {
            stem.push('_');
        }
    }
    let stem = stem.trim_matches(|c| c == '_' || c == '.');
    if stem.is_empty() {
        "shader".to_string()
    } else {
        stem.to_string()
    }
}
