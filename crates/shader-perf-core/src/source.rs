//! Boundary to the host engine's shader compiler.
//!
//! The engine produces one combined text dump per shader containing every stage and
//! variant. How it is obtained (private engine API, editor export, a file on disk) stays
//! behind [`ShaderSourceProvider`].

use std::{
    fmt,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shader_perf_client::sanitize_file_stem;
use thiserror::Error;
use tokio::fs;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShaderPlatform {
    Gles3,
    Gles2,
    Vulkan,
    Metal,
}

impl ShaderPlatform {
    pub fn all() -> &'static [ShaderPlatform] {
        &[
            ShaderPlatform::Gles3,
            ShaderPlatform::Gles2,
            ShaderPlatform::Vulkan,
            ShaderPlatform::Metal,
        ]
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ShaderPlatform::Gles3 => "OpenGL ES 3",
            ShaderPlatform::Gles2 => "OpenGL ES 2",
            ShaderPlatform::Vulkan => "Vulkan",
            ShaderPlatform::Metal => "Metal",
        }
    }

    /// Whether dumps for this platform contain GLSL ES the offline compiler can read.
    pub fn is_glsl_es(&self) -> bool {
        matches!(self, ShaderPlatform::Gles3 | ShaderPlatform::Gles2)
    }

    /// Parse platform from string (case-insensitive)
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "gles3" | "gles30" | "opengl es 3" | "gles" => Some(ShaderPlatform::Gles3),
            "gles2" | "gles20" | "opengl es 2" => Some(ShaderPlatform::Gles2),
            "vulkan" | "vk" => Some(ShaderPlatform::Vulkan),
            "metal" => Some(ShaderPlatform::Metal),
            _ => None,
        }
    }
}

impl fmt::Display for ShaderPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl Default for ShaderPlatform {
    fn default() -> Self {
        ShaderPlatform::Gles3
    }
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("no compiled source found for shader `{0}`")]
    NotFound(String),
    #[error("platform {0} is not supported by the offline compiler")]
    UnsupportedPlatform(ShaderPlatform),
    #[error("compiled source for shader `{0}` is empty")]
    Empty(String),
    #[error("failed to read compiled source {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Produces the combined compiled-shader text for a shader.
#[async_trait]
pub trait ShaderSourceProvider: Send + Sync {
    async fn compile_shader_source(
        &self,
        shader: &str,
        platform: ShaderPlatform,
        include_all_variants: bool,
    ) -> Result<String, SourceError>;
}

/// Serves dumps the engine already wrote to disk.
///
/// `shader` may be a path to a dump file, or a shader name looked up as
/// `<root>/<name>.txt` (raw) and `<root>/<sanitized name>.txt`.
#[derive(Debug, Clone)]
pub struct DumpDirectoryProvider {
    root: PathBuf,
}

impl DumpDirectoryProvider {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn candidates(&self, shader: &str) -> Vec<PathBuf> {
        let mut candidates = vec![PathBuf::from(shader)];
        candidates.push(self.root.join(format!("{shader}.txt")));
        candidates.push(self.root.join(format!("{}.txt", sanitize_file_stem(shader))));
        candidates
    }
}

#[async_trait]
impl ShaderSourceProvider for DumpDirectoryProvider {
    async fn compile_shader_source(
        &self,
        shader: &str,
        platform: ShaderPlatform,
        include_all_variants: bool,
    ) -> Result<String, SourceError> {
        if !platform.is_glsl_es() {
            return Err(SourceError::UnsupportedPlatform(platform));
        }

        for path in self.candidates(shader) {
            if !fs::try_exists(&path).await.unwrap_or(false) || path.is_dir() {
                continue;
            }
            let text = fs::read_to_string(&path)
                .await
                .map_err(|source| SourceError::Io {
                    path: path.clone(),
                    source,
                })?;
            if text.trim().is_empty() {
                return Err(SourceError::Empty(shader.to_string()));
            }
            debug!(
                target: "shader_perf_core",
                shader,
                path = %path.display(),
                %platform,
                include_all_variants,
                bytes = text.len(),
                "loaded compiled shader dump"
            );
            return Ok(text);
        }

        Err(SourceError::NotFound(shader.to_string()))
    }
}
