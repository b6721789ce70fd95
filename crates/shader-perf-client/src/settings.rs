use std::{
    fs::{self, create_dir_all},
    path::{Path, PathBuf},
    time::Duration,
};

use config::{Config, Environment, File, FileFormat};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::{CompilerConfig, DEFAULT_EXECUTABLE, DEFAULT_TIMEOUT};

const SETTINGS_FILE_NAME: &str = "settings.json";
const ENV_PREFIX: &str = "SHADER_PERF";
/// Overrides the settings file location.
pub const SETTINGS_PATH_ENV: &str = "SHADER_PERF_SETTINGS";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to load settings: {0}")]
    Config(#[from] config::ConfigError),
    #[error("failed to access settings file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode settings: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("unknown setting `{0}`")]
    UnknownKey(String),
    #[error("invalid value `{value}` for setting `{key}`")]
    InvalidValue { key: String, value: String },
}

/// User preferences for analysis runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerSettings {
    pub compiler_path: PathBuf,
    pub gpu_model: Option<String>,
    pub verbose: bool,
    pub output_dir: PathBuf,
    pub timeout_secs: u64,
    pub include_all_variants: bool,
}

impl Default for AnalyzerSettings {
    fn default() -> Self {
        let output_dir = ProjectDirs::from("com", "RecordAndLearn", "shader-perf").map_or_else(
            || PathBuf::from("shader-reports"),
            |dirs| dirs.data_dir().join("reports"),
        );
        Self {
            compiler_path: PathBuf::from(DEFAULT_EXECUTABLE),
            gpu_model: None,
            verbose: false,
            output_dir,
            timeout_secs: DEFAULT_TIMEOUT.as_secs(),
            include_all_variants: false,
        }
    }
}

impl AnalyzerSettings {
    pub const KEYS: &'static [&'static str] = &[
        "compiler_path",
        "gpu_model",
        "verbose",
        "output_dir",
        "timeout_secs",
        "include_all_variants",
    ];

    pub fn compiler_config(&self) -> CompilerConfig {
        CompilerConfig {
            executable: self.compiler_path.clone(),
            timeout: Duration::from_secs(self.timeout_secs.max(1)),
            gpu_model: self.gpu_model.clone(),
            verbose: self.verbose,
        }
    }

    /// Updates one setting from its textual form. An empty `gpu_model` clears it.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), SettingsError> {
        let invalid = || SettingsError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        };
        match key {
            "compiler_path" => self.compiler_path = PathBuf::from(value),
            "gpu_model" => {
                let trimmed = value.trim();
                self.gpu_model = (!trimmed.is_empty()).then(|| trimmed.to_string());
            }
            "verbose" => self.verbose = parse_bool(value).ok_or_else(invalid)?,
            "output_dir" => self.output_dir = PathBuf::from(value),
            "timeout_secs" => {
                self.timeout_secs = value
                    .trim()
                    .parse()
                    .ok()
                    .filter(|secs| *secs > 0)
                    .ok_or_else(invalid)?;
            }
            "include_all_variants" => {
                self.include_all_variants = parse_bool(value).ok_or_else(invalid)?;
            }
            other => return Err(SettingsError::UnknownKey(other.to_string())),
        }
        Ok(())
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Settings persisted as JSON, layered with `SHADER_PERF_*` environment overrides.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    /// Store at `$SHADER_PERF_SETTINGS`, else the platform config directory, else the
    /// working directory.
    pub fn default_location() -> Self {
        if let Some(path) = std::env::var_os(SETTINGS_PATH_ENV).filter(|p| !p.is_empty()) {
            return Self::new(path);
        }
        let path = ProjectDirs::from("com", "RecordAndLearn", "shader-perf").map_or_else(
            || PathBuf::from(SETTINGS_FILE_NAME),
            |dirs| dirs.config_dir().join(SETTINGS_FILE_NAME),
        );
        Self::new(path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<AnalyzerSettings, SettingsError> {
        let settings = Config::builder()
            .add_source(
                File::from(self.path.as_path())
                    .format(FileFormat::Json)
                    .required(false),
            )
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize::<AnalyzerSettings>()?;
        debug!(target: "shader_perf_client", path = %self.path.display(), "settings loaded");
        Ok(settings)
    }

    pub fn save(&self, settings: &AnalyzerSettings) -> Result<(), SettingsError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            create_dir_all(parent).map_err(|source| SettingsError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let payload = serde_json::to_vec_pretty(settings)?;
        fs::write(&self.path, payload).map_err(|source| SettingsError::Io {
            path: self.path.clone(),
            source,
        })?;
        debug!(target: "shader_perf_client", path = %self.path.display(), "settings saved");
        Ok(())
    }
}
