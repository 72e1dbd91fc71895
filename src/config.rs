//! Workflow configuration.
//!
//! Loaded from `image-workflow.toml` in the working root, or from the file
//! named by `--config`. The file is optional and sparse: every key has a
//! default, and unknown keys are rejected to catch typos early.
//!
//! ```toml
//! [tools]
//! backend = "graphicsmagick"   # or "native" (pure Rust, no external tool)
//! gm = "gm"                    # GraphicsMagick executable
//!
//! [output]
//! converted_dir = "converted"  # conversion output tree, below the root
//! thumbnails_dir = "thumbnails" # extracted thumbnails, below the root
//! gallery_file = "gallery.html"
//!
//! [logging]
//! level = "info"               # trace | debug | info | warn | error
//! format = "pretty"            # pretty | json
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Component, Path};
use thiserror::Error;

pub const CONFIG_FILE: &str = "image-workflow.toml";

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorkflowConfig {
    pub tools: ToolsConfig,
    pub output: OutputConfig,
    pub logging: LoggingConfig,
}

/// Which implementation does conversion and metadata queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Shell out to `gm convert` / `gm identify`.
    #[default]
    GraphicsMagick,
    /// Pure Rust: `image` codecs plus embedded-comment reading.
    Native,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolsConfig {
    pub backend: Backend,
    pub gm: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            gm: "gm".to_string(),
        }
    }
}

/// Names of generated files and directories, relative to the root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub converted_dir: String,
    pub thumbnails_dir: String,
    pub gallery_file: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            converted_dir: "converted".to_string(),
            thumbnails_dir: "thumbnails".to_string(),
            gallery_file: "gallery.html".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

/// True for a plain name like `converted`: one normal path component.
fn is_single_component(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

impl WorkflowConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tools.gm.trim().is_empty() {
            return Err(ConfigError::Validation("tools.gm must not be empty".into()));
        }
        for (key, value) in [
            ("output.converted_dir", &self.output.converted_dir),
            ("output.thumbnails_dir", &self.output.thumbnails_dir),
            ("output.gallery_file", &self.output.gallery_file),
        ] {
            if !is_single_component(value) {
                return Err(ConfigError::Validation(format!(
                    "{key} must be a plain name, got {value:?}"
                )));
            }
        }
        if !LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::Validation(format!(
                "logging.level must be one of {}",
                LOG_LEVELS.join(", ")
            )));
        }
        Ok(())
    }
}

/// Parse and validate config text.
pub fn parse_config(content: &str) -> Result<WorkflowConfig, ConfigError> {
    let config: WorkflowConfig = toml::from_str(content)?;
    config.validate()?;
    Ok(config)
}

/// Load an explicitly named config file. The file must exist.
pub fn load_config_file(path: &Path) -> Result<WorkflowConfig, ConfigError> {
    parse_config(&fs::read_to_string(path)?)
}

/// Load `image-workflow.toml` from `root`, or defaults if there is none.
pub fn load_config(root: &Path) -> Result<WorkflowConfig, ConfigError> {
    let config_path = root.join(CONFIG_FILE);
    if !config_path.exists() {
        return Ok(WorkflowConfig::default());
    }
    load_config_file(&config_path)
}
