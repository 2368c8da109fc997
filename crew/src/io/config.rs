//! Runner configuration stored in `crew.toml` at the project root.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::inputs::DEFAULT_TOPIC;

/// Runner configuration (TOML).
///
/// Every field is optional in the file; missing fields fall back to the values
/// the stock crew project layout expects.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CrewConfig {
    /// Python package under `src/` holding `config/agents.yaml` and `config/tasks.yaml`.
    pub package: String,

    /// Topic passed to the pipeline as the `topic` run input.
    pub topic: String,

    /// Command-line tool launched by `crew exec` and the web UI.
    pub tool: CommandConfig,

    /// Command that receives run inputs on stdin for `crew run`.
    pub pipeline: CommandConfig,

    pub report: ReportConfig,
    pub listing: ListingConfig,
    pub credential: CredentialConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CommandConfig {
    /// Program followed by its arguments (e.g. `["crewai","run"]`).
    pub command: Vec<String>,
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            command: vec!["crewai".to_string(), "run".to_string()],
        }
    }
}

impl CommandConfig {
    /// Split into program and arguments. Callers must have validated the config.
    pub fn split(&self) -> Result<(&str, &[String])> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| anyhow!("command must be a non-empty array"))?;
        Ok((program.as_str(), args))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ReportConfig {
    /// Report file relative to the project root.
    pub file: String,
    /// Characters shown in a report preview.
    pub preview_chars: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            file: "report.md".to_string(),
            preview_chars: 10_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ListingConfig {
    /// File names hidden from the project file listing (exact match).
    pub exclude: Vec<String>,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            exclude: vec!["README.md".to_string(), "LICENSE".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CredentialConfig {
    /// Environment variable injected into the tool and written to `.env`.
    pub env_var: String,
    /// Restrict `.env` to owner read/write after saving (Unix only).
    pub restrict_permissions: bool,
}

impl Default for CredentialConfig {
    fn default() -> Self {
        Self {
            env_var: "OPENAI_API_KEY".to_string(),
            restrict_permissions: false,
        }
    }
}

impl Default for CrewConfig {
    fn default() -> Self {
        Self {
            package: "ai_news".to_string(),
            topic: DEFAULT_TOPIC.to_string(),
            tool: CommandConfig::default(),
            pipeline: CommandConfig::default(),
            report: ReportConfig::default(),
            listing: ListingConfig::default(),
            credential: CredentialConfig::default(),
        }
    }
}

impl CrewConfig {
    pub fn validate(&self) -> Result<()> {
        if self.package.trim().is_empty() {
            return Err(anyhow!("package must be non-empty"));
        }
        if is_blank_command(&self.tool.command) {
            return Err(anyhow!("tool.command must be a non-empty array"));
        }
        if is_blank_command(&self.pipeline.command) {
            return Err(anyhow!("pipeline.command must be a non-empty array"));
        }
        if self.report.file.trim().is_empty() {
            return Err(anyhow!("report.file must be non-empty"));
        }
        if self.report.preview_chars == 0 {
            return Err(anyhow!("report.preview_chars must be > 0"));
        }
        if self.credential.env_var.trim().is_empty() {
            return Err(anyhow!("credential.env_var must be non-empty"));
        }
        Ok(())
    }
}

fn is_blank_command(command: &[String]) -> bool {
    command.first().is_none_or(|program| program.trim().is_empty())
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `CrewConfig::default()`.
pub fn load_config(path: &Path) -> Result<CrewConfig> {
    if !path.exists() {
        let cfg = CrewConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: CrewConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Write config to disk, creating the parent directory if needed.
pub fn write_config(path: &Path, cfg: &CrewConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    fs::write(path, buf).with_context(|| format!("write config {}", path.display()))
}
