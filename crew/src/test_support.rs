//! Test-only helpers for building throwaway crew projects.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tempfile::TempDir;

use crate::io::config::{CrewConfig, write_config};
use crate::io::paths::ProjectPaths;

/// A crew project rooted in a temporary directory.
pub struct TestProject {
    dir: TempDir,
    pub paths: ProjectPaths,
}

impl TestProject {
    /// Empty project with a `pyproject.toml` marker and default layout.
    pub fn new() -> Result<Self> {
        let dir = tempfile::tempdir().context("create tempdir")?;
        fs::write(dir.path().join("pyproject.toml"), "[project]\nname = \"ai_news\"\n")
            .context("write pyproject.toml")?;
        let paths = ProjectPaths::new(dir.path());
        Ok(Self { dir, paths })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write `crew.toml` and refresh paths from it.
    pub fn write_config(&mut self, cfg: &CrewConfig) -> Result<()> {
        write_config(&self.paths.config_path, cfg)?;
        self.paths = ProjectPaths::with_config(self.dir.path(), cfg);
        Ok(())
    }

    /// Config whose tool and pipeline run `sh -c <script>`.
    pub fn shell_config(script: &str) -> CrewConfig {
        let command = vec!["sh".to_string(), "-c".to_string(), script.to_string()];
        let mut cfg = CrewConfig::default();
        cfg.tool.command = command.clone();
        cfg.pipeline.command = command;
        cfg
    }

    pub fn write_report(&self, contents: &str) -> Result<()> {
        fs::write(&self.paths.report_path, contents).context("write report")
    }

    pub fn write_file(&self, name: &str, contents: &str) -> Result<()> {
        let path = self.dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, contents).with_context(|| format!("write {}", path.display()))
    }
}
