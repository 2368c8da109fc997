//! Editable pipeline configuration documents (`agents.yaml`, `tasks.yaml`).
//!
//! Documents are opaque text: the schema belongs to the pipeline, so nothing
//! here parses or validates YAML. Saves overwrite in place and the last write wins.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::paths::ProjectPaths;

/// Which of the two configuration documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigDocKind {
    Agents,
    Tasks,
}

impl ConfigDocKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigDocKind::Agents => "agents",
            ConfigDocKind::Tasks => "tasks",
        }
    }

    pub fn file_name(&self) -> &'static str {
        match self {
            ConfigDocKind::Agents => "agents.yaml",
            ConfigDocKind::Tasks => "tasks.yaml",
        }
    }
}

impl fmt::Display for ConfigDocKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConfigDocKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "agents" | "agents.yaml" => Ok(ConfigDocKind::Agents),
            "tasks" | "tasks.yaml" => Ok(ConfigDocKind::Tasks),
            other => Err(anyhow!("unknown config document {other:?} (expected agents or tasks)")),
        }
    }
}

/// One configuration document bound to a fixed path.
#[derive(Debug, Clone)]
pub struct ConfigDocument {
    kind: ConfigDocKind,
    path: PathBuf,
}

impl ConfigDocument {
    pub fn new(kind: ConfigDocKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }

    /// The document of `kind` within a project.
    pub fn for_project(paths: &ProjectPaths, kind: ConfigDocKind) -> Self {
        let path = match kind {
            ConfigDocKind::Agents => &paths.agents_path,
            ConfigDocKind::Tasks => &paths.tasks_path,
        };
        Self::new(kind, path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the document, or an empty string if it does not exist yet.
    pub fn load(&self) -> Result<String> {
        if !self.path.exists() {
            debug!(doc = %self.kind, "config document missing, returning empty text");
            return Ok(String::new());
        }
        fs::read_to_string(&self.path).with_context(|| format!("read {}", self.path.display()))
    }

    /// Overwrite the document with `text` verbatim.
    pub fn save(&self, text: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create directory {}", parent.display()))?;
        }
        fs::write(&self.path, text).with_context(|| format!("write {}", self.path.display()))?;
        debug!(doc = %self.kind, bytes = text.len(), "saved config document");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc_in(temp: &tempfile::TempDir) -> ConfigDocument {
        let paths = ProjectPaths::new(temp.path());
        ConfigDocument::for_project(&paths, ConfigDocKind::Agents)
    }

    #[test]
    fn load_missing_returns_empty() {
        let temp = tempfile::tempdir().expect("tempdir");
        assert_eq!(doc_in(&temp).load().expect("load"), "");
    }

    #[test]
    fn save_creates_parent_directories() {
        let temp = tempfile::tempdir().expect("tempdir");
        let doc = doc_in(&temp);
        doc.save("researcher:\n  role: analyst\n").expect("save");
        assert!(doc.path().is_file());
        assert!(doc.path().ends_with("src/ai_news/config/agents.yaml"));
    }

    #[test]
    fn save_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let doc = doc_in(&temp);
        let samples = [
            "",
            "researcher:\n  role: >\n    {topic} Senior Data Researcher\n  goal: find news\n",
            "no trailing newline",
            "unicode: \u{1F4F0} caf\u{e9}\r\nwindows: line\r\n",
        ];
        for text in samples {
            doc.save(text).expect("save");
            assert_eq!(doc.load().expect("load"), text);
        }
    }

    #[test]
    fn save_overwrites_previous_contents() {
        let temp = tempfile::tempdir().expect("tempdir");
        let doc = doc_in(&temp);
        doc.save("a much longer first version\n").expect("save");
        doc.save("short\n").expect("save");
        assert_eq!(doc.load().expect("load"), "short\n");
    }

    #[test]
    fn kind_parses_names_and_file_names() {
        assert_eq!("agents".parse::<ConfigDocKind>().expect("parse"), ConfigDocKind::Agents);
        assert_eq!("tasks.yaml".parse::<ConfigDocKind>().expect("parse"), ConfigDocKind::Tasks);
        assert!("crew".parse::<ConfigDocKind>().is_err());
    }
}
