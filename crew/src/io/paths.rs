//! Canonical paths within a crew project.

use std::path::{Path, PathBuf};

use tracing::debug;

use super::config::CrewConfig;

/// Files whose presence marks a project root.
const ROOT_MARKERS: [&str; 2] = ["pyproject.toml", "crew.toml"];

/// Name of the optional runner configuration file in the project root.
pub const CONFIG_FILE: &str = "crew.toml";

/// All fixed paths for a project root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectPaths {
    pub root: PathBuf,
    pub config_path: PathBuf,
    pub config_dir: PathBuf,
    pub agents_path: PathBuf,
    pub tasks_path: PathBuf,
    pub report_path: PathBuf,
    pub env_path: PathBuf,
}

impl ProjectPaths {
    /// Paths for `root` using the default package and report names.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_config(root, &CrewConfig::default())
    }

    /// Paths for `root` honoring the package and report file from `cfg`.
    pub fn with_config(root: impl Into<PathBuf>, cfg: &CrewConfig) -> Self {
        let root = root.into();
        let config_dir = root.join("src").join(&cfg.package).join("config");
        Self {
            config_path: root.join(CONFIG_FILE),
            agents_path: config_dir.join("agents.yaml"),
            tasks_path: config_dir.join("tasks.yaml"),
            report_path: root.join(&cfg.report.file),
            env_path: root.join(".env"),
            config_dir,
            root,
        }
    }
}

/// Walk upward from `start` to the first directory containing a root marker.
///
/// Falls back to `start` when no ancestor has one.
pub fn detect_root(start: &Path) -> PathBuf {
    for dir in start.ancestors() {
        if ROOT_MARKERS.iter().any(|marker| dir.join(marker).is_file()) {
            debug!(root = %dir.display(), "detected project root");
            return dir.to_path_buf();
        }
    }
    debug!(start = %start.display(), "no project marker found, using start directory");
    start.to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn paths_follow_package_layout() {
        let paths = ProjectPaths::new("/repo");
        assert_eq!(
            paths.agents_path,
            PathBuf::from("/repo/src/ai_news/config/agents.yaml")
        );
        assert_eq!(
            paths.tasks_path,
            PathBuf::from("/repo/src/ai_news/config/tasks.yaml")
        );
        assert_eq!(paths.report_path, PathBuf::from("/repo/report.md"));
        assert_eq!(paths.env_path, PathBuf::from("/repo/.env"));
        assert_eq!(paths.config_path, PathBuf::from("/repo/crew.toml"));
    }

    #[test]
    fn paths_use_configured_package() {
        let mut cfg = CrewConfig::default();
        cfg.package = "market_watch".to_string();
        cfg.report.file = "out/summary.md".to_string();
        let paths = ProjectPaths::with_config("/repo", &cfg);
        assert_eq!(
            paths.config_dir,
            PathBuf::from("/repo/src/market_watch/config")
        );
        assert_eq!(paths.report_path, PathBuf::from("/repo/out/summary.md"));
    }

    #[test]
    fn detect_root_finds_marker_in_ancestor() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::write(temp.path().join("pyproject.toml"), "").expect("write marker");
        let nested = temp.path().join("src").join("ai_news");
        fs::create_dir_all(&nested).expect("mkdir");

        assert_eq!(detect_root(&nested), temp.path());
    }

    #[test]
    fn detect_root_falls_back_to_start() {
        let temp = tempfile::tempdir().expect("tempdir");
        let nested = temp.path().join("a");
        fs::create_dir_all(&nested).expect("mkdir");

        let root = detect_root(&nested);
        // An ancestor of the temp dir may carry a marker; the start is the floor otherwise.
        assert!(nested.starts_with(&root));
    }
}
