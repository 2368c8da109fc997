//! Plaintext credential file (`.env`) for the pipeline's API key.
//!
//! The key is stored unencrypted. With `restrict_permissions` the file is
//! limited to owner read/write on Unix; otherwise it keeps the OS default mode.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

/// A single-variable `.env` file.
#[derive(Debug, Clone)]
pub struct CredentialFile {
    path: PathBuf,
    var: String,
    restrict_permissions: bool,
}

impl CredentialFile {
    pub fn new(path: impl Into<PathBuf>, var: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            var: var.into(),
            restrict_permissions: false,
        }
    }

    pub fn restrict_permissions(mut self, restrict: bool) -> Self {
        self.restrict_permissions = restrict;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn var(&self) -> &str {
        &self.var
    }

    /// Overwrite the file with `VAR=value`.
    pub fn save(&self, value: &str) -> Result<()> {
        let contents = format!("{}={}\n", self.var, value);
        fs::write(&self.path, contents)
            .with_context(|| format!("write credential file {}", self.path.display()))?;
        if self.restrict_permissions {
            restrict(&self.path)?;
        }
        debug!(path = %self.path.display(), var = %self.var, "saved credential file");
        Ok(())
    }

    /// Read the variable back, or `None` if the file or the variable is missing.
    pub fn load(&self) -> Result<Option<String>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let iter = dotenvy::from_path_iter(&self.path)
            .with_context(|| format!("open credential file {}", self.path.display()))?;
        for item in iter {
            let (key, value) =
                item.with_context(|| format!("parse credential file {}", self.path.display()))?;
            if key == self.var {
                return Ok(Some(value));
            }
        }
        Ok(None)
    }

    /// Process environment first, then the file. Empty values count as unset.
    pub fn resolve(&self) -> Result<Option<String>> {
        if let Ok(value) = std::env::var(&self.var)
            && !value.is_empty()
        {
            return Ok(Some(value));
        }
        Ok(self.load()?.filter(|value| !value.is_empty()))
    }
}

#[cfg(unix)]
fn restrict(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
        .with_context(|| format!("restrict permissions on {}", path.display()))
}

#[cfg(not(unix))]
fn restrict(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_writes_single_line() {
        let temp = tempfile::tempdir().expect("tempdir");
        let file = CredentialFile::new(temp.path().join(".env"), "OPENAI_API_KEY");
        file.save("sk-abc").expect("save");
        let contents = fs::read_to_string(file.path()).expect("read");
        assert_eq!(contents, "OPENAI_API_KEY=sk-abc\n");
    }

    #[test]
    fn save_overwrites_instead_of_appending() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(".env");
        fs::write(&path, "OTHER=1\nOPENAI_API_KEY=old\n").expect("seed");
        let file = CredentialFile::new(&path, "OPENAI_API_KEY");
        file.save("new").expect("save");
        assert_eq!(fs::read_to_string(&path).expect("read"), "OPENAI_API_KEY=new\n");
    }

    #[test]
    fn load_reads_saved_value() {
        let temp = tempfile::tempdir().expect("tempdir");
        let file = CredentialFile::new(temp.path().join(".env"), "CREW_TEST_CREDENTIAL");
        assert_eq!(file.load().expect("load"), None);
        file.save("sk-round-trip").expect("save");
        assert_eq!(file.load().expect("load").as_deref(), Some("sk-round-trip"));
    }

    #[test]
    fn resolve_falls_back_to_file() {
        let temp = tempfile::tempdir().expect("tempdir");
        let file = CredentialFile::new(temp.path().join(".env"), "CREW_TEST_UNSET_VAR_91B2");
        file.save("from-file").expect("save");
        assert_eq!(file.resolve().expect("resolve").as_deref(), Some("from-file"));
    }

    #[cfg(unix)]
    #[test]
    fn restricted_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempfile::tempdir().expect("tempdir");
        let file = CredentialFile::new(temp.path().join(".env"), "OPENAI_API_KEY")
            .restrict_permissions(true);
        file.save("secret").expect("save");
        let mode = fs::metadata(file.path()).expect("metadata").permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
