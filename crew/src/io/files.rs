//! Listing of files in the project root.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

/// Names of regular files directly inside `dir`, skipping exact matches in `exclude`.
///
/// Order is whatever the directory enumeration yields.
pub fn list_files<S: AsRef<str>>(dir: &Path, exclude: &[S]) -> Result<Vec<String>> {
    let entries = fs::read_dir(dir).with_context(|| format!("read directory {}", dir.display()))?;

    let mut names = Vec::new();
    for entry in entries.flatten() {
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        let is_file = file_type.is_file() || (file_type.is_symlink() && entry.path().is_file());
        if !is_file {
            continue;
        }
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        if exclude.iter().any(|skip| skip.as_ref() == name) {
            continue;
        }
        names.push(name);
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    const EXCLUDE: [&str; 2] = ["README.md", "LICENSE"];

    #[test]
    fn excludes_readme_and_license() {
        let temp = tempfile::tempdir().expect("tempdir");
        for name in ["README.md", "LICENSE", "report.md", "notes.txt"] {
            fs::write(temp.path().join(name), "").expect("write");
        }

        let names: BTreeSet<String> = list_files(temp.path(), &EXCLUDE)
            .expect("list")
            .into_iter()
            .collect();
        let expected: BTreeSet<String> = ["report.md", "notes.txt"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(names, expected);
    }

    #[test]
    fn skips_directories() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::create_dir_all(temp.path().join("src")).expect("mkdir");
        fs::write(temp.path().join("pyproject.toml"), "").expect("write");

        let names = list_files(temp.path(), &EXCLUDE).expect("list");
        assert_eq!(names, vec!["pyproject.toml"]);
    }

    #[test]
    fn exclusion_is_case_sensitive() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::write(temp.path().join("readme.md"), "").expect("write");
        fs::write(temp.path().join("License"), "").expect("write");

        let names: BTreeSet<String> = list_files(temp.path(), &EXCLUDE)
            .expect("list")
            .into_iter()
            .collect();
        assert_eq!(names.len(), 2);
        assert!(names.contains("readme.md"));
        assert!(names.contains("License"));
    }

    #[test]
    fn missing_directory_is_an_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        assert!(list_files(&temp.path().join("gone"), &EXCLUDE).is_err());
    }
}
