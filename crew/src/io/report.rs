//! Read-only access to the report produced by the pipeline.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

pub const REPORT_FILE_NAME: &str = "report.md";
pub const REPORT_MIME_TYPE: &str = "text/markdown";
pub const DEFAULT_PREVIEW_CHARS: usize = 10_000;

/// Full report text offered as a named download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportExport {
    pub file_name: &'static str,
    pub mime_type: &'static str,
    pub contents: String,
}

/// Bounded preview of the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportPreview {
    pub text: String,
    /// True when the report is longer than the preview.
    pub truncated: bool,
}

/// Viewer over a fixed report path. Never writes to the report.
#[derive(Debug, Clone)]
pub struct ReportViewer {
    path: PathBuf,
    preview_chars: usize,
}

impl ReportViewer {
    pub fn new(path: impl Into<PathBuf>, preview_chars: usize) -> Self {
        Self {
            path: path.into(),
            preview_chars,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// First `preview_chars` characters, or `None` if there is no report yet.
    pub fn preview(&self) -> Result<Option<ReportPreview>> {
        let Some(text) = self.read()? else {
            return Ok(None);
        };
        let preview = match text.char_indices().nth(self.preview_chars) {
            Some((cut, _)) => ReportPreview {
                text: text[..cut].to_string(),
                truncated: true,
            },
            None => ReportPreview {
                text,
                truncated: false,
            },
        };
        Ok(Some(preview))
    }

    /// The complete report as `report.md`, or `None` if there is no report yet.
    pub fn download(&self) -> Result<Option<ReportExport>> {
        Ok(self.read()?.map(|contents| ReportExport {
            file_name: REPORT_FILE_NAME,
            mime_type: REPORT_MIME_TYPE,
            contents,
        }))
    }

    fn read(&self) -> Result<Option<String>> {
        if !self.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(&self.path)
            .with_context(|| format!("read report {}", self.path.display()))?;
        Ok(Some(text))
    }
}
