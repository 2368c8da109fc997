//! I/O helpers for crew commands and the web UI.

pub mod config;
pub mod credentials;
pub mod documents;
pub mod files;
pub mod paths;
pub mod process;
pub mod report;
