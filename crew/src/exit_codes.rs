//! Stable exit codes for crew CLI commands.

/// Command succeeded.
pub const OK: i32 = 0;
/// Command failed (invalid config, pipeline failure, I/O errors).
pub const ERROR: i32 = 1;
/// The external command-line tool could not be located.
pub const TOOL_NOT_FOUND: i32 = 127;
