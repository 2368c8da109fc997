//! Pure logic with no I/O.

pub mod inputs;
pub mod outcome;
