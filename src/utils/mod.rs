//! Small shared helpers.
pub mod devlog;
