//! Generic utility primitives with zero domain knowledge.
//!
//! - `shell` - Shell escaping, quoting and remote path joining
//! - `template` - String template rendering

pub mod shell;
pub mod template;
