//! Files named after versions (`0.1.sql`, `1.2.6.sql`, ...), typically
//! upgrade scripts applied between the installed and the deployed version.

use regex::Regex;
use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use crate::error::{Error, Result};

static COMPONENT_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+|[A-Za-z]+").unwrap());

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum Component {
    Number(u64),
    Text(String),
}

/// Permissive version: runs of digits compare numerically, runs of letters
/// lexically, everything else separates. A number sorts before text at the
/// same position, so `1.0` < `1.0a` < `1.0b` and `1.9` < `1.10`.
#[derive(Debug, Clone)]
pub struct LooseVersion {
    raw: String,
    components: Vec<Component>,
}

impl LooseVersion {
    pub fn parse(raw: &str) -> Self {
        let components = COMPONENT_PATTERN
            .find_iter(raw)
            .map(|m| match m.as_str().parse::<u64>() {
                Ok(n) => Component::Number(n),
                Err(_) => Component::Text(m.as_str().to_string()),
            })
            .collect();
        Self {
            raw: raw.to_string(),
            components,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl PartialEq for LooseVersion {
    fn eq(&self, other: &Self) -> bool {
        self.components == other.components
    }
}

impl Eq for LooseVersion {}

impl PartialOrd for LooseVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for LooseVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.components.cmp(&other.components)
    }
}

impl fmt::Display for LooseVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl Serialize for LooseVersion {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionFile {
    pub version: LooseVersion,
    pub path: PathBuf,
}

/// Files `<version>.<extension>` in `directory` with
/// `from_version < version <= to_version`, sorted by version.
pub fn get_version_files(
    from_version: &str,
    to_version: &str,
    directory: &Path,
    extension: &str,
) -> Result<Vec<VersionFile>> {
    let from = LooseVersion::parse(from_version);
    let to = LooseVersion::parse(to_version);
    let extension = extension.trim_start_matches('.');

    let pattern = format!(
        "{}/*.{}",
        glob::Pattern::escape(directory.to_string_lossy().trim_end_matches('/')),
        glob::Pattern::escape(extension)
    );

    let entries = glob::glob(&pattern).map_err(|e| {
        Error::validation_invalid_argument("extension", e.to_string(), Some(extension.to_string()), None)
    })?;

    let mut files: Vec<VersionFile> = entries
        .filter_map(|entry| entry.ok())
        .filter_map(|path| {
            let stem = path.file_stem()?.to_str()?;
            let version = LooseVersion::parse(stem);
            (from < version && version <= to).then_some(VersionFile { version, path })
        })
        .collect();

    files.sort_by(|a, b| a.version.cmp(&b.version));
    Ok(files)
}
