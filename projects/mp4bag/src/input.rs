use crate::error::{MergeError, Result};
use crate::time::{StartTimeParser, Timestamp};
use std::path::{Path, PathBuf};

/// An input recording together with the start time encoded in its name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputFile {
    pub path: PathBuf,
    pub start_time: Timestamp,
}

impl InputFile {
    pub fn from_path(path: &Path, parser: &dyn StartTimeParser) -> Result<Self> {
        Ok(Self {
            path: path.to_path_buf(),
            start_time: parser.parse_start(path)?,
        })
    }

    pub fn display_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

/// Expands glob patterns into a sorted, duplicate-free list of files.
///
/// Patterns that match nothing are skipped. Malformed patterns and unreadable
/// entries are logged and skipped as well; an empty result is not an error.
pub fn resolve_input_set<S: AsRef<str>>(patterns: &[S]) -> Vec<PathBuf> {
    let mut paths = Vec::new();

    for pattern in patterns {
        let pattern = pattern.as_ref();
        let entries = match glob::glob(pattern) {
            Ok(entries) => entries,
            Err(e) => {
                let err = MergeError::InputResolution {
                    pattern: pattern.to_string(),
                    reason: e.to_string(),
                };
                tracing::warn!("{}", err);
                continue;
            }
        };

        let before = paths.len();
        for entry in entries {
            match entry {
                Ok(path) => paths.push(path),
                Err(e) => tracing::warn!(
                    "{}",
                    MergeError::InputResolution {
                        pattern: pattern.to_string(),
                        reason: e.to_string(),
                    }
                ),
            }
        }
        if paths.len() == before {
            tracing::debug!("pattern '{}' matched no files", pattern);
        }
    }

    paths.sort_by(|a, b| a.as_os_str().cmp(b.as_os_str()));
    paths.dedup();
    paths
}

/// Attaches a start time to every resolved path. Fails on the first name the
/// parser rejects.
pub fn parse_input_set(paths: &[PathBuf], parser: &dyn StartTimeParser) -> Result<Vec<InputFile>> {
    paths
        .iter()
        .map(|path| InputFile::from_path(path, parser))
        .collect()
}
