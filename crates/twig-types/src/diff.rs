//! Structured diff results handed to the presentation layer.

use std::fmt;

use serde::{Deserialize, Serialize};

/// How a path changed between the base and compare snapshots.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    /// Present only in the compare snapshot.
    Added,
    /// Present in both snapshots with different content.
    Modified,
    /// Present only in the base snapshot.
    Deleted,
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Added => write!(f, "added"),
            Self::Modified => write!(f, "modified"),
            Self::Deleted => write!(f, "deleted"),
        }
    }
}

/// A contiguous block of a unified diff.
///
/// `lines` keep their one-character prefix: `+` added, `-` removed,
/// ` ` context, `\` for the "No newline at end of file" marker.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hunk {
    /// Range header, e.g. `@@ -1,2 +1,3 @@`.
    pub header: String,
    pub lines: Vec<String>,
}

impl Hunk {
    pub fn new(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            lines: Vec::new(),
        }
    }

    /// Number of `+` lines.
    pub fn additions(&self) -> usize {
        self.lines.iter().filter(|l| l.starts_with('+')).count()
    }

    /// Number of `-` lines.
    pub fn deletions(&self) -> usize {
        self.lines.iter().filter(|l| l.starts_with('-')).count()
    }
}

/// The diff of a single path between two branches.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDiffResult {
    /// Repository-relative path, no leading slash.
    pub filename: String,
    pub status: FileStatus,
    pub hunks: Vec<Hunk>,
}

impl FileDiffResult {
    /// Total lines added across all hunks.
    pub fn additions(&self) -> usize {
        self.hunks.iter().map(Hunk::additions).sum()
    }

    /// Total lines removed across all hunks.
    pub fn deletions(&self) -> usize {
        self.hunks.iter().map(Hunk::deletions).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> FileDiffResult {
        FileDiffResult {
            filename: "src/lib.rs".into(),
            status: FileStatus::Modified,
            hunks: vec![Hunk {
                header: "@@ -1,2 +1,2 @@".into(),
                lines: vec![" a".into(), "-b".into(), "+c".into(), "+d".into()],
            }],
        }
    }

    #[test]
    fn counts_lines() {
        let diff = sample();
        assert_eq!(diff.additions(), 2);
        assert_eq!(diff.deletions(), 1);
    }

    #[test]
    fn status_display() {
        assert_eq!(FileStatus::Added.to_string(), "added");
        assert_eq!(FileStatus::Modified.to_string(), "modified");
        assert_eq!(FileStatus::Deleted.to_string(), "deleted");
    }

    #[test]
    fn serializes_status_lowercase() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["status"], "modified");
        assert_eq!(json["filename"], "src/lib.rs");
        assert_eq!(json["hunks"][0]["lines"][2], "+c");
    }

    #[test]
    fn empty_hunk() {
        let hunk = Hunk::new("@@ -0,0 +1 @@");
        assert_eq!(hunk.additions(), 0);
        assert!(hunk.lines.is_empty());
    }
}
