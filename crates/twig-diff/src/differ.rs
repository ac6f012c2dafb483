//! Text differencing: producing and reading unified patches.
//!
//! Uses the `similar` crate (Myers diff algorithm) to produce hunks with
//! context lines.

use similar::TextDiff;

use crate::config::DiffConfig;
use crate::patch::{self, FilePatch};

const SEPARATOR: &str = "===================================================================";

/// Produces and parses unified diffs.
pub trait TextDiffer: Send + Sync {
    /// Unified patch turning `old` into `new` for `file_name`.
    ///
    /// The labels name the two sides (branch names, revisions) and follow
    /// the file name on the `---`/`+++` lines.
    fn create_patch(
        &self,
        file_name: &str,
        old: &str,
        new: &str,
        old_label: &str,
        new_label: &str,
    ) -> String;

    /// Split a unified patch into per-file hunks.
    fn parse_patch(&self, patch: &str) -> Vec<FilePatch> {
        patch::parse_patch(patch)
    }
}

/// [`TextDiffer`] backed by `similar`'s line diff.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SimilarDiffer {
    context_lines: usize,
}

impl SimilarDiffer {
    pub fn new(context_lines: usize) -> Self {
        Self { context_lines }
    }

    pub fn from_config(config: &DiffConfig) -> Self {
        Self::new(config.context_lines)
    }

    pub fn context_lines(&self) -> usize {
        self.context_lines
    }
}

impl Default for SimilarDiffer {
    fn default() -> Self {
        Self::from_config(&DiffConfig::default())
    }
}

impl TextDiffer for SimilarDiffer {
    fn create_patch(
        &self,
        file_name: &str,
        old: &str,
        new: &str,
        old_label: &str,
        new_label: &str,
    ) -> String {
        let old_header = format!("{file_name}\t{old_label}");
        let new_header = format!("{file_name}\t{new_label}");

        let mut out = format!("Index: {file_name}\n{SEPARATOR}\n");
        let body = TextDiff::from_lines(old, new)
            .unified_diff()
            .context_radius(self.context_lines)
            .header(&old_header, &new_header)
            .to_string();
        if body.is_empty() {
            // similar omits the file lines when nothing changed.
            out.push_str(&format!("--- {old_header}\n+++ {new_header}\n"));
        } else {
            out.push_str(&body);
        }
        out
    }
}
