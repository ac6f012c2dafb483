//! Populating a [`MemoryFs`] from an uploaded folder.
//!
//! A folder picker hands over a flat list of files whose paths all start
//! with the selected folder's name (`my-repo/.git/HEAD`, `my-repo/src/lib.rs`).
//! That leading segment is the repository root and is stripped, so the
//! repository lands at `/` inside the filesystem.

use bytes::Bytes;
use tracing::{debug, info};

use crate::memory::MemoryFs;

/// One file from an uploaded folder.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadedFile {
    /// Slash-separated path relative to the picker's parent, root folder first.
    pub relative_path: String,
    pub data: Bytes,
}

impl UploadedFile {
    pub fn new(relative_path: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            relative_path: relative_path.into(),
            data: data.into(),
        }
    }
}

/// Summary of an ingestion pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// The stripped root folder name, taken from the first entry.
    pub root: Option<String>,
    pub files_written: usize,
    /// Entries with no file path left once the root was stripped.
    pub skipped: usize,
    pub bytes_written: u64,
}

/// Replace the contents of `fs` with `files`.
///
/// The filesystem is cleared before the first write so nothing from a
/// previous upload survives. An empty upload is a no-op and leaves `fs`
/// untouched.
pub fn ingest<I>(fs: &MemoryFs, files: I) -> IngestReport
where
    I: IntoIterator<Item = UploadedFile>,
{
    let mut files = files.into_iter().peekable();
    let Some(first) = files.peek() else {
        debug!("empty upload; nothing to ingest");
        return IngestReport::default();
    };

    let root = root_segment(&first.relative_path).to_string();
    fs.clear();

    let mut report = IngestReport {
        root: Some(root.clone()),
        ..IngestReport::default()
    };

    for file in files {
        let rest = strip_root(&file.relative_path);
        if rest.is_empty() {
            report.skipped += 1;
            continue;
        }
        let size = file.data.len() as u64;
        if !fs.store(rest, file.data) {
            report.skipped += 1;
            continue;
        }
        report.bytes_written += size;
        report.files_written += 1;
    }

    info!(
        root = %root,
        files = report.files_written,
        skipped = report.skipped,
        bytes = report.bytes_written,
        "ingested upload"
    );
    report
}

/// The first path segment, ignoring leading slashes.
fn root_segment(path: &str) -> &str {
    path.trim_start_matches('/').split('/').next().unwrap_or("")
}

/// Everything after the first path segment.
fn strip_root(path: &str) -> &str {
    path.trim_start_matches('/')
        .split_once('/')
        .map(|(_, rest)| rest)
        .unwrap_or("")
}
