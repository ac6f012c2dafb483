//! Unified diff parsing.
//!
//! Hunk bodies are read by count: a hunk ends once the old and new line
//! counts from its `@@` header are used up, plus any trailing
//! `\ No newline at end of file` marker. Text outside hunks (`Index:`,
//! `===`, `diff --git`, ...) is ignored apart from file names.

use twig_types::Hunk;

pub const OLD_FILE_PREFIX: &str = "--- ";
pub const NEW_FILE_PREFIX: &str = "+++ ";
pub const HUNK_HEADER_PREFIX: &str = "@@ ";
pub const INDEX_PREFIX: &str = "Index: ";

/// Line ranges from a hunk header (`@@ -old_start,old_lines +new_start,new_lines @@`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HunkRange {
    pub old_start: usize,
    pub old_lines: usize,
    pub new_start: usize,
    pub new_lines: usize,
}

impl HunkRange {
    /// Parse a hunk header. An omitted count means one line.
    pub fn parse(header: &str) -> Option<Self> {
        let rest = header.strip_prefix(HUNK_HEADER_PREFIX)?;
        let (ranges, _) = rest.split_once("@@")?;
        let mut parts = ranges.split_whitespace();
        let (old_start, old_lines) = parse_range(parts.next()?.strip_prefix('-')?)?;
        let (new_start, new_lines) = parse_range(parts.next()?.strip_prefix('+')?)?;
        if parts.next().is_some() {
            return None;
        }
        Some(Self {
            old_start,
            old_lines,
            new_start,
            new_lines,
        })
    }
}

impl std::fmt::Display for HunkRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "@@ -{},{} +{},{} @@",
            self.old_start, self.old_lines, self.new_start, self.new_lines
        )
    }
}

fn parse_range(range: &str) -> Option<(usize, usize)> {
    match range.split_once(',') {
        Some((start, len)) => Some((start.parse().ok()?, len.parse().ok()?)),
        None => Some((range.parse().ok()?, 1)),
    }
}

/// One file's section of a unified diff.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FilePatch {
    /// Name from an `Index:` line, if present.
    pub index: Option<String>,
    pub old_file_name: Option<String>,
    /// Text after the tab on the `---` line (a label or timestamp).
    pub old_header: Option<String>,
    pub new_file_name: Option<String>,
    pub new_header: Option<String>,
    pub hunks: Vec<Hunk>,
}

impl FilePatch {
    fn is_blank(&self) -> bool {
        *self == Self::default()
    }
}

/// Parse `text` into per-file patches.
///
/// Lines that fit no known shape end the current hunk and are otherwise
/// skipped, so a damaged patch yields whatever hunks precede the damage.
pub fn parse_patch(text: &str) -> Vec<FilePatch> {
    let mut patches = Vec::new();
    let mut current = FilePatch::default();
    let mut lines = text.lines().peekable();

    while let Some(line) = lines.next() {
        if let Some(name) = line.strip_prefix(INDEX_PREFIX) {
            finish(&mut patches, &mut current);
            current.index = Some(name.trim().to_string());
        } else if let Some(rest) = line.strip_prefix(OLD_FILE_PREFIX) {
            if current.old_file_name.is_some() || !current.hunks.is_empty() {
                finish(&mut patches, &mut current);
            }
            let (name, header) = split_file_line(rest);
            current.old_file_name = Some(name);
            current.old_header = header;
        } else if let Some(rest) = line.strip_prefix(NEW_FILE_PREFIX) {
            let (name, header) = split_file_line(rest);
            current.new_file_name = Some(name);
            current.new_header = header;
        } else if let Some(range) = HunkRange::parse(line) {
            let mut hunk = Hunk::new(hunk_header(line));
            let mut old_left = range.old_lines;
            let mut new_left = range.new_lines;

            while let Some(&next) = lines.peek() {
                let counts_left = old_left > 0 || new_left > 0;
                let accepted = match next.as_bytes().first() {
                    Some(b'\\') => true,
                    _ if !counts_left => false,
                    Some(b' ') => {
                        old_left = old_left.saturating_sub(1);
                        new_left = new_left.saturating_sub(1);
                        true
                    }
                    Some(b'-') if old_left > 0 => {
                        old_left -= 1;
                        true
                    }
                    Some(b'+') if new_left > 0 => {
                        new_left -= 1;
                        true
                    }
                    // Some tools strip the space from empty context lines.
                    None if old_left > 0 && new_left > 0 => {
                        old_left -= 1;
                        new_left -= 1;
                        hunk.lines.push(" ".to_string());
                        lines.next();
                        continue;
                    }
                    _ => false,
                };
                if !accepted {
                    break;
                }
                hunk.lines.push(next.to_string());
                lines.next();
            }
            current.hunks.push(hunk);
        }
    }
    finish(&mut patches, &mut current);
    patches
}

fn finish(patches: &mut Vec<FilePatch>, current: &mut FilePatch) {
    let done = std::mem::take(current);
    if !done.is_blank() {
        patches.push(done);
    }
}

/// `name\theader` -> (name, Some(header)).
fn split_file_line(rest: &str) -> (String, Option<String>) {
    match rest.split_once('\t') {
        Some((name, header)) => (name.to_string(), Some(header.to_string())),
        None => (rest.trim_end().to_string(), None),
    }
}

/// The header up to and including the closing `@@`, dropping any section text.
fn hunk_header(line: &str) -> String {
    let end = line[HUNK_HEADER_PREFIX.len()..]
        .find("@@")
        .map(|i| HUNK_HEADER_PREFIX.len() + i + 2)
        .unwrap_or(line.len());
    line[..end].to_string()
}
