//! Loose refs, `packed-refs`, and symbolic ref resolution.
//!
//! Ref names are validated with git's rules before they touch the
//! filesystem:
//! - Must be non-empty
//! - Must not contain whitespace, `~`, `^`, `:`, `?`, `*`, `[`, `\`
//! - Must not contain `..` or `@{`
//! - Components between slashes must be non-empty and must not start with `.`
//! - Must not end with `.lock`

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;
use twig_types::ObjectId;
use twig_vfs::path::join;
use twig_vfs::FileSystem;

use crate::error::{ReaderError, ReaderResult};

/// Symbolic refs nested deeper than this are treated as a loop.
pub const MAX_SYMREF_DEPTH: usize = 5;

pub const HEADS_PREFIX: &str = "refs/heads/";

const FORBIDDEN_CHARS: &[char] = &[' ', '\t', '\n', '\r', '~', '^', ':', '?', '*', '[', '\\'];

/// Check `name` against git's ref naming rules.
pub fn validate_ref_name(name: &str) -> ReaderResult<()> {
    let invalid = |reason: &str| {
        Err(ReaderError::InvalidRefName {
            name: name.to_string(),
            reason: reason.to_string(),
        })
    };
    if name.is_empty() {
        return invalid("must not be empty");
    }
    if let Some(ch) = name.chars().find(|c| FORBIDDEN_CHARS.contains(c) || c.is_control()) {
        return invalid(&format!("contains forbidden character {ch:?}"));
    }
    if name.contains("..") {
        return invalid("must not contain '..'");
    }
    if name.contains("@{") {
        return invalid("must not contain '@{'");
    }
    if name.ends_with(".lock") {
        return invalid("must not end with '.lock'");
    }
    if name.split('/').any(|c| c.is_empty() || c.starts_with('.')) {
        return invalid("components must be non-empty and not start with '.'");
    }
    Ok(())
}

/// What a ref file holds.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RefTarget {
    Direct(ObjectId),
    /// `ref: <name>`
    Symbolic(String),
}

impl RefTarget {
    pub fn parse(name: &str, content: &str) -> ReaderResult<Self> {
        let content = content.trim();
        if let Some(target) = content.strip_prefix("ref:") {
            return Ok(Self::Symbolic(target.trim().to_string()));
        }
        ObjectId::from_hex(content)
            .map(Self::Direct)
            .map_err(|_| ReaderError::CorruptRef {
                name: name.to_string(),
                reason: format!("expected an object id or 'ref:', found {content:?}"),
            })
    }
}

/// Parse the contents of a `packed-refs` file.
///
/// Comment lines (`#`) and peeled-tag lines (`^<id>`) are skipped.
pub fn parse_packed_refs(content: &str) -> ReaderResult<BTreeMap<String, ObjectId>> {
    let mut refs = BTreeMap::new();
    for line in content.lines() {
        let line = line.trim_end();
        if line.is_empty() || line.starts_with('#') || line.starts_with('^') {
            continue;
        }
        let (hex, name) = line.split_once(' ').ok_or_else(|| ReaderError::CorruptRef {
            name: "packed-refs".into(),
            reason: format!("malformed line {line:?}"),
        })?;
        let id = ObjectId::from_hex(hex).map_err(|_| ReaderError::CorruptRef {
            name: "packed-refs".into(),
            reason: format!("invalid object id for {name}"),
        })?;
        refs.insert(name.to_string(), id);
    }
    Ok(refs)
}

/// Render `refs` as a `packed-refs` file.
pub fn encode_packed_refs(refs: &BTreeMap<String, ObjectId>) -> String {
    let mut out = String::from("# pack-refs with: peeled fully-peeled sorted \n");
    for (name, id) in refs {
        out.push_str(&format!("{id} {name}\n"));
    }
    out
}

/// Full ref names a user-supplied name may stand for, in lookup order.
pub fn candidates(name: &str) -> Vec<String> {
    let mut out = Vec::with_capacity(7);
    if name.starts_with("refs/") || is_pseudo_ref(name) {
        out.push(name.to_string());
    }
    out.push(format!("refs/{name}"));
    out.push(format!("refs/tags/{name}"));
    out.push(format!("{HEADS_PREFIX}{name}"));
    out.push(format!("refs/remotes/{name}"));
    out.push(format!("refs/remotes/{name}/HEAD"));
    out
}

/// `HEAD`, `ORIG_HEAD`, `FETCH_HEAD` and friends.
fn is_pseudo_ref(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_uppercase() || c == '_')
}

/// Read-only view of the refs in one git directory.
///
/// `packed-refs` is read once when the store is opened; loose refs are
/// read on demand and take precedence.
pub struct RefStore<'a> {
    fs: &'a dyn FileSystem,
    git_dir: &'a str,
    packed: BTreeMap<String, ObjectId>,
}

impl<'a> RefStore<'a> {
    pub fn open(fs: &'a dyn FileSystem, git_dir: &'a str) -> ReaderResult<Self> {
        let packed = match fs.read_to_string(&join(git_dir, "packed-refs")) {
            Ok(content) => parse_packed_refs(&content)?,
            Err(e) if e.is_not_found() => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            fs,
            git_dir,
            packed,
        })
    }

    /// Read one ref without following symbolic targets.
    pub fn read(&self, name: &str) -> ReaderResult<Option<RefTarget>> {
        if validate_ref_name(name).is_err() {
            return Ok(None);
        }
        match self.fs.read_to_string(&join(self.git_dir, name)) {
            Ok(content) => RefTarget::parse(name, &content).map(Some),
            Err(e) if e.is_not_found() => Ok(self.packed.get(name).copied().map(RefTarget::Direct)),
            Err(e) => Err(e.into()),
        }
    }

    /// Follow `name` through symbolic refs to an object id.
    ///
    /// Returns `Ok(None)` if `name` (or a symbolic target) does not exist.
    pub fn peel(&self, name: &str) -> ReaderResult<Option<ObjectId>> {
        let mut current = name.to_string();
        for _ in 0..=MAX_SYMREF_DEPTH {
            match self.read(&current)? {
                None => return Ok(None),
                Some(RefTarget::Direct(id)) => return Ok(Some(id)),
                Some(RefTarget::Symbolic(target)) => current = target,
            }
        }
        Err(ReaderError::SymrefLoop(name.to_string()))
    }

    /// Resolve a user-supplied reference: a full object id, a full ref
    /// name, or a short branch/tag/remote name.
    pub fn resolve(&self, reference: &str) -> ReaderResult<ObjectId> {
        let reference = reference.trim();
        if ObjectId::is_hex_id(reference) {
            return Ok(ObjectId::from_hex(reference)?);
        }
        for candidate in candidates(reference) {
            if let Some(id) = self.peel(&candidate)? {
                debug!(reference, resolved = %candidate, id = %id.short_hex(), "resolved ref");
                return Ok(id);
            }
        }
        Err(ReaderError::RefNotFound(reference.to_string()))
    }

    /// Local branch names (without `refs/heads/`), sorted.
    pub fn branches(&self) -> Vec<String> {
        let mut names = BTreeSet::new();
        let heads = join(self.git_dir, HEADS_PREFIX);
        self.collect_loose(&heads, "", &mut names);
        names.extend(
            self.packed
                .keys()
                .filter_map(|name| name.strip_prefix(HEADS_PREFIX))
                .map(str::to_string),
        );
        names.into_iter().collect()
    }

    /// Walk `dir` with an explicit stack, adding every file as `prefix + name`.
    fn collect_loose(&self, dir: &str, prefix: &str, out: &mut BTreeSet<String>) {
        let mut stack = vec![(dir.to_string(), prefix.to_string())];
        while let Some((dir, prefix)) = stack.pop() {
            for child in self.fs.list(&dir) {
                let path = join(&dir, &child);
                let name = format!("{prefix}{child}");
                match self.fs.stat(&path) {
                    Ok(meta) if meta.is_dir() => stack.push((path, format!("{name}/"))),
                    Ok(_) => {
                        out.insert(name);
                    }
                    Err(_) => {}
                }
            }
        }
    }
}
