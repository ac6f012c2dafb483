use std::fmt;

use bytes::Bytes;
use tracing::debug;
use twig_types::ObjectId;

use crate::error::{ReaderError, ReaderResult};

/// The kind of a git object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Commit,
    Tree,
    Blob,
    /// Annotated tag.
    Tag,
}

impl ObjectKind {
    /// The name used in object headers.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Commit => "commit",
            Self::Tree => "tree",
            Self::Blob => "blob",
            Self::Tag => "tag",
        }
    }

    /// Parse an object header kind.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "commit" => Some(Self::Commit),
            "tree" => Some(Self::Tree),
            "blob" => Some(Self::Blob),
            "tag" => Some(Self::Tag),
            _ => None,
        }
    }

    /// Pack entry type code for non-delta objects.
    pub fn pack_type(&self) -> u8 {
        match self {
            Self::Commit => 1,
            Self::Tree => 2,
            Self::Blob => 3,
            Self::Tag => 4,
        }
    }

    /// Kind for a non-delta pack entry type code.
    pub fn from_pack_type(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Commit),
            2 => Some(Self::Tree),
            3 => Some(Self::Blob),
            4 => Some(Self::Tag),
            _ => None,
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An object's kind plus its uncompressed payload (header stripped).
///
/// `RawObject` is the unit the cache stores. Payloads are `Bytes`, so
/// handing one out is a reference-count bump, not a copy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawObject {
    pub kind: ObjectKind,
    pub data: Bytes,
}

impl RawObject {
    pub fn new(kind: ObjectKind, data: impl Into<Bytes>) -> Self {
        Self {
            kind,
            data: data.into(),
        }
    }

    /// Compute the object id of this payload.
    pub fn id(&self) -> ObjectId {
        ObjectId::hash_object(self.kind.as_str(), &self.data)
    }

    /// Fail unless this object has kind `expected`.
    pub fn expect_kind(&self, id: &ObjectId, expected: ObjectKind) -> ReaderResult<()> {
        if self.kind != expected {
            return Err(ReaderError::UnexpectedKind {
                id: *id,
                expected,
                actual: self.kind,
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tree
// ---------------------------------------------------------------------------

/// What a tree entry points at, derived from its mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntryKind {
    /// Regular file, executable, or symlink target.
    Blob,
    /// Subdirectory.
    Tree,
    /// Submodule commit; its content lives in another repository.
    Commit,
}

impl EntryKind {
    pub fn from_mode(mode: u32) -> Self {
        match mode {
            0o040000 => Self::Tree,
            0o160000 => Self::Commit,
            _ => Self::Blob,
        }
    }
}

/// A single entry in a tree object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TreeEntry {
    pub mode: u32,
    /// Entry name (one path segment).
    pub path: String,
    pub oid: ObjectId,
    pub kind: EntryKind,
}

impl TreeEntry {
    pub fn new(mode: u32, path: impl Into<String>, oid: ObjectId) -> Self {
        Self {
            mode,
            path: path.into(),
            oid,
            kind: EntryKind::from_mode(mode),
        }
    }

    /// Regular file entry (`100644`).
    pub fn file(path: impl Into<String>, oid: ObjectId) -> Self {
        Self::new(0o100644, path, oid)
    }

    /// Subtree entry (`40000`).
    pub fn dir(path: impl Into<String>, oid: ObjectId) -> Self {
        Self::new(0o040000, path, oid)
    }

    // Git orders trees as if directory names ended in '/'.
    fn sort_key(&self) -> Vec<u8> {
        let mut key = self.path.as_bytes().to_vec();
        if self.kind == EntryKind::Tree {
            key.push(b'/');
        }
        key
    }
}

/// Directory listing object.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Tree {
    pub entries: Vec<TreeEntry>,
}

impl Tree {
    /// Create a tree, ordering entries the way git does.
    pub fn new(mut entries: Vec<TreeEntry>) -> Self {
        entries.sort_by_key(TreeEntry::sort_key);
        Self { entries }
    }

    /// Decode the binary tree format: repeated `"<mode> <name>\0<20-byte id>"`.
    pub fn parse(id: &ObjectId, data: &[u8]) -> ReaderResult<Self> {
        let mut entries = Vec::new();
        let mut rest = data;
        while !rest.is_empty() {
            let space = rest
                .iter()
                .position(|&b| b == b' ')
                .ok_or_else(|| ReaderError::corrupt(*id, "unexpected end of tree entry mode"))?;
            let mode_str = std::str::from_utf8(&rest[..space])
                .map_err(|_| ReaderError::corrupt(*id, "non-ascii tree entry mode"))?;
            let mode = u32::from_str_radix(mode_str, 8)
                .map_err(|_| ReaderError::corrupt(*id, format!("invalid mode {mode_str:?}")))?;
            rest = &rest[space + 1..];

            let nul = rest
                .iter()
                .position(|&b| b == 0)
                .ok_or_else(|| ReaderError::corrupt(*id, "unexpected end of tree entry name"))?;
            let raw_name = &rest[..nul];
            let name = String::from_utf8_lossy(raw_name).into_owned();
            if name.as_bytes() != raw_name {
                // distinct raw names can collapse to the same path here
                debug!(
                    tree = %id.short_hex(),
                    raw = %hex::encode(raw_name),
                    name = %name,
                    "tree entry name is not UTF-8"
                );
            }
            rest = &rest[nul + 1..];

            let oid = ObjectId::from_slice(rest)
                .map_err(|_| ReaderError::corrupt(*id, "truncated tree entry id"))?;
            rest = &rest[twig_types::object::OID_LEN..];

            entries.push(TreeEntry::new(mode, name, oid));
        }
        Ok(Self { entries })
    }

    /// Encode into the binary tree format.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for entry in &self.entries {
            out.extend_from_slice(format!("{:o} {}", entry.mode, entry.path).as_bytes());
            out.push(0);
            out.extend_from_slice(entry.oid.as_bytes());
        }
        out
    }

    pub fn to_raw(&self) -> RawObject {
        RawObject::new(ObjectKind::Tree, self.encode())
    }

    /// Look up an entry by name.
    pub fn get(&self, name: &str) -> Option<&TreeEntry> {
        self.entries.iter().find(|e| e.path == name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Commit
// ---------------------------------------------------------------------------

/// A commit: one root tree plus metadata.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Commit {
    pub tree: ObjectId,
    pub parents: Vec<ObjectId>,
    pub author: Option<String>,
    pub committer: Option<String>,
    pub message: String,
}

impl Commit {
    pub fn new(tree: ObjectId, parents: Vec<ObjectId>, message: impl Into<String>) -> Self {
        Self {
            tree,
            parents,
            author: None,
            committer: None,
            message: message.into(),
        }
    }

    /// Decode a commit payload. Unknown headers (e.g. `gpgsig`) are skipped.
    pub fn parse(id: &ObjectId, data: &[u8]) -> ReaderResult<Self> {
        let text = String::from_utf8_lossy(data);
        let (headers, message) = text.split_once("\n\n").unwrap_or((text.as_ref(), ""));

        let mut tree = None;
        let mut parents = Vec::new();
        let mut author = None;
        let mut committer = None;
        for line in headers.lines() {
            let Some((key, value)) = line.split_once(' ') else {
                continue;
            };
            match key {
                "tree" => tree = Some(parse_header_id(id, "tree", value)?),
                "parent" => parents.push(parse_header_id(id, "parent", value)?),
                "author" => author = Some(value.to_string()),
                "committer" => committer = Some(value.to_string()),
                _ => {}
            }
        }

        Ok(Self {
            tree: tree.ok_or_else(|| ReaderError::corrupt(*id, "commit has no tree header"))?,
            parents,
            author,
            committer,
            message: message.to_string(),
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = format!("tree {}\n", self.tree);
        for parent in &self.parents {
            out.push_str(&format!("parent {parent}\n"));
        }
        if let Some(author) = &self.author {
            out.push_str(&format!("author {author}\n"));
        }
        if let Some(committer) = &self.committer {
            out.push_str(&format!("committer {committer}\n"));
        }
        out.push('\n');
        out.push_str(&self.message);
        out.into_bytes()
    }

    pub fn to_raw(&self) -> RawObject {
        RawObject::new(ObjectKind::Commit, self.encode())
    }
}

// ---------------------------------------------------------------------------
// Tag
// ---------------------------------------------------------------------------

/// The parts of an annotated tag needed to peel it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tag {
    pub object: ObjectId,
    pub kind: ObjectKind,
}

impl Tag {
    pub fn parse(id: &ObjectId, data: &[u8]) -> ReaderResult<Self> {
        let text = String::from_utf8_lossy(data);
        let mut object = None;
        let mut kind = None;
        for line in text.lines().take_while(|l| !l.is_empty()) {
            match line.split_once(' ') {
                Some(("object", value)) => object = Some(parse_header_id(id, "object", value)?),
                Some(("type", value)) => kind = ObjectKind::parse(value.trim()),
                _ => {}
            }
        }
        match (object, kind) {
            (Some(object), Some(kind)) => Ok(Self { object, kind }),
            _ => Err(ReaderError::corrupt(*id, "tag is missing object or type")),
        }
    }
}

fn parse_header_id(id: &ObjectId, header: &str, value: &str) -> ReaderResult<ObjectId> {
    value
        .trim()
        .parse()
        .map_err(|_| ReaderError::corrupt(*id, format!("invalid {header} id {value:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oid(b: u8) -> ObjectId {
        ObjectId::from_hash([b; 20])
    }

    #[test]
    fn kind_names_roundtrip() {
        for kind in [ObjectKind::Commit, ObjectKind::Tree, ObjectKind::Blob, ObjectKind::Tag] {
            assert_eq!(ObjectKind::parse(kind.as_str()), Some(kind));
            assert_eq!(ObjectKind::from_pack_type(kind.pack_type()), Some(kind));
        }
        assert_eq!(ObjectKind::parse("ofs-delta"), None);
        assert_eq!(ObjectKind::from_pack_type(6), None);
    }

    #[test]
    fn entry_kind_from_mode() {
        assert_eq!(EntryKind::from_mode(0o100644), EntryKind::Blob);
        assert_eq!(EntryKind::from_mode(0o100755), EntryKind::Blob);
        assert_eq!(EntryKind::from_mode(0o120000), EntryKind::Blob);
        assert_eq!(EntryKind::from_mode(0o040000), EntryKind::Tree);
        assert_eq!(EntryKind::from_mode(0o160000), EntryKind::Commit);
    }

    #[test]
    fn non_utf8_tree_names_decode_lossily() {
        let mut data = b"100644 caf\xe9.txt\0".to_vec();
        data.extend_from_slice(oid(1).as_bytes());
        data.extend_from_slice(b"100644 ok.txt\0");
        data.extend_from_slice(oid(2).as_bytes());
        let tree = Tree::parse(&oid(9), &data).unwrap();
        assert_eq!(tree.entries.len(), 2);
        assert_eq!(tree.entries[0].path, "caf\u{fffd}.txt");
        assert_eq!(tree.entries[1].path, "ok.txt");
    }

    #[test]
    fn tree_orders_directories_with_trailing_slash() {
        let tree = Tree::new(vec![
            TreeEntry::file("foo.txt", oid(1)),
            TreeEntry::dir("foo", oid(2)),
            TreeEntry::file("foo-bar", oid(3)),
        ]);
        let names: Vec<&str> = tree.entries.iter().map(|e| e.path.as_str()).collect();
        // "foo-bar" < "foo.txt" < "foo/" in byte order.
        assert_eq!(names, vec!["foo-bar", "foo.txt", "foo"]);
    }

    #[test]
    fn tree_encode_parse() {
        let tree = Tree::new(vec![
            TreeEntry::file("a.txt", oid(1)),
            TreeEntry::dir("src", oid(2)),
            TreeEntry::new(0o160000, "vendor", oid(3)),
        ]);
        let raw = tree.to_raw();
        let parsed = Tree::parse(&raw.id(), &raw.data).unwrap();
        assert_eq!(parsed, tree);
        assert_eq!(parsed.get("src").unwrap().kind, EntryKind::Tree);
        assert_eq!(parsed.get("vendor").unwrap().kind, EntryKind::Commit);
        assert!(parsed.get("missing").is_none());
    }

    #[test]
    fn tree_mode_is_written_without_leading_zero() {
        let tree = Tree::new(vec![TreeEntry::dir("d", oid(1))]);
        assert!(tree.encode().starts_with(b"40000 d\0"));
    }

    #[test]
    fn truncated_tree_is_corrupt() {
        let tree = Tree::new(vec![TreeEntry::file("a", oid(1))]);
        let data = tree.encode();
        let err = Tree::parse(&oid(9), &data[..data.len() - 3]).unwrap_err();
        assert!(matches!(err, ReaderError::CorruptObject { .. }));
    }

    #[test]
    fn empty_tree_matches_git() {
        assert_eq!(
            Tree::default().to_raw().id().to_hex(),
            "4b825dc642cb6eb9a060e54bf8d69288fbee4904"
        );
    }

    #[test]
    fn commit_encode_parse() {
        let mut commit = Commit::new(oid(1), vec![oid(2), oid(3)], "subject\n\nbody\n");
        commit.author = Some("A U Thor <a@example.com> 0 +0000".into());
        commit.committer = commit.author.clone();
        let raw = commit.to_raw();
        let parsed = Commit::parse(&raw.id(), &raw.data).unwrap();
        assert_eq!(parsed, commit);
    }

    #[test]
    fn commit_skips_signature_headers() {
        let data = format!(
            "tree {}\ngpgsig -----BEGIN PGP SIGNATURE-----\n abc\n -----END PGP SIGNATURE-----\n\nmsg\n",
            oid(4)
        );
        let commit = Commit::parse(&oid(0), data.as_bytes()).unwrap();
        assert_eq!(commit.tree, oid(4));
        assert_eq!(commit.message, "msg\n");
    }

    #[test]
    fn commit_without_tree_is_corrupt() {
        let err = Commit::parse(&oid(0), b"author x\n\nmsg").unwrap_err();
        assert!(matches!(err, ReaderError::CorruptObject { .. }));
    }

    #[test]
    fn tag_parse() {
        let data = format!("object {}\ntype commit\ntag v1\n\nrelease\n", oid(5));
        let tag = Tag::parse(&oid(0), data.as_bytes()).unwrap();
        assert_eq!(tag.object, oid(5));
        assert_eq!(tag.kind, ObjectKind::Commit);
    }

    #[test]
    fn expect_kind_mismatch() {
        let raw = RawObject::new(ObjectKind::Blob, Bytes::from_static(b"x"));
        let err = raw.expect_kind(&raw.id(), ObjectKind::Tree).unwrap_err();
        assert!(matches!(
            err,
            ReaderError::UnexpectedKind { expected: ObjectKind::Tree, actual: ObjectKind::Blob, .. }
        ));
    }
}
