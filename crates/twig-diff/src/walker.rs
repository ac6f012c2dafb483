//! Flattening a tree object graph into a path -> blob id index.

use std::collections::HashMap;

use tracing::debug;
use twig_git::{EntryKind, ReaderResult, RepoContext, RepositoryReader, TreeEntry};
use twig_types::ObjectId;

/// Every blob reachable from one root tree, keyed by its relative path.
///
/// Iteration follows insertion order, which for [`walk_tree`] is a
/// depth-first walk in tree-entry order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TreeIndex {
    order: Vec<String>,
    ids: HashMap<String, ObjectId>,
}

impl TreeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `path`. Re-inserting a path replaces its id but keeps its position.
    pub fn insert(&mut self, path: impl Into<String>, id: ObjectId) {
        let path = path.into();
        if self.ids.insert(path.clone(), id).is_none() {
            self.order.push(path);
        }
    }

    pub fn get(&self, path: &str) -> Option<&ObjectId> {
        self.ids.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.ids.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Paths in insertion order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// `(path, id)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ObjectId)> {
        self.order
            .iter()
            .filter_map(|path| self.ids.get(path).map(|id| (path.as_str(), id)))
    }
}

impl<P: Into<String>> FromIterator<(P, ObjectId)> for TreeIndex {
    fn from_iter<I: IntoIterator<Item = (P, ObjectId)>>(iter: I) -> Self {
        let mut index = Self::new();
        for (path, id) in iter {
            index.insert(path, id);
        }
        index
    }
}

struct Frame {
    prefix: String,
    entries: std::vec::IntoIter<TreeEntry>,
}

/// Collect every blob reachable from `tree_id`.
///
/// Uses an explicit stack, so nesting depth is bounded by memory rather
/// than the call stack. Submodule entries are skipped. Any unreadable tree
/// fails the whole walk.
pub fn walk_tree(
    reader: &dyn RepositoryReader,
    ctx: &RepoContext<'_>,
    tree_id: &ObjectId,
) -> ReaderResult<TreeIndex> {
    let mut index = TreeIndex::new();
    let root = reader.read_tree(ctx, tree_id)?;
    let mut stack = vec![Frame {
        prefix: String::new(),
        entries: root.entries.into_iter(),
    }];

    while let Some(frame) = stack.last_mut() {
        let Some(entry) = frame.entries.next() else {
            stack.pop();
            continue;
        };
        let path = if frame.prefix.is_empty() {
            entry.path
        } else {
            format!("{}/{}", frame.prefix, entry.path)
        };
        match entry.kind {
            EntryKind::Blob => index.insert(path, entry.oid),
            EntryKind::Tree => {
                let tree = reader.read_tree(ctx, &entry.oid)?;
                stack.push(Frame {
                    prefix: path,
                    entries: tree.entries.into_iter(),
                });
            }
            EntryKind::Commit => debug!(path = %path, "skipping submodule"),
        }
    }

    debug!(tree = %tree_id.short_hex(), files = index.len(), "walked tree");
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use twig_git::{GitReader, ReaderCache, ReaderError, RepoWriter, Tree};
    use twig_vfs::MemoryFs;

    fn walk(fs: &MemoryFs, tree: &ObjectId) -> ReaderResult<TreeIndex> {
        let cache = ReaderCache::new();
        let ctx = RepoContext::new(fs, "/", &cache);
        walk_tree(&GitReader::new(), &ctx, tree)
    }

    #[test]
    fn flattens_nested_trees_depth_first() {
        let fs = MemoryFs::new();
        let writer = RepoWriter::init(&fs, "/").unwrap();
        let files: &[(&str, &[u8])] = &[
            ("b.txt", b"b"),
            ("a/z.txt", b"z"),
            ("a/deep/er/x.txt", b"x"),
            ("a.txt", b"a"),
            ("c/y.txt", b"y"),
        ];
        let tree = writer.write_tree_from_files(files).unwrap();
        let index = walk(&fs, &tree).unwrap();

        let paths: Vec<&str> = index.paths().collect();
        assert_eq!(
            paths,
            vec!["a.txt", "a/deep/er/x.txt", "a/z.txt", "b.txt", "c/y.txt"]
        );
        assert_eq!(index.get("a/z.txt"), Some(&writer.write_blob(b"z").unwrap()));
    }

    #[test]
    fn empty_tree() {
        let fs = MemoryFs::new();
        let writer = RepoWriter::init(&fs, "/").unwrap();
        let tree = writer.write_tree(&Tree::default()).unwrap();
        assert!(walk(&fs, &tree).unwrap().is_empty());
    }

    #[test]
    fn skips_submodules() {
        let fs = MemoryFs::new();
        let writer = RepoWriter::init(&fs, "/").unwrap();
        let blob = writer.write_blob(b"kept").unwrap();
        let tree = writer
            .write_tree(&Tree::new(vec![
                TreeEntry::file("kept.txt", blob),
                TreeEntry::new(0o160000, "vendor", ObjectId::hash_object("commit", b"elsewhere")),
            ]))
            .unwrap();
        let index = walk(&fs, &tree).unwrap();
        assert_eq!(index.len(), 1);
        assert!(index.contains("kept.txt"));
    }

    #[test]
    fn deep_nesting_does_not_recurse() {
        let fs = MemoryFs::new();
        let writer = RepoWriter::init(&fs, "/").unwrap();
        let mut tree = writer
            .write_tree(&Tree::new(vec![TreeEntry::file("leaf.txt", writer.write_blob(b"leaf").unwrap())]))
            .unwrap();
        for _ in 0..500 {
            tree = writer.write_tree(&Tree::new(vec![TreeEntry::dir("d", tree)])).unwrap();
        }
        let index = walk(&fs, &tree).unwrap();
        let path = index.paths().next().unwrap();
        assert_eq!(path.matches('/').count(), 500);
        assert!(path.ends_with("/leaf.txt"));
    }

    #[test]
    fn missing_subtree_fails_whole_walk() {
        let fs = MemoryFs::new();
        let writer = RepoWriter::init(&fs, "/").unwrap();
        let blob = writer.write_blob(b"ok").unwrap();
        let tree = writer
            .write_tree(&Tree::new(vec![
                TreeEntry::file("ok.txt", blob),
                TreeEntry::dir("gone", ObjectId::hash_object("tree", b"missing")),
            ]))
            .unwrap();
        assert!(matches!(walk(&fs, &tree).unwrap_err(), ReaderError::ObjectNotFound(_)));
    }

    #[test]
    fn index_keeps_insertion_order() {
        let a = ObjectId::hash_object("blob", b"a");
        let b = ObjectId::hash_object("blob", b"b");
        let mut index: TreeIndex = [("z", a), ("m", b)].into_iter().collect();
        index.insert("z", b);
        let pairs: Vec<(&str, &ObjectId)> = index.iter().collect();
        assert_eq!(pairs, vec![("z", &b), ("m", &b)]);
    }
}
