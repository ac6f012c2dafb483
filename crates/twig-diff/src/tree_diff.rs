//! Path-level comparison of two tree indexes.

use twig_types::{FileStatus, ObjectId};

use crate::walker::TreeIndex;

/// The result of comparing two tree indexes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TreeDiff {
    /// Changed paths, base paths first, then paths only in compare.
    pub changes: Vec<TreeChange>,
}

impl TreeDiff {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if there are no changes.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }
}

/// A single changed path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TreeChange {
    /// Only in the compare tree.
    Added { path: String, new_id: ObjectId },
    /// Only in the base tree.
    Deleted { path: String, old_id: ObjectId },
    /// In both, with different content.
    Modified {
        path: String,
        old_id: ObjectId,
        new_id: ObjectId,
    },
}

impl TreeChange {
    pub fn path(&self) -> &str {
        match self {
            Self::Added { path, .. } | Self::Deleted { path, .. } | Self::Modified { path, .. } => {
                path
            }
        }
    }

    pub fn status(&self) -> FileStatus {
        match self {
            Self::Added { .. } => FileStatus::Added,
            Self::Deleted { .. } => FileStatus::Deleted,
            Self::Modified { .. } => FileStatus::Modified,
        }
    }

    /// Blob id on the base side, if the path exists there.
    pub fn old_id(&self) -> Option<&ObjectId> {
        match self {
            Self::Deleted { old_id, .. } | Self::Modified { old_id, .. } => Some(old_id),
            Self::Added { .. } => None,
        }
    }

    /// Blob id on the compare side, if the path exists there.
    pub fn new_id(&self) -> Option<&ObjectId> {
        match self {
            Self::Added { new_id, .. } | Self::Modified { new_id, .. } => Some(new_id),
            Self::Deleted { .. } => None,
        }
    }
}

/// Classify every path whose blob id differs between `base` and `compare`.
///
/// Paths are visited in the order of the union of both indexes: all base
/// paths in base order, then compare-only paths in compare order.
pub fn reconcile(base: &TreeIndex, compare: &TreeIndex) -> TreeDiff {
    let union = base
        .paths()
        .chain(compare.paths().filter(|path| !base.contains(path)));

    let changes = union
        .filter_map(|path| match (base.get(path), compare.get(path)) {
            (Some(old), Some(new)) if old == new => None,
            (Some(old), Some(new)) => Some(TreeChange::Modified {
                path: path.to_string(),
                old_id: *old,
                new_id: *new,
            }),
            (Some(old), None) => Some(TreeChange::Deleted {
                path: path.to_string(),
                old_id: *old,
            }),
            (None, Some(new)) => Some(TreeChange::Added {
                path: path.to_string(),
                new_id: *new,
            }),
            (None, None) => None,
        })
        .collect();

    TreeDiff { changes }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oid(b: u8) -> ObjectId {
        ObjectId::from_hash([b; 20])
    }

    fn index(entries: &[(&str, u8)]) -> TreeIndex {
        entries.iter().map(|(p, b)| (*p, oid(*b))).collect()
    }

    #[test]
    fn empty_to_populated_all_additions() {
        let diff = reconcile(&TreeIndex::new(), &index(&[("a.txt", 1), ("b.txt", 2)]));
        assert_eq!(diff.len(), 2);
        assert!(diff.changes.iter().all(|c| c.status() == FileStatus::Added));
    }

    #[test]
    fn populated_to_empty_all_deletions() {
        let diff = reconcile(&index(&[("a.txt", 1), ("b.txt", 2)]), &TreeIndex::new());
        assert_eq!(diff.len(), 2);
        assert!(diff.changes.iter().all(|c| matches!(c, TreeChange::Deleted { .. })));
    }

    #[test]
    fn identical_indexes_no_changes() {
        let tree = index(&[("file.txt", 1)]);
        assert!(reconcile(&tree, &tree).is_empty());
    }

    #[test]
    fn single_file_modification() {
        let diff = reconcile(&index(&[("file.txt", 1)]), &index(&[("file.txt", 2)]));
        assert_eq!(
            diff.changes,
            vec![TreeChange::Modified {
                path: "file.txt".into(),
                old_id: oid(1),
                new_id: oid(2),
            }]
        );
        assert_eq!(diff.changes[0].old_id(), Some(&oid(1)));
        assert_eq!(diff.changes[0].new_id(), Some(&oid(2)));
    }

    #[test]
    fn moved_content_is_delete_plus_add() {
        let diff = reconcile(&index(&[("old.txt", 1)]), &index(&[("new.txt", 1)]));
        let statuses: Vec<FileStatus> = diff.changes.iter().map(TreeChange::status).collect();
        assert_eq!(statuses, vec![FileStatus::Deleted, FileStatus::Added]);
    }

    #[test]
    fn union_order_base_first_then_compare_only() {
        let base = index(&[("z.txt", 1), ("keep.txt", 2), ("m.txt", 3)]);
        let compare = index(&[("b.txt", 4), ("m.txt", 5), ("a.txt", 6), ("keep.txt", 2)]);
        let diff = reconcile(&base, &compare);
        let paths: Vec<&str> = diff.changes.iter().map(TreeChange::path).collect();
        assert_eq!(paths, vec!["z.txt", "m.txt", "b.txt", "a.txt"]);
    }

    #[test]
    fn mixed_changes() {
        let base = index(&[("keep.txt", 1), ("modify.txt", 2), ("delete.txt", 3)]);
        let compare = index(&[("keep.txt", 1), ("modify.txt", 4), ("added.txt", 5)]);
        let diff = reconcile(&base, &compare);
        assert_eq!(diff.len(), 3);
        let find = |p: &str| diff.changes.iter().find(|c| c.path() == p).map(TreeChange::status);
        assert_eq!(find("modify.txt"), Some(FileStatus::Modified));
        assert_eq!(find("delete.txt"), Some(FileStatus::Deleted));
        assert_eq!(find("added.txt"), Some(FileStatus::Added));
        assert_eq!(find("keep.txt"), None);
    }
}
