//! Branch-to-branch comparison.

use tracing::{debug, info, warn};
use twig_git::{RepoContext, RepositoryReader};
use twig_types::{FileDiffResult, ObjectId};

use crate::differ::TextDiffer;
use crate::error::{DiffError, DiffResult};
use crate::tree_diff::{reconcile, TreeChange};
use crate::walker::{walk_tree, TreeIndex};

/// Compare `compare_ref` against `base_ref`.
///
/// Both refs are resolved and their commits read; failure at either step
/// is a [`DiffError`]. Identical commits short-circuit to an empty result.
/// Each tree is then walked on its own, and a side whose walk fails counts
/// as empty. For every path whose blob id differs, both sides are fetched
/// and diffed as text; a path is dropped if a fetch fails, if either side
/// contains a NUL byte, or if the diff has no hunks.
///
/// Results follow the order of [`reconcile`].
pub fn generate_diff(
    reader: &dyn RepositoryReader,
    differ: &dyn TextDiffer,
    ctx: &RepoContext<'_>,
    base_ref: &str,
    compare_ref: &str,
) -> DiffResult<Vec<FileDiffResult>> {
    let base_id = resolve(reader, ctx, base_ref)?;
    let compare_id = resolve(reader, ctx, compare_ref)?;
    if base_id == compare_id {
        debug!(base = base_ref, compare = compare_ref, "refs point at the same commit");
        return Ok(Vec::new());
    }

    let base_tree = read_root_tree(reader, ctx, &base_id)?;
    let compare_tree = read_root_tree(reader, ctx, &compare_id)?;

    let base_index = walk_or_empty(reader, ctx, &base_tree, base_ref);
    let compare_index = walk_or_empty(reader, ctx, &compare_tree, compare_ref);

    let changes = reconcile(&base_index, &compare_index);
    let mut results = Vec::new();
    for change in &changes.changes {
        if let Some(result) = diff_path(reader, differ, ctx, change, base_ref, compare_ref) {
            results.push(result);
        }
    }

    info!(
        base = base_ref,
        compare = compare_ref,
        candidates = changes.len(),
        files = results.len(),
        "generated diff"
    );
    Ok(results)
}

fn resolve(reader: &dyn RepositoryReader, ctx: &RepoContext<'_>, reference: &str) -> DiffResult<ObjectId> {
    let id = reader
        .resolve_ref(ctx, reference)
        .map_err(|source| DiffError::ResolveRef {
            reference: reference.to_string(),
            source,
        })?;
    debug!(reference, id = %id.short_hex(), "resolved");
    Ok(id)
}

fn read_root_tree(
    reader: &dyn RepositoryReader,
    ctx: &RepoContext<'_>,
    id: &ObjectId,
) -> DiffResult<ObjectId> {
    reader
        .read_commit(ctx, id)
        .map(|commit| commit.tree)
        .map_err(|source| DiffError::ReadCommit { id: *id, source })
}

fn walk_or_empty(
    reader: &dyn RepositoryReader,
    ctx: &RepoContext<'_>,
    tree: &ObjectId,
    side: &str,
) -> TreeIndex {
    walk_tree(reader, ctx, tree).unwrap_or_else(|e| {
        warn!(side, tree = %tree.short_hex(), error = %e, "tree walk failed; treating side as empty");
        TreeIndex::new()
    })
}

/// Blob content as text, or `None` if it cannot be read. Absent sides are empty.
fn fetch_text(
    reader: &dyn RepositoryReader,
    ctx: &RepoContext<'_>,
    path: &str,
    id: Option<&ObjectId>,
) -> Option<String> {
    let Some(id) = id else {
        return Some(String::new());
    };
    match reader.read_blob(ctx, id) {
        Ok(data) => Some(String::from_utf8_lossy(&data).into_owned()),
        Err(e) => {
            warn!(path, blob = %id.short_hex(), error = %e, "skipping path: blob unreadable");
            None
        }
    }
}

fn diff_path(
    reader: &dyn RepositoryReader,
    differ: &dyn TextDiffer,
    ctx: &RepoContext<'_>,
    change: &TreeChange,
    base_label: &str,
    compare_label: &str,
) -> Option<FileDiffResult> {
    let path = change.path();
    let old = fetch_text(reader, ctx, path, change.old_id())?;
    let new = fetch_text(reader, ctx, path, change.new_id())?;
    if old.contains('\0') || new.contains('\0') {
        warn!(path, "skipping path: binary content");
        return None;
    }

    let patch = differ.create_patch(path, &old, &new, base_label, compare_label);
    let hunks = differ
        .parse_patch(&patch)
        .into_iter()
        .next()
        .map(|file| file.hunks)
        .unwrap_or_default();
    if hunks.is_empty() {
        debug!(path, "no textual difference");
        return None;
    }

    debug!(path, status = %change.status(), hunks = hunks.len(), "diffed path");
    Some(FileDiffResult {
        filename: path.to_string(),
        status: change.status(),
        hunks,
    })
}
