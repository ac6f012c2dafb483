use std::fmt;

use tracing::{info, warn};
use twig_diff::{generate_diff, DiffError, DiffResult, SimilarDiffer};
use twig_git::{CacheStats, GitReader, ReaderCache, ReaderError, RepoContext, RepositoryReader};
use twig_types::FileDiffResult;
use twig_vfs::{ingest, MemoryFs, UploadedFile};

use crate::config::TwigConfig;
use crate::error::LoadError;

/// Directory the upload's root folder is mapped to.
const REPO_ROOT: &str = "/";

/// State that lives exactly as long as one loaded upload.
struct Session {
    dir: String,
    cache: ReaderCache,
}

/// High-level twig API.
///
/// Owns the in-memory filesystem and the current repository session.
/// Loading takes `&mut self`, so no diff can observe a half-ingested upload.
pub struct Twig {
    fs: MemoryFs,
    reader: GitReader,
    differ: SimilarDiffer,
    config: TwigConfig,
    session: Option<Session>,
}

impl Twig {
    pub fn new() -> Self {
        Self::with_config(TwigConfig::default())
    }

    pub fn with_config(config: TwigConfig) -> Self {
        Self {
            fs: MemoryFs::new(),
            reader: GitReader::with_git_dir(config.git_dir.clone()),
            differ: SimilarDiffer::from_config(&config.diff),
            config,
            session: None,
        }
    }

    // ---- Loading ----

    /// Replace the loaded repository with the uploaded folder `files`.
    ///
    /// An empty upload is a no-op. Otherwise the previous repository and
    /// its cache are discarded before ingestion starts; if the new upload
    /// is not a readable repository the error is returned and nothing is
    /// loaded afterwards.
    pub fn load_repository<I>(&mut self, files: I) -> Result<(), LoadError>
    where
        I: IntoIterator<Item = UploadedFile>,
    {
        let mut files = files.into_iter().peekable();
        if files.peek().is_none() {
            return Ok(());
        }

        self.session = None;
        let report = ingest(&self.fs, files);

        let session = Session {
            dir: REPO_ROOT.to_string(),
            cache: ReaderCache::new(),
        };
        let ctx = RepoContext::new(&self.fs, &session.dir, &session.cache);
        let branches = self.reader.list_branches(&ctx).map_err(|e| {
            warn!(error = %e, "upload is not a readable repository");
            LoadError::from(e)
        })?;

        info!(
            root = report.root.as_deref().unwrap_or(""),
            files = report.files_written,
            branches = branches.len(),
            "loaded repository"
        );
        self.session = Some(session);
        Ok(())
    }

    /// Whether a repository is currently loaded.
    pub fn is_loaded(&self) -> bool {
        self.session.is_some()
    }

    // ---- Queries ----

    /// Local branch names of the loaded repository, sorted.
    ///
    /// Empty when nothing is loaded or the branch list cannot be read.
    pub fn list_branches(&self) -> Vec<String> {
        let Some(session) = &self.session else {
            return Vec::new();
        };
        self.reader
            .list_branches(&self.context(session))
            .unwrap_or_else(|e| {
                warn!(error = %e, "cannot list branches");
                Vec::new()
            })
    }

    /// Compare `compare` against `base`.
    pub fn generate_diff(&self, base: &str, compare: &str) -> DiffResult<Vec<FileDiffResult>> {
        let Some(session) = &self.session else {
            return Err(DiffError::ResolveRef {
                reference: base.to_string(),
                source: ReaderError::NotARepository(REPO_ROOT.to_string()),
            });
        };
        generate_diff(&self.reader, &self.differ, &self.context(session), base, compare)
    }

    // ---- Accessors ----

    /// The in-memory filesystem holding the current upload.
    pub fn fs(&self) -> &MemoryFs {
        &self.fs
    }

    pub fn config(&self) -> &TwigConfig {
        &self.config
    }

    /// Cache counters for the current session.
    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.session.as_ref().map(|s| s.cache.stats())
    }

    fn context<'a>(&'a self, session: &'a Session) -> RepoContext<'a> {
        RepoContext::new(&self.fs, &session.dir, &session.cache)
    }
}

impl Default for Twig {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Twig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Twig")
            .field("files", &self.fs.file_count())
            .field("loaded", &self.is_loaded())
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use twig_git::RepoWriter;
    use twig_types::FileStatus;
    use twig_vfs::FileSystem;

    /// Build a repository in a scratch filesystem and return it as an
    /// upload rooted at `root`.
    fn upload(root: &str, build: impl FnOnce(&RepoWriter<'_>)) -> Vec<UploadedFile> {
        let scratch = MemoryFs::new();
        let writer = RepoWriter::init(&scratch, "/").unwrap();
        build(&writer);
        scratch
            .file_paths()
            .into_iter()
            .map(|path| {
                let data = scratch.read(&path).unwrap();
                UploadedFile::new(format!("{root}{path}"), data)
            })
            .collect()
    }

    fn two_branch_upload(root: &str) -> Vec<UploadedFile> {
        upload(root, |w| {
            w.commit_files("main", &[("foo.txt", b"a\nb\n")], "base").unwrap();
            let tree = w
                .write_tree_from_files(&[("foo.txt", b"a\nc\n"), ("bar.txt", b"world")])
                .unwrap();
            let commit = w.write_commit(&tree, &[], "feature").unwrap();
            w.set_branch("feature", &commit).unwrap();
        })
    }

    // ---- Loading ----

    #[test]
    fn load_and_list_branches() {
        let mut twig = Twig::new();
        assert!(!twig.is_loaded());
        twig.load_repository(two_branch_upload("my-repo")).unwrap();
        assert!(twig.is_loaded());
        assert_eq!(twig.list_branches(), vec!["feature", "main"]);
        assert!(twig.fs().exists("/.git/HEAD"));
    }

    #[test]
    fn empty_upload_keeps_current_repository() {
        let mut twig = Twig::new();
        twig.load_repository(two_branch_upload("r")).unwrap();
        twig.load_repository(Vec::new()).unwrap();
        assert!(twig.is_loaded());
        assert_eq!(twig.list_branches().len(), 2);
    }

    #[test]
    fn non_repository_upload_fails_and_unloads() {
        let mut twig = Twig::new();
        twig.load_repository(two_branch_upload("r")).unwrap();

        let err = twig
            .load_repository(vec![UploadedFile::new("photos/cat.jpg", b"meow".to_vec())])
            .unwrap_err();
        assert!(matches!(err, LoadError::NotARepository(_)));
        assert!(!twig.is_loaded());
        assert!(twig.list_branches().is_empty());
        // The previous upload was cleared before the failure.
        assert!(!twig.fs().exists("/.git/HEAD"));
        assert!(twig.generate_diff("main", "feature").is_err());
    }

    #[test]
    fn corrupt_refs_are_unreadable() {
        let mut files = two_branch_upload("r");
        files.push(UploadedFile::new("r/.git/packed-refs", b"not a packed ref line\n".to_vec()));
        let mut twig = Twig::new();
        let err = twig.load_repository(files).unwrap_err();
        assert!(matches!(err, LoadError::Unreadable(_)));
        assert!(!twig.is_loaded());
    }

    #[test]
    fn second_load_does_not_leak_first() {
        let mut twig = Twig::new();
        let mut first = two_branch_upload("a");
        first.push(UploadedFile::new("a/only-in-a.txt", b"a".to_vec()));
        twig.load_repository(first).unwrap();
        assert!(twig.fs().exists("/only-in-a.txt"));

        let second = upload("b", |w| {
            w.commit_files("trunk", &[("x.txt", b"x")], "only").unwrap();
            w.set_head("trunk").unwrap();
        });
        twig.load_repository(second).unwrap();

        let err = twig.fs().read("/only-in-a.txt").unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.code(), "ENOENT");
        assert_eq!(twig.list_branches(), vec!["trunk"]);
        assert!(twig.generate_diff("main", "trunk").is_err());
    }

    #[test]
    fn each_load_gets_a_fresh_cache() {
        let mut twig = Twig::new();
        twig.load_repository(two_branch_upload("r")).unwrap();
        twig.generate_diff("main", "feature").unwrap();
        assert!(twig.cache_stats().unwrap().objects > 0);

        twig.load_repository(two_branch_upload("r")).unwrap();
        assert_eq!(twig.cache_stats().unwrap().objects, 0);
    }

    // ---- Diffing ----

    #[test]
    fn diff_between_branches() {
        let mut twig = Twig::new();
        twig.load_repository(two_branch_upload("r")).unwrap();
        let results = twig.generate_diff("main", "feature").unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].filename, "foo.txt");
        assert_eq!(results[0].status, FileStatus::Modified);
        assert_eq!(results[1].filename, "bar.txt");
        assert_eq!(results[1].status, FileStatus::Added);
        assert!(results[1].hunks[0].lines.contains(&"+world".to_string()));
    }

    #[test]
    fn reverse_diff_flips_statuses() {
        let mut twig = Twig::new();
        twig.load_repository(two_branch_upload("r")).unwrap();
        let results = twig.generate_diff("feature", "main").unwrap();
        let bar = results.iter().find(|r| r.filename == "bar.txt").unwrap();
        assert_eq!(bar.status, FileStatus::Deleted);
    }

    #[test]
    fn same_branch_is_empty() {
        let mut twig = Twig::new();
        twig.load_repository(two_branch_upload("r")).unwrap();
        assert!(twig.generate_diff("feature", "feature").unwrap().is_empty());
    }

    #[test]
    fn unknown_branch_is_a_diff_error() {
        let mut twig = Twig::new();
        twig.load_repository(two_branch_upload("r")).unwrap();
        let err = twig.generate_diff("main", "missing").unwrap_err();
        assert!(matches!(err, DiffError::ResolveRef { ref reference, .. } if reference == "missing"));
    }

    #[test]
    fn diff_before_load_is_an_error() {
        let twig = Twig::new();
        assert!(matches!(
            twig.generate_diff("main", "feature").unwrap_err(),
            DiffError::ResolveRef { .. }
        ));
    }

    #[test]
    fn results_serialize_for_presentation() {
        let mut twig = Twig::new();
        twig.load_repository(two_branch_upload("r")).unwrap();
        let results = twig.generate_diff("main", "feature").unwrap();
        let json = serde_json::to_value(&results).unwrap();
        assert_eq!(json[0]["filename"], "foo.txt");
        assert_eq!(json[0]["status"], "modified");
        assert_eq!(json[1]["status"], "added");
        assert!(json[0]["hunks"][0]["header"].as_str().unwrap().starts_with("@@"));
    }

    // ---- Configuration ----

    #[test]
    fn context_lines_from_config() {
        let config = TwigConfig::from_toml_str("[diff]\ncontext_lines = 0\n").unwrap();
        let mut twig = Twig::with_config(config);
        twig.load_repository(two_branch_upload("r")).unwrap();
        let results = twig.generate_diff("main", "feature").unwrap();
        let foo = &results[0];
        assert!(foo.hunks[0].lines.iter().all(|l| !l.starts_with(' ')));
    }

    #[test]
    fn custom_git_dir() {
        let files: Vec<UploadedFile> = two_branch_upload("r")
            .into_iter()
            .map(|f| UploadedFile::new(f.relative_path.replace("/.git/", "/repo.git/"), f.data))
            .collect();
        let config = TwigConfig {
            git_dir: "repo.git".into(),
            ..TwigConfig::default()
        };
        let mut twig = Twig::with_config(config);
        twig.load_repository(files).unwrap();
        assert_eq!(twig.list_branches(), vec!["feature", "main"]);
    }

    #[test]
    fn debug_shows_state() {
        let twig = Twig::new();
        let s = format!("{twig:?}");
        assert!(s.contains("loaded: false"));
    }
}
