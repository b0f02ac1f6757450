/// The recursive delete walker — depth-first, post-order deletion of a
/// directory tree.
///
/// Files are deleted before the directory that contains them; symbolic
/// links are removed as links and never followed; individual failures are
/// tolerated and the walk keeps going. The walker is single-threaded and
/// synchronous: every filesystem call blocks inline, and the only shared
/// state is the injected [`ProgressSink`].
///
/// # Progress granularity
///
/// Progress advances exactly once per *direct child directory of the root*
/// that finishes processing — never for nested files or directories. This
/// gives a bounded, coarse signal regardless of tree depth, and it is the
/// behavior hosts calibrate their progress ranges against. Do not refine
/// it to depth-weighted progress.
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::deleter::progress::{NoopSink, ProgressSink};

/// Upper bound on the root-listing pass used to size the progress range.
///
/// Listing must not itself become expensive on very large directories; past
/// this many entries the estimate just saturates.
const ESTIMATE_CAP: usize = 1_000;

/// A non-fatal failure encountered during the walk.
///
/// These are logged and counted, never returned: the walk always runs to
/// completion (or to a cancellation checkpoint) from the caller's point of
/// view.
#[derive(Debug, Error)]
pub enum EntryError {
    #[error("could not delete file {path}")]
    File {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("could not delete directory {path}")]
    Directory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("could not access {path}")]
    Visit {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// How the walk ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkStatus {
    /// The whole tree was traversed. Individual entries may still have
    /// survived — check [`DeleteSummary::entries_failed`] or re-inspect
    /// the filesystem.
    Completed,
    /// The sink reported cancellation and the walk unwound at the next
    /// checkpoint. Entries deleted before that point stay deleted.
    Cancelled,
}

/// Running totals for one walk. Counters only — there is no per-path
/// failure report; the filesystem itself is the source of truth for what
/// survived.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DeleteSummary {
    /// Files and symlinks removed.
    pub files_deleted: u64,
    /// Directories removed.
    pub dirs_deleted: u64,
    /// Entries that could not be deleted or accessed and were left behind.
    pub entries_failed: u64,
}

/// Final outcome of [`DeleteWalker::run`].
#[derive(Debug, Clone, Copy)]
pub struct DeleteReport {
    pub status: WalkStatus,
    pub summary: DeleteSummary,
    pub duration: Duration,
}

/// Per-step traversal signal.
///
/// `SkipSubtree` is produced when a symlinked directory entry is removed
/// as a link; `Terminate` unwinds the entire recursion on cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Continue,
    SkipSubtree,
    Terminate,
}

static NOOP_SINK: NoopSink = NoopSink;

/// Deletes the contents of a directory tree, including the root itself.
///
/// Construction performs the work estimation (when a sink is supplied);
/// [`run`](Self::run) performs the walk. The walker borrows the root path
/// and the sink for the duration of the walk and owns neither.
pub struct DeleteWalker<'a> {
    root: &'a Path,
    sink: &'a dyn ProgressSink,
    /// Units promised to the sink via `estimate`; `advance` is clamped to
    /// never exceed this.
    budget: u64,
    advanced: u64,
    summary: DeleteSummary,
}

impl<'a> DeleteWalker<'a> {
    /// Create a walker for `root`.
    ///
    /// With a sink, total work is estimated as the number of direct
    /// entries of the root, capped at 1000 so the listing pass stays
    /// cheap; if the root cannot be listed the estimate falls back to
    /// exactly 1 unit.
    /// Without a sink a no-op sink is used and no estimation happens.
    pub fn new(root: &'a Path, sink: Option<&'a dyn ProgressSink>) -> Self {
        let (sink, budget) = match sink {
            None => (&NOOP_SINK as &dyn ProgressSink, 0),
            Some(sink) => {
                let total = match estimate_root_entries(root) {
                    Ok(n) => n,
                    Err(err) => {
                        debug!(
                            root = %root.display(),
                            error = %err,
                            "root listing failed, falling back to a single work unit"
                        );
                        1
                    }
                };
                sink.estimate(total);
                (sink, total)
            }
        };

        Self {
            root,
            sink,
            budget,
            advanced: 0,
            summary: DeleteSummary::default(),
        }
    }

    /// Walk the tree and delete it.
    ///
    /// Never returns an error: per-entry failures are absorbed, and a root
    /// that does not exist simply means there is nothing to delete.
    pub fn run(mut self) -> DeleteReport {
        let start = Instant::now();
        info!(root = %self.root.display(), "starting recursive delete");

        let root = self.root.to_path_buf();
        let status = match self.visit(&root) {
            Step::Terminate => WalkStatus::Cancelled,
            Step::Continue | Step::SkipSubtree => WalkStatus::Completed,
        };

        let report = DeleteReport {
            status,
            summary: self.summary,
            duration: start.elapsed(),
        };
        info!(
            status = ?report.status,
            files_deleted = report.summary.files_deleted,
            dirs_deleted = report.summary.dirs_deleted,
            entries_failed = report.summary.entries_failed,
            "recursive delete finished"
        );
        report
    }

    /// Dispatch one entry: symlinks are removed in place (never followed),
    /// directories recurse, everything else is a file visit.
    fn visit(&mut self, path: &Path) -> Step {
        let meta = match fs::symlink_metadata(path) {
            Ok(meta) => meta,
            Err(err) => return self.visit_failed(path, err),
        };

        let file_type = meta.file_type();
        if file_type.is_symlink() {
            // A link to a directory elsewhere must not expose its target
            // to deletion; remove the link itself and skip the subtree.
            self.delete_file(path);
            return self.checkpoint(Step::SkipSubtree);
        }
        if file_type.is_dir() {
            self.visit_dir(path)
        } else {
            self.delete_file(path);
            self.checkpoint(Step::Continue)
        }
    }

    fn visit_dir(&mut self, dir: &Path) -> Step {
        if self.checkpoint(Step::Continue) == Step::Terminate {
            return Step::Terminate;
        }

        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(err) => return self.visit_failed(dir, err),
        };

        let mut traversal_error: Option<io::Error> = None;
        for entry in entries {
            match entry {
                Ok(entry) => {
                    if self.visit(&entry.path()) == Step::Terminate {
                        return Step::Terminate;
                    }
                }
                Err(err) => {
                    // The directory stream itself failed; remaining
                    // siblings are unreachable. Keep the directory and
                    // record the error at post-visit.
                    traversal_error = Some(err);
                    break;
                }
            }
        }

        self.post_visit(dir, traversal_error)
    }

    /// Post-order step: the children are gone (or were tolerated as
    /// undeletable), so attempt the directory itself. A directory whose
    /// traversal errored is kept as-is.
    fn post_visit(&mut self, dir: &Path, traversal_error: Option<io::Error>) -> Step {
        match traversal_error {
            None => {
                match remove_dir_if_exists(dir) {
                    Ok(removed) => {
                        debug!(path = %dir.display(), removed, "directory post-visit");
                        if removed {
                            self.summary.dirs_deleted += 1;
                        }
                    }
                    Err(source) => {
                        // Typically ENOTEMPTY when undeletable children
                        // survived. Left for the caller to notice.
                        let err = EntryError::Directory {
                            path: dir.to_path_buf(),
                            source,
                        };
                        warn!(error = %err, "directory left in place");
                        self.summary.entries_failed += 1;
                    }
                }
                // Coarse progress: one unit per direct child of the root.
                if dir.parent() == Some(self.root) {
                    self.advance_one();
                }
            }
            Some(source) => {
                let err = EntryError::Visit {
                    path: dir.to_path_buf(),
                    source,
                };
                warn!(error = %err, "directory kept after traversal error");
                self.summary.entries_failed += 1;
            }
        }

        self.checkpoint(Step::Continue)
    }

    /// An entry that could not even be stat'd or opened. Non-fatal; the
    /// walk moves on to the next sibling.
    fn visit_failed(&mut self, path: &Path, source: io::Error) -> Step {
        if source.kind() == io::ErrorKind::NotFound {
            // Root missing or an entry vanished mid-walk: nothing to
            // delete, not a failure.
            debug!(path = %path.display(), "entry gone before it could be visited");
        } else {
            let err = EntryError::Visit {
                path: path.to_path_buf(),
                source,
            };
            warn!(error = %err, "skipping unreadable entry");
            self.summary.entries_failed += 1;
        }
        self.checkpoint(Step::Continue)
    }

    /// Remove a single file or symlink, with a secondary best-effort
    /// attempt if the first fails. Both failing is absorbed. A file that
    /// vanished on its own between enumeration and deletion is neither a
    /// removal nor a failure.
    fn delete_file(&mut self, file: &Path) {
        debug!(path = %file.display(), "deleting file");
        match remove_file_if_exists(file) {
            Ok(removed) => {
                if removed {
                    self.summary.files_deleted += 1;
                }
            }
            Err(first) => match force_remove(file) {
                Ok(removed) => {
                    if removed {
                        self.summary.files_deleted += 1;
                    }
                }
                Err(_) => {
                    let err = EntryError::File {
                        path: file.to_path_buf(),
                        source: first,
                    };
                    warn!(error = %err, "file left in place");
                    self.summary.entries_failed += 1;
                }
            },
        }
    }

    fn advance_one(&mut self) {
        // Never report more than estimated: the fallback estimate of 1
        // can undercount the real number of child directories.
        if self.advanced < self.budget {
            self.sink.advance(1);
            self.advanced += 1;
        }
    }

    /// Cancellation checkpoint. Reads the flag fresh every time; once it
    /// is set the returned `Terminate` unwinds the whole recursion.
    fn checkpoint(&mut self, next: Step) -> Step {
        if self.sink.is_cancelled() {
            info!(root = %self.root.display(), "cancellation requested, unwinding walk");
            return Step::Terminate;
        }
        next
    }
}

/// Count the direct entries of `root`, capped at [`ESTIMATE_CAP`].
fn estimate_root_entries(root: &Path) -> io::Result<u64> {
    Ok(fs::read_dir(root)?.take(ESTIMATE_CAP).count() as u64)
}

/// `remove_file` with delete-if-exists semantics: a path that is already
/// gone is success. Returns whether the file was actually removed.
fn remove_file_if_exists(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err),
    }
}

/// `remove_dir` with delete-if-exists semantics. Returns whether the
/// directory was actually removed.
fn remove_dir_if_exists(path: &Path) -> io::Result<bool> {
    match fs::remove_dir(path) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err),
    }
}

/// Secondary best-effort removal: clear a read-only bit and retry, then
/// fall back to the directory primitive (directory symlinks on Windows
/// are refused by `remove_file`). Returns whether anything was removed.
fn force_remove(path: &Path) -> io::Result<bool> {
    if let Ok(meta) = fs::symlink_metadata(path) {
        let mut perms = meta.permissions();
        if perms.readonly() {
            #[allow(clippy::permissions_set_readonly_false)]
            perms.set_readonly(false);
            let _ = fs::set_permissions(path, perms);
        }
    }
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => fs::remove_dir(path).map(|()| true).map_err(|_| err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_remove_file_if_exists_tolerates_missing() {
        let tmp = TempDir::new().unwrap();
        assert!(!remove_file_if_exists(&tmp.path().join("nope.txt")).unwrap());
    }

    #[test]
    fn test_remove_file_if_exists_reports_removal() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("f.txt");
        fs::write(&file, b"x").unwrap();
        assert!(remove_file_if_exists(&file).unwrap());
    }

    /// A file that vanished between enumeration and deletion is not a
    /// removal and not a failure; the summary stays untouched.
    #[test]
    fn test_vanished_file_not_counted_as_deleted() {
        let tmp = TempDir::new().unwrap();
        let mut walker = DeleteWalker::new(tmp.path(), None);
        walker.delete_file(&tmp.path().join("vanished.txt"));
        assert_eq!(walker.summary.files_deleted, 0);
        assert_eq!(walker.summary.entries_failed, 0);
    }

    #[test]
    fn test_remove_dir_if_exists_reports_removal() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("d");
        fs::create_dir(&dir).unwrap();
        assert!(remove_dir_if_exists(&dir).unwrap());
        assert!(!remove_dir_if_exists(&dir).unwrap());
    }

    #[test]
    fn test_estimate_counts_direct_entries_only() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join("sub")).unwrap();
        fs::write(tmp.path().join("sub").join("nested.txt"), b"x").unwrap();
        fs::write(tmp.path().join("a.txt"), b"x").unwrap();
        // "sub" and "a.txt" — nested entries do not count.
        assert_eq!(estimate_root_entries(tmp.path()).unwrap(), 2);
    }

    /// The root-listing pass must saturate at the cap, not enumerate an
    /// arbitrarily large directory.
    #[test]
    fn test_estimate_saturates_at_cap() {
        let tmp = TempDir::new().unwrap();
        for i in 0..ESTIMATE_CAP + 500 {
            fs::write(tmp.path().join(format!("f{i:05}")), b"").unwrap();
        }
        assert_eq!(
            estimate_root_entries(tmp.path()).unwrap(),
            ESTIMATE_CAP as u64
        );
    }

    #[test]
    fn test_estimate_fails_on_missing_root() {
        let tmp = TempDir::new().unwrap();
        assert!(estimate_root_entries(&tmp.path().join("gone")).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_force_remove_clears_readonly_bit() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("locked.txt");
        fs::write(&file, b"x").unwrap();
        let mut perms = fs::metadata(&file).unwrap().permissions();
        perms.set_readonly(true);
        fs::set_permissions(&file, perms).unwrap();

        force_remove(&file).unwrap();
        assert!(!file.exists());
    }
}
