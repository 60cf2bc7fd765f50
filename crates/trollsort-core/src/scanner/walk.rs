use glob::Pattern;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, error, warn};
use walkdir::WalkDir;

/// Recursive file listing with two kinds of exclusion:
/// - absolute directory prefixes, pruned before descending
/// - glob ignore patterns, matched against directories and files
///
/// Listings are sorted by file name so repeated walks return the same order.
#[derive(Debug, Default, Clone)]
pub struct TreeWalker {
    pruned: Vec<PathBuf>,
    ignore_patterns: Vec<Pattern>,
}

impl TreeWalker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prune(mut self, dir: &Path) -> Self {
        let dir = dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf());
        self.pruned.push(dir);
        self
    }

    pub fn ignore_globs(mut self, globs: &[String]) -> Self {
        self.ignore_patterns.extend(globs.iter().filter_map(|glob| {
            match Pattern::new(glob) {
                Ok(p) => Some(p),
                Err(e) => {
                    error!("Invalid glob pattern '{}': {}", glob, e);
                    None
                }
            }
        }));
        self
    }

    fn is_ignored(&self, path: &Path) -> bool {
        self.ignore_patterns
            .iter()
            .any(|pattern| pattern.matches_path(path))
    }

    fn is_pruned(&self, dir: &Path) -> bool {
        self.pruned.iter().any(|p| dir == p.as_path())
    }

    /// Lists regular files under `root`. A missing root yields an empty list.
    ///
    /// Unreadable directories are logged and skipped; the walk only fails when
    /// the root itself cannot be read.
    pub fn list_files(&self, root: &Path) -> io::Result<Vec<PathBuf>> {
        if !root.exists() {
            return Ok(Vec::new());
        }
        let root = root.canonicalize()?;

        let mut files = Vec::new();
        let walker = WalkDir::new(&root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                if entry.depth() == 0 {
                    return true;
                }
                if entry.file_type().is_dir() && self.is_pruned(entry.path()) {
                    debug!("Pruning {}", entry.path().display());
                    return false;
                }
                !self.is_ignored(entry.path())
            });

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    if err.depth() == 0 {
                        return Err(err
                            .into_io_error()
                            .unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, "walk failed")));
                    }
                    warn!("Skipping unreadable entry: {}", err);
                    continue;
                }
            };
            if entry.file_type().is_file() {
                files.push(entry.into_path());
            }
        }

        Ok(files)
    }
}
