use crate::audit::RESERVED_LOG_NAMES;
use crate::commit::copy::is_partial_copy;
use crate::hasher::{self, Fingerprint};
use crate::progress::ProgressReporter;
use crate::scanner::TreeWalker;
use dashmap::DashMap;
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use tracing::{debug, warn};

/// Content fingerprint → known paths holding that content.
///
/// The first path of each bucket is the canonical representative. Buckets only
/// grow: an entry is never removed or replaced during a run. Paths found by
/// [`build_index`] are remembered apart from those registered afterwards.
#[derive(Debug, Default, Clone)]
pub struct FingerprintIndex {
    buckets: HashMap<Fingerprint, Vec<PathBuf>>,
    preexisting: HashSet<PathBuf>,
}

impl FingerprintIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn representative(&self, fingerprint: &Fingerprint) -> Option<&Path> {
        self.buckets
            .get(fingerprint)
            .and_then(|paths| paths.first())
            .map(PathBuf::as_path)
    }

    /// Whether `path` held `fingerprint` when the destination was indexed.
    /// Paths registered later in the run never count.
    pub fn held_before_run(&self, fingerprint: &Fingerprint, path: &Path) -> bool {
        self.preexisting.contains(path)
            && self
                .buckets
                .get(fingerprint)
                .map(|paths| paths.iter().any(|p| p == path))
                .unwrap_or(false)
    }

    /// Records `path` as holding `fingerprint`, after any paths already known.
    pub fn register(&mut self, fingerprint: Fingerprint, path: PathBuf) {
        let bucket = self.buckets.entry(fingerprint).or_default();
        if !bucket.contains(&path) {
            bucket.push(path);
        }
    }

    /// Number of distinct contents.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn file_count(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    /// Buckets holding more than one path, sorted by representative path.
    pub fn duplicate_groups(&self) -> Vec<(&Fingerprint, &[PathBuf])> {
        let mut groups: Vec<_> = self
            .buckets
            .iter()
            .filter(|(_, paths)| paths.len() > 1)
            .map(|(fp, paths)| (fp, paths.as_slice()))
            .collect();
        groups.sort_by(|a, b| a.1[0].cmp(&b.1[0]));
        groups
    }
}

fn is_reserved(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| RESERVED_LOG_NAMES.contains(&n))
        .unwrap_or(false)
}

/// Hashes every file under `dest_root` except the reserved audit-log names
/// and partial copies left by an interrupted run.
///
/// Hashing runs in parallel; buckets are ordered by the sorted listing so the
/// representative of each content is the same on every run. Files that cannot
/// be read are left out of the index.
pub fn build_index(
    dest_root: &Path,
    reporter: &dyn ProgressReporter,
) -> io::Result<FingerprintIndex> {
    let start = Instant::now();
    let files: Vec<PathBuf> = TreeWalker::new()
        .list_files(dest_root)?
        .into_iter()
        .filter(|p| !is_reserved(p) && !is_partial_copy(p))
        .collect();

    let total = files.len();
    reporter.on_index_start(total);

    let hashed: DashMap<Fingerprint, Vec<usize>> = DashMap::new();
    let done = AtomicUsize::new(0);

    files.par_iter().enumerate().for_each(|(position, file)| {
        match hasher::hash_file(file) {
            Ok(fingerprint) => hashed.entry(fingerprint).or_default().push(position),
            Err(e) => warn!("Error hashing '{}': {}", file.display(), e),
        }
        let n = done.fetch_add(1, Ordering::Relaxed) + 1;
        reporter.on_index_progress(n, total);
    });

    let mut buckets = HashMap::with_capacity(hashed.len());
    let mut preexisting = HashSet::with_capacity(total);
    for (fingerprint, mut positions) in hashed.into_iter() {
        positions.sort_unstable();
        let paths: Vec<PathBuf> = positions.into_iter().map(|i| files[i].clone()).collect();
        preexisting.extend(paths.iter().cloned());
        buckets.insert(fingerprint, paths);
    }
    let index = FingerprintIndex {
        buckets,
        preexisting,
    };

    debug!(
        "Indexed {} files ({} distinct) under {} in {:.2}s",
        index.file_count(),
        index.len(),
        dest_root.display(),
        start.elapsed().as_secs_f64()
    );
    reporter.on_index_complete(index.len(), start.elapsed().as_secs_f64());
    Ok(index)
}
