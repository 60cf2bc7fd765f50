pub mod dates;
pub mod exiftool;

pub use dates::{parse_exif_datetime, pick_best_date, CaptureTime, DATE_TAGS_PRIORITY};
pub use exiftool::ExifTool;

use crate::config::ClassifierErrorPolicy;
use crate::error::Error;
use crate::progress::ProgressReporter;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Sidecar extensions, in lookup order.
pub const SIDECAR_EXTENSIONS: [&str; 5] = ["xmp", "aae", "thm", "dop", "pp3"];

/// What a metadata source reports for one file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileMetadata {
    pub path: PathBuf,
    pub mime_type: Option<String>,
    /// Raw candidate timestamps keyed by tag name.
    pub timestamps: BTreeMap<String, String>,
}

/// External metadata extractor. Given a batch of paths it returns metadata for
/// the files it could read; files it skips are simply absent from the result.
pub trait MetadataSource: Send + Sync {
    fn read_batch(&self, paths: &[PathBuf]) -> Result<Vec<FileMetadata>, Error>;
}

/// A media file ready for planning.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifiedItem {
    pub src: PathBuf,
    pub mime_type: Option<String>,
    pub exif_tag_used: Option<&'static str>,
    pub exif_date: Option<CaptureTime>,
    pub sidecars: Vec<PathBuf>,
}

pub fn is_media_mime(mime: Option<&str>) -> bool {
    match mime {
        Some(m) => m.starts_with("image/") || m.starts_with("video/"),
        None => false,
    }
}

/// Files next to `src` sharing its stem and carrying a sidecar extension.
/// Both lower and upper case extensions are checked; a file reachable under
/// both spellings (case-insensitive filesystems) is listed once.
pub fn find_sidecars_for(src: &Path) -> Vec<PathBuf> {
    let mut found = Vec::new();
    let own = fs::canonicalize(src).unwrap_or_else(|_| src.to_path_buf());
    let mut seen = HashSet::new();
    for ext in SIDECAR_EXTENSIONS {
        for variant in [ext.to_string(), ext.to_ascii_uppercase()] {
            let candidate = src.with_extension(&variant);
            if candidate == src || !candidate.is_file() {
                continue;
            }
            let key = fs::canonicalize(&candidate).unwrap_or_else(|_| candidate.clone());
            if key == own {
                continue;
            }
            if seen.insert(key) {
                found.push(candidate);
            }
        }
    }
    found
}

/// Turns discovered paths into classified media items.
///
/// Batches are read in parallel; results keep the order of `files`.
pub struct Classifier<'a> {
    source: &'a dyn MetadataSource,
    batch_size: usize,
    error_policy: ClassifierErrorPolicy,
}

impl<'a> Classifier<'a> {
    pub fn new(source: &'a dyn MetadataSource) -> Self {
        Self {
            source,
            batch_size: crate::config::DEFAULT_BATCH_SIZE,
            error_policy: ClassifierErrorPolicy::Abort,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_error_policy(mut self, policy: ClassifierErrorPolicy) -> Self {
        self.error_policy = policy;
        self
    }

    pub fn classify(
        &self,
        files: &[PathBuf],
        reporter: &dyn ProgressReporter,
    ) -> Result<Vec<ClassifiedItem>, Error> {
        let start = Instant::now();
        let total_batches = files.len().div_ceil(self.batch_size);
        reporter.on_classify_start(total_batches);
        let done = AtomicUsize::new(0);

        let batches: Vec<Result<Vec<FileMetadata>, Error>> = files
            .par_chunks(self.batch_size)
            .map(|batch| {
                let result = self.source.read_batch(batch);
                let n = done.fetch_add(1, Ordering::Relaxed) + 1;
                reporter.on_classify_progress(n, total_batches);
                result
            })
            .collect();

        let mut items = Vec::new();
        for (batch_num, batch) in batches.into_iter().enumerate() {
            let metas = match batch {
                Ok(metas) => metas,
                Err(e) => match self.error_policy {
                    ClassifierErrorPolicy::Abort => return Err(e),
                    ClassifierErrorPolicy::SkipBatch => {
                        warn!(
                            "Batch {}/{} could not be classified, skipping it: {}",
                            batch_num + 1,
                            total_batches,
                            e
                        );
                        continue;
                    }
                },
            };
            items.extend(metas.into_iter().filter_map(to_classified_item));
        }

        let items = drop_sidecar_primaries(items);
        info!(
            "Classified {} media file(s) out of {} in {:.2}s",
            items.len(),
            files.len(),
            start.elapsed().as_secs_f64()
        );
        reporter.on_classify_complete(items.len(), start.elapsed().as_secs_f64());
        Ok(items)
    }
}

fn to_classified_item(meta: FileMetadata) -> Option<ClassifiedItem> {
    if !is_media_mime(meta.mime_type.as_deref()) {
        return None;
    }
    let src = fs::canonicalize(&meta.path).unwrap_or(meta.path);
    let best = pick_best_date(&meta.timestamps);
    Some(ClassifiedItem {
        sidecars: find_sidecars_for(&src),
        exif_date: best.map(|(dt, _)| dt),
        exif_tag_used: best.map(|(_, tag)| tag),
        mime_type: meta.mime_type,
        src,
    })
}

/// A `.thm` thumbnail reads as `image/jpeg`; when it already travels as the
/// sidecar of another item it is not planned a second time on its own.
fn drop_sidecar_primaries(items: Vec<ClassifiedItem>) -> Vec<ClassifiedItem> {
    let sidecars: HashSet<PathBuf> = items
        .iter()
        .flat_map(|item| item.sidecars.iter())
        .map(|p| fs::canonicalize(p).unwrap_or_else(|_| p.clone()))
        .collect();
    items
        .into_iter()
        .filter(|item| {
            let keep = !sidecars.contains(&item.src);
            if !keep {
                debug!("{} is a sidecar, not a primary", item.src.display());
            }
            keep
        })
        .collect()
}
