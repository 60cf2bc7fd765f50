use crate::audit::{AuditLog, AuditSummary, AuditWriter};
use crate::classify::{Classifier, MetadataSource};
use crate::commit::{copy, CommitEngine};
use crate::config::AppConfig;
use crate::error::Error;
use crate::index;
use crate::planner;
use crate::progress::ProgressReporter;
use crate::scanner::TreeWalker;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// One sorting run: source discovery, classification, planning, destination
/// indexing, commit and audit log.
pub struct SortEngine<'a> {
    config: AppConfig,
    source: &'a dyn MetadataSource,
}

#[derive(Debug)]
pub struct SortResult {
    pub base_out: PathBuf,
    pub logs_dir: PathBuf,
    pub scan_duration: Duration,
    pub classify_duration: Duration,
    pub index_duration: Duration,
    pub commit_duration: Duration,
    pub files_discovered: usize,
    pub media_items: usize,
    pub planned_copies: usize,
    pub years_with_date: BTreeSet<i32>,
    pub summary: AuditSummary,
    pub audit: AuditLog,
}

impl<'a> SortEngine<'a> {
    pub fn new(config: AppConfig, source: &'a dyn MetadataSource) -> Self {
        Self { config, source }
    }

    /// Destination folder for a run: `dest_root`, or `dest_root/top_folder`.
    pub fn base_out(&self, dest_root: &Path) -> PathBuf {
        match self.config.top_folder.as_deref().filter(|f| !f.is_empty()) {
            Some(top) => dest_root.join(top),
            None => dest_root.to_path_buf(),
        }
    }

    pub fn sort(
        &self,
        src_root: &Path,
        dest_root: &Path,
        reporter: &dyn ProgressReporter,
    ) -> Result<SortResult, Error> {
        if !src_root.is_dir() {
            return Err(Error::SourceMissing(src_root.to_path_buf()));
        }
        let src_root = src_root.canonicalize()?;

        let base_out = self.base_out(dest_root);
        fs::create_dir_all(&base_out)?;
        let base_out = base_out.canonicalize()?;
        let writer = AuditWriter::new(&base_out);

        info!("Source: {}", src_root.display());
        info!("Destination: {}", base_out.display());
        info!("Collision policy: {}", self.config.collision_policy);

        let removed = copy::remove_partial_copies(&base_out)?;
        if removed > 0 {
            warn!("Removed {} partial copies left by an interrupted run", removed);
        }

        // Phase 1: Scan
        info!("Scanning for media files...");
        reporter.on_scan_start();
        let scan_start = Instant::now();
        let files = TreeWalker::new()
            .prune(&base_out)
            .ignore_globs(&self.config.ignore_patterns)
            .list_files(&src_root)?;
        let scan_duration = scan_start.elapsed();
        reporter.on_scan_complete(files.len(), scan_duration.as_secs_f64());
        debug!("Found {} files to analyze", files.len());

        // Phase 2: Classify
        let classify_start = Instant::now();
        let items = Classifier::new(self.source)
            .with_batch_size(self.config.batch_size)
            .with_error_policy(self.config.classifier_error_policy)
            .classify(&files, reporter)?;
        let classify_duration = classify_start.elapsed();
        info!("Found {} media file(s)", items.len());

        if items.is_empty() {
            warn!("No media files found");
            return Ok(SortResult {
                logs_dir: writer.logs_dir().to_path_buf(),
                base_out,
                scan_duration,
                classify_duration,
                index_duration: Duration::ZERO,
                commit_duration: Duration::ZERO,
                files_discovered: files.len(),
                media_items: 0,
                planned_copies: 0,
                years_with_date: BTreeSet::new(),
                summary: AuditSummary::default(),
                audit: AuditLog::default(),
            });
        }

        writer.write_found_list(&items)?;

        // Phase 3: Plan
        let (plans, years_with_date) = planner::plan_copies(&items, &base_out);
        if years_with_date.len() > 1 {
            info!("Note: Multiple years detected: {:?}", years_with_date);
        }

        // Phase 4: Index destination
        info!("Indexing existing destination files for duplicate detection...");
        let index_start = Instant::now();
        let mut index = index::build_index(&base_out, reporter)?;
        let index_duration = index_start.elapsed();
        info!("Indexed {} existing file(s)", index.file_count());

        // Phase 5: Commit
        info!("Copying files (non-destructive)...");
        let commit_start = Instant::now();
        let engine = CommitEngine::new(&base_out, self.config.collision_policy);
        let audit = engine.commit(&plans, &mut index, reporter)?;
        let commit_duration = commit_start.elapsed();

        writer.write_log(&audit)?;
        info!("Reports written to: {}", writer.logs_dir().display());

        Ok(SortResult {
            logs_dir: writer.logs_dir().to_path_buf(),
            base_out,
            scan_duration,
            classify_duration,
            index_duration,
            commit_duration,
            files_discovered: files.len(),
            media_items: items.len(),
            planned_copies: plans.len(),
            years_with_date,
            summary: audit.summary(),
            audit,
        })
    }
}
