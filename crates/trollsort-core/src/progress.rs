/// Trait for reporting sort progress.
///
/// CLI implements with indicatif. All methods have default no-op implementations.
pub trait ProgressReporter: Send + Sync {
    fn on_scan_start(&self) {}
    fn on_scan_complete(&self, _total_files: usize, _duration_secs: f64) {}
    fn on_classify_start(&self, _total_batches: usize) {}
    fn on_classify_progress(&self, _batches_done: usize, _total_batches: usize) {}
    fn on_classify_complete(&self, _media_items: usize, _duration_secs: f64) {}
    fn on_index_start(&self, _total_files: usize) {}
    fn on_index_progress(&self, _files_hashed: usize, _total_files: usize) {}
    fn on_index_complete(&self, _distinct: usize, _duration_secs: f64) {}
    fn on_commit_start(&self, _total_plans: usize) {}
    fn on_commit_progress(&self, _plans_done: usize, _total_plans: usize) {}
    fn on_commit_complete(&self, _copied: usize, _duration_secs: f64) {}
}

/// No-op progress reporter for silent operation.
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}
