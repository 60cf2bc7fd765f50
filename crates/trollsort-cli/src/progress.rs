use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Mutex;
use std::time::Duration;
use trollsort_core::ProgressReporter;

const TICKS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";

/// indicatif progress for a sort run.
///
/// - Scan: spinner (file count unknown upfront)
/// - Classify, index, commit: bars with known totals
pub struct CliReporter {
    bar: Mutex<Option<ProgressBar>>,
}

impl CliReporter {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }

    fn set_bar(&self, pb: ProgressBar) {
        let mut guard = self.bar.lock().unwrap();
        if let Some(old) = guard.take() {
            old.finish_and_clear();
        }
        *guard = Some(pb);
    }

    fn finish_bar(&self) {
        let mut guard = self.bar.lock().unwrap();
        if let Some(pb) = guard.take() {
            pb.finish_and_clear();
        }
    }

    fn start_bar(&self, label: &str, unit: &str, total: usize) {
        let pb = ProgressBar::new(total as u64);
        pb.set_style(
            ProgressStyle::with_template(&format!(
                "  {{spinner:.cyan}} {} [{{bar:30.cyan/dim}}] {{pos}}/{{len}} {} ({{eta}} remaining)",
                label, unit
            ))
            .unwrap()
            .progress_chars("━╸─")
            .tick_chars(TICKS),
        );
        pb.enable_steady_tick(Duration::from_millis(80));
        self.set_bar(pb);
    }

    fn advance(&self, done: usize, total: usize) {
        let guard = self.bar.lock().unwrap();
        if let Some(pb) = guard.as_ref() {
            if pb.length() != Some(total as u64) {
                pb.set_length(total as u64);
            }
            pb.set_position(done as u64);
        }
    }
}

impl ProgressReporter for CliReporter {
    fn on_scan_start(&self) {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap()
                .tick_chars(TICKS),
        );
        pb.set_message("Scanning source...");
        pb.enable_steady_tick(Duration::from_millis(80));
        self.set_bar(pb);
    }

    fn on_scan_complete(&self, total_files: usize, duration_secs: f64) {
        self.finish_bar();
        eprintln!(
            "  \x1b[32m✓\x1b[0m Scan complete: {} files in {:.2}s",
            total_files, duration_secs
        );
    }

    fn on_classify_start(&self, total_batches: usize) {
        self.start_bar("Reading metadata", "batches", total_batches);
    }

    fn on_classify_progress(&self, batches_done: usize, total_batches: usize) {
        self.advance(batches_done, total_batches);
    }

    fn on_classify_complete(&self, media_items: usize, duration_secs: f64) {
        self.finish_bar();
        eprintln!(
            "  \x1b[32m✓\x1b[0m Metadata complete: {} media files in {:.2}s",
            media_items, duration_secs
        );
    }

    fn on_index_start(&self, total_files: usize) {
        self.start_bar("Indexing destination", "files", total_files);
    }

    fn on_index_progress(&self, files_hashed: usize, total_files: usize) {
        self.advance(files_hashed, total_files);
    }

    fn on_index_complete(&self, distinct: usize, duration_secs: f64) {
        self.finish_bar();
        eprintln!(
            "  \x1b[32m✓\x1b[0m Index complete: {} distinct contents in {:.2}s",
            distinct, duration_secs
        );
    }

    fn on_commit_start(&self, total_plans: usize) {
        self.start_bar("Copying", "files", total_plans);
    }

    fn on_commit_progress(&self, plans_done: usize, total_plans: usize) {
        self.advance(plans_done, total_plans);
    }

    fn on_commit_complete(&self, copied: usize, duration_secs: f64) {
        self.finish_bar();
        eprintln!(
            "  \x1b[32m✓\x1b[0m Copy complete: {} files written in {:.2}s",
            copied, duration_secs
        );
    }
}
