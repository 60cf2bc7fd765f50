use crate::classify::ClassifiedItem;
use crate::commit::copy::partial_file_in;
use crate::error::Error;
use crate::hasher::Fingerprint;
use crate::planner::{CopyPlan, PlanKind};
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const LOG_DIR_NAME: &str = ".trollsort";

pub const FOUND_FILES_TXT: &str = "found_files.txt";
pub const FOUND_FILES_JSON: &str = "found_files.json";
pub const REPORT_JSON: &str = "report.json";
pub const DUPLICATES_JSON: &str = "duplicates_skipped.json";
pub const COLLISIONS_JSON: &str = "collisions.json";
pub const COLLISIONS_APPLIED_JSON: &str = "collisions_applied.json";

/// File names the destination indexer must never treat as payload.
pub const RESERVED_LOG_NAMES: [&str; 6] = [
    FOUND_FILES_TXT,
    FOUND_FILES_JSON,
    REPORT_JSON,
    DUPLICATES_JSON,
    COLLISIONS_JSON,
    COLLISIONS_APPLIED_JSON,
];

/// Fields every record carries about the plan it describes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanEntry {
    pub src: PathBuf,
    pub dst: PathBuf,
    pub kind: PlanKind,
    pub group_id: String,
}

impl From<&CopyPlan> for PlanEntry {
    fn from(plan: &CopyPlan) -> Self {
        Self {
            src: plan.src.clone(),
            dst: plan.dst.clone(),
            kind: plan.kind,
            group_id: plan.group_id.clone(),
        }
    }
}

/// First-pass outcome of a plan. Exactly one per plan.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReportRecord {
    Error {
        #[serde(flatten)]
        plan: PlanEntry,
        #[serde(skip_serializing_if = "Option::is_none")]
        hash: Option<Fingerprint>,
        error: String,
    },
    SkippedDuplicate {
        #[serde(flatten)]
        plan: PlanEntry,
        hash: Fingerprint,
    },
    AlreadyPresentSameContent {
        #[serde(flatten)]
        plan: PlanEntry,
        hash: Fingerprint,
    },
    CollisionDeferred {
        #[serde(flatten)]
        plan: PlanEntry,
        hash: Fingerprint,
    },
    Copied {
        #[serde(flatten)]
        plan: PlanEntry,
        hash: Fingerprint,
    },
}

impl ReportRecord {
    pub fn plan(&self) -> &PlanEntry {
        match self {
            ReportRecord::Error { plan, .. }
            | ReportRecord::SkippedDuplicate { plan, .. }
            | ReportRecord::AlreadyPresentSameContent { plan, .. }
            | ReportRecord::CollisionDeferred { plan, .. }
            | ReportRecord::Copied { plan, .. } => plan,
        }
    }

    pub fn status(&self) -> &'static str {
        match self {
            ReportRecord::Error { .. } => "error",
            ReportRecord::SkippedDuplicate { .. } => "skipped_duplicate",
            ReportRecord::AlreadyPresentSameContent { .. } => "already_present_same_content",
            ReportRecord::CollisionDeferred { .. } => "collision_deferred",
            ReportRecord::Copied { .. } => "copied",
        }
    }
}

/// An incoming file whose content already exists in the destination.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateRecord {
    #[serde(flatten)]
    pub plan: PlanEntry,
    pub existing: PathBuf,
    pub hash: Fingerprint,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionCause {
    /// The planned destination holds different (or unreadable) content.
    ExistingContentDiffers,
    /// The sidecar's primary collided; it waits for the primary's resolution.
    PrimaryCollided,
}

/// A plan set aside for the collision pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollisionRecord {
    #[serde(flatten)]
    pub plan: PlanEntry,
    pub src_hash: Fingerprint,
    /// `None` when the existing file could not be read or does not exist.
    pub dst_hash: Option<Fingerprint>,
    pub cause: CollisionCause,
}

/// How a deferred collision ended.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "final_status", rename_all = "snake_case")]
pub enum AppliedCollision {
    SkippedDuplicateAfterPolicy {
        #[serde(flatten)]
        collision: CollisionRecord,
        existing: PathBuf,
    },
    SkippedCollision {
        #[serde(flatten)]
        collision: CollisionRecord,
    },
    CopiedAfterCollision {
        #[serde(flatten)]
        collision: CollisionRecord,
        final_dst: PathBuf,
    },
    Error {
        #[serde(flatten)]
        collision: CollisionRecord,
        error: String,
    },
}

impl AppliedCollision {
    pub fn final_dst(&self) -> Option<&Path> {
        match self {
            AppliedCollision::CopiedAfterCollision { final_dst, .. } => Some(final_dst.as_path()),
            _ => None,
        }
    }
}

/// Everything one commit decided.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AuditLog {
    pub report: Vec<ReportRecord>,
    pub duplicates: Vec<DuplicateRecord>,
    pub collisions: Vec<CollisionRecord>,
    pub applied: Vec<AppliedCollision>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AuditSummary {
    pub copied: usize,
    pub already_present: usize,
    pub skipped_duplicates: usize,
    pub collisions: usize,
    pub copied_after_collision: usize,
    pub skipped_collisions: usize,
    pub errors: usize,
}

impl AuditLog {
    pub fn summary(&self) -> AuditSummary {
        let mut s = AuditSummary::default();
        for record in &self.report {
            match record {
                ReportRecord::Error { .. } => s.errors += 1,
                ReportRecord::SkippedDuplicate { .. } => s.skipped_duplicates += 1,
                ReportRecord::AlreadyPresentSameContent { .. } => s.already_present += 1,
                ReportRecord::CollisionDeferred { .. } => s.collisions += 1,
                ReportRecord::Copied { .. } => s.copied += 1,
            }
        }
        for applied in &self.applied {
            match applied {
                AppliedCollision::SkippedDuplicateAfterPolicy { .. } => s.skipped_duplicates += 1,
                AppliedCollision::SkippedCollision { .. } => s.skipped_collisions += 1,
                AppliedCollision::CopiedAfterCollision { .. } => s.copied_after_collision += 1,
                AppliedCollision::Error { .. } => s.errors += 1,
            }
        }
        s
    }

    /// The report record for `src`, if any.
    pub fn record_for(&self, src: &Path) -> Option<&ReportRecord> {
        self.report.iter().find(|r| r.plan().src == src)
    }
}

/// Writes the run's logs under `<dest>/.trollsort/`. Every file is fully
/// rewritten on each run.
#[derive(Debug, Clone)]
pub struct AuditWriter {
    logs_dir: PathBuf,
}

impl AuditWriter {
    pub fn new(base_out: &Path) -> Self {
        Self {
            logs_dir: base_out.join(LOG_DIR_NAME),
        }
    }

    pub fn logs_dir(&self) -> &Path {
        &self.logs_dir
    }

    /// `found_files.txt` (one path per line) and `found_files.json`.
    pub fn write_found_list(&self, items: &[ClassifiedItem]) -> Result<(), Error> {
        fs::create_dir_all(&self.logs_dir)?;
        let mut text = items
            .iter()
            .map(|i| i.src.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("\n");
        if !items.is_empty() {
            text.push('\n');
        }
        self.write_atomic(FOUND_FILES_TXT, text.as_bytes())?;
        self.write_json(FOUND_FILES_JSON, &items)
    }

    pub fn write_log(&self, log: &AuditLog) -> Result<(), Error> {
        fs::create_dir_all(&self.logs_dir)?;
        self.write_json(REPORT_JSON, &log.report)?;
        self.write_json(DUPLICATES_JSON, &log.duplicates)?;
        self.write_json(COLLISIONS_JSON, &log.collisions)?;
        self.write_json(COLLISIONS_APPLIED_JSON, &log.applied)?;
        debug!("Audit log written to {}", self.logs_dir.display());
        Ok(())
    }

    fn write_json<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<(), Error> {
        let mut body = serde_json::to_vec_pretty(value)?;
        body.push(b'\n');
        self.write_atomic(name, &body)
    }

    fn write_atomic(&self, name: &str, body: &[u8]) -> Result<(), Error> {
        let mut tmp = partial_file_in(&self.logs_dir)?;
        tmp.write_all(body)?;
        tmp.as_file().sync_all()?;
        tmp.persist(self.logs_dir.join(name))?;
        Ok(())
    }
}
