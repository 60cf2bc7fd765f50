pub mod collision;
pub mod copy;

pub use collision::{unique_path, GroupRename, GroupRenameMap, MAX_DISAMBIGUATION};
pub use copy::copy_verified;

use crate::audit::{
    AppliedCollision, AuditLog, CollisionCause, CollisionRecord, DuplicateRecord, PlanEntry,
    ReportRecord,
};
use crate::config::CollisionPolicy;
use crate::error::Error;
use crate::hasher::{self, Fingerprint};
use crate::index::FingerprintIndex;
use crate::planner::{CopyPlan, PlanKind};
use crate::progress::ProgressReporter;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

pub const CONFLICTS_DIR: &str = "conflicts";

/// Executes copy plans against the destination tree.
///
/// Plans run one at a time in (group, primary first, source path) order so a
/// primary's outcome is settled before its sidecars are looked at. The
/// fingerprint index is the only state shared between plans.
pub struct CommitEngine {
    base_out: PathBuf,
    policy: CollisionPolicy,
}

impl CommitEngine {
    pub fn new(base_out: impl Into<PathBuf>, policy: CollisionPolicy) -> Self {
        Self {
            base_out: base_out.into(),
            policy,
        }
    }

    pub fn conflicts_dir(&self) -> PathBuf {
        self.base_out.join(CONFLICTS_DIR)
    }

    /// Runs both passes and returns every decision taken.
    ///
    /// Only failing to create a destination directory aborts; anything that
    /// goes wrong with a single file is recorded and the run moves on.
    pub fn commit(
        &self,
        plans: &[CopyPlan],
        index: &mut FingerprintIndex,
        reporter: &dyn ProgressReporter,
    ) -> Result<AuditLog, Error> {
        let start = Instant::now();
        let mut sorted: Vec<&CopyPlan> = plans.iter().collect();
        sorted.sort_by(|a, b| {
            (a.group_id.as_str(), a.kind, &a.src).cmp(&(b.group_id.as_str(), b.kind, &b.src))
        });

        let total = sorted.len();
        reporter.on_commit_start(total);

        let mut log = AuditLog::default();
        let mut collided_groups: HashSet<&str> = HashSet::new();

        for (n, plan) in sorted.into_iter().enumerate() {
            self.commit_one(plan, index, &mut log, &mut collided_groups)?;
            reporter.on_commit_progress(n + 1, total);
        }

        if !log.collisions.is_empty() {
            info!(
                "Found {} collision(s), applying policy: {}",
                log.collisions.len(),
                self.policy
            );
            let mut renames = GroupRenameMap::default();
            let deferred = log.collisions.clone();
            for collision in deferred {
                let applied = self.resolve(collision, index, &mut renames)?;
                log.applied.push(applied);
            }
            debug!("{} primary rename(s) propagated to sidecars", renames.len());
        }

        let summary = log.summary();
        reporter.on_commit_complete(
            summary.copied + summary.copied_after_collision,
            start.elapsed().as_secs_f64(),
        );
        Ok(log)
    }

    fn commit_one<'p>(
        &self,
        plan: &'p CopyPlan,
        index: &mut FingerprintIndex,
        log: &mut AuditLog,
        collided_groups: &mut HashSet<&'p str>,
    ) -> Result<(), Error> {
        if let Some(parent) = plan.dst.parent() {
            fs::create_dir_all(parent)?;
        }
        let entry = PlanEntry::from(plan);

        let src_hash = match hasher::hash_file(&plan.src) {
            Ok(hash) => hash,
            Err(e) => {
                warn!("Error hashing '{}': {}", plan.src.display(), e);
                log.report.push(ReportRecord::Error {
                    plan: entry,
                    hash: None,
                    error: e.to_string(),
                });
                return Ok(());
            }
        };

        if index.held_before_run(&src_hash, &plan.dst) {
            log.report.push(ReportRecord::AlreadyPresentSameContent {
                plan: entry,
                hash: src_hash,
            });
            return Ok(());
        }

        if let Some(existing) = index.representative(&src_hash) {
            debug!(
                "{} duplicates {}",
                plan.src.display(),
                existing.display()
            );
            log.duplicates.push(DuplicateRecord {
                plan: entry.clone(),
                existing: existing.to_path_buf(),
                hash: src_hash,
            });
            log.report.push(ReportRecord::SkippedDuplicate {
                plan: entry,
                hash: src_hash,
            });
            return Ok(());
        }

        if plan.dst.exists() {
            let dst_hash = match hasher::hash_file(&plan.dst) {
                Ok(hash) => Some(hash),
                Err(e) => {
                    warn!("Error hashing existing '{}': {}", plan.dst.display(), e);
                    None
                }
            };
            if dst_hash == Some(src_hash) {
                index.register(src_hash, plan.dst.clone());
                log.report.push(ReportRecord::AlreadyPresentSameContent {
                    plan: entry,
                    hash: src_hash,
                });
                return Ok(());
            }
            if plan.is_primary() {
                collided_groups.insert(plan.group_id.as_str());
            }
            defer(log, entry, src_hash, dst_hash, CollisionCause::ExistingContentDiffers);
            return Ok(());
        }

        if !plan.is_primary() && collided_groups.contains(plan.group_id.as_str()) {
            defer(log, entry, src_hash, None, CollisionCause::PrimaryCollided);
            return Ok(());
        }

        match copy_verified(&plan.src, &plan.dst, &src_hash) {
            Ok(()) => {
                index.register(src_hash, plan.dst.clone());
                log.report.push(ReportRecord::Copied {
                    plan: entry,
                    hash: src_hash,
                });
            }
            Err(e) => {
                warn!("Error copying '{}': {}", plan.src.display(), e);
                log.report.push(ReportRecord::Error {
                    plan: entry,
                    hash: Some(src_hash),
                    error: e.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Second pass for one deferred collision.
    fn resolve(
        &self,
        collision: CollisionRecord,
        index: &mut FingerprintIndex,
        renames: &mut GroupRenameMap,
    ) -> Result<AppliedCollision, Error> {
        if let Some(existing) = index.representative(&collision.src_hash) {
            return Ok(AppliedCollision::SkippedDuplicateAfterPolicy {
                existing: existing.to_path_buf(),
                collision,
            });
        }

        let planned = collision.plan.dst.clone();
        let policy_target = match self.policy {
            CollisionPolicy::Skip => {
                return Ok(AppliedCollision::SkippedCollision { collision });
            }
            CollisionPolicy::Rename => planned.clone(),
            CollisionPolicy::Conflicts => self.conflicts_dir().join(file_name(&planned)),
        };

        let target = match (collision.plan.kind, renames.get(&collision.plan.group_id)) {
            (PlanKind::Sidecar, Some(rename)) => rename.apply(&planned),
            _ => policy_target,
        };

        let final_dst = match unique_path(&target) {
            Ok(path) => path,
            Err(e) => {
                warn!("{}", e);
                return Ok(AppliedCollision::Error {
                    error: e.to_string(),
                    collision,
                });
            }
        };

        if let Some(parent) = final_dst.parent() {
            fs::create_dir_all(parent)?;
        }

        if let Err(e) = copy_verified(&collision.plan.src, &final_dst, &collision.src_hash) {
            warn!(
                "Error copying '{}' to '{}': {}",
                collision.plan.src.display(),
                final_dst.display(),
                e
            );
            return Ok(AppliedCollision::Error {
                error: e.to_string(),
                collision,
            });
        }

        if collision.plan.kind == PlanKind::Primary {
            renames.record(&collision.plan.group_id, &planned, &final_dst);
        }
        index.register(collision.src_hash, final_dst.clone());
        debug!(
            "{} copied to {} after collision",
            collision.plan.src.display(),
            final_dst.display()
        );
        Ok(AppliedCollision::CopiedAfterCollision {
            collision,
            final_dst,
        })
    }
}

fn defer(
    log: &mut AuditLog,
    plan: PlanEntry,
    src_hash: Fingerprint,
    dst_hash: Option<Fingerprint>,
    cause: CollisionCause,
) {
    log.collisions.push(CollisionRecord {
        plan: plan.clone(),
        src_hash,
        dst_hash,
        cause,
    });
    log.report.push(ReportRecord::CollisionDeferred {
        plan,
        hash: src_hash,
    });
}

fn file_name(path: &Path) -> &std::ffi::OsStr {
    path.file_name().unwrap_or(path.as_os_str())
}
