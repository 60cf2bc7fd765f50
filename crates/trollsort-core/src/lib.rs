pub mod audit;
pub mod classify;
pub mod commit;
pub mod config;
pub mod engine;
pub mod error;
pub mod hasher;
pub mod index;
pub mod planner;
pub mod progress;
pub mod scanner;

pub use audit::{AuditLog, AuditSummary, AuditWriter};
pub use classify::{ClassifiedItem, ExifTool, FileMetadata, MetadataSource};
pub use commit::CommitEngine;
pub use config::{AppConfig, ClassifierErrorPolicy, CollisionPolicy};
pub use engine::{SortEngine, SortResult};
pub use error::Error;
pub use index::{build_index, FingerprintIndex};
pub use planner::{plan_copies, CopyPlan, PlanKind};
pub use progress::{ProgressReporter, SilentReporter};
