use crate::classify::ClassifiedItem;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

pub const UNKNOWN_DATE_DIR: &str = "unknown_date";
const GROUP_ID_LEN: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanKind {
    /// The media file itself. Sorts before its sidecars.
    #[serde(rename = "media")]
    Primary,
    Sidecar,
}

impl fmt::Display for PlanKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanKind::Primary => f.write_str("media"),
            PlanKind::Sidecar => f.write_str("sidecar"),
        }
    }
}

/// One source file and where it should land.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyPlan {
    pub src: PathBuf,
    pub dst: PathBuf,
    pub kind: PlanKind,
    pub group_id: String,
}

impl CopyPlan {
    pub fn is_primary(&self) -> bool {
        self.kind == PlanKind::Primary
    }
}

/// Stable short id for the group led by `src`.
pub fn group_id_for(src: &Path) -> String {
    let digest = Sha256::digest(src.to_string_lossy().as_bytes());
    let mut id: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
    id.truncate(GROUP_ID_LEN);
    id
}

/// Destination directory for an item: `unknown_date` or `YYYY-MM-DD -`.
///
/// The date is the one written in the file, in its own offset.
pub fn folder_for_item(base_out: &Path, item: &ClassifiedItem) -> PathBuf {
    match &item.exif_date {
        None => base_out.join(UNKNOWN_DATE_DIR),
        Some(dt) => base_out.join(format!("{} -", dt.date().format("%Y-%m-%d"))),
    }
}

/// Builds the copy plans for all items and collects the years seen among
/// dated items. Pure: touches neither the disk nor the clock.
pub fn plan_copies(items: &[ClassifiedItem], base_out: &Path) -> (Vec<CopyPlan>, BTreeSet<i32>) {
    let mut plans = Vec::with_capacity(items.len());
    let mut years_with_date = BTreeSet::new();

    for item in items {
        if let Some(dt) = &item.exif_date {
            years_with_date.insert(dt.year());
        }
        let dst_dir = folder_for_item(base_out, item);
        let group_id = group_id_for(&item.src);

        plans.push(CopyPlan {
            src: item.src.clone(),
            dst: dst_dir.join(file_name(&item.src)),
            kind: PlanKind::Primary,
            group_id: group_id.clone(),
        });
        for sidecar in &item.sidecars {
            plans.push(CopyPlan {
                src: sidecar.clone(),
                dst: dst_dir.join(file_name(sidecar)),
                kind: PlanKind::Sidecar,
                group_id: group_id.clone(),
            });
        }
    }

    (plans, years_with_date)
}

fn file_name(path: &Path) -> &std::ffi::OsStr {
    path.file_name().unwrap_or(path.as_os_str())
}
