use crate::error::Error;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Upper bound on `_(n)` suffixes tried before giving up on a file.
pub const MAX_DISAMBIGUATION: u32 = 9_999;

/// `dst` itself when free, otherwise the first free `<stem>_(n)<.ext>` next to it.
pub fn unique_path(dst: &Path) -> Result<PathBuf, Error> {
    if !dst.exists() {
        return Ok(dst.to_path_buf());
    }
    let parent = dst.parent().unwrap_or_else(|| Path::new(""));
    let stem = dst
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let suffix = dst
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    for i in 1..=MAX_DISAMBIGUATION {
        let candidate = parent.join(format!("{}_({}){}", stem, i, suffix));
        if !candidate.exists() {
            return Ok(candidate);
        }
    }
    Err(Error::NameSpaceExhausted {
        path: dst.to_path_buf(),
    })
}

fn stem_of(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// How a primary file's name changed during collision resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupRename {
    pub old_stem: String,
    pub new_stem: String,
    pub new_parent: PathBuf,
}

impl GroupRename {
    /// Where a sidecar planned at `planned` goes so it keeps matching its primary.
    pub fn apply(&self, planned: &Path) -> PathBuf {
        let name = planned
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.new_parent
            .join(name.replacen(&self.old_stem, &self.new_stem, 1))
    }
}

/// Group id → rename of that group's primary. Lives for one collision pass.
#[derive(Debug, Default)]
pub struct GroupRenameMap {
    renames: HashMap<String, GroupRename>,
}

impl GroupRenameMap {
    /// Records the rename when the primary's stem changed.
    pub fn record(&mut self, group_id: &str, planned: &Path, resolved: &Path) {
        let old_stem = stem_of(planned);
        let new_stem = stem_of(resolved);
        if old_stem == new_stem {
            return;
        }
        let new_parent = resolved
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        self.renames.insert(
            group_id.to_string(),
            GroupRename {
                old_stem,
                new_stem,
                new_parent,
            },
        );
    }

    pub fn get(&self, group_id: &str) -> Option<&GroupRename> {
        self.renames.get(group_id)
    }

    pub fn len(&self) -> usize {
        self.renames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.renames.is_empty()
    }
}
