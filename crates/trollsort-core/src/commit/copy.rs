use crate::error::Error;
use crate::hasher::{Fingerprint, HashingWriter};
use std::fs::{self, File, FileTimes, Metadata};
use std::io;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::debug;

/// Copies `src` to `dst` without ever exposing a partial file at `dst`.
///
/// Bytes go to a temp file in the destination directory and are hashed on the
/// way; the temp file is only moved into place when the hash matches
/// `expected` and nothing exists at `dst` yet. Permissions and access and
/// modification times are carried over where the platform allows.
pub fn copy_verified(src: &Path, dst: &Path, expected: &Fingerprint) -> Result<(), Error> {
    let dir = dst
        .parent()
        .ok_or_else(|| Error::Other(format!("{} has no parent directory", dst.display())))?;

    let mut input = File::open(src)?;
    let metadata = input.metadata()?;

    let tmp = partial_file_in(dir)?;
    let mut writer = HashingWriter::new(tmp);
    io::copy(&mut input, &mut writer)?;
    let (tmp, copied) = writer.finish();

    if copied != *expected {
        return Err(Error::ContentChanged {
            path: src.to_path_buf(),
        });
    }

    tmp.as_file().sync_all()?;
    if let Err(e) = preserve_times(tmp.as_file(), &metadata) {
        debug!("Could not preserve timestamps on {}: {}", dst.display(), e);
    }
    if let Err(e) = tmp.as_file().set_permissions(metadata.permissions()) {
        debug!("Could not preserve permissions on {}: {}", dst.display(), e);
    }
    tmp.persist_noclobber(dst)?;
    Ok(())
}

fn preserve_times(file: &File, metadata: &Metadata) -> io::Result<()> {
    let mut times = FileTimes::new().set_modified(metadata.modified()?);
    if let Ok(accessed) = metadata.accessed() {
        times = times.set_accessed(accessed);
    }
    file.set_times(times)
}

/// Temp file in `dir` named so [`is_partial_copy`] recognizes it if a crash
/// leaves it behind.
pub(crate) fn partial_file_in(dir: &Path) -> io::Result<NamedTempFile> {
    tempfile::Builder::new()
        .prefix(".trollsort-")
        .suffix(".partial")
        .tempfile_in(dir)
}

/// Leftover temp files from an interrupted run.
pub fn is_partial_copy(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with(".trollsort-") && n.ends_with(".partial"))
        .unwrap_or(false)
}

/// Removes partial copies left in `dir` by an interrupted run.
pub fn remove_partial_copies(dir: &Path) -> io::Result<usize> {
    let mut removed = 0;
    for entry in walkdir::WalkDir::new(dir).into_iter().filter_map(Result::ok) {
        if entry.file_type().is_file() && is_partial_copy(entry.path()) {
            fs::remove_file(entry.path())?;
            removed += 1;
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hasher::hash_file;
    use std::time::{Duration, SystemTime};
    use tempfile::tempdir;

    #[test]
    fn test_copy_verified_copies_bytes_and_mtime() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("a.jpg");
        let dst = dir.path().join("out.jpg");
        fs::write(&src, "pixels").unwrap();
        let mtime = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        File::options()
            .write(true)
            .open(&src)
            .unwrap()
            .set_modified(mtime)
            .unwrap();

        let fp = hash_file(&src).unwrap();
        copy_verified(&src, &dst, &fp).unwrap();

        assert_eq!(fs::read(&dst).unwrap(), b"pixels");
        assert_eq!(fs::metadata(&dst).unwrap().modified().unwrap(), mtime);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 2);
    }

    #[cfg(unix)]
    #[test]
    fn test_copy_verified_carries_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let src = dir.path().join("a.jpg");
        let dst = dir.path().join("out.jpg");
        fs::write(&src, "pixels").unwrap();
        fs::set_permissions(&src, fs::Permissions::from_mode(0o640)).unwrap();

        copy_verified(&src, &dst, &hash_file(&src).unwrap()).unwrap();
        let mode = fs::metadata(&dst).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o640);
    }

    #[test]
    fn test_copy_verified_never_clobbers() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("a.jpg");
        let dst = dir.path().join("b.jpg");
        fs::write(&src, "new").unwrap();
        fs::write(&dst, "old").unwrap();

        let fp = hash_file(&src).unwrap();
        assert!(copy_verified(&src, &dst, &fp).is_err());
        assert_eq!(fs::read(&dst).unwrap(), b"old");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 2);
    }

    #[test]
    fn test_copy_verified_rejects_changed_source() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("a.jpg");
        let dst = dir.path().join("out.jpg");
        fs::write(&src, "before").unwrap();
        let stale = hash_file(&src).unwrap();
        fs::write(&src, "after").unwrap();

        let result = copy_verified(&src, &dst, &stale);
        assert!(matches!(result, Err(Error::ContentChanged { .. })));
        assert!(!dst.exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_partial_files_are_recognized() {
        let dir = tempdir().unwrap();
        let tmp = partial_file_in(dir.path()).unwrap();
        assert!(is_partial_copy(tmp.path()));
        assert!(!is_partial_copy(&dir.path().join("photo.jpg")));
    }

    #[test]
    fn test_remove_partial_copies() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(".trollsort-abc123.partial"), "half").unwrap();
        fs::write(dir.path().join("keep.jpg"), "whole").unwrap();
        assert_eq!(remove_partial_copies(dir.path()).unwrap(), 1);
        assert!(dir.path().join("keep.jpg").exists());
    }
}
