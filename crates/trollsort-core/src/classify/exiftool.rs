use super::{FileMetadata, MetadataSource, DATE_TAGS_PRIORITY};
use crate::error::Error;
use serde_json::Value;
use std::env;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Handle on an ExifTool executable, resolved once and passed to whoever
/// needs it for the duration of a run.
#[derive(Debug, Clone)]
pub struct ExifTool {
    program: PathBuf,
    timeout: Duration,
}

impl ExifTool {
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    /// Uses `configured` when given, otherwise the per-user install directory
    /// (Windows) and then `PATH`.
    pub fn locate(configured: Option<&Path>, timeout: Duration) -> Result<Self, Error> {
        if let Some(path) = configured {
            if path.is_file() {
                info!("Using configured ExifTool: {}", path.display());
                return Ok(Self::new(path, timeout));
            }
            warn!(
                "Configured exiftool_path {} is not a file, searching PATH",
                path.display()
            );
        }

        if let Some(path) = user_install_dir().and_then(|dir| find_in_dir(&dir)) {
            info!("Found ExifTool: {}", path.display());
            return Ok(Self::new(path, timeout));
        }

        if let Some(paths) = env::var_os("PATH") {
            for dir in env::split_paths(&paths) {
                if let Some(path) = find_in_dir(&dir) {
                    info!("Found ExifTool in PATH: {}", path.display());
                    return Ok(Self::new(path, timeout));
                }
            }
        }

        Err(Error::ToolNotFound)
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn command(&self, paths: &[PathBuf]) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args([
            "-json",
            "-api",
            "largefilesupport=1",
            "-fast",
            "-charset",
            "filename=utf8",
            "-FileName",
            "-Directory",
            "-MIMEType",
        ]);
        cmd.args(DATE_TAGS_PRIORITY.iter().map(|tag| format!("-{}", tag)));
        cmd.arg("--");
        cmd.args(paths);
        cmd
    }

    /// Runs one batch, killing the child if it outlives the timeout.
    fn run(&self, paths: &[PathBuf]) -> Result<Vec<u8>, Error> {
        let mut child = self
            .command(paths)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    Error::ToolNotFound
                } else {
                    Error::Io(e)
                }
            })?;

        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if Instant::now() >= deadline {
                let _ = child.kill();
                let _ = child.wait();
                return Err(Error::Classifier(format!(
                    "ExifTool timed out after {} seconds (very large or corrupted files?)",
                    self.timeout.as_secs()
                )));
            }
            thread::sleep(POLL_INTERVAL);
        };

        let out = stdout.map(join_drain).unwrap_or_default();
        let err = stderr.map(join_drain).unwrap_or_default();

        if !status.success() {
            let code = status
                .code()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".to_string());
            return Err(Error::Classifier(format!(
                "ExifTool failed (exit code {}): {}",
                code,
                String::from_utf8_lossy(&err).trim()
            )));
        }
        if !err.is_empty() {
            debug!("ExifTool stderr: {}", String::from_utf8_lossy(&err).trim());
        }
        Ok(out)
    }
}

impl MetadataSource for ExifTool {
    fn read_batch(&self, paths: &[PathBuf]) -> Result<Vec<FileMetadata>, Error> {
        if paths.is_empty() {
            return Ok(Vec::new());
        }
        let out = self.run(paths)?;
        Ok(parse_json_output(&out)
            .iter()
            .filter_map(file_metadata_from_json)
            .collect())
    }
}

fn drain<R: Read + Send + 'static>(mut reader: R) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = reader.read_to_end(&mut buf);
        buf
    })
}

fn join_drain(handle: thread::JoinHandle<Vec<u8>>) -> Vec<u8> {
    handle.join().unwrap_or_default()
}

#[cfg(windows)]
fn user_install_dir() -> Option<PathBuf> {
    env::var_os("LOCALAPPDATA").map(|dir| PathBuf::from(dir).join("exiftool"))
}

#[cfg(not(windows))]
fn user_install_dir() -> Option<PathBuf> {
    None
}

fn find_in_dir(dir: &Path) -> Option<PathBuf> {
    let names: &[&str] = if cfg!(windows) {
        &["exiftool.exe", "exiftool"]
    } else {
        &["exiftool"]
    };
    names
        .iter()
        .map(|name| dir.join(name))
        .find(|candidate| candidate.is_file())
}

/// Parses ExifTool's JSON array. Warnings printed ahead of the array are cut
/// away; output that still does not parse yields no records.
pub(crate) fn parse_json_output(out: &[u8]) -> Vec<Value> {
    let text = String::from_utf8_lossy(out);
    if text.trim().is_empty() {
        return Vec::new();
    }
    if let Ok(values) = serde_json::from_str::<Vec<Value>>(&text) {
        return values;
    }
    if let (Some(start), Some(end)) = (text.find('['), text.rfind(']')) {
        if end > start {
            if let Ok(values) = serde_json::from_str::<Vec<Value>>(&text[start..=end]) {
                return values;
            }
        }
    }
    warn!("Could not parse ExifTool output as JSON, batch yields no records");
    Vec::new()
}

pub(crate) fn file_metadata_from_json(value: &Value) -> Option<FileMetadata> {
    let directory = value.get("Directory")?.as_str().filter(|s| !s.is_empty())?;
    let file_name = value.get("FileName")?.as_str().filter(|s| !s.is_empty())?;

    let timestamps = DATE_TAGS_PRIORITY
        .iter()
        .filter_map(|tag| {
            value
                .get(*tag)
                .and_then(Value::as_str)
                .map(|v| (tag.to_string(), v.to_string()))
        })
        .collect();

    Some(FileMetadata {
        path: Path::new(directory).join(file_name),
        mime_type: value
            .get("MIMEType")
            .and_then(Value::as_str)
            .map(str::to_string),
        timestamps,
    })
}
