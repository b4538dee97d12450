//! Optional on-disk copy of a finished report.
//!
//! The caller names a file; it is always created inside the configured output
//! directory. The bytes go to a temporary file in that directory first and are
//! renamed into place, so a reader never sees a half-written PDF.

use std::io::Write;
use std::path::{Component, Path, PathBuf};

use tracing::info;

use crate::errors::ReportError;

/// Checks that `name` is a plain file name (no separators, no `..`).
pub fn validate_destination(name: &str) -> Result<&str, ReportError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ReportError::InvalidDestination("destination is empty".to_string()));
    }
    if trimmed.contains(['/', '\\']) {
        return Err(ReportError::InvalidDestination(format!(
            "destination '{trimmed}' must be a file name, not a path"
        )));
    }
    let mut components = Path::new(trimmed).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(trimmed),
        _ => Err(ReportError::InvalidDestination(format!(
            "destination '{trimmed}' is not a valid file name"
        ))),
    }
}

/// Writes `bytes` to `dir/name` atomically and returns the final path.
pub fn write_atomic(dir: &Path, name: &str, bytes: &[u8]) -> Result<PathBuf, ReportError> {
    let name = validate_destination(name)?;
    let target = dir.join(name);
    let sink_error = |source: std::io::Error| ReportError::Sink {
        path: target.clone(),
        source,
    };

    let mut file = tempfile::NamedTempFile::new_in(dir).map_err(sink_error)?;
    file.write_all(bytes).map_err(sink_error)?;
    file.as_file().sync_all().map_err(sink_error)?;
    file.persist(&target).map_err(|e| sink_error(e.error))?;

    info!(path = %target.display(), bytes = bytes.len(), "Report written");
    Ok(target)
}
