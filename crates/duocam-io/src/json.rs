use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::IoError;

/// Read a JSON document, `None` when the file does not exist.
pub(crate) fn read_json_value(path: &Path) -> Result<Option<serde_json::Value>, IoError> {
    if !path.exists() {
        return Ok(None);
    }
    let text = std::fs::read_to_string(path)?;
    let value = serde_json::from_str(&text).map_err(|e| IoError::malformed(path, e))?;
    Ok(Some(value))
}

/// Write pretty JSON next to `path` then move it in place.
pub(crate) fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), IoError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    std::fs::write(&tmp, serde_json::to_vec_pretty(value)?)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}
