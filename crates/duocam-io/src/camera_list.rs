use std::path::Path;

use crate::error::IoError;

/// A named camera source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraEntry {
    /// Display name.
    pub name: String,
    /// Device identifier or stream URL.
    pub url: String,
}

/// Parse a camera list, one `<name> <url>` record per line.
///
/// The name ends at the first space, the rest of the line is the source. A
/// line without a space is taken as a source and named `Camera <n>`, `n`
/// being its one based position in the list. Blank lines are skipped.
pub fn parse_camera_list(text: &str) -> Vec<CameraEntry> {
    let mut cameras = Vec::new();
    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let entry = match line.split_once(' ') {
            Some((name, url)) => CameraEntry {
                name: name.to_string(),
                url: url.to_string(),
            },
            None => CameraEntry {
                name: format!("Camera {}", cameras.len() + 1),
                url: line.to_string(),
            },
        };
        cameras.push(entry);
    }
    cameras
}

/// Read a camera list file, `None` when the file does not exist.
pub fn load_camera_list(path: impl AsRef<Path>) -> Result<Option<Vec<CameraEntry>>, IoError> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(None);
    }
    let cameras = parse_camera_list(&std::fs::read_to_string(path)?);
    log::debug!("{} cameras listed in {}", cameras.len(), path.display());
    Ok(Some(cameras))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_camera_list() {
        let cameras = parse_camera_list(
            "front rtsp://10.0.0.5:554/stream 1\n\n  rtsp://10.0.0.6/live  \nback /dev/video2\n",
        );
        assert_eq!(cameras.len(), 3);
        assert_eq!(cameras[0].name, "front");
        assert_eq!(cameras[0].url, "rtsp://10.0.0.5:554/stream 1");
        assert_eq!(cameras[1].name, "Camera 2");
        assert_eq!(cameras[1].url, "rtsp://10.0.0.6/live");
        assert_eq!(cameras[2].url, "/dev/video2");
    }

    #[test]
    fn test_load_missing_list() -> Result<(), IoError> {
        let tmp_dir = tempfile::tempdir()?;
        assert!(load_camera_list(tmp_dir.path().join("cameras.txt"))?.is_none());

        let path = tmp_dir.path().join("cameras.txt");
        std::fs::write(&path, "left 0\nright 1\n")?;
        let cameras = load_camera_list(&path)?.unwrap_or_default();
        assert_eq!(cameras[1].name, "right");
        Ok(())
    }
}
