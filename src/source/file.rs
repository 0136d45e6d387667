//! File-based data source.
//!
//! Polls a JSON file holding a `/get_metrics` response.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::debug;

use super::{DataSource, MetricsPayload};

/// A data source that reads metrics payloads from a JSON file.
///
/// Useful for offline inspection of a saved API response. The source tracks
/// the file's modification time and only returns new data when the file has
/// been updated.
#[derive(Debug)]
pub struct FileSource {
    path: PathBuf,
    description: String,
    last_error: Option<String>,
    last_modified: Option<SystemTime>,
    /// Set by `request_refresh` to re-read an unchanged file.
    force_reload: bool,
}

impl FileSource {
    /// Create a new file source for the given path.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let description = format!("file: {}", path.display());
        Self {
            path,
            description,
            last_error: None,
            last_modified: None,
            force_reload: false,
        }
    }

    /// Returns the path being monitored.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn get_modified_time(&self) -> Option<SystemTime> {
        fs::metadata(&self.path).ok()?.modified().ok()
    }

    fn read_file(&mut self) -> Option<MetricsPayload> {
        match fs::read_to_string(&self.path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(payload) => {
                    self.last_error = None;
                    Some(payload)
                }
                Err(e) => {
                    self.last_error = Some(format!("Parse error: {}", e));
                    None
                }
            },
            Err(e) => {
                self.last_error = Some(format!("Read error: {}", e));
                None
            }
        }
    }
}

impl DataSource for FileSource {
    fn poll(&mut self) -> Option<MetricsPayload> {
        let current_modified = self.get_modified_time();

        let file_changed = match (&self.last_modified, &current_modified) {
            (None, _) => true,        // First poll, always read
            (Some(_), None) => false, // File disappeared, don't update
            (Some(last), Some(current)) => current > last,
        };

        if file_changed || std::mem::take(&mut self.force_reload) {
            if let Some(payload) = self.read_file() {
                debug!(path = %self.path.display(), nodes = payload.metrics.len(), "loaded metrics file");
                self.last_modified = current_modified;
                return Some(payload);
            }
        }

        None
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    fn request_refresh(&mut self) {
        self.force_reload = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn sample_json() -> &'static str {
        r#"{
            "metrics": [
                {
                    "node_id": "NODE_A",
                    "address": "::ffff:10.0.0.1",
                    "block_count": "100",
                    "cemented_count": "90",
                    "major_version": "25",
                    "minor_version": "0",
                    "patch_version": "0",
                    "pre_release_version": "0"
                }
            ]
        }"#
    }

    #[test]
    fn test_file_source_new() {
        let source = FileSource::new("/tmp/metrics.json");
        assert_eq!(source.path(), Path::new("/tmp/metrics.json"));
        assert_eq!(source.description(), "file: /tmp/metrics.json");
        assert!(source.error().is_none());
    }

    #[test]
    fn test_file_source_poll_reads_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{}", sample_json()).unwrap();

        let mut source = FileSource::new(file.path());

        // First poll should return data
        let payload = source.poll().unwrap();
        assert_eq!(payload.metrics.len(), 1);
        assert_eq!(payload.metrics[0].node_id.as_deref(), Some("NODE_A"));

        // Second poll without file change should return None
        assert!(source.poll().is_none());
    }

    #[test]
    fn test_file_source_refresh_rereads() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{}", sample_json()).unwrap();

        let mut source = FileSource::new(file.path());
        assert!(source.poll().is_some());
        assert!(source.poll().is_none());

        source.request_refresh();
        assert!(source.poll().is_some());
        assert!(source.poll().is_none());
    }

    #[test]
    fn test_file_source_missing_file() {
        let mut source = FileSource::new("/nonexistent/path/metrics.json");

        assert!(source.poll().is_none());
        assert!(source.error().unwrap().contains("Read error"));
    }

    #[test]
    fn test_file_source_invalid_json() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "not valid json").unwrap();

        let mut source = FileSource::new(file.path());

        assert!(source.poll().is_none());
        assert!(source.error().unwrap().contains("Parse error"));
    }
}
