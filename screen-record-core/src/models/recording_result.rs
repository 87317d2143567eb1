use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Result returned when a recording session completes successfully.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingResult {
    pub file_path: PathBuf,
    /// Presentation-timestamp span of the written track, in seconds.
    pub duration_secs: f64,
    pub samples_written: u64,
    pub bytes_written: u64,
    pub checksum: String,
    pub metadata: RecordingMetadata,
}

/// Metadata stored alongside a recording.
///
/// Serializable for JSON export to the controlling application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingMetadata {
    pub id: String,
    pub duration_secs: f64,
    pub file_path: String,
    pub checksum: String,
    pub created_at: String,
    pub mime_type: String,
    pub width: u32,
    pub height: u32,
}

impl RecordingMetadata {
    pub fn new(
        duration_secs: f64,
        file_path: &str,
        checksum: &str,
        mime_type: &str,
        width: u32,
        height: u32,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            duration_secs,
            file_path: file_path.to_string(),
            checksum: checksum.to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            mime_type: mime_type.to_string(),
            width,
            height,
        }
    }
}
