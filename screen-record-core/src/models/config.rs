use std::path::PathBuf;
use std::time::Duration;

/// Configuration for a recording session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordConfiguration {
    /// Codec mime type (default: "video/avc").
    pub mime_type: String,

    /// Target bitrate in bits per second (default: 2 Mbit/s).
    pub bit_rate: u32,

    /// Target frame rate in frames per second (default: 15).
    pub frame_rate: u32,

    /// Keyframe interval in seconds (default: 10).
    pub keyframe_interval_secs: u32,

    /// Destination container file. Exclusively owned by the muxer for the
    /// session's duration.
    pub output_path: PathBuf,

    /// Upper bound on a single encoder dequeue attempt (default: 10 ms).
    pub dequeue_timeout: Duration,

    /// Interval between drain cycles of the polling worker (default: 100 ms).
    pub poll_interval: Duration,

    /// How long `stop()` waits for the encoder to reach end of stream before
    /// forcing finalize and release (default: 1 s).
    pub stop_grace_period: Duration,
}

impl RecordConfiguration {
    pub fn validate(&self) -> Result<(), String> {
        if self.mime_type.is_empty() {
            return Err("mime type must not be empty".into());
        }
        if self.bit_rate == 0 {
            return Err("bit rate must be positive".into());
        }
        if self.frame_rate == 0 {
            return Err("frame rate must be positive".into());
        }
        if self.keyframe_interval_secs == 0 {
            return Err("keyframe interval must be positive".into());
        }
        if self.output_path.as_os_str().is_empty() {
            return Err("output path must not be empty".into());
        }
        Ok(())
    }

    /// Encoder settings for a session at the given frame size.
    pub fn encoder_settings(&self, width: u32, height: u32) -> EncoderSettings {
        EncoderSettings {
            mime_type: self.mime_type.clone(),
            width,
            height,
            bit_rate: self.bit_rate,
            frame_rate: self.frame_rate,
            keyframe_interval_secs: self.keyframe_interval_secs,
        }
    }
}

impl Default for RecordConfiguration {
    fn default() -> Self {
        Self {
            mime_type: "video/avc".into(),
            bit_rate: 2_000_000,
            frame_rate: 15,
            keyframe_interval_secs: 10,
            output_path: PathBuf::from("recording.mp4"),
            dequeue_timeout: Duration::from_millis(10),
            poll_interval: Duration::from_millis(100),
            stop_grace_period: Duration::from_secs(1),
        }
    }
}

/// Negotiation parameters handed to the encoder at configure time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderSettings {
    pub mime_type: String,
    pub width: u32,
    pub height: u32,
    pub bit_rate: u32,
    pub frame_rate: u32,
    pub keyframe_interval_secs: u32,
}

impl EncoderSettings {
    pub fn validate(&self) -> Result<(), String> {
        if self.width == 0 || self.height == 0 {
            return Err(format!("frame size must be positive: {}x{}", self.width, self.height));
        }
        Ok(())
    }
}
