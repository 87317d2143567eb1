/// One encoded access unit dequeued from the video encoder.
///
/// Transient: produced by the encoder adapter, consumed immediately by the
/// container writer, never persisted. `buffer_id` identifies the underlying
/// encoder buffer, which must be released back to the encoder after the
/// sample has been handled (written or skipped).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedSample {
    pub buffer_id: u64,
    pub data: Vec<u8>,
    /// Presentation timestamp in microseconds.
    pub pts_us: i64,
    /// Buffer carries codec configuration only, no presentable payload.
    pub codec_config: bool,
    pub end_of_stream: bool,
}

impl EncodedSample {
    /// Muxable payload length. Codec-config-only buffers carry no timestamped
    /// sample data and count as zero-length.
    pub fn payload_len(&self) -> usize {
        if self.codec_config {
            0
        } else {
            self.data.len()
        }
    }
}

/// Negotiated output format emitted by the encoder once it has processed at
/// least one frame. Required by the container before it accepts samples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackDescriptor {
    pub mime_type: String,
    pub width: u32,
    pub height: u32,
    /// Codec-specific data blocks (e.g. SPS and PPS for H.264), in the order
    /// the container expects them (csd-0, csd-1, ...).
    pub csd: Vec<Vec<u8>>,
}

/// Handle for a track registered with the container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TrackId(pub i32);

/// One event dequeued from the encoder's output side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrainEvent {
    /// The output format is now negotiated. At most once per session, always
    /// before the first payload-carrying sample.
    FormatChanged(TrackDescriptor),
    Sample(EncodedSample),
    /// No output ready within the dequeue timeout. Retry later; not an error.
    WouldBlock,
}
