use std::path::Path;

use crate::models::error::RecordError;
use crate::models::sample::{EncodedSample, TrackDescriptor, TrackId};

/// Interface for platform container muxers bound to a destination file.
///
/// Implemented by:
/// - `NdkMediaMuxer` (Android, `AMediaMuxer`, MPEG-4 output)
/// - Scripted mocks in the core's tests
///
/// Usage-order enforcement (register-once, begin-before-write, timestamp
/// ordering) lives in [`ContainerWriter`](crate::muxer::ContainerWriter),
/// not in implementations of this trait.
pub trait MediaMuxer: Send {
    /// Register a track for the negotiated format.
    fn add_track(&mut self, descriptor: &TrackDescriptor) -> Result<TrackId, RecordError>;

    /// Open the container for sample writing.
    fn start(&mut self) -> Result<(), RecordError>;

    /// Append one access unit to the given track.
    fn write_sample(&mut self, track: TrackId, sample: &EncodedSample) -> Result<(), RecordError>;

    /// Close the container, flushing the index and metadata required for the
    /// file to be independently playable.
    fn stop(&mut self) -> Result<(), RecordError>;

    /// Release underlying resources. Must follow `stop`.
    fn release(&mut self);

    /// Destination file this muxer writes to.
    fn output_path(&self) -> &Path;
}
