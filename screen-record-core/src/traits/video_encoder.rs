use std::time::Duration;

use crate::models::config::EncoderSettings;
use crate::models::error::RecordError;
use crate::models::sample::DrainEvent;

/// Interface for platform video encoders with surface input.
///
/// Implemented by:
/// - `NdkVideoEncoder` (Android, `AMediaCodec`)
/// - Scripted mocks in the core's tests
///
/// The encoder is a black box: frames enter through the rendering-target
/// surface written by the platform compositor, encoded access units leave
/// through `dequeue_output`. The core never touches pixel data.
pub trait VideoEncoder: Send {
    /// Opaque rendering-target handle. The platform compositor writes frames
    /// into it; the core only passes it outward.
    type Surface: Clone + Send;

    /// Whether a suitable encoder exists for the configured codec.
    fn is_available(&self) -> bool;

    /// Configure the encoder and allocate its input surface.
    ///
    /// Must be called exactly once, before `start`.
    fn configure(&mut self, settings: &EncoderSettings) -> Result<Self::Surface, RecordError>;

    /// Begin accepting frames through the input surface.
    fn start(&mut self) -> Result<(), RecordError>;

    /// Dequeue the next output event, blocking at most `timeout`.
    fn dequeue_output(&mut self, timeout: Duration) -> Result<DrainEvent, RecordError>;

    /// Return an output buffer to the encoder's pool.
    ///
    /// Mandatory for every dequeued sample, written or not; withholding
    /// buffers starves the encoder.
    fn release_buffer(&mut self, buffer_id: u64) -> Result<(), RecordError>;

    /// Declare that no further input frames will arrive. The encoder flushes
    /// and eventually emits a sample flagged end-of-stream.
    fn signal_end_of_stream(&mut self) -> Result<(), RecordError>;

    /// Stop encoding.
    fn stop(&mut self) -> Result<(), RecordError>;

    /// Release the encoder and its input surface.
    fn release(&mut self);
}
