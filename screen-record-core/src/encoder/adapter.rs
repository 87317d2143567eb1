use std::time::Duration;

use crate::models::config::EncoderSettings;
use crate::models::error::RecordError;
use crate::models::sample::DrainEvent;
use crate::traits::video_encoder::VideoEncoder;

/// Encoder lifecycle phase tracked by the adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Created,
    Configured,
    Running,
    Stopped,
    Released,
}

/// Wraps a platform [`VideoEncoder`] as a producer of drain events, enforcing
/// the encoder's lifecycle contract:
///
/// - `configure` exactly once, before `start`
/// - `drain_output` only while running
/// - `stop`/`release` only after end-of-stream was observed, or after an
///   explicit [`abort`](Self::abort) — otherwise [`RecordError::PrematureRelease`]
pub struct EncoderAdapter<E: VideoEncoder> {
    encoder: E,
    phase: Phase,
    eos_signaled: bool,
    eos_seen: bool,
    aborted: bool,
    format_reported: bool,
}

impl<E: VideoEncoder> EncoderAdapter<E> {
    pub fn new(encoder: E) -> Self {
        Self {
            encoder,
            phase: Phase::Created,
            eos_signaled: false,
            eos_seen: false,
            aborted: false,
            format_reported: false,
        }
    }

    /// Configure the encoder and obtain the rendering-target handle.
    ///
    /// The handle must be obtained here, after configuration and before
    /// `start`; the platform compositor attaches to it from outside.
    pub fn configure(&mut self, settings: &EncoderSettings) -> Result<E::Surface, RecordError> {
        if self.phase != Phase::Created {
            return Err(RecordError::EncoderState("configure called twice".into()));
        }
        settings.validate().map_err(RecordError::ConfigurationFailed)?;
        if !self.encoder.is_available() {
            return Err(RecordError::EncoderUnavailable(format!(
                "no encoder for {}",
                settings.mime_type
            )));
        }

        let surface = self.encoder.configure(settings)?;
        self.phase = Phase::Configured;
        Ok(surface)
    }

    pub fn start(&mut self) -> Result<(), RecordError> {
        if self.phase != Phase::Configured {
            return Err(RecordError::EncoderState("start called before configure".into()));
        }
        self.encoder.start()?;
        self.phase = Phase::Running;
        Ok(())
    }

    /// Drain all currently ready output events, one bounded batch per call.
    ///
    /// The batch ends at the first `WouldBlock` (excluded) or after an
    /// end-of-stream sample (included). A repeated format change from the
    /// encoder is dropped here; it may be reported at most once per session.
    pub fn drain_output(&mut self, timeout: Duration) -> Result<Vec<DrainEvent>, RecordError> {
        if self.phase != Phase::Running {
            return Err(RecordError::EncoderState("drain on a non-running encoder".into()));
        }

        let mut events = Vec::new();
        loop {
            match self.encoder.dequeue_output(timeout)? {
                DrainEvent::WouldBlock => {
                    log::debug!("encoder output would block");
                    break;
                }
                DrainEvent::FormatChanged(descriptor) => {
                    if self.format_reported {
                        log::warn!("encoder reported a second format change, dropping it");
                        continue;
                    }
                    self.format_reported = true;
                    events.push(DrainEvent::FormatChanged(descriptor));
                }
                DrainEvent::Sample(sample) => {
                    let end_of_stream = sample.end_of_stream;
                    events.push(DrainEvent::Sample(sample));
                    if end_of_stream {
                        log::debug!("encoder reached end of stream");
                        self.eos_seen = true;
                        break;
                    }
                }
            }
        }
        Ok(events)
    }

    /// Return a dequeued buffer to the encoder's pool.
    pub fn release_buffer(&mut self, buffer_id: u64) -> Result<(), RecordError> {
        self.encoder.release_buffer(buffer_id)
    }

    /// Declare end of input. Idempotent; the first call reaches the encoder.
    pub fn signal_end_of_stream(&mut self) -> Result<(), RecordError> {
        if self.phase != Phase::Running {
            return Err(RecordError::EncoderState(
                "end of stream signaled on a non-running encoder".into(),
            ));
        }
        if !self.eos_signaled {
            self.encoder.signal_end_of_stream()?;
            self.eos_signaled = true;
        }
        Ok(())
    }

    pub fn end_of_stream_seen(&self) -> bool {
        self.eos_seen
    }

    /// Mark the session as aborted early, permitting `stop`/`release` before
    /// end of stream was observed.
    pub fn abort(&mut self) {
        self.aborted = true;
    }

    pub fn stop(&mut self) -> Result<(), RecordError> {
        match self.phase {
            // Nothing was ever configured; there is nothing to stop.
            Phase::Created => Ok(()),
            Phase::Stopped | Phase::Released => Ok(()),
            Phase::Running if !self.eos_seen && !self.aborted => Err(RecordError::PrematureRelease),
            _ => {
                self.encoder.stop()?;
                self.phase = Phase::Stopped;
                Ok(())
            }
        }
    }

    /// Release the encoder and its input surface.
    pub fn release(&mut self) -> Result<(), RecordError> {
        match self.phase {
            Phase::Released => Ok(()),
            Phase::Running if !self.eos_seen && !self.aborted => Err(RecordError::PrematureRelease),
            _ => {
                self.encoder.release();
                self.phase = Phase::Released;
                Ok(())
            }
        }
    }
}
