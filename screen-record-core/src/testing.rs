//! Scripted mock encoder and muxer used by the unit tests.

use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::models::config::EncoderSettings;
use crate::models::error::RecordError;
use crate::models::sample::{DrainEvent, EncodedSample, TrackDescriptor, TrackId};
use crate::traits::media_muxer::MediaMuxer;
use crate::traits::video_encoder::VideoEncoder;

/// Stand-in rendering-target handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockSurface;

#[derive(Debug, Default)]
pub struct EncoderCalls {
    pub eos_signals: u32,
    pub released_buffers: Vec<u64>,
    pub stopped: bool,
    pub released: bool,
}

/// Encoder that replays a fixed script of drain events.
///
/// Once the script is exhausted, `dequeue_output` returns `WouldBlock`
/// forever. With [`eos_on_signal`](Self::eos_on_signal), an end-of-stream
/// sample is appended when `signal_end_of_stream` is called, modeling an
/// encoder that flushes promptly.
pub struct MockEncoder {
    script: VecDeque<DrainEvent>,
    available: bool,
    emit_eos_on_signal: bool,
    next_buffer_id: u64,
    calls: Arc<Mutex<EncoderCalls>>,
}

impl MockEncoder {
    pub fn new(script: Vec<DrainEvent>) -> Self {
        Self {
            script: script.into(),
            available: true,
            emit_eos_on_signal: false,
            next_buffer_id: 1000,
            calls: Arc::new(Mutex::new(EncoderCalls::default())),
        }
    }

    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    pub fn eos_on_signal(mut self) -> Self {
        self.emit_eos_on_signal = true;
        self
    }

    pub fn calls(&self) -> Arc<Mutex<EncoderCalls>> {
        Arc::clone(&self.calls)
    }
}

impl VideoEncoder for MockEncoder {
    type Surface = MockSurface;

    fn is_available(&self) -> bool {
        self.available
    }

    fn configure(&mut self, _settings: &EncoderSettings) -> Result<Self::Surface, RecordError> {
        Ok(MockSurface)
    }

    fn start(&mut self) -> Result<(), RecordError> {
        Ok(())
    }

    fn dequeue_output(&mut self, _timeout: Duration) -> Result<DrainEvent, RecordError> {
        Ok(self.script.pop_front().unwrap_or(DrainEvent::WouldBlock))
    }

    fn release_buffer(&mut self, buffer_id: u64) -> Result<(), RecordError> {
        self.calls.lock().released_buffers.push(buffer_id);
        Ok(())
    }

    fn signal_end_of_stream(&mut self) -> Result<(), RecordError> {
        self.calls.lock().eos_signals += 1;
        if self.emit_eos_on_signal {
            let buffer_id = self.next_buffer_id;
            self.next_buffer_id += 1;
            self.script.push_back(DrainEvent::Sample(EncodedSample {
                buffer_id,
                data: Vec::new(),
                pts_us: i64::MAX - 1,
                codec_config: false,
                end_of_stream: true,
            }));
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<(), RecordError> {
        self.calls.lock().stopped = true;
        Ok(())
    }

    fn release(&mut self) {
        self.calls.lock().released = true;
    }
}

#[derive(Debug, Default)]
pub struct MuxerCalls {
    pub add_track_calls: u32,
    pub start_calls: u32,
    /// (pts_us, payload length) per accepted write.
    pub writes: Vec<(i64, usize)>,
    pub stop_calls: u32,
    pub released: bool,
}

/// Muxer that records calls and appends raw payload bytes to a real file, so
/// finalized sessions have something on disk to checksum.
pub struct MockMuxer {
    path: PathBuf,
    file: Option<File>,
    fail_write_at: Option<usize>,
    calls: Arc<Mutex<MuxerCalls>>,
}

impl MockMuxer {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            file: None,
            fail_write_at: None,
            calls: Arc::new(Mutex::new(MuxerCalls::default())),
        }
    }

    /// Fail the write with the given zero-based index.
    pub fn fail_write_at(mut self, index: usize) -> Self {
        self.fail_write_at = Some(index);
        self
    }

    pub fn calls(&self) -> Arc<Mutex<MuxerCalls>> {
        Arc::clone(&self.calls)
    }
}

impl MediaMuxer for MockMuxer {
    fn add_track(&mut self, _descriptor: &TrackDescriptor) -> Result<TrackId, RecordError> {
        let mut calls = self.calls.lock();
        calls.add_track_calls += 1;
        Ok(TrackId(0))
    }

    fn start(&mut self) -> Result<(), RecordError> {
        self.calls.lock().start_calls += 1;
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.path)
            .map_err(|e| RecordError::WriteFailure(e.to_string()))?;
        self.file = Some(file);
        Ok(())
    }

    fn write_sample(&mut self, _track: TrackId, sample: &EncodedSample) -> Result<(), RecordError> {
        let write_index = self.calls.lock().writes.len();
        if self.fail_write_at == Some(write_index) {
            return Err(RecordError::WriteFailure("scripted write failure".into()));
        }
        if let Some(ref mut file) = self.file {
            file.write_all(&sample.data)
                .map_err(|e| RecordError::WriteFailure(e.to_string()))?;
        }
        self.calls.lock().writes.push((sample.pts_us, sample.data.len()));
        Ok(())
    }

    fn stop(&mut self) -> Result<(), RecordError> {
        self.calls.lock().stop_calls += 1;
        if let Some(mut file) = self.file.take() {
            file.flush().map_err(|e| RecordError::WriteFailure(e.to_string()))?;
        }
        Ok(())
    }

    fn release(&mut self) {
        self.calls.lock().released = true;
        self.file = None;
    }

    fn output_path(&self) -> &Path {
        &self.path
    }
}

/// Unique-ish temp file path for a test.
pub fn temp_file_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("screen_record_test_{}_{}", std::process::id(), name))
}
