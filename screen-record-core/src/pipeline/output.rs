use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::encoder::EncoderAdapter;
use crate::models::config::RecordConfiguration;
use crate::models::diagnostics::PipelineDiagnostics;
use crate::models::error::RecordError;
use crate::models::recording_result::{RecordingMetadata, RecordingResult};
use crate::models::sample::{DrainEvent, EncodedSample};
use crate::models::session::PermissionToken;
use crate::models::state::PipelineState;
use crate::muxer::metadata;
use crate::muxer::writer::{self, ContainerWriter};
use crate::traits::media_muxer::MediaMuxer;
use crate::traits::record_delegate::RecordDelegate;
use crate::traits::video_encoder::VideoEncoder;

/// Mutable session state, protected by `parking_lot::Mutex`.
///
/// Both the drain worker and `stop()` mutate the writer through this single
/// lock, so sample writes are serialized (single-writer discipline).
struct PipelineInner<E: VideoEncoder, M: MediaMuxer> {
    state: PipelineState,
    encoder: EncoderAdapter<E>,
    writer: ContainerWriter<M>,
    diagnostics: PipelineDiagnostics,
    failure: Option<RecordError>,
    first_pts_us: Option<i64>,
    last_pts_us: Option<i64>,
    width: u32,
    height: u32,
}

/// The encode-and-mux pipeline.
///
/// Owns an encoder adapter and a container writer and relays encoded access
/// units from one to the other:
///
/// ```text
/// [compositor] → surface → [EncoderAdapter] → access units → [ContainerWriter] → file
/// ```
///
/// Lifecycle per [`PipelineState`]: `start(width, height)` configures the
/// encoder, hands the rendering-target surface outward, and spawns the drain
/// worker; `stop()` signals end of stream, performs a bounded final drain,
/// finalizes the container, and releases both resources in dependency order.
/// A pipeline records exactly one session.
pub struct OutputPipeline<E: VideoEncoder, M: MediaMuxer> {
    config: RecordConfiguration,
    permission: PermissionToken,
    delegate: Option<Arc<dyn RecordDelegate>>,
    resources: Option<(E, M)>,
    inner: Option<Arc<Mutex<PipelineInner<E, M>>>>,
    running: Arc<AtomicBool>,
    drain_handle: Option<thread::JoinHandle<()>>,
    result: Option<RecordingResult>,
}

impl<E, M> OutputPipeline<E, M>
where
    E: VideoEncoder + 'static,
    M: MediaMuxer + 'static,
{
    /// Create a pipeline from a platform encoder and a muxer bound to the
    /// destination file. The permission token was obtained by the platform
    /// layer; the pipeline holds it for the backend to consume.
    pub fn new(
        encoder: E,
        muxer: M,
        permission: PermissionToken,
        config: RecordConfiguration,
    ) -> Result<Self, RecordError> {
        config.validate().map_err(RecordError::ConfigurationFailed)?;
        Ok(Self {
            config,
            permission,
            delegate: None,
            resources: Some((encoder, muxer)),
            inner: None,
            running: Arc::new(AtomicBool::new(false)),
            drain_handle: None,
            result: None,
        })
    }

    pub fn set_delegate(&mut self, delegate: Arc<dyn RecordDelegate>) {
        self.delegate = Some(delegate);
    }

    pub fn state(&self) -> PipelineState {
        match self.inner {
            Some(ref inner) => inner.lock().state,
            None => PipelineState::Idle,
        }
    }

    /// Whether a session is in flight.
    pub fn is_active(&self) -> bool {
        self.state().is_active()
    }

    pub fn diagnostics(&self) -> PipelineDiagnostics {
        self.inner
            .as_ref()
            .map(|inner| inner.lock().diagnostics)
            .unwrap_or_default()
    }

    /// The error that aborted the session, if any.
    pub fn last_error(&self) -> Option<RecordError> {
        self.inner.as_ref().and_then(|inner| inner.lock().failure.clone())
    }

    pub fn permission_token(&self) -> &PermissionToken {
        &self.permission
    }

    /// Start a session at the given frame size.
    ///
    /// Transitions: idle → configuring → draining. Returns the encoder's
    /// rendering-target surface for the caller to attach to the platform
    /// compositor. Acquisition is all-or-nothing: on any failure both
    /// resources are released and the pipeline ends up stopped.
    pub fn start(&mut self, width: u32, height: u32) -> Result<E::Surface, RecordError> {
        if self.inner.is_some() {
            return Err(RecordError::ConfigurationFailed("pipeline already started".into()));
        }
        let (encoder, muxer) = match self.resources.take() {
            Some(pair) => pair,
            None => return Err(RecordError::ConfigurationFailed("pipeline already consumed".into())),
        };

        self.notify_state(PipelineState::Configuring);

        let mut adapter = EncoderAdapter::new(encoder);
        let mut container = ContainerWriter::new(muxer);
        let settings = self.config.encoder_settings(width, height);

        let configured = adapter
            .configure(&settings)
            .and_then(|surface| adapter.start().map(|_| surface));
        let surface = match configured {
            Ok(surface) => surface,
            Err(error) => {
                adapter.abort();
                let _ = adapter.stop();
                let _ = adapter.release();
                container.release();
                let inner = PipelineInner {
                    state: PipelineState::Stopped,
                    encoder: adapter,
                    writer: container,
                    diagnostics: PipelineDiagnostics::default(),
                    failure: Some(error.clone()),
                    first_pts_us: None,
                    last_pts_us: None,
                    width,
                    height,
                };
                self.inner = Some(Arc::new(Mutex::new(inner)));
                self.notify_state(PipelineState::Stopped);
                self.notify_error(&error);
                return Err(error);
            }
        };

        let inner = Arc::new(Mutex::new(PipelineInner {
            state: PipelineState::Draining,
            encoder: adapter,
            writer: container,
            diagnostics: PipelineDiagnostics::default(),
            failure: None,
            first_pts_us: None,
            last_pts_us: None,
            width,
            height,
        }));
        self.inner = Some(Arc::clone(&inner));
        self.notify_state(PipelineState::Draining);

        self.running.store(true, Ordering::SeqCst);
        let running = Arc::clone(&self.running);
        let delegate = self.delegate.clone();
        let dequeue_timeout = self.config.dequeue_timeout;
        let poll_interval = self.config.poll_interval;

        let handle = thread::Builder::new()
            .name("encode-drain".into())
            .spawn(move || {
                // Re-arm only while still draining, never after stop or a
                // terminal transition.
                while running.load(Ordering::SeqCst) {
                    if !Self::drain_cycle(&inner, &delegate, dequeue_timeout) {
                        break;
                    }
                    thread::sleep(poll_interval);
                }
            })
            .expect("failed to spawn drain thread");
        self.drain_handle = Some(handle);

        Ok(surface)
    }

    /// Stop the session, finalize the container, release resources.
    ///
    /// Signals end of stream if the encoder is still draining, then performs
    /// a final bounded drain. If the encoder does not reach end of stream
    /// within the grace period, cleanup is forced and
    /// [`RecordError::Timeout`] is returned. Calling `stop` on a pipeline
    /// that is already stopped (or was never started) is a safe no-op.
    pub fn stop(&mut self) -> Result<Option<RecordingResult>, RecordError> {
        let inner = match self.inner {
            Some(ref inner) => Arc::clone(inner),
            None => return Ok(None),
        };

        // Stop the worker before touching resources so no drain cycle can
        // run after release.
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.drain_handle.take() {
            let _ = handle.join();
        }

        let mut notifications = Vec::new();
        let outcome = {
            let mut guard = inner.lock();
            if guard.state == PipelineState::Stopped {
                return Ok(self.result.clone());
            }

            if guard.state == PipelineState::Draining {
                guard.state = PipelineState::Stopping;
                notifications.push(PipelineState::Stopping);
                if let Err(error) = guard.encoder.signal_end_of_stream() {
                    log::warn!("end-of-stream signal failed: {}", error);
                }
            }

            // Final bounded drain: flush whatever the encoder still holds.
            let deadline = Instant::now() + self.config.stop_grace_period;
            let mut timed_out = false;
            let mut drain_failure = None;
            while !guard.encoder.end_of_stream_seen() {
                match guard.encoder.drain_output(self.config.dequeue_timeout) {
                    Ok(events) => {
                        if let Err(error) = Self::process_events(&mut guard, events) {
                            drain_failure = Some(error);
                            break;
                        }
                    }
                    Err(error) => {
                        drain_failure = Some(error);
                        break;
                    }
                }
                if Instant::now() >= deadline {
                    log::warn!("encoder did not reach end of stream, forcing release");
                    timed_out = true;
                    break;
                }
                thread::sleep(self.config.dequeue_timeout);
            }

            // Finalize, then release writer before encoder.
            let track_registered = guard.writer.track_registered();
            let mut finalize_failure = None;
            if !track_registered {
                log::warn!("no track registered; container left unfinalized");
            } else if let Err(error) = guard.writer.finalize() {
                log::error!("container finalize failed: {}", error);
                finalize_failure = Some(error);
            }
            guard.writer.release();
            if !guard.encoder.end_of_stream_seen() {
                guard.encoder.abort();
            }
            if let Err(error) = guard.encoder.stop() {
                log::warn!("encoder stop failed: {}", error);
            }
            if let Err(error) = guard.encoder.release() {
                log::warn!("encoder release failed: {}", error);
            }
            guard.state = PipelineState::Stopped;
            notifications.push(PipelineState::Stopped);

            if timed_out {
                guard.failure = Some(RecordError::Timeout);
                Err(RecordError::Timeout)
            } else if let Some(error) = drain_failure.or(finalize_failure) {
                guard.failure = Some(error.clone());
                Err(error)
            } else if !track_registered {
                guard.failure = Some(RecordError::NotStarted);
                Err(RecordError::NotStarted)
            } else {
                let path = guard.writer.output_path().to_path_buf();
                match writer::sha256_file(&path) {
                    Err(error) => {
                        guard.failure = Some(error.clone());
                        Err(error)
                    }
                    Ok(checksum) => {
                        let duration_secs = match (guard.first_pts_us, guard.last_pts_us) {
                            (Some(first), Some(last)) if last > first => {
                                (last - first) as f64 / 1_000_000.0
                            }
                            _ => 0.0,
                        };
                        let metadata = RecordingMetadata::new(
                            duration_secs,
                            &path.to_string_lossy(),
                            &checksum,
                            &self.config.mime_type,
                            guard.width,
                            guard.height,
                        );
                        // Sidecar failure does not invalidate the recording.
                        if let Err(error) = metadata::write_metadata(&metadata, &path) {
                            log::warn!("metadata sidecar write failed: {}", error);
                        }
                        Ok(Some(RecordingResult {
                            file_path: path,
                            duration_secs,
                            samples_written: guard.writer.samples_written(),
                            bytes_written: guard.writer.bytes_written(),
                            checksum,
                            metadata,
                        }))
                    }
                }
            }
        };

        for state in notifications {
            self.notify_state(state);
        }
        match &outcome {
            Ok(Some(result)) => {
                self.result = Some(result.clone());
                if let Some(ref delegate) = self.delegate {
                    delegate.on_recording_finished(result);
                }
            }
            Ok(None) => {}
            Err(error) => self.notify_error(error),
        }
        outcome
    }

    // --- Internal helpers ---

    fn notify_state(&self, state: PipelineState) {
        if let Some(ref delegate) = self.delegate {
            delegate.on_state_changed(state);
        }
    }

    fn notify_error(&self, error: &RecordError) {
        if let Some(ref delegate) = self.delegate {
            delegate.on_error(error);
        }
    }

    /// One drain cycle on the worker thread. Returns whether the worker
    /// should schedule another cycle.
    fn drain_cycle(
        inner: &Mutex<PipelineInner<E, M>>,
        delegate: &Option<Arc<dyn RecordDelegate>>,
        dequeue_timeout: Duration,
    ) -> bool {
        let mut notifications = Vec::new();
        let mut reported_error = None;

        let keep_polling = {
            let mut guard = inner.lock();
            if guard.state != PipelineState::Draining {
                false
            } else {
                guard.diagnostics.drain_cycles += 1;
                match guard.encoder.drain_output(dequeue_timeout) {
                    Err(error) => {
                        Self::abort_session(&mut guard, error, &mut notifications, &mut reported_error);
                        false
                    }
                    Ok(events) if events.is_empty() => {
                        guard.diagnostics.would_block_polls += 1;
                        true
                    }
                    Ok(events) => match Self::process_events(&mut guard, events) {
                        Err(error) => {
                            Self::abort_session(&mut guard, error, &mut notifications, &mut reported_error);
                            false
                        }
                        Ok(()) => {
                            if guard.encoder.end_of_stream_seen() {
                                guard.state = PipelineState::Stopping;
                                notifications.push(PipelineState::Stopping);
                                false
                            } else {
                                true
                            }
                        }
                    },
                }
            }
        };

        if let Some(delegate) = delegate {
            for state in notifications {
                delegate.on_state_changed(state);
            }
            if let Some(error) = reported_error {
                delegate.on_error(&error);
            }
        }
        keep_polling
    }

    /// Relay a batch of drain events into the container. Buffer release is
    /// mandatory for every sample, written or not.
    fn process_events(
        guard: &mut PipelineInner<E, M>,
        events: Vec<DrainEvent>,
    ) -> Result<(), RecordError> {
        for event in events {
            match event {
                DrainEvent::FormatChanged(descriptor) => {
                    if guard.writer.track_registered() {
                        log::warn!("format change after track registration, ignoring");
                        continue;
                    }
                    guard.writer.register_track(&descriptor)?;
                    guard.writer.begin_writing()?;
                }
                DrainEvent::Sample(sample) => {
                    let written = Self::relay_sample(guard, &sample);
                    match guard.encoder.release_buffer(sample.buffer_id) {
                        Ok(()) => guard.diagnostics.buffers_released += 1,
                        Err(error) => log::warn!("buffer release failed: {}", error),
                    }
                    written?;
                }
                // Batches end at WouldBlock inside the adapter; it never
                // appears as an event.
                DrainEvent::WouldBlock => {}
            }
        }
        Ok(())
    }

    fn relay_sample(
        guard: &mut PipelineInner<E, M>,
        sample: &EncodedSample,
    ) -> Result<(), RecordError> {
        let payload = sample.payload_len();
        if payload == 0 {
            if sample.codec_config {
                guard.diagnostics.config_buffers_skipped += 1;
            }
            return Ok(());
        }

        guard.writer.write_sample(sample)?;
        guard.diagnostics.samples_written += 1;
        guard.diagnostics.bytes_written += payload as u64;
        if guard.first_pts_us.is_none() {
            guard.first_pts_us = Some(sample.pts_us);
        }
        guard.last_pts_us = Some(sample.pts_us);
        Ok(())
    }

    /// Abort the session from the drain worker: Stopping → Stopped with
    /// best-effort finalize. The partially written file is preserved.
    fn abort_session(
        guard: &mut PipelineInner<E, M>,
        error: RecordError,
        notifications: &mut Vec<PipelineState>,
        reported_error: &mut Option<RecordError>,
    ) {
        log::error!("drain failed, aborting session: {}", error);
        guard.state = PipelineState::Stopping;
        notifications.push(PipelineState::Stopping);

        if guard.writer.track_registered() {
            if let Err(e) = guard.writer.finalize() {
                log::warn!("best-effort finalize failed: {}", e);
            }
        }
        guard.writer.release();
        guard.encoder.abort();
        if let Err(e) = guard.encoder.stop() {
            log::warn!("encoder stop failed: {}", e);
        }
        if let Err(e) = guard.encoder.release() {
            log::warn!("encoder release failed: {}", e);
        }

        guard.failure = Some(error.clone());
        guard.state = PipelineState::Stopped;
        notifications.push(PipelineState::Stopped);
        *reported_error = Some(error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;

    use crate::models::sample::TrackDescriptor;
    use crate::testing::{temp_file_path, MockEncoder, MockMuxer};

    struct RecordingDelegate {
        states: Mutex<Vec<PipelineState>>,
        errors: Mutex<Vec<RecordError>>,
        finished: Mutex<Vec<RecordingResult>>,
    }

    impl RecordingDelegate {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                states: Mutex::new(Vec::new()),
                errors: Mutex::new(Vec::new()),
                finished: Mutex::new(Vec::new()),
            })
        }
    }

    impl RecordDelegate for RecordingDelegate {
        fn on_state_changed(&self, state: PipelineState) {
            self.states.lock().push(state);
        }

        fn on_error(&self, error: &RecordError) {
            self.errors.lock().push(error.clone());
        }

        fn on_recording_finished(&self, result: &RecordingResult) {
            self.finished.lock().push(result.clone());
        }
    }

    fn fast_config(path: PathBuf) -> RecordConfiguration {
        RecordConfiguration {
            output_path: path,
            dequeue_timeout: Duration::from_millis(1),
            poll_interval: Duration::from_millis(2),
            stop_grace_period: Duration::from_millis(100),
            ..Default::default()
        }
    }

    fn descriptor() -> TrackDescriptor {
        TrackDescriptor {
            mime_type: "video/avc".into(),
            width: 320,
            height: 240,
            csd: vec![vec![0x67], vec![0x68]],
        }
    }

    fn payload(buffer_id: u64, len: usize, pts_us: i64) -> DrainEvent {
        DrainEvent::Sample(EncodedSample {
            buffer_id,
            data: vec![0x5A; len],
            pts_us,
            codec_config: false,
            end_of_stream: false,
        })
    }

    fn config_only(buffer_id: u64, len: usize) -> DrainEvent {
        DrainEvent::Sample(EncodedSample {
            buffer_id,
            data: vec![0x5A; len],
            pts_us: 0,
            codec_config: true,
            end_of_stream: false,
        })
    }

    fn eos(buffer_id: u64) -> DrainEvent {
        DrainEvent::Sample(EncodedSample {
            buffer_id,
            data: Vec::new(),
            pts_us: 0,
            codec_config: false,
            end_of_stream: true,
        })
    }

    fn wait_for_state(
        pipeline: &OutputPipeline<MockEncoder, MockMuxer>,
        target: PipelineState,
    ) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while pipeline.state() != target {
            assert!(Instant::now() < deadline, "timed out waiting for {:?}", target);
            thread::sleep(Duration::from_millis(2));
        }
    }

    fn token() -> PermissionToken {
        PermissionToken::new(*b"granted")
    }

    #[test]
    fn full_session_writes_payload_samples_only() {
        // Scenario: format change, then samples of 40 bytes, config-only,
        // 120 bytes, then end of stream.
        let path = temp_file_path("full_session.mp4");
        let encoder = MockEncoder::new(vec![
            DrainEvent::FormatChanged(descriptor()),
            payload(1, 40, 0),
            config_only(2, 64),
            payload(3, 120, 66_666),
            eos(4),
        ]);
        let encoder_calls = encoder.calls();
        let muxer = MockMuxer::new(path.clone());
        let muxer_calls = muxer.calls();
        let delegate = RecordingDelegate::new();

        let mut pipeline =
            OutputPipeline::new(encoder, muxer, token(), fast_config(path.clone())).unwrap();
        pipeline.set_delegate(delegate.clone());

        pipeline.start(320, 240).unwrap();
        wait_for_state(&pipeline, PipelineState::Stopping);

        let result = pipeline.stop().unwrap().expect("session produced a recording");
        assert_eq!(pipeline.state(), PipelineState::Stopped);
        assert!(!pipeline.is_active());

        // Exactly 2 writes, 1 track registration, 1 finalize.
        let calls = muxer_calls.lock();
        assert_eq!(calls.add_track_calls, 1);
        assert_eq!(calls.start_calls, 1);
        assert_eq!(calls.writes, vec![(0, 40), (66_666, 120)]);
        assert_eq!(calls.stop_calls, 1);
        assert!(calls.released);
        drop(calls);

        // Every dequeued buffer went back to the encoder, config-only and
        // end-of-stream included.
        let calls = encoder_calls.lock();
        assert_eq!(calls.released_buffers, vec![1, 2, 3, 4]);
        assert!(calls.stopped);
        assert!(calls.released);
        drop(calls);

        assert_eq!(result.samples_written, 2);
        assert_eq!(result.bytes_written, 160);
        assert_eq!(result.checksum.len(), 64);
        assert!((result.duration_secs - 0.066_666).abs() < 1e-6);

        let diagnostics = pipeline.diagnostics();
        assert_eq!(diagnostics.config_buffers_skipped, 1);
        assert_eq!(diagnostics.buffers_released, 4);

        assert_eq!(
            *delegate.states.lock(),
            vec![
                PipelineState::Configuring,
                PipelineState::Draining,
                PipelineState::Stopping,
                PipelineState::Stopped,
            ]
        );
        assert_eq!(delegate.finished.lock().len(), 1);
        assert!(delegate.errors.lock().is_empty());

        // Metadata sidecar lands next to the recording.
        let sidecar = metadata::read_metadata(&path).unwrap();
        assert_eq!(sidecar, result.metadata);

        // Repeated stop is a no-op returning the same result.
        assert_eq!(pipeline.stop(), Ok(Some(result)));
        std::fs::remove_file(&path).ok();
        std::fs::remove_file(path.with_extension("metadata.json")).ok();
    }

    #[test]
    fn stop_before_first_output_reports_failed_session() {
        // No format ever negotiated: the container must not be finalized
        // empty, and stopping must not crash.
        let path = temp_file_path("early_stop.mp4");
        let encoder = MockEncoder::new(vec![]).eos_on_signal();
        let encoder_calls = encoder.calls();
        let muxer = MockMuxer::new(path.clone());
        let muxer_calls = muxer.calls();

        let mut pipeline =
            OutputPipeline::new(encoder, muxer, token(), fast_config(path.clone())).unwrap();
        pipeline.start(320, 240).unwrap();

        assert_eq!(pipeline.stop(), Err(RecordError::NotStarted));
        assert_eq!(pipeline.state(), PipelineState::Stopped);

        let calls = muxer_calls.lock();
        assert_eq!(calls.add_track_calls, 0);
        assert!(calls.writes.is_empty());
        assert_eq!(calls.stop_calls, 0);
        assert!(calls.released);
        drop(calls);
        assert!(encoder_calls.lock().released);

        // Stopping again stays a no-op.
        assert_eq!(pipeline.stop(), Ok(None));
    }

    #[test]
    fn encoder_that_never_flushes_times_out() {
        // Scenario: signal_end_of_stream is swallowed, end of stream never
        // arrives; stop must force cleanup within the grace period.
        let path = temp_file_path("grace_timeout.mp4");
        let encoder = MockEncoder::new(vec![]);
        let encoder_calls = encoder.calls();
        let muxer = MockMuxer::new(path.clone());
        let muxer_calls = muxer.calls();

        let mut pipeline =
            OutputPipeline::new(encoder, muxer, token(), fast_config(path.clone())).unwrap();
        pipeline.start(320, 240).unwrap();

        let started = Instant::now();
        assert_eq!(pipeline.stop(), Err(RecordError::Timeout));
        assert!(started.elapsed() < Duration::from_secs(2));

        assert_eq!(pipeline.state(), PipelineState::Stopped);
        assert_eq!(pipeline.last_error(), Some(RecordError::Timeout));
        assert!(encoder_calls.lock().released);
        assert!(muxer_calls.lock().released);
    }

    #[test]
    fn would_block_polls_do_not_change_state() {
        let path = temp_file_path("would_block.mp4");
        let encoder = MockEncoder::new(vec![]).eos_on_signal();
        let muxer = MockMuxer::new(path.clone());
        let muxer_calls = muxer.calls();

        let mut pipeline =
            OutputPipeline::new(encoder, muxer, token(), fast_config(path.clone())).unwrap();
        pipeline.start(320, 240).unwrap();

        thread::sleep(Duration::from_millis(40));

        assert_eq!(pipeline.state(), PipelineState::Draining);
        let diagnostics = pipeline.diagnostics();
        assert!(diagnostics.would_block_polls >= 2);
        assert_eq!(diagnostics.samples_written, 0);
        assert!(muxer_calls.lock().writes.is_empty());

        let _ = pipeline.stop();
    }

    #[test]
    fn write_failure_aborts_and_preserves_partial_file() {
        let path = temp_file_path("write_failure.mp4");
        let encoder = MockEncoder::new(vec![
            DrainEvent::FormatChanged(descriptor()),
            payload(1, 40, 0),
            payload(2, 120, 66_666),
            eos(3),
        ]);
        let muxer = MockMuxer::new(path.clone()).fail_write_at(1);
        let muxer_calls = muxer.calls();
        let delegate = RecordingDelegate::new();

        let mut pipeline =
            OutputPipeline::new(encoder, muxer, token(), fast_config(path.clone())).unwrap();
        pipeline.set_delegate(delegate.clone());
        pipeline.start(320, 240).unwrap();

        wait_for_state(&pipeline, PipelineState::Stopped);
        assert!(matches!(
            pipeline.last_error(),
            Some(RecordError::WriteFailure(_))
        ));

        // First sample landed before the failure; the file stays on disk.
        assert_eq!(muxer_calls.lock().writes, vec![(0, 40)]);
        assert!(muxer_calls.lock().released);
        assert!(path.exists());
        assert_eq!(delegate.errors.lock().len(), 1);

        // stop() after an abort is a no-op with no result.
        assert_eq!(pipeline.stop(), Ok(None));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn out_of_order_samples_abort_the_session() {
        let path = temp_file_path("out_of_order_abort.mp4");
        let encoder = MockEncoder::new(vec![
            DrainEvent::FormatChanged(descriptor()),
            payload(1, 40, 1000),
            payload(2, 40, 500),
        ]);
        let muxer = MockMuxer::new(path.clone());

        let mut pipeline =
            OutputPipeline::new(encoder, muxer, token(), fast_config(path.clone())).unwrap();
        pipeline.start(320, 240).unwrap();

        wait_for_state(&pipeline, PipelineState::Stopped);
        assert_eq!(
            pipeline.last_error(),
            Some(RecordError::OutOfOrderSample {
                prev_us: 1000,
                got_us: 500
            })
        );
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn unavailable_encoder_fails_start_and_releases_everything() {
        let path = temp_file_path("unavailable.mp4");
        let encoder = MockEncoder::new(vec![]).unavailable();
        let muxer = MockMuxer::new(path.clone());
        let muxer_calls = muxer.calls();

        let mut pipeline =
            OutputPipeline::new(encoder, muxer, token(), fast_config(path.clone())).unwrap();
        assert!(matches!(
            pipeline.start(320, 240),
            Err(RecordError::EncoderUnavailable(_))
        ));
        assert_eq!(pipeline.state(), PipelineState::Stopped);
        assert!(muxer_calls.lock().released);
        // No file was ever created.
        assert!(!path.exists());
    }

    #[test]
    fn start_twice_is_rejected() {
        let path = temp_file_path("start_twice.mp4");
        let encoder = MockEncoder::new(vec![]).eos_on_signal();
        let muxer = MockMuxer::new(path.clone());

        let mut pipeline =
            OutputPipeline::new(encoder, muxer, token(), fast_config(path.clone())).unwrap();
        pipeline.start(320, 240).unwrap();
        assert!(matches!(
            pipeline.start(320, 240),
            Err(RecordError::ConfigurationFailed(_))
        ));
        let _ = pipeline.stop();
    }

    #[test]
    fn duplicate_format_reports_register_one_track() {
        let path = temp_file_path("duplicate_format.mp4");
        let encoder = MockEncoder::new(vec![
            DrainEvent::FormatChanged(descriptor()),
            DrainEvent::FormatChanged(descriptor()),
            payload(1, 40, 0),
            eos(2),
        ]);
        let muxer = MockMuxer::new(path.clone());
        let muxer_calls = muxer.calls();

        let mut pipeline =
            OutputPipeline::new(encoder, muxer, token(), fast_config(path.clone())).unwrap();
        pipeline.start(320, 240).unwrap();
        wait_for_state(&pipeline, PipelineState::Stopping);
        pipeline.stop().unwrap();

        assert_eq!(muxer_calls.lock().add_track_calls, 1);
        std::fs::remove_file(&path).ok();
        std::fs::remove_file(path.with_extension("metadata.json")).ok();
    }

    #[test]
    fn invalid_configuration_rejected_at_construction() {
        let config = RecordConfiguration {
            bit_rate: 0,
            ..fast_config(temp_file_path("invalid_config.mp4"))
        };
        let result = OutputPipeline::new(
            MockEncoder::new(vec![]),
            MockMuxer::new(temp_file_path("invalid_config.mp4")),
            token(),
            config,
        );
        assert!(matches!(
            result.map(|_| ()),
            Err(RecordError::ConfigurationFailed(_))
        ));
    }
}
