use std::fs;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::models::error::RecordError;
use crate::models::sample::{EncodedSample, TrackDescriptor, TrackId};
use crate::traits::media_muxer::MediaMuxer;

/// Wraps a platform [`MediaMuxer`] bound to a destination file, enforcing the
/// container's usage contract:
///
/// - exactly one track registration per session ([`RecordError::DuplicateTrack`])
/// - registration before writing begins ([`RecordError::MuxerState`])
/// - non-decreasing presentation timestamps ([`RecordError::OutOfOrderSample`])
/// - finalize before release; finalize without writing is [`RecordError::NotStarted`]
///
/// Zero-payload samples are no-ops, not errors; codec-config-only buffers
/// count as zero-payload.
pub struct ContainerWriter<M: MediaMuxer> {
    muxer: M,
    track: Option<TrackId>,
    started: bool,
    finalized: bool,
    released: bool,
    last_pts_us: Option<i64>,
    samples_written: u64,
    bytes_written: u64,
}

impl<M: MediaMuxer> ContainerWriter<M> {
    pub fn new(muxer: M) -> Self {
        Self {
            muxer,
            track: None,
            started: false,
            finalized: false,
            released: false,
            last_pts_us: None,
            samples_written: 0,
            bytes_written: 0,
        }
    }

    /// Register the session's single track for the negotiated format.
    pub fn register_track(&mut self, descriptor: &TrackDescriptor) -> Result<TrackId, RecordError> {
        if self.track.is_some() {
            return Err(RecordError::DuplicateTrack);
        }
        let track = self.muxer.add_track(descriptor)?;
        self.track = Some(track);
        Ok(track)
    }

    /// Open the container for sample writing.
    pub fn begin_writing(&mut self) -> Result<(), RecordError> {
        if self.track.is_none() {
            return Err(RecordError::MuxerState("no track registered".into()));
        }
        if self.started {
            return Err(RecordError::MuxerState("writing already started".into()));
        }
        self.muxer.start()?;
        self.started = true;
        Ok(())
    }

    /// Append one access unit. Returns the number of payload bytes written;
    /// zero for codec-config-only and empty samples.
    pub fn write_sample(&mut self, sample: &EncodedSample) -> Result<usize, RecordError> {
        if !self.started {
            return Err(RecordError::MuxerState("write before begin_writing".into()));
        }
        if self.finalized {
            return Err(RecordError::MuxerState("write after finalize".into()));
        }

        let payload = sample.payload_len();
        if payload == 0 {
            return Ok(0);
        }

        if let Some(prev_us) = self.last_pts_us {
            if sample.pts_us < prev_us {
                return Err(RecordError::OutOfOrderSample {
                    prev_us,
                    got_us: sample.pts_us,
                });
            }
        }

        let track = self.track.expect("started implies a registered track");
        self.muxer.write_sample(track, sample)?;
        self.last_pts_us = Some(sample.pts_us);
        self.samples_written += 1;
        self.bytes_written += payload as u64;
        log::debug!("wrote {} bytes at pts {}us", payload, sample.pts_us);
        Ok(payload)
    }

    /// Close the container, flushing index and metadata. A second call is a
    /// safe no-op; finalizing a session that never began writing is
    /// [`RecordError::NotStarted`].
    pub fn finalize(&mut self) -> Result<(), RecordError> {
        if self.finalized {
            return Ok(());
        }
        if !self.started {
            return Err(RecordError::NotStarted);
        }
        self.muxer.stop()?;
        self.finalized = true;
        Ok(())
    }

    /// Release underlying resources. Idempotent.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.muxer.release();
        self.released = true;
    }

    pub fn track_registered(&self) -> bool {
        self.track.is_some()
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub fn samples_written(&self) -> u64 {
        self.samples_written
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn output_path(&self) -> &Path {
        self.muxer.output_path()
    }
}

/// Compute the SHA-256 hex digest of a finalized output file.
pub fn sha256_file(path: &Path) -> Result<String, RecordError> {
    let data = fs::read(path)
        .map_err(|e| RecordError::WriteFailure(format!("failed to read file for checksum: {}", e)))?;
    let digest = Sha256::digest(&data);
    Ok(hex_encode(&digest))
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
