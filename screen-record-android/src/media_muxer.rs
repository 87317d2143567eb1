//! MPEG-4 container muxer backed by `AMediaMuxer`.
//!
//! `AMediaMuxer` works on a file descriptor; the muxer owns the `File` for
//! the destination path so the descriptor stays valid for the session.

use std::ffi::CString;
use std::fs::File;
use std::os::fd::AsRawFd;
use std::path::{Path, PathBuf};
use std::ptr;

use ndk_sys::{
    AMediaCodecBufferInfo, AMediaFormat_delete, AMediaFormat_new, AMediaFormat_setBuffer,
    AMediaFormat_setInt32, AMediaFormat_setString, AMediaMuxer, AMediaMuxer_addTrack,
    AMediaMuxer_delete, AMediaMuxer_new, AMediaMuxer_start, AMediaMuxer_stop,
    AMediaMuxer_writeSampleData, AMediaMuxer_OutputFormat, AMEDIAFORMAT_KEY_HEIGHT,
    AMEDIAFORMAT_KEY_MIME, AMEDIAFORMAT_KEY_WIDTH,
};

use screen_record_core::models::error::RecordError;
use screen_record_core::models::sample::{EncodedSample, TrackDescriptor, TrackId};
use screen_record_core::traits::media_muxer::MediaMuxer;

const AMEDIA_OK: i32 = 0;
const OUTPUT_FORMAT_MPEG_4: AMediaMuxer_OutputFormat = 0;

/// `AMediaMuxer` bound to a destination MPEG-4 file.
pub struct NdkMediaMuxer {
    muxer: *mut AMediaMuxer,
    // Keeps the descriptor alive for the muxer's lifetime.
    _file: File,
    path: PathBuf,
}

// SAFETY: the muxer handle is only used behind &mut self.
unsafe impl Send for NdkMediaMuxer {}

impl NdkMediaMuxer {
    /// Create the destination file and bind a muxer to it.
    pub fn new(path: &Path) -> Result<Self, RecordError> {
        let file = File::create(path)
            .map_err(|e| RecordError::WriteFailure(format!("failed to create output file: {}", e)))?;

        let muxer = unsafe { AMediaMuxer_new(file.as_raw_fd(), OUTPUT_FORMAT_MPEG_4) };
        if muxer.is_null() {
            return Err(RecordError::MuxerState("AMediaMuxer_new failed".into()));
        }

        Ok(Self {
            muxer,
            _file: file,
            path: path.to_path_buf(),
        })
    }
}

impl Drop for NdkMediaMuxer {
    fn drop(&mut self) {
        if !self.muxer.is_null() {
            unsafe { AMediaMuxer_delete(self.muxer) };
        }
    }
}

impl MediaMuxer for NdkMediaMuxer {
    fn add_track(&mut self, descriptor: &TrackDescriptor) -> Result<TrackId, RecordError> {
        let mime = CString::new(descriptor.mime_type.as_str())
            .map_err(|_| RecordError::MuxerState("mime type contains NUL".into()))?;

        unsafe {
            let format = AMediaFormat_new();
            AMediaFormat_setString(format, AMEDIAFORMAT_KEY_MIME, mime.as_ptr());
            AMediaFormat_setInt32(format, AMEDIAFORMAT_KEY_WIDTH, descriptor.width as i32);
            AMediaFormat_setInt32(format, AMEDIAFORMAT_KEY_HEIGHT, descriptor.height as i32);

            for (i, block) in descriptor.csd.iter().enumerate() {
                let Ok(key) = CString::new(format!("csd-{}", i)) else { break };
                AMediaFormat_setBuffer(
                    format,
                    key.as_ptr(),
                    block.as_ptr() as *const std::os::raw::c_void,
                    block.len(),
                );
            }

            let index = AMediaMuxer_addTrack(self.muxer, format);
            AMediaFormat_delete(format);
            if index < 0 {
                return Err(RecordError::MuxerState(format!(
                    "AMediaMuxer_addTrack failed: {}",
                    index
                )));
            }
            Ok(TrackId(index as i32))
        }
    }

    fn start(&mut self) -> Result<(), RecordError> {
        unsafe {
            let status = AMediaMuxer_start(self.muxer);
            if status as i32 != AMEDIA_OK {
                return Err(RecordError::MuxerState(format!(
                    "AMediaMuxer_start failed: {}",
                    status as i32
                )));
            }
        }
        Ok(())
    }

    fn write_sample(&mut self, track: TrackId, sample: &EncodedSample) -> Result<(), RecordError> {
        let info = AMediaCodecBufferInfo {
            offset: 0,
            size: sample.data.len() as i32,
            presentationTimeUs: sample.pts_us,
            flags: 0,
        };

        unsafe {
            let status = AMediaMuxer_writeSampleData(
                self.muxer,
                track.0 as usize,
                sample.data.as_ptr(),
                &info,
            );
            if status as i32 != AMEDIA_OK {
                return Err(RecordError::WriteFailure(format!(
                    "AMediaMuxer_writeSampleData failed: {}",
                    status as i32
                )));
            }
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<(), RecordError> {
        unsafe {
            let status = AMediaMuxer_stop(self.muxer);
            if status as i32 != AMEDIA_OK {
                return Err(RecordError::WriteFailure(format!(
                    "AMediaMuxer_stop failed: {}",
                    status as i32
                )));
            }
        }
        Ok(())
    }

    fn release(&mut self) {
        if !self.muxer.is_null() {
            unsafe { AMediaMuxer_delete(self.muxer) };
            self.muxer = ptr::null_mut();
        }
    }

    fn output_path(&self) -> &Path {
        &self.path
    }
}
