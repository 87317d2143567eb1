//! Surface-input video encoder backed by `AMediaCodec`.
//!
//! The encoder is configured for surface input: the compositor writes frames
//! into the `ANativeWindow` returned from `configure`, and encoded access
//! units are dequeued from the codec's output side.

use std::ffi::CString;
use std::ptr;
use std::slice;
use std::sync::Arc;
use std::time::Duration;

use ndk_sys::{
    AMediaCodec, AMediaCodecBufferInfo, AMediaCodec_configure, AMediaCodec_createEncoderByType,
    AMediaCodec_createInputSurface, AMediaCodec_delete, AMediaCodec_dequeueOutputBuffer,
    AMediaCodec_getOutputBuffer, AMediaCodec_getOutputFormat, AMediaCodec_releaseOutputBuffer,
    AMediaCodec_signalEndOfInputStream, AMediaCodec_start, AMediaCodec_stop, AMediaFormat_delete,
    AMediaFormat_getBuffer, AMediaFormat_new, AMediaFormat_setInt32, AMediaFormat_setString,
    ANativeWindow, ANativeWindow_release, AMEDIAFORMAT_KEY_BIT_RATE, AMEDIAFORMAT_KEY_COLOR_FORMAT,
    AMEDIAFORMAT_KEY_FRAME_RATE, AMEDIAFORMAT_KEY_HEIGHT, AMEDIAFORMAT_KEY_I_FRAME_INTERVAL,
    AMEDIAFORMAT_KEY_MIME, AMEDIAFORMAT_KEY_WIDTH,
};

use screen_record_core::models::config::EncoderSettings;
use screen_record_core::models::error::RecordError;
use screen_record_core::models::sample::{DrainEvent, EncodedSample, TrackDescriptor};
use screen_record_core::traits::video_encoder::VideoEncoder;

// MediaCodecInfo.CodecCapabilities.COLOR_FormatSurface
const COLOR_FORMAT_SURFACE: i32 = 0x7F00_0789;
// AMEDIACODEC_CONFIGURE_FLAG_ENCODE
const CONFIGURE_FLAG_ENCODE: u32 = 1;

// dequeueOutputBuffer status codes
const INFO_TRY_AGAIN_LATER: isize = -1;
const INFO_OUTPUT_FORMAT_CHANGED: isize = -2;
const INFO_OUTPUT_BUFFERS_CHANGED: isize = -3;

// AMediaCodecBufferInfo flags
const BUFFER_FLAG_CODEC_CONFIG: u32 = 2;
const BUFFER_FLAG_END_OF_STREAM: u32 = 4;

const AMEDIA_OK: i32 = 0;

/// Byte range of a sample inside its output buffer, if the reported offset
/// and size fit the buffer's capacity.
fn sample_bounds(offset: i32, size: i32, capacity: usize) -> Option<(usize, usize)> {
    if offset < 0 || size < 0 {
        return None;
    }
    let start = offset as usize;
    let end = start.checked_add(size as usize)?;
    if end > capacity {
        return None;
    }
    Some((start, end))
}

struct SurfaceHandle(*mut ANativeWindow);

// SAFETY: the window handle is reference-counted by the platform; releasing
// it from whichever thread drops the last clone is allowed.
unsafe impl Send for SurfaceHandle {}
unsafe impl Sync for SurfaceHandle {}

impl Drop for SurfaceHandle {
    fn drop(&mut self) {
        unsafe { ANativeWindow_release(self.0) };
    }
}

/// Cloneable rendering-target handle for the virtual display.
#[derive(Clone)]
pub struct NativeSurface(Arc<SurfaceHandle>);

impl NativeSurface {
    /// Raw window pointer for JNI hand-off to the virtual display.
    pub fn as_ptr(&self) -> *mut ANativeWindow {
        self.0 .0
    }
}

/// `AMediaCodec` video encoder with surface input.
pub struct NdkVideoEncoder {
    codec: *mut AMediaCodec,
    surface: Option<NativeSurface>,
    settings: Option<EncoderSettings>,
}

// SAFETY: the codec handle is only used behind &mut self; AMediaCodec calls
// are thread-safe per the NDK documentation.
unsafe impl Send for NdkVideoEncoder {}

impl NdkVideoEncoder {
    pub fn new() -> Self {
        Self {
            codec: ptr::null_mut(),
            surface: None,
            settings: None,
        }
    }

    /// Build a track descriptor from the codec's negotiated output format.
    ///
    /// Pulls csd-0/csd-1 (SPS/PPS for H.264) so the muxer can rebuild the
    /// format on its side.
    unsafe fn descriptor_from_output_format(&self) -> TrackDescriptor {
        let settings = self.settings.as_ref().expect("configured before draining");
        let mut descriptor = TrackDescriptor {
            mime_type: settings.mime_type.clone(),
            width: settings.width,
            height: settings.height,
            csd: Vec::new(),
        };

        let format = AMediaCodec_getOutputFormat(self.codec);
        if format.is_null() {
            log::warn!("encoder reported no output format, using configured settings");
            return descriptor;
        }

        for key in ["csd-0", "csd-1"] {
            let Ok(key) = CString::new(key) else { break };
            let mut data: *mut std::os::raw::c_void = ptr::null_mut();
            let mut size: usize = 0;
            if AMediaFormat_getBuffer(format, key.as_ptr(), &mut data, &mut size)
                && !data.is_null()
                && size > 0
            {
                let bytes = slice::from_raw_parts(data as *const u8, size);
                descriptor.csd.push(bytes.to_vec());
            }
        }

        AMediaFormat_delete(format);
        descriptor
    }
}

impl Default for NdkVideoEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for NdkVideoEncoder {
    fn drop(&mut self) {
        if !self.codec.is_null() {
            unsafe { AMediaCodec_delete(self.codec) };
        }
    }
}

impl VideoEncoder for NdkVideoEncoder {
    type Surface = NativeSurface;

    fn is_available(&self) -> bool {
        // Encoder existence is probed at configure time; libmediandk itself
        // is always present on supported API levels.
        true
    }

    fn configure(&mut self, settings: &EncoderSettings) -> Result<Self::Surface, RecordError> {
        let mime = CString::new(settings.mime_type.as_str())
            .map_err(|_| RecordError::ConfigurationFailed("mime type contains NUL".into()))?;

        unsafe {
            let codec = AMediaCodec_createEncoderByType(mime.as_ptr());
            if codec.is_null() {
                return Err(RecordError::EncoderUnavailable(format!(
                    "no encoder for {}",
                    settings.mime_type
                )));
            }

            let format = AMediaFormat_new();
            AMediaFormat_setString(format, AMEDIAFORMAT_KEY_MIME, mime.as_ptr());
            AMediaFormat_setInt32(format, AMEDIAFORMAT_KEY_WIDTH, settings.width as i32);
            AMediaFormat_setInt32(format, AMEDIAFORMAT_KEY_HEIGHT, settings.height as i32);
            AMediaFormat_setInt32(format, AMEDIAFORMAT_KEY_COLOR_FORMAT, COLOR_FORMAT_SURFACE);
            AMediaFormat_setInt32(format, AMEDIAFORMAT_KEY_BIT_RATE, settings.bit_rate as i32);
            AMediaFormat_setInt32(format, AMEDIAFORMAT_KEY_FRAME_RATE, settings.frame_rate as i32);
            AMediaFormat_setInt32(
                format,
                AMEDIAFORMAT_KEY_I_FRAME_INTERVAL,
                settings.keyframe_interval_secs as i32,
            );

            let status = AMediaCodec_configure(
                codec,
                format,
                ptr::null_mut(),
                ptr::null_mut(),
                CONFIGURE_FLAG_ENCODE,
            );
            AMediaFormat_delete(format);
            if status as i32 != AMEDIA_OK {
                AMediaCodec_delete(codec);
                return Err(RecordError::ConfigurationFailed(format!(
                    "AMediaCodec_configure failed: {}",
                    status as i32
                )));
            }

            let mut window: *mut ANativeWindow = ptr::null_mut();
            let status = AMediaCodec_createInputSurface(codec, &mut window);
            if status as i32 != AMEDIA_OK || window.is_null() {
                AMediaCodec_delete(codec);
                return Err(RecordError::ConfigurationFailed(format!(
                    "AMediaCodec_createInputSurface failed: {}",
                    status as i32
                )));
            }

            self.codec = codec;
            let surface = NativeSurface(Arc::new(SurfaceHandle(window)));
            self.surface = Some(surface.clone());
            self.settings = Some(settings.clone());
            Ok(surface)
        }
    }

    fn start(&mut self) -> Result<(), RecordError> {
        unsafe {
            let status = AMediaCodec_start(self.codec);
            if status as i32 != AMEDIA_OK {
                return Err(RecordError::EncoderState(format!(
                    "AMediaCodec_start failed: {}",
                    status as i32
                )));
            }
        }
        Ok(())
    }

    fn dequeue_output(&mut self, timeout: Duration) -> Result<DrainEvent, RecordError> {
        let timeout_us = timeout.as_micros() as i64;
        loop {
            unsafe {
                let mut info = AMediaCodecBufferInfo {
                    offset: 0,
                    size: 0,
                    presentationTimeUs: 0,
                    flags: 0,
                };
                let status = AMediaCodec_dequeueOutputBuffer(self.codec, &mut info, timeout_us);
                match status as isize {
                    INFO_TRY_AGAIN_LATER => return Ok(DrainEvent::WouldBlock),
                    INFO_OUTPUT_FORMAT_CHANGED => {
                        return Ok(DrainEvent::FormatChanged(
                            self.descriptor_from_output_format(),
                        ));
                    }
                    INFO_OUTPUT_BUFFERS_CHANGED => {
                        // Legacy notification, nothing to do.
                        continue;
                    }
                    index if index >= 0 => {
                        let mut capacity: usize = 0;
                        let buffer =
                            AMediaCodec_getOutputBuffer(self.codec, index as usize, &mut capacity);
                        if buffer.is_null() {
                            return Err(RecordError::Unknown(format!(
                                "null output buffer at index {}",
                                index
                            )));
                        }
                        let Some((start, end)) =
                            sample_bounds(info.offset, info.size, capacity)
                        else {
                            // Still hand the buffer back before bailing.
                            AMediaCodec_releaseOutputBuffer(self.codec, index as usize, false);
                            return Err(RecordError::Unknown(format!(
                                "buffer {} reports out-of-bounds sample: offset {} size {} capacity {}",
                                index, info.offset, info.size, capacity
                            )));
                        };
                        let data = slice::from_raw_parts(buffer, capacity)[start..end].to_vec();
                        return Ok(DrainEvent::Sample(EncodedSample {
                            buffer_id: index as u64,
                            data,
                            pts_us: info.presentationTimeUs,
                            codec_config: info.flags & BUFFER_FLAG_CODEC_CONFIG != 0,
                            end_of_stream: info.flags & BUFFER_FLAG_END_OF_STREAM != 0,
                        }));
                    }
                    other => {
                        return Err(RecordError::Unknown(format!(
                            "unexpected encoder status: {}",
                            other
                        )));
                    }
                }
            }
        }
    }

    fn release_buffer(&mut self, buffer_id: u64) -> Result<(), RecordError> {
        unsafe {
            let status = AMediaCodec_releaseOutputBuffer(self.codec, buffer_id as usize, false);
            if status as i32 != AMEDIA_OK {
                return Err(RecordError::Unknown(format!(
                    "AMediaCodec_releaseOutputBuffer failed: {}",
                    status as i32
                )));
            }
        }
        Ok(())
    }

    fn signal_end_of_stream(&mut self) -> Result<(), RecordError> {
        unsafe {
            let status = AMediaCodec_signalEndOfInputStream(self.codec);
            if status as i32 != AMEDIA_OK {
                return Err(RecordError::EncoderState(format!(
                    "AMediaCodec_signalEndOfInputStream failed: {}",
                    status as i32
                )));
            }
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<(), RecordError> {
        // A codec that never came up has nothing to stop.
        if self.codec.is_null() {
            return Ok(());
        }
        unsafe {
            let status = AMediaCodec_stop(self.codec);
            if status as i32 != AMEDIA_OK {
                return Err(RecordError::EncoderState(format!(
                    "AMediaCodec_stop failed: {}",
                    status as i32
                )));
            }
        }
        Ok(())
    }

    fn release(&mut self) {
        if !self.codec.is_null() {
            unsafe { AMediaCodec_delete(self.codec) };
            self.codec = ptr::null_mut();
        }
        // Dropping the last surface clone releases the window.
        self.surface = None;
    }
}

#[cfg(test)]
mod tests {
    use super::sample_bounds;

    #[test]
    fn sample_bounds_rejects_overruns() {
        assert_eq!(sample_bounds(0, 40, 64), Some((0, 40)));
        assert_eq!(sample_bounds(24, 40, 64), Some((24, 64)));
        assert_eq!(sample_bounds(25, 40, 64), None);
        assert_eq!(sample_bounds(-1, 4, 64), None);
        assert_eq!(sample_bounds(0, -1, 64), None);
        assert_eq!(sample_bounds(i32::MAX, 1, 64), None);
    }
}
