//! # screen-record-android
//!
//! Android NDK backend for screen-record-kit.
//!
//! Provides:
//! - `NdkVideoEncoder` — surface-input H.264 encoder via `AMediaCodec`
//! - `NdkMediaMuxer` — MPEG-4 container muxer via `AMediaMuxer`
//!
//! ## Platform Requirements
//! - Android API 26+ (`AMediaCodec_createInputSurface`,
//!   `AMediaCodec_signalEndOfInputStream`)
//! - `libmediandk` is linked by the `ndk-sys` `media` feature
//!
//! The `MediaProjection` consent flow and virtual-display creation are Java
//! APIs without NDK equivalents; the embedding app performs them over JNI,
//! passes the resulting permission token to the core, and attaches the
//! surface returned by `OutputPipeline::start` to the virtual display.
//!
//! ## Usage
//! ```ignore
//! use screen_record_android::{NdkMediaMuxer, NdkVideoEncoder};
//! use screen_record_core::{OutputPipeline, PermissionToken, RecordConfiguration};
//!
//! let config = RecordConfiguration::default();
//! let muxer = NdkMediaMuxer::new(&config.output_path).unwrap();
//! let mut pipeline = OutputPipeline::new(
//!     NdkVideoEncoder::new(),
//!     muxer,
//!     PermissionToken::new(token_bytes),
//!     config,
//! ).unwrap();
//! let surface = pipeline.start(1080, 1920).unwrap();
//! ```

#[cfg(target_os = "android")]
pub mod media_codec;
#[cfg(target_os = "android")]
pub mod media_muxer;

#[cfg(target_os = "android")]
pub use media_codec::{NativeSurface, NdkVideoEncoder};
#[cfg(target_os = "android")]
pub use media_muxer::NdkMediaMuxer;
