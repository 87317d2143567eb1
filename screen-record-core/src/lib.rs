//! # screen-record-core
//!
//! Platform-agnostic screen recording core library.
//!
//! Routes mirrored display frames through a platform video encoder and
//! multiplexes the encoded stream into a playable container file. Platform
//! backends (Android NDK MediaCodec/MediaMuxer) implement the
//! [`VideoEncoder`] and [`MediaMuxer`] traits and plug into the generic
//! [`OutputPipeline`].
//!
//! ## Architecture
//!
//! ```text
//! screen-record-core (this crate)
//! ├── traits/    ← VideoEncoder, MediaMuxer, RecordDelegate
//! ├── models/    ← RecordError, PipelineState, RecordConfiguration, EncodedSample, etc.
//! ├── encoder/   ← EncoderAdapter (encoder lifecycle + drain batching)
//! ├── muxer/     ← ContainerWriter (track registration + ordered sample writing)
//! └── pipeline/  ← OutputPipeline (the state machine driving the drain worker)
//! ```
//!
//! Data flow: platform compositor → rendering-target surface →
//! `EncoderAdapter` → encoded access units → `OutputPipeline` →
//! `ContainerWriter` → file. The core never touches pixel data; it is a
//! buffer relay and lifecycle state machine between two black-box system
//! services.

pub mod encoder;
pub mod models;
pub mod muxer;
pub mod pipeline;
pub mod traits;

#[cfg(test)]
pub(crate) mod testing;

// Re-export key types at crate root for convenience.
pub use encoder::EncoderAdapter;
pub use models::config::{EncoderSettings, RecordConfiguration};
pub use models::diagnostics::PipelineDiagnostics;
pub use models::error::RecordError;
pub use models::recording_result::{RecordingMetadata, RecordingResult};
pub use models::sample::{DrainEvent, EncodedSample, TrackDescriptor, TrackId};
pub use models::session::{DisplayInfo, PermissionToken};
pub use models::state::PipelineState;
pub use muxer::ContainerWriter;
pub use pipeline::OutputPipeline;
pub use traits::media_muxer::MediaMuxer;
pub use traits::record_delegate::RecordDelegate;
pub use traits::video_encoder::VideoEncoder;
