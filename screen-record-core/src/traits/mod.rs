pub mod media_muxer;
pub mod record_delegate;
pub mod video_encoder;
