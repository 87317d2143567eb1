use thiserror::Error;

/// Errors that can occur during a recording session.
///
/// Configuration-time errors (`EncoderUnavailable`, `MuxerState`,
/// `ConfigurationFailed`) abort `start()` entirely. Usage-order errors
/// (`DuplicateTrack`, `NotStarted`, `OutOfOrderSample`, `PrematureRelease`)
/// indicate an integration bug in the caller.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RecordError {
    #[error("no suitable encoder available: {0}")]
    EncoderUnavailable(String),

    #[error("encoder used out of lifecycle order: {0}")]
    EncoderState(String),

    #[error("encoder released while frames were in flight")]
    PrematureRelease,

    #[error("track already registered for this session")]
    DuplicateTrack,

    #[error("muxer used out of lifecycle order: {0}")]
    MuxerState(String),

    #[error("sample timestamp {got_us}us precedes previous timestamp {prev_us}us")]
    OutOfOrderSample { prev_us: i64, got_us: i64 },

    #[error("container writing never started")]
    NotStarted,

    #[error("write failed: {0}")]
    WriteFailure(String),

    #[error("encoder did not reach end of stream within the grace period")]
    Timeout,

    #[error("configuration failed: {0}")]
    ConfigurationFailed(String),

    #[error("unknown error: {0}")]
    Unknown(String),
}
