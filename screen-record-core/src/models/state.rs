/// Output pipeline state machine.
///
/// State transitions:
/// ```text
/// idle → configuring → draining → stopping → stopped
///                          ↺ (drain cycles)
/// ```
///
/// `stopped` is terminal; a pipeline records at most one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Configuring,
    Draining,
    Stopping,
    Stopped,
}

impl PipelineState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Whether a session is in flight (encoder and muxer are alive).
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Configuring | Self::Draining | Self::Stopping)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped)
    }
}
