use crate::models::error::RecordError;
use crate::models::recording_result::RecordingResult;
use crate::models::state::PipelineState;

/// Event delegate for pipeline notifications.
///
/// Methods are called from the drain thread or from the caller of `stop()`,
/// never from a UI thread. Implementations should marshal accordingly.
pub trait RecordDelegate: Send + Sync {
    /// Called when the pipeline state changes.
    fn on_state_changed(&self, state: PipelineState);

    /// Called when an error aborts or degrades the session.
    fn on_error(&self, error: &RecordError);

    /// Called when the session completes and the container is finalized.
    fn on_recording_finished(&self, result: &RecordingResult);
}
