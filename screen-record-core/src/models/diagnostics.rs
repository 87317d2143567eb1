/// Counters maintained across drain cycles, for integration debugging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineDiagnostics {
    pub drain_cycles: u64,
    /// Cycles that produced no output within the dequeue timeout.
    pub would_block_polls: u64,
    pub samples_written: u64,
    pub bytes_written: u64,
    pub buffers_released: u64,
    /// Codec-config-only buffers skipped (released without writing).
    pub config_buffers_skipped: u64,
}
