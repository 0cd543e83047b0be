//! Multiplexer configuration

use std::time::Duration;

use peermux_core::{MuxError, MuxResult};

/// Longest line a session will buffer before failing the attempt
pub const DEFAULT_MAX_RECORD_LEN: usize = 64 * 1024;

/// Multiplexer configuration
#[derive(Clone, Debug)]
pub struct MuxConfig {
    /// Peer re-resolution period
    pub tick_interval: Duration,
    /// Fixed wait between read attempts of one peer
    pub retry_delay: Duration,
    /// Maximum buffered line length, terminator excluded
    pub max_record_len: usize,
    /// Await every worker task before `run` returns
    pub join_on_shutdown: bool,
}

impl Default for MuxConfig {
    fn default() -> Self {
        MuxConfig {
            tick_interval: Duration::from_secs(1),
            retry_delay: Duration::from_secs(1),
            max_record_len: DEFAULT_MAX_RECORD_LEN,
            join_on_shutdown: false,
        }
    }
}

impl MuxConfig {
    pub fn validate(&self) -> MuxResult<()> {
        if self.tick_interval.is_zero() {
            return Err(MuxError::InvalidConfig(
                "tick_interval must be non-zero".to_string(),
            ));
        }
        if self.retry_delay.is_zero() {
            return Err(MuxError::InvalidConfig(
                "retry_delay must be non-zero".to_string(),
            ));
        }
        if self.max_record_len == 0 {
            return Err(MuxError::InvalidConfig(
                "max_record_len must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}
