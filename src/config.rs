//! Runtime configuration for schedulers and drivers.

use crate::sweep_error::SweepCommError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Smallest tag upper bound every MPI implementation must support.
pub const DEFAULT_MAX_TAG: i32 = 32767;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    /// Largest tag the transport accepts.
    pub max_tag: i32,
    /// Abort a cycle when nothing progresses for this long. `None` waits forever.
    pub stall_timeout_ms: Option<u64>,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            max_tag: DEFAULT_MAX_TAG,
            stall_timeout_ms: None,
        }
    }
}

impl SweepConfig {
    pub fn validate(&self) -> Result<(), SweepCommError> {
        if self.max_tag <= 0 {
            return Err(SweepCommError::InvalidConfig(format!(
                "max_tag must be positive, got {}",
                self.max_tag
            )));
        }
        if self.stall_timeout_ms == Some(0) {
            return Err(SweepCommError::InvalidConfig(
                "stall_timeout_ms must be non-zero when set".into(),
            ));
        }
        Ok(())
    }

    pub fn stall_timeout(&self) -> Option<Duration> {
        self.stall_timeout_ms.map(Duration::from_millis)
    }
}
