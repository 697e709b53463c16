//! Busy-state polling after an asynchronous change.

use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::error::EdgeError;
use crate::model::Service;

const DEFAULT_INTERVAL_SECS: u64 = 1;
const DEFAULT_MAX_ATTEMPTS: u32 = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PollSettings {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl PollSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_INTERVAL_SECS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

fn default_interval_secs() -> u64 {
    DEFAULT_INTERVAL_SECS
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

/// Wait for the device to report idle.
///
/// Each attempt sleeps one interval and then queries the busy flag, so the
/// device is never queried more than `max_attempts` times. Returns the
/// number of queries made, or [`EdgeError::ScheduleTimeout`] when the device
/// was still busy after the last one.
pub fn wait_until_idle<F, S>(
    service: Service,
    settings: &PollSettings,
    mut is_busy: F,
    mut sleep: S,
) -> Result<u32, EdgeError>
where
    F: FnMut() -> Result<bool, EdgeError>,
    S: FnMut(Duration),
{
    for attempt in 1..=settings.max_attempts {
        sleep(settings.interval());
        if !is_busy()? {
            debug!(%service, attempt, "edge gateway idle");
            return Ok(attempt);
        }
        debug!(%service, attempt, "edge gateway busy");
    }
    Err(EdgeError::ScheduleTimeout {
        service,
        attempts: settings.max_attempts,
    })
}
