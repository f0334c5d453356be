// ── Server clock calibration ──
//
// Timer displays ("on for 4m 10s", "changed 3h ago") compare server epoch
// timestamps against the local clock. One round-trip probe estimates how
// far the local clock runs ahead of the server; every display subtracts it.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::watch;
use tracing::{info, warn};

use floorsync_api::ModuleClient;

use crate::error::CoreError;

/// Process-wide estimate of `local − server` in milliseconds.
///
/// Cheaply cloneable. Reads return `0` until a calibration succeeds, so
/// consumers work (slightly skewed) while uncalibrated.
#[derive(Debug, Clone)]
pub struct ClockOffset {
    offset: Arc<watch::Sender<Option<i64>>>,
}

impl Default for ClockOffset {
    fn default() -> Self {
        Self::new()
    }
}

impl ClockOffset {
    pub fn new() -> Self {
        let (offset, _) = watch::channel(None);
        Self {
            offset: Arc::new(offset),
        }
    }

    /// Offset in milliseconds; `0` while uncalibrated.
    pub fn offset_ms(&self) -> i64 {
        self.get().unwrap_or(0)
    }

    /// Offset in milliseconds, or `None` while uncalibrated.
    pub fn get(&self) -> Option<i64> {
        *self.offset.borrow()
    }

    pub fn is_calibrated(&self) -> bool {
        self.get().is_some()
    }

    /// Watch for (re)calibration.
    pub fn subscribe(&self) -> watch::Receiver<Option<i64>> {
        self.offset.subscribe()
    }

    /// Probe `GET /timestamp` once and store the resulting offset.
    ///
    /// On failure the previous value (calibrated or not) is kept and the
    /// error is logged and returned. There is no retry.
    pub async fn calibrate(&self, client: &ModuleClient) -> Result<i64, CoreError> {
        let t0 = Utc::now().timestamp_millis();
        let probe = client.server_timestamp().await;
        let t1 = Utc::now().timestamp_millis();

        let server_secs = match probe {
            Ok(secs) => secs,
            Err(e) => {
                warn!(error = %e, "clock calibration failed, keeping previous offset");
                return Err(CoreError::CalibrationFailed {
                    reason: e.to_string(),
                });
            }
        };

        let offset = compute_offset(t0, t1, server_secs);
        self.offset.send_replace(Some(offset));
        info!(
            offset_ms = offset,
            round_trip_ms = t1 - t0,
            server_secs,
            "clock calibrated"
        );
        Ok(offset)
    }

    /// Current server time in epoch seconds.
    pub fn server_now(&self) -> f64 {
        self.server_time_at(Utc::now().timestamp_millis())
    }

    /// Seconds from now until the server epoch `epoch_secs` (negative once passed).
    pub fn seconds_until(&self, epoch_secs: f64) -> f64 {
        epoch_secs - self.server_now()
    }

    /// Seconds elapsed since the server epoch `epoch_secs`.
    pub fn seconds_since(&self, epoch_secs: f64) -> f64 {
        self.server_now() - epoch_secs
    }

    #[allow(clippy::cast_precision_loss, clippy::as_conversions)]
    fn server_time_at(&self, local_ms: i64) -> f64 {
        (local_ms - self.offset_ms()) as f64 / 1000.0
    }

    #[cfg(test)]
    pub(crate) fn set(&self, offset_ms: i64) {
        self.offset.send_replace(Some(offset_ms));
    }
}

/// `round(midpoint(t0, t1) − server × 1000)`.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::as_conversions
)]
fn compute_offset(t0_ms: i64, t1_ms: i64, server_secs: f64) -> i64 {
    let midpoint = (t0_ms as f64 + t1_ms as f64) / 2.0;
    (midpoint - server_secs * 1000.0).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_uses_round_trip_midpoint() {
        // Request left at 10.000s, answer arrived at 10.200s, server said 9.5s.
        assert_eq!(compute_offset(10_000, 10_200, 9.5), 600);
    }

    #[test]
    fn offset_can_be_negative() {
        assert_eq!(compute_offset(1_000, 1_000, 3.0), -2_000);
    }

    #[test]
    fn offset_rounds_to_whole_milliseconds() {
        assert_eq!(compute_offset(0, 1, 0.0), 1);
        assert_eq!(compute_offset(0, 0, 0.000_4), 0);
    }

    #[test]
    fn uncalibrated_reads_zero() {
        let clock = ClockOffset::new();
        assert!(!clock.is_calibrated());
        assert_eq!(clock.offset_ms(), 0);
        assert_eq!(clock.get(), None);
    }

    #[test]
    fn server_time_subtracts_offset() {
        let clock = ClockOffset::new();
        clock.set(1_500);
        assert!((clock.server_time_at(11_500) - 10.0).abs() < 1e-9);
    }

    #[test]
    fn clones_share_the_offset() {
        let clock = ClockOffset::new();
        let view = clock.clone();
        clock.set(-250);
        assert_eq!(view.offset_ms(), -250);
    }
}
