//! Ramp and hold windows around an alarm's target moment.

use chrono::TimeDelta;

use crate::{Error, Result};

/// Default minutes of rising brightness before the target moment
pub const DEFAULT_RAMP_MINUTES: u32 = 30;
/// Default minutes of full brightness after the target moment
pub const DEFAULT_HOLD_MINUTES: u32 = 10;

/// How long the light ramps up before a target moment and how long it stays
/// at full brightness afterwards
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RampConfig {
    ramp: TimeDelta,
    hold: TimeDelta,
}

impl RampConfig {
    /// Both durations must be at least one minute
    pub fn from_minutes(ramp_minutes: u32, hold_minutes: u32) -> Result<Self> {
        if ramp_minutes == 0 {
            return Err(Error::InvalidRampConfig(
                "ramp duration must be positive".into(),
            ));
        }
        if hold_minutes == 0 {
            return Err(Error::InvalidRampConfig(
                "hold duration must be positive".into(),
            ));
        }
        Ok(Self {
            ramp: TimeDelta::minutes(i64::from(ramp_minutes)),
            hold: TimeDelta::minutes(i64::from(hold_minutes)),
        })
    }

    pub fn ramp(&self) -> TimeDelta {
        self.ramp
    }

    pub fn hold(&self) -> TimeDelta {
        self.hold
    }

    /// Brightness for a target `remaining` time away: 0 at the start of the
    /// ramp, 100 at the target, linear in between
    pub(crate) fn level(&self, remaining: TimeDelta) -> u8 {
        if remaining > self.ramp {
            return 0;
        }
        let fraction =
            remaining.num_milliseconds() as f64 / self.ramp.num_milliseconds() as f64;
        (100.0 * (1.0 - fraction)).round().clamp(0.0, 100.0) as u8
    }
}

impl Default for RampConfig {
    fn default() -> Self {
        Self {
            ramp: TimeDelta::minutes(i64::from(DEFAULT_RAMP_MINUTES)),
            hold: TimeDelta::minutes(i64::from(DEFAULT_HOLD_MINUTES)),
        }
    }
}
