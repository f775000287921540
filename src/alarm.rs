/*!
 # Alarms

 A single recurring wake-up schedule: the days it fires on, the time of day
 at which the light reaches full brightness and an on/off switch. Everything
 else (next day, target moment, brightness) is derived from those fields and
 the current time on every call.
*/

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDateTime, NaiveTime, TimeDelta, Timelike};
use serde::{Deserialize, Serialize};
use tracing::trace;
use uuid::Uuid;

use crate::days::DayFlags;
use crate::ramp::RampConfig;
use crate::{Error, Result};

/// Stable identity of a persisted alarm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlarmId(Uuid);

impl AlarmId {
    /// A fresh random identity
    pub fn generate() -> Self {
        AlarmId(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for AlarmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AlarmId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s.trim())
            .map(AlarmId)
            .map_err(|e| Error::Config(format!("invalid alarm id '{}': {}", s, e)))
    }
}

/// One wake-up schedule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "AlarmRecord", into = "AlarmRecord")]
pub struct Alarm {
    id: Option<AlarmId>,
    target_days: DayFlags,
    target_hour: u8,
    target_minute: u8,
    active: bool,
}

/// Serialized form of an alarm, validated on the way in
#[derive(Serialize, Deserialize)]
struct AlarmRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<AlarmId>,
    target_days: DayFlags,
    target_hour: u32,
    target_minute: u32,
    #[serde(default = "default_active")]
    active: bool,
}

fn default_active() -> bool {
    true
}

impl TryFrom<AlarmRecord> for Alarm {
    type Error = Error;

    fn try_from(record: AlarmRecord) -> Result<Self> {
        let mut alarm = Alarm {
            id: record.id,
            target_days: record.target_days,
            active: record.active,
            ..Alarm::default()
        };
        alarm.set_time(record.target_hour, record.target_minute)?;
        Ok(alarm)
    }
}

impl From<Alarm> for AlarmRecord {
    fn from(alarm: Alarm) -> Self {
        AlarmRecord {
            id: alarm.id,
            target_days: alarm.target_days,
            target_hour: u32::from(alarm.target_hour),
            target_minute: u32::from(alarm.target_minute),
            active: alarm.active,
        }
    }
}

impl Default for Alarm {
    fn default() -> Self {
        Self {
            id: None,
            target_days: DayFlags::NONE,
            target_hour: 0,
            target_minute: 0,
            active: true,
        }
    }
}

impl Alarm {
    /// An active alarm at 00:00 with no target days
    pub fn new() -> Self {
        Self::default()
    }

    /// Convenience constructor for an active alarm
    pub fn at(days: DayFlags, hour: u32, minute: u32) -> Result<Self> {
        let mut alarm = Self::new();
        alarm.add_target_day(days);
        alarm.set_time(hour, minute)?;
        Ok(alarm)
    }

    pub fn with_id(mut self, id: AlarmId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn id(&self) -> Option<AlarmId> {
        self.id
    }

    pub fn target_days(&self) -> DayFlags {
        self.target_days
    }

    pub fn target_hour(&self) -> u8 {
        self.target_hour
    }

    pub fn target_minute(&self) -> u8 {
        self.target_minute
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    pub fn add_target_day(&mut self, days: DayFlags) {
        self.target_days.add(days);
    }

    pub fn remove_target_day(&mut self, days: DayFlags) {
        self.target_days.remove(days);
    }

    /// Sets the local time of day at which brightness reaches 100%.
    ///
    /// Hour must be 0-23 and minute 0-59; out of range values leave the
    /// alarm untouched.
    pub fn set_time(&mut self, hour: u32, minute: u32) -> Result<()> {
        if hour > 23 || minute > 59 {
            return Err(Error::InvalidTime { hour, minute });
        }
        self.target_hour = hour as u8;
        self.target_minute = minute as u8;
        Ok(())
    }

    fn target_time(&self) -> NaiveTime {
        NaiveTime::from_hms_opt(
            u32::from(self.target_hour),
            u32::from(self.target_minute),
            0,
        )
        .unwrap_or(NaiveTime::MIN)
    }

    /// Today's target moment, whether or not today is a target day
    fn target_on(&self, now: NaiveDateTime) -> NaiveDateTime {
        now.date().and_time(self.target_time())
    }

    /// True when today is a target day and the target time of day is
    /// strictly behind `now`
    pub fn alarm_passed_today(&self, now: NaiveDateTime) -> bool {
        let today = DayFlags::from_weekday(now.weekday());
        self.target_days.contains(today) && now.time() > self.target_time()
    }

    /// The soonest day, today included, on which the alarm reaches full
    /// brightness
    pub fn next_day(&self, now: NaiveDateTime) -> Result<DayFlags> {
        if self.target_days.is_empty() {
            return Err(Error::NoSchedule);
        }

        let today = DayFlags::from_weekday(now.weekday());
        if self.target_days.contains(today) {
            let (hour, minute) = (now.hour(), now.minute());
            let target_hour = u32::from(self.target_hour);
            let target_minute = u32::from(self.target_minute);
            if hour < target_hour || (hour == target_hour && minute <= target_minute) {
                return Ok(today);
            }
        }

        let mut day = today.successor()?;
        for _ in 0..7 {
            if self.target_days.contains(day) {
                return Ok(day);
            }
            day = day.successor()?;
        }
        Err(Error::Resolution)
    }

    /// The absolute moment of the next occurrence, always at zero seconds
    pub fn target_datetime(&self, now: NaiveDateTime) -> Result<NaiveDateTime> {
        let next_day = self.next_day(now)?;
        let this_day = now.weekday().num_days_from_monday() as i64;
        let that_day = next_day.to_weekday()?.num_days_from_monday() as i64;

        let mut offset = (that_day - this_day).rem_euclid(7);
        if offset == 0 && self.alarm_passed_today(now) {
            offset = 7;
        }

        Ok(self.target_on(now) + TimeDelta::days(offset))
    }

    /// Brightness in percent (0-100) the light should have at `now`.
    ///
    /// Inactive alarms never light up; an active alarm without target days
    /// fails with `NoSchedule`.
    pub fn desired_brightness(&self, now: NaiveDateTime, ramp: &RampConfig) -> Result<u8> {
        if !self.active {
            return Ok(0);
        }

        if self.alarm_passed_today(now) {
            let elapsed = now - self.target_on(now);
            if elapsed <= ramp.hold() {
                trace!(?elapsed, "Holding full brightness after target");
                return Ok(100);
            }
        }

        let remaining = self.target_datetime(now)? - now;
        let level = ramp.level(remaining);
        trace!(?remaining, level, "Ramp level");
        Ok(level)
    }
}

impl fmt::Display for Alarm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}:{:02} on {}{}",
            self.target_hour,
            self.target_minute,
            self.target_days,
            if self.active { "" } else { " (disabled)" }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    /// 2024-01-07 is a Sunday
    fn sunday(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 7)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    fn monday(hour: u32, minute: u32) -> NaiveDateTime {
        sunday(hour, minute) + TimeDelta::days(1)
    }

    fn ramp() -> RampConfig {
        RampConfig::from_minutes(30, 10).unwrap()
    }

    #[test]
    fn defaults() {
        let alarm = Alarm::new();
        assert!(alarm.target_days().is_empty());
        assert_eq!((alarm.target_hour(), alarm.target_minute()), (0, 0));
        assert!(alarm.is_active());
        assert_eq!(alarm.id(), None);
    }

    #[test]
    fn set_time_rejects_out_of_range() {
        let mut alarm = Alarm::new();
        assert!(matches!(
            alarm.set_time(24, 0),
            Err(Error::InvalidTime { hour: 24, minute: 0 })
        ));
        assert!(alarm.set_time(23, 60).is_err());
        assert_eq!((alarm.target_hour(), alarm.target_minute()), (0, 0));

        alarm.set_time(23, 59).unwrap();
        assert_eq!((alarm.target_hour(), alarm.target_minute()), (23, 59));
    }

    #[test]
    fn add_and_remove_days_are_idempotent() {
        let mut alarm = Alarm::new();
        alarm.add_target_day(DayFlags::MONDAY);
        alarm.add_target_day(DayFlags::MONDAY);
        assert_eq!(alarm.target_days(), DayFlags::MONDAY);
        alarm.remove_target_day(DayFlags::TUESDAY);
        assert_eq!(alarm.target_days(), DayFlags::MONDAY);
        alarm.remove_target_day(DayFlags::MONDAY);
        assert!(alarm.target_days().is_empty());
    }

    #[test]
    fn next_day_without_days_fails() {
        assert!(matches!(
            Alarm::new().next_day(sunday(0, 0)),
            Err(Error::NoSchedule)
        ));
        assert!(matches!(
            Alarm::new().target_datetime(sunday(0, 0)),
            Err(Error::NoSchedule)
        ));
    }

    #[test]
    fn next_day_is_today_before_target() {
        let alarm = Alarm::at(DayFlags::SUNDAY, 6, 0).unwrap();
        assert_eq!(alarm.next_day(sunday(0, 0)).unwrap(), DayFlags::SUNDAY);
        // Same minute still counts as today
        let late = sunday(6, 0) + TimeDelta::seconds(30);
        assert_eq!(alarm.next_day(late).unwrap(), DayFlags::SUNDAY);
    }

    #[test]
    fn next_day_moves_on_after_target() {
        let alarm = Alarm::at(DayFlags::SUNDAY | DayFlags::MONDAY, 6, 0).unwrap();
        assert_eq!(alarm.next_day(sunday(6, 30)).unwrap(), DayFlags::MONDAY);
        assert_eq!(alarm.next_day(monday(6, 30)).unwrap(), DayFlags::SUNDAY);
    }

    #[test]
    fn next_day_wraps_to_same_day_next_week() {
        let alarm = Alarm::at(DayFlags::SUNDAY, 6, 0).unwrap();
        assert_eq!(alarm.next_day(sunday(7, 0)).unwrap(), DayFlags::SUNDAY);
    }

    #[test]
    fn target_datetime_zeroes_seconds() {
        let alarm = Alarm::at(DayFlags::SUNDAY, 6, 0).unwrap();
        let now = sunday(5, 0) + TimeDelta::milliseconds(42_123);
        assert_eq!(alarm.target_datetime(now).unwrap(), sunday(6, 0));
    }

    #[test]
    fn target_datetime_next_week_when_passed() {
        let alarm = Alarm::at(DayFlags::SUNDAY, 6, 0).unwrap();
        assert_eq!(
            alarm.target_datetime(sunday(6, 1)).unwrap(),
            sunday(6, 0) + TimeDelta::days(7)
        );
    }

    #[test]
    fn target_datetime_later_in_week() {
        let alarm = Alarm::at(DayFlags::SUNDAY | DayFlags::MONDAY, 6, 0).unwrap();
        assert_eq!(alarm.target_datetime(monday(6, 30)).unwrap(), sunday(6, 0) + TimeDelta::days(7));
        assert_eq!(alarm.target_datetime(sunday(6, 30)).unwrap(), monday(6, 0));
    }

    #[test]
    fn alarm_passed_today_is_strict() {
        let alarm = Alarm::at(DayFlags::SUNDAY, 6, 0).unwrap();
        assert!(!alarm.alarm_passed_today(sunday(6, 0)));
        assert!(alarm.alarm_passed_today(sunday(6, 0) + TimeDelta::seconds(1)));
        assert!(!alarm.alarm_passed_today(monday(7, 0)));
    }

    #[test]
    fn full_brightness_at_target() {
        let alarm = Alarm::at(DayFlags::SUNDAY, 6, 0).unwrap();
        assert_eq!(alarm.desired_brightness(sunday(6, 0), &ramp()).unwrap(), 100);
    }

    #[test]
    fn brightness_rises_during_ramp() {
        let alarm = Alarm::at(DayFlags::SUNDAY, 6, 0).unwrap();
        let ramp = ramp();
        let mut previous = 0;
        for minutes_before in (0..=29).rev() {
            let now = sunday(6, 0) - TimeDelta::minutes(minutes_before);
            let level = alarm.desired_brightness(now, &ramp).unwrap();
            assert!(level > previous, "{} not above {}", level, previous);
            previous = level;
        }
        assert_eq!(previous, 100);
        assert_eq!(alarm.desired_brightness(sunday(5, 29), &ramp).unwrap(), 0);
    }

    #[test]
    fn hold_window_after_target() {
        let alarm = Alarm::at(DayFlags::SUNDAY, 6, 0).unwrap();
        let ramp = ramp();
        assert_eq!(alarm.desired_brightness(sunday(6, 5), &ramp).unwrap(), 100);
        assert_eq!(alarm.desired_brightness(sunday(6, 10), &ramp).unwrap(), 100);
        assert_eq!(alarm.desired_brightness(sunday(6, 11), &ramp).unwrap(), 0);
    }

    #[test]
    fn ramp_crosses_midnight() {
        let alarm = Alarm::at(DayFlags::MONDAY, 0, 10).unwrap();
        assert_eq!(alarm.desired_brightness(sunday(23, 55), &ramp()).unwrap(), 50);
    }

    #[test]
    fn inactive_alarm_stays_dark() {
        let mut alarm = Alarm::at(DayFlags::ALL, 6, 0).unwrap();
        alarm.set_active(false);
        let ramp = ramp();
        for minute in 0..60 {
            assert_eq!(alarm.desired_brightness(sunday(5, minute), &ramp).unwrap(), 0);
        }
        assert_eq!(alarm.desired_brightness(sunday(6, 0), &ramp).unwrap(), 0);
    }

    #[test]
    fn alarm_without_days_has_no_brightness() {
        let mut alarm = Alarm::new();
        assert!(matches!(
            alarm.desired_brightness(sunday(6, 0), &ramp()),
            Err(Error::NoSchedule)
        ));

        alarm.set_active(false);
        assert_eq!(alarm.desired_brightness(sunday(6, 0), &ramp()).unwrap(), 0);
    }

    #[test]
    fn queries_are_pure() {
        let alarm = Alarm::at(DayFlags::WEEKDAYS, 7, 15).unwrap();
        let now = monday(7, 0);
        assert_eq!(
            alarm.desired_brightness(now, &ramp()).unwrap(),
            alarm.desired_brightness(now, &ramp()).unwrap()
        );
        assert_eq!(alarm.target_datetime(now).unwrap(), alarm.target_datetime(now).unwrap());
    }

    #[test]
    fn serde_validates_time() {
        let json = r#"{"target_days":65,"target_hour":25,"target_minute":0}"#;
        assert!(serde_json::from_str::<Alarm>(json).is_err());

        let json = r#"{"target_days":128,"target_hour":5,"target_minute":0}"#;
        assert!(serde_json::from_str::<Alarm>(json).is_err());

        let json = r#"{"target_days":65,"target_hour":5,"target_minute":30}"#;
        let alarm: Alarm = serde_json::from_str(json).unwrap();
        assert_eq!(alarm.target_days(), DayFlags::MONDAY | DayFlags::SUNDAY);
        assert!(alarm.is_active());
    }
}
