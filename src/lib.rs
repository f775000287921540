/*!
 # Sunrise Light

 A scheduling engine that imitates a sunrise with a dimmable light: before
 each configured wake time the brightness rises linearly, reaches full
 brightness at the wake time and is held there for a while afterwards.

 ## Features

 * Weekday bitmask schedules (`DayFlags`)
 * Next occurrence and target moment resolution per alarm
 * Linear brightness ramp with a post-wake hold window
 * Several alarms merged into one brightness signal (`AlarmSet`)
 * JSON alarm store, TOML configuration
 * Brightness sinks for ELK-BLEDOM Bluetooth strips and plain logging

 ## Example

 ```rust
 use chrono::NaiveDate;
 use sunrise_light::*;

 fn main() -> Result<()> {
     let mut alarm = Alarm::new();
     alarm.add_target_day(DayFlags::WEEKDAYS);
     alarm.set_time(6, 30)?;

     let mut alarms = AlarmSet::new();
     alarms.add(alarm);

     // Monday, fifteen minutes before the alarm
     let now = NaiveDate::from_ymd_opt(2024, 1, 8)
         .unwrap()
         .and_hms_opt(6, 15, 0)
         .unwrap();
     let ramp = RampConfig::from_minutes(30, 10)?;
     assert_eq!(alarms.desired_brightness(now, &ramp)?, 50);
     Ok(())
 }
 ```
*/

use thiserror::Error;

/// Error types for the sunrise light engine and its I/O glue
#[derive(Error, Debug)]
pub enum Error {
    /// A next occurrence was requested for an alarm without target days
    #[error("Alarm has no target days")]
    NoSchedule,

    /// Target days are set but no matching day was found within a week
    #[error("Could not resolve the next target day")]
    Resolution,

    /// Aggregate query on an alarm set without members
    #[error("Alarm set is empty")]
    EmptySet,

    /// Hour or minute out of range
    #[error("Invalid time {hour}:{minute:02} (hour 0-23, minute 0-59)")]
    InvalidTime { hour: u32, minute: u32 },

    /// Operation needs exactly one day in the mask
    #[error("Day mask {0:#04x} does not hold exactly one day")]
    NotSingleDay(u8),

    /// Day list or raw mask could not be interpreted
    #[error("Invalid days: {0}")]
    InvalidDays(String),

    /// Ramp or hold duration is not positive
    #[error("Invalid ramp configuration: {0}")]
    InvalidRampConfig(String),

    /// No stored alarm with this identity
    #[error("Alarm {0} not found")]
    AlarmNotFound(AlarmId),

    /// Configuration or store content is inconsistent
    #[error("Configuration error: {0}")]
    Config(String),

    /// No Bluetooth adapters found
    #[error("No Bluetooth adapters found")]
    NoBluetoothAdapters,

    /// No compatible LED device found
    #[error("No compatible LED device found")]
    NoCompatibleDevice,

    /// Failed to find required BLE characteristic
    #[error("Could not find required BLE characteristic: {0}")]
    CharacteristicNotFound(String),

    /// BLE communication error
    #[error("BLE communication error: {0}")]
    BleError(String),

    /// Command timeout
    #[error("Command timed out after {0} retries")]
    CommandTimeout(u8),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Error from btleplug
    #[error(transparent)]
    BtlePlugError(#[from] btleplug::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

pub mod alarm;
pub mod alarm_set;
pub mod ble;
pub mod clock;
pub mod config;
pub mod days;
pub mod driver;
pub mod ramp;
pub mod sink;
pub mod store;

pub use alarm::{Alarm, AlarmId};
pub use alarm_set::AlarmSet;
pub use ble::BleSink;
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::Config;
pub use days::DayFlags;
pub use driver::{Driver, SharedAlarms};
pub use ramp::RampConfig;
pub use sink::{BrightnessSink, LogSink};
pub use store::{AlarmStore, JsonFileStore, MemoryStore};
