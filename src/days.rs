/*!
 # Days of the week

 Bitmask of weekdays used by alarm schedules. The bit layout matches the one
 ELK-BLEDOM strips use in their on-device schedule command.
*/

use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::str::FromStr;

use chrono::Weekday;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A set of weekdays stored as a 7-bit mask
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct DayFlags(u8);

/// Single days in calendar order, Monday first
const ORDER: [DayFlags; 7] = [
    DayFlags::MONDAY,
    DayFlags::TUESDAY,
    DayFlags::WEDNESDAY,
    DayFlags::THURSDAY,
    DayFlags::FRIDAY,
    DayFlags::SATURDAY,
    DayFlags::SUNDAY,
];

const NAMES: [&str; 7] = ["mon", "tue", "wed", "thu", "fri", "sat", "sun"];

impl DayFlags {
    /// No days (0x00)
    pub const NONE: DayFlags = DayFlags(0x00);
    /// Monday (0x01)
    pub const MONDAY: DayFlags = DayFlags(0x01);
    /// Tuesday (0x02)
    pub const TUESDAY: DayFlags = DayFlags(0x02);
    /// Wednesday (0x04)
    pub const WEDNESDAY: DayFlags = DayFlags(0x04);
    /// Thursday (0x08)
    pub const THURSDAY: DayFlags = DayFlags(0x08);
    /// Friday (0x10)
    pub const FRIDAY: DayFlags = DayFlags(0x10);
    /// Saturday (0x20)
    pub const SATURDAY: DayFlags = DayFlags(0x20);
    /// Sunday (0x40)
    pub const SUNDAY: DayFlags = DayFlags(0x40);
    /// Week days, Monday to Friday (0x1F)
    pub const WEEKDAYS: DayFlags = DayFlags(
        Self::MONDAY.0 | Self::TUESDAY.0 | Self::WEDNESDAY.0 | Self::THURSDAY.0 | Self::FRIDAY.0,
    );
    /// Weekend days, Saturday and Sunday (0x60)
    pub const WEEKEND: DayFlags = DayFlags(Self::SATURDAY.0 | Self::SUNDAY.0);
    /// All days (0x7F)
    pub const ALL: DayFlags = DayFlags(Self::WEEKDAYS.0 | Self::WEEKEND.0);

    /// Builds a mask from raw bits, rejecting bits outside the week
    pub fn from_bits(bits: u8) -> Result<Self> {
        if bits & !Self::ALL.0 != 0 {
            return Err(Error::InvalidDays(format!(
                "mask {:#04x} has bits outside {:#04x}",
                bits,
                Self::ALL.0
            )));
        }
        Ok(DayFlags(bits))
    }

    /// Builds a mask from raw bits, dropping bits outside the week
    pub const fn from_bits_truncate(bits: u8) -> Self {
        DayFlags(bits & Self::ALL.0)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn union(self, other: DayFlags) -> DayFlags {
        DayFlags(self.0 | other.0)
    }

    /// True if every day of `other` is in this set
    pub const fn contains(self, other: DayFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn add(&mut self, days: DayFlags) {
        self.0 |= days.0;
    }

    /// Removes `days`; days that are not set are ignored
    pub fn remove(&mut self, days: DayFlags) {
        self.0 &= !days.0;
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn len(self) -> u32 {
        self.0.count_ones()
    }

    /// Iterates over the single days in the set, Monday first
    pub fn iter(self) -> impl Iterator<Item = DayFlags> {
        ORDER.into_iter().filter(move |day| self.contains(*day))
    }

    /// Position of a single day in `ORDER`
    fn position(self) -> Result<usize> {
        ORDER
            .iter()
            .position(|day| *day == self)
            .ok_or(Error::NotSingleDay(self.0))
    }

    /// The calendar day after this one, Sunday wraps to Monday.
    ///
    /// Only defined for a mask holding exactly one day.
    pub fn successor(self) -> Result<DayFlags> {
        let index = self.position()?;
        Ok(ORDER[(index + 1) % ORDER.len()])
    }

    pub fn from_weekday(weekday: Weekday) -> DayFlags {
        ORDER[weekday.num_days_from_monday() as usize]
    }

    /// Converts a single-day mask back into a `Weekday`
    pub fn to_weekday(self) -> Result<Weekday> {
        let weekday = match self.position()? {
            0 => Weekday::Mon,
            1 => Weekday::Tue,
            2 => Weekday::Wed,
            3 => Weekday::Thu,
            4 => Weekday::Fri,
            5 => Weekday::Sat,
            _ => Weekday::Sun,
        };
        Ok(weekday)
    }
}

impl BitOr for DayFlags {
    type Output = DayFlags;

    fn bitor(self, rhs: DayFlags) -> DayFlags {
        self.union(rhs)
    }
}

impl BitOrAssign for DayFlags {
    fn bitor_assign(&mut self, rhs: DayFlags) {
        self.add(rhs);
    }
}

impl From<Weekday> for DayFlags {
    fn from(weekday: Weekday) -> Self {
        DayFlags::from_weekday(weekday)
    }
}

impl TryFrom<u8> for DayFlags {
    type Error = Error;

    fn try_from(bits: u8) -> Result<Self> {
        DayFlags::from_bits(bits)
    }
}

impl From<DayFlags> for u8 {
    fn from(days: DayFlags) -> u8 {
        days.0
    }
}

impl FromIterator<DayFlags> for DayFlags {
    fn from_iter<I: IntoIterator<Item = DayFlags>>(iter: I) -> Self {
        iter.into_iter().fold(DayFlags::NONE, DayFlags::union)
    }
}

/// Parses `mon`, `monday`, `weekdays`, `weekend`, `all`, `none` and comma
/// separated combinations such as `mon,wed,fri`
impl FromStr for DayFlags {
    type Err = Error;

    fn from_str(days: &str) -> Result<Self> {
        let mut combined = DayFlags::NONE;
        for part in days.split(',') {
            let day = match part.trim().to_lowercase().as_str() {
                "mon" | "monday" => DayFlags::MONDAY,
                "tue" | "tuesday" => DayFlags::TUESDAY,
                "wed" | "wednesday" => DayFlags::WEDNESDAY,
                "thu" | "thursday" => DayFlags::THURSDAY,
                "fri" | "friday" => DayFlags::FRIDAY,
                "sat" | "saturday" => DayFlags::SATURDAY,
                "sun" | "sunday" => DayFlags::SUNDAY,
                "all" => DayFlags::ALL,
                "weekdays" => DayFlags::WEEKDAYS,
                "weekend" => DayFlags::WEEKEND,
                "none" => DayFlags::NONE,
                other => return Err(Error::InvalidDays(format!("unknown day '{}'", other))),
            };
            combined |= day;
        }
        Ok(combined)
    }
}

impl fmt::Display for DayFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            DayFlags::NONE => write!(f, "none"),
            DayFlags::ALL => write!(f, "all"),
            DayFlags::WEEKDAYS => write!(f, "weekdays"),
            DayFlags::WEEKEND => write!(f, "weekend"),
            days => {
                let names: Vec<&str> = ORDER
                    .iter()
                    .zip(NAMES)
                    .filter(|(day, _)| days.contains(**day))
                    .map(|(_, name)| name)
                    .collect();
                write!(f, "{}", names.join(","))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WEEK: [Weekday; 7] = [
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
        Weekday::Sat,
        Weekday::Sun,
    ];

    #[test]
    fn successor_wraps_around_the_week() {
        assert_eq!(DayFlags::SUNDAY.successor().unwrap(), DayFlags::MONDAY);
        assert_eq!(DayFlags::FRIDAY.successor().unwrap(), DayFlags::SATURDAY);
        assert_eq!(DayFlags::SATURDAY.successor().unwrap(), DayFlags::SUNDAY);
    }

    #[test]
    fn successor_seven_times_is_identity() {
        for day in ORDER {
            let mut current = day;
            for _ in 0..7 {
                current = current.successor().unwrap();
            }
            assert_eq!(current, day);
        }
    }

    #[test]
    fn successor_rejects_non_single_masks() {
        assert!(matches!(
            DayFlags::NONE.successor(),
            Err(Error::NotSingleDay(0))
        ));
        assert!(matches!(
            DayFlags::WEEKEND.successor(),
            Err(Error::NotSingleDay(0x60))
        ));
    }

    #[test]
    fn weekday_round_trip() {
        for weekday in WEEK {
            assert_eq!(DayFlags::from_weekday(weekday).to_weekday().unwrap(), weekday);
        }
        for day in ORDER {
            assert_eq!(DayFlags::from_weekday(day.to_weekday().unwrap()), day);
        }
    }

    #[test]
    fn add_then_remove_on_empty_mask_is_empty() {
        for day in ORDER {
            let mut days = DayFlags::NONE;
            days.add(day);
            assert!(days.contains(day));
            days.remove(day);
            assert!(days.is_empty());
        }
    }

    #[test]
    fn remove_of_absent_day_is_noop() {
        for bits in 0..=DayFlags::ALL.bits() {
            for day in ORDER {
                let mut days = DayFlags::from_bits_truncate(bits);
                if days.contains(day) {
                    continue;
                }
                let before = days;
                days.remove(day);
                assert_eq!(days, before);
            }
        }
    }

    #[test]
    fn derived_constants_are_unions() {
        assert_eq!(DayFlags::ALL.bits(), 0x7f);
        assert_eq!(DayFlags::WEEKDAYS.bits(), 0x1f);
        assert_eq!(DayFlags::WEEKDAYS | DayFlags::WEEKEND, DayFlags::ALL);
        assert_eq!(DayFlags::ALL.len(), 7);
        assert_eq!(DayFlags::ALL.iter().collect::<DayFlags>(), DayFlags::ALL);
    }

    #[test]
    fn from_bits_rejects_high_bit() {
        assert!(DayFlags::from_bits(0x80).is_err());
        assert_eq!(DayFlags::from_bits_truncate(0xff), DayFlags::ALL);
    }

    #[test]
    fn parse_and_display() {
        assert_eq!("weekdays".parse::<DayFlags>().unwrap(), DayFlags::WEEKDAYS);
        assert_eq!(
            "Mon, wed,FRIDAY".parse::<DayFlags>().unwrap(),
            DayFlags::MONDAY | DayFlags::WEDNESDAY | DayFlags::FRIDAY
        );
        assert!("funday".parse::<DayFlags>().is_err());

        assert_eq!((DayFlags::MONDAY | DayFlags::SUNDAY).to_string(), "mon,sun");
        assert_eq!(DayFlags::NONE.to_string(), "none");
        assert_eq!(DayFlags::WEEKEND.to_string(), "weekend");
    }
}
