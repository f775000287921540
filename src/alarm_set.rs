/*!
 # Alarm sets

 Several independent alarms combined into one schedule. The combined light
 output is whichever alarm wants it brightest.
*/

use std::sync::Arc;

use chrono::NaiveDateTime;

use crate::alarm::{Alarm, AlarmId};
use crate::days::DayFlags;
use crate::ramp::RampConfig;
use crate::{Error, Result};

/// Ordered collection of shared alarms
#[derive(Debug, Clone, Default)]
pub struct AlarmSet {
    alarms: Vec<Arc<Alarm>>,
}

impl AlarmSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, alarm: impl Into<Arc<Alarm>>) {
        self.alarms.push(alarm.into());
    }

    pub fn add_many<I, A>(&mut self, alarms: I)
    where
        I: IntoIterator<Item = A>,
        A: Into<Arc<Alarm>>,
    {
        self.alarms.extend(alarms.into_iter().map(Into::into));
    }

    /// Removes the first member that is this very alarm
    pub fn remove(&mut self, alarm: &Arc<Alarm>) -> bool {
        match self.alarms.iter().position(|a| Arc::ptr_eq(a, alarm)) {
            Some(index) => {
                self.alarms.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn remove_by_id(&mut self, id: AlarmId) -> Option<Arc<Alarm>> {
        let index = self.alarms.iter().position(|a| a.id() == Some(id))?;
        Some(self.alarms.remove(index))
    }

    pub fn len(&self) -> usize {
        self.alarms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alarms.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Alarm>> {
        self.alarms.iter()
    }

    /// Union of the target days of every member
    pub fn target_days(&self) -> DayFlags {
        self.alarms.iter().map(|a| a.target_days()).collect()
    }

    /// Days on which at least one member is scheduled; same as `target_days`
    pub fn active_days(&self) -> DayFlags {
        self.target_days()
    }

    /// True if any member is switched on
    pub fn is_active(&self) -> bool {
        self.alarms.iter().any(|a| a.is_active())
    }

    /// The member whose next target moment comes first.
    ///
    /// Members without target days are skipped; on equal moments the earlier
    /// inserted member wins. If no member has target days the first member is
    /// returned.
    pub fn nearest(&self, now: NaiveDateTime) -> Result<&Arc<Alarm>> {
        let first = self.alarms.first().ok_or(Error::EmptySet)?;

        let mut nearest: Option<(&Arc<Alarm>, NaiveDateTime)> = None;
        for alarm in &self.alarms {
            if alarm.target_days().is_empty() {
                continue;
            }
            let target = alarm.target_datetime(now)?;
            match nearest {
                Some((_, best)) if target >= best => {}
                _ => nearest = Some((alarm, target)),
            }
        }

        Ok(nearest.map_or(first, |(alarm, _)| alarm))
    }

    pub fn target_hour(&self, now: NaiveDateTime) -> Result<u8> {
        Ok(self.nearest(now)?.target_hour())
    }

    pub fn target_minute(&self, now: NaiveDateTime) -> Result<u8> {
        Ok(self.nearest(now)?.target_minute())
    }

    pub fn next_day(&self, now: NaiveDateTime) -> Result<DayFlags> {
        self.nearest(now)?.next_day(now)
    }

    /// The brightest level any member asks for, 0 for an empty set
    pub fn desired_brightness(&self, now: NaiveDateTime, ramp: &RampConfig) -> Result<u8> {
        self.alarms.iter().try_fold(0, |brightest, alarm| {
            Ok(brightest.max(alarm.desired_brightness(now, ramp)?))
        })
    }
}

impl<A: Into<Arc<Alarm>>> FromIterator<A> for AlarmSet {
    fn from_iter<I: IntoIterator<Item = A>>(iter: I) -> Self {
        let mut set = AlarmSet::new();
        set.add_many(iter);
        set
    }
}
