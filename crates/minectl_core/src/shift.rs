//! Shift detector.
//!
//! Maps a site-local wall-clock instant and a [`ShiftSchedule`] to the active
//! shift window. Time of day is compared at minute resolution and every
//! boundary is closed-open, so an instant exactly on a boundary belongs to the
//! later window.
//!
//! The day shift is split at its midpoint: the first half is the arrival
//! (`to_shift`) check window, the second half the departure (`from_shift`)
//! window. The night shift spans midnight: from `day_end` to midnight it is
//! the arrival window of today's night shift, and from midnight to
//! `day_start` it is the departure window of *yesterday's* night shift.

use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, FixedOffset, NaiveTime, Timelike, Utc};

use crate::schedule::ShiftSchedule;
use crate::types::{CheckDirection, ShiftInfo, ShiftType};

/// Source of the current site-local time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<FixedOffset>;
}

/// Wall clock pinned to the site's fixed UTC offset, independent of the
/// host's local zone.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    offset: FixedOffset,
}

impl SystemClock {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.offset)
    }
}

/// Manually driven clock for tests and replay.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<FixedOffset>>,
}

impl FixedClock {
    pub fn new(now: DateTime<FixedOffset>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<FixedOffset>) {
        *self.instant() = now;
    }

    pub fn advance(&self, by: Duration) {
        *self.instant() += by;
    }

    // A panic elsewhere while holding the lock must not freeze the clock.
    fn instant(&self) -> MutexGuard<'_, DateTime<FixedOffset>> {
        self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<FixedOffset> {
        *self.instant()
    }
}

fn minute_of_day(time: NaiveTime) -> u32 {
    time.hour() * 60 + time.minute()
}

/// Determine `(shift_type, check_direction, shift_date)` for `now`.
pub fn detect_shift(now: DateTime<FixedOffset>, schedule: &ShiftSchedule) -> ShiftInfo {
    let current = minute_of_day(now.time());
    let day_start = minute_of_day(schedule.day_start);
    let day_end = minute_of_day(schedule.day_end);
    let today = now.date_naive();

    if day_start <= current && current < day_end {
        let midpoint = day_start + (day_end - day_start) / 2;
        let check_direction = if current < midpoint {
            CheckDirection::ToShift
        } else {
            CheckDirection::FromShift
        };
        return ShiftInfo {
            shift_type: ShiftType::Day,
            check_direction,
            shift_date: today,
        };
    }

    if current >= day_end {
        ShiftInfo {
            shift_type: ShiftType::Night,
            check_direction: CheckDirection::ToShift,
            shift_date: today,
        }
    } else {
        ShiftInfo {
            shift_type: ShiftType::Night,
            check_direction: CheckDirection::FromShift,
            shift_date: today.pred_opt().unwrap_or(today),
        }
    }
}

/// Detect the current shift from a clock.
pub fn current_shift(clock: &dyn Clock, schedule: &ShiftSchedule) -> ShiftInfo {
    detect_shift(clock.now(), schedule)
}
