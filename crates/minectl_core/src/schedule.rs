//! Shift schedule: the four time-of-day boundaries administrators configure.
//!
//! The schedule is stored as a JSON settings record (`{"day_start": "05:00", ...}`).
//! Reading is lenient: anything missing or unparsable falls back to the
//! built-in default for that boundary. Saving is strict.

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::warn;

use crate::error::ControlError;

pub const SHIFT_SCHEDULE_KEY: &str = "shift_schedule";

const TIME_FORMAT: &str = "%H:%M";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShiftSchedule {
    #[serde(with = "hm")]
    pub day_start: NaiveTime,
    #[serde(with = "hm")]
    pub day_end: NaiveTime,
    #[serde(with = "hm")]
    pub night_start: NaiveTime,
    #[serde(with = "hm")]
    pub night_end: NaiveTime,
}

impl Default for ShiftSchedule {
    fn default() -> Self {
        let five = NaiveTime::from_hms_opt(5, 0, 0).unwrap_or_default();
        let seventeen = NaiveTime::from_hms_opt(17, 0, 0).unwrap_or_default();
        Self {
            day_start: five,
            day_end: seventeen,
            night_start: seventeen,
            night_end: five,
        }
    }
}

/// Body of a schedule update. Night boundaries default to the day boundaries.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ScheduleUpdate {
    pub day_start: String,
    pub day_end: String,
    pub night_start: String,
    pub night_end: String,
}

impl ShiftSchedule {
    /// Build a schedule from a stored settings value, field by field.
    pub fn from_settings_value(value: &JsonValue) -> Self {
        let defaults = Self::default();
        let field = |name: &str, fallback: NaiveTime| -> NaiveTime {
            match value.get(name).and_then(JsonValue::as_str) {
                Some(raw) => parse_hm(raw).unwrap_or_else(|| {
                    warn!("Invalid shift schedule boundary {name}={raw:?}, using default");
                    fallback
                }),
                None => fallback,
            }
        };
        Self {
            day_start: field("day_start", defaults.day_start),
            day_end: field("day_end", defaults.day_end),
            night_start: field("night_start", defaults.night_start),
            night_end: field("night_end", defaults.night_end),
        }
    }

    pub fn to_settings_value(&self) -> JsonValue {
        serde_json::json!({
            "day_start": format_hm(self.day_start),
            "day_end": format_hm(self.day_end),
            "night_start": format_hm(self.night_start),
            "night_end": format_hm(self.night_end),
        })
    }

    /// Validate an administrator's update.
    pub fn from_update(update: &ScheduleUpdate) -> Result<Self, ControlError> {
        let day_start = update.day_start.trim();
        let day_end = update.day_end.trim();
        if day_start.is_empty() || day_end.is_empty() {
            return Err(ControlError::invalid(
                "day_start and day_end of the day shift are required",
            ));
        }
        let required = |name: &str, raw: &str| {
            parse_hm(raw)
                .ok_or_else(|| ControlError::invalid(format!("{name} must be HH:MM, got {raw:?}")))
        };
        let day_start = required("day_start", day_start)?;
        let day_end = required("day_end", day_end)?;
        if day_start >= day_end {
            return Err(ControlError::invalid(
                "day_start must be earlier than day_end",
            ));
        }

        let night_start = match update.night_start.trim() {
            "" => day_end,
            raw => required("night_start", raw)?,
        };
        let night_end = match update.night_end.trim() {
            "" => day_start,
            raw => required("night_end", raw)?,
        };

        Ok(Self {
            day_start,
            day_end,
            night_start,
            night_end,
        })
    }
}

pub fn parse_hm(raw: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(raw.trim(), TIME_FORMAT).ok()
}

pub fn format_hm(time: NaiveTime) -> String {
    time.format(TIME_FORMAT).to_string()
}

mod hm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::format_hm(*time))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse_hm(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("expected HH:MM, got {raw:?}")))
    }
}
