//! Admission rules for a recorded medical check, and badge code parsing.

use crate::error::ControlError;
use crate::types::CheckStatus;

pub const MAX_TEMPERATURE: f64 = 37.0;
pub const SYSTOLIC_RANGE: std::ops::RangeInclusive<i32> = 90..=150;

/// Measurements entered by the medic.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Vitals {
    /// `"systolic/diastolic"`, or empty when not measured.
    pub blood_pressure: String,
    pub alcohol_level: f64,
    pub temperature: f64,
}

impl Vitals {
    /// Any alcohol, a fever or a systolic pressure outside the admitted range
    /// fails the check.
    pub fn evaluate(&self) -> Result<CheckStatus, ControlError> {
        let mut status = CheckStatus::Passed;
        if self.alcohol_level > 0.0 {
            status = CheckStatus::Failed;
        }
        if self.temperature > MAX_TEMPERATURE {
            status = CheckStatus::Failed;
        }
        if let Some(systolic) = self.systolic()? {
            if !SYSTOLIC_RANGE.contains(&systolic) {
                status = CheckStatus::Failed;
            }
        }
        Ok(status)
    }

    fn systolic(&self) -> Result<Option<i32>, ControlError> {
        let parts: Vec<&str> = self.blood_pressure.split('/').collect();
        if parts.len() != 2 {
            return Ok(None);
        }
        parts[0].trim().parse::<i32>().map(Some).map_err(|_| {
            ControlError::invalid(format!(
                "blood_pressure must look like 120/80, got {:?}",
                self.blood_pressure
            ))
        })
    }
}

/// Extract the badge code from a scanner payload. Scanners either send the
/// bare code or a JSON object `{"code": "..."}`.
pub fn parse_badge_code(raw: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(serde_json::Value::Object(map)) => match map.get("code") {
            Some(serde_json::Value::String(code)) => code.trim().to_string(),
            Some(other) => other.to_string(),
            None => raw.trim().to_string(),
        },
        _ => raw.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vitals(bp: &str, alcohol: f64, temperature: f64) -> Vitals {
        Vitals {
            blood_pressure: bp.into(),
            alcohol_level: alcohol,
            temperature,
        }
    }

    #[test]
    fn healthy_worker_passes() {
        assert_eq!(
            vitals("120/80", 0.0, 36.6).evaluate().unwrap(),
            CheckStatus::Passed
        );
    }

    #[test]
    fn any_alcohol_fails() {
        assert_eq!(
            vitals("120/80", 0.01, 36.6).evaluate().unwrap(),
            CheckStatus::Failed
        );
    }

    #[test]
    fn fever_fails_but_boundary_passes() {
        assert_eq!(
            vitals("", 0.0, 37.0).evaluate().unwrap(),
            CheckStatus::Passed
        );
        assert_eq!(
            vitals("", 0.0, 37.1).evaluate().unwrap(),
            CheckStatus::Failed
        );
    }

    #[test]
    fn systolic_range_is_inclusive() {
        assert_eq!(vitals("90/60", 0.0, 36.6).evaluate().unwrap(), CheckStatus::Passed);
        assert_eq!(vitals("150/95", 0.0, 36.6).evaluate().unwrap(), CheckStatus::Passed);
        assert_eq!(vitals("89/60", 0.0, 36.6).evaluate().unwrap(), CheckStatus::Failed);
        assert_eq!(vitals("151/95", 0.0, 36.6).evaluate().unwrap(), CheckStatus::Failed);
    }

    #[test]
    fn pressure_without_slash_is_ignored() {
        assert_eq!(vitals("high", 0.0, 36.6).evaluate().unwrap(), CheckStatus::Passed);
    }

    #[test]
    fn garbled_pressure_is_rejected() {
        assert!(matches!(
            vitals("abc/80", 0.0, 36.6).evaluate(),
            Err(ControlError::InvalidInput(_))
        ));
    }

    #[test]
    fn badge_code_from_qr_json_or_raw() {
        assert_eq!(parse_badge_code(r#"{"code": "MK-004"}"#), "MK-004");
        assert_eq!(parse_badge_code("  QR-MK-004 \n"), "QR-MK-004");
        assert_eq!(parse_badge_code(r#"{"id": 4}"#), r#"{"id": 4}"#);
        assert_eq!(parse_badge_code("17"), "17");
    }
}
