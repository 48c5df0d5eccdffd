//! Row types decoded by sqlx, converted into core domain types.
//!
//! Enum columns are stored as snake_case text; conversion fails with a
//! message naming the column when the database holds an unknown value.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::FromRow;

use minectl_core::types::*;

fn parse_column<T: FromStr>(column: &str, raw: &str) -> Result<T, String> {
    T::from_str(raw).map_err(|_| format!("unexpected {column} value {raw:?}"))
}

#[derive(Debug, FromRow)]
pub(crate) struct PgPersonRow {
    pub id: i64,
    pub personal_code: String,
    pub full_name: String,
    pub position: String,
    pub department: String,
    pub category: String,
    pub phone: String,
    pub room: String,
    pub status: String,
    pub qr_code: String,
    pub medical_status: String,
    pub shift: String,
    pub organization: String,
    pub organization_type: String,
    pub is_hidden: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub(crate) const PERSON_COLUMNS: &str = "id, personal_code, full_name, position, department, \
     category, phone, room, status, qr_code, medical_status, shift, organization, \
     organization_type, is_hidden, created_at, updated_at";

impl TryFrom<PgPersonRow> for Person {
    type Error = String;

    fn try_from(row: PgPersonRow) -> Result<Self, Self::Error> {
        Ok(Person {
            id: row.id,
            personal_code: row.personal_code,
            full_name: row.full_name,
            position: row.position,
            department: row.department,
            category: row.category,
            phone: row.phone,
            room: row.room,
            status: parse_column("personnel.status", &row.status)?,
            qr_code: row.qr_code,
            medical_status: parse_column("personnel.medical_status", &row.medical_status)?,
            shift: row.shift,
            organization: row.organization,
            organization_type: row.organization_type,
            is_hidden: row.is_hidden,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct PgCheckViewRow {
    pub id: i64,
    pub check_type: String,
    pub status: String,
    pub blood_pressure: String,
    pub pulse: i32,
    pub alcohol_level: f64,
    pub temperature: f64,
    pub doctor_name: String,
    pub checked_at: DateTime<Utc>,
    pub notes: String,
    pub shift_type: String,
    pub check_direction: String,
    pub shift_date: NaiveDate,
    pub person_name: String,
    pub person_code: String,
    pub department: String,
    pub organization: String,
}

impl TryFrom<PgCheckViewRow> for MedicalCheckView {
    type Error = String;

    fn try_from(row: PgCheckViewRow) -> Result<Self, Self::Error> {
        let shift_type: ShiftType = parse_column("medical_checks.shift_type", &row.shift_type)?;
        let check_direction: CheckDirection =
            parse_column("medical_checks.check_direction", &row.check_direction)?;
        Ok(MedicalCheckView {
            id: row.id,
            check_type: row.check_type,
            status: parse_column("medical_checks.status", &row.status)?,
            blood_pressure: row.blood_pressure,
            pulse: row.pulse,
            alcohol_level: row.alcohol_level,
            temperature: row.temperature,
            doctor_name: row.doctor_name,
            checked_at: row.checked_at,
            notes: row.notes,
            person_name: row.person_name,
            person_code: row.person_code,
            department: row.department,
            organization: row.organization,
            shift_type,
            shift_label: shift_type.label().to_string(),
            check_direction,
            direction_label: check_direction.label().to_string(),
            shift_date: row.shift_date,
        })
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct PgEventRow {
    pub id: i64,
    pub event_type: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub person_name: Option<String>,
    pub person_code: Option<String>,
}

impl From<PgEventRow> for EventEntry {
    fn from(row: PgEventRow) -> Self {
        EventEntry {
            id: row.id,
            type_label: event_type_label(&row.event_type).to_string(),
            event_type: row.event_type,
            description: row.description,
            created_at: row.created_at,
            person_name: row.person_name,
            person_code: row.person_code,
        }
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct PgNotificationRow {
    pub id: i64,
    pub kind: String,
    pub title: String,
    pub message: String,
    pub person_name: Option<String>,
    pub person_code: Option<String>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

impl From<PgNotificationRow> for Notification {
    fn from(row: PgNotificationRow) -> Self {
        Notification {
            id: row.id,
            kind: row.kind,
            title: row.title,
            message: row.message,
            person_name: row.person_name,
            person_code: row.person_code,
            is_read: row.is_read,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct PgResetLogRow {
    pub id: i64,
    pub shift_type: String,
    pub shift_date: NaiveDate,
    pub reset_count: i64,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<PgResetLogRow> for ShiftResetLogEntry {
    type Error = String;

    fn try_from(row: PgResetLogRow) -> Result<Self, Self::Error> {
        Ok(ShiftResetLogEntry {
            id: row.id,
            shift_type: parse_column("shift_reset_log.shift_type", &row.shift_type)?,
            shift_date: row.shift_date,
            reset_count: row.reset_count,
            created_at: row.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person_row(status: &str) -> PgPersonRow {
        PgPersonRow {
            id: 3,
            personal_code: "MK-003".into(),
            full_name: "Anna".into(),
            position: String::new(),
            department: String::new(),
            category: "mine".into(),
            phone: String::new(),
            room: String::new(),
            status: status.into(),
            qr_code: "QR-MK-003".into(),
            medical_status: "passed".into(),
            shift: String::new(),
            organization: String::new(),
            organization_type: String::new(),
            is_hidden: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn person_row_parses_enum_columns() {
        let person = Person::try_from(person_row("business_trip")).unwrap();
        assert_eq!(person.status, PersonnelStatus::BusinessTrip);
        assert_eq!(person.medical_status, MedicalStatus::Passed);
    }

    #[test]
    fn unknown_status_names_the_column() {
        let err = Person::try_from(person_row("vacation")).unwrap_err();
        assert!(err.contains("personnel.status"));
    }

    #[test]
    fn event_row_gets_display_label() {
        let entry = EventEntry::from(PgEventRow {
            id: 1,
            event_type: "medical_reset".into(),
            description: "reset".into(),
            created_at: Utc::now(),
            person_name: None,
            person_code: None,
        });
        assert_eq!(entry.type_label, "Medical status reset");
    }
}
