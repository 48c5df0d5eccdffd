//! Request/response types for the HTTP boundary.
//!
//! Shared by [`crate::service::ControlService`] and the axum handlers so the
//! JSON shapes are defined once.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::schedule::ShiftSchedule;
use crate::types::{
    CheckDirection, CheckStatus, EventEntry, MedicalCheckView, MedicalStatus, Notification,
    Person, ShiftInfo, ShiftResetLogEntry, ShiftType,
};

// ── Shift ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct ShiftView {
    pub shift_type: ShiftType,
    pub shift_label: String,
    pub check_direction: CheckDirection,
    pub direction_label: String,
    pub shift_date: NaiveDate,
}

impl From<ShiftInfo> for ShiftView {
    fn from(shift: ShiftInfo) -> Self {
        Self {
            shift_type: shift.shift_type,
            shift_label: shift.shift_type.label().to_string(),
            check_direction: shift.check_direction,
            direction_label: shift.check_direction.label().to_string(),
            shift_date: shift.shift_date,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CurrentShiftResponse {
    #[serde(flatten)]
    pub shift: ShiftView,
    pub schedule: ShiftSchedule,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScheduleResponse {
    pub schedule: ShiftSchedule,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScheduleSaved {
    pub message: String,
    pub schedule: ShiftSchedule,
}

// ── Medical checks ────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NewCheckRequest {
    pub personnel_id: Option<i64>,
    pub check_type: Option<String>,
    pub blood_pressure: String,
    pub pulse: i32,
    pub alcohol_level: f64,
    pub temperature: f64,
    pub doctor_name: String,
    pub notes: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckRecorded {
    pub id: i64,
    pub status: CheckStatus,
    #[serde(flatten)]
    pub shift: ShiftView,
    pub message: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ScanRequest {
    pub code: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DenyRequest {
    pub code: String,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanResult {
    Passed,
    Denied,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScannedPerson {
    pub id: i64,
    pub full_name: String,
    pub personal_code: String,
    pub position: String,
    pub department: String,
    pub organization: String,
    pub old_medical: MedicalStatus,
    pub new_medical: MedicalStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanOutcome {
    pub result: ScanResult,
    pub check_id: i64,
    #[serde(flatten)]
    pub shift: ShiftView,
    pub person: ScannedPerson,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChecksResponse {
    pub checks: Vec<MedicalCheckView>,
    pub total: usize,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StatsQuery {
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LimitQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResetsResponse {
    pub resets: Vec<ShiftResetLogEntry>,
}

// ── Personnel ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct PersonnelResponse {
    pub personnel: Vec<Person>,
    pub total: usize,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SearchQuery {
    pub q: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub results: Vec<Person>,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct PersonCreated {
    pub id: i64,
    pub personal_code: String,
    pub qr_code: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StatusUpdate {
    pub status: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryResponse {
    pub history: Vec<EventEntry>,
}

// ── Events / notifications ────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct EventsResponse {
    pub events: Vec<EventEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NotificationsQuery {
    /// `1`/`true` lists unread notifications only.
    pub unread: Option<String>,
    pub limit: Option<i64>,
}

impl NotificationsQuery {
    pub fn unread_only(&self) -> bool {
        matches!(self.unread.as_deref(), Some("1") | Some("true"))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NotificationsResponse {
    pub notifications: Vec<Notification>,
    pub unread: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub message: String,
}

impl Message {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MarkedRead {
    pub message: String,
    pub count: u64,
}
