//! Domain types shared by the core, the Postgres adapter and the HTTP server.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

// ── Shift vocabulary ──────────────────────────────────────────

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ShiftType {
    Day,
    Night,
}

impl ShiftType {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Day => "Day",
            Self::Night => "Night",
        }
    }
}

/// Whether a check window is for workers entering or leaving the site.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CheckDirection {
    ToShift,
    FromShift,
}

impl CheckDirection {
    pub fn label(&self) -> &'static str {
        match self {
            Self::ToShift => "To shift",
            Self::FromShift => "From shift",
        }
    }
}

/// Result of shift detection: which window the site is in right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShiftInfo {
    pub shift_type: ShiftType,
    pub check_direction: CheckDirection,
    pub shift_date: NaiveDate,
}

impl ShiftInfo {
    pub fn is_shift_start(&self) -> bool {
        self.check_direction == CheckDirection::ToShift
    }

    /// Human readable "Day / To shift" pair used in check notes and events.
    pub fn describe(&self) -> String {
        format!(
            "{} / {}",
            self.shift_type.label(),
            self.check_direction.label()
        )
    }
}

// ── Personnel ─────────────────────────────────────────────────

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    AsRefStr,
    Display,
    EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MedicalStatus {
    #[default]
    Pending,
    Passed,
    Failed,
    Expiring,
}

impl MedicalStatus {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Passed => "passed",
            Self::Failed => "not passed",
            Self::Expiring => "expiring",
        }
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    AsRefStr,
    Display,
    EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PersonnelStatus {
    #[default]
    Arrived,
    OnShift,
    Departed,
    BusinessTrip,
    Archived,
}

impl PersonnelStatus {
    /// Phrase used in `status_change` audit events.
    pub fn event_phrase(&self) -> &'static str {
        match self {
            Self::Arrived => "arrived",
            Self::OnShift => "went on shift",
            Self::Departed => "departed",
            Self::BusinessTrip => "left on a business trip",
            Self::Archived => "archived",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub id: i64,
    pub personal_code: String,
    pub full_name: String,
    pub position: String,
    pub department: String,
    pub category: String,
    pub phone: String,
    pub room: String,
    pub status: PersonnelStatus,
    pub qr_code: String,
    pub medical_status: MedicalStatus,
    pub shift: String,
    pub organization: String,
    pub organization_type: String,
    #[serde(skip)]
    pub is_hidden: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Person {
    pub fn personal_code_for(id: i64) -> String {
        format!("MK-{id:03}")
    }

    pub fn qr_code_for(id: i64) -> String {
        format!("QR-MK-{id:03}")
    }

    pub fn is_active(&self) -> bool {
        self.status != PersonnelStatus::Archived
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NewPerson {
    pub full_name: String,
    pub position: String,
    pub department: String,
    pub category: Option<String>,
    pub phone: String,
    pub room: String,
    pub shift: String,
    pub organization: String,
    pub organization_type: String,
}

impl NewPerson {
    pub fn category_or_default(&self) -> &str {
        self.category.as_deref().unwrap_or("mine")
    }
}

/// Partial update of a person. `None` leaves the column untouched.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct PersonEdit {
    pub full_name: Option<String>,
    pub position: Option<String>,
    pub department: Option<String>,
    pub category: Option<String>,
    pub phone: Option<String>,
    pub room: Option<String>,
    pub shift: Option<String>,
    pub status: Option<PersonnelStatus>,
    pub medical_status: Option<MedicalStatus>,
    pub organization: Option<String>,
    pub organization_type: Option<String>,
}

impl PersonEdit {
    pub fn is_empty(&self) -> bool {
        self.changed_fields().is_empty()
    }

    pub fn changed_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        let text = [
            ("full_name", &self.full_name),
            ("position", &self.position),
            ("department", &self.department),
            ("category", &self.category),
            ("phone", &self.phone),
            ("room", &self.room),
            ("shift", &self.shift),
        ];
        for (name, value) in text {
            if value.is_some() {
                fields.push(name);
            }
        }
        if self.status.is_some() {
            fields.push("status");
        }
        if self.medical_status.is_some() {
            fields.push("medical_status");
        }
        if self.organization.is_some() {
            fields.push("organization");
        }
        if self.organization_type.is_some() {
            fields.push("organization_type");
        }
        fields
    }

    /// Trim every provided text field, as operators paste values from spreadsheets.
    pub fn trimmed(mut self) -> Self {
        for value in [
            &mut self.full_name,
            &mut self.position,
            &mut self.department,
            &mut self.category,
            &mut self.phone,
            &mut self.room,
            &mut self.shift,
            &mut self.organization,
            &mut self.organization_type,
        ] {
            if let Some(v) = value.as_mut() {
                *v = v.trim().to_string();
            }
        }
        self
    }

    /// Apply the edit to an in-memory person.
    pub fn apply_to(&self, person: &mut Person) {
        let text = [
            (&self.full_name, &mut person.full_name),
            (&self.position, &mut person.position),
            (&self.department, &mut person.department),
            (&self.category, &mut person.category),
            (&self.phone, &mut person.phone),
            (&self.room, &mut person.room),
            (&self.shift, &mut person.shift),
            (&self.organization, &mut person.organization),
            (&self.organization_type, &mut person.organization_type),
        ];
        for (value, target) in text {
            if let Some(v) = value {
                *target = v.clone();
            }
        }
        if let Some(status) = self.status {
            person.status = status;
        }
        if let Some(medical) = self.medical_status {
            person.medical_status = medical;
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PersonnelFilter {
    pub category: Option<String>,
    pub status: Option<String>,
    pub shift: Option<String>,
    pub organization_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PersonnelStats {
    pub total: i64,
    pub by_category: BTreeMap<String, i64>,
    pub by_status: BTreeMap<String, i64>,
    pub by_medical: BTreeMap<String, i64>,
    pub by_org_type: BTreeMap<String, i64>,
    pub by_organization: BTreeMap<String, i64>,
}

// ── Medical checks ────────────────────────────────────────────

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CheckStatus {
    Passed,
    Failed,
}

impl CheckStatus {
    pub fn medical_status(&self) -> MedicalStatus {
        match self {
            Self::Passed => MedicalStatus::Passed,
            Self::Failed => MedicalStatus::Failed,
        }
    }

    pub fn csv_label(&self) -> &'static str {
        match self {
            Self::Passed => "Admitted",
            Self::Failed => "Not admitted",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewMedicalCheck {
    pub check_type: String,
    pub status: CheckStatus,
    pub blood_pressure: String,
    pub pulse: i32,
    pub alcohol_level: f64,
    pub temperature: f64,
    pub doctor_name: String,
    pub notes: String,
    pub shift: ShiftInfo,
}

/// A medical check joined with the person it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MedicalCheckView {
    pub id: i64,
    pub check_type: String,
    pub status: CheckStatus,
    pub blood_pressure: String,
    pub pulse: i32,
    pub alcohol_level: f64,
    pub temperature: f64,
    pub doctor_name: String,
    pub checked_at: DateTime<Utc>,
    pub notes: String,
    pub person_name: String,
    pub person_code: String,
    pub department: String,
    pub organization: String,
    pub shift_type: ShiftType,
    pub shift_label: String,
    pub check_direction: CheckDirection,
    pub direction_label: String,
    pub shift_date: NaiveDate,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CheckFilter {
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub shift_type: Option<ShiftType>,
    pub direction: Option<CheckDirection>,
    pub limit: Option<i64>,
}

impl CheckFilter {
    pub const DEFAULT_LIMIT: i64 = 100;
    pub const MAX_LIMIT: i64 = 1000;

    pub fn effective_limit(&self) -> i64 {
        self.limit
            .unwrap_or(Self::DEFAULT_LIMIT)
            .clamp(1, Self::MAX_LIMIT)
    }

    pub fn matches(&self, shift: &ShiftInfo) -> bool {
        self.date_from.map_or(true, |d| shift.shift_date >= d)
            && self.date_to.map_or(true, |d| shift.shift_date <= d)
            && self.shift_type.map_or(true, |t| shift.shift_type == t)
            && self.direction.map_or(true, |d| shift.check_direction == d)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PassFailCounts {
    pub passed: i64,
    pub failed: i64,
}

impl PassFailCounts {
    pub fn add(&mut self, status: CheckStatus, count: i64) {
        match status {
            CheckStatus::Passed => self.passed += count,
            CheckStatus::Failed => self.failed += count,
        }
    }
}

/// Inclusive `shift_date` range for medical statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl StatsRange {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from.map_or(true, |d| date >= d) && self.to.map_or(true, |d| date <= d)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MedicalStats {
    pub period: PassFailCounts,
    /// Keyed by `<shift_type>_<check_direction>`.
    pub by_shift: BTreeMap<String, PassFailCounts>,
    pub passed: i64,
    pub failed: i64,
    pub pending: i64,
    pub total: i64,
}

// ── Audit log / notifications ─────────────────────────────────

pub mod event_types {
    pub const ARRIVAL: &str = "arrival";
    pub const STATUS_CHANGE: &str = "status_change";
    pub const EDIT: &str = "edit";
    pub const MEDICAL_PASS: &str = "medical_pass";
    pub const MEDICAL_FAIL: &str = "medical_fail";
    pub const MEDICAL_RESET: &str = "medical_reset";
}

pub mod notification_types {
    pub const MEDICAL_RESET: &str = "medical_reset";
    pub const MEDICAL_DENY: &str = "medical_deny";
    pub const MEDICAL_PASS: &str = "medical_pass";
    pub const MEDICAL_CHANGE: &str = "medical_change";
}

/// Display label for an audit event type. Unknown types (written by other
/// site modules) are shown verbatim.
pub fn event_type_label(event_type: &str) -> &str {
    match event_type {
        "scan_checkin" => "Checkpoint: checked in",
        "scan_denied" => "Checkpoint: denied",
        "medical_pass" => "Medical check passed",
        "medical_fail" => "Medical check failed",
        "medical_reset" => "Medical status reset",
        "arrival" => "Arrival",
        "departure" => "Departure",
        "status_change" => "Status change",
        "edit" => "Data edited",
        "shift_start" => "Shift start",
        "lantern_issued" => "Lantern issued",
        "lantern_returned" => "Lantern returned",
        other => other,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEvent {
    pub event_type: String,
    pub description: String,
    pub personnel_id: Option<i64>,
}

impl NewEvent {
    pub fn new(event_type: &str, description: impl Into<String>, personnel_id: Option<i64>) -> Self {
        Self {
            event_type: event_type.to_string(),
            description: description.into(),
            personnel_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventEntry {
    pub id: i64,
    #[serde(rename = "type")]
    pub event_type: String,
    pub type_label: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub person_name: Option<String>,
    pub person_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNotification {
    pub kind: String,
    pub title: String,
    pub message: String,
    pub person_name: Option<String>,
    pub person_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub message: String,
    pub person_name: Option<String>,
    pub person_code: Option<String>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

// ── Shift reset log ───────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShiftResetLogEntry {
    pub id: i64,
    pub shift_type: ShiftType,
    pub shift_date: NaiveDate,
    pub reset_count: i64,
    pub created_at: DateTime<Utc>,
}

/// Outcome of one attempt to apply the shift-start reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetApplication {
    /// This caller claimed the window and reset `reset_count` persons.
    Applied { reset_count: u64 },
    /// The window was already claimed, by an earlier or a concurrent caller.
    AlreadyApplied,
}

// ── Transactional personnel writes ────────────────────────────

/// Everything one personnel-facing request writes, applied atomically.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PersonnelWrite {
    pub person_id: i64,
    pub edit: PersonEdit,
    pub medical_check: Option<NewMedicalCheck>,
    pub events: Vec<NewEvent>,
    pub notification: Option<NewNotification>,
}
