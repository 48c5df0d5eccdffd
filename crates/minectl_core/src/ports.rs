//! Port traits: the storage seams the services and the reconciler run against.
//!
//! Implemented by `minectl_postgres::PgStores` in production and by
//! [`crate::memory::MemoryStore`] in tests and local runs.

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use crate::error::ControlError;
use crate::schedule::ShiftSchedule;
use crate::types::*;

pub type Result<T> = std::result::Result<T, ControlError>;

/// Key-value settings; only the shift schedule lives here today.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Raw stored schedule value, `None` when never configured.
    async fn load_shift_schedule(&self) -> Result<Option<JsonValue>>;
    async fn save_shift_schedule(&self, schedule: &ShiftSchedule) -> Result<()>;
}

/// Shift-start medical reset and its idempotency log.
#[async_trait]
pub trait ResetStore: Send + Sync {
    /// Whether the reset for this window has already been recorded.
    async fn reset_applied(&self, shift: &ShiftInfo) -> Result<bool>;

    /// In one transaction: claim the `(shift_type, shift_date)` log row, reset
    /// every non-archived person whose medical status is not `pending`, record
    /// the count on the log row and, when the count is non-zero, append the
    /// reset event and notification built by [`crate::reconciler::reset_notice`].
    ///
    /// Returns [`ResetApplication::AlreadyApplied`] without writing anything
    /// when the row is already claimed. Any error leaves no trace.
    async fn apply_reset(&self, shift: &ShiftInfo) -> Result<ResetApplication>;

    async fn list_resets(&self, limit: i64) -> Result<Vec<ShiftResetLogEntry>>;
}

#[async_trait]
pub trait PersonnelStore: Send + Sync {
    async fn list_personnel(&self, filter: &PersonnelFilter) -> Result<Vec<Person>>;
    async fn search_personnel(&self, query: &str, limit: i64) -> Result<Vec<Person>>;
    /// Non-archived person by id.
    async fn get_person(&self, id: i64) -> Result<Option<Person>>;
    /// Non-archived person whose personal code or QR code equals `code`.
    async fn find_by_code(&self, code: &str) -> Result<Option<Person>>;
    /// Create with derived codes, status `arrived`, medical `pending`, plus an
    /// `arrival` event.
    async fn add_person(&self, person: &NewPerson) -> Result<Person>;
    /// Apply every part of `write` atomically. Returns the inserted medical
    /// check id when the write carried one. `NotFound` when the person does
    /// not exist.
    async fn apply_write(&self, write: &PersonnelWrite) -> Result<Option<i64>>;
    async fn personnel_stats(&self) -> Result<PersonnelStats>;
}

#[async_trait]
pub trait MedicalCheckStore: Send + Sync {
    /// Checks of visible, non-archived persons, newest first.
    async fn list_checks(&self, filter: &CheckFilter) -> Result<Vec<MedicalCheckView>>;
    /// Like [`Self::list_checks`] without the visibility and limit rules;
    /// ordered by shift date then check time, newest first.
    async fn export_checks(&self, filter: &CheckFilter) -> Result<Vec<MedicalCheckView>>;
    async fn medical_stats(&self, range: StatsRange) -> Result<MedicalStats>;
}

/// Audit trail and dispatcher notifications.
#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn list_events(&self, limit: i64) -> Result<Vec<EventEntry>>;
    async fn person_history(&self, person_id: i64, limit: i64) -> Result<Vec<EventEntry>>;
    /// Notifications newest first, plus the total unread count.
    async fn list_notifications(
        &self,
        unread_only: bool,
        limit: i64,
    ) -> Result<(Vec<Notification>, i64)>;
    /// `false` when no notification has this id.
    async fn mark_notification_read(&self, id: i64) -> Result<bool>;
    async fn mark_all_notifications_read(&self) -> Result<u64>;
}
