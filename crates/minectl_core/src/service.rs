//! ControlService: the operations behind every HTTP route.
//!
//! Takes port traits via `Arc<dyn ...>` so the same logic runs against
//! Postgres or [`crate::memory::MemoryStore`]. Each write a request makes is
//! collected into one [`PersonnelWrite`] and applied atomically by the store.

use std::str::FromStr;
use std::sync::Arc;

use chrono::{FixedOffset, NaiveDate};
use tracing::info;

use crate::error::ControlError;
use crate::ports::{
    AuditStore, MedicalCheckStore, PersonnelStore, ResetStore, Result, SettingsStore,
};
use crate::proto::*;
use crate::reconciler::{effective_schedule, MedicalResetReconciler, ReconcileOutcome};
use crate::schedule::{ScheduleUpdate, ShiftSchedule};
use crate::shift::{current_shift, Clock};
use crate::types::*;
use crate::vitals::{parse_badge_code, Vitals};

pub const SEARCH_LIMIT: i64 = 20;
pub const HISTORY_LIMIT: i64 = 50;
pub const DEFAULT_EVENTS_LIMIT: i64 = 20;
pub const DEFAULT_NOTIFICATIONS_LIMIT: i64 = 30;
pub const DEFAULT_RESETS_LIMIT: i64 = 30;
pub const MAX_FEED_LIMIT: i64 = 100;

const SCAN_DOCTOR: &str = "QR scan";
const MANUAL_DOCTOR: &str = "Manual edit";
const NO_REASON: &str = "No reason given";

fn feed_limit(requested: Option<i64>, default: i64) -> i64 {
    requested.unwrap_or(default).clamp(1, MAX_FEED_LIMIT)
}

/// Every port the service needs. A single store type implementing all of
/// them can be shared with [`Stores::shared`].
#[derive(Clone)]
pub struct Stores {
    pub settings: Arc<dyn SettingsStore>,
    pub resets: Arc<dyn ResetStore>,
    pub personnel: Arc<dyn PersonnelStore>,
    pub checks: Arc<dyn MedicalCheckStore>,
    pub audit: Arc<dyn AuditStore>,
}

impl Stores {
    pub fn shared<S>(store: Arc<S>) -> Self
    where
        S: SettingsStore + ResetStore + PersonnelStore + MedicalCheckStore + AuditStore + 'static,
    {
        Self {
            settings: store.clone(),
            resets: store.clone(),
            personnel: store.clone(),
            checks: store.clone(),
            audit: store,
        }
    }
}

pub struct ControlService {
    stores: Stores,
    clock: Arc<dyn Clock>,
    reconciler: Arc<MedicalResetReconciler>,
}

impl ControlService {
    pub fn new(stores: Stores, clock: Arc<dyn Clock>) -> Self {
        let reconciler = Arc::new(MedicalResetReconciler::new(
            stores.settings.clone(),
            stores.resets.clone(),
            clock.clone(),
        ));
        Self {
            stores,
            clock,
            reconciler,
        }
    }

    pub fn reconciler(&self) -> Arc<MedicalResetReconciler> {
        self.reconciler.clone()
    }

    /// Apply a pending shift reset before a write that sets `medical_status`,
    /// so the reset can never land after a clearance made in the same window.
    async fn reconcile_first(&self) {
        self.reconciler.reconcile_best_effort().await;
    }

    async fn shift_now(&self) -> ShiftInfo {
        let schedule = effective_schedule(self.stores.settings.as_ref()).await;
        current_shift(self.clock.as_ref(), &schedule)
    }

    fn site_today(&self) -> NaiveDate {
        self.clock.now().date_naive()
    }

    /// The site's UTC offset, for rendering stored UTC timestamps.
    pub fn site_offset(&self) -> FixedOffset {
        *self.clock.now().offset()
    }

    // ── Shift & schedule ─────────────────────────────────────

    pub async fn current_shift(&self) -> CurrentShiftResponse {
        let schedule = effective_schedule(self.stores.settings.as_ref()).await;
        let shift = current_shift(self.clock.as_ref(), &schedule);
        CurrentShiftResponse {
            shift: shift.into(),
            schedule,
        }
    }

    pub async fn schedule(&self) -> ShiftSchedule {
        effective_schedule(self.stores.settings.as_ref()).await
    }

    pub async fn save_schedule(&self, update: &ScheduleUpdate) -> Result<ScheduleSaved> {
        let schedule = ShiftSchedule::from_update(update)?;
        self.stores.settings.save_shift_schedule(&schedule).await?;
        info!(
            day_start = %schedule.day_start,
            day_end = %schedule.day_end,
            "Shift schedule updated"
        );
        Ok(ScheduleSaved {
            message: "Shift schedule saved".into(),
            schedule,
        })
    }

    // ── Reset ────────────────────────────────────────────────

    pub async fn reset_now(&self) -> Result<ReconcileOutcome> {
        self.reconciler.reconcile().await
    }

    pub async fn list_resets(&self, limit: Option<i64>) -> Result<ResetsResponse> {
        let resets = self
            .stores
            .resets
            .list_resets(feed_limit(limit, DEFAULT_RESETS_LIMIT))
            .await?;
        Ok(ResetsResponse { resets })
    }

    // ── Medical checks ───────────────────────────────────────

    pub async fn list_checks(&self, filter: &CheckFilter) -> Result<ChecksResponse> {
        let checks = self.stores.checks.list_checks(filter).await?;
        Ok(ChecksResponse {
            total: checks.len(),
            checks,
        })
    }

    pub async fn export_checks(&self, filter: &CheckFilter) -> Result<Vec<MedicalCheckView>> {
        self.stores.checks.export_checks(filter).await
    }

    /// Without bounds the period is the current site date.
    pub async fn medical_stats(&self, query: &StatsQuery) -> Result<MedicalStats> {
        let range = match (query.date_from, query.date_to) {
            (None, None) => {
                let today = self.site_today();
                StatsRange {
                    from: Some(today),
                    to: Some(today),
                }
            }
            (from, to) => StatsRange { from, to },
        };
        self.stores.checks.medical_stats(range).await
    }

    pub async fn record_check(&self, request: &NewCheckRequest) -> Result<CheckRecorded> {
        let person_id = request
            .personnel_id
            .ok_or_else(|| ControlError::invalid("personnel_id is required"))?;
        let status = Vitals {
            blood_pressure: request.blood_pressure.clone(),
            alcohol_level: request.alcohol_level,
            temperature: request.temperature,
        }
        .evaluate()?;
        self.reconcile_first().await;
        let person = self.require_person(person_id).await?;
        let shift = self.shift_now().await;

        let check_id = self
            .stores
            .personnel
            .apply_write(&PersonnelWrite {
                person_id,
                edit: PersonEdit {
                    medical_status: Some(status.medical_status()),
                    ..Default::default()
                },
                medical_check: Some(NewMedicalCheck {
                    check_type: request
                        .check_type
                        .clone()
                        .filter(|t| !t.trim().is_empty())
                        .unwrap_or_else(|| "pre_shift".into()),
                    status,
                    blood_pressure: request.blood_pressure.clone(),
                    pulse: request.pulse,
                    alcohol_level: request.alcohol_level,
                    temperature: request.temperature,
                    doctor_name: request.doctor_name.clone(),
                    notes: request.notes.clone(),
                    shift,
                }),
                events: vec![check_event(&person, status, &shift)],
                notification: None,
            })
            .await?
            .ok_or_else(|| ControlError::Internal(anyhow::anyhow!("check id not returned")))?;

        info!(person_id, check_id, status = %status, "Medical check recorded");
        Ok(CheckRecorded {
            id: check_id,
            status,
            shift: shift.into(),
            message: format!(
                "Medical check recorded. Result: {}",
                status.csv_label().to_lowercase()
            ),
        })
    }

    /// Badge scan at the medical post: the worker is admitted.
    pub async fn scan(&self, request: &ScanRequest) -> Result<ScanOutcome> {
        self.reconcile_first().await;
        let person = self.person_by_badge(&request.code).await?;
        let shift = self.shift_now().await;
        let status = CheckStatus::Passed;

        let check_id = self
            .record_badge_check(
                &person,
                status,
                &shift,
                shift.describe(),
                vec![check_event(&person, status, &shift)],
                None,
            )
            .await?;

        Ok(ScanOutcome {
            result: ScanResult::Passed,
            check_id,
            shift: shift.into(),
            message: format!(
                "{}: medical check passed ({}, {})",
                person.full_name,
                shift.shift_type.label(),
                shift.check_direction.label()
            ),
            person: scanned(&person, MedicalStatus::Passed),
        })
    }

    /// Badge scan where the medic refuses admission.
    pub async fn deny(&self, request: &DenyRequest) -> Result<ScanOutcome> {
        self.reconcile_first().await;
        let person = self.person_by_badge(&request.code).await?;
        let shift = self.shift_now().await;
        let reason = match request.reason.trim() {
            "" => NO_REASON,
            reason => reason,
        };
        let window = format!(
            "{}, {}",
            shift.shift_type.label(),
            shift.check_direction.label()
        );

        let event = NewEvent::new(
            event_types::MEDICAL_FAIL,
            format!(
                "{}: medical check denied, {reason} ({window})",
                person.full_name
            ),
            Some(person.id),
        );
        let notification = NewNotification {
            kind: notification_types::MEDICAL_DENY.into(),
            title: "Medical check denied".into(),
            message: format!("{}: {reason} ({window})", person.full_name),
            person_name: Some(person.full_name.clone()),
            person_code: Some(person.personal_code.clone()),
        };
        let check_id = self
            .record_badge_check(
                &person,
                CheckStatus::Failed,
                &shift,
                format!("{reason} | {}", shift.describe()),
                vec![event],
                Some(notification),
            )
            .await?;

        info!(person_id = person.id, check_id, reason, "Medical admission denied");
        Ok(ScanOutcome {
            result: ScanResult::Denied,
            check_id,
            shift: shift.into(),
            message: format!("{}: denied, {reason} ({window})", person.full_name),
            person: scanned(&person, MedicalStatus::Failed),
        })
    }

    async fn person_by_badge(&self, raw: &str) -> Result<Person> {
        if raw.trim().is_empty() {
            return Err(ControlError::invalid("code is required"));
        }
        let code = parse_badge_code(raw);
        self.stores
            .personnel
            .find_by_code(&code)
            .await?
            .ok_or_else(|| ControlError::not_found(format!("no person with code {code}")))
    }

    async fn record_badge_check(
        &self,
        person: &Person,
        status: CheckStatus,
        shift: &ShiftInfo,
        notes: String,
        events: Vec<NewEvent>,
        notification: Option<NewNotification>,
    ) -> Result<i64> {
        self.stores
            .personnel
            .apply_write(&PersonnelWrite {
                person_id: person.id,
                edit: PersonEdit {
                    medical_status: Some(status.medical_status()),
                    ..Default::default()
                },
                medical_check: Some(NewMedicalCheck {
                    check_type: "pre_shift".into(),
                    status,
                    blood_pressure: String::new(),
                    pulse: 0,
                    alcohol_level: 0.0,
                    temperature: 0.0,
                    doctor_name: SCAN_DOCTOR.into(),
                    notes,
                    shift: *shift,
                }),
                events,
                notification,
            })
            .await?
            .ok_or_else(|| ControlError::Internal(anyhow::anyhow!("check id not returned")))
    }

    // ── Personnel ────────────────────────────────────────────

    pub async fn list_personnel(&self, filter: &PersonnelFilter) -> Result<PersonnelResponse> {
        let personnel = self.stores.personnel.list_personnel(filter).await?;
        Ok(PersonnelResponse {
            total: personnel.len(),
            personnel,
        })
    }

    pub async fn personnel_stats(&self) -> Result<PersonnelStats> {
        self.stores.personnel.personnel_stats().await
    }

    pub async fn search_personnel(&self, query: &SearchQuery) -> Result<SearchResponse> {
        let q = query.q.trim();
        if q.is_empty() {
            return Err(ControlError::invalid("search query is required"));
        }
        let results = self
            .stores
            .personnel
            .search_personnel(q, SEARCH_LIMIT)
            .await?;
        Ok(SearchResponse {
            total: results.len(),
            results,
        })
    }

    pub async fn add_person(&self, mut new: NewPerson) -> Result<PersonCreated> {
        new.full_name = new.full_name.trim().to_string();
        if new.full_name.is_empty() {
            return Err(ControlError::invalid("full_name is required"));
        }
        let person = self.stores.personnel.add_person(&new).await?;
        info!(person_id = person.id, code = %person.personal_code, "Person added");
        Ok(PersonCreated {
            id: person.id,
            personal_code: person.personal_code,
            qr_code: person.qr_code,
            message: "Person added".into(),
        })
    }

    pub async fn update_status(&self, id: i64, update: &StatusUpdate) -> Result<Message> {
        let raw = update.status.trim();
        if raw.is_empty() {
            return Err(ControlError::invalid("status is required"));
        }
        let status = PersonnelStatus::from_str(raw)
            .map_err(|_| ControlError::invalid(format!("unknown status {raw:?}")))?;
        let person = self.require_person(id).await?;

        self.stores
            .personnel
            .apply_write(&PersonnelWrite {
                person_id: id,
                edit: PersonEdit {
                    status: Some(status),
                    ..Default::default()
                },
                events: vec![NewEvent::new(
                    event_types::STATUS_CHANGE,
                    format!("{}: {}", person.full_name, status.event_phrase()),
                    Some(id),
                )],
                ..Default::default()
            })
            .await?;
        Ok(Message::new("Status updated"))
    }

    /// Partial edit. A changed medical status is treated as a manual medical
    /// decision and leaves the same trail a check at the medical post would.
    pub async fn edit_person(&self, id: i64, edit: PersonEdit) -> Result<Message> {
        let edit = edit.trimmed();
        let fields = edit.changed_fields();
        if fields.is_empty() {
            return Err(ControlError::invalid("no fields to update"));
        }
        if edit.medical_status.is_some() {
            self.reconcile_first().await;
        }
        let person = self.require_person(id).await?;

        let mut write = PersonnelWrite {
            person_id: id,
            edit: edit.clone(),
            ..Default::default()
        };

        if let Some(new_medical) = edit.medical_status.filter(|m| *m != person.medical_status) {
            let old_medical = person.medical_status;
            let change = format!("{} -> {}", old_medical.label(), new_medical.label());
            let check_status = match new_medical {
                MedicalStatus::Passed => Some(CheckStatus::Passed),
                MedicalStatus::Failed => Some(CheckStatus::Failed),
                MedicalStatus::Pending | MedicalStatus::Expiring => None,
            };
            if let Some(status) = check_status {
                write.medical_check = Some(NewMedicalCheck {
                    check_type: "manual".into(),
                    status,
                    blood_pressure: String::new(),
                    pulse: 0,
                    alcohol_level: 0.0,
                    temperature: 0.0,
                    doctor_name: MANUAL_DOCTOR.into(),
                    notes: format!("Manual change: {change}"),
                    shift: self.shift_now().await,
                });
            }
            let event_type = match check_status {
                Some(CheckStatus::Passed) => event_types::MEDICAL_PASS,
                Some(CheckStatus::Failed) => event_types::MEDICAL_FAIL,
                None => event_types::MEDICAL_RESET,
            };
            write.events.push(NewEvent::new(
                event_type,
                format!("{}: medical status changed {change}", person.full_name),
                Some(id),
            ));
            let (kind, title) = match check_status {
                Some(CheckStatus::Passed) => {
                    (notification_types::MEDICAL_PASS, "Medical status changed")
                }
                Some(CheckStatus::Failed) => {
                    (notification_types::MEDICAL_DENY, "Medical check denied")
                }
                None => (notification_types::MEDICAL_CHANGE, "Medical status reset"),
            };
            write.notification = Some(NewNotification {
                kind: kind.into(),
                title: title.into(),
                message: format!("{}: {change} (manual change)", person.full_name),
                person_name: Some(person.full_name.clone()),
                person_code: Some(person.personal_code.clone()),
            });
        }

        write.events.push(NewEvent::new(
            event_types::EDIT,
            format!("{}: data changed ({})", person.full_name, fields.join(", ")),
            Some(id),
        ));

        self.stores.personnel.apply_write(&write).await?;
        info!(person_id = id, fields = %fields.join(","), "Person edited");
        Ok(Message::new("Person updated"))
    }

    pub async fn person_history(&self, id: i64) -> Result<HistoryResponse> {
        let history = self
            .stores
            .audit
            .person_history(id, HISTORY_LIMIT)
            .await?;
        Ok(HistoryResponse { history })
    }

    async fn require_person(&self, id: i64) -> Result<Person> {
        self.stores
            .personnel
            .get_person(id)
            .await?
            .ok_or_else(|| ControlError::not_found(format!("person {id} not found")))
    }

    // ── Events & notifications ───────────────────────────────

    pub async fn list_events(&self, query: &LimitQuery) -> Result<EventsResponse> {
        let events = self
            .stores
            .audit
            .list_events(feed_limit(query.limit, DEFAULT_EVENTS_LIMIT))
            .await?;
        Ok(EventsResponse { events })
    }

    pub async fn list_notifications(
        &self,
        query: &NotificationsQuery,
    ) -> Result<NotificationsResponse> {
        let (notifications, unread) = self
            .stores
            .audit
            .list_notifications(
                query.unread_only(),
                feed_limit(query.limit, DEFAULT_NOTIFICATIONS_LIMIT),
            )
            .await?;
        Ok(NotificationsResponse {
            notifications,
            unread,
        })
    }

    pub async fn mark_notification_read(&self, id: i64) -> Result<Message> {
        if !self.stores.audit.mark_notification_read(id).await? {
            return Err(ControlError::not_found(format!(
                "notification {id} not found"
            )));
        }
        Ok(Message::new("Notification marked as read"))
    }

    pub async fn mark_all_notifications_read(&self) -> Result<MarkedRead> {
        let count = self.stores.audit.mark_all_notifications_read().await?;
        Ok(MarkedRead {
            message: "All notifications marked as read".into(),
            count,
        })
    }
}

fn check_event(person: &Person, status: CheckStatus, shift: &ShiftInfo) -> NewEvent {
    let (event_type, verb) = match status {
        CheckStatus::Passed => (event_types::MEDICAL_PASS, "passed"),
        CheckStatus::Failed => (event_types::MEDICAL_FAIL, "failed"),
    };
    NewEvent::new(
        event_type,
        format!(
            "{}: {verb} medical check ({}, {})",
            person.full_name,
            shift.shift_type.label(),
            shift.check_direction.label()
        ),
        Some(person.id),
    )
}

fn scanned(person: &Person, new_medical: MedicalStatus) -> ScannedPerson {
    ScannedPerson {
        id: person.id,
        full_name: person.full_name.clone(),
        personal_code: person.personal_code.clone(),
        position: person.position.clone(),
        department: person.department.clone(),
        organization: person.organization.clone(),
        old_medical: person.medical_status,
        new_medical,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::shift::FixedClock;
    use chrono::{DateTime, FixedOffset, TimeZone};

    fn at(h: u32, m: u32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(9 * 3600)
            .unwrap()
            .with_ymd_and_hms(2026, 3, 10, h, m, 0)
            .unwrap()
    }

    async fn service_at(h: u32, m: u32) -> (ControlService, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(FixedClock::new(at(h, m)));
        (ControlService::new(Stores::shared(store.clone()), clock), store)
    }

    async fn add(service: &ControlService, name: &str) -> i64 {
        service
            .add_person(NewPerson {
                full_name: name.into(),
                department: "Shaft 2".into(),
                ..Default::default()
            })
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn record_check_evaluates_vitals_and_stamps_shift() {
        let (service, store) = service_at(6, 0).await;
        let id = add(&service, "Anna").await;

        let recorded = service
            .record_check(&NewCheckRequest {
                personnel_id: Some(id),
                blood_pressure: "160/100".into(),
                temperature: 36.6,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(recorded.status, CheckStatus::Failed);
        assert_eq!(recorded.shift.shift_type, ShiftType::Day);
        assert_eq!(recorded.shift.check_direction, CheckDirection::ToShift);

        let person = store.get_person(id).await.unwrap().unwrap();
        assert_eq!(person.medical_status, MedicalStatus::Failed);
        let checks = service.list_checks(&CheckFilter::default()).await.unwrap();
        assert_eq!(checks.total, 1);
        assert_eq!(checks.checks[0].check_type, "pre_shift");
        let history = service.person_history(id).await.unwrap().history;
        assert_eq!(history[0].event_type, "medical_fail");
    }

    #[tokio::test]
    async fn record_check_rejects_missing_person() {
        let (service, _) = service_at(6, 0).await;
        let err = service
            .record_check(&NewCheckRequest::default())
            .await
            .unwrap_err();
        assert_eq!(err.http_status(), 400);

        let err = service
            .record_check(&NewCheckRequest {
                personnel_id: Some(99),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert_eq!(err.http_status(), 404);
    }

    #[tokio::test]
    async fn scan_accepts_qr_json_and_reports_old_status() {
        let (service, _) = service_at(18, 0).await;
        add(&service, "Anna").await;

        let outcome = service
            .scan(&ScanRequest {
                code: r#"{"code":"QR-MK-001"}"#.into(),
            })
            .await
            .unwrap();
        assert_eq!(outcome.result, ScanResult::Passed);
        assert_eq!(outcome.person.old_medical, MedicalStatus::Pending);
        assert_eq!(outcome.person.new_medical, MedicalStatus::Passed);
        assert_eq!(outcome.shift.shift_label, "Night");

        let checks = service.list_checks(&CheckFilter::default()).await.unwrap();
        assert_eq!(checks.checks[0].doctor_name, "QR scan");
        assert_eq!(checks.checks[0].notes, "Night / To shift");
    }

    #[tokio::test]
    async fn scan_of_unknown_or_empty_code_fails() {
        let (service, _) = service_at(18, 0).await;
        let err = service
            .scan(&ScanRequest {
                code: "MK-404".into(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.http_status(), 404);
        let err = service
            .scan(&ScanRequest { code: "  ".into() })
            .await
            .unwrap_err();
        assert_eq!(err.http_status(), 400);
    }

    #[tokio::test]
    async fn deny_records_failure_and_notifies_dispatch() {
        let (service, store) = service_at(12, 0).await;
        let id = add(&service, "Boris").await;

        let outcome = service
            .deny(&DenyRequest {
                code: "MK-001".into(),
                reason: String::new(),
            })
            .await
            .unwrap();
        assert_eq!(outcome.result, ScanResult::Denied);
        assert!(outcome.message.contains("No reason given"));

        let person = store.get_person(id).await.unwrap().unwrap();
        assert_eq!(person.medical_status, MedicalStatus::Failed);
        let notifications = service
            .list_notifications(&NotificationsQuery::default())
            .await
            .unwrap();
        assert_eq!(notifications.unread, 1);
        assert_eq!(notifications.notifications[0].kind, "medical_deny");
        assert_eq!(
            notifications.notifications[0].person_code.as_deref(),
            Some("MK-001")
        );
    }

    #[tokio::test]
    async fn manual_medical_edit_leaves_check_event_and_notification() {
        let (service, _) = service_at(6, 0).await;
        let id = add(&service, "Vera").await;

        service
            .edit_person(
                id,
                PersonEdit {
                    medical_status: Some(MedicalStatus::Passed),
                    room: Some(" 12 ".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let checks = service.list_checks(&CheckFilter::default()).await.unwrap();
        assert_eq!(checks.checks[0].check_type, "manual");
        assert_eq!(checks.checks[0].notes, "Manual change: pending -> passed");
        assert_eq!(checks.checks[0].shift_type, ShiftType::Day);

        let history = service.person_history(id).await.unwrap().history;
        let types: Vec<&str> = history.iter().map(|e| e.event_type.as_str()).collect();
        assert_eq!(types, vec!["edit", "medical_pass", "arrival"]);
        assert!(history[0].description.contains("room, medical_status"));

        let notifications = service
            .list_notifications(&NotificationsQuery::default())
            .await
            .unwrap();
        assert_eq!(notifications.notifications[0].kind, "medical_pass");
    }

    #[tokio::test]
    async fn edit_without_fields_or_of_archived_person_fails() {
        let (service, _) = service_at(6, 0).await;
        let id = add(&service, "Gleb").await;
        let err = service
            .edit_person(id, PersonEdit::default())
            .await
            .unwrap_err();
        assert_eq!(err.http_status(), 400);

        service
            .update_status(
                id,
                &StatusUpdate {
                    status: "archived".into(),
                },
            )
            .await
            .unwrap();
        let err = service
            .edit_person(
                id,
                PersonEdit {
                    room: Some("3".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.http_status(), 404);
    }

    #[tokio::test]
    async fn status_must_be_known() {
        let (service, _) = service_at(6, 0).await;
        let id = add(&service, "Gleb").await;
        let err = service
            .update_status(
                id,
                &StatusUpdate {
                    status: "on_vacation".into(),
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.http_status(), 400);

        service
            .update_status(
                id,
                &StatusUpdate {
                    status: "on_shift".into(),
                },
            )
            .await
            .unwrap();
        let history = service.person_history(id).await.unwrap().history;
        assert_eq!(history[0].description, "Gleb: went on shift");
    }

    #[tokio::test]
    async fn stats_default_to_the_site_date() {
        let (service, _) = service_at(6, 0).await;
        add(&service, "Anna").await;
        add(&service, "Boris").await;
        service
            .scan(&ScanRequest {
                code: "MK-001".into(),
            })
            .await
            .unwrap();

        let stats = service.medical_stats(&StatsQuery::default()).await.unwrap();
        assert_eq!(stats.period.passed, 1);
        assert_eq!(stats.by_shift.get("day_to_shift").map(|c| c.passed), Some(1));
        assert_eq!((stats.passed, stats.pending, stats.total), (1, 1, 2));

        let tomorrow = NaiveDate::from_ymd_opt(2026, 3, 11).unwrap();
        let stats = service
            .medical_stats(&StatsQuery {
                date_from: Some(tomorrow),
                date_to: None,
            })
            .await
            .unwrap();
        assert_eq!(stats.period.passed, 0);
    }

    #[tokio::test]
    async fn schedule_round_trips_through_settings() {
        let (service, _) = service_at(6, 0).await;
        assert_eq!(service.schedule().await, ShiftSchedule::default());

        let saved = service
            .save_schedule(&ScheduleUpdate {
                day_start: "07:00".into(),
                day_end: "19:00".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(service.schedule().await, saved.schedule);
        // 06:00 now falls before the day window.
        let current = service.current_shift().await;
        assert_eq!(current.shift.shift_type, ShiftType::Night);
    }

    #[tokio::test]
    async fn search_requires_a_query() {
        let (service, _) = service_at(6, 0).await;
        add(&service, "Anna Petrova").await;
        let err = service
            .search_personnel(&SearchQuery { q: " ".into() })
            .await
            .unwrap_err();
        assert_eq!(err.http_status(), 400);
        let found = service
            .search_personnel(&SearchQuery { q: "petro".into() })
            .await
            .unwrap();
        assert_eq!(found.total, 1);
    }

    #[tokio::test]
    async fn unknown_notification_is_not_found() {
        let (service, _) = service_at(6, 0).await;
        let err = service.mark_notification_read(7).await.unwrap_err();
        assert_eq!(err.http_status(), 404);
        let marked = service.mark_all_notifications_read().await.unwrap();
        assert_eq!(marked.count, 0);
    }

    #[tokio::test]
    async fn clearance_at_window_start_survives_the_next_tick() {
        let store = Arc::new(MemoryStore::new());
        let opened = at(5, 0) + chrono::Duration::seconds(10);
        let clock = Arc::new(FixedClock::new(opened));
        let service = ControlService::new(Stores::shared(store.clone()), clock.clone());
        let id = add(&service, "Anna").await;

        service
            .scan(&ScanRequest {
                code: "MK-001".into(),
            })
            .await
            .unwrap();
        clock.advance(chrono::Duration::seconds(40));
        let outcome = service.reconciler().reconcile_best_effort().await;

        assert!(matches!(outcome, Some(ReconcileOutcome::AlreadyApplied { .. })));
        let person = store.get_person(id).await.unwrap().unwrap();
        assert_eq!(person.medical_status, MedicalStatus::Passed);
    }

    #[tokio::test]
    async fn medical_writes_apply_the_pending_reset_first() {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(FixedClock::new(at(4, 0)));
        let service = ControlService::new(Stores::shared(store.clone()), clock.clone());
        let anna = add(&service, "Anna").await;
        let boris = add(&service, "Boris").await;
        for code in ["MK-001", "MK-002"] {
            service
                .scan(&ScanRequest { code: code.into() })
                .await
                .unwrap();
        }

        clock.set(at(6, 0));
        // Not a medical change, so the window stays unclaimed.
        service
            .edit_person(
                anna,
                PersonEdit {
                    room: Some("4".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(service.list_resets(None).await.unwrap().resets.is_empty());

        service
            .deny(&DenyRequest {
                code: "MK-002".into(),
                reason: "fever".into(),
            })
            .await
            .unwrap();
        let resets = service.list_resets(None).await.unwrap().resets;
        assert_eq!(resets.len(), 1);
        assert_eq!(resets[0].reset_count, 2);
        let anna = store.get_person(anna).await.unwrap().unwrap();
        let boris = store.get_person(boris).await.unwrap().unwrap();
        assert_eq!(anna.medical_status, MedicalStatus::Pending);
        assert_eq!(boris.medical_status, MedicalStatus::Failed);
    }
}
