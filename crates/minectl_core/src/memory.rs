//! In-memory implementation of every port.
//!
//! All state sits behind one `tokio::sync::Mutex`, so each port call is atomic
//! the same way a Postgres transaction is. Backs the unit tests and the HTTP
//! route tests.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use tokio::sync::Mutex;

use crate::error::ControlError;
use crate::ports::{
    AuditStore, MedicalCheckStore, PersonnelStore, ResetStore, Result, SettingsStore,
};
use crate::reconciler::reset_notice;
use crate::schedule::ShiftSchedule;
use crate::types::*;

#[derive(Debug, Clone)]
struct StoredCheck {
    id: i64,
    personnel_id: i64,
    check: NewMedicalCheck,
    checked_at: DateTime<Utc>,
    is_hidden: bool,
}

#[derive(Debug, Clone)]
struct StoredEvent {
    id: i64,
    event: NewEvent,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct MemoryState {
    settings: HashMap<String, JsonValue>,
    personnel: BTreeMap<i64, Person>,
    checks: Vec<StoredCheck>,
    events: Vec<StoredEvent>,
    notifications: Vec<Notification>,
    resets: Vec<ShiftResetLogEntry>,
    next_check_id: i64,
    next_event_id: i64,
    next_notification_id: i64,
    next_reset_id: i64,
}

impl MemoryState {
    fn next(counter: &mut i64) -> i64 {
        *counter += 1;
        *counter
    }

    fn push_event(&mut self, event: NewEvent) {
        let id = Self::next(&mut self.next_event_id);
        self.events.push(StoredEvent {
            id,
            event,
            created_at: Utc::now(),
        });
    }

    fn push_notification(&mut self, notification: NewNotification) {
        let id = Self::next(&mut self.next_notification_id);
        self.notifications.push(Notification {
            id,
            kind: notification.kind,
            title: notification.title,
            message: notification.message,
            person_name: notification.person_name,
            person_code: notification.person_code,
            is_read: false,
            created_at: Utc::now(),
        });
    }

    fn event_entry(&self, stored: &StoredEvent) -> EventEntry {
        let person = stored
            .event
            .personnel_id
            .and_then(|id| self.personnel.get(&id));
        EventEntry {
            id: stored.id,
            event_type: stored.event.event_type.clone(),
            type_label: event_type_label(&stored.event.event_type).to_string(),
            description: stored.event.description.clone(),
            created_at: stored.created_at,
            person_name: person.map(|p| p.full_name.clone()),
            person_code: person.map(|p| p.personal_code.clone()),
        }
    }

    fn check_view(&self, stored: &StoredCheck) -> Option<MedicalCheckView> {
        let person = self.personnel.get(&stored.personnel_id)?;
        let shift = stored.check.shift;
        Some(MedicalCheckView {
            id: stored.id,
            check_type: stored.check.check_type.clone(),
            status: stored.check.status,
            blood_pressure: stored.check.blood_pressure.clone(),
            pulse: stored.check.pulse,
            alcohol_level: stored.check.alcohol_level,
            temperature: stored.check.temperature,
            doctor_name: stored.check.doctor_name.clone(),
            checked_at: stored.checked_at,
            notes: stored.check.notes.clone(),
            person_name: person.full_name.clone(),
            person_code: person.personal_code.clone(),
            department: person.department.clone(),
            organization: person.organization.clone(),
            shift_type: shift.shift_type,
            shift_label: shift.shift_type.label().to_string(),
            check_direction: shift.check_direction,
            direction_label: shift.check_direction.label().to_string(),
            shift_date: shift.shift_date,
        })
    }

    fn visible_person(&self, id: i64) -> bool {
        self.personnel
            .get(&id)
            .is_some_and(|p| p.is_active() && !p.is_hidden)
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hide a person from listings without archiving them.
    pub async fn hide_person(&self, id: i64) -> bool {
        let mut state = self.state.lock().await;
        match state.personnel.get_mut(&id) {
            Some(person) => {
                person.is_hidden = true;
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl SettingsStore for MemoryStore {
    async fn load_shift_schedule(&self) -> Result<Option<JsonValue>> {
        let state = self.state.lock().await;
        Ok(state
            .settings
            .get(crate::schedule::SHIFT_SCHEDULE_KEY)
            .cloned())
    }

    async fn save_shift_schedule(&self, schedule: &ShiftSchedule) -> Result<()> {
        let mut state = self.state.lock().await;
        state.settings.insert(
            crate::schedule::SHIFT_SCHEDULE_KEY.to_string(),
            schedule.to_settings_value(),
        );
        Ok(())
    }
}

#[async_trait]
impl ResetStore for MemoryStore {
    async fn reset_applied(&self, shift: &ShiftInfo) -> Result<bool> {
        let state = self.state.lock().await;
        Ok(state
            .resets
            .iter()
            .any(|r| r.shift_type == shift.shift_type && r.shift_date == shift.shift_date))
    }

    async fn apply_reset(&self, shift: &ShiftInfo) -> Result<ResetApplication> {
        let mut state = self.state.lock().await;
        let claimed = state
            .resets
            .iter()
            .any(|r| r.shift_type == shift.shift_type && r.shift_date == shift.shift_date);
        if claimed {
            return Ok(ResetApplication::AlreadyApplied);
        }

        let now = Utc::now();
        let mut reset_count = 0u64;
        for person in state.personnel.values_mut() {
            if person.is_active() && person.medical_status != MedicalStatus::Pending {
                person.medical_status = MedicalStatus::Pending;
                person.updated_at = now;
                reset_count += 1;
            }
        }

        let id = MemoryState::next(&mut state.next_reset_id);
        state.resets.push(ShiftResetLogEntry {
            id,
            shift_type: shift.shift_type,
            shift_date: shift.shift_date,
            reset_count: reset_count as i64,
            created_at: now,
        });

        if reset_count > 0 {
            let (event, notification) = reset_notice(shift, reset_count);
            state.push_event(event);
            state.push_notification(notification);
        }

        Ok(ResetApplication::Applied { reset_count })
    }

    async fn list_resets(&self, limit: i64) -> Result<Vec<ShiftResetLogEntry>> {
        let state = self.state.lock().await;
        let mut resets = state.resets.clone();
        resets.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        resets.truncate(limit.max(0) as usize);
        Ok(resets)
    }
}

#[async_trait]
impl PersonnelStore for MemoryStore {
    async fn list_personnel(&self, filter: &PersonnelFilter) -> Result<Vec<Person>> {
        let state = self.state.lock().await;
        let eq = |wanted: &Option<String>, actual: &str| {
            wanted
                .as_deref()
                .filter(|w| !w.is_empty())
                .map_or(true, |w| w == actual)
        };
        let mut personnel: Vec<Person> = state
            .personnel
            .values()
            .filter(|p| p.is_active() && !p.is_hidden)
            .filter(|p| {
                eq(&filter.category, &p.category)
                    && eq(&filter.status, p.status.as_ref())
                    && eq(&filter.shift, &p.shift)
                    && eq(&filter.organization_type, &p.organization_type)
            })
            .cloned()
            .collect();
        personnel.sort_by(|a, b| a.full_name.cmp(&b.full_name));
        Ok(personnel)
    }

    async fn search_personnel(&self, query: &str, limit: i64) -> Result<Vec<Person>> {
        let state = self.state.lock().await;
        let needle = query.to_lowercase();
        let mut found: Vec<Person> = state
            .personnel
            .values()
            .filter(|p| p.is_active())
            .filter(|p| {
                [
                    &p.full_name,
                    &p.personal_code,
                    &p.department,
                    &p.qr_code,
                    &p.organization,
                ]
                .iter()
                .any(|field| field.to_lowercase().contains(&needle))
            })
            .cloned()
            .collect();
        found.sort_by(|a, b| a.full_name.cmp(&b.full_name));
        found.truncate(limit.max(0) as usize);
        Ok(found)
    }

    async fn get_person(&self, id: i64) -> Result<Option<Person>> {
        let state = self.state.lock().await;
        Ok(state.personnel.get(&id).filter(|p| p.is_active()).cloned())
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<Person>> {
        let state = self.state.lock().await;
        Ok(state
            .personnel
            .values()
            .find(|p| p.is_active() && (p.personal_code == code || p.qr_code == code))
            .cloned())
    }

    async fn add_person(&self, new: &NewPerson) -> Result<Person> {
        let mut state = self.state.lock().await;
        let id = state.personnel.keys().next_back().copied().unwrap_or(0) + 1;
        let now = Utc::now();
        let person = Person {
            id,
            personal_code: Person::personal_code_for(id),
            full_name: new.full_name.clone(),
            position: new.position.clone(),
            department: new.department.clone(),
            category: new.category_or_default().to_string(),
            phone: new.phone.clone(),
            room: new.room.clone(),
            status: PersonnelStatus::Arrived,
            qr_code: Person::qr_code_for(id),
            medical_status: MedicalStatus::Pending,
            shift: new.shift.clone(),
            organization: new.organization.clone(),
            organization_type: new.organization_type.clone(),
            is_hidden: false,
            created_at: now,
            updated_at: now,
        };
        state.personnel.insert(id, person.clone());
        state.push_event(NewEvent::new(
            event_types::ARRIVAL,
            format!("{}: added to the roster", person.full_name),
            Some(id),
        ));
        Ok(person)
    }

    async fn apply_write(&self, write: &PersonnelWrite) -> Result<Option<i64>> {
        let mut state = self.state.lock().await;
        let now = Utc::now();
        match state.personnel.get_mut(&write.person_id) {
            Some(person) => {
                write.edit.apply_to(person);
                person.updated_at = now;
            }
            None => {
                return Err(ControlError::not_found(format!(
                    "person {} not found",
                    write.person_id
                )))
            }
        }

        let check_id = match &write.medical_check {
            Some(check) => {
                let id = MemoryState::next(&mut state.next_check_id);
                state.checks.push(StoredCheck {
                    id,
                    personnel_id: write.person_id,
                    check: check.clone(),
                    checked_at: now,
                    is_hidden: false,
                });
                Some(id)
            }
            None => None,
        };
        for event in &write.events {
            state.push_event(event.clone());
        }
        if let Some(notification) = &write.notification {
            state.push_notification(notification.clone());
        }
        Ok(check_id)
    }

    async fn personnel_stats(&self) -> Result<PersonnelStats> {
        let state = self.state.lock().await;
        let mut stats = PersonnelStats::default();
        let mut by_organization: HashMap<String, i64> = HashMap::new();
        for p in state
            .personnel
            .values()
            .filter(|p| p.is_active() && !p.is_hidden)
        {
            stats.total += 1;
            *stats.by_category.entry(p.category.clone()).or_default() += 1;
            *stats.by_status.entry(p.status.to_string()).or_default() += 1;
            *stats.by_medical.entry(p.medical_status.to_string()).or_default() += 1;
            let org_type = if p.organization_type.is_empty() {
                "unknown".to_string()
            } else {
                p.organization_type.clone()
            };
            *stats.by_org_type.entry(org_type).or_default() += 1;
            if !p.organization.is_empty() {
                *by_organization.entry(p.organization.clone()).or_default() += 1;
            }
        }
        let mut organizations: Vec<(String, i64)> = by_organization.into_iter().collect();
        organizations.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        stats.by_organization = organizations.into_iter().take(20).collect();
        Ok(stats)
    }
}

#[async_trait]
impl MedicalCheckStore for MemoryStore {
    async fn list_checks(&self, filter: &CheckFilter) -> Result<Vec<MedicalCheckView>> {
        let state = self.state.lock().await;
        let mut checks: Vec<MedicalCheckView> = state
            .checks
            .iter()
            .filter(|c| !c.is_hidden && state.visible_person(c.personnel_id))
            .filter(|c| filter.matches(&c.check.shift))
            .filter_map(|c| state.check_view(c))
            .collect();
        checks.sort_by(|a, b| b.checked_at.cmp(&a.checked_at).then(b.id.cmp(&a.id)));
        checks.truncate(filter.effective_limit() as usize);
        Ok(checks)
    }

    async fn export_checks(&self, filter: &CheckFilter) -> Result<Vec<MedicalCheckView>> {
        let state = self.state.lock().await;
        let mut checks: Vec<MedicalCheckView> = state
            .checks
            .iter()
            .filter(|c| {
                state
                    .personnel
                    .get(&c.personnel_id)
                    .is_some_and(|p| p.is_active())
            })
            .filter(|c| filter.matches(&c.check.shift))
            .filter_map(|c| state.check_view(c))
            .collect();
        checks.sort_by(|a, b| {
            b.shift_date
                .cmp(&a.shift_date)
                .then(b.checked_at.cmp(&a.checked_at))
                .then(b.id.cmp(&a.id))
        });
        Ok(checks)
    }

    async fn medical_stats(&self, range: StatsRange) -> Result<MedicalStats> {
        let state = self.state.lock().await;
        let mut stats = MedicalStats::default();
        for c in state
            .checks
            .iter()
            .filter(|c| !c.is_hidden && state.visible_person(c.personnel_id))
            .filter(|c| range.contains(c.check.shift.shift_date))
        {
            stats.period.add(c.check.status, 1);
            let key = format!(
                "{}_{}",
                c.check.shift.shift_type, c.check.shift.check_direction
            );
            stats.by_shift.entry(key).or_default().add(c.check.status, 1);
        }
        for p in state
            .personnel
            .values()
            .filter(|p| p.is_active() && !p.is_hidden)
        {
            stats.total += 1;
            match p.medical_status {
                MedicalStatus::Passed => stats.passed += 1,
                MedicalStatus::Failed => stats.failed += 1,
                MedicalStatus::Pending => stats.pending += 1,
                MedicalStatus::Expiring => {}
            }
        }
        Ok(stats)
    }
}

#[async_trait]
impl AuditStore for MemoryStore {
    async fn list_events(&self, limit: i64) -> Result<Vec<EventEntry>> {
        let state = self.state.lock().await;
        Ok(state
            .events
            .iter()
            .rev()
            .take(limit.max(0) as usize)
            .map(|e| state.event_entry(e))
            .collect())
    }

    async fn person_history(&self, person_id: i64, limit: i64) -> Result<Vec<EventEntry>> {
        let state = self.state.lock().await;
        Ok(state
            .events
            .iter()
            .rev()
            .filter(|e| e.event.personnel_id == Some(person_id))
            .take(limit.max(0) as usize)
            .map(|e| state.event_entry(e))
            .collect())
    }

    async fn list_notifications(
        &self,
        unread_only: bool,
        limit: i64,
    ) -> Result<(Vec<Notification>, i64)> {
        let state = self.state.lock().await;
        let unread = state.notifications.iter().filter(|n| !n.is_read).count() as i64;
        let items = state
            .notifications
            .iter()
            .rev()
            .filter(|n| !unread_only || !n.is_read)
            .take(limit.max(0) as usize)
            .cloned()
            .collect();
        Ok((items, unread))
    }

    async fn mark_notification_read(&self, id: i64) -> Result<bool> {
        let mut state = self.state.lock().await;
        match state.notifications.iter_mut().find(|n| n.id == id) {
            Some(n) => {
                n.is_read = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn mark_all_notifications_read(&self) -> Result<u64> {
        let mut state = self.state.lock().await;
        let mut count = 0;
        for n in state.notifications.iter_mut().filter(|n| !n.is_read) {
            n.is_read = true;
            count += 1;
        }
        Ok(count)
    }
}
