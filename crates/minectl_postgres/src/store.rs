//! Postgres implementations of all minectl_core port traits.
//!
//! Each adapter is a newtype wrapping PgPool. All SQL is runtime-checked
//! (sqlx::query, not sqlx::query!) so building does not need a database.

use std::collections::BTreeMap;

use anyhow::anyhow;
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::{PgConnection, PgPool};
use tracing::debug;

use minectl_core::error::ControlError;
use minectl_core::ports::{
    AuditStore, MedicalCheckStore, PersonnelStore, ResetStore, Result, SettingsStore,
};
use minectl_core::reconciler::reset_notice;
use minectl_core::schedule::{ShiftSchedule, SHIFT_SCHEDULE_KEY};
use minectl_core::types::*;

use crate::rows::{
    PgCheckViewRow, PgEventRow, PgNotificationRow, PgPersonRow, PgResetLogRow, PERSON_COLUMNS,
};

fn internal(e: String) -> ControlError {
    ControlError::Internal(anyhow!(e))
}

async fn insert_event(conn: &mut PgConnection, event: &NewEvent) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO events (event_type, description, personnel_id)
        VALUES ($1, $2, $3)
        "#,
    )
    .bind(&event.event_type)
    .bind(&event.description)
    .bind(event.personnel_id)
    .execute(&mut *conn)
    .await
    .map_err(|e| anyhow!(e))?;
    Ok(())
}

async fn insert_notification(conn: &mut PgConnection, notification: &NewNotification) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO notifications (type, title, message, person_name, person_code)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(&notification.kind)
    .bind(&notification.title)
    .bind(&notification.message)
    .bind(&notification.person_name)
    .bind(&notification.person_code)
    .execute(&mut *conn)
    .await
    .map_err(|e| anyhow!(e))?;
    Ok(())
}

// ── PgSettingsStore ───────────────────────────────────────────

pub struct PgSettingsStore {
    pool: PgPool,
}

impl PgSettingsStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SettingsStore for PgSettingsStore {
    async fn load_shift_schedule(&self) -> Result<Option<JsonValue>> {
        let value = sqlx::query_scalar::<_, JsonValue>("SELECT value FROM settings WHERE key = $1")
            .bind(SHIFT_SCHEDULE_KEY)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| anyhow!(e))?;
        Ok(value)
    }

    async fn save_shift_schedule(&self, schedule: &ShiftSchedule) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO settings (key, value, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (key) DO UPDATE
                SET value = EXCLUDED.value, updated_at = NOW()
            "#,
        )
        .bind(SHIFT_SCHEDULE_KEY)
        .bind(schedule.to_settings_value())
        .execute(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        Ok(())
    }
}

// ── PgResetStore ──────────────────────────────────────────────

pub struct PgResetStore {
    pool: PgPool,
}

impl PgResetStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ResetStore for PgResetStore {
    async fn reset_applied(&self, shift: &ShiftInfo) -> Result<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM shift_reset_log
                WHERE shift_type = $1 AND shift_date = $2
            )
            "#,
        )
        .bind(shift.shift_type.as_ref())
        .bind(shift.shift_date)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        Ok(exists)
    }

    async fn apply_reset(&self, shift: &ShiftInfo) -> Result<ResetApplication> {
        let mut tx = self.pool.begin().await.map_err(|e| anyhow!(e))?;

        // Claim the window first. A concurrent claimant blocks here until the
        // other transaction finishes, then sees the conflict.
        let claimed = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO shift_reset_log (shift_type, shift_date)
            VALUES ($1, $2)
            ON CONFLICT (shift_type, shift_date) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(shift.shift_type.as_ref())
        .bind(shift.shift_date)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| anyhow!(e))?;

        let Some(log_id) = claimed else {
            tx.rollback().await.map_err(|e| anyhow!(e))?;
            debug!(
                shift_type = %shift.shift_type,
                shift_date = %shift.shift_date,
                "Reset window already claimed"
            );
            return Ok(ResetApplication::AlreadyApplied);
        };

        let reset_count = sqlx::query(
            r#"
            UPDATE personnel
            SET medical_status = 'pending', updated_at = NOW()
            WHERE status <> 'archived' AND medical_status <> 'pending'
            "#,
        )
        .execute(&mut *tx)
        .await
        .map_err(|e| anyhow!(e))?
        .rows_affected();

        sqlx::query("UPDATE shift_reset_log SET reset_count = $2 WHERE id = $1")
            .bind(log_id)
            .bind(reset_count as i64)
            .execute(&mut *tx)
            .await
            .map_err(|e| anyhow!(e))?;

        if reset_count > 0 {
            let (event, notification) = reset_notice(shift, reset_count);
            insert_event(&mut tx, &event).await?;
            insert_notification(&mut tx, &notification).await?;
        }

        tx.commit().await.map_err(|e| anyhow!(e))?;
        Ok(ResetApplication::Applied { reset_count })
    }

    async fn list_resets(&self, limit: i64) -> Result<Vec<ShiftResetLogEntry>> {
        let rows = sqlx::query_as::<_, PgResetLogRow>(
            r#"
            SELECT id, shift_type, shift_date, reset_count, created_at
            FROM shift_reset_log
            ORDER BY created_at DESC, id DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        rows.into_iter()
            .map(|r| r.try_into().map_err(internal))
            .collect()
    }
}

// ── PgPersonnelStore ──────────────────────────────────────────

pub struct PgPersonnelStore {
    pool: PgPool,
}

impl PgPersonnelStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Treat an empty filter value the same as an absent one.
fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Escape LIKE metacharacters so the query matches literally.
pub(crate) fn like_pattern(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len() + 2);
    escaped.push('%');
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

async fn grouped_counts(pool: &PgPool, sql: &str) -> Result<BTreeMap<String, i64>> {
    let rows = sqlx::query_as::<_, (String, i64)>(sql)
        .fetch_all(pool)
        .await
        .map_err(|e| anyhow!(e))?;
    Ok(rows.into_iter().collect())
}

#[async_trait]
impl PersonnelStore for PgPersonnelStore {
    async fn list_personnel(&self, filter: &PersonnelFilter) -> Result<Vec<Person>> {
        let sql = format!(
            r#"
            SELECT {PERSON_COLUMNS}
            FROM personnel
            WHERE status <> 'archived' AND is_hidden = FALSE
              AND ($1::text IS NULL OR category = $1)
              AND ($2::text IS NULL OR status = $2)
              AND ($3::text IS NULL OR shift = $3)
              AND ($4::text IS NULL OR organization_type = $4)
            ORDER BY full_name
            "#
        );
        let rows = sqlx::query_as::<_, PgPersonRow>(&sql)
            .bind(non_empty(&filter.category))
            .bind(non_empty(&filter.status))
            .bind(non_empty(&filter.shift))
            .bind(non_empty(&filter.organization_type))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| anyhow!(e))?;
        rows.into_iter()
            .map(|r| r.try_into().map_err(internal))
            .collect()
    }

    async fn search_personnel(&self, query: &str, limit: i64) -> Result<Vec<Person>> {
        let sql = format!(
            r#"
            SELECT {PERSON_COLUMNS}
            FROM personnel
            WHERE status <> 'archived'
              AND (full_name ILIKE $1 OR personal_code ILIKE $1 OR department ILIKE $1
                   OR qr_code ILIKE $1 OR organization ILIKE $1)
            ORDER BY full_name
            LIMIT $2
            "#
        );
        let rows = sqlx::query_as::<_, PgPersonRow>(&sql)
            .bind(like_pattern(query))
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| anyhow!(e))?;
        rows.into_iter()
            .map(|r| r.try_into().map_err(internal))
            .collect()
    }

    async fn get_person(&self, id: i64) -> Result<Option<Person>> {
        let sql = format!(
            "SELECT {PERSON_COLUMNS} FROM personnel WHERE id = $1 AND status <> 'archived'"
        );
        let row = sqlx::query_as::<_, PgPersonRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| anyhow!(e))?;
        row.map(|r| r.try_into().map_err(internal)).transpose()
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<Person>> {
        let sql = format!(
            r#"
            SELECT {PERSON_COLUMNS}
            FROM personnel
            WHERE (personal_code = $1 OR qr_code = $1) AND status <> 'archived'
            ORDER BY id
            LIMIT 1
            "#
        );
        let row = sqlx::query_as::<_, PgPersonRow>(&sql)
            .bind(code)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| anyhow!(e))?;
        row.map(|r| r.try_into().map_err(internal)).transpose()
    }

    async fn add_person(&self, person: &NewPerson) -> Result<Person> {
        let mut tx = self.pool.begin().await.map_err(|e| anyhow!(e))?;

        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO personnel (full_name, position, department, category, phone, room,
                                   shift, organization, organization_type)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id
            "#,
        )
        .bind(&person.full_name)
        .bind(&person.position)
        .bind(&person.department)
        .bind(person.category_or_default())
        .bind(&person.phone)
        .bind(&person.room)
        .bind(&person.shift)
        .bind(&person.organization)
        .bind(&person.organization_type)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| anyhow!(e))?;

        let sql = format!(
            r#"
            UPDATE personnel SET personal_code = $2, qr_code = $3
            WHERE id = $1
            RETURNING {PERSON_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, PgPersonRow>(&sql)
            .bind(id)
            .bind(Person::personal_code_for(id))
            .bind(Person::qr_code_for(id))
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| anyhow!(e))?;
        let created: Person = row.try_into().map_err(internal)?;

        insert_event(
            &mut tx,
            &NewEvent::new(
                event_types::ARRIVAL,
                format!("{}: added to the roster", created.full_name),
                Some(id),
            ),
        )
        .await?;

        tx.commit().await.map_err(|e| anyhow!(e))?;
        Ok(created)
    }

    async fn apply_write(&self, write: &PersonnelWrite) -> Result<Option<i64>> {
        let mut tx = self.pool.begin().await.map_err(|e| anyhow!(e))?;
        let edit = &write.edit;

        let updated = sqlx::query(
            r#"
            UPDATE personnel SET
                full_name = COALESCE($2, full_name),
                position = COALESCE($3, position),
                department = COALESCE($4, department),
                category = COALESCE($5, category),
                phone = COALESCE($6, phone),
                room = COALESCE($7, room),
                shift = COALESCE($8, shift),
                status = COALESCE($9, status),
                medical_status = COALESCE($10, medical_status),
                organization = COALESCE($11, organization),
                organization_type = COALESCE($12, organization_type),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(write.person_id)
        .bind(&edit.full_name)
        .bind(&edit.position)
        .bind(&edit.department)
        .bind(&edit.category)
        .bind(&edit.phone)
        .bind(&edit.room)
        .bind(&edit.shift)
        .bind(edit.status.map(|s| s.to_string()))
        .bind(edit.medical_status.map(|m| m.to_string()))
        .bind(&edit.organization)
        .bind(&edit.organization_type)
        .execute(&mut *tx)
        .await
        .map_err(|e| anyhow!(e))?;

        if updated.rows_affected() == 0 {
            tx.rollback().await.map_err(|e| anyhow!(e))?;
            return Err(ControlError::not_found(format!(
                "person {} not found",
                write.person_id
            )));
        }

        let check_id = match &write.medical_check {
            Some(check) => {
                let id = sqlx::query_scalar::<_, i64>(
                    r#"
                    INSERT INTO medical_checks (personnel_id, check_type, status, blood_pressure,
                        pulse, alcohol_level, temperature, doctor_name, notes,
                        shift_type, check_direction, shift_date)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                    RETURNING id
                    "#,
                )
                .bind(write.person_id)
                .bind(&check.check_type)
                .bind(check.status.as_ref())
                .bind(&check.blood_pressure)
                .bind(check.pulse)
                .bind(check.alcohol_level)
                .bind(check.temperature)
                .bind(&check.doctor_name)
                .bind(&check.notes)
                .bind(check.shift.shift_type.as_ref())
                .bind(check.shift.check_direction.as_ref())
                .bind(check.shift.shift_date)
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| anyhow!(e))?;
                Some(id)
            }
            None => None,
        };

        for event in &write.events {
            insert_event(&mut tx, event).await?;
        }
        if let Some(notification) = &write.notification {
            insert_notification(&mut tx, notification).await?;
        }

        tx.commit().await.map_err(|e| anyhow!(e))?;
        Ok(check_id)
    }

    async fn personnel_stats(&self) -> Result<PersonnelStats> {
        const VISIBLE: &str = "status <> 'archived' AND is_hidden = FALSE";

        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM personnel WHERE {VISIBLE}"
        ))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;

        let by = |column: &str| {
            format!("SELECT {column}, COUNT(*) FROM personnel WHERE {VISIBLE} GROUP BY 1")
        };

        Ok(PersonnelStats {
            total,
            by_category: grouped_counts(&self.pool, &by("category")).await?,
            by_status: grouped_counts(&self.pool, &by("status")).await?,
            by_medical: grouped_counts(&self.pool, &by("medical_status")).await?,
            by_org_type: grouped_counts(
                &self.pool,
                &by("COALESCE(NULLIF(organization_type, ''), 'unknown')"),
            )
            .await?,
            by_organization: grouped_counts(
                &self.pool,
                &format!(
                    r#"
                    SELECT organization, COUNT(*) FROM personnel
                    WHERE {VISIBLE} AND organization <> ''
                    GROUP BY organization
                    ORDER BY COUNT(*) DESC, organization
                    LIMIT 20
                    "#
                ),
            )
            .await?,
        })
    }
}

// ── PgMedicalCheckStore ───────────────────────────────────────

pub struct PgMedicalCheckStore {
    pool: PgPool,
}

impl PgMedicalCheckStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const CHECK_VIEW_SELECT: &str = r#"
    SELECT mc.id, mc.check_type, mc.status, mc.blood_pressure, mc.pulse,
           mc.alcohol_level, mc.temperature, mc.doctor_name, mc.checked_at, mc.notes,
           mc.shift_type, mc.check_direction, mc.shift_date,
           p.full_name AS person_name, p.personal_code AS person_code,
           p.department, p.organization
    FROM medical_checks mc
    JOIN personnel p ON p.id = mc.personnel_id
"#;

const CHECK_FILTERS: &str = r#"
      AND ($1::date IS NULL OR mc.shift_date >= $1)
      AND ($2::date IS NULL OR mc.shift_date <= $2)
      AND ($3::text IS NULL OR mc.shift_type = $3)
      AND ($4::text IS NULL OR mc.check_direction = $4)
"#;

const VISIBLE_CHECKS: &str =
    "p.status <> 'archived' AND p.is_hidden = FALSE AND mc.is_hidden = FALSE";

impl PgMedicalCheckStore {
    async fn fetch_checks(
        &self,
        sql: &str,
        filter: &CheckFilter,
        limit: Option<i64>,
    ) -> Result<Vec<MedicalCheckView>> {
        let mut query = sqlx::query_as::<_, PgCheckViewRow>(sql)
            .bind(filter.date_from)
            .bind(filter.date_to)
            .bind(filter.shift_type.map(|t| t.to_string()))
            .bind(filter.direction.map(|d| d.to_string()));
        if let Some(limit) = limit {
            query = query.bind(limit);
        }
        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| anyhow!(e))?;
        rows.into_iter()
            .map(|r| r.try_into().map_err(internal))
            .collect()
    }
}

#[async_trait]
impl MedicalCheckStore for PgMedicalCheckStore {
    async fn list_checks(&self, filter: &CheckFilter) -> Result<Vec<MedicalCheckView>> {
        let sql = format!(
            "{CHECK_VIEW_SELECT} WHERE {VISIBLE_CHECKS} {CHECK_FILTERS} \
             ORDER BY mc.checked_at DESC, mc.id DESC LIMIT $5"
        );
        self.fetch_checks(&sql, filter, Some(filter.effective_limit()))
            .await
    }

    async fn export_checks(&self, filter: &CheckFilter) -> Result<Vec<MedicalCheckView>> {
        let sql = format!(
            "{CHECK_VIEW_SELECT} WHERE p.status <> 'archived' {CHECK_FILTERS} \
             ORDER BY mc.shift_date DESC, mc.checked_at DESC, mc.id DESC"
        );
        self.fetch_checks(&sql, filter, None).await
    }

    async fn medical_stats(&self, range: StatsRange) -> Result<MedicalStats> {
        let rows = sqlx::query_as::<_, (String, String, String, i64)>(&format!(
            r#"
            SELECT mc.shift_type, mc.check_direction, mc.status, COUNT(*)
            FROM medical_checks mc
            JOIN personnel p ON p.id = mc.personnel_id
            WHERE {VISIBLE_CHECKS}
              AND ($1::date IS NULL OR mc.shift_date >= $1)
              AND ($2::date IS NULL OR mc.shift_date <= $2)
            GROUP BY 1, 2, 3
            "#
        ))
        .bind(range.from)
        .bind(range.to)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;

        let mut stats = MedicalStats::default();
        for (shift_type, direction, status, count) in rows {
            let status: CheckStatus = status
                .parse()
                .map_err(|_| internal(format!("unexpected medical_checks.status {status:?}")))?;
            stats.period.add(status, count);
            stats
                .by_shift
                .entry(format!("{shift_type}_{direction}"))
                .or_default()
                .add(status, count);
        }

        let medical = grouped_counts(
            &self.pool,
            "SELECT medical_status, COUNT(*) FROM personnel \
             WHERE status <> 'archived' AND is_hidden = FALSE GROUP BY 1",
        )
        .await?;
        let count = |key: &str| medical.get(key).copied().unwrap_or(0);
        stats.passed = count("passed");
        stats.failed = count("failed");
        stats.pending = count("pending");
        stats.total = medical.values().sum();
        Ok(stats)
    }
}

// ── PgAuditStore ──────────────────────────────────────────────

pub struct PgAuditStore {
    pool: PgPool,
}

impl PgAuditStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const EVENT_SELECT: &str = r#"
    SELECT e.id, e.event_type, e.description, e.created_at,
           p.full_name AS person_name, p.personal_code AS person_code
    FROM events e
    LEFT JOIN personnel p ON p.id = e.personnel_id
"#;

#[async_trait]
impl AuditStore for PgAuditStore {
    async fn list_events(&self, limit: i64) -> Result<Vec<EventEntry>> {
        let rows = sqlx::query_as::<_, PgEventRow>(&format!(
            "{EVENT_SELECT} ORDER BY e.created_at DESC, e.id DESC LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        Ok(rows.into_iter().map(EventEntry::from).collect())
    }

    async fn person_history(&self, person_id: i64, limit: i64) -> Result<Vec<EventEntry>> {
        let rows = sqlx::query_as::<_, PgEventRow>(&format!(
            "{EVENT_SELECT} WHERE e.personnel_id = $1 \
             ORDER BY e.created_at DESC, e.id DESC LIMIT $2"
        ))
        .bind(person_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        Ok(rows.into_iter().map(EventEntry::from).collect())
    }

    async fn list_notifications(
        &self,
        unread_only: bool,
        limit: i64,
    ) -> Result<(Vec<Notification>, i64)> {
        let rows = sqlx::query_as::<_, PgNotificationRow>(
            r#"
            SELECT id, type AS kind, title, message, person_name, person_code,
                   is_read, created_at
            FROM notifications
            WHERE ($1 = FALSE OR is_read = FALSE)
            ORDER BY created_at DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(unread_only)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;

        let unread =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM notifications WHERE is_read = FALSE")
                .fetch_one(&self.pool)
                .await
                .map_err(|e| anyhow!(e))?;

        Ok((rows.into_iter().map(Notification::from).collect(), unread))
    }

    async fn mark_notification_read(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("UPDATE notifications SET is_read = TRUE WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| anyhow!(e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn mark_all_notifications_read(&self) -> Result<u64> {
        let result =
            sqlx::query("UPDATE notifications SET is_read = TRUE WHERE is_read = FALSE")
                .execute(&self.pool)
                .await
                .map_err(|e| anyhow!(e))?;
        Ok(result.rows_affected())
    }
}
