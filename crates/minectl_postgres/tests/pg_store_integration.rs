//! Integration tests for the Postgres adapters.
//!
//! Each test migrates a fresh schema so tests can run in parallel against
//! one database.
//!
//! Requires: DATABASE_URL environment variable

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, FixedOffset, TimeZone};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tokio::sync::Barrier;

use minectl_core::ports::{AuditStore, PersonnelStore, ResetStore};
use minectl_core::proto::{ScanRequest, StatsQuery};
use minectl_core::types::*;
use minectl_core::{ControlError, ControlService, FixedClock, ReconcileOutcome};
use minectl_postgres::{pg_stores, run_migrations, PgPersonnelStore};

static SCHEMA_SEQ: AtomicU32 = AtomicU32::new(0);

/// Helper to get a pool bound to a freshly migrated schema
async fn get_test_pool() -> PgPool {
    let database_url =
        std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for integration tests");
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .subsec_nanos();
    let schema = format!(
        "minectl_test_{}_{}_{}",
        std::process::id(),
        nanos,
        SCHEMA_SEQ.fetch_add(1, Ordering::SeqCst)
    );

    let admin = PgPool::connect(&database_url)
        .await
        .expect("Failed to connect to test database");
    sqlx::query(&format!("CREATE SCHEMA {schema}"))
        .execute(&admin)
        .await
        .expect("Failed to create test schema");
    admin.close().await;

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .after_connect(move |conn, _meta| {
            let schema = schema.clone();
            Box::pin(async move {
                sqlx::query(&format!("SET search_path TO {schema}"))
                    .execute(conn)
                    .await?;
                Ok(())
            })
        })
        .connect(&database_url)
        .await
        .expect("Failed to connect to test database");
    run_migrations(&pool).await.expect("Failed to migrate");
    pool
}

fn site_time(h: u32, m: u32) -> DateTime<FixedOffset> {
    FixedOffset::east_opt(9 * 3600)
        .unwrap()
        .with_ymd_and_hms(2026, 3, 10, h, m, 0)
        .unwrap()
}

async fn seed(store: &PgPersonnelStore, name: &str, medical: MedicalStatus) -> Person {
    let person = store
        .add_person(&NewPerson {
            full_name: name.into(),
            organization: "Drill Co".into(),
            ..Default::default()
        })
        .await
        .unwrap();
    store
        .apply_write(&PersonnelWrite {
            person_id: person.id,
            edit: PersonEdit {
                medical_status: Some(medical),
                ..Default::default()
            },
            ..Default::default()
        })
        .await
        .unwrap();
    person
}

#[tokio::test]
#[ignore] // requires DATABASE_URL
async fn test_concurrent_resets_apply_once() {
    let pool = get_test_pool().await;
    let personnel = PgPersonnelStore::new(pool.clone());
    for i in 0..4 {
        seed(&personnel, &format!("Worker {i}"), MedicalStatus::Passed).await;
    }
    seed(&personnel, "Already pending", MedicalStatus::Pending).await;

    let stores = pg_stores(pool.clone());
    let clock = Arc::new(FixedClock::new(site_time(5, 10)));
    let service = ControlService::new(stores.clone(), clock);
    let reconciler = service.reconciler();

    let callers = 8;
    let barrier = Arc::new(Barrier::new(callers));
    let mut handles = Vec::new();
    for _ in 0..callers {
        let reconciler = reconciler.clone();
        let barrier = barrier.clone();
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            reconciler.reconcile().await
        }));
    }

    let mut applied = Vec::new();
    for handle in handles {
        if let ReconcileOutcome::Applied { reset_count, .. } = handle.await.unwrap().unwrap() {
            applied.push(reset_count);
        }
    }
    assert_eq!(applied, vec![4]);

    let log = stores.resets.list_resets(10).await.unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].reset_count, 4);
    assert_eq!(log[0].shift_type, ShiftType::Day);

    let events = stores.audit.list_events(50).await.unwrap();
    assert_eq!(
        events.iter().filter(|e| e.event_type == "medical_reset").count(),
        1
    );
    let (notifications, unread) = stores.audit.list_notifications(true, 10).await.unwrap();
    assert_eq!(unread, 1);
    assert_eq!(notifications[0].kind, "medical_reset");
}

#[tokio::test]
#[ignore] // requires DATABASE_URL
async fn test_write_to_missing_person_leaves_no_trace() {
    let pool = get_test_pool().await;
    let personnel = PgPersonnelStore::new(pool.clone());

    let err = personnel
        .apply_write(&PersonnelWrite {
            person_id: 4242,
            events: vec![NewEvent::new("edit", "ghost edit", None)],
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, ControlError::NotFound(_)));

    let stores = pg_stores(pool);
    assert!(stores.audit.list_events(10).await.unwrap().is_empty());
}

#[tokio::test]
#[ignore] // requires DATABASE_URL
async fn test_add_person_derives_codes_and_search_is_literal() {
    let pool = get_test_pool().await;
    let personnel = PgPersonnelStore::new(pool.clone());

    let anna = seed(&personnel, "Anna 100%", MedicalStatus::Pending).await;
    seed(&personnel, "Boris 1000", MedicalStatus::Pending).await;
    assert_eq!(anna.personal_code, Person::personal_code_for(anna.id));
    assert_eq!(anna.qr_code, Person::qr_code_for(anna.id));

    let found = personnel.find_by_code(&anna.qr_code).await.unwrap().unwrap();
    assert_eq!(found.id, anna.id);

    let hits = personnel.search_personnel("100%", 20).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].full_name, "Anna 100%");

    let history = pg_stores(pool)
        .audit
        .person_history(anna.id, 50)
        .await
        .unwrap();
    assert_eq!(history.last().map(|e| e.event_type.as_str()), Some("arrival"));
}

#[tokio::test]
#[ignore] // requires DATABASE_URL
async fn test_scan_is_listed_and_counted() {
    let pool = get_test_pool().await;
    let personnel = PgPersonnelStore::new(pool.clone());
    let anna = seed(&personnel, "Anna", MedicalStatus::Pending).await;
    seed(&personnel, "Boris", MedicalStatus::Pending).await;

    let clock = Arc::new(FixedClock::new(site_time(18, 30)));
    let service = ControlService::new(pg_stores(pool), clock);
    let outcome = service
        .scan(&ScanRequest {
            code: anna.personal_code.clone(),
        })
        .await
        .unwrap();
    assert_eq!(outcome.shift.shift_type, ShiftType::Night);

    let checks = service.list_checks(&CheckFilter::default()).await.unwrap();
    assert_eq!(checks.total, 1);
    assert_eq!(checks.checks[0].person_code, anna.personal_code);
    assert_eq!(checks.checks[0].direction_label, "To shift");

    let stats = service.medical_stats(&StatsQuery::default()).await.unwrap();
    assert_eq!(stats.period.passed, 1);
    assert_eq!(
        stats.by_shift.get("night_to_shift").map(|c| c.passed),
        Some(1)
    );
    assert_eq!((stats.passed, stats.pending, stats.total), (1, 1, 2));
}

#[tokio::test]
#[ignore] // requires DATABASE_URL
async fn test_failed_reset_rolls_back_and_retries() {
    let pool = get_test_pool().await;
    let personnel = PgPersonnelStore::new(pool.clone());
    let anna = seed(&personnel, "Anna", MedicalStatus::Passed).await;
    seed(&personnel, "Boris", MedicalStatus::Failed).await;

    sqlx::query(
        r#"
        CREATE FUNCTION reject_notifications() RETURNS trigger
        LANGUAGE plpgsql AS $$
        BEGIN
            RAISE EXCEPTION 'notifications are read-only';
        END
        $$
        "#,
    )
    .execute(&pool)
    .await
    .unwrap();
    sqlx::query(
        "CREATE TRIGGER reject_notifications BEFORE INSERT ON notifications \
         FOR EACH ROW EXECUTE FUNCTION reject_notifications()",
    )
    .execute(&pool)
    .await
    .unwrap();

    let stores = pg_stores(pool.clone());
    let shift = ShiftInfo {
        shift_type: ShiftType::Day,
        check_direction: CheckDirection::ToShift,
        shift_date: site_time(5, 10).date_naive(),
    };
    let err = stores.resets.apply_reset(&shift).await.unwrap_err();
    assert!(matches!(err, ControlError::Internal(_)));

    let claimed: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM shift_reset_log WHERE shift_type = $1 AND shift_date = $2",
    )
    .bind(shift.shift_type.as_ref())
    .bind(shift.shift_date)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(claimed, 0);
    let unchanged = personnel.get_person(anna.id).await.unwrap().unwrap();
    assert_eq!(unchanged.medical_status, MedicalStatus::Passed);
    let events = stores.audit.list_events(10).await.unwrap();
    assert!(events.iter().all(|e| e.event_type != "medical_reset"));

    sqlx::query("DROP TRIGGER reject_notifications ON notifications")
        .execute(&pool)
        .await
        .unwrap();
    let retried = stores.resets.apply_reset(&shift).await.unwrap();
    assert!(matches!(retried, ResetApplication::Applied { reset_count: 2 }));
    let reset = personnel.get_person(anna.id).await.unwrap().unwrap();
    assert_eq!(reset.medical_status, MedicalStatus::Pending);
}
