//! ShiftResetScheduler — background task that applies the once-per-shift
//! medical reset.
//!
//! Each tick calls the reconciler; it is a no-op outside `to_shift` windows
//! and after the first successful application in a window, so the tick
//! interval only bounds how late into a window the reset can land.

use std::sync::Arc;
use std::time::Duration;

use minectl_core::{MedicalResetReconciler, ReconcileOutcome};

pub struct ShiftResetScheduler {
    reconciler: Arc<MedicalResetReconciler>,
    interval: Duration,
}

impl ShiftResetScheduler {
    pub fn new(reconciler: Arc<MedicalResetReconciler>, interval: Duration) -> Self {
        Self {
            reconciler,
            interval,
        }
    }

    /// One reconcile pass. Errors are logged by the reconciler and retried
    /// on the next tick.
    pub async fn tick(&self) -> Option<ReconcileOutcome> {
        self.reconciler.reconcile_best_effort().await
    }

    /// Run the scheduler loop. This never returns under normal operation.
    /// Spawn it as a background task via `tokio::spawn`.
    pub async fn run(&self) {
        tracing::info!("ShiftResetScheduler started (interval={:?})", self.interval);
        loop {
            if let Some(ReconcileOutcome::Applied {
                shift,
                reset_count,
            }) = self.tick().await
            {
                tracing::debug!(
                    shift_type = %shift.shift_type,
                    shift_date = %shift.shift_date,
                    reset_count,
                    "Scheduled shift reset applied"
                );
            }
            tokio::time::sleep(self.interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone};
    use minectl_core::memory::MemoryStore;
    use minectl_core::ports::PersonnelStore;
    use minectl_core::types::{MedicalStatus, NewPerson, PersonEdit, PersonnelWrite};
    use minectl_core::FixedClock;

    #[tokio::test]
    async fn tick_resets_once_per_window() {
        let store = Arc::new(MemoryStore::new());
        let person = store
            .add_person(&NewPerson {
                full_name: "Ivan".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        store
            .apply_write(&PersonnelWrite {
                person_id: person.id,
                edit: PersonEdit {
                    medical_status: Some(MedicalStatus::Passed),
                    ..Default::default()
                },
                ..Default::default()
            })
            .await
            .unwrap();

        let site = FixedOffset::east_opt(9 * 3600).unwrap();
        let clock = Arc::new(FixedClock::new(
            site.with_ymd_and_hms(2026, 3, 10, 6, 0, 0).unwrap(),
        ));
        let reconciler = Arc::new(MedicalResetReconciler::new(
            store.clone(),
            store.clone(),
            clock,
        ));
        let scheduler = ShiftResetScheduler::new(reconciler, Duration::from_millis(10));

        assert!(matches!(
            scheduler.tick().await,
            Some(ReconcileOutcome::Applied { reset_count: 1, .. })
        ));
        assert!(matches!(
            scheduler.tick().await,
            Some(ReconcileOutcome::AlreadyApplied { .. })
        ));
    }
}
