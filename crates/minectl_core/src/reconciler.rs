//! Shift-start medical reset.
//!
//! At the start of every shift window every worker must pass a fresh medical
//! check, so the first trigger inside a `to_shift` window moves all
//! non-archived personnel back to `pending`. The reset is applied at most once
//! per `(shift_type, shift_date)`: the store claims a log row for the window
//! and only the claimant writes.
//!
//! Triggers are the background scheduler, the optional per-request hook and
//! the manual admin endpoint. All of them go through [`MedicalResetReconciler::reconcile`].

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::ports::{ResetStore, Result, SettingsStore};
use crate::schedule::ShiftSchedule;
use crate::shift::{current_shift, Clock};
use crate::types::{
    event_types, notification_types, NewEvent, NewNotification, ResetApplication, ShiftInfo,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReconcileOutcome {
    /// The site is in a departure window; nothing to reset.
    NotShiftStart { shift: ShiftInfo },
    AlreadyApplied { shift: ShiftInfo },
    Applied { shift: ShiftInfo, reset_count: u64 },
}

impl ReconcileOutcome {
    pub fn shift(&self) -> ShiftInfo {
        match *self {
            Self::NotShiftStart { shift }
            | Self::AlreadyApplied { shift }
            | Self::Applied { shift, .. } => shift,
        }
    }
}

/// Audit event and dispatcher notification written alongside a reset that
/// touched `reset_count > 0` persons.
pub fn reset_notice(shift: &ShiftInfo, reset_count: u64) -> (NewEvent, NewNotification) {
    let label = shift.shift_type.label();
    let event = NewEvent::new(
        event_types::MEDICAL_RESET,
        format!(
            "{label} shift {}: medical status reset to pending for {reset_count} persons",
            shift.shift_date
        ),
        None,
    );
    let notification = NewNotification {
        kind: notification_types::MEDICAL_RESET.to_string(),
        title: format!("{label} shift started: medical checks required"),
        message: format!(
            "Medical status of {reset_count} persons was reset. Everyone must pass the pre-shift check."
        ),
        person_name: None,
        person_code: None,
    };
    (event, notification)
}

/// Stored schedule, or the built-in default when it is missing or the
/// settings store cannot be read.
pub async fn effective_schedule(settings: &dyn SettingsStore) -> ShiftSchedule {
    match settings.load_shift_schedule().await {
        Ok(Some(value)) => ShiftSchedule::from_settings_value(&value),
        Ok(None) => ShiftSchedule::default(),
        Err(e) => {
            warn!(error = %e, "Failed to load shift schedule, using default");
            ShiftSchedule::default()
        }
    }
}

pub struct MedicalResetReconciler {
    settings: Arc<dyn SettingsStore>,
    resets: Arc<dyn ResetStore>,
    clock: Arc<dyn Clock>,
}

impl MedicalResetReconciler {
    pub fn new(
        settings: Arc<dyn SettingsStore>,
        resets: Arc<dyn ResetStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            settings,
            resets,
            clock,
        }
    }

    /// Detect the current window and apply its reset if this is a shift
    /// start that has not been reset yet.
    pub async fn reconcile(&self) -> Result<ReconcileOutcome> {
        let schedule = effective_schedule(self.settings.as_ref()).await;
        let shift = current_shift(self.clock.as_ref(), &schedule);

        if !shift.is_shift_start() {
            debug!(shift = %shift.describe(), "Not a shift start, skipping medical reset");
            return Ok(ReconcileOutcome::NotShiftStart { shift });
        }

        // Cheap pre-check; the claim inside apply_reset is what decides.
        if self.resets.reset_applied(&shift).await? {
            return Ok(ReconcileOutcome::AlreadyApplied { shift });
        }

        match self.resets.apply_reset(&shift).await? {
            ResetApplication::Applied { reset_count } => {
                info!(
                    shift_type = %shift.shift_type,
                    shift_date = %shift.shift_date,
                    reset_count,
                    "Shift medical reset applied"
                );
                Ok(ReconcileOutcome::Applied { shift, reset_count })
            }
            ResetApplication::AlreadyApplied => {
                debug!(
                    shift_type = %shift.shift_type,
                    shift_date = %shift.shift_date,
                    "Shift medical reset claimed by another caller"
                );
                Ok(ReconcileOutcome::AlreadyApplied { shift })
            }
        }
    }

    /// [`Self::reconcile`] for triggers that must never fail their caller.
    /// Errors are logged and the next trigger retries.
    pub async fn reconcile_best_effort(&self) -> Option<ReconcileOutcome> {
        match self.reconcile().await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                warn!(error = %e, "Shift medical reset failed, will retry on next trigger");
                None
            }
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }
}
