//! Mine site personnel control: domain core.
//!
//! Shift detection, the once-per-shift medical reset, medical admission rules
//! and the service operations behind the HTTP API. Storage is reached only
//! through the traits in [`ports`]; `minectl_postgres` implements them for
//! PostgreSQL and [`memory::MemoryStore`] keeps everything in process.

pub mod error;
pub mod memory;
pub mod ports;
pub mod proto;
pub mod reconciler;
pub mod schedule;
pub mod service;
pub mod shift;
pub mod types;
pub mod vitals;

pub use error::ControlError;
pub use reconciler::{MedicalResetReconciler, ReconcileOutcome};
pub use service::{ControlService, Stores};
pub use shift::{Clock, FixedClock, SystemClock};
