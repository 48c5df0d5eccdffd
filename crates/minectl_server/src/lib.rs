//! REST server for the mine site personnel control back end.

pub mod config;
pub mod error;
pub mod export;
pub mod handlers;
pub mod router;
pub mod scheduler;
