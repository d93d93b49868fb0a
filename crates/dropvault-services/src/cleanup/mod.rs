//! Reconciliation sweep

mod service;

pub use service::{SweepReport, SweepService};
