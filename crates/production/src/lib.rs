//! `boardstock-production` — production request and audit-trail types.
//!
//! A committed production run is one immutable `ProductionEntry` plus one
//! append-only `ConsumptionRecord` per component deducted. Neither is ever
//! mutated or deleted.

pub mod record;

pub use record::{ConsumptionRecord, ProductionEntry, ProductionReceipt, ProductionRequest};
