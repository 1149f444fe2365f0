//! `boardstock-procurement` — reorder trigger domain.
//!
//! A trigger is a PENDING/RESOLVED record representing an open or closed
//! reorder need for one component. The status is a closed enum with a
//! one-way consuming transition; at most one PENDING trigger may exist per
//! component (enforced by the stores).

pub mod trigger;

pub use trigger::{
    Trigger, TriggerResolution, TriggerStatus, needs_reorder, reorder_threshold,
};
