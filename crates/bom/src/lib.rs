//! `boardstock-bom` — pure BOM resolution.
//!
//! Expands a PCB's BOM lines into per-line consumption plan items or
//! shortfall descriptors, resolving caller-requested substitutions. No I/O:
//! the caller supplies component snapshots (typically read under row locks)
//! and receives a deterministic partition of the lines.

pub mod resolver;

pub use resolver::{
    BomRequirement, ComponentSnapshot, PlannedConsumption, Resolution, Substitutions,
    resolve_requirements,
};
