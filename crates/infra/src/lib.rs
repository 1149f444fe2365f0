//! `boardstock-infra` — persistence and the stock-ledger transaction engine.
//!
//! The `store` module defines the storage contract (`StockStore` plus the
//! per-operation `StockTx` unit of work) with two implementations: an
//! in-memory store for tests/dev and a Postgres store backed by sqlx. The
//! `recorder` and `monitor` modules implement the production and procurement
//! services once against that contract.

pub mod monitor;
pub mod recorder;
pub mod store;


pub use monitor::ProcurementMonitor;
pub use recorder::ProductionRecorder;
pub use store::{
    ComponentFilter, ConsumptionDetail, InMemoryStockStore, PostgresStockStore,
    ProductionHistoryItem, StockStore, StockTx, TaskId, TriggerCheckTask, TriggerListItem,
};
