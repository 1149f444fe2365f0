//! Storage boundary for the stock ledger.
//!
//! This module defines the storage contract — `StockStore` plus the
//! per-operation `StockTx` unit of work — without making any backend
//! assumptions, and ships an in-memory backend (tests/dev) and a Postgres
//! backend (sqlx).

pub mod in_memory;
pub mod outbox;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryStockStore;
pub use outbox::{TaskId, TriggerCheckTask};
pub use postgres::PostgresStockStore;
pub use r#trait::{
    ComponentFilter, ConsumptionDetail, ProductionHistoryItem, StockStore, StockTx,
    TriggerListItem,
};
