//! Postgres-backed stock store.
//!
//! Row-level locking discipline: every unit of work that touches component
//! stock locks the affected rows with `SELECT … FOR UPDATE`, in ascending id
//! order, before reading the values it will act on. The `current_stock >= 0`
//! CHECK constraint and the partial unique index on pending triggers are the
//! database-level backstops for the two ledger invariants.
//!
//! SQLx error mapping: unique violations (`23505`) become `Error::Conflict`,
//! foreign-key violations (`23503`) become `Error::Conflict` (the row is
//! referenced), check violations (`23514`) and everything else become
//! `Error::Transaction`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{FromRow, Postgres, Transaction};
use tracing::instrument;
use uuid::Uuid;

use boardstock_catalog::{
    BomLine, Component, ComponentPatch, NewBomLine, Pcb, PcbPatch, bom_line::validate_lines,
};
use boardstock_core::{
    BomLineId, ComponentId, ConsumptionRecordId, Error, PcbId, ProductionEntryId, Result,
    TriggerId, UserId,
};
use boardstock_procurement::{Trigger, TriggerStatus};
use boardstock_production::{ConsumptionRecord, ProductionEntry};

use super::outbox::{TaskId, TriggerCheckTask};
use super::r#trait::{
    ComponentFilter, ConsumptionDetail, ProductionHistoryItem, StockStore, StockTx,
    TriggerListItem,
};

const SCHEMA: &str = include_str!("schema.sql");

/// Postgres implementation of [`StockStore`].
#[derive(Debug, Clone)]
pub struct PostgresStockStore {
    pool: PgPool,
}

impl PostgresStockStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect to the given database URL with a small pool.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| Error::transaction(format!("failed to connect: {e}")))?;
        Ok(Self::new(pool))
    }

    /// Create tables and indexes if they do not exist yet.
    #[instrument(skip(self), err)]
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Map SQLx errors onto the engine taxonomy.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> Error {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                // Unique violation: duplicate part number / pcb code / BOM
                // mapping, or a second pending trigger for one component.
                Some("23505") => Error::Conflict(msg),
                // Foreign-key violation: the row is still referenced.
                Some("23503") => Error::Conflict(msg),
                _ => Error::Transaction(msg),
            }
        }
        other => Error::Transaction(format!("sqlx error in {operation}: {other}")),
    }
}

// Row types.

#[derive(Debug, FromRow)]
struct ComponentRow {
    id: Uuid,
    name: String,
    part_number: String,
    current_stock: i64,
    monthly_required_quantity: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ComponentRow> for Component {
    fn from(row: ComponentRow) -> Self {
        Component {
            id: ComponentId::from_uuid(row.id),
            name: row.name,
            part_number: row.part_number,
            current_stock: row.current_stock,
            monthly_required_quantity: row.monthly_required_quantity,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct PcbRow {
    id: Uuid,
    name: String,
    code: String,
    description: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<PcbRow> for Pcb {
    fn from(row: PcbRow) -> Self {
        Pcb {
            id: PcbId::from_uuid(row.id),
            name: row.name,
            code: row.code,
            description: row.description,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct BomLineRow {
    id: Uuid,
    pcb_id: Uuid,
    component_id: Uuid,
    quantity_per_unit: i64,
    alternative_component_id: Option<Uuid>,
}

impl From<BomLineRow> for BomLine {
    fn from(row: BomLineRow) -> Self {
        BomLine {
            id: BomLineId::from_uuid(row.id),
            pcb_id: PcbId::from_uuid(row.pcb_id),
            component_id: ComponentId::from_uuid(row.component_id),
            quantity_per_unit: row.quantity_per_unit,
            alternative_component_id: row
                .alternative_component_id
                .map(ComponentId::from_uuid),
        }
    }
}

#[derive(Debug, FromRow)]
struct ProductionEntryRow {
    id: Uuid,
    pcb_id: Uuid,
    quantity_produced: i64,
    produced_by: Uuid,
    created_at: DateTime<Utc>,
}

impl From<ProductionEntryRow> for ProductionEntry {
    fn from(row: ProductionEntryRow) -> Self {
        ProductionEntry {
            id: ProductionEntryId::from_uuid(row.id),
            pcb_id: PcbId::from_uuid(row.pcb_id),
            quantity_produced: row.quantity_produced,
            produced_by: UserId::from_uuid(row.produced_by),
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct TriggerRow {
    id: Uuid,
    component_id: Uuid,
    stock_at_trigger: i64,
    monthly_required_quantity: i64,
    threshold: i64,
    status: String,
    po_reference: Option<String>,
    stock_at_resolution: Option<i64>,
    created_at: DateTime<Utc>,
    resolved_at: Option<DateTime<Utc>>,
}

impl TriggerRow {
    fn into_trigger(self) -> Result<Trigger> {
        Ok(Trigger {
            id: TriggerId::from_uuid(self.id),
            component_id: ComponentId::from_uuid(self.component_id),
            stock_at_trigger: self.stock_at_trigger,
            monthly_required_quantity: self.monthly_required_quantity,
            threshold: self.threshold,
            status: TriggerStatus::parse(&self.status)
                .map_err(|e| Error::transaction(format!("bad trigger row: {e}")))?,
            po_reference: self.po_reference,
            stock_at_resolution: self.stock_at_resolution,
            created_at: self.created_at,
            resolved_at: self.resolved_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct TriggerListRow {
    #[sqlx(flatten)]
    trigger: TriggerRow,
    component_name: String,
    part_number: String,
}

#[derive(Debug, FromRow)]
struct ProductionHistoryRow {
    #[sqlx(flatten)]
    entry: ProductionEntryRow,
    pcb_name: String,
    pcb_code: String,
}

#[derive(Debug, FromRow)]
struct ConsumptionRow {
    id: Uuid,
    production_entry_id: Uuid,
    component_id: Uuid,
    quantity_consumed: i64,
    stock_before: i64,
    stock_after: i64,
    created_at: DateTime<Utc>,
}

impl From<ConsumptionRow> for ConsumptionRecord {
    fn from(row: ConsumptionRow) -> Self {
        ConsumptionRecord {
            id: ConsumptionRecordId::from_uuid(row.id),
            production_entry_id: ProductionEntryId::from_uuid(row.production_entry_id),
            component_id: ComponentId::from_uuid(row.component_id),
            quantity_consumed: row.quantity_consumed,
            stock_before: row.stock_before,
            stock_after: row.stock_after,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct ConsumptionDetailRow {
    #[sqlx(flatten)]
    record: ConsumptionRow,
    component_name: String,
    part_number: String,
}

#[derive(Debug, FromRow)]
struct TaskRow {
    id: Uuid,
    production_entry_id: Option<Uuid>,
    component_id: Uuid,
    attempts: i32,
    last_error: Option<String>,
    created_at: DateTime<Utc>,
    processed_at: Option<DateTime<Utc>>,
}

impl From<TaskRow> for TriggerCheckTask {
    fn from(row: TaskRow) -> Self {
        TriggerCheckTask {
            id: TaskId::from_uuid(row.id),
            production_entry_id: row.production_entry_id.map(ProductionEntryId::from_uuid),
            component_id: ComponentId::from_uuid(row.component_id),
            attempts: row.attempts,
            last_error: row.last_error,
            created_at: row.created_at,
            processed_at: row.processed_at,
        }
    }
}

// Unit of work.

struct PgStockTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StockTx for PgStockTx {
    async fn bom_lines(&mut self, pcb_id: PcbId) -> Result<Vec<BomLine>> {
        let rows = sqlx::query_as::<_, BomLineRow>(
            r#"
            SELECT id, pcb_id, component_id, quantity_per_unit, alternative_component_id
            FROM pcb_components
            WHERE pcb_id = $1
            "#,
        )
        .bind(pcb_id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("bom_lines", e))?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn lock_components(&mut self, ids: &[ComponentId]) -> Result<Vec<Component>> {
        let uuids: Vec<Uuid> = ids.iter().map(|id| *id.as_uuid()).collect();
        let rows = sqlx::query_as::<_, ComponentRow>(
            r#"
            SELECT id, name, part_number, current_stock, monthly_required_quantity,
                   created_at, updated_at
            FROM components
            WHERE id = ANY($1)
            ORDER BY id
            FOR UPDATE
            "#,
        )
        .bind(&uuids)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("lock_components", e))?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn insert_production_entry(&mut self, entry: &ProductionEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO production_entries (id, pcb_id, quantity_produced, produced_by, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(entry.id.as_uuid())
        .bind(entry.pcb_id.as_uuid())
        .bind(entry.quantity_produced)
        .bind(entry.produced_by.as_uuid())
        .bind(entry.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_production_entry", e))?;
        Ok(())
    }

    async fn deduct_stock(&mut self, id: ComponentId, quantity: i64) -> Result<i64> {
        let stock = sqlx::query_scalar::<_, i64>(
            r#"
            UPDATE components
            SET current_stock = current_stock - $2, updated_at = NOW()
            WHERE id = $1
            RETURNING current_stock
            "#,
        )
        .bind(id.as_uuid())
        .bind(quantity)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("deduct_stock", e))?;
        Ok(stock)
    }

    async fn restock(&mut self, id: ComponentId, quantity: i64) -> Result<i64> {
        let stock = sqlx::query_scalar::<_, i64>(
            r#"
            UPDATE components
            SET current_stock = current_stock + $2, updated_at = NOW()
            WHERE id = $1
            RETURNING current_stock
            "#,
        )
        .bind(id.as_uuid())
        .bind(quantity)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("restock", e))?;
        Ok(stock)
    }

    async fn insert_consumption(&mut self, record: &ConsumptionRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO consumption_history
                (id, production_entry_id, component_id, quantity_consumed,
                 stock_before, stock_after, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(record.id.as_uuid())
        .bind(record.production_entry_id.as_uuid())
        .bind(record.component_id.as_uuid())
        .bind(record.quantity_consumed)
        .bind(record.stock_before)
        .bind(record.stock_after)
        .bind(record.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_consumption", e))?;
        Ok(())
    }

    async fn enqueue_trigger_check(&mut self, task: &TriggerCheckTask) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO trigger_check_outbox
                (id, production_entry_id, component_id, attempts, last_error,
                 created_at, processed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(task.id.0)
        .bind(task.production_entry_id.map(|id| *id.as_uuid()))
        .bind(task.component_id.as_uuid())
        .bind(task.attempts)
        .bind(&task.last_error)
        .bind(task.created_at)
        .bind(task.processed_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("enqueue_trigger_check", e))?;
        Ok(())
    }

    async fn get_trigger(&mut self, id: TriggerId) -> Result<Option<Trigger>> {
        let row = sqlx::query_as::<_, TriggerRow>(
            r#"
            SELECT id, component_id, stock_at_trigger, monthly_required_quantity,
                   threshold, status, po_reference, stock_at_resolution,
                   created_at, resolved_at
            FROM procurement_triggers
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("get_trigger", e))?;
        row.map(TriggerRow::into_trigger).transpose()
    }

    async fn find_pending_trigger(
        &mut self,
        component_id: ComponentId,
    ) -> Result<Option<Trigger>> {
        let row = sqlx::query_as::<_, TriggerRow>(
            r#"
            SELECT id, component_id, stock_at_trigger, monthly_required_quantity,
                   threshold, status, po_reference, stock_at_resolution,
                   created_at, resolved_at
            FROM procurement_triggers
            WHERE component_id = $1 AND status = 'PENDING'
            "#,
        )
        .bind(component_id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("find_pending_trigger", e))?;
        row.map(TriggerRow::into_trigger).transpose()
    }

    async fn insert_trigger(&mut self, trigger: &Trigger) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO procurement_triggers
                (id, component_id, stock_at_trigger, monthly_required_quantity,
                 threshold, status, po_reference, stock_at_resolution,
                 created_at, resolved_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(trigger.id.as_uuid())
        .bind(trigger.component_id.as_uuid())
        .bind(trigger.stock_at_trigger)
        .bind(trigger.monthly_required_quantity)
        .bind(trigger.threshold)
        .bind(trigger.status.as_str())
        .bind(&trigger.po_reference)
        .bind(trigger.stock_at_resolution)
        .bind(trigger.created_at)
        .bind(trigger.resolved_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_trigger", e))?;
        Ok(())
    }

    async fn update_trigger(&mut self, trigger: &Trigger) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE procurement_triggers
            SET status = $2, po_reference = $3, stock_at_resolution = $4, resolved_at = $5
            WHERE id = $1
            "#,
        )
        .bind(trigger.id.as_uuid())
        .bind(trigger.status.as_str())
        .bind(&trigger.po_reference)
        .bind(trigger.stock_at_resolution)
        .bind(trigger.resolved_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("update_trigger", e))?;
        if result.rows_affected() == 0 {
            return Err(Error::not_found());
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit", e))
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.tx
            .rollback()
            .await
            .map_err(|e| map_sqlx_error("rollback", e))
    }
}

#[async_trait]
impl StockStore for PostgresStockStore {
    async fn begin(&self) -> Result<Box<dyn StockTx>> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin", e))?;
        Ok(Box::new(PgStockTx { tx }))
    }

    #[instrument(skip(self, component), fields(part_number = %component.part_number), err)]
    async fn insert_component(&self, component: Component) -> Result<Component> {
        sqlx::query(
            r#"
            INSERT INTO components
                (id, name, part_number, current_stock, monthly_required_quantity,
                 created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(component.id.as_uuid())
        .bind(&component.name)
        .bind(&component.part_number)
        .bind(component.current_stock)
        .bind(component.monthly_required_quantity)
        .bind(component.created_at)
        .bind(component.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_component", e))?;
        Ok(component)
    }

    async fn get_component(&self, id: ComponentId) -> Result<Option<Component>> {
        let row = sqlx::query_as::<_, ComponentRow>(
            r#"
            SELECT id, name, part_number, current_stock, monthly_required_quantity,
                   created_at, updated_at
            FROM components
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_component", e))?;
        Ok(row.map(Into::into))
    }

    async fn list_components(&self, filter: ComponentFilter) -> Result<Vec<Component>> {
        let pattern = filter.search.as_ref().map(|s| format!("%{s}%"));
        let rows = sqlx::query_as::<_, ComponentRow>(
            r#"
            SELECT id, name, part_number, current_stock, monthly_required_quantity,
                   created_at, updated_at
            FROM components
            WHERE ($1::text IS NULL OR name ILIKE $1 OR part_number ILIKE $1)
              AND (NOT $2 OR current_stock < CEIL(monthly_required_quantity * 0.2))
            ORDER BY name
            "#,
        )
        .bind(pattern)
        .bind(filter.low_stock_only)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_components", e))?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self, patch), fields(component_id = %id), err)]
    async fn update_component(
        &self,
        id: ComponentId,
        patch: ComponentPatch,
    ) -> Result<Component> {
        patch.validate()?;
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin", e))?;

        let row = sqlx::query_as::<_, ComponentRow>(
            r#"
            SELECT id, name, part_number, current_stock, monthly_required_quantity,
                   created_at, updated_at
            FROM components
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("update_component", e))?;

        let mut component: Component = row.ok_or_else(Error::not_found)?.into();
        patch.apply(&mut component, Utc::now())?;

        sqlx::query(
            r#"
            UPDATE components
            SET name = $2, part_number = $3, current_stock = $4,
                monthly_required_quantity = $5, updated_at = $6
            WHERE id = $1
            "#,
        )
        .bind(component.id.as_uuid())
        .bind(&component.name)
        .bind(&component.part_number)
        .bind(component.current_stock)
        .bind(component.monthly_required_quantity)
        .bind(component.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("update_component", e))?;

        tx.commit().await.map_err(|e| map_sqlx_error("commit", e))?;
        Ok(component)
    }

    #[instrument(skip(self), fields(component_id = %id), err)]
    async fn delete_component(&self, id: ComponentId) -> Result<()> {
        let result = sqlx::query("DELETE FROM components WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_component", e))?;
        if result.rows_affected() == 0 {
            return Err(Error::not_found());
        }
        Ok(())
    }

    #[instrument(skip(self, pcb), fields(code = %pcb.code), err)]
    async fn insert_pcb(&self, pcb: Pcb) -> Result<Pcb> {
        sqlx::query(
            r#"
            INSERT INTO pcbs (id, name, code, description, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(pcb.id.as_uuid())
        .bind(&pcb.name)
        .bind(&pcb.code)
        .bind(&pcb.description)
        .bind(pcb.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_pcb", e))?;
        Ok(pcb)
    }

    async fn get_pcb(&self, id: PcbId) -> Result<Option<Pcb>> {
        let row = sqlx::query_as::<_, PcbRow>(
            "SELECT id, name, code, description, created_at FROM pcbs WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_pcb", e))?;
        Ok(row.map(Into::into))
    }

    async fn list_pcbs(&self) -> Result<Vec<Pcb>> {
        let rows = sqlx::query_as::<_, PcbRow>(
            "SELECT id, name, code, description, created_at FROM pcbs ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_pcbs", e))?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self, patch), fields(pcb_id = %id), err)]
    async fn update_pcb(&self, id: PcbId, patch: PcbPatch) -> Result<Pcb> {
        patch.validate()?;
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin", e))?;

        let row = sqlx::query_as::<_, PcbRow>(
            "SELECT id, name, code, description, created_at FROM pcbs WHERE id = $1 FOR UPDATE",
        )
        .bind(id.as_uuid())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("update_pcb", e))?;

        let mut pcb: Pcb = row.ok_or_else(Error::not_found)?.into();
        patch.apply(&mut pcb)?;

        sqlx::query("UPDATE pcbs SET name = $2, code = $3, description = $4 WHERE id = $1")
            .bind(pcb.id.as_uuid())
            .bind(&pcb.name)
            .bind(&pcb.code)
            .bind(&pcb.description)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("update_pcb", e))?;

        tx.commit().await.map_err(|e| map_sqlx_error("commit", e))?;
        Ok(pcb)
    }

    #[instrument(skip(self), fields(pcb_id = %id), err)]
    async fn delete_pcb(&self, id: PcbId) -> Result<()> {
        let result = sqlx::query("DELETE FROM pcbs WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_pcb", e))?;
        if result.rows_affected() == 0 {
            return Err(Error::not_found());
        }
        Ok(())
    }

    #[instrument(skip(self, lines), fields(pcb_id = %pcb_id, line_count = lines.len()), err)]
    async fn replace_bom_lines(
        &self,
        pcb_id: PcbId,
        lines: Vec<NewBomLine>,
    ) -> Result<Vec<BomLine>> {
        validate_lines(&lines)?;
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin", e))?;

        let pcb_exists = sqlx::query_scalar::<_, Uuid>("SELECT id FROM pcbs WHERE id = $1")
            .bind(pcb_id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("replace_bom_lines", e))?;
        if pcb_exists.is_none() {
            return Err(Error::not_found());
        }

        let mut referenced: Vec<Uuid> = lines
            .iter()
            .flat_map(|l| {
                std::iter::once(*l.component_id.as_uuid())
                    .chain(l.alternative_component_id.map(|id| *id.as_uuid()))
            })
            .collect();
        referenced.sort();
        referenced.dedup();

        let known = sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM components WHERE id = ANY($1)",
        )
        .bind(&referenced)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("replace_bom_lines", e))?;
        if known.len() != referenced.len() {
            return Err(Error::validation("BOM line references an unknown component"));
        }

        sqlx::query("DELETE FROM pcb_components WHERE pcb_id = $1")
            .bind(pcb_id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("replace_bom_lines", e))?;

        let mut inserted = Vec::with_capacity(lines.len());
        for line in lines {
            let line = line.into_line(pcb_id)?;
            sqlx::query(
                r#"
                INSERT INTO pcb_components
                    (id, pcb_id, component_id, quantity_per_unit, alternative_component_id)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(line.id.as_uuid())
            .bind(line.pcb_id.as_uuid())
            .bind(line.component_id.as_uuid())
            .bind(line.quantity_per_unit)
            .bind(line.alternative_component_id.map(|id| *id.as_uuid()))
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("replace_bom_lines", e))?;
            inserted.push(line);
        }

        tx.commit().await.map_err(|e| map_sqlx_error("commit", e))?;
        Ok(inserted)
    }

    async fn bom_lines_for_pcb(&self, pcb_id: PcbId) -> Result<Vec<BomLine>> {
        let rows = sqlx::query_as::<_, BomLineRow>(
            r#"
            SELECT id, pcb_id, component_id, quantity_per_unit, alternative_component_id
            FROM pcb_components
            WHERE pcb_id = $1
            "#,
        )
        .bind(pcb_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("bom_lines_for_pcb", e))?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn list_triggers(&self) -> Result<Vec<TriggerListItem>> {
        let rows = sqlx::query_as::<_, TriggerListRow>(
            r#"
            SELECT pt.id, pt.component_id, pt.stock_at_trigger,
                   pt.monthly_required_quantity, pt.threshold, pt.status,
                   pt.po_reference, pt.stock_at_resolution, pt.created_at,
                   pt.resolved_at, c.name AS component_name, c.part_number
            FROM procurement_triggers pt
            JOIN components c ON c.id = pt.component_id
            ORDER BY pt.created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_triggers", e))?;

        rows.into_iter()
            .map(|row| {
                Ok(TriggerListItem {
                    trigger: row.trigger.into_trigger()?,
                    component_name: row.component_name,
                    part_number: row.part_number,
                })
            })
            .collect()
    }

    async fn get_production_entry(
        &self,
        id: ProductionEntryId,
    ) -> Result<Option<ProductionEntry>> {
        let row = sqlx::query_as::<_, ProductionEntryRow>(
            r#"
            SELECT id, pcb_id, quantity_produced, produced_by, created_at
            FROM production_entries
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_production_entry", e))?;
        Ok(row.map(Into::into))
    }

    async fn production_history(&self, limit: i64) -> Result<Vec<ProductionHistoryItem>> {
        let rows = sqlx::query_as::<_, ProductionHistoryRow>(
            r#"
            SELECT pe.id, pe.pcb_id, pe.quantity_produced, pe.produced_by,
                   pe.created_at, p.name AS pcb_name, p.code AS pcb_code
            FROM production_entries pe
            JOIN pcbs p ON p.id = pe.pcb_id
            ORDER BY pe.created_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("production_history", e))?;

        Ok(rows
            .into_iter()
            .map(|row| ProductionHistoryItem {
                entry: row.entry.into(),
                pcb_name: row.pcb_name,
                pcb_code: row.pcb_code,
            })
            .collect())
    }

    async fn consumption_for_entry(
        &self,
        entry: ProductionEntryId,
    ) -> Result<Vec<ConsumptionDetail>> {
        let rows = sqlx::query_as::<_, ConsumptionDetailRow>(
            r#"
            SELECT ch.id, ch.production_entry_id, ch.component_id,
                   ch.quantity_consumed, ch.stock_before, ch.stock_after,
                   ch.created_at, c.name AS component_name, c.part_number
            FROM consumption_history ch
            JOIN components c ON c.id = ch.component_id
            WHERE ch.production_entry_id = $1
            ORDER BY c.name
            "#,
        )
        .bind(entry.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("consumption_for_entry", e))?;

        Ok(rows
            .into_iter()
            .map(|row| ConsumptionDetail {
                record: row.record.into(),
                component_name: row.component_name,
                part_number: row.part_number,
            })
            .collect())
    }

    async fn due_trigger_checks(&self, limit: i64) -> Result<Vec<TriggerCheckTask>> {
        let rows = sqlx::query_as::<_, TaskRow>(
            r#"
            SELECT id, production_entry_id, component_id, attempts, last_error,
                   created_at, processed_at
            FROM trigger_check_outbox
            WHERE processed_at IS NULL
            ORDER BY created_at
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("due_trigger_checks", e))?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn trigger_checks_for_entry(
        &self,
        entry: ProductionEntryId,
    ) -> Result<Vec<TriggerCheckTask>> {
        let rows = sqlx::query_as::<_, TaskRow>(
            r#"
            SELECT id, production_entry_id, component_id, attempts, last_error,
                   created_at, processed_at
            FROM trigger_check_outbox
            WHERE production_entry_id = $1 AND processed_at IS NULL
            ORDER BY created_at
            "#,
        )
        .bind(entry.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("trigger_checks_for_entry", e))?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn complete_trigger_check(&self, id: TaskId) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE trigger_check_outbox
            SET processed_at = NOW(), attempts = attempts + 1
            WHERE id = $1
            "#,
        )
        .bind(id.0)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("complete_trigger_check", e))?;
        if result.rows_affected() == 0 {
            return Err(Error::not_found());
        }
        Ok(())
    }

    async fn record_trigger_check_failure(&self, id: TaskId, error: &str) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE trigger_check_outbox
            SET attempts = attempts + 1, last_error = $2
            WHERE id = $1
            "#,
        )
        .bind(id.0)
        .bind(error)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("record_trigger_check_failure", e))?;
        if result.rows_affected() == 0 {
            return Err(Error::not_found());
        }
        Ok(())
    }
}
