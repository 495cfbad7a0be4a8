// orderflow/src/store/postgres.rs

//! PostgreSQL `OrderStore` (sqlx, runtime queries).
//!
//! Each write is a single transaction. The status compare-and-set is a conditional `UPDATE`
//! on the axis column; the ledger row is inserted in the same transaction, so a concurrent
//! writer either sees our row and our status or neither.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use super::{CasOutcome, OrderStore, ReminderRecord, StatusChange};
use crate::error::{StoreError, StoreResult};
use crate::model::{Actor, AxisStatus, NewOrder, Order, OrderItem, ReminderLevel, StatusHistoryEntry};

const SCHEMA: &str = include_str!("../../migrations/0001_orderflow.sql");

const ORDER_COLUMNS: &str = "id, customer_name, customer_phone, customer_email, shipping_street, shipping_city, \
  shipping_state, shipping_postal_code, shipping_notes, payment_method, payment_status, order_status, \
  subtotal_cents, shipping_cost_cents, total_cents, tracking_number, payment_reference, receipt_url, \
  created_at, updated_at";

const HISTORY_COLUMNS: &str = "id, order_id, status_type, old_status, new_status, actor, note, created_at";

const ITEM_COLUMNS: &str = "id, order_id, product_name, variant, quantity, unit_price_cents, total_price_cents";

#[derive(Clone)]
pub struct PgOrderStore {
  pool: PgPool,
}

impl PgOrderStore {
  pub fn new(pool: PgPool) -> Self {
    Self { pool }
  }

  pub async fn connect(database_url: &str, max_connections: u32) -> StoreResult<Self> {
    let pool = PgPoolOptions::new()
      .max_connections(max_connections)
      .connect(database_url)
      .await?;
    Ok(Self::new(pool))
  }

  /// Applies the embedded schema. Every statement is idempotent.
  pub async fn migrate(&self) -> StoreResult<()> {
    sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
    info!("Order store schema is up to date.");
    Ok(())
  }
}

/// `%needle%` for ILIKE, with the pattern metacharacters in `needle` escaped.
fn ilike_pattern(needle: &str) -> String {
  let escaped = needle
    .trim()
    .replace('\\', "\\\\")
    .replace('%', "\\%")
    .replace('_', "\\_");
  format!("%{}%", escaped)
}

#[async_trait]
impl OrderStore for PgOrderStore {
  #[instrument(skip_all, fields(order_id = %new_order.id, items = new_order.items.len()))]
  async fn create_order(&self, new_order: NewOrder) -> StoreResult<(Order, Vec<OrderItem>)> {
    let row = new_order.to_order();
    let mut tx = self.pool.begin().await?;

    let insert_order = format!(
      "INSERT INTO orders ({cols}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20) RETURNING {cols}",
      cols = ORDER_COLUMNS
    );
    let order: Order = sqlx::query_as(&insert_order)
      .bind(row.id)
      .bind(&row.customer_name)
      .bind(&row.customer_phone)
      .bind(&row.customer_email)
      .bind(&row.shipping_street)
      .bind(&row.shipping_city)
      .bind(&row.shipping_state)
      .bind(&row.shipping_postal_code)
      .bind(&row.shipping_notes)
      .bind(row.payment_method)
      .bind(row.payment_status)
      .bind(row.order_status)
      .bind(row.subtotal_cents)
      .bind(row.shipping_cost_cents)
      .bind(row.total_cents)
      .bind(&row.tracking_number)
      .bind(&row.payment_reference)
      .bind(&row.receipt_url)
      .bind(row.created_at)
      .bind(row.updated_at)
      .fetch_one(&mut *tx)
      .await?;

    let insert_item = format!(
      "INSERT INTO order_items ({cols}) VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {cols}",
      cols = ITEM_COLUMNS
    );
    let mut items = Vec::with_capacity(new_order.items.len());
    for new_item in new_order.items {
      let item = new_item.into_item(order.id);
      // Any failure here drops `tx` uncommitted, which rolls the order row back too.
      let stored: OrderItem = sqlx::query_as(&insert_item)
        .bind(item.id)
        .bind(item.order_id)
        .bind(&item.product_name)
        .bind(&item.variant)
        .bind(item.quantity)
        .bind(item.unit_price_cents)
        .bind(item.total_price_cents)
        .fetch_one(&mut *tx)
        .await?;
      items.push(stored);
    }

    tx.commit().await?;
    debug!("Order and items committed.");
    Ok((order, items))
  }

  async fn get_order(&self, order_id: Uuid) -> StoreResult<Option<Order>> {
    let sql = format!("SELECT {} FROM orders WHERE id = $1", ORDER_COLUMNS);
    Ok(sqlx::query_as(&sql).bind(order_id).fetch_optional(&self.pool).await?)
  }

  async fn order_items(&self, order_id: Uuid) -> StoreResult<Vec<OrderItem>> {
    let sql = format!(
      "SELECT {} FROM order_items WHERE order_id = $1 ORDER BY product_name, id",
      ITEM_COLUMNS
    );
    Ok(sqlx::query_as(&sql).bind(order_id).fetch_all(&self.pool).await?)
  }

  async fn status_history(&self, order_id: Uuid) -> StoreResult<Vec<StatusHistoryEntry>> {
    let sql = format!(
      "SELECT {} FROM order_status_history WHERE order_id = $1 ORDER BY created_at, id",
      HISTORY_COLUMNS
    );
    Ok(sqlx::query_as(&sql).bind(order_id).fetch_all(&self.pool).await?)
  }

  #[instrument(skip_all, fields(order_id = %change.order_id, expected = %change.expected, target = %change.target))]
  async fn compare_and_set_status(&self, change: StatusChange) -> StoreResult<CasOutcome> {
    if change.expected.axis() != change.target.axis() {
      return Err(StoreError::Corrupt(format!(
        "compare-and-set across axes: expected {} target {}",
        change.expected, change.target
      )));
    }

    let column = match change.target {
      AxisStatus::Payment(_) => "payment_status",
      AxisStatus::Order(_) => "order_status",
    };
    let update_sql = format!(
      "UPDATE orders SET {col} = $2, updated_at = GREATEST($3, updated_at) WHERE id = $1 AND {col} = $4 RETURNING {cols}",
      col = column,
      cols = ORDER_COLUMNS
    );

    let mut tx = self.pool.begin().await?;

    let query = sqlx::query_as::<_, Order>(&update_sql).bind(change.order_id);
    let query = match change.target {
      AxisStatus::Payment(s) => query.bind(s),
      AxisStatus::Order(s) => query.bind(s),
    };
    let query = query.bind(change.at);
    let query = match change.expected {
      AxisStatus::Payment(s) => query.bind(s),
      AxisStatus::Order(s) => query.bind(s),
    };
    let updated: Option<Order> = query.fetch_optional(&mut *tx).await?;

    let Some(order) = updated else {
      let select_sql = format!("SELECT {} FROM orders WHERE id = $1", ORDER_COLUMNS);
      let current: Option<Order> = sqlx::query_as(&select_sql)
        .bind(change.order_id)
        .fetch_optional(&mut *tx)
        .await?;
      tx.rollback().await?;
      return Ok(match current {
        Some(order) => CasOutcome::Conflict { order },
        None => CasOutcome::Missing,
      });
    };

    let insert_entry = format!(
      "INSERT INTO order_status_history ({cols}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {cols}",
      cols = HISTORY_COLUMNS
    );
    let entry: StatusHistoryEntry = sqlx::query_as(&insert_entry)
      .bind(Uuid::new_v4())
      .bind(change.order_id)
      .bind(change.target.axis().status_type())
      .bind(change.expected.as_str())
      .bind(change.target.as_str())
      .bind(change.actor.to_string())
      .bind(&change.note)
      .bind(change.at)
      .fetch_one(&mut *tx)
      .await?;

    tx.commit().await?;
    Ok(CasOutcome::Applied { order, entry })
  }

  async fn record_reminder(
    &self,
    order_id: Uuid,
    level: ReminderLevel,
    actor: Actor,
    note: Option<String>,
    at: DateTime<Utc>,
  ) -> StoreResult<ReminderRecord> {
    let sql = format!(
      "INSERT INTO order_status_history ({cols}) \
       VALUES ($1, $2, 'reminder', \
         (SELECT new_status FROM order_status_history WHERE order_id = $2 AND status_type = 'reminder' ORDER BY created_at DESC LIMIT 1), \
         $3, $4, $5, $6) \
       ON CONFLICT (order_id, new_status) WHERE status_type = 'reminder' DO NOTHING \
       RETURNING {cols}",
      cols = HISTORY_COLUMNS
    );
    let inserted: Option<StatusHistoryEntry> = sqlx::query_as(&sql)
      .bind(Uuid::new_v4())
      .bind(order_id)
      .bind(level.as_str())
      .bind(actor.to_string())
      .bind(&note)
      .bind(at)
      .fetch_optional(&self.pool)
      .await?;
    Ok(match inserted {
      Some(entry) => ReminderRecord::Recorded(entry),
      None => ReminderRecord::AlreadyRecorded,
    })
  }

  async fn unpaid_orders_created_before(&self, cutoff: DateTime<Utc>) -> StoreResult<Vec<Order>> {
    let sql = format!(
      "SELECT {} FROM orders \
       WHERE payment_status = 'pending' AND order_status <> 'cancelled' \
         AND customer_email IS NOT NULL AND btrim(customer_email) <> '' \
         AND created_at <= $1 \
       ORDER BY created_at ASC",
      ORDER_COLUMNS
    );
    Ok(sqlx::query_as(&sql).bind(cutoff).fetch_all(&self.pool).await?)
  }

  async fn search_orders(&self, query: &str, limit: i64) -> StoreResult<Vec<Order>> {
    let sql = format!(
      "SELECT {} FROM orders \
       WHERE customer_name ILIKE $1 OR customer_phone ILIKE $1 OR id::text ILIKE $1 OR payment_reference ILIKE $1 \
       ORDER BY created_at DESC LIMIT $2",
      ORDER_COLUMNS
    );
    Ok(
      sqlx::query_as(&sql)
        .bind(ilike_pattern(query))
        .bind(limit.max(0))
        .fetch_all(&self.pool)
        .await?,
    )
  }

  async fn find_by_reference(&self, reference: &str) -> StoreResult<Option<Order>> {
    let sql = format!(
      "SELECT {} FROM orders WHERE payment_reference ILIKE $1 OR id::text ILIKE $1 ORDER BY created_at DESC LIMIT 1",
      ORDER_COLUMNS
    );
    Ok(
      sqlx::query_as(&sql)
        .bind(ilike_pattern(reference))
        .fetch_optional(&self.pool)
        .await?,
    )
  }

  async fn set_tracking_number(
    &self,
    order_id: Uuid,
    tracking_number: &str,
    at: DateTime<Utc>,
  ) -> StoreResult<Option<Order>> {
    let sql = format!(
      "UPDATE orders SET tracking_number = $2, updated_at = GREATEST($3, updated_at) WHERE id = $1 RETURNING {}",
      ORDER_COLUMNS
    );
    Ok(
      sqlx::query_as(&sql)
        .bind(order_id)
        .bind(tracking_number)
        .bind(at)
        .fetch_optional(&self.pool)
        .await?,
    )
  }

  async fn attach_receipt(&self, order_id: Uuid, receipt_url: &str, at: DateTime<Utc>) -> StoreResult<Option<Order>> {
    let sql = format!(
      "UPDATE orders SET receipt_url = $2, updated_at = GREATEST($3, updated_at) WHERE id = $1 RETURNING {}",
      ORDER_COLUMNS
    );
    Ok(
      sqlx::query_as(&sql)
        .bind(order_id)
        .bind(receipt_url)
        .bind(at)
        .fetch_optional(&self.pool)
        .await?,
    )
  }
}
