use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::database::error::DatabaseError;
use crate::database::repository::{OrderMutation, OrderStore, UpdatedOrder};
use crate::middleware::logging::log_database_query;
use crate::orders::types::{LineItem, NewOrder, Order, OrderStatus, UserSnapshot};

const ORDER_COLUMNS: &str = "id, user_snapshot, line_items, order_status, payment_status, \
                             total_amount, created_at, updated_at";

#[derive(Debug, FromRow)]
struct OrderRow {
    id: Uuid,
    user_snapshot: Json<UserSnapshot>,
    line_items: Json<Vec<LineItem>>,
    order_status: String,
    payment_status: String,
    total_amount: BigDecimal,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = DatabaseError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let id = row.id;
        Ok(Order {
            id,
            user: row.user_snapshot.0,
            line_items: row.line_items.0,
            order_status: row
                .order_status
                .parse()
                .map_err(|e| DatabaseError::decode(format!("order {}: {}", id, e)))?,
            payment_status: row
                .payment_status
                .parse()
                .map_err(|e| DatabaseError::decode(format!("order {}: {}", id, e)))?,
            total_amount: row.total_amount,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn into_orders(rows: Vec<OrderRow>) -> Result<Vec<Order>, DatabaseError> {
    rows.into_iter().map(Order::try_from).collect()
}

/// Postgres-backed order store. Updates lock the row with
/// `SELECT ... FOR UPDATE` for the duration of the mutation.
#[derive(Clone)]
pub struct PgOrderRepository {
    pool: PgPool,
}

impl PgOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderStore for PgOrderRepository {
    async fn save(&self, order: NewOrder) -> Result<Order, DatabaseError> {
        let order = order.into_order(Uuid::new_v4());

        let row = log_database_query("INSERT INTO orders", async {
            sqlx::query_as::<_, OrderRow>(&format!(
                "INSERT INTO orders (id, user_snapshot, line_items, order_status, payment_status, \
                 total_amount, created_at, updated_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
                 RETURNING {}",
                ORDER_COLUMNS
            ))
            .bind(order.id)
            .bind(Json(&order.user))
            .bind(Json(&order.line_items))
            .bind(order.order_status.as_str())
            .bind(order.payment_status.as_str())
            .bind(&order.total_amount)
            .bind(order.created_at)
            .bind(order.updated_at)
            .fetch_one(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)
        })
        .await?;

        Order::try_from(row)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Order>, DatabaseError> {
        let row = log_database_query("SELECT orders by id", async {
            sqlx::query_as::<_, OrderRow>(&format!(
                "SELECT {} FROM orders WHERE id = $1",
                ORDER_COLUMNS
            ))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)
        })
        .await?;

        row.map(Order::try_from).transpose()
    }

    async fn update_by_id(
        &self,
        id: Uuid,
        mutation: OrderMutation,
    ) -> Result<Option<UpdatedOrder>, DatabaseError> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::from_sqlx)?;

        let row = log_database_query("SELECT orders FOR UPDATE", async {
            sqlx::query_as::<_, OrderRow>(&format!(
                "SELECT {} FROM orders WHERE id = $1 FOR UPDATE",
                ORDER_COLUMNS
            ))
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(DatabaseError::from_sqlx)
        })
        .await?;

        let mut order = match row {
            Some(row) => Order::try_from(row)?,
            None => {
                tx.rollback().await.map_err(DatabaseError::from_sqlx)?;
                return Ok(None);
            }
        };

        let patch = match mutation(&order) {
            Some(patch) => patch,
            None => {
                tx.rollback().await.map_err(DatabaseError::from_sqlx)?;
                return Ok(Some(UpdatedOrder {
                    order,
                    applied: false,
                }));
            }
        };

        order.apply_patch(&patch);

        log_database_query("UPDATE orders", async {
            sqlx::query(
                "UPDATE orders SET order_status = $2, payment_status = $3, updated_at = $4 \
                 WHERE id = $1",
            )
            .bind(order.id)
            .bind(order.order_status.as_str())
            .bind(order.payment_status.as_str())
            .bind(order.updated_at)
            .execute(&mut *tx)
            .await
            .map_err(DatabaseError::from_sqlx)
        })
        .await?;

        tx.commit().await.map_err(DatabaseError::from_sqlx)?;

        Ok(Some(UpdatedOrder {
            order,
            applied: true,
        }))
    }

    async fn find_all(&self) -> Result<Vec<Order>, DatabaseError> {
        let rows = log_database_query("SELECT orders", async {
            sqlx::query_as::<_, OrderRow>(&format!(
                "SELECT {} FROM orders ORDER BY created_at ASC, id ASC",
                ORDER_COLUMNS
            ))
            .fetch_all(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)
        })
        .await?;

        into_orders(rows)
    }

    async fn find_by_status(&self, statuses: &[OrderStatus]) -> Result<Vec<Order>, DatabaseError> {
        let statuses: Vec<&str> = statuses.iter().map(OrderStatus::as_str).collect();

        let rows = log_database_query("SELECT orders by status", async {
            sqlx::query_as::<_, OrderRow>(&format!(
                "SELECT {} FROM orders WHERE order_status = ANY($1) ORDER BY created_at ASC, id ASC",
                ORDER_COLUMNS
            ))
            .bind(statuses)
            .fetch_all(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)
        })
        .await?;

        into_orders(rows)
    }
}
