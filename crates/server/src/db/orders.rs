//! Order repository.

use std::collections::HashMap;

use sqlx::{PgConnection, PgPool};

use stockroom_core::orders::{Order, OrderItem, OrderParts, OrderTarget};
use stockroom_core::{BundleId, OrderId, OrderItemId, ProductId, UserId, VariantId};

use super::{AUDIT_COLUMNS, AuditColumns, RepositoryError, UnitOfWork};

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    user_id: UserId,
    #[sqlx(flatten)]
    audit: AuditColumns,
}

#[derive(sqlx::FromRow)]
struct OrderItemRow {
    id: OrderItemId,
    order_id: OrderId,
    product_id: Option<ProductId>,
    variant_id: Option<VariantId>,
    bundle_id: Option<BundleId>,
    quantity: i32,
    #[sqlx(flatten)]
    audit: AuditColumns,
}

impl TryFrom<OrderItemRow> for OrderItem {
    type Error = RepositoryError;

    fn try_from(row: OrderItemRow) -> Result<Self, Self::Error> {
        let target = OrderTarget::from_columns(row.product_id, row.variant_id, row.bundle_id)
            .ok_or_else(|| {
                RepositoryError::DataCorruption(format!(
                    "order item {} does not reference exactly one target",
                    row.id
                ))
            })?;

        Ok(Self {
            id: row.id,
            order_id: row.order_id,
            target,
            quantity: row.quantity,
            audit: row.audit.into(),
        })
    }
}

/// Repository for orders and their items.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert the order row without its items.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(&self, uow: &mut UnitOfWork, order: &Order) -> Result<(), RepositoryError> {
        let audit = order.audit();
        sqlx::query(
            r"
            INSERT INTO stockroom.order
                (id, user_id, is_active, created_at, updated_at, created_by, updated_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ",
        )
        .bind(order.id())
        .bind(order.user_id())
        .bind(audit.is_active)
        .bind(audit.created_at)
        .bind(audit.updated_at)
        .bind(audit.created_by)
        .bind(audit.updated_by)
        .execute(uow.conn())
        .await?;

        Ok(())
    }

    /// Insert the order's items and bump the order's `updated_at`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a write fails.
    pub async fn add_items(&self, uow: &mut UnitOfWork, order: &Order) -> Result<(), RepositoryError> {
        let conn = uow.conn();
        let sql = format!(
            "INSERT INTO stockroom.order_item \
             (id, order_id, product_id, variant_id, bundle_id, quantity, {AUDIT_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)"
        );
        for item in order.items() {
            sqlx::query(&sql)
                .bind(item.id)
                .bind(item.order_id)
                .bind(item.target.product_id())
                .bind(item.target.variant_id())
                .bind(item.target.bundle_id())
                .bind(item.quantity)
                .bind(item.audit.is_active)
                .bind(item.audit.created_at)
                .bind(item.audit.updated_at)
                .bind(item.audit.created_by)
                .bind(item.audit.updated_by)
                .execute(&mut *conn)
                .await?;
        }

        sqlx::query("UPDATE stockroom.order SET updated_at = $2 WHERE id = $1")
            .bind(order.id())
            .bind(order.audit().updated_at)
            .execute(conn)
            .await?;

        Ok(())
    }

    /// Load an order with its items, active or not.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    /// Returns `RepositoryError::DataCorruption` if an item row is malformed.
    pub async fn get_detailed(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        let rows: Vec<OrderRow> = sqlx::query_as(&format!(
            "SELECT id, user_id, {AUDIT_COLUMNS} FROM stockroom.order WHERE id = $1"
        ))
        .bind(id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(load_items(&mut conn, rows).await?.into_iter().next())
    }

    /// A user's active orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    /// Returns `RepositoryError::DataCorruption` if an item row is malformed.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        let rows: Vec<OrderRow> = sqlx::query_as(&format!(
            "SELECT id, user_id, {AUDIT_COLUMNS} FROM stockroom.order \
             WHERE user_id = $1 AND is_active ORDER BY created_at DESC, id DESC"
        ))
        .bind(user_id)
        .fetch_all(&mut *conn)
        .await?;

        load_items(&mut conn, rows).await
    }
}

async fn load_items(
    conn: &mut PgConnection,
    rows: Vec<OrderRow>,
) -> Result<Vec<Order>, RepositoryError> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<OrderId> = rows.iter().map(|r| r.id).collect();
    let item_rows: Vec<OrderItemRow> = sqlx::query_as(&format!(
        "SELECT id, order_id, product_id, variant_id, bundle_id, quantity, {AUDIT_COLUMNS} \
         FROM stockroom.order_item WHERE order_id = ANY($1) ORDER BY id"
    ))
    .bind(&ids)
    .fetch_all(conn)
    .await?;

    let mut items: HashMap<OrderId, Vec<OrderItem>> = HashMap::new();
    for row in item_rows {
        let item = OrderItem::try_from(row)?;
        items.entry(item.order_id).or_default().push(item);
    }

    Ok(rows
        .into_iter()
        .map(|row| {
            Order::restore(OrderParts {
                id: row.id,
                user_id: row.user_id,
                audit: row.audit.into(),
                items: items.remove(&row.id).unwrap_or_default(),
            })
        })
        .collect())
}
