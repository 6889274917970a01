//! Bundle repository.

use std::collections::HashMap;

use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use stockroom_core::bundles::{Bundle, BundleItem, BundleParts};
use stockroom_core::{BundleId, BundleItemId, ProductId, VariantId};

use super::{AUDIT_COLUMNS, AuditColumns, RepositoryError, UnitOfWork};

#[derive(sqlx::FromRow)]
struct BundleRow {
    id: BundleId,
    name: String,
    description: Option<String>,
    price: Decimal,
    #[sqlx(flatten)]
    audit: AuditColumns,
}

#[derive(sqlx::FromRow)]
struct BundleItemRow {
    id: BundleItemId,
    bundle_id: BundleId,
    product_id: ProductId,
    variant_id: Option<VariantId>,
    quantity: i32,
    #[sqlx(flatten)]
    audit: AuditColumns,
}

impl From<BundleItemRow> for BundleItem {
    fn from(row: BundleItemRow) -> Self {
        Self {
            id: row.id,
            bundle_id: row.bundle_id,
            product_id: row.product_id,
            variant_id: row.variant_id,
            quantity: row.quantity,
            audit: row.audit.into(),
        }
    }
}

/// Repository for the bundle aggregate.
pub struct BundleRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> BundleRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Load a bundle with all of its items, active or not.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get_detailed(&self, id: BundleId) -> Result<Option<Bundle>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        get_detailed(&mut conn, id, false).await
    }

    /// Load a bundle graph inside the unit of work, locking the bundle row.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get_for_update(
        &self,
        uow: &mut UnitOfWork,
        id: BundleId,
    ) -> Result<Option<Bundle>, RepositoryError> {
        get_detailed(uow.conn(), id, true).await
    }

    /// Load a bundle graph inside the unit of work without locking it.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get_detailed_in(
        &self,
        uow: &mut UnitOfWork,
        id: BundleId,
    ) -> Result<Option<Bundle>, RepositoryError> {
        get_detailed(uow.conn(), id, false).await
    }

    /// Every active bundle, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list_active(&self) -> Result<Vec<Bundle>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        let rows: Vec<BundleRow> = sqlx::query_as(&format!(
            "SELECT id, name, description, price, {AUDIT_COLUMNS} \
             FROM stockroom.bundle WHERE is_active ORDER BY id"
        ))
        .fetch_all(&mut *conn)
        .await?;

        let ids: Vec<BundleId> = rows.iter().map(|r| r.id).collect();
        let item_rows: Vec<BundleItemRow> = sqlx::query_as(&format!(
            "SELECT id, bundle_id, product_id, variant_id, quantity, {AUDIT_COLUMNS} \
             FROM stockroom.bundle_item WHERE bundle_id = ANY($1) ORDER BY id"
        ))
        .bind(&ids)
        .fetch_all(&mut *conn)
        .await?;

        let mut items: HashMap<BundleId, Vec<BundleItem>> = HashMap::new();
        for row in item_rows {
            items.entry(row.bundle_id).or_default().push(row.into());
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let items = items.remove(&row.id).unwrap_or_default();
                restore(row, items)
            })
            .collect())
    }

    /// Insert or update the bundle row and all of its items.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a write fails.
    pub async fn save(&self, uow: &mut UnitOfWork, bundle: &Bundle) -> Result<(), RepositoryError> {
        let conn = uow.conn();
        let audit = bundle.audit();

        sqlx::query(
            r"
            INSERT INTO stockroom.bundle
                (id, name, description, price,
                 is_active, created_at, updated_at, created_by, updated_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                description = EXCLUDED.description,
                price = EXCLUDED.price,
                is_active = EXCLUDED.is_active,
                updated_at = EXCLUDED.updated_at,
                updated_by = EXCLUDED.updated_by
            ",
        )
        .bind(bundle.id())
        .bind(bundle.name())
        .bind(bundle.description())
        .bind(bundle.price())
        .bind(audit.is_active)
        .bind(audit.created_at)
        .bind(audit.updated_at)
        .bind(audit.created_by)
        .bind(audit.updated_by)
        .execute(&mut *conn)
        .await?;

        save_items(conn, bundle.items()).await
    }
}

async fn get_detailed(
    conn: &mut PgConnection,
    id: BundleId,
    lock: bool,
) -> Result<Option<Bundle>, RepositoryError> {
    let lock_clause = if lock { " FOR UPDATE" } else { "" };
    let row: Option<BundleRow> = sqlx::query_as(&format!(
        "SELECT id, name, description, price, {AUDIT_COLUMNS} \
         FROM stockroom.bundle WHERE id = $1{lock_clause}"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let item_rows: Vec<BundleItemRow> = sqlx::query_as(&format!(
        "SELECT id, bundle_id, product_id, variant_id, quantity, {AUDIT_COLUMNS} \
         FROM stockroom.bundle_item WHERE bundle_id = $1 ORDER BY id"
    ))
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;

    let items = item_rows.into_iter().map(BundleItem::from).collect();
    Ok(Some(restore(row, items)))
}

fn restore(row: BundleRow, items: Vec<BundleItem>) -> Bundle {
    Bundle::restore(BundleParts {
        id: row.id,
        name: row.name,
        description: row.description,
        price: row.price,
        audit: row.audit.into(),
        items,
    })
}

async fn save_items(conn: &mut PgConnection, items: &[BundleItem]) -> Result<(), RepositoryError> {
    let sql = format!(
        "INSERT INTO stockroom.bundle_item \
         (id, bundle_id, product_id, variant_id, quantity, {AUDIT_COLUMNS}) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
         ON CONFLICT (id) DO UPDATE SET quantity = EXCLUDED.quantity, \
         is_active = EXCLUDED.is_active, updated_at = EXCLUDED.updated_at, \
         updated_by = EXCLUDED.updated_by"
    );
    for item in items {
        sqlx::query(&sql)
            .bind(item.id)
            .bind(item.bundle_id)
            .bind(item.product_id)
            .bind(item.variant_id)
            .bind(item.quantity)
            .bind(item.audit.is_active)
            .bind(item.audit.created_at)
            .bind(item.audit.updated_at)
            .bind(item.audit.created_by)
            .bind(item.audit.updated_by)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}
