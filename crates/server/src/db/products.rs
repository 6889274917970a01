//! Product catalogue repository.
//!
//! A product is persisted as five tables (`product`, `variant_option`,
//! `variant_option_value`, `variant`, `product_variant_combination`) and
//! always loaded and saved as one aggregate. Graph loads issue one query per
//! table regardless of how many products are requested.

use std::collections::{HashMap, HashSet};

use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use stockroom_core::catalog::{
    Product, ProductParts, ProductVariantCombination, Variant, VariantOption, VariantOptionValue,
};
use stockroom_core::orders::{ProductStock, VariantStock};
use stockroom_core::{
    CombinationId, OptionValueId, ProductId, UserId, VariantId, VariantOptionId,
};

use super::{AUDIT_COLUMNS, AuditColumns, RepositoryError, UnitOfWork};

// =============================================================================
// Rows
// =============================================================================

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: ProductId,
    name: String,
    description: Option<String>,
    base_price: Decimal,
    sku: Option<String>,
    base_stock: Option<i32>,
    #[sqlx(flatten)]
    audit: AuditColumns,
}

#[derive(sqlx::FromRow)]
struct OptionRow {
    id: VariantOptionId,
    product_id: ProductId,
    name: String,
    #[sqlx(flatten)]
    audit: AuditColumns,
}

#[derive(sqlx::FromRow)]
struct ValueRow {
    id: OptionValueId,
    option_id: VariantOptionId,
    value: String,
    #[sqlx(flatten)]
    audit: AuditColumns,
}

#[derive(sqlx::FromRow)]
struct VariantRow {
    id: VariantId,
    product_id: ProductId,
    sku: Option<String>,
    price: Decimal,
    stock: i32,
    #[sqlx(flatten)]
    audit: AuditColumns,
}

#[derive(sqlx::FromRow)]
struct CombinationRow {
    id: CombinationId,
    variant_id: VariantId,
    option_value_id: OptionValueId,
    #[sqlx(flatten)]
    audit: AuditColumns,
}

#[derive(sqlx::FromRow)]
struct VariantStockRow {
    id: VariantId,
    product_id: ProductId,
    is_active: bool,
    stock: i32,
}

/// Which unique product attributes are already taken by another active product.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DuplicateCheck {
    pub name_taken: bool,
    pub sku_taken: bool,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for the product aggregate.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Load one product with its full option and variant graph, active or not.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get_detailed(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        let rows: Vec<ProductRow> = sqlx::query_as(&format!(
            "SELECT id, name, description, base_price, sku, base_stock, {AUDIT_COLUMNS} \
             FROM stockroom.product WHERE id = $1"
        ))
        .bind(id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(load_graphs(&mut conn, rows).await?.into_iter().next())
    }

    /// Load every active product, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list_active(&self) -> Result<Vec<Product>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        let rows: Vec<ProductRow> = sqlx::query_as(&format!(
            "SELECT id, name, description, base_price, sku, base_stock, {AUDIT_COLUMNS} \
             FROM stockroom.product WHERE is_active ORDER BY id"
        ))
        .fetch_all(&mut *conn)
        .await?;

        load_graphs(&mut conn, rows).await
    }

    /// Load several products, keyed by id. Missing ids are simply absent.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get_many_detailed(
        &self,
        ids: &[ProductId],
    ) -> Result<HashMap<ProductId, Product>, RepositoryError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let mut conn = self.pool.acquire().await?;
        let rows: Vec<ProductRow> = sqlx::query_as(&format!(
            "SELECT id, name, description, base_price, sku, base_stock, {AUDIT_COLUMNS} \
             FROM stockroom.product WHERE id = ANY($1)"
        ))
        .bind(ids)
        .fetch_all(&mut *conn)
        .await?;

        Ok(load_graphs(&mut conn, rows)
            .await?
            .into_iter()
            .map(|product| (product.id(), product))
            .collect())
    }

    /// Lock a product row and load its graph inside the unit of work.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get_for_update(
        &self,
        uow: &mut UnitOfWork,
        id: ProductId,
    ) -> Result<Option<Product>, RepositoryError> {
        let conn = uow.conn();
        let rows: Vec<ProductRow> = sqlx::query_as(&format!(
            "SELECT id, name, description, base_price, sku, base_stock, {AUDIT_COLUMNS} \
             FROM stockroom.product WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(load_graphs(conn, rows).await?.into_iter().next())
    }

    /// Check whether another active product already uses `name` or `sku`.
    ///
    /// Both comparisons ignore case. `exclude` skips the product being updated.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_duplicates(
        &self,
        name: &str,
        sku: Option<&str>,
        exclude: Option<ProductId>,
    ) -> Result<DuplicateCheck, RepositoryError> {
        let (name_taken, sku_taken): (bool, bool) = sqlx::query_as(
            r"
            SELECT
                COALESCE(bool_or(lower(name) = lower($1)), FALSE),
                COALESCE(bool_or($2::TEXT IS NOT NULL AND lower(sku) = lower($2)), FALSE)
            FROM stockroom.product
            WHERE is_active AND ($3::UUID IS NULL OR id <> $3)
            ",
        )
        .bind(name.trim())
        .bind(sku)
        .bind(exclude)
        .fetch_one(self.pool)
        .await?;

        Ok(DuplicateCheck {
            name_taken,
            sku_taken,
        })
    }

    /// The lowercased members of `skus` already used by an active variant of
    /// another active product. `exclude` skips the product being updated.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn variant_skus_taken(
        &self,
        skus: &[String],
        exclude: Option<ProductId>,
    ) -> Result<HashSet<String>, RepositoryError> {
        if skus.is_empty() {
            return Ok(HashSet::new());
        }
        let lowered: Vec<String> = skus.iter().map(|sku| sku.to_lowercase()).collect();

        let rows: Vec<(String,)> = sqlx::query_as(
            r"
            SELECT DISTINCT lower(v.sku)
            FROM stockroom.variant v
            JOIN stockroom.product p ON p.id = v.product_id
            WHERE v.is_active AND p.is_active
              AND lower(v.sku) = ANY($1)
              AND ($2::UUID IS NULL OR p.id <> $2)
            ",
        )
        .bind(&lowered)
        .bind(exclude)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(|(sku,)| sku).collect())
    }

    /// The subset of `ids` that refer to active products.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn active_ids(&self, ids: &[ProductId]) -> Result<HashSet<ProductId>, RepositoryError> {
        let rows: Vec<(ProductId,)> =
            sqlx::query_as("SELECT id FROM stockroom.product WHERE id = ANY($1) AND is_active")
                .bind(ids)
                .fetch_all(self.pool)
                .await?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// Active variant ids of each of `product_ids`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn active_variants_by_product(
        &self,
        product_ids: &[ProductId],
    ) -> Result<HashMap<ProductId, HashSet<VariantId>>, RepositoryError> {
        let rows: Vec<(ProductId, VariantId)> = sqlx::query_as(
            "SELECT product_id, id FROM stockroom.variant WHERE product_id = ANY($1) AND is_active",
        )
        .bind(product_ids)
        .fetch_all(self.pool)
        .await?;

        let mut by_product: HashMap<ProductId, HashSet<VariantId>> = HashMap::new();
        for (product_id, variant_id) in rows {
            by_product.entry(product_id).or_default().insert(variant_id);
        }
        Ok(by_product)
    }

    /// Whether an active bundle still holds an active item for this product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn is_in_active_bundle(&self, id: ProductId) -> Result<bool, RepositoryError> {
        let (referenced,): (bool,) = sqlx::query_as(
            r"
            SELECT EXISTS (
                SELECT 1
                FROM stockroom.bundle_item bi
                JOIN stockroom.bundle b ON b.id = bi.bundle_id
                WHERE bi.product_id = $1 AND bi.is_active AND b.is_active
            )
            ",
        )
        .bind(id)
        .fetch_one(self.pool)
        .await?;

        Ok(referenced)
    }

    // =========================================================================
    // Stock (order placement)
    // =========================================================================

    /// Lock a product row and read its stock.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn product_stock_for_update(
        &self,
        uow: &mut UnitOfWork,
        id: ProductId,
    ) -> Result<Option<ProductStock>, RepositoryError> {
        let row: Option<(ProductId, bool, Option<i32>)> = sqlx::query_as(
            "SELECT id, is_active, base_stock FROM stockroom.product WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(uow.conn())
        .await?;

        Ok(row.map(|(id, is_active, base_stock)| ProductStock {
            id,
            is_active,
            base_stock,
        }))
    }

    /// Lock a variant row and read its stock. A variant of an inactive
    /// product reads as inactive.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn variant_stock_for_update(
        &self,
        uow: &mut UnitOfWork,
        id: VariantId,
    ) -> Result<Option<VariantStock>, RepositoryError> {
        let row: Option<VariantStockRow> = sqlx::query_as(
            r"
            SELECT v.id, v.product_id, (v.is_active AND p.is_active) AS is_active, v.stock
            FROM stockroom.variant v
            JOIN stockroom.product p ON p.id = v.product_id
            WHERE v.id = $1
            FOR UPDATE OF v
            ",
        )
        .bind(id)
        .fetch_optional(uow.conn())
        .await?;

        Ok(row.map(|r| VariantStock {
            id: r.id,
            product_id: r.product_id,
            is_active: r.is_active,
            stock: r.stock,
        }))
    }

    /// Write a deducted product stock.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails, including the
    /// `base_stock >= 0` check.
    pub async fn save_product_stock(
        &self,
        uow: &mut UnitOfWork,
        stock: &ProductStock,
        actor: UserId,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            UPDATE stockroom.product
            SET base_stock = $2, updated_at = NOW(), updated_by = $3
            WHERE id = $1
            ",
        )
        .bind(stock.id)
        .bind(stock.base_stock)
        .bind(actor)
        .execute(uow.conn())
        .await?;

        Ok(())
    }

    /// Write a deducted variant stock.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails, including the
    /// `stock >= 0` check.
    pub async fn save_variant_stock(
        &self,
        uow: &mut UnitOfWork,
        stock: &VariantStock,
        actor: UserId,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            UPDATE stockroom.variant
            SET stock = $2, updated_at = NOW(), updated_by = $3
            WHERE id = $1
            ",
        )
        .bind(stock.id)
        .bind(stock.stock)
        .bind(actor)
        .execute(uow.conn())
        .await?;

        Ok(())
    }

    // =========================================================================
    // Aggregate writes
    // =========================================================================

    /// Insert or update the whole product graph.
    ///
    /// Rows are upserted by id, so the same call persists a new product, an
    /// in-place diff, and a cascade soft-delete.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if a sku collides with another
    /// active product or variant.
    pub async fn save(&self, uow: &mut UnitOfWork, product: &Product) -> Result<(), RepositoryError> {
        let conn = uow.conn();
        let audit = product.audit();

        sqlx::query(
            r"
            INSERT INTO stockroom.product
                (id, name, description, base_price, sku, base_stock,
                 is_active, created_at, updated_at, created_by, updated_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                description = EXCLUDED.description,
                base_price = EXCLUDED.base_price,
                sku = EXCLUDED.sku,
                base_stock = EXCLUDED.base_stock,
                is_active = EXCLUDED.is_active,
                updated_at = EXCLUDED.updated_at,
                updated_by = EXCLUDED.updated_by
            ",
        )
        .bind(product.id())
        .bind(product.name())
        .bind(product.description())
        .bind(product.base_price())
        .bind(product.sku())
        .bind(product.base_stock())
        .bind(audit.is_active)
        .bind(audit.created_at)
        .bind(audit.updated_at)
        .bind(audit.created_by)
        .bind(audit.updated_by)
        .execute(&mut *conn)
        .await
        .map_err(|e| RepositoryError::from_write(e, "product sku already exists"))?;

        save_options(conn, product.options()).await?;
        save_values(conn, product.options()).await?;
        save_variants(conn, product.variants()).await?;
        save_combinations(conn, product.variants()).await?;

        Ok(())
    }
}

// =============================================================================
// Graph loading
// =============================================================================

async fn load_graphs(
    conn: &mut PgConnection,
    rows: Vec<ProductRow>,
) -> Result<Vec<Product>, RepositoryError> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }
    let product_ids: Vec<ProductId> = rows.iter().map(|r| r.id).collect();

    let option_rows: Vec<OptionRow> = sqlx::query_as(&format!(
        "SELECT id, product_id, name, {AUDIT_COLUMNS} \
         FROM stockroom.variant_option WHERE product_id = ANY($1) ORDER BY id"
    ))
    .bind(&product_ids)
    .fetch_all(&mut *conn)
    .await?;

    let option_ids: Vec<VariantOptionId> = option_rows.iter().map(|r| r.id).collect();
    let value_rows: Vec<ValueRow> = sqlx::query_as(&format!(
        "SELECT id, option_id, value, {AUDIT_COLUMNS} \
         FROM stockroom.variant_option_value WHERE option_id = ANY($1) ORDER BY id"
    ))
    .bind(&option_ids)
    .fetch_all(&mut *conn)
    .await?;

    let variant_rows: Vec<VariantRow> = sqlx::query_as(&format!(
        "SELECT id, product_id, sku, price, stock, {AUDIT_COLUMNS} \
         FROM stockroom.variant WHERE product_id = ANY($1) ORDER BY id"
    ))
    .bind(&product_ids)
    .fetch_all(&mut *conn)
    .await?;

    let variant_ids: Vec<VariantId> = variant_rows.iter().map(|r| r.id).collect();
    let combination_rows: Vec<CombinationRow> = sqlx::query_as(&format!(
        "SELECT id, variant_id, option_value_id, {AUDIT_COLUMNS} \
         FROM stockroom.product_variant_combination WHERE variant_id = ANY($1) ORDER BY id"
    ))
    .bind(&variant_ids)
    .fetch_all(&mut *conn)
    .await?;

    let mut values: HashMap<VariantOptionId, Vec<VariantOptionValue>> = HashMap::new();
    for row in value_rows {
        values.entry(row.option_id).or_default().push(VariantOptionValue {
            id: row.id,
            option_id: row.option_id,
            value: row.value,
            audit: row.audit.into(),
        });
    }

    let mut options: HashMap<ProductId, Vec<VariantOption>> = HashMap::new();
    for row in option_rows {
        options.entry(row.product_id).or_default().push(VariantOption {
            id: row.id,
            product_id: row.product_id,
            name: row.name,
            values: values.remove(&row.id).unwrap_or_default(),
            audit: row.audit.into(),
        });
    }

    let mut combinations: HashMap<VariantId, Vec<ProductVariantCombination>> = HashMap::new();
    for row in combination_rows {
        combinations
            .entry(row.variant_id)
            .or_default()
            .push(ProductVariantCombination {
                id: row.id,
                variant_id: row.variant_id,
                option_value_id: row.option_value_id,
                audit: row.audit.into(),
            });
    }

    let mut variants: HashMap<ProductId, Vec<Variant>> = HashMap::new();
    for row in variant_rows {
        variants.entry(row.product_id).or_default().push(Variant {
            id: row.id,
            product_id: row.product_id,
            sku: row.sku,
            price: row.price,
            stock: row.stock,
            combinations: combinations.remove(&row.id).unwrap_or_default(),
            audit: row.audit.into(),
        });
    }

    Ok(rows
        .into_iter()
        .map(|row| {
            Product::restore(ProductParts {
                id: row.id,
                name: row.name,
                description: row.description,
                base_price: row.base_price,
                sku: row.sku,
                base_stock: row.base_stock,
                audit: row.audit.into(),
                options: options.remove(&row.id).unwrap_or_default(),
                variants: variants.remove(&row.id).unwrap_or_default(),
            })
        })
        .collect())
}

// =============================================================================
// Child upserts
// =============================================================================

/// Columns refreshed on conflict for every child table.
const AUDIT_UPDATE: &str = "is_active = EXCLUDED.is_active, \
                            updated_at = EXCLUDED.updated_at, \
                            updated_by = EXCLUDED.updated_by";

async fn save_options(
    conn: &mut PgConnection,
    options: &[VariantOption],
) -> Result<(), RepositoryError> {
    let sql = format!(
        "INSERT INTO stockroom.variant_option (id, product_id, name, {AUDIT_COLUMNS}) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
         ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name, {AUDIT_UPDATE}"
    );
    for option in options {
        sqlx::query(&sql)
            .bind(option.id)
            .bind(option.product_id)
            .bind(&option.name)
            .bind(option.audit.is_active)
            .bind(option.audit.created_at)
            .bind(option.audit.updated_at)
            .bind(option.audit.created_by)
            .bind(option.audit.updated_by)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

async fn save_values(
    conn: &mut PgConnection,
    options: &[VariantOption],
) -> Result<(), RepositoryError> {
    let sql = format!(
        "INSERT INTO stockroom.variant_option_value (id, option_id, value, {AUDIT_COLUMNS}) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
         ON CONFLICT (id) DO UPDATE SET value = EXCLUDED.value, {AUDIT_UPDATE}"
    );
    for value in options.iter().flat_map(|option| &option.values) {
        sqlx::query(&sql)
            .bind(value.id)
            .bind(value.option_id)
            .bind(&value.value)
            .bind(value.audit.is_active)
            .bind(value.audit.created_at)
            .bind(value.audit.updated_at)
            .bind(value.audit.created_by)
            .bind(value.audit.updated_by)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

async fn save_variants(conn: &mut PgConnection, variants: &[Variant]) -> Result<(), RepositoryError> {
    let sql = format!(
        "INSERT INTO stockroom.variant (id, product_id, sku, price, stock, {AUDIT_COLUMNS}) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
         ON CONFLICT (id) DO UPDATE SET sku = EXCLUDED.sku, price = EXCLUDED.price, \
         stock = EXCLUDED.stock, {AUDIT_UPDATE}"
    );
    for variant in variants {
        sqlx::query(&sql)
            .bind(variant.id)
            .bind(variant.product_id)
            .bind(&variant.sku)
            .bind(variant.price)
            .bind(variant.stock)
            .bind(variant.audit.is_active)
            .bind(variant.audit.created_at)
            .bind(variant.audit.updated_at)
            .bind(variant.audit.created_by)
            .bind(variant.audit.updated_by)
            .execute(&mut *conn)
            .await
            .map_err(|e| RepositoryError::from_write(e, "variant sku already exists"))?;
    }
    Ok(())
}

async fn save_combinations(
    conn: &mut PgConnection,
    variants: &[Variant],
) -> Result<(), RepositoryError> {
    let sql = format!(
        "INSERT INTO stockroom.product_variant_combination \
         (id, variant_id, option_value_id, {AUDIT_COLUMNS}) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
         ON CONFLICT (id) DO UPDATE SET {AUDIT_UPDATE}"
    );
    for combination in variants.iter().flat_map(|variant| &variant.combinations) {
        sqlx::query(&sql)
            .bind(combination.id)
            .bind(combination.variant_id)
            .bind(combination.option_value_id)
            .bind(combination.audit.is_active)
            .bind(combination.audit.created_at)
            .bind(combination.audit.updated_at)
            .bind(combination.audit.created_by)
            .bind(combination.audit.updated_by)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}
