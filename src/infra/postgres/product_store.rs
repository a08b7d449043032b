//! PostgreSQL product reads.
//!
//! Catalog CRUD belongs to an external service; this store only fetches
//! listings for pricing/snapshots and inserts rows for tests and tooling.
//! The stock counter is never touched here.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgPool;
use uuid::Uuid;

use crate::domain::{Product, StockPolicy};
use crate::infra::Result;

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: Uuid,
    creator_address: String,
    name: String,
    description: Option<String>,
    price: Decimal,
    file_url: String,
    file_type: String,
    unlimited_stock: bool,
    stock_quantity: Option<i32>,
    one_time_download: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// PostgreSQL-backed product store.
pub struct PgProductStore {
    pool: PgPool,
}

impl PgProductStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get a product by ID.
    pub async fn get(&self, product_id: Uuid) -> Result<Option<Product>> {
        let row: Option<ProductRow> = sqlx::query_as(
            r#"
            SELECT * FROM products WHERE id = $1
            "#,
        )
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Self::row_to_product))
    }

    /// Insert a new product listing.
    pub async fn insert(&self, product: &Product) -> Result<()> {
        let (unlimited_stock, stock_quantity) = product.stock.to_columns();

        sqlx::query(
            r#"
            INSERT INTO products (
                id, creator_address, name, description, price,
                file_url, file_type,
                unlimited_stock, stock_quantity, one_time_download,
                created_at, updated_at
            ) VALUES (
                $1, $2, $3, $4, $5,
                $6, $7,
                $8, $9, $10,
                $11, $12
            )
            "#,
        )
        .bind(product.id)
        .bind(&product.creator_address)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price)
        .bind(&product.file_url)
        .bind(&product.file_type)
        .bind(unlimited_stock)
        .bind(stock_quantity)
        .bind(product.one_time_download)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    fn row_to_product(row: ProductRow) -> Product {
        Product {
            id: row.id,
            creator_address: row.creator_address,
            name: row.name,
            description: row.description,
            price: row.price,
            file_url: row.file_url,
            file_type: row.file_type,
            stock: StockPolicy::from_columns(row.unlimited_stock, row.stock_quantity),
            one_time_download: row.one_time_download,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
