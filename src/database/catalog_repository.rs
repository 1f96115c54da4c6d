use async_trait::async_trait;
use sqlx::PgPool;

use crate::database::error::DatabaseError;
use crate::database::repository::{ProductCatalog, UserDirectory};
use crate::orders::types::{Product, User};

/// Read-only view over the `users` and `products` tables.
#[derive(Clone)]
pub struct PgCatalogRepository {
    pool: PgPool,
}

impl PgCatalogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for PgCatalogRepository {
    async fn find_user_by_id(&self, id: &str) -> Result<Option<User>, DatabaseError> {
        let row = sqlx::query_as::<_, (String, String, Option<String>)>(
            "SELECT id, name, email FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(row.map(|(id, name, email)| User { id, name, email }))
    }
}

#[async_trait]
impl ProductCatalog for PgCatalogRepository {
    async fn find_product_by_id(&self, id: &str) -> Result<Option<Product>, DatabaseError> {
        let row = sqlx::query_as::<_, (String, String, Option<String>, bigdecimal::BigDecimal)>(
            "SELECT id, name, category, unit_price FROM products WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(row.map(|(id, name, category, unit_price)| Product {
            id,
            name,
            category,
            unit_price,
        }))
    }
}
