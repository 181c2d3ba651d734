//! Product catalog service

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use shared::SaleUnit;

/// Product catalog service
#[derive(Clone)]
pub struct ProductService {
    db: PgPool,
}

/// Product record as stored
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ProductRecord {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price_per_kg: Decimal,
    pub unit: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a product
#[derive(Debug, Deserialize)]
pub struct CreateProductInput {
    pub name: String,
    pub description: Option<String>,
    pub price_per_kg: Decimal,
    pub unit: Option<String>,
}

impl ProductService {
    /// Create a new ProductService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Create a product
    pub async fn create_product(&self, input: CreateProductInput) -> AppResult<ProductRecord> {
        if input.name.trim().is_empty() {
            return Err(AppError::Validation {
                field: "name".to_string(),
                message: "Product name must not be empty".to_string(),
            });
        }
        if input.price_per_kg <= Decimal::ZERO {
            return Err(AppError::Validation {
                field: "price_per_kg".to_string(),
                message: "Price per kg must be positive".to_string(),
            });
        }

        let unit = match input.unit.as_deref() {
            None => SaleUnit::default(),
            Some(raw) => SaleUnit::parse(raw).ok_or_else(|| AppError::Validation {
                field: "unit".to_string(),
                message: "Unit must be one of kilogram, crate, sack".to_string(),
            })?,
        };

        let product = sqlx::query_as::<_, ProductRecord>(
            r#"
            INSERT INTO products (name, description, price_per_kg, unit)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, description, price_per_kg, unit, is_active,
                      created_at, updated_at
            "#,
        )
        .bind(input.name.trim())
        .bind(&input.description)
        .bind(input.price_per_kg)
        .bind(unit.as_str())
        .fetch_one(&self.db)
        .await?;

        Ok(product)
    }

    /// Get an active product
    pub async fn get_product(&self, product_id: Uuid) -> AppResult<ProductRecord> {
        sqlx::query_as::<_, ProductRecord>(
            r#"
            SELECT id, name, description, price_per_kg, unit, is_active,
                   created_at, updated_at
            FROM products
            WHERE id = $1
            "#,
        )
        .bind(product_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Product".to_string()))
    }

    /// List active products
    pub async fn list_products(&self) -> AppResult<Vec<ProductRecord>> {
        let products = sqlx::query_as::<_, ProductRecord>(
            r#"
            SELECT id, name, description, price_per_kg, unit, is_active,
                   created_at, updated_at
            FROM products
            WHERE is_active = true
            ORDER BY name ASC
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        Ok(products)
    }
}
