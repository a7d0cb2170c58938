//! PostgreSQL catalog
//!
//! Entities live in `catalog_entities` (see `migrations/`). A lookup batch is
//! one `= ANY($1)` query, so a chunk of 1000 feed rows costs a single round
//! trip. Writes and creates are one statement each and commit on their own.

use async_trait::async_trait;
use pmd_common::{PmdError, Result};
use sqlx::PgPool;
use std::collections::{BTreeSet, HashMap};
use tracing::debug;
use uuid::Uuid;

use super::Catalog;
use crate::models::{CreateOptions, EntityFields, EntityId, ExistingEntity};

#[derive(Debug, sqlx::FromRow)]
struct EntityRow {
    id: Uuid,
    lookup_code: String,
    external_code: Option<String>,
    description: String,
    weight: f64,
    volume: f64,
    tracking: String,
    status: String,
}

impl TryFrom<EntityRow> for ExistingEntity {
    type Error = PmdError;

    fn try_from(row: EntityRow) -> Result<Self> {
        Ok(ExistingEntity {
            id: EntityId(row.id),
            tracking: row.tracking.parse().map_err(PmdError::Catalog)?,
            status: row.status.parse().map_err(PmdError::Catalog)?,
            lookup_code: row.lookup_code,
            external_code: row.external_code,
            description: row.description,
            weight: row.weight,
            volume: row.volume,
        })
    }
}

/// Catalog backed by a Postgres connection pool
#[derive(Debug, Clone)]
pub struct PgCatalog {
    pool: PgPool,
}

impl PgCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect and bring the schema up to date
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        let catalog = Self::new(pool);
        catalog.migrate().await?;
        Ok(catalog)
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| PmdError::Catalog(format!("migration failed: {}", e)))
    }

    async fn record_tracking_event(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        id: EntityId,
        fields: &EntityFields,
    ) -> Result<()> {
        sqlx::query("INSERT INTO catalog_tracking_events (entity_id, tracking) VALUES ($1, $2)")
            .bind(id.0)
            .bind(fields.tracking.as_str())
            .execute(&mut **tx)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl Catalog for PgCatalog {
    async fn find_by_keys(&self, keys: &BTreeSet<String>) -> Result<HashMap<String, ExistingEntity>> {
        if keys.is_empty() {
            return Ok(HashMap::new());
        }

        let codes: Vec<String> = keys.iter().cloned().collect();
        let rows = sqlx::query_as::<_, EntityRow>(
            r#"
            SELECT id, lookup_code, external_code, description, weight, volume, tracking, status
            FROM catalog_entities
            WHERE lookup_code = ANY($1)
            ORDER BY created_at, id
            "#,
        )
        .bind(&codes)
        .fetch_all(&self.pool)
        .await?;

        debug!(requested = codes.len(), found = rows.len(), "Looked up catalog entities");

        let mut entities = HashMap::with_capacity(rows.len());
        for row in rows {
            let entity = ExistingEntity::try_from(row)?;
            entities.insert(entity.lookup_code.clone(), entity);
        }
        Ok(entities)
    }

    async fn write_entity(&self, id: EntityId, fields: &EntityFields) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let previous_tracking = sqlx::query_scalar::<_, String>(
            r#"
            WITH previous AS (
                SELECT id, tracking FROM catalog_entities WHERE id = $1 FOR UPDATE
            )
            UPDATE catalog_entities e SET
                status = $2,
                description = $3,
                lookup_code = $4,
                external_code = $5,
                weight = $6,
                volume = $7,
                tracking = $8,
                updated_at = NOW()
            FROM previous
            WHERE e.id = previous.id
            RETURNING previous.tracking
            "#,
        )
        .bind(id.0)
        .bind(fields.status.as_str())
        .bind(&fields.description)
        .bind(&fields.lookup_code)
        .bind(&fields.external_code)
        .bind(fields.weight)
        .bind(fields.volume)
        .bind(fields.tracking.as_str())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| PmdError::Catalog(format!("entity {} not found", id)))?;

        if previous_tracking != fields.tracking.as_str() {
            Self::record_tracking_event(&mut tx, id, fields).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn create_entity(&self, fields: &EntityFields, options: CreateOptions) -> Result<EntityId> {
        let id = EntityId::new();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO catalog_entities
                (id, status, description, lookup_code, external_code, weight, volume, tracking)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(id.0)
        .bind(fields.status.as_str())
        .bind(&fields.description)
        .bind(&fields.lookup_code)
        .bind(&fields.external_code)
        .bind(fields.weight)
        .bind(fields.volume)
        .bind(fields.tracking.as_str())
        .execute(&mut *tx)
        .await?;

        if options.tracking_side_effects {
            Self::record_tracking_event(&mut tx, id, fields).await?;
        }

        tx.commit().await?;
        Ok(id)
    }
}
