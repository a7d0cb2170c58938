//! Catalog collaborator interface
//!
//! The catalog owns product entities. Reconciliation only reads from it (one
//! batched lookup per chunk); execution writes through it. Implementations
//! decide their own consistency guarantees: two feeds touching the same keys
//! concurrently are last-write-wins unless the implementation locks.

pub mod memory;
#[cfg(feature = "database")]
pub mod postgres;

use async_trait::async_trait;
use pmd_common::Result;
use std::collections::{BTreeSet, HashMap};

use crate::models::{CreateOptions, EntityFields, EntityId, ExistingEntity};

pub use memory::InMemoryCatalog;
#[cfg(feature = "database")]
pub use postgres::PgCatalog;

/// Storage of product entities
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Fetch the entities whose lookup code is one of `keys`, keyed by that code
    ///
    /// Inactive entities are included. Keys with no entity are absent from
    /// the returned map.
    async fn find_by_keys(&self, keys: &BTreeSet<String>) -> Result<HashMap<String, ExistingEntity>>;

    /// Overwrite the fields of an existing entity
    async fn write_entity(&self, id: EntityId, fields: &EntityFields) -> Result<()>;

    /// Create a new entity and return its identifier
    async fn create_entity(&self, fields: &EntityFields, options: CreateOptions) -> Result<EntityId>;
}
