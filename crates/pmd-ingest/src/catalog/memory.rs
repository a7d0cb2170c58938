//! In-memory catalog
//!
//! Backs the tests and the JSON-file mode of the CLI. Snapshots serialize to
//! a plain JSON document so a catalog can be carried between runs.

use async_trait::async_trait;
use pmd_common::{PmdError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

use super::Catalog;
use crate::models::{CreateOptions, EntityFields, EntityId, ExistingEntity, Tracking};

/// A tracking-mode side effect the catalog ran for an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackingEvent {
    pub entity_id: EntityId,
    pub tracking: Tracking,
}

#[derive(Debug, Default)]
struct State {
    entities: BTreeMap<EntityId, ExistingEntity>,
    /// Lookup code to the most recently written entity carrying it
    by_code: HashMap<String, EntityId>,
    /// Write sequence per entity; snapshots are saved in this order
    written: HashMap<EntityId, u64>,
    next_write: u64,
    tracking_events: Vec<TrackingEvent>,
    lookups: usize,
}

impl State {
    fn insert(&mut self, entity: ExistingEntity) {
        let previous_code = self
            .entities
            .get(&entity.id)
            .filter(|previous| previous.lookup_code != entity.lookup_code)
            .map(|previous| previous.lookup_code.clone());

        self.written.insert(entity.id, self.next_write);
        self.next_write += 1;
        self.by_code.insert(entity.lookup_code.clone(), entity.id);
        let id = entity.id;
        self.entities.insert(id, entity);

        if let Some(code) = previous_code {
            if self.by_code.get(&code) == Some(&id) {
                self.reindex_code(&code);
            }
        }
    }

    /// Point `code` at the latest written entity still carrying it
    fn reindex_code(&mut self, code: &str) {
        let latest = self
            .entities
            .values()
            .filter(|entity| entity.lookup_code == code)
            .max_by_key(|entity| self.written.get(&entity.id).copied().unwrap_or_default())
            .map(|entity| entity.id);

        match latest {
            Some(id) => {
                self.by_code.insert(code.to_string(), id);
            },
            None => {
                self.by_code.remove(code);
            },
        }
    }

    /// Entities in write order, oldest first
    fn in_write_order(&self) -> Vec<ExistingEntity> {
        let mut entities: Vec<&ExistingEntity> = self.entities.values().collect();
        entities.sort_by_key(|entity| self.written.get(&entity.id).copied().unwrap_or_default());
        entities.into_iter().cloned().collect()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    entities: Vec<ExistingEntity>,
}

/// Thread-safe catalog held entirely in memory
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    state: Mutex<State>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog holding `entities`
    pub fn with_entities(entities: impl IntoIterator<Item = ExistingEntity>) -> Self {
        let mut state = State::default();
        for entity in entities {
            state.insert(entity);
        }
        Self {
            state: Mutex::new(state),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| PmdError::Catalog("in-memory catalog lock poisoned".to_string()))
    }

    /// Add or replace an entity
    pub fn insert(&self, entity: ExistingEntity) -> Result<()> {
        self.lock()?.insert(entity);
        Ok(())
    }

    pub fn get(&self, id: EntityId) -> Result<Option<ExistingEntity>> {
        Ok(self.lock()?.entities.get(&id).cloned())
    }

    /// Look up a single entity by lookup code
    pub fn find_by_code(&self, code: &str) -> Result<Option<ExistingEntity>> {
        let state = self.lock()?;
        Ok(state
            .by_code
            .get(code)
            .and_then(|id| state.entities.get(id))
            .cloned())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.entities.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Tracking side effects run so far, in order
    pub fn tracking_events(&self) -> Result<Vec<TrackingEvent>> {
        Ok(self.lock()?.tracking_events.clone())
    }

    /// Number of batched lookups served so far
    pub fn lookup_count(&self) -> Result<usize> {
        Ok(self.lock()?.lookups)
    }

    /// Load a catalog from a JSON snapshot
    ///
    /// Entities are replayed in saved order, so a lookup code shared by
    /// several entities resolves to the one written last.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path.as_ref())?;
        let snapshot: Snapshot = serde_json::from_reader(std::io::BufReader::new(file))?;
        debug!(
            path = %path.as_ref().display(),
            entities = snapshot.entities.len(),
            "Loaded catalog snapshot"
        );
        Ok(Self::with_entities(snapshot.entities))
    }

    /// Load a snapshot, or start empty when the file does not exist yet
    pub fn load_or_empty(path: impl AsRef<Path>) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::new())
        }
    }

    /// Write the catalog as a JSON snapshot
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let snapshot = Snapshot {
            entities: self.lock()?.in_write_order(),
        };
        let file = std::fs::File::create(path.as_ref())?;
        serde_json::to_writer_pretty(std::io::BufWriter::new(file), &snapshot)?;
        debug!(
            path = %path.as_ref().display(),
            entities = snapshot.entities.len(),
            "Saved catalog snapshot"
        );
        Ok(())
    }
}

#[async_trait]
impl Catalog for InMemoryCatalog {
    async fn find_by_keys(&self, keys: &BTreeSet<String>) -> Result<HashMap<String, ExistingEntity>> {
        let mut state = self.lock()?;
        state.lookups += 1;

        Ok(keys
            .iter()
            .filter_map(|key| {
                state
                    .by_code
                    .get(key)
                    .and_then(|id| state.entities.get(id))
                    .map(|entity| (key.clone(), entity.clone()))
            })
            .collect())
    }

    async fn write_entity(&self, id: EntityId, fields: &EntityFields) -> Result<()> {
        let mut state = self.lock()?;
        let tracking_changed = state
            .entities
            .get(&id)
            .map(|previous| previous.tracking != fields.tracking)
            .ok_or_else(|| PmdError::Catalog(format!("entity {} not found", id)))?;

        if tracking_changed {
            state.tracking_events.push(TrackingEvent {
                entity_id: id,
                tracking: fields.tracking,
            });
        }

        state.insert(entity_from_fields(id, fields));
        Ok(())
    }

    async fn create_entity(&self, fields: &EntityFields, options: CreateOptions) -> Result<EntityId> {
        let mut state = self.lock()?;
        let id = EntityId::new();

        if options.tracking_side_effects {
            state.tracking_events.push(TrackingEvent {
                entity_id: id,
                tracking: fields.tracking,
            });
        }

        state.insert(entity_from_fields(id, fields));
        Ok(id)
    }
}

fn entity_from_fields(id: EntityId, fields: &EntityFields) -> ExistingEntity {
    ExistingEntity {
        id,
        lookup_code: fields.lookup_code.clone(),
        external_code: Some(fields.external_code.clone()),
        description: fields.description.clone(),
        weight: fields.weight,
        volume: fields.volume,
        tracking: fields.tracking,
        status: fields.status,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::models::EntityStatus;

    fn fields(code: &str, tracking: Tracking) -> EntityFields {
        EntityFields {
            status: EntityStatus::Active,
            description: format!("Product {}", code),
            lookup_code: code.to_string(),
            external_code: code.to_string(),
            weight: 1.0,
            volume: 0.5,
            tracking,
        }
    }

    fn keys(codes: &[&str]) -> BTreeSet<String> {
        codes.iter().map(|c| c.to_string()).collect()
    }

    #[tokio::test]
    async fn test_create_then_find() {
        let catalog = InMemoryCatalog::new();
        let id = catalog
            .create_entity(&fields("A", Tracking::None), CreateOptions::quiet())
            .await
            .unwrap();

        let found = catalog.find_by_keys(&keys(&["A", "B"])).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found["A"].id, id);
        assert_eq!(found["A"].external_code.as_deref(), Some("A"));
        assert_eq!(catalog.lookup_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_inactive_entities_are_found() {
        let catalog = InMemoryCatalog::new();
        let id = catalog
            .create_entity(&fields("A", Tracking::None), CreateOptions::quiet())
            .await
            .unwrap();
        let mut inactive = fields("A", Tracking::None);
        inactive.status = EntityStatus::Inactive;
        catalog.write_entity(id, &inactive).await.unwrap();

        let found = catalog.find_by_keys(&keys(&["A"])).await.unwrap();
        assert_eq!(found["A"].status, EntityStatus::Inactive);
    }

    #[tokio::test]
    async fn test_tracking_side_effects() {
        let catalog = InMemoryCatalog::new();
        let quiet = catalog
            .create_entity(&fields("A", Tracking::Serial), CreateOptions::quiet())
            .await
            .unwrap();
        assert!(catalog.tracking_events().unwrap().is_empty());

        let loud = catalog
            .create_entity(
                &fields("B", Tracking::Lot),
                CreateOptions {
                    tracking_side_effects: true,
                },
            )
            .await
            .unwrap();
        catalog.write_entity(quiet, &fields("A", Tracking::Serial)).await.unwrap();
        catalog.write_entity(quiet, &fields("A", Tracking::None)).await.unwrap();

        let events = catalog.tracking_events().unwrap();
        assert_eq!(
            events,
            vec![
                TrackingEvent { entity_id: loud, tracking: Tracking::Lot },
                TrackingEvent { entity_id: quiet, tracking: Tracking::None },
            ]
        );
    }

    #[tokio::test]
    async fn test_write_unknown_entity_fails() {
        let catalog = InMemoryCatalog::new();
        let err = catalog
            .write_entity(EntityId::new(), &fields("A", Tracking::None))
            .await
            .unwrap_err();
        assert!(matches!(err, PmdError::Catalog(_)));
    }

    #[tokio::test]
    async fn test_rename_moves_lookup_index() {
        let catalog = InMemoryCatalog::new();
        let id = catalog
            .create_entity(&fields("OLD", Tracking::None), CreateOptions::quiet())
            .await
            .unwrap();
        catalog.write_entity(id, &fields("NEW", Tracking::None)).await.unwrap();

        assert!(catalog.find_by_code("OLD").unwrap().is_none());
        assert_eq!(catalog.find_by_code("NEW").unwrap().unwrap().id, id);
    }

    #[tokio::test]
    async fn test_duplicate_code_resolves_to_latest_write() {
        let catalog = InMemoryCatalog::new();
        let mut first = fields("A", Tracking::None);
        first.weight = 1.0;
        let mut second = fields("A", Tracking::None);
        second.weight = 2.0;

        let first_id = catalog.create_entity(&first, CreateOptions::quiet()).await.unwrap();
        catalog.create_entity(&second, CreateOptions::quiet()).await.unwrap();
        assert_eq!(catalog.find_by_code("A").unwrap().unwrap().weight, 2.0);

        // Rewriting the older entity makes it the latest again
        catalog.write_entity(first_id, &first).await.unwrap();
        assert_eq!(catalog.find_by_code("A").unwrap().unwrap().id, first_id);
    }

    #[tokio::test]
    async fn test_duplicate_code_survives_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");

        // Entity ids are random, so repeat to cover both id orderings
        for _ in 0..20 {
            let catalog = InMemoryCatalog::new();
            let mut older = fields("A", Tracking::None);
            older.weight = 1.0;
            let mut newer = fields("A", Tracking::None);
            newer.weight = 2.0;
            catalog.create_entity(&older, CreateOptions::quiet()).await.unwrap();
            let newer_id = catalog.create_entity(&newer, CreateOptions::quiet()).await.unwrap();
            catalog.save(&path).unwrap();

            let reloaded = InMemoryCatalog::load(&path).unwrap();
            let found = reloaded.find_by_code("A").unwrap().unwrap();
            assert_eq!(found.id, newer_id);
            assert_eq!(found.weight, 2.0);
            assert_eq!(reloaded.len().unwrap(), 2);
        }
    }

    #[tokio::test]
    async fn test_rename_falls_back_to_remaining_duplicate() {
        let catalog = InMemoryCatalog::new();
        let stays = catalog
            .create_entity(&fields("A", Tracking::None), CreateOptions::quiet())
            .await
            .unwrap();
        let moves = catalog
            .create_entity(&fields("A", Tracking::None), CreateOptions::quiet())
            .await
            .unwrap();
        catalog.write_entity(moves, &fields("B", Tracking::None)).await.unwrap();

        assert_eq!(catalog.find_by_code("A").unwrap().unwrap().id, stays);
        assert_eq!(catalog.find_by_code("B").unwrap().unwrap().id, moves);
    }

    #[tokio::test]
    async fn test_snapshot_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");

        let catalog = InMemoryCatalog::load_or_empty(&path).unwrap();
        assert!(catalog.is_empty().unwrap());
        catalog
            .create_entity(&fields("A", Tracking::Serial), CreateOptions::quiet())
            .await
            .unwrap();
        catalog.save(&path).unwrap();

        let reloaded = InMemoryCatalog::load(&path).unwrap();
        let entity = reloaded.find_by_code("A").unwrap().unwrap();
        assert_eq!(entity.tracking, Tracking::Serial);
        assert_eq!(reloaded.len().unwrap(), 1);
    }
}
