//! Application of staged records to the catalog

use pmd_common::Result;
use serde::Serialize;
use std::num::NonZeroUsize;
use tracing::{debug, info, instrument};

use crate::catalog::Catalog;
use crate::chunk::{display_range, range_chunk};
use crate::config::IngestConfig;
use crate::models::{CreateOptions, EntityFields, PendingRecord};

/// Counters from one execute pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ApplyStats {
    pub updated: usize,
    pub created: usize,
}

/// Writes staged records through to the catalog
///
/// Updates and creates are processed as two separate partitions, each in
/// chunks and in staging order. A failure stops the pass; records already
/// written stay written.
#[derive(Debug, Clone, Copy)]
pub struct Applier {
    chunk_size: NonZeroUsize,
}

impl Applier {
    pub fn new(chunk_size: NonZeroUsize) -> Self {
        Self { chunk_size }
    }

    pub fn from_config(config: &IngestConfig) -> Self {
        Self::new(config.apply_chunk_size)
    }

    #[instrument(skip(self, catalog, records), fields(records = records.len()))]
    pub async fn execute<C>(
        &self,
        catalog: &C,
        name: &str,
        records: &mut [PendingRecord],
    ) -> Result<ApplyStats>
    where
        C: Catalog + ?Sized,
    {
        let (updates, creates): (Vec<usize>, Vec<usize>) =
            (0..records.len()).partition(|&i| records[i].is_update());

        let mut stats = ApplyStats::default();

        for (range, chunk) in range_chunk(updates, self.chunk_size) {
            info!("{} updating {}", name, display_range(&range));
            for index in chunk {
                let record = &records[index];
                if let Some(id) = record.entity_id {
                    catalog.write_entity(id, &EntityFields::from_pending(record)).await?;
                    stats.updated += 1;
                }
            }
        }

        for (range, chunk) in range_chunk(creates, self.chunk_size) {
            info!("{} creating {}", name, display_range(&range));
            for index in chunk {
                let record = &mut records[index];
                let id = catalog
                    .create_entity(&EntityFields::from_pending(record), CreateOptions::quiet())
                    .await?;
                record.entity_id = Some(id);
                stats.created += 1;
            }
        }

        debug!(updated = stats.updated, created = stats.created, "Apply complete");
        Ok(stats)
    }
}

impl Default for Applier {
    fn default() -> Self {
        Self::from_config(&IngestConfig::default())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::catalog::InMemoryCatalog;
    use crate::models::{EntityId, EntityStatus, ExistingEntity, NormalizedRecord, Tracking};
    use uuid::Uuid;

    fn pending(key: &str, tracking: Tracking, entity: Option<&ExistingEntity>) -> PendingRecord {
        let record = NormalizedRecord::new(key, "New description", 0.25, 0.5, tracking).unwrap();
        PendingRecord::stage(Uuid::new_v4(), &record, entity)
    }

    fn inactive(key: &str) -> ExistingEntity {
        ExistingEntity {
            id: EntityId::new(),
            lookup_code: key.to_string(),
            external_code: None,
            description: "Old".to_string(),
            weight: 0.0,
            volume: 0.0,
            tracking: Tracking::None,
            status: EntityStatus::Inactive,
        }
    }

    #[tokio::test]
    async fn test_update_writes_all_fields_and_reactivates() {
        let entity = inactive("A");
        let catalog = InMemoryCatalog::with_entities([entity.clone()]);
        let mut records = vec![pending("A", Tracking::Serial, Some(&entity))];

        let stats = Applier::default().execute(&catalog, "feed", &mut records).await.unwrap();
        assert_eq!(stats, ApplyStats { updated: 1, created: 0 });

        let written = catalog.get(entity.id).unwrap().unwrap();
        assert_eq!(written.status, EntityStatus::Active);
        assert_eq!(written.description, "New description");
        assert_eq!(written.external_code.as_deref(), Some("A"));
        assert_eq!(written.lookup_code, "A");
        assert_eq!(written.weight, 0.25);
        assert_eq!(written.tracking, Tracking::Serial);
        assert_eq!(records[0].entity_id, Some(entity.id));
    }

    #[tokio::test]
    async fn test_create_attaches_entity_without_side_effects() {
        let catalog = InMemoryCatalog::new();
        let mut records = vec![
            pending("A", Tracking::Serial, None),
            pending("B", Tracking::None, None),
        ];

        let stats = Applier::new(NonZeroUsize::new(1).unwrap())
            .execute(&catalog, "feed", &mut records)
            .await
            .unwrap();
        assert_eq!(stats, ApplyStats { updated: 0, created: 2 });

        for record in &records {
            let id = record.entity_id.unwrap();
            let created = catalog.get(id).unwrap().unwrap();
            assert_eq!(created.lookup_code, record.name);
            assert_eq!(created.status, EntityStatus::Active);
        }
        assert!(catalog.tracking_events().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_mixed_partitions() {
        let entity = inactive("OLD");
        let catalog = InMemoryCatalog::with_entities([entity.clone()]);
        let mut records = vec![
            pending("NEW", Tracking::None, None),
            pending("OLD", Tracking::None, Some(&entity)),
        ];

        let stats = Applier::default().execute(&catalog, "feed", &mut records).await.unwrap();
        assert_eq!(stats, ApplyStats { updated: 1, created: 1 });
        assert_eq!(catalog.len().unwrap(), 2);
        assert!(records.iter().all(|r| r.entity_id.is_some()));
    }

    #[tokio::test]
    async fn test_write_failure_propagates() {
        let catalog = InMemoryCatalog::new();
        let missing = inactive("GONE");
        let mut records = vec![pending("GONE", Tracking::None, Some(&missing))];

        assert!(Applier::default().execute(&catalog, "feed", &mut records).await.is_err());
    }
}
