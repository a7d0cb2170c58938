//! Reconciliation of a feed against the catalog
//!
//! Records are walked in chunks. Each chunk costs exactly one batched
//! catalog lookup; records are then compared with their candidate entity in
//! memory and only those that differ (or have no candidate, or whose
//! candidate is not active) are staged as [`PendingRecord`]s.

use pmd_common::Result;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::num::NonZeroUsize;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::catalog::Catalog;
use crate::chunk::{display_range, range_chunk};
use crate::config::IngestConfig;
use crate::models::{ExistingEntity, NormalizedRecord, PendingRecord};

/// Absorbs binary representation noise at the tolerance boundary
const FLOAT_EPSILON: f64 = 1e-9;

/// Counters from one prepare pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PrepareStats {
    /// Feed records read
    pub records: usize,
    /// Records matching an active entity, nothing staged
    pub unchanged: usize,
    /// Staged records linked to an existing entity
    pub updates: usize,
    /// Staged records with no existing entity
    pub creates: usize,
}

impl PrepareStats {
    pub fn staged(&self) -> usize {
        self.updates + self.creates
    }
}

/// Output of [`Reconciler::prepare`]
#[derive(Debug, Clone, Default)]
pub struct Reconciliation {
    pub pending: Vec<PendingRecord>,
    pub stats: PrepareStats,
}

/// Diff engine between feed records and catalog entities
#[derive(Debug, Clone, Copy)]
pub struct Reconciler {
    chunk_size: NonZeroUsize,
    rounding: f64,
}

impl Reconciler {
    pub fn new(chunk_size: NonZeroUsize, rounding: f64) -> Self {
        Self {
            chunk_size,
            rounding,
        }
    }

    pub fn from_config(config: &IngestConfig) -> Self {
        Self::new(config.prepare_chunk_size, config.rounding)
    }

    /// Equality at the configured rounding precision
    ///
    /// Values are equal when their difference rounds to zero, that is when
    /// it is at most half the precision.
    pub fn float_eq(&self, a: f64, b: f64) -> bool {
        (a - b).abs() <= self.rounding / 2.0 + FLOAT_EPSILON
    }

    /// Whether `entity` already holds everything `record` says
    pub fn is_unchanged(&self, record: &NormalizedRecord, entity: &ExistingEntity) -> bool {
        entity.external_code.as_deref() == Some(record.key())
            && entity.description == record.description()
            && self.float_eq(entity.weight, record.weight())
            && self.float_eq(entity.volume, record.volume())
            && entity.tracking == record.tracking()
            && entity.status.is_active()
    }

    /// Stage pending records for every feed record the catalog disagrees with
    ///
    /// Fails on the first record error; nothing staged so far is returned
    /// in that case. The catalog is only read.
    #[instrument(skip(self, catalog, records), fields(document = %document_id))]
    pub async fn prepare<C, I>(
        &self,
        catalog: &C,
        document_id: Uuid,
        name: &str,
        records: I,
    ) -> Result<Reconciliation>
    where
        C: Catalog + ?Sized,
        I: IntoIterator<Item = Result<NormalizedRecord>>,
    {
        let mut result = Reconciliation::default();

        for (range, chunk) in range_chunk(records, self.chunk_size) {
            info!("{} preparing {}", name, display_range(&range));

            let chunk = chunk.into_iter().collect::<Result<Vec<_>>>()?;
            let keys: BTreeSet<String> = chunk.iter().map(|r| r.key().to_string()).collect();
            let candidates = catalog.find_by_keys(&keys).await?;

            self.stage_chunk(document_id, &chunk, &candidates, &mut result);
        }

        debug!(
            records = result.stats.records,
            unchanged = result.stats.unchanged,
            updates = result.stats.updates,
            creates = result.stats.creates,
            "Reconciliation complete"
        );
        Ok(result)
    }

    fn stage_chunk(
        &self,
        document_id: Uuid,
        chunk: &[NormalizedRecord],
        candidates: &HashMap<String, ExistingEntity>,
        result: &mut Reconciliation,
    ) {
        for record in chunk {
            result.stats.records += 1;
            let candidate = candidates.get(record.key());

            match candidate {
                Some(entity) if self.is_unchanged(record, entity) => {
                    result.stats.unchanged += 1;
                    continue;
                },
                Some(_) => result.stats.updates += 1,
                None => result.stats.creates += 1,
            }

            result
                .pending
                .push(PendingRecord::stage(document_id, record, candidate));
        }
    }
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::from_config(&IngestConfig::default())
    }
}
