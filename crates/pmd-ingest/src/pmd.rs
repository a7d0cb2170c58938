//! Product master data feed format
//!
//! Bundles detection, preparation and execution of PMD feeds:
//!
//! ```no_run
//! use pmd_ingest::{Attachment, FeedDocument, InMemoryCatalog, IngestConfig, ProductMasterData};
//!
//! # async fn example() -> pmd_common::Result<()> {
//! let pmd = ProductMasterData::new(IngestConfig::default())?;
//! let catalog = InMemoryCatalog::new();
//! let mut document = FeedDocument::new(
//!     "PMD_TEST_1_NEW",
//!     vec![Attachment::read("PMD_TEST_1_NEW.CSV")?],
//! );
//!
//! pmd.prepare(&catalog, &mut document).await?;
//! pmd.execute(&catalog, &mut document).await?;
//! # Ok(())
//! # }
//! ```

use pmd_common::{PmdError, Result};
use regex::Regex;
use tracing::{info, instrument};

use crate::apply::{Applier, ApplyStats};
use crate::catalog::Catalog;
use crate::config::IngestConfig;
use crate::document::{FeedDocument, Named};
use crate::parser::FeedRecords;
use crate::reconcile::{PrepareStats, Reconciler};

/// The PMD feed type
#[derive(Debug, Clone)]
pub struct ProductMasterData {
    config: IngestConfig,
    pattern: Regex,
}

impl ProductMasterData {
    pub fn new(config: IngestConfig) -> Result<Self> {
        config.validate()?;
        let pattern = Regex::new(&config.filename_pattern)
            .map_err(|e| PmdError::Config(format!("invalid filename pattern: {}", e)))?;
        Ok(Self { config, pattern })
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Inputs that look like PMD feeds
    pub fn autotype<'a, T: Named>(&self, inputs: &'a [T]) -> Vec<&'a T> {
        crate::autotype::autotype(&self.pattern, inputs)
    }

    /// Reconcile the document's inputs and stage the differences on it
    ///
    /// Staged records are appended to `document.products` only once the
    /// whole feed has been reconciled, so a failure leaves the document as
    /// it was.
    #[instrument(skip_all, fields(document = %document.id, name = %document.name))]
    pub async fn prepare<C>(&self, catalog: &C, document: &mut FeedDocument) -> Result<PrepareStats>
    where
        C: Catalog + ?Sized,
    {
        if document.inputs.is_empty() {
            return Err(PmdError::MissingInput);
        }

        let reconciler = Reconciler::from_config(&self.config);
        let result = reconciler
            .prepare(
                catalog,
                document.id,
                &document.name,
                FeedRecords::new(document.lines()),
            )
            .await?;

        document.products.extend(result.pending);
        info!(
            stats = %serde_json::to_string(&result.stats)?,
            "{} prepared",
            document.name
        );
        Ok(result.stats)
    }

    /// Apply the document's staged records to the catalog
    #[instrument(skip_all, fields(document = %document.id, name = %document.name))]
    pub async fn execute<C>(&self, catalog: &C, document: &mut FeedDocument) -> Result<ApplyStats>
    where
        C: Catalog + ?Sized,
    {
        let applier = Applier::from_config(&self.config);
        let stats = applier
            .execute(catalog, &document.name, &mut document.products)
            .await?;

        info!(
            stats = %serde_json::to_string(&stats)?,
            "{} executed",
            document.name
        );
        Ok(stats)
    }
}
