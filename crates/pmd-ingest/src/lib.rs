//! PMD Ingest Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Reconciles product master data feeds against a product catalog.
//!
//! # Pipeline
//!
//! - **Detection**: [`autotype`] picks the attachments whose filename marks
//!   them as PMD feeds
//! - **Parsing**: [`parser`] turns 7-field CSV rows into normalized records
//! - **Preparation**: [`reconcile`] diffs records against the catalog in
//!   chunks and stages the differences
//! - **Execution**: [`apply`] writes staged updates and creates through the
//!   [`Catalog`] collaborator
//!
//! [`ProductMasterData`] ties the stages together for one feed document.
//!
//! # Example
//!
//! ```no_run
//! use pmd_ingest::{Attachment, FeedDocument, InMemoryCatalog, IngestConfig, ProductMasterData};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let pmd = ProductMasterData::new(IngestConfig::from_env()?)?;
//!     let catalog = InMemoryCatalog::load_or_empty("catalog.json")?;
//!
//!     let mut document = FeedDocument::new("nightly", vec![Attachment::read("PMD_NIGHTLY.CSV")?]);
//!     pmd.prepare(&catalog, &mut document).await?;
//!     pmd.execute(&catalog, &mut document).await?;
//!
//!     catalog.save("catalog.json")?;
//!     Ok(())
//! }
//! ```

pub mod apply;
pub mod autotype;
pub mod catalog;
pub mod chunk;
pub mod config;
pub mod document;
pub mod models;
pub mod parser;
pub mod pmd;
pub mod reconcile;

pub use apply::{Applier, ApplyStats};
pub use catalog::{Catalog, InMemoryCatalog};
#[cfg(feature = "database")]
pub use catalog::PgCatalog;
pub use config::IngestConfig;
pub use document::{Attachment, FeedDocument, Named};
pub use models::{
    CreateOptions, EntityFields, EntityId, EntityStatus, ExistingEntity, NormalizedRecord,
    PendingRecord, Tracking,
};
pub use pmd::ProductMasterData;
pub use reconcile::{PrepareStats, Reconciler};
