//! Product master data models
//!
//! Records flow through three shapes: a [`NormalizedRecord`] parsed from a
//! feed line, an [`ExistingEntity`] read from the catalog, and a
//! [`PendingRecord`] staged when the two disagree. Writes to the catalog go
//! through the typed [`EntityFields`] value object.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Description used when a feed row leaves it blank
pub const UNKNOWN_DESCRIPTION: &str = "Unknown";

/// How inventory of a product is tracked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Tracking {
    /// By serial number
    Serial,
    /// By lots
    Lot,
    /// No tracking
    #[default]
    None,
}

impl Tracking {
    /// Derive tracking from a feed indicator: `Y` (any case) means serial
    pub fn from_indicator(indicator: &str) -> Self {
        if indicator.trim().eq_ignore_ascii_case("y") {
            Tracking::Serial
        } else {
            Tracking::None
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Tracking::Serial => "serial",
            Tracking::Lot => "lot",
            Tracking::None => "none",
        }
    }
}

impl std::fmt::Display for Tracking {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Tracking {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "serial" => Ok(Tracking::Serial),
            "lot" => Ok(Tracking::Lot),
            "none" => Ok(Tracking::None),
            other => Err(format!("unknown tracking mode '{}'", other)),
        }
    }
}

/// Lifecycle status of a catalog entity
///
/// Only [`EntityStatus::Active`] entities can be considered unchanged; every
/// write made by the applier sets the status back to active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EntityStatus {
    #[default]
    Active,
    Inactive,
    Archived,
}

impl EntityStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, EntityStatus::Active)
    }

    pub fn as_str(&self) -> &str {
        match self {
            EntityStatus::Active => "active",
            EntityStatus::Inactive => "inactive",
            EntityStatus::Archived => "archived",
        }
    }
}

impl std::str::FromStr for EntityStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(EntityStatus::Active),
            "inactive" => Ok(EntityStatus::Inactive),
            "archived" => Ok(EntityStatus::Archived),
            other => Err(format!("unknown entity status '{}'", other)),
        }
    }
}

/// Surrogate identifier of a catalog entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub Uuid);

impl EntityId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// One feed row after normalization
///
/// Fields are private so the invariants established by the parser (non-empty
/// key, non-negative weight and volume) cannot be broken afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedRecord {
    key: String,
    description: String,
    weight: f64,
    volume: f64,
    tracking: Tracking,
}

impl NormalizedRecord {
    /// Build a record, returning `None` if an invariant would be violated
    pub fn new(
        key: impl Into<String>,
        description: impl Into<String>,
        weight: f64,
        volume: f64,
        tracking: Tracking,
    ) -> Option<Self> {
        let key = key.into();
        if key.trim().is_empty() || !weight.is_finite() || !volume.is_finite() {
            return None;
        }
        if weight < 0.0 || volume < 0.0 {
            return None;
        }

        let description = description.into();
        let description = if description.is_empty() {
            UNKNOWN_DESCRIPTION.to_string()
        } else {
            description
        };

        Some(Self {
            key,
            description,
            weight,
            volume,
            tracking,
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }

    pub fn tracking(&self) -> Tracking {
        self.tracking
    }
}

/// A product as currently held by the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExistingEntity {
    pub id: EntityId,
    /// Internal reference the catalog indexes lookups on
    pub lookup_code: String,
    /// External code (barcode); expected to equal the natural key
    pub external_code: Option<String>,
    pub description: String,
    pub weight: f64,
    pub volume: f64,
    pub tracking: Tracking,
    pub status: EntityStatus,
}

/// Staged intent to create or update one catalog entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingRecord {
    /// Feed document this record was staged from
    pub document_id: Uuid,
    /// Natural key
    pub name: String,
    pub description: String,
    pub weight: f64,
    pub volume: f64,
    pub tracking: Tracking,
    /// Linked entity: set at staging time for updates, attached after
    /// persisting for creates
    pub entity_id: Option<EntityId>,
}

impl PendingRecord {
    pub fn stage(
        document_id: Uuid,
        record: &NormalizedRecord,
        candidate: Option<&ExistingEntity>,
    ) -> Self {
        Self {
            document_id,
            name: record.key().to_string(),
            description: record.description().to_string(),
            weight: record.weight(),
            volume: record.volume(),
            tracking: record.tracking(),
            entity_id: candidate.map(|e| e.id),
        }
    }

    pub fn is_update(&self) -> bool {
        self.entity_id.is_some()
    }
}

/// Field set written onto a catalog entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityFields {
    pub status: EntityStatus,
    pub description: String,
    pub lookup_code: String,
    pub external_code: String,
    pub weight: f64,
    pub volume: f64,
    pub tracking: Tracking,
}

impl EntityFields {
    /// Fields for a pending record: active, with both codes set to the key
    pub fn from_pending(record: &PendingRecord) -> Self {
        Self {
            status: EntityStatus::Active,
            description: record.description.clone(),
            lookup_code: record.name.clone(),
            external_code: record.name.clone(),
            weight: record.weight,
            volume: record.volume,
            tracking: record.tracking,
        }
    }
}

/// Options for entity creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CreateOptions {
    /// Run the catalog's tracking-change side effects for the new entity
    pub tracking_side_effects: bool,
}

impl CreateOptions {
    /// Creation with per-create side effects disabled
    pub fn quiet() -> Self {
        Self {
            tracking_side_effects: false,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_tracking_from_indicator() {
        assert_eq!(Tracking::from_indicator("Y"), Tracking::Serial);
        assert_eq!(Tracking::from_indicator("y"), Tracking::Serial);
        for other in ["", "N", "X", "yes"] {
            assert_eq!(Tracking::from_indicator(other), Tracking::None, "indicator {:?}", other);
        }
    }

    #[test]
    fn test_tracking_round_trips_through_str() {
        for tracking in [Tracking::Serial, Tracking::Lot, Tracking::None] {
            assert_eq!(tracking.as_str().parse::<Tracking>().unwrap(), tracking);
        }
        assert!("batch".parse::<Tracking>().is_err());
    }

    #[test]
    fn test_normalized_record_invariants() {
        assert!(NormalizedRecord::new("", "desc", 0.0, 0.0, Tracking::None).is_none());
        assert!(NormalizedRecord::new("  ", "desc", 0.0, 0.0, Tracking::None).is_none());
        assert!(NormalizedRecord::new("K", "desc", -0.1, 0.0, Tracking::None).is_none());
        assert!(NormalizedRecord::new("K", "desc", 0.0, f64::NAN, Tracking::None).is_none());
        assert!(NormalizedRecord::new("K", "desc", f64::INFINITY, 0.0, Tracking::None).is_none());

        let record = NormalizedRecord::new("K", "", 1.5, 0.0, Tracking::Lot).unwrap();
        assert_eq!(record.description(), UNKNOWN_DESCRIPTION);
        assert_eq!(record.tracking(), Tracking::Lot);
    }

    #[test]
    fn test_entity_fields_from_pending() {
        let record = NormalizedRecord::new("PMD-1", "Widget", 0.1, 0.5, Tracking::Serial).unwrap();
        let pending = PendingRecord::stage(Uuid::new_v4(), &record, None);
        assert!(!pending.is_update());

        let fields = EntityFields::from_pending(&pending);
        assert_eq!(fields.status, EntityStatus::Active);
        assert_eq!(fields.lookup_code, "PMD-1");
        assert_eq!(fields.external_code, "PMD-1");
        assert_eq!(fields.description, "Widget");
        assert_eq!(fields.tracking, Tracking::Serial);
    }

    #[test]
    fn test_only_active_status_is_active() {
        assert!(EntityStatus::Active.is_active());
        assert!(!EntityStatus::Inactive.is_active());
        assert!(!EntityStatus::Archived.is_active());
        assert_eq!("archived".parse::<EntityStatus>().unwrap(), EntityStatus::Archived);
    }
}
