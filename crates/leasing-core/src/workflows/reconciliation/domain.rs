use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::workflows::inventory::{
    DealerId, Listing, ListingId, Offer, Transmission, VariantSpecs,
};

static CHANGE_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static SESSION_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static LISTING_SEQUENCE: AtomicU64 = AtomicU64::new(1);

pub(crate) fn next_change_id() -> ChangeId {
    let id = CHANGE_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    ChangeId(format!("chg-{id:06}"))
}

pub(crate) fn next_session_id() -> SessionId {
    let id = SESSION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    SessionId(format!("ses-{id:06}"))
}

pub(crate) fn next_listing_id() -> ListingId {
    let id = LISTING_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    ListingId(format!("lst-new-{id:06}"))
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChangeId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(pub String);

/// Where the variant string of an extracted record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariantSource {
    Existing,
    ReferenceMatched,
    Inferred,
}

/// A validated record from one AI extraction batch. Same shape as a listing, not yet persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedVehicle {
    pub make: String,
    pub model: String,
    pub variant: String,
    pub horsepower: Option<u32>,
    pub transmission: Option<Transmission>,
    pub fuel_type: Option<String>,
    pub retail_price: Option<u32>,
    pub offers: Vec<Offer>,
    pub variant_source: VariantSource,
    pub confidence: f32,
}

impl ExtractedVehicle {
    /// Snapshot of a stored listing, used for DELETE records and no-op comparisons.
    pub fn from_listing(listing: &Listing) -> Self {
        Self {
            make: listing.make.clone(),
            model: listing.model.clone(),
            variant: listing.variant.clone(),
            horsepower: listing.horsepower,
            transmission: listing.transmission,
            fuel_type: listing.fuel_type.clone(),
            retail_price: listing.retail_price,
            offers: listing.offers.clone(),
            variant_source: VariantSource::Existing,
            confidence: 1.0,
        }
    }

    pub fn to_listing(&self, id: ListingId, dealer_id: DealerId) -> Listing {
        Listing {
            id,
            dealer_id,
            make: self.make.clone(),
            model: self.model.clone(),
            variant: self.variant.clone(),
            horsepower: self.horsepower,
            transmission: self.transmission,
            fuel_type: self.fuel_type.clone(),
            retail_price: self.retail_price,
            offers: self.offers.clone(),
        }
    }

    pub fn specs(&self) -> VariantSpecs {
        VariantSpecs::parse(&self.variant)
    }

    pub fn effective_horsepower(&self) -> Option<u32> {
        self.horsepower.or_else(|| self.specs().horsepower)
    }

    pub fn effective_transmission(&self) -> Option<Transmission> {
        self.transmission.or_else(|| self.specs().transmission)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Create,
    Update,
    Delete,
}

impl ChangeType {
    pub const fn label(self) -> &'static str {
        match self {
            ChangeType::Create => "create",
            ChangeType::Update => "update",
            ChangeType::Delete => "delete",
        }
    }
}

/// Review/apply state of a change record.
///
/// `pending` moves to `applied`, `rejected` (apply failed) or `discarded`. The only way back is an
/// explicit reset of a `rejected` record to `pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeStatus {
    Pending,
    Applied,
    Rejected,
    Discarded,
}

impl ChangeStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ChangeStatus::Pending => "pending",
            ChangeStatus::Applied => "applied",
            ChangeStatus::Rejected => "rejected",
            ChangeStatus::Discarded => "discarded",
        }
    }

    pub const fn can_transition_to(self, next: ChangeStatus) -> bool {
        matches!(
            (self, next),
            (ChangeStatus::Pending, ChangeStatus::Applied)
                | (ChangeStatus::Pending, ChangeStatus::Rejected)
                | (ChangeStatus::Pending, ChangeStatus::Discarded)
                | (ChangeStatus::Rejected, ChangeStatus::Pending)
        )
    }
}

/// How an extracted record was paired with an existing listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMethod {
    Exact,
    Composite,
    Algorithmic,
    None,
}

/// Listing columns an UPDATE can touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingField {
    Variant,
    Horsepower,
    Transmission,
    FuelType,
    RetailPrice,
    Offers,
}

impl ListingField {
    pub const fn label(self) -> &'static str {
        match self {
            ListingField::Variant => "variant",
            ListingField::Horsepower => "horsepower",
            ListingField::Transmission => "transmission",
            ListingField::FuelType => "fuel_type",
            ListingField::RetailPrice => "retail_price",
            ListingField::Offers => "offers",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Missing,
    Number(u32),
    Text(String),
    Offers(Vec<Offer>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDiff {
    pub old: FieldValue,
    pub new: FieldValue,
}

/// One proposed CREATE/UPDATE/DELETE awaiting review, or its applied/rejected history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub id: ChangeId,
    pub session_id: SessionId,
    pub change_type: ChangeType,
    pub target_listing_id: Option<ListingId>,
    pub extracted_data: ExtractedVehicle,
    #[serde(default)]
    pub field_diffs: BTreeMap<ListingField, FieldDiff>,
    pub confidence_score: f32,
    pub match_method: MatchMethod,
    pub status: ChangeStatus,
    pub created_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub applied_by: Option<String>,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeCounts {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
}

impl ChangeCounts {
    pub fn record(&mut self, change_type: ChangeType) {
        match change_type {
            ChangeType::Create => self.created += 1,
            ChangeType::Update => self.updated += 1,
            ChangeType::Delete => self.deleted += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.created + self.updated + self.deleted
    }

    pub fn tally<'a>(records: impl IntoIterator<Item = &'a ChangeRecord>) -> Self {
        let mut counts = Self::default();
        for record in records {
            counts.record(record.change_type);
        }
        counts
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Staged,
    Completed,
    PartiallyApplied,
}

impl SessionStatus {
    pub const fn label(self) -> &'static str {
        match self {
            SessionStatus::Staged => "staged",
            SessionStatus::Completed => "completed",
            SessionStatus::PartiallyApplied => "partially_applied",
        }
    }
}

/// Groups the change records produced from one dealer PDF run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionSession {
    pub id: SessionId,
    pub dealer_id: DealerId,
    pub status: SessionStatus,
    pub staged: ChangeCounts,
    pub applied: ChangeCounts,
    pub intake_rejections: usize,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub applied_by: Option<String>,
}
