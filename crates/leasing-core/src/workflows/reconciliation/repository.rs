use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::domain::{
    ChangeId, ChangeRecord, ChangeStatus, ExtractedVehicle, ExtractionSession, FieldDiff,
    ListingField, SessionId,
};
use crate::workflows::inventory::{DealerId, Listing, ListingId, Offer, Transmission};

/// Column updates an UPDATE record carries. Unset fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ListingPatch {
    pub variant: Option<String>,
    pub horsepower: Option<u32>,
    pub transmission: Option<Transmission>,
    pub fuel_type: Option<String>,
    pub retail_price: Option<u32>,
}

impl ListingPatch {
    /// Patch covering only the fields listed in `diffs`, valued from the extracted snapshot.
    pub fn from_diffs(
        diffs: &BTreeMap<ListingField, FieldDiff>,
        extracted: &ExtractedVehicle,
    ) -> Self {
        let mut patch = Self::default();
        for field in diffs.keys() {
            match field {
                ListingField::Variant => patch.variant = Some(extracted.variant.clone()),
                ListingField::Horsepower => patch.horsepower = extracted.horsepower,
                ListingField::Transmission => patch.transmission = extracted.transmission,
                ListingField::FuelType => patch.fuel_type = extracted.fuel_type.clone(),
                ListingField::RetailPrice => patch.retail_price = extracted.retail_price,
                ListingField::Offers => {}
            }
        }
        patch
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    pub fn apply_to(&self, listing: &mut Listing) {
        if let Some(variant) = &self.variant {
            listing.variant = variant.clone();
        }
        if let Some(horsepower) = self.horsepower {
            listing.horsepower = Some(horsepower);
        }
        if let Some(transmission) = self.transmission {
            listing.transmission = Some(transmission);
        }
        if let Some(fuel_type) = &self.fuel_type {
            listing.fuel_type = Some(fuel_type.clone());
        }
        if let Some(retail_price) = self.retail_price {
            listing.retail_price = Some(retail_price);
        }
    }
}

/// Status write for one change record.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeStatusUpdate {
    pub change_id: ChangeId,
    pub status: ChangeStatus,
    pub at: DateTime<Utc>,
    pub applied_by: Option<String>,
    pub error: Option<String>,
    /// Listing a CREATE produced, linked back onto the record.
    pub listing_id: Option<ListingId>,
}

/// One write against the listing, offer and change-record tables.
#[derive(Debug, Clone, PartialEq)]
pub enum StorageOp {
    /// Inserts the listing row only; offers follow through `InsertOffers`.
    InsertListing(Listing),
    PatchListing {
        listing_id: ListingId,
        patch: ListingPatch,
    },
    InsertOffers {
        listing_id: ListingId,
        offers: Vec<Offer>,
    },
    DeleteOffers {
        listing_id: ListingId,
    },
    /// Drop every change record referencing the listing except `keep`, which is detached.
    PurgeChangeReferences {
        listing_id: ListingId,
        keep: ChangeId,
    },
    DeleteListing {
        listing_id: ListingId,
    },
    SetChangeStatus(ChangeStatusUpdate),
}

/// Storage port for inventory, sessions and change records.
///
/// `commit` applies its operations atomically: all of them or none.
#[async_trait]
pub trait InventoryStore: Send + Sync {
    async fn dealer_inventory(&self, dealer_id: &DealerId) -> Result<Vec<Listing>, StoreError>;
    async fn listing(&self, listing_id: &ListingId) -> Result<Option<Listing>, StoreError>;
    /// Whether the make/model pair resolves to a reference catalogue row.
    async fn model_exists(&self, make: &str, model: &str) -> Result<bool, StoreError>;
    async fn insert_session(
        &self,
        session: ExtractionSession,
        records: Vec<ChangeRecord>,
    ) -> Result<(), StoreError>;
    async fn session(&self, session_id: &SessionId)
        -> Result<Option<ExtractionSession>, StoreError>;
    async fn update_session(&self, session: ExtractionSession) -> Result<(), StoreError>;
    async fn change_records(&self, session_id: &SessionId)
        -> Result<Vec<ChangeRecord>, StoreError>;
    async fn commit(&self, ops: Vec<StorageOp>) -> Result<(), StoreError>;
}

/// Error enumeration for storage failures.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("record already exists: {0}")]
    Conflict(String),
    #[error("record not found: {0}")]
    NotFound(String),
    #[error("listing {listing_id} is still referenced by {references} row(s)")]
    ReferentialIntegrity {
        listing_id: String,
        references: usize,
    },
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}
