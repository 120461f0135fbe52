use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::response::Response;
use serde_json::Value;

use crate::workflows::inventory::{DealerId, Listing, ListingId, Offer, Transmission};
use crate::workflows::pricing::PricingConfig;
use crate::workflows::reconciliation::{
    ChangeId, ChangeRecord, ChangeStatus, ExtractedVehicle, ExtractionService, ExtractionSession,
    InMemoryInventoryStore, InventoryStore, RawExtractedVehicle, SessionId, StorageOp, StoreError,
    VariantSource,
};

pub(super) fn dealer() -> DealerId {
    DealerId("dealer-42".to_string())
}

pub(super) fn offer(monthly_price: u32, mileage_per_year: u32) -> Offer {
    Offer {
        monthly_price,
        period_months: 36,
        mileage_per_year,
        first_payment: 0,
    }
}

pub(super) fn listing(id: &str, model: &str, variant: &str, monthly_price: u32) -> Listing {
    Listing {
        id: ListingId(id.to_string()),
        dealer_id: dealer(),
        make: "Toyota".to_string(),
        model: model.to_string(),
        variant: variant.to_string(),
        horsepower: None,
        transmission: None,
        fuel_type: Some("Benzin".to_string()),
        retail_price: Some(249_900),
        offers: vec![offer(monthly_price, 15_000), offer(monthly_price + 300, 20_000)],
    }
}

pub(super) fn inventory() -> Vec<Listing> {
    vec![
        listing("lst-aygo", "Aygo X", "Active 72 hk", 2_195),
        listing("lst-yaris", "Yaris", "Style Hybrid 116 hk", 2_795),
        Listing {
            transmission: Some(Transmission::Automatic),
            ..listing("lst-bz4x", "bZ4X", "Executive AWD 218 hk", 4_495)
        },
    ]
}

/// Extracted record carrying the same data as the stored listing.
pub(super) fn extracted_from(listing: &Listing) -> ExtractedVehicle {
    ExtractedVehicle {
        variant_source: VariantSource::Existing,
        confidence: 0.92,
        ..ExtractedVehicle::from_listing(listing)
    }
}

pub(super) fn raw_vehicle(value: Value) -> RawExtractedVehicle {
    serde_json::from_value(value).expect("valid raw vehicle")
}

pub(super) fn empty_batch() -> Vec<RawExtractedVehicle> {
    Vec::new()
}

pub(super) fn seeded_store(listings: Vec<Listing>) -> Arc<InMemoryInventoryStore> {
    let store = InMemoryInventoryStore::new().with_reference_models([
        ("Toyota", "Aygo"),
        ("Toyota", "Aygo X"),
        ("Toyota", "Yaris"),
        ("Toyota", "bZ4X"),
    ]);
    store.seed_listings(listings).expect("seeded");
    Arc::new(store)
}

pub(super) fn build_service(
    listings: Vec<Listing>,
) -> (
    ExtractionService<InMemoryInventoryStore>,
    Arc<InMemoryInventoryStore>,
) {
    let store = seeded_store(listings);
    let service = ExtractionService::new(store.clone(), PricingConfig::default());
    (service, store)
}

pub(super) fn change_ids(records: &[ChangeRecord]) -> Vec<ChangeId> {
    records.iter().map(|record| record.id.clone()).collect()
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

/// Wraps the in-memory store and fails the apply commit of selected change records.
#[derive(Clone)]
pub(super) struct FlakyStore {
    pub(super) inner: InMemoryInventoryStore,
    failing: Arc<Mutex<HashSet<ChangeId>>>,
}

impl FlakyStore {
    pub(super) fn new(inner: InMemoryInventoryStore) -> Self {
        Self {
            inner,
            failing: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub(super) fn fail_change(&self, change_id: ChangeId) {
        self.failing
            .lock()
            .expect("failing set mutex poisoned")
            .insert(change_id);
    }

    fn should_fail(&self, ops: &[StorageOp]) -> bool {
        let failing = self.failing.lock().expect("failing set mutex poisoned");
        ops.iter().any(|op| {
            matches!(
                op,
                StorageOp::SetChangeStatus(update)
                    if update.status == ChangeStatus::Applied
                        && failing.contains(&update.change_id)
            )
        })
    }
}

#[async_trait]
impl InventoryStore for FlakyStore {
    async fn dealer_inventory(&self, dealer_id: &DealerId) -> Result<Vec<Listing>, StoreError> {
        self.inner.dealer_inventory(dealer_id).await
    }

    async fn listing(&self, listing_id: &ListingId) -> Result<Option<Listing>, StoreError> {
        self.inner.listing(listing_id).await
    }

    async fn model_exists(&self, make: &str, model: &str) -> Result<bool, StoreError> {
        self.inner.model_exists(make, model).await
    }

    async fn insert_session(
        &self,
        session: ExtractionSession,
        records: Vec<ChangeRecord>,
    ) -> Result<(), StoreError> {
        self.inner.insert_session(session, records).await
    }

    async fn session(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<ExtractionSession>, StoreError> {
        self.inner.session(session_id).await
    }

    async fn update_session(&self, session: ExtractionSession) -> Result<(), StoreError> {
        self.inner.update_session(session).await
    }

    async fn change_records(
        &self,
        session_id: &SessionId,
    ) -> Result<Vec<ChangeRecord>, StoreError> {
        self.inner.change_records(session_id).await
    }

    async fn commit(&self, ops: Vec<StorageOp>) -> Result<(), StoreError> {
        if self.should_fail(&ops) {
            return Err(StoreError::Unavailable("simulated write failure".to_string()));
        }
        self.inner.commit(ops).await
    }
}

pub(super) struct UnavailableStore;

#[async_trait]
impl InventoryStore for UnavailableStore {
    async fn dealer_inventory(&self, _dealer_id: &DealerId) -> Result<Vec<Listing>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    async fn listing(&self, _listing_id: &ListingId) -> Result<Option<Listing>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    async fn model_exists(&self, _make: &str, _model: &str) -> Result<bool, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    async fn insert_session(
        &self,
        _session: ExtractionSession,
        _records: Vec<ChangeRecord>,
    ) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    async fn session(
        &self,
        _session_id: &SessionId,
    ) -> Result<Option<ExtractionSession>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    async fn update_session(&self, _session: ExtractionSession) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    async fn change_records(
        &self,
        _session_id: &SessionId,
    ) -> Result<Vec<ChangeRecord>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    async fn commit(&self, _ops: Vec<StorageOp>) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }
}
