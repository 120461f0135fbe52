use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use super::domain::{ChangeId, ChangeRecord, ExtractionSession, SessionId};
use super::repository::{InventoryStore, StorageOp, StoreError};
use crate::workflows::inventory::{DealerId, Listing, ListingId, Offer};
use crate::workflows::normalizer::normalize_text;

#[derive(Debug, Default, Clone)]
struct StoreState {
    listings: BTreeMap<ListingId, Listing>,
    offers: BTreeMap<ListingId, Vec<Offer>>,
    sessions: BTreeMap<SessionId, ExtractionSession>,
    changes: BTreeMap<ChangeId, ChangeRecord>,
    reference_models: HashSet<(String, String)>,
}

/// Process-local store used by the CLI, the API server and tests.
///
/// Foreign keys are enforced the way a relational store would: offers need their listing, and a
/// listing cannot be deleted while offers or change records still point at it. `commit` works on
/// a copy and swaps it in only when every operation succeeded.
#[derive(Debug, Default, Clone)]
pub struct InMemoryInventoryStore {
    state: Arc<Mutex<StoreState>>,
}

impl InMemoryInventoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register make/model pairs CREATE changes may reference.
    pub fn with_reference_models<I, M, N>(self, models: I) -> Self
    where
        I: IntoIterator<Item = (M, N)>,
        M: AsRef<str>,
        N: AsRef<str>,
    {
        if let Ok(mut state) = self.state.lock() {
            for (make, model) in models {
                state
                    .reference_models
                    .insert(reference_key(make.as_ref(), model.as_ref()));
            }
        }
        self
    }

    /// Load listings (with their offers) and register their models as reference rows.
    pub fn seed_listings(&self, listings: Vec<Listing>) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        for mut listing in listings {
            if state.listings.contains_key(&listing.id) {
                return Err(StoreError::Conflict(listing.id.0));
            }
            state
                .reference_models
                .insert(reference_key(&listing.make, &listing.model));
            let offers = std::mem::take(&mut listing.offers);
            if !offers.is_empty() {
                state.offers.insert(listing.id.clone(), offers);
            }
            state.listings.insert(listing.id.clone(), listing);
        }
        Ok(())
    }

    /// Change record by id regardless of session.
    pub fn change_record(&self, change_id: &ChangeId) -> Result<Option<ChangeRecord>, StoreError> {
        Ok(self.lock()?.changes.get(change_id).cloned())
    }

    fn lock(&self) -> Result<MutexGuard<'_, StoreState>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Unavailable("store mutex poisoned".to_string()))
    }
}

#[async_trait]
impl InventoryStore for InMemoryInventoryStore {
    async fn dealer_inventory(&self, dealer_id: &DealerId) -> Result<Vec<Listing>, StoreError> {
        let state = self.lock()?;
        Ok(state
            .listings
            .values()
            .filter(|listing| &listing.dealer_id == dealer_id)
            .map(|listing| state.hydrate(listing))
            .collect())
    }

    async fn listing(&self, listing_id: &ListingId) -> Result<Option<Listing>, StoreError> {
        let state = self.lock()?;
        Ok(state
            .listings
            .get(listing_id)
            .map(|listing| state.hydrate(listing)))
    }

    async fn model_exists(&self, make: &str, model: &str) -> Result<bool, StoreError> {
        let state = self.lock()?;
        Ok(state.reference_models.contains(&reference_key(make, model)))
    }

    async fn insert_session(
        &self,
        session: ExtractionSession,
        records: Vec<ChangeRecord>,
    ) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        if state.sessions.contains_key(&session.id) {
            return Err(StoreError::Conflict(session.id.0));
        }
        if let Some(duplicate) = records
            .iter()
            .find(|record| state.changes.contains_key(&record.id))
        {
            return Err(StoreError::Conflict(duplicate.id.0.clone()));
        }
        for record in records {
            state.changes.insert(record.id.clone(), record);
        }
        state.sessions.insert(session.id.clone(), session);
        Ok(())
    }

    async fn session(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<ExtractionSession>, StoreError> {
        Ok(self.lock()?.sessions.get(session_id).cloned())
    }

    async fn update_session(&self, session: ExtractionSession) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        match state.sessions.get_mut(&session.id) {
            Some(current) => {
                *current = session;
                Ok(())
            }
            None => Err(StoreError::NotFound(session.id.0)),
        }
    }

    async fn change_records(
        &self,
        session_id: &SessionId,
    ) -> Result<Vec<ChangeRecord>, StoreError> {
        let state = self.lock()?;
        Ok(state
            .changes
            .values()
            .filter(|record| &record.session_id == session_id)
            .cloned()
            .collect())
    }

    async fn commit(&self, ops: Vec<StorageOp>) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        let mut staged = state.clone();
        for op in ops {
            staged.apply(op)?;
        }
        *state = staged;
        Ok(())
    }
}

impl StoreState {
    fn hydrate(&self, listing: &Listing) -> Listing {
        let mut listing = listing.clone();
        listing.offers = self.offers.get(&listing.id).cloned().unwrap_or_default();
        listing
    }

    fn references(&self, listing_id: &ListingId) -> usize {
        self.changes
            .values()
            .filter(|record| record.target_listing_id.as_ref() == Some(listing_id))
            .count()
    }

    fn apply(&mut self, op: StorageOp) -> Result<(), StoreError> {
        match op {
            StorageOp::InsertListing(mut listing) => {
                if self.listings.contains_key(&listing.id) {
                    return Err(StoreError::Conflict(listing.id.0));
                }
                listing.offers.clear();
                self.listings.insert(listing.id.clone(), listing);
            }
            StorageOp::PatchListing { listing_id, patch } => {
                let listing = self
                    .listings
                    .get_mut(&listing_id)
                    .ok_or_else(|| StoreError::NotFound(listing_id.0.clone()))?;
                patch.apply_to(listing);
            }
            StorageOp::InsertOffers { listing_id, offers } => {
                if !self.listings.contains_key(&listing_id) {
                    return Err(StoreError::NotFound(listing_id.0));
                }
                self.offers.entry(listing_id).or_default().extend(offers);
            }
            StorageOp::DeleteOffers { listing_id } => {
                self.offers.remove(&listing_id);
            }
            StorageOp::PurgeChangeReferences { listing_id, keep } => {
                let target = Some(&listing_id);
                self.changes.retain(|id, record| {
                    id == &keep || record.target_listing_id.as_ref() != target
                });
                if let Some(kept) = self.changes.get_mut(&keep) {
                    if kept.target_listing_id.as_ref() == target {
                        kept.target_listing_id = None;
                    }
                }
            }
            StorageOp::DeleteListing { listing_id } => {
                if !self.listings.contains_key(&listing_id) {
                    return Err(StoreError::NotFound(listing_id.0));
                }
                let references = self.offers.get(&listing_id).map(Vec::len).unwrap_or(0)
                    + self.references(&listing_id);
                if references > 0 {
                    return Err(StoreError::ReferentialIntegrity {
                        listing_id: listing_id.0,
                        references,
                    });
                }
                self.listings.remove(&listing_id);
            }
            StorageOp::SetChangeStatus(update) => {
                let record = self
                    .changes
                    .get_mut(&update.change_id)
                    .ok_or_else(|| StoreError::NotFound(update.change_id.0.clone()))?;
                if !record.status.can_transition_to(update.status) {
                    return Err(StoreError::Conflict(format!(
                        "{} cannot move from {} to {}",
                        update.change_id.0,
                        record.status.label(),
                        update.status.label()
                    )));
                }
                record.status = update.status;
                record.reviewed_at = Some(update.at);
                record.applied_by = update.applied_by;
                record.last_error = update.error;
                if let Some(listing_id) = update.listing_id {
                    record.target_listing_id = Some(listing_id);
                }
            }
        }
        Ok(())
    }
}

fn reference_key(make: &str, model: &str) -> (String, String) {
    (normalize_text(make), normalize_text(model))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::inventory::Offer;

    fn listing(id: &str) -> Listing {
        Listing {
            id: ListingId(id.to_string()),
            dealer_id: DealerId("dealer-1".to_string()),
            make: "Toyota".to_string(),
            model: "Aygo X".to_string(),
            variant: "Active".to_string(),
            horsepower: None,
            transmission: None,
            fuel_type: None,
            retail_price: Some(189_900),
            offers: vec![Offer {
                monthly_price: 2_195,
                period_months: 36,
                mileage_per_year: 15_000,
                first_payment: 4_995,
            }],
        }
    }

    #[tokio::test]
    async fn seeded_listings_are_read_back_with_offers() {
        let store = InMemoryInventoryStore::new();
        store.seed_listings(vec![listing("a")]).expect("seeded");

        let inventory = store
            .dealer_inventory(&DealerId("dealer-1".to_string()))
            .await
            .expect("read");
        assert_eq!(inventory.len(), 1);
        assert_eq!(inventory[0].offers.len(), 1);
        assert!(store.model_exists("toyota", "AYGO X").await.expect("lookup"));
        assert!(!store.model_exists("Toyota", "Supra").await.expect("lookup"));
    }

    #[tokio::test]
    async fn deleting_a_listing_with_offers_is_blocked() {
        let store = InMemoryInventoryStore::new();
        store.seed_listings(vec![listing("a")]).expect("seeded");
        let id = ListingId("a".to_string());

        let blocked = store
            .commit(vec![StorageOp::DeleteListing {
                listing_id: id.clone(),
            }])
            .await;
        assert!(matches!(
            blocked,
            Err(StoreError::ReferentialIntegrity { references: 1, .. })
        ));

        store
            .commit(vec![
                StorageOp::DeleteOffers {
                    listing_id: id.clone(),
                },
                StorageOp::DeleteListing {
                    listing_id: id.clone(),
                },
            ])
            .await
            .expect("offers removed first");
        assert!(store.listing(&id).await.expect("read").is_none());
    }

    #[tokio::test]
    async fn failed_commit_leaves_state_untouched() {
        let store = InMemoryInventoryStore::new();
        store.seed_listings(vec![listing("a")]).expect("seeded");
        let id = ListingId("a".to_string());

        let result = store
            .commit(vec![
                StorageOp::DeleteOffers {
                    listing_id: id.clone(),
                },
                StorageOp::InsertOffers {
                    listing_id: ListingId("missing".to_string()),
                    offers: Vec::new(),
                },
            ])
            .await;

        assert!(matches!(result, Err(StoreError::NotFound(_))));
        let stored = store.listing(&id).await.expect("read").expect("present");
        assert_eq!(stored.offers.len(), 1);
    }
}
