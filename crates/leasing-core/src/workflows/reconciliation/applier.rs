use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use super::domain::{
    next_listing_id, ChangeCounts, ChangeId, ChangeRecord, ChangeStatus, ChangeType,
    ExtractionSession, SessionId, SessionStatus,
};
use super::repository::{ChangeStatusUpdate, InventoryStore, ListingPatch, StorageOp, StoreError};
use crate::workflows::inventory::ListingId;

/// One change that did not reach `applied`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeError {
    pub change_id: ChangeId,
    /// `None` when the id is not part of the session.
    pub change_type: Option<ChangeType>,
    pub error: String,
}

/// A selected change left alone because it was not pending.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedChange {
    pub change_id: ChangeId,
    pub status: ChangeStatus,
}

/// Aggregate result of one apply call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApplyOutcome {
    pub session_id: SessionId,
    pub applied: ChangeCounts,
    pub errors: Vec<ChangeError>,
    pub skipped: Vec<SkippedChange>,
    /// Selected changes not reached before the deadline; still pending.
    pub deferred: Vec<ChangeId>,
    pub session_status: SessionStatus,
}

/// Failures that abort the whole apply call.
#[derive(Debug, thiserror::Error)]
pub enum ApplyError {
    #[error("extraction session {0} not found")]
    SessionNotFound(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Per-change failure; recorded on the change record, never fatal to the batch.
#[derive(Debug, thiserror::Error)]
enum ChangeFailure {
    #[error("make/model {make} {model} has no reference row")]
    UnknownReference { make: String, model: String },
    #[error("change record has no target listing")]
    MissingTarget,
    #[error("listing {0} no longer exists")]
    ListingNotFound(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Writes approved change records into the inventory.
pub struct ChangeApplier<S> {
    store: Arc<S>,
}

impl<S> ChangeApplier<S>
where
    S: InventoryStore + 'static,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Apply the selected changes of a session in the given order.
    ///
    /// Each change commits on its own. A failing change is marked `rejected` with its error and
    /// the batch carries on; changes that are not `pending` (including earlier rejections that
    /// were never reset) are skipped. Once `deadline` passes, the remaining ids stay pending and
    /// are reported as deferred.
    pub async fn apply_changes(
        &self,
        session_id: &SessionId,
        selected: &[ChangeId],
        applied_by: &str,
        deadline: Option<Instant>,
    ) -> Result<ApplyOutcome, ApplyError> {
        let mut session = self
            .store
            .session(session_id)
            .await?
            .ok_or_else(|| ApplyError::SessionNotFound(session_id.0.clone()))?;
        let mut records: HashMap<ChangeId, ChangeRecord> = self
            .store
            .change_records(session_id)
            .await?
            .into_iter()
            .map(|record| (record.id.clone(), record))
            .collect();

        let mut outcome = ApplyOutcome {
            session_id: session_id.clone(),
            applied: ChangeCounts::default(),
            errors: Vec::new(),
            skipped: Vec::new(),
            deferred: Vec::new(),
            session_status: session.status,
        };
        let mut seen: HashSet<&ChangeId> = HashSet::new();

        for (position, change_id) in selected.iter().enumerate() {
            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                outcome.deferred = selected[position..]
                    .iter()
                    .filter(|id| !seen.contains(id))
                    .cloned()
                    .collect();
                warn!(
                    session_id = %session_id.0,
                    deferred = outcome.deferred.len(),
                    "apply deadline reached"
                );
                break;
            }
            if !seen.insert(change_id) {
                continue;
            }

            let Some(record) = records.get_mut(change_id) else {
                outcome.errors.push(ChangeError {
                    change_id: change_id.clone(),
                    change_type: None,
                    error: format!("change {} is not part of this session", change_id.0),
                });
                continue;
            };

            if record.status != ChangeStatus::Pending {
                outcome.skipped.push(SkippedChange {
                    change_id: change_id.clone(),
                    status: record.status,
                });
                continue;
            }

            match self.apply_one(record, &session, applied_by).await {
                Ok(()) => {
                    record.status = ChangeStatus::Applied;
                    outcome.applied.record(record.change_type);
                }
                Err(failure) => {
                    let error = failure.to_string();
                    warn!(
                        change_id = %change_id.0,
                        change_type = record.change_type.label(),
                        %error,
                        "change rejected"
                    );
                    self.store
                        .commit(vec![StorageOp::SetChangeStatus(ChangeStatusUpdate {
                            change_id: change_id.clone(),
                            status: ChangeStatus::Rejected,
                            at: Utc::now(),
                            applied_by: Some(applied_by.to_string()),
                            error: Some(error.clone()),
                            listing_id: None,
                        })])
                        .await?;
                    record.status = ChangeStatus::Rejected;
                    outcome.errors.push(ChangeError {
                        change_id: change_id.clone(),
                        change_type: Some(record.change_type),
                        error,
                    });
                }
            }
        }

        // A call that only skipped records leaves the session as it was.
        let touched = outcome.applied.total() > 0
            || !outcome.errors.is_empty()
            || !outcome.deferred.is_empty();
        if touched {
            outcome.session_status = if outcome.errors.is_empty() && outcome.deferred.is_empty() {
                SessionStatus::Completed
            } else {
                SessionStatus::PartiallyApplied
            };
            self.record_session(&mut session, &outcome, applied_by).await?;
        }

        info!(
            session_id = %session_id.0,
            created = outcome.applied.created,
            updated = outcome.applied.updated,
            deleted = outcome.applied.deleted,
            errors = outcome.errors.len(),
            skipped = outcome.skipped.len(),
            status = outcome.session_status.label(),
            "apply finished"
        );
        Ok(outcome)
    }

    async fn apply_one(
        &self,
        record: &ChangeRecord,
        session: &ExtractionSession,
        applied_by: &str,
    ) -> Result<(), ChangeFailure> {
        let applied = |listing_id: Option<ListingId>| {
            StorageOp::SetChangeStatus(ChangeStatusUpdate {
                change_id: record.id.clone(),
                status: ChangeStatus::Applied,
                at: Utc::now(),
                applied_by: Some(applied_by.to_string()),
                error: None,
                listing_id,
            })
        };
        let vehicle = &record.extracted_data;

        let ops = match record.change_type {
            ChangeType::Create => {
                if !self.store.model_exists(&vehicle.make, &vehicle.model).await? {
                    return Err(ChangeFailure::UnknownReference {
                        make: vehicle.make.clone(),
                        model: vehicle.model.clone(),
                    });
                }
                let listing = vehicle.to_listing(next_listing_id(), session.dealer_id.clone());
                let listing_id = listing.id.clone();
                let offers = listing.offers.clone();
                vec![
                    StorageOp::InsertListing(listing),
                    StorageOp::InsertOffers {
                        listing_id: listing_id.clone(),
                        offers,
                    },
                    applied(Some(listing_id)),
                ]
            }
            ChangeType::Update => {
                let listing_id = self.existing_target(record).await?;
                let patch = ListingPatch::from_diffs(&record.field_diffs, vehicle);
                let mut ops = Vec::with_capacity(4);
                if !patch.is_empty() {
                    ops.push(StorageOp::PatchListing {
                        listing_id: listing_id.clone(),
                        patch,
                    });
                }
                ops.push(StorageOp::DeleteOffers {
                    listing_id: listing_id.clone(),
                });
                ops.push(StorageOp::InsertOffers {
                    listing_id,
                    offers: vehicle.offers.clone(),
                });
                ops.push(applied(None));
                ops
            }
            ChangeType::Delete => {
                let listing_id = self.existing_target(record).await?;
                vec![
                    StorageOp::PurgeChangeReferences {
                        listing_id: listing_id.clone(),
                        keep: record.id.clone(),
                    },
                    StorageOp::DeleteOffers {
                        listing_id: listing_id.clone(),
                    },
                    StorageOp::DeleteListing { listing_id },
                    applied(None),
                ]
            }
        };

        self.store.commit(ops).await?;
        Ok(())
    }

    async fn existing_target(&self, record: &ChangeRecord) -> Result<ListingId, ChangeFailure> {
        let listing_id = record
            .target_listing_id
            .clone()
            .ok_or(ChangeFailure::MissingTarget)?;
        match self.store.listing(&listing_id).await? {
            Some(_) => Ok(listing_id),
            None => Err(ChangeFailure::ListingNotFound(listing_id.0)),
        }
    }

    async fn record_session(
        &self,
        session: &mut ExtractionSession,
        outcome: &ApplyOutcome,
        applied_by: &str,
    ) -> Result<(), StoreError> {
        session.applied.created += outcome.applied.created;
        session.applied.updated += outcome.applied.updated;
        session.applied.deleted += outcome.applied.deleted;
        session.status = outcome.session_status;
        session.applied_by = Some(applied_by.to_string());
        if session.status == SessionStatus::Completed {
            session.completed_at = Some(Utc::now());
        }
        self.store.update_session(session.clone()).await
    }
}
