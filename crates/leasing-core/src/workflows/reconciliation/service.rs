use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use super::applier::{ApplyError, ApplyOutcome, ChangeApplier, ChangeError};
use super::comparator::build_change_set;
use super::domain::{
    next_session_id, ChangeCounts, ChangeId, ChangeRecord, ChangeStatus, ExtractionSession,
    SessionId, SessionStatus,
};
use super::intake::{ExtractionIntake, IntakeRecord, RejectedRecord};
use super::repository::{ChangeStatusUpdate, InventoryStore, StorageOp, StoreError};
use crate::workflows::inventory::DealerId;
use crate::workflows::pricing::{score_inventory, InventoryScoreReport, PricingConfig};

/// Result of staging one extraction batch for review.
#[derive(Debug, Clone, Serialize)]
pub struct StagedExtraction {
    pub session: ExtractionSession,
    pub changes: Vec<ChangeRecord>,
    pub rejected: Vec<RejectedRecord>,
    pub warnings: Vec<String>,
}

/// A session together with its change records.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub session: ExtractionSession,
    pub changes: Vec<ChangeRecord>,
}

/// Result of a reset or discard request.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TransitionOutcome {
    pub updated: Vec<ChangeId>,
    pub errors: Vec<ChangeError>,
}

/// Service composing intake validation, the comparator, the applier and the store.
pub struct ExtractionService<S> {
    store: Arc<S>,
    intake: ExtractionIntake,
    applier: ChangeApplier<S>,
    pricing: PricingConfig,
}

impl<S> ExtractionService<S>
where
    S: InventoryStore + 'static,
{
    pub fn new(store: Arc<S>, pricing: PricingConfig) -> Self {
        Self {
            intake: ExtractionIntake::from_config(&pricing),
            applier: ChangeApplier::new(Arc::clone(&store)),
            store,
            pricing,
        }
    }

    pub fn pricing(&self) -> &PricingConfig {
        &self.pricing
    }

    /// Validate a raw extraction batch, diff it against the dealer's inventory and persist the
    /// session with its pending change records.
    pub async fn stage<R>(
        &self,
        dealer_id: &DealerId,
        batch: Vec<R>,
    ) -> Result<StagedExtraction, ExtractionServiceError>
    where
        R: IntakeRecord + Send,
    {
        let report = self.intake.validate_batch(batch);
        let inventory = self.store.dealer_inventory(dealer_id).await?;

        let session_id = next_session_id();
        let changes = build_change_set(&session_id, &report.accepted, &inventory);
        let staged = ChangeCounts::tally(&changes);

        let mut warnings = Vec::new();
        if !inventory.is_empty() && staged.deleted * 2 >= inventory.len() {
            warn!(
                dealer_id = %dealer_id.0,
                deleted = staged.deleted,
                inventory = inventory.len(),
                "extraction stages deletion of most listings"
            );
            warnings.push(format!(
                "{} of {} listings would be deleted; confirm the upload covers the full inventory",
                staged.deleted,
                inventory.len()
            ));
        }
        if !report.rejected.is_empty() {
            warnings.push(format!(
                "{} extracted record(s) failed validation",
                report.rejected.len()
            ));
        }

        let session = ExtractionSession {
            id: session_id,
            dealer_id: dealer_id.clone(),
            status: SessionStatus::Staged,
            staged,
            applied: ChangeCounts::default(),
            intake_rejections: report.rejected.len(),
            created_at: Utc::now(),
            completed_at: None,
            applied_by: None,
        };
        self.store
            .insert_session(session.clone(), changes.clone())
            .await?;

        info!(
            session_id = %session.id.0,
            dealer_id = %dealer_id.0,
            created = staged.created,
            updated = staged.updated,
            deleted = staged.deleted,
            rejected = report.rejected.len(),
            "extraction staged"
        );

        Ok(StagedExtraction {
            session,
            changes,
            rejected: report.rejected,
            warnings,
        })
    }

    pub async fn apply(
        &self,
        session_id: &SessionId,
        selected: &[ChangeId],
        applied_by: &str,
        deadline: Option<Instant>,
    ) -> Result<ApplyOutcome, ExtractionServiceError> {
        let outcome = self
            .applier
            .apply_changes(session_id, selected, applied_by, deadline)
            .await?;
        Ok(outcome)
    }

    /// Move rejected changes back to pending so a later apply retries them.
    pub async fn reset(
        &self,
        session_id: &SessionId,
        change_ids: &[ChangeId],
    ) -> Result<TransitionOutcome, ExtractionServiceError> {
        self.transition(session_id, change_ids, ChangeStatus::Pending)
            .await
    }

    /// Mark pending changes as deliberately not applied.
    pub async fn discard(
        &self,
        session_id: &SessionId,
        change_ids: &[ChangeId],
    ) -> Result<TransitionOutcome, ExtractionServiceError> {
        self.transition(session_id, change_ids, ChangeStatus::Discarded)
            .await
    }

    pub async fn session(
        &self,
        session_id: &SessionId,
    ) -> Result<SessionView, ExtractionServiceError> {
        let session = self
            .store
            .session(session_id)
            .await?
            .ok_or_else(|| ExtractionServiceError::SessionNotFound(session_id.0.clone()))?;
        let changes = self.store.change_records(session_id).await?;
        Ok(SessionView { session, changes })
    }

    /// Rescore every listing the dealer currently has.
    pub async fn dealer_scores(
        &self,
        dealer_id: &DealerId,
    ) -> Result<InventoryScoreReport, ExtractionServiceError> {
        let inventory = self.store.dealer_inventory(dealer_id).await?;
        Ok(score_inventory(&inventory, &self.pricing))
    }

    async fn transition(
        &self,
        session_id: &SessionId,
        change_ids: &[ChangeId],
        target: ChangeStatus,
    ) -> Result<TransitionOutcome, ExtractionServiceError> {
        let view = self.session(session_id).await?;
        let mut outcome = TransitionOutcome::default();

        for change_id in change_ids {
            let Some(record) = view.changes.iter().find(|record| &record.id == change_id) else {
                outcome.errors.push(ChangeError {
                    change_id: change_id.clone(),
                    change_type: None,
                    error: format!("change {} is not part of this session", change_id.0),
                });
                continue;
            };
            if !record.status.can_transition_to(target) {
                outcome.errors.push(ChangeError {
                    change_id: change_id.clone(),
                    change_type: Some(record.change_type),
                    error: format!(
                        "cannot move from {} to {}",
                        record.status.label(),
                        target.label()
                    ),
                });
                continue;
            }

            let update = StorageOp::SetChangeStatus(ChangeStatusUpdate {
                change_id: change_id.clone(),
                status: target,
                at: Utc::now(),
                applied_by: None,
                error: None,
                listing_id: None,
            });
            match self.store.commit(vec![update]).await {
                Ok(()) => outcome.updated.push(change_id.clone()),
                Err(StoreError::Unavailable(reason)) => {
                    return Err(StoreError::Unavailable(reason).into());
                }
                Err(err) => outcome.errors.push(ChangeError {
                    change_id: change_id.clone(),
                    change_type: Some(record.change_type),
                    error: err.to_string(),
                }),
            }
        }

        info!(
            session_id = %session_id.0,
            target = target.label(),
            updated = outcome.updated.len(),
            errors = outcome.errors.len(),
            "change status transition"
        );
        Ok(outcome)
    }
}

/// Error raised by the extraction service.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionServiceError {
    #[error("extraction session {0} not found")]
    SessionNotFound(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ExtractionServiceError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ExtractionServiceError::SessionNotFound(_)
                | ExtractionServiceError::Store(StoreError::NotFound(_))
        )
    }
}

impl From<ApplyError> for ExtractionServiceError {
    fn from(value: ApplyError) -> Self {
        match value {
            ApplyError::SessionNotFound(id) => Self::SessionNotFound(id),
            ApplyError::Store(err) => Self::Store(err),
        }
    }
}
