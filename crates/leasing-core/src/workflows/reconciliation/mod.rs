//! Reconciliation of AI-extracted dealer inventories against stored listings.
//!
//! An extraction batch is validated (`intake`), paired with existing listings (`matching`),
//! turned into reviewable change records (`comparator`) and, once a reviewer selects them,
//! written through the storage port (`applier`).

pub mod applier;
pub mod comparator;
pub mod domain;
pub mod intake;
pub mod matching;
pub mod memory;
pub mod repository;
pub mod router;
pub mod service;

pub use applier::{ApplyError, ApplyOutcome, ChangeApplier, ChangeError, SkippedChange};
pub use comparator::{build_change_set, diff_listing};
pub use domain::{
    ChangeCounts, ChangeId, ChangeRecord, ChangeStatus, ChangeType, ExtractedVehicle,
    ExtractionSession, FieldDiff, FieldValue, ListingField, MatchMethod, SessionId, SessionStatus,
    VariantSource,
};
pub use intake::{
    ExtractionIntake, IntakeRecord, IntakeReport, IntakeViolation, RawAmount, RawExtractedVehicle,
    RawOffer, RejectedRecord,
};
pub use matching::{find_best_match, InventoryIndex, ListingMatch};
pub use memory::InMemoryInventoryStore;
pub use repository::{ChangeStatusUpdate, InventoryStore, ListingPatch, StorageOp, StoreError};
pub use router::{extraction_router, ApplyRequest, ChangeIdsRequest, StageRequest};
pub use service::{
    ExtractionService, ExtractionServiceError, SessionView, StagedExtraction, TransitionOutcome,
};

#[cfg(test)]
mod tests;
