use serde_json::json;

use super::common::*;
use crate::workflows::inventory::DealerId;
use crate::workflows::reconciliation::{
    ChangeStatus, ExtractionServiceError, IntakeViolation, InventoryStore, SessionId,
    SessionStatus, StoreError,
};

#[tokio::test]
async fn stage_warns_when_most_listings_would_be_deleted() {
    let (service, _store) = build_service(inventory());

    let staged = service
        .stage(
            &dealer(),
            vec![raw_vehicle(json!({
                "make": "Toyota", "model": "Aygo X", "variant": "Active 72 hk",
                "retail_price": 249900,
                "offers": [
                    { "monthly_price": 2195, "mileage_per_year": 15000 },
                    { "monthly_price": 2495, "mileage_per_year": 20000 }
                ]
            }))],
        )
        .await
        .expect("staged");

    assert_eq!(staged.session.staged.deleted, 2);
    assert_eq!(staged.session.staged.total(), 2);
    assert_eq!(staged.session.status, SessionStatus::Staged);
    assert_eq!(staged.warnings.len(), 1);
    assert!(staged.warnings[0].contains("2 of 3 listings"));
}

#[tokio::test]
async fn stage_reports_rejected_records_without_failing() {
    let (service, _store) = build_service(Vec::new());

    let staged = service
        .stage(
            &dealer(),
            vec![
                raw_vehicle(json!({ "make": "Toyota", "model": "Aygo" })),
                raw_vehicle(json!({
                    "make": "Toyota", "model": "Aygo", "variant": "Active",
                    "monthly_price": 2195
                })),
            ],
        )
        .await
        .expect("staged");

    assert_eq!(staged.changes.len(), 1);
    assert_eq!(staged.rejected.len(), 1);
    assert_eq!(staged.rejected[0].index, 0);
    assert_eq!(
        staged.rejected[0].reason,
        IntakeViolation::MissingField { field: "variant" }
    );
    assert_eq!(staged.session.intake_rejections, 1);
}

#[tokio::test]
async fn discarded_changes_are_skipped_and_cannot_be_reset() {
    let (service, store) = build_service(inventory());
    let staged = service.stage(&dealer(), empty_batch()).await.expect("staged");
    let ids = change_ids(&staged.changes);

    let discarded = service
        .discard(&staged.session.id, &ids[..1])
        .await
        .expect("discard runs");
    assert_eq!(discarded.updated, ids[..1].to_vec());

    let reset = service
        .reset(&staged.session.id, &ids[..2])
        .await
        .expect("reset runs");
    assert!(reset.updated.is_empty());
    assert_eq!(reset.errors.len(), 2);
    assert!(reset.errors[0].error.contains("discarded"));
    assert!(reset.errors[1].error.contains("pending"));

    let outcome = service
        .apply(&staged.session.id, &ids, "reviewer", None)
        .await
        .expect("applied");
    assert_eq!(outcome.applied.deleted, 2);
    assert_eq!(outcome.skipped.len(), 1);
    assert_eq!(outcome.skipped[0].status, ChangeStatus::Discarded);
    assert_eq!(outcome.session_status, SessionStatus::Completed);

    let view = service.session(&staged.session.id).await.expect("view");
    assert_eq!(view.session.applied.deleted, 2);
    assert_eq!(view.session.status, SessionStatus::Completed);
    assert!(view.session.completed_at.is_some());
    let remaining = store.dealer_inventory(&dealer()).await.expect("read");
    assert_eq!(remaining.len(), 1);
}

#[tokio::test]
async fn dealer_scores_cover_current_inventory() {
    let (service, _store) = build_service(inventory());

    let report = service.dealer_scores(&dealer()).await.expect("scored");

    assert_eq!(report.rows.len(), 3);
    assert_eq!(report.scored, 3);
    let empty = service
        .dealer_scores(&DealerId("nobody".to_string()))
        .await
        .expect("scored");
    assert!(empty.rows.is_empty());
}

#[tokio::test]
async fn missing_sessions_surface_as_not_found() {
    let (service, _store) = build_service(Vec::new());

    let err = service
        .session(&SessionId("ses-missing".to_string()))
        .await
        .expect_err("no such session");
    assert!(err.is_not_found());

    let err = service
        .reset(&SessionId("ses-missing".to_string()), &[])
        .await
        .expect_err("no such session");
    assert!(matches!(err, ExtractionServiceError::SessionNotFound(_)));
}

#[tokio::test]
async fn storage_outages_fail_the_whole_stage() {
    let service = crate::workflows::reconciliation::ExtractionService::new(
        std::sync::Arc::new(UnavailableStore),
        crate::workflows::pricing::PricingConfig::default(),
    );

    let err = service
        .stage(&dealer(), empty_batch())
        .await
        .expect_err("store offline");
    assert!(matches!(
        err,
        ExtractionServiceError::Store(StoreError::Unavailable(_))
    ));
    assert!(!err.is_not_found());
}
