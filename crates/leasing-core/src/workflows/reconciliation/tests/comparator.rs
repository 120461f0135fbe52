use std::collections::HashSet;

use super::common::*;
use crate::workflows::inventory::{Listing, ListingId, Transmission};
use crate::workflows::reconciliation::{
    build_change_set, find_best_match, ChangeStatus, ChangeType, FieldValue, InventoryIndex,
    ListingField, MatchMethod, SessionId,
};

fn session() -> SessionId {
    SessionId("ses-test".to_string())
}

#[test]
fn unchanged_inventory_produces_no_changes() {
    let existing = inventory();
    let extracted: Vec<_> = existing
        .iter()
        .map(|listing| {
            let mut vehicle = extracted_from(listing);
            vehicle.offers.reverse();
            vehicle
        })
        .collect();

    let changes = build_change_set(&session(), &extracted, &existing);

    assert!(changes.is_empty(), "expected no changes, got {changes:?}");
}

#[test]
fn every_unclaimed_listing_is_deleted_once() {
    let existing = inventory();
    let extracted = vec![extracted_from(&existing[0])];

    let changes = build_change_set(&session(), &extracted, &existing);

    assert!(changes
        .iter()
        .all(|change| change.change_type == ChangeType::Delete));
    let mut deleted: Vec<_> = changes
        .iter()
        .filter_map(|change| change.target_listing_id.clone())
        .collect();
    deleted.sort();
    assert_eq!(
        deleted,
        vec![
            ListingId("lst-bz4x".to_string()),
            ListingId("lst-yaris".to_string())
        ]
    );
    let snapshot = &changes[0].extracted_data;
    assert_eq!(snapshot.make, "Toyota");
    assert_eq!(changes[0].status, ChangeStatus::Pending);
}

#[test]
fn partial_uploads_stage_deletes_for_unrelated_models() {
    let existing = inventory();
    let mut only_new = extracted_from(&existing[0]);
    only_new.model = "C-HR".to_string();

    let changes = build_change_set(&session(), &[only_new], &existing);

    let creates = changes
        .iter()
        .filter(|change| change.change_type == ChangeType::Create)
        .count();
    let deletes = changes
        .iter()
        .filter(|change| change.change_type == ChangeType::Delete)
        .count();
    assert_eq!(creates, 1);
    assert_eq!(deletes, 3);
}

#[test]
fn transmission_only_difference_still_matches_exactly() {
    let existing = inventory();
    let mut manual = extracted_from(&existing[2]);
    manual.transmission = Some(Transmission::Manual);

    let index = InventoryIndex::new(&existing);
    let found = find_best_match(&manual, &index, &HashSet::new()).expect("matched");
    assert_eq!(found.method, MatchMethod::Exact);
    assert_eq!(found.listing.id.0, "lst-bz4x");

    let changes = build_change_set(&session(), &[manual], &existing[2..]);
    assert_eq!(changes.len(), 1);
    let update = &changes[0];
    assert_eq!(update.change_type, ChangeType::Update);
    assert_eq!(update.match_method, MatchMethod::Exact);
    assert_eq!(update.confidence_score, 1.0);
    assert_eq!(
        update.field_diffs[&ListingField::Transmission].new,
        FieldValue::Text("manual".to_string())
    );
}

#[test]
fn updates_carry_only_changed_fields() {
    let existing = inventory();
    let mut vehicle = extracted_from(&existing[0]);
    vehicle.retail_price = Some(239_900);
    vehicle.fuel_type = None;
    vehicle.offers = vec![offer(1_995, 15_000)];

    let changes = build_change_set(&session(), &[vehicle], &existing[..1]);

    assert_eq!(changes.len(), 1);
    let diffs = &changes[0].field_diffs;
    assert_eq!(diffs.len(), 2);
    assert_eq!(diffs[&ListingField::RetailPrice].old, FieldValue::Number(249_900));
    assert_eq!(diffs[&ListingField::RetailPrice].new, FieldValue::Number(239_900));
    assert!(matches!(
        &diffs[&ListingField::Offers].new,
        FieldValue::Offers(offers) if offers.len() == 1
    ));
    assert!(!diffs.contains_key(&ListingField::FuelType));
}

#[test]
fn unmatched_records_become_creates_with_extraction_confidence() {
    let existing = inventory();
    let mut vehicle = extracted_from(&existing[0]);
    vehicle.model = "Aygo".to_string();
    vehicle.variant = "Active".to_string();
    vehicle.confidence = 0.7;

    let changes = build_change_set(&session(), &[vehicle], &[]);

    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].change_type, ChangeType::Create);
    assert_eq!(changes[0].target_listing_id, None);
    assert_eq!(changes[0].confidence_score, 0.7);
    assert_eq!(changes[0].match_method, MatchMethod::None);
    assert_eq!(changes[0].extracted_data.variant, "Active");
}

#[test]
fn first_extracted_record_claims_the_listing() {
    let existing = inventory();
    let first = extracted_from(&existing[0]);
    let second = extracted_from(&existing[0]);

    let changes = build_change_set(&session(), &[first, second], &existing[..1]);

    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].change_type, ChangeType::Create);
}

fn bz4x(id: &str, trim: &str) -> Listing {
    listing(id, "bZ4X", &format!("{trim} 73.1 kWh 224 hk"), 4_295)
}

#[test]
fn exact_names_win_over_earlier_approximate_matches() {
    let existing = vec![bz4x("lst-active", "Active"), bz4x("lst-exec", "Executive")];
    let mut panorama = extracted_from(&existing[1]);
    panorama.variant = "Executive Panorama 73.1 kWh 224 hk".to_string();
    let batch = vec![
        panorama,
        extracted_from(&existing[0]),
        extracted_from(&existing[1]),
    ];

    let changes = build_change_set(&session(), &batch, &existing);

    assert_eq!(changes.len(), 1, "unexpected changes: {changes:?}");
    assert_eq!(changes[0].change_type, ChangeType::Create);
    assert_eq!(
        changes[0].extracted_data.variant,
        "Executive Panorama 73.1 kWh 224 hk"
    );
}

#[test]
fn renamed_trim_still_pairs_with_a_free_listing() {
    let existing = vec![bz4x("lst-active", "Active"), bz4x("lst-exec", "Executive")];
    let mut panorama = extracted_from(&existing[1]);
    panorama.variant = "Executive Panorama 73.1 kWh 224 hk".to_string();
    let batch = vec![panorama, extracted_from(&existing[0])];

    let changes = build_change_set(&session(), &batch, &existing);

    assert_eq!(changes.len(), 1, "unexpected changes: {changes:?}");
    let update = &changes[0];
    assert_eq!(update.change_type, ChangeType::Update);
    assert_eq!(update.match_method, MatchMethod::Composite);
    assert_eq!(update.target_listing_id, Some(ListingId("lst-exec".to_string())));
    assert_eq!(
        update.field_diffs[&ListingField::Variant].new,
        FieldValue::Text("Executive Panorama 73.1 kWh 224 hk".to_string())
    );
}
