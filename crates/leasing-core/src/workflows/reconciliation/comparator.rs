use std::collections::{BTreeMap, HashSet};

use chrono::Utc;
use tracing::{debug, info};

use super::domain::{
    next_change_id, ChangeRecord, ChangeStatus, ChangeType, ExtractedVehicle, FieldDiff,
    FieldValue, ListingField, MatchMethod, SessionId,
};
use super::matching::{find_approximate_match, find_exact_match, InventoryIndex, ListingMatch};
use crate::workflows::inventory::{Listing, ListingId, Offer, Transmission};

/// Turn one extraction batch into the CREATE/UPDATE/DELETE records a reviewer approves.
///
/// Every listing in `existing` that no extracted record claims becomes a DELETE: the batch is
/// taken to be the dealer's complete current inventory. Matches with nothing to change produce
/// no record at all.
///
/// Exact matches are claimed for the whole batch before any composite or fuzzy pairing, so an
/// approximate hit never takes a listing another record names exactly.
pub fn build_change_set(
    session_id: &SessionId,
    extracted: &[ExtractedVehicle],
    existing: &[Listing],
) -> Vec<ChangeRecord> {
    let index = InventoryIndex::new(existing);
    let mut claimed: HashSet<ListingId> = HashSet::new();
    let mut records = Vec::new();
    let mut unchanged = 0usize;

    let mut matches: Vec<Option<ListingMatch<'_>>> = extracted
        .iter()
        .map(|vehicle| {
            let found = find_exact_match(vehicle, &index, &claimed);
            if let Some(found) = &found {
                claimed.insert(found.listing.id.clone());
            }
            found
        })
        .collect();
    for (vehicle, slot) in extracted.iter().zip(matches.iter_mut()) {
        if slot.is_none() {
            *slot = find_approximate_match(vehicle, &index, &claimed);
            if let Some(found) = slot {
                claimed.insert(found.listing.id.clone());
            }
        }
    }

    for (vehicle, found) in extracted.iter().zip(matches) {
        let Some(found) = found else {
            records.push(change_record(
                session_id,
                ChangeType::Create,
                None,
                vehicle.clone(),
                BTreeMap::new(),
                vehicle.confidence,
                MatchMethod::None,
            ));
            continue;
        };

        let diffs = diff_listing(found.listing, vehicle);
        if diffs.is_empty() {
            unchanged += 1;
            continue;
        }

        debug!(
            listing_id = %found.listing.id.0,
            method = ?found.method,
            fields = diffs.len(),
            "staging listing update"
        );
        records.push(change_record(
            session_id,
            ChangeType::Update,
            Some(found.listing.id.clone()),
            vehicle.clone(),
            diffs,
            found.confidence,
            found.method,
        ));
    }

    for listing in index.listings() {
        if claimed.contains(&listing.id) {
            continue;
        }
        records.push(change_record(
            session_id,
            ChangeType::Delete,
            Some(listing.id.clone()),
            ExtractedVehicle::from_listing(listing),
            BTreeMap::new(),
            1.0,
            MatchMethod::None,
        ));
    }

    info!(
        session_id = %session_id.0,
        extracted = extracted.len(),
        existing = existing.len(),
        changes = records.len(),
        unchanged,
        "change set built"
    );
    records
}

/// Field-level differences between a stored listing and an extracted record.
///
/// Optional columns only diff when the extraction supplies a value; a field the document
/// did not mention is left as stored. Offers compare as unordered sets.
pub fn diff_listing(
    existing: &Listing,
    extracted: &ExtractedVehicle,
) -> BTreeMap<ListingField, FieldDiff> {
    let mut diffs = BTreeMap::new();

    if existing.variant != extracted.variant {
        diffs.insert(
            ListingField::Variant,
            FieldDiff {
                old: FieldValue::Text(existing.variant.clone()),
                new: FieldValue::Text(extracted.variant.clone()),
            },
        );
    }

    // Power already implied by the stored variant text is not a change.
    if extracted.horsepower != existing.effective_horsepower() {
        diff_number(
            &mut diffs,
            ListingField::Horsepower,
            existing.horsepower,
            extracted.horsepower,
        );
    }
    diff_number(
        &mut diffs,
        ListingField::RetailPrice,
        existing.retail_price,
        extracted.retail_price,
    );

    if let Some(new) = extracted.transmission {
        if existing.transmission != Some(new) {
            diffs.insert(
                ListingField::Transmission,
                FieldDiff {
                    old: text_value(existing.transmission.map(Transmission::label)),
                    new: FieldValue::Text(new.label().to_string()),
                },
            );
        }
    }

    if let Some(new) = &extracted.fuel_type {
        if existing.fuel_type.as_deref() != Some(new.as_str()) {
            diffs.insert(
                ListingField::FuelType,
                FieldDiff {
                    old: text_value(existing.fuel_type.as_deref()),
                    new: FieldValue::Text(new.clone()),
                },
            );
        }
    }

    let old_offers = sorted_offers(&existing.offers);
    let new_offers = sorted_offers(&extracted.offers);
    if old_offers != new_offers {
        diffs.insert(
            ListingField::Offers,
            FieldDiff {
                old: FieldValue::Offers(old_offers),
                new: FieldValue::Offers(new_offers),
            },
        );
    }

    diffs
}

fn diff_number(
    diffs: &mut BTreeMap<ListingField, FieldDiff>,
    field: ListingField,
    old: Option<u32>,
    new: Option<u32>,
) {
    let Some(new) = new else {
        return;
    };
    if old == Some(new) {
        return;
    }
    diffs.insert(
        field,
        FieldDiff {
            old: old.map(FieldValue::Number).unwrap_or(FieldValue::Missing),
            new: FieldValue::Number(new),
        },
    );
}

fn text_value(value: Option<&str>) -> FieldValue {
    value
        .map(|text| FieldValue::Text(text.to_string()))
        .unwrap_or(FieldValue::Missing)
}

fn sorted_offers(offers: &[Offer]) -> Vec<Offer> {
    let mut sorted = offers.to_vec();
    sorted.sort();
    sorted
}

fn change_record(
    session_id: &SessionId,
    change_type: ChangeType,
    target_listing_id: Option<ListingId>,
    extracted_data: ExtractedVehicle,
    field_diffs: BTreeMap<ListingField, FieldDiff>,
    confidence_score: f32,
    match_method: MatchMethod,
) -> ChangeRecord {
    ChangeRecord {
        id: next_change_id(),
        session_id: session_id.clone(),
        change_type,
        target_listing_id,
        extracted_data,
        field_diffs,
        confidence_score,
        match_method,
        status: ChangeStatus::Pending,
        created_at: Utc::now(),
        reviewed_at: None,
        applied_by: None,
        last_error: None,
    }
}
