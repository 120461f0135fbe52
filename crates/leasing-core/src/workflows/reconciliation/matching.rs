use std::collections::{HashMap, HashSet};

use strsim::normalized_levenshtein;

use super::domain::{ExtractedVehicle, MatchMethod};
use crate::workflows::inventory::{Listing, ListingId, Transmission, VariantSpecs};
use crate::workflows::normalizer::normalize_text;

pub const EXACT_CONFIDENCE: f32 = 1.0;
pub const COMPOSITE_CONFIDENCE: f32 = 0.95;
/// Fuzzy pairs below this similarity stay unmatched.
pub const FUZZY_THRESHOLD: f32 = 0.8;

const VARIANT_WEIGHT: f32 = 0.60;
const HORSEPOWER_WEIGHT: f32 = 0.25;
const DRIVETRAIN_WEIGHT: f32 = 0.15;

/// A pairing of an extracted record with an existing listing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ListingMatch<'a> {
    pub listing: &'a Listing,
    pub confidence: f32,
    pub method: MatchMethod,
}

/// Lookup tables over one dealer's inventory, built once per comparison.
#[derive(Debug)]
pub struct InventoryIndex<'a> {
    listings: &'a [Listing],
    exact: HashMap<String, Vec<usize>>,
    composite: HashMap<String, Vec<usize>>,
    by_model: HashMap<String, Vec<usize>>,
}

impl<'a> InventoryIndex<'a> {
    pub fn new(listings: &'a [Listing]) -> Self {
        let mut exact: HashMap<String, Vec<usize>> = HashMap::new();
        let mut composite: HashMap<String, Vec<usize>> = HashMap::new();
        let mut by_model: HashMap<String, Vec<usize>> = HashMap::new();

        for (position, listing) in listings.iter().enumerate() {
            exact
                .entry(identity_key(&listing.make, &listing.model, &listing.variant))
                .or_default()
                .push(position);
            if let Some(key) = composite_key(
                &listing.make,
                &listing.model,
                listing.effective_horsepower(),
                listing.all_wheel_drive(),
                listing_transmission(listing),
            ) {
                composite.entry(key).or_default().push(position);
            }
            by_model
                .entry(model_key(&listing.make, &listing.model))
                .or_default()
                .push(position);
        }

        Self {
            listings,
            exact,
            composite,
            by_model,
        }
    }

    pub fn listings(&self) -> &'a [Listing] {
        self.listings
    }

    fn candidates<'s>(
        &'s self,
        table: &'s HashMap<String, Vec<usize>>,
        key: &str,
        claimed: &'s HashSet<ListingId>,
    ) -> impl Iterator<Item = &'a Listing> + 's {
        let listings = self.listings;
        table
            .get(key)
            .into_iter()
            .flatten()
            .map(move |&position| &listings[position])
            .filter(move |listing| !claimed.contains(&listing.id))
    }
}

/// Find the best unclaimed listing for `extracted`.
///
/// Tiers run in order and the first hit wins: exact make/model/variant, then the technical
/// composite of make/model/horsepower/drivetrain/transmission, then fuzzy variant similarity
/// within the same make and model. Listings in `claimed` are never returned, so the first
/// extracted record to reach a listing keeps it.
pub fn find_best_match<'a>(
    extracted: &ExtractedVehicle,
    index: &InventoryIndex<'a>,
    claimed: &HashSet<ListingId>,
) -> Option<ListingMatch<'a>> {
    find_exact_match(extracted, index, claimed)
        .or_else(|| find_approximate_match(extracted, index, claimed))
}

/// Exact make/model/variant tier, preferring a listing with the same gearbox.
pub fn find_exact_match<'a>(
    extracted: &ExtractedVehicle,
    index: &InventoryIndex<'a>,
    claimed: &HashSet<ListingId>,
) -> Option<ListingMatch<'a>> {
    let transmission = extracted.effective_transmission();
    let key = identity_key(&extracted.make, &extracted.model, &extracted.variant);
    let exact: Vec<&Listing> = index.candidates(&index.exact, &key, claimed).collect();
    exact
        .iter()
        .copied()
        .find(|listing| transmission.is_some() && listing_transmission(listing) == transmission)
        .or_else(|| exact.first().copied())
        .map(|listing| ListingMatch {
            listing,
            confidence: EXACT_CONFIDENCE,
            method: MatchMethod::Exact,
        })
}

/// Composite tier, then fuzzy similarity at or above [`FUZZY_THRESHOLD`].
pub fn find_approximate_match<'a>(
    extracted: &ExtractedVehicle,
    index: &InventoryIndex<'a>,
    claimed: &HashSet<ListingId>,
) -> Option<ListingMatch<'a>> {
    if let Some(key) = composite_key(
        &extracted.make,
        &extracted.model,
        extracted.effective_horsepower(),
        extracted.specs().all_wheel_drive,
        extracted.effective_transmission(),
    ) {
        if let Some(listing) = index.candidates(&index.composite, &key, claimed).next() {
            return Some(ListingMatch {
                listing,
                confidence: COMPOSITE_CONFIDENCE,
                method: MatchMethod::Composite,
            });
        }
    }

    let key = model_key(&extracted.make, &extracted.model);
    let mut best: Option<ListingMatch<'a>> = None;
    for listing in index.candidates(&index.by_model, &key, claimed) {
        let score = similarity(extracted, listing);
        if score < FUZZY_THRESHOLD {
            continue;
        }
        if best.map(|current| score > current.confidence).unwrap_or(true) {
            best = Some(ListingMatch {
                listing,
                confidence: score,
                method: MatchMethod::Algorithmic,
            });
        }
    }
    best
}

/// Weighted similarity in `0.0..=1.0` between an extracted record and a listing.
pub fn similarity(extracted: &ExtractedVehicle, listing: &Listing) -> f32 {
    let variant = variant_similarity(&extracted.variant, &listing.variant);

    let horsepower = match (extracted.effective_horsepower(), listing.effective_horsepower()) {
        (Some(left), Some(right)) if left == right => 1.0,
        (Some(_), Some(_)) => 0.0,
        _ => 0.5,
    };
    let drivetrain = if extracted.specs().all_wheel_drive == listing.all_wheel_drive() {
        1.0
    } else {
        0.0
    };

    VARIANT_WEIGHT * variant + HORSEPOWER_WEIGHT * horsepower + DRIVETRAIN_WEIGHT * drivetrain
}

/// Normalized Levenshtein similarity of two variant strings.
pub fn variant_similarity(left: &str, right: &str) -> f32 {
    normalized_levenshtein(&normalize_text(left), &normalize_text(right)) as f32
}

pub(crate) fn identity_key(make: &str, model: &str, variant: &str) -> String {
    format!(
        "{}|{}|{}",
        normalize_text(make),
        normalize_text(model),
        normalize_text(variant)
    )
}

fn model_key(make: &str, model: &str) -> String {
    format!("{}|{}", normalize_text(make), normalize_text(model))
}

/// `None` when horsepower is unknown; a composite key without power pairs too loosely.
fn composite_key(
    make: &str,
    model: &str,
    horsepower: Option<u32>,
    all_wheel_drive: bool,
    transmission: Option<Transmission>,
) -> Option<String> {
    let horsepower = horsepower?;
    let drivetrain = if all_wheel_drive { "awd" } else { "2wd" };
    let transmission = transmission.map(Transmission::label).unwrap_or("unknown");
    Some(format!(
        "{}|{horsepower}|{drivetrain}|{transmission}",
        model_key(make, model)
    ))
}

fn listing_transmission(listing: &Listing) -> Option<Transmission> {
    listing
        .transmission
        .or_else(|| VariantSpecs::parse(&listing.variant).transmission)
}
