use serde::{Deserialize, Serialize};

use super::config::PricingConfig;
use crate::workflows::inventory::Offer;

/// Contract lengths tried, in order, after the caller's preferred term.
const TERM_FALLBACK: [u32; 3] = [36, 24, 48];

/// Configuration the selector aims for when picking one offer to display or score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferTarget {
    pub mileage: u32,
    pub deposit: u32,
    pub term: Option<u32>,
}

impl OfferTarget {
    pub fn from_config(config: &PricingConfig) -> Self {
        Self {
            mileage: config.default_mileage,
            deposit: config.default_deposit,
            term: config.default_term,
        }
    }
}

/// Pick the single offer closest to `target`.
///
/// Mileage is narrowed first (exact match, or the closest mileage with ties going to the lower
/// allowance; `strict` only accepts exact matches), then term (`target.term`, 36, 24, 48), then
/// the smallest distance between first payment and target deposit with the lower monthly price
/// breaking ties. Unpriced offers never take part.
pub fn select_best_offer<'a>(
    offers: &'a [Offer],
    target: &OfferTarget,
    strict: bool,
) -> Option<&'a Offer> {
    let priced: Vec<&Offer> = offers.iter().filter(|offer| offer.is_priced()).collect();
    if priced.is_empty() {
        return None;
    }

    let by_mileage = narrow_by_mileage(&priced, target.mileage, strict)?;
    let by_term = match narrow_by_term(&by_mileage, target.term) {
        Some(candidates) => candidates,
        None if strict => return None,
        None => by_mileage,
    };

    by_term.into_iter().min_by(|a, b| {
        deposit_distance(a, target.deposit)
            .cmp(&deposit_distance(b, target.deposit))
            .then(a.monthly_price.cmp(&b.monthly_price))
    })
}

fn narrow_by_mileage<'a>(
    offers: &[&'a Offer],
    mileage: u32,
    strict: bool,
) -> Option<Vec<&'a Offer>> {
    let exact: Vec<&Offer> = offers
        .iter()
        .copied()
        .filter(|offer| offer.mileage_per_year == mileage)
        .collect();
    if !exact.is_empty() {
        return Some(exact);
    }
    if strict {
        return None;
    }

    let closest = offers
        .iter()
        .map(|offer| offer.mileage_per_year)
        .min_by_key(|candidate| (candidate.abs_diff(mileage), *candidate))?;

    Some(
        offers
            .iter()
            .copied()
            .filter(|offer| offer.mileage_per_year == closest)
            .collect(),
    )
}

fn narrow_by_term<'a>(offers: &[&'a Offer], preferred: Option<u32>) -> Option<Vec<&'a Offer>> {
    preferred
        .into_iter()
        .chain(TERM_FALLBACK)
        .map(|term| {
            offers
                .iter()
                .copied()
                .filter(|offer| offer.period_months == term)
                .collect::<Vec<_>>()
        })
        .find(|candidates| !candidates.is_empty())
}

fn deposit_distance(offer: &Offer, deposit: u32) -> u32 {
    offer.first_payment.abs_diff(deposit)
}
