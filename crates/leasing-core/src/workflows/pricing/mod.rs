//! Offer selection and lease value scoring.
//!
//! Every caller (batch rescoring, single-listing endpoints, the CLI) goes through this module so
//! the formula and its defaults live in exactly one place.

mod batch;
mod config;
mod score;
mod selector;

pub use batch::{score_inventory, InventoryScoreReport, ListingScoreRow};
pub use config::PricingConfig;
pub use score::{calculate_lease_score, LeaseScore, LeaseScoreInput, UnscoredReason};
pub use selector::{select_best_offer, OfferTarget};

use serde::{Deserialize, Serialize};

use crate::workflows::inventory::{Listing, Offer};

/// Winning offer of a multi-offer reduction together with its breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredOffer {
    pub offer_index: usize,
    pub offer: Offer,
    pub score: LeaseScore,
}

/// Result of scoring every offer of a listing and keeping the best.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingScore {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best: Option<ScoredOffer>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unscored_reason: Option<UnscoredReason>,
}

impl ListingScore {
    pub fn total_score(&self) -> u8 {
        self.best
            .as_ref()
            .map(|scored| scored.score.total_score)
            .unwrap_or(0)
    }
}

/// Score each offer and keep the highest total.
///
/// Equal totals keep the first offer encountered, so the result follows the caller's offer order.
pub fn score_listing(
    retail_price: Option<u32>,
    offers: &[Offer],
    config: &PricingConfig,
) -> ListingScore {
    let Some(retail_price) = retail_price else {
        return ListingScore {
            best: None,
            unscored_reason: Some(UnscoredReason::MissingRetailPrice),
        };
    };

    let mut best: Option<ScoredOffer> = None;
    let mut last_reason = UnscoredReason::NoPricedOffers;

    for (offer_index, offer) in offers.iter().enumerate() {
        let score = calculate_lease_score(
            &LeaseScoreInput {
                retail_price,
                monthly_price: offer.monthly_price,
                mileage_per_year: offer.mileage_per_year,
                first_payment: offer.first_payment,
                contract_months: offer.period_months,
            },
            config,
        );

        if let Some(reason) = score.unscored_reason {
            last_reason = reason;
            continue;
        }

        let improves = best
            .as_ref()
            .map(|current| score.total_score > current.score.total_score)
            .unwrap_or(true);
        if improves {
            best = Some(ScoredOffer {
                offer_index,
                offer: *offer,
                score,
            });
        }
    }

    match best {
        Some(best) => ListingScore {
            best: Some(best),
            unscored_reason: None,
        },
        None => ListingScore {
            best: None,
            unscored_reason: Some(last_reason),
        },
    }
}

impl Listing {
    pub fn lease_score(&self, config: &PricingConfig) -> ListingScore {
        score_listing(self.retail_price, &self.offers, config)
    }

    pub fn display_offer(&self, config: &PricingConfig) -> Option<&Offer> {
        select_best_offer(&self.offers, &OfferTarget::from_config(config), false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::inventory::{DealerId, ListingId};

    fn offer(monthly_price: u32, mileage_per_year: u32, first_payment: u32) -> Offer {
        Offer {
            monthly_price,
            period_months: 36,
            mileage_per_year,
            first_payment,
        }
    }

    #[test]
    fn keeps_the_highest_scoring_offer() {
        let offers = [
            offer(2_900, 15_000, 0),
            offer(2_550, 25_000, 0),
            offer(2_550, 10_000, 0),
        ];
        let result = score_listing(Some(300_000), &offers, &PricingConfig::default());
        let total = result.total_score();
        let best = result.best.expect("scored");
        assert_eq!(best.offer_index, 1);
        assert_eq!(best.offer.mileage_per_year, 25_000);
        assert_eq!(total, best.score.total_score);
    }

    #[test]
    fn equal_totals_keep_the_first_offer() {
        let offers = [offer(2_550, 15_000, 0), offer(2_550, 15_000, 0)];
        let result = score_listing(Some(300_000), &offers, &PricingConfig::default());
        assert_eq!(result.best.expect("scored").offer_index, 0);
    }

    #[test]
    fn unscorable_offers_are_skipped() {
        let offers = [offer(0, 15_000, 0), offer(3_000, 15_000, 0)];
        let result = score_listing(Some(300_000), &offers, &PricingConfig::default());
        assert_eq!(result.best.expect("scored").offer_index, 1);
    }

    #[test]
    fn missing_retail_price_is_reported() {
        let result = score_listing(None, &[offer(2_000, 15_000, 0)], &PricingConfig::default());
        assert!(result.best.is_none());
        assert_eq!(result.unscored_reason, Some(UnscoredReason::MissingRetailPrice));
        assert_eq!(result.total_score(), 0);

        let empty = score_listing(Some(300_000), &[], &PricingConfig::default());
        assert_eq!(empty.unscored_reason, Some(UnscoredReason::NoPricedOffers));
    }

    #[test]
    fn listing_helpers_use_configured_targets() {
        let listing = Listing {
            id: ListingId("lst-1".to_string()),
            dealer_id: DealerId("dealer-1".to_string()),
            make: "Toyota".to_string(),
            model: "Aygo X".to_string(),
            variant: "Active".to_string(),
            horsepower: Some(72),
            transmission: None,
            fuel_type: None,
            retail_price: Some(189_900),
            offers: vec![offer(2_195, 15_000, 4_995), offer(2_395, 20_000, 4_995)],
        };
        let config = PricingConfig::default();

        let shown = listing.display_offer(&config).expect("offer shown");
        assert_eq!(shown.mileage_per_year, 15_000);
        assert!(listing.lease_score(&config).best.is_some());
    }
}
