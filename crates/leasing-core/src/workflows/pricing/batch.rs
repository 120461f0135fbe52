use serde::Serialize;
use tracing::{debug, info};

use super::config::PricingConfig;
use super::{score_listing, ListingScore};
use crate::workflows::inventory::{Listing, ListingId};

#[derive(Debug, Clone, Serialize)]
pub struct ListingScoreRow {
    pub listing_id: ListingId,
    pub score: ListingScore,
}

/// Outcome of rescoring an inventory snapshot. Bad listings are counted, never fatal.
#[derive(Debug, Clone, Serialize)]
pub struct InventoryScoreReport {
    pub rows: Vec<ListingScoreRow>,
    pub scored: usize,
    pub unscored: usize,
}

pub fn score_inventory(listings: &[Listing], config: &PricingConfig) -> InventoryScoreReport {
    let mut rows = Vec::with_capacity(listings.len());
    let mut unscored = 0;

    for listing in listings {
        let score = score_listing(listing.retail_price, &listing.offers, config);
        if let Some(reason) = score.unscored_reason {
            unscored += 1;
            debug!(listing_id = %listing.id.0, reason = reason.code(), "listing left unscored");
        }
        rows.push(ListingScoreRow {
            listing_id: listing.id.clone(),
            score,
        });
    }

    let scored = rows.len() - unscored;
    info!(scored, unscored, "inventory scoring finished");

    InventoryScoreReport {
        rows,
        scored,
        unscored,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::inventory::{DealerId, Offer};
    use crate::workflows::pricing::UnscoredReason;

    fn listing(id: &str, retail_price: Option<u32>, monthly_price: u32) -> Listing {
        Listing {
            id: ListingId(id.to_string()),
            dealer_id: DealerId("dealer-1".to_string()),
            make: "Toyota".to_string(),
            model: "Yaris Cross".to_string(),
            variant: "Style 1.5 Hybrid 116 hk".to_string(),
            horsepower: None,
            transmission: None,
            fuel_type: Some("Hybrid".to_string()),
            retail_price,
            offers: vec![Offer {
                monthly_price,
                period_months: 36,
                mileage_per_year: 15_000,
                first_payment: 0,
            }],
        }
    }

    #[test]
    fn continues_past_unscorable_listings() {
        let listings = [
            listing("a", None, 2_999),
            listing("b", Some(289_900), 2_999),
            listing("c", Some(10_000), 2_999),
        ];

        let report = score_inventory(&listings, &PricingConfig::default());

        assert_eq!(report.rows.len(), 3);
        assert_eq!(report.scored, 1);
        assert_eq!(report.unscored, 2);
        assert_eq!(
            report.rows[0].score.unscored_reason,
            Some(UnscoredReason::MissingRetailPrice)
        );
        assert!(report.rows[1].score.best.is_some());
        assert_eq!(
            report.rows[2].score.unscored_reason,
            Some(UnscoredReason::RetailPriceOutOfBounds)
        );
    }
}
