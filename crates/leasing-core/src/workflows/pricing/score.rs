use serde::{Deserialize, Serialize};

use super::config::PricingConfig;

const MONTHLY_RATE_WEIGHT: f64 = 0.45;
const MILEAGE_WEIGHT: f64 = 0.35;
const UPFRONT_WEIGHT: f64 = 0.20;

/// Share of the blended cost taken from the 12-month horizon; the rest is the full term.
const SHORT_HORIZON_SHARE: f64 = 0.70;
const SHORT_HORIZON_MONTHS: f64 = 12.0;

/// Inputs for one offer. Amounts are whole DKK.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LeaseScoreInput {
    pub retail_price: u32,
    pub monthly_price: u32,
    pub mileage_per_year: u32,
    pub first_payment: u32,
    pub contract_months: u32,
}

/// Machine-readable reason an offer could not be scored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnscoredReason {
    MissingRetailPrice,
    RetailPriceOutOfBounds,
    NonPositiveMonthlyPrice,
    InvalidContractLength,
    NoPricedOffers,
}

impl UnscoredReason {
    pub const fn code(self) -> &'static str {
        match self {
            UnscoredReason::MissingRetailPrice => "missing_retail_price",
            UnscoredReason::RetailPriceOutOfBounds => "retail_price_out_of_bounds",
            UnscoredReason::NonPositiveMonthlyPrice => "non_positive_monthly_price",
            UnscoredReason::InvalidContractLength => "invalid_contract_length",
            UnscoredReason::NoPricedOffers => "no_priced_offers",
        }
    }
}

/// Score breakdown for one offer. An unscored result has every score at zero and a reason.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LeaseScore {
    pub total_score: u8,
    pub monthly_rate_score: u8,
    pub mileage_score: u8,
    pub upfront_score: u8,
    /// Effective monthly load: 70/30 blend of the two horizons below, as % of retail.
    pub effective_monthly_percent: f64,
    pub twelve_month_percent: f64,
    pub full_term_percent: f64,
    pub upfront_percent: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unscored_reason: Option<UnscoredReason>,
}

impl LeaseScore {
    pub fn unscored(reason: UnscoredReason) -> Self {
        Self {
            total_score: 0,
            monthly_rate_score: 0,
            mileage_score: 0,
            upfront_score: 0,
            effective_monthly_percent: 0.0,
            twelve_month_percent: 0.0,
            full_term_percent: 0.0,
            upfront_percent: 0.0,
            unscored_reason: Some(reason),
        }
    }

    pub fn is_scored(&self) -> bool {
        self.unscored_reason.is_none()
    }
}

/// Compute the 0–100 value score for one offer.
pub fn calculate_lease_score(input: &LeaseScoreInput, config: &PricingConfig) -> LeaseScore {
    if input.retail_price == 0 {
        return LeaseScore::unscored(UnscoredReason::MissingRetailPrice);
    }
    if input.monthly_price == 0 {
        return LeaseScore::unscored(UnscoredReason::NonPositiveMonthlyPrice);
    }
    if input.retail_price < config.min_retail_price || input.retail_price > config.max_retail_price
    {
        return LeaseScore::unscored(UnscoredReason::RetailPriceOutOfBounds);
    }
    if input.contract_months == 0 {
        return LeaseScore::unscored(UnscoredReason::InvalidContractLength);
    }

    let retail = f64::from(input.retail_price);
    let monthly = f64::from(input.monthly_price);
    let first_payment = f64::from(input.first_payment);

    let twelve_month_percent = (monthly + first_payment / SHORT_HORIZON_MONTHS) / retail * 100.0;
    let full_term_percent =
        (monthly + first_payment / f64::from(input.contract_months)) / retail * 100.0;
    let effective_monthly_percent = SHORT_HORIZON_SHARE * twelve_month_percent
        + (1.0 - SHORT_HORIZON_SHARE) * full_term_percent;
    let upfront_percent = first_payment / retail * 100.0;

    let monthly_rate = monthly_rate_score(effective_monthly_percent, config);
    let mileage = f64::from(mileage_score(input.mileage_per_year));
    let upfront = f64::from(upfront_score(input.first_payment, upfront_percent));

    let total =
        MONTHLY_RATE_WEIGHT * monthly_rate + MILEAGE_WEIGHT * mileage + UPFRONT_WEIGHT * upfront;

    LeaseScore {
        total_score: to_score(total),
        monthly_rate_score: to_score(monthly_rate),
        mileage_score: to_score(mileage),
        upfront_score: to_score(upfront),
        effective_monthly_percent,
        twelve_month_percent,
        full_term_percent,
        upfront_percent,
        unscored_reason: None,
    }
}

fn monthly_rate_score(effective_percent: f64, config: &PricingConfig) -> f64 {
    let best = config.best_anchor_percent;
    let worst = config.worst_anchor_percent;
    if effective_percent <= best {
        100.0
    } else if effective_percent >= worst {
        0.0
    } else {
        100.0 * (worst - effective_percent) / (worst - best)
    }
}

fn mileage_score(mileage_per_year: u32) -> u8 {
    match mileage_per_year {
        m if m >= 25_000 => 100,
        m if m >= 20_000 => 90,
        m if m >= 15_000 => 75,
        m if m >= 12_000 => 55,
        m if m >= 10_000 => 35,
        _ => 20,
    }
}

fn upfront_score(first_payment: u32, upfront_percent: f64) -> u8 {
    if first_payment == 0 {
        return 100;
    }
    match upfront_percent {
        p if p <= 3.0 => 95,
        p if p <= 5.0 => 90,
        p if p <= 7.0 => 80,
        p if p <= 10.0 => 70,
        p if p <= 15.0 => 55,
        p if p <= 20.0 => 40,
        _ => 25,
    }
}

fn to_score(value: f64) -> u8 {
    value.round().clamp(0.0, 100.0) as u8
}
