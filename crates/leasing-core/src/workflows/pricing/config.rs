use serde::{Deserialize, Serialize};

/// Business defaults shared by every caller of the selector and score calculator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingConfig {
    pub default_mileage: u32,
    pub default_deposit: u32,
    pub default_term: Option<u32>,
    /// Effective monthly cost (% of retail) that earns a full monthly-rate score.
    pub best_anchor_percent: f64,
    /// Effective monthly cost (% of retail) at or above which the monthly-rate score is zero.
    pub worst_anchor_percent: f64,
    pub min_retail_price: u32,
    pub max_retail_price: u32,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            default_mileage: 15_000,
            default_deposit: 35_000,
            default_term: None,
            best_anchor_percent: 0.85,
            worst_anchor_percent: 2.25,
            min_retail_price: 75_000,
            max_retail_price: 2_500_000,
        }
    }
}
