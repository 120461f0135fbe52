use serde::{Deserialize, Serialize};

use super::specs::VariantSpecs;

/// Identifier wrapper for persisted listings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ListingId(pub String);

/// Identifier wrapper for the dealer owning an inventory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DealerId(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transmission {
    Manual,
    Automatic,
}

impl Transmission {
    pub const fn label(self) -> &'static str {
        match self {
            Transmission::Manual => "manual",
            Transmission::Automatic => "automatic",
        }
    }
}

/// One lease configuration for a listing. Amounts are whole DKK.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Offer {
    pub monthly_price: u32,
    pub period_months: u32,
    pub mileage_per_year: u32,
    pub first_payment: u32,
}

impl Offer {
    /// Offers without a monthly price or contract length can be neither selected nor scored.
    pub fn is_priced(&self) -> bool {
        self.monthly_price > 0 && self.period_months > 0
    }
}

/// A dealer's leasable vehicle with its owned offer collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub id: ListingId,
    pub dealer_id: DealerId,
    pub make: String,
    pub model: String,
    pub variant: String,
    pub horsepower: Option<u32>,
    pub transmission: Option<Transmission>,
    pub fuel_type: Option<String>,
    pub retail_price: Option<u32>,
    #[serde(default)]
    pub offers: Vec<Offer>,
}

impl Listing {
    /// Drivetrain is never stored; it is read off the variant text.
    pub fn all_wheel_drive(&self) -> bool {
        VariantSpecs::parse(&self.variant).all_wheel_drive
    }

    /// Horsepower from the dedicated column, falling back to the variant text.
    pub fn effective_horsepower(&self) -> Option<u32> {
        self.horsepower
            .or_else(|| VariantSpecs::parse(&self.variant).horsepower)
    }
}
