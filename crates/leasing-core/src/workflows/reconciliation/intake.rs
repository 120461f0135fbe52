use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::domain::{ExtractedVehicle, VariantSource};
use crate::workflows::inventory::specs::transmission_from_label;
use crate::workflows::inventory::{Offer, Transmission, VariantSpecs};
use crate::workflows::normalizer::{normalize_text, parse_danish_amount};
use crate::workflows::pricing::PricingConfig;

const DEFAULT_PERIOD_MONTHS: u32 = 36;
const DEFAULT_CONFIDENCE: f32 = 1.0;

/// Amount as emitted by the extraction model: a JSON number or Danish-formatted text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawAmount {
    Number(f64),
    Text(String),
}

impl RawAmount {
    fn value(&self) -> Option<f64> {
        match self {
            RawAmount::Number(value) => Some(*value).filter(|value| value.is_finite()),
            RawAmount::Text(text) => parse_danish_amount(text),
        }
    }

    fn raw(&self) -> String {
        match self {
            RawAmount::Number(value) => value.to_string(),
            RawAmount::Text(text) => text.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawOffer {
    #[serde(default, alias = "monthly_payment")]
    pub monthly_price: Option<RawAmount>,
    #[serde(default, alias = "lease_period_months")]
    pub period_months: Option<RawAmount>,
    #[serde(default, alias = "annual_kilometers")]
    pub mileage_per_year: Option<RawAmount>,
    #[serde(default, alias = "deposit")]
    pub first_payment: Option<RawAmount>,
}

impl RawOffer {
    fn is_empty(&self) -> bool {
        self.monthly_price.is_none()
            && self.period_months.is_none()
            && self.mileage_per_year.is_none()
            && self.first_payment.is_none()
    }
}

/// Unvalidated record from the AI extraction step.
///
/// Single-offer records may put the offer fields at the top level instead of `offers`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawExtractedVehicle {
    #[serde(default)]
    pub make: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub variant: Option<String>,
    #[serde(default, alias = "hp")]
    pub horsepower: Option<RawAmount>,
    #[serde(default, alias = "transmission_type")]
    pub transmission: Option<String>,
    #[serde(default)]
    pub fuel_type: Option<String>,
    #[serde(default, alias = "price")]
    pub retail_price: Option<RawAmount>,
    #[serde(default)]
    pub offers: Vec<RawOffer>,
    #[serde(flatten)]
    pub offer: RawOffer,
    #[serde(default)]
    pub variant_source: Option<String>,
    #[serde(default)]
    pub confidence: Option<f32>,
}

/// Reasons a raw record never reaches the comparator.
#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IntakeViolation {
    #[error("missing required field `{field}`")]
    MissingField { field: &'static str },
    #[error("record carries no offers")]
    MissingOffers,
    #[error("field `{field}` has unreadable amount {raw:?}")]
    InvalidAmount { field: String, raw: String },
    #[error("offer {offer} has no positive monthly price")]
    NonPositiveMonthlyPrice { offer: usize },
    #[error("offer {offer} has no positive contract length")]
    NonPositiveContractLength { offer: usize },
    #[error("unknown transmission {label:?}")]
    UnknownTransmission { label: String },
    #[error("unknown variant source {label:?}")]
    UnknownVariantSource { label: String },
    #[error("duplicate of record {of}")]
    Duplicate { of: usize },
    #[error("malformed record: {message}")]
    Malformed { message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RejectedRecord {
    /// Position of the record in the submitted batch.
    pub index: usize,
    pub reason: IntakeViolation,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IntakeReport {
    pub accepted: Vec<ExtractedVehicle>,
    pub rejected: Vec<RejectedRecord>,
}

/// One element of a submitted batch. JSON elements decode individually, so a record with the
/// wrong shape is rejected on its own instead of failing the whole upload.
pub trait IntakeRecord {
    fn decode(self) -> Result<RawExtractedVehicle, IntakeViolation>;
}

impl IntakeRecord for RawExtractedVehicle {
    fn decode(self) -> Result<RawExtractedVehicle, IntakeViolation> {
        Ok(self)
    }
}

impl IntakeRecord for serde_json::Value {
    fn decode(self) -> Result<RawExtractedVehicle, IntakeViolation> {
        serde_json::from_value(self).map_err(|err| IntakeViolation::Malformed {
            message: err.to_string(),
        })
    }
}

/// Validates extraction output into `ExtractedVehicle` values.
#[derive(Debug, Clone)]
pub struct ExtractionIntake {
    default_mileage: u32,
}

impl Default for ExtractionIntake {
    fn default() -> Self {
        Self::from_config(&PricingConfig::default())
    }
}

impl ExtractionIntake {
    pub fn from_config(config: &PricingConfig) -> Self {
        Self {
            default_mileage: config.default_mileage,
        }
    }

    /// Validate a whole batch. Bad records are reported with their index; good ones pass on.
    ///
    /// Records describing the same variant twice (same make, model, variant text, transmission,
    /// horsepower and drivetrain) keep only the first occurrence.
    pub fn validate_batch<R: IntakeRecord>(&self, batch: Vec<R>) -> IntakeReport {
        let mut report = IntakeReport::default();
        let mut seen: HashMap<String, usize> = HashMap::new();

        for (index, record) in batch.into_iter().enumerate() {
            let vehicle = match record.decode().and_then(|raw| self.validate(raw)) {
                Ok(vehicle) => vehicle,
                Err(reason) => {
                    debug!(index, %reason, "extraction record rejected");
                    report.rejected.push(RejectedRecord {
                        index,
                        message: reason.to_string(),
                        reason,
                    });
                    continue;
                }
            };

            let signature = variant_signature(&vehicle);
            if let Some(&of) = seen.get(&signature) {
                let reason = IntakeViolation::Duplicate { of };
                report.rejected.push(RejectedRecord {
                    index,
                    message: reason.to_string(),
                    reason,
                });
                continue;
            }
            seen.insert(signature, index);
            report.accepted.push(vehicle);
        }

        report
    }

    pub fn validate(&self, raw: RawExtractedVehicle) -> Result<ExtractedVehicle, IntakeViolation> {
        let make = required_text(raw.make, "make")?;
        let model = required_text(raw.model, "model")?;
        let variant = required_text(raw.variant, "variant")?;

        let specs = VariantSpecs::parse(&variant);
        let transmission = match optional_text(raw.transmission) {
            Some(label) => Some(
                transmission_from_label(&label)
                    .ok_or(IntakeViolation::UnknownTransmission { label })?,
            ),
            None => specs.transmission,
        };
        let horsepower = match raw.horsepower {
            Some(amount) => Some(whole_amount(&amount, "horsepower")?),
            None => specs.horsepower,
        };
        let retail_price = raw
            .retail_price
            .map(|amount| whole_amount(&amount, "retail_price"))
            .transpose()?;

        let mut raw_offers = raw.offers;
        if raw_offers.is_empty() && !raw.offer.is_empty() {
            raw_offers.push(raw.offer);
        }
        if raw_offers.is_empty() {
            return Err(IntakeViolation::MissingOffers);
        }
        let offers = raw_offers
            .iter()
            .enumerate()
            .map(|(position, offer)| self.offer(position, offer))
            .collect::<Result<Vec<_>, _>>()?;

        let variant_source = match optional_text(raw.variant_source) {
            Some(label) => variant_source_from_label(&label)
                .ok_or(IntakeViolation::UnknownVariantSource { label })?,
            None => VariantSource::Inferred,
        };
        let confidence = raw
            .confidence
            .filter(|value| value.is_finite())
            .map(|value| value.clamp(0.0, 1.0))
            .unwrap_or(DEFAULT_CONFIDENCE);

        Ok(ExtractedVehicle {
            make,
            model,
            variant,
            horsepower,
            transmission,
            fuel_type: optional_text(raw.fuel_type),
            retail_price,
            offers,
            variant_source,
            confidence,
        })
    }

    fn offer(&self, position: usize, raw: &RawOffer) -> Result<Offer, IntakeViolation> {
        let field = |name: &str| format!("offers[{position}].{name}");

        let monthly_price = match &raw.monthly_price {
            Some(amount) => whole_amount(amount, &field("monthly_price"))?,
            None => 0,
        };
        if monthly_price == 0 {
            return Err(IntakeViolation::NonPositiveMonthlyPrice { offer: position });
        }

        let period_months = match &raw.period_months {
            Some(amount) => whole_amount(amount, &field("period_months"))?,
            None => DEFAULT_PERIOD_MONTHS,
        };
        if period_months == 0 {
            return Err(IntakeViolation::NonPositiveContractLength { offer: position });
        }

        let mileage_per_year = match &raw.mileage_per_year {
            Some(amount) => whole_amount(amount, &field("mileage_per_year"))?,
            None => self.default_mileage,
        };
        let first_payment = match &raw.first_payment {
            Some(amount) => whole_amount(amount, &field("first_payment"))?,
            None => 0,
        };

        Ok(Offer {
            monthly_price,
            period_months,
            mileage_per_year,
            first_payment,
        })
    }
}

fn required_text(value: Option<String>, field: &'static str) -> Result<String, IntakeViolation> {
    optional_text(value).ok_or(IntakeViolation::MissingField { field })
}

fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|text| !text.is_empty())
}

fn whole_amount(amount: &RawAmount, field: &str) -> Result<u32, IntakeViolation> {
    amount
        .value()
        .filter(|value| *value >= 0.0 && *value <= f64::from(u32::MAX))
        .map(|value| value.round() as u32)
        .ok_or_else(|| IntakeViolation::InvalidAmount {
            field: field.to_string(),
            raw: amount.raw(),
        })
}

fn variant_source_from_label(label: &str) -> Option<VariantSource> {
    match normalize_text(label).replace(['-', ' '], "_").as_str() {
        "existing" => Some(VariantSource::Existing),
        "reference_matched" | "reference" => Some(VariantSource::ReferenceMatched),
        "inferred" => Some(VariantSource::Inferred),
        _ => None,
    }
}

fn variant_signature(vehicle: &ExtractedVehicle) -> String {
    let transmission = vehicle
        .effective_transmission()
        .map(Transmission::label)
        .unwrap_or("?");
    let horsepower = vehicle
        .effective_horsepower()
        .map(|hp| hp.to_string())
        .unwrap_or_default();
    format!(
        "{}|{}|{}|{}|{}|{}",
        normalize_text(&vehicle.make),
        normalize_text(&vehicle.model),
        normalize_text(&vehicle.variant),
        transmission,
        horsepower,
        vehicle.specs().all_wheel_drive,
    )
}
