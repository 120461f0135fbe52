use serde::{Deserialize, Deserializer};
use std::io::Read;

use super::domain::{Offer, Transmission};
use super::specs::transmission_from_label;
use crate::workflows::normalizer::parse_danish_amount;

/// One CSV line: a listing's columns plus at most one of its offers.
#[derive(Debug)]
pub(crate) struct InventoryRow {
    pub(crate) line: u64,
    pub(crate) listing_id: String,
    pub(crate) make: String,
    pub(crate) model: String,
    pub(crate) variant: String,
    pub(crate) horsepower: Option<u32>,
    pub(crate) transmission: Option<Transmission>,
    pub(crate) fuel_type: Option<String>,
    pub(crate) retail_price: Option<u32>,
    pub(crate) offer: Option<Offer>,
}

#[derive(Debug)]
pub(crate) enum RowError {
    Csv(csv::Error),
    Invalid { line: u64, reason: String },
}

impl From<csv::Error> for RowError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

pub(crate) fn parse_rows<R: Read>(reader: R) -> Result<Vec<InventoryRow>, RowError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers = csv_reader.headers()?.clone();
    let mut rows = Vec::new();

    for record in csv_reader.records() {
        let record = record?;
        let mut row: CsvRow = record.deserialize(Some(&headers))?;
        row.line = record.position().map(|pos| pos.line()).unwrap_or_default();
        rows.push(row.into_inventory_row()?);
    }

    Ok(rows)
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(skip)]
    line: u64,
    listing_id: String,
    make: String,
    model: String,
    variant: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    horsepower: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    transmission: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    fuel_type: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    retail_price: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    monthly_price: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    period_months: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    mileage_per_year: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    first_payment: Option<String>,
}

impl CsvRow {
    fn into_inventory_row(self) -> Result<InventoryRow, RowError> {
        let line = self.line;
        if self.listing_id.is_empty() || self.make.is_empty() || self.model.is_empty() {
            return Err(RowError::Invalid {
                line,
                reason: "listing_id, make and model are required".to_string(),
            });
        }

        let transmission = match self.transmission.as_deref() {
            Some(label) => Some(transmission_from_label(label).ok_or_else(|| {
                RowError::Invalid {
                    line,
                    reason: format!("unknown transmission '{label}'"),
                }
            })?),
            None => None,
        };

        let offer = match self.monthly_price.as_deref() {
            Some(monthly) => Some(Offer {
                monthly_price: amount(line, "monthly_price", monthly)?,
                period_months: required(line, "period_months", self.period_months.as_deref())?,
                mileage_per_year: required(
                    line,
                    "mileage_per_year",
                    self.mileage_per_year.as_deref(),
                )?,
                first_payment: self
                    .first_payment
                    .as_deref()
                    .map(|raw| amount(line, "first_payment", raw))
                    .transpose()?
                    .unwrap_or(0),
            }),
            None => None,
        };

        Ok(InventoryRow {
            line,
            listing_id: self.listing_id,
            make: self.make,
            model: self.model,
            variant: self.variant,
            horsepower: self
                .horsepower
                .as_deref()
                .map(|raw| amount(line, "horsepower", raw))
                .transpose()?,
            transmission,
            fuel_type: self.fuel_type,
            retail_price: self
                .retail_price
                .as_deref()
                .map(|raw| amount(line, "retail_price", raw))
                .transpose()?,
            offer,
        })
    }
}

fn required(line: u64, field: &str, raw: Option<&str>) -> Result<u32, RowError> {
    match raw {
        Some(raw) => amount(line, field, raw),
        None => Err(RowError::Invalid {
            line,
            reason: format!("{field} is required when monthly_price is set"),
        }),
    }
}

fn amount(line: u64, field: &str, raw: &str) -> Result<u32, RowError> {
    parse_danish_amount(raw)
        .filter(|value| *value >= 0.0 && *value <= u32::MAX as f64)
        .map(|value| value.round() as u32)
        .ok_or_else(|| RowError::Invalid {
            line,
            reason: format!("{field} '{raw}' is not a valid amount"),
        })
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}
