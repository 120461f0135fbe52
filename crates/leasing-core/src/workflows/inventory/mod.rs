//! Dealer inventory model and the CSV snapshot importer.

pub mod domain;
mod parser;
pub mod specs;

pub use domain::{DealerId, Listing, ListingId, Offer, Transmission};
pub use specs::VariantSpecs;

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use parser::{InventoryRow, RowError};

#[derive(Debug)]
pub enum InventoryImportError {
    Io(std::io::Error),
    Csv(csv::Error),
    InvalidRow { line: u64, reason: String },
    ConflictingRow { line: u64, listing_id: String },
}

impl std::fmt::Display for InventoryImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InventoryImportError::Io(err) => write!(f, "failed to read inventory export: {}", err),
            InventoryImportError::Csv(err) => write!(f, "invalid inventory CSV data: {}", err),
            InventoryImportError::InvalidRow { line, reason } => {
                write!(f, "inventory row on line {}: {}", line, reason)
            }
            InventoryImportError::ConflictingRow { line, listing_id } => write!(
                f,
                "inventory row on line {} disagrees with earlier rows for listing {}",
                line, listing_id
            ),
        }
    }
}

impl std::error::Error for InventoryImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            InventoryImportError::Io(err) => Some(err),
            InventoryImportError::Csv(err) => Some(err),
            InventoryImportError::InvalidRow { .. }
            | InventoryImportError::ConflictingRow { .. } => None,
        }
    }
}

impl From<std::io::Error> for InventoryImportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for InventoryImportError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

impl From<RowError> for InventoryImportError {
    fn from(err: RowError) -> Self {
        match err {
            RowError::Csv(err) => Self::Csv(err),
            RowError::Invalid { line, reason } => Self::InvalidRow { line, reason },
        }
    }
}

/// Loads a dealer inventory snapshot from a CSV export with one row per offer.
pub struct InventoryCsvImporter;

impl InventoryCsvImporter {
    pub fn from_path<P: AsRef<Path>>(
        path: P,
        dealer_id: &DealerId,
    ) -> Result<Vec<Listing>, InventoryImportError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file, dealer_id)
    }

    pub fn from_reader<R: Read>(
        reader: R,
        dealer_id: &DealerId,
    ) -> Result<Vec<Listing>, InventoryImportError> {
        let mut listings: Vec<Listing> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();

        for row in parser::parse_rows(reader)? {
            match positions.get(&row.listing_id) {
                Some(&index) => merge_row(&mut listings[index], row)?,
                None => {
                    positions.insert(row.listing_id.clone(), listings.len());
                    listings.push(listing_from_row(row, dealer_id));
                }
            }
        }

        Ok(listings)
    }
}

fn listing_from_row(row: InventoryRow, dealer_id: &DealerId) -> Listing {
    Listing {
        id: ListingId(row.listing_id),
        dealer_id: dealer_id.clone(),
        make: row.make,
        model: row.model,
        variant: row.variant,
        horsepower: row.horsepower,
        transmission: row.transmission,
        fuel_type: row.fuel_type,
        retail_price: row.retail_price,
        offers: row.offer.into_iter().collect(),
    }
}

fn merge_row(listing: &mut Listing, row: InventoryRow) -> Result<(), InventoryImportError> {
    if listing.make != row.make || listing.model != row.model || listing.variant != row.variant {
        return Err(InventoryImportError::ConflictingRow {
            line: row.line,
            listing_id: row.listing_id,
        });
    }

    if let Some(offer) = row.offer {
        if !listing.offers.contains(&offer) {
            listing.offers.push(offer);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const HEADER: &str = "listing_id,make,model,variant,horsepower,transmission,fuel_type,retail_price,monthly_price,period_months,mileage_per_year,first_payment\n";

    fn dealer() -> DealerId {
        DealerId("dealer-1".to_string())
    }

    #[test]
    fn groups_offer_rows_by_listing() {
        let csv = format!(
            "{HEADER}\
lst-1,Toyota,Aygo X,Active,72,manuel,Benzin,189.900,2.195,36,15.000,4.995\n\
lst-1,Toyota,Aygo X,Active,72,manuel,Benzin,189.900,2.395,36,20.000,4.995\n\
lst-2,Toyota,bZ4X,Executive 343 hk AWD,343,automatgear,El,459.900,4.299,36,15.000,0\n"
        );

        let listings =
            InventoryCsvImporter::from_reader(Cursor::new(csv), &dealer()).expect("import");

        assert_eq!(listings.len(), 2);
        let aygo = &listings[0];
        assert_eq!(aygo.id, ListingId("lst-1".to_string()));
        assert_eq!(aygo.transmission, Some(Transmission::Manual));
        assert_eq!(aygo.retail_price, Some(189_900));
        assert_eq!(aygo.offers.len(), 2);
        assert_eq!(aygo.offers[1].mileage_per_year, 20_000);
        assert_eq!(aygo.offers[0].first_payment, 4_995);

        let bz4x = &listings[1];
        assert_eq!(bz4x.transmission, Some(Transmission::Automatic));
        assert!(bz4x.all_wheel_drive());
        assert_eq!(bz4x.offers[0].first_payment, 0);
    }

    #[test]
    fn listing_rows_without_price_have_no_offers() {
        let csv = format!("{HEADER}lst-9,Skoda,Enyaq,85 Sportline,,,,,,,,\n");
        let listings =
            InventoryCsvImporter::from_reader(Cursor::new(csv), &dealer()).expect("import");
        assert_eq!(listings.len(), 1);
        assert!(listings[0].offers.is_empty());
        assert_eq!(listings[0].effective_horsepower(), None);
    }

    #[test]
    fn rejects_offer_rows_missing_term() {
        let csv = format!("{HEADER}lst-1,Toyota,Aygo X,Active,,,,,2195,,15000,0\n");
        let err = InventoryCsvImporter::from_reader(Cursor::new(csv), &dealer())
            .expect_err("term missing");
        match err {
            InventoryImportError::InvalidRow { line, reason } => {
                assert_eq!(line, 2);
                assert!(reason.contains("period_months"));
            }
            other => panic!("expected invalid row, got {other:?}"),
        }
    }

    #[test]
    fn rejects_rows_that_rename_an_existing_listing() {
        let csv = format!(
            "{HEADER}\
lst-1,Toyota,Aygo X,Active,,,,,2195,36,15000,0\n\
lst-1,Toyota,Aygo X,Pulse,,,,,2395,36,15000,0\n"
        );
        let err = InventoryCsvImporter::from_reader(Cursor::new(csv), &dealer())
            .expect_err("conflicting rows");
        assert!(matches!(err, InventoryImportError::ConflictingRow { line: 3, .. }));
    }

    #[test]
    fn from_path_propagates_io_errors() {
        let error = InventoryCsvImporter::from_path("./does-not-exist.csv", &dealer())
            .expect_err("expected io error");
        match error {
            InventoryImportError::Io(_) => {}
            other => panic!("expected io error, got {other:?}"),
        }
    }
}
