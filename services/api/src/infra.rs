use leasing_core::error::AppError;
use leasing_core::workflows::inventory::{DealerId, InventoryCsvImporter, Listing};
use leasing_core::workflows::reconciliation::{
    ExtractionServiceError, InMemoryInventoryStore, StageRequest,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::Value;
use std::fs;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) fn load_listings(path: &Path, dealer: &DealerId) -> Result<Vec<Listing>, AppError> {
    Ok(InventoryCsvImporter::from_path(path, dealer)?)
}

/// Build the process-local store. Seeded listings register their own make/model pairs as
/// reference models on top of `reference_models`.
pub(crate) fn seeded_store(
    listings: Vec<Listing>,
    reference_models: Vec<(String, String)>,
) -> Result<InMemoryInventoryStore, AppError> {
    let store = InMemoryInventoryStore::new().with_reference_models(reference_models);
    store
        .seed_listings(listings)
        .map_err(ExtractionServiceError::from)?;
    Ok(store)
}

pub(crate) fn load_extraction(path: &Path) -> Result<Vec<Value>, AppError> {
    let raw = fs::read_to_string(path)?;
    parse_extraction(&raw)
}

/// Extraction files arrive either as a bare array or wrapped like the stage request body.
/// Elements stay undecoded so intake rejects a badly typed record on its own.
pub(crate) fn parse_extraction(raw: &str) -> Result<Vec<Value>, AppError> {
    match serde_json::from_str::<Value>(raw)? {
        Value::Array(vehicles) => Ok(vehicles),
        wrapped => Ok(serde_json::from_value::<StageRequest>(wrapped)?.vehicles),
    }
}

/// Parse a `Make/Model` pair given on the command line.
pub(crate) fn parse_reference_model(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('/') {
        Some((make, model)) if !make.trim().is_empty() && !model.trim().is_empty() => {
            Ok((make.trim().to_string(), model.trim().to_string()))
        }
        _ => Err(format!("expected MAKE/MODEL, got '{raw}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use leasing_core::workflows::reconciliation::{ExtractionIntake, IntakeViolation};

    #[test]
    fn extraction_files_accept_both_shapes() {
        let bare = parse_extraction(r#"[{"make": "Toyota", "model": "Aygo X"}]"#)
            .expect("bare array parses");
        assert_eq!(bare.len(), 1);
        assert_eq!(bare[0]["model"], "Aygo X");

        let wrapped = parse_extraction(r#"{"vehicles": [{"make": "Kia"}, {"make": "Cupra"}]}"#)
            .expect("wrapped batch parses");
        assert_eq!(wrapped.len(), 2);
    }

    #[test]
    fn badly_typed_file_records_are_rejected_one_by_one() {
        let batch = parse_extraction(
            r#"{"vehicles": [
                {"make": "Toyota", "model": "Aygo X", "variant": "Active", "monthly_price": 2195},
                {"make": "Toyota", "model": "Yaris", "variant": "Style", "offers": null}
            ]}"#,
        )
        .expect("file parses");

        let report = ExtractionIntake::default().validate_batch(batch);
        assert_eq!(report.accepted.len(), 1);
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.rejected[0].index, 1);
        assert!(matches!(
            report.rejected[0].reason,
            IntakeViolation::Malformed { .. }
        ));
    }

    #[test]
    fn reference_models_parse_from_make_and_model() {
        assert_eq!(
            parse_reference_model("Toyota/Aygo X").expect("valid pair"),
            ("Toyota".to_string(), "Aygo X".to_string())
        );
        assert!(parse_reference_model("Toyota").is_err());
        assert!(parse_reference_model(" /Aygo").is_err());
    }

    #[test]
    fn seeded_store_rejects_duplicate_listing_ids() {
        let listing = Listing {
            id: leasing_core::workflows::inventory::ListingId("lst-1".to_string()),
            dealer_id: DealerId("dealer-1".to_string()),
            make: "Toyota".to_string(),
            model: "Aygo X".to_string(),
            variant: "Active".to_string(),
            horsepower: None,
            transmission: None,
            fuel_type: None,
            retail_price: None,
            offers: Vec::new(),
        };

        let err = seeded_store(vec![listing.clone(), listing], Vec::new())
            .expect_err("duplicate id");
        assert!(matches!(err, AppError::Extraction(_)));
    }

    #[test]
    fn malformed_extraction_is_a_json_error() {
        let err = parse_extraction("{ not json").expect_err("invalid json");
        assert!(matches!(err, AppError::Json(_)));
    }
}
