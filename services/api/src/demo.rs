use crate::infra::{load_extraction, load_listings, seeded_store};
use clap::Args;
use leasing_core::config::AppConfig;
use leasing_core::error::AppError;
use leasing_core::workflows::inventory::{DealerId, Listing, ListingId, Offer, Transmission};
use leasing_core::workflows::pricing::{
    calculate_lease_score, InventoryScoreReport, LeaseScoreInput, PricingConfig,
};
use leasing_core::workflows::reconciliation::{
    build_change_set, ApplyOutcome, ChangeRecord, ChangeType, ExtractionIntake,
    ExtractionService, FieldValue, RawExtractedVehicle, SessionId,
};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct CompareArgs {
    /// Inventory CSV export (one row per offer)
    #[arg(long)]
    pub(crate) inventory: PathBuf,
    /// Extraction JSON: an array of vehicles or `{ "vehicles": [...] }`
    #[arg(long)]
    pub(crate) extracted: PathBuf,
    /// Dealer the inventory belongs to
    #[arg(long, default_value = "dealer-1")]
    pub(crate) dealer: String,
}

#[derive(Args, Debug)]
pub(crate) struct ScoreArgs {
    /// Retail price in DKK
    #[arg(long)]
    pub(crate) retail_price: u32,
    /// Monthly payment in DKK
    #[arg(long)]
    pub(crate) monthly: u32,
    /// Annual mileage allowance in km
    #[arg(long, default_value_t = 15_000)]
    pub(crate) mileage: u32,
    /// First payment in DKK
    #[arg(long, default_value_t = 0)]
    pub(crate) deposit: u32,
    /// Contract length in months
    #[arg(long, default_value_t = 36)]
    pub(crate) months: u32,
}

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Leave the staged deletion pending instead of discarding it.
    #[arg(long)]
    pub(crate) keep_deletes: bool,
}

pub(crate) fn run_compare(args: CompareArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let dealer = DealerId(args.dealer);
    let inventory = load_listings(&args.inventory, &dealer)?;
    let batch = load_extraction(&args.extracted)?;

    let report = ExtractionIntake::from_config(&config.pricing).validate_batch(batch);
    let changes = build_change_set(
        &SessionId("preview".to_string()),
        &report.accepted,
        &inventory,
    );

    println!(
        "Compared {} extracted record(s) against {} listing(s) for {}",
        report.accepted.len(),
        inventory.len(),
        dealer.0
    );
    for rejected in &report.rejected {
        println!("  Rejected record #{}: {}", rejected.index, rejected.message);
    }
    for line in change_set_lines(&changes) {
        println!("{}", line);
    }
    Ok(())
}

pub(crate) fn run_score(args: ScoreArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let score = calculate_lease_score(
        &LeaseScoreInput {
            retail_price: args.retail_price,
            monthly_price: args.monthly,
            mileage_per_year: args.mileage,
            first_payment: args.deposit,
            contract_months: args.months,
        },
        &config.pricing,
    );

    if let Some(reason) = score.unscored_reason {
        println!("Offer cannot be scored: {}", reason.code());
        return Ok(());
    }

    println!("Lease score: {}/100", score.total_score);
    println!(
        "  Monthly rate: {} (effective {:.2}% of retail per month)",
        score.monthly_rate_score, score.effective_monthly_percent
    );
    println!("  Mileage: {}", score.mileage_score);
    println!(
        "  Upfront: {} ({:.1}% of retail)",
        score.upfront_score, score.upfront_percent
    );
    Ok(())
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let dealer = DealerId("dealer-demo".to_string());
    let store = Arc::new(seeded_store(
        demo_inventory(&dealer),
        vec![("Toyota".to_string(), "Yaris Cross".to_string())],
    )?);
    let service = ExtractionService::new(store, PricingConfig::default());

    println!("Leasing inventory reconciliation demo");
    print_scores("Scores before upload", &service.dealer_scores(&dealer).await?);

    let staged = service.stage(&dealer, demo_extraction()?).await?;
    println!("\nStaged session {}", staged.session.id.0);
    for line in change_set_lines(&staged.changes) {
        println!("{}", line);
    }
    for warning in &staged.warnings {
        println!("  Warning: {}", warning);
    }

    let mut selected = Vec::new();
    let mut deletes = Vec::new();
    for change in &staged.changes {
        match change.change_type {
            ChangeType::Delete if args.keep_deletes => {}
            ChangeType::Delete => deletes.push(change.id.clone()),
            _ => selected.push(change.id.clone()),
        }
    }
    if !deletes.is_empty() {
        let discarded = service.discard(&staged.session.id, &deletes).await?;
        println!("\nDiscarded {} deletion(s)", discarded.updated.len());
    }

    let outcome = service
        .apply(&staged.session.id, &selected, "demo@marketplace.dk", None)
        .await?;
    print_outcome(&outcome);
    print_scores("\nScores after apply", &service.dealer_scores(&dealer).await?);
    Ok(())
}

pub(crate) fn change_set_lines(changes: &[ChangeRecord]) -> Vec<String> {
    if changes.is_empty() {
        return vec!["  No changes: inventory already matches the extraction".to_string()];
    }

    let mut lines = Vec::new();
    for change in changes {
        let vehicle = &change.extracted_data;
        let target = change
            .target_listing_id
            .as_ref()
            .map(|id| id.0.as_str())
            .unwrap_or("new listing");
        lines.push(format!(
            "  {} {} {} {} [{}] confidence {:.2} via {:?}",
            change.change_type.label().to_uppercase(),
            vehicle.make,
            vehicle.model,
            vehicle.variant,
            target,
            change.confidence_score,
            change.match_method
        ));
        for (field, diff) in &change.field_diffs {
            lines.push(format!(
                "    {}: {} -> {}",
                field.label(),
                describe(&diff.old),
                describe(&diff.new)
            ));
        }
    }
    lines
}

fn describe(value: &FieldValue) -> String {
    match value {
        FieldValue::Missing => "-".to_string(),
        FieldValue::Number(number) => number.to_string(),
        FieldValue::Text(text) => text.clone(),
        FieldValue::Offers(offers) => offers
            .iter()
            .map(|offer| {
                format!(
                    "{} kr/md {} km {} md",
                    offer.monthly_price, offer.mileage_per_year, offer.period_months
                )
            })
            .collect::<Vec<_>>()
            .join(", "),
    }
}

fn print_outcome(outcome: &ApplyOutcome) {
    println!(
        "\nApplied: {} created, {} updated, {} deleted (session {})",
        outcome.applied.created,
        outcome.applied.updated,
        outcome.applied.deleted,
        outcome.session_status.label()
    );
    for error in &outcome.errors {
        println!("  Failed {}: {}", error.change_id.0, error.error);
    }
    for skipped in &outcome.skipped {
        println!(
            "  Skipped {} ({})",
            skipped.change_id.0,
            skipped.status.label()
        );
    }
}

fn print_scores(title: &str, report: &InventoryScoreReport) {
    println!("{}", title);
    for row in &report.rows {
        match (&row.score.best, row.score.unscored_reason) {
            (Some(best), _) => println!(
                "  {}: {}/100 at {} kr/md",
                row.listing_id.0, best.score.total_score, best.offer.monthly_price
            ),
            (None, Some(reason)) => {
                println!("  {}: unscored ({})", row.listing_id.0, reason.code())
            }
            (None, None) => println!("  {}: unscored", row.listing_id.0),
        }
    }
}

fn demo_offer(monthly_price: u32, mileage_per_year: u32) -> Offer {
    Offer {
        monthly_price,
        period_months: 36,
        mileage_per_year,
        first_payment: 4_995,
    }
}

fn demo_inventory(dealer: &DealerId) -> Vec<Listing> {
    let listing = |id: &str, model: &str, variant: &str, retail: u32, offers: Vec<Offer>| Listing {
        id: ListingId(id.to_string()),
        dealer_id: dealer.clone(),
        make: "Toyota".to_string(),
        model: model.to_string(),
        variant: variant.to_string(),
        horsepower: None,
        transmission: Some(Transmission::Manual),
        fuel_type: Some("Benzin".to_string()),
        retail_price: Some(retail),
        offers,
    };

    vec![
        listing(
            "lst-aygo",
            "Aygo X",
            "Active 72 hk",
            189_900,
            vec![demo_offer(2_295, 15_000), demo_offer(2_495, 20_000)],
        ),
        listing(
            "lst-yaris",
            "Yaris",
            "Style 116 hk",
            239_900,
            vec![demo_offer(2_795, 15_000)],
        ),
        listing(
            "lst-corolla",
            "Corolla",
            "Active 140 hk",
            319_900,
            vec![demo_offer(3_395, 15_000)],
        ),
    ]
}

fn demo_extraction() -> Result<Vec<RawExtractedVehicle>, AppError> {
    let batch = serde_json::json!([
        {
            "make": "Toyota", "model": "Aygo X", "variant": "Active 72 hk",
            "transmission": "Manuel", "retail_price": "189.900",
            "offers": [
                { "monthly_price": "2.195", "mileage_per_year": 15000, "first_payment": 4995 },
                { "monthly_price": "2.395", "mileage_per_year": 20000, "first_payment": 4995 }
            ]
        },
        {
            "make": "Toyota", "model": "Yaris", "variant": "Style 116 hk",
            "transmission": "Manuel", "retail_price": 239900,
            "monthly_price": 2795, "mileage_per_year": 15000, "first_payment": 4995
        },
        {
            "make": "Toyota", "model": "Yaris Cross", "variant": "Active Hybrid 116 hk",
            "transmission": "Automatisk", "fuel_type": "Hybrid", "retail_price": 279900,
            "monthly_price": 3095, "mileage_per_year": 15000, "first_payment": 4995,
            "variant_source": "inferred", "confidence": 0.9
        },
        { "make": "Toyota", "model": "Corolla" }
    ]);
    Ok(serde_json::from_value(batch)?)
}
