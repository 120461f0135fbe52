use crate::cli::ServeArgs;
use crate::infra::{load_listings, seeded_store, AppState};
use crate::routes::with_app_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use leasing_core::config::AppConfig;
use leasing_core::error::AppError;
use leasing_core::telemetry;
use leasing_core::workflows::inventory::DealerId;
use leasing_core::workflows::reconciliation::ExtractionService;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let dealer = DealerId(args.dealer);
    let listings = match args.inventory_csv.as_deref() {
        Some(path) => load_listings(path, &dealer)?,
        None => Vec::new(),
    };
    let seeded = listings.len();
    let store = Arc::new(seeded_store(listings, args.reference_models)?);
    let pricing = Arc::new(config.pricing.clone());
    let service = Arc::new(ExtractionService::new(store, config.pricing.clone()));

    let app = with_app_routes(service)
        .layer(Extension(app_state))
        .layer(Extension(pricing))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        dealer_id = %dealer.0,
        seeded,
        "leasing inventory service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
