use crate::cli::ServeArgs;
use crate::infra::{standard_observers, AppState, InMemoryListingRepository};
use crate::routes::with_listing_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use listing_lifecycle::config::AppConfig;
use listing_lifecycle::error::AppError;
use listing_lifecycle::telemetry;
use listing_lifecycle::workflows::listing::{
    ChannelTransports, CsvListingRepository, CsvListingStore, ListingRepository, ListingService,
    ListingStateMachine, ValidationPipeline,
};
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

    let observers = standard_observers(&config.storage, ChannelTransports::logging());
    let machine = Arc::new(ListingStateMachine::new(ValidationPipeline::from_config(
        &config.moderation,
    )));

    match config.storage.listing_store.clone() {
        Some(path) => {
            let repository = CsvListingRepository::open(CsvListingStore::new(path), &observers)?;
            let service = ListingService::new(Arc::new(repository), machine, observers);
            serve(config, service).await
        }
        None => {
            let repository = Arc::new(InMemoryListingRepository::default());
            let service = ListingService::new(repository, machine, observers);
            serve(config, service).await
        }
    }
}

async fn serve<R>(config: AppConfig, service: ListingService<R>) -> Result<(), AppError>
where
    R: ListingRepository + 'static,
{
    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let service = Arc::new(service);
    let app = with_listing_routes(Arc::clone(&service))
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        rules = ?service.machine().pipeline().rule_names(),
        forbidden_terms = config.moderation.forbidden_terms.len(),
        "listing lifecycle engine ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
