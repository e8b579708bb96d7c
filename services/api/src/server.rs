use crate::cli::ServeArgs;
use crate::infra::{AppState, InMemoryIdentityDirectory};
use crate::routes::with_pipeline_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use talent_match::config::AppConfig;
use talent_match::error::AppError;
use talent_match::telemetry;
use talent_match::workflows::hiring::{
    spawn_sweeper, ConsentLedger, InMemoryPipelineStore, PipelineStateMachine, SystemClock,
};
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }
    if let Some(secs) = args.sweep_interval_secs.take() {
        config.pipeline.sweep_interval_secs = secs;
    }
    if let Some(threshold) = args.match_threshold.take() {
        config.pipeline.match_threshold = threshold;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let directory = InMemoryIdentityDirectory::default();
    let machine = Arc::new(PipelineStateMachine::new(
        Arc::new(InMemoryPipelineStore::new()),
        Arc::new(ConsentLedger::new()),
        Arc::new(directory.clone()),
        Arc::new(SystemClock),
        config.pipeline.settings(),
    ));

    let sweeper = config.pipeline.sweep_interval().map(|period| {
        info!(period_secs = period.as_secs(), "deadline sweeper scheduled");
        spawn_sweeper(machine.clone(), period)
    });

    let app = with_pipeline_routes(machine, directory)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        match_threshold = config.pipeline.match_threshold,
        "talent match pipeline ready"
    );

    let served = axum::serve(listener, app).await;
    if let Some(handle) = sweeper {
        handle.abort();
    }
    served?;
    Ok(())
}
