mod compute;
mod config;
mod error;
mod events;
mod handlers;
mod identity;
mod ids;
mod kv;
mod network;
mod operations;
mod respond;
mod state;
mod storage;
mod validation;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::http::{header, Method, StatusCode};
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post, put};
use axum::Router;
use runtime::DockerOps;
use serde_json::json;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tracing::info;

use crate::config::{CoreConfig, LogFormat};
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let _basic_tracing = init_tracing_basic();

    info!("Starting Docktail Emulator Core v{}", env!("CARGO_PKG_VERSION"));

    let config = CoreConfig::load().context("Failed to load configuration")?;
    config.validate().context("Configuration validation failed")?;

    drop(_basic_tracing);
    init_tracing_from_config(&config);

    info!("Configuration loaded successfully");
    info!("Server will bind to: {}", config.server.bind_address);

    let runtime: Arc<dyn DockerOps> = if config.compute.use_fake_runtime {
        info!("Using in-memory fake container runtime (compute.use_fake_runtime=true)");
        Arc::new(runtime::FakeDocker::new())
    } else {
        info!("Connecting to container runtime at '{}'", config.compute.runtime_endpoint);
        let client = runtime::DockerClient::new(&config.compute.runtime_endpoint)
            .context("Failed to connect to container runtime")?;
        Arc::new(client)
    };

    let state = AppState::new(config.clone(), runtime);

    // Seed the machine-type catalogue once at boot (spec.md §4.2;
    // SPEC_FULL.md §4.2 supplement: stable across restarts, never computed
    // per-request).
    compute::machine_type::seed_catalogue(&state.kv);

    // Reconcile whatever a crash mid-upload left behind before serving
    // traffic (spec.md §5, §7 partial-failure semantics).
    storage::gc::reconcile_dangling(&state.kv, std::path::Path::new(&config.storage.root));

    // Background tasks: reconciler (spec.md §4.2) and lifecycle executor
    // (spec.md §4.6), each a ticker raced against the shared shutdown
    // signal (SPEC_FULL.md §5 supplement).
    tokio::spawn(compute::reconciler::run(
        state.kv.clone(),
        state.runtime.clone(),
        config.compute.reconciler_interval_secs,
        state.shutdown_tx.subscribe(),
    ));
    tokio::spawn(storage::lifecycle::run(
        state.kv.clone(),
        state.http_client.clone(),
        config.lifecycle.interval_minutes,
        state.shutdown_tx.subscribe(),
    ));

    let app = build_router(state.clone());

    let addr: SocketAddr = config.server.bind_address.parse().context("Invalid bind address")?;
    let listener = tokio::net::TcpListener::bind(&addr).await.context("Failed to bind to address")?;

    info!("✓ Docktail Emulator Core is ready!");
    info!("Listening on: http://{addr}");
    info!("  - Storage: http://{addr}/storage/v1/b");
    info!("  - Compute: http://{addr}/compute/v1/projects/{{project}}/zones/{{zone}}/instances");
    info!("  - Identity: http://{addr}/v1/projects/{{project}}/serviceAccounts");
    info!("  - Health check: http://{addr}/health");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    state.shutdown();
    info!("Server shut down gracefully");
    Ok(())
}

/// Builds the full provider-wire router (spec.md §6 "Key endpoints") plus
/// the operational health/readiness/root endpoints (SPEC_FULL.md §6
/// supplement).
fn build_router(state: AppState) -> Router {
    let cors = if state.config.server.enable_cors {
        let origins = state
            .config
            .server
            .cors_origins
            .iter()
            .filter_map(|s| s.parse::<axum::http::HeaderValue>().ok())
            .collect::<Vec<_>>();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::PATCH, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, "x-goog-hash".parse().unwrap()])
            .allow_credentials(true)
    } else {
        CorsLayer::new()
    };

    let request_timeout = Duration::from_secs(state.config.server.request_timeout_secs);
    let body_limit = state.config.server.max_body_bytes;

    let storage = storage_router();
    let compute = compute_router();
    let network = network_router();
    let identity = identity_router();
    let operations = operations_router();

    Router::new()
        .route("/health", get(health_handler))
        .route("/ready", get(readiness_handler))
        .route("/", get(root_handler))
        .merge(storage)
        .merge(compute)
        .merge(network)
        .merge(identity)
        .merge(operations)
        .layer(
            ServiceBuilder::new()
                .layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, request_timeout))
                .layer(axum::extract::DefaultBodyLimit::max(body_limit))
                .layer(cors),
        )
        .with_state(state)
}

fn storage_router() -> Router<AppState> {
    use handlers::storage as h;

    Router::new()
        .route("/storage/v1/b", get(h::list_buckets).post(h::create_bucket))
        .route("/storage/v1/b/{bucket}", get(h::get_bucket).delete(h::delete_bucket).patch(h::patch_bucket))
        .route("/storage/v1/b/{bucket}/o", get(h::list_objects))
        // A single wildcard-tailed route serves every object-level verb.
        // Object names may contain `/` (spec.md §8 boundary behavior), and
        // `copyTo` embeds a second bucket/object pair after the source name
        // (`{src}/copyTo/b/{dstBucket}/o/{dst}`) -- both need the full
        // remaining path, not just one segment, so GET/DELETE/PATCH/POST
        // all share this one route pattern rather than splitting `{name}`
        // (single segment) from `{*rest}` (wildcard), which axum's router
        // cannot register side by side at the same position.
        .route(
            "/storage/v1/b/{bucket}/o/{*rest}",
            get(h::get_object).delete(h::delete_object).patch(h::patch_object).options(h::cors_preflight).post(h::copy_object),
        )
        .route("/upload/storage/v1/b/{bucket}/o", post(h::upload_object))
        .route(
            "/upload/storage/v1/resumable/{session_id}",
            put(h::resumable_chunk).get(h::resumable_status).delete(h::abort_resumable),
        )
}

fn compute_router() -> Router<AppState> {
    use handlers::compute as h;

    Router::new()
        .route(
            "/compute/v1/projects/{project}/zones/{zone}/instances",
            get(h::list_instances).post(h::create_instance),
        )
        .route(
            "/compute/v1/projects/{project}/zones/{zone}/instances/{name}",
            get(h::get_instance).delete(h::delete_instance),
        )
        .route("/compute/v1/projects/{project}/zones/{zone}/instances/{name}/start", post(h::start_instance))
        .route("/compute/v1/projects/{project}/zones/{zone}/instances/{name}/stop", post(h::stop_instance))
        .route("/compute/v1/projects/{project}/zones/{zone}/machineTypes", get(h::list_machine_types))
        .route("/compute/v1/projects/{project}/zones/{zone}/machineTypes/{name}", get(h::get_machine_type))
}

fn network_router() -> Router<AppState> {
    use handlers::network as h;

    Router::new()
        .route(
            "/compute/v1/projects/{project}/global/firewalls",
            get(h::list_firewalls).post(h::create_firewall),
        )
        .route(
            "/compute/v1/projects/{project}/global/firewalls/{name}",
            get(h::get_firewall).delete(h::delete_firewall),
        )
        .route(
            "/compute/v1/projects/{project}/global/networks",
            get(h::list_networks).post(h::create_network),
        )
        .route(
            "/compute/v1/projects/{project}/global/networks/{name}",
            get(h::get_network).delete(h::delete_network),
        )
        .route("/compute/v1/projects/{project}/global/routes", get(h::list_routes).post(h::create_route))
        .route(
            "/compute/v1/projects/{project}/regions/{region}/subnetworks",
            get(h::list_subnets).post(h::create_subnet),
        )
        .route(
            "/compute/v1/projects/{project}/regions/{region}/routers",
            get(h::list_routers).post(h::create_router),
        )
        .route(
            "/compute/v1/projects/{project}/regions/{region}/addresses",
            get(h::list_addresses).post(h::reserve_address),
        )
}

fn identity_router() -> Router<AppState> {
    use handlers::identity as h;

    Router::new()
        .route(
            "/v1/projects/{project}/serviceAccounts",
            get(h::list_service_accounts).post(h::create_service_account),
        )
        .route(
            "/v1/projects/{project}/serviceAccounts/{email}",
            get(h::get_service_account).delete(h::delete_service_account).post(h::post_service_account_action),
        )
        .route(
            "/v1/projects/{project}/serviceAccounts/{email}/keys",
            get(h::list_keys).post(h::create_key),
        )
        .route(
            "/v1/projects/{project}/serviceAccounts/{email}/keys/{key_id}",
            get(h::get_key).delete(h::delete_key),
        )
}

fn operations_router() -> Router<AppState> {
    use handlers::operations as h;

    Router::new()
        .route("/compute/v1/projects/{project}/global/operations", get(h::list_global_operations))
        .route("/compute/v1/projects/{project}/global/operations/{name}", get(h::get_global_operation))
        .route("/compute/v1/projects/{project}/regions/{region}/operations", get(h::list_regional_operations))
        .route("/compute/v1/projects/{project}/regions/{region}/operations/{name}", get(h::get_regional_operation))
        .route("/compute/v1/projects/{project}/zones/{zone}/operations", get(h::list_zonal_operations))
        .route("/compute/v1/projects/{project}/zones/{zone}/operations/{name}", get(h::get_zonal_operation))
}

async fn root_handler() -> Json<serde_json::Value> {
    Json(json!({
        "name": "Docktail Emulator Core",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "storage": "/storage/v1/b",
            "compute": "/compute/v1/projects/{project}/zones/{zone}/instances",
            "identity": "/v1/projects/{project}/serviceAccounts",
            "health": "/health",
            "ready": "/ready"
        }
    }))
}

async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "healthy", "timestamp": respond::now_timestamp() })))
}

async fn readiness_handler(axum::extract::State(state): axum::extract::State<AppState>) -> impl IntoResponse {
    // Ready once the machine-type catalogue is seeded -- a cheap proxy for
    // "startup completed" since that seeding happens once, synchronously,
    // before the listener binds.
    let ready = !state.kv.machine_types.is_empty();
    let status = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status, Json(json!({ "ready": ready })))
}

fn init_tracing_basic() -> tracing::subscriber::DefaultGuard {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,core=debug"));
    let subscriber = fmt().with_env_filter(filter).with_target(true).with_thread_ids(false).with_file(false).with_line_number(false).finish();
    tracing::subscriber::set_default(subscriber)
}

fn init_tracing_from_config(config: &CoreConfig) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format {
        LogFormat::Json => {
            let layer = fmt::layer().json().with_target(true).with_thread_ids(true);
            tracing_subscriber::registry().with(filter).with(layer).init();
        }
        LogFormat::Pretty => {
            let layer = fmt::layer().with_target(true).with_thread_ids(false).with_file(false).with_line_number(false);
            tracing_subscriber::registry().with(filter).with(layer).init();
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => { tracing::warn!("Received Ctrl+C, initiating graceful shutdown..."); },
        _ = terminate => { tracing::warn!("Received SIGTERM, initiating graceful shutdown..."); },
    }
}
