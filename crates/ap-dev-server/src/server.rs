// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Main server implementation

use std::future::Future;

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::info;

use crate::config::ServerConfig;
use crate::dependencies::DefaultServerDependencies;
use crate::error::{ServerError, ServerResult};
use crate::handlers;
use crate::state::AppState;

/// Local dev server
pub struct Server {
    config: ServerConfig,
    state: AppState,
    app: Router,
}

impl Server {
    /// Create a server with the default dependencies
    pub async fn new(config: ServerConfig) -> ServerResult<Self> {
        let state = DefaultServerDependencies::new(config.clone()).await?.into_state();
        Ok(Self::with_state(config, state))
    }

    /// Construct a server from an already-built app state (used for custom dependencies)
    pub fn with_state(config: ServerConfig, state: AppState) -> Self {
        let app = Self::build_app(state.clone(), &config);
        Self { config, state, app }
    }

    /// Build the Axum application with routes and middleware
    fn build_app(state: AppState, config: &ServerConfig) -> Router {
        let middleware_stack = ServiceBuilder::new()
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(CompressionLayer::new())
            .layer({
                if config.enable_cors {
                    CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
                } else {
                    CorsLayer::new()
                        .allow_origin(vec![
                            HeaderValue::from_static("http://localhost:4000"),
                            HeaderValue::from_static("http://127.0.0.1:4000"),
                        ])
                        .allow_methods([Method::GET, Method::POST])
                        .allow_headers([header::CONTENT_TYPE])
                }
            });

        // Studio-only endpoints
        let dev_routes = Router::new()
            .route("/ping", get(handlers::health::ping))
            .route("/version", get(handlers::health::version))
            .route("/list", get(handlers::dev::list_entrypoints))
            .route("/tasks/:slug", get(handlers::dev::get_task))
            .route("/runs/create", post(handlers::dev::create_run))
            .route("/logs/:run_id", get(handlers::logs::stream_logs));

        // Public platform API used by SDKs and the CLI
        let public_routes = Router::new()
            .route("/tasks/execute", post(handlers::tasks::execute_task))
            .route("/tasks/getMetadata", get(handlers::tasks::get_task_metadata))
            .route("/views/get", get(handlers::tasks::get_view))
            .route("/runs/get", get(handlers::runs::get_run))
            .route("/runs/list", get(handlers::runs::list_runs))
            .route("/runs/getOutputs", get(handlers::runs::get_outputs))
            .route("/resources/list", get(handlers::resources::list_resources))
            .route("/prompts/create", post(handlers::prompts::create_prompt))
            .route("/prompts/get", get(handlers::prompts::get_prompt));

        // Internal platform API used by the web app
        let internal_routes = Router::new()
            .route("/resources/create", post(handlers::resources::create_resource))
            .route("/resources/update", post(handlers::resources::update_resource))
            .route("/resources/delete", post(handlers::resources::delete_resource))
            .route("/resources/get", get(handlers::resources::get_resource))
            .route("/resources/list", get(handlers::resources::list_resources))
            .route("/resources/isSlugAvailable", get(handlers::resources::is_slug_available))
            .route("/prompts/list", get(handlers::prompts::list_prompts))
            .route("/prompts/submit", post(handlers::prompts::submit_prompt))
            .route("/runs/get", get(handlers::runs::get_run_with_task))
            .route("/runs/getDescendants", get(handlers::runs::get_descendants))
            .route("/users/get", get(handlers::users::get_user));

        Router::new()
            .nest("/dev", dev_routes)
            .nest("/v0", public_routes)
            .nest("/i", internal_routes)
            .with_state(state)
            .layer(middleware_stack)
    }

    /// Run the server until the process is killed
    pub async fn run(self) -> ServerResult<()> {
        self.run_until(std::future::pending()).await
    }

    /// Run the server until `shutdown` resolves, then drain in-flight requests
    pub async fn run_until<F>(self, shutdown: F) -> ServerResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.config.bind_addr;
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!(addr = %listener.local_addr()?, root = %self.config.root_dir.display(), "dev server listening");

        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|err| ServerError::Internal(format!("dev server error: {err}")))?;

        let counts = self.state.runs.counts().await;
        info!(runs = ?counts, "dev server stopped");
        Ok(())
    }
}
