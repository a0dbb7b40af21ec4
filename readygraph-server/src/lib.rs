// Copyright 2025 Readygraph (https://github.com/readygraph)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Readygraph Server
//!
//! Thin HTTP surface over the inference engine. All logic lives in the
//! engine and below; this crate wires configuration, tracing and routes.

pub mod api;
pub mod config;

use anyhow::{Context, Result};
use api::{health, predict_readiness, project_graph, AppState};
use axum::http::HeaderValue;
use axum::{
    routing::{get, post},
    Router,
};
use config::ServerConfig;
use readygraph_cache::SubgraphCache;
use readygraph_engine::{InferenceEngine, SequenceRepository};
use readygraph_model::GinLstmScorer;
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Build the application router; separated from [`run_server`] so tests
/// can drive it without a socket.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/predict_readiness", post(predict_readiness))
        .route("/graph/:target_code", get(project_graph))
        .route("/health", get(health))
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }
    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(parsed))
        .allow_methods(Any)
        .allow_headers(Any)
}

pub async fn run_server(config: ServerConfig) -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "readygraph_server=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Readygraph Server");
    config.validate()?;

    let cache = Arc::new(SubgraphCache::open(config.cache.clone())?);
    let repository = Arc::new(
        SequenceRepository::load(&config.repository.sequences_path)
            .context("loading sequence repository")?,
    );
    let model = Arc::new(
        GinLstmScorer::from_checkpoint(&config.model.checkpoint_path)
            .context("loading scoring checkpoint")?,
    );
    let engine = Arc::new(InferenceEngine::new(
        cache,
        repository,
        model,
        config.pipeline.clone(),
    ));

    let mut app = router(AppState { engine }).layer(TraceLayer::new_for_http());
    if config.server.enable_cors {
        app = app.layer(cors_layer(&config.server.cors_origins));
    }

    let listener = tokio::net::TcpListener::bind(&config.server.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.server.listen_addr))?;
    tracing::info!(addr = %config.server.listen_addr, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}
