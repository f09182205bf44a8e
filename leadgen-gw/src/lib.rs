//! leadgen-gw library - lead-generation API gateway
//!
//! Proxies a browser front-end's calls to Google Sheets, DataForSEO, Google
//! Search Console, Jina Reader and OpenRouter behind one uniform JSON/CORS
//! surface, and owns the category-grouped writes into lead spreadsheets.

use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod config;
pub mod cors;
pub mod error;
pub mod lead_writer;
pub mod router;
pub mod services;

use config::GatewayConfig;
use router::{ApiRouter, Dispatcher};
use services::{
    build_http_client, KeywordsRouter, LlmRouter, ReaderRouter, SearchConsoleRouter, SheetsRouter,
};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
}

impl AppState {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
        }
    }

    /// Construct every router in dispatch order
    ///
    /// Fails if any router is missing a required secret.
    pub fn from_config(config: &GatewayConfig) -> leadgen_common::Result<Self> {
        let http = build_http_client()?;

        let routers: Vec<Arc<dyn ApiRouter>> = vec![
            Arc::new(SheetsRouter::new(config, http.clone())?),
            Arc::new(KeywordsRouter::new(config, http.clone())?),
            Arc::new(SearchConsoleRouter::new(config, http.clone())),
            Arc::new(ReaderRouter::new(config, http.clone())?),
            Arc::new(LlmRouter::new(config, http)?),
        ];

        Ok(Self::new(Dispatcher::new(routers)))
    }
}

/// Build application router
///
/// `/health` is routed directly; every other path falls through to the
/// dispatcher. CORS applies to all responses, 404s included.
pub fn build_router(state: AppState) -> Router {
    let app = Router::new()
        .merge(api::health_routes())
        .fallback(api::api_fallback)
        .with_state(state);

    cors::with_cors(app).layer(TraceLayer::new_for_http())
}
