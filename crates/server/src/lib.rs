//! Proxima HTTP server
//!
//! Actix-web REST API over the ranking engine

pub mod error;
pub mod routes;
pub mod state;
pub mod types;

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use proxima_common::{AppConfig, ProximaError, Result};
use proxima_vector::RankingEngine;
use tracing::info;
use tracing_actix_web::TracingLogger;

pub use error::ApiError;
pub use state::AppState;

/// Register routes and the JSON extractor config
pub fn configure(cfg: &mut web::ServiceConfig) {
    let json = web::JsonConfig::default()
        .limit(64 * 1024)
        .error_handler(|err, _req| ApiError::from(ProximaError::invalid_input(err.to_string())).into());

    cfg.app_data(json)
        .service(routes::search::search_similar)
        .service(routes::search::search)
        .service(routes::system::health);
}

/// Build the engine from `config` and serve until shutdown
pub async fn start_server(config: AppConfig) -> Result<()> {
    let engine = RankingEngine::from_config(&config)?;
    let bind_addr = config.server_bind_address();
    let state = web::Data::new(Arc::new(AppState::new(config, engine)));

    info!("Starting HTTP server on {}", bind_addr);

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(TracingLogger::default())
            .wrap(Cors::permissive())
            .configure(configure)
    })
    .bind(&bind_addr)?
    .run()
    .await?;

    info!("HTTP server stopped");
    Ok(())
}
