use actix_web::{get, web, HttpResponse};
use std::sync::Arc;

use crate::state::AppState;
use crate::types::HealthResponse;

/// Liveness and engine wiring
#[get("/health")]
pub async fn health(state: web::Data<Arc<AppState>>) -> HttpResponse {
    let engine = &state.engine;

    HttpResponse::Ok().json(HealthResponse {
        status: "ok".to_string(),
        index: engine.index_name().to_string(),
        collection: state.config.index_collection.clone(),
        embedding_model: engine.embedding_model().to_string(),
        dimension: engine.config().dimension,
    })
}
