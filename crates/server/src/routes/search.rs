use actix_web::{post, web, HttpResponse};
use proxima_vector::CancellationToken;
use std::sync::Arc;
use tracing::info;

use crate::error::ApiError;
use crate::state::AppState;
use crate::types::{SearchBody, SearchResponse, SimilarBody};

/// Free-text similarity search
#[post("/search")]
pub async fn search(
    body: web::Json<SearchBody>,
    state: web::Data<Arc<AppState>>,
) -> Result<HttpResponse, ApiError> {
    let (query, options) = body.into_inner().into_parts();
    info!(
        "Search request - query_len={}, limit={:?}, geo={}, filters={}",
        query.len(),
        options.limit,
        options.location.is_some(),
        options.filters.len()
    );

    // The handler future is dropped on client disconnect, which drops the
    // in-flight index call with it.
    let cancel = CancellationToken::new();
    let results = state.engine.execute(&query, options, &cancel).await?;

    Ok(HttpResponse::Ok().json(SearchResponse::from(results)))
}

/// Items similar to a stored item
#[post("/search/similar")]
pub async fn search_similar(
    body: web::Json<SimilarBody>,
    state: web::Data<Arc<AppState>>,
) -> Result<HttpResponse, ApiError> {
    let (id, options) = body.into_inner().into_parts();
    info!("Similar-item request - id={}, limit={:?}", id, options.limit);

    let cancel = CancellationToken::new();
    let results = state.engine.similar_to(&id, options, &cancel).await?;

    Ok(HttpResponse::Ok().json(SearchResponse::from(results)))
}
