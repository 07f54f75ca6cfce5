use super::*;

use axum::extract::DefaultBodyLimit;

pub(super) fn build_router(state: AppState, security: ApiSecurity) -> Router {
    let uploads = Router::new()
        .route("/characters", get(list_uploads).post(upload_sprite))
        .route("/characters/{name}", delete(delete_upload))
        .route("/character-sprites", post(upload_sprites))
        .layer(DefaultBodyLimit::max(MAX_BATCH_BODY_BYTES));

    let api = Router::new()
        .route("/health", get(health))
        .route("/config", get(get_game_config))
        .route("/simulate", post(simulate))
        .route("/characters", get(list_characters).post(create_character))
        .route("/characters/stats", get(character_stats))
        .route(
            "/characters/{id}",
            get(get_character)
                .put(update_character)
                .delete(delete_character),
        )
        .route("/characters/{id}/source", get(character_source))
        .route("/items", get(list_items))
        // Static segment wins over `{category}` below.
        .route("/items/stats", get(all_item_stats))
        .route("/items/{category}", get(list_category).post(create_item))
        .route("/items/{category}/stats", get(item_stats))
        .route(
            "/items/{category}/{id}",
            get(get_item).put(update_item).delete(delete_item),
        )
        .route("/items/{category}/{id}/source", get(item_source))
        .nest("/uploads", uploads);

    Router::new()
        .nest("/api/v1", api)
        .fallback(endpoint_not_found)
        .with_state(state)
        .layer(middleware::from_fn_with_state(security, api_guard))
}

async fn endpoint_not_found(uri: axum::http::Uri) -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({
            "success": false,
            "error": {
                "code": "ENDPOINT_NOT_FOUND",
                "message": format!("No endpoint at {}", uri.path()),
            }
        })),
    )
}
