use super::*;

pub(super) async fn list_characters(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let mut store = lock_store(&state.characters)?;
    Ok(Json(ApiResponse::success(store.all()?.clone())))
}

pub(super) async fn get_character(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let mut store = lock_store(&state.characters)?;
    Ok(Json(ApiResponse::success(store.get(&id)?.clone())))
}

pub(super) async fn character_source(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let mut store = lock_store(&state.characters)?;
    Ok(Json(ApiResponse::success(store.source(&id)?)))
}

pub(super) async fn character_stats(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let mut store = lock_store(&state.characters)?;
    Ok(Json(ApiResponse::success(store.stats()?)))
}

pub(super) async fn create_character(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, ApiError> {
    let request: CreateRequest = serde_json::from_value(body).map_err(|_| {
        ApiError::ValidationMessage("Request body must contain 'id' and 'data'".to_string())
    })?;
    let mut store = lock_store(&state.characters)?;
    let record = store.create(&request.id, &request.data)?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(
            record,
            format!("Character '{}' created", request.id),
        )),
    ))
}

pub(super) async fn update_character(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, ApiError> {
    // Accept both the `{"data": {...}}` wrapper and a bare record.
    let data = body.get("data").cloned().unwrap_or(body);
    let mut store = lock_store(&state.characters)?;
    let (record, is_override) = store.update(&id, &data)?;
    Ok(Json(ApiResponse::success(UpdateResult {
        record,
        is_override,
    })))
}

pub(super) async fn delete_character(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let mut store = lock_store(&state.characters)?;
    store.delete(&id)?;
    Ok(Json(ApiResponse::message_only(format!(
        "Character '{id}' deleted"
    ))))
}
