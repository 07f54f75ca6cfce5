use super::*;

use crate::records::ItemCategory;

fn parse_category(segment: &str) -> Result<ItemCategory, ApiError> {
    segment.parse()
}

/// Full merged item document, all three categories.
pub(super) async fn list_items(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let mut store = lock_store(&state.items)?;
    Ok(Json(ApiResponse::success(store.document()?)))
}

/// Per-category stats across the whole document.
pub(super) async fn all_item_stats(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let mut store = lock_store(&state.items)?;
    Ok(Json(ApiResponse::success(store.all_stats()?)))
}

pub(super) async fn list_category(
    State(state): State<AppState>,
    Path(category): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let category = parse_category(&category)?;
    let mut store = lock_store(&state.items)?;
    Ok(Json(ApiResponse::success(store.all(category)?.clone())))
}

pub(super) async fn get_item(
    State(state): State<AppState>,
    Path((category, id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let category = parse_category(&category)?;
    let mut store = lock_store(&state.items)?;
    Ok(Json(ApiResponse::success(store.get(category, &id)?.clone())))
}

pub(super) async fn item_source(
    State(state): State<AppState>,
    Path((category, id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let category = parse_category(&category)?;
    let mut store = lock_store(&state.items)?;
    Ok(Json(ApiResponse::success(store.source(category, &id)?)))
}

pub(super) async fn item_stats(
    State(state): State<AppState>,
    Path(category): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let category = parse_category(&category)?;
    let mut store = lock_store(&state.items)?;
    Ok(Json(ApiResponse::success(store.stats(category)?)))
}

pub(super) async fn create_item(
    State(state): State<AppState>,
    Path(category): Path<String>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, ApiError> {
    let category = parse_category(&category)?;
    let request: CreateRequest = serde_json::from_value(body).map_err(|_| {
        ApiError::ValidationMessage("Request body must contain 'id' and 'data'".to_string())
    })?;
    let mut store = lock_store(&state.items)?;
    let record = store.create(category, &request.id, &request.data)?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(
            record,
            format!("{} '{}' created", category.resource(), request.id),
        )),
    ))
}

pub(super) async fn update_item(
    State(state): State<AppState>,
    Path((category, id)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, ApiError> {
    let category = parse_category(&category)?;
    let data = body.get("data").cloned().unwrap_or(body);
    let mut store = lock_store(&state.items)?;
    let (record, is_override) = store.update(category, &id, &data)?;
    Ok(Json(ApiResponse::success(UpdateResult {
        record,
        is_override,
    })))
}

pub(super) async fn delete_item(
    State(state): State<AppState>,
    Path((category, id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let category = parse_category(&category)?;
    let mut store = lock_store(&state.items)?;
    store.delete(category, &id)?;
    Ok(Json(ApiResponse::message_only(format!(
        "{} '{id}' deleted",
        category.resource()
    ))))
}
