use super::*;

use crate::overlay;
use crate::world::{GameWorld, WorldContent};

pub(super) async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(ApiResponse::success(HealthStatus {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: state.started_at.elapsed().as_secs(),
    }))
}

/// Merged game tuning config, read fresh so external edits to either layer
/// show up without a restart.
pub(super) async fn get_game_config(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let base = overlay::read_json_document(&state.config.game_config_base_path, true)?
        .unwrap_or(Value::Null);
    let merged = match overlay::read_json_document(&state.config.game_config_custom_path, false)? {
        Some(custom) => overlay::merge_game_config(&base, &custom),
        None => base,
    };
    Ok(Json(ApiResponse::success(merged)))
}

/// Run a headless game against the current merged content and report how
/// it went. Useful for sanity-checking a balance change right after
/// saving it.
pub(super) async fn simulate(
    State(state): State<AppState>,
    Json(request): Json<SimulateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if request.ticks == 0 || request.ticks > 60 * 60 * 60 {
        return Err(ApiError::ValidationMessage(
            "ticks must be between 1 and 216000".to_string(),
        ));
    }

    let content = {
        let mut characters = lock_store(&state.characters)?;
        let mut items = lock_store(&state.items)?;
        items.reload()?;
        let base = overlay::read_json_document(&state.config.game_config_base_path, false)?
            .unwrap_or(Value::Null);
        let game_config =
            match overlay::read_json_document(&state.config.game_config_custom_path, false)? {
                Some(custom) => overlay::merge_game_config(&base, &custom),
                None => base,
            };
        WorldContent {
            archetypes: characters.all()?.clone(),
            weapons: items.weapons()?,
            projectiles: items.projectiles()?,
            collectibles: items.collectibles()?,
            game_config,
        }
    };

    let mut world = GameWorld::new(content, request.seed);
    world.run(request.ticks);
    Ok(Json(ApiResponse::success(world.summary())))
}
