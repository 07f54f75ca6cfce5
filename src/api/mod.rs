mod router;
mod routes_characters;
mod routes_items;
mod routes_misc;
mod routes_uploads;
mod security;
pub mod types;

use axum::{
    extract::{Path, Query, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::characters::CharacterStore;
use crate::config::AppConfig;
use crate::errors::ApiError;
use crate::items::ItemStore;
use router::build_router;
use routes_characters::*;
use routes_items::*;
use routes_misc::*;
use routes_uploads::*;
use security::*;
use types::*;

/// Shared handler state. The store mutexes serialize check-and-write
/// sequences within this process; the file lock covers other processes
/// sharing the same config directory.
#[derive(Clone)]
pub struct AppState {
    pub characters: Arc<Mutex<CharacterStore>>,
    pub items: Arc<Mutex<ItemStore>>,
    pub config: Arc<AppConfig>,
    pub started_at: std::time::Instant,
}

impl AppState {
    pub fn new(config: AppConfig) -> Result<Self, ApiError> {
        let characters = CharacterStore::open(&config)?;
        let items = ItemStore::open(&config)?;
        Ok(Self {
            characters: Arc::new(Mutex::new(characters)),
            items: Arc::new(Mutex::new(items)),
            config: Arc::new(config),
            started_at: std::time::Instant::now(),
        })
    }
}

/// Lock a shared store, mapping a poisoned mutex into the lock taxonomy
/// instead of panicking inside a handler.
fn lock_store<T>(store: &Mutex<T>) -> Result<std::sync::MutexGuard<'_, T>, ApiError> {
    store.lock().map_err(|_| ApiError::LockAcquisition {
        path: "in-process store".to_string(),
        message: "mutex poisoned by an earlier panic".to_string(),
    })
}

/// Bind and run the editing API until the process exits.
pub async fn serve(config: AppConfig) -> Result<(), ApiError> {
    let bind_addr = config.bind_addr.clone();
    let state = AppState::new(config)?;
    let app = build_router(state, ApiSecurity::from_env());

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|err| ApiError::write(format!("Failed to bind {bind_addr}: {err}")))?;
    log::info!("listening on http://{bind_addr}");

    axum::serve(listener, app)
        .await
        .map_err(|err| ApiError::write(format!("Server error: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poisoned_store_mutex_becomes_a_lock_error() {
        let store = Arc::new(Mutex::new(0_u32));
        let poisoner = Arc::clone(&store);
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.lock().unwrap();
            panic!("poison");
        })
        .join();

        let err = lock_store(&store).err().expect("poisoned lock maps to an error");
        assert_eq!(err.code(), "LOCK_ACQUISITION_ERROR");
    }
}
