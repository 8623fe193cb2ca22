use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde_json::{json, Value};

use crate::auth::require_user;
use crate::db::require_pool;
use crate::error::AppResult;
use crate::ownership::ensure_app_user;
use crate::state::AppState;

/// Verifies the bearer token and mirrors the principal into the users table.
pub async fn me(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Json<Value>> {
    let auth = require_user(&state.config, &headers)?;
    let pool = require_pool(state.db_pool.as_ref())?;
    let user = ensure_app_user(pool, &auth).await?;
    Ok(Json(json!({ "user": user })))
}
