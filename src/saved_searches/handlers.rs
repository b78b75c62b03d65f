use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use bson::oid::ObjectId;
use serde_json::json;
use tracing::{info, instrument, warn};

use crate::{
    activity,
    auth::AuthUser,
    error::{ApiError, Json},
    state::AppState,
    store::SavedSearch,
};

use super::dto::{CreateSavedSearchRequest, SavedSearchOut};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_searches).post(create_search))
        .route("/:id", get(get_search).delete(delete_search))
}

/// Parses a path id, then loads the search and enforces ownership. A bad id
/// and a missing record are both 404 so ids cannot be probed.
async fn load_owned(
    state: &AppState,
    user_id: ObjectId,
    id: &str,
    deny: &'static str,
) -> Result<SavedSearch, ApiError> {
    let oid = ObjectId::parse_str(id).map_err(|_| ApiError::NotFound("Invalid ID format"))?;
    let search = state
        .store
        .get_search(oid)
        .await?
        .ok_or(ApiError::NotFound("Saved search not found"))?;
    if search.user_id != user_id {
        warn!(user_id = %user_id, search_id = %id, "saved search ownership check failed");
        return Err(ApiError::Forbidden(deny));
    }
    Ok(search)
}

#[instrument(skip(state))]
async fn list_searches(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<SavedSearchOut>>, ApiError> {
    let searches = state.store.list_searches(user_id).await?;
    activity::track(&state, user_id, "list_saved_searches", None).await;
    Ok(Json(
        searches.into_iter().map(SavedSearchOut::from).collect(),
    ))
}

#[instrument(skip(state, payload))]
async fn create_search(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<CreateSavedSearchRequest>,
) -> Result<Response, ApiError> {
    if !payload.params.is_object() {
        return Err(ApiError::Validation("params must be an object".into()));
    }

    let search = SavedSearch::new(
        user_id,
        payload.name,
        payload.params,
        payload.snapshot.unwrap_or_default(),
        payload.notes,
    );
    state.store.insert_search(&search).await?;

    info!(user_id = %user_id, search_id = %search.id, "saved search created");
    activity::track(
        &state,
        user_id,
        "create_saved_search",
        Some(json!({ "name": search.name, "params": search.params })),
    )
    .await;

    Ok((StatusCode::CREATED, Json(SavedSearchOut::from(search))).into_response())
}

#[instrument(skip(state))]
async fn get_search(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<SavedSearchOut>, ApiError> {
    let search = load_owned(
        &state,
        user_id,
        &id,
        "Not authorized to access this saved search",
    )
    .await?;

    activity::track(
        &state,
        user_id,
        "view_saved_search",
        Some(json!({ "search_id": id })),
    )
    .await;
    Ok(Json(SavedSearchOut::from(search)))
}

#[instrument(skip(state))]
async fn delete_search(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let search = load_owned(
        &state,
        user_id,
        &id,
        "Not authorized to delete this saved search",
    )
    .await?;

    state.store.delete_search(search.id).await?;
    info!(user_id = %user_id, search_id = %id, "saved search deleted");
    activity::track(
        &state,
        user_id,
        "delete_saved_search",
        Some(json!({ "search_id": id })),
    )
    .await;
    Ok(StatusCode::NO_CONTENT)
}
