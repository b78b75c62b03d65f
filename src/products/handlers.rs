use axum::{
    extract::{Path, State},
    routing::get,
    Router,
};
use bson::oid::ObjectId;
use serde_json::{json, Map, Value};
use tracing::{info, instrument};

use crate::{
    activity,
    auth::AuthUser,
    error::{ApiError, Json, Query},
    state::AppState,
    store::{ProductQuery, ProductSort},
};

use super::dto::{ProductListParams, ProductOut, ProductPage};

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 500;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products))
        .route("/:id", get(get_product))
}

fn none_if_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// `field:asc` / `field:desc`; a bare field name sorts descending, which is
/// what a trend listing wants by default.
fn parse_sort(raw: Option<&str>) -> ProductSort {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return ProductSort::default();
    };
    let (field, order) = match raw.split_once(':') {
        Some((field, order)) => (field, Some(order)),
        None => (raw, None),
    };
    if field.is_empty() {
        return ProductSort::default();
    }
    ProductSort {
        field: field.to_string(),
        descending: order.map_or(true, |o| o == "desc"),
    }
}

#[instrument(skip(state, params))]
async fn list_products(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(params): Query<ProductListParams>,
) -> Result<Json<ProductPage>, ApiError> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = params.offset.unwrap_or(0).max(0) as u64;
    let query = ProductQuery {
        niche: none_if_empty(params.niche),
        platform: none_if_empty(params.platform),
        region: none_if_empty(params.region),
        q: none_if_empty(params.q),
        sort: parse_sort(params.sort.as_deref()),
        limit,
        offset,
    };

    let (total, products) = state.store.list_products(&query).await?;

    let mut filters = Map::new();
    if let Some(niche) = &query.niche {
        filters.insert("niche".into(), Value::String(niche.clone()));
    }
    if let Some(platform) = &query.platform {
        filters.insert("platform".into(), Value::String(platform.clone()));
    }
    if let Some(region) = &query.region {
        filters.insert("region".into(), Value::String(region.clone()));
    }
    if let Some(q) = &query.q {
        filters.insert("query".into(), Value::String(q.clone()));
    }
    activity::track(&state, user_id, "search", Some(Value::Object(filters))).await;

    let items: Vec<ProductOut> = products.into_iter().map(ProductOut::from).collect();
    info!(user_id = %user_id, total, returned = items.len(), "product search");
    Ok(Json(ProductPage {
        total,
        limit,
        offset,
        returned: items.len(),
        items,
    }))
}

#[instrument(skip(state))]
async fn get_product(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<ProductOut>, ApiError> {
    let oid = ObjectId::parse_str(&id).map_err(|_| ApiError::NotFound("Not found"))?;
    let product = state
        .store
        .get_product(oid)
        .await?
        .ok_or(ApiError::NotFound("Not found"))?;

    activity::track(
        &state,
        user_id,
        "view_product",
        Some(json!({ "product_id": id })),
    )
    .await;
    Ok(Json(ProductOut::from(product)))
}
