use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::store::SavedSearch;

#[derive(Debug, Deserialize)]
pub struct CreateSavedSearchRequest {
    pub name: Option<String>,
    pub params: Value,
    pub snapshot: Option<Vec<Value>>,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedSearchOut {
    pub id: String,
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub params: Value,
    pub result_snapshot: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub created_at: String,
}

impl From<SavedSearch> for SavedSearchOut {
    fn from(search: SavedSearch) -> Self {
        Self {
            id: search.id.to_hex(),
            user_id: search.user_id.to_hex(),
            name: search.name,
            params: search.params,
            result_snapshot: search.result_snapshot,
            notes: search.notes,
            created_at: search
                .created_at
                .try_to_rfc3339_string()
                .unwrap_or_default(),
        }
    }
}
