//! Persistence layer: document models, the store traits handlers talk to,
//! and the MongoDB / in-memory implementations.

pub mod memory;
pub mod mongo;

use async_trait::async_trait;
use bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("duplicate key")]
    Duplicate,
    #[error(transparent)]
    Database(#[from] mongodb::error::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Identity record. Email is unique; OAuth-only accounts have no hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub name: Option<String>,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub google_id: Option<String>,
    pub created_at: DateTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_login_at: Option<DateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_password_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_password_expires: Option<DateTime>,
}

impl User {
    pub fn new_local(name: Option<String>, email: String, password_hash: String) -> Self {
        Self {
            id: ObjectId::new(),
            name,
            email,
            password_hash: Some(password_hash),
            google_id: None,
            created_at: DateTime::now(),
            last_login_at: None,
            reset_password_token: None,
            reset_password_expires: None,
        }
    }

    pub fn new_google(name: Option<String>, email: String, google_id: String) -> Self {
        Self {
            id: ObjectId::new(),
            name,
            email,
            password_hash: None,
            google_id: Some(google_id),
            created_at: DateTime::now(),
            last_login_at: None,
            reset_password_token: None,
            reset_password_expires: None,
        }
    }
}

/// Catalog entry; read-only for this service, seeded externally.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub title: String,
    pub platform: String,
    pub niche: String,
    pub region: String,
    #[serde(default)]
    pub hype_score: f64,
    pub growth_weekly: Option<f64>,
    pub growth_monthly: Option<f64>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: Option<DateTime>,
}

/// A saved product query owned by a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedSearch {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub user_id: ObjectId,
    pub name: Option<String>,
    pub params: serde_json::Value,
    #[serde(default)]
    pub result_snapshot: Vec<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub created_at: DateTime,
}

impl SavedSearch {
    pub fn new(
        user_id: ObjectId,
        name: Option<String>,
        params: serde_json::Value,
        result_snapshot: Vec<serde_json::Value>,
        notes: Option<String>,
    ) -> Self {
        Self {
            id: ObjectId::new(),
            user_id,
            name,
            params,
            result_snapshot,
            notes,
            created_at: DateTime::now(),
        }
    }
}

/// One audit-trail entry; written best-effort, never read back by the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub user_id: ObjectId,
    pub action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
    pub timestamp: DateTime,
}

impl Activity {
    pub fn new(user_id: ObjectId, action: &str, params: Option<serde_json::Value>) -> Self {
        Self {
            user_id,
            action: action.to_string(),
            params,
            timestamp: DateTime::now(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProductSort {
    pub field: String,
    pub descending: bool,
}

impl Default for ProductSort {
    fn default() -> Self {
        Self {
            field: "hypeScore".into(),
            descending: true,
        }
    }
}

/// Filter, sort and pagination for a product listing, already validated.
#[derive(Debug, Clone, Default)]
pub struct ProductQuery {
    pub niche: Option<String>,
    pub platform: Option<String>,
    pub region: Option<String>,
    pub q: Option<String>,
    pub sort: ProductSort,
    pub limit: i64,
    pub offset: u64,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Inserts a fully-formed user; `StoreError::Duplicate` if the email is taken.
    async fn insert_user(&self, user: &User) -> StoreResult<()>;
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    async fn find_user_by_id(&self, id: ObjectId) -> StoreResult<Option<User>>;
    async fn touch_last_login(&self, id: ObjectId, at: DateTime) -> StoreResult<()>;
    async fn set_google_id(&self, id: ObjectId, google_id: &str) -> StoreResult<()>;
    async fn set_reset_token(
        &self,
        id: ObjectId,
        token: &str,
        expires: DateTime,
    ) -> StoreResult<()>;
    /// Atomically trades an unexpired reset token for a new password hash.
    /// Returns the affected user id, or `None` if the token is unknown,
    /// already consumed, or past expiry.
    async fn consume_reset_token(
        &self,
        token: &str,
        now: DateTime,
        new_password_hash: &str,
    ) -> StoreResult<Option<ObjectId>>;
}

#[async_trait]
pub trait ProductStore: Send + Sync {
    /// Returns the total match count and the requested page.
    async fn list_products(&self, query: &ProductQuery) -> StoreResult<(u64, Vec<Product>)>;
    async fn get_product(&self, id: ObjectId) -> StoreResult<Option<Product>>;
}

#[async_trait]
pub trait SavedSearchStore: Send + Sync {
    async fn insert_search(&self, search: &SavedSearch) -> StoreResult<()>;
    /// Newest first.
    async fn list_searches(&self, user_id: ObjectId) -> StoreResult<Vec<SavedSearch>>;
    async fn get_search(&self, id: ObjectId) -> StoreResult<Option<SavedSearch>>;
    async fn delete_search(&self, id: ObjectId) -> StoreResult<()>;
}

#[async_trait]
pub trait ActivityStore: Send + Sync {
    async fn record_activity(&self, activity: Activity) -> StoreResult<()>;
}

/// The one object handlers hold: every collection behind a single `Arc<dyn>`.
#[async_trait]
pub trait DataStore: UserStore + ProductStore + SavedSearchStore + ActivityStore {
    async fn ping(&self) -> StoreResult<()>;
}
