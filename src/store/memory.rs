//! In-memory store used by the test suite and storage-less dev runs.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use bson::{oid::ObjectId, DateTime};

use super::{
    Activity, ActivityStore, DataStore, Product, ProductQuery, ProductStore, SavedSearch,
    SavedSearchStore, StoreError, StoreResult, User, UserStore,
};

#[derive(Default, Clone)]
pub struct MemoryStore {
    users: Arc<RwLock<HashMap<ObjectId, User>>>,
    products: Arc<RwLock<Vec<Product>>>,
    searches: Arc<RwLock<HashMap<ObjectId, SavedSearch>>>,
    activities: Arc<RwLock<Vec<Activity>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a catalog entry; the API itself never writes products.
    pub fn add_product(&self, product: Product) {
        self.products.write().unwrap().push(product);
    }

    /// Test hook: ages a user's reset token past its expiry.
    pub fn expire_reset_token(&self, email: &str) {
        let mut users = self.users.write().unwrap();
        if let Some(user) = users.values_mut().find(|u| u.email == email) {
            user.reset_password_expires =
                Some(DateTime::from_millis(DateTime::now().timestamp_millis() - 1_000));
        }
    }

    pub fn activity_count(&self) -> usize {
        self.activities.read().unwrap().len()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        let mut users = self.users.write().unwrap();
        if users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Duplicate);
        }
        users.insert(user.id, user.clone());
        Ok(())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let users = self.users.read().unwrap();
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_id(&self, id: ObjectId) -> StoreResult<Option<User>> {
        Ok(self.users.read().unwrap().get(&id).cloned())
    }

    async fn touch_last_login(&self, id: ObjectId, at: DateTime) -> StoreResult<()> {
        if let Some(user) = self.users.write().unwrap().get_mut(&id) {
            user.last_login_at = Some(at);
        }
        Ok(())
    }

    async fn set_google_id(&self, id: ObjectId, google_id: &str) -> StoreResult<()> {
        if let Some(user) = self.users.write().unwrap().get_mut(&id) {
            user.google_id = Some(google_id.to_string());
        }
        Ok(())
    }

    async fn set_reset_token(
        &self,
        id: ObjectId,
        token: &str,
        expires: DateTime,
    ) -> StoreResult<()> {
        if let Some(user) = self.users.write().unwrap().get_mut(&id) {
            user.reset_password_token = Some(token.to_string());
            user.reset_password_expires = Some(expires);
        }
        Ok(())
    }

    async fn consume_reset_token(
        &self,
        token: &str,
        now: DateTime,
        new_password_hash: &str,
    ) -> StoreResult<Option<ObjectId>> {
        let mut users = self.users.write().unwrap();
        let matched = users.values_mut().find(|u| {
            u.reset_password_token.as_deref() == Some(token)
                && u.reset_password_expires.map(|e| e > now).unwrap_or(false)
        });
        match matched {
            Some(user) => {
                user.password_hash = Some(new_password_hash.to_string());
                user.reset_password_token = None;
                user.reset_password_expires = None;
                Ok(Some(user.id))
            }
            None => Ok(None),
        }
    }
}

fn sort_key(product: &Product, field: &str) -> f64 {
    match field {
        "hypeScore" => product.hype_score,
        "growthWeekly" => product.growth_weekly.unwrap_or(f64::NEG_INFINITY),
        "growthMonthly" => product.growth_monthly.unwrap_or(f64::NEG_INFINITY),
        "createdAt" => product
            .created_at
            .map(|d| d.timestamp_millis() as f64)
            .unwrap_or(f64::NEG_INFINITY),
        _ => product.hype_score,
    }
}

#[async_trait]
impl ProductStore for MemoryStore {
    async fn list_products(&self, query: &ProductQuery) -> StoreResult<(u64, Vec<Product>)> {
        let products = self.products.read().unwrap();
        let needle = query.q.as_ref().map(|q| q.to_lowercase());
        let mut matches: Vec<Product> = products
            .iter()
            .filter(|p| {
                query.niche.as_ref().map(|v| &p.niche == v).unwrap_or(true)
                    && query.platform.as_ref().map(|v| &p.platform == v).unwrap_or(true)
                    && query.region.as_ref().map(|v| &p.region == v).unwrap_or(true)
                    && needle
                        .as_ref()
                        .map(|q| p.title.to_lowercase().contains(q))
                        .unwrap_or(true)
            })
            .cloned()
            .collect();

        if query.sort.field == "title" {
            matches.sort_by(|a, b| a.title.cmp(&b.title));
        } else {
            let field = query.sort.field.clone();
            matches.sort_by(|a, b| sort_key(a, &field).total_cmp(&sort_key(b, &field)));
        }
        if query.sort.descending {
            matches.reverse();
        }

        let total = matches.len() as u64;
        let page = matches
            .into_iter()
            .skip(query.offset as usize)
            .take(query.limit.max(0) as usize)
            .collect();
        Ok((total, page))
    }

    async fn get_product(&self, id: ObjectId) -> StoreResult<Option<Product>> {
        let products = self.products.read().unwrap();
        Ok(products.iter().find(|p| p.id == id).cloned())
    }
}

#[async_trait]
impl SavedSearchStore for MemoryStore {
    async fn insert_search(&self, search: &SavedSearch) -> StoreResult<()> {
        self.searches
            .write()
            .unwrap()
            .insert(search.id, search.clone());
        Ok(())
    }

    async fn list_searches(&self, user_id: ObjectId) -> StoreResult<Vec<SavedSearch>> {
        let searches = self.searches.read().unwrap();
        let mut mine: Vec<SavedSearch> = searches
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        mine.sort_by_key(|s| std::cmp::Reverse(s.created_at));
        Ok(mine)
    }

    async fn get_search(&self, id: ObjectId) -> StoreResult<Option<SavedSearch>> {
        Ok(self.searches.read().unwrap().get(&id).cloned())
    }

    async fn delete_search(&self, id: ObjectId) -> StoreResult<()> {
        self.searches.write().unwrap().remove(&id);
        Ok(())
    }
}

#[async_trait]
impl ActivityStore for MemoryStore {
    async fn record_activity(&self, activity: Activity) -> StoreResult<()> {
        self.activities.write().unwrap().push(activity);
        Ok(())
    }
}

#[async_trait]
impl DataStore for MemoryStore {
    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}
