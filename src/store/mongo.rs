//! MongoDB-backed store. Collections mirror the document shapes in
//! `store::mod`; indexes are ensured at connect time.

use async_trait::async_trait;
use bson::{doc, oid::ObjectId, DateTime, Document};
use futures::stream::TryStreamExt;
use mongodb::{
    error::{ErrorKind, WriteFailure},
    options::{ClientOptions, FindOptions, IndexOptions},
    Client, Collection, Database, IndexModel,
};
use tracing::{info, warn};

use super::{
    Activity, ActivityStore, DataStore, Product, ProductQuery, ProductStore, SavedSearch,
    SavedSearchStore, StoreError, StoreResult, User, UserStore,
};

#[derive(Clone)]
pub struct MongoStore {
    db: Database,
    users: Collection<User>,
    products: Collection<Product>,
    searches: Collection<SavedSearch>,
    activities: Collection<Activity>,
}

fn is_duplicate_key(e: &mongodb::error::Error) -> bool {
    match e.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(we)) => we.code == 11000,
        _ => false,
    }
}

impl MongoStore {
    pub async fn connect(uri: &str, db_name: &str) -> anyhow::Result<Self> {
        let mut options = ClientOptions::parse(uri).await?;
        options.app_name = Some("trendscout".into());
        let client = Client::with_options(options)?;
        let db = client.database(db_name);

        // Fail fast on an unreachable server rather than at first request.
        db.run_command(doc! {"ping": 1}, None).await?;
        info!(database = %db_name, "connected to mongodb");

        let store = Self {
            users: db.collection("users"),
            products: db.collection("products"),
            searches: db.collection("saved_searches"),
            activities: db.collection("user_activity"),
            db,
        };
        store.ensure_indexes().await;
        Ok(store)
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    async fn ensure_indexes(&self) {
        let unique = IndexOptions::builder().unique(true).build();
        let user_indexes = vec![
            IndexModel::builder()
                .keys(doc! {"email": 1})
                .options(unique)
                .build(),
            IndexModel::builder().keys(doc! {"googleId": 1}).build(),
        ];
        let product_indexes = vec![
            IndexModel::builder().keys(doc! {"title": "text"}).build(),
            IndexModel::builder().keys(doc! {"niche": 1}).build(),
            IndexModel::builder().keys(doc! {"platform": 1}).build(),
            IndexModel::builder().keys(doc! {"region": 1}).build(),
            IndexModel::builder().keys(doc! {"hypeScore": -1}).build(),
        ];

        if let Err(e) = self.users.create_indexes(user_indexes, None).await {
            warn!(error = %e, "users index creation failed; continuing");
        }
        if let Err(e) = self.products.create_indexes(product_indexes, None).await {
            warn!(error = %e, "products index creation failed; continuing");
        }
        if let Err(e) = self
            .searches
            .create_indexes(
                vec![IndexModel::builder().keys(doc! {"userId": 1}).build()],
                None,
            )
            .await
        {
            warn!(error = %e, "saved_searches index creation failed; continuing");
        }
        if let Err(e) = self
            .activities
            .create_indexes(
                vec![IndexModel::builder().keys(doc! {"userId": 1}).build()],
                None,
            )
            .await
        {
            warn!(error = %e, "user_activity index creation failed; continuing");
        }
    }
}

#[async_trait]
impl UserStore for MongoStore {
    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        match self.users.insert_one(user, None).await {
            Ok(_) => Ok(()),
            Err(e) if is_duplicate_key(&e) => Err(StoreError::Duplicate),
            Err(e) => Err(e.into()),
        }
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(self.users.find_one(doc! {"email": email}, None).await?)
    }

    async fn find_user_by_id(&self, id: ObjectId) -> StoreResult<Option<User>> {
        Ok(self.users.find_one(doc! {"_id": id}, None).await?)
    }

    async fn touch_last_login(&self, id: ObjectId, at: DateTime) -> StoreResult<()> {
        self.users
            .update_one(doc! {"_id": id}, doc! {"$set": {"lastLoginAt": at}}, None)
            .await?;
        Ok(())
    }

    async fn set_google_id(&self, id: ObjectId, google_id: &str) -> StoreResult<()> {
        self.users
            .update_one(doc! {"_id": id}, doc! {"$set": {"googleId": google_id}}, None)
            .await?;
        Ok(())
    }

    async fn set_reset_token(
        &self,
        id: ObjectId,
        token: &str,
        expires: DateTime,
    ) -> StoreResult<()> {
        self.users
            .update_one(
                doc! {"_id": id},
                doc! {"$set": {"resetPasswordToken": token, "resetPasswordExpires": expires}},
                None,
            )
            .await?;
        Ok(())
    }

    async fn consume_reset_token(
        &self,
        token: &str,
        now: DateTime,
        new_password_hash: &str,
    ) -> StoreResult<Option<ObjectId>> {
        // Single update-with-filter so a token can never be redeemed twice.
        let filter = doc! {
            "resetPasswordToken": token,
            "resetPasswordExpires": {"$gt": now},
        };
        let update = doc! {
            "$set": {"passwordHash": new_password_hash},
            "$unset": {"resetPasswordToken": "", "resetPasswordExpires": ""},
        };
        let user = self.users.find_one_and_update(filter, update, None).await?;
        Ok(user.map(|u| u.id))
    }
}

#[async_trait]
impl ProductStore for MongoStore {
    async fn list_products(&self, query: &ProductQuery) -> StoreResult<(u64, Vec<Product>)> {
        let mut filter = Document::new();
        if let Some(niche) = &query.niche {
            filter.insert("niche", niche.as_str());
        }
        if let Some(platform) = &query.platform {
            filter.insert("platform", platform.as_str());
        }
        if let Some(region) = &query.region {
            filter.insert("region", region.as_str());
        }
        if let Some(q) = &query.q {
            filter.insert("$text", doc! {"$search": q.as_str()});
        }

        let total = self.products.count_documents(filter.clone(), None).await?;

        let mut sort = Document::new();
        sort.insert(
            query.sort.field.clone(),
            if query.sort.descending { -1 } else { 1 },
        );
        let options = FindOptions::builder()
            .sort(sort)
            .skip(query.offset)
            .limit(query.limit)
            .build();

        let mut cursor = self.products.find(filter, options).await?;
        let mut items = Vec::new();
        while let Some(product) = cursor.try_next().await? {
            items.push(product);
        }
        Ok((total, items))
    }

    async fn get_product(&self, id: ObjectId) -> StoreResult<Option<Product>> {
        Ok(self.products.find_one(doc! {"_id": id}, None).await?)
    }
}

#[async_trait]
impl SavedSearchStore for MongoStore {
    async fn insert_search(&self, search: &SavedSearch) -> StoreResult<()> {
        self.searches.insert_one(search, None).await?;
        Ok(())
    }

    async fn list_searches(&self, user_id: ObjectId) -> StoreResult<Vec<SavedSearch>> {
        let options = FindOptions::builder().sort(doc! {"createdAt": -1}).build();
        let mut cursor = self
            .searches
            .find(doc! {"userId": user_id}, options)
            .await?;
        let mut items = Vec::new();
        while let Some(search) = cursor.try_next().await? {
            items.push(search);
        }
        Ok(items)
    }

    async fn get_search(&self, id: ObjectId) -> StoreResult<Option<SavedSearch>> {
        Ok(self.searches.find_one(doc! {"_id": id}, None).await?)
    }

    async fn delete_search(&self, id: ObjectId) -> StoreResult<()> {
        self.searches.delete_one(doc! {"_id": id}, None).await?;
        Ok(())
    }
}

#[async_trait]
impl ActivityStore for MongoStore {
    async fn record_activity(&self, activity: Activity) -> StoreResult<()> {
        self.activities.insert_one(activity, None).await?;
        Ok(())
    }
}

#[async_trait]
impl DataStore for MongoStore {
    async fn ping(&self) -> StoreResult<()> {
        self.db.run_command(doc! {"ping": 1}, None).await?;
        Ok(())
    }
}
