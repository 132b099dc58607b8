use async_trait::async_trait;
use futures::TryStreamExt;
use bson::{Bson, Document, doc};
use log::{debug, info};
use mongodb::{
    Client, Collection as MongoCollection,
    options::{AggregateOptions as MongoAggregateOptions, ClientOptions, FindOptions as MongoFindOptions, ReturnDocument},
};
use labstore_core::{
    backend::{StoreBackend, StoreBackendBuilder, Update},
    error::{DbError, DbResult},
    query::{AggregateOptions, Expr, FindOptions, SortDirection},
};

use crate::{error::translate, query::MongoQueryTranslator};


#[derive(Debug)]
pub struct MongoDbStore {
    client: Client,
    database: String,
}

impl MongoDbStore {
    pub fn new(client: Client, database: String) -> Self {
        Self { client, database }
    }

    pub fn builder(uri: &str, database: &str) -> MongoDbStoreBuilder {
        MongoDbStoreBuilder::new(uri, database)
    }

    /// Returns the name of the database every collection lives in.
    pub fn database_name(&self) -> &str {
        &self.database
    }

    fn get_collection(&self, collection_name: &str) -> MongoCollection<Document> {
        self.client
            .database(&self.database)
            .collection(collection_name)
    }
}

fn find_options(options: &FindOptions) -> DbResult<MongoFindOptions> {
    let mut mongo = MongoFindOptions::default();

    if let Some(limit) = options.limit {
        mongo.limit = Some(
            i64::try_from(limit).map_err(|_| DbError::operation(None, "Limit is out of range"))?,
        );
    }
    if let Some(skip) = options.skip {
        mongo.skip = Some(skip as u64);
    }
    if !options.sort.is_empty() {
        mongo.sort = Some(Document::from_iter(options.sort.iter().map(|sort| {
            (
                sort.field.clone(),
                Bson::Int32(match sort.direction {
                    SortDirection::Asc => 1,
                    SortDirection::Desc => -1,
                }),
            )
        })));
    }
    mongo.projection = options.projection.clone();

    Ok(mongo)
}

fn update_document(update: Update, upsert: bool) -> Document {
    let mut modification = Document::new();

    if !update.set.is_empty() {
        modification.insert("$set", update.set);
    }
    if upsert && !update.set_on_insert.is_empty() {
        modification.insert("$setOnInsert", update.set_on_insert);
    }

    modification
}

#[async_trait]
impl StoreBackend for MongoDbStore {
    async fn ping(&self) -> DbResult<()> {
        self.client
            .database(&self.database)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(translate)?;

        Ok(())
    }

    async fn find(
        &self,
        collection: &str,
        filter: &Expr,
        options: &FindOptions,
    ) -> DbResult<Vec<Document>> {
        self.get_collection(collection)
            .find(MongoQueryTranslator::translate(filter)?)
            .with_options(find_options(options)?)
            .await
            .map_err(translate)?
            .try_collect::<Vec<Document>>()
            .await
            .map_err(translate)
    }

    async fn find_one(&self, collection: &str, filter: &Expr) -> DbResult<Option<Document>> {
        self.get_collection(collection)
            .find_one(MongoQueryTranslator::translate(filter)?)
            .await
            .map_err(translate)
    }

    async fn insert_one(&self, collection: &str, document: Document) -> DbResult<Option<Bson>> {
        let result = self.get_collection(collection)
            .insert_one(document)
            .await
            .map_err(translate)?;

        Ok(Some(result.inserted_id))
    }

    async fn find_one_and_update(
        &self,
        collection: &str,
        filter: &Expr,
        update: Update,
        upsert: bool,
    ) -> DbResult<Option<Document>> {
        self.get_collection(collection)
            .find_one_and_update(
                MongoQueryTranslator::translate(filter)?,
                update_document(update, upsert),
            )
            .upsert(upsert)
            .return_document(ReturnDocument::After)
            .await
            .map_err(translate)
    }

    async fn update_many(&self, collection: &str, filter: &Expr, set: Document) -> DbResult<u64> {
        let result = self.get_collection(collection)
            .update_many(
                MongoQueryTranslator::translate(filter)?,
                doc! { "$set": set },
            )
            .await
            .map_err(translate)?;

        Ok(result.modified_count)
    }

    async fn delete_one(&self, collection: &str, filter: &Expr) -> DbResult<u64> {
        let result = self.get_collection(collection)
            .delete_one(MongoQueryTranslator::translate(filter)?)
            .await
            .map_err(translate)?;

        Ok(result.deleted_count)
    }

    async fn aggregate(
        &self,
        collection: &str,
        pipeline: Vec<Document>,
        options: &AggregateOptions,
    ) -> DbResult<Vec<Document>> {
        let mut mongo = MongoAggregateOptions::default();
        mongo.allow_disk_use = options.allow_disk_use;
        mongo.batch_size = options.batch_size;
        mongo.max_time = options.max_time;

        self.get_collection(collection)
            .aggregate(pipeline)
            .with_options(mongo)
            .await
            .map_err(translate)?
            .try_collect::<Vec<Document>>()
            .await
            .map_err(translate)
    }

    async fn shutdown(&self) -> DbResult<()> {
        self.client.clone().shutdown().await;
        info!("Closed connection to {}", self.database);

        Ok(())
    }
}

pub struct MongoDbStoreBuilder {
    uri: String,
    database: String,
    app_name: Option<String>,
}

impl MongoDbStoreBuilder {
    pub fn new(uri: &str, database: &str) -> Self {
        Self {
            uri: uri.to_string(),
            database: database.to_string(),
            app_name: None,
        }
    }

    /// Sets the application name the server records for this client.
    pub fn app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = Some(app_name.into());
        self
    }
}

#[async_trait]
impl StoreBackendBuilder for MongoDbStoreBuilder {
    type Backend = MongoDbStore;

    /// Parses the connection string and creates the client.
    ///
    /// The driver connects lazily, so an unreachable server surfaces on the first
    /// operation, normally the readiness ping.
    async fn build(self) -> DbResult<Self::Backend> {
        if self.database.is_empty() {
            return Err(DbError::Configuration("Database name must not be empty".into()));
        }

        let mut options = ClientOptions::parse(&self.uri)
            .await
            .map_err(|e| DbError::connection(None, e.to_string()))?;
        if let Some(app_name) = self.app_name {
            options.app_name = Some(app_name);
        }

        debug!("Connecting to database {}", self.database);

        Ok(MongoDbStore::new(
            Client::with_options(options)
                .map_err(|e| DbError::connection(None, e.to_string()))?,
            self.database,
        ))
    }
}
