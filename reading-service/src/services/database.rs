//! Database operations for the reading service.
//!
//! Readings are append-only audit records in MongoDB: one insert per
//! completed reading, no reads, updates or deletes on the request path.

use crate::models::{ReadingCollection, ReadingRecord};
use async_trait::async_trait;
use mongodb::{
    bson::doc, options::IndexOptions, Client as MongoClient, Collection, Database, IndexModel,
};
use service_core::error::AppError;
use std::collections::HashMap;
use std::sync::Mutex;

/// Append-only sink for reading records.
#[async_trait]
pub trait ReadingStore: Send + Sync {
    async fn append(
        &self,
        collection: ReadingCollection,
        record: &ReadingRecord,
    ) -> Result<(), AppError>;

    async fn health_check(&self) -> Result<(), AppError>;
}

#[derive(Clone)]
pub struct ReadingDb {
    client: MongoClient,
    db: Database,
}

impl ReadingDb {
    pub async fn connect(uri: &str, database: &str) -> Result<Self, AppError> {
        tracing::info!(database = %database, "Connecting to MongoDB");
        let client = MongoClient::with_uri_str(uri).await.map_err(|e| {
            tracing::error!("Failed to connect to MongoDB: {}", e);
            AppError::DatabaseError(anyhow::anyhow!(e.to_string()))
        })?;
        let db = client.database(database);
        tracing::info!(database = %database, "Successfully connected to MongoDB database");
        Ok(Self { client, db })
    }

    pub async fn initialize_indexes(&self) -> Result<(), AppError> {
        tracing::info!("Creating MongoDB indexes for reading-service");

        for collection in [ReadingCollection::Palm, ReadingCollection::Kundali] {
            self.create_reading_indexes(collection).await?;
        }

        tracing::info!("Successfully created all MongoDB indexes");
        Ok(())
    }

    /// Lookup indexes only; duplicate submissions are kept as separate records.
    async fn create_reading_indexes(&self, collection: ReadingCollection) -> Result<(), AppError> {
        let readings = self.readings(collection);

        let user_time_index = IndexModel::builder()
            .keys(doc! { "user_id": 1, "timestamp": -1 })
            .options(
                IndexOptions::builder()
                    .name("user_time_idx".to_string())
                    .build(),
            )
            .build();

        readings
            .create_index(user_time_index, None)
            .await
            .map_err(|e| {
                tracing::error!(
                    collection = collection.name(),
                    "Failed to create user_time index: {}",
                    e
                );
                AppError::DatabaseError(anyhow::anyhow!(e.to_string()))
            })?;

        let timestamp_index = IndexModel::builder()
            .keys(doc! { "timestamp": -1 })
            .options(
                IndexOptions::builder()
                    .name("timestamp_idx".to_string())
                    .build(),
            )
            .build();

        readings
            .create_index(timestamp_index, None)
            .await
            .map_err(|e| {
                tracing::error!(
                    collection = collection.name(),
                    "Failed to create timestamp index: {}",
                    e
                );
                AppError::DatabaseError(anyhow::anyhow!(e.to_string()))
            })?;

        Ok(())
    }

    pub fn readings(&self, collection: ReadingCollection) -> Collection<ReadingRecord> {
        self.db.collection(collection.name())
    }
}

#[async_trait]
impl ReadingStore for ReadingDb {
    async fn append(
        &self,
        collection: ReadingCollection,
        record: &ReadingRecord,
    ) -> Result<(), AppError> {
        self.readings(collection)
            .insert_one(record, None)
            .await
            .map_err(|e| {
                tracing::error!(collection = collection.name(), "Failed to insert reading: {}", e);
                AppError::DatabaseError(anyhow::anyhow!(e.to_string()))
            })?;
        Ok(())
    }

    async fn health_check(&self) -> Result<(), AppError> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(|e| {
                tracing::error!("MongoDB health check failed: {}", e);
                AppError::DatabaseError(anyhow::anyhow!(e.to_string()))
            })?;
        Ok(())
    }
}

/// In-memory store for tests.
#[derive(Default)]
pub struct InMemoryReadingStore {
    records: Mutex<HashMap<ReadingCollection, Vec<ReadingRecord>>>,
    failing: bool,
}

impl InMemoryReadingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose every write and health check fails.
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn records(&self, collection: ReadingCollection) -> Vec<ReadingRecord> {
        self.records
            .lock()
            .ok()
            .and_then(|records| records.get(&collection).cloned())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ReadingStore for InMemoryReadingStore {
    async fn append(
        &self,
        collection: ReadingCollection,
        record: &ReadingRecord,
    ) -> Result<(), AppError> {
        if self.failing {
            return Err(AppError::DatabaseError(anyhow::anyhow!(
                "in-memory store is failing"
            )));
        }

        let mut records = self
            .records
            .lock()
            .map_err(|e| AppError::InternalError(anyhow::anyhow!(e.to_string())))?;
        records.entry(collection).or_default().push(record.clone());
        Ok(())
    }

    async fn health_check(&self) -> Result<(), AppError> {
        if self.failing {
            return Err(AppError::DatabaseError(anyhow::anyhow!(
                "in-memory store is failing"
            )));
        }
        Ok(())
    }
}
