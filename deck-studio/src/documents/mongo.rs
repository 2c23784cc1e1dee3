use anyhow::Result;
use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{self, doc, oid::ObjectId, Document as BsonDocument};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::{FindOptions, IndexOptions};
use mongodb::{Client, Database, IndexModel};
use serde_json::Value;

use super::{
    now_rfc3339, strip_owned_fields, Collection, Document, DocumentStore, ListQuery, SortOrder, CREATED_AT_FIELD,
    ID_FIELD,
};

const DUPLICATE_KEY: i32 = 11000;

/// Documents in MongoDB; `_id` is an ObjectId exposed as a hex `id`.
pub struct MongoDocumentStore {
    db: Database,
}

impl MongoDocumentStore {
    pub async fn connect(uri: &str, database: &str) -> Result<Self> {
        let client = Client::with_uri_str(uri).await?;
        let store = Self {
            db: client.database(database),
        };
        store.ensure_indexes().await?;
        tracing::info!(database, "connected to MongoDB");
        Ok(store)
    }

    async fn ensure_indexes(&self) -> Result<()> {
        for collection in Collection::ALL {
            for field in collection.unique_fields() {
                let model = IndexModel::builder()
                    .keys(doc! { *field: 1 })
                    .options(IndexOptions::builder().unique(true).build())
                    .build();
                self.coll(collection).create_index(model, None).await?;
            }
        }
        Ok(())
    }

    fn coll(&self, collection: Collection) -> mongodb::Collection<BsonDocument> {
        self.db.collection::<BsonDocument>(collection.name())
    }

    /// Unparsable ids cannot exist, so they are simply not found.
    fn object_id(collection: Collection, id: &str) -> Result<ObjectId> {
        ObjectId::parse_str(id).map_err(|_| collection.not_found(id))
    }

    fn to_bson(fields: &Document) -> Result<BsonDocument> {
        Ok(bson::to_document(fields)?)
    }

    fn from_bson(mut raw: BsonDocument) -> Result<Document> {
        let id = raw.get_object_id("_id").ok().map(|oid| oid.to_hex());
        raw.remove("_id");

        let mut doc: Document = bson::from_document(raw)?;
        if let Some(id) = id {
            doc.insert(ID_FIELD.to_string(), Value::String(id));
        }
        Ok(doc)
    }

    fn map_write_error(collection: Collection, fields: &Document, err: mongodb::error::Error) -> anyhow::Error {
        if let ErrorKind::Write(WriteFailure::WriteError(write)) = err.kind.as_ref() {
            if write.code == DUPLICATE_KEY {
                let field = collection.unique_fields().first().copied().unwrap_or("id");
                let value = fields.get(field).cloned().unwrap_or(Value::Null);
                return collection.duplicate(field, &value);
            }
        }
        err.into()
    }
}

#[async_trait]
impl DocumentStore for MongoDocumentStore {
    async fn create(&self, collection: Collection, fields: Document) -> Result<Document> {
        let mut fields = strip_owned_fields(fields);
        fields.insert(CREATED_AT_FIELD.to_string(), Value::String(now_rfc3339()));

        let oid = ObjectId::new();
        let mut raw = Self::to_bson(&fields)?;
        raw.insert("_id", oid);

        self.coll(collection)
            .insert_one(raw, None)
            .await
            .map_err(|e| Self::map_write_error(collection, &fields, e))?;

        fields.insert(ID_FIELD.to_string(), Value::String(oid.to_hex()));
        Ok(fields)
    }

    async fn get(&self, collection: Collection, id: &str) -> Result<Document> {
        let oid = Self::object_id(collection, id)?;
        let found = self
            .coll(collection)
            .find_one(doc! { "_id": oid }, None)
            .await?
            .ok_or_else(|| collection.not_found(id))?;
        Self::from_bson(found)
    }

    async fn list(&self, collection: Collection, query: ListQuery) -> Result<Vec<Document>> {
        let mut filter = BsonDocument::new();
        for (field, value) in &query.filter {
            filter.insert(field.clone(), bson::to_bson(value)?);
        }

        let dir = match query.order {
            SortOrder::NewestFirst => -1,
            SortOrder::OldestFirst => 1,
        };
        let options = FindOptions::builder()
            .sort(doc! { CREATED_AT_FIELD: dir, "_id": dir })
            .build();

        let mut cursor = self.coll(collection).find(filter, options).await?;
        let mut out = Vec::new();
        while let Some(raw) = cursor.try_next().await? {
            out.push(Self::from_bson(raw)?);
        }
        Ok(out)
    }

    async fn update(&self, collection: Collection, id: &str, fields: Document) -> Result<Document> {
        let oid = Self::object_id(collection, id)?;
        let existing = self.get(collection, id).await?;

        let mut fields = strip_owned_fields(fields);
        if let Some(created_at) = existing.get(CREATED_AT_FIELD) {
            fields.insert(CREATED_AT_FIELD.to_string(), created_at.clone());
        }

        let result = self
            .coll(collection)
            .replace_one(doc! { "_id": oid }, Self::to_bson(&fields)?, None)
            .await
            .map_err(|e| Self::map_write_error(collection, &fields, e))?;

        if result.matched_count == 0 {
            return Err(collection.not_found(id));
        }

        fields.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
        Ok(fields)
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<Document> {
        let oid = Self::object_id(collection, id)?;
        let removed = self
            .coll(collection)
            .find_one_and_delete(doc! { "_id": oid }, None)
            .await?
            .ok_or_else(|| collection.not_found(id))?;
        Self::from_bson(removed)
    }

    fn kind(&self) -> &'static str {
        "mongodb"
    }
}
