use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    now_rfc3339, strip_owned_fields, Collection, Document, DocumentStore, ListQuery, SortOrder, CREATED_AT_FIELD,
    ID_FIELD,
};

struct Stored {
    seq: u64,
    doc: Document,
}

#[derive(Default)]
struct Tables {
    next_seq: u64,
    rows: HashMap<Collection, HashMap<String, Stored>>,
}

impl Tables {
    fn table(&self, collection: Collection) -> Option<&HashMap<String, Stored>> {
        self.rows.get(&collection)
    }

    fn table_mut(&mut self, collection: Collection) -> &mut HashMap<String, Stored> {
        self.rows.entry(collection).or_default()
    }

    fn insert(&mut self, collection: Collection, id: String, doc: Document) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.table_mut(collection).insert(id, Stored { seq, doc });
    }

    fn check_unique(&self, collection: Collection, fields: &Document, except_id: Option<&str>) -> Result<()> {
        let Some(table) = self.table(collection) else {
            return Ok(());
        };

        for field in collection.unique_fields() {
            let Some(value) = fields.get(*field).filter(|v| !v.is_null()) else {
                continue;
            };
            let taken = table
                .iter()
                .any(|(id, row)| Some(id.as_str()) != except_id && row.doc.get(*field) == Some(value));
            if taken {
                return Err(collection.duplicate(field, value));
            }
        }
        Ok(())
    }

    /// `{ "<collection>": [records in insertion order] }`
    fn to_snapshot(&self) -> Value {
        let mut out = Map::new();
        for collection in Collection::ALL {
            let mut rows: Vec<&Stored> = self.table(collection).map(|t| t.values().collect()).unwrap_or_default();
            rows.sort_by_key(|r| r.seq);
            let docs = rows.into_iter().map(|r| Value::Object(r.doc.clone())).collect();
            out.insert(collection.name().to_string(), Value::Array(docs));
        }
        Value::Object(out)
    }

    fn from_snapshot(snapshot: &Value) -> Result<Self> {
        let mut tables = Tables::default();
        for collection in Collection::ALL {
            let Some(docs) = snapshot.get(collection.name()).and_then(Value::as_array) else {
                continue;
            };
            for doc in docs {
                let doc = doc
                    .as_object()
                    .cloned()
                    .with_context(|| format!("snapshot entry in '{}' is not an object", collection.name()))?;
                let id = doc
                    .get(ID_FIELD)
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .with_context(|| format!("snapshot entry in '{}' has no id", collection.name()))?;
                tables.insert(collection, id, doc);
            }
        }
        Ok(tables)
    }
}

/// Documents in process memory, optionally mirrored to a JSON file.
///
/// Every mutation holds the write lock for its whole duration, unique
/// checks and the snapshot write included. A mutation whose snapshot
/// write fails is undone in memory before the error is returned.
#[derive(Default)]
pub struct MemoryDocumentStore {
    tables: RwLock<Tables>,
    snapshot: Option<PathBuf>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads `path` when it exists and rewrites it after every mutation.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        let tables = match tokio::fs::read(&path).await {
            Ok(raw) => {
                let snapshot: Value = serde_json::from_slice(&raw)
                    .with_context(|| format!("invalid document snapshot {}", path.display()))?;
                Tables::from_snapshot(&snapshot)?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Tables::default(),
            Err(e) => return Err(e).with_context(|| format!("failed to read {}", path.display())),
        };

        tracing::info!(path = %path.display(), "document snapshot loaded");

        Ok(Self {
            tables: RwLock::new(tables),
            snapshot: Some(path),
        })
    }

    async fn persist(&self, tables: &Tables) -> Result<()> {
        let Some(path) = &self.snapshot else {
            return Ok(());
        };
        let bytes = serde_json::to_vec_pretty(&tables.to_snapshot())?;
        write_atomic(path, &bytes)
            .await
            .with_context(|| format!("failed to write document snapshot {}", path.display()))
    }
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    let mut file = tokio::fs::File::create(&tmp).await?;
    file.write_all(bytes).await?;
    file.sync_all().await?;
    drop(file);

    tokio::fs::rename(&tmp, path).await
}

fn order_rows(mut rows: Vec<&Stored>, order: SortOrder) -> Vec<Document> {
    rows.sort_by(|a, b| {
        let a_ts = a.doc.get(CREATED_AT_FIELD).and_then(Value::as_str).unwrap_or_default();
        let b_ts = b.doc.get(CREATED_AT_FIELD).and_then(Value::as_str).unwrap_or_default();
        a_ts.cmp(b_ts).then(a.seq.cmp(&b.seq))
    });
    if order == SortOrder::NewestFirst {
        rows.reverse();
    }
    rows.into_iter().map(|r| r.doc.clone()).collect()
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn create(&self, collection: Collection, fields: Document) -> Result<Document> {
        let mut doc = strip_owned_fields(fields);

        let mut tables = self.tables.write().await;
        tables.check_unique(collection, &doc, None)?;

        let id = Uuid::new_v4().simple().to_string();
        doc.insert(ID_FIELD.to_string(), Value::String(id.clone()));
        doc.insert(CREATED_AT_FIELD.to_string(), Value::String(now_rfc3339()));

        tables.insert(collection, id.clone(), doc.clone());
        if let Err(e) = self.persist(&tables).await {
            tables.table_mut(collection).remove(&id);
            return Err(e);
        }
        Ok(doc)
    }

    async fn get(&self, collection: Collection, id: &str) -> Result<Document> {
        let tables = self.tables.read().await;
        tables
            .table(collection)
            .and_then(|t| t.get(id))
            .map(|row| row.doc.clone())
            .ok_or_else(|| collection.not_found(id))
    }

    async fn list(&self, collection: Collection, query: ListQuery) -> Result<Vec<Document>> {
        let tables = self.tables.read().await;
        let rows: Vec<&Stored> = tables
            .table(collection)
            .map(|t| t.values().filter(|row| query.matches(&row.doc)).collect())
            .unwrap_or_default();
        Ok(order_rows(rows, query.order))
    }

    async fn update(&self, collection: Collection, id: &str, fields: Document) -> Result<Document> {
        let mut doc = strip_owned_fields(fields);

        let mut tables = self.tables.write().await;
        let created_at = tables
            .table(collection)
            .and_then(|t| t.get(id))
            .and_then(|row| row.doc.get(CREATED_AT_FIELD).cloned())
            .ok_or_else(|| collection.not_found(id))?;

        tables.check_unique(collection, &doc, Some(id))?;

        doc.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
        doc.insert(CREATED_AT_FIELD.to_string(), created_at);

        let previous = match tables.table_mut(collection).get_mut(id) {
            Some(row) => std::mem::replace(&mut row.doc, doc.clone()),
            None => return Err(collection.not_found(id)),
        };
        if let Err(e) = self.persist(&tables).await {
            if let Some(row) = tables.table_mut(collection).get_mut(id) {
                row.doc = previous;
            }
            return Err(e);
        }
        Ok(doc)
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<Document> {
        let mut tables = self.tables.write().await;
        let removed = tables
            .table_mut(collection)
            .remove(id)
            .ok_or_else(|| collection.not_found(id))?;
        if let Err(e) = self.persist(&tables).await {
            tables.table_mut(collection).insert(id.to_string(), removed);
            return Err(e);
        }
        Ok(removed.doc)
    }

    fn kind(&self) -> &'static str {
        "memory"
    }
}
