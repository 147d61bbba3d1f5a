//! Postgres + pgvector backed index.

use std::collections::BTreeMap;

use async_trait::async_trait;
use pgvector::Vector;
use tokio::sync::Mutex;
use tokio_postgres::types::Json;
use tokio_postgres::{Client, NoTls};
use tracing::{error, info};

use super::{IndexedEntry, VectorIndex};
use crate::error::StoreError;
use crate::record::Candidate;

/// Schema-qualified table name with validated, quotable parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableName {
    schema: String,
    table: String,
}

impl TableName {
    /// Validates that neither part is blank.
    pub fn new(schema: impl Into<String>, table: impl Into<String>) -> anyhow::Result<Self> {
        let schema = schema.into();
        let table = table.into();
        anyhow::ensure!(!schema.trim().is_empty(), "schema name is required");
        anyhow::ensure!(!table.trim().is_empty(), "table name is required");
        Ok(Self { schema, table })
    }

    /// `"schema"."table"` with embedded quotes escaped.
    pub fn qualified(&self) -> String {
        format!("{}.{}", quote_ident(&self.schema), quote_ident(&self.table))
    }

    /// Name for the HNSW cosine index over the embedding column.
    pub fn embedding_index_name(&self) -> String {
        quote_ident(&format!(
            "{}_{}_embedding_idx",
            sanitize_ident(&self.schema),
            sanitize_ident(&self.table)
        ))
    }
}

fn quote_ident(input: &str) -> String {
    format!("\"{}\"", input.replace('"', "\"\""))
}

fn sanitize_ident(input: &str) -> String {
    input
        .chars()
        .map(|ch| if ch.is_ascii_alphanumeric() { ch } else { '_' })
        .collect()
}

/// Vector index stored in a single pgvector table.
///
/// Columns: `id TEXT PRIMARY KEY, content TEXT, metadata JSONB, embedding VECTOR(d)`.
pub struct PgVectorIndex {
    client: Mutex<Client>,
    table: TableName,
}

impl PgVectorIndex {
    /// Connects and spawns the connection driver on the current runtime.
    pub async fn connect(database_url: &str, table: TableName) -> Result<Self, StoreError> {
        let (client, connection) = tokio_postgres::connect(database_url, NoTls).await?;
        tokio::spawn(async move {
            if let Err(err) = connection.await {
                error!(error = %err, "postgres connection error");
            }
        });
        Ok(Self {
            client: Mutex::new(client),
            table,
        })
    }

    /// Target table.
    pub fn table(&self) -> &TableName {
        &self.table
    }

    /// Creates the extension, table and cosine index when missing.
    pub async fn prepare(&self, dimensions: usize) -> Result<(), StoreError> {
        if dimensions == 0 {
            return Err(anyhow::anyhow!("embedding dimension must be positive").into());
        }
        let client = self.client.lock().await;
        client
            .batch_execute("CREATE EXTENSION IF NOT EXISTS vector")
            .await?;
        client.batch_execute(&create_table_sql(&self.table, dimensions)).await?;
        client
            .batch_execute(&format!(
                "CREATE INDEX IF NOT EXISTS {} ON {} USING hnsw (embedding vector_cosine_ops)",
                self.table.embedding_index_name(),
                self.table.qualified()
            ))
            .await?;
        info!(table = %self.table.qualified(), dimensions, "vector table ready");
        Ok(())
    }
}

#[async_trait]
impl VectorIndex for PgVectorIndex {
    async fn upsert(&self, entries: &[IndexedEntry]) -> Result<(), StoreError> {
        if entries.is_empty() {
            return Ok(());
        }
        let mut client = self.client.lock().await;
        let transaction = client.transaction().await?;
        let statement = transaction.prepare(&upsert_sql(&self.table)).await?;
        for entry in entries {
            let embedding = Vector::from(entry.embedding.clone());
            let metadata = Json(&entry.metadata);
            transaction
                .execute(&statement, &[&entry.id, &entry.content, &metadata, &embedding])
                .await?;
        }
        transaction.commit().await?;
        Ok(())
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<Candidate>, StoreError> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let embedding = Vector::from(vector.to_vec());
        let limit = i64::try_from(k).unwrap_or(i64::MAX);
        let client = self.client.lock().await;
        let rows = client
            .query(&query_sql(&self.table), &[&embedding, &limit])
            .await?;
        Ok(rows
            .iter()
            .map(|row| {
                let content: String = row.get("content");
                let Json(metadata): Json<BTreeMap<String, String>> = row.get("metadata");
                Candidate::from_metadata(&metadata, content)
            })
            .collect())
    }

    async fn count(&self) -> Result<usize, StoreError> {
        let client = self.client.lock().await;
        let row = client
            .query_one(
                &format!("SELECT COUNT(*) AS n FROM {}", self.table.qualified()),
                &[],
            )
            .await?;
        let n: i64 = row.get("n");
        Ok(usize::try_from(n).unwrap_or(0))
    }
}

fn create_table_sql(table: &TableName, dimensions: usize) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {} (
            id TEXT PRIMARY KEY,
            content TEXT NOT NULL,
            metadata JSONB NOT NULL,
            embedding VECTOR({dimensions}) NOT NULL
        )",
        table.qualified()
    )
}

fn upsert_sql(table: &TableName) -> String {
    format!(
        "INSERT INTO {} (id, content, metadata, embedding) VALUES ($1, $2, $3, $4) \
         ON CONFLICT (id) DO UPDATE SET \
            content = EXCLUDED.content, \
            metadata = EXCLUDED.metadata, \
            embedding = EXCLUDED.embedding",
        table.qualified()
    )
}

fn query_sql(table: &TableName) -> String {
    format!(
        "SELECT id, content, metadata, embedding <=> $1 AS distance \
         FROM {} \
         ORDER BY embedding <=> $1 ASC, id ASC \
         LIMIT $2",
        table.qualified()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_names_are_quoted() {
        let table = TableName::new("public", "ccr \"sections\"").unwrap();
        assert_eq!(table.qualified(), "\"public\".\"ccr \"\"sections\"\"\"");
        assert_eq!(
            table.embedding_index_name(),
            "\"public_ccr__sections__embedding_idx\""
        );
        assert!(TableName::new(" ", "t").is_err());
    }

    #[test]
    fn upsert_overwrites_on_conflict() {
        let table = TableName::new("public", "ccr_sections").unwrap();
        let sql = upsert_sql(&table);
        assert!(sql.contains("ON CONFLICT (id) DO UPDATE"));
        assert!(create_table_sql(&table, 384).contains("VECTOR(384)"));
        assert!(query_sql(&table).contains("LIMIT $2"));
    }
}
