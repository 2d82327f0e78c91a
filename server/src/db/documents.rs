//! Read-only access to the canonical document content provider.
//!
//! The hosting application owns document CRUD and materialization; the
//! collaboration core only ever reads the base content and version the
//! operation log builds on. Nothing here writes content back.

use sqlx::{PgPool, Row};

/// A document row: the canonical base the log replays over.
#[derive(Debug, Clone)]
pub struct StoredDocument {
    #[allow(dead_code)]
    pub document_id: String,
    pub content: String,
    pub version: i64,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for StoredDocument {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(StoredDocument {
            document_id: row.try_get("document_id")?,
            content: row.try_get("content")?,
            version: row.try_get("version")?,
        })
    }
}

/// Fetch a document's canonical content and version.
pub async fn get_document(
    pool: &PgPool,
    document_id: &str,
) -> Result<Option<StoredDocument>, sqlx::Error> {
    sqlx::query_as::<_, StoredDocument>(
        r#"
        SELECT document_id, content, version
        FROM documents
        WHERE document_id = $1
        "#,
    )
    .bind(document_id)
    .fetch_optional(pool)
    .await
}
