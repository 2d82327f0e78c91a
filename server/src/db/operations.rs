//! Database persistence for the operation log.

use scribe_engine::{ClockStamp, EditKind, EditOp, OpStatus, ResolutionStrategy};
use sqlx::{PgPool, Row};

/// A stored operation row from the database.
#[derive(Debug)]
pub struct StoredOperation {
    /// Row id; only its ordering is used, via `ORDER BY id`
    #[allow(dead_code)]
    pub id: i64,
    pub op_id: String,
    pub document_id: String,
    pub author_id: String,
    pub op_type: String,
    pub position: i64,
    pub length: Option<i64>,
    pub content: Option<String>,
    pub stamp_ticks: i64,
    pub conflict_resolved: bool,
    pub applied_at: i64,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for StoredOperation {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(StoredOperation {
            id: row.try_get("id")?,
            op_id: row.try_get("op_id")?,
            document_id: row.try_get("document_id")?,
            author_id: row.try_get("author_id")?,
            op_type: row.try_get("op_type")?,
            position: row.try_get("position")?,
            length: row.try_get("length")?,
            content: row.try_get("content")?,
            stamp_ticks: row.try_get("stamp_ticks")?,
            conflict_resolved: row.try_get("conflict_resolved")?,
            applied_at: row.try_get("applied_at")?,
        })
    }
}

impl StoredOperation {
    /// Convert a database row back into an engine operation.
    pub fn to_operation(&self) -> Result<EditOp, String> {
        let stamp = ClockStamp::new(self.stamp_ticks.max(0) as u64, self.author_id.clone());

        let op = match self.op_type.as_str() {
            "insert" => EditOp::insert(
                &self.op_id,
                &self.document_id,
                &self.author_id,
                self.position.max(0) as u64,
                self.content.clone().unwrap_or_default(),
                stamp,
            ),
            "delete" => EditOp::delete(
                &self.op_id,
                &self.document_id,
                &self.author_id,
                self.position.max(0) as u64,
                self.length.unwrap_or(0).max(0) as u64,
                stamp,
            ),
            "replace" => EditOp::replace(
                &self.op_id,
                &self.document_id,
                &self.author_id,
                self.position.max(0) as u64,
                self.length.unwrap_or(0).max(0) as u64,
                self.content.clone().unwrap_or_default(),
                stamp,
            ),
            other => return Err(format!("Unknown operation type: {}", other)),
        };

        let mut op = op.into_applied(self.applied_at.max(0) as u64);
        op.conflict_resolved = self.conflict_resolved;
        if self.conflict_resolved {
            op.resolution = Some(ResolutionStrategy::TimestampPriority);
        }
        Ok(op)
    }
}

/// Insert an applied operation into the database.
pub async fn insert_operation(pool: &PgPool, op: &EditOp) -> Result<i64, sqlx::Error> {
    debug_assert_eq!(op.status, OpStatus::Applied);

    let (op_type, length, content) = match &op.kind {
        EditKind::Insert { content } => ("insert", None, Some(content.as_str())),
        EditKind::Delete { length } => ("delete", Some(*length as i64), None),
        EditKind::Replace { length, content } => {
            ("replace", Some(*length as i64), Some(content.as_str()))
        }
    };

    let result: (i64,) = sqlx::query_as(
        r#"
        INSERT INTO operations (
            op_id, document_id, author_id, op_type, position,
            length, content, stamp_ticks, conflict_resolved, applied_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING id
        "#,
    )
    .bind(&op.op_id)
    .bind(&op.document_id)
    .bind(&op.author_id)
    .bind(op_type)
    .bind(op.position as i64)
    .bind(length)
    .bind(content)
    .bind(op.stamp.ticks as i64)
    .bind(op.conflict_resolved)
    .bind(op.applied_at.unwrap_or_default() as i64)
    .fetch_one(pool)
    .await?;

    Ok(result.0)
}

/// Load a document's full operation log in application order.
pub async fn get_document_operations(
    pool: &PgPool,
    document_id: &str,
) -> Result<Vec<StoredOperation>, sqlx::Error> {
    sqlx::query_as::<_, StoredOperation>(
        r#"
        SELECT id, op_id, document_id, author_id, op_type, position,
               length, content, stamp_ticks, conflict_resolved, applied_at
        FROM operations
        WHERE document_id = $1
        ORDER BY id ASC
        "#,
    )
    .bind(document_id)
    .fetch_all(pool)
    .await
}

