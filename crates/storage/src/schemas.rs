//! Parsing-schema persistence, keyed by (user, bank, file-format). The
//! stored JSON is re-validated by the Schema Resolver on every use; storage
//! makes no promise the mapping is still sane.

use centime_ingest::ParsingSchema;

use crate::db::{DbPool, StorageError};

pub async fn save_schema(
    pool: &DbPool,
    user: &str,
    bank: &str,
    file_format: &str,
    schema: &ParsingSchema,
) -> Result<(), StorageError> {
    let json = serde_json::to_string(schema)
        .map_err(|e| StorageError::Corrupt(format!("unserializable schema: {e}")))?;
    sqlx::query(
        "INSERT INTO parsing_schemas (user, bank, file_format, schema_json)
         VALUES (?, ?, ?, ?)
         ON CONFLICT (user, bank, file_format)
         DO UPDATE SET schema_json = excluded.schema_json, updated_at = datetime('now')",
    )
    .bind(user)
    .bind(bank)
    .bind(file_format)
    .bind(json)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn load_schema(
    pool: &DbPool,
    user: &str,
    bank: &str,
    file_format: &str,
) -> Result<Option<ParsingSchema>, StorageError> {
    let row = sqlx::query_as::<_, (String,)>(
        "SELECT schema_json FROM parsing_schemas
         WHERE user = ? AND bank = ? AND file_format = ?",
    )
    .bind(user)
    .bind(bank)
    .bind(file_format)
    .fetch_optional(pool)
    .await?;

    row.map(|(json,)| {
        serde_json::from_str(&json)
            .map_err(|e| StorageError::Corrupt(format!("stored schema unparsable: {e}")))
    })
    .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use centime_core::SignConvention;
    use centime_ingest::schema::ColumnRef;

    fn schema() -> ParsingSchema {
        ParsingSchema {
            name: "chase-csv".to_string(),
            version: 2,
            column_mappings: [
                ("date".to_string(), ColumnRef::Index(0)),
                ("description".to_string(), ColumnRef::Index(1)),
                ("amount".to_string(), ColumnRef::Index(2)),
            ]
            .into_iter()
            .collect(),
            date_format: "%m/%d/%Y".to_string(),
            currency: "USD".to_string(),
            first_transaction_row: 1,
            amount_sign_convention: SignConvention::Signed,
        }
    }

    #[tokio::test]
    async fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let pool = crate::create_db(&dir.path().join("test.db")).await.unwrap();

        save_schema(&pool, "alice", "chase", "csv", &schema()).await.unwrap();
        let loaded = load_schema(&pool, "alice", "chase", "csv").await.unwrap().unwrap();
        assert_eq!(loaded.name, "chase-csv");
        assert_eq!(loaded.version, 2);

        assert!(load_schema(&pool, "alice", "monzo", "csv").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn upsert_replaces_existing_mapping() {
        let dir = tempfile::tempdir().unwrap();
        let pool = crate::create_db(&dir.path().join("test.db")).await.unwrap();

        save_schema(&pool, "alice", "chase", "csv", &schema()).await.unwrap();
        let mut updated = schema();
        updated.version = 3;
        save_schema(&pool, "alice", "chase", "csv", &updated).await.unwrap();

        let loaded = load_schema(&pool, "alice", "chase", "csv").await.unwrap().unwrap();
        assert_eq!(loaded.version, 3);
    }
}
