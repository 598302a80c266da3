//! Rule/preference persistence. Rules are stored in their wire shape and
//! normalized into a `RuleSet` snapshot at load time; one categorization
//! pass never observes a concurrent rule change.

use centime_ingest::rules::{RawRule, RuleSet};

use crate::db::{DbPool, StorageError};

pub async fn save_rule(pool: &DbPool, user: &str, rule: &RawRule) -> Result<i64, StorageError> {
    let json = serde_json::to_string(rule)
        .map_err(|e| StorageError::Corrupt(format!("unserializable rule: {e}")))?;
    let result = sqlx::query(
        "INSERT INTO categorization_rules (user, bank, priority, rule_json) VALUES (?, ?, ?, ?)",
    )
    .bind(user)
    .bind(&rule.bank)
    .bind(rule.priority)
    .bind(json)
    .execute(pool)
    .await?;
    Ok(result.last_insert_rowid())
}

pub async fn delete_rule(pool: &DbPool, user: &str, rule_id: i64) -> Result<bool, StorageError> {
    let result = sqlx::query("DELETE FROM categorization_rules WHERE id = ? AND user = ?")
        .bind(rule_id)
        .bind(user)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Loads the user's bank-specific rules for `bank` plus their global rules
/// as one immutable snapshot. Rows whose JSON no longer parses are skipped
/// with a warning rather than poisoning the whole snapshot.
pub async fn load_rule_set(pool: &DbPool, user: &str, bank: &str) -> Result<RuleSet, StorageError> {
    let rows = sqlx::query_as::<_, (i64, String)>(
        "SELECT id, rule_json FROM categorization_rules
         WHERE user = ? AND (bank = ? OR bank IS NULL)",
    )
    .bind(user)
    .bind(bank)
    .fetch_all(pool)
    .await?;

    let mut raw_rules = Vec::with_capacity(rows.len());
    for (id, json) in rows {
        match serde_json::from_str::<RawRule>(&json) {
            Ok(rule) => raw_rules.push(rule),
            Err(e) => tracing::warn!(rule_id = id, error = %e, "skipping unparsable stored rule"),
        }
    }
    Ok(RuleSet::from_raw(raw_rules))
}
