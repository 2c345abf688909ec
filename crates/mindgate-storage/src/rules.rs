//! Persisted rule records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::database::Database;
use crate::error::StorageError;
use crate::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleRecord {
    /// Stable identifier, never reused for another rule
    pub id: String,
    /// Address pattern as entered by the user
    pub pattern: String,
    /// Phrase the user must reproduce on the confirmation step
    pub phrase: String,
    /// Configuration order
    pub position: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Database {
    /// All rules in configuration order
    pub fn list_rules(&self) -> Result<Vec<RuleRecord>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, pattern, phrase, position, created_at, updated_at
                 FROM rules ORDER BY position, created_at",
            )?;

            let rules: Vec<RuleRecord> = stmt
                .query_map([], |row| {
                    let created_str: String = row.get(4)?;
                    let updated_str: String = row.get(5)?;

                    let created_at = DateTime::parse_from_rfc3339(&created_str)
                        .map(|dt| dt.with_timezone(&Utc))
                        .unwrap_or_else(|_| Utc::now());
                    let updated_at = DateTime::parse_from_rfc3339(&updated_str)
                        .map(|dt| dt.with_timezone(&Utc))
                        .unwrap_or_else(|_| Utc::now());

                    Ok(RuleRecord {
                        id: row.get(0)?,
                        pattern: row.get(1)?,
                        phrase: row.get(2)?,
                        position: row.get(3)?,
                        created_at,
                        updated_at,
                    })
                })?
                .filter_map(|r| r.ok())
                .collect();

            Ok(rules)
        })
    }

    /// Append a new rule at the end of the configuration order
    pub fn insert_rule(&self, pattern: &str, phrase: &str) -> Result<RuleRecord> {
        if pattern.trim().is_empty() {
            return Err(StorageError::InvalidRule(
                "pattern cannot be empty".to_string(),
            ));
        }

        let now = Utc::now();
        let id = Uuid::new_v4().to_string();

        let position = self.transaction(|conn| {
            let position: i64 = conn.query_row(
                "SELECT COALESCE(MAX(position) + 1, 0) FROM rules",
                [],
                |row| row.get(0),
            )?;
            conn.execute(
                "INSERT INTO rules (id, pattern, phrase, position, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    id,
                    pattern.trim(),
                    phrase,
                    position,
                    now.to_rfc3339(),
                    now.to_rfc3339(),
                ],
            )?;
            Ok(position)
        })?;

        tracing::info!(rule_id = %id, pattern = %pattern, "Inserted rule");

        Ok(RuleRecord {
            id,
            pattern: pattern.trim().to_string(),
            phrase: phrase.to_string(),
            position,
            created_at: now,
            updated_at: now,
        })
    }

    /// Change a rule's pattern and phrase, keeping its id
    pub fn update_rule(&self, id: &str, pattern: &str, phrase: &str) -> Result<()> {
        if pattern.trim().is_empty() {
            return Err(StorageError::InvalidRule(
                "pattern cannot be empty".to_string(),
            ));
        }

        let changed = self.with_connection(|conn| {
            Ok(conn.execute(
                "UPDATE rules SET pattern = ?1, phrase = ?2, updated_at = ?3 WHERE id = ?4",
                rusqlite::params![pattern.trim(), phrase, Utc::now().to_rfc3339(), id],
            )?)
        })?;

        if changed == 0 {
            return Err(StorageError::RuleNotFound(id.to_string()));
        }
        Ok(())
    }

    pub fn delete_rule(&self, id: &str) -> Result<()> {
        let changed = self.with_connection(|conn| {
            Ok(conn.execute("DELETE FROM rules WHERE id = ?1", [id])?)
        })?;

        if changed == 0 {
            return Err(StorageError::RuleNotFound(id.to_string()));
        }

        tracing::info!(rule_id = %id, "Deleted rule");
        Ok(())
    }
}
