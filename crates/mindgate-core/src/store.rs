//! Persisted rules and settings

use std::sync::Arc;

use tokio::sync::watch;

use mindgate_scope::Rule;
use mindgate_storage::{Database, RuleRecord, StorageError};

use crate::config::{Config, GateSettings};
use crate::Result;

const SETTINGS_KEY: &str = "gate_settings";

/// Configuration store shared by the gate and whatever edits the rules.
///
/// Every successful write bumps a version number; subscribers use it to
/// reload.
pub struct ConfigStore {
    db: Database,
    version: Arc<watch::Sender<u64>>,
}

impl ConfigStore {
    pub fn new(db: Database) -> Self {
        let (version, _) = watch::channel(0);
        Self {
            db,
            version: Arc::new(version),
        }
    }

    pub fn open(config: &Config) -> Result<Self> {
        if let Some(parent) = config.database_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::open(&config.database_path)?;
        tracing::info!(path = %config.database_path.display(), "Opened configuration store");
        Ok(Self::new(db))
    }

    /// Rules in configuration order
    pub fn rules(&self) -> Result<Vec<Rule>> {
        Ok(self
            .db
            .list_rules()?
            .into_iter()
            .map(|record| Rule::new(record.id, record.pattern, record.phrase))
            .collect())
    }

    pub fn add_rule(&self, pattern: &str, phrase: &str) -> Result<Rule> {
        let RuleRecord {
            id,
            pattern,
            phrase,
            ..
        } = self.db.insert_rule(pattern, phrase)?;
        self.notify();
        Ok(Rule::new(id, pattern, phrase))
    }

    pub fn update_rule(&self, id: &str, pattern: &str, phrase: &str) -> Result<()> {
        self.db.update_rule(id, pattern, phrase)?;
        self.notify();
        Ok(())
    }

    pub fn remove_rule(&self, id: &str) -> Result<()> {
        self.db.delete_rule(id)?;
        self.notify();
        Ok(())
    }

    /// Stored settings, or defaults when none are stored or the stored
    /// value is unreadable
    pub fn settings(&self) -> Result<GateSettings> {
        match self.db.get_json(SETTINGS_KEY) {
            Ok(settings) => Ok(settings.unwrap_or_default()),
            Err(StorageError::Json(e)) => {
                tracing::warn!(error = %e, "Unreadable gate settings, using defaults");
                Ok(GateSettings::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn save_settings(&self, settings: &GateSettings) -> Result<()> {
        self.db.set_json(SETTINGS_KEY, settings)?;
        self.notify();
        Ok(())
    }

    /// Receiver that changes after every write
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    fn notify(&self) {
        self.version.send_modify(|version| *version += 1);
    }
}

impl Clone for ConfigStore {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            version: Arc::clone(&self.version),
        }
    }
}
