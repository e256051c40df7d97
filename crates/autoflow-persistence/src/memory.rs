//! Persistencia en memoria.
//!
//! Guarda documentos JSON serializados en lugar de los structs, así los
//! tests ejercitan el mismo camino de (de)serialización que un backend real.

use std::collections::BTreeMap;

use autoflow_domain::{HistoryRecord, Snapshot, Variable};
use chrono::{DateTime, Utc};
use log::debug;
use parking_lot::Mutex;

use crate::{PersistenceError, VariablePersistence};

#[derive(Default)]
struct Documents {
    variables: Option<String>,
    snapshots: BTreeMap<String, String>,
    history: BTreeMap<String, Vec<String>>,
}

#[derive(Default)]
pub struct InMemoryPersistence {
    docs: Mutex<Documents>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }
}

impl VariablePersistence for InMemoryPersistence {
    fn save_variables(&self, variables: &[Variable]) -> Result<(), PersistenceError> {
        let doc = serde_json::to_string(variables)?;
        self.docs.lock().variables = Some(doc);
        debug!("persisted {} variables", variables.len());
        Ok(())
    }

    fn load_variables(&self) -> Result<Vec<Variable>, PersistenceError> {
        let docs = self.docs.lock();
        let doc = docs.variables
                      .as_deref()
                      .ok_or_else(|| PersistenceError::NotFound("variables".into()))?;
        Ok(serde_json::from_str(doc)?)
    }

    fn save_snapshot(&self, snapshot: &Snapshot) -> Result<(), PersistenceError> {
        let doc = serde_json::to_string(snapshot)?;
        self.docs.lock().snapshots.insert(snapshot.name().to_string(), doc);
        Ok(())
    }

    fn load_snapshot(&self, name: &str) -> Result<Snapshot, PersistenceError> {
        let docs = self.docs.lock();
        let doc = docs.snapshots
                      .get(name)
                      .ok_or_else(|| PersistenceError::NotFound(format!("snapshot '{name}'")))?;
        Ok(serde_json::from_str(doc)?)
    }

    fn list_snapshots(&self) -> Result<Vec<String>, PersistenceError> {
        Ok(self.docs.lock().snapshots.keys().cloned().collect())
    }

    fn save_history(&self, name: &str, records: &[HistoryRecord]) -> Result<(), PersistenceError> {
        let encoded = records.iter()
                             .map(serde_json::to_string)
                             .collect::<Result<Vec<_>, _>>()?;
        let mut docs = self.docs.lock();
        let stored = docs.history.entry(name.to_string()).or_default();
        for doc in encoded {
            if !stored.contains(&doc) {
                stored.push(doc);
            }
        }
        Ok(())
    }

    fn load_history(&self,
                    name: &str,
                    from: DateTime<Utc>,
                    to: DateTime<Utc>)
                    -> Result<Vec<HistoryRecord>, PersistenceError> {
        let docs = self.docs.lock();
        let stored = docs.history
                         .get(name)
                         .ok_or_else(|| PersistenceError::NotFound(format!("history of '{name}'")))?;
        let mut records = stored.iter()
                                .map(|doc| serde_json::from_str::<HistoryRecord>(doc))
                                .collect::<Result<Vec<_>, _>>()?;
        records.retain(|r| r.timestamp() >= from && r.timestamp() <= to);
        records.sort_by_key(|r| r.timestamp());
        Ok(records)
    }
}
