//! Volcado y recarga de un `VariableStore` completo.

use autoflow_domain::{HistoryRecord, Variable, VariableStore};
use log::info;

use crate::{PersistenceError, VariablePersistence};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CheckpointReport {
    pub variables: usize,
    pub history_records: usize,
}

/// Guarda definiciones, valores e historial actuales, leídos del store en
/// una sola toma.
pub fn checkpoint(store: &VariableStore, persistence: &dyn VariablePersistence) -> Result<CheckpointReport, PersistenceError> {
    let (variables, histories): (Vec<Variable>, Vec<Vec<HistoryRecord>>) = store.export_with_history().into_iter().unzip();
    persistence.save_variables(&variables)?;

    let mut history_records = 0;
    for (variable, records) in variables.iter().zip(&histories) {
        history_records += records.len();
        persistence.save_history(&variable.name, records)?;
    }
    info!("checkpoint: {} variables, {} history records", variables.len(), history_records);
    Ok(CheckpointReport { variables: variables.len(),
                          history_records })
}

/// Reemplaza el contenido del store por lo guardado. Los historiales en
/// memoria arrancan vacíos; el guardado se consulta vía `load_history`.
pub fn restore_checkpoint(store: &VariableStore, persistence: &dyn VariablePersistence) -> Result<usize, PersistenceError> {
    let variables = persistence.load_variables()?;
    let count = variables.len();
    store.replace_all(variables)?;
    info!("restored {} variables from checkpoint", count);
    Ok(count)
}
