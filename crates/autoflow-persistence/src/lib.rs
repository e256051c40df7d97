//! autoflow-persistence
//!
//! Contrato del colaborador de persistencia del store de variables y una
//! implementación en memoria. El motor nunca persiste por su cuenta: quien
//! integra decide cuándo llamar a `checkpoint` / `restore_checkpoint`.
//!
//! Módulos:
//! - `memory`: `InMemoryPersistence`, guarda documentos JSON como lo haría
//!   un backend de archivos.
//! - `checkpoint`: volcado y recarga completa de un `VariableStore`.

pub mod checkpoint;
pub mod error;
pub mod memory;

use autoflow_domain::{HistoryRecord, Snapshot, Variable};
use chrono::{DateTime, Utc};

pub use checkpoint::{checkpoint, restore_checkpoint, CheckpointReport};
pub use error::PersistenceError;
pub use memory::InMemoryPersistence;

/// Almacenamiento duradero de variables, snapshots e historial.
pub trait VariablePersistence: Send + Sync {
    /// Reemplaza el conjunto completo de variables guardado.
    fn save_variables(&self, variables: &[Variable]) -> Result<(), PersistenceError>;
    fn load_variables(&self) -> Result<Vec<Variable>, PersistenceError>;

    /// Un snapshot con el mismo nombre se sobrescribe.
    fn save_snapshot(&self, snapshot: &Snapshot) -> Result<(), PersistenceError>;
    fn load_snapshot(&self, name: &str) -> Result<Snapshot, PersistenceError>;
    fn list_snapshots(&self) -> Result<Vec<String>, PersistenceError>;

    /// Agrega registros al historial guardado de `name`, sin duplicar los
    /// que ya estén (mismo timestamp y valor).
    fn save_history(&self, name: &str, records: &[HistoryRecord]) -> Result<(), PersistenceError>;
    /// Registros con `from <= ts <= to`, en orden cronológico.
    fn load_history(&self,
                    name: &str,
                    from: DateTime<Utc>,
                    to: DateTime<Utc>)
                    -> Result<Vec<HistoryRecord>, PersistenceError>;
}
