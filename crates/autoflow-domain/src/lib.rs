//! autoflow-domain: variables de proceso tipadas.
//!
//! Este crate provee:
//! - `VariableValue`: tipo suma cerrado de valores (numérico, string, fecha,
//!   array, struct) y sus conversiones tipadas.
//! - `Variable` / `VariableData`: variante + restricciones como datos.
//! - `VariableStore`: almacén thread-safe con historial acotado, alias,
//!   grupos, snapshots y notificaciones de cambio.
//!
//! No depende de ningún otro crate del workspace.

pub mod error;
pub mod history;
pub mod snapshot;
pub mod store;
pub mod value;
pub mod variable;

pub use error::VariableError;
pub use history::History;
pub use snapshot::{RestoreReport, Snapshot};
pub use store::{StoreConfig, VariableChange, VariableStore, DEFAULT_HISTORY_CAPACITY};
pub use value::{FromVariableValue, VariableValue};
pub use variable::{HistoryRecord, Variable, VariableData, VariableDefinition, VariableInfo, VariableKind};
