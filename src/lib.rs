//! AutoFlow
//!
//! Crate raíz: une los componentes de la plataforma en un `Runtime`.
//! - `config`: parámetros leídos del entorno / `.env`.
//! - `Runtime`: store de variables, capa de dispositivos y motor de flujos
//!   con los handlers incorporados ya registrados.

pub mod config;

use std::sync::Arc;

use autoflow_comm::{DeviceConfig, DeviceManager};
use autoflow_core::{EngineConfig, FlowEngine, InstructionRegistry};
use autoflow_domain::{StoreConfig, VariableStore};
use autoflow_persistence::{CheckpointReport, PersistenceError, VariablePersistence};

pub use config::{AppConfig, ConfigError};

/// Componentes cableados de una instalación.
///
/// Store y manager se comparten por `Arc` con todos los contextos de
/// ejecución; clonar el `Runtime` no duplica estado.
#[derive(Clone)]
pub struct Runtime {
    variables: Arc<VariableStore>,
    devices: Arc<DeviceManager>,
    engine: FlowEngine,
}

impl Runtime {
    pub fn new(config: &AppConfig) -> Self {
        let variables = Arc::new(VariableStore::new(StoreConfig { history_capacity: config.history_capacity,
                                                                  ..StoreConfig::default() }));
        let devices = Arc::new(DeviceManager::new(DeviceConfig::with_timeout(config.device_timeout)));
        let registry = Arc::new(InstructionRegistry::new());
        autoflow_adapters::register_builtin_handlers(&registry);

        let engine = FlowEngine::builder(variables.clone(), devices.clone())
            .registry(registry)
            .config(EngineConfig { event_channel_capacity: config.event_channel_capacity })
            .build();

        log::debug!("runtime listo: history_capacity={} device_timeout={:?}",
                    config.history_capacity,
                    config.device_timeout);
        Self { variables,
               devices,
               engine }
    }

    /// `Runtime` configurado desde el entorno.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self::new(&AppConfig::from_env()?))
    }

    pub fn variables(&self) -> &Arc<VariableStore> {
        &self.variables
    }

    pub fn devices(&self) -> &Arc<DeviceManager> {
        &self.devices
    }

    pub fn engine(&self) -> &FlowEngine {
        &self.engine
    }

    /// Persiste variables e historial del store.
    pub fn checkpoint(&self, persistence: &dyn VariablePersistence) -> Result<CheckpointReport, PersistenceError> {
        autoflow_persistence::checkpoint(&self.variables, persistence)
    }

    /// Reemplaza el contenido del store por el último checkpoint.
    pub fn restore(&self, persistence: &dyn VariablePersistence) -> Result<usize, PersistenceError> {
        autoflow_persistence::restore_checkpoint(&self.variables, persistence)
    }
}
