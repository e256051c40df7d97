//! Builder para `FlowEngine`.
//!
//! Store de variables y capa de dispositivos son obligatorios; el resto
//! tiene defaults (registro vacío, eventos en memoria).
//!
//! ```ignore
//! let engine = FlowEngine::builder(store, devices)
//!     .registry(registry)
//!     .event_store(Box::new(InMemoryEventStore::new()))
//!     .build();
//! ```

use std::sync::Arc;

use autoflow_comm::DeviceManager;
use autoflow_domain::VariableStore;

use super::{EngineConfig, FlowEngine};
use crate::event::EventStore;
use crate::registry::InstructionRegistry;

pub struct FlowEngineBuilder {
    variables: Arc<VariableStore>,
    devices: Arc<DeviceManager>,
    registry: Option<Arc<InstructionRegistry>>,
    events: Option<Box<dyn EventStore>>,
    config: EngineConfig,
}

impl FlowEngineBuilder {
    pub fn new(variables: Arc<VariableStore>, devices: Arc<DeviceManager>) -> Self {
        Self { variables,
               devices,
               registry: None,
               events: None,
               config: EngineConfig::default() }
    }

    /// Registro compartido con otros motores o preparado de antemano.
    #[inline]
    pub fn registry(mut self, registry: Arc<InstructionRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    #[inline]
    pub fn event_store(mut self, events: Box<dyn EventStore>) -> Self {
        self.events = Some(events);
        self
    }

    #[inline]
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> FlowEngine {
        let registry = self.registry.unwrap_or_default();
        FlowEngine::from_parts(self.variables, self.devices, registry, self.events, self.config)
    }
}
