//! Constantes del motor.

/// Versión lógica del motor. Forma parte del input de `definition_hash`:
/// un cambio incompatible en la semántica de ejecución debe subirla para
/// que definiciones idénticas no compartan hash entre versiones.
pub const ENGINE_VERSION: &str = "AF1.0";

/// Capacidad por defecto del canal broadcast de eventos de flujo.
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 256;
