use std::fmt;

use serde::{Deserialize, Serialize};

/// Estado observable de un flujo.
///
/// `Stopped` y `Error` son terminales para la corrida; un nuevo `start`
/// arranca una corrida fresca.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FlowStatus {
    Ready,
    Running,
    Paused,
    Stopped,
    Error,
}

impl FlowStatus {
    /// Hay una corrida viva (la tarea del motor no terminó su decisión).
    pub fn is_active(self) -> bool {
        matches!(self, FlowStatus::Running | FlowStatus::Paused)
    }
}

impl fmt::Display for FlowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FlowStatus::Ready => "Ready",
            FlowStatus::Running => "Running",
            FlowStatus::Paused => "Paused",
            FlowStatus::Stopped => "Stopped",
            FlowStatus::Error => "Error",
        };
        f.write_str(s)
    }
}
