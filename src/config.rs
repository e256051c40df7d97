//! Configuración central de la aplicación.
//! Carga variables de entorno (.env) una sola vez y expone `AppConfig`
//! con los parámetros que `Runtime::new` reparte entre los componentes.
use std::env;
use std::time::Duration;

use dotenvy::dotenv;
use once_cell::sync::Lazy;
use thiserror::Error;

// Carga perezosa del archivo .env una sola vez.
static DOTENV_LOADED: Lazy<()> = Lazy::new(|| {
    let _ = dotenv(); // ignora error si no existe .env
});

pub const HISTORY_CAPACITY_VAR: &str = "AUTOFLOW_HISTORY_CAPACITY";
pub const DEVICE_TIMEOUT_VAR: &str = "AUTOFLOW_DEVICE_TIMEOUT_MS";
pub const EVENT_CHANNEL_CAPACITY_VAR: &str = "AUTOFLOW_EVENT_CHANNEL_CAPACITY";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("valor inválido para {var}: '{value}' ({reason})")]
    Invalid { var: String, value: String, reason: String },
}

/// Configuración global de la aplicación.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Registros de historial retenidos por variable.
    pub history_capacity: usize,
    /// Límite de conexión y de cada operación de E/S con dispositivos.
    pub device_timeout: Duration,
    /// Eventos retenidos por suscriptor del motor.
    pub event_channel_capacity: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self { history_capacity: 1000,
               device_timeout: Duration::from_millis(3000),
               event_channel_capacity: 256 }
    }
}

impl AppConfig {
    /// Lee la configuración del entorno (y de `.env` si existe).
    /// Las variables ausentes toman el valor por defecto.
    pub fn from_env() -> Result<Self, ConfigError> {
        Lazy::force(&DOTENV_LOADED);
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Igual que `from_env` pero con una fuente arbitraria; útil en tests.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
        where F: Fn(&str) -> Option<String>
    {
        let defaults = Self::default();
        let history_capacity = positive(&lookup, HISTORY_CAPACITY_VAR)?.unwrap_or(defaults.history_capacity as u64);
        let timeout_ms = positive(&lookup, DEVICE_TIMEOUT_VAR)?.map(Duration::from_millis)
                                                                .unwrap_or(defaults.device_timeout);
        let event_channel_capacity =
            positive(&lookup, EVENT_CHANNEL_CAPACITY_VAR)?.unwrap_or(defaults.event_channel_capacity as u64);

        Ok(Self { history_capacity: to_usize(HISTORY_CAPACITY_VAR, history_capacity)?,
                  device_timeout: timeout_ms,
                  event_channel_capacity: to_usize(EVENT_CHANNEL_CAPACITY_VAR, event_channel_capacity)? })
    }
}

/// Forzar carga temprana de .env desde aplicaciones externas si se desea.
pub fn init_dotenv() {
    Lazy::force(&DOTENV_LOADED);
}

fn positive<F>(lookup: &F, var: &str) -> Result<Option<u64>, ConfigError>
    where F: Fn(&str) -> Option<String>
{
    let Some(raw) = lookup(var) else {
        return Ok(None);
    };
    let invalid = |reason: &str| ConfigError::Invalid { var: var.to_string(),
                                                        value: raw.clone(),
                                                        reason: reason.to_string() };
    match raw.trim().parse::<u64>() {
        Ok(0) => Err(invalid("debe ser mayor que cero")),
        Ok(v) => Ok(Some(v)),
        Err(e) => Err(invalid(&e.to_string())),
    }
}

fn to_usize(var: &str, value: u64) -> Result<usize, ConfigError> {
    usize::try_from(value).map_err(|e| ConfigError::Invalid { var: var.to_string(),
                                                               value: value.to_string(),
                                                               reason: e.to_string() })
}
