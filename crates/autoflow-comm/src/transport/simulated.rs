//! Dispositivo en memoria: imagen de registros compartida entre el
//! transporte y quien la inspecciona (tests, demo). Admite inyección de
//! fallos y latencia.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{Connector, Transport};
use crate::address::RegisterArea;
use crate::error::TransportError;

#[derive(Default)]
struct Image {
    words: HashMap<(RegisterArea, u16), u16>,
    bits: HashMap<(RegisterArea, u16), bool>,
}

#[derive(Default)]
struct Faults {
    failing_io: AtomicUsize,
    refuse_connections: AtomicBool,
    latency: Mutex<Option<Duration>>,
}

/// Handle clonable sobre la misma imagen de registros.
#[derive(Clone, Default)]
pub struct SimulatedDevice {
    image: Arc<Mutex<Image>>,
    faults: Arc<Faults>,
    opens: Arc<AtomicUsize>,
}

impl SimulatedDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connector(&self) -> SimulatedConnector {
        SimulatedConnector { device: self.clone() }
    }

    pub fn set_word(&self, area: RegisterArea, offset: u16, value: u16) {
        self.image.lock().words.insert((area, offset), value);
    }

    /// Registros no escritos valen 0.
    pub fn word(&self, area: RegisterArea, offset: u16) -> u16 {
        self.image.lock().words.get(&(area, offset)).copied().unwrap_or(0)
    }

    pub fn set_bit(&self, area: RegisterArea, offset: u16, value: bool) {
        self.image.lock().bits.insert((area, offset), value);
    }

    pub fn bit(&self, area: RegisterArea, offset: u16) -> bool {
        self.image.lock().bits.get(&(area, offset)).copied().unwrap_or(false)
    }

    /// Las próximas `n` operaciones de I/O fallan con error de comunicación.
    pub fn fail_next_io(&self, n: usize) {
        self.faults.failing_io.store(n, Ordering::SeqCst);
    }

    pub fn refuse_connections(&self, refuse: bool) {
        self.faults.refuse_connections.store(refuse, Ordering::SeqCst);
    }

    /// Retardo aplicado a cada operación de I/O.
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.faults.latency.lock() = latency;
    }

    /// Cuántas veces se abrió una conexión con éxito.
    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    async fn io_guard(&self) -> Result<(), TransportError> {
        let latency = *self.faults.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        let injected = self.faults
                           .failing_io
                           .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                           .is_ok();
        if injected {
            return Err(TransportError::comm("injected fault"));
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct SimulatedConnector {
    device: SimulatedDevice,
}

#[async_trait]
impl Connector for SimulatedConnector {
    async fn open(&self) -> Result<Box<dyn Transport>, TransportError> {
        if self.device.faults.refuse_connections.load(Ordering::SeqCst) {
            return Err(TransportError::comm("connection refused"));
        }
        self.device.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(SimulatedTransport { device: self.device.clone() }))
    }

    fn describe(&self) -> String {
        "sim://memory".to_string()
    }
}

struct SimulatedTransport {
    device: SimulatedDevice,
}

#[async_trait]
impl Transport for SimulatedTransport {
    async fn read_words(&mut self, area: RegisterArea, offset: u16, count: u16) -> Result<Vec<u16>, TransportError> {
        self.device.io_guard().await?;
        let image = self.device.image.lock();
        Ok((0..count).map(|i| image.words.get(&(area, offset.wrapping_add(i))).copied().unwrap_or(0))
                     .collect())
    }

    async fn read_bits(&mut self, area: RegisterArea, offset: u16, count: u16) -> Result<Vec<bool>, TransportError> {
        self.device.io_guard().await?;
        let image = self.device.image.lock();
        Ok((0..count).map(|i| image.bits.get(&(area, offset.wrapping_add(i))).copied().unwrap_or(false))
                     .collect())
    }

    async fn write_words(&mut self, offset: u16, words: &[u16]) -> Result<(), TransportError> {
        self.device.io_guard().await?;
        let mut image = self.device.image.lock();
        for (i, w) in words.iter().enumerate() {
            image.words.insert((RegisterArea::Holding, offset.wrapping_add(i as u16)), *w);
        }
        Ok(())
    }

    async fn write_bits(&mut self, offset: u16, bits: &[bool]) -> Result<(), TransportError> {
        self.device.io_guard().await?;
        let mut image = self.device.image.lock();
        for (i, b) in bits.iter().enumerate() {
            image.bits.insert((RegisterArea::Coil, offset.wrapping_add(i as u16)), *b);
        }
        Ok(())
    }
}
