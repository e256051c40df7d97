use std::collections::VecDeque;

use chrono::{DateTime, Utc};

use crate::variable::HistoryRecord;

/// Historial acotado de una variable. Orden de inserción = orden cronológico;
/// al superar la capacidad se descarta el registro más antiguo.
#[derive(Debug, Clone)]
pub struct History {
    records: VecDeque<HistoryRecord>,
    capacity: usize,
}

impl History {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self { records: VecDeque::with_capacity(capacity.min(64)),
               capacity }
    }

    pub fn push(&mut self, record: HistoryRecord) {
        while self.records.len() >= self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    /// Registros con `from <= ts <= to`, en orden cronológico.
    pub fn range(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Vec<HistoryRecord> {
        self.records
            .iter()
            .filter(|r| r.timestamp() >= from && r.timestamp() <= to)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &HistoryRecord> {
        self.records.iter()
    }
}
