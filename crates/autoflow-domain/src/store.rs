//! `VariableStore`: almacén tipado y thread-safe de variables de proceso.
//!
//! Contrato de locking: todas las operaciones se serializan con un único
//! `Mutex` por instancia, que protege juntos el mapa por nombre, el mapa por
//! índice, los alias, los grupos y los historiales. Así cada operación es un
//! read-modify-write atómico sobre todos los índices.
//!
//! Las notificaciones de cambio se publican en un canal `broadcast` después de
//! soltar el lock. El envío nunca bloquea ni falla la mutación: un suscriptor
//! lento pierde mensajes (`RecvError::Lagged`), el store no lo espera.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use indexmap::{IndexMap, IndexSet};
use log::{debug, trace};
use parking_lot::Mutex;
use tokio::sync::broadcast;

use crate::error::VariableError;
use crate::history::History;
use crate::snapshot::{RestoreReport, Snapshot};
use crate::value::{FromVariableValue, VariableValue};
use crate::variable::{HistoryRecord, Variable, VariableDefinition, VariableInfo, VariableKind};

pub const DEFAULT_HISTORY_CAPACITY: usize = 1000;
pub const DEFAULT_NOTIFICATION_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Registros de historial retenidos por variable (mínimo 1).
    pub history_capacity: usize,
    /// Mensajes retenidos por suscriptor antes de marcarlo como rezagado.
    pub notification_capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { history_capacity: DEFAULT_HISTORY_CAPACITY,
               notification_capacity: DEFAULT_NOTIFICATION_CAPACITY }
    }
}

/// Notificación publicada tras cada mutación confirmada.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableChange {
    pub name: String,
    pub index: u32,
    pub previous: VariableValue,
    pub current: VariableValue,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug)]
struct Entry {
    variable: Variable,
    history: History,
}

#[derive(Debug, Default)]
struct Inner {
    variables: IndexMap<String, Entry>,
    by_index: HashMap<u32, String>,
    /// alias → nombre canónico
    aliases: HashMap<String, String>,
    groups: IndexMap<String, IndexSet<String>>,
}

impl Inner {
    /// Nombre canónico para un nombre o alias.
    fn resolve(&self, key: &str) -> Option<String> {
        if self.variables.contains_key(key) {
            return Some(key.to_string());
        }
        self.aliases.get(key).cloned()
    }

    fn canonical(&self, key: &str) -> Result<String, VariableError> {
        self.resolve(key).ok_or_else(|| VariableError::NotFound(key.to_string()))
    }

    fn entry(&self, key: &str) -> Result<&Entry, VariableError> {
        let name = self.canonical(key)?;
        self.variables.get(&name).ok_or(VariableError::NotFound(name))
    }

    fn is_bound(&self, key: &str) -> bool {
        self.variables.contains_key(key) || self.aliases.contains_key(key)
    }

    fn leave_group(&mut self, name: &str, group: &str) {
        if let Some(members) = self.groups.get_mut(group) {
            members.shift_remove(name);
            if members.is_empty() {
                self.groups.shift_remove(group);
            }
        }
    }
}

pub struct VariableStore {
    inner: Mutex<Inner>,
    config: StoreConfig,
    notifier: broadcast::Sender<VariableChange>,
}

impl std::fmt::Debug for VariableStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VariableStore")
         .field("variables", &self.len())
         .field("config", &self.config)
         .finish()
    }
}

impl Default for VariableStore {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}

impl VariableStore {
    pub fn new(config: StoreConfig) -> Self {
        let (notifier, _) = broadcast::channel(config.notification_capacity.max(1));
        Self { inner: Mutex::new(Inner::default()),
               config,
               notifier }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Suscripción a los cambios confirmados (best-effort).
    pub fn subscribe(&self) -> broadcast::Receiver<VariableChange> {
        self.notifier.subscribe()
    }

    /// Crea una variable con la instancia por defecto de su variante.
    pub fn create(&self, kind: VariableKind, name: &str, index: u32) -> Result<(), VariableError> {
        self.create_with(VariableDefinition::new(kind, name, index))
    }

    /// Crea una variable con restricciones y metadatos explícitos. Si falla,
    /// el store queda intacto.
    pub fn create_with(&self, definition: VariableDefinition) -> Result<(), VariableError> {
        let VariableDefinition { name, index, data, info } = definition;
        data.validate_self(&name)?;

        let mut inner = self.inner.lock();
        if inner.is_bound(&name) {
            return Err(VariableError::DuplicateKey(format!("name '{name}'")));
        }
        if inner.by_index.contains_key(&index) {
            return Err(VariableError::DuplicateKey(format!("index {index}")));
        }

        debug!("variable created name={name} index={index} kind={:?}", data.kind());
        let variable = Variable { name: name.clone(),
                                  index,
                                  info,
                                  last_modified: None,
                                  aliases: BTreeSet::new(),
                                  group: None,
                                  data };
        inner.by_index.insert(index, name.clone());
        inner.variables.insert(name,
                               Entry { variable,
                                       history: History::with_capacity(self.config.history_capacity) });
        Ok(())
    }

    /// Lectura tipada; resuelve también alias.
    pub fn get<T: FromVariableValue>(&self, name: &str) -> Result<T, VariableError> {
        let value = self.get_value(name)?;
        T::from_variable_value(&value).ok_or_else(|| VariableError::mismatch(name, T::TYPE_NAME, value.type_name()))
    }

    pub fn get_value(&self, name: &str) -> Result<VariableValue, VariableError> {
        let inner = self.inner.lock();
        Ok(inner.entry(name)?.variable.value())
    }

    pub fn get_by_index(&self, index: u32) -> Result<VariableValue, VariableError> {
        let inner = self.inner.lock();
        let name = inner.by_index
                        .get(&index)
                        .ok_or_else(|| VariableError::NotFound(format!("index {index}")))?;
        Ok(inner.entry(name)?.variable.value())
    }

    /// Copia completa de la variable (valor, metadatos, alias, grupo).
    pub fn variable(&self, name: &str) -> Result<Variable, VariableError> {
        let inner = self.inner.lock();
        Ok(inner.entry(name)?.variable.clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.lock().is_bound(name)
    }

    /// Nombres canónicos en orden de creación.
    pub fn names(&self) -> Vec<String> {
        self.inner.lock().variables.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Escribe un valor. Si la variante o sus restricciones lo rechazan no se
    /// toca nada (ni `last_modified` ni el historial).
    pub fn set<T: Into<VariableValue>>(&self, name: &str, value: T) -> Result<(), VariableError> {
        let candidate = value.into();
        let change = {
            let mut inner = self.inner.lock();
            let key = inner.canonical(name)?;
            let entry = inner.variables
                             .get_mut(&key)
                             .ok_or_else(|| VariableError::NotFound(key.clone()))?;
            if entry.variable.info.is_read_only {
                return Err(VariableError::validation(&key, "variable is read-only"));
            }
            let accepted = entry.variable.data.check(&key, candidate)?;
            let previous = entry.variable.data.value();
            entry.variable.data.assign(accepted.clone());

            let now = Utc::now();
            entry.variable.last_modified = Some(now);
            entry.history.push(HistoryRecord::new(now, accepted.clone()));
            trace!("variable set name={key} value={accepted:?}");

            VariableChange { name: key,
                             index: entry.variable.index,
                             previous,
                             current: accepted,
                             timestamp: now }
        };
        // sin receptores send() devuelve Err; no afecta a la mutación
        let _ = self.notifier.send(change);
        Ok(())
    }

    pub fn add_alias(&self, name: &str, alias: &str) -> Result<(), VariableError> {
        let mut inner = self.inner.lock();
        let canonical = inner.canonical(name)?;
        if alias == canonical {
            return Ok(());
        }
        if inner.variables.contains_key(alias) {
            return Err(VariableError::DuplicateKey(format!("alias '{alias}' is a variable name")));
        }
        match inner.aliases.get(alias) {
            Some(owner) if *owner == canonical => return Ok(()),
            Some(owner) => {
                return Err(VariableError::DuplicateKey(format!("alias '{alias}' already bound to '{owner}'")));
            }
            None => {}
        }
        inner.aliases.insert(alias.to_string(), canonical.clone());
        if let Some(entry) = inner.variables.get_mut(&canonical) {
            entry.variable.aliases.insert(alias.to_string());
        }
        Ok(())
    }

    /// Mueve la variable al grupo indicado; una variable pertenece a lo sumo a
    /// un grupo.
    pub fn add_to_group(&self, group: &str, name: &str) -> Result<(), VariableError> {
        let mut inner = self.inner.lock();
        let canonical = inner.canonical(name)?;
        let previous = inner.variables.get(&canonical).and_then(|e| e.variable.group.clone());
        if let Some(previous) = previous.filter(|g| g != group) {
            inner.leave_group(&canonical, &previous);
        }
        inner.groups
             .entry(group.to_string())
             .or_default()
             .insert(canonical.clone());
        if let Some(entry) = inner.variables.get_mut(&canonical) {
            entry.variable.group = Some(group.to_string());
        }
        Ok(())
    }

    pub fn group_members(&self, group: &str) -> Vec<String> {
        self.inner
            .lock()
            .groups
            .get(group)
            .map(|m| m.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn groups(&self) -> Vec<String> {
        self.inner.lock().groups.keys().cloned().collect()
    }

    /// Edita descripción, unidad, marcas o metadatos sin tocar valor ni historial.
    pub fn update_info<F>(&self, name: &str, f: F) -> Result<(), VariableError>
        where F: FnOnce(&mut VariableInfo)
    {
        let mut inner = self.inner.lock();
        let canonical = inner.canonical(name)?;
        let entry = inner.variables
                         .get_mut(&canonical)
                         .ok_or(VariableError::NotFound(canonical.clone()))?;
        f(&mut entry.variable.info);
        Ok(())
    }

    /// Elimina la variable junto con sus alias, su grupo y su historial.
    pub fn remove(&self, name: &str) -> Result<Variable, VariableError> {
        let mut inner = self.inner.lock();
        let canonical = inner.canonical(name)?;
        let entry = inner.variables
                         .shift_remove(&canonical)
                         .ok_or(VariableError::NotFound(canonical.clone()))?;
        inner.by_index.remove(&entry.variable.index);
        inner.aliases.retain(|_, owner| *owner != canonical);
        if let Some(group) = &entry.variable.group {
            inner.leave_group(&canonical, group);
        }
        debug!("variable removed name={canonical}");
        Ok(entry.variable)
    }

    pub fn create_snapshot(&self, name: &str) -> Snapshot {
        let inner = self.inner.lock();
        let values = inner.variables
                          .iter()
                          .map(|(k, e)| (k.clone(), e.variable.value()))
                          .collect();
        Snapshot::new(name, values)
    }

    /// Restore best-effort: aplica `set` entrada por entrada. Los nombres que
    /// ya no existen se omiten y un fallo no impide aplicar el resto ni
    /// revierte lo ya aplicado.
    pub fn restore_from_snapshot(&self, snapshot: &Snapshot) -> RestoreReport {
        let mut report = RestoreReport::default();
        for (name, value) in snapshot.values() {
            match self.set(name, value.clone()) {
                Ok(()) => report.applied.push(name.clone()),
                Err(VariableError::NotFound(_)) => report.skipped.push(name.clone()),
                Err(e) => report.failed.push((name.clone(), e)),
            }
        }
        debug!("snapshot '{}' restored applied={} skipped={} failed={}",
               snapshot.name(),
               report.applied.len(),
               report.skipped.len(),
               report.failed.len());
        report
    }

    /// Historial con `from <= ts <= to` en orden cronológico.
    pub fn get_history(&self, name: &str, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<HistoryRecord>, VariableError> {
        let inner = self.inner.lock();
        Ok(inner.entry(name)?.history.range(from, to))
    }

    /// Historial completo retenido para la variable.
    pub fn export_history(&self, name: &str) -> Result<Vec<HistoryRecord>, VariableError> {
        let inner = self.inner.lock();
        Ok(inner.entry(name)?.history.iter().cloned().collect())
    }

    /// Copia de todas las variables, en orden de creación.
    pub fn export_variables(&self) -> Vec<Variable> {
        self.inner
            .lock()
            .variables
            .values()
            .map(|e| e.variable.clone())
            .collect()
    }

    /// Variables junto con su historial, tomados bajo un mismo lock: el
    /// último registro de cada historial coincide con el valor exportado.
    pub fn export_with_history(&self) -> Vec<(Variable, Vec<HistoryRecord>)> {
        self.inner
            .lock()
            .variables
            .values()
            .map(|e| (e.variable.clone(), e.history.iter().cloned().collect()))
            .collect()
    }

    /// Reemplazo completo del contenido (carga desde persistencia). Se valida
    /// todo antes de intercambiar; ante un error el store queda como estaba.
    /// Los historiales comienzan vacíos.
    pub fn replace_all(&self, variables: Vec<Variable>) -> Result<(), VariableError> {
        let mut next = Inner::default();
        for variable in variables {
            variable.data.validate_self(&variable.name)?;
            if next.is_bound(&variable.name) {
                return Err(VariableError::DuplicateKey(format!("name '{}'", variable.name)));
            }
            if next.by_index.contains_key(&variable.index) {
                return Err(VariableError::DuplicateKey(format!("index {}", variable.index)));
            }
            for alias in &variable.aliases {
                if next.is_bound(alias) || *alias == variable.name {
                    return Err(VariableError::DuplicateKey(format!("alias '{alias}'")));
                }
                next.aliases.insert(alias.clone(), variable.name.clone());
            }
            if let Some(group) = &variable.group {
                next.groups
                    .entry(group.clone())
                    .or_default()
                    .insert(variable.name.clone());
            }
            next.by_index.insert(variable.index, variable.name.clone());
            next.variables.insert(variable.name.clone(),
                                  Entry { variable,
                                          history: History::with_capacity(self.config.history_capacity) });
        }
        let mut inner = self.inner.lock();
        debug!("variable store replaced: {} -> {} variables", inner.variables.len(), next.variables.len());
        *inner = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn export_with_history_pairs_each_value_with_its_records() {
        let store = VariableStore::default();
        store.create(VariableKind::Numeric, "Speed", 1).unwrap();
        store.create(VariableKind::String, "Recipe", 2).unwrap();
        store.set("Speed", 1.0).unwrap();
        store.set("Speed", 2.0).unwrap();

        let exported = store.export_with_history();
        assert_eq!(exported.len(), 2);
        let (speed, records) = &exported[0];
        assert_eq!(speed.name, "Speed");
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].value(), &speed.value());
        assert!(exported[1].1.is_empty());
    }

    #[test]
    fn alias_resolves_to_the_same_variable() {
        let store = VariableStore::default();
        store.create(VariableKind::Numeric, "Speed", 1).unwrap();
        store.add_alias("Speed", "MotorSpeed").unwrap();
        store.set("MotorSpeed", 12.0).unwrap();
        assert_eq!(store.get::<f64>("Speed").unwrap(), 12.0);
        assert!(store.contains("MotorSpeed"));
        // el mismo alias sobre la misma variable no es error
        store.add_alias("Speed", "MotorSpeed").unwrap();
    }

    #[test]
    fn moving_between_groups_leaves_previous_group() {
        let store = VariableStore::default();
        store.create(VariableKind::Numeric, "A", 1).unwrap();
        store.add_to_group("line1", "A").unwrap();
        store.add_to_group("line2", "A").unwrap();
        assert!(store.group_members("line1").is_empty());
        assert_eq!(store.group_members("line2"), vec!["A".to_string()]);
        assert_eq!(store.variable("A").unwrap().group.as_deref(), Some("line2"));
    }

    #[test]
    fn remove_frees_name_index_and_aliases() {
        let store = VariableStore::default();
        store.create(VariableKind::String, "Recipe", 7).unwrap();
        store.add_alias("Recipe", "R").unwrap();
        store.remove("R").unwrap();
        assert!(!store.contains("Recipe"));
        assert!(!store.contains("R"));
        store.create(VariableKind::Numeric, "Recipe", 7).unwrap();
    }

    #[test]
    fn read_only_variables_reject_writes() {
        let store = VariableStore::default();
        store.create_with(VariableDefinition::numeric("Serial", 1).with_initial(42.0).read_only())
             .unwrap();
        assert!(matches!(store.set("Serial", 1.0), Err(VariableError::Validation { .. })));
        assert_eq!(store.get::<i32>("Serial").unwrap(), 42);
    }

    #[test]
    fn replace_all_rejects_duplicates_and_keeps_previous_content() {
        let store = VariableStore::default();
        store.create(VariableKind::Numeric, "Keep", 1).unwrap();
        let mut a = store.variable("Keep").unwrap();
        a.name = "A".into();
        let mut b = a.clone();
        b.name = "B".into();
        assert!(matches!(store.replace_all(vec![a.clone(), b]), Err(VariableError::DuplicateKey(_))));
        assert!(store.contains("Keep"));

        store.replace_all(vec![a]).unwrap();
        assert_eq!(store.names(), vec!["A".to_string()]);
    }
}
