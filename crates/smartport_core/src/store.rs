//! Store de telemetria: últimos valores por sensor/métrica/slot.
//!
//! Escrito pelo poll de decodificação e lido pelo poll de alarmes, em threads
//! diferentes. Todos os updates de um frame entram sob o mesmo write lock, então
//! o leitor nunca vê um frame pela metade.

use crate::sensors;
use crate::types::{Aggregate, Slot, SlotKind, TelemetryUpdate};
use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Valores de um par `(sensor_id, metric_id)`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricEntry {
    pub primary: Option<f64>,
    pub secondary: Option<f64>,
    /// Posição 1-based → tensão
    pub cells: BTreeMap<u8, f64>,
}

impl MetricEntry {
    fn set(&mut self, slot: Slot, value: f64) {
        match slot {
            Slot::Primary => self.primary = Some(value),
            Slot::Secondary => self.secondary = Some(value),
            Slot::Cell(pos) => {
                self.cells.insert(pos, value);
            }
        }
    }

    fn get(&self, slot: Slot) -> Option<f64> {
        match slot {
            Slot::Primary => self.primary,
            Slot::Secondary => self.secondary,
            Slot::Cell(pos) => self.cells.get(&pos).copied(),
        }
    }

    fn kinds(&self) -> impl Iterator<Item = SlotKind> + '_ {
        [
            self.primary.map(|_| SlotKind::Primary),
            self.secondary.map(|_| SlotKind::Secondary),
            (!self.cells.is_empty()).then_some(SlotKind::Cells),
        ]
        .into_iter()
        .flatten()
    }
}

/// Slot já recebido, com nome e unidade da tabela de sensores.
#[derive(Debug, Clone, PartialEq)]
pub struct AvailableSlot {
    pub sensor_id: u8,
    pub metric_id: u16,
    pub kind: SlotKind,
    pub name: &'static str,
    pub unit: &'static str,
}

type Entries = HashMap<u8, HashMap<u16, MetricEntry>>;

/// Store thread-safe de telemetria.
#[derive(Debug, Default)]
pub struct TelemetryStore {
    entries: RwLock<Entries>,
}

impl TelemetryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Entries> {
        self.entries.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Entries> {
        self.entries.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Aplica os updates de um frame de uma vez.
    pub fn apply(&self, updates: &[TelemetryUpdate]) {
        if updates.is_empty() {
            return;
        }
        let mut entries = self.write();
        for u in updates {
            entries
                .entry(u.sensor_id)
                .or_default()
                .entry(u.metric_id)
                .or_default()
                .set(u.slot, u.value);
        }
    }

    /// Último valor do slot; `None` se nunca recebido.
    pub fn value(&self, sensor_id: u8, metric_id: u16, slot: Slot) -> Option<f64> {
        self.read()
            .get(&sensor_id)
            .and_then(|m| m.get(&metric_id))
            .and_then(|e| e.get(slot))
    }

    /// Cópia da coleção de células; `None` se nenhuma célula foi recebida.
    pub fn cells(&self, sensor_id: u8, metric_id: u16) -> Option<BTreeMap<u8, f64>> {
        self.read()
            .get(&sensor_id)
            .and_then(|m| m.get(&metric_id))
            .filter(|e| !e.cells.is_empty())
            .map(|e| e.cells.clone())
    }

    /// Agregado sobre a coleção de células.
    pub fn aggregate(&self, sensor_id: u8, metric_id: u16, aggregate: Aggregate) -> Option<f64> {
        let entries = self.read();
        let cells = &entries.get(&sensor_id)?.get(&metric_id)?.cells;
        aggregate_cells(cells, aggregate)
    }

    /// Cópia da entrada inteira de uma métrica.
    pub fn entry(&self, sensor_id: u8, metric_id: u16) -> Option<MetricEntry> {
        self.read().get(&sensor_id)?.get(&metric_id).cloned()
    }

    /// Slots recebidos até agora, ordenados por sensor e métrica.
    pub fn available_slots(&self) -> Vec<AvailableSlot> {
        let entries = self.read();
        let mut out = Vec::new();
        for (&sensor_id, metrics) in entries.iter() {
            for (&metric_id, entry) in metrics {
                let Some(range) = sensors::lookup(metric_id) else {
                    continue;
                };
                for kind in entry.kinds() {
                    if let Some(spec) = range.slot(kind) {
                        out.push(AvailableSlot {
                            sensor_id,
                            metric_id,
                            kind,
                            name: spec.name,
                            unit: spec.unit,
                        });
                    }
                }
            }
        }
        out.sort_by_key(|s| (s.sensor_id, s.metric_id, s.kind));
        out
    }

    /// Número de pares `(sensor_id, metric_id)` presentes.
    pub fn len(&self) -> usize {
        self.read().values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Apaga tudo (desconexão).
    pub fn clear(&self) {
        self.write().clear();
    }
}

/// Agrega uma coleção de células.
///
/// `Sum` e `Max` usam todas as células; `Min` ignora células `<= 0` (célula não
/// ligada reporta zero). `Delta` é `max - min`. Sem célula positiva, `Min` e
/// `Delta` são `None`.
pub fn aggregate_cells(cells: &BTreeMap<u8, f64>, aggregate: Aggregate) -> Option<f64> {
    if cells.is_empty() {
        return None;
    }
    let max = || cells.values().copied().fold(f64::NEG_INFINITY, f64::max);
    let min = || {
        cells
            .values()
            .copied()
            .filter(|v| *v > 0.0)
            .reduce(f64::min)
    };
    match aggregate {
        Aggregate::Sum => Some(cells.values().sum()),
        Aggregate::Max => Some(max()),
        Aggregate::Min => min(),
        Aggregate::Delta => min().map(|m| max() - m),
    }
}
