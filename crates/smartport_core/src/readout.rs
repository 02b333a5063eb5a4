//! Leitura de um slot de monitor a partir do store.

use crate::config::MonitorSlotConfig;
use crate::store::TelemetryStore;
use crate::types::{Slot, SlotKind};

/// Arredonda para 2 casas, como exibido.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Valor exibido de um slot, já arredondado.
///
/// `None` quando o slot não está ligado ou o valor ainda não chegou.
/// Escalares aplicam o multiplicador do slot; células usam o agregado.
pub fn read_slot(store: &TelemetryStore, slot: &MonitorSlotConfig) -> Option<f64> {
    let (sensor_id, metric_id) = slot.binding()?;
    let raw = match slot.slot {
        SlotKind::Primary => store.value(sensor_id, metric_id, Slot::Primary)? * slot.multiplier,
        SlotKind::Secondary => {
            store.value(sensor_id, metric_id, Slot::Secondary)? * slot.multiplier
        }
        SlotKind::Cells => store.aggregate(sensor_id, metric_id, slot.aggregate)?,
    };
    Some(round2(raw))
}
