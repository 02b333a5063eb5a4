//! Tabela de sensores Smartport e decodificação de valores.
//!
//! Cada faixa `[start, end)` de `metric_id` mapeia para um ou mais slots com
//! nome, unidade, multiplicador e deslocamento de bits. Adicionar um sensor é
//! adicionar uma linha em [`SENSOR_TABLE`]; a decodificação não muda.

use crate::protocol::DATA_FRAME_ID;
use crate::types::{Slot, SlotKind, TelemetryUpdate};

/// Maior posição de célula endereçável: índice base de 4 bits (0..=15) + 2.
pub const MAX_CELL_POSITION: u8 = 17;

/// Metadados de um slot de sensor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlotSpec {
    pub kind: SlotKind,
    pub name: &'static str,
    pub unit: &'static str,
    pub multiplier: f64,
    /// Deslocamento do campo dentro do valor bruto de 32 bits
    pub shift: u32,
}

/// Faixa de `metric_id` (fim exclusivo) e os slots que ela produz.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorRange {
    pub start: u16,
    pub end: u16,
    pub slots: &'static [SlotSpec],
}

impl SensorRange {
    pub fn contains(&self, metric_id: u16) -> bool {
        (self.start..self.end).contains(&metric_id)
    }

    /// Slot do tipo pedido, se a faixa o declara.
    pub fn slot(&self, kind: SlotKind) -> Option<&'static SlotSpec> {
        self.slots.iter().find(|s| s.kind == kind)
    }
}

const fn primary(name: &'static str, unit: &'static str, multiplier: f64) -> SlotSpec {
    SlotSpec {
        kind: SlotKind::Primary,
        name,
        unit,
        multiplier,
        shift: 0,
    }
}

const fn secondary(name: &'static str, unit: &'static str, multiplier: f64) -> SlotSpec {
    SlotSpec {
        kind: SlotKind::Secondary,
        name,
        unit,
        multiplier,
        shift: 16,
    }
}

const fn cells(name: &'static str, unit: &'static str, multiplier: f64) -> SlotSpec {
    SlotSpec {
        kind: SlotKind::Cells,
        name,
        unit,
        multiplier,
        shift: 8,
    }
}

macro_rules! range {
    ($start:expr, $end:expr, [$($slot:expr),+ $(,)?]) => {
        SensorRange {
            start: $start,
            end: $end,
            slots: &[$($slot),+],
        }
    };
}

/// Sensores conhecidos. As faixas são disjuntas.
pub static SENSOR_TABLE: &[SensorRange] = &[
    range!(0x0100, 0x010F, [primary("Alt", "m", 1.0)]),
    range!(0x0110, 0x011F, [primary("Vario", "m/s", 1.0)]),
    range!(0x0200, 0x020F, [primary("Curr", "A", 0.1)]),
    range!(0x0210, 0x021F, [primary("VFAS", "v", 0.01)]),
    range!(0x0300, 0x030F, [cells("Cell", "v", 0.002)]),
    range!(0x0400, 0x040F, [primary("Temp1", "C", 1.0)]),
    range!(0x0410, 0x041F, [primary("Temp2", "C", 1.0)]),
    range!(0x0500, 0x050F, [primary("Rpm", "rpm", 1.0)]),
    range!(0x0600, 0x060F, [primary("Fuel", "%", 0.01)]),
    range!(0x0700, 0x070F, [primary("AccX", "g", 0.01)]),
    range!(0x0710, 0x071F, [primary("AccY", "g", 0.01)]),
    range!(0x0720, 0x072F, [primary("AccZ", "g", 0.01)]),
    range!(
        0x0800,
        0x080F,
        [primary("GPSLong", "", 0.01), secondary("GPSLat", "", 0.01)]
    ),
    range!(0x0820, 0x082F, [primary("GPSAlt", "m", 0.01)]),
    range!(0x0830, 0x083F, [primary("GPSSpeed", "kts", 0.001)]),
    range!(0x0840, 0x084F, [primary("GPSCours", "°", 0.01)]),
    range!(0x0850, 0x085F, [primary("GPSTime", "", 0.01)]),
    range!(0x0900, 0x090F, [primary("A3", "v", 0.01)]),
    range!(0x0910, 0x091F, [primary("A4", "v", 0.01)]),
    range!(0x0A00, 0x0A0F, [primary("AirSpeed", "kts", 0.01)]),
    range!(0x0A10, 0x0A1F, [primary("FuelQty", "ml", 0.01)]),
    range!(0x0B00, 0x0B0F, [primary("RboxBatt1", "v", 0.001)]),
    range!(0x0B10, 0x0B1F, [primary("RboxBatt2", "v", 0.001)]),
    range!(0x0B20, 0x0B2F, [primary("RboxState", "", 0.01)]),
    range!(0x0B30, 0x0B3F, [primary("RboxCons", "mAh", 1.0)]),
    range!(
        0x0B50,
        0x0B5F,
        [primary("EscV", "v", 0.01), secondary("EscA", "A", 0.01)]
    ),
    range!(
        0x0B60,
        0x0B6F,
        [primary("EscRpm", "rpm", 100.0), secondary("EscCons", "mAh", 1.0)]
    ),
    range!(0x0D00, 0x0D0F, [primary("GassuitT1", "C", 1.0)]),
    range!(0x0D10, 0x0D1F, [primary("GassuitT2", "C", 1.0)]),
    range!(0x0D20, 0x0D2F, [primary("GassuitSpeed", "rpm", 1.0)]),
    range!(0x0D30, 0x0D3F, [primary("GassuitResVol", "ml", 1.0)]),
    range!(0x0D40, 0x0D4F, [primary("GassuitPerc", "%", 1.0)]),
    range!(0x0D50, 0x0D5F, [primary("GassuitFlow", "%", 1.0)]),
    range!(0x0D60, 0x0D6F, [primary("GassuitMaxFlow", "%", 1.0)]),
    range!(0x0D70, 0x0D7F, [primary("GassuitAvgFlow", "%", 1.0)]),
    range!(
        0x0E50,
        0x0E5F,
        [primary("SBecV", "v", 0.01), secondary("SBecA", "A", 0.01)]
    ),
    range!(0xF101, 0xF102, [primary("RSSI", "", 1.0)]),
    range!(0xF102, 0xF103, [primary("A1", "v", 0.1)]),
    range!(0xF103, 0xF104, [primary("A2", "v", 0.1)]),
    range!(0xF104, 0xF105, [primary("RXBT", "v", 0.1)]),
    range!(0xF105, 0xF106, [primary("RAS", "%", 1.0)]),
];

/// Procura a faixa que contém `metric_id`.
pub fn lookup(metric_id: u16) -> Option<&'static SensorRange> {
    SENSOR_TABLE.iter().find(|r| r.contains(metric_id))
}

// ──────────────────────────────────────────────
// Decoder
// ──────────────────────────────────────────────

/// Converte campos de um frame em updates de telemetria.
#[derive(Debug, Clone, Copy)]
pub struct SensorDecoder {
    table: &'static [SensorRange],
}

impl Default for SensorDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl SensorDecoder {
    pub fn new() -> Self {
        Self {
            table: SENSOR_TABLE,
        }
    }

    /// Decoder sobre uma tabela alternativa.
    pub fn with_table(table: &'static [SensorRange]) -> Self {
        Self { table }
    }

    /// Entrada da tabela para `metric_id`.
    pub fn describe(&self, metric_id: u16) -> Option<&'static SensorRange> {
        self.table.iter().find(|r| r.contains(metric_id))
    }

    /// Decodifica um frame de dados.
    ///
    /// Retorna vazio para `frame_id != 0x10` e para métricas desconhecidas.
    /// Um frame de células produz duas posições adjacentes.
    pub fn decode(
        &self,
        sensor_id: u8,
        frame_id: u8,
        metric_id: u16,
        raw_value: u32,
    ) -> Vec<TelemetryUpdate> {
        if frame_id != DATA_FRAME_ID {
            return Vec::new();
        }
        let Some(range) = self.describe(metric_id) else {
            return Vec::new();
        };

        let mut updates = Vec::with_capacity(2);
        let mut push = |slot: Slot, value: f64| {
            updates.push(TelemetryUpdate {
                sensor_id,
                metric_id,
                slot,
                value,
            });
        };

        for spec in range.slots {
            match spec.kind {
                SlotKind::Primary | SlotKind::Secondary => {
                    let field = (raw_value >> spec.shift) & 0xFFFF;
                    let slot = if spec.kind == SlotKind::Primary {
                        Slot::Primary
                    } else {
                        Slot::Secondary
                    };
                    push(slot, f64::from(field) * spec.multiplier);
                }
                SlotKind::Cells => {
                    let base = (raw_value & 0x0F) as u8;
                    let first = (raw_value >> spec.shift) & 0x0FFF;
                    let second = raw_value >> 20;
                    push(Slot::Cell(base + 1), f64::from(first) * spec.multiplier);
                    push(Slot::Cell(base + 2), f64::from(second) * spec.multiplier);
                }
            }
        }

        updates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn value_of(updates: &[TelemetryUpdate], slot: Slot) -> Option<f64> {
        updates.iter().find(|u| u.slot == slot).map(|u| u.value)
    }

    #[test]
    fn ranges_are_disjoint_and_ordered_per_entry() {
        for (i, a) in SENSOR_TABLE.iter().enumerate() {
            assert!(a.start < a.end, "faixa vazia em 0x{:04X}", a.start);
            for b in &SENSOR_TABLE[i + 1..] {
                assert!(
                    a.end <= b.start || b.end <= a.start,
                    "faixas 0x{:04X} e 0x{:04X} se sobrepõem",
                    a.start,
                    b.start
                );
            }
        }
    }

    #[test]
    fn range_end_is_exclusive() {
        assert_eq!(lookup(0x0100).map(|r| r.slots[0].name), Some("Alt"));
        assert_eq!(lookup(0x010E).map(|r| r.slots[0].name), Some("Alt"));
        assert!(lookup(0x010F).is_none());
        assert_eq!(lookup(0xF101).map(|r| r.slots[0].name), Some("RSSI"));
        assert_eq!(lookup(0xF102).map(|r| r.slots[0].name), Some("A1"));
    }

    #[test]
    fn primary_uses_low_half() {
        let d = SensorDecoder::new();
        // VFAS, 0.01 V por unidade
        let updates = d.decode(0x1B, DATA_FRAME_ID, 0x0210, 0xABCD_04B0);
        assert_eq!(updates.len(), 1);
        assert_relative_eq!(value_of(&updates, Slot::Primary).unwrap(), 12.0, epsilon = 1e-9);
    }

    #[test]
    fn secondary_uses_high_half() {
        let d = SensorDecoder::new();
        // EscV = 11.10 V, EscA = 25.00 A
        let raw = (2500u32 << 16) | 1110;
        let updates = d.decode(0x1B, DATA_FRAME_ID, 0x0B50, raw);
        assert_eq!(updates.len(), 2);
        assert_relative_eq!(value_of(&updates, Slot::Primary).unwrap(), 11.1, epsilon = 1e-9);
        assert_relative_eq!(value_of(&updates, Slot::Secondary).unwrap(), 25.0);
    }

    #[test]
    fn cell_frame_fills_two_positions() {
        let d = SensorDecoder::new();
        let (mv1, mv2) = (1850u32, 1825u32);
        let raw = 3 | (mv1 << 8) | (mv2 << 20);
        let updates = d.decode(0x1B, DATA_FRAME_ID, 0x0300, raw);
        assert_eq!(updates.len(), 2);
        assert_relative_eq!(value_of(&updates, Slot::Cell(4)).unwrap(), 1850.0 * 0.002);
        assert_relative_eq!(value_of(&updates, Slot::Cell(5)).unwrap(), 1825.0 * 0.002);
    }

    #[test]
    fn highest_cell_base_reaches_position_ceiling() {
        let d = SensorDecoder::new();
        let updates = d.decode(0x1B, DATA_FRAME_ID, 0x0300, 0x0F | (1 << 8) | (1 << 20));
        assert_eq!(updates[1].slot, Slot::Cell(MAX_CELL_POSITION));
    }

    #[test]
    fn non_data_frame_is_ignored() {
        let d = SensorDecoder::new();
        assert!(d.decode(0x1B, 0x32, 0x0210, 1200).is_empty());
        assert!(d.decode(0x1B, 0x00, 0x0210, 1200).is_empty());
    }

    #[test]
    fn unknown_metric_is_ignored() {
        let d = SensorDecoder::new();
        assert!(d.decode(0x1B, DATA_FRAME_ID, 0x5000, 1).is_empty());
        assert!(d.decode(0x1B, DATA_FRAME_ID, 0x0000, 1).is_empty());
    }

    #[test]
    fn custom_table_needs_no_decoder_change() {
        static TABLE: &[SensorRange] = &[range!(0x5000, 0x5010, [primary("Pitot", "kts", 0.5)])];
        let d = SensorDecoder::with_table(TABLE);
        let updates = d.decode(0x07, DATA_FRAME_ID, 0x5003, 40);
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].sensor_id, 0x07);
        assert_eq!(updates[0].metric_id, 0x5003);
        assert_relative_eq!(updates[0].value, 20.0);
    }
}
