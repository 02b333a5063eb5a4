//! Tipos compartilhados entre decoder, store, alarmes e configuração.

use serde::{Deserialize, Serialize};
use std::fmt;

// ──────────────────────────────────────────────
// Slots
// ──────────────────────────────────────────────

/// Tipo de slot que uma métrica pode produzir.
///
/// É o que a tabela de sensores declara e o que um slot de monitor referencia.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotKind {
    /// Valor nos 16 bits baixos (índice 0)
    #[default]
    Primary,
    /// Segundo valor empacotado nos 16 bits altos (índice 1)
    Secondary,
    /// Coleção indexada de células (índice 2)
    Cells,
}

impl fmt::Display for SlotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SlotKind::Primary => "primary",
            SlotKind::Secondary => "secondary",
            SlotKind::Cells => "cells",
        };
        f.write_str(s)
    }
}

/// Endereço de um valor dentro de uma métrica.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    Primary,
    Secondary,
    /// Posição 1-based dentro da coleção de células
    Cell(u8),
}

impl Slot {
    /// Tipo de slot correspondente.
    pub fn kind(self) -> SlotKind {
        match self {
            Slot::Primary => SlotKind::Primary,
            Slot::Secondary => SlotKind::Secondary,
            Slot::Cell(_) => SlotKind::Cells,
        }
    }
}

// ──────────────────────────────────────────────
// Updates decodificados
// ──────────────────────────────────────────────

/// Um valor decodificado de um frame, pronto para o [`TelemetryStore`](crate::store::TelemetryStore).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetryUpdate {
    pub sensor_id: u8,
    pub metric_id: u16,
    pub slot: Slot,
    pub value: f64,
}

// ──────────────────────────────────────────────
// Agregados
// ──────────────────────────────────────────────

/// Função de agregação sobre a coleção de células.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregate {
    Sum,
    Max,
    /// Mínimo entre células com valor > 0
    #[default]
    Min,
    /// `max - min`
    Delta,
}
