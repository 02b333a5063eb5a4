//! Sistema de alarmes – condições, debounce de voz e pisca do destaque.
//!
//! Cada slot monitorado tem dois timers independentes:
//! - voz: no máximo um aviso por `interval` enquanto a condição vale;
//! - pisca: alterna o destaque a cada [`BLINK_PERIOD`] enquanto a condição vale
//!   e volta ao normal no mesmo tick em que ela deixa de valer.

use crate::config::{AlarmRule, MonitorConfig};
use crate::readout;
use crate::store::TelemetryStore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Cadência fixa do pisca.
pub const BLINK_PERIOD: Duration = Duration::from_millis(500);

/// Tolerância da condição `equal` (valores já arredondados a 2 casas).
const EQUAL_TOLERANCE: f64 = 1e-6;

/// Condição de disparo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlarmCondition {
    #[default]
    Lower,
    Equal,
    Higher,
}

impl AlarmCondition {
    pub fn holds(self, value: f64, threshold: f64) -> bool {
        match self {
            AlarmCondition::Lower => value < threshold,
            AlarmCondition::Equal => (value - threshold).abs() < EQUAL_TOLERANCE,
            AlarmCondition::Higher => value > threshold,
        }
    }
}

/// Estado efêmero de alarme de um slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlarmState {
    pub last_voice_trigger: Option<Instant>,
    pub last_blink_toggle: Option<Instant>,
    pub highlight: bool,
}

/// Resultado de um tick para um slot.
#[derive(Debug, Clone, PartialEq)]
pub struct AlarmOutcome {
    /// Destaque de alarme ligado
    pub highlight: bool,
    /// Texto a falar, se o timer de voz disparou neste tick
    pub voice: Option<String>,
}

/// Estado de um slot de monitor após um tick de alarmes.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotStatus {
    pub index: usize,
    pub name: String,
    pub unit: String,
    pub value: f64,
    pub highlight: bool,
    pub alert: Option<String>,
}

/// Avaliador de alarmes de todos os slots monitorados.
#[derive(Debug, Default)]
pub struct AlarmEvaluator {
    states: HashMap<usize, AlarmState>,
}

impl AlarmEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Estado atual do slot `index`.
    pub fn state(&self, index: usize) -> Option<&AlarmState> {
        self.states.get(&index)
    }

    /// Avalia um slot com valor presente.
    pub fn evaluate(
        &mut self,
        index: usize,
        name: &str,
        unit: &str,
        value: f64,
        rule: &AlarmRule,
        now: Instant,
    ) -> AlarmOutcome {
        let state = self.states.entry(index).or_default();

        if !rule.enabled || !rule.condition.holds(value, rule.threshold) {
            state.highlight = false;
            state.last_blink_toggle = None;
            return AlarmOutcome {
                highlight: false,
                voice: None,
            };
        }

        let voice = if elapsed(state.last_voice_trigger, now, rule.voice_interval()) {
            state.last_voice_trigger = Some(now);
            Some(format_alert_text(&rule.text, name, value, unit))
        } else {
            None
        };

        if elapsed(state.last_blink_toggle, now, BLINK_PERIOD) {
            state.last_blink_toggle = Some(now);
            state.highlight = !state.highlight;
        }

        AlarmOutcome {
            highlight: state.highlight,
            voice,
        }
    }

    /// Lê todos os slots ligados de `monitor` no store e avalia seus alarmes.
    ///
    /// Slots sem ligação ou sem valor recebido ficam de fora e mantêm o estado.
    pub fn evaluate_monitor(
        &mut self,
        monitor: &MonitorConfig,
        store: &TelemetryStore,
        now: Instant,
    ) -> Vec<SlotStatus> {
        let mut statuses = Vec::with_capacity(monitor.slots.len());
        for (index, slot) in monitor.slots.iter().enumerate() {
            let Some(value) = readout::read_slot(store, slot) else {
                continue;
            };
            let outcome = self.evaluate(index, &slot.name, &slot.unit, value, &slot.alarm, now);
            statuses.push(SlotStatus {
                index,
                name: slot.name.clone(),
                unit: slot.unit.clone(),
                value,
                highlight: outcome.highlight,
                alert: outcome.voice,
            });
        }
        statuses
    }

    /// Descarta o estado de todos os slots (desconexão).
    pub fn reset(&mut self) {
        self.states.clear();
    }
}

fn elapsed(last: Option<Instant>, now: Instant, period: Duration) -> bool {
    last.is_none_or(|t| now.saturating_duration_since(t) >= period)
}

/// Formata um valor para fala/exibição.
pub fn format_value(value: f64) -> String {
    format!("{value}")
}

/// Substitui `%s` (nome), `%v` (valor) e `%u` (unidade) no texto.
pub fn format_alert_text(template: &str, name: &str, value: f64, unit: &str) -> String {
    template
        .replace("%s", name)
        .replace("%v", &format_value(value))
        .replace("%u", unit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MonitorSlotConfig;
    use crate::types::{Aggregate, Slot, SlotKind, TelemetryUpdate};

    fn rule(condition: AlarmCondition, threshold: f64, interval_secs: f64) -> AlarmRule {
        AlarmRule {
            enabled: true,
            condition,
            threshold,
            interval_secs,
            text: "%s %v %u".into(),
        }
    }

    #[test]
    fn conditions() {
        assert!(AlarmCondition::Lower.holds(3.4, 3.5));
        assert!(!AlarmCondition::Lower.holds(3.5, 3.5));
        assert!(AlarmCondition::Equal.holds(3.5, 3.5));
        assert!(AlarmCondition::Higher.holds(90.1, 90.0));
        assert!(!AlarmCondition::Higher.holds(90.0, 90.0));
    }

    #[test]
    fn placeholders_are_substituted() {
        let text = format_alert_text("%s baixa: %v %u", "Cell", 3.42, "v");
        assert_eq!(text, "Cell baixa: 3.42 v");
        assert_eq!(format_alert_text("sem marcadores", "x", 1.0, "y"), "sem marcadores");
    }

    #[test]
    fn voice_fires_once_per_interval() {
        let mut eval = AlarmEvaluator::new();
        let r = rule(AlarmCondition::Lower, 3.5, 1.0);
        let start = Instant::now();
        let tick = Duration::from_millis(20);
        let interval = Duration::from_secs(1);
        let total = 2 * interval;

        let mut triggers = 0;
        let mut t = Duration::ZERO;
        while t <= total {
            let out = eval.evaluate(0, "Cell", "v", 3.3, &r, start + t);
            if out.voice.is_some() {
                triggers += 1;
            }
            t += tick;
        }
        let expected = (total.as_millis() / interval.as_millis()) as usize + 1;
        assert_eq!(triggers, expected);
    }

    #[test]
    fn voice_text_uses_slot_name_and_value() {
        let mut eval = AlarmEvaluator::new();
        let r = rule(AlarmCondition::Higher, 80.0, 5.0);
        let out = eval.evaluate(2, "Temp1", "C", 85.5, &r, Instant::now());
        assert_eq!(out.voice.as_deref(), Some("Temp1 85.5 C"));
    }

    #[test]
    fn voice_is_suppressed_after_brief_recovery() {
        let mut eval = AlarmEvaluator::new();
        let r = rule(AlarmCondition::Lower, 3.5, 10.0);
        let t0 = Instant::now();
        assert!(eval.evaluate(0, "Cell", "v", 3.3, &r, t0).voice.is_some());
        // Volta ao normal e cai de novo antes do intervalo
        assert!(eval.evaluate(0, "Cell", "v", 3.6, &r, t0 + Duration::from_secs(1)).voice.is_none());
        assert!(eval.evaluate(0, "Cell", "v", 3.3, &r, t0 + Duration::from_secs(2)).voice.is_none());
        assert!(eval.evaluate(0, "Cell", "v", 3.3, &r, t0 + Duration::from_secs(10)).voice.is_some());
    }

    #[test]
    fn zero_interval_speaks_every_tick() {
        let mut eval = AlarmEvaluator::new();
        let r = rule(AlarmCondition::Lower, 3.5, 0.0);
        let t0 = Instant::now();
        for i in 0..5 {
            let out = eval.evaluate(0, "Cell", "v", 3.0, &r, t0 + Duration::from_millis(20 * i));
            assert!(out.voice.is_some());
        }
    }

    #[test]
    fn highlight_blinks_on_fixed_cadence() {
        let mut eval = AlarmEvaluator::new();
        let r = rule(AlarmCondition::Lower, 3.5, 60.0);
        let t0 = Instant::now();
        let at = |ms| t0 + Duration::from_millis(ms);

        assert!(eval.evaluate(0, "Cell", "v", 3.3, &r, at(0)).highlight);
        assert!(eval.evaluate(0, "Cell", "v", 3.3, &r, at(20)).highlight);
        assert!(eval.evaluate(0, "Cell", "v", 3.3, &r, at(480)).highlight);
        assert!(!eval.evaluate(0, "Cell", "v", 3.3, &r, at(500)).highlight);
        assert!(!eval.evaluate(0, "Cell", "v", 3.3, &r, at(980)).highlight);
        assert!(eval.evaluate(0, "Cell", "v", 3.3, &r, at(1000)).highlight);
    }

    #[test]
    fn highlight_resets_as_soon_as_condition_clears() {
        let mut eval = AlarmEvaluator::new();
        let r = rule(AlarmCondition::Lower, 3.5, 60.0);
        let t0 = Instant::now();
        assert!(eval.evaluate(0, "Cell", "v", 3.3, &r, t0).highlight);
        let out = eval.evaluate(0, "Cell", "v", 3.7, &r, t0 + Duration::from_millis(20));
        assert!(!out.highlight);
        assert!(out.voice.is_none());
        assert!(!eval.state(0).unwrap().highlight);
    }

    #[test]
    fn disabled_rule_never_highlights() {
        let mut eval = AlarmEvaluator::new();
        let mut r = rule(AlarmCondition::Lower, 3.5, 1.0);
        r.enabled = false;
        let out = eval.evaluate(0, "Cell", "v", 1.0, &r, Instant::now());
        assert_eq!(
            out,
            AlarmOutcome {
                highlight: false,
                voice: None
            }
        );
    }

    #[test]
    fn slots_are_independent_and_reset_clears_them() {
        let mut eval = AlarmEvaluator::new();
        let r = rule(AlarmCondition::Higher, 10.0, 30.0);
        let t0 = Instant::now();
        assert!(eval.evaluate(0, "A", "", 11.0, &r, t0).voice.is_some());
        assert!(eval.evaluate(1, "B", "", 11.0, &r, t0).voice.is_some());
        assert!(eval.evaluate(0, "A", "", 11.0, &r, t0 + Duration::from_secs(1)).voice.is_none());

        eval.reset();
        assert!(eval.state(0).is_none());
        assert!(eval.evaluate(0, "A", "", 11.0, &r, t0 + Duration::from_secs(2)).voice.is_some());
    }

    #[test]
    fn monitor_skips_unbound_and_absent_slots() {
        let store = TelemetryStore::new();
        store.apply(&[
            TelemetryUpdate {
                sensor_id: 0x1B,
                metric_id: 0x0300,
                slot: Slot::Cell(1),
                value: 3.41,
            },
            TelemetryUpdate {
                sensor_id: 0x1B,
                metric_id: 0x0300,
                slot: Slot::Cell(2),
                value: 3.8,
            },
        ]);
        let monitor = MonitorConfig {
            name: "Voo".into(),
            slots: vec![
                MonitorSlotConfig {
                    name: "vazio".into(),
                    ..Default::default()
                },
                MonitorSlotConfig {
                    name: "Cell".into(),
                    unit: "v".into(),
                    sensor_id: Some(0x1B),
                    metric_id: Some(0x0300),
                    slot: SlotKind::Cells,
                    aggregate: Aggregate::Min,
                    alarm: AlarmRule {
                        text: "%s %v".into(),
                        ..rule(AlarmCondition::Lower, 3.5, 15.0)
                    },
                    ..Default::default()
                },
                MonitorSlotConfig {
                    name: "RSSI".into(),
                    sensor_id: Some(0x98),
                    metric_id: Some(0xF101),
                    ..Default::default()
                },
            ],
        };

        let mut eval = AlarmEvaluator::new();
        let statuses = eval.evaluate_monitor(&monitor, &store, Instant::now());
        assert_eq!(statuses.len(), 1);
        assert_eq!(statuses[0].index, 1);
        assert!(statuses[0].highlight);
        assert_eq!(statuses[0].alert.as_deref(), Some("Cell 3.41"));
    }
}
