//! Configuração unificada via TOML.
//!
//! Um único `config.toml` guarda o link (transporte), a voz e os monitores
//! (telas de até seis slots ligados a sensores, com regra de alarme).

use crate::alerts::AlarmCondition;
use crate::types::{Aggregate, SlotKind};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Slots por monitor (layout 2×3 da tela original).
pub const MAX_MONITOR_SLOTS: usize = 6;

/// Intervalo de voz usado quando a regra não define um.
pub const DEFAULT_ALARM_INTERVAL_SECS: f64 = 15.0;

/// Erros de leitura/escrita da configuração.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Erro ao ler {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Erro ao parsear {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Erro ao serializar configuração: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Erro ao gravar {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

// ──────────────────────────────────────────────
// Link
// ──────────────────────────────────────────────

/// Backend de transporte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkKind {
    /// Socket TCP (ponte serial→TCP ou simulador)
    Tcp,
    /// Porta serial (RFCOMM, USB)
    Serial,
}

/// Configuração do link com o receptor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    pub kind: LinkKind,
    /// `host:porta` para TCP, caminho do device para serial
    pub target: String,
    /// Baud rate (só serial)
    pub baud_rate: u32,
    /// Timeout de leitura do transporte (ms)
    pub read_timeout_ms: u64,
    /// Bytes lidos por poll
    pub chunk_size: usize,
    /// Período do poll de decodificação (ms)
    pub decode_poll_ms: u64,
    /// Período do poll de alarmes (ms)
    pub alarm_poll_ms: u64,
    /// Espera antes de reconectar após queda (s)
    pub reconnect_delay_secs: f64,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            kind: LinkKind::Tcp,
            target: "127.0.0.1:5760".into(),
            baud_rate: 57600,
            read_timeout_ms: 3,
            chunk_size: 20,
            decode_poll_ms: 10,
            alarm_poll_ms: 20,
            reconnect_delay_secs: 2.0,
        }
    }
}

impl LinkConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn decode_period(&self) -> Duration {
        Duration::from_millis(self.decode_poll_ms)
    }

    pub fn alarm_period(&self) -> Duration {
        Duration::from_millis(self.alarm_poll_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::try_from_secs_f64(self.reconnect_delay_secs).unwrap_or(Duration::from_secs(2))
    }
}

// ──────────────────────────────────────────────
// Voz
// ──────────────────────────────────────────────

/// Configuração da síntese de voz dos alarmes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    pub enabled: bool,
    /// Programa TTS externo (vazio = só log)
    pub command: String,
    /// Argumentos antes do texto
    pub args: Vec<String>,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            command: String::new(),
            args: Vec::new(),
        }
    }
}

// ──────────────────────────────────────────────
// Monitores
// ──────────────────────────────────────────────

/// Regra de alarme de um slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlarmRule {
    pub enabled: bool,
    pub condition: AlarmCondition,
    pub threshold: f64,
    /// Intervalo mínimo entre avisos de voz (s)
    pub interval_secs: f64,
    /// Texto falado; `%s` nome, `%v` valor, `%u` unidade
    pub text: String,
}

impl Default for AlarmRule {
    fn default() -> Self {
        Self {
            enabled: false,
            condition: AlarmCondition::Lower,
            threshold: 0.0,
            interval_secs: DEFAULT_ALARM_INTERVAL_SECS,
            text: String::new(),
        }
    }
}

impl AlarmRule {
    /// Intervalo de voz. Valores não positivos disparam a cada tick.
    pub fn voice_interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.interval_secs).unwrap_or(Duration::ZERO)
    }
}

/// Ligação de um slot de monitor a um valor decodificado.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSlotConfig {
    pub name: String,
    pub unit: String,
    pub sensor_id: Option<u8>,
    pub metric_id: Option<u16>,
    pub slot: SlotKind,
    /// Só para `slot = "cells"`
    pub aggregate: Aggregate,
    /// Só para slots escalares
    pub multiplier: f64,
    pub alarm: AlarmRule,
}

impl Default for MonitorSlotConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            unit: String::new(),
            sensor_id: None,
            metric_id: None,
            slot: SlotKind::Primary,
            aggregate: Aggregate::Min,
            multiplier: 1.0,
            alarm: AlarmRule::default(),
        }
    }
}

impl MonitorSlotConfig {
    /// `(sensor_id, metric_id)` se o slot está ligado.
    pub fn binding(&self) -> Option<(u8, u16)> {
        Some((self.sensor_id?, self.metric_id?))
    }
}

/// Uma tela de monitor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub name: String,
    pub slots: Vec<MonitorSlotConfig>,
}

// ──────────────────────────────────────────────
// Raiz
// ──────────────────────────────────────────────

/// Configuração raiz do aplicativo.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Nome do monitor avaliado pelo poll de alarmes
    pub active_monitor: String,
    pub link: LinkConfig,
    pub voice: VoiceConfig,
    pub monitors: Vec<MonitorConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            active_monitor: "Bateria".into(),
            link: LinkConfig::default(),
            voice: VoiceConfig::default(),
            monitors: vec![default_monitor()],
        }
    }
}

fn default_monitor() -> MonitorConfig {
    MonitorConfig {
        name: "Bateria".into(),
        slots: vec![
            MonitorSlotConfig {
                name: "VFAS".into(),
                unit: "v".into(),
                sensor_id: Some(0x1B),
                metric_id: Some(0x0210),
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
                    enabled: true,
                    condition: AlarmCondition::Lower,
                    threshold: 3.5,
                    interval_secs: 15.0,
                    text: "%s baixa, %v %u".into(),
                },
                ..Default::default()
            },
            MonitorSlotConfig {
                name: "Curr".into(),
                unit: "A".into(),
                sensor_id: Some(0x1B),
                metric_id: Some(0x0200),
                ..Default::default()
            },
            MonitorSlotConfig {
                name: "RSSI".into(),
                sensor_id: Some(0x98),
                metric_id: Some(0xF101),
                alarm: AlarmRule {
                    enabled: true,
                    condition: AlarmCondition::Lower,
                    threshold: 40.0,
                    interval_secs: 10.0,
                    text: "%s %v".into(),
                },
                ..Default::default()
            },
        ],
    }
}

impl AppConfig {
    /// Carrega configuração de um arquivo TOML.
    ///
    /// Nunca falha: arquivo ausente ou inválido cai na configuração padrão.
    pub fn load(path: &Path) -> Self {
        if path.exists() {
            match Self::try_load(path) {
                Ok(config) => {
                    info!("Configuração carregada de {}", path.display());
                    return config;
                }
                Err(e) => warn!("{e}"),
            }
        }

        info!("Usando configuração padrão");
        AppConfig::default()
    }

    /// Carrega configuração, propagando erros.
    pub fn try_load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Salva configuração em arquivo TOML.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Configuração salva em {}", path.display());
        Ok(())
    }

    /// Retorna o caminho padrão do config.toml.
    pub fn default_path() -> PathBuf {
        let exe_dir = std::env::current_exe()
            .map(|p| p.parent().unwrap_or(Path::new(".")).to_path_buf())
            .unwrap_or_else(|_| PathBuf::from("."));
        exe_dir.join("config.toml")
    }

    /// Monitor ativo, se existir.
    pub fn active(&self) -> Option<&MonitorConfig> {
        self.monitors.iter().find(|m| m.name == self.active_monitor)
    }

    /// Valida a configuração e retorna lista de erros.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.link.target.trim().is_empty() {
            errors.push("Destino do link não pode ser vazio".into());
        }
        if self.link.chunk_size == 0 {
            errors.push("chunk_size não pode ser 0".into());
        }
        if self.link.decode_poll_ms == 0 || self.link.alarm_poll_ms == 0 {
            errors.push("Períodos de poll devem ser > 0 ms".into());
        }
        if self.link.kind == LinkKind::Serial && self.link.baud_rate == 0 {
            errors.push("Baud rate não pode ser 0".into());
        }
        if self.active().is_none() {
            errors.push(format!(
                "Monitor ativo '{}' não existe",
                self.active_monitor
            ));
        }
        for monitor in &self.monitors {
            if monitor.slots.len() > MAX_MONITOR_SLOTS {
                errors.push(format!(
                    "Monitor '{}' tem {} slots (máximo {MAX_MONITOR_SLOTS})",
                    monitor.name,
                    monitor.slots.len()
                ));
            }
            for slot in &monitor.slots {
                if slot.alarm.enabled && slot.binding().is_none() {
                    errors.push(format!(
                        "Slot '{}' de '{}' tem alarme mas não está ligado a um sensor",
                        slot.name, monitor.name
                    ));
                }
            }
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        let errors = config.validate();
        assert!(errors.is_empty(), "Erros: {:?}", errors);
    }

    #[test]
    fn roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(config.link.target, parsed.link.target);
        assert_eq!(config.monitors, parsed.monitors);
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let partial = r#"
active_monitor = "Voo"

[link]
kind = "serial"
target = "/dev/rfcomm0"

[[monitors]]
name = "Voo"

[[monitors.slots]]
name = "Alt"
sensor_id = 0x1B
metric_id = 0x0100

[[monitors.slots]]
name = "vazio"
"#;
        let config: AppConfig = toml::from_str(partial).unwrap();
        assert_eq!(config.link.kind, LinkKind::Serial);
        assert_eq!(config.link.chunk_size, 20);
        assert_eq!(config.link.baud_rate, 57600);

        let monitor = config.active().unwrap();
        assert_eq!(monitor.slots.len(), 2);
        assert_eq!(monitor.slots[0].binding(), Some((0x1B, 0x0100)));
        assert_eq!(monitor.slots[0].multiplier, 1.0);
        assert_eq!(monitor.slots[0].alarm.interval_secs, DEFAULT_ALARM_INTERVAL_SECS);
        assert_eq!(monitor.slots[1].binding(), None);
        assert!(config.validate().is_empty());
    }

    #[test]
    fn unknown_active_monitor_is_reported() {
        let config = AppConfig {
            active_monitor: "nenhum".into(),
            ..Default::default()
        };
        assert!(config.active().is_none());
        assert_eq!(config.validate().len(), 1);
    }

    #[test]
    fn non_positive_interval_means_every_tick() {
        let rule = AlarmRule {
            interval_secs: -1.0,
            ..Default::default()
        };
        assert_eq!(rule.voice_interval(), Duration::ZERO);
        assert_eq!(AlarmRule::default().voice_interval(), Duration::from_secs(15));
    }

    #[test]
    fn missing_file_falls_back_to_default() {
        let config = AppConfig::load(Path::new("/nonexistent/smartport/config.toml"));
        assert_eq!(config.active_monitor, "Bateria");
        assert!(matches!(
            AppConfig::try_load(Path::new("/nonexistent/smartport/config.toml")),
            Err(ConfigError::Read { .. })
        ));
    }
}
