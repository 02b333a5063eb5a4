//! # Smartport Core
//!
//! Crate compartilhada que decodifica o stream Smartport (FrSky S.Port),
//! guarda os valores recebidos e avalia alarmes de voz/destaque sobre eles.
//!
//! ## Módulos
//! - [`protocol`] – Montagem de frames com byte-stuffing e encoder
//! - [`crc`] – Checksum de 8 bits dos frames
//! - [`sensors`] – Tabela de sensores e decodificação de valores
//! - [`types`] – Slots, agregados e atualizações decodificadas
//! - [`store`] – Store concorrente dos últimos valores
//! - [`readout`] – Valor exibido de um slot de monitor
//! - [`alerts`] – Condições, timers de voz e destaque
//! - [`config`] – Configuração unificada via TOML
//! - [`transport`] – Trait de transporte e buffer de notificações BLE
//! - [`voice`] – Caixa de mensagem e worker de voz
//! - [`session`] – Polls de decodificação e alarmes sobre um transporte

pub mod alerts;
pub mod config;
pub mod crc;
pub mod protocol;
pub mod readout;
pub mod sensors;
pub mod session;
pub mod store;
pub mod transport;
pub mod types;
pub mod voice;

// Re-exports convenientes
pub use alerts::{AlarmCondition, AlarmEvaluator, SlotStatus};
pub use config::{AppConfig, LinkKind, MonitorConfig};
pub use protocol::{FrameAssembler, RawFrame, encode_frame};
pub use sensors::SensorDecoder;
pub use session::{DecodePipeline, Session, SessionEvent, SessionOptions};
pub use store::TelemetryStore;
pub use transport::{Transport, TransportError};
pub use types::{Aggregate, Slot, SlotKind, TelemetryUpdate};
pub use voice::{VoiceMailbox, spawn_voice_worker};
