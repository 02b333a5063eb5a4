//! Sessão de telemetria: poll de decodificação + poll de alarmes.
//!
//! ```text
//!  transporte ──▶ [decode: FrameAssembler → CRC → SensorDecoder] ──▶ TelemetryStore
//!                                                                      │
//!  voz ◀── VoiceMailbox ◀── [alarmes: readout → AlarmEvaluator] ◀──────┘
//! ```
//!
//! Encerrar a sessão (ou perder o link) para as duas threads e limpa o store
//! antes de [`Session::disconnect`] retornar. O estado de alarme vive na thread
//! de alarmes e morre com ela.

use crate::alerts::{AlarmEvaluator, SlotStatus};
use crate::config::{LinkConfig, MonitorConfig};
use crate::protocol::{DATA_FRAME_ID, FrameAssembler};
use crate::sensors::SensorDecoder;
use crate::store::{AvailableSlot, TelemetryStore};
use crate::transport::{Transport, TransportError};
use crate::types::SlotKind;
use crate::voice::VoiceMailbox;
use crossbeam_channel::{Receiver, Sender, bounded, select, tick};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, trace, warn};

/// Capacidade do canal de eventos para o consumidor.
const EVENT_CHANNEL_CAPACITY: usize = 256;

// ──────────────────────────────────────────────
// Pipeline de decodificação
// ──────────────────────────────────────────────

/// Contadores da decodificação.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeStats {
    /// Frames completos montados
    pub frames: u64,
    /// Frames descartados por checksum
    pub crc_failures: u64,
    /// Frames válidos com `frame_id != 0x10`
    pub ignored_frames: u64,
    /// Frames de dados com `metric_id` fora da tabela
    pub unknown_metrics: u64,
    /// Frames que atualizaram o store
    pub decoded: u64,
}

/// Montagem → checksum → decodificação → store, para um stream.
#[derive(Debug, Default)]
pub struct DecodePipeline {
    assembler: FrameAssembler,
    decoder: SensorDecoder,
    stats: DecodeStats,
}

impl DecodePipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_decoder(decoder: SensorDecoder) -> Self {
        Self {
            decoder,
            ..Self::default()
        }
    }

    /// Processa um pedaço do stream. Retorna quantos frames atualizaram o store.
    pub fn ingest(&mut self, chunk: &[u8], store: &TelemetryStore) -> usize {
        let mut decoded = 0;
        for frame in self.assembler.push(chunk) {
            self.stats.frames += 1;

            if !frame.is_valid() {
                self.stats.crc_failures += 1;
                trace!("Frame com CRC inválido: {:02X?}", frame.bytes());
                continue;
            }
            if frame.frame_id() != DATA_FRAME_ID {
                self.stats.ignored_frames += 1;
                continue;
            }

            let updates = self.decoder.decode(
                frame.sensor_id(),
                frame.frame_id(),
                frame.metric_id(),
                frame.raw_value(),
            );
            if updates.is_empty() {
                self.stats.unknown_metrics += 1;
                trace!("Métrica desconhecida 0x{:04X}", frame.metric_id());
                continue;
            }

            store.apply(&updates);
            self.stats.decoded += 1;
            decoded += 1;
        }
        decoded
    }

    pub fn stats(&self) -> DecodeStats {
        self.stats
    }

    /// Descarta frame parcial e zera contadores.
    pub fn reset(&mut self) {
        self.assembler.reset();
        self.stats = DecodeStats::default();
    }
}

// ──────────────────────────────────────────────
// Eventos
// ──────────────────────────────────────────────

/// Evento emitido pela sessão para o consumidor (UI, log…).
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Transporte conectado e polls iniciados
    Connected { transport: &'static str },
    /// Primeiro valor recebido de um slot de sensor
    SensorDiscovered(AvailableSlot),
    /// Slot do monitor mudou de valor/destaque ou disparou aviso
    Slot(SlotStatus),
    /// Erro fatal de transporte; a sessão terminou
    LinkLost(TransportError),
}

/// Períodos e tamanhos dos polls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    pub chunk_size: usize,
    pub decode_period: Duration,
    pub alarm_period: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::from(&LinkConfig::default())
    }
}

impl From<&LinkConfig> for SessionOptions {
    fn from(link: &LinkConfig) -> Self {
        Self {
            chunk_size: link.chunk_size.max(1),
            decode_period: link.decode_period(),
            alarm_period: link.alarm_period(),
        }
    }
}

// ──────────────────────────────────────────────
// Sessão
// ──────────────────────────────────────────────

/// Sessão conectada. Drop equivale a [`Session::disconnect`].
pub struct Session {
    store: Arc<TelemetryStore>,
    shutdown: Option<Sender<()>>,
    decode_thread: Option<JoinHandle<DecodeStats>>,
    alarm_thread: Option<JoinHandle<()>>,
    link_error: Arc<Mutex<Option<TransportError>>>,
    events: Receiver<SessionEvent>,
}

impl Session {
    /// Conecta `transport` a `target` e inicia os dois polls.
    ///
    /// `monitor` ausente: só decodifica (nenhum slot exibido).
    pub fn connect<T>(
        mut transport: T,
        target: &str,
        options: SessionOptions,
        store: Arc<TelemetryStore>,
        monitor: Option<MonitorConfig>,
        mailbox: Option<Arc<VoiceMailbox>>,
    ) -> Result<Self, TransportError>
    where
        T: Transport + 'static,
    {
        // Nada da sessão anterior pode sobreviver
        store.clear();
        transport.connect(target)?;
        let transport_name = transport.name();
        info!("Conectado via {transport_name} a {target}");

        let (event_tx, event_rx) = bounded(EVENT_CHANNEL_CAPACITY);
        let (shutdown_tx, shutdown_rx) = bounded::<()>(0);
        let (alarm_stop_tx, alarm_stop_rx) = bounded::<()>(0);
        let link_error = Arc::new(Mutex::new(None));

        let _ = event_tx.try_send(SessionEvent::Connected {
            transport: transport_name,
        });

        let decode_thread = {
            let store = Arc::clone(&store);
            let events = event_tx.clone();
            let link_error = Arc::clone(&link_error);
            spawn_named("sport-decode", move || {
                let stats = decode_loop(&mut transport, &store, options, &shutdown_rx, &events, &link_error);
                transport.disconnect();
                store.clear();
                drop(alarm_stop_tx);
                stats
            })
        };
        let decode_thread = match decode_thread {
            Ok(handle) => handle,
            Err(e) => return Err(TransportError::Unknown(format!("thread de decodificação: {e}"))),
        };

        let alarm_thread = {
            let store = Arc::clone(&store);
            spawn_named("sport-alarms", move || {
                alarm_loop(&store, monitor.as_ref(), mailbox.as_deref(), options, &alarm_stop_rx, &event_tx);
            })
        };

        let mut session = Self {
            store,
            shutdown: Some(shutdown_tx),
            decode_thread: Some(decode_thread),
            alarm_thread: None,
            link_error,
            events: event_rx,
        };

        match alarm_thread {
            Ok(handle) => session.alarm_thread = Some(handle),
            Err(e) => {
                session.stop();
                return Err(TransportError::Unknown(format!("thread de alarmes: {e}")));
            }
        }

        Ok(session)
    }

    /// Canal de eventos da sessão.
    pub fn events(&self) -> &Receiver<SessionEvent> {
        &self.events
    }

    /// Store alimentado por esta sessão.
    pub fn store(&self) -> &Arc<TelemetryStore> {
        &self.store
    }

    /// `true` enquanto o poll de decodificação roda.
    pub fn is_running(&self) -> bool {
        self.decode_thread
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    /// Erro fatal que encerrou a sessão, se houve.
    pub fn link_error(&self) -> Option<TransportError> {
        self.link_error
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Para os polls, desconecta e limpa o store. Retorna os contadores finais.
    pub fn disconnect(mut self) -> DecodeStats {
        self.stop()
    }

    fn stop(&mut self) -> DecodeStats {
        // Fechar o canal acorda o poll de decodificação
        self.shutdown.take();

        let stats = self
            .decode_thread
            .take()
            .and_then(|h| h.join().ok())
            .unwrap_or_default();
        if let Some(h) = self.alarm_thread.take() {
            if h.join().is_err() {
                error!("Thread de alarmes terminou com pânico");
            }
        }

        self.store.clear();
        stats
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.decode_thread.is_some() {
            self.stop();
        }
    }
}

fn spawn_named<F, R>(name: &str, f: F) -> std::io::Result<JoinHandle<R>>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    std::thread::Builder::new().name(name.into()).spawn(f)
}

fn decode_loop<T: Transport>(
    transport: &mut T,
    store: &TelemetryStore,
    options: SessionOptions,
    shutdown: &Receiver<()>,
    events: &Sender<SessionEvent>,
    link_error: &Mutex<Option<TransportError>>,
) -> DecodeStats {
    let ticker = tick(options.decode_period);
    let mut pipeline = DecodePipeline::new();

    loop {
        select! {
            recv(shutdown) -> _ => break,
            recv(ticker) -> _ => {
                match transport.read(options.chunk_size) {
                    Ok(chunk) => {
                        pipeline.ingest(&chunk, store);
                    }
                    Err(e) if e.is_transient() => {}
                    Err(e) => {
                        if e.is_fatal() {
                            warn!("Link perdido: {e}");
                        } else {
                            error!("Erro inesperado no link: {e}");
                        }
                        *link_error.lock().unwrap_or_else(|p| p.into_inner()) = Some(e.clone());
                        let _ = events.try_send(SessionEvent::LinkLost(e));
                        break;
                    }
                }
            }
        }
    }

    let stats = pipeline.stats();
    debug!(
        "Decodificação encerrada: {} frames, {} CRC inválidos, {} desconhecidos",
        stats.frames, stats.crc_failures, stats.unknown_metrics
    );
    stats
}

fn alarm_loop(
    store: &TelemetryStore,
    monitor: Option<&MonitorConfig>,
    mailbox: Option<&VoiceMailbox>,
    options: SessionOptions,
    stop: &Receiver<()>,
    events: &Sender<SessionEvent>,
) {
    let ticker = tick(options.alarm_period);
    let mut evaluator = AlarmEvaluator::new();
    let mut seen: HashSet<(u8, u16, SlotKind)> = HashSet::new();
    let mut shown: HashMap<usize, (f64, bool)> = HashMap::new();

    if monitor.is_none() {
        debug!("Nenhum monitor ativo; só decodificação");
    }

    loop {
        select! {
            recv(stop) -> _ => break,
            recv(ticker) -> _ => {
                for slot in store.available_slots() {
                    if seen.insert((slot.sensor_id, slot.metric_id, slot.kind)) {
                        info!(
                            "Sensor 0x{:02X} métrica 0x{:04X}: {} ({})",
                            slot.sensor_id, slot.metric_id, slot.name, slot.kind
                        );
                        send(events, SessionEvent::SensorDiscovered(slot));
                    }
                }

                let Some(monitor) = monitor else {
                    continue;
                };
                for status in evaluator.evaluate_monitor(monitor, store, Instant::now()) {
                    if let (Some(text), Some(mailbox)) = (&status.alert, mailbox) {
                        mailbox.post(text.clone());
                    }
                    let current = (status.value, status.highlight);
                    let changed = shown.insert(status.index, current) != Some(current);
                    if changed || status.alert.is_some() {
                        send(events, SessionEvent::Slot(status));
                    }
                }
            }
        }
    }

    evaluator.reset();
}

/// Envio não bloqueante: consumidor lento perde eventos, não trava o poll.
fn send(events: &Sender<SessionEvent>, event: SessionEvent) {
    if events.try_send(event).is_err() {
        debug!("Canal de eventos cheio, descartando evento");
    }
}
