//! # Smartport Monitor
//!
//! Conecta ao receptor (TCP ou serial), decodifica a telemetria Smartport e
//! avalia os alarmes do monitor ativo, falando os avisos.
//!
//! Reconecta sozinho após queda do link. Uso:
//!
//! ```text
//! smartport_monitor [caminho/config.toml]
//! ```

mod links;

use crossbeam_channel::RecvTimeoutError;
use smartport_core::config::AppConfig;
use smartport_core::session::{Session, SessionEvent, SessionOptions};
use smartport_core::store::TelemetryStore;
use smartport_core::voice::{CommandSpeaker, LogSpeaker, VoiceMailbox, spawn_voice_worker};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

fn main() {
    // ── Logging ──
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // ── Config ──
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(AppConfig::default_path);
    let config = AppConfig::load(&config_path);

    if !config_path.exists() {
        if let Err(e) = config.save(&config_path) {
            warn!("{e}");
        }
    }
    for problem in config.validate() {
        warn!("Config: {problem}");
    }

    print_banner(&config);

    // ── Voz ──
    let mailbox = config.voice.enabled.then(VoiceMailbox::new);
    let _voice_worker = mailbox.as_ref().and_then(|mailbox| {
        let spawned = if config.voice.command.trim().is_empty() {
            spawn_voice_worker(Arc::clone(mailbox), LogSpeaker)
        } else {
            let speaker = CommandSpeaker::new(&config.voice.command, config.voice.args.clone());
            spawn_voice_worker(Arc::clone(mailbox), speaker)
        };
        spawned
            .inspect_err(|e| warn!("Falha ao iniciar worker de voz: {e}"))
            .ok()
    });

    // ── Loop de conexão ──
    let store = Arc::new(TelemetryStore::new());
    let options = SessionOptions::from(&config.link);
    let monitor = config.active().cloned();
    if monitor.is_none() {
        warn!("Monitor '{}' não encontrado; só decodificando", config.active_monitor);
    }

    loop {
        let transport = links::open_link(&config.link);
        match Session::connect(
            transport,
            &config.link.target,
            options,
            Arc::clone(&store),
            monitor.clone(),
            mailbox.clone(),
        ) {
            Ok(session) => {
                watch(&session);
                let stats = session.disconnect();
                info!(
                    "Sessão encerrada: {} frames, {} decodificados, {} CRC inválidos, {} desconhecidos",
                    stats.frames, stats.decoded, stats.crc_failures, stats.unknown_metrics
                );
            }
            Err(e) => warn!("{e}"),
        }

        let delay = config.link.reconnect_delay();
        info!("Reconectando em {:.1}s...", delay.as_secs_f64());
        std::thread::sleep(delay);
    }
}

/// Consome eventos até a sessão terminar.
fn watch(session: &Session) {
    loop {
        match session.events().recv_timeout(Duration::from_secs(1)) {
            Ok(event) => log_event(&event),
            Err(RecvTimeoutError::Timeout) if session.is_running() => {}
            Err(_) => break,
        }
    }
}

fn log_event(event: &SessionEvent) {
    match event {
        SessionEvent::Connected { transport } => info!("🔗 Link {transport} ativo"),
        SessionEvent::SensorDiscovered(slot) => {
            debug!("Novo slot disponível: {} [{}]", slot.name, slot.unit)
        }
        SessionEvent::Slot(status) => {
            if let Some(alert) = &status.alert {
                warn!("⚠ {alert}");
            }
            let mark = if status.highlight { "●" } else { " " };
            debug!("{mark} {} = {} {}", status.name, status.value, status.unit);
        }
        SessionEvent::LinkLost(e) => warn!("Link perdido: {e}"),
    }
}

fn print_banner(config: &AppConfig) {
    println!("╔══════════════════════════════════════════╗");
    println!("║        📡 SMARTPORT MONITOR v0.2        ║");
    println!("╚══════════════════════════════════════════╝");
    println!("  Link:      {:?} → {}", config.link.kind, config.link.target);
    println!("  Monitor:   {}", config.active_monitor);
    println!(
        "  Voz:       {}",
        match (config.voice.enabled, config.voice.command.is_empty()) {
            (false, _) => "desligada",
            (true, true) => "log",
            (true, false) => config.voice.command.as_str(),
        }
    );
    println!("  Polls:     {}ms decode / {}ms alarmes", config.link.decode_poll_ms, config.link.alarm_poll_ms);
    println!();
}
