//! Avisos de voz: caixa de mensagem de um slot + worker dedicado.
//!
//! O poll de alarmes só deposita o texto ([`VoiceMailbox::post`]); a síntese,
//! que pode levar segundos, roda numa thread própria. A caixa guarda no máximo
//! uma mensagem: postar de novo substitui a pendente.

use std::process::Command;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::JoinHandle;
use tracing::{debug, info, warn};

/// Erros da síntese de voz.
#[derive(Debug, thiserror::Error)]
pub enum VoiceError {
    #[error("Falha ao executar '{program}': {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("'{program}' terminou com status {status}")]
    Status { program: String, status: String },
}

/// Motor de fala.
pub trait Speaker: Send {
    fn speak(&mut self, text: &str) -> Result<(), VoiceError>;
}

/// Só registra o texto no log.
#[derive(Debug, Default)]
pub struct LogSpeaker;

impl Speaker for LogSpeaker {
    fn speak(&mut self, text: &str) -> Result<(), VoiceError> {
        info!("🔊 {text}");
        Ok(())
    }
}

/// Fala via programa TTS externo (`espeak`, `say`…), texto como último argumento.
#[derive(Debug, Clone)]
pub struct CommandSpeaker {
    program: String,
    args: Vec<String>,
}

impl CommandSpeaker {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

impl Speaker for CommandSpeaker {
    fn speak(&mut self, text: &str) -> Result<(), VoiceError> {
        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(text)
            .status()
            .map_err(|source| VoiceError::Spawn {
                program: self.program.clone(),
                source,
            })?;
        if status.success() {
            Ok(())
        } else {
            Err(VoiceError::Status {
                program: self.program.clone(),
                status: status.to_string(),
            })
        }
    }
}

// ──────────────────────────────────────────────
// Mailbox
// ──────────────────────────────────────────────

#[derive(Debug, Default)]
struct Inbox {
    message: Option<String>,
    closed: bool,
}

/// Caixa de mensagem de um slot, última mensagem vence.
#[derive(Debug, Default)]
pub struct VoiceMailbox {
    inbox: Mutex<Inbox>,
    signal: Condvar,
}

impl VoiceMailbox {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn lock(&self) -> MutexGuard<'_, Inbox> {
        self.inbox.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Deposita `text`, substituindo qualquer mensagem pendente.
    pub fn post(&self, text: impl Into<String>) {
        let mut inbox = self.lock();
        if inbox.closed {
            return;
        }
        if inbox.message.replace(text.into()).is_some() {
            debug!("Mensagem de voz pendente substituída");
        }
        self.signal.notify_one();
    }

    /// Mensagem pendente, sem consumi-la.
    pub fn pending(&self) -> Option<String> {
        self.lock().message.clone()
    }

    /// Bloqueia até haver mensagem; `None` quando a caixa foi fechada.
    pub fn wait(&self) -> Option<String> {
        let mut inbox = self.lock();
        loop {
            if inbox.closed {
                return None;
            }
            if let Some(text) = inbox.message.take() {
                return Some(text);
            }
            inbox = self.signal.wait(inbox).unwrap_or_else(|e| e.into_inner());
        }
    }

    /// Fecha a caixa; o worker termina ao acordar.
    pub fn close(&self) {
        let mut inbox = self.lock();
        inbox.closed = true;
        inbox.message = None;
        self.signal.notify_all();
    }
}

/// Inicia o worker de voz. Termina quando `mailbox` é fechada.
pub fn spawn_voice_worker<S>(
    mailbox: Arc<VoiceMailbox>,
    mut speaker: S,
) -> std::io::Result<JoinHandle<()>>
where
    S: Speaker + 'static,
{
    std::thread::Builder::new()
        .name("voice".into())
        .spawn(move || {
            while let Some(text) = mailbox.wait() {
                if let Err(e) = speaker.speak(&text) {
                    warn!("Erro na síntese de voz: {e}");
                }
            }
            debug!("Worker de voz encerrado");
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Duration;

    struct ChannelSpeaker {
        spoken: mpsc::Sender<String>,
        gate: Option<mpsc::Receiver<()>>,
    }

    impl Speaker for ChannelSpeaker {
        fn speak(&mut self, text: &str) -> Result<(), VoiceError> {
            if let Some(gate) = &self.gate {
                let _ = gate.recv_timeout(Duration::from_secs(5));
            }
            let _ = self.spoken.send(text.to_string());
            Ok(())
        }
    }

    #[test]
    fn latest_post_wins() {
        let mailbox = VoiceMailbox::new();
        mailbox.post("primeira");
        mailbox.post("segunda");
        assert_eq!(mailbox.pending().as_deref(), Some("segunda"));
        assert_eq!(mailbox.wait().as_deref(), Some("segunda"));
        assert_eq!(mailbox.pending(), None);
    }

    #[test]
    fn closed_mailbox_wakes_and_rejects_posts() {
        let mailbox = VoiceMailbox::new();
        mailbox.post("x");
        mailbox.close();
        mailbox.post("y");
        assert_eq!(mailbox.wait(), None);
    }

    #[test]
    fn worker_speaks_posted_messages_and_stops_on_close() {
        let mailbox = VoiceMailbox::new();
        let (tx, rx) = mpsc::channel();
        let worker = spawn_voice_worker(
            Arc::clone(&mailbox),
            ChannelSpeaker {
                spoken: tx,
                gate: None,
            },
        )
        .unwrap();

        mailbox.post("Cell baixa");
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), "Cell baixa");

        mailbox.close();
        worker.join().unwrap();
    }

    #[test]
    fn messages_posted_during_speech_collapse_to_latest() {
        let mailbox = VoiceMailbox::new();
        let (tx, rx) = mpsc::channel();
        let (gate_tx, gate_rx) = mpsc::channel();
        let worker = spawn_voice_worker(
            Arc::clone(&mailbox),
            ChannelSpeaker {
                spoken: tx,
                gate: Some(gate_rx),
            },
        )
        .unwrap();

        mailbox.post("a");
        // Espera o worker pegar "a" e ficar preso na síntese
        while mailbox.pending().is_some() {
            std::thread::sleep(Duration::from_millis(1));
        }
        mailbox.post("b");
        mailbox.post("c");
        gate_tx.send(()).unwrap();
        gate_tx.send(()).unwrap();

        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), "a");
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), "c");

        mailbox.close();
        worker.join().unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn command_speaker_reports_missing_program() {
        let mut speaker = CommandSpeaker::new("/nonexistent/tts-binary", Vec::new());
        assert!(matches!(speaker.speak("oi"), Err(VoiceError::Spawn { .. })));
    }
}
