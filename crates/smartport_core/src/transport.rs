//! Capacidade de transporte consumida pelo núcleo.
//!
//! O núcleo só conhece o trait [`Transport`]; backends concretos (TCP, serial,
//! buffer de notificações BLE) implementam o mesmo contrato.

use std::sync::{Arc, Mutex};

/// Erros de transporte, classificados por severidade.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("Bluetooth não habilitado")]
    NotEnabled,

    #[error("Não foi possível conectar: {0}")]
    ConnectFailed(String),

    #[error("Timeout de leitura")]
    ReadTimeout,

    #[error("Desconectado pelo dispositivo remoto")]
    RemoteDisconnected,

    #[error("Transporte indisponível")]
    Unavailable,

    #[error("Erro desconhecido: {0}")]
    Unknown(String),
}

impl TransportError {
    /// Benigno: basta tentar de novo no próximo poll.
    pub fn is_transient(&self) -> bool {
        matches!(self, TransportError::ReadTimeout)
    }

    /// Encerra a sessão (limpeza + desconexão).
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            TransportError::RemoteDisconnected
                | TransportError::Unavailable
                | TransportError::Unknown(_)
        )
    }
}

/// Transporte de bytes tipo serial.
pub trait Transport: Send {
    /// Conecta a `target` (endereço, device, MAC…).
    fn connect(&mut self, target: &str) -> Result<(), TransportError>;

    /// Lê até `max_len` bytes. Vazio em timeout é permitido.
    fn read(&mut self, max_len: usize) -> Result<Vec<u8>, TransportError>;

    /// Fecha a conexão. Idempotente.
    fn disconnect(&mut self);

    /// Nome do backend para logs.
    fn name(&self) -> &'static str;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn connect(&mut self, target: &str) -> Result<(), TransportError> {
        (**self).connect(target)
    }

    fn read(&mut self, max_len: usize) -> Result<Vec<u8>, TransportError> {
        (**self).read(max_len)
    }

    fn disconnect(&mut self) {
        (**self).disconnect()
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

// ──────────────────────────────────────────────
// Buffer de notificações (BLE)
// ──────────────────────────────────────────────

/// Bytes de cabeçalho ATT no início de cada notificação.
pub const NOTIFY_HEADER_LEN: usize = 3;

#[derive(Debug, Default)]
struct NotifyShared {
    buffer: Vec<u8>,
    connected: bool,
    remote_closed: bool,
}

/// Lado do callback de notificações: empurra dados para o transporte.
#[derive(Debug, Clone)]
pub struct NotifyFeed {
    shared: Arc<Mutex<NotifyShared>>,
}

impl NotifyFeed {
    /// Entrega uma notificação; o cabeçalho ATT é descartado.
    pub fn notify(&self, data: &[u8]) {
        let mut shared = self.shared.lock().unwrap_or_else(|e| e.into_inner());
        if shared.connected && data.len() > NOTIFY_HEADER_LEN {
            shared.buffer.extend_from_slice(&data[NOTIFY_HEADER_LEN..]);
        }
    }

    /// O periférico encerrou a conexão.
    pub fn close(&self) {
        self.shared
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remote_closed = true;
    }
}

/// Transporte alimentado por callbacks de notificação (GATT).
#[derive(Debug, Default)]
pub struct NotifyBufferTransport {
    shared: Arc<Mutex<NotifyShared>>,
}

impl NotifyBufferTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle para o callback de notificações.
    pub fn feed(&self) -> NotifyFeed {
        NotifyFeed {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl Transport for NotifyBufferTransport {
    fn connect(&mut self, target: &str) -> Result<(), TransportError> {
        if target.trim().is_empty() {
            return Err(TransportError::ConnectFailed("endereço vazio".into()));
        }
        let mut shared = self.shared.lock().unwrap_or_else(|e| e.into_inner());
        shared.buffer.clear();
        shared.remote_closed = false;
        shared.connected = true;
        Ok(())
    }

    fn read(&mut self, max_len: usize) -> Result<Vec<u8>, TransportError> {
        let mut shared = self.shared.lock().unwrap_or_else(|e| e.into_inner());
        if shared.remote_closed {
            shared.connected = false;
            return Err(TransportError::RemoteDisconnected);
        }
        if !shared.connected {
            return Err(TransportError::Unavailable);
        }
        let n = max_len.min(shared.buffer.len());
        Ok(shared.buffer.drain(..n).collect())
    }

    fn disconnect(&mut self) {
        let mut shared = self.shared.lock().unwrap_or_else(|e| e.into_inner());
        shared.connected = false;
        shared.buffer.clear();
    }

    fn name(&self) -> &'static str {
        "ble-notify"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_classification() {
        assert!(TransportError::ReadTimeout.is_transient());
        assert!(!TransportError::ReadTimeout.is_fatal());
        assert!(TransportError::RemoteDisconnected.is_fatal());
        assert!(TransportError::Unavailable.is_fatal());
        assert!(TransportError::Unknown("x".into()).is_fatal());
        assert!(!TransportError::ConnectFailed("x".into()).is_fatal());
    }

    #[test]
    fn notify_strips_header_and_drains_in_chunks() {
        let mut t = NotifyBufferTransport::new();
        let feed = t.feed();
        t.connect("AA:BB:CC:DD:EE:FF").unwrap();
        feed.notify(&[0x1B, 0x0E, 0x00, 0x7E, 0x98, 0x10, 0x01]);
        assert_eq!(t.read(2).unwrap(), vec![0x7E, 0x98]);
        assert_eq!(t.read(20).unwrap(), vec![0x10, 0x01]);
        assert!(t.read(20).unwrap().is_empty());
    }

    #[test]
    fn notify_before_connect_is_dropped() {
        let mut t = NotifyBufferTransport::new();
        let feed = t.feed();
        feed.notify(&[0, 0, 0, 1, 2, 3]);
        assert_eq!(t.read(20), Err(TransportError::Unavailable));
        t.connect("AA").unwrap();
        assert!(t.read(20).unwrap().is_empty());
    }

    #[test]
    fn remote_close_is_fatal_on_next_read() {
        let mut t = NotifyBufferTransport::new();
        let feed = t.feed();
        t.connect("AA").unwrap();
        feed.close();
        let err = t.read(20).unwrap_err();
        assert_eq!(err, TransportError::RemoteDisconnected);
        assert!(err.is_fatal());
    }

    #[test]
    fn empty_target_fails_to_connect() {
        let mut t = NotifyBufferTransport::new();
        assert!(matches!(t.connect(" "), Err(TransportError::ConnectFailed(_))));
    }
}
