//! Backends de transporte do monitor: TCP e porta serial.

use serialport::SerialPort;
use smartport_core::config::{LinkConfig, LinkKind};
use smartport_core::transport::{Transport, TransportError};
use std::io::{ErrorKind, Read};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;
use tracing::debug;

/// Timeout para estabelecer a conexão TCP.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Timeouts de zero são rejeitados pelos sockets.
const MIN_READ_TIMEOUT: Duration = Duration::from_millis(1);

/// Cria o transporte configurado (ainda desconectado).
pub fn open_link(link: &LinkConfig) -> Box<dyn Transport> {
    match link.kind {
        LinkKind::Tcp => Box::new(TcpLink::new(link.read_timeout())),
        LinkKind::Serial => Box::new(SerialLink::new(link.baud_rate, link.read_timeout())),
    }
}

/// Classifica erros de I/O de leitura.
fn read_error(e: &std::io::Error) -> TransportError {
    match e.kind() {
        ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted => {
            TransportError::ReadTimeout
        }
        ErrorKind::ConnectionReset
        | ErrorKind::ConnectionAborted
        | ErrorKind::BrokenPipe
        | ErrorKind::UnexpectedEof
        | ErrorKind::NotConnected => TransportError::RemoteDisconnected,
        _ => TransportError::Unknown(e.to_string()),
    }
}

// ──────────────────────────────────────────────
// TCP
// ──────────────────────────────────────────────

/// Socket TCP (ponte serial→TCP, simulador).
#[derive(Debug)]
pub struct TcpLink {
    stream: Option<TcpStream>,
    read_timeout: Duration,
}

impl TcpLink {
    pub fn new(read_timeout: Duration) -> Self {
        Self {
            stream: None,
            read_timeout: read_timeout.max(MIN_READ_TIMEOUT),
        }
    }
}

impl Transport for TcpLink {
    fn connect(&mut self, target: &str) -> Result<(), TransportError> {
        self.disconnect();

        let failed = |e: std::io::Error| TransportError::ConnectFailed(format!("{target}: {e}"));
        let addr = target
            .to_socket_addrs()
            .map_err(failed)?
            .next()
            .ok_or_else(|| TransportError::ConnectFailed(format!("{target}: endereço não resolvido")))?;

        let stream = TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT).map_err(failed)?;
        stream
            .set_read_timeout(Some(self.read_timeout))
            .map_err(failed)?;
        let _ = stream.set_nodelay(true);

        debug!("TCP conectado a {addr}");
        self.stream = Some(stream);
        Ok(())
    }

    fn read(&mut self, max_len: usize) -> Result<Vec<u8>, TransportError> {
        let stream = self.stream.as_mut().ok_or(TransportError::Unavailable)?;
        let mut buf = vec![0u8; max_len];
        match stream.read(&mut buf) {
            // EOF: o outro lado fechou
            Ok(0) if max_len > 0 => {
                self.stream = None;
                Err(TransportError::RemoteDisconnected)
            }
            Ok(n) => {
                buf.truncate(n);
                Ok(buf)
            }
            Err(e) => Err(read_error(&e)),
        }
    }

    fn disconnect(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(Shutdown::Both);
        }
    }

    fn name(&self) -> &'static str {
        "tcp"
    }
}

// ──────────────────────────────────────────────
// Serial
// ──────────────────────────────────────────────

/// Porta serial (RFCOMM `/dev/rfcomm0`, adaptador USB…).
pub struct SerialLink {
    port: Option<Box<dyn SerialPort>>,
    baud_rate: u32,
    read_timeout: Duration,
}

impl SerialLink {
    pub fn new(baud_rate: u32, read_timeout: Duration) -> Self {
        Self {
            port: None,
            baud_rate,
            read_timeout: read_timeout.max(MIN_READ_TIMEOUT),
        }
    }
}

impl Transport for SerialLink {
    fn connect(&mut self, target: &str) -> Result<(), TransportError> {
        self.disconnect();
        let port = serialport::new(target, self.baud_rate)
            .timeout(self.read_timeout)
            .open()
            .map_err(|e| TransportError::ConnectFailed(format!("{target}: {e}")))?;
        debug!("Porta serial {target} aberta a {} baud", self.baud_rate);
        self.port = Some(port);
        Ok(())
    }

    fn read(&mut self, max_len: usize) -> Result<Vec<u8>, TransportError> {
        let port = self.port.as_mut().ok_or(TransportError::Unavailable)?;
        let mut buf = vec![0u8; max_len];
        match port.read(&mut buf) {
            Ok(n) => {
                buf.truncate(n);
                Ok(buf)
            }
            // Device removido
            Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::PermissionDenied) => {
                self.port = None;
                Err(TransportError::RemoteDisconnected)
            }
            Err(e) => Err(read_error(&e)),
        }
    }

    fn disconnect(&mut self) {
        self.port = None;
    }

    fn name(&self) -> &'static str {
        "serial"
    }
}
