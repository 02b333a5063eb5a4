//! Protocolo Smartport: frames, byte-stuffing e montagem a partir do stream.
//!
//! Formato do frame (após remoção dos escapes):
//!
//! ```text
//! ┌──────────┬───────────┬──────────┬──────────────┬───────────────┬────────┐
//! │ 0x7E (1) │ sensor(1) │ frame(1) │ metric LE(2) │ value LE (4)  │ crc(1) │
//! └──────────┴───────────┴──────────┴──────────────┴───────────────┴────────┘
//! ```
//!
//! - `0x7E` inicia um frame; em qualquer outra posição é escapado.
//! - `0x7D` escapa o byte seguinte, que chega com XOR `0x20`.
//! - Só `frame_id == 0x10` carrega telemetria.

use crate::crc;

/// Marcador de início de frame.
pub const START_BYTE: u8 = 0x7E;

/// Marcador de escape.
pub const ESCAPE_BYTE: u8 = 0x7D;

/// Máscara aplicada ao byte escapado.
pub const ESCAPE_XOR: u8 = 0x20;

/// Tamanho fixo de um frame sem escapes.
pub const FRAME_LEN: usize = 10;

/// `frame_id` dos frames de dados de telemetria.
pub const DATA_FRAME_ID: u8 = 0x10;

// ──────────────────────────────────────────────
// RawFrame
// ──────────────────────────────────────────────

/// Frame completo de 10 bytes, ainda não validado.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawFrame(pub [u8; FRAME_LEN]);

impl RawFrame {
    pub fn bytes(&self) -> &[u8; FRAME_LEN] {
        &self.0
    }

    pub fn sensor_id(&self) -> u8 {
        self.0[1]
    }

    pub fn frame_id(&self) -> u8 {
        self.0[2]
    }

    pub fn metric_id(&self) -> u16 {
        u16::from_le_bytes([self.0[3], self.0[4]])
    }

    pub fn raw_value(&self) -> u32 {
        u32::from_le_bytes([self.0[5], self.0[6], self.0[7], self.0[8]])
    }

    /// Checksum confere.
    pub fn is_valid(&self) -> bool {
        crc::is_valid(&self.0)
    }
}

// ──────────────────────────────────────────────
// FrameAssembler
// ──────────────────────────────────────────────

/// Monta frames de 10 bytes a partir de pedaços arbitrários do stream.
///
/// O estado (frame parcial e escape pendente) sobrevive entre chamadas de
/// [`push`](Self::push). Um `0x7E` sempre descarta o parcial e recomeça.
#[derive(Debug, Default)]
pub struct FrameAssembler {
    buf: Vec<u8>,
    escape_pending: bool,
}

impl FrameAssembler {
    pub fn new() -> Self {
        Self {
            buf: Vec::with_capacity(FRAME_LEN),
            escape_pending: false,
        }
    }

    /// Consome `chunk` e retorna os frames completados nele.
    ///
    /// Frames são emitidos sem validar o checksum.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<RawFrame> {
        let mut frames = Vec::new();

        for &b in chunk {
            if b == START_BYTE {
                self.buf.clear();
                self.buf.push(START_BYTE);
                self.escape_pending = false;
                continue;
            }

            // Fora de frame: lixo até o próximo marcador
            if self.buf.is_empty() {
                continue;
            }

            if self.escape_pending {
                self.buf.push(b ^ ESCAPE_XOR);
                self.escape_pending = false;
            } else if b == ESCAPE_BYTE {
                self.escape_pending = true;
                continue;
            } else {
                self.buf.push(b);
            }

            if self.buf.len() == FRAME_LEN {
                let mut frame = [0u8; FRAME_LEN];
                frame.copy_from_slice(&self.buf);
                frames.push(RawFrame(frame));
                self.buf.clear();
            }
        }

        frames
    }

    /// Descarta qualquer frame parcial.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.escape_pending = false;
    }

    /// Há um frame parcial em andamento.
    pub fn in_frame(&self) -> bool {
        !self.buf.is_empty()
    }
}

// ──────────────────────────────────────────────
// Encoder
// ──────────────────────────────────────────────

/// Monta um frame com checksum calculado.
pub fn build_frame(sensor_id: u8, frame_id: u8, metric_id: u16, value: u32) -> RawFrame {
    let mut frame = [0u8; FRAME_LEN];
    frame[0] = START_BYTE;
    frame[1] = sensor_id;
    frame[2] = frame_id;
    frame[3..5].copy_from_slice(&metric_id.to_le_bytes());
    frame[5..9].copy_from_slice(&value.to_le_bytes());
    frame[9] = crc::checksum(&frame);
    RawFrame(frame)
}

/// Aplica byte-stuffing a um frame para transmissão.
///
/// O marcador inicial segue cru; `0x7E`/`0x7D` no resto viram `0x7D, b ^ 0x20`.
pub fn stuff(frame: &RawFrame) -> Vec<u8> {
    let mut out = Vec::with_capacity(FRAME_LEN + 4);
    out.push(frame.0[0]);
    for &b in &frame.0[1..] {
        if b == START_BYTE || b == ESCAPE_BYTE {
            out.push(ESCAPE_BYTE);
            out.push(b ^ ESCAPE_XOR);
        } else {
            out.push(b);
        }
    }
    out
}

/// Atalho: [`build_frame`] + [`stuff`].
pub fn encode_frame(sensor_id: u8, frame_id: u8, metric_id: u16, value: u32) -> Vec<u8> {
    stuff(&build_frame(sensor_id, frame_id, metric_id, value))
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────
