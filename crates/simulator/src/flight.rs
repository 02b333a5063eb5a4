//! Voo sintético: gera os frames Smartport de cada ciclo.
//!
//! O modelo é determinístico (mesma sequência a cada execução) para que os
//! alarmes do monitor possam ser exercitados de forma repetível.

use smartport_core::protocol::{DATA_FRAME_ID, START_BYTE, encode_frame};

/// Sensor de bateria/corrente/altitude (FLVSS, FAS, vario).
pub const BATTERY_SENSOR: u8 = 0x1B;
/// Receptor (RSSI).
pub const RECEIVER_SENSOR: u8 = 0x98;
/// GPS.
pub const GPS_SENSOR: u8 = 0x83;
/// ESC.
pub const ESC_SENSOR: u8 = 0x67;

/// Métrica fora da tabela, enviada de vez em quando.
pub const UNKNOWN_METRIC: u16 = 0x5000;

/// Células do pack simulado.
pub const CELL_COUNT: usize = 4;

/// Duração do voo até o pack chegar ao fim (s).
const FLIGHT_SECS: f64 = 300.0;

/// Lixo entre frames: bytes soltos, escape órfão e um frame truncado.
const NOISE: [u8; 6] = [0x55, 0x7D, 0xAA, START_BYTE, BATTERY_SENSOR, DATA_FRAME_ID];

/// Estado do voo simulado.
#[derive(Debug, Clone)]
pub struct FlightModel {
    cycle: u64,
    dt: f64,
    noise_every: u64,
    unknown_every: u64,
}

impl FlightModel {
    /// `dt`: segundos simulados por ciclo.
    pub fn new(dt: f64) -> Self {
        Self {
            cycle: 0,
            dt,
            noise_every: 7,
            unknown_every: 10,
        }
    }

    /// Sem ruído nem métricas desconhecidas.
    #[cfg(test)]
    pub fn clean(dt: f64) -> Self {
        Self {
            noise_every: 0,
            unknown_every: 0,
            ..Self::new(dt)
        }
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    fn elapsed(&self) -> f64 {
        self.cycle as f64 * self.dt
    }

    /// Tensão de cada célula (v): descarga linear com queda sob carga.
    pub fn cell_voltages(&self) -> [f64; CELL_COUNT] {
        let t = self.elapsed();
        let drain = 0.9 * (t / FLIGHT_SECS).min(1.0);
        let sag = 0.02 * self.current() / 10.0;
        let mut cells = [0.0; CELL_COUNT];
        for (i, cell) in cells.iter_mut().enumerate() {
            // Célula 4 ligeiramente mais fraca
            let imbalance = if i == CELL_COUNT - 1 { 0.05 } else { 0.01 * i as f64 };
            *cell = (4.2 - drain - sag - imbalance).max(3.0);
        }
        cells
    }

    /// Corrente (A).
    pub fn current(&self) -> f64 {
        let t = self.elapsed();
        12.0 + 6.0 * (t / 7.0).sin().abs()
    }

    /// Altitude relativa (m).
    pub fn altitude(&self) -> f64 {
        let t = self.elapsed();
        60.0 + 40.0 * (t / 20.0).sin()
    }

    /// RSSI: cai conforme o modelo se afasta.
    pub fn rssi(&self) -> u32 {
        let t = self.elapsed();
        (90.0 - 55.0 * (t / 90.0).sin().abs()) as u32
    }

    /// Bytes do próximo ciclo, já com byte-stuffing.
    pub fn next_chunk(&mut self) -> Vec<u8> {
        let t = self.elapsed();
        let cells = self.cell_voltages();
        let pack: f64 = cells.iter().sum();
        let current = self.current();

        let mut out = Vec::with_capacity(160);
        let mut frame = |sensor_id: u8, metric_id: u16, value: u32| {
            out.extend(encode_frame(sensor_id, DATA_FRAME_ID, metric_id, value));
        };

        frame(BATTERY_SENSOR, 0x0100, self.altitude().round() as u32);
        frame(BATTERY_SENSOR, 0x0110, (2.0 * (t / 20.0).cos()).abs().round() as u32);
        frame(BATTERY_SENSOR, 0x0200, (current * 10.0).round() as u32);
        frame(BATTERY_SENSOR, 0x0210, (pack * 100.0).round() as u32);
        for base in (0..CELL_COUNT).step_by(2) {
            let raw = cell_raw(base as u32, cells[base], cells[base + 1]);
            frame(BATTERY_SENSOR, 0x0300, raw);
        }

        let long = (4_000.0 + 50.0 * (t / 30.0).cos()).round() as u32;
        let lat = (2_300.0 + 50.0 * (t / 30.0).sin()).round() as u32;
        frame(GPS_SENSOR, 0x0800, (long & 0xFFFF) | (lat << 16));

        frame(RECEIVER_SENSOR, 0xF101, self.rssi());

        let esc_v = (pack * 100.0).round() as u32;
        let esc_a = (current * 100.0).round() as u32;
        frame(ESC_SENSOR, 0x0B50, (esc_v & 0xFFFF) | (esc_a << 16));

        if self.unknown_every > 0 && self.cycle % self.unknown_every == self.unknown_every - 1 {
            frame(BATTERY_SENSOR, UNKNOWN_METRIC, self.cycle as u32);
        }
        if self.noise_every > 0 && self.cycle % self.noise_every == self.noise_every - 1 {
            out.extend_from_slice(&NOISE);
        }

        self.cycle += 1;
        out
    }
}

/// Valor bruto de um frame de células: índice base + duas tensões (passo 2 mV).
fn cell_raw(base: u32, first: f64, second: f64) -> u32 {
    let mv = |v: f64| ((v / 0.002).round() as u32) & 0x0FFF;
    base | (mv(first) << 8) | (mv(second) << 20)
}
