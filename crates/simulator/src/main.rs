//! # Smartport Simulator
//!
//! Serve um voo sintético como stream Smartport via TCP, para testar o
//! monitor sem rádio. Cada cliente recebe o voo desde o início.
//!
//! ## Uso
//! ```bash
//! smartport_sim                 # 0.0.0.0:5760, ciclo de 100 ms
//! smartport_sim 5761 50         # porta e intervalo (ms)
//! ```

mod flight;

use flight::FlightModel;
use std::io::Write;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

const DEFAULT_PORT: u16 = 5760;
const DEFAULT_INTERVAL_MS: u64 = 100;

fn main() {
    // ── Logging ──
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // ── Argumentos ──
    let mut args = std::env::args().skip(1);
    let port = parse_arg(args.next(), DEFAULT_PORT, "porta");
    let interval = Duration::from_millis(parse_arg(args.next(), DEFAULT_INTERVAL_MS, "intervalo").max(1));

    // ── Socket TCP ──
    let listener = match TcpListener::bind(("0.0.0.0", port)) {
        Ok(listener) => listener,
        Err(e) => {
            error!("Falha ao bind porta {port}: {e}");
            std::process::exit(1);
        }
    };

    // ── Banner ──
    println!();
    println!("══════════════════════════════════════════════");
    println!("   📡 SMARTPORT SIMULATOR – ATIVO");
    println!("══════════════════════════════════════════════");
    println!("  Escutando: 0.0.0.0:{port}");
    println!("  Intervalo: {}ms", interval.as_millis());
    println!("══════════════════════════════════════════════");
    println!();

    // ── Loop principal ──
    for incoming in listener.incoming() {
        match incoming {
            Ok(stream) => {
                let peer = stream
                    .peer_addr()
                    .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], 0)));
                info!("Cliente conectado: {peer}");
                let spawned = std::thread::Builder::new()
                    .name(format!("sim-{peer}"))
                    .spawn(move || stream_flight(stream, peer, interval));
                if let Err(e) = spawned {
                    error!("Falha ao criar thread do cliente {peer}: {e}");
                }
            }
            Err(e) => warn!("Erro ao aceitar conexão: {e}"),
        }
    }
}

fn parse_arg<T: std::str::FromStr>(arg: Option<String>, default: T, what: &str) -> T {
    match arg {
        None => default,
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("{what} inválido '{raw}', usando padrão");
            default
        }),
    }
}

/// Envia o voo a um cliente até a conexão cair.
fn stream_flight(mut stream: TcpStream, peer: SocketAddr, interval: Duration) {
    let mut flight = FlightModel::new(interval.as_secs_f64());
    let _ = stream.set_nodelay(true);

    loop {
        let cycle_start = Instant::now();

        let chunk = flight.next_chunk();
        if let Err(e) = stream.write_all(&chunk) {
            info!("Cliente {peer} desconectado após {} ciclos: {e}", flight.cycle());
            return;
        }
        debug!(
            "→ {} bytes para {peer} | RSSI {} | {:.1}A | células {:.2?}",
            chunk.len(),
            flight.rssi(),
            flight.current(),
            flight.cell_voltages()
        );

        // Dormir pelo tempo restante do intervalo
        let elapsed = cycle_start.elapsed();
        if elapsed < interval {
            std::thread::sleep(interval - elapsed);
        }
    }
}
