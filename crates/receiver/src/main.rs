//! # Weather Receiver
//!
//! Monitor headless das páginas de clima transmitidas pelo sender.
//! Escuta frames UDP, decodifica a página de 8 bytes e registra
//! condição e temperatura a cada mudança.

mod monitor;
mod net_thread;

use monitor::{PageEvent, WeatherMonitor};
use tracing::{debug, info, warn};
use weather_core::config::AppConfig;

fn main() {
    // ── Logging ──
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // ── Config ──
    let config_path = AppConfig::default_path();
    let config = AppConfig::load(&config_path);

    // Salva config padrão se não existir
    if !config_path.exists() {
        if let Err(e) = config.save(&config_path) {
            warn!("Não foi possível salvar config padrão: {e}");
        }
    }

    let rx = net_thread::spawn_receiver_thread(config.receiver.port, config.receiver.device_number);
    let mut monitor = WeatherMonitor::new();

    // Termina quando a thread de rede some
    for msg in rx.iter() {
        let frame = &msg.frame;
        if !frame.payload.reserved_is_clear() {
            warn!(
                "Bytes reservados não nulos de {} ({}): {}",
                frame.channel_id, msg.source_addr, frame.payload
            );
        }

        match monitor.observe(&msg) {
            PageEvent::First(snapshot) | PageEvent::Changed(snapshot) => info!(
                "RX {} ({}): {} | {}°C | página {}",
                frame.channel_id,
                msg.source_addr,
                snapshot.condition,
                snapshot.temperature_celsius,
                frame.payload
            ),
            PageEvent::Unchanged => debug!(
                "RX {}: {} (#{})",
                frame.channel_id,
                frame.payload,
                monitor.pages()
            ),
        }
    }
}
