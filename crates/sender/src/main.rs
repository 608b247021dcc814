//! # Weather Sender
//!
//! Transmite o clima atual como página ANT+ de 8 bytes (Tx-Broadcast).
//! O rádio é simulado via UDP; o clima vem do OpenWeatherMap.
//!
//! ## Uso
//! ```bash
//! OPENWEATHER_API_KEY=... weather_sender    # Ctrl+C fecha o canal
//! ```

mod channel;
mod scheduler;
mod shutdown;
mod transport;
mod weather;

use channel::{ChannelError, ChannelLifecycleController};
use scheduler::BroadcastScheduler;
use shutdown::{Shutdown, spawn_signal_handler};
use std::time::Instant;
use tracing::{error, info, warn};
use transport::UdpNode;
use weather::{OpenWeatherMap, WeatherFetchError, WeatherRefresher};
use weather_core::config::AppConfig;
use weather_core::ConfigurationError;

/// Erros fatais de inicialização/execução.
#[derive(Debug, thiserror::Error)]
enum SenderError {
    #[error("Configuração inválida: {}", .0.join("; "))]
    InvalidConfig(Vec<String>),

    #[error("Configuração do canal inválida: {0}")]
    Channel(#[from] ConfigurationError),

    #[error("Falha ao criar cliente de clima: {0}")]
    Weather(#[from] WeatherFetchError),

    #[error("Falha ao instalar handler de Ctrl+C: {0}")]
    Signal(#[from] std::io::Error),

    #[error(transparent)]
    Lifecycle(#[from] ChannelError),
}

fn main() {
    let started_at = Instant::now();

    // ── Logging ──
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    if let Err(e) = run(started_at) {
        error!("{e}");
        std::process::exit(1);
    }
    info!("Encerrado");
}

fn run(started_at: Instant) -> Result<(), SenderError> {
    // ── Carregar config ──
    let config_path = AppConfig::default_path();
    let config = AppConfig::load(&config_path);

    // Salva config padrão se não existir
    if !config_path.exists() {
        if let Err(e) = config.save(&config_path) {
            warn!("Não foi possível salvar config padrão: {e}");
        }
    }

    let errors = config.validate();
    if !errors.is_empty() {
        return Err(SenderError::InvalidConfig(errors));
    }
    let channel_config = config.channel.to_channel_config()?;

    // ── Cancelamento ──
    let shutdown = Shutdown::new();
    spawn_signal_handler(shutdown.clone())?;

    // ── Clima em background ──
    let provider = OpenWeatherMap::new(&config.weather)?;
    let (refresher, updates) = WeatherRefresher::spawn(
        provider,
        config.weather.refresh_interval(),
        shutdown.clone(),
    );
    let scheduler = BroadcastScheduler::new(channel_config.id(), updates, started_at);

    // ── Banner ──
    let id = channel_config.id();
    println!();
    println!("══════════════════════════════════════════════");
    println!("   ☁ WEATHER SENDER – ANT+ TX-BROADCAST");
    println!("══════════════════════════════════════════════");
    println!("  Dispositivo: {} / tipo {}", id.device_number, id.device_type);
    println!(
        "  Período:     {} ({:.0} ms)",
        channel_config.period(),
        channel_config.message_period().as_secs_f64() * 1000.0
    );
    println!("  RF:          {} MHz", 2400 + u16::from(channel_config.rf_frequency_offset()));
    println!("  Local:       {}", config.weather.location);
    println!("  Destino:     {}", config.transport.dest_addr());
    println!("══════════════════════════════════════════════");
    println!();

    // ── Canal ──
    let node = UdpNode::new(config.transport.clone());
    let controller = ChannelLifecycleController::new(node, channel_config);
    let result = controller.run(scheduler, &shutdown);

    refresher.stop();
    result?;
    Ok(())
}
