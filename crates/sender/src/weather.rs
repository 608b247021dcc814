//! Provedor de clima (OpenWeatherMap) e thread de atualização em background.
//!
//! A consulta HTTP roda numa thread própria com timeout limitado e publica
//! o resultado num channel; o scheduler só lê o último valor disponível.

use crossbeam_channel::{Receiver, Sender, bounded};
use serde::Deserialize;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use weather_core::config::WeatherConfig;
use weather_core::{WeatherCondition, WeatherSnapshot};

use crate::scheduler::WeatherUpdate;
use crate::shutdown::Shutdown;

/// Zero absoluto em °C; o provedor responde em Kelvin.
const KELVIN_OFFSET: f64 = 273.15;

/// Capacidade do channel de atualizações.
const UPDATE_BUFFER: usize = 16;

/// Erros ao consultar o provedor. Sempre recuperados pelo scheduler.
#[derive(Debug, thiserror::Error)]
pub enum WeatherFetchError {
    #[error("Erro HTTP: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Status inesperado: {0}")]
    Status(u16),

    #[error("Resposta malformada: {0}")]
    Malformed(String),

    #[error("Temperatura fora da faixa codificável: {0:.1}°C")]
    TemperatureOutOfRange(f64),
}

/// Fonte de observações do clima.
pub trait WeatherProvider: Send {
    fn fetch(&self) -> Result<WeatherSnapshot, WeatherFetchError>;
}

// ──────────────────────────────────────────────
// OpenWeatherMap
// ──────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct CurrentWeather {
    weather: Vec<ConditionEntry>,
    main: MainReadings,
}

#[derive(Debug, Deserialize)]
struct ConditionEntry {
    main: String,
}

#[derive(Debug, Deserialize)]
struct MainReadings {
    /// Kelvin
    temp: f64,
}

/// Cliente do endpoint de clima atual.
pub struct OpenWeatherMap {
    client: reqwest::blocking::Client,
    endpoint: String,
    location: String,
    api_key: String,
}

impl OpenWeatherMap {
    pub fn new(config: &WeatherConfig) -> Result<Self, WeatherFetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout())
            .build()?;

        let api_key = config.resolved_api_key();
        if api_key.is_empty() {
            warn!("API key vazia; consultas ao clima vão falhar");
        }

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            location: config.location.clone(),
            api_key,
        })
    }
}

impl WeatherProvider for OpenWeatherMap {
    fn fetch(&self) -> Result<WeatherSnapshot, WeatherFetchError> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("q", &self.location), ("appid", &self.api_key)])
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(WeatherFetchError::Status(status.as_u16()));
        }

        parse_current_weather(&response.text()?)
    }
}

/// Extrai condição e temperatura (°C arredondada) do corpo JSON.
pub fn parse_current_weather(body: &str) -> Result<WeatherSnapshot, WeatherFetchError> {
    let current: CurrentWeather =
        serde_json::from_str(body).map_err(|e| WeatherFetchError::Malformed(e.to_string()))?;

    let label = current
        .weather
        .first()
        .map(|entry| entry.main.as_str())
        .ok_or_else(|| WeatherFetchError::Malformed("lista `weather` vazia".into()))?;

    let celsius = (current.main.temp - KELVIN_OFFSET).round();
    if !(f64::from(i8::MIN)..=f64::from(i8::MAX)).contains(&celsius) {
        return Err(WeatherFetchError::TemperatureOutOfRange(celsius));
    }

    Ok(WeatherSnapshot::new(
        WeatherCondition::from_label(label),
        celsius as i32,
    ))
}

// ──────────────────────────────────────────────
// Atualização em background
// ──────────────────────────────────────────────

/// Thread que consulta o provedor periodicamente.
pub struct WeatherRefresher {
    shutdown: Shutdown,
    handle: Option<JoinHandle<()>>,
}

impl WeatherRefresher {
    /// Inicia a thread. Retorna o handle e o receiver das atualizações.
    pub fn spawn<P>(provider: P, interval: Duration, shutdown: Shutdown) -> (Self, Receiver<WeatherUpdate>)
    where
        P: WeatherProvider + 'static,
    {
        let (tx, rx) = bounded::<WeatherUpdate>(UPDATE_BUFFER);
        let thread_shutdown = shutdown.clone();

        let handle = std::thread::Builder::new()
            .name("weather-refresh".into())
            .spawn(move || {
                refresh_loop(&provider, &tx, interval, &thread_shutdown);
            })
            .expect("Falha ao criar thread de clima");

        (
            Self {
                shutdown,
                handle: Some(handle),
            },
            rx,
        )
    }

    /// Sinaliza o shutdown e aguarda a thread (no máximo um timeout de consulta).
    pub fn stop(mut self) {
        self.shutdown.request();
        if let Some(handle) = self.handle.take() {
            debug!("Aguardando thread de clima");
            if handle.join().is_err() {
                error!("Thread de clima terminou em panic; o clima parou de ser atualizado");
            }
        }
    }
}

fn refresh_loop<P: WeatherProvider>(
    provider: &P,
    tx: &Sender<WeatherUpdate>,
    interval: Duration,
    shutdown: &Shutdown,
) {
    while !shutdown.is_requested() {
        let update = match provider.fetch() {
            Ok(snapshot) => {
                info!(
                    "Clima: {} | Temperatura: {}°C",
                    snapshot.condition, snapshot.temperature_celsius
                );
                WeatherUpdate::Observed(snapshot)
            }
            Err(e) => {
                warn!("Falha ao consultar clima: {e}");
                WeatherUpdate::Failed
            }
        };

        // Non-blocking send: se o scheduler está parado, descarta
        if tx.try_send(update).is_err() {
            debug!("Channel cheio, descartando atualização de clima");
        }

        if shutdown.wait(interval) {
            break;
        }
    }
    debug!("Thread de clima encerrada");
}
