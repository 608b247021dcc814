//! Configuração unificada via TOML.
//!
//! Um único `config.toml` ao lado do executável cobre o canal de rádio,
//! o provedor de clima, o transporte UDP simulado e o receiver.

use crate::types::ChannelId;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Base de tempo do período de canal (unidades de 1/32768 s).
pub const PERIOD_BASE_HZ: f64 = 32768.0;

/// Maior offset de RF aceito (2400 + 124 = 2524 MHz).
pub const MAX_RF_FREQUENCY_OFFSET: u8 = 124;

/// Device type usa 7 bits; o bit 7 é o pairing bit.
pub const MAX_DEVICE_TYPE: u8 = 127;

/// Tamanho da network key.
pub const NETWORK_KEY_SIZE: usize = 8;

/// Variável de ambiente que sobrescreve uma `api_key` vazia.
pub const API_KEY_ENV: &str = "OPENWEATHER_API_KEY";

/// Intervalo máximo entre consultas ao clima (1 dia).
pub const MAX_REFRESH_INTERVAL_SECS: f64 = 86_400.0;

/// Erros de configuração do canal. São fatais: abortam antes de abrir o canal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("Network key deve ter {NETWORK_KEY_SIZE} bytes (recebido {0})")]
    InvalidKeyLength(usize),

    #[error("Device number não pode ser 0 em um canal mestre")]
    ZeroDeviceNumber,

    #[error("Device type inválido: {0} (máximo {MAX_DEVICE_TYPE})")]
    InvalidDeviceType(u8),

    #[error("Período do canal não pode ser 0")]
    ZeroPeriod,

    #[error("Frequência de RF inválida: {0} (máximo {MAX_RF_FREQUENCY_OFFSET})")]
    InvalidRfFrequency(u8),
}

// ──────────────────────────────────────────────
// Canal
// ──────────────────────────────────────────────

/// Network key de 8 bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NetworkKey(pub [u8; NETWORK_KEY_SIZE]);

impl TryFrom<&[u8]> for NetworkKey {
    type Error = ConfigurationError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        <[u8; NETWORK_KEY_SIZE]>::try_from(bytes)
            .map(NetworkKey)
            .map_err(|_| ConfigurationError::InvalidKeyLength(bytes.len()))
    }
}

/// Configuração imutável de um canal de broadcast.
///
/// Só pode ser construída via [`ChannelConfig::new`], que valida todos os campos.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelConfig {
    network_key: NetworkKey,
    network_number: u8,
    id: ChannelId,
    period: u16,
    rf_frequency_offset: u8,
}

impl ChannelConfig {
    pub fn new(
        network_key: NetworkKey,
        network_number: u8,
        id: ChannelId,
        period: u16,
        rf_frequency_offset: u8,
    ) -> Result<Self, ConfigurationError> {
        if id.device_number == 0 {
            return Err(ConfigurationError::ZeroDeviceNumber);
        }
        if id.device_type > MAX_DEVICE_TYPE {
            return Err(ConfigurationError::InvalidDeviceType(id.device_type));
        }
        if period == 0 {
            return Err(ConfigurationError::ZeroPeriod);
        }
        if rf_frequency_offset > MAX_RF_FREQUENCY_OFFSET {
            return Err(ConfigurationError::InvalidRfFrequency(rf_frequency_offset));
        }

        Ok(Self {
            network_key,
            network_number,
            id,
            period,
            rf_frequency_offset,
        })
    }

    pub fn network_key(&self) -> &NetworkKey {
        &self.network_key
    }

    pub fn network_number(&self) -> u8 {
        self.network_number
    }

    pub fn id(&self) -> ChannelId {
        self.id
    }

    pub fn period(&self) -> u16 {
        self.period
    }

    pub fn rf_frequency_offset(&self) -> u8 {
        self.rf_frequency_offset
    }

    /// Intervalo entre ticks (`period / 32768` s).
    pub fn message_period(&self) -> Duration {
        period_to_duration(self.period)
    }
}

/// Converte um período de canal em [`Duration`].
pub fn period_to_duration(period: u16) -> Duration {
    Duration::from_secs_f64(f64::from(period) / PERIOD_BASE_HZ)
}

/// Seção `[channel]` do TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelSettings {
    /// Network key (8 bytes)
    pub network_key: Vec<u8>,
    /// Número da rede onde a key é instalada
    pub network_number: u8,
    /// Device number (1–65535)
    pub device_number: u16,
    /// Device type (0–127)
    pub device_type: u8,
    /// Transmission type
    pub transmission_type: u8,
    /// Período em unidades de 1/32768 s (8134 ≈ 4 Hz)
    pub period: u16,
    /// Offset de RF a partir de 2400 MHz
    pub rf_frequency_offset: u8,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            network_key: vec![0; NETWORK_KEY_SIZE],
            network_number: 0,
            device_number: 12345,
            device_type: 123,
            transmission_type: 1,
            period: 8134,
            rf_frequency_offset: 57,
        }
    }
}

impl ChannelSettings {
    pub fn to_channel_config(&self) -> Result<ChannelConfig, ConfigurationError> {
        ChannelConfig::new(
            NetworkKey::try_from(self.network_key.as_slice())?,
            self.network_number,
            ChannelId {
                device_number: self.device_number,
                device_type: self.device_type,
                transmission_type: self.transmission_type,
            },
            self.period,
            self.rf_frequency_offset,
        )
    }
}

// ──────────────────────────────────────────────
// Clima
// ──────────────────────────────────────────────

/// Seção `[weather]`: provedor OpenWeatherMap.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    /// Chave da API (vazia = usa `OPENWEATHER_API_KEY`)
    pub api_key: String,
    /// Localização consultada (`cidade,país`)
    pub location: String,
    /// URL do endpoint de clima atual
    pub endpoint: String,
    /// Timeout de cada requisição (segundos)
    pub timeout_secs: f64,
    /// Intervalo entre consultas (segundos)
    pub refresh_interval_secs: f64,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            location: "Calgary,ca".into(),
            endpoint: "https://api.openweathermap.org/data/2.5/weather".into(),
            timeout_secs: 5.0,
            refresh_interval_secs: 60.0,
        }
    }
}

impl WeatherConfig {
    /// Chave efetiva: a do arquivo ou, se vazia, a da variável de ambiente.
    pub fn resolved_api_key(&self) -> String {
        if !self.api_key.is_empty() {
            return self.api_key.clone();
        }
        std::env::var(API_KEY_ENV).unwrap_or_default()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout_secs)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs_f64(self.refresh_interval_secs)
    }
}

// ──────────────────────────────────────────────
// Transporte / Receiver
// ──────────────────────────────────────────────

/// Seção `[transport]`: rádio simulado via UDP.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Modo de envio: "broadcast" ou "unicast"
    pub mode: String,
    /// IP de destino (255.255.255.255 para broadcast)
    pub dest_ip: String,
    /// Porta UDP
    pub port: u16,
    /// IP local para bind (vazio = auto)
    pub bind_ip: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            mode: "broadcast".into(),
            dest_ip: "255.255.255.255".into(),
            port: 5006,
            bind_ip: String::new(),
        }
    }
}

impl TransportConfig {
    pub fn is_broadcast(&self) -> bool {
        self.mode == "broadcast" || self.dest_ip == "255.255.255.255"
    }

    pub fn bind_addr(&self) -> String {
        if self.bind_ip.is_empty() {
            "0.0.0.0:0".to_string()
        } else {
            format!("{}:0", self.bind_ip)
        }
    }

    pub fn dest_addr(&self) -> String {
        format!("{}:{}", self.dest_ip, self.port)
    }
}

/// Seção `[receiver]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiverConfig {
    /// Porta UDP para escutar
    pub port: u16,
    /// Device number aceito (0 = qualquer)
    pub device_number: u16,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            port: 5006,
            device_number: 0,
        }
    }
}

// ──────────────────────────────────────────────
// Raiz
// ──────────────────────────────────────────────

/// Configuração raiz do aplicativo (unifica sender e receiver).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub channel: ChannelSettings,
    pub weather: WeatherConfig,
    pub transport: TransportConfig,
    pub receiver: ReceiverConfig,
}

impl AppConfig {
    /// Carrega configuração de um arquivo TOML.
    pub fn load(path: &Path) -> Self {
        if path.exists() {
            match std::fs::read_to_string(path) {
                Ok(content) => match toml::from_str::<AppConfig>(&content) {
                    Ok(config) => {
                        info!("Configuração carregada de {}", path.display());
                        return config;
                    }
                    Err(e) => {
                        warn!("Erro ao parsear {}: {}", path.display(), e);
                    }
                },
                Err(e) => {
                    warn!("Erro ao ler {}: {}", path.display(), e);
                }
            }
        }

        info!("Usando configuração padrão");
        AppConfig::default()
    }

    /// Salva configuração em arquivo TOML.
    pub fn save(&self, path: &Path) -> Result<(), String> {
        let content = toml::to_string_pretty(self).map_err(|e| e.to_string())?;
        std::fs::write(path, content).map_err(|e| e.to_string())?;
        info!("Configuração salva em {}", path.display());
        Ok(())
    }

    /// Retorna o caminho padrão do config.toml.
    pub fn default_path() -> PathBuf {
        let exe_dir = std::env::current_exe()
            .map(|p| p.parent().unwrap_or(Path::new(".")).to_path_buf())
            .unwrap_or_else(|_| PathBuf::from("."));
        exe_dir.join("config.toml")
    }

    /// Valida a configuração e retorna lista de erros.
    ///
    /// Valores do canal são validados à parte por [`ChannelSettings::to_channel_config`].
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.transport.port == 0 {
            errors.push("Porta do transporte não pode ser 0".into());
        }
        if self.receiver.port == 0 {
            errors.push("Porta do receiver não pode ser 0".into());
        }
        if !(0.5..=60.0).contains(&self.weather.timeout_secs) {
            errors.push(format!(
                "Timeout do clima inválido: {} (0.5–60.0)",
                self.weather.timeout_secs
            ));
        }
        // `contains` também rejeita NaN e infinito
        if !(self.weather.timeout_secs..=MAX_REFRESH_INTERVAL_SECS)
            .contains(&self.weather.refresh_interval_secs)
        {
            errors.push(format!(
                "Intervalo de atualização inválido: {} (timeout {}–{})",
                self.weather.refresh_interval_secs,
                self.weather.timeout_secs,
                MAX_REFRESH_INTERVAL_SECS
            ));
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        let errors = config.validate();
        assert!(errors.is_empty(), "Erros: {:?}", errors);
        assert!(config.channel.to_channel_config().is_ok());
    }

    #[test]
    fn roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(config.channel.device_number, parsed.channel.device_number);
        assert_eq!(config.channel.network_key, parsed.channel.network_key);
        assert_eq!(config.weather.location, parsed.weather.location);
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let partial = r#"
[channel]
device_number = 777
"#;
        let config: AppConfig = toml::from_str(partial).unwrap();
        assert_eq!(config.channel.device_number, 777);
        // Outros campos devem ter valor padrão
        assert_eq!(config.channel.period, 8134);
        assert_eq!(config.channel.rf_frequency_offset, 57);
        assert_eq!(config.transport.port, 5006);
    }

    #[test]
    fn default_channel_matches_reference_device() {
        let channel = ChannelSettings::default().to_channel_config().unwrap();
        assert_eq!(channel.id().device_number, 12345);
        assert_eq!(channel.id().device_type, 123);
        assert_eq!(channel.id().transmission_type, 1);
        assert_eq!(channel.network_key(), &NetworkKey([0; 8]));
        // 8134 / 32768 ≈ 248 ms
        assert_eq!(channel.message_period().as_millis(), 248);
    }

    #[test]
    fn rejects_short_network_key() {
        let settings = ChannelSettings {
            network_key: vec![0; 6],
            ..Default::default()
        };
        assert_eq!(
            settings.to_channel_config(),
            Err(ConfigurationError::InvalidKeyLength(6))
        );
    }

    #[test]
    fn rejects_out_of_range_channel_values() {
        let cases = [
            (
                ChannelSettings { period: 0, ..Default::default() },
                ConfigurationError::ZeroPeriod,
            ),
            (
                ChannelSettings { rf_frequency_offset: 125, ..Default::default() },
                ConfigurationError::InvalidRfFrequency(125),
            ),
            (
                ChannelSettings { device_type: 200, ..Default::default() },
                ConfigurationError::InvalidDeviceType(200),
            ),
            (
                ChannelSettings { device_number: 0, ..Default::default() },
                ConfigurationError::ZeroDeviceNumber,
            ),
        ];
        for (settings, expected) in cases {
            assert_eq!(settings.to_channel_config(), Err(expected));
        }
    }

    #[test]
    fn refresh_shorter_than_timeout_is_flagged() {
        let mut config = AppConfig::default();
        config.weather.refresh_interval_secs = 1.0;
        assert_eq!(config.validate().len(), 1);
    }

    #[test]
    fn non_finite_or_huge_refresh_is_flagged() {
        for value in ["inf", "nan", "1e19"] {
            let config: AppConfig =
                toml::from_str(&format!("[weather]\nrefresh_interval_secs = {value}")).unwrap();
            assert_eq!(config.validate().len(), 1, "{value}");
        }

        let mut config = AppConfig::default();
        config.weather.refresh_interval_secs = MAX_REFRESH_INTERVAL_SECS;
        assert!(config.validate().is_empty());
        assert_eq!(config.weather.refresh_interval(), Duration::from_secs(86_400));
    }

    #[test]
    fn save_reports_unwritable_path() {
        let path = std::env::temp_dir()
            .join("weather_core_sem_diretorio")
            .join("inexistente")
            .join("config.toml");
        assert!(AppConfig::default().save(&path).is_err());
    }

    #[test]
    fn save_then_load_roundtrip() {
        let path = std::env::temp_dir().join(format!("weather_core_{}.toml", std::process::id()));
        let mut config = AppConfig::default();
        config.weather.location = "Oslo,no".into();
        config.save(&path).unwrap();
        let loaded = AppConfig::load(&path);
        std::fs::remove_file(&path).unwrap();
        assert_eq!(loaded.weather.location, "Oslo,no");
    }
}
