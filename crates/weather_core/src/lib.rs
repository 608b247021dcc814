//! # Weather Core
//!
//! Crate compartilhada que define a página de clima de 8 bytes, o frame
//! de simulação UDP e a configuração TOML do sistema.
//!
//! ## Módulos
//! - [`types`] – Condição, snapshot, página e identidade do canal
//! - [`protocol`] – Encode/decode da página e do frame com magic byte
//! - [`config`] – Configuração unificada via TOML

pub mod types;
pub mod protocol;
pub mod config;

// Re-exports convenientes
pub use types::{BroadcastPayload, ChannelId, WeatherCondition, WeatherSnapshot};
pub use protocol::{decode_frame, decode_page, encode, encode_frame, EncodingRangeError, PROTOCOL_VERSION};
pub use config::{AppConfig, ChannelConfig, ConfigurationError};
