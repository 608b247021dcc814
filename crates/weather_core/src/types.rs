//! Tipos do domínio: condição climática, snapshot e a página de 8 bytes.
//!
//! A página transmitida segue o layout fixo entendido pelo receptor:
//!
//! ```text
//! ┌────┬────┬────┬────┬────┬────┬──────────┬──────────┐
//! │ 0  │ 1  │ 2  │ 3  │ 4  │ 5  │ 6        │ 7        │
//! ├────┴────┴────┴────┴────┴────┼──────────┼──────────┤
//! │ reservado (sempre 0)        │ temp (°C)│ condição │
//! └─────────────────────────────┴──────────┴──────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Tamanho fixo de uma página de broadcast.
pub const PAGE_SIZE: usize = 8;

/// Índice do byte de temperatura (complemento de dois).
pub const TEMPERATURE_INDEX: usize = 6;

/// Índice do byte de condição.
pub const CONDITION_INDEX: usize = 7;

// ──────────────────────────────────────────────
// Condição
// ──────────────────────────────────────────────

/// Classe de condição climática reconhecida pelo receptor.
///
/// A ordem das variantes define o código transmitido (1–10);
/// `Unknown` é sempre 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WeatherCondition {
    Clear,
    FewClouds,
    ScatteredClouds,
    BrokenClouds,
    ShowerRain,
    Rain,
    Thunderstorm,
    Snow,
    Mist,
    Clouds,
    #[default]
    Unknown,
}

impl WeatherCondition {
    /// Todas as condições conhecidas, na ordem dos códigos.
    pub const KNOWN: [WeatherCondition; 10] = [
        WeatherCondition::Clear,
        WeatherCondition::FewClouds,
        WeatherCondition::ScatteredClouds,
        WeatherCondition::BrokenClouds,
        WeatherCondition::ShowerRain,
        WeatherCondition::Rain,
        WeatherCondition::Thunderstorm,
        WeatherCondition::Snow,
        WeatherCondition::Mist,
        WeatherCondition::Clouds,
    ];

    /// Converte o rótulo do provedor (ex: `"Few Clouds"`).
    ///
    /// A comparação é exata; qualquer outro rótulo vira [`WeatherCondition::Unknown`].
    pub fn from_label(label: &str) -> Self {
        match label {
            "Clear" => Self::Clear,
            "Few Clouds" => Self::FewClouds,
            "Scattered Clouds" => Self::ScatteredClouds,
            "Broken Clouds" => Self::BrokenClouds,
            "Shower Rain" => Self::ShowerRain,
            "Rain" => Self::Rain,
            "Thunderstorm" => Self::Thunderstorm,
            "Snow" => Self::Snow,
            "Mist" => Self::Mist,
            "Clouds" => Self::Clouds,
            _ => Self::Unknown,
        }
    }

    /// Rótulo canônico do provedor.
    pub fn label(self) -> &'static str {
        match self {
            Self::Clear => "Clear",
            Self::FewClouds => "Few Clouds",
            Self::ScatteredClouds => "Scattered Clouds",
            Self::BrokenClouds => "Broken Clouds",
            Self::ShowerRain => "Shower Rain",
            Self::Rain => "Rain",
            Self::Thunderstorm => "Thunderstorm",
            Self::Snow => "Snow",
            Self::Mist => "Mist",
            Self::Clouds => "Clouds",
            Self::Unknown => "Unknown",
        }
    }

    /// Código transmitido no byte 7.
    pub fn code(self) -> u8 {
        match self {
            Self::Clear => 1,
            Self::FewClouds => 2,
            Self::ScatteredClouds => 3,
            Self::BrokenClouds => 4,
            Self::ShowerRain => 5,
            Self::Rain => 6,
            Self::Thunderstorm => 7,
            Self::Snow => 8,
            Self::Mist => 9,
            Self::Clouds => 10,
            Self::Unknown => 0,
        }
    }

    /// Inverso de [`WeatherCondition::code`]; códigos fora de 1–10 viram `Unknown`.
    pub fn from_code(code: u8) -> Self {
        match code {
            1..=10 => Self::KNOWN[usize::from(code) - 1],
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for WeatherCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ──────────────────────────────────────────────
// Snapshot
// ──────────────────────────────────────────────

/// Observação do clima usada para montar uma página.
///
/// `temperature_celsius` já vem arredondada pelo provedor e deve caber
/// em −128..=127 para ser codificada.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub condition: WeatherCondition,
    pub temperature_celsius: i32,
}

impl WeatherSnapshot {
    pub fn new(condition: WeatherCondition, temperature_celsius: i32) -> Self {
        Self {
            condition,
            temperature_celsius,
        }
    }
}

// ──────────────────────────────────────────────
// Página de broadcast
// ──────────────────────────────────────────────

/// Página de 8 bytes entregue ao transporte a cada tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct BroadcastPayload(pub [u8; PAGE_SIZE]);

impl BroadcastPayload {
    pub fn as_bytes(&self) -> &[u8; PAGE_SIZE] {
        &self.0
    }

    /// Bytes 0–5 devem ser sempre zero.
    pub fn reserved_is_clear(&self) -> bool {
        self.0[..TEMPERATURE_INDEX].iter().all(|&b| b == 0)
    }
}

impl From<[u8; PAGE_SIZE]> for BroadcastPayload {
    fn from(bytes: [u8; PAGE_SIZE]) -> Self {
        Self(bytes)
    }
}

/// Formato de log: `[00,00,00,00,00,00,FF,06]`.
impl fmt::Display for BroadcastPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, byte) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{byte:02X}")?;
        }
        f.write_str("]")
    }
}

// ──────────────────────────────────────────────
// Identidade do canal
// ──────────────────────────────────────────────

/// Identidade do dispositivo anunciada pelo canal:
/// `<Device Number, Device Type, Transmission Type>`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelId {
    pub device_number: u16,
    pub device_type: u8,
    pub transmission_type: u8,
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.device_number, self.device_type, self.transmission_type
        )
    }
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_codes_follow_declaration_order() {
        for (i, condition) in WeatherCondition::KNOWN.iter().enumerate() {
            assert_eq!(usize::from(condition.code()), i + 1, "{condition}");
        }
        assert_eq!(WeatherCondition::Unknown.code(), 0);
    }

    #[test]
    fn labels_roundtrip_through_from_label() {
        for condition in WeatherCondition::KNOWN {
            assert_eq!(WeatherCondition::from_label(condition.label()), condition);
        }
    }

    #[test]
    fn unrecognized_labels_are_unknown() {
        for label in ["Haze", "Drizzle", "rain", "", "Clear "] {
            assert_eq!(WeatherCondition::from_label(label), WeatherCondition::Unknown, "{label:?}");
        }
    }

    #[test]
    fn out_of_table_codes_are_unknown() {
        assert_eq!(WeatherCondition::from_code(0), WeatherCondition::Unknown);
        assert_eq!(WeatherCondition::from_code(11), WeatherCondition::Unknown);
        assert_eq!(WeatherCondition::from_code(255), WeatherCondition::Unknown);
        assert_eq!(WeatherCondition::from_code(6), WeatherCondition::Rain);
    }

    #[test]
    fn payload_display_is_hex_list() {
        let payload = BroadcastPayload([0, 0, 0, 0, 0, 0, 255, 6]);
        assert_eq!(payload.to_string(), "[00,00,00,00,00,00,FF,06]");
        assert!(payload.reserved_is_clear());
        assert!(!BroadcastPayload([1, 0, 0, 0, 0, 0, 0, 0]).reserved_is_clear());
    }
}
