//! Codificação da página de clima e do frame de simulação UDP.
//!
//! A página de 8 bytes é o que o rádio transmite. Quando o rádio é
//! simulado via UDP, cada página vai embrulhada num frame com a identidade
//! do canal:
//!
//! ```text
//! ┌──────────┬─────────┬────────────────┬────────────┬───────────┬──────────┐
//! │ Magic(1) │ Ver.(1) │ DevNumber(2)LE │ DevType(1) │ TxType(1) │ Page(8)  │
//! └──────────┴─────────┴────────────────┴────────────┴───────────┴──────────┘
//! ```

use crate::types::{
    BroadcastPayload, CONDITION_INDEX, ChannelId, PAGE_SIZE, TEMPERATURE_INDEX, WeatherCondition,
    WeatherSnapshot,
};

/// Magic byte que identifica frames de clima simulados.
pub const MAGIC_BYTE: u8 = 0x57; // 'W'

/// Versão atual do protocolo.
pub const PROTOCOL_VERSION: u8 = 1;

/// Tamanho do header (magic + version).
const HEADER_SIZE: usize = 2;

/// Tamanho da identidade do canal no frame.
const CHANNEL_ID_SIZE: usize = 4;

/// Tamanho total de um frame.
pub const FRAME_SIZE: usize = HEADER_SIZE + CHANNEL_ID_SIZE + PAGE_SIZE;

/// Temperatura fora da faixa representável em um byte com sinal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Temperatura fora da faixa codificável: {0}°C (esperado -128..=127)")]
pub struct EncodingRangeError(pub i32);

/// Erros do protocolo de frames.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Frame com tamanho inválido ({0} bytes, esperado {FRAME_SIZE})")]
    InvalidLength(usize),

    #[error("Magic byte inválido: 0x{0:02X} (esperado 0x{MAGIC_BYTE:02X})")]
    InvalidMagic(u8),

    #[error("Versão incompatível: {0} (suportada: {PROTOCOL_VERSION})")]
    VersionMismatch(u8),
}

// ──────────────────────────────────────────────
// Página
// ──────────────────────────────────────────────

/// Codifica um [`WeatherSnapshot`] na página de 8 bytes.
///
/// O byte 6 recebe o padrão de bits em complemento de dois da temperatura
/// (−1 °C vira 255), o byte 7 o código da condição. Bytes 0–5 ficam em zero.
pub fn encode(snapshot: &WeatherSnapshot) -> Result<BroadcastPayload, EncodingRangeError> {
    let temperature = i8::try_from(snapshot.temperature_celsius)
        .map_err(|_| EncodingRangeError(snapshot.temperature_celsius))?;

    let mut page = [0u8; PAGE_SIZE];
    page[TEMPERATURE_INDEX] = temperature as u8;
    page[CONDITION_INDEX] = snapshot.condition.code();

    Ok(BroadcastPayload(page))
}

/// Inverso de [`encode`]. Bytes reservados são ignorados.
pub fn decode_page(payload: &BroadcastPayload) -> WeatherSnapshot {
    let bytes = payload.as_bytes();
    WeatherSnapshot {
        condition: WeatherCondition::from_code(bytes[CONDITION_INDEX]),
        temperature_celsius: i32::from(bytes[TEMPERATURE_INDEX] as i8),
    }
}

// ──────────────────────────────────────────────
// Frame de simulação
// ──────────────────────────────────────────────

/// Frame decodificado: identidade do canal + página.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    pub channel_id: ChannelId,
    pub payload: BroadcastPayload,
}

/// Monta o frame UDP `[MAGIC][VERSION][ID...][PAGE...]`.
pub fn encode_frame(channel_id: &ChannelId, payload: &BroadcastPayload) -> [u8; FRAME_SIZE] {
    let mut frame = [0u8; FRAME_SIZE];
    frame[0] = MAGIC_BYTE;
    frame[1] = PROTOCOL_VERSION;
    frame[2..4].copy_from_slice(&channel_id.device_number.to_le_bytes());
    frame[4] = channel_id.device_type;
    frame[5] = channel_id.transmission_type;
    frame[HEADER_SIZE + CHANNEL_ID_SIZE..].copy_from_slice(payload.as_bytes());
    frame
}

/// Decodifica bytes recebidos via UDP em [`Frame`].
///
/// Valida tamanho, magic byte e versão.
pub fn decode_frame(data: &[u8]) -> Result<Frame, ProtocolError> {
    if data.len() != FRAME_SIZE {
        return Err(ProtocolError::InvalidLength(data.len()));
    }

    let magic = data[0];
    if magic != MAGIC_BYTE {
        return Err(ProtocolError::InvalidMagic(magic));
    }

    let version = data[1];
    if version != PROTOCOL_VERSION {
        return Err(ProtocolError::VersionMismatch(version));
    }

    let mut page = [0u8; PAGE_SIZE];
    page.copy_from_slice(&data[HEADER_SIZE + CHANNEL_ID_SIZE..]);

    Ok(Frame {
        channel_id: ChannelId {
            device_number: u16::from_le_bytes([data[2], data[3]]),
            device_type: data[4],
            transmission_type: data[5],
        },
        payload: BroadcastPayload(page),
    })
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────
