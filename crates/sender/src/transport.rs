//! Fronteira com o transporte de rádio (nó + canal ANT).
//!
//! [`AntNode`] e [`AntChannel`] descrevem o que o controlador de ciclo de
//! vida consome. [`UdpNode`] implementa ambos sobre um socket UDP, para
//! rodar sem hardware de rádio: cada página vira um frame
//! ([`weather_core::protocol::encode_frame`]) enviado ao destino configurado.

use std::net::UdpSocket;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tracing::{debug, info};
use weather_core::config::{
    MAX_DEVICE_TYPE, MAX_RF_FREQUENCY_OFFSET, NetworkKey, TransportConfig, period_to_duration,
};
use weather_core::protocol::encode_frame;
use weather_core::{BroadcastPayload, ChannelId};

use crate::shutdown::Shutdown;

/// Período padrão de um canal recém-criado (4 Hz).
const DEFAULT_PERIOD: u16 = 8192;

/// Frequência padrão de um canal recém-criado (2466 MHz).
const DEFAULT_RF_FREQUENCY: u8 = 66;

/// Erros reportados pelo transporte.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Valor rejeitado: {0}")]
    InvalidValue(String),

    #[error("Recurso ocupado: {0}")]
    ResourceBusy(&'static str),

    #[error("Canal não está aberto")]
    NotOpen,

    #[error("Nenhum canal criado neste nó")]
    NoChannel,

    #[error("Erro de I/O: {0}")]
    Io(#[from] std::io::Error),
}

/// Tipo do canal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelType {
    /// Mestre: transmite broadcast.
    BidirectionalTransmit,
    /// Escravo: recebe.
    BidirectionalReceive,
}

/// Destino de uma página durante um tick de transmissão.
pub trait BroadcastSink {
    fn send_broadcast(&mut self, payload: &BroadcastPayload) -> Result<(), TransportError>;
}

/// Callback chamado uma vez por tick; a página deve ser enviada antes do retorno.
pub type TxCallback = Box<dyn FnMut(&mut dyn BroadcastSink) + Send>;

/// Canal lógico de broadcast.
pub trait AntChannel {
    fn set_id(&mut self, id: ChannelId) -> Result<(), TransportError>;
    fn set_period(&mut self, period: u16) -> Result<(), TransportError>;
    fn set_rf_freq(&mut self, rf_frequency_offset: u8) -> Result<(), TransportError>;
    fn register_tx_callback(&mut self, callback: TxCallback);
    fn open(&mut self) -> Result<(), TransportError>;
    fn close(&mut self) -> Result<(), TransportError>;
}

/// Nó de rádio: dono do loop de eventos que dispara os ticks.
pub trait AntNode {
    type Channel: AntChannel;

    fn set_network_key(&mut self, network: u8, key: &NetworkKey) -> Result<(), TransportError>;
    fn new_channel(&mut self, kind: ChannelType, network: u8) -> Result<Self::Channel, TransportError>;

    /// Executa o loop de eventos. Bloqueia até `shutdown` ou erro fatal.
    fn start(&mut self, shutdown: &Shutdown) -> Result<(), TransportError>;
    fn stop(&mut self) -> Result<(), TransportError>;
}

// ──────────────────────────────────────────────
// Simulação UDP
// ──────────────────────────────────────────────

/// Estado de um canal compartilhado entre [`UdpNode`] e [`UdpChannel`].
struct ChannelSlot {
    kind: ChannelType,
    id: Option<ChannelId>,
    period: u16,
    rf_frequency_offset: u8,
    callback: Option<TxCallback>,
    sink: Option<UdpSink>,
}

fn lock(slot: &Mutex<ChannelSlot>) -> MutexGuard<'_, ChannelSlot> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Socket aberto de um canal.
struct UdpSink {
    socket: UdpSocket,
    dest_addr: String,
    id: ChannelId,
}

impl BroadcastSink for UdpSink {
    fn send_broadcast(&mut self, payload: &BroadcastPayload) -> Result<(), TransportError> {
        let frame = encode_frame(&self.id, payload);
        let sent = self.socket.send_to(&frame, &self.dest_addr)?;
        debug!("→ {sent} bytes para {}", self.dest_addr);
        Ok(())
    }
}

/// Nó ANT simulado sobre UDP. Suporta um canal.
pub struct UdpNode {
    transport: TransportConfig,
    network_key: Option<(u8, NetworkKey)>,
    slot: Option<Arc<Mutex<ChannelSlot>>>,
}

impl UdpNode {
    pub fn new(transport: TransportConfig) -> Self {
        Self {
            transport,
            network_key: None,
            slot: None,
        }
    }
}

impl AntNode for UdpNode {
    type Channel = UdpChannel;

    fn set_network_key(&mut self, network: u8, key: &NetworkKey) -> Result<(), TransportError> {
        self.network_key = Some((network, *key));
        debug!("Network key instalada na rede {network}");
        Ok(())
    }

    fn new_channel(&mut self, kind: ChannelType, network: u8) -> Result<UdpChannel, TransportError> {
        if self.slot.is_some() {
            return Err(TransportError::ResourceBusy("nó simulado suporta apenas um canal"));
        }
        match self.network_key {
            Some((installed, _)) if installed == network => {}
            _ => {
                return Err(TransportError::InvalidValue(format!(
                    "rede {network} sem network key"
                )));
            }
        }

        let slot = Arc::new(Mutex::new(ChannelSlot {
            kind,
            id: None,
            period: DEFAULT_PERIOD,
            rf_frequency_offset: DEFAULT_RF_FREQUENCY,
            callback: None,
            sink: None,
        }));
        self.slot = Some(Arc::clone(&slot));

        Ok(UdpChannel {
            slot,
            transport: self.transport.clone(),
        })
    }

    fn start(&mut self, shutdown: &Shutdown) -> Result<(), TransportError> {
        let slot = self.slot.clone().ok_or(TransportError::NoChannel)?;
        info!("Loop do nó iniciado");

        while !shutdown.is_requested() {
            let cycle_start = Instant::now();

            let period = {
                let mut guard = lock(&slot);
                let ChannelSlot {
                    callback,
                    sink,
                    period,
                    ..
                } = &mut *guard;
                if let (Some(callback), Some(sink)) = (callback.as_mut(), sink.as_mut()) {
                    let sink: &mut dyn BroadcastSink = sink;
                    callback(sink);
                }
                period_to_duration(*period)
            };

            // Dormir pelo tempo restante do período
            let elapsed = cycle_start.elapsed();
            if elapsed < period {
                std::thread::sleep(period - elapsed);
            }
        }

        info!("Loop do nó encerrado");
        Ok(())
    }

    fn stop(&mut self) -> Result<(), TransportError> {
        self.slot = None;
        self.network_key = None;
        info!("Nó parado");
        Ok(())
    }
}

/// Canal do [`UdpNode`].
pub struct UdpChannel {
    slot: Arc<Mutex<ChannelSlot>>,
    transport: TransportConfig,
}

impl AntChannel for UdpChannel {
    fn set_id(&mut self, id: ChannelId) -> Result<(), TransportError> {
        let mut slot = lock(&self.slot);
        if slot.kind == ChannelType::BidirectionalTransmit && id.device_number == 0 {
            return Err(TransportError::InvalidValue(
                "device number 0 não é permitido em canal mestre".into(),
            ));
        }
        if id.device_type > MAX_DEVICE_TYPE {
            return Err(TransportError::InvalidValue(format!(
                "device type {} (máximo {MAX_DEVICE_TYPE})",
                id.device_type
            )));
        }
        slot.id = Some(id);
        Ok(())
    }

    fn set_period(&mut self, period: u16) -> Result<(), TransportError> {
        if period == 0 {
            return Err(TransportError::InvalidValue("período 0".into()));
        }
        lock(&self.slot).period = period;
        Ok(())
    }

    fn set_rf_freq(&mut self, rf_frequency_offset: u8) -> Result<(), TransportError> {
        if rf_frequency_offset > MAX_RF_FREQUENCY_OFFSET {
            return Err(TransportError::InvalidValue(format!(
                "frequência {rf_frequency_offset} (máximo {MAX_RF_FREQUENCY_OFFSET})"
            )));
        }
        lock(&self.slot).rf_frequency_offset = rf_frequency_offset;
        Ok(())
    }

    fn register_tx_callback(&mut self, callback: TxCallback) {
        lock(&self.slot).callback = Some(callback);
    }

    fn open(&mut self) -> Result<(), TransportError> {
        let mut slot = lock(&self.slot);
        if slot.sink.is_some() {
            return Err(TransportError::ResourceBusy("canal já aberto"));
        }
        let id = slot
            .id
            .ok_or_else(|| TransportError::InvalidValue("channel id não definido".into()))?;

        let socket = UdpSocket::bind(self.transport.bind_addr())?;
        if self.transport.is_broadcast() {
            socket.set_broadcast(true)?;
            info!("Modo BROADCAST ativado");
        } else {
            info!("Modo UNICAST → {}", self.transport.dest_ip);
        }

        info!(
            "Canal aberto: id {id} | período {} | RF {} MHz",
            slot.period,
            2400 + u16::from(slot.rf_frequency_offset)
        );
        slot.sink = Some(UdpSink {
            socket,
            dest_addr: self.transport.dest_addr(),
            id,
        });
        Ok(())
    }

    fn close(&mut self) -> Result<(), TransportError> {
        let mut slot = lock(&self.slot);
        if slot.sink.take().is_none() {
            return Err(TransportError::NotOpen);
        }
        slot.callback = None;
        info!("Canal fechado");
        Ok(())
    }
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────
