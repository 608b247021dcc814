//! Ciclo de vida do canal: `Closed → Configured → Open → Broadcasting → Closed`.

use tracing::{debug, error, info, warn};
use weather_core::ChannelConfig;

use crate::scheduler::BroadcastScheduler;
use crate::shutdown::Shutdown;
use crate::transport::{AntChannel, AntNode, BroadcastSink, ChannelType, TransportError};

/// Estado do canal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Closed,
    Configured,
    Open,
    Broadcasting,
}

/// Erros fatais do ciclo de vida.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Configuração rejeitada pelo transporte: {0}")]
    Configuration(#[source] TransportError),

    #[error("Falha ao abrir canal: {0}")]
    Open(#[source] TransportError),

    #[error("Erro fatal do transporte: {0}")]
    Transport(#[source] TransportError),

    #[error("Transição inválida: estado {actual:?}, esperado {expected:?}")]
    InvalidState {
        expected: ChannelState,
        actual: ChannelState,
    },
}

/// Dono exclusivo do nó e do canal de rádio.
pub struct ChannelLifecycleController<N: AntNode> {
    node: N,
    config: ChannelConfig,
    channel: Option<N::Channel>,
    state: ChannelState,
}

impl<N: AntNode> ChannelLifecycleController<N> {
    pub fn new(node: N, config: ChannelConfig) -> Self {
        Self {
            node,
            config,
            channel: None,
            state: ChannelState::Closed,
        }
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    /// Executa o ciclo completo. Bloqueia até `shutdown` ou erro fatal.
    pub fn run(mut self, scheduler: BroadcastScheduler, shutdown: &Shutdown) -> Result<(), ChannelError> {
        self.configure()?;
        self.open(scheduler)?;
        let result = self.broadcast(shutdown);
        debug!("Estado final do canal: {:?}", self.state());
        result
    }

    /// `Closed → Configured`: network key, identidade, período e frequência.
    pub fn configure(&mut self) -> Result<(), ChannelError> {
        self.expect_state(ChannelState::Closed)?;

        let config = &self.config;
        self.node
            .set_network_key(config.network_number(), config.network_key())
            .map_err(ChannelError::Configuration)?;

        let mut channel = self
            .node
            .new_channel(ChannelType::BidirectionalTransmit, config.network_number())
            .map_err(ChannelError::Configuration)?;
        channel.set_id(config.id()).map_err(ChannelError::Configuration)?;
        channel
            .set_period(config.period())
            .map_err(ChannelError::Configuration)?;
        channel
            .set_rf_freq(config.rf_frequency_offset())
            .map_err(ChannelError::Configuration)?;

        info!(
            "Canal configurado: id {} | período {} | RF {}",
            config.id(),
            config.period(),
            config.rf_frequency_offset()
        );
        self.channel = Some(channel);
        self.state = ChannelState::Configured;
        Ok(())
    }

    /// `Configured → Open`: registra o tick do scheduler e abre o canal.
    pub fn open(&mut self, mut scheduler: BroadcastScheduler) -> Result<(), ChannelError> {
        self.expect_state(ChannelState::Configured)?;
        let channel = self.channel.as_mut().ok_or(ChannelError::InvalidState {
            expected: ChannelState::Configured,
            actual: ChannelState::Closed,
        })?;

        channel.register_tx_callback(Box::new(move |sink: &mut dyn BroadcastSink| {
            scheduler.on_tick(sink)
        }));
        channel.open().map_err(ChannelError::Open)?;

        self.state = ChannelState::Open;
        Ok(())
    }

    /// `Open → Broadcasting → Closed`.
    ///
    /// Bloqueia no loop do nó. Ao sair (cancelamento ou erro fatal), fecha o
    /// canal e para o nó, nessa ordem.
    pub fn broadcast(&mut self, shutdown: &Shutdown) -> Result<(), ChannelError> {
        self.expect_state(ChannelState::Open)?;
        self.state = ChannelState::Broadcasting;
        info!("Transmitindo...");

        let result = self.node.start(shutdown);
        match &result {
            Ok(()) if shutdown.is_requested() => info!("Cancelamento recebido, fechando canal"),
            Ok(()) => warn!("Loop do nó terminou sem cancelamento"),
            Err(e) => error!("Loop do nó falhou: {e}"),
        }

        self.close_and_stop();
        result.map_err(ChannelError::Transport)
    }

    /// Fecha o canal e para o nó. Ambos são tentados; falhas só geram log.
    fn close_and_stop(&mut self) {
        if let Some(mut channel) = self.channel.take() {
            if let Err(e) = channel.close() {
                warn!("Erro ao fechar canal: {e}");
            }
        }
        if let Err(e) = self.node.stop() {
            warn!("Erro ao parar nó: {e}");
        }
        self.state = ChannelState::Closed;
        info!("Canal fechado");
    }

    fn expect_state(&self, expected: ChannelState) -> Result<(), ChannelError> {
        if self.state != expected {
            return Err(ChannelError::InvalidState {
                expected,
                actual: self.state,
            });
        }
        Ok(())
    }
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::WeatherUpdate;
    use crate::transport::TxCallback;
    use crossbeam_channel::bounded;
    use std::sync::{Arc, Mutex};
    use std::time::Instant;
    use weather_core::config::{ChannelSettings, NetworkKey};
    use weather_core::{BroadcastPayload, ChannelId, WeatherCondition, WeatherSnapshot};

    /// Falhas injetáveis no transporte simulado.
    #[derive(Default, Clone, Copy)]
    struct Faults {
        reject_period: bool,
        fail_open: bool,
        fail_close: bool,
        fail_start: bool,
    }

    #[derive(Default)]
    struct Shared {
        calls: Vec<&'static str>,
        sent: Vec<BroadcastPayload>,
        callback: Option<TxCallback>,
    }

    type Log = Arc<Mutex<Shared>>;

    struct MockSink(Log);

    impl BroadcastSink for MockSink {
        fn send_broadcast(&mut self, payload: &BroadcastPayload) -> Result<(), TransportError> {
            self.0.lock().unwrap().sent.push(*payload);
            Ok(())
        }
    }

    /// Nó que dispara `ticks` ticks e então simula um Ctrl+C.
    struct MockNode {
        log: Log,
        faults: Faults,
        ticks: usize,
    }

    struct MockChannel {
        log: Log,
        faults: Faults,
    }

    impl MockChannel {
        fn record(&self, call: &'static str) {
            self.log.lock().unwrap().calls.push(call);
        }
    }

    impl AntChannel for MockChannel {
        fn set_id(&mut self, _id: ChannelId) -> Result<(), TransportError> {
            self.record("set_id");
            Ok(())
        }

        fn set_period(&mut self, _period: u16) -> Result<(), TransportError> {
            self.record("set_period");
            if self.faults.reject_period {
                return Err(TransportError::InvalidValue("período".into()));
            }
            Ok(())
        }

        fn set_rf_freq(&mut self, _rf_frequency_offset: u8) -> Result<(), TransportError> {
            self.record("set_rf_freq");
            Ok(())
        }

        fn register_tx_callback(&mut self, callback: TxCallback) {
            let mut shared = self.log.lock().unwrap();
            shared.calls.push("register_tx_callback");
            shared.callback = Some(callback);
        }

        fn open(&mut self) -> Result<(), TransportError> {
            self.record("open");
            if self.faults.fail_open {
                return Err(TransportError::ResourceBusy("hardware ausente"));
            }
            Ok(())
        }

        fn close(&mut self) -> Result<(), TransportError> {
            self.record("close");
            if self.faults.fail_close {
                return Err(TransportError::NotOpen);
            }
            Ok(())
        }
    }

    impl AntNode for MockNode {
        type Channel = MockChannel;

        fn set_network_key(&mut self, _network: u8, _key: &NetworkKey) -> Result<(), TransportError> {
            self.log.lock().unwrap().calls.push("set_network_key");
            Ok(())
        }

        fn new_channel(&mut self, _kind: ChannelType, _network: u8) -> Result<MockChannel, TransportError> {
            self.log.lock().unwrap().calls.push("new_channel");
            Ok(MockChannel {
                log: Arc::clone(&self.log),
                faults: self.faults,
            })
        }

        fn start(&mut self, shutdown: &Shutdown) -> Result<(), TransportError> {
            self.log.lock().unwrap().calls.push("start");
            let mut callback = self.log.lock().unwrap().callback.take();
            let mut sink = MockSink(Arc::clone(&self.log));
            if let Some(callback) = callback.as_mut() {
                for _ in 0..self.ticks {
                    let sink: &mut dyn BroadcastSink = &mut sink;
                    callback(sink);
                }
            }
            if self.faults.fail_start {
                return Err(TransportError::Io(std::io::Error::other("USB desconectado")));
            }
            shutdown.request();
            Ok(())
        }

        fn stop(&mut self) -> Result<(), TransportError> {
            self.log.lock().unwrap().calls.push("stop");
            Ok(())
        }
    }

    fn controller(faults: Faults, ticks: usize) -> (ChannelLifecycleController<MockNode>, Log) {
        let log = Log::default();
        let node = MockNode {
            log: Arc::clone(&log),
            faults,
            ticks,
        };
        let config = ChannelSettings::default().to_channel_config().unwrap();
        (ChannelLifecycleController::new(node, config), log)
    }

    fn scheduler_with(update: Option<WeatherUpdate>) -> BroadcastScheduler {
        let (tx, rx) = bounded(4);
        if let Some(update) = update {
            tx.send(update).unwrap();
        }
        BroadcastScheduler::new(
            ChannelSettings::default().to_channel_config().unwrap().id(),
            rx,
            Instant::now(),
        )
    }

    fn calls(log: &Log) -> Vec<&'static str> {
        log.lock().unwrap().calls.clone()
    }

    #[test]
    fn full_lifecycle_in_order() {
        let (controller, log) = controller(Faults::default(), 3);
        let update = WeatherUpdate::Observed(WeatherSnapshot::new(WeatherCondition::Rain, -1));
        controller
            .run(scheduler_with(Some(update)), &Shutdown::new())
            .unwrap();

        assert_eq!(
            calls(&log),
            vec![
                "set_network_key",
                "new_channel",
                "set_id",
                "set_period",
                "set_rf_freq",
                "register_tx_callback",
                "open",
                "start",
                "close",
                "stop",
            ]
        );
        let sent = log.lock().unwrap().sent.clone();
        assert_eq!(sent.len(), 3);
        assert!(sent.iter().all(|p| p.0 == [0, 0, 0, 0, 0, 0, 255, 6]));
    }

    #[test]
    fn close_failure_still_stops_node() {
        let faults = Faults {
            fail_close: true,
            ..Default::default()
        };
        let (controller, log) = controller(faults, 1);
        assert!(controller.run(scheduler_with(None), &Shutdown::new()).is_ok());

        let calls = calls(&log);
        let tail = &calls[calls.len() - 2..];
        assert_eq!(tail, ["close", "stop"]);
        assert_eq!(calls.iter().filter(|c| **c == "close").count(), 1);
        assert_eq!(calls.iter().filter(|c| **c == "stop").count(), 1);
    }

    #[test]
    fn rejected_configuration_aborts_before_open() {
        let faults = Faults {
            reject_period: true,
            ..Default::default()
        };
        let (mut controller, log) = controller(faults, 1);
        assert!(matches!(
            controller.configure(),
            Err(ChannelError::Configuration(_))
        ));
        assert_eq!(controller.state(), ChannelState::Closed);
        assert!(!calls(&log).contains(&"open"));
    }

    #[test]
    fn open_failure_is_fatal() {
        let faults = Faults {
            fail_open: true,
            ..Default::default()
        };
        let (controller, log) = controller(faults, 1);
        assert!(matches!(
            controller.run(scheduler_with(None), &Shutdown::new()),
            Err(ChannelError::Open(_))
        ));
        assert!(!calls(&log).contains(&"start"));
    }

    #[test]
    fn fatal_transport_error_still_cleans_up() {
        let faults = Faults {
            fail_start: true,
            ..Default::default()
        };
        let (controller, log) = controller(faults, 2);
        assert!(matches!(
            controller.run(scheduler_with(None), &Shutdown::new()),
            Err(ChannelError::Transport(_))
        ));
        let calls = calls(&log);
        assert_eq!(&calls[calls.len() - 2..], ["close", "stop"]);
        assert_eq!(log.lock().unwrap().sent.len(), 2);
    }

    #[test]
    fn transitions_are_enforced() {
        let (mut controller, _log) = controller(Faults::default(), 0);
        assert!(matches!(
            controller.open(scheduler_with(None)),
            Err(ChannelError::InvalidState {
                expected: ChannelState::Configured,
                actual: ChannelState::Closed,
            })
        ));
        assert!(matches!(
            controller.broadcast(&Shutdown::new()),
            Err(ChannelError::InvalidState { .. })
        ));

        controller.configure().unwrap();
        assert_eq!(controller.state(), ChannelState::Configured);
        controller.open(scheduler_with(None)).unwrap();
        assert_eq!(controller.state(), ChannelState::Open);
        controller.broadcast(&Shutdown::new()).unwrap();
        assert_eq!(controller.state(), ChannelState::Closed);
    }
}
