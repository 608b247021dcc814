//! Scheduler de broadcast: monta e envia uma página por tick.
//!
//! O clima chega por um channel alimentado pelo [`WeatherRefresher`](crate::weather::WeatherRefresher);
//! `on_tick` apenas drena esse channel sem bloquear, então a latência da
//! rede nunca atrasa o período de transmissão.

use crossbeam_channel::Receiver;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};
use weather_core::protocol::encode;
use weather_core::{BroadcastPayload, ChannelId, WeatherCondition, WeatherSnapshot};

use crate::transport::BroadcastSink;

/// Resultado de uma consulta ao provedor de clima.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeatherUpdate {
    Observed(WeatherSnapshot),
    Failed,
}

/// Cópia do estado do scheduler para observação.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Telemetry {
    pub elapsed: Duration,
    pub message_count: u64,
    pub payload: BroadcastPayload,
}

pub struct BroadcastScheduler {
    id: ChannelId,
    updates: Receiver<WeatherUpdate>,
    /// Último snapshot resolvido; sempre codificável.
    latest: WeatherSnapshot,
    message_count: u64,
    payload: BroadcastPayload,
    started_at: Instant,
    elapsed: Duration,
}

impl BroadcastScheduler {
    pub fn new(id: ChannelId, updates: Receiver<WeatherUpdate>, started_at: Instant) -> Self {
        Self {
            id,
            updates,
            latest: WeatherSnapshot::default(),
            message_count: 0,
            payload: BroadcastPayload::default(),
            started_at,
            elapsed: Duration::ZERO,
        }
    }

    /// Tick de transmissão: produz a próxima página e a entrega ao `sink`.
    pub fn on_tick(&mut self, sink: &mut dyn BroadcastSink) {
        self.message_count += 1;

        let snapshot = self.resolve_snapshot();
        // `resolve_snapshot` só guarda snapshots codificáveis
        self.payload = match encode(&snapshot) {
            Ok(payload) => payload,
            Err(e) => {
                error!("Snapshot resolvido não codificável, enviando página zerada: {e}");
                BroadcastPayload::default()
            }
        };
        self.elapsed = self.started_at.elapsed();

        if let Err(e) = sink.send_broadcast(&self.payload) {
            warn!("Erro ao enviar página #{}: {e}", self.message_count);
        }

        let telemetry = self.telemetry();
        info!(
            "{:.3} TX #{}: {}, {} : {}",
            telemetry.elapsed.as_secs_f64(),
            telemetry.message_count,
            self.id.device_number,
            self.id.device_type,
            telemetry.payload
        );
    }

    pub fn telemetry(&self) -> Telemetry {
        Telemetry {
            elapsed: self.elapsed,
            message_count: self.message_count,
            payload: self.payload,
        }
    }

    /// Aplica as atualizações pendentes e retorna o snapshot a codificar.
    ///
    /// Falha do provedor mantém a última temperatura observada com
    /// condição `Unknown`.
    fn resolve_snapshot(&mut self) -> WeatherSnapshot {
        for update in self.updates.try_iter() {
            match update {
                WeatherUpdate::Observed(snapshot) => match encode(&snapshot) {
                    Ok(_) => self.latest = snapshot,
                    Err(e) => {
                        error!("Snapshot do provedor não codificável: {e}");
                        self.latest.condition = WeatherCondition::Unknown;
                    }
                },
                WeatherUpdate::Failed => {
                    self.latest.condition = WeatherCondition::Unknown;
                }
            }
        }
        self.latest
    }
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────
