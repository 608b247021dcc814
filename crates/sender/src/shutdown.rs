//! Sinal de cancelamento compartilhado entre threads.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Granularidade da espera cancelável.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Flag de shutdown clonável.
#[derive(Debug, Clone, Default)]
pub struct Shutdown(Arc<AtomicBool>);

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Solicita o shutdown. Retorna `true` apenas para o primeiro chamador.
    pub fn request(&self) -> bool {
        !self.0.swap(true, Ordering::SeqCst)
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Dorme até `timeout` ou até o shutdown ser solicitado.
    ///
    /// Retorna `true` se o shutdown foi solicitado.
    pub fn wait(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while !self.is_requested() {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            std::thread::sleep(POLL_INTERVAL.min(deadline - now));
        }
        true
    }
}

/// Código de saída ao forçar o encerramento (128 + SIGINT).
const FORCED_EXIT_CODE: i32 = 130;

/// O que fazer com um Ctrl+C recebido.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Interrupt {
    /// Primeiro Ctrl+C: shutdown ordenado.
    Graceful,
    /// Ctrl+C repetido com o shutdown travado: sai imediatamente.
    Force,
}

fn classify_interrupt(shutdown: &Shutdown) -> Interrupt {
    if shutdown.request() {
        Interrupt::Graceful
    } else {
        Interrupt::Force
    }
}

/// Inicia a thread que converte Ctrl+C em [`Shutdown::request`].
///
/// O primeiro Ctrl+C pede o shutdown ordenado; um segundo encerra o processo.
pub fn spawn_signal_handler(shutdown: Shutdown) -> std::io::Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    std::thread::Builder::new()
        .name("signal-handler".into())
        .spawn(move || {
            runtime.block_on(async {
                loop {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        error!("Falha ao escutar Ctrl+C: {e}");
                        return;
                    }
                    match classify_interrupt(&shutdown) {
                        Interrupt::Graceful => info!("Ctrl+C recebido, fechando canal ANT+..."),
                        Interrupt::Force => {
                            warn!("Ctrl+C repetido, encerrando sem fechar o canal");
                            std::process::exit(FORCED_EXIT_CODE);
                        }
                    }
                }
            });
        })?;

    Ok(())
}
