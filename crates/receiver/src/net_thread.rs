//! Thread de rede que escuta UDP e envia frames para o monitor via channel.

use crossbeam_channel::{Receiver, Sender, bounded};
use std::net::UdpSocket;
use tracing::{debug, error, info, warn};
use weather_core::protocol::{Frame, decode_frame};

/// Mensagem enviada da thread de rede para o monitor.
#[derive(Debug, Clone)]
pub struct NetMessage {
    pub frame: Frame,
    pub source_addr: String,
}

/// Inicia a thread de rede. Retorna o receiver do channel.
///
/// `device_filter` = 0 aceita qualquer device number.
pub fn spawn_receiver_thread(port: u16, device_filter: u16) -> Receiver<NetMessage> {
    let (tx, rx) = bounded::<NetMessage>(64); // Buffer de 64 mensagens

    std::thread::Builder::new()
        .name("udp-receiver".into())
        .spawn(move || {
            receiver_loop(&tx, port, device_filter);
        })
        .expect("Falha ao criar thread de rede");

    rx
}

/// Aplica o filtro de device number.
pub fn accepts(frame: &Frame, device_filter: u16) -> bool {
    device_filter == 0 || frame.channel_id.device_number == device_filter
}

fn receiver_loop(tx: &Sender<NetMessage>, port: u16, device_filter: u16) {
    loop {
        match UdpSocket::bind(format!("0.0.0.0:{port}")) {
            Ok(sock) => {
                sock.set_read_timeout(Some(std::time::Duration::from_secs(1)))
                    .ok();

                if device_filter == 0 {
                    info!("Receiver escutando em 0.0.0.0:{port} – qualquer dispositivo");
                } else {
                    info!("Receiver escutando em 0.0.0.0:{port} – dispositivo {device_filter}");
                }

                let mut buf = [0u8; 512];
                loop {
                    match sock.recv_from(&mut buf) {
                        Ok((size, addr)) => {
                            let source = addr.ip().to_string();

                            match decode_frame(&buf[..size]) {
                                Ok(frame) if !accepts(&frame, device_filter) => {
                                    debug!(
                                        "Ignorando dispositivo {} de {source}",
                                        frame.channel_id.device_number
                                    );
                                }
                                Ok(frame) => {
                                    let msg = NetMessage {
                                        frame,
                                        source_addr: source,
                                    };
                                    // Non-blocking send: se o monitor está lento, descarta
                                    if tx.try_send(msg).is_err() {
                                        debug!("Channel cheio, descartando frame");
                                    }
                                }
                                Err(e) => {
                                    debug!("Frame inválido de {source}: {e}");
                                }
                            }
                        }
                        Err(ref e) if e.kind() == std::io::ErrorKind::TimedOut
                            || e.kind() == std::io::ErrorKind::WouldBlock =>
                        {
                            // Timeout normal, continua
                        }
                        Err(e) => {
                            warn!("Erro ao receber UDP: {e}");
                        }
                    }
                }
            }
            Err(e) => {
                error!("Falha ao bind porta {port}: {e}. Tentando novamente em 2s...");
                std::thread::sleep(std::time::Duration::from_secs(2));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weather_core::{BroadcastPayload, ChannelId};

    fn frame_from(device_number: u16) -> Frame {
        Frame {
            channel_id: ChannelId {
                device_number,
                device_type: 123,
                transmission_type: 1,
            },
            payload: BroadcastPayload::default(),
        }
    }

    #[test]
    fn zero_filter_accepts_everything() {
        assert!(accepts(&frame_from(1), 0));
        assert!(accepts(&frame_from(12345), 0));
    }

    #[test]
    fn filter_matches_device_number() {
        assert!(accepts(&frame_from(12345), 12345));
        assert!(!accepts(&frame_from(54321), 12345));
    }
}
