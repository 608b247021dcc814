//! Decodifica páginas recebidas e acompanha mudanças de clima por dispositivo.

use std::collections::HashMap;
use weather_core::{WeatherSnapshot, decode_page};

use crate::net_thread::NetMessage;

/// O que mudou com a última página de um dispositivo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageEvent {
    /// Primeira página do dispositivo.
    First(WeatherSnapshot),
    /// Clima diferente da página anterior.
    Changed(WeatherSnapshot),
    Unchanged,
}

/// Estado por device number.
#[derive(Debug, Default)]
pub struct WeatherMonitor {
    last: HashMap<u16, WeatherSnapshot>,
    pages: u64,
}

impl WeatherMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, msg: &NetMessage) -> PageEvent {
        self.pages += 1;
        let snapshot = decode_page(&msg.frame.payload);
        let device = msg.frame.channel_id.device_number;

        match self.last.insert(device, snapshot) {
            None => PageEvent::First(snapshot),
            Some(previous) if previous != snapshot => PageEvent::Changed(snapshot),
            Some(_) => PageEvent::Unchanged,
        }
    }

    pub fn pages(&self) -> u64 {
        self.pages
    }
}
