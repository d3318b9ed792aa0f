//! # P1 Serial Transport
//!
//! This module owns the serial device the meter is attached to and frames the
//! incoming byte stream into [`Telegram`]s.
//!
//! Framing works on lines. Everything before a line starting with `/` is
//! dropped, which discards the tail of a telegram that was already in flight
//! when the port was opened. From there every line is collected, with CR/LF
//! stripped, until a line starting with `!` closes the frame.
//!
//! The transport is generic over any [`AsyncRead`] port so the same framing
//! runs against a real `tokio_serial::SerialStream` or a
//! [`MockSerialPort`](crate::p1::serial_mock::MockSerialPort).

use crate::config::{Parity, SerialSettings};
use crate::constants::{
    P1_MAX_LINE_LEN, P1_READ_CHUNK_SIZE, P1_TELEGRAM_END, P1_TELEGRAM_START,
};
use crate::error::MeterError;
use crate::p1::telegram::Telegram;
use async_trait::async_trait;
use bytes::BytesMut;
use log::{debug, info, trace, warn};
use std::io::ErrorKind;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_serial::{DataBits, FlowControl, SerialPort, SerialPortBuilderExt, SerialStream, StopBits};

/// Anything that can deliver complete telegrams to the ingestion loop.
#[async_trait]
pub trait TelegramSource: Send {
    /// Waits for the next complete telegram.
    ///
    /// Returns [`MeterError::Interrupted`] when the read was interrupted and may
    /// be retried, and [`MeterError::Transport`] when the device failed.
    async fn receive_telegram(&mut self) -> Result<Telegram, MeterError>;
}

/// Line framer over a byte port.
pub struct P1Transport<P> {
    port: P,
    buffer: BytesMut,
    /// Set while skipping the remainder of an oversized line
    discarding: bool,
}

/// Handle to the meter's P1 port.
pub type P1DeviceHandle = P1Transport<SerialStream>;

impl P1Transport<SerialStream> {
    /// Opens the serial device and applies the configured line discipline.
    ///
    /// Pending input is flushed so framing starts on fresh data.
    pub async fn open(settings: &SerialSettings) -> Result<P1DeviceHandle, MeterError> {
        let data_bits = match settings.data_bits {
            5 => DataBits::Five,
            6 => DataBits::Six,
            7 => DataBits::Seven,
            8 => DataBits::Eight,
            other => {
                return Err(MeterError::Config(format!("Unsupported #serial bits {other}")))
            }
        };

        let parity = match settings.parity {
            Parity::None => tokio_serial::Parity::None,
            Parity::Even => tokio_serial::Parity::Even,
            Parity::Odd => tokio_serial::Parity::Odd,
        };

        let flow_control = match (settings.rts_cts, settings.xon_xoff) {
            (true, true) => {
                warn!("Both RTS/CTS and XON/XOFF flow control requested, using RTS/CTS");
                FlowControl::Hardware
            }
            (true, false) => FlowControl::Hardware,
            (false, true) => FlowControl::Software,
            (false, false) => FlowControl::None,
        };

        let port = tokio_serial::new(&settings.port, settings.baud_rate)
            .data_bits(data_bits)
            .parity(parity)
            .stop_bits(StopBits::One)
            .flow_control(flow_control)
            .open_native_async()
            .map_err(|e| {
                MeterError::Transport(format!(
                    "Failed to open serial terminal {}: {e}",
                    settings.port
                ))
            })?;

        info!("Connected to serial terminal {}", settings.port);

        if let Err(e) = port.clear(tokio_serial::ClearBuffer::Input) {
            warn!("Failed to flush pending input on {}: {e}", settings.port);
        }

        Ok(P1Transport::new(port))
    }
}

impl<P: AsyncRead + Unpin + Send> P1Transport<P> {
    pub fn new(port: P) -> Self {
        P1Transport {
            port,
            buffer: BytesMut::with_capacity(P1_READ_CHUNK_SIZE),
            discarding: false,
        }
    }

    /// Reads the next line with trailing CR/LF removed.
    async fn read_line(&mut self) -> Result<String, MeterError> {
        loop {
            if let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
                let raw = self.buffer.split_to(pos + 1);
                if self.discarding {
                    self.discarding = false;
                    continue;
                }
                if pos > P1_MAX_LINE_LEN {
                    warn!("Dropping line longer than {P1_MAX_LINE_LEN} bytes");
                    continue;
                }
                let line = String::from_utf8_lossy(&raw);
                return Ok(line.trim_end_matches(['\r', '\n']).to_string());
            }

            if self.buffer.len() > P1_MAX_LINE_LEN {
                warn!(
                    "Dropping line longer than {P1_MAX_LINE_LEN} bytes, resynchronising"
                );
                self.buffer.clear();
                self.discarding = true;
            }

            self.buffer.reserve(P1_READ_CHUNK_SIZE);
            match self.port.read_buf(&mut self.buffer).await {
                Ok(0) => return Err(MeterError::Transport("Serial device closed".into())),
                Ok(n) => trace!("Read {n} bytes from serial device"),
                Err(e) if e.kind() == ErrorKind::Interrupted => {
                    return Err(MeterError::Interrupted)
                }
                Err(e) => return Err(MeterError::Transport(e.to_string())),
            }
        }
    }

    /// Waits for the next complete telegram.
    pub async fn receive_telegram(&mut self) -> Result<Telegram, MeterError> {
        let mut telegram = Telegram::new();

        loop {
            let line = self.read_line().await?;
            let first = line.as_bytes().first().copied();

            if first == Some(P1_TELEGRAM_START) {
                if !telegram.is_empty() {
                    debug!(
                        "New telegram started before the end of the previous one, dropping {} lines",
                        telegram.len()
                    );
                    telegram = Telegram::new();
                }
                telegram.push_line(line);
            } else if telegram.is_empty() {
                trace!("Skipping line outside of a telegram: {line}");
            } else if first == Some(P1_TELEGRAM_END) {
                return Ok(telegram);
            } else {
                telegram.push_line(line);
            }
        }
    }
}

#[async_trait]
impl<P: AsyncRead + Unpin + Send> TelegramSource for P1Transport<P> {
    async fn receive_telegram(&mut self) -> Result<Telegram, MeterError> {
        P1Transport::receive_telegram(self).await
    }
}
