//! Mock serial port implementation for testing
//!
//! This module provides a mock P1 port that can be used to exercise telegram
//! framing and the ingestion loop without a meter attached.
//!
//! By default a drained mock reports end of file, like an unplugged USB
//! adapter. With [`MockSerialPort::set_hold_open`] it instead stays pending
//! until more data is queued, like an idle meter between telegrams.

use std::collections::VecDeque;
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll, Waker};
use tokio::io::{AsyncRead, ReadBuf};

#[derive(Default)]
struct MockState {
    rx_buffer: VecDeque<u8>,
    next_error: Option<io::Error>,
    max_read: Option<usize>,
    hold_open: bool,
    waker: Option<Waker>,
}

/// Mock serial port delivering queued bytes
#[derive(Clone, Default)]
pub struct MockSerialPort {
    state: Arc<Mutex<MockState>>,
}

impl MockSerialPort {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Queue data to be read from the port
    pub fn queue_rx_data(&self, data: &[u8]) {
        let mut state = self.state();
        state.rx_buffer.extend(data);
        if let Some(waker) = state.waker.take() {
            waker.wake();
        }
    }

    /// Queue a telegram made of `lines`, each terminated with CR/LF, followed
    /// by a `!` trailer.
    pub fn queue_telegram(&self, lines: &[&str]) {
        let mut data = Vec::new();
        for line in lines {
            data.extend_from_slice(line.as_bytes());
            data.extend_from_slice(b"\r\n");
        }
        data.extend_from_slice(b"!0000\r\n");
        self.queue_rx_data(&data);
    }

    /// Set an error to be returned on the next read
    pub fn set_next_error(&self, error: io::Error) {
        let mut state = self.state();
        state.next_error = Some(error);
        if let Some(waker) = state.waker.take() {
            waker.wake();
        }
    }

    /// Limit how many bytes a single read may return
    pub fn set_max_read(&self, max: usize) {
        self.state().max_read = Some(max.max(1));
    }

    /// Keep the port open (pending) once drained instead of reporting EOF
    pub fn set_hold_open(&self, hold_open: bool) {
        let mut state = self.state();
        state.hold_open = hold_open;
        if let Some(waker) = state.waker.take() {
            waker.wake();
        }
    }

    /// Bytes still waiting to be read
    pub fn pending_bytes(&self) -> usize {
        self.state().rx_buffer.len()
    }

}

impl AsyncRead for MockSerialPort {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let mut state = self.state();

        if let Some(error) = state.next_error.take() {
            return Poll::Ready(Err(error));
        }

        if state.rx_buffer.is_empty() {
            if state.hold_open {
                state.waker = Some(cx.waker().clone());
                return Poll::Pending;
            }
            // Zero bytes read signals end of file
            return Poll::Ready(Ok(()));
        }

        let limit = state.max_read.unwrap_or(usize::MAX);
        let available = state.rx_buffer.len().min(buf.remaining()).min(limit);
        let data: Vec<u8> = state.rx_buffer.drain(..available).collect();
        buf.put_slice(&data);

        Poll::Ready(Ok(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn test_queue_and_read_data() {
        let mut port = MockSerialPort::new();
        port.queue_rx_data(b"/HDR\r\n");
        assert_eq!(port.pending_bytes(), 6);

        let mut buf = [0u8; 16];
        let n = port.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"/HDR\r\n");
        assert_eq!(port.pending_bytes(), 0);

        // Drained port reports EOF
        assert_eq!(port.read(&mut buf).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_max_read_splits_data() {
        let mut port = MockSerialPort::new();
        port.set_max_read(2);
        port.queue_rx_data(b"abcde");

        let mut buf = [0u8; 16];
        assert_eq!(port.read(&mut buf).await.unwrap(), 2);
        assert_eq!(port.read(&mut buf).await.unwrap(), 2);
        assert_eq!(port.read(&mut buf).await.unwrap(), 1);
        assert_eq!(port.pending_bytes(), 0);
    }

    #[tokio::test]
    async fn test_queue_telegram_format() {
        let mut port = MockSerialPort::new();
        port.queue_telegram(&["/HDR", "1-0:1.8.1(1*kWh)"]);

        let mut data = Vec::new();
        port.read_to_end(&mut data).await.unwrap();
        assert_eq!(data, b"/HDR\r\n1-0:1.8.1(1*kWh)\r\n!0000\r\n");
    }

    #[tokio::test]
    async fn test_hold_open_wakes_on_data() {
        let mut port = MockSerialPort::new();
        port.set_hold_open(true);
        let feeder = port.clone();

        let reader = tokio::spawn(async move {
            let mut buf = [0u8; 8];
            let n = port.read(&mut buf).await.unwrap();
            buf[..n].to_vec()
        });

        tokio::task::yield_now().await;
        feeder.queue_rx_data(b"late");
        assert_eq!(reader.await.unwrap(), b"late");
    }
}
