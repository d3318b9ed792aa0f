#![no_main]

use libfuzzer_sys::fuzz_target;
use meterd::p1::serial::P1Transport;
use meterd::p1::serial_mock::MockSerialPort;

fuzz_target!(|data: &[u8]| {
    let runtime = match tokio::runtime::Builder::new_current_thread().build() {
        Ok(runtime) => runtime,
        Err(_) => return,
    };

    let mock = MockSerialPort::new();
    mock.set_max_read(1 + data.first().copied().unwrap_or(0) as usize);
    mock.queue_rx_data(data);
    let mut transport = P1Transport::new(mock);

    // Every telegram is framed until the mock reports end of input
    runtime.block_on(async {
        while let Ok(telegram) = transport.receive_telegram().await {
            assert!(telegram.header().map_or(false, |h| h.starts_with('/')));
        }
    });
});
