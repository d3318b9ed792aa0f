#![no_main]

use libfuzzer_sys::fuzz_target;
use meterd::p1::telegram::{parse_telegram, Telegram};

fuzz_target!(|data: &[u8]| {
    let text = String::from_utf8_lossy(data);
    let telegram = Telegram::from_lines(text.lines());

    let readings = parse_telegram(&telegram, None);
    assert!(readings.len() <= telegram.len());

    // With a gas id every line may also be taken as the deferred gas value
    let _ = parse_telegram(&telegram, Some("24.3.0"));
});
