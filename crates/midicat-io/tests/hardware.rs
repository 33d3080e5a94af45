//! Hardware tests against a loopback MIDI device (macOS IAC Driver, or a
//! virmidi/loopback port on Linux).
//!
//! All tests are `#[ignore]` so CI doesn't fail without hardware.
//!
//! Run with:
//!   MIDICAT_LOOPBACK=IAC cargo test -p midicat-io --test hardware -- --ignored --test-threads=1

#![cfg(feature = "midi-io")]

use midicat_io::{
    MidiDriver, MidiOut, NativeDriver, PortSelector, PumpConfig, ShutdownCoordinator, StreamPump,
};
use std::io::{self, Write};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const SETTLE: Duration = Duration::from_millis(200);

fn loopback_name() -> String {
    std::env::var("MIDICAT_LOOPBACK").unwrap_or_else(|_| "IAC".to_string())
}

#[derive(Clone, Default)]
struct SharedSink(Arc<Mutex<Vec<u8>>>);

impl Write for SharedSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
#[ignore]
fn test_enumerate_ports() {
    let driver = NativeDriver::new("midicat-test");
    let inputs = driver.inputs().expect("Failed to list MIDI inputs");
    let outputs = driver.outputs().expect("Failed to list MIDI outputs");
    for (i, port) in inputs.iter().enumerate() {
        assert_eq!(port.number, i);
    }
    for (i, port) in outputs.iter().enumerate() {
        assert_eq!(port.number, i);
    }
}

#[test]
#[ignore]
fn test_loopback_note_on() {
    let driver = NativeDriver::new("midicat-test");
    let selector = PortSelector::by_name(loopback_name());

    let mut input = driver
        .open_input(&selector)
        .expect("Loopback input not found");
    let output = driver
        .open_output(&selector)
        .expect("Loopback output not found");

    let sink = SharedSink::default();
    let mut pump = StreamPump::spawn(sink.clone(), PumpConfig::default()).unwrap();
    let coordinator = ShutdownCoordinator::new();
    let interrupt = coordinator.interrupt_handle();

    let writer = thread::spawn(move || {
        thread::sleep(SETTLE);
        output.write(&[0x90, 0x40, 0x7F]).unwrap();
        thread::sleep(SETTLE);
        output.close().unwrap();
        interrupt.interrupt();
    });

    coordinator
        .run_input_session(input.as_mut(), &mut pump)
        .unwrap();
    writer.join().unwrap();

    let received = sink.0.lock().clone();
    assert!(
        received.windows(3).any(|w| w == [0x90, 0x40, 0x7F]),
        "note on not looped back: {:02X?}",
        received
    );
}
