//! Orderly shutdown on interruption.
//!
//! The interrupt slot holds at most one pending signal, so pressing Ctrl+C
//! repeatedly while a shutdown is underway does not queue more work.

use crate::driver::MidiIn;
use crate::error::Result;
use crate::pump::{PumpStats, StreamPump};
use crossbeam_channel::{bounded, Receiver, Sender};
use tracing::{debug, info};

#[derive(Clone)]
pub struct InterruptHandle {
    sender: Sender<()>,
}

impl InterruptHandle {
    pub fn interrupt(&self) {
        // Slot already full: a shutdown is pending anyway.
        let _ = self.sender.try_send(());
    }
}

pub struct ShutdownCoordinator {
    sender: Sender<()>,
    receiver: Receiver<()>,
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        let (sender, receiver) = bounded(1);
        Self { sender, receiver }
    }

    pub fn interrupt_handle(&self) -> InterruptHandle {
        InterruptHandle {
            sender: self.sender.clone(),
        }
    }

    /// Route Ctrl+C to this coordinator. Can only be done once per process.
    pub fn install_ctrlc(&self) -> Result<()> {
        let handle = self.interrupt_handle();
        ctrlc::set_handler(move || handle.interrupt())?;
        debug!("Ctrl+C handler installed");
        Ok(())
    }

    pub fn is_interrupted(&self) -> bool {
        !self.receiver.is_empty()
    }

    pub fn wait_for_interrupt(&self) {
        // Never disconnected: we hold a sender ourselves.
        let _ = self.receiver.recv();
    }

    /// Run a listening session until interrupted.
    ///
    /// The input pushes into `pump`. On interrupt the listener is stopped
    /// first, then the pump, and this returns once the pump's drain loop has
    /// exited.
    pub fn run_input_session(
        &self,
        input: &mut dyn MidiIn,
        pump: &mut StreamPump,
    ) -> Result<PumpStats> {
        if let Err(e) = input.listen(pump.sender()) {
            pump.stop();
            pump.wait_stopped();
            return Err(e);
        }
        info!("Listening on MIDI in port [{}] {}", input.number(), input.name());

        self.wait_for_interrupt();
        debug!("Interrupted, stopping listener");

        let stopped = input.stop_listening();
        let stats = pump.shutdown();
        debug!(
            "Stream pump stopped: {} delivered, {} failed, {} abandoned",
            stats.delivered, stats.failed, stats.abandoned
        );
        stopped.map(|_| stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::pump::{PumpConfig, PumpSender};
    use parking_lot::Mutex;
    use std::io::{self, Write};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread::{self, JoinHandle};
    use std::time::Duration;

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

    /// Emits clock ticks from its own thread until stopped.
    #[derive(Default)]
    struct TickingInput {
        running: Arc<AtomicBool>,
        thread: Option<JoinHandle<()>>,
        fail: bool,
    }

    impl MidiIn for TickingInput {
        fn number(&self) -> usize {
            0
        }

        fn name(&self) -> &str {
            "Ticker"
        }

        fn listen(&mut self, sink: PumpSender) -> Result<()> {
            if self.fail {
                return Err(Error::MidiPort("device vanished".to_string()));
            }
            self.running.store(true, Ordering::SeqCst);
            let running = Arc::clone(&self.running);
            self.thread = Some(thread::spawn(move || {
                while running.load(Ordering::SeqCst) {
                    if sink.send(vec![0xF8]).is_err() {
                        break;
                    }
                    thread::sleep(Duration::from_millis(1));
                }
            }));
            Ok(())
        }

        fn stop_listening(&mut self) -> Result<()> {
            self.running.store(false, Ordering::SeqCst);
            if let Some(thread) = self.thread.take() {
                let _ = thread.join();
            }
            Ok(())
        }
    }

    #[test]
    fn test_repeated_interrupts_keep_one_pending() {
        let coordinator = ShutdownCoordinator::new();
        let handle = coordinator.interrupt_handle();
        handle.interrupt();
        handle.interrupt();
        handle.interrupt();

        assert!(coordinator.is_interrupted());
        coordinator.wait_for_interrupt();
        assert!(!coordinator.is_interrupted());
    }

    #[test]
    fn test_input_session_stops_on_interrupt() {
        let coordinator = ShutdownCoordinator::new();
        let sink = SharedSink::default();
        let mut pump = StreamPump::spawn(sink.clone(), PumpConfig::default()).unwrap();
        let mut input = TickingInput::default();

        let handle = coordinator.interrupt_handle();
        let interrupter = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            handle.interrupt();
        });

        let stats = coordinator.run_input_session(&mut input, &mut pump).unwrap();
        interrupter.join().unwrap();

        assert!(!input.running.load(Ordering::SeqCst));
        let delivered = sink.0.lock().len();
        assert_eq!(delivered as u64, stats.delivered);

        // Nothing reaches the sink once the pump acknowledged its stop.
        thread::sleep(Duration::from_millis(10));
        assert_eq!(sink.0.lock().len(), delivered);
        assert!(!pump.sender().is_accepting());
    }

    #[test]
    fn test_listener_failure_stops_pump() {
        let coordinator = ShutdownCoordinator::new();
        let mut pump = StreamPump::spawn(io::sink(), PumpConfig::default()).unwrap();
        let mut input = TickingInput {
            fail: true,
            ..Default::default()
        };

        let err = coordinator
            .run_input_session(&mut input, &mut pump)
            .unwrap_err();
        assert!(matches!(err, Error::MidiPort(_)));
        assert!(!pump.sender().is_accepting());
    }
}
