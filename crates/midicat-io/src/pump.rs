//! Buffered single-consumer relay from a producer that must not wait on I/O
//! to a sink that may be slow.
//!
//! - Producers: driver listener callbacks, stdin read loops
//! - Consumer: dedicated thread writing into stdout or a port
//!
//! The buffer is bounded. When it is full, producers block instead of
//! dropping: every message is delivered or the pump is stopped.
//!
//! Stopping comes in two flavours: [`StreamPump::shutdown`] abandons whatever
//! is still buffered, [`StreamPump::finish`] writes it out first.

use crate::error::{Error, Result};
use crossbeam_channel::{bounded, select, Receiver, Sender};
use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

pub const DEFAULT_CAPACITY: usize = 100;

#[derive(Debug, Clone)]
pub struct PumpConfig {
    /// Pending messages the buffer holds before producers block.
    pub capacity: usize,
    pub thread_name: String,
}

impl Default for PumpConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            thread_name: "midicat-pump".to_string(),
        }
    }
}

impl PumpConfig {
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }
}

#[derive(Debug, Default)]
struct Counters {
    delivered: AtomicU64,
    failed: AtomicU64,
    abandoned: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PumpStats {
    pub delivered: u64,
    pub failed: u64,
    /// Still buffered when the pump stopped.
    pub abandoned: u64,
}

/// Producer side of a [`StreamPump`]. Cheap to clone.
#[derive(Clone)]
pub struct PumpSender {
    sender: Sender<Vec<u8>>,
    accepting: Arc<AtomicBool>,
}

impl PumpSender {
    /// Queue one message. Blocks while the buffer is full.
    pub fn send(&self, bytes: Vec<u8>) -> Result<()> {
        if !self.accepting.load(Ordering::Acquire) {
            return Err(Error::PumpStopped);
        }
        self.sender.send(bytes).map_err(|_| Error::PumpStopped)
    }

    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for PumpSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PumpSender")
            .field("pending", &self.sender.len())
            .field("accepting", &self.is_accepting())
            .finish()
    }
}

pub struct StreamPump {
    sender: PumpSender,
    /// `true` asks the drain loop to empty the buffer before exiting.
    stop_sender: Sender<bool>,
    ack_receiver: Receiver<()>,
    counters: Arc<Counters>,
    thread: Option<JoinHandle<()>>,
    stopped: bool,
}

impl StreamPump {
    pub fn spawn<W>(sink: W, config: PumpConfig) -> Result<Self>
    where
        W: Write + Send + 'static,
    {
        let (sender, receiver) = bounded(config.capacity.max(1));
        let (stop_sender, stop_receiver) = bounded(1);
        let (ack_sender, ack_receiver) = bounded(1);
        let counters = Arc::new(Counters::default());

        let counters_clone = Arc::clone(&counters);
        let thread = thread::Builder::new()
            .name(config.thread_name.clone())
            .spawn(move || {
                Self::drain_thread(sink, receiver, stop_receiver, ack_sender, counters_clone);
            })?;

        debug!(
            "Started stream pump '{}' (capacity {})",
            config.thread_name, config.capacity
        );

        Ok(Self {
            sender: PumpSender {
                sender,
                accepting: Arc::new(AtomicBool::new(true)),
            },
            stop_sender,
            ack_receiver,
            counters,
            thread: Some(thread),
            stopped: false,
        })
    }

    fn drain_thread<W: Write>(
        mut sink: W,
        receiver: Receiver<Vec<u8>>,
        stop_receiver: Receiver<bool>,
        ack_sender: Sender<()>,
        counters: Arc<Counters>,
    ) {
        loop {
            select! {
                recv(stop_receiver) -> drain => {
                    if drain.unwrap_or(false) {
                        while let Ok(bytes) = receiver.try_recv() {
                            Self::deliver(&mut sink, &bytes, &counters);
                        }
                    }
                    break;
                }
                recv(receiver) -> msg => match msg {
                    Ok(bytes) => Self::deliver(&mut sink, &bytes, &counters),
                    // Every sender is gone.
                    Err(_) => break,
                },
            }
        }

        let abandoned = receiver.len() as u64;
        counters.abandoned.store(abandoned, Ordering::Relaxed);
        drop(receiver);

        debug!("Stream pump drained ({} abandoned)", abandoned);
        let _ = ack_sender.send(());
    }

    /// One message, one attempt. A failed write is logged and skipped.
    fn deliver<W: Write>(sink: &mut W, bytes: &[u8], counters: &Counters) {
        match sink.write_all(bytes).and_then(|_| sink.flush()) {
            Ok(()) => {
                counters.delivered.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                counters.failed.fetch_add(1, Ordering::Relaxed);
                warn!("error while writing {:02X?}: {}", bytes, e);
            }
        }
    }

    pub fn sender(&self) -> PumpSender {
        self.sender.clone()
    }

    pub fn stats(&self) -> PumpStats {
        PumpStats {
            delivered: self.counters.delivered.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            abandoned: self.counters.abandoned.load(Ordering::Relaxed),
        }
    }

    /// Stop accepting new messages and tell the drain loop to exit.
    pub fn stop(&self) {
        self.sender.accepting.store(false, Ordering::Release);
        let _ = self.stop_sender.try_send(false);
    }

    /// Block until the drain loop has exited. Only the first call waits.
    pub fn wait_stopped(&mut self) {
        if self.stopped {
            return;
        }
        let _ = self.ack_receiver.recv();
        self.stopped = true;
    }

    pub fn shutdown(&mut self) -> PumpStats {
        self.stop();
        self.join()
    }

    /// Stop accepting, deliver everything already buffered, then stop.
    pub fn finish(&mut self) -> PumpStats {
        self.sender.accepting.store(false, Ordering::Release);
        let _ = self.stop_sender.try_send(true);
        self.join()
    }

    fn join(&mut self) -> PumpStats {
        self.wait_stopped();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("stream pump thread panicked");
            }
        }
        self.stats()
    }
}

impl Drop for StreamPump {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for StreamPump {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamPump")
            .field("stats", &self.stats())
            .field("stopped", &self.stopped)
            .finish()
    }
}
