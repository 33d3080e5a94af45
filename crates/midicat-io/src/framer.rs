//! Fixed-size framing of raw MIDI byte streams.
//!
//! Streams between pipeline stages carry bare MIDI bytes with no headers, and
//! every stage reads them back in 3-byte units. The framer reads one unit at a
//! time, forwards it unchanged and then tries to make sense of it for the log.
//! Parsing never gates forwarding: a chunk that fails to parse is still
//! passed on.

use crate::{MidiMsg, SystemRealTimeMsg};
use std::io::{self, ErrorKind, Read};
use tracing::{info, trace, warn};

/// Bytes per read on every stream boundary.
pub const CHUNK_SIZE: usize = 3;

/// One unit read from the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RawChunk {
    pub data: [u8; CHUNK_SIZE],
    /// Valid bytes in `data` (1-3). Only the final chunk of a stream is short.
    pub len: u8,
}

impl RawChunk {
    #[inline]
    pub fn bytes(&self) -> &[u8] {
        &self.data[..self.len as usize]
    }

    #[inline]
    pub fn is_complete(&self) -> bool {
        self.len as usize == CHUNK_SIZE
    }
}

/// What a chunk turned out to be.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    RealTime(SystemRealTimeMsg),
    Message(MidiMsg),
}

pub fn classify(bytes: &[u8]) -> Result<Frame, midi_msg::ParseError> {
    let (msg, _len) = MidiMsg::from_midi(bytes)?;
    match msg {
        MidiMsg::SystemRealTime { msg } => Ok(Frame::RealTime(msg)),
        other => Ok(Frame::Message(other)),
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FramerStats {
    pub chunks: u64,
    pub realtime: u64,
    pub parsed: u64,
    pub malformed: u64,
    pub forward_errors: u64,
}

pub struct ByteFramer<R> {
    reader: R,
    verbose: bool,
}

impl<R: Read> ByteFramer<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            verbose: false,
        }
    }

    /// Log parsed messages at `info` instead of `trace`.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Read the next chunk. `Ok(None)` at end of stream.
    ///
    /// Pipes may hand out fewer bytes than asked for, so reads are repeated
    /// until the chunk is full or the stream ends.
    pub fn read_chunk(&mut self) -> io::Result<Option<RawChunk>> {
        let mut data = [0u8; CHUNK_SIZE];
        let mut filled = 0;

        while filled < CHUNK_SIZE {
            match self.reader.read(&mut data[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }

        if filled == 0 {
            return Ok(None);
        }
        Ok(Some(RawChunk {
            data,
            len: filled as u8,
        }))
    }

    /// Read until end of stream, handing each chunk to `forward` before it is
    /// parsed. Realtime messages go to `on_realtime`.
    ///
    /// A failing `forward` is logged and the loop moves on to the next chunk.
    pub fn run<F, C>(&mut self, mut forward: F, mut on_realtime: C) -> io::Result<FramerStats>
    where
        F: FnMut(&[u8]) -> io::Result<()>,
        C: FnMut(SystemRealTimeMsg),
    {
        let mut stats = FramerStats::default();

        while let Some(chunk) = self.read_chunk()? {
            stats.chunks += 1;

            if let Err(e) = forward(chunk.bytes()) {
                stats.forward_errors += 1;
                warn!("could not forward {:02X?}: {}", chunk.bytes(), e);
            }

            match classify(chunk.bytes()) {
                Ok(Frame::RealTime(msg)) => {
                    stats.realtime += 1;
                    on_realtime(msg);
                }
                Ok(Frame::Message(msg)) => {
                    stats.parsed += 1;
                    if self.verbose {
                        info!("{:?}", msg);
                    } else {
                        trace!("{:?}", msg);
                    }
                }
                Err(e) => {
                    stats.malformed += 1;
                    warn!("could not understand {:02X?}: {:?}", chunk.bytes(), e);
                }
            }

            // A short chunk only happens right before end of stream.
            if !chunk.is_complete() {
                break;
            }
        }

        Ok(stats)
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// Reader that hands out at most one byte per call, like a slow pipe.
    struct Trickle<'a>(&'a [u8]);

    impl Read for Trickle<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.0.is_empty() || buf.is_empty() {
                return Ok(0);
            }
            buf[0] = self.0[0];
            self.0 = &self.0[1..];
            Ok(1)
        }
    }

    fn relay(input: &[u8]) -> (Vec<u8>, FramerStats, Vec<SystemRealTimeMsg>) {
        let mut out = Vec::new();
        let mut realtime = Vec::new();
        let stats = ByteFramer::new(Cursor::new(input.to_vec()))
            .run(
                |bytes| {
                    out.extend_from_slice(bytes);
                    Ok(())
                },
                |msg| realtime.push(msg),
            )
            .unwrap();
        (out, stats, realtime)
    }

    #[test]
    fn test_classify_note_on() {
        let frame = classify(&[0x90, 0x40, 0x7F]).unwrap();
        assert!(matches!(frame, Frame::Message(MidiMsg::ChannelVoice { .. })));
    }

    #[test]
    fn test_classify_realtime() {
        let frame = classify(&[0xF8, 0x00, 0x00]).unwrap();
        assert_eq!(frame, Frame::RealTime(SystemRealTimeMsg::TimingClock));
    }

    #[test]
    fn test_classify_stray_data_byte_fails() {
        assert!(classify(&[0x40, 0x40, 0x40]).is_err());
    }

    #[test]
    fn test_passthrough_is_byte_identical() {
        let input = [
            0x90, 0x40, 0x7F, // note on
            0x40, 0x41, 0x42, // garbage
            0xF8, 0x00, 0x00, // clock
            0x80, 0x40, 0x00, // note off
        ];
        let (out, stats, realtime) = relay(&input);

        assert_eq!(out, input);
        assert_eq!(stats.chunks, 4);
        assert_eq!(stats.parsed, 2);
        assert_eq!(stats.malformed, 1);
        assert_eq!(realtime, vec![SystemRealTimeMsg::TimingClock]);
    }

    #[test]
    fn test_short_reads_are_reassembled() {
        let input = [0x90, 0x3C, 0x64, 0xB0, 0x07, 0x7F];
        let mut framer = ByteFramer::new(Trickle(&input));

        let first = framer.read_chunk().unwrap().unwrap();
        assert_eq!(first.bytes(), &[0x90, 0x3C, 0x64]);
        let second = framer.read_chunk().unwrap().unwrap();
        assert_eq!(second.bytes(), &[0xB0, 0x07, 0x7F]);
        assert!(framer.read_chunk().unwrap().is_none());
    }

    #[test]
    fn test_trailing_partial_chunk_is_forwarded_then_stops() {
        let (out, stats, _) = relay(&[0x90, 0x40, 0x7F, 0xC0, 0x05]);
        assert_eq!(out, vec![0x90, 0x40, 0x7F, 0xC0, 0x05]);
        assert_eq!(stats.chunks, 2);
    }

    #[test]
    fn test_empty_stream() {
        let (out, stats, _) = relay(&[]);
        assert!(out.is_empty());
        assert_eq!(stats, FramerStats::default());
    }

    #[test]
    fn test_forward_failure_does_not_stop_loop() {
        let input = [0x90, 0x40, 0x7F, 0x80, 0x40, 0x00];
        let mut calls = 0;
        let stats = ByteFramer::new(Cursor::new(input.to_vec()))
            .run(
                |_| {
                    calls += 1;
                    Err(io::Error::new(ErrorKind::BrokenPipe, "gone"))
                },
                |_| {},
            )
            .unwrap();

        assert_eq!(calls, 2);
        assert_eq!(stats.forward_errors, 2);
        assert_eq!(stats.parsed, 2);
    }
}
