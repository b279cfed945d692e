//! Line framing over a raw byte stream.
//!
//! The chat protocol terminates each line with CRLF. Reads arrive in
//! arbitrary chunks, so bytes are buffered until a terminator is seen; a
//! terminator split across two reads still yields exactly one line.

use std::collections::VecDeque;
use std::io::{self, Read};

use tracing::{debug, warn};

use crate::errors::TransportError;
use crate::transport::TRANSPORT_TARGET;

const READ_CHUNK: usize = 2048;
const MAX_PENDING_BYTES: usize = 64 * 1024;

/// Yields complete protocol lines from a byte stream.
///
/// The iterator is lazy and not restartable. End-of-stream produces a single
/// `Err(TransportError::ConnectionClosed)`, after which it returns `None`.
/// Empty lines are skipped and any unterminated residue at end-of-stream is
/// discarded.
pub struct FrameReader<R> {
    source: R,
    buffer: Vec<u8>,
    ready: VecDeque<String>,
    finished: bool,
}

impl<R: Read> FrameReader<R> {
    /// Wraps a byte source.
    pub fn new(source: R) -> Self {
        Self {
            source,
            buffer: Vec::new(),
            ready: VecDeque::new(),
            finished: false,
        }
    }

    fn absorb(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
        while let Some(position) = self.buffer.iter().position(|byte| *byte == b'\n') {
            let mut line: Vec<u8> = self.buffer.drain(..=position).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            if !line.is_empty() {
                self.ready
                    .push_back(String::from_utf8_lossy(&line).into_owned());
            }
        }

        if self.buffer.len() > MAX_PENDING_BYTES {
            warn!(
                target: TRANSPORT_TARGET,
                pending = self.buffer.len(),
                "discarding oversized unterminated line"
            );
            self.buffer.clear();
        }
    }

    fn finish(&mut self, error: TransportError) -> Option<Result<String, TransportError>> {
        self.finished = true;
        if !self.buffer.is_empty() {
            debug!(
                target: TRANSPORT_TARGET,
                residue = self.buffer.len(),
                "dropping partial line at end of stream"
            );
            self.buffer.clear();
        }
        Some(Err(error))
    }
}

impl<R: Read> Iterator for FrameReader<R> {
    type Item = Result<String, TransportError>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut chunk = [0_u8; READ_CHUNK];
        loop {
            if let Some(line) = self.ready.pop_front() {
                return Some(Ok(line));
            }
            if self.finished {
                return None;
            }

            match self.source.read(&mut chunk) {
                Ok(0) => return self.finish(TransportError::ConnectionClosed),
                Ok(read) => self.absorb(&chunk[..read]),
                Err(error)
                    if matches!(
                        error.kind(),
                        io::ErrorKind::Interrupted
                            | io::ErrorKind::WouldBlock
                            | io::ErrorKind::TimedOut
                    ) =>
                {
                    continue;
                }
                Err(error) => return self.finish(TransportError::from_stream(error)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    /// Serves one scripted chunk per `read` call.
    struct ChunkedSource {
        chunks: VecDeque<Vec<u8>>,
    }

    impl ChunkedSource {
        fn new(chunks: &[&[u8]]) -> Self {
            Self {
                chunks: chunks.iter().map(|chunk| chunk.to_vec()).collect(),
            }
        }
    }

    impl Read for ChunkedSource {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let Some(chunk) = self.chunks.pop_front() else {
                return Ok(0);
            };
            buf[..chunk.len()].copy_from_slice(&chunk);
            Ok(chunk.len())
        }
    }

    fn collect_lines(chunks: &[&[u8]]) -> Vec<String> {
        FrameReader::new(ChunkedSource::new(chunks))
            .map_while(Result::ok)
            .collect()
    }

    #[rstest]
    fn terminator_split_across_reads_yields_one_line() {
        let mut reader = FrameReader::new(ChunkedSource::new(&[b"PING :abc\r", b"\n"]));

        assert_eq!(reader.next().and_then(Result::ok).as_deref(), Some("PING :abc"));
        assert!(matches!(
            reader.next(),
            Some(Err(TransportError::ConnectionClosed))
        ));
        assert!(reader.next().is_none());
    }

    #[rstest]
    fn partial_lines_are_joined_across_reads() {
        let lines = collect_lines(&[b":irc.test 00", b"1 pybob :Wel", b"come\r\nPING :x\r\n"]);
        assert_eq!(lines, vec![":irc.test 001 pybob :Welcome", "PING :x"]);
    }

    #[rstest]
    fn several_lines_in_one_read() {
        let lines = collect_lines(&[b"one\r\ntwo\r\n\r\nthree\r\n"]);
        assert_eq!(lines, vec!["one", "two", "three"]);
    }

    #[rstest]
    fn unterminated_residue_is_dropped_at_end_of_stream() {
        let lines = collect_lines(&[b"done\r\nhalf a li"]);
        assert_eq!(lines, vec!["done"]);
    }

    #[rstest]
    fn multibyte_characters_split_across_reads_survive() {
        let text = "PRIVMSG pybob :caf\u{e9}\r\n".as_bytes();
        let (head, tail) = text.split_at(19);
        let lines = collect_lines(&[head, tail]);
        assert_eq!(lines, vec!["PRIVMSG pybob :caf\u{e9}"]);
    }
}
