//! # Message Codec
//!
//! Turns raw bytes from the input stream into [`Message`]s in two steps:
//!
//! 1. **Framing** decides where one message ends. The default,
//!    [`Framing::PerRead`], treats every read as exactly one message, which
//!    splits a logical message that crosses a read boundary. Accessories with
//!    a real protocol should pick [`Framing::Delimited`] or
//!    [`Framing::LengthPrefixed`], both of which carry partial frames across
//!    reads and readiness events.
//! 2. **Decoding** maps each frame to text with a fixed single-byte (ASCII)
//!    encoding. Any byte above `0x7f` rejects the whole frame.
//!
//! ## Length-Prefixed Wire Format
//!
//! ```text
//! ┌──────────────────┬──────────────────────────┐
//! │  Length (varint) │         Payload          │
//! │   1..=10 bytes   │       Length bytes       │
//! └──────────────────┴──────────────────────────┘
//! ```
//!
//! This is postcard's encoding of a byte slice, so frames are produced and
//! parsed with `postcard` directly.

use core::fmt;
use core::ops::Deref;

use log::trace;
use serde::{Deserialize, Serialize};

use crate::error::DispatchError;

/// A decoded text message delivered to the subscriber
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Message(String);

impl Message {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl Deref for Message {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialEq<str> for Message {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for Message {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl From<Message> for String {
    fn from(message: Message) -> Self {
        message.0
    }
}

/// Decode `bytes` as ASCII
pub fn decode_ascii(bytes: &[u8]) -> Result<Message, DispatchError> {
    if let Some(position) = bytes.iter().position(|b| !b.is_ascii()) {
        return Err(DispatchError::Decode {
            position,
            byte: bytes[position],
        });
    }
    let text = bytes.iter().map(|&b| b as char).collect();
    Ok(Message(text))
}

/// How message boundaries are found in the input byte stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Framing {
    /// Each read is one message
    #[default]
    PerRead,
    /// Messages end at `delimiter`, which is stripped
    Delimited { delimiter: u8 },
    /// Messages carry a varint length prefix
    LengthPrefixed,
}

impl Framing {
    /// Newline-delimited framing
    pub const fn lines() -> Self {
        Framing::Delimited { delimiter: b'\n' }
    }
}

/// Where the decoder is after rejecting an oversized frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resync {
    InSync,
    /// Drop input through the next delimiter
    ToDelimiter,
    /// Drop this many more payload bytes
    Skip(usize),
}

/// Incremental frame splitter for one input stream
///
/// A frame longer than `max_frame_length` is reported once as a
/// [`DispatchError::Framing`] and the rest of it is dropped as it arrives, so
/// no part of it is ever delivered as a frame of its own.
#[derive(Debug)]
pub struct FrameDecoder {
    framing: Framing,
    pending: Vec<u8>,
    max_frame_length: usize,
    resync: Resync,
}

impl FrameDecoder {
    pub fn new(framing: Framing, max_frame_length: usize) -> Self {
        Self {
            framing,
            pending: Vec::new(),
            max_frame_length,
            resync: Resync::InSync,
        }
    }

    pub fn framing(&self) -> Framing {
        self.framing
    }

    /// Bytes held back waiting for the rest of their frame
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Whether input is being dropped until the next frame boundary
    pub fn is_discarding(&self) -> bool {
        self.resync != Resync::InSync
    }

    /// Drop any partial frame and resume at a frame boundary
    pub fn reset(&mut self) {
        self.pending.clear();
        self.resync = Resync::InSync;
    }

    /// Feed one read's worth of bytes, calling `on_frame` for each complete
    /// frame in arrival order
    pub fn push<F>(&mut self, chunk: &[u8], mut on_frame: F)
    where
        F: FnMut(Result<&[u8], DispatchError>),
    {
        match self.framing {
            Framing::PerRead => on_frame(Ok(chunk)),
            Framing::Delimited { delimiter } => {
                let Some(chunk) = self.skip_delimited(chunk, delimiter) else {
                    return;
                };
                self.pending.extend_from_slice(chunk);
                let mut start = 0;
                while let Some(rel) = self.pending[start..].iter().position(|b| *b == delimiter) {
                    if rel > self.max_frame_length {
                        on_frame(Err(self.oversized(rel)));
                    } else {
                        on_frame(Ok(&self.pending[start..start + rel]));
                    }
                    start += rel + 1;
                }
                self.pending.drain(..start);

                if self.pending.len() > self.max_frame_length {
                    on_frame(Err(self.oversized(self.pending.len())));
                    self.pending.clear();
                    self.resync = Resync::ToDelimiter;
                }
            }
            Framing::LengthPrefixed => {
                let Some(chunk) = self.skip_payload(chunk) else {
                    return;
                };
                self.pending.extend_from_slice(chunk);
                let mut start = 0;
                loop {
                    let window = &self.pending[start..];
                    let (len, rest) = match postcard::take_from_bytes::<usize>(window) {
                        Ok(parsed) => parsed,
                        Err(postcard::Error::DeserializeUnexpectedEnd) => break,
                        Err(e) => {
                            on_frame(Err(DispatchError::framing(format!(
                                "malformed length prefix: {e}"
                            ))));
                            start = self.pending.len();
                            break;
                        }
                    };
                    let prefix = window.len() - rest.len();

                    if len > self.max_frame_length {
                        on_frame(Err(self.oversized(len)));
                        if len <= rest.len() {
                            start += prefix + len;
                            continue;
                        }
                        self.resync = Resync::Skip(len - rest.len());
                        start = self.pending.len();
                        break;
                    }
                    if rest.len() < len {
                        break;
                    }
                    on_frame(Ok(&rest[..len]));
                    start += prefix + len;
                }
                self.pending.drain(..start);
            }
        }
    }

    /// Drop the tail of an oversized delimited frame; `None` if all of `chunk` was dropped
    fn skip_delimited<'a>(&mut self, chunk: &'a [u8], delimiter: u8) -> Option<&'a [u8]> {
        if self.resync != Resync::ToDelimiter {
            return Some(chunk);
        }
        let at = chunk.iter().position(|b| *b == delimiter)?;
        trace!("Resynchronized after oversized frame");
        self.resync = Resync::InSync;
        Some(&chunk[at + 1..])
    }

    /// Drop the rest of an oversized length-prefixed payload; `None` if all of `chunk` was dropped
    fn skip_payload<'a>(&mut self, chunk: &'a [u8]) -> Option<&'a [u8]> {
        let Resync::Skip(remaining) = self.resync else {
            return Some(chunk);
        };
        if remaining > chunk.len() {
            self.resync = Resync::Skip(remaining - chunk.len());
            return None;
        }
        trace!("Resynchronized after oversized frame");
        self.resync = Resync::InSync;
        Some(&chunk[remaining..])
    }

    fn oversized(&self, len: usize) -> DispatchError {
        DispatchError::framing(format!(
            "frame of {len} bytes exceeds limit of {} bytes",
            self.max_frame_length
        ))
    }
}

/// Wrap `payload` for the wire according to `framing`
pub fn encode_frame(framing: Framing, payload: &[u8]) -> Result<Vec<u8>, DispatchError> {
    match framing {
        Framing::PerRead => Ok(payload.to_vec()),
        Framing::Delimited { delimiter } => {
            if payload.contains(&delimiter) {
                return Err(DispatchError::framing(format!(
                    "payload contains delimiter 0x{delimiter:02x}"
                )));
            }
            let mut frame = Vec::with_capacity(payload.len() + 1);
            frame.extend_from_slice(payload);
            frame.push(delimiter);
            Ok(frame)
        }
        Framing::LengthPrefixed => postcard::to_allocvec(payload)
            .map_err(|e| DispatchError::framing(format!("cannot encode frame: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn collect(decoder: &mut FrameDecoder, chunk: &[u8]) -> Vec<Result<Vec<u8>, DispatchError>> {
        let mut out = Vec::new();
        decoder.push(chunk, |frame| out.push(frame.map(<[u8]>::to_vec)));
        out
    }

    #[test]
    fn test_decode_ascii() {
        assert_eq!(decode_ascii(b"hello").unwrap(), "hello");
        assert_eq!(decode_ascii(b"").unwrap(), "");
    }

    #[test]
    fn test_decode_rejects_high_bytes() {
        let err = decode_ascii(&[b'o', b'k', 0xC3, 0xA9]).unwrap_err();
        assert_eq!(
            err,
            DispatchError::Decode {
                position: 2,
                byte: 0xC3
            }
        );
        assert_eq!(err.kind(), ErrorKind::DecodeFailure);
    }

    #[test]
    fn test_per_read_passes_chunks_through() {
        let mut decoder = FrameDecoder::new(Framing::PerRead, 16);
        let frames = collect(&mut decoder, b"hel");
        assert_eq!(frames, vec![Ok(b"hel".to_vec())]);
        assert_eq!(decoder.pending_len(), 0);
    }

    #[test]
    fn test_delimited_joins_across_reads() {
        let mut decoder = FrameDecoder::new(Framing::lines(), 64);

        assert!(collect(&mut decoder, b"temp=2").is_empty());
        assert_eq!(decoder.pending_len(), 6);

        let frames = collect(&mut decoder, b"1\nhum=40\nbat");
        assert_eq!(
            frames,
            vec![Ok(b"temp=21".to_vec()), Ok(b"hum=40".to_vec())]
        );
        assert_eq!(decoder.pending_len(), 3);
    }

    #[test]
    fn test_delimited_overflow_drops_rest_of_line() {
        let mut decoder = FrameDecoder::new(Framing::lines(), 4);
        let frames = collect(&mut decoder, b"abcdefg");

        assert_eq!(
            frames,
            vec![Err(DispatchError::Framing {
                reason: "frame of 7 bytes exceeds limit of 4 bytes".into()
            })]
        );
        assert_eq!(decoder.pending_len(), 0);
        assert!(decoder.is_discarding());

        // Tail of the overlong line, then a real one
        assert!(collect(&mut decoder, b"hij").is_empty());
        assert_eq!(collect(&mut decoder, b"k
ok
"), vec![Ok(b"ok".to_vec())]);
        assert!(!decoder.is_discarding());
    }

    #[test]
    fn test_delimited_complete_overlong_line_is_rejected() {
        let mut decoder = FrameDecoder::new(Framing::lines(), 4);
        let frames = collect(&mut decoder, b"abcdefg
ok
");

        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].as_ref().unwrap_err().kind(), ErrorKind::FramingError);
        assert_eq!(frames[1], Ok(b"ok".to_vec()));
        assert!(!decoder.is_discarding());
    }

    #[test]
    fn test_length_prefixed_oversized_payload_is_skipped() {
        let mut wire = encode_frame(Framing::LengthPrefixed, b"xxxxxxxxx\x01A\x01B").unwrap();
        wire.extend(encode_frame(Framing::LengthPrefixed, b"ok").unwrap());

        let mut decoder = FrameDecoder::new(Framing::LengthPrefixed, 8);
        let frames = collect(&mut decoder, &wire[..10]);
        assert_eq!(
            frames,
            vec![Err(DispatchError::Framing {
                reason: "frame of 13 bytes exceeds limit of 8 bytes".into()
            })]
        );
        assert!(decoder.is_discarding());

        // The four payload bytes still owed look like frames but are dropped
        assert!(collect(&mut decoder, &wire[10..12]).is_empty());
        assert_eq!(collect(&mut decoder, &wire[12..]), vec![Ok(b"ok".to_vec())]);
        assert!(!decoder.is_discarding());
        assert_eq!(decoder.pending_len(), 0);
    }

    #[test]
    fn test_length_prefixed_oversized_frame_within_one_read() {
        let mut wire = encode_frame(Framing::LengthPrefixed, b"0123456789").unwrap();
        wire.extend(encode_frame(Framing::LengthPrefixed, b"ack").unwrap());

        let mut decoder = FrameDecoder::new(Framing::LengthPrefixed, 8);
        let frames = collect(&mut decoder, &wire);

        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].as_ref().unwrap_err().kind(), ErrorKind::FramingError);
        assert_eq!(frames[1], Ok(b"ack".to_vec()));
        assert!(!decoder.is_discarding());
    }

    #[test]
    fn test_reset_leaves_discard_state() {
        let mut decoder = FrameDecoder::new(Framing::lines(), 2);
        collect(&mut decoder, b"long");
        assert!(decoder.is_discarding());

        decoder.reset();
        assert_eq!(collect(&mut decoder, b"hi\n"), vec![Ok(b"hi".to_vec())]);
    }

    #[test]
    fn test_length_prefixed_split_prefix_and_payload() {
        let wire = encode_frame(Framing::LengthPrefixed, b"ping").unwrap();
        assert_eq!(wire, vec![4, b'p', b'i', b'n', b'g']);

        let mut decoder = FrameDecoder::new(Framing::LengthPrefixed, 64);
        assert!(collect(&mut decoder, &wire[..2]).is_empty());
        let frames = collect(&mut decoder, &wire[2..]);
        assert_eq!(frames, vec![Ok(b"ping".to_vec())]);
        assert_eq!(decoder.pending_len(), 0);
    }

    #[test]
    fn test_length_prefixed_multiple_frames_in_one_read() {
        let mut wire = encode_frame(Framing::LengthPrefixed, b"a").unwrap();
        wire.extend(encode_frame(Framing::LengthPrefixed, b"").unwrap());
        wire.extend(encode_frame(Framing::LengthPrefixed, b"bc").unwrap());

        let mut decoder = FrameDecoder::new(Framing::LengthPrefixed, 64);
        let frames = collect(&mut decoder, &wire);
        assert_eq!(
            frames,
            vec![Ok(b"a".to_vec()), Ok(Vec::new()), Ok(b"bc".to_vec())]
        );
    }

    #[test]
    fn test_encode_delimited_rejects_embedded_delimiter() {
        let err = encode_frame(Framing::lines(), b"two\nlines").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FramingError);

        assert_eq!(encode_frame(Framing::lines(), b"one").unwrap(), b"one\n");
    }

    #[test]
    fn test_framing_serde_shape() {
        let framing: Framing =
            serde_json::from_str(r#"{"kind":"delimited","delimiter":13}"#).unwrap();
        assert_eq!(framing, Framing::Delimited { delimiter: b'\r' });

        let framing: Framing = serde_json::from_str(r#"{"kind":"length_prefixed"}"#).unwrap();
        assert_eq!(framing, Framing::LengthPrefixed);
    }
}
