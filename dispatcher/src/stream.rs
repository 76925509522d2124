//! # Stream Handle Contracts
//!
//! The dispatcher never creates or destroys the streams it drives: the host
//! (an accessory session, a serial device, a test script) owns them and hands
//! them over as a [`Session`]. This module defines what the dispatcher needs
//! from them:
//!
//! - **Stream**: open/close plus listener registration (`schedule`/`unschedule`)
//! - **InputStream**: non-blocking bounded reads and a has-more-bytes probe
//! - **OutputStream**: single non-blocking writes
//!
//! ## Readiness Flow
//!
//! ```text
//! ┌──────────────┐  notify(event)  ┌────────────┐  pump()/run()  ┌──────────────────┐
//! │ InputStream  │────────────────►│            │───────────────►│                  │
//! └──────────────┘                 │  Notifier  │                │ StreamDispatcher │
//! ┌──────────────┐  notify(event)  │  (mpsc)    │                │                  │
//! │ OutputStream │────────────────►│            │                │                  │
//! └──────────────┘                 └────────────┘                └──────────────────┘
//! ```
//!
//! Read and write results keep the host convention: negative means error,
//! and the handle's `last_error` describes it.

use core::fmt;

use tokio::sync::mpsc::UnboundedSender;

use crate::accessory::Accessory;

/// Which half of the duplex pair an event came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Accessory → host
    Input,
    /// Host → accessory
    Output,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Input => f.write_str("input"),
            Direction::Output => f.write_str("output"),
        }
    }
}

/// Readiness notifications a stream handle can emit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEvent {
    /// The open operation completed
    OpenCompleted,
    /// Bytes can be read without blocking
    HasBytesAvailable,
    /// Bytes can be written without blocking
    HasSpaceAvailable,
    /// The stream recorded an error; see `last_error`
    ErrorOccurred,
    /// The stream reached its end
    EndEncountered,
}

/// A readiness event tagged with the stream it came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Readiness {
    pub direction: Direction,
    pub event: StreamEvent,
}

impl Readiness {
    pub fn new(direction: Direction, event: StreamEvent) -> Self {
        Self { direction, event }
    }
}

/// Listener registration handed to a stream on `schedule`
///
/// Cloning is cheap; every clone feeds the same dispatcher queue.
#[derive(Debug, Clone)]
pub struct Notifier {
    direction: Direction,
    tx: UnboundedSender<Readiness>,
}

impl Notifier {
    pub(crate) fn new(direction: Direction, tx: UnboundedSender<Readiness>) -> Self {
        Self { direction, tx }
    }

    /// Direction of the stream this notifier was registered for
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Queue `event` for the dispatcher
    ///
    /// Returns `false` if the dispatcher has been dropped.
    pub fn notify(&self, event: StreamEvent) -> bool {
        self.tx.send(Readiness::new(self.direction, event)).is_ok()
    }
}

/// Behaviour shared by both halves of the duplex pair
pub trait Stream {
    /// Open the stream; failures surface later as `ErrorOccurred`
    fn open(&mut self);

    /// Close the stream; must tolerate repeated calls
    fn close(&mut self);

    /// Start delivering readiness events to `notifier`
    fn schedule(&mut self, notifier: Notifier);

    /// Stop delivering readiness events
    fn unschedule(&mut self);

    /// Description of the most recent error, if any
    fn last_error(&self) -> Option<String>;
}

/// Accessory → host half
pub trait InputStream: Stream {
    /// Whether a read would return data without blocking
    fn has_bytes_available(&mut self) -> bool;

    /// Read up to `buf.len()` bytes
    ///
    /// Returns the number of bytes read, or a negative value on error.
    fn read(&mut self, buf: &mut [u8]) -> isize;
}

/// Host → accessory half
pub trait OutputStream: Stream {
    /// Attempt a single write of `data`
    ///
    /// Returns the number of bytes written (possibly fewer than `data.len()`),
    /// zero if a fixed-capacity stream is full, or a negative value on error.
    fn write(&mut self, data: &[u8]) -> isize;
}

/// A host-owned accessory session: the stream pair plus what is known about
/// the accessory on the other end
pub trait Session {
    type Input: InputStream;
    type Output: OutputStream;

    fn input(&mut self) -> Option<&mut Self::Input>;

    fn output(&mut self) -> Option<&mut Self::Output>;

    /// The attached accessory, if any
    fn accessory(&self) -> Option<&Accessory>;

    /// Protocol identifier the session was opened with
    fn protocol_string(&self) -> Option<&str>;
}

/// Concrete [`Session`] over an owned stream pair
#[derive(Debug)]
pub struct StreamSession<I, O> {
    input: Option<I>,
    output: Option<O>,
    accessory: Option<Accessory>,
    protocol_string: Option<String>,
}

impl<I: InputStream, O: OutputStream> StreamSession<I, O> {
    pub fn new(input: I, output: O) -> Self {
        Self {
            input: Some(input),
            output: Some(output),
            accessory: None,
            protocol_string: None,
        }
    }

    /// A session with only some of its streams present
    pub fn from_parts(input: Option<I>, output: Option<O>) -> Self {
        Self {
            input,
            output,
            accessory: None,
            protocol_string: None,
        }
    }

    pub fn with_accessory(mut self, accessory: Accessory) -> Self {
        self.accessory = Some(accessory);
        self
    }

    pub fn with_protocol_string(mut self, protocol_string: impl Into<String>) -> Self {
        self.protocol_string = Some(protocol_string.into());
        self
    }
}

impl<I: InputStream, O: OutputStream> Session for StreamSession<I, O> {
    type Input = I;
    type Output = O;

    fn input(&mut self) -> Option<&mut I> {
        self.input.as_mut()
    }

    fn output(&mut self) -> Option<&mut O> {
        self.output.as_mut()
    }

    fn accessory(&self) -> Option<&Accessory> {
        self.accessory.as_ref()
    }

    fn protocol_string(&self) -> Option<&str> {
        self.protocol_string.as_deref()
    }
}
