//! # Stream Dispatcher
//!
//! Owns the logical connection over a host-provided stream pair and turns
//! readiness events into reads, writes and subscriber callbacks.
//!
//! ## Lifecycle
//!
//! ```text
//! ┌───────────────┐  connect()  ┌────────┐  close() / end-of-stream / drop  ┌────────┐
//! │ Uninitialized │────────────►│  Open  │─────────────────────────────────►│ Closed │
//! └───────────────┘             └────────┘                                  └────────┘
//! ```
//!
//! `Closed` is terminal. Once there, no read or write reaches either handle,
//! even for readiness events that were already queued.
//!
//! ## Threading
//!
//! Everything runs on the thread that drives the dispatcher: `connect`,
//! `close`, `send` and every readiness callback. Handles only enqueue events
//! through their [`Notifier`]; the host delivers them with [`pump`] from its
//! own event loop or awaits them with [`run`].
//!
//! [`pump`]: StreamDispatcher::pump
//! [`run`]: StreamDispatcher::run

use core::fmt;

use log::{debug, info, trace, warn};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::accessory::AccessoryInfo;
use crate::buffer::{ReadBuffer, ReadResult};
use crate::codec::{decode_ascii, encode_frame, FrameDecoder};
use crate::config::DispatcherConfig;
use crate::error::{ConfigError, DispatchError};
use crate::stats::DispatchStats;
use crate::stream::{
    Direction, InputStream, Notifier, OutputStream, Readiness, Session, Stream, StreamEvent,
};
use crate::subscriber::Subscriber;

/// Connection state of a [`StreamDispatcher`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Uninitialized,
    Open,
    Closed,
}

impl fmt::Display for DispatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchState::Uninitialized => f.write_str("uninitialized"),
            DispatchState::Open => f.write_str("open"),
            DispatchState::Closed => f.write_str("closed"),
        }
    }
}

/// Successful result of [`StreamDispatcher::send`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// The whole payload was accepted
    Complete { written: usize },
    /// Only a prefix was accepted; the rest is the caller's to resend
    Partial { written: usize, requested: usize },
}

impl SendOutcome {
    pub fn written(&self) -> usize {
        match *self {
            SendOutcome::Complete { written } | SendOutcome::Partial { written, .. } => written,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, SendOutcome::Complete { .. })
    }
}

/// Public surface of an accessory dispatcher
pub trait Dispatching {
    /// Register for readiness events and open both streams
    fn connect(&mut self) -> Result<(), DispatchError>;

    /// Close both streams and stop listening; safe to call repeatedly
    fn close(&mut self);

    /// Attempt one write of `data` to the output stream
    fn send(&mut self, data: &[u8]) -> Result<SendOutcome, DispatchError>;
}

/// Dispatches traffic between a [`Session`]'s streams and a [`Subscriber`]
pub struct StreamDispatcher<S: Session, D: Subscriber> {
    session: S,
    subscriber: Option<D>,
    config: DispatcherConfig,
    state: DispatchState,
    buffer: ReadBuffer,
    decoder: FrameDecoder,
    stats: DispatchStats,
    events_tx: UnboundedSender<Readiness>,
    events_rx: UnboundedReceiver<Readiness>,
}

impl<S: Session, D: Subscriber> StreamDispatcher<S, D> {
    /// Dispatcher with the default configuration
    pub fn new(session: S, subscriber: Option<D>) -> Self {
        Self::build(session, subscriber, DispatcherConfig::default())
    }

    /// Dispatcher reading at most `max_read_length` bytes per read
    pub fn with_max_read_length(
        session: S,
        subscriber: Option<D>,
        max_read_length: usize,
    ) -> Result<Self, ConfigError> {
        let config = DispatcherConfig::default().with_max_read_length(max_read_length);
        Self::with_config(session, subscriber, config)
    }

    pub fn with_config(
        session: S,
        subscriber: Option<D>,
        config: DispatcherConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(session, subscriber, config))
    }

    fn build(session: S, subscriber: Option<D>, config: DispatcherConfig) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            buffer: ReadBuffer::new(config.max_read_length),
            decoder: FrameDecoder::new(config.framing, config.max_frame_length),
            session,
            subscriber,
            config,
            state: DispatchState::Uninitialized,
            stats: DispatchStats::default(),
            events_tx,
            events_rx,
        }
    }

    pub fn state(&self) -> DispatchState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == DispatchState::Open
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    pub fn stats(&self) -> &DispatchStats {
        &self.stats
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut S {
        &mut self.session
    }

    pub fn subscriber_mut(&mut self) -> Option<&mut D> {
        self.subscriber.as_mut()
    }

    /// Protocol identifier of the session, or `""` if it has none
    pub fn protocol_string(&self) -> &str {
        self.session.protocol_string().unwrap_or("")
    }

    /// Snapshot of the attached accessory, if there is one
    pub fn info(&self) -> Option<AccessoryInfo> {
        let accessory = self.session.accessory()?;
        Some(AccessoryInfo {
            accessory: accessory.clone(),
            protocol_string: self.protocol_string().to_string(),
        })
    }

    pub fn connect(&mut self) -> Result<(), DispatchError> {
        if self.state != DispatchState::Uninitialized {
            return Err(DispatchError::AlreadyConnected { state: self.state });
        }

        if let Some(input) = self.session.input() {
            input.schedule(Notifier::new(Direction::Input, self.events_tx.clone()));
        }
        if let Some(output) = self.session.output() {
            output.schedule(Notifier::new(Direction::Output, self.events_tx.clone()));
        }

        self.state = DispatchState::Open;

        if let Some(input) = self.session.input() {
            input.open();
        }
        if let Some(output) = self.session.output() {
            output.open();
        }

        info!(
            "Dispatcher connected (protocol: '{}', max read length: {})",
            self.protocol_string(),
            self.buffer.capacity()
        );
        Ok(())
    }

    pub fn close(&mut self) {
        match self.state {
            DispatchState::Closed => return,
            DispatchState::Uninitialized => {
                self.state = DispatchState::Closed;
                debug!("Dispatcher closed before connecting");
                return;
            }
            DispatchState::Open => {}
        }
        self.state = DispatchState::Closed;

        if let Some(input) = self.session.input() {
            input.close();
            input.unschedule();
        }
        if let Some(output) = self.session.output() {
            output.close();
            output.unschedule();
        }

        self.buffer.clear();
        if self.decoder.pending_len() > 0 {
            debug!(
                "Discarding {} bytes of unterminated frame",
                self.decoder.pending_len()
            );
        }
        self.decoder.reset();

        info!("Dispatcher closed");
    }

    pub fn send(&mut self, data: &[u8]) -> Result<SendOutcome, DispatchError> {
        if self.state != DispatchState::Open {
            let err = DispatchError::NotOpen { state: self.state };
            warn!("{}", err);
            return Err(err);
        }

        let Some(output) = self.session.output() else {
            let err = DispatchError::Write {
                reason: "no output stream".into(),
            };
            warn!("{}", err);
            self.stats.record_error(&err);
            return Err(err);
        };

        let requested = data.len();
        let result = output.write(data);
        self.stats.writes += 1;

        if result < 0 {
            let err = DispatchError::write(output.last_error());
            warn!("{}", err);
            self.stats.record_error(&err);
            return Err(err);
        }

        let written = (result as usize).min(requested);
        self.stats.bytes_written += written as u64;

        if written == requested {
            trace!("Wrote {} bytes", written);
            Ok(SendOutcome::Complete { written })
        } else if written == 0 {
            let err = DispatchError::CapacityExhausted { requested };
            warn!("{}", err);
            self.stats.record_error(&err);
            Err(err)
        } else {
            debug!("Partial write: {} of {} bytes", written, requested);
            self.stats.partial_writes += 1;
            Ok(SendOutcome::Partial { written, requested })
        }
    }

    /// Frame `payload` with the configured framing, then [`send`](Self::send) it
    pub fn send_frame(&mut self, payload: &[u8]) -> Result<SendOutcome, DispatchError> {
        let frame = encode_frame(self.config.framing, payload)?;
        self.send(&frame)
    }

    /// Handle every queued readiness event; returns how many were dequeued
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(readiness) = self.events_rx.try_recv() {
            self.handle_event(readiness);
            handled += 1;
        }
        handled
    }

    /// Handle readiness events as they arrive until the dispatcher closes
    ///
    /// Returns immediately if the dispatcher is not open.
    pub async fn run(&mut self) {
        while self.state == DispatchState::Open {
            match self.events_rx.recv().await {
                Some(readiness) => self.handle_event(readiness),
                None => break,
            }
        }
    }

    /// React to one readiness event
    ///
    /// Hosts with native stream callbacks may call this directly instead of
    /// going through the notifier queue.
    pub fn handle_event(&mut self, readiness: Readiness) {
        let Readiness { direction, event } = readiness;

        if self.state != DispatchState::Open {
            trace!(
                "Ignoring {:?} on {} stream (dispatcher {})",
                event,
                direction,
                self.state
            );
            return;
        }

        match (direction, event) {
            (Direction::Input, StreamEvent::HasBytesAvailable) => {
                debug!("New bytes available");
                self.drain_input();
            }
            (Direction::Output, StreamEvent::HasSpaceAvailable) => {
                trace!("Output has space available");
                if let Some(subscriber) = self.subscriber.as_mut() {
                    subscriber.space_available();
                }
            }
            (direction, StreamEvent::ErrorOccurred) => {
                let last_error = match direction {
                    Direction::Input => self.session.input().and_then(|s| s.last_error()),
                    Direction::Output => self.session.output().and_then(|s| s.last_error()),
                };
                self.report(DispatchError::stream(direction, last_error));
            }
            (direction, StreamEvent::EndEncountered) => {
                info!("End of {} stream", direction);
                self.close();
                self.report(DispatchError::ConnectionEnded);
            }
            (direction, StreamEvent::OpenCompleted) => {
                debug!("{} stream opened", direction);
            }
            (direction, event) => {
                debug!("Unhandled {:?} on {} stream", event, direction);
            }
        }
    }

    /// Read until the input stream reports nothing more to read
    fn drain_input(&mut self) {
        let Self {
            session,
            subscriber,
            buffer,
            decoder,
            stats,
            ..
        } = self;

        let Some(input) = session.input() else {
            return;
        };

        while input.has_bytes_available() {
            let n = match buffer.read_from(input) {
                ReadResult::Failed => {
                    let err = DispatchError::read(input.last_error());
                    report_error(stats, subscriber, err);
                    break;
                }
                ReadResult::Filled(n) => n,
            };

            stats.reads += 1;
            if n == 0 {
                trace!("Empty read while bytes reported available");
                break;
            }
            stats.bytes_read += n as u64;
            trace!("Read {} bytes", n);

            decoder.push(buffer.filled(), |frame| {
                match frame.and_then(decode_ascii) {
                    Ok(message) if message.is_empty() => {}
                    Ok(message) => {
                        if let Some(subscriber) = subscriber.as_mut() {
                            stats.messages_delivered += 1;
                            subscriber.received_message(message);
                        }
                    }
                    Err(err) => report_error(&mut *stats, &mut *subscriber, err),
                }
            });
        }
    }

    fn report(&mut self, err: DispatchError) {
        report_error(&mut self.stats, &mut self.subscriber, err);
    }
}

fn report_error<D: Subscriber>(
    stats: &mut DispatchStats,
    subscriber: &mut Option<D>,
    err: DispatchError,
) {
    warn!("{}", err);
    stats.record_error(&err);
    if let Some(subscriber) = subscriber.as_mut() {
        subscriber.dispatch_failed(&err);
    }
}

impl<S: Session, D: Subscriber> Dispatching for StreamDispatcher<S, D> {
    fn connect(&mut self) -> Result<(), DispatchError> {
        StreamDispatcher::connect(self)
    }

    fn close(&mut self) {
        StreamDispatcher::close(self)
    }

    fn send(&mut self, data: &[u8]) -> Result<SendOutcome, DispatchError> {
        StreamDispatcher::send(self, data)
    }
}

impl<S: Session, D: Subscriber> Drop for StreamDispatcher<S, D> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<S: Session, D: Subscriber> fmt::Debug for StreamDispatcher<S, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamDispatcher")
            .field("state", &self.state)
            .field("config", &self.config)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}
