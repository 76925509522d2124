//! Subscriber (delegate) boundary

use log::trace;
use tokio::sync::mpsc::UnboundedSender;

use crate::codec::Message;
use crate::error::DispatchError;

/// Consumer of decoded messages
///
/// All callbacks run synchronously on the thread driving the dispatcher,
/// in delivery order.
pub trait Subscriber {
    /// One decoded, non-empty message
    fn received_message(&mut self, message: Message);

    /// The output stream can accept more bytes
    fn space_available(&mut self) {}

    /// A non-fatal error was observed while handling readiness events
    fn dispatch_failed(&mut self, _error: &DispatchError) {}
}

impl<F> Subscriber for F
where
    F: FnMut(Message),
{
    fn received_message(&mut self, message: Message) {
        self(message)
    }
}

/// Subscriber that drops every message
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSubscriber;

impl Subscriber for NullSubscriber {
    fn received_message(&mut self, _message: Message) {}
}

/// Forwards messages into an unbounded channel
#[derive(Debug, Clone)]
pub struct ChannelSubscriber {
    tx: UnboundedSender<Message>,
}

impl ChannelSubscriber {
    pub fn new(tx: UnboundedSender<Message>) -> Self {
        Self { tx }
    }
}

impl Subscriber for ChannelSubscriber {
    fn received_message(&mut self, message: Message) {
        if self.tx.send(message).is_err() {
            trace!("Message channel closed, dropping message");
        }
    }
}
