//! # Scripted Test Doubles
//!
//! In-memory stream handles and a recording subscriber. Each double is a
//! cheap handle over shared state, so a test keeps one clone for scripting
//! and inspection while the dispatcher owns the other.
//!
//! ```rust
//! use accessory_dispatcher::mock::{MockInput, MockOutput, RecordingSubscriber};
//! use accessory_dispatcher::{StreamDispatcher, StreamSession};
//! use accessory_dispatcher::stream::StreamEvent;
//!
//! let input = MockInput::new();
//! let recorder = RecordingSubscriber::new();
//! let session = StreamSession::new(input.clone(), MockOutput::new());
//! let mut dispatcher = StreamDispatcher::new(session, Some(recorder.clone()));
//!
//! dispatcher.connect().unwrap();
//! input.push(b"hello");
//! input.emit(StreamEvent::HasBytesAvailable);
//! dispatcher.pump();
//!
//! assert_eq!(recorder.messages(), vec!["hello"]);
//! ```

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::codec::Message;
use crate::error::DispatchError;
use crate::stream::{InputStream, Notifier, OutputStream, Stream, StreamEvent};
use crate::subscriber::Subscriber;

#[derive(Debug)]
enum Scripted {
    Data(Vec<u8>),
    Error(String),
}

#[derive(Debug, Default)]
struct InputState {
    script: VecDeque<Scripted>,
    open: bool,
    open_calls: usize,
    close_calls: usize,
    read_calls: usize,
    notifier: Option<Notifier>,
    last_error: Option<String>,
}

/// Input stream that serves scripted chunks and errors in order
#[derive(Debug, Clone, Default)]
pub struct MockInput {
    state: Rc<RefCell<InputState>>,
}

impl MockInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue bytes; a chunk larger than the reader's buffer is served over several reads
    pub fn push(&self, bytes: &[u8]) {
        self.state
            .borrow_mut()
            .script
            .push_back(Scripted::Data(bytes.to_vec()));
    }

    /// Queue a failing read that records `reason` as the last error
    pub fn push_error(&self, reason: &str) {
        self.state
            .borrow_mut()
            .script
            .push_back(Scripted::Error(reason.to_string()));
    }

    /// Record `reason` as the last error without queueing a read
    pub fn set_last_error(&self, reason: &str) {
        self.state.borrow_mut().last_error = Some(reason.to_string());
    }

    /// Deliver `event` to the registered listener, if any
    pub fn emit(&self, event: StreamEvent) -> bool {
        let notifier = self.state.borrow().notifier.clone();
        notifier.is_some_and(|n| n.notify(event))
    }

    pub fn is_open(&self) -> bool {
        self.state.borrow().open
    }

    pub fn is_scheduled(&self) -> bool {
        self.state.borrow().notifier.is_some()
    }

    pub fn open_calls(&self) -> usize {
        self.state.borrow().open_calls
    }

    pub fn close_calls(&self) -> usize {
        self.state.borrow().close_calls
    }

    pub fn read_calls(&self) -> usize {
        self.state.borrow().read_calls
    }
}

impl Stream for MockInput {
    fn open(&mut self) {
        let mut state = self.state.borrow_mut();
        state.open = true;
        state.open_calls += 1;
    }

    fn close(&mut self) {
        let mut state = self.state.borrow_mut();
        state.open = false;
        state.close_calls += 1;
    }

    fn schedule(&mut self, notifier: Notifier) {
        self.state.borrow_mut().notifier = Some(notifier);
    }

    fn unschedule(&mut self) {
        self.state.borrow_mut().notifier = None;
    }

    fn last_error(&self) -> Option<String> {
        self.state.borrow().last_error.clone()
    }
}

impl InputStream for MockInput {
    fn has_bytes_available(&mut self) -> bool {
        !self.state.borrow().script.is_empty()
    }

    fn read(&mut self, buf: &mut [u8]) -> isize {
        let mut state = self.state.borrow_mut();
        state.read_calls += 1;
        match state.script.pop_front() {
            Some(Scripted::Data(mut data)) => {
                let n = data.len().min(buf.len());
                buf[..n].copy_from_slice(&data[..n]);
                if n < data.len() {
                    let rest = data.split_off(n);
                    state.script.push_front(Scripted::Data(rest));
                }
                n as isize
            }
            Some(Scripted::Error(reason)) => {
                state.last_error = Some(reason);
                -1
            }
            None => 0,
        }
    }
}

#[derive(Debug, Default)]
struct OutputState {
    results: VecDeque<isize>,
    writes: Vec<Vec<u8>>,
    open: bool,
    open_calls: usize,
    close_calls: usize,
    notifier: Option<Notifier>,
    last_error: Option<String>,
}

/// Output stream that records every write and returns scripted results
///
/// Without a scripted result a write accepts the whole slice.
#[derive(Debug, Clone, Default)]
pub struct MockOutput {
    state: Rc<RefCell<OutputState>>,
}

impl MockOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Result for the next unscripted write
    pub fn script_result(&self, result: isize) {
        self.state.borrow_mut().results.push_back(result);
    }

    pub fn set_last_error(&self, reason: &str) {
        self.state.borrow_mut().last_error = Some(reason.to_string());
    }

    pub fn emit(&self, event: StreamEvent) -> bool {
        let notifier = self.state.borrow().notifier.clone();
        notifier.is_some_and(|n| n.notify(event))
    }

    /// Every slice passed to `write`, in call order
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.state.borrow().writes.clone()
    }

    pub fn is_open(&self) -> bool {
        self.state.borrow().open
    }

    pub fn is_scheduled(&self) -> bool {
        self.state.borrow().notifier.is_some()
    }

    pub fn open_calls(&self) -> usize {
        self.state.borrow().open_calls
    }

    pub fn close_calls(&self) -> usize {
        self.state.borrow().close_calls
    }
}

impl Stream for MockOutput {
    fn open(&mut self) {
        let mut state = self.state.borrow_mut();
        state.open = true;
        state.open_calls += 1;
    }

    fn close(&mut self) {
        let mut state = self.state.borrow_mut();
        state.open = false;
        state.close_calls += 1;
    }

    fn schedule(&mut self, notifier: Notifier) {
        self.state.borrow_mut().notifier = Some(notifier);
    }

    fn unschedule(&mut self) {
        self.state.borrow_mut().notifier = None;
    }

    fn last_error(&self) -> Option<String> {
        self.state.borrow().last_error.clone()
    }
}

impl OutputStream for MockOutput {
    fn write(&mut self, data: &[u8]) -> isize {
        let mut state = self.state.borrow_mut();
        state.writes.push(data.to_vec());
        state
            .results
            .pop_front()
            .unwrap_or(data.len() as isize)
    }
}

#[derive(Debug, Default)]
struct Recorded {
    messages: Vec<Message>,
    errors: Vec<DispatchError>,
    space_available: usize,
}

/// Subscriber that remembers every callback
#[derive(Debug, Clone, Default)]
pub struct RecordingSubscriber {
    recorded: Rc<RefCell<Recorded>>,
}

impl RecordingSubscriber {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.recorded
            .borrow()
            .messages
            .iter()
            .map(|m| m.to_string())
            .collect()
    }

    pub fn errors(&self) -> Vec<DispatchError> {
        self.recorded.borrow().errors.clone()
    }

    pub fn space_available_calls(&self) -> usize {
        self.recorded.borrow().space_available
    }
}

impl Subscriber for RecordingSubscriber {
    fn received_message(&mut self, message: Message) {
        self.recorded.borrow_mut().messages.push(message);
    }

    fn space_available(&mut self) {
        self.recorded.borrow_mut().space_available += 1;
    }

    fn dispatch_failed(&mut self, error: &DispatchError) {
        self.recorded.borrow_mut().errors.push(error.clone());
    }
}
