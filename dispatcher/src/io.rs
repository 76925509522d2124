//! # embedded-io Adapters
//!
//! Wraps any `embedded-io` device (UART, USB CDC, socket shim) as a stream
//! handle, so the dispatcher can drive hardware that has no native readiness
//! callbacks. Such devices are polled: the host loop calls [`IoInput::poll`]
//! and [`IoOutput::poll`], which probe `ReadReady`/`WriteReady` and emit the
//! matching readiness event.
//!
//! ```text
//! host loop ──► IoInput::poll() ──► read_ready()? ──► HasBytesAvailable ──► pump()
//! ```
//!
//! Device errors are kept as the handle's `last_error` and reported to the
//! dispatcher with the negative-result convention.

use embedded_io::{Read, ReadReady, Write, WriteReady};
use log::trace;

use crate::stream::{InputStream, Notifier, OutputStream, Stream, StreamEvent};

const NOT_OPEN: &str = "stream is not open";

fn describe<E: core::fmt::Debug>(error: &E) -> String {
    format!("{error:?}")
}

/// Input handle over an `embedded-io` reader
#[derive(Debug)]
pub struct IoInput<R> {
    device: R,
    open: bool,
    notifier: Option<Notifier>,
    last_error: Option<String>,
}

impl<R: Read + ReadReady> IoInput<R> {
    pub fn new(device: R) -> Self {
        Self {
            device,
            open: false,
            notifier: None,
            last_error: None,
        }
    }

    pub fn get_ref(&self) -> &R {
        &self.device
    }

    pub fn get_mut(&mut self) -> &mut R {
        &mut self.device
    }

    pub fn into_inner(self) -> R {
        self.device
    }

    /// Probe the device and emit `HasBytesAvailable` (or `ErrorOccurred`)
    ///
    /// Returns whether an event was queued.
    pub fn poll(&mut self) -> bool {
        if !self.open {
            return false;
        }
        let Some(notifier) = self.notifier.as_ref() else {
            return false;
        };
        match self.device.read_ready() {
            Ok(true) => notifier.notify(StreamEvent::HasBytesAvailable),
            Ok(false) => false,
            Err(e) => {
                self.last_error = Some(describe(&e));
                notifier.notify(StreamEvent::ErrorOccurred)
            }
        }
    }
}

impl<R: Read + ReadReady> Stream for IoInput<R> {
    fn open(&mut self) {
        self.open = true;
        if let Some(notifier) = &self.notifier {
            notifier.notify(StreamEvent::OpenCompleted);
        }
    }

    fn close(&mut self) {
        self.open = false;
    }

    fn schedule(&mut self, notifier: Notifier) {
        self.notifier = Some(notifier);
    }

    fn unschedule(&mut self) {
        self.notifier = None;
    }

    fn last_error(&self) -> Option<String> {
        self.last_error.clone()
    }
}

impl<R: Read + ReadReady> InputStream for IoInput<R> {
    fn has_bytes_available(&mut self) -> bool {
        if !self.open {
            return false;
        }
        match self.device.read_ready() {
            Ok(ready) => ready,
            Err(e) => {
                self.last_error = Some(describe(&e));
                false
            }
        }
    }

    fn read(&mut self, buf: &mut [u8]) -> isize {
        if !self.open {
            self.last_error = Some(NOT_OPEN.to_string());
            return -1;
        }
        match self.device.read(buf) {
            Ok(0) if !buf.is_empty() => {
                // embedded-io readers signal end-of-file with a zero-length read
                trace!("Device reached end of input");
                if let Some(notifier) = &self.notifier {
                    notifier.notify(StreamEvent::EndEncountered);
                }
                0
            }
            Ok(n) => n as isize,
            Err(e) => {
                self.last_error = Some(describe(&e));
                -1
            }
        }
    }
}

/// Output handle over an `embedded-io` writer
#[derive(Debug)]
pub struct IoOutput<W> {
    device: W,
    open: bool,
    notifier: Option<Notifier>,
    last_error: Option<String>,
}

impl<W: Write + WriteReady> IoOutput<W> {
    pub fn new(device: W) -> Self {
        Self {
            device,
            open: false,
            notifier: None,
            last_error: None,
        }
    }

    pub fn get_ref(&self) -> &W {
        &self.device
    }

    pub fn get_mut(&mut self) -> &mut W {
        &mut self.device
    }

    pub fn into_inner(self) -> W {
        self.device
    }

    /// Probe the device and emit `HasSpaceAvailable` (or `ErrorOccurred`)
    pub fn poll(&mut self) -> bool {
        if !self.open {
            return false;
        }
        let Some(notifier) = self.notifier.as_ref() else {
            return false;
        };
        match self.device.write_ready() {
            Ok(true) => notifier.notify(StreamEvent::HasSpaceAvailable),
            Ok(false) => false,
            Err(e) => {
                self.last_error = Some(describe(&e));
                notifier.notify(StreamEvent::ErrorOccurred)
            }
        }
    }
}

impl<W: Write + WriteReady> Stream for IoOutput<W> {
    fn open(&mut self) {
        self.open = true;
        if let Some(notifier) = &self.notifier {
            notifier.notify(StreamEvent::OpenCompleted);
        }
    }

    fn close(&mut self) {
        if self.open {
            if let Err(e) = self.device.flush() {
                self.last_error = Some(describe(&e));
            }
        }
        self.open = false;
    }

    fn schedule(&mut self, notifier: Notifier) {
        self.notifier = Some(notifier);
    }

    fn unschedule(&mut self) {
        self.notifier = None;
    }

    fn last_error(&self) -> Option<String> {
        self.last_error.clone()
    }
}

impl<W: Write + WriteReady> OutputStream for IoOutput<W> {
    fn write(&mut self, data: &[u8]) -> isize {
        if !self.open {
            self.last_error = Some(NOT_OPEN.to_string());
            return -1;
        }
        match self.device.write(data) {
            Ok(n) => n as isize,
            Err(e) => {
                self.last_error = Some(describe(&e));
                -1
            }
        }
    }
}
