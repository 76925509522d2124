//! # Accessory Stream Dispatcher
//!
//! This crate drives the duplex byte streams of a paired external accessory:
//!
//! - **Stream Contracts**: what the host's input/output handles must provide
//! - **StreamDispatcher**: open/close state machine, drain loop and write classification
//! - **Codec**: explicit framing and single-byte text decoding
//! - **Adapters**: `embedded-io` devices as stream handles
//!
//! ## Architecture
//!
//! ```text
//!                    readiness events (Notifier → mpsc)
//! InputStream ──────────────────────────────┐
//!      │                                    ▼
//!      └── read ──► ReadBuffer ──► FrameDecoder ──► decode_ascii ──► Subscriber
//!
//! OutputStream ◄── write ◄── send()/send_frame()
//! ```
//!
//! ## Execution Model
//!
//! Single-threaded and cooperative. Every call, including subscriber
//! callbacks, happens on the thread that calls `pump()` or awaits `run()`.
//! No I/O outcome is fatal: `send` returns a classified `Result`, and
//! problems found while handling events are logged, counted and passed to
//! [`Subscriber::dispatch_failed`]. Only end-of-stream closes the connection.

pub mod accessory;
pub mod buffer;
pub mod codec;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod io;
pub mod mock;
pub mod stats;
pub mod stream;
pub mod subscriber;

// Re-export main types for convenience
pub use accessory::{Accessory, AccessoryInfo};
pub use codec::{Framing, Message};
pub use config::{DispatcherConfig, MAX_FRAME_LENGTH, MAX_READ_LENGTH};
pub use dispatcher::{DispatchState, Dispatching, SendOutcome, StreamDispatcher};
pub use error::{ConfigError, DispatchError, ErrorKind};
pub use stats::DispatchStats;
pub use stream::{
    Direction, InputStream, Notifier, OutputStream, Readiness, Session, Stream, StreamEvent,
    StreamSession,
};
pub use subscriber::{ChannelSubscriber, NullSubscriber, Subscriber};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
