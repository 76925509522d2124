//! Dispatch statistics

use serde::Serialize;

use crate::error::{DispatchError, ErrorKind};

/// Counters kept by a dispatcher over its lifetime
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DispatchStats {
    /// Total bytes read from the input stream
    pub bytes_read: u64,
    /// Total bytes accepted by the output stream
    pub bytes_written: u64,
    /// Number of read calls that did not fail, including empty reads
    pub reads: u64,
    /// Number of write calls issued
    pub writes: u64,
    /// Messages handed to the subscriber
    pub messages_delivered: u64,
    pub partial_writes: u64,
    pub read_errors: u64,
    pub write_errors: u64,
    pub capacity_exhausted: u64,
    pub decode_failures: u64,
    pub framing_errors: u64,
    pub stream_errors: u64,
}

impl DispatchStats {
    /// Count a reported error under its kind
    pub(crate) fn record_error(&mut self, error: &DispatchError) {
        match error.kind() {
            ErrorKind::ReadError => self.read_errors += 1,
            ErrorKind::WriteError => self.write_errors += 1,
            ErrorKind::CapacityExhausted => self.capacity_exhausted += 1,
            ErrorKind::DecodeFailure => self.decode_failures += 1,
            ErrorKind::FramingError => self.framing_errors += 1,
            ErrorKind::StreamError => self.stream_errors += 1,
            ErrorKind::ConnectionEnded | ErrorKind::InvalidState => {}
        }
    }

    /// JSON snapshot for host-side diagnostics
    pub fn to_json(&self) -> String {
        // A struct of plain integers always serializes
        serde_json::to_string(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_error_by_kind() {
        let mut stats = DispatchStats::default();
        stats.record_error(&DispatchError::read(None));
        stats.record_error(&DispatchError::Decode {
            position: 0,
            byte: 0xff,
        });
        stats.record_error(&DispatchError::ConnectionEnded);

        assert_eq!(stats.read_errors, 1);
        assert_eq!(stats.decode_failures, 1);
        assert_eq!(stats.write_errors, 0);
    }

    #[test]
    fn test_to_json() {
        let stats = DispatchStats {
            bytes_read: 5,
            messages_delivered: 1,
            ..Default::default()
        };
        let json: serde_json::Value = serde_json::from_str(&stats.to_json()).unwrap();
        assert_eq!(json["bytes_read"], 5);
        assert_eq!(json["messages_delivered"], 1);
        assert_eq!(json["write_errors"], 0);
    }
}
