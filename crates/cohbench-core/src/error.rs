//! Error types for the coherence benchmark

use core::time::Duration;

use thiserror::Error;

/// Result type for protocol operations
pub type CohResult<T> = Result<T, CohError>;

/// Errors raised by the protocol layers.
///
/// None of these abort a sweep except `ClockStalled`, which is fatal at
/// startup. A `Timeout` marks one packet failed and the run continues.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CohError {
    /// The Responder did not reach the awaited status in time
    #[error("timed out after {elapsed:?} waiting for {waiting_for}")]
    Timeout {
        waiting_for: &'static str,
        elapsed: Duration,
    },

    /// Packet larger than the payload area
    #[error("payload of {size} bytes exceeds the {max}-byte payload area")]
    PayloadTooLarge { size: usize, max: usize },

    /// Two counter samples a known delay apart were equal
    #[error("free-running counter is not advancing (read {first:#010x} then {second:#010x})")]
    ClockStalled { first: u32, second: u32 },

    /// Layout offsets overlap or are misaligned
    #[error("invalid region layout: {0}")]
    InvalidLayout(&'static str),

    /// The mapped window is smaller than the layout requires
    #[error("shared window is {actual} bytes, layout requires {required}")]
    RegionTooSmall { required: usize, actual: usize },
}

impl CohError {
    /// `true` for errors that only fail the current packet.
    pub fn is_per_packet(&self) -> bool {
        matches!(self, CohError::Timeout { .. } | CohError::PayloadTooLarge { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let e = CohError::PayloadTooLarge { size: 5000, max: 4096 };
        assert_eq!(
            e.to_string(),
            "payload of 5000 bytes exceeds the 4096-byte payload area"
        );

        let e = CohError::ClockStalled { first: 7, second: 7 };
        assert!(e.to_string().contains("0x00000007"));
    }

    #[test]
    fn test_per_packet() {
        let t = CohError::Timeout {
            waiting_for: "Done",
            elapsed: Duration::from_millis(10),
        };
        assert!(t.is_per_packet());
        assert!(!CohError::ClockStalled { first: 0, second: 0 }.is_per_packet());
    }
}
