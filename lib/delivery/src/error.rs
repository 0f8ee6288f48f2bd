//! Error types for outbound delivery.
//!
//! These are plain values rather than reports: a delivery outcome is handed
//! to whoever awaits it, and the last send error travels inside the terminal
//! failure.

use std::fmt;

/// A single send attempt failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendError {
    /// There is no live connection to send on.
    NotConnected,
    /// The transport rejected or failed the send.
    Failed { reason: String },
}

impl fmt::Display for SendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotConnected => write!(f, "not connected"),
            Self::Failed { reason } => write!(f, "send failed: {reason}"),
        }
    }
}

impl std::error::Error for SendError {}

/// Terminal failure of a queued delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// The queue was full when the item was submitted.
    QueueFull { capacity: usize },
    /// Every attempt failed.
    RetriesExhausted { attempts: u32, last_error: SendError },
    /// The queue was closed before the item was delivered.
    Closed,
}

impl fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::QueueFull { capacity } => {
                write!(f, "delivery queue is full ({capacity} items waiting)")
            }
            Self::RetriesExhausted {
                attempts,
                last_error,
            } => write!(f, "delivery failed after {attempts} attempts: {last_error}"),
            Self::Closed => write!(f, "delivery queue is closed"),
        }
    }
}

impl std::error::Error for DeliveryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::RetriesExhausted { last_error, .. } => Some(last_error),
            _ => None,
        }
    }
}

/// Errors from the rate limiter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitError {
    /// More tokens were requested than the bucket can ever hold.
    ExceedsCapacity { requested: u32, capacity: u32 },
}

impl fmt::Display for RateLimitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExceedsCapacity {
                requested,
                capacity,
            } => write!(
                f,
                "requested {requested} tokens but bucket capacity is {capacity}"
            ),
        }
    }
}

impl std::error::Error for RateLimitError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn exhausted_carries_last_error() {
        let err = DeliveryError::RetriesExhausted {
            attempts: 4,
            last_error: SendError::Failed {
                reason: "timeout".to_string(),
            },
        };
        assert_eq!(
            err.to_string(),
            "delivery failed after 4 attempts: send failed: timeout"
        );
        assert!(err.source().is_some());
    }

    #[test]
    fn queue_full_display() {
        let err = DeliveryError::QueueFull { capacity: 5000 };
        assert!(err.to_string().contains("5000"));
    }
}
