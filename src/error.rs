//! Crate-level error types.

use std::fmt;

use crate::gpu::context::ContextError;

/// Errors produced by the surge crate.
#[derive(Debug)]
pub enum SurgeError {
    /// Device or staging memory allocation failed.
    Allocation(String),
    /// Malformed kernel byte-code, or bindings that do not match it.
    Compile(String),
    /// Host array length or push-constant layout mismatch.
    SizeMismatch {
        /// Length the target expects.
        expected: usize,
        /// Length the caller provided.
        actual: usize,
    },
    /// A create operation was replayed against an initialized target.
    AlreadyInitialized(String),
    /// Explicit teardown of an object that was already torn down.
    AlreadyDestroyed(String),
    /// Method call on an object after its teardown.
    UseAfterDestroy(String),
    /// Queue index outside the configured queue count.
    InvalidQueue {
        /// The requested queue index.
        index: u32,
        /// Number of queues the manager was configured with.
        available: u32,
    },
    /// Unknown sequence name or unmatched submission handle.
    NotFound(String),
    /// An awaited submission did not complete within its deadline.
    Timeout {
        /// How long the caller waited before giving up.
        waited_ms: u64,
    },
    /// Method called on an object outside the state that permits it.
    InvalidState {
        /// State the call requires.
        expected: &'static str,
        /// State the object was actually in.
        actual: &'static str,
    },
    /// GPU context acquisition or device-level failure.
    Context(ContextError),
    /// TOML options parsing/serialization failure.
    OptionsParse(String),
    /// Generic I/O failure (kernel file or options loading).
    Io(std::io::Error),
}

impl fmt::Display for SurgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Allocation(msg) => write!(f, "allocation failed: {msg}"),
            Self::Compile(msg) => write!(f, "kernel compile error: {msg}"),
            Self::SizeMismatch { expected, actual } => {
                write!(f, "size mismatch: expected {expected}, got {actual}")
            }
            Self::AlreadyInitialized(label) => {
                write!(f, "{label} is already initialized")
            }
            Self::AlreadyDestroyed(label) => {
                write!(f, "{label} was already destroyed")
            }
            Self::UseAfterDestroy(label) => {
                write!(f, "{label} was destroyed and can no longer be used")
            }
            Self::InvalidQueue { index, available } => {
                write!(
                    f,
                    "queue index {index} out of range \
                     ({available} queues configured)"
                )
            }
            Self::NotFound(what) => write!(f, "not found: {what}"),
            Self::Timeout { waited_ms } => {
                write!(f, "GPU wait timed out after {waited_ms} ms")
            }
            Self::InvalidState { expected, actual } => {
                write!(
                    f,
                    "invalid state: expected {expected}, found {actual}"
                )
            }
            Self::Context(e) => write!(f, "GPU context error: {e}"),
            Self::OptionsParse(msg) => {
                write!(f, "options parse error: {msg}")
            }
            Self::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for SurgeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Context(e) => Some(e),
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ContextError> for SurgeError {
    fn from(e: ContextError) -> Self {
        Self::Context(e)
    }
}

impl From<std::io::Error> for SurgeError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names_the_failure() {
        assert_eq!(
            SurgeError::SizeMismatch {
                expected: 4,
                actual: 3
            }
            .to_string(),
            "size mismatch: expected 4, got 3"
        );
        assert_eq!(
            SurgeError::InvalidQueue {
                index: 3,
                available: 2
            }
            .to_string(),
            "queue index 3 out of range (2 queues configured)"
        );
        assert_eq!(
            SurgeError::InvalidState {
                expected: "a recorded sequence",
                actual: "recording"
            }
            .to_string(),
            "invalid state: expected a recorded sequence, found recording"
        );
        assert_eq!(
            SurgeError::Timeout { waited_ms: 250 }.to_string(),
            "GPU wait timed out after 250 ms"
        );
        assert_eq!(
            SurgeError::UseAfterDestroy("tensor-7".to_owned()).to_string(),
            "tensor-7 was destroyed and can no longer be used"
        );
    }

    #[test]
    fn test_source_chains_nested_errors() {
        use std::error::Error as _;
        let io = SurgeError::Io(std::io::Error::other("disk gone"));
        assert!(io.source().is_some());
        assert!(SurgeError::Allocation("oom".to_owned()).source().is_none());
    }
}
