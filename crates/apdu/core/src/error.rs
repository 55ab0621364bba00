//! Error types for frame encoding and decoding
//!
//! Codec errors are caller errors: they are raised before any byte reaches the
//! transport, or when the transport hands back something that is not a frame.

use crate::transport::TransportError;

/// Result type for frame codec operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the frame codec
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Raw command is shorter than a header or longer than the largest short frame
    #[error("Invalid command length: {0}")]
    InvalidCommandLength(usize),

    /// Declared Lc does not match the number of data bytes that follow the header
    #[error("Lc mismatch: declared {declared}, found {actual} data bytes")]
    LengthMismatch {
        /// Lc byte found in the header
        declared: usize,
        /// Data bytes actually present
        actual: usize,
    },

    /// Data field does not fit in a one byte Lc
    #[error("Data too long: {0} bytes (max 255)")]
    DataTooLong(usize),

    /// Raw response is missing its status word or carries more than 255 data bytes
    #[error("Invalid response length: {0}")]
    InvalidResponseLength(usize),

    /// Transport-related errors
    #[error(transparent)]
    Transport(#[from] TransportError),
}
