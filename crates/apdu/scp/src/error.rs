use keyplug_apdu_core::{StatusWord, TransportError};
use thiserror::Error;

/// Result type for secure channel operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for secure channel operations
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed key, challenge or frame supplied by the caller
    #[error("Invalid input: {0}")]
    InvalidInput(&'static str),

    /// Wrong data length
    #[error("Invalid length: expected {expected}, got {actual}")]
    InvalidLength {
        /// Expected length
        expected: usize,
        /// Actual length
        actual: usize,
    },

    /// Diversifier is not exactly 16 bytes
    #[error("Invalid diversifier length: {0} (expected 16)")]
    InvalidDiversifier(usize),

    /// Decrypted data does not end with 0x80 followed by zero bytes
    #[error("Invalid padding")]
    PaddingInvalid,

    /// Transport I/O error or timeout
    #[error("Communication failure: {0}")]
    CommunicationFailure(#[from] TransportError),

    /// Frame could not be encoded or the device answered with something that is not a frame
    #[error(transparent)]
    Frame(keyplug_apdu_core::Error),

    /// Card cryptogram mismatch or non-normal status during the handshake
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(&'static str),

    /// Response MAC mismatch
    #[error("Response integrity check failed")]
    ResponseIntegrityFailed,

    /// Response payload could not be decrypted
    #[error("Response decryption failed")]
    ResponseDecryptionFailed,

    /// Device answered a well formed exchange with a non-normal status word
    #[error("Device rejected command: {0}")]
    DeviceRejected(StatusWord),

    /// No secure channel is open
    #[error("Secure channel not open")]
    NotOpen,
}

impl Error {
    /// Whether retrying the operation may succeed
    ///
    /// Communication failures and command rejections are transient. Cryptographic
    /// failures are not: the channel is closed and must be re-authenticated.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::CommunicationFailure(_) | Self::DeviceRejected(_))
    }
}

impl From<keyplug_apdu_core::Error> for Error {
    fn from(error: keyplug_apdu_core::Error) -> Self {
        match error {
            keyplug_apdu_core::Error::Transport(e) => Self::CommunicationFailure(e),
            other => Self::Frame(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(Error::CommunicationFailure(TransportError::Timeout).is_retryable());
        assert!(Error::DeviceRejected(StatusWord::new(0x6A, 0x88)).is_retryable());
        assert!(!Error::ResponseIntegrityFailed.is_retryable());
        assert!(!Error::AuthenticationFailed("card cryptogram mismatch").is_retryable());
        assert!(!Error::NotOpen.is_retryable());
    }

    #[test]
    fn test_transport_error_is_communication_failure() {
        let error: Error = keyplug_apdu_core::Error::Transport(TransportError::Transmission).into();
        assert!(matches!(error, Error::CommunicationFailure(TransportError::Transmission)));

        let error: Error = keyplug_apdu_core::Error::DataTooLong(300).into();
        assert!(matches!(error, Error::Frame(_)));
    }
}
