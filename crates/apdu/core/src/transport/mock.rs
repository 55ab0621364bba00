use std::collections::VecDeque;

use bytes::Bytes;

use super::{CardTransport, TransportError};

/// In-memory transport replaying queued responses
///
/// Every transmitted frame is recorded. When the queue is exhausted the next
/// exchange fails with [`TransportError::Transmission`].
#[derive(Debug, Default)]
pub struct MockTransport {
    responses: VecDeque<Result<Bytes, TransportError>>,
    commands: Vec<Bytes>,
    resets: usize,
}

impl MockTransport {
    /// Create a new mock transport with the given responses
    pub fn new<I, B>(responses: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<Bytes>,
    {
        Self {
            responses: responses.into_iter().map(|r| Ok(r.into())).collect(),
            ..Default::default()
        }
    }

    /// Queue a response
    pub fn push_response(&mut self, response: impl Into<Bytes>) -> &mut Self {
        self.responses.push_back(Ok(response.into()));
        self
    }

    /// Queue a transport failure
    pub fn push_error(&mut self, error: TransportError) -> &mut Self {
        self.responses.push_back(Err(error));
        self
    }

    /// Frames transmitted so far
    pub fn commands(&self) -> &[Bytes] {
        &self.commands
    }

    /// Number of queued responses not yet consumed
    pub fn pending(&self) -> usize {
        self.responses.len()
    }

    /// Number of times [`CardTransport::reset`] was called
    pub const fn resets(&self) -> usize {
        self.resets
    }
}

impl CardTransport for MockTransport {
    fn do_transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, TransportError> {
        self.commands.push(Bytes::copy_from_slice(command));
        self.responses
            .pop_front()
            .unwrap_or(Err(TransportError::Transmission))
    }

    fn reset(&mut self) -> Result<(), TransportError> {
        self.resets += 1;
        Ok(())
    }
}
