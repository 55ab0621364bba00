//! INITIALIZE UPDATE command
//!
//! Starts the handshake: sends the host challenge (and optionally a diversifier)
//! and receives the sequence counter, card challenge and card cryptogram.

use keyplug_apdu_core::Command;

use crate::{
    Error, Result,
    constants::{INIT_RESPONSE_COUNTER_OFFSET, INIT_RESPONSE_LEN, cla, initialize_update_p2, ins},
    crypto::{CardChallenge, Cryptogram, Diversifier, HostChallenge, SequenceCounter},
};

/// INITIALIZE UPDATE command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitializeUpdateCommand {
    key_version: u8,
    host_challenge: HostChallenge,
    diversifier: Option<Diversifier>,
}

impl InitializeUpdateCommand {
    /// Create a new INITIALIZE UPDATE command with a host challenge
    pub const fn new(key_version: u8, host_challenge: HostChallenge) -> Self {
        Self {
            key_version,
            host_challenge,
            diversifier: None,
        }
    }

    /// Request authentication against keys diversified with `diversifier`
    pub const fn with_diversifier(mut self, diversifier: Diversifier) -> Self {
        self.diversifier = Some(diversifier);
        self
    }

    /// Host challenge carried by this command
    pub const fn host_challenge(&self) -> &HostChallenge {
        &self.host_challenge
    }

    /// Build the command frame
    pub fn to_command(&self) -> Result<Command> {
        let command = match &self.diversifier {
            None => Command::new(
                cla::GP,
                ins::INITIALIZE_UPDATE,
                self.key_version,
                initialize_update_p2::PLAIN,
            )
            .with_data(self.host_challenge.to_vec())?,
            Some(diversifier) => {
                let mut data = Vec::with_capacity(24);
                data.extend_from_slice(&self.host_challenge);
                data.extend_from_slice(diversifier);
                Command::new(
                    cla::DIVERSIFIED,
                    ins::INITIALIZE_UPDATE,
                    self.key_version,
                    initialize_update_p2::DIVERSIFIED,
                )
                .with_data(data)?
            }
        };
        Ok(command)
    }
}

/// Successful INITIALIZE UPDATE response data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitializeUpdateResponse {
    /// Key diversification data
    pub key_diversification_data: [u8; 10],
    /// Key information: key set version and protocol identifier
    pub key_info: [u8; 2],
    /// Sequence counter
    pub sequence_counter: SequenceCounter,
    /// Card challenge
    pub card_challenge: CardChallenge,
    /// Card cryptogram
    pub card_cryptogram: Cryptogram,
}

impl InitializeUpdateResponse {
    /// Parse the response data (status word already stripped)
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let Some(payload) = payload.get(..INIT_RESPONSE_LEN) else {
            return Err(Error::InvalidLength {
                expected: INIT_RESPONSE_LEN,
                actual: payload.len(),
            });
        };

        let mut response = Self {
            key_diversification_data: Default::default(),
            key_info: Default::default(),
            sequence_counter: Default::default(),
            card_challenge: Default::default(),
            card_cryptogram: Default::default(),
        };

        let counter = INIT_RESPONSE_COUNTER_OFFSET;
        response.key_diversification_data.copy_from_slice(&payload[0..10]);
        response.key_info.copy_from_slice(&payload[10..counter]);
        response.sequence_counter.copy_from_slice(&payload[counter..counter + 2]);
        response.card_challenge.copy_from_slice(&payload[counter + 2..counter + 8]);
        response.card_cryptogram.copy_from_slice(&payload[counter + 8..counter + 16]);

        Ok(response)
    }

    /// Key set version reported by the device
    pub const fn key_version_number(&self) -> u8 {
        self.key_info[0]
    }

    /// Protocol identifier reported by the device
    pub const fn protocol_version(&self) -> u8 {
        self.key_info[1]
    }
}
