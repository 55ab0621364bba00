//! Secure channel engine
//!
//! This module provides the [`SecureChannel`] type that runs the mutual
//! authentication handshake over a [`CardTransport`] and then protects every
//! exchanged frame according to the negotiated [`SecurityLevel`].

use std::fmt;

use bytes::Bytes;
use keyplug_apdu_core::{CardTransport, Command, Response};
use rand::RngCore;
use subtle::ConstantTimeEq;
use tracing::{debug, trace, warn};

use crate::{
    Error, Result,
    commands::{
        ExternalAuthenticateCommand, InitializeUpdateCommand, InitializeUpdateResponse,
        PutKeyCommand, PutKeyMode,
    },
    config::ChannelConfig,
    constants::{MAC_LEN, RESET_FRAME, cla, ins},
    crypto::{
        ChannelMac, HostChallenge, MacDirection, decrypt_payload, encrypt_payload, retail_mac,
    },
    keyset::{Keyset, check_diversifier},
    security::SecurityLevel,
    session::{Session, SessionKeys},
};

/// Cryptographic state of an open channel
struct ChannelState {
    keys: SessionKeys,
    level: SecurityLevel,
    /// Last command MAC, `None` until the first command is wrapped
    c_mac: Option<ChannelMac>,
    /// Last response MAC
    r_mac: Option<ChannelMac>,
}

impl ChannelState {
    /// State used while the handshake is running: no protection yet, empty chains
    fn handshake(keys: SessionKeys) -> Self {
        Self {
            keys,
            level: SecurityLevel::NONE,
            c_mac: None,
            r_mac: None,
        }
    }

    /// Switch to the negotiated level once EXTERNAL AUTHENTICATE succeeded
    ///
    /// Response MAC chaining starts from the last command MAC.
    fn open(&mut self, level: SecurityLevel) {
        self.r_mac = self.c_mac;
        self.level = level;
    }

    /// Protect an outbound command
    ///
    /// EXTERNAL AUTHENTICATE always carries a C-MAC and is never encrypted.
    fn wrap_command(&mut self, command: &Command) -> Result<Command> {
        let is_auth = command.is(cla::GP, ins::EXTERNAL_AUTHENTICATE);
        let add_mac = self.level.contains(SecurityLevel::C_MAC) || is_auth;

        let mut data = if self.level.contains(SecurityLevel::C_DEC) && !is_auth {
            encrypt_payload(command.data(), self.keys.s_enc())
        } else {
            command.data().to_vec()
        };

        let wrapped_len = data.len() + if add_mac { MAC_LEN } else { 0 };
        if wrapped_len > keyplug_apdu_core::command::MAX_DATA_LEN {
            return Err(Error::InvalidInput("wrapped command data exceeds 255 bytes"));
        }

        let mut class = command.class();
        if add_mac {
            class |= cla::SECURE_MESSAGING;

            // MAC covers the header with the final Lc and the plaintext data
            let mut mac_input = Vec::with_capacity(5 + command.data().len());
            mac_input.extend_from_slice(&[
                class,
                command.instruction(),
                command.p1(),
                command.p2(),
                (command.data().len() + MAC_LEN) as u8,
            ]);
            mac_input.extend_from_slice(command.data());

            let mac = retail_mac(
                &mac_input,
                self.keys.c_mac(),
                self.c_mac.as_ref(),
                MacDirection::Command,
            );
            trace!(direction = %MacDirection::Command, "Chained command MAC");
            data.extend_from_slice(&mac);
            self.c_mac = Some(mac);
        }

        Ok(Command::new(class, command.instruction(), command.p1(), command.p2()).with_data(data)?)
    }

    /// Verify and decrypt an inbound response to `command` as it was before wrapping
    fn unwrap_response(&mut self, command: &Command, raw: &[u8]) -> Result<Response> {
        let response = Response::from_bytes(raw)?;
        let status = response.status();
        let payload = response.payload();

        match (
            self.level.contains(SecurityLevel::R_MAC),
            self.level.contains(SecurityLevel::R_ENC),
        ) {
            (true, r_enc) => {
                let Some(split) = payload.len().checked_sub(MAC_LEN) else {
                    return Err(Error::ResponseIntegrityFailed);
                };
                let (body, received) = payload.split_at(split);

                let clear = if r_enc && !body.is_empty() {
                    decrypt_response(body, self.keys.r_enc())?
                } else {
                    body.to_vec()
                };

                let mut mac_input = command.to_bytes().to_vec();
                mac_input.push(clear.len() as u8);
                mac_input.extend_from_slice(&clear);
                mac_input.extend_from_slice(&status.to_bytes());

                let expected = retail_mac(
                    &mac_input,
                    self.keys.r_mac(),
                    self.r_mac.as_ref(),
                    MacDirection::Response,
                );
                if !bool::from(expected[..].ct_eq(received)) {
                    return Err(Error::ResponseIntegrityFailed);
                }
                self.r_mac = Some(expected);

                Ok(Response::new(clear, status))
            }
            (false, true) if !payload.is_empty() => {
                Ok(Response::new(decrypt_response(payload, self.keys.r_enc())?, status))
            }
            _ => Ok(response),
        }
    }
}

/// Secure channel over a card transport
///
/// Starts closed. [`SecureChannel::authenticate`] opens it; any integrity or
/// decryption failure, transport failure or [`SecureChannel::deauthenticate`]
/// closes it again and wipes the session keys.
pub struct SecureChannel<T: CardTransport> {
    transport: T,
    config: ChannelConfig,
    state: Option<ChannelState>,
}

impl<T: CardTransport> fmt::Debug for SecureChannel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecureChannel")
            .field("transport", &self.transport)
            .field("config", &self.config)
            .field("open", &self.is_open())
            .field("security_level", &self.security_level())
            .finish()
    }
}

impl<T: CardTransport> SecureChannel<T> {
    /// Create a closed secure channel with the default configuration
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, ChannelConfig::default())
    }

    /// Create a closed secure channel with a custom configuration
    pub const fn with_config(transport: T, config: ChannelConfig) -> Self {
        Self {
            transport,
            config,
            state: None,
        }
    }

    /// Run the mutual authentication handshake and open the channel
    ///
    /// Any open channel is closed first. [`SecurityLevel::C_MAC`] is always
    /// added to `level`. A random host challenge is generated unless one is
    /// given. With a `diversifier` the device authenticates against its
    /// diversified keys, so `keyset` must already be diversified (see
    /// [`compute_diversified_keys`](crate::compute_diversified_keys)).
    pub fn authenticate(
        &mut self,
        keyset: &Keyset,
        level: SecurityLevel,
        diversifier: Option<&[u8]>,
        host_challenge: Option<HostChallenge>,
    ) -> Result<()> {
        let diversifier = diversifier.map(check_diversifier).transpose()?;

        self.deauthenticate();

        let level = level | SecurityLevel::C_MAC;
        let host_challenge = host_challenge.unwrap_or_else(random_challenge);

        let mut init = InitializeUpdateCommand::new(keyset.version(), host_challenge);
        if let Some(diversifier) = diversifier {
            init = init.with_diversifier(*diversifier);
        }

        debug!(
            key_version = keyset.version(),
            diversified = diversifier.is_some(),
            %level,
            "Starting secure channel handshake"
        );

        let response = self.transmit(&init.to_command()?)?;
        if !response.is_success() {
            warn!(status = %response.status(), "INITIALIZE UPDATE rejected");
            return Err(Error::AuthenticationFailed("INITIALIZE UPDATE rejected"));
        }

        let init_response = InitializeUpdateResponse::parse(response.payload())
            .map_err(|_| Error::AuthenticationFailed("malformed INITIALIZE UPDATE response"))?;
        trace!(
            counter = %hex::encode(init_response.sequence_counter),
            card_challenge = %hex::encode(init_response.card_challenge),
            "INITIALIZE UPDATE accepted"
        );

        let session = Session::new(keyset, &init_response, host_challenge).inspect_err(|_| {
            warn!("Card cryptogram verification failed");
        })?;

        let auth = ExternalAuthenticateCommand::new(level, session.host_cryptogram());
        let mut state = ChannelState::handshake(session.into_keys());
        let wrapped = state.wrap_command(&auth.to_command()?)?;

        let response = self.transmit(&wrapped)?;
        if !response.is_success() {
            warn!(status = %response.status(), "EXTERNAL AUTHENTICATE rejected");
            return Err(Error::AuthenticationFailed("EXTERNAL AUTHENTICATE rejected"));
        }

        state.open(level);
        self.state = Some(state);
        debug!(%level, "Secure channel open");

        Ok(())
    }

    /// Open the channel at the configured default level with a random challenge
    pub fn open(&mut self, keyset: &Keyset) -> Result<()> {
        self.authenticate(keyset, self.config.default_level, None, None)
    }

    /// Wrap, transmit and unwrap one command
    ///
    /// The returned response carries the clear payload and the device status
    /// word, successful or not. Fails with [`Error::NotOpen`] when closed.
    pub fn exchange(&mut self, command: &Command) -> Result<Response> {
        let state = self.state.as_mut().ok_or(Error::NotOpen)?;
        trace!(
            ins = command.instruction(),
            p1 = command.p1(),
            p2 = command.p2(),
            data_len = command.data().len(),
            level = %state.level,
            "Wrapping command"
        );
        let wrapped = state.wrap_command(command)?;

        let raw = match self.transport.transmit_raw(&wrapped.to_bytes()) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "Transport failure, closing secure channel");
                self.state = None;
                return Err(e.into());
            }
        };

        let unwrapped = match self.state.as_mut() {
            Some(state) => state.unwrap_response(command, &raw),
            None => Err(Error::NotOpen),
        };

        match unwrapped {
            Ok(response) => Ok(response),
            Err(e) => {
                warn!(error = %e, "Response rejected, closing secure channel");
                self.deauthenticate();
                Err(e)
            }
        }
    }

    /// Exchange a command and return its payload
    ///
    /// A non-normal status word fails with [`Error::DeviceRejected`]; the
    /// channel stays open.
    pub fn exchange_data(&mut self, command: &Command) -> Result<Bytes> {
        let response = self.exchange(command)?;
        if !response.is_success() {
            debug!(status = %response.status(), "Command rejected by device");
            return Err(Error::DeviceRejected(response.status()));
        }
        Ok(response.into_payload())
    }

    /// Close the channel
    ///
    /// When the channel is open and `reset_on_close` is set, the reset frame is
    /// sent first; its outcome is ignored. Does nothing when already closed.
    pub fn deauthenticate(&mut self) {
        let Some(state) = self.state.take() else {
            return;
        };

        if self.config.reset_on_close {
            match self.transport.transmit_raw(&RESET_FRAME) {
                Ok(response) => {
                    debug!(response = %hex::encode(&response), "Reset frame sent");
                }
                Err(e) => debug!(error = %e, "Reset frame failed"),
            }
        }

        drop(state);
        debug!("Secure channel closed");
    }

    /// Build a PUT KEY command for `keyset` with the current session DEK
    pub fn put_key_command(
        &self,
        keyset: &Keyset,
        self_parent: bool,
        mode: PutKeyMode,
    ) -> Result<Command> {
        let state = self.state.as_ref().ok_or(Error::NotOpen)?;
        PutKeyCommand::new(keyset)
            .self_parent(self_parent)
            .mode(mode)
            .to_command(state.keys.dek())
    }

    /// Whether the channel is open
    pub const fn is_open(&self) -> bool {
        self.state.is_some()
    }

    /// Negotiated security level, [`SecurityLevel::NONE`] when closed
    pub fn security_level(&self) -> SecurityLevel {
        self.state
            .as_ref()
            .map_or(SecurityLevel::NONE, |state| state.level)
    }

    /// Session keys of the open channel
    pub fn session_keys(&self) -> Option<&SessionKeys> {
        self.state.as_ref().map(|state| &state.keys)
    }

    /// Channel configuration
    pub const fn config(&self) -> &ChannelConfig {
        &self.config
    }

    /// Get a reference to the transport
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Get a mutable reference to the transport
    ///
    /// Frames sent directly bypass the MAC chains and will desynchronize an
    /// open channel.
    pub const fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Consume the channel and return the transport, wiping any session state
    pub fn into_inner(self) -> T {
        self.transport
    }

    /// Send an unprotected command during the handshake
    fn transmit(&mut self, command: &Command) -> Result<Response> {
        let raw = self.transport.transmit_raw(&command.to_bytes())?;
        Ok(Response::from_bytes(&raw)?)
    }
}

fn decrypt_response(body: &[u8], r_enc: &crate::crypto::KeyBytes) -> Result<Vec<u8>> {
    decrypt_payload(body, r_enc).map_err(|_| Error::ResponseDecryptionFailed)
}

fn random_challenge() -> HostChallenge {
    let mut challenge = HostChallenge::default();
    rand::rng().fill_bytes(&mut challenge);
    challenge
}
