//! Session management for the secure channel
//!
//! This module provides the Session type that derives the session keys from a
//! static key set and checks the card cryptogram.

use std::fmt;

use subtle::ConstantTimeEq;
use zeroize::Zeroize;

use crate::{
    Error, Result,
    commands::InitializeUpdateResponse,
    constants::derivation,
    crypto::{
        CardChallenge, Cryptogram, HostChallenge, KeyBytes, SequenceCounter, card_cryptogram,
        host_cryptogram, kcv, session_key,
    },
    keyset::Keyset,
};

/// Keys derived for one secure channel session
#[derive(Clone, PartialEq, Eq, Zeroize)]
#[zeroize(drop)]
pub struct SessionKeys {
    s_enc: KeyBytes,
    r_enc: KeyBytes,
    c_mac: KeyBytes,
    r_mac: KeyBytes,
    dek: KeyBytes,
}

impl SessionKeys {
    /// Derive the five session keys from a static key set and the sequence counter
    pub fn derive(counter: &SequenceCounter, keyset: &Keyset) -> Self {
        Self {
            s_enc: session_key(counter, &derivation::S_ENC, keyset.enc()),
            r_enc: session_key(counter, &derivation::R_ENC, keyset.enc()),
            c_mac: session_key(counter, &derivation::C_MAC, keyset.mac()),
            r_mac: session_key(counter, &derivation::R_MAC, keyset.mac()),
            dek: session_key(counter, &derivation::DEK, keyset.dek()),
        }
    }

    /// Command encryption key
    pub const fn s_enc(&self) -> &KeyBytes {
        &self.s_enc
    }

    /// Response encryption key
    pub const fn r_enc(&self) -> &KeyBytes {
        &self.r_enc
    }

    /// Command MAC key
    pub const fn c_mac(&self) -> &KeyBytes {
        &self.c_mac
    }

    /// Response MAC key
    pub const fn r_mac(&self) -> &KeyBytes {
        &self.r_mac
    }

    /// Data encryption key
    pub const fn dek(&self) -> &KeyBytes {
        &self.dek
    }
}

impl fmt::Debug for SessionKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionKeys")
            .field("kcv_s_enc", &hex::encode(kcv(&self.s_enc)))
            .field("kcv_r_enc", &hex::encode(kcv(&self.r_enc)))
            .field("kcv_c_mac", &hex::encode(kcv(&self.c_mac)))
            .field("kcv_r_mac", &hex::encode(kcv(&self.r_mac)))
            .field("kcv_dek", &hex::encode(kcv(&self.dek)))
            .finish()
    }
}

/// Handshake state between INITIALIZE UPDATE and EXTERNAL AUTHENTICATE
#[derive(Debug, Clone)]
pub struct Session {
    keys: SessionKeys,
    host_challenge: HostChallenge,
    card_challenge: CardChallenge,
    sequence_counter: SequenceCounter,
}

impl Session {
    /// Create a new session from an initialization response
    ///
    /// Derives the session keys and verifies the card cryptogram. A mismatch
    /// fails with [`Error::AuthenticationFailed`].
    pub fn new(
        keyset: &Keyset,
        init_response: &InitializeUpdateResponse,
        host_challenge: HostChallenge,
    ) -> Result<Self> {
        let sequence_counter = init_response.sequence_counter;
        let card_challenge = init_response.card_challenge;
        let keys = SessionKeys::derive(&sequence_counter, keyset);

        let expected = card_cryptogram(
            &host_challenge,
            &card_challenge,
            &sequence_counter,
            keys.s_enc(),
        );
        if !bool::from(expected[..].ct_eq(&init_response.card_cryptogram[..])) {
            return Err(Error::AuthenticationFailed("card cryptogram mismatch"));
        }

        Ok(Self {
            keys,
            host_challenge,
            card_challenge,
            sequence_counter,
        })
    }

    /// Cryptogram proving the host holds the same keys
    pub fn host_cryptogram(&self) -> Cryptogram {
        host_cryptogram(
            &self.host_challenge,
            &self.card_challenge,
            &self.sequence_counter,
            self.keys.s_enc(),
        )
    }

    /// Get the session keys
    pub const fn keys(&self) -> &SessionKeys {
        &self.keys
    }

    /// Consume the session, keeping only its keys
    pub fn into_keys(self) -> SessionKeys {
        self.keys
    }

    /// Get the sequence counter
    pub const fn sequence_counter(&self) -> &SequenceCounter {
        &self.sequence_counter
    }

    /// Get the card challenge
    pub const fn card_challenge(&self) -> &CardChallenge {
        &self.card_challenge
    }
}
