//! EXTERNAL AUTHENTICATE command
//!
//! Completes the handshake by proving the host holds the session keys. The
//! frame is always sent with a C-MAC, whatever level it requests.

use keyplug_apdu_core::Command;

use crate::{
    Result,
    constants::{cla, ins},
    crypto::Cryptogram,
    security::SecurityLevel,
};

/// EXTERNAL AUTHENTICATE command, before the C-MAC is applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExternalAuthenticateCommand {
    level: SecurityLevel,
    host_cryptogram: Cryptogram,
}

impl ExternalAuthenticateCommand {
    /// Create a new EXTERNAL AUTHENTICATE command with host cryptogram
    pub const fn new(level: SecurityLevel, host_cryptogram: Cryptogram) -> Self {
        Self {
            level,
            host_cryptogram,
        }
    }

    /// Security level requested in P1
    pub const fn level(&self) -> SecurityLevel {
        self.level
    }

    /// Build the unprotected command frame
    pub fn to_command(&self) -> Result<Command> {
        Ok(Command::new(cla::GP, ins::EXTERNAL_AUTHENTICATE, self.level.bits(), 0x00)
            .with_data(self.host_cryptogram.to_vec())?)
    }
}
