//! PUT KEY command
//!
//! Provisions a key set on the dongle. Every key travels encrypted under the
//! session DEK, followed by its check value and the key set metadata.

use keyplug_apdu_core::Command;

use crate::{
    Result,
    constants::{cla, ins, put_key_p2, usage},
    crypto::{KeyBytes, kcv, wrap_key},
    keyset::Keyset,
};

/// Length of one key block in the PUT KEY data field
const KEY_BLOCK_LEN: usize = 28;

/// How the device applies the provided key set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum PutKeyMode {
    /// Replace the key set content
    #[default]
    Regular = put_key_p2::REGULAR,
    /// XOR the provided content into an existing key set
    Xor = put_key_p2::XOR,
}

/// PUT KEY command for one key set
#[derive(Debug, Clone)]
pub struct PutKeyCommand<'a> {
    keyset: &'a Keyset,
    self_parent: bool,
    mode: PutKeyMode,
}

impl<'a> PutKeyCommand<'a> {
    /// Create a new PUT KEY command replacing the key set with the same version
    pub const fn new(keyset: &'a Keyset) -> Self {
        Self {
            keyset,
            self_parent: false,
            mode: PutKeyMode::Regular,
        }
    }

    /// Mark the key set as its own parent
    pub const fn self_parent(mut self, self_parent: bool) -> Self {
        self.self_parent = self_parent;
        self
    }

    /// Select regular or XOR mode
    pub const fn mode(mut self, mode: PutKeyMode) -> Self {
        self.mode = mode;
        self
    }

    /// Build the command frame, encrypting every key under the session `dek`
    pub fn to_command(&self, dek: &KeyBytes) -> Result<Command> {
        let keyset = self.keyset;
        let usage = if self.self_parent {
            keyset.usage() | usage::SELF_PARENT
        } else {
            keyset.usage()
        };

        let mut data = Vec::with_capacity(1 + 3 * KEY_BLOCK_LEN);
        data.push(keyset.version());
        for key in [keyset.enc(), keyset.mac(), keyset.dek()] {
            data.extend_from_slice(&[0xFF, 0x80, 0x10]);
            data.extend_from_slice(&wrap_key(key, dek));
            data.push(0x03);
            data.extend_from_slice(&kcv(key));
            data.extend_from_slice(&[0x01, usage, 0x02]);
            data.extend_from_slice(&keyset.access().to_be_bytes());
        }

        Ok(Command::new(cla::GP, ins::PUT_KEY, keyset.version(), self.mode as u8).with_data(data)?)
    }
}
