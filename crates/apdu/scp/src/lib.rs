//! Secure channel engine for the keyplug security dongle
//!
//! This crate opens a mutually authenticated secure channel to the dongle over
//! any [`CardTransport`](keyplug_apdu_core::CardTransport) and protects every
//! exchanged frame with the negotiated [`SecurityLevel`]: command integrity
//! (C-MAC), command confidentiality (C-DEC), response integrity (R-MAC) and
//! response confidentiality (R-ENC).
//!
//! The main entry point is [`SecureChannel`]:
//!
//! ```no_run
//! use keyplug_apdu_core::{Command, transport::MockTransport};
//! use keyplug_scp::{Keyset, SecureChannel, SecurityLevel};
//!
//! # fn main() -> keyplug_scp::Result<()> {
//! let keyset = Keyset::from_single_key(0x01, [0x40; 16]);
//! let mut channel = SecureChannel::new(MockTransport::default());
//! channel.authenticate(&keyset, SecurityLevel::C_MAC | SecurityLevel::R_MAC, None, None)?;
//!
//! let serial = channel.exchange_data(&Command::new(0x80, 0xE6, 0x2B, 0x00))?;
//! channel.deauthenticate();
//! # let _ = serial;
//! # Ok(())
//! # }
//! ```
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![forbid(unsafe_code)]

pub mod commands;
pub mod config;
pub mod constants;
pub mod crypto;
mod error;
pub mod keyset;
pub mod secure_channel;
pub mod security;
pub mod session;

// Re-exports
pub use config::ChannelConfig;
pub use error::{Error, Result};
pub use keyset::{Keyset, compute_diversified_keys};
pub use secure_channel::SecureChannel;
pub use security::SecurityLevel;
pub use session::SessionKeys;

pub use commands::{
    ExternalAuthenticateCommand, InitializeUpdateCommand, InitializeUpdateResponse, PutKeyCommand,
    PutKeyMode,
};

/// Prelude module containing commonly used types
pub mod prelude {
    pub use crate::{
        ChannelConfig, Error, Keyset, PutKeyMode, Result, SecureChannel, SecurityLevel,
        compute_diversified_keys,
    };
    pub use keyplug_apdu_core::prelude::*;
}
