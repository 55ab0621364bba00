//! Secure channel configuration

use crate::security::SecurityLevel;

/// Behaviour of a [`SecureChannel`](crate::SecureChannel) that is not negotiated with the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelConfig {
    /// Security level requested by [`SecureChannel::open`](crate::SecureChannel::open)
    pub default_level: SecurityLevel,
    /// Send the reset frame when an open channel is torn down
    pub reset_on_close: bool,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            default_level: SecurityLevel::C_MAC,
            reset_on_close: true,
        }
    }
}

impl ChannelConfig {
    /// Set the security level used by `open`
    pub const fn with_default_level(mut self, level: SecurityLevel) -> Self {
        self.default_level = level;
        self
    }

    /// Enable or disable the reset frame on teardown
    pub const fn with_reset_on_close(mut self, reset_on_close: bool) -> Self {
        self.reset_on_close = reset_on_close;
        self
    }
}
