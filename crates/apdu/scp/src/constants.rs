//! Constants used by the secure channel protocol
//!
//! Command classes, instruction codes, key derivation constants and key set
//! usage tags understood by the dongle.

/// Command classes
pub mod cla {
    /// ISO7816 command class
    pub const ISO7816: u8 = 0x00;
    /// Proprietary command class
    pub const GP: u8 = 0x80;
    /// Class used by INITIALIZE UPDATE with a diversifier
    pub const DIVERSIFIED: u8 = 0xD0;
    /// Bit set in CLA when a C-MAC is appended
    pub const SECURE_MESSAGING: u8 = 0x04;
}

/// Instruction codes
pub mod ins {
    /// INITIALIZE UPDATE command
    pub const INITIALIZE_UPDATE: u8 = 0x50;
    /// EXTERNAL AUTHENTICATE command
    pub const EXTERNAL_AUTHENTICATE: u8 = 0x82;
    /// PUT KEY command
    pub const PUT_KEY: u8 = 0xD8;
}

/// Parameter values for INITIALIZE UPDATE (P2)
pub mod initialize_update_p2 {
    /// Plain authentication
    pub const PLAIN: u8 = 0x00;
    /// Authentication with a diversified key set
    pub const DIVERSIFIED: u8 = 0x10;
}

/// Parameter values for PUT KEY (P2)
pub mod put_key_p2 {
    /// Replace the key set content
    pub const REGULAR: u8 = 0x81;
    /// XOR the provided content into an existing key set
    pub const XOR: u8 = 0x82;
}

/// Session key derivation constants
pub mod derivation {
    /// Command encryption key, derived from the ENC key
    pub const S_ENC: [u8; 2] = [0x01, 0x82];
    /// Response encryption key, derived from the ENC key
    pub const R_ENC: [u8; 2] = [0x01, 0x83];
    /// Command MAC key, derived from the MAC key
    pub const C_MAC: [u8; 2] = [0x01, 0x01];
    /// Response MAC key, derived from the MAC key
    pub const R_MAC: [u8; 2] = [0x01, 0x02];
    /// Data encryption key, derived from the DEK key
    pub const DEK: [u8; 2] = [0x01, 0x81];
}

/// Key set usage tags
pub mod usage {
    /// GlobalPlatform key
    pub const GP: u8 = 0x01;
    /// GlobalPlatform key used for two-way authentication
    pub const GP_AUTH: u8 = 0x02;
    /// HOTP/OATH key
    pub const HOTP: u8 = 0x03;
    /// HOTP/OATH or TOTP/OATH validation key
    pub const HOTP_VALIDATION: u8 = 0x04;
    /// Encryption key
    pub const ENC: u8 = 0x06;
    /// Decryption key
    pub const DEC: u8 = 0x07;
    /// Encryption and decryption key
    pub const ENC_DEC: u8 = 0x08;
    /// SAM context encryption key
    pub const SAM_CTX: u8 = 0x09;
    /// SAM GlobalPlatform usable key
    pub const SAM_GP: u8 = 0x0A;
    /// Transient key set import/export key
    pub const IMPORT_EXPORT_TRANSIENT: u8 = 0x0F;
    /// TOTP time source key
    pub const TOTP_TIME_SRC: u8 = 0x10;
    /// TOTP/OATH key
    pub const TOTP: u8 = 0x11;
    /// HMAC-SHA1 key
    pub const HMAC_SHA1: u8 = 0x12;
    /// HOTP key locking the dongle after each use
    pub const HOTP_LOCK: u8 = 0x13;
    /// TOTP key locking the dongle after each use
    pub const TOTP_LOCK: u8 = 0x14;
    /// Flag marking a key set as its own parent in PUT KEY
    pub const SELF_PARENT: u8 = 0x80;
}

/// Frame sent to reset the dongle's channel state on teardown
pub const RESET_FRAME: [u8; 5] = [0x00; 5];

/// Length of every MAC and cryptogram
pub const MAC_LEN: usize = 8;

/// Offset of the sequence counter in the INITIALIZE UPDATE response
pub const INIT_RESPONSE_COUNTER_OFFSET: usize = 12;

/// Length of the INITIALIZE UPDATE response data
pub const INIT_RESPONSE_LEN: usize = 28;
