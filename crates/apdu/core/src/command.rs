//! APDU command frame
//!
//! A command is a four byte header followed either by a single `Le` byte (header
//! only frame) or by `Lc` and exactly `Lc` data bytes. The device never expects an
//! `Le` after a data field, so none is encoded.

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};

use crate::{Error, Result};

/// Length of `CLA INS P1 P2 Lc`
pub const HEADER_LEN: usize = 5;
/// Largest data field a one byte `Lc` can describe
pub const MAX_DATA_LEN: usize = 255;
/// Largest serialized command
pub const MAX_COMMAND_LEN: usize = HEADER_LEN + MAX_DATA_LEN;

/// Generic APDU command structure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    cla: u8,
    ins: u8,
    p1: u8,
    p2: u8,
    data: Bytes,
    le: u8,
}

impl Command {
    /// Create a new command with just the header bytes
    pub const fn new(cla: u8, ins: u8, p1: u8, p2: u8) -> Self {
        Self {
            cla,
            ins,
            p1,
            p2,
            data: Bytes::new(),
            le: 0,
        }
    }

    /// Create a new command with data payload
    pub fn new_with_data<T: Into<Bytes>>(cla: u8, ins: u8, p1: u8, p2: u8, data: T) -> Result<Self> {
        Self::new(cla, ins, p1, p2).with_data(data)
    }

    /// Set the data field
    ///
    /// Fails with [`Error::DataTooLong`] when the data cannot be described by `Lc`.
    pub fn with_data<T: Into<Bytes>>(mut self, data: T) -> Result<Self> {
        let data = data.into();
        if data.len() > MAX_DATA_LEN {
            return Err(Error::DataTooLong(data.len()));
        }
        self.data = data;
        Ok(self)
    }

    /// Set the expected length byte sent by header only frames
    pub const fn with_le(mut self, le: u8) -> Self {
        self.le = le;
        self
    }

    /// Command class (CLA)
    pub const fn class(&self) -> u8 {
        self.cla
    }

    /// Instruction code (INS)
    pub const fn instruction(&self) -> u8 {
        self.ins
    }

    /// First parameter (P1)
    pub const fn p1(&self) -> u8 {
        self.p1
    }

    /// Second parameter (P2)
    pub const fn p2(&self) -> u8 {
        self.p2
    }

    /// Command payload data, empty for header only frames
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Data length as carried in the `Lc` byte
    pub fn lc(&self) -> u8 {
        // with_data caps the length at MAX_DATA_LEN
        self.data.len() as u8
    }

    /// Expected length, only present on header only frames
    pub fn le(&self) -> Option<u8> {
        self.data.is_empty().then_some(self.le)
    }

    /// Whether this frame has the given class and instruction
    pub const fn is(&self, cla: u8, ins: u8) -> bool {
        self.cla == cla && self.ins == ins
    }

    /// Calculate length of serialized command
    pub fn command_length(&self) -> usize {
        HEADER_LEN + self.data.len()
    }

    /// Convert to raw APDU bytes
    pub fn to_bytes(&self) -> Bytes {
        let mut buffer = BytesMut::with_capacity(self.command_length());

        // Header: CLA, INS, P1, P2
        buffer.put_u8(self.cla);
        buffer.put_u8(self.ins);
        buffer.put_u8(self.p1);
        buffer.put_u8(self.p2);

        if self.data.is_empty() {
            buffer.put_u8(self.le);
        } else {
            buffer.put_u8(self.lc());
            buffer.put_slice(&self.data);
        }

        buffer.freeze()
    }

    /// Parse a command from raw bytes
    pub fn from_bytes(raw: &[u8]) -> Result<Self> {
        if raw.len() < HEADER_LEN || raw.len() > MAX_COMMAND_LEN {
            return Err(Error::InvalidCommandLength(raw.len()));
        }

        let command = Self::new(raw[0], raw[1], raw[2], raw[3]);
        if raw.len() == HEADER_LEN {
            return Ok(command.with_le(raw[4]));
        }

        let declared = raw[4] as usize;
        let actual = raw.len() - HEADER_LEN;
        if declared != actual {
            return Err(Error::LengthMismatch { declared, actual });
        }

        command.with_data(Bytes::copy_from_slice(&raw[HEADER_LEN..]))
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.to_bytes()))
    }
}

impl TryFrom<&[u8]> for Command {
    type Error = Error;

    fn try_from(raw: &[u8]) -> Result<Self> {
        Self::from_bytes(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn test_command_serialization() {
        let data = Bytes::from_static(&[0xA0, 0x00, 0x00, 0x01, 0x51, 0x00]);
        let cmd = Command::new_with_data(0x00, 0xA4, 0x04, 0x00, data).unwrap();
        let bytes = cmd.to_bytes();

        assert_eq!(bytes[0], 0x00); // CLA
        assert_eq!(bytes[1], 0xA4); // INS
        assert_eq!(bytes[2], 0x04); // P1
        assert_eq!(bytes[3], 0x00); // P2
        assert_eq!(bytes[4], 0x06); // Lc (data length)
        assert_eq!(&bytes[5..], &[0xA0, 0x00, 0x00, 0x01, 0x51, 0x00]);
        assert_eq!(bytes.len(), 11);
    }

    #[test]
    fn test_header_only_frame_carries_le() {
        let cmd = Command::new(0x80, 0xE6, 0x00, 0x00);
        assert_eq!(cmd.to_bytes().as_ref(), hex!("80E6000000"));
        assert_eq!(cmd.le(), Some(0));

        let cmd = cmd.with_le(0x10);
        assert_eq!(cmd.to_bytes().as_ref(), hex!("80E6000010"));
        assert_eq!(cmd.lc(), 0);
    }

    #[test]
    fn test_data_frame_drops_le() {
        let cmd = Command::new(0x80, 0xF2, 0x80, 0x02)
            .with_le(0x00)
            .with_data(hex!("4f00").to_vec())
            .unwrap();
        assert_eq!(cmd.le(), None);
        assert_eq!(cmd.to_bytes().as_ref(), hex!("80F28002024f00"));
    }

    #[test]
    fn test_command_length() {
        let cmd1 = Command::new(0x00, 0xB0, 0x00, 0x00);
        assert_eq!(cmd1.command_length(), 5);

        let cmd2 = Command::new_with_data(0x00, 0xD6, 0x00, 0x00, vec![0x01, 0x02, 0x03]).unwrap();
        assert_eq!(cmd2.command_length(), 8);

        let cmd3 = Command::new_with_data(0x00, 0xD6, 0x00, 0x00, vec![0xAA; MAX_DATA_LEN]).unwrap();
        assert_eq!(cmd3.command_length(), MAX_COMMAND_LEN);
    }

    #[test]
    fn test_data_too_long() {
        let result = Command::new_with_data(0x00, 0xD6, 0x00, 0x00, vec![0u8; 256]);
        assert!(matches!(result, Err(Error::DataTooLong(256))));
    }

    #[test]
    fn test_command_from_bytes() {
        // Header only
        let cmd = Command::from_bytes(&hex!("00B00000FF")).unwrap();
        assert_eq!(cmd.class(), 0x00);
        assert_eq!(cmd.instruction(), 0xB0);
        assert!(cmd.data().is_empty());
        assert_eq!(cmd.le(), Some(0xFF));

        // Data
        let cmd = Command::from_bytes(&hex!("8050010008f0467f908e5ca23f")).unwrap();
        assert_eq!(cmd.p1(), 0x01);
        assert_eq!(cmd.data(), hex!("f0467f908e5ca23f"));
        assert_eq!(cmd.lc(), 8);
        assert_eq!(cmd.le(), None);

        // Serialization is stable
        let raw = hex!("84f280020a4f0030f149209e17b397");
        assert_eq!(Command::from_bytes(&raw).unwrap().to_bytes().as_ref(), raw);
    }

    #[test]
    fn test_command_from_bytes_rejects_bad_lengths() {
        assert!(matches!(
            Command::from_bytes(&hex!("00A404")),
            Err(Error::InvalidCommandLength(3))
        ));
        assert!(matches!(
            Command::from_bytes(&[0u8; 261]),
            Err(Error::InvalidCommandLength(261))
        ));
        assert!(matches!(
            Command::from_bytes(&hex!("00A4040003010203FF")),
            Err(Error::LengthMismatch {
                declared: 3,
                actual: 4
            })
        ));
        assert!(matches!(
            Command::from_bytes(&hex!("00A40400050102")),
            Err(Error::LengthMismatch {
                declared: 5,
                actual: 2
            })
        ));
    }

    #[test]
    fn test_display_is_hex() {
        let cmd = Command::new(0x00, 0x00, 0x00, 0x00);
        assert_eq!(cmd.to_string(), "0000000000");
    }
}
