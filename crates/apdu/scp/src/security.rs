//! Security level negotiated for a secure channel

use std::{fmt, ops::BitOr};

/// Security level bitmask sent in EXTERNAL AUTHENTICATE P1
///
/// Command integrity ([`SecurityLevel::C_MAC`]) is always added when a channel
/// is opened.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SecurityLevel(u8);

impl SecurityLevel {
    /// No protection
    pub const NONE: Self = Self(0x00);
    /// Command integrity
    pub const C_MAC: Self = Self(0x01);
    /// Command confidentiality
    pub const C_DEC: Self = Self(0x02);
    /// Response integrity
    pub const R_MAC: Self = Self(0x10);
    /// Response confidentiality
    pub const R_ENC: Self = Self(0x20);
    /// Every protection the dongle supports
    pub const FULL: Self = Self(0x33);

    /// Create a security level from raw bits, `None` if unknown bits are set
    pub const fn from_bits(bits: u8) -> Option<Self> {
        if bits & !Self::FULL.0 == 0 {
            Some(Self(bits))
        } else {
            None
        }
    }

    /// Create a security level from raw bits, dropping unknown bits
    pub const fn from_bits_truncate(bits: u8) -> Self {
        Self(bits & Self::FULL.0)
    }

    /// Raw bits
    pub const fn bits(&self) -> u8 {
        self.0
    }

    /// Whether every bit of `other` is set
    pub const fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Union of both levels
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Whether no protection is set
    pub const fn is_none(&self) -> bool {
        self.0 == 0
    }
}

impl BitOr for SecurityLevel {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl fmt::Debug for SecurityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecurityLevel({self})")
    }
}

impl fmt::Display for SecurityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            return f.write_str("NONE");
        }
        let names = [
            (Self::C_MAC, "C_MAC"),
            (Self::C_DEC, "C_DEC"),
            (Self::R_MAC, "R_MAC"),
            (Self::R_ENC, "R_ENC"),
        ];
        let mut first = true;
        for (flag, name) in names {
            if self.contains(flag) {
                if !first {
                    f.write_str("|")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        Ok(())
    }
}
