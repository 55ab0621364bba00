//! Static key sets
//!
//! A key set holds the three static keys shared with the dongle (ENC, MAC and
//! DEK) together with the version it is stored under on the device and its
//! usage and access metadata.

use std::fmt;

use zeroize::Zeroize;

use crate::{
    Error, Result,
    crypto::{Diversifier, KEY_LEN, KeyBytes, KeyCheckValue, diversify, kcv},
};

/// Index of the ENC key
pub const ENC: usize = 0;
/// Index of the MAC key
pub const MAC: usize = 1;
/// Index of the DEK key
pub const DEK: usize = 2;

/// Three-key credential with version, usage and access metadata
#[derive(Clone, PartialEq, Eq, Zeroize)]
#[zeroize(drop)]
pub struct Keyset {
    version: u8,
    usage: u8,
    access: u16,
    keys: [KeyBytes; 3],
}

impl Keyset {
    /// Create a key set from all of its parts
    pub const fn new(
        version: u8,
        usage: u8,
        access: u16,
        enc: KeyBytes,
        mac: KeyBytes,
        dek: KeyBytes,
    ) -> Self {
        Self {
            version,
            usage,
            access,
            keys: [enc, mac, dek],
        }
    }

    /// Create a key set where the MAC and DEK keys equal the ENC key
    pub const fn from_single_key(version: u8, key: KeyBytes) -> Self {
        Self::new(version, 0, 0, key, key, key)
    }

    /// Create a key set from byte slices
    ///
    /// A missing MAC or DEK key defaults to the ENC key. Every key must be 16 bytes.
    pub fn from_slices(version: u8, enc: &[u8], mac: Option<&[u8]>, dek: Option<&[u8]>) -> Result<Self> {
        let enc = to_key(enc)?;
        let mac = mac.map(to_key).transpose()?.unwrap_or(enc);
        let dek = dek.map(to_key).transpose()?.unwrap_or(enc);
        Ok(Self::new(version, 0, 0, enc, mac, dek))
    }

    /// Set the usage tag
    pub fn with_usage(mut self, usage: u8) -> Self {
        self.usage = usage;
        self
    }

    /// Set the access conditions
    pub fn with_access(mut self, access: u16) -> Self {
        self.access = access;
        self
    }

    /// Key set version on the device
    pub const fn version(&self) -> u8 {
        self.version
    }

    /// Usage tag
    pub const fn usage(&self) -> u8 {
        self.usage
    }

    /// Two packed access condition bytes
    pub const fn access(&self) -> u16 {
        self.access
    }

    /// Key by index, see [`ENC`], [`MAC`] and [`DEK`]
    pub fn key(&self, index: usize) -> Result<&KeyBytes> {
        self.keys
            .get(index)
            .ok_or(Error::InvalidInput("key index must be 0, 1 or 2"))
    }

    /// Get the encryption key
    pub const fn enc(&self) -> &KeyBytes {
        &self.keys[ENC]
    }

    /// Get the MAC key
    pub const fn mac(&self) -> &KeyBytes {
        &self.keys[MAC]
    }

    /// Get the data encryption key
    pub const fn dek(&self) -> &KeyBytes {
        &self.keys[DEK]
    }

    /// Key check values of the ENC, MAC and DEK keys
    pub fn kcvs(&self) -> [KeyCheckValue; 3] {
        self.keys.each_ref().map(kcv)
    }
}

impl fmt::Debug for Keyset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kcvs = self.kcvs();
        f.debug_struct("Keyset")
            .field("version", &format_args!("{:#04x}", self.version))
            .field("usage", &format_args!("{:#04x}", self.usage))
            .field("access", &format_args!("{:#06x}", self.access))
            .field("kcv_enc", &hex::encode(kcvs[ENC]))
            .field("kcv_mac", &hex::encode(kcvs[MAC]))
            .field("kcv_dek", &hex::encode(kcvs[DEK]))
            .finish()
    }
}

fn to_key(key: &[u8]) -> Result<KeyBytes> {
    key.try_into().map_err(|_| Error::InvalidLength {
        expected: KEY_LEN,
        actual: key.len(),
    })
}

/// Check that a diversifier is exactly 16 bytes
pub fn check_diversifier(diversifier: &[u8]) -> Result<&Diversifier> {
    diversifier
        .try_into()
        .map_err(|_| Error::InvalidDiversifier(diversifier.len()))
}

/// Diversify every key of a master key set
///
/// Version, usage and access are copied. Fails with [`Error::InvalidDiversifier`]
/// unless the diversifier is 16 bytes.
pub fn compute_diversified_keys(master: &Keyset, diversifier: &[u8]) -> Result<Keyset> {
    let diversifier = check_diversifier(diversifier)?;
    let mut diversified = master.clone();
    for key in diversified.keys.iter_mut() {
        *key = diversify(key, diversifier);
    }
    Ok(diversified)
}
