//! Block cipher primitives for the secure channel
//!
//! Two-key triple DES is used throughout. A 16-byte key `K1 K2` is expanded to
//! the 24-byte `K1 K2 K1` form expected by [`TdesEde3`].

use cbc_mac::{CbcMac, Mac};
use cipher::{
    Block, BlockDecrypt, BlockDecryptMut, BlockEncrypt, BlockEncryptMut, Key, KeyInit, KeyIvInit,
    block_padding::{Iso7816, RawPadding},
    generic_array::GenericArray,
};
use derive_more::Display;
use des::{Des, TdesEde3};

use crate::{Error, Result};

/// Length of a two-key triple DES key
pub const KEY_LEN: usize = 16;
/// DES block length
pub const BLOCK_LEN: usize = 8;

pub type KeyBytes = [u8; KEY_LEN];
pub type DerivationConstant = [u8; 2];
pub type SequenceCounter = [u8; 2];
pub type CardChallenge = [u8; 6];
pub type HostChallenge = [u8; 8];
pub type Cryptogram = [u8; 8];
pub type ChannelMac = [u8; 8];
pub type Diversifier = [u8; 16];
pub type KeyCheckValue = [u8; 3];

/// Which chain a retail MAC extends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum MacDirection {
    /// Command MAC: the previous MAC is prepended to the data, ICV is zero
    #[display("C-MAC")]
    Command,
    /// Response MAC: the previous MAC is used as ICV
    #[display("R-MAC")]
    Response,
}

/// Expand a 16-byte key to the 24-byte `K1 K2 K1` triple DES form
pub fn expand_key(key: &KeyBytes) -> Key<TdesEde3> {
    let mut result = Key::<TdesEde3>::default();
    result[..16].copy_from_slice(key);
    result[16..24].copy_from_slice(&key[..8]);
    result
}

fn tdes(key: &KeyBytes) -> TdesEde3 {
    TdesEde3::new(&expand_key(key))
}

fn key_from_slice(key: &[u8]) -> Result<KeyBytes> {
    key.try_into()
        .map_err(|_| Error::InvalidInput("key must be 16 bytes"))
}

fn check_blocks(data: &[u8]) -> Result<()> {
    if data.len() % BLOCK_LEN != 0 {
        return Err(Error::InvalidInput("data length must be a multiple of 8"));
    }
    Ok(())
}

/// Append `0x80` then zero bytes up to the next multiple of 8
///
/// A full block of padding is added when `data` is already aligned.
pub fn pad(data: &[u8]) -> Vec<u8> {
    let padded_len = (data.len() / BLOCK_LEN + 1) * BLOCK_LEN;
    let mut padded = vec![0u8; padded_len];
    padded[..data.len()].copy_from_slice(data);
    Iso7816::raw_pad(&mut padded, data.len());
    padded
}

/// Strip trailing zero bytes and the `0x80` marker that precedes them
pub fn strip_padding(data: &[u8]) -> Result<&[u8]> {
    Iso7816::raw_unpad(data).map_err(|_| Error::PaddingInvalid)
}

/// Triple DES in CBC mode
///
/// `iv` defaults to zero. Fails with [`Error::InvalidInput`] unless `key` is 16
/// bytes and `data` is a whole number of blocks.
pub fn cbc_des3(data: &[u8], key: &[u8], iv: Option<&[u8; 8]>, encrypt: bool) -> Result<Vec<u8>> {
    let key = key_from_slice(key)?;
    check_blocks(data)?;

    let key = expand_key(&key);
    let iv = GenericArray::from(iv.copied().unwrap_or_default());
    let mut out = data.to_vec();

    if encrypt {
        let mut cipher = cbc::Encryptor::<TdesEde3>::new(&key, &iv);
        for chunk in out.chunks_exact_mut(BLOCK_LEN) {
            cipher.encrypt_block_mut(GenericArray::from_mut_slice(chunk));
        }
    } else {
        let mut cipher = cbc::Decryptor::<TdesEde3>::new(&key, &iv);
        for chunk in out.chunks_exact_mut(BLOCK_LEN) {
            cipher.decrypt_block_mut(GenericArray::from_mut_slice(chunk));
        }
    }

    Ok(out)
}

/// Triple DES in ECB mode
///
/// Fails with [`Error::InvalidInput`] unless `key` is 16 bytes and `data` is a
/// whole number of blocks.
pub fn ecb_des3(data: &[u8], key: &[u8], encrypt: bool) -> Result<Vec<u8>> {
    let cipher = tdes(&key_from_slice(key)?);
    check_blocks(data)?;

    let mut out = data.to_vec();
    for chunk in out.chunks_exact_mut(BLOCK_LEN) {
        let block = GenericArray::from_mut_slice(chunk);
        if encrypt {
            cipher.encrypt_block(block);
        } else {
            cipher.decrypt_block(block);
        }
    }

    Ok(out)
}

/// Full triple DES CBC MAC with zero IV over padded data
///
/// Used for cryptograms, never for per-command integrity.
pub fn full_mac(data: &[u8], key: &KeyBytes) -> ChannelMac {
    let mut mac = <CbcMac<TdesEde3> as Mac>::new(&expand_key(key));
    mac.update(&pad(data));
    mac.finalize().into_bytes().into()
}

/// Derive a session key from a static key, the sequence counter and a constant
///
/// The derivation block is `constant || counter || 00 * 12`, encrypted with
/// triple DES CBC under a zero IV.
pub fn session_key(
    counter: &SequenceCounter,
    constant: &DerivationConstant,
    master_key: &KeyBytes,
) -> KeyBytes {
    let mut blocks = [Block::<TdesEde3>::default(); 2];
    blocks[0][0..2].copy_from_slice(constant);
    blocks[0][2..4].copy_from_slice(counter);

    let mut encryptor = cbc::Encryptor::<TdesEde3>::new(&expand_key(master_key), &Default::default());
    encryptor.encrypt_blocks_mut(&mut blocks);

    let mut result = KeyBytes::default();
    result[0..8].copy_from_slice(&blocks[0]);
    result[8..16].copy_from_slice(&blocks[1]);
    result
}

/// Cryptogram the card proves itself with: MAC of `host || counter || card`
pub fn card_cryptogram(
    host_challenge: &HostChallenge,
    card_challenge: &CardChallenge,
    counter: &SequenceCounter,
    s_enc: &KeyBytes,
) -> Cryptogram {
    let mut data = [0u8; 16];
    data[0..8].copy_from_slice(host_challenge);
    data[8..10].copy_from_slice(counter);
    data[10..16].copy_from_slice(card_challenge);
    full_mac(&data, s_enc)
}

/// Cryptogram the host proves itself with: MAC of `counter || card || host`
pub fn host_cryptogram(
    host_challenge: &HostChallenge,
    card_challenge: &CardChallenge,
    counter: &SequenceCounter,
    s_enc: &KeyBytes,
) -> Cryptogram {
    let mut data = [0u8; 16];
    data[0..2].copy_from_slice(counter);
    data[2..8].copy_from_slice(card_challenge);
    data[8..16].copy_from_slice(host_challenge);
    full_mac(&data, s_enc)
}

/// Retail MAC (ISO 9797-1 algorithm 3) with chaining
///
/// Single DES CBC under `K1` over all blocks but the last, then triple DES over
/// the last block XORed with the running state.
///
/// For [`MacDirection::Command`] the previous MAC is prepended to `data` and the
/// ICV is zero. `None` means the first MAC of the session, which has no prefix at
/// all. For [`MacDirection::Response`] the previous MAC is the ICV.
pub fn retail_mac(
    data: &[u8],
    key: &KeyBytes,
    chain: Option<&ChannelMac>,
    direction: MacDirection,
) -> ChannelMac {
    let (mut padded, icv) = match direction {
        MacDirection::Command => {
            let mut input = Vec::with_capacity(BLOCK_LEN + data.len());
            if let Some(chain) = chain {
                input.extend_from_slice(chain);
            }
            input.extend_from_slice(data);
            (pad(&input), ChannelMac::default())
        }
        MacDirection::Response => (pad(data), chain.copied().unwrap_or_default()),
    };

    // CBC with an ICV is CBC-MAC over the first block XORed with it
    for (byte, iv) in padded.iter_mut().zip(icv) {
        *byte ^= iv;
    }

    let (head, last) = padded.split_at(padded.len() - BLOCK_LEN);
    let mut state = ChannelMac::default();
    if !head.is_empty() {
        let mut mac = <CbcMac<Des> as Mac>::new(GenericArray::from_slice(&key[..8]));
        mac.update(head);
        state = mac.finalize().into_bytes().into();
    }

    let mut block = Block::<TdesEde3>::clone_from_slice(last);
    for (byte, s) in block.iter_mut().zip(state) {
        *byte ^= s;
    }
    tdes(key).encrypt_block(&mut block);
    block.into()
}

/// Key check value: first three bytes of a zero block encrypted under the key
pub fn kcv(key: &KeyBytes) -> KeyCheckValue {
    let mut block = Block::<TdesEde3>::default();
    tdes(key).encrypt_block(&mut block);
    [block[0], block[1], block[2]]
}

/// Derive a device specific key: triple DES CBC of the diversifier under a zero IV
pub fn diversify(master_key: &KeyBytes, diversifier: &Diversifier) -> KeyBytes {
    let mut blocks = [
        Block::<TdesEde3>::clone_from_slice(&diversifier[..8]),
        Block::<TdesEde3>::clone_from_slice(&diversifier[8..]),
    ];
    let mut encryptor = cbc::Encryptor::<TdesEde3>::new(&expand_key(master_key), &Default::default());
    encryptor.encrypt_blocks_mut(&mut blocks);

    let mut result = KeyBytes::default();
    result[0..8].copy_from_slice(&blocks[0]);
    result[8..16].copy_from_slice(&blocks[1]);
    result
}

/// Pad and encrypt a command payload under the session encryption key
pub fn encrypt_payload(data: &[u8], key: &KeyBytes) -> Vec<u8> {
    cbc::Encryptor::<TdesEde3>::new(&expand_key(key), &Default::default())
        .encrypt_padded_vec_mut::<Iso7816>(data)
}

/// Decrypt a response payload and strip its padding
pub fn decrypt_payload(data: &[u8], key: &KeyBytes) -> Result<Vec<u8>> {
    let padded = cbc_des3(data, key, None, false)?;
    strip_padding(&padded).map(<[u8]>::to_vec)
}

/// Encrypt a 16-byte key under a session DEK for transport in PUT KEY
pub fn wrap_key(key: &KeyBytes, dek: &KeyBytes) -> KeyBytes {
    let cipher = tdes(dek);
    let mut blocks = [
        Block::<TdesEde3>::clone_from_slice(&key[..8]),
        Block::<TdesEde3>::clone_from_slice(&key[8..]),
    ];
    cipher.encrypt_blocks(&mut blocks);

    let mut result = KeyBytes::default();
    result[0..8].copy_from_slice(&blocks[0]);
    result[8..16].copy_from_slice(&blocks[1]);
    result
}
