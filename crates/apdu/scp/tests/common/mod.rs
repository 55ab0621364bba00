//! Simulated dongle for integration tests
//!
//! Implements the device side of the handshake and of every protection level
//! so the host engine can be driven end to end without hardware.
#![allow(dead_code)]

use std::collections::HashMap;

use keyplug_apdu_core::{Bytes, CardTransport, Command, StatusWord, TransportError, response::status};
use keyplug_scp::{
    Keyset, SecurityLevel, SessionKeys, compute_diversified_keys,
    constants::{RESET_FRAME, cla, ins},
    crypto::{
        CardChallenge, ChannelMac, KeyBytes, MacDirection, SequenceCounter, card_cryptogram,
        decrypt_payload, ecb_des3, encrypt_payload, host_cryptogram, kcv, retail_mac,
    },
};
use tracing_subscriber::EnvFilter;

/// Returns the command data unchanged
pub const INS_ECHO: u8 = 0xEE;
/// Always answers `6A88` with no data
pub const INS_FAIL: u8 = 0xFA;

/// Status word the device answers when a command MAC does not verify
pub const SW_MAC_FAILURE: StatusWord = StatusWord::new(0x69, 0x88);

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[derive(Debug)]
struct Pending {
    keys: SessionKeys,
    host_challenge: [u8; 8],
    card_challenge: CardChallenge,
    counter: SequenceCounter,
}

#[derive(Debug)]
struct DeviceSession {
    keys: SessionKeys,
    level: SecurityLevel,
    c_mac: Option<ChannelMac>,
    r_mac: Option<ChannelMac>,
}

/// Device side of the secure channel
#[derive(Debug, Default)]
pub struct SimulatedDevice {
    keysets: HashMap<u8, Keyset>,
    counter: u16,
    card_challenge: CardChallenge,
    received: Vec<Bytes>,
    resets: usize,
    tamper_cryptogram: bool,
    tamper_response: bool,
    tamper_command: bool,
    fail_next: bool,
    pending: Option<Pending>,
    session: Option<DeviceSession>,
}

impl SimulatedDevice {
    pub fn new(keyset: Keyset) -> Self {
        let mut device = Self {
            card_challenge: [0x11, 0x22, 0x33, 0x44, 0x55, 0x66],
            ..Default::default()
        };
        device.keysets.insert(keyset.version(), keyset);
        device
    }

    /// Sequence counter reported by the next INITIALIZE UPDATE
    pub fn with_counter(mut self, counter: u16) -> Self {
        self.counter = counter;
        self
    }

    pub fn with_card_challenge(mut self, card_challenge: CardChallenge) -> Self {
        self.card_challenge = card_challenge;
        self
    }

    /// Corrupt the card cryptogram of the next INITIALIZE UPDATE response
    pub fn tamper_cryptogram(&mut self) {
        self.tamper_cryptogram = true;
    }

    /// Corrupt the next response after it has been protected
    pub fn tamper_next_response(&mut self) {
        self.tamper_response = true;
    }

    /// Corrupt the next command before it is verified
    pub fn tamper_next_command(&mut self) {
        self.tamper_command = true;
    }

    /// Fail the next exchange with a timeout
    pub fn fail_next_exchange(&mut self) {
        self.fail_next = true;
    }

    pub fn received(&self) -> &[Bytes] {
        &self.received
    }

    /// Number of reset frames received
    pub const fn resets_received(&self) -> usize {
        self.resets
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }

    pub fn level(&self) -> Option<SecurityLevel> {
        self.session.as_ref().map(|s| s.level)
    }

    pub fn keyset(&self, version: u8) -> Option<&Keyset> {
        self.keysets.get(&version)
    }

    fn initialize_update(&mut self, command: &Command) -> (Vec<u8>, StatusWord) {
        self.session = None;

        let data = command.data();
        let diversified = command.class() == cla::DIVERSIFIED;
        if (diversified && data.len() != 24) || (!diversified && data.len() != 8) {
            return (Vec::new(), status::WRONG_LENGTH);
        }

        let Some(master) = self.keysets.get(&command.p1()) else {
            return (Vec::new(), status::REFERENCED_DATA_NOT_FOUND);
        };
        let keyset = if diversified {
            match compute_diversified_keys(master, &data[8..24]) {
                Ok(keyset) => keyset,
                Err(_) => return (Vec::new(), status::WRONG_LENGTH),
            }
        } else {
            master.clone()
        };

        self.counter = self.counter.wrapping_add(1);
        let counter = self.counter.to_be_bytes();
        let mut host_challenge = [0u8; 8];
        host_challenge.copy_from_slice(&data[..8]);

        let keys = SessionKeys::derive(&counter, &keyset);
        let mut cryptogram =
            card_cryptogram(&host_challenge, &self.card_challenge, &counter, keys.s_enc());
        if std::mem::take(&mut self.tamper_cryptogram) {
            cryptogram[7] ^= 0x01;
        }

        let mut response = vec![0u8; 10];
        response.extend_from_slice(&[keyset.version(), 0x02]);
        response.extend_from_slice(&counter);
        response.extend_from_slice(&self.card_challenge);
        response.extend_from_slice(&cryptogram);

        self.pending = Some(Pending {
            keys,
            host_challenge,
            card_challenge: self.card_challenge,
            counter,
        });
        (response, status::SUCCESS)
    }

    fn external_authenticate(&mut self, command: &Command) -> (Vec<u8>, StatusWord) {
        let Some(pending) = self.pending.take() else {
            return (Vec::new(), status::CONDITIONS_NOT_SATISFIED);
        };
        let data = command.data();
        if command.class() != (cla::GP | cla::SECURE_MESSAGING) || data.len() != 16 {
            return (Vec::new(), status::SECURITY_STATUS_NOT_SATISFIED);
        }

        let expected = host_cryptogram(
            &pending.host_challenge,
            &pending.card_challenge,
            &pending.counter,
            pending.keys.s_enc(),
        );
        let mac = retail_mac(
            &command.to_bytes()[..13],
            pending.keys.c_mac(),
            None,
            MacDirection::Command,
        );
        if data[..8] != expected || data[8..] != mac {
            return (Vec::new(), status::SECURITY_STATUS_NOT_SATISFIED);
        }

        self.session = Some(DeviceSession {
            keys: pending.keys,
            level: SecurityLevel::from_bits_truncate(command.p1()),
            c_mac: Some(mac),
            r_mac: Some(mac),
        });
        (Vec::new(), status::SUCCESS)
    }

    /// Verify the command protection, run the command and protect the response
    fn application(&mut self, command: &Command, tamper: bool) -> (Vec<u8>, StatusWord) {
        let Some(session) = self.session.as_mut() else {
            return (Vec::new(), status::SECURITY_STATUS_NOT_SATISFIED);
        };

        let mut data = command.data().to_vec();
        if tamper {
            if let Some(first) = data.first_mut() {
                *first ^= 0x01;
            }
        }

        // every open level carries a C-MAC
        let Some(split) = data.len().checked_sub(8) else {
            self.session = None;
            return (Vec::new(), SW_MAC_FAILURE);
        };
        let (body, received_mac) = data.split_at(split);
        let clear = if session.level.contains(SecurityLevel::C_DEC) {
            match decrypt_payload(body, session.keys.s_enc()) {
                Ok(clear) => clear,
                Err(_) => {
                    self.session = None;
                    return (Vec::new(), SW_MAC_FAILURE);
                }
            }
        } else {
            body.to_vec()
        };

        let mut mac_input = vec![
            command.class(),
            command.instruction(),
            command.p1(),
            command.p2(),
            (clear.len() + 8) as u8,
        ];
        mac_input.extend_from_slice(&clear);
        let mac = retail_mac(
            &mac_input,
            session.keys.c_mac(),
            session.c_mac.as_ref(),
            MacDirection::Command,
        );
        if received_mac != mac {
            self.session = None;
            return (Vec::new(), SW_MAC_FAILURE);
        }
        session.c_mac = Some(mac);

        let original = match Command::new(
            command.class() & !cla::SECURE_MESSAGING,
            command.instruction(),
            command.p1(),
            command.p2(),
        )
        .with_data(clear.clone())
        {
            Ok(original) => original,
            Err(_) => return (Vec::new(), status::WRONG_LENGTH),
        };

        let (result, sw) = match command.instruction() {
            INS_ECHO => (clear, status::SUCCESS),
            INS_FAIL => (Vec::new(), status::REFERENCED_DATA_NOT_FOUND),
            ins::PUT_KEY => (Vec::new(), put_key(&mut self.keysets, &original, session.keys.dek())),
            _ => (Vec::new(), status::INVALID_INSTRUCTION),
        };

        protect(session, &original, result, sw)
    }
}

/// Apply response confidentiality and integrity
fn protect(
    session: &mut DeviceSession,
    original: &Command,
    clear: Vec<u8>,
    sw: StatusWord,
) -> (Vec<u8>, StatusWord) {
    let mut data = if session.level.contains(SecurityLevel::R_ENC) && !clear.is_empty() {
        encrypt_payload(&clear, session.keys.r_enc())
    } else {
        clear.clone()
    };

    if session.level.contains(SecurityLevel::R_MAC) {
        let mut mac_input = original.to_bytes().to_vec();
        mac_input.push(clear.len() as u8);
        mac_input.extend_from_slice(&clear);
        mac_input.extend_from_slice(&sw.to_bytes());
        let mac = retail_mac(
            &mac_input,
            session.keys.r_mac(),
            session.r_mac.as_ref(),
            MacDirection::Response,
        );
        session.r_mac = Some(mac);
        data.extend_from_slice(&mac);
    }

    (data, sw)
}

/// Decrypt and check a PUT KEY payload, storing the new key set
fn put_key(keysets: &mut HashMap<u8, Keyset>, command: &Command, dek: &KeyBytes) -> StatusWord {
    let data = command.data();
    if data.len() != 85 || data[0] != command.p1() {
        return status::WRONG_LENGTH;
    }

    let mut keys = [[0u8; 16]; 3];
    let mut usage = 0;
    let mut access = 0;
    for (i, block) in data[1..].chunks_exact(28).enumerate() {
        let Ok(clear) = ecb_des3(&block[3..19], dek, false) else {
            return status::CONDITIONS_NOT_SATISFIED;
        };
        keys[i].copy_from_slice(&clear);
        if kcv(&keys[i]) != block[20..23] {
            return status::SECURITY_STATUS_NOT_SATISFIED;
        }
        usage = block[24] & 0x7F;
        access = u16::from_be_bytes([block[26], block[27]]);
    }

    let [enc, mac, dek] = keys;
    let keyset = Keyset::new(data[0], usage, access, enc, mac, dek);
    keysets.insert(keyset.version(), keyset);
    status::SUCCESS
}

impl CardTransport for SimulatedDevice {
    fn do_transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, TransportError> {
        self.received.push(Bytes::copy_from_slice(command));

        if std::mem::take(&mut self.fail_next) {
            return Err(TransportError::Timeout);
        }

        if command == RESET_FRAME {
            self.resets += 1;
            self.session = None;
            self.pending = None;
            return Ok(Bytes::copy_from_slice(&status::SUCCESS.to_bytes()));
        }

        let (mut data, sw) = match Command::from_bytes(command) {
            Err(_) => (Vec::new(), status::WRONG_LENGTH),
            Ok(cmd) => match (cmd.class() & !cla::SECURE_MESSAGING, cmd.instruction()) {
                (cla::GP | cla::DIVERSIFIED, ins::INITIALIZE_UPDATE) => self.initialize_update(&cmd),
                (cla::GP, ins::EXTERNAL_AUTHENTICATE) if self.pending.is_some() => {
                    self.external_authenticate(&cmd)
                }
                _ => {
                    let tamper = std::mem::take(&mut self.tamper_command);
                    self.application(&cmd, tamper)
                }
            },
        };

        if std::mem::take(&mut self.tamper_response) {
            match data.last_mut() {
                Some(last) => *last ^= 0x01,
                None => data.push(0x00),
            }
        }

        data.extend_from_slice(&sw.to_bytes());
        Ok(Bytes::from(data))
    }

    fn reset(&mut self) -> Result<(), TransportError> {
        self.session = None;
        self.pending = None;
        Ok(())
    }
}
