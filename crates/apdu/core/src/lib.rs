//! Frame codec and transport contract for APDU exchanges
//!
//! This crate provides the stateless building blocks used by the secure channel
//! engine to talk to a security dongle through a smart-card-like command interface.
//!
//! ## Overview
//!
//! - [`Command`]: the `CLA INS P1 P2 Lc data` command frame, with `Lc` always derived
//!   from the data field
//! - [`Response`] and [`StatusWord`]: the `data SW1 SW2` response frame
//! - [`CardTransport`]: the synchronous raw byte exchange implemented by HID/USB
//!   transports (outside this crate) and by [`transport::MockTransport`]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![forbid(unsafe_code)]
#![warn(missing_docs, rustdoc::missing_crate_level_docs)]

// Re-export bytes for convenience
pub use bytes::{Bytes, BytesMut};

pub mod command;
pub mod error;
pub mod response;
pub mod transport;

pub use command::Command;
pub use error::{Error, Result};
pub use response::{Response, StatusWord};
pub use transport::{CardTransport, TransportError};

/// Prelude module containing commonly used traits and types
pub mod prelude {
    pub use crate::{Bytes, BytesMut, Error};

    pub use crate::Command;
    pub use crate::response::{Response, StatusWord, status};

    pub use crate::transport::{CardTransport, TransportError};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reexports() {
        let cmd = Command::new(0x80, 0x50, 0x01, 0x00);
        assert_eq!(cmd.class(), 0x80);
        assert_eq!(cmd.instruction(), 0x50);
        assert_eq!(cmd.p1(), 0x01);
        assert_eq!(cmd.p2(), 0x00);

        let data = Bytes::from_static(&[0x01, 0x02, 0x03]);
        let resp = Response::success(data.clone());
        assert!(resp.is_success());
        assert_eq!(resp.payload(), &data);
        assert_eq!(resp.status(), StatusWord::new(0x90, 0x00));
    }
}
