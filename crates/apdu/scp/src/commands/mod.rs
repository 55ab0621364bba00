//! Command builders for the handshake and key provisioning
//!
//! Application commands are plain [`keyplug_apdu_core::Command`] values. The
//! builders here cover the frames whose layout the secure channel itself defines.

pub mod external_authenticate;
pub mod initialize_update;
pub mod put_key;

// Re-exports for convenience
pub use external_authenticate::ExternalAuthenticateCommand;
pub use initialize_update::{InitializeUpdateCommand, InitializeUpdateResponse};
pub use put_key::{PutKeyCommand, PutKeyMode};
