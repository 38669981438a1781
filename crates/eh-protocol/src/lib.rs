//! L2: reliability, resumption and liveness on top of `eh-wire`'s framing.
//!
//! [`PersistentProtocol`] owns a [`eh_wire::ProtocolReader`] and
//! [`eh_wire::ProtocolWriter`] pair and adds acknowledgement tracking,
//! retransmission of unacknowledged sends, a pluggable unresponsiveness
//! signal, keep-alive, and reconnection splicing so a dropped transport
//! can be swapped for a new one without losing the logical message
//! sequence.

mod constants;
mod diagnostics;
mod error;
mod events;
mod load;
mod persistent;

pub use constants::{
    ACKNOWLEDGE_TIME, HEADER_LENGTH, KEEP_ALIVE_SEND_TIME, RECONNECTION_GRACE_TIME,
    RECONNECTION_SHORT_GRACE_TIME, TIMEOUT_TIME,
};
pub use diagnostics::ProtocolStatus;
pub use error::ProtocolError;
pub use events::{ProtocolEvent, UnresponsivenessEvent};
pub use load::{AlwaysIdleLoadEstimator, LoadEstimator};
pub use persistent::PersistentProtocol;
