//! Test doubles shared by the bridge crates' test suites.

mod socket;

pub use socket::{InMemorySocket, InMemorySocketPair};
