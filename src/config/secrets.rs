//! Secret handling utilities.
//!
//! Re-exports the secrecy types the binary needs to hand the connection
//! string to the store driver.

pub use secrecy::{ExposeSecret, SecretString};
