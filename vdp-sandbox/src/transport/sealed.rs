//! Sealed trait pattern to prevent external `Transport` implementations.
//!
//! The transport sees client certificates, private keys and proxy
//! credentials, so only implementations inside this crate are allowed.

pub(crate) mod private {
    /// Sealed trait marker.
    pub trait Sealed {}
}
