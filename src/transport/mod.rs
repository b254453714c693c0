//! Diagnostic transport carried in single CAN frames.
//!
//! Requests and responses are ISO-TP single frames: a one byte PCI holding
//! the frame type and payload length, followed by the service id, the
//! parameter id and at most five data bytes.

pub mod isotp;

pub use isotp::{Addressing, IsoTpConfig, IsoTpMessage};
