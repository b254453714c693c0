//! Data link layer: frame encoding and the per-node protocol controller.
//!
//! - [`bits`]: bit stuffing and frame ⇄ bit sequence conversion
//! - [`frame`]: the classic base-format data frame
//! - [`tx_queue`]: encoded frames awaiting the bus
//! - [`controller`]: arbitration, transmission and reception

pub mod bits;
pub mod controller;
pub mod frame;
pub mod tx_queue;

pub use controller::{
    Controller, ControllerConfig, ControllerOptions, ControllerState, ControllerStats,
    StateReport,
};
pub use frame::Frame;
pub use tx_queue::{TxCursor, TxQueue};

/// Channel on which every controller broadcasts its state changes
pub const CONTROLLER_STATE: &str = "controller.state";
