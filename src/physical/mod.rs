//! Physical layer of the simulated bus.
//!
//! This module provides:
//! - [`transceiver`]: per-node conversion between bits and CAN_L/CAN_H levels
//! - [`wires`]: wired-AND resolution of every transceiver's output
//! - [`watchdog`]: termination emulation and idle detection
//!
//! The bus is modelled as a pair of analog samples per step. A dominant bit
//! pulls CAN_L down and CAN_H up; a recessive bit leaves both lines at the
//! bias level. Since the resolved pair is the lowest CAN_L and the highest
//! CAN_H on the bus, one dominant driver is enough to make the bus dominant.
//!
//! # Examples
//!
//! ```rust
//! use libcansim::physical::{wires, DOMINANT_HIGH, DOMINANT_LOW, RECESSIVE_LEVEL};
//!
//! let (low, high) = wires::resolve(
//!     &[DOMINANT_LOW, RECESSIVE_LEVEL],
//!     &[DOMINANT_HIGH, RECESSIVE_LEVEL],
//! )
//! .unwrap();
//! assert_eq!((low, high), (DOMINANT_LOW, DOMINANT_HIGH));
//! ```

pub mod transceiver;
pub mod watchdog;
pub mod wires;

pub use transceiver::Transceiver;
pub use watchdog::{BusTiming, Watchdog};
pub use wires::Wires;

use crate::types::Voltage;

pub const DOMINANT_LOW: Voltage = Voltage(1.5);
pub const DOMINANT_HIGH: Voltage = Voltage(3.5);
pub const RECESSIVE_LEVEL: Voltage = Voltage(2.5);

/// Operating range of either line
pub const MIN_VOLTAGE: Voltage = Voltage(0.5);
pub const MAX_VOLTAGE: Voltage = Voltage(4.5);

/// Resolved bus lines, read by every transceiver and the watchdog
pub const CAN_L: &str = "can_l";
pub const CAN_H: &str = "can_h";

/// Transceiver outputs, read by the wires
pub const CAN_L_DRIVE: &str = "can_l.drive";
pub const CAN_H_DRIVE: &str = "can_h.drive";

/// Watchdog requests for one recessive bit of bus bias
pub const RECESSIVE_REQUEST: &str = "bus.recessive_request";
