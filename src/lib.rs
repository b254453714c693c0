// Bus layers
pub mod data_link; // Frames, bit stuffing and the protocol controller
pub mod physical; // Transceivers, wires and the idle watchdog
pub mod transport; // Single-frame ISO-TP
pub mod application; // Diagnostic servers, testers and OBD-II

// Simulation driver and bus assembly
pub mod network;
pub mod sim;

// Re-exports for convenience
pub use application::obdii;
pub use data_link::{Controller, Frame};
pub use network::{Network, NetworkConfig};
pub use transport::isotp;

// Common types and traits
pub mod error;
pub mod types;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
