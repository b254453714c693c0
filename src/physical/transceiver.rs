use log::trace;

use super::{CAN_H, CAN_H_DRIVE, CAN_L, CAN_L_DRIVE, DOMINANT_HIGH, DOMINANT_LOW, RECESSIVE_LEVEL};
use crate::error::{Result, SimError};
use crate::sim::{Activation, Channels, Component, NodePorts, Signal};
use crate::types::{Bit, Voltage};

/// Line driver and receiver of one node
pub struct Transceiver {
    ports: NodePorts,
}

impl Transceiver {
    pub fn new(ports: NodePorts) -> Self {
        Self { ports }
    }

    /// Levels driven for `bit`, as (CAN_L, CAN_H)
    pub fn encode(bit: Bit) -> (Voltage, Voltage) {
        match bit {
            Bit::Dominant => (DOMINANT_LOW, DOMINANT_HIGH),
            Bit::Recessive => (RECESSIVE_LEVEL, RECESSIVE_LEVEL),
        }
    }

    /// Bit carried by a resolved bus pair
    pub fn decode(low: Voltage, high: Voltage) -> Result<Bit> {
        if (low, high) == (DOMINANT_LOW, DOMINANT_HIGH) {
            Ok(Bit::Dominant)
        } else if (low, high) == (RECESSIVE_LEVEL, RECESSIVE_LEVEL) {
            Ok(Bit::Recessive)
        } else {
            Err(SimError::UnknownBusLevel {
                low: low.volts(),
                high: high.volts(),
            })
        }
    }
}

impl Component for Transceiver {
    fn name(&self) -> &str {
        &self.ports.name
    }

    fn activate(&mut self, io: &mut Channels) -> Result<Activation> {
        if let Some(bit) = io.read_single_bit(&self.ports.tx_bit)? {
            let (low, high) = Self::encode(bit);
            io.write(CAN_L_DRIVE, Signal::Voltage(low));
            io.write(CAN_H_DRIVE, Signal::Voltage(high));
        }

        let lows = io.read_voltages(CAN_L)?;
        let highs = io.read_voltages(CAN_H)?;
        match (lows.as_slice(), highs.as_slice()) {
            ([], []) => {}
            ([low], [high]) => {
                let bit = Self::decode(*low, *high)?;
                trace!("{}: rx {:?}", self.ports.name, bit);
                io.write(&self.ports.rx_bit, Signal::Bit(bit));
            }
            _ if lows.len() != highs.len() => {
                return Err(SimError::SampleCountMismatch {
                    low: lows.len(),
                    high: highs.len(),
                })
            }
            _ => {
                return Err(SimError::UnexpectedSampleCount {
                    channel: CAN_L.to_string(),
                    count: lows.len(),
                })
            }
        }

        Ok(Activation::Idle)
    }
}
