use log::trace;

use super::{
    CAN_H, CAN_H_DRIVE, CAN_L, CAN_L_DRIVE, MAX_VOLTAGE, MIN_VOLTAGE, RECESSIVE_LEVEL,
    RECESSIVE_REQUEST,
};
use crate::error::{Result, SimError};
use crate::sim::{Activation, Channels, Component, Signal};
use crate::types::{Bit, Voltage};

/// Resolves paired line samples into the observed bus pair.
///
/// The lowest CAN_L and the highest CAN_H win, so a single dominant driver
/// overrides any number of recessive ones.
pub fn resolve(lows: &[Voltage], highs: &[Voltage]) -> Result<(Voltage, Voltage)> {
    if lows.is_empty() || highs.is_empty() {
        return Err(SimError::MissingSamples);
    }
    if lows.len() != highs.len() {
        return Err(SimError::SampleCountMismatch {
            low: lows.len(),
            high: highs.len(),
        });
    }

    for sample in lows.iter().chain(highs) {
        if *sample < MIN_VOLTAGE || *sample > MAX_VOLTAGE {
            return Err(SimError::VoltageOutOfRange(sample.volts()));
        }
    }
    for (low, high) in lows.iter().zip(highs) {
        if low > high {
            return Err(SimError::LowAboveHigh {
                low: low.volts(),
                high: high.volts(),
            });
        }
    }

    let low = lows.iter().copied().fold(MAX_VOLTAGE, |acc, v| if v < acc { v } else { acc });
    let high = highs.iter().copied().fold(MIN_VOLTAGE, |acc, v| if v > acc { v } else { acc });
    Ok((low, high))
}

/// The shared medium every transceiver drives.
#[derive(Debug, Default)]
pub struct Wires {
    powered: bool,
}

impl Wires {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Component for Wires {
    fn name(&self) -> &str {
        "wires"
    }

    fn activate(&mut self, io: &mut Channels) -> Result<Activation> {
        let mut lows = io.read_voltages(CAN_L_DRIVE)?;
        let mut highs = io.read_voltages(CAN_H_DRIVE)?;

        // bus bias at power-up
        let mut bias = usize::from(!self.powered);
        self.powered = true;

        for bit in io.read_bits(RECESSIVE_REQUEST)? {
            if bit != Bit::Recessive {
                return Err(SimError::MalformedPayload {
                    channel: RECESSIVE_REQUEST.to_string(),
                    expected: "recessive bit",
                    found: "dominant bit",
                });
            }
            bias += 1;
        }

        lows.extend(std::iter::repeat(RECESSIVE_LEVEL).take(bias));
        highs.extend(std::iter::repeat(RECESSIVE_LEVEL).take(bias));

        if lows.is_empty() && highs.is_empty() {
            return Ok(Activation::Idle);
        }

        let (low, high) = resolve(&lows, &highs)?;
        trace!("bus: {} drivers -> ({}, {})", lows.len(), low, high);
        io.write(CAN_L, Signal::Voltage(low));
        io.write(CAN_H, Signal::Voltage(high));
        Ok(Activation::Idle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physical::{DOMINANT_HIGH, DOMINANT_LOW};

    fn volts(values: &[f32]) -> Vec<Voltage> {
        values.iter().copied().map(Voltage).collect()
    }

    #[test]
    fn test_wired_and() {
        let (low, high) = resolve(&volts(&[1.5, 2.5]), &volts(&[3.7, 2.5])).unwrap();
        assert_eq!(low, Voltage(1.5));
        assert_eq!(high, Voltage(3.7));

        let (low, high) = resolve(&volts(&[2.5, 2.5]), &volts(&[2.5, 2.5])).unwrap();
        assert_eq!((low, high), (RECESSIVE_LEVEL, RECESSIVE_LEVEL));
    }

    #[test]
    fn test_rejects_invalid_samples() {
        assert!(matches!(resolve(&[], &[]), Err(SimError::MissingSamples)));
        assert!(matches!(
            resolve(&volts(&[2.5]), &[]),
            Err(SimError::MissingSamples)
        ));
        assert!(matches!(
            resolve(&volts(&[1.5, 2.5]), &volts(&[3.5])),
            Err(SimError::SampleCountMismatch { low: 2, high: 1 })
        ));
        assert!(matches!(
            resolve(&volts(&[3.5]), &volts(&[1.5])),
            Err(SimError::LowAboveHigh { .. })
        ));
        assert!(matches!(
            resolve(&volts(&[0.2]), &volts(&[2.5])),
            Err(SimError::VoltageOutOfRange(_))
        ));
        assert!(matches!(
            resolve(&volts(&[2.5]), &volts(&[5.0])),
            Err(SimError::VoltageOutOfRange(_))
        ));
    }

    #[test]
    fn test_power_up_bias_then_silence() {
        let mut wires = Wires::new();
        let mut io = Channels::new();

        wires.activate(&mut io).unwrap();
        io.advance();
        assert_eq!(io.read_voltages(CAN_L).unwrap(), vec![RECESSIVE_LEVEL]);
        assert_eq!(io.read_voltages(CAN_H).unwrap(), vec![RECESSIVE_LEVEL]);

        wires.activate(&mut io).unwrap();
        io.advance();
        assert!(io.read_all(CAN_L).is_empty());
        assert_eq!(io.pending(), 0);
    }

    #[test]
    fn test_dominant_driver_overrides_bias_request() {
        let mut wires = Wires::new();
        let mut io = Channels::new();
        wires.activate(&mut io).unwrap();
        io.advance();

        io.write(CAN_L_DRIVE, Signal::Voltage(DOMINANT_LOW));
        io.write(CAN_H_DRIVE, Signal::Voltage(DOMINANT_HIGH));
        io.write(RECESSIVE_REQUEST, Signal::Bit(Bit::Recessive));
        io.advance();
        wires.activate(&mut io).unwrap();
        io.advance();

        assert_eq!(io.read_voltages(CAN_L).unwrap(), vec![DOMINANT_LOW]);
        assert_eq!(io.read_voltages(CAN_H).unwrap(), vec![DOMINANT_HIGH]);
    }

    #[test]
    fn test_dominant_request_is_malformed() {
        let mut wires = Wires::new();
        let mut io = Channels::new();
        io.write(RECESSIVE_REQUEST, Signal::Bit(Bit::Dominant));
        io.advance();
        assert!(matches!(
            wires.activate(&mut io),
            Err(SimError::MalformedPayload { .. })
        ));
    }
}
