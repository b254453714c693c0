use std::collections::HashMap;

use super::Signal;
use crate::data_link::{Frame, StateReport};
use crate::error::{Result, SimError};
use crate::transport::isotp::IsoTpMessage;
use crate::types::{Bit, Voltage};

/// Named, double-buffered value channels.
///
/// Values written during a step become readable in the following step and
/// are discarded after it. Any number of components may write to or read
/// from the same channel.
#[derive(Debug, Default)]
pub struct Channels {
    current: HashMap<String, Vec<Signal>>,
    next: HashMap<String, Vec<Signal>>,
}

macro_rules! typed_reader {
    ($name:ident, $variant:ident, $ty:ty, $expected:literal) => {
        pub fn $name(&self, channel: &str) -> Result<Vec<$ty>> {
            self.read_all(channel)
                .iter()
                .map(|signal| match signal {
                    Signal::$variant(value) => Ok(value.clone()),
                    other => Err(SimError::MalformedPayload {
                        channel: channel.to_string(),
                        expected: $expected,
                        found: other.kind(),
                    }),
                })
                .collect()
        }
    };
}

impl Channels {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a value for delivery on the next step.
    pub fn write(&mut self, channel: &str, value: Signal) {
        self.next.entry(channel.to_string()).or_default().push(value);
    }

    /// All values delivered on `channel` this step, in write order.
    pub fn read_all(&self, channel: &str) -> &[Signal] {
        self.current
            .get(channel)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    typed_reader!(read_bits, Bit, Bit, "bit");
    typed_reader!(read_voltages, Voltage, Voltage, "voltage");
    typed_reader!(read_frames, Frame, Frame, "frame");
    typed_reader!(read_states, State, StateReport, "controller state");
    typed_reader!(read_messages, Message, IsoTpMessage, "ISO-TP message");

    /// Reads a channel that carries at most one bit per step.
    pub fn read_single_bit(&self, channel: &str) -> Result<Option<Bit>> {
        let bits = self.read_bits(channel)?;
        match bits.as_slice() {
            [] => Ok(None),
            [bit] => Ok(Some(*bit)),
            _ => Err(SimError::UnexpectedSampleCount {
                channel: channel.to_string(),
                count: bits.len(),
            }),
        }
    }

    /// Values written this step and not yet delivered
    pub fn pending(&self) -> usize {
        self.next.values().map(Vec::len).sum()
    }

    /// Delivers the values written during the previous step.
    pub(crate) fn advance(&mut self) {
        self.current = std::mem::take(&mut self.next);
    }

    pub(crate) fn delivered(&self) -> impl Iterator<Item = (&str, &[Signal])> {
        self.current
            .iter()
            .map(|(name, values)| (name.as_str(), values.as_slice()))
    }
}
