use crate::data_link::frame::{Frame, MAX_DLC, MAX_ID};
use crate::error::{Result, SimError};
use crate::types::{CanId, Config};

const SF_PCI: u8 = 0x00; // Single Frame

/// Identifier every diagnostic server listens to
pub const FUNCTIONAL_BROADCAST_ID: CanId = 0x7DF;

/// Distance between a server's physical address and its response id
pub const RESPONSE_ID_OFFSET: CanId = 0x08;

/// Response identifiers assigned to diagnostic servers
pub const RESPONSE_ID_RANGE: std::ops::RangeInclusive<CanId> = 0x7E8..=0x7EF;

/// Bytes after the PCI in a classic single frame
pub const SINGLE_FRAME_CAPACITY: usize = 7;

/// Data bytes left after service and parameter ids
pub const MAX_SINGLE_FRAME_DATA: usize = SINGLE_FRAME_CAPACITY - 2;

/// How a request reached a server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Addressing {
    /// Broadcast to every server
    Functional,
    /// Sent to this server's own address
    Physical,
}

impl Addressing {
    /// Addressing of a frame as seen by the server at `physical_address`, or
    /// `None` when the frame is meant for someone else.
    pub fn classify(frame_id: CanId, physical_address: CanId) -> Option<Self> {
        if frame_id == FUNCTIONAL_BROADCAST_ID {
            Some(Addressing::Functional)
        } else if frame_id == physical_address {
            Some(Addressing::Physical)
        } else {
            None
        }
    }
}

/// Response identifier of the server at `physical_address`
pub fn response_id(physical_address: CanId) -> CanId {
    physical_address + RESPONSE_ID_OFFSET
}

/// Diagnostic request or response in one single frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IsoTpMessage {
    pub service_id: u8,
    pub parameter_id: u8,
    pub data: Vec<u8>,
}

impl IsoTpMessage {
    pub fn new(service_id: u8, parameter_id: u8, data: &[u8]) -> Self {
        Self {
            service_id,
            parameter_id,
            data: data.to_vec(),
        }
    }

    /// Packs the message into a padded 8 byte frame.
    pub fn to_frame(&self, id: CanId, padding: u8) -> Result<Frame> {
        if self.data.len() > MAX_SINGLE_FRAME_DATA {
            return Err(SimError::IsoTp(format!(
                "{} data bytes do not fit a single frame",
                self.data.len()
            )));
        }

        let mut payload = Vec::with_capacity(MAX_DLC as usize);
        payload.push(SF_PCI | (2 + self.data.len()) as u8);
        payload.push(self.service_id);
        payload.push(self.parameter_id);
        payload.extend_from_slice(&self.data);
        payload.resize(MAX_DLC as usize, padding);

        Ok(Frame::new(id, &payload)?)
    }

    pub fn from_frame(frame: &Frame) -> Result<Self> {
        if frame.dlc() != MAX_DLC {
            return Err(SimError::IsoTp(format!(
                "single frame must carry {} bytes, got {}",
                MAX_DLC,
                frame.dlc()
            )));
        }

        let pci = frame.data[0];
        if pci & 0xF0 != SF_PCI {
            return Err(SimError::IsoTp(format!(
                "unsupported frame type 0x{:X}",
                pci >> 4
            )));
        }

        let length = (pci & 0x0F) as usize;
        if !(2..=SINGLE_FRAME_CAPACITY).contains(&length) {
            return Err(SimError::IsoTp(format!(
                "invalid single frame length {length}"
            )));
        }

        Ok(Self {
            service_id: frame.data[1],
            parameter_id: frame.data[2],
            data: frame.data[3..1 + length].to_vec(),
        })
    }
}

/// Diagnostic server addressing
#[derive(Debug, Clone)]
pub struct IsoTpConfig {
    pub physical_address: CanId,
    pub padding_value: u8,
}

impl IsoTpConfig {
    pub fn response_id(&self) -> CanId {
        response_id(self.physical_address)
    }
}

impl Config for IsoTpConfig {
    fn validate(&self) -> Result<()> {
        if self.physical_address == FUNCTIONAL_BROADCAST_ID {
            return Err(SimError::InvalidParameter(
                "physical address collides with the functional broadcast id".into(),
            ));
        }
        if self.physical_address > MAX_ID - RESPONSE_ID_OFFSET {
            return Err(SimError::InvalidParameter(format!(
                "physical address 0x{:03X} leaves no room for a response id",
                self.physical_address
            )));
        }
        Ok(())
    }
}

impl Default for IsoTpConfig {
    fn default() -> Self {
        Self {
            physical_address: 0x7E0,
            padding_value: 0x00,
        }
    }
}
