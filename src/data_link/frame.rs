use crate::error::DecodeError;
use crate::types::CanId;

/// Largest 11-bit identifier
pub const MAX_ID: CanId = 0x7FF;

/// Largest payload of a classic frame
pub const MAX_DLC: u8 = 8;

/// Generic frame data type
pub type FrameData = Vec<u8>;

/// Classic base-format data frame. The DLC is the payload length.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frame {
    pub id: CanId,
    pub data: FrameData,
}

impl Frame {
    /// Builds a frame, rejecting identifiers above 11 bits and payloads above 8 bytes.
    pub fn new(id: CanId, data: &[u8]) -> Result<Self, DecodeError> {
        let frame = Self {
            id,
            data: data.to_vec(),
        };
        frame.check()?;
        Ok(frame)
    }

    pub fn dlc(&self) -> u8 {
        self.data.len() as u8
    }

    pub fn is_valid(&self) -> bool {
        self.check().is_ok()
    }

    pub(crate) fn check(&self) -> Result<(), DecodeError> {
        if self.id > MAX_ID {
            return Err(DecodeError::InvalidId(self.id));
        }
        if self.data.len() > MAX_DLC as usize {
            return Err(DecodeError::InvalidDlc(self.data.len() as u8));
        }
        Ok(())
    }
}
