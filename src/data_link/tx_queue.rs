use std::collections::VecDeque;

use super::bits::frame_to_bits;
use super::frame::Frame;
use crate::error::{Result, SimError};
use crate::types::{Bit, BitSequence};

pub const TX_QUEUE_SIZE: usize = 32;

/// An encoded frame and how far it has been written to the bus.
#[derive(Debug, Clone)]
pub struct TxCursor {
    frame: Frame,
    bits: BitSequence,
    offset: usize,
}

impl TxCursor {
    pub fn new(frame: Frame) -> Result<Self> {
        let bits = frame_to_bits(&frame)?;
        Ok(Self {
            frame,
            bits,
            offset: 0,
        })
    }

    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    pub fn bits(&self) -> &[Bit] {
        &self.bits
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    pub fn is_exhausted(&self) -> bool {
        self.offset == self.bits.len()
    }

    /// Returns the next bit to write and advances the offset.
    pub fn advance(&mut self) -> Option<Bit> {
        let bit = self.bits.get(self.offset).copied()?;
        self.offset += 1;
        Some(bit)
    }

    /// Rewinds to the start of frame for a retry.
    pub fn rewind(&mut self) {
        self.offset = 0;
    }
}

/// Bounded FIFO of frames awaiting transmission. Only the head is on the bus.
#[derive(Debug)]
pub struct TxQueue {
    cursors: VecDeque<TxCursor>,
    capacity: usize,
}

impl Default for TxQueue {
    fn default() -> Self {
        Self::new(TX_QUEUE_SIZE)
    }
}

impl TxQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            cursors: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, frame: Frame) -> Result<()> {
        if self.cursors.len() >= self.capacity {
            return Err(SimError::BufferOverflow);
        }
        self.cursors.push_back(TxCursor::new(frame)?);
        Ok(())
    }

    pub fn head(&self) -> Option<&TxCursor> {
        self.cursors.front()
    }

    pub fn head_mut(&mut self) -> Option<&mut TxCursor> {
        self.cursors.front_mut()
    }

    pub fn pop(&mut self) -> Option<TxCursor> {
        self.cursors.pop_front()
    }

    pub fn len(&self) -> usize {
        self.cursors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cursors.is_empty()
    }

    /// Get space available in the queue
    pub fn space(&self) -> usize {
        self.capacity.saturating_sub(self.cursors.len())
    }
}
