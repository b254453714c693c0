//! Bit-level codec for classic base-format frames.
//!
//! Wire layout: `SOF | ID(11) | DLC(4) | DATA(DLC*8)`, bit-stuffed after
//! every five identical bits, followed by the unstuffed `EOF(7) | IFS(3)`
//! trailer. All fields are transmitted MSB first.

use super::frame::{Frame, MAX_DLC};
use crate::error::DecodeError;
use crate::types::{Bit, BitSequence, CanId};

/// Identical bits after which a stuff bit is inserted
pub const STUFF_RUN_LENGTH: usize = 5;

pub const SOF_BITS: usize = 1;
pub const ID_BITS: usize = 11;
pub const DLC_BITS: usize = 4;
pub const EOF_BITS: usize = 7;
pub const IFS_BITS: usize = 3;

/// Destuffed bits up to and including the identifier
pub const ARBITRATION_BITS: usize = SOF_BITS + ID_BITS;
/// Destuffed bits up to and including the DLC
pub const HEADER_BITS: usize = SOF_BITS + ID_BITS + DLC_BITS;
/// Recessive bits closing every frame
pub const TRAILER_BITS: usize = EOF_BITS + IFS_BITS;

/// Inserts the complementary bit after every `run_length` identical bits.
///
/// The stuff bit starts the next run. A run completed by the last input bit
/// is still followed by its stuff bit. A `run_length` of zero behaves as one.
pub fn stuff(bits: &[Bit], run_length: usize) -> BitSequence {
    let run_length = run_length.max(1);
    let mut out = Vec::with_capacity(bits.len() + bits.len() / run_length + 1);
    let mut last = None;
    let mut run = 0;

    for &bit in bits {
        out.push(bit);
        if last == Some(bit) {
            run += 1;
        } else {
            last = Some(bit);
            run = 1;
        }
        if run >= run_length {
            let stuffed = !bit;
            out.push(stuffed);
            last = Some(stuffed);
            run = 1;
        }
    }

    out
}

/// Removes the stuff bits inserted by [`stuff`].
pub fn destuff(bits: &[Bit], run_length: usize) -> Result<BitSequence, DecodeError> {
    let mut destuffer = Destuffer::new(run_length);
    let mut out = Vec::with_capacity(bits.len());
    for &bit in bits {
        if let Some(data_bit) = destuffer.push(bit)? {
            out.push(data_bit);
        }
    }
    Ok(out)
}

/// Bit-at-a-time inverse of [`stuff`].
#[derive(Debug, Clone)]
pub struct Destuffer {
    run_length: usize,
    last: Option<Bit>,
    run: usize,
    expect_stuff: bool,
    position: usize,
}

impl Destuffer {
    pub fn new(run_length: usize) -> Self {
        Self {
            run_length: run_length.max(1),
            last: None,
            run: 0,
            expect_stuff: false,
            position: 0,
        }
    }

    /// Feeds one raw bit. Returns the data bit, or `None` for a stuff bit.
    pub fn push(&mut self, bit: Bit) -> Result<Option<Bit>, DecodeError> {
        let position = self.position;
        self.position += 1;

        if self.expect_stuff {
            if self.last == Some(bit) {
                return Err(DecodeError::StuffViolation(position));
            }
            self.last = Some(bit);
            self.run = 1;
            self.expect_stuff = false;
            return Ok(None);
        }

        if self.last == Some(bit) {
            self.run += 1;
        } else {
            self.last = Some(bit);
            self.run = 1;
        }
        if self.run >= self.run_length {
            self.expect_stuff = true;
        }
        Ok(Some(bit))
    }

    /// True when the next raw bit is a stuff bit.
    pub fn expects_stuff_bit(&self) -> bool {
        self.expect_stuff
    }
}

fn push_field(bits: &mut BitSequence, value: u32, width: usize) {
    for shift in (0..width).rev() {
        bits.push(Bit::from_bool((value >> shift) & 1 == 1));
    }
}

fn read_field(bits: &[Bit]) -> u32 {
    bits.iter()
        .fold(0, |acc, &bit| (acc << 1) | u32::from(bit.as_bool()))
}

/// Encodes a frame into its complete on-wire bit sequence.
pub fn frame_to_bits(frame: &Frame) -> Result<BitSequence, DecodeError> {
    frame.check()?;

    let mut body = Vec::with_capacity(HEADER_BITS + frame.data.len() * 8);
    body.push(Bit::Dominant);
    push_field(&mut body, u32::from(frame.id), ID_BITS);
    push_field(&mut body, u32::from(frame.dlc()), DLC_BITS);
    for &byte in &frame.data {
        push_field(&mut body, u32::from(byte), 8);
    }

    let mut bits = stuff(&body, STUFF_RUN_LENGTH);
    bits.extend(std::iter::repeat(Bit::Recessive).take(TRAILER_BITS));
    Ok(bits)
}

/// Decodes identifier and DLC from the first [`HEADER_BITS`] destuffed bits.
pub fn decode_header(bits: &[Bit]) -> Result<(CanId, u8), DecodeError> {
    if bits.len() < HEADER_BITS {
        return Err(DecodeError::InsufficientBits {
            needed: HEADER_BITS,
            available: bits.len(),
        });
    }
    if !bits[0].is_dominant() {
        return Err(DecodeError::MissingStartOfFrame);
    }
    let id = read_field(&bits[SOF_BITS..ARBITRATION_BITS]) as CanId;
    let dlc = read_field(&bits[ARBITRATION_BITS..HEADER_BITS]) as u8;
    if dlc > MAX_DLC {
        return Err(DecodeError::InvalidDlc(dlc));
    }
    Ok((id, dlc))
}

/// Decodes a complete on-wire bit sequence produced by [`frame_to_bits`].
pub fn bits_to_frame(bits: &[Bit]) -> Result<Frame, DecodeError> {
    let mut decoder = FrameDecoder::new();
    for &bit in bits {
        if let Some(frame) = decoder.push(bit)? {
            return Ok(frame);
        }
    }
    Err(DecodeError::InsufficientBits {
        needed: decoder.min_bits_needed(),
        available: bits.len(),
    })
}

/// Incremental frame decoder fed one raw bus bit at a time.
///
/// Once the header has been destuffed the exact payload length is known;
/// the decoder then consumes a trailing stuff bit if one is due, collects
/// the trailer and yields the frame.
#[derive(Debug, Clone)]
pub struct FrameDecoder {
    destuffer: Destuffer,
    body: BitSequence,
    body_len: Option<usize>,
    trailer: BitSequence,
    consumed: usize,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self {
            destuffer: Destuffer::new(STUFF_RUN_LENGTH),
            body: Vec::with_capacity(HEADER_BITS + 64),
            body_len: None,
            trailer: Vec::with_capacity(TRAILER_BITS),
            consumed: 0,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Raw bits consumed since the last reset
    pub fn consumed(&self) -> usize {
        self.consumed
    }

    /// Data bits recovered so far (SOF included, stuff bits excluded)
    pub fn destuffed_len(&self) -> usize {
        self.body.len()
    }

    fn body_complete(&self) -> bool {
        matches!(self.body_len, Some(len) if self.body.len() == len)
            && !self.destuffer.expects_stuff_bit()
    }

    /// Lower bound on the raw bits a complete frame needs, given what was seen so far.
    pub fn min_bits_needed(&self) -> usize {
        let body_len = self.body_len.unwrap_or(HEADER_BITS);
        let pending_stuff = usize::from(self.destuffer.expects_stuff_bit());
        self.consumed
            + (body_len - self.body.len())
            + pending_stuff
            + (TRAILER_BITS - self.trailer.len())
    }

    pub fn push(&mut self, bit: Bit) -> Result<Option<Frame>, DecodeError> {
        self.consumed += 1;

        if !self.body_complete() {
            if let Some(data_bit) = self.destuffer.push(bit)? {
                if self.body.is_empty() && !data_bit.is_dominant() {
                    return Err(DecodeError::MissingStartOfFrame);
                }
                self.body.push(data_bit);
                if self.body.len() == HEADER_BITS {
                    let (_, dlc) = decode_header(&self.body)?;
                    self.body_len = Some(HEADER_BITS + dlc as usize * 8);
                }
            }
            return Ok(None);
        }

        self.trailer.push(bit);
        if self.trailer.len() < TRAILER_BITS {
            return Ok(None);
        }

        if let Some(pos) = self.trailer.iter().position(|b| b.is_dominant()) {
            return Err(DecodeError::BadTrailer(pos));
        }
        let (id, _) = decode_header(&self.body)?;
        let data: Vec<u8> = self.body[HEADER_BITS..]
            .chunks(8)
            .map(|byte| read_field(byte) as u8)
            .collect();
        Frame::new(id, &data).map(Some)
    }
}
