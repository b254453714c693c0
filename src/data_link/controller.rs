use bitflags::bitflags;
use log::{debug, info, trace, warn};

use super::bits::{FrameDecoder, ARBITRATION_BITS, TRAILER_BITS};
use super::frame::Frame;
use super::tx_queue::{TxQueue, TX_QUEUE_SIZE};
use super::CONTROLLER_STATE;
use crate::error::{Result, SimError};
use crate::sim::{Activation, Channels, Component, NodePorts, Signal};
use crate::types::{Bit, Config, NodeId};

/// Protocol phase of one node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControllerState {
    Idle,
    WaitForBusIdle,
    Arbitration,
    Transmit,
    Receive,
}

/// Broadcast by a controller whenever its state changes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateReport {
    pub node: NodeId,
    pub state: ControllerState,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ControllerOptions: u32 {
        const NONE = 0;
        const LISTEN_ONLY = 1;
        const ONE_SHOT = 2;
    }
}

/// Controller configuration
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub options: ControllerOptions,
    pub tx_queue_size: usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            options: ControllerOptions::NONE,
            tx_queue_size: TX_QUEUE_SIZE,
        }
    }
}

impl Config for ControllerConfig {
    fn validate(&self) -> Result<()> {
        if self.tx_queue_size == 0 {
            return Err(SimError::InvalidParameter(
                "tx_queue_size must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControllerStats {
    pub frames_sent: u32,
    pub frames_received: u32,
    pub arbitration_lost: u32,
}

/// Outputs of one clock of the state machine
#[derive(Debug, Default, PartialEq)]
pub struct Clocked {
    pub tx: Option<Bit>,
    pub received: Option<Frame>,
}

/// Per-node protocol controller.
///
/// Clocked by the bus: each observed bit advances the state machine by one
/// step and, while transmitting, releases the next bit of the queue head. The
/// bit it wrote comes back through the transceiver and wires, so comparing
/// the echo against the last written bit is all arbitration needs.
pub struct Controller {
    node: NodeId,
    ports: NodePorts,
    config: ControllerConfig,
    state: ControllerState,
    reported: Option<ControllerState>,
    queue: TxQueue,
    decoder: FrameDecoder,
    recessive_run: usize,
    last_sent: Option<Bit>,
    stats: ControllerStats,
}

impl Controller {
    pub fn new(node: NodeId, ports: NodePorts, config: ControllerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            node,
            ports,
            queue: TxQueue::new(config.tx_queue_size),
            config,
            state: ControllerState::Idle,
            reported: None,
            decoder: FrameDecoder::new(),
            recessive_run: 0,
            last_sent: None,
            stats: ControllerStats::default(),
        })
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn stats(&self) -> ControllerStats {
        self.stats
    }

    /// Get number of frames pending in TX queue
    pub fn tx_pending(&self) -> usize {
        self.queue.len()
    }

    /// Offset of the queue head's cursor, if any
    pub fn tx_offset(&self) -> Option<usize> {
        self.queue.head().map(|cursor| cursor.offset())
    }

    pub fn enqueue(&mut self, frame: Frame) -> Result<()> {
        if self.config.options.contains(ControllerOptions::LISTEN_ONLY) {
            return Err(SimError::ListenOnly(self.ports.name.clone()));
        }
        debug!("{}: queued frame 0x{:03X}", self.ports.name, frame.id);
        self.queue.push(frame)
    }

    /// Advances the state machine by one observed bus bit, or by none.
    pub fn clock(&mut self, input: Option<Bit>) -> Result<Clocked> {
        let mut out = Clocked::default();

        match self.state {
            ControllerState::Idle => match input {
                Some(Bit::Dominant) => self.begin_receive()?,
                // an undriven bus is an idle bus
                _ if !self.queue.is_empty() => {
                    self.recessive_run = 0;
                    self.transition(ControllerState::WaitForBusIdle);
                }
                _ => {}
            },

            ControllerState::WaitForBusIdle => match input {
                Some(Bit::Dominant) => self.begin_receive()?,
                Some(Bit::Recessive) => {
                    self.recessive_run += 1;
                    if self.recessive_run > TRAILER_BITS {
                        self.decoder.reset();
                        self.transition(ControllerState::Arbitration);
                        out.tx = self.write_next();
                        if out.tx.is_none() {
                            self.transition(ControllerState::Idle);
                        }
                    }
                }
                None => {}
            },

            ControllerState::Arbitration => {
                if let Some(bit) = input {
                    out.tx = self.arbitrate(bit)?;
                }
            }

            ControllerState::Transmit => {
                if input.is_some() {
                    out.tx = self.write_next();
                    if out.tx.is_none() {
                        self.finish_transmit();
                    }
                }
            }

            ControllerState::Receive => {
                if let Some(bit) = input {
                    out.received = self.receive(bit)?;
                }
            }
        }

        Ok(out)
    }

    fn transition(&mut self, next: ControllerState) {
        if self.state != next {
            debug!("{}: {:?} -> {:?}", self.ports.name, self.state, next);
            self.state = next;
        }
    }

    fn begin_receive(&mut self) -> Result<()> {
        self.decoder.reset();
        self.decoder.push(Bit::Dominant)?;
        self.recessive_run = 0;
        self.transition(ControllerState::Receive);
        Ok(())
    }

    fn write_next(&mut self) -> Option<Bit> {
        let bit = self.queue.head_mut().and_then(|cursor| cursor.advance());
        trace!("{}: tx {:?}", self.ports.name, bit);
        self.last_sent = bit;
        bit
    }

    fn arbitrate(&mut self, echo: Bit) -> Result<Option<Bit>> {
        let sent = self.last_sent.unwrap_or(Bit::Recessive);

        match (sent, echo) {
            (Bit::Recessive, Bit::Dominant) => {
                self.stats.arbitration_lost += 1;
                self.last_sent = None;
                if self.config.options.contains(ControllerOptions::ONE_SHOT) {
                    if let Some(cursor) = self.queue.pop() {
                        warn!(
                            "{}: dropped frame 0x{:03X} after losing arbitration",
                            self.ports.name,
                            cursor.frame().id
                        );
                    }
                } else if let Some(cursor) = self.queue.head_mut() {
                    cursor.rewind();
                }
                debug!("{}: lost arbitration", self.ports.name);
                // the decoder already holds every bit seen on the bus so far
                self.decoder.push(echo)?;
                self.transition(ControllerState::Receive);
                Ok(None)
            }
            (Bit::Dominant, Bit::Recessive) => Err(SimError::BusFault {
                node: self.ports.name.clone(),
            }),
            _ => {
                self.decoder.push(echo)?;
                if self.decoder.destuffed_len() >= ARBITRATION_BITS {
                    debug!("{}: won arbitration", self.ports.name);
                    self.transition(ControllerState::Transmit);
                }
                Ok(self.write_next())
            }
        }
    }

    fn finish_transmit(&mut self) {
        if let Some(cursor) = self.queue.pop() {
            self.stats.frames_sent += 1;
            info!(
                "{}: sent frame 0x{:03X} {:02X?}",
                self.ports.name,
                cursor.frame().id,
                cursor.frame().data
            );
        }
        self.last_sent = None;
        self.decoder.reset();
        self.transition(ControllerState::Idle);
    }

    fn receive(&mut self, bit: Bit) -> Result<Option<Frame>> {
        match self.decoder.push(bit) {
            Ok(Some(frame)) => {
                self.stats.frames_received += 1;
                info!(
                    "{}: received frame 0x{:03X} {:02X?}",
                    self.ports.name, frame.id, frame.data
                );
                self.decoder.reset();
                self.transition(ControllerState::Idle);
                Ok(Some(frame))
            }
            Ok(None) => Ok(None),
            Err(err) => {
                self.decoder.reset();
                self.transition(ControllerState::Idle);
                Err(err.into())
            }
        }
    }
}

impl Component for Controller {
    fn name(&self) -> &str {
        &self.ports.name
    }

    fn activate(&mut self, io: &mut Channels) -> Result<Activation> {
        for frame in io.read_frames(&self.ports.tx_frame)? {
            self.enqueue(frame)?;
        }

        let input = io.read_single_bit(&self.ports.rx_bit)?;
        let clocked = self.clock(input)?;

        if let Some(bit) = clocked.tx {
            io.write(&self.ports.tx_bit, Signal::Bit(bit));
        }
        if let Some(frame) = clocked.received {
            io.write(&self.ports.rx_frame, Signal::Frame(frame));
        }
        if self.reported != Some(self.state) {
            io.write(
                CONTROLLER_STATE,
                Signal::State(StateReport {
                    node: self.node,
                    state: self.state,
                }),
            );
            self.reported = Some(self.state);
        }

        Ok(Activation::Idle)
    }
}
