//! Diagnostic nodes built on the single-frame transport.
//!
//! This module provides:
//! - [`ServiceTable`]: per node type dispatch from a request to its reply
//! - [`DiagnosticServer`]: answers requests addressed to one ECU
//! - [`DiagnosticClient`]: a tester that sends requests and collects replies
//! - [`obdii`]: OBD-II (ISO 15031) services and PID scaling
//!
//! Servers listen on their physical address and on the functional broadcast
//! id, and answer on `physical address + 0x08`. Several servers may answer
//! one functional request; their replies reach the client in identifier
//! order, since the lowest response id wins arbitration.
//!
//! # Examples
//!
//! ```rust
//! use libcansim::application::obdii::{EngineEcu, PID_ENGINE_RPM, SID_SHOW_CURRENT_DATA};
//! use libcansim::application::ServiceTable;
//! use libcansim::transport::{Addressing, IsoTpMessage};
//!
//! let mut ecu = EngineEcu::default();
//! let request = IsoTpMessage::new(SID_SHOW_CURRENT_DATA, PID_ENGINE_RPM, &[]);
//! let reply = ecu.respond(Addressing::Functional, &request).unwrap();
//! assert_eq!(reply.service_id, 0x41);
//! ```

pub mod obdii;

use log::{debug, warn};

use crate::error::Result;
use crate::sim::{Activation, Channels, Component, NodePorts, Signal};
use crate::transport::isotp::{response_id, FUNCTIONAL_BROADCAST_ID, RESPONSE_ID_RANGE};
use crate::transport::{Addressing, IsoTpConfig, IsoTpMessage};
use crate::types::{CanId, Config};

pub use obdii::EngineEcu;

/// Services a node type supports.
///
/// `None` means the request is not supported under that addressing mode; the
/// server skips it without replying.
pub trait ServiceTable {
    fn respond(&mut self, addressing: Addressing, request: &IsoTpMessage) -> Option<IsoTpMessage>;
}

/// ECU answering diagnostic requests received by its controller
pub struct DiagnosticServer<T: ServiceTable> {
    ports: NodePorts,
    config: IsoTpConfig,
    table: T,
}

impl<T: ServiceTable> DiagnosticServer<T> {
    pub fn new(ports: NodePorts, config: IsoTpConfig, table: T) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            ports,
            config,
            table,
        })
    }

    pub fn table(&self) -> &T {
        &self.table
    }
}

impl<T: ServiceTable> Component for DiagnosticServer<T> {
    fn name(&self) -> &str {
        &self.ports.name
    }

    fn activate(&mut self, io: &mut Channels) -> Result<Activation> {
        for frame in io.read_frames(&self.ports.rx_frame)? {
            let Some(addressing) = Addressing::classify(frame.id, self.config.physical_address)
            else {
                continue;
            };

            let request = match IsoTpMessage::from_frame(&frame) {
                Ok(request) => request,
                Err(err) => {
                    warn!("{}: dropping frame 0x{:03X}: {}", self.ports.name, frame.id, err);
                    continue;
                }
            };

            match self.table.respond(addressing, &request) {
                Some(reply) => {
                    debug!(
                        "{}: answering service 0x{:02X} pid 0x{:02X}",
                        self.ports.name, request.service_id, request.parameter_id
                    );
                    let frame = reply.to_frame(self.config.response_id(), self.config.padding_value)?;
                    io.write(&self.ports.tx_frame, Signal::Frame(frame));
                }
                None => warn!(
                    "{}: unsupported request service 0x{:02X} pid 0x{:02X} ({:?})",
                    self.ports.name, request.service_id, request.parameter_id, addressing
                ),
            }
        }

        Ok(Activation::Idle)
    }
}

/// A request scheduled by a [`DiagnosticClient`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientRequest {
    pub target: CanId,
    pub message: IsoTpMessage,
}

impl ClientRequest {
    /// Request broadcast to every server
    pub fn functional(message: IsoTpMessage) -> Self {
        Self {
            target: FUNCTIONAL_BROADCAST_ID,
            message,
        }
    }

    /// Request sent to the server at `address`
    pub fn physical(address: CanId, message: IsoTpMessage) -> Self {
        Self {
            target: address,
            message,
        }
    }
}

/// Diagnostic tester.
///
/// Sends its scripted requests on the first activation and republishes every
/// decodable reply on `<name>.responses`. Replies are accepted from the
/// response id of each physically addressed server, and from the whole
/// server response range once a functional request went out.
pub struct DiagnosticClient {
    ports: NodePorts,
    responses: String,
    pending: Vec<ClientRequest>,
    awaited: Vec<CanId>,
    functional: bool,
    padding: u8,
}

impl DiagnosticClient {
    pub fn new(ports: NodePorts, requests: Vec<ClientRequest>) -> Self {
        Self {
            responses: format!("{}.responses", ports.name),
            ports,
            pending: requests,
            awaited: Vec::new(),
            functional: false,
            padding: 0x00,
        }
    }

    pub fn with_padding(mut self, padding: u8) -> Self {
        self.padding = padding;
        self
    }

    /// Channel carrying decoded replies
    pub fn responses_channel(&self) -> &str {
        &self.responses
    }

    /// Whether a frame on `id` answers one of the requests sent so far
    pub fn accepts(&self, id: CanId) -> bool {
        self.awaited.contains(&id) || (self.functional && RESPONSE_ID_RANGE.contains(&id))
    }
}

impl Component for DiagnosticClient {
    fn name(&self) -> &str {
        &self.ports.name
    }

    fn activate(&mut self, io: &mut Channels) -> Result<Activation> {
        for request in self.pending.drain(..) {
            let frame = request.message.to_frame(request.target, self.padding)?;
            debug!("{}: requesting on 0x{:03X}", self.ports.name, request.target);
            io.write(&self.ports.tx_frame, Signal::Frame(frame));

            if request.target == FUNCTIONAL_BROADCAST_ID {
                self.functional = true;
            } else {
                self.awaited.push(response_id(request.target));
            }
        }

        for frame in io.read_frames(&self.ports.rx_frame)? {
            if !self.accepts(frame.id) {
                continue;
            }
            match IsoTpMessage::from_frame(&frame) {
                Ok(reply) => io.write(&self.responses, Signal::Message(reply)),
                Err(err) => warn!(
                    "{}: undecodable reply on 0x{:03X}: {}",
                    self.ports.name, frame.id, err
                ),
            }
        }

        Ok(Activation::Idle)
    }
}
