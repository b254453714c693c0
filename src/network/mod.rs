//! Assembles nodes, transceivers and the shared bus into one simulation.
//!
//! # Examples
//!
//! ```rust
//! use libcansim::data_link::{ControllerConfig, Frame};
//! use libcansim::network::{Network, NetworkConfig};
//!
//! let mut network = Network::new(NetworkConfig::default()).unwrap();
//! let sender = network.attach("sender", ControllerConfig::default()).unwrap();
//! let listener = network.attach("listener", ControllerConfig::default()).unwrap();
//!
//! let frame = Frame::new(0x123, &[0xDE, 0xAD]).unwrap();
//! network.send(&sender, frame.clone());
//! network.run().unwrap();
//!
//! assert_eq!(network.received_frames(&listener), vec![frame]);
//! ```

use log::info;

use crate::data_link::{Controller, ControllerConfig, ControllerState, Frame, CONTROLLER_STATE};
use crate::error::{Result, SimError};
use crate::physical::{BusTiming, Transceiver, Watchdog, Wires};
use crate::sim::{Component, NodePorts, Signal, SimConfig, Simulation};
use crate::types::{Config, NodeId};

#[derive(Debug, Clone, Default)]
pub struct NetworkConfig {
    pub sim: SimConfig,
    pub timing: BusTiming,
}

impl Config for NetworkConfig {
    fn validate(&self) -> Result<()> {
        self.sim.validate()?;
        self.timing.validate()
    }
}

/// One bus with any number of attached nodes
pub struct Network {
    sim: Simulation,
    nodes: Vec<NodePorts>,
}

impl Network {
    /// Creates a bus with its wires and idle watchdog and no nodes.
    pub fn new(config: NetworkConfig) -> Result<Self> {
        config.validate()?;
        let mut sim = Simulation::new(config.sim)?;
        sim.add(Wires::new());
        sim.add(Watchdog::new(config.timing)?);
        sim.probe(CONTROLLER_STATE);
        Ok(Self {
            sim,
            nodes: Vec::new(),
        })
    }

    /// Adds a controller and its transceiver under `name`.
    pub fn attach(&mut self, name: &str, config: ControllerConfig) -> Result<NodePorts> {
        if self.node_id(name).is_some() {
            return Err(SimError::InvalidParameter(format!(
                "node `{name}` already attached"
            )));
        }

        let node = self.nodes.len();
        let ports = NodePorts::for_node(name);
        self.sim.add(Controller::new(node, ports.clone(), config)?);
        self.sim.add(Transceiver::new(ports.clone()));
        self.sim.probe(&ports.rx_frame);
        self.nodes.push(ports.clone());
        Ok(ports)
    }

    /// Adds node logic such as a diagnostic server.
    pub fn add<C: Component + 'static>(&mut self, component: C) {
        self.sim.add(component);
    }

    pub fn node_id(&self, name: &str) -> Option<NodeId> {
        self.nodes.iter().position(|ports| ports.name == name)
    }

    pub fn nodes(&self) -> &[NodePorts] {
        &self.nodes
    }

    /// Hands a frame to a node's controller on the next step.
    pub fn send(&mut self, ports: &NodePorts, frame: Frame) {
        self.sim.inject(&ports.tx_frame, Signal::Frame(frame));
    }

    pub fn probe(&mut self, channel: &str) {
        self.sim.probe(channel);
    }

    pub fn probed(&self, channel: &str) -> &[(u64, Signal)] {
        self.sim.probed(channel)
    }

    /// Runs until the bus is quiescent and returns the step count.
    pub fn run(&mut self) -> Result<u64> {
        let steps = self.sim.run()?;
        info!("bus quiescent after {} steps", steps);
        Ok(steps)
    }

    pub fn simulation(&self) -> &Simulation {
        &self.sim
    }

    /// Frames a node's controller has received, in order
    pub fn received_frames(&self, ports: &NodePorts) -> Vec<Frame> {
        self.probed(&ports.rx_frame)
            .iter()
            .filter_map(|(_, signal)| match signal {
                Signal::Frame(frame) => Some(frame.clone()),
                _ => None,
            })
            .collect()
    }

    /// Every state `node` has reported, in order
    pub fn state_history(&self, node: NodeId) -> Vec<ControllerState> {
        self.probed(CONTROLLER_STATE)
            .iter()
            .filter_map(|(_, signal)| match signal {
                Signal::State(report) if report.node == node => Some(report.state),
                _ => None,
            })
            .collect()
    }
}
