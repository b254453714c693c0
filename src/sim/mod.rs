//! Synchronous step driver.
//!
//! Every registered [`Component`] is activated once per step. Components talk
//! only through named [`Channels`]; a value written in step `n` is visible in
//! step `n + 1`, which gives every hop exactly one step of propagation delay.
//! Activation order inside a step is therefore irrelevant.
//!
//! A run ends on the first error or at quiescence: a step in which nothing
//! was written and no component asked to [`Activation::Continue`].

mod channels;

pub use channels::Channels;

use std::collections::HashMap;

use log::{debug, trace};

use crate::data_link::{Frame, StateReport};
use crate::error::{Result, SimError};
use crate::transport::isotp::IsoTpMessage;
use crate::types::{Bit, Config, Voltage};

/// The closed set of values a channel can carry.
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    Bit(Bit),
    Voltage(Voltage),
    Frame(Frame),
    State(StateReport),
    Message(IsoTpMessage),
}

impl Signal {
    pub fn kind(&self) -> &'static str {
        match self {
            Signal::Bit(_) => "bit",
            Signal::Voltage(_) => "voltage",
            Signal::Frame(_) => "frame",
            Signal::State(_) => "controller state",
            Signal::Message(_) => "ISO-TP message",
        }
    }
}

/// What a component wants from the driver after an activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    /// Nothing left to do unless new input arrives
    Idle,
    /// Keep stepping even if no values are in flight
    Continue,
}

/// A unit of simulated hardware or node logic.
pub trait Component {
    fn name(&self) -> &str;

    /// Reads this step's inputs and writes outputs for the next step.
    fn activate(&mut self, io: &mut Channels) -> Result<Activation>;
}

/// Channel names owned by one node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodePorts {
    pub name: String,
    /// Controller to transceiver
    pub tx_bit: String,
    /// Transceiver to controller
    pub rx_bit: String,
    /// Node logic to controller
    pub tx_frame: String,
    /// Controller to node logic
    pub rx_frame: String,
}

impl NodePorts {
    pub fn for_node(name: &str) -> Self {
        Self {
            name: name.to_string(),
            tx_bit: format!("{name}.tx_bit"),
            rx_bit: format!("{name}.rx_bit"),
            tx_frame: format!("{name}.tx_frame"),
            rx_frame: format!("{name}.rx_frame"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SimConfig {
    pub max_steps: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self { max_steps: 100_000 }
    }
}

impl Config for SimConfig {
    fn validate(&self) -> Result<()> {
        if self.max_steps == 0 {
            return Err(SimError::InvalidParameter("max_steps must be non-zero".into()));
        }
        Ok(())
    }
}

pub struct Simulation {
    config: SimConfig,
    components: Vec<Box<dyn Component>>,
    channels: Channels,
    step: u64,
    probes: HashMap<String, Vec<(u64, Signal)>>,
}

impl Simulation {
    pub fn new(config: SimConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            components: Vec::new(),
            channels: Channels::new(),
            step: 0,
            probes: HashMap::new(),
        })
    }

    pub fn add<C: Component + 'static>(&mut self, component: C) {
        debug!("registering component `{}`", component.name());
        self.components.push(Box::new(component));
    }

    /// Records every value delivered on `channel` from now on.
    pub fn probe(&mut self, channel: &str) {
        self.probes.entry(channel.to_string()).or_default();
    }

    /// Values seen on a probed channel, with the step they were delivered in
    pub fn probed(&self, channel: &str) -> &[(u64, Signal)] {
        self.probes
            .get(channel)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Writes a value from outside the simulation; it is delivered next step.
    pub fn inject(&mut self, channel: &str, value: Signal) {
        self.channels.write(channel, value);
    }

    /// Number of steps executed so far
    pub fn step_count(&self) -> u64 {
        self.step
    }

    /// Runs one step. Returns `false` once the simulation is quiescent.
    pub fn step(&mut self) -> Result<bool> {
        let step = self.step;
        self.channels.advance();
        for (channel, values) in self.channels.delivered() {
            if let Some(record) = self.probes.get_mut(channel) {
                record.extend(values.iter().map(|value| (step, value.clone())));
            }
        }

        let mut keep_running = false;
        for component in &mut self.components {
            if component.activate(&mut self.channels)? == Activation::Continue {
                keep_running = true;
            }
        }

        let pending = self.channels.pending();
        trace!("step {}: {} values in flight", step, pending);
        self.step += 1;
        Ok(keep_running || pending > 0)
    }

    /// Steps until quiescence and returns the number of steps executed.
    pub fn run(&mut self) -> Result<u64> {
        while self.step()? {
            if self.step >= self.config.max_steps {
                return Err(SimError::StepLimitExceeded(self.step));
            }
        }
        debug!("simulation quiescent after {} steps", self.step);
        Ok(self.step)
    }
}
