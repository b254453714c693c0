use std::collections::BTreeMap;

use log::debug;

use super::{CAN_L, RECESSIVE_REQUEST};
use crate::data_link::bits::TRAILER_BITS;
use crate::data_link::{ControllerState, StateReport, CONTROLLER_STATE};
use crate::error::{Result, SimError};
use crate::sim::{Activation, Channels, Component, Signal};
use crate::types::{Bit, Config, NodeId};

/// Steps a bit needs to travel controller → transceiver → wires →
/// transceiver → controller
pub const PROPAGATION_STEPS: u32 = 4;

/// Idle-detection thresholds, in silent steps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusTiming {
    pub start_threshold: u32,
    pub stop_threshold: u32,
}

impl Default for BusTiming {
    fn default() -> Self {
        let start_threshold = PROPAGATION_STEPS;
        Self {
            start_threshold,
            stop_threshold: (TRAILER_BITS as u32 + 1) * (start_threshold + PROPAGATION_STEPS),
        }
    }
}

impl Config for BusTiming {
    fn validate(&self) -> Result<()> {
        if self.start_threshold < PROPAGATION_STEPS {
            return Err(SimError::InvalidParameter(format!(
                "start_threshold must be at least {PROPAGATION_STEPS}"
            )));
        }
        if self.stop_threshold <= self.start_threshold {
            return Err(SimError::InvalidParameter(
                "stop_threshold must exceed start_threshold".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogAction {
    /// Drive one recessive bit onto the bus
    RequestRecessive,
    Continue,
    /// Every controller has been idle long enough
    Stop,
}

/// Emulates the termination resistors of an undriven bus.
///
/// While some controller is busy and the bus has been silent for longer than
/// a bit's round trip, the watchdog biases the bus recessive for one bit. This
/// clocks nodes waiting for bus idle. Once every controller is idle and the
/// bus has stayed silent long enough for any of them to have started
/// arbitration, it lets the simulation quiesce.
#[derive(Debug)]
pub struct Watchdog {
    timing: BusTiming,
    states: BTreeMap<NodeId, ControllerState>,
    idle_steps: u32,
}

impl Watchdog {
    pub fn new(timing: BusTiming) -> Result<Self> {
        timing.validate()?;
        Ok(Self {
            timing,
            states: BTreeMap::new(),
            idle_steps: 0,
        })
    }

    /// Consecutive steps without a bus sample
    pub fn idle_steps(&self) -> u32 {
        self.idle_steps
    }

    /// Last reported state of `node`
    pub fn state_of(&self, node: NodeId) -> Option<ControllerState> {
        self.states.get(&node).copied()
    }

    pub fn all_idle(&self) -> bool {
        self.states
            .values()
            .all(|state| *state == ControllerState::Idle)
    }

    /// Folds one step of observations into the watchdog.
    pub fn observe(&mut self, bus_active: bool, reports: &[StateReport]) -> WatchdogAction {
        for report in reports {
            self.states.insert(report.node, report.state);
        }

        if bus_active {
            self.idle_steps = 0;
        } else {
            self.idle_steps = self.idle_steps.saturating_add(1);
        }

        let all_idle = self.all_idle();
        if !all_idle && self.idle_steps > self.timing.start_threshold {
            self.idle_steps = 0;
            WatchdogAction::RequestRecessive
        } else if all_idle && self.idle_steps > self.timing.stop_threshold {
            WatchdogAction::Stop
        } else {
            WatchdogAction::Continue
        }
    }
}

impl Component for Watchdog {
    fn name(&self) -> &str {
        "watchdog"
    }

    fn activate(&mut self, io: &mut Channels) -> Result<Activation> {
        let bus_active = !io.read_voltages(CAN_L)?.is_empty();
        let reports = io.read_states(CONTROLLER_STATE)?;

        match self.observe(bus_active, &reports) {
            WatchdogAction::RequestRecessive => {
                debug!("watchdog: bus silent, requesting recessive bit");
                io.write(RECESSIVE_REQUEST, Signal::Bit(Bit::Recessive));
                Ok(Activation::Continue)
            }
            WatchdogAction::Continue => Ok(Activation::Continue),
            WatchdogAction::Stop => Ok(Activation::Idle),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(node: NodeId, state: ControllerState) -> StateReport {
        StateReport { node, state }
    }

    #[test]
    fn test_default_timing() {
        let timing = BusTiming::default();
        assert_eq!(timing.start_threshold, 4);
        assert_eq!(timing.stop_threshold, 88);
        assert!(timing.validate().is_ok());

        let bad = BusTiming {
            start_threshold: 2,
            ..timing
        };
        assert!(bad.validate().is_err());
        let bad = BusTiming {
            start_threshold: 10,
            stop_threshold: 10,
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_requests_one_bit_after_start_threshold() {
        let timing = BusTiming::default();
        let mut watchdog = Watchdog::new(timing).unwrap();
        let waiting = [report(0, ControllerState::WaitForBusIdle)];

        assert_eq!(watchdog.observe(false, &waiting), WatchdogAction::Continue);
        for _ in 1..timing.start_threshold {
            assert_eq!(watchdog.observe(false, &[]), WatchdogAction::Continue);
        }
        assert_eq!(watchdog.idle_steps(), timing.start_threshold);

        assert_eq!(
            watchdog.observe(false, &[]),
            WatchdogAction::RequestRecessive
        );
        assert_eq!(watchdog.idle_steps(), 0);
        assert_eq!(watchdog.observe(false, &[]), WatchdogAction::Continue);
    }

    #[test]
    fn test_bus_activity_resets_counter() {
        let mut watchdog = Watchdog::new(BusTiming::default()).unwrap();
        let busy = [report(0, ControllerState::Transmit)];
        watchdog.observe(false, &busy);
        for _ in 0..20 {
            // a bit every round trip never looks like a silent bus
            for _ in 0..PROPAGATION_STEPS - 1 {
                assert_eq!(watchdog.observe(false, &[]), WatchdogAction::Continue);
            }
            assert_eq!(watchdog.observe(true, &[]), WatchdogAction::Continue);
        }
    }

    #[test]
    fn test_stops_once_all_idle() {
        let timing = BusTiming::default();
        let mut watchdog = Watchdog::new(timing).unwrap();
        let reports = [
            report(0, ControllerState::Idle),
            report(1, ControllerState::Receive),
        ];
        watchdog.observe(true, &reports);
        assert!(!watchdog.all_idle());

        watchdog.observe(true, &[report(1, ControllerState::Idle)]);
        assert!(watchdog.all_idle());
        assert_eq!(watchdog.state_of(1), Some(ControllerState::Idle));

        for _ in 0..timing.stop_threshold {
            assert_eq!(watchdog.observe(false, &[]), WatchdogAction::Continue);
        }
        assert_eq!(watchdog.observe(false, &[]), WatchdogAction::Stop);
    }

    #[test]
    fn test_activation_writes_request() {
        let mut watchdog = Watchdog::new(BusTiming::default()).unwrap();
        let mut io = Channels::new();
        io.write(
            CONTROLLER_STATE,
            Signal::State(report(0, ControllerState::WaitForBusIdle)),
        );

        let mut requests = 0;
        for _ in 0..10 {
            io.advance();
            requests += io.read_bits(RECESSIVE_REQUEST).unwrap().len();
            assert_eq!(watchdog.activate(&mut io).unwrap(), Activation::Continue);
        }
        assert_eq!(requests, 1);
    }
}
