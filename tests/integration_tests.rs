use libcansim::application::{
    obdii::{
        decode_response, EngineEcu, PidData, PID_ENGINE_RPM, PID_THROTTLE_POS,
        SID_SHOW_CURRENT_DATA, SID_SHOW_FREEZE_FRAME,
    },
    ClientRequest, DiagnosticClient, DiagnosticServer,
};
use libcansim::data_link::{ControllerConfig, ControllerOptions, ControllerState, Frame};
use libcansim::error::SimError;
use libcansim::network::{Network, NetworkConfig};
use libcansim::sim::{NodePorts, Signal};
use libcansim::transport::{IsoTpConfig, IsoTpMessage};
use libcansim::types::Voltage;

use ControllerState::*;

fn network() -> Network {
    Network::new(NetworkConfig::default()).unwrap()
}

fn options(options: ControllerOptions) -> ControllerConfig {
    ControllerConfig {
        options,
        ..Default::default()
    }
}

#[test]
fn test_full_stack_arbitration() {
    let mut network = network();
    let a = network.attach("a", ControllerConfig::default()).unwrap();
    let b = network.attach("b", ControllerConfig::default()).unwrap();
    let c = network.attach("c", options(ControllerOptions::LISTEN_ONLY)).unwrap();

    let high = Frame::new(0x100, &[0x11]).unwrap();
    let low = Frame::new(0x200, &[0x22, 0x33]).unwrap();
    network.send(&a, high.clone());
    network.send(&b, low.clone());
    network.run().unwrap();

    // the lower identifier goes first, the loser retries afterwards
    assert_eq!(network.received_frames(&c), vec![high.clone(), low.clone()]);
    assert_eq!(network.received_frames(&a), vec![low]);
    assert_eq!(network.received_frames(&b), vec![high]);

    assert_eq!(
        network.state_history(0),
        vec![WaitForBusIdle, Arbitration, Transmit, Idle, Receive, Idle]
    );
    assert_eq!(
        network.state_history(1),
        vec![
            WaitForBusIdle,
            Arbitration,
            Receive,
            Idle,
            WaitForBusIdle,
            Arbitration,
            Transmit,
            Idle
        ]
    );
    assert_eq!(
        network.state_history(2),
        vec![Idle, Receive, Idle, Receive, Idle]
    );
}

#[test]
fn test_full_stack_one_shot() {
    let mut network = network();
    let a = network.attach("a", ControllerConfig::default()).unwrap();
    let b = network.attach("b", options(ControllerOptions::ONE_SHOT)).unwrap();
    let c = network.attach("c", ControllerConfig::default()).unwrap();

    let winner = Frame::new(0x0F0, &[]).unwrap();
    network.send(&a, winner.clone());
    network.send(&b, Frame::new(0x0F1, &[0xFF; 8]).unwrap());
    network.run().unwrap();

    assert_eq!(network.received_frames(&c), vec![winner]);
    assert!(network.received_frames(&a).is_empty());
    assert_eq!(
        network.state_history(1),
        vec![WaitForBusIdle, Arbitration, Receive, Idle]
    );
}

#[test]
fn test_full_stack_back_to_back_frames() {
    let mut network = network();
    let sender = network.attach("sender", ControllerConfig::default()).unwrap();
    let listener = network.attach("listener", ControllerConfig::default()).unwrap();

    // long dominant and recessive runs exercise stuffing in both directions
    let frames = vec![
        Frame::new(0x000, &[0x00; 8]).unwrap(),
        Frame::new(0x7FF, &[0xFF; 8]).unwrap(),
        Frame::new(0x555, &[]).unwrap(),
    ];
    for frame in &frames {
        network.send(&sender, frame.clone());
    }
    network.run().unwrap();

    assert_eq!(network.received_frames(&listener), frames);
}

fn obd_network(requests: Vec<ClientRequest>) -> (Network, String) {
    let mut network = network();

    let tester = network.attach("tester", ControllerConfig::default()).unwrap();
    let client = DiagnosticClient::new(tester, requests);
    let responses = client.responses_channel().to_string();
    network.probe(&responses);
    network.add(client);

    let ecus = [
        ("engine", 0x7E0, 1750.0),
        ("transmission", 0x7E1, 800.0),
    ];
    for (name, address, rpm) in ecus {
        let ports = network.attach(name, ControllerConfig::default()).unwrap();
        let config = IsoTpConfig {
            physical_address: address,
            ..Default::default()
        };
        let ecu = EngineEcu {
            rpm,
            ..Default::default()
        };
        network.add(DiagnosticServer::new(ports, config, ecu).unwrap());
    }

    (network, responses)
}

fn replies(network: &Network, channel: &str) -> Vec<IsoTpMessage> {
    network
        .probed(channel)
        .iter()
        .filter_map(|(_, signal)| match signal {
            Signal::Message(message) => Some(message.clone()),
            _ => None,
        })
        .collect()
}

#[test]
fn test_full_stack_obd_functional_request() {
    let request = IsoTpMessage::new(SID_SHOW_CURRENT_DATA, PID_ENGINE_RPM, &[]);
    let (mut network, responses) = obd_network(vec![ClientRequest::functional(request)]);
    network.run().unwrap();

    let replies = replies(&network, &responses);
    assert_eq!(replies.len(), 2);
    assert_eq!(
        decode_response(&replies[0]).unwrap(),
        PidData::EngineRpm(1750.0)
    );
    assert_eq!(
        decode_response(&replies[1]).unwrap(),
        PidData::EngineRpm(800.0)
    );

    let tester = NodePorts::for_node("tester");
    let ids: Vec<u16> = network
        .received_frames(&tester)
        .iter()
        .map(|frame| frame.id)
        .collect();
    assert_eq!(ids, vec![0x7E8, 0x7E9]);
}

#[test]
fn test_full_stack_obd_physical_request() {
    let request = IsoTpMessage::new(SID_SHOW_FREEZE_FRAME, PID_ENGINE_RPM, &[0x00]);
    let (mut network, responses) = obd_network(vec![ClientRequest::physical(0x7E0, request)]);
    network.run().unwrap();

    let replies = replies(&network, &responses);
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].service_id, 0x42);
    assert_eq!(
        decode_response(&replies[0]).unwrap(),
        PidData::EngineRpm(3000.0)
    );
}

#[test]
fn test_full_stack_obd_custom_address() {
    let mut network = network();

    let tester = network.attach("tester", ControllerConfig::default()).unwrap();
    let request = IsoTpMessage::new(SID_SHOW_CURRENT_DATA, PID_ENGINE_RPM, &[]);
    let client = DiagnosticClient::new(tester.clone(), vec![ClientRequest::physical(0x700, request)]);
    let responses = client.responses_channel().to_string();
    network.probe(&responses);
    network.add(client);

    let ports = network.attach("body", ControllerConfig::default()).unwrap();
    let config = IsoTpConfig {
        physical_address: 0x700,
        ..Default::default()
    };
    network.add(DiagnosticServer::new(ports, config, EngineEcu::default()).unwrap());
    network.run().unwrap();

    let replies = replies(&network, &responses);
    assert_eq!(replies.len(), 1);
    assert_eq!(
        decode_response(&replies[0]).unwrap(),
        PidData::EngineRpm(1750.0)
    );
    let ids: Vec<u16> = network
        .received_frames(&tester)
        .iter()
        .map(|frame| frame.id)
        .collect();
    assert_eq!(ids, vec![0x708]);
}

#[test]
fn test_full_stack_obd_unsupported_pid() {
    let request = IsoTpMessage::new(SID_SHOW_CURRENT_DATA, PID_THROTTLE_POS, &[]);
    let (mut network, responses) = obd_network(vec![ClientRequest::functional(request)]);
    network.run().unwrap();

    assert!(replies(&network, &responses).is_empty());
    let engine = NodePorts::for_node("engine");
    assert_eq!(network.received_frames(&engine).len(), 1);
}

#[test]
fn test_full_stack_error_handling() {
    let mut network = network();
    let listener = network
        .attach("listener", options(ControllerOptions::LISTEN_ONLY))
        .unwrap();
    network.send(&listener, Frame::new(0x123, &[]).unwrap());
    assert!(matches!(network.run(), Err(SimError::ListenOnly(name)) if name == "listener"));

    // a corrupted payload stops the run on the step it is read
    let mut corrupted = Network::new(NetworkConfig::default()).unwrap();
    let node = corrupted.attach("node", ControllerConfig::default()).unwrap();
    corrupted.probe(&node.tx_frame);
    corrupted.add(Corrupter(node.tx_frame.clone()));
    assert!(matches!(
        corrupted.run(),
        Err(SimError::MalformedPayload {
            expected: "frame",
            found: "voltage",
            ..
        })
    ));
    assert_eq!(corrupted.simulation().step_count(), 1);
    assert_eq!(corrupted.probed(&node.tx_frame).len(), 1);
}

/// Writes a voltage where a frame is expected.
struct Corrupter(String);

impl libcansim::sim::Component for Corrupter {
    fn name(&self) -> &str {
        "corrupter"
    }

    fn activate(
        &mut self,
        io: &mut libcansim::sim::Channels,
    ) -> libcansim::error::Result<libcansim::sim::Activation> {
        io.write(&self.0, Signal::Voltage(Voltage(2.5)));
        Ok(libcansim::sim::Activation::Idle)
    }
}
