//! End-to-end relay over loopback UDP.
//!
//! A small scanner simulator answers the SLAMTEC request/response protocol on
//! one socket; the relay connects to it as a network lidar and streams JSON
//! datagrams to a second socket owned by the test.

use approx::assert_relative_eq;
use setu_io::devices::create_device;
use setu_io::devices::slamtec::protocol::{
    ANS_TYPE_DEVHEALTH, ANS_TYPE_DEVINFO, ANS_TYPE_MEASUREMENT, CMD_GET_DEVICE_HEALTH,
    CMD_GET_DEVICE_INFO, CMD_SCAN, SYNC_BYTE, encode_measurement_node, encode_response_header,
};
use setu_io::error::exit_code;
use setu_io::session::Session;
use setu_io::streaming::{LidarMessage, MESSAGE_TYPE, UdpSender};
use setu_io::transport::TransportSelector;
use setu_io::{Config, Error};
use std::net::UdpSocket;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Angles of one simulated revolution, start node first
const REVOLUTION_DEG: [u16; 4] = [270, 0, 90, 180];
const REVOLUTIONS: usize = 3;

struct ScannerSim {
    port: u16,
    done: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl ScannerSim {
    fn spawn(health_status: u8) -> Self {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        socket.set_read_timeout(Some(Duration::from_millis(50))).unwrap();
        let port = socket.local_addr().unwrap().port();
        let done = Arc::new(AtomicBool::new(false));
        let stop = Arc::clone(&done);

        let handle = thread::spawn(move || {
            let mut buf = [0u8; 64];
            while !stop.load(Ordering::SeqCst) {
                let Ok((n, peer)) = socket.recv_from(&mut buf) else {
                    continue;
                };
                if n < 2 || buf[0] != SYNC_BYTE {
                    continue;
                }
                let reply = match buf[1] {
                    CMD_GET_DEVICE_INFO => {
                        let mut reply = encode_response_header(20, 0, ANS_TYPE_DEVINFO).to_vec();
                        reply.extend([0x18, 0x1D, 0x01, 0x07]);
                        reply.extend(*b"LOOPBACK-SCANNER");
                        reply
                    }
                    CMD_GET_DEVICE_HEALTH => {
                        let mut reply =
                            encode_response_header(3, 0, ANS_TYPE_DEVHEALTH).to_vec();
                        reply.extend([health_status, 0x02, 0x80]);
                        reply
                    }
                    CMD_SCAN => {
                        socket
                            .send_to(&encode_response_header(5, 1, ANS_TYPE_MEASUREMENT), peer)
                            .unwrap();
                        let mut nodes = Vec::new();
                        for _ in 0..REVOLUTIONS {
                            for (i, deg) in REVOLUTION_DEG.iter().enumerate() {
                                nodes.extend(encode_measurement_node(i == 0, 10, deg * 64, 4000));
                            }
                        }
                        // Closing start flag completes the last revolution
                        nodes.extend(encode_measurement_node(true, 10, 270 * 64, 4000));
                        nodes
                    }
                    _ => continue,
                };
                socket.send_to(&reply, peer).unwrap();
            }
        });

        Self { port, done, handle }
    }

    fn selector(&self) -> TransportSelector {
        TransportSelector::Network {
            host: "127.0.0.1".to_string(),
            port: self.port,
        }
    }

    fn shutdown(self) {
        self.done.store(true, Ordering::SeqCst);
        self.handle.join().unwrap();
    }
}

fn receiver() -> UdpSocket {
    let rx = UdpSocket::bind("127.0.0.1:0").unwrap();
    rx.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
    rx
}

fn relay_config(sender_port: u16) -> Config {
    let mut config = Config::default();
    config.device.timeout_ms = 200;
    config.sender.port = sender_port;
    config.scan.settle_delay_ms = 0;
    config
}

#[test]
fn test_network_lidar_relay() {
    let sim = ScannerSim::spawn(0);
    let rx = receiver();
    let config = relay_config(rx.local_addr().unwrap().port());

    let driver = create_device(&config).unwrap();
    let mut session = Session::open(driver, &sim.selector(), &config).unwrap();
    assert_eq!(session.device_info().serial_hex().len(), 32);
    assert_eq!(session.device_info().firmware_minor(), 29);

    let running = session.shutdown_handle();
    let relay = thread::spawn(move || session.run());

    let mut received = Vec::new();
    let mut buf = [0u8; 256];
    for _ in 0..REVOLUTIONS * REVOLUTION_DEG.len() {
        let n = rx.recv(&mut buf).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&buf[..n]).unwrap();
        received.push(value);
    }
    running.store(false, Ordering::SeqCst);

    let stats = relay.join().unwrap().unwrap();
    sim.shutdown();

    assert_eq!(stats.scans, REVOLUTIONS as u64);
    assert_eq!(stats.samples_sent, (REVOLUTIONS * REVOLUTION_DEG.len()) as u64);

    // Each revolution arrives sorted by angle
    for revolution in received.chunks(REVOLUTION_DEG.len()) {
        let angles: Vec<f64> = revolution
            .iter()
            .map(|v| v["angle"].as_f64().unwrap())
            .collect();
        assert_eq!(angles, vec![0.0, 90.0, 180.0, 270.0]);
        for message in revolution {
            assert_eq!(message["type"], MESSAGE_TYPE);
            assert_relative_eq!(message["distance"].as_f64().unwrap(), 1000.0);
            assert_eq!(message["quality"], 10);
        }
    }
}

#[test]
fn test_unhealthy_network_lidar_is_rejected() {
    let sim = ScannerSim::spawn(2);
    let config = relay_config(7000);

    let driver = create_device(&config).unwrap();
    let err = Session::open(driver, &sim.selector(), &config).err().unwrap();
    sim.shutdown();

    assert!(matches!(err, Error::Health(0x8002)));
    assert_eq!(err.exit_code(), exit_code::HEALTH);
}

#[test]
fn test_silent_network_lidar() {
    // Bound but never answers
    let silent = UdpSocket::bind("127.0.0.1:0").unwrap();
    let selector = TransportSelector::Network {
        host: "127.0.0.1".to_string(),
        port: silent.local_addr().unwrap().port(),
    };
    let config = relay_config(7000);

    let driver = create_device(&config).unwrap();
    let err = Session::open(driver, &selector, &config).err().unwrap();
    assert!(matches!(err, Error::DeviceQuery(_)));
    assert_eq!(err.exit_code(), exit_code::CONNECT);
}

#[test]
fn test_sender_and_message_format() {
    let rx = receiver();
    let mut sender = UdpSender::new("127.0.0.1", rx.local_addr().unwrap().port());
    sender.init().unwrap();

    let message = LidarMessage {
        kind: MESSAGE_TYPE,
        distance: 1523.25,
        angle: 12.5,
        quality: 47,
    };
    sender.send(&message.to_bytes().unwrap()).unwrap();
    sender.close();
    sender.close();

    let mut buf = [0u8; 128];
    let n = rx.recv(&mut buf).unwrap();
    assert_eq!(
        std::str::from_utf8(&buf[..n]).unwrap(),
        r#"{"type":"LIDAR","distance":1523.25,"angle":12.5,"quality":47}"#
    );
    assert!(matches!(sender.send(b"late"), Err(Error::NotInitialized)));
}
