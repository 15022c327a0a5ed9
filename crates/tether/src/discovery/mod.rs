// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! UDP multicast discovery client.
//!
//! Publishers announce themselves on a well-known multicast endpoint; this
//! client sends and receives those control packets and dispatches decoded
//! ones to registered callbacks.
//!
//! # Architecture
//!
//! ```text
//! recv_from() -> DiscoveryHeader::unpack() -> dispatch by msg_type
//!                                                v
//!                              connections / disconnections / bye /
//!                              subscriptions callbacks
//! ```
//!
//! A dedicated receive thread polls the socket with a short read timeout so
//! shutdown can flip the running flag and join promptly. A second thread
//! emits periodic heartbeats. Malformed and self-originated packets are
//! dropped; per the protocol contract, no error crosses the callback
//! boundary.

use crate::protocol::{
    AdvertisePacket, DiscoveryHeader, MsgType, Publisher, SubscriptionPacket, PROTOCOL_VERSION,
};
use parking_lot::Mutex;
use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Well-known multicast group for discovery traffic.
pub const DISCOVERY_MULTICAST_GROUP: Ipv4Addr = Ipv4Addr::new(224, 0, 0, 7);

/// Well-known discovery port.
pub const DISCOVERY_PORT: u16 = 10317;

/// Socket read timeout; bounds shutdown latency of the receive thread.
const READ_TIMEOUT: Duration = Duration::from_millis(250);

/// Sleep granularity of the heartbeat thread between liveness beacons.
const HEARTBEAT_POLL: Duration = Duration::from_millis(250);

/// Largest datagram the receive loop accepts.
const MAX_DATAGRAM: usize = 65536;

/// Invoked for every advertisement from a remote publisher.
pub type ConnectionsCallback = Arc<dyn Fn(&Publisher) + Send + Sync>;

/// Invoked for every unadvertisement from a remote publisher.
pub type DisconnectionsCallback = Arc<dyn Fn(&Publisher) + Send + Sync>;

/// Invoked with the process UUID of a remote that said goodbye.
pub type ByeCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Invoked with the topic of a remote subscription request.
pub type SubscriptionsCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Discovery endpoint and cadence configuration.
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    pub multicast_group: Ipv4Addr,
    pub port: u16,
    pub heartbeat_interval: Duration,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            multicast_group: DISCOVERY_MULTICAST_GROUP,
            port: DISCOVERY_PORT,
            heartbeat_interval: Duration::from_secs(1),
        }
    }
}

#[derive(Default)]
struct Callbacks {
    connections: Option<ConnectionsCallback>,
    disconnections: Option<DisconnectionsCallback>,
    bye: Option<ByeCallback>,
    subscriptions: Option<SubscriptionsCallback>,
}

struct DiscoveryInner {
    socket: UdpSocket,
    target: SocketAddrV4,
    process_uuid: String,
    heartbeat_interval: Duration,
    running: AtomicBool,
    callbacks: Mutex<Callbacks>,
}

impl DiscoveryInner {
    fn send_header_only(&self, msg_type: MsgType) -> io::Result<()> {
        let header = DiscoveryHeader::new(PROTOCOL_VERSION, &self.process_uuid, msg_type);
        let mut buffer = vec![0u8; header.header_length()];
        if header.pack(&mut buffer) == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "discovery header failed to pack",
            ));
        }
        self.socket.send_to(&buffer, self.target)?;
        Ok(())
    }

    fn send_publisher(&self, msg_type: MsgType, publisher: &Publisher) -> io::Result<()> {
        let header = DiscoveryHeader::new(PROTOCOL_VERSION, &self.process_uuid, msg_type);
        let packet = AdvertisePacket::new(header, publisher.clone());
        let mut buffer = vec![0u8; packet.msg_length()];
        if packet.pack(&mut buffer) == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "advertise packet failed to pack",
            ));
        }
        self.socket.send_to(&buffer, self.target)?;
        Ok(())
    }
}

/// Discovery client for message publishers.
///
/// Owns the multicast socket plus the receive and heartbeat threads. Dropping
/// the client stops both threads and sends a best-effort `Bye`.
pub struct MsgDiscovery {
    inner: Arc<DiscoveryInner>,
    rx_handle: Option<JoinHandle<()>>,
    heartbeat_handle: Option<JoinHandle<()>>,
}

impl MsgDiscovery {
    /// Create a client identified by `process_uuid`, bound to the configured
    /// multicast endpoint.
    pub fn new(process_uuid: impl Into<String>, config: DiscoveryConfig) -> io::Result<Self> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_reuse_address(true)?;
        let bind_addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, config.port));
        socket.bind(&bind_addr.into())?;

        let socket: UdpSocket = socket.into();
        socket.join_multicast_v4(&config.multicast_group, &Ipv4Addr::UNSPECIFIED)?;
        socket.set_multicast_loop_v4(true)?;
        socket.set_read_timeout(Some(READ_TIMEOUT))?;

        Ok(Self {
            inner: Arc::new(DiscoveryInner {
                socket,
                target: SocketAddrV4::new(config.multicast_group, config.port),
                process_uuid: process_uuid.into(),
                heartbeat_interval: config.heartbeat_interval,
                running: AtomicBool::new(false),
                callbacks: Mutex::new(Callbacks::default()),
            }),
            rx_handle: None,
            heartbeat_handle: None,
        })
    }

    /// UUID this client stamps into outgoing headers.
    pub fn process_uuid(&self) -> &str {
        &self.inner.process_uuid
    }

    /// Register the advertisement callback.
    pub fn connections_cb(&self, callback: ConnectionsCallback) {
        self.inner.callbacks.lock().connections = Some(callback);
    }

    /// Register the unadvertisement callback.
    pub fn disconnections_cb(&self, callback: DisconnectionsCallback) {
        self.inner.callbacks.lock().disconnections = Some(callback);
    }

    /// Register the remote-shutdown callback.
    pub fn bye_cb(&self, callback: ByeCallback) {
        self.inner.callbacks.lock().bye = Some(callback);
    }

    /// Register the remote-subscription callback.
    pub fn subscriptions_cb(&self, callback: SubscriptionsCallback) {
        self.inner.callbacks.lock().subscriptions = Some(callback);
    }

    /// Start the receive and heartbeat threads. Idempotent.
    pub fn start(&mut self) -> io::Result<()> {
        if self.inner.running.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let rx_inner = Arc::clone(&self.inner);
        self.rx_handle = Some(
            std::thread::Builder::new()
                .name("tether-disc-rx".to_string())
                .spawn(move || Self::recv_loop(&rx_inner))?,
        );

        let hb_inner = Arc::clone(&self.inner);
        self.heartbeat_handle = Some(
            std::thread::Builder::new()
                .name("tether-disc-hb".to_string())
                .spawn(move || Self::heartbeat_loop(&hb_inner))?,
        );

        debug!(uuid = %self.inner.process_uuid, target = %self.inner.target, "discovery client started");
        Ok(())
    }

    /// Announce a publisher on the discovery channel.
    pub fn advertise(&self, publisher: &Publisher) -> io::Result<()> {
        self.inner.send_publisher(MsgType::Advertise, publisher)
    }

    /// Withdraw a previously announced publisher.
    pub fn unadvertise(&self, publisher: &Publisher) -> io::Result<()> {
        self.inner.send_publisher(MsgType::Unadvertise, publisher)
    }

    /// Request delivery for `topic` from whoever publishes it.
    pub fn subscribe(&self, topic: &str) -> io::Result<()> {
        let header = DiscoveryHeader::new(PROTOCOL_VERSION, &self.inner.process_uuid, MsgType::Subscribe);
        let packet = SubscriptionPacket::new(header, topic);
        let mut buffer = vec![0u8; packet.msg_length()];
        if packet.pack(&mut buffer) == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "subscription packet failed to pack",
            ));
        }
        self.inner.socket.send_to(&buffer, self.inner.target)?;
        Ok(())
    }

    /// Stop both threads, sending a best-effort `Bye` first. Idempotent.
    pub fn shutdown(&mut self) {
        if !self.inner.running.swap(false, Ordering::SeqCst) {
            return;
        }

        if let Err(err) = self.inner.send_header_only(MsgType::Bye) {
            debug!(%err, "failed to send discovery bye");
        }

        if let Some(handle) = self.rx_handle.take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.heartbeat_handle.take() {
            let _ = handle.join();
        }
    }

    fn recv_loop(inner: &DiscoveryInner) {
        let mut buffer = vec![0u8; MAX_DATAGRAM];
        while inner.running.load(Ordering::Relaxed) {
            match inner.socket.recv_from(&mut buffer) {
                Ok((len, _from)) => {
                    dispatch_datagram(&inner.process_uuid, &inner.callbacks, &buffer[..len]);
                }
                Err(err)
                    if err.kind() == io::ErrorKind::WouldBlock
                        || err.kind() == io::ErrorKind::TimedOut => {}
                Err(err) => {
                    if inner.running.load(Ordering::Relaxed) {
                        warn!(%err, "discovery receive failed");
                    }
                }
            }
        }
    }

    fn heartbeat_loop(inner: &DiscoveryInner) {
        while inner.running.load(Ordering::Relaxed) {
            if let Err(err) = inner.send_header_only(MsgType::Heartbeat) {
                warn!(%err, "failed to send discovery heartbeat");
            }

            let mut remaining = inner.heartbeat_interval;
            while !remaining.is_zero() && inner.running.load(Ordering::Relaxed) {
                let step = remaining.min(HEARTBEAT_POLL);
                std::thread::sleep(step);
                remaining = remaining.saturating_sub(step);
            }
        }
    }
}

impl Drop for MsgDiscovery {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Decode one datagram and invoke the matching callback.
///
/// Self-originated and malformed packets are dropped. Callbacks run without
/// the registration lock held.
fn dispatch_datagram(own_uuid: &str, callbacks: &Mutex<Callbacks>, buffer: &[u8]) {
    let Some((header, header_len)) = DiscoveryHeader::unpack(buffer) else {
        return;
    };

    if header.process_uuid == own_uuid {
        return;
    }

    let body = &buffer[header_len..];
    match header.msg_type {
        MsgType::Advertise => {
            let callback = callbacks.lock().connections.clone();
            if let Some((packet, _)) = AdvertisePacket::unpack_body(header, body) {
                if let Some(callback) = callback {
                    callback(&packet.publisher);
                }
            }
        }
        MsgType::Unadvertise => {
            let callback = callbacks.lock().disconnections.clone();
            if let Some((packet, _)) = AdvertisePacket::unpack_body(header, body) {
                if let Some(callback) = callback {
                    callback(&packet.publisher);
                }
            }
        }
        MsgType::Subscribe => {
            let callback = callbacks.lock().subscriptions.clone();
            if let Some((packet, _)) = SubscriptionPacket::unpack_body(header, body) {
                if let Some(callback) = callback {
                    callback(&packet.topic);
                }
            }
        }
        MsgType::Bye => {
            let callback = callbacks.lock().bye.clone();
            if let Some(callback) = callback {
                callback(&header.process_uuid);
            }
        }
        MsgType::Heartbeat | MsgType::NewConnection | MsgType::EndConnection => {
            trace!(msg_type = ?header.msg_type, from = %header.process_uuid, "discovery control packet");
        }
        MsgType::Uninitialized => {
            warn!(from = %header.process_uuid, "dropping uninitialized discovery packet");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packed_advertisement(uuid: &str, topic: &str) -> Vec<u8> {
        let header = DiscoveryHeader::new(PROTOCOL_VERSION, uuid, MsgType::Advertise);
        let publisher = Publisher::new(topic, "udp://10.0.0.9:12000", uuid, "node-1", "test.Blob");
        let packet = AdvertisePacket::new(header, publisher);
        let mut buffer = vec![0u8; packet.msg_length()];
        assert_eq!(packet.pack(&mut buffer), packet.msg_length());
        buffer
    }

    #[test]
    fn test_default_config_uses_well_known_endpoint() {
        let config = DiscoveryConfig::default();
        assert_eq!(config.multicast_group, DISCOVERY_MULTICAST_GROUP);
        assert_eq!(config.port, DISCOVERY_PORT);
    }

    #[test]
    fn test_dispatch_advertisement_invokes_connections_cb() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let callbacks = Mutex::new(Callbacks::default());
        let sink = Arc::clone(&seen);
        callbacks.lock().connections = Some(Arc::new(move |publisher: &Publisher| {
            sink.lock().push(publisher.topic.clone());
        }));

        let datagram = packed_advertisement("remote-proc", "@/robot@scan");
        dispatch_datagram("local-proc", &callbacks, &datagram);

        assert_eq!(*seen.lock(), vec!["@/robot@scan".to_string()]);
    }

    #[test]
    fn test_dispatch_ignores_own_packets() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let callbacks = Mutex::new(Callbacks::default());
        let sink = Arc::clone(&seen);
        callbacks.lock().connections = Some(Arc::new(move |publisher: &Publisher| {
            sink.lock().push(publisher.topic.clone());
        }));

        let datagram = packed_advertisement("local-proc", "@/robot@scan");
        dispatch_datagram("local-proc", &callbacks, &datagram);

        assert!(seen.lock().is_empty());
    }

    #[test]
    fn test_dispatch_ignores_garbage() {
        let callbacks = Mutex::new(Callbacks::default());
        callbacks.lock().connections = Some(Arc::new(|_: &Publisher| {
            panic!("callback must not fire for garbage input");
        }));

        dispatch_datagram("local-proc", &callbacks, &[0xFF; 11]);
        dispatch_datagram("local-proc", &callbacks, &[]);
    }

    #[test]
    fn test_dispatch_bye_reports_sender_uuid() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let callbacks = Mutex::new(Callbacks::default());
        let sink = Arc::clone(&seen);
        callbacks.lock().bye = Some(Arc::new(move |uuid: &str| {
            sink.lock().push(uuid.to_string());
        }));

        let header = DiscoveryHeader::new(PROTOCOL_VERSION, "remote-proc", MsgType::Bye);
        let mut buffer = vec![0u8; header.header_length()];
        assert_eq!(header.pack(&mut buffer), header.header_length());
        dispatch_datagram("local-proc", &callbacks, &buffer);

        assert_eq!(*seen.lock(), vec!["remote-proc".to_string()]);
    }

    #[test]
    fn test_dispatch_subscription_reports_topic() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let callbacks = Mutex::new(Callbacks::default());
        let sink = Arc::clone(&seen);
        callbacks.lock().subscriptions = Some(Arc::new(move |topic: &str| {
            sink.lock().push(topic.to_string());
        }));

        let header = DiscoveryHeader::new(PROTOCOL_VERSION, "remote-proc", MsgType::Subscribe);
        let packet = SubscriptionPacket::new(header, "cmd_vel");
        let mut buffer = vec![0u8; packet.msg_length()];
        assert_eq!(packet.pack(&mut buffer), packet.msg_length());
        dispatch_datagram("local-proc", &callbacks, &buffer);

        assert_eq!(*seen.lock(), vec!["cmd_vel".to_string()]);
    }
}
