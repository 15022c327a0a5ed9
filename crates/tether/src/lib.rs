// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # Tether - lightweight discovery-based pub/sub transport
//!
//! Publishers advertise named topics on the local network over UDP multicast;
//! subscribers discover them and receive raw byte payloads. This crate holds
//! the pieces shared by every tether process:
//!
//! ```text
//! +------------------------------------------------------------+
//! |                     Application Layer                      |
//! |        Node (subscriptions) | MsgDiscovery (control)       |
//! +------------------------------------------------------------+
//! |                     Discovery Protocol                     |
//! |   DiscoveryHeader | SubscriptionPacket | AdvertisePacket   |
//! +------------------------------------------------------------+
//! |                        UDP Multicast                       |
//! +------------------------------------------------------------+
//! ```
//!
//! ## Modules Overview
//!
//! - [`protocol`] - discovery wire codecs (header, typed packets, publisher
//!   record)
//! - [`discovery`] - UDP multicast discovery client
//! - [`node`] - subscription surface ([`Node`] trait, in-process
//!   [`LoopbackNode`])
//! - [`topic`] - fully-qualified topic utilities
//!
//! Payloads are opaque byte blobs at this layer; (de)serialization belongs to
//! the application.

pub mod discovery;
pub mod node;
pub mod protocol;
pub mod topic;

pub use discovery::{DiscoveryConfig, MsgDiscovery, DISCOVERY_MULTICAST_GROUP, DISCOVERY_PORT};
pub use node::{LoopbackNode, MessageInfo, Node, NodeOptions, RawCallback};
pub use protocol::{
    AdvertisePacket, DiscoveryHeader, MsgType, Publisher, SubscriptionPacket, PROTOCOL_VERSION,
};
