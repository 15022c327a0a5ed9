// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Node abstraction: the subscription surface the transport exposes.
//!
//! The full socket-I/O node lives outside this crate; consumers such as the
//! recorder depend only on the [`Node`] trait. [`LoopbackNode`] is the
//! in-process implementation used by examples and tests.

use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::debug;

/// Per-node options.
#[derive(Debug, Clone, Default)]
pub struct NodeOptions {
    partition: String,
}

impl NodeOptions {
    pub fn new(partition: impl Into<String>) -> Self {
        Self {
            partition: partition.into(),
        }
    }

    /// The partition this node operates in. May or may not carry a leading
    /// slash; advertised partitions on the wire always do.
    pub fn partition(&self) -> &str {
        &self.partition
    }
}

/// Metadata delivered alongside every raw message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageInfo {
    topic: String,
    type_name: String,
}

impl MessageInfo {
    pub fn new(topic: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            type_name: type_name.into(),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }
}

/// Byte-level subscription callback: `(payload, info)`.
pub type RawCallback = Arc<dyn Fn(&[u8], &MessageInfo) + Send + Sync>;

/// Subscription surface of a transport node.
///
/// `subscribe_raw` returns `false` when the subscription could not be
/// established; it must not panic across the trait boundary.
pub trait Node: Send + Sync {
    fn options(&self) -> &NodeOptions;

    /// Subscribe to `topic`, delivering every payload to `callback` in
    /// per-subscription receive order.
    fn subscribe_raw(&self, topic: &str, callback: RawCallback) -> bool;

    /// Bare names of all topics currently known to the node.
    fn topic_list(&self) -> Vec<String>;
}

#[derive(Default)]
struct LoopbackState {
    /// topic -> advertised type name.
    advertised: BTreeMap<String, String>,
    /// topic -> raw subscriptions, in subscribe order.
    subscriptions: HashMap<String, Vec<RawCallback>>,
}

/// In-process [`Node`]: publishers and subscribers within one process,
/// delivering payloads synchronously on the publisher's thread.
pub struct LoopbackNode {
    options: NodeOptions,
    state: Mutex<LoopbackState>,
}

impl LoopbackNode {
    pub fn new(options: NodeOptions) -> Self {
        Self {
            options,
            state: Mutex::new(LoopbackState::default()),
        }
    }

    /// Register `topic` in the node's topic list with its type name.
    pub fn advertise(&self, topic: impl Into<String>, type_name: impl Into<String>) {
        let mut state = self.state.lock();
        state.advertised.insert(topic.into(), type_name.into());
    }

    /// Deliver `payload` to every subscriber of `topic`. Returns the number
    /// of callbacks invoked.
    pub fn publish(&self, topic: &str, payload: &[u8]) -> usize {
        let (callbacks, type_name) = {
            let state = self.state.lock();
            let callbacks = match state.subscriptions.get(topic) {
                Some(callbacks) => callbacks.clone(),
                None => return 0,
            };
            let type_name = state.advertised.get(topic).cloned().unwrap_or_default();
            (callbacks, type_name)
        };

        // Deliver outside the lock so subscribers may call back into the node.
        let info = MessageInfo::new(topic, type_name);
        for callback in &callbacks {
            callback(payload, &info);
        }
        callbacks.len()
    }
}

impl Node for LoopbackNode {
    fn options(&self) -> &NodeOptions {
        &self.options
    }

    fn subscribe_raw(&self, topic: &str, callback: RawCallback) -> bool {
        let mut state = self.state.lock();
        state
            .subscriptions
            .entry(topic.to_string())
            .or_default()
            .push(callback);
        debug!(topic, "loopback subscription added");
        true
    }

    fn topic_list(&self) -> Vec<String> {
        let state = self.state.lock();
        state.advertised.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_topic_list_reflects_advertisements() {
        let node = LoopbackNode::new(NodeOptions::new("/robot"));
        assert!(node.topic_list().is_empty());

        node.advertise("scan", "sensor.LaserScan");
        node.advertise("cmd_vel", "geometry.Twist");
        assert_eq!(node.topic_list(), vec!["cmd_vel", "scan"]);
    }

    #[test]
    fn test_publish_without_subscribers_delivers_nothing() {
        let node = LoopbackNode::new(NodeOptions::default());
        node.advertise("scan", "sensor.LaserScan");
        assert_eq!(node.publish("scan", &[1, 2, 3]), 0);
    }

    #[test]
    fn test_publish_delivers_payload_and_info() {
        let node = LoopbackNode::new(NodeOptions::new("/robot"));
        node.advertise("scan", "sensor.LaserScan");

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        assert!(node.subscribe_raw(
            "scan",
            Arc::new(move |payload, info| {
                sink.lock()
                    .push((payload.to_vec(), info.topic().to_string(), info.type_name().to_string()));
            })
        ));

        assert_eq!(node.publish("scan", &[7, 8]), 1);

        let seen = seen.lock();
        assert_eq!(
            seen.as_slice(),
            &[(
                vec![7, 8],
                "scan".to_string(),
                "sensor.LaserScan".to_string()
            )]
        );
    }

    #[test]
    fn test_publish_preserves_order_per_subscription() {
        let node = LoopbackNode::new(NodeOptions::default());
        node.advertise("seq", "test.Seq");

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        node.subscribe_raw(
            "seq",
            Arc::new(move |payload, _| sink.lock().push(payload[0])),
        );

        for i in 0..10u8 {
            node.publish("seq", &[i]);
        }
        assert_eq!(*seen.lock(), (0..10).collect::<Vec<u8>>());
    }

    #[test]
    fn test_each_subscription_receives_every_message() {
        let node = LoopbackNode::new(NodeOptions::default());
        node.advertise("t", "T");

        let hits = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let hits = Arc::clone(&hits);
            node.subscribe_raw(
                "t",
                Arc::new(move |_, _| {
                    hits.fetch_add(1, Ordering::SeqCst);
                }),
            );
        }

        assert_eq!(node.publish("t", b"x"), 3);
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }
}
