// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Discovery-driven topic recorder.
//!
//! The recorder watches advertisements from the discovery client, subscribes
//! to topics matching its patterns through the [`Node`], and appends every
//! received payload to the message log with a UTC-normalized timestamp.
//!
//! # Threading
//!
//! Three kinds of threads enter concurrently: the application thread
//! (`start`/`stop`/`add_topic*`), discovery threads (advertisement handler),
//! and subscriber threads (raw message callbacks). Two locks serialize them:
//! the topic lock guards the pattern list and the subscribed set; the log
//! lock guards the log handle and every insert. The two are never held
//! together. Callbacks registered with the discovery client and the node
//! hold a `Weak` back-reference and upgrade it per invocation, so a recorder
//! mid-teardown is observed as absent rather than half-destroyed.

use crate::log::{Log, LogFile, OpenMode};
use parking_lot::Mutex;
use regex::Regex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tether::discovery::{DiscoveryConfig, MsgDiscovery};
use tether::node::{Node, RawCallback};
use tether::protocol::Publisher;
use tether::topic::decompose_fully_qualified_topic;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Recorder errors surfaced to callers.
#[derive(Debug, Error)]
pub enum RecorderError {
    #[error("recording is already in progress")]
    AlreadyRecording,

    #[error("failed to open or create log file [{}]", .0.display())]
    FailedToOpen(PathBuf),

    #[error("failed to subscribe to [{0}]")]
    FailedToSubscribe(String),

    #[error("discovery I/O error: {0}")]
    Discovery(#[from] std::io::Error),
}

/// Whole-string pattern match, mirroring the semantics subscriptions are
/// deduplicated under: a topic is recorded only when a pattern covers all of
/// it, not a substring.
fn full_match(pattern: &Regex, topic: &str) -> bool {
    pattern
        .find(topic)
        .is_some_and(|m| m.start() == 0 && m.end() == topic.len())
}

#[derive(Default)]
struct TopicState {
    /// Patterns to evaluate future advertisements against, in insertion
    /// order. Duplicates are harmless.
    patterns: Vec<Regex>,
    /// Bare topic names with an active subscription.
    already_subscribed: HashSet<String>,
}

struct RecorderShared {
    node: Arc<dyn Node>,
    topics: Mutex<TopicState>,
    log: Mutex<Option<Box<dyn Log>>>,
    /// Offset added to the monotonic clock to obtain UTC nanoseconds.
    /// Immutable after construction; clock-rate drift over long recordings is
    /// accepted.
    wall_minus_mono: i64,
    /// The monotonic reference every receive timestamp is measured from.
    mono_epoch: Instant,
}

impl RecorderShared {
    /// Subscriber callback: timestamp the payload and append it to the log.
    /// Messages arriving while no log is open are discarded.
    fn on_message_received(&self, payload: &[u8], info: &tether::node::MessageInfo) {
        let now_mono_ns = self.mono_epoch.elapsed().as_nanos() as i64;
        let utc_ns = self.wall_minus_mono + now_mono_ns;

        debug!(topic = info.topic(), type_name = info.type_name(), "message received");

        let mut log = self.log.lock();
        if let Some(log) = log.as_mut() {
            if let Err(err) = log.insert_message(utc_ns, info.topic(), info.type_name(), payload) {
                warn!(%err, topic = info.topic(), "failed to insert message into log");
            }
        }
    }

    /// Discovery callback: evaluate a newly advertised topic against the
    /// partition, the subscribed set, and the pattern list.
    fn handle_advertisement(self: &Arc<Self>, publisher: &Publisher) {
        let Some((adv_partition, topic_name)) = decompose_fully_qualified_topic(&publisher.topic)
        else {
            warn!(topic = %publisher.topic, "dropping advertisement with malformed topic");
            return;
        };

        if !self.partition_matches(adv_partition) {
            return;
        }

        let mut topics = self.topics.lock();
        if topics.already_subscribed.contains(topic_name) {
            return;
        }

        if !topics.patterns.iter().any(|p| full_match(p, topic_name)) {
            debug!(topic = topic_name, "not recording");
            return;
        }

        if let Err(err) = self.subscribe_locked(&mut topics, topic_name) {
            warn!(%err, "failed to subscribe to advertised topic");
        }
    }

    /// The advertised partition always begins with a forward slash; the
    /// node's may not, in which case the comparison starts past the slash.
    fn partition_matches(&self, adv_partition: &str) -> bool {
        let node_partition = self.node.options().partition();
        let start = usize::from(!node_partition.starts_with('/'));
        adv_partition
            .get(start..)
            .is_some_and(|p| p == node_partition)
    }

    /// Subscribe to `topic` and mark it live. Returns `Ok(false)` when the
    /// topic already has a subscription; at most one raw subscription is ever
    /// established per topic over the recorder's lifetime.
    fn subscribe_locked(
        self: &Arc<Self>,
        state: &mut TopicState,
        topic: &str,
    ) -> Result<bool, RecorderError> {
        if state.already_subscribed.contains(topic) {
            return Ok(false);
        }

        let weak = Arc::downgrade(self);
        let callback: RawCallback = Arc::new(move |payload, info| {
            if let Some(shared) = Weak::upgrade(&weak) {
                shared.on_message_received(payload, info);
            }
        });

        if !self.node.subscribe_raw(topic, callback) {
            error!(topic, "failed to subscribe");
            return Err(RecorderError::FailedToSubscribe(topic.to_string()));
        }

        debug!(topic, "recording topic");
        state.already_subscribed.insert(topic.to_string());
        Ok(true)
    }
}

/// Records discovered topics to a durable message log.
///
/// Construction wires a fresh discovery client to the advertisement handler;
/// `start`/`stop` only open and close the log, never the subscriptions, so a
/// stopped recorder keeps its subscriptions warm and silently discards
/// incoming messages.
pub struct Recorder {
    shared: Arc<RecorderShared>,
    discovery: Option<MsgDiscovery>,
}

impl Recorder {
    /// Create a recorder on `node` with a discovery client bound to the
    /// well-known endpoint.
    pub fn new(node: Arc<dyn Node>) -> Result<Self, RecorderError> {
        Self::with_discovery_config(node, DiscoveryConfig::default())
    }

    /// Create a recorder with a custom discovery endpoint.
    pub fn with_discovery_config(
        node: Arc<dyn Node>,
        config: DiscoveryConfig,
    ) -> Result<Self, RecorderError> {
        let mut recorder = Self::detached(node);

        let mut discovery = MsgDiscovery::new(Uuid::new_v4().to_string(), config)?;
        let weak = Arc::downgrade(&recorder.shared);
        discovery.connections_cb(Arc::new(move |publisher| {
            if let Some(shared) = Weak::upgrade(&weak) {
                shared.handle_advertisement(publisher);
            }
        }));
        discovery.start()?;

        recorder.discovery = Some(discovery);
        Ok(recorder)
    }

    /// Recorder without a discovery client; advertisements must be fed in by
    /// hand. Used by tests.
    fn detached(node: Arc<dyn Node>) -> Self {
        // The monotonic epoch is the construction instant, so the wall clock
        // sampled here is exactly wall - mono.
        let wall_minus_mono = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as i64)
            .unwrap_or(0);

        Self {
            shared: Arc::new(RecorderShared {
                node,
                topics: Mutex::new(TopicState::default()),
                log: Mutex::new(None),
                wall_minus_mono,
                mono_epoch: Instant::now(),
            }),
            discovery: None,
        }
    }

    /// Begin recording to `path`. Fails with [`RecorderError::AlreadyRecording`]
    /// when a log is already open, leaving the current recording untouched.
    pub fn start(&self, path: impl AsRef<Path>) -> Result<(), RecorderError> {
        let path = path.as_ref();
        let mut log = self.shared.log.lock();

        if log.is_some() {
            warn!("recording is already in progress");
            return Err(RecorderError::AlreadyRecording);
        }

        match LogFile::open(path, OpenMode::Write) {
            Ok(file) => {
                *log = Some(Box::new(file));
                info!(path = %path.display(), "started recording");
                Ok(())
            }
            Err(err) => {
                error!(path = %path.display(), %err, "failed to open or create log file");
                Err(RecorderError::FailedToOpen(path.to_path_buf()))
            }
        }
    }

    /// Close the log. Idempotent. Subscriptions stay active; messages
    /// arriving while stopped are discarded.
    pub fn stop(&self) {
        let mut log = self.shared.log.lock();
        if log.take().is_some() {
            info!("stopped recording");
        }
    }

    /// Whether a log is currently open.
    pub fn is_recording(&self) -> bool {
        self.shared.log.lock().is_some()
    }

    /// Subscribe to a single topic by name. Deduplication against topics
    /// already being recorded happens here as well, so repeated calls are
    /// no-ops rather than duplicate subscriptions.
    pub fn add_topic(&self, topic: &str) -> Result<(), RecorderError> {
        let mut topics = self.shared.topics.lock();
        self.shared.subscribe_locked(&mut topics, topic).map(|_| ())
    }

    /// Subscribe to every currently known topic matching `pattern` and
    /// register the pattern for topics advertised later. Returns the number
    /// of new subscriptions; on a subscription failure the pattern is not
    /// registered.
    pub fn add_topic_pattern(&self, pattern: Regex) -> Result<i64, RecorderError> {
        let mut state = self.shared.topics.lock();

        let known = self.shared.node.topic_list();
        let mut new_subscriptions = 0;
        for topic in &known {
            if full_match(&pattern, topic) {
                if self.shared.subscribe_locked(&mut state, topic)? {
                    new_subscriptions += 1;
                }
            } else {
                debug!(topic, "not recording");
            }
        }

        // Registered even with zero current matches; future advertisements
        // are evaluated against it.
        state.patterns.push(pattern);

        Ok(new_subscriptions)
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        // Join the discovery threads first so no advertisement handler runs
        // while the rest of the state unwinds.
        if let Some(mut discovery) = self.discovery.take() {
            discovery.shutdown();
        }
        self.stop();
    }
}
