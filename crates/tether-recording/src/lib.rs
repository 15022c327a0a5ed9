// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # Tether Recording
//!
//! Record discovered pub/sub topics to a durable message log.
//!
//! The [`Recorder`] listens for advertisements on the discovery channel,
//! subscribes to every topic matching its regular-expression patterns, and
//! appends received payloads to a [`LogFile`] with UTC-normalized nanosecond
//! timestamps.
//!
//! ```no_run
//! use std::sync::Arc;
//! use regex::Regex;
//! use tether::{LoopbackNode, NodeOptions};
//! use tether_recording::Recorder;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let node = Arc::new(LoopbackNode::new(NodeOptions::new("/robot")));
//! let recorder = Recorder::new(node)?;
//!
//! recorder.add_topic_pattern(Regex::new("sensor/.*")?)?;
//! recorder.start("capture.tlog")?;
//! // ... messages flow into capture.tlog ...
//! recorder.stop();
//! # Ok(())
//! # }
//! ```
//!
//! Log insertion order across subscriptions follows lock acquisition, not
//! timestamps; readers that need monotonic replay must sort by `ts_utc_ns`.

pub mod log;
pub mod recorder;

pub use log::{Log, LogError, LogFile, LogReader, OpenMode, Record};
pub use recorder::{Recorder, RecorderError};
