// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Record in-process traffic to a log file, then read it back.

use regex::Regex;
use std::sync::Arc;
use tether::{LoopbackNode, NodeOptions};
use tether_recording::{LogReader, Recorder};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .init();

    let node = Arc::new(LoopbackNode::new(NodeOptions::new("/demo")));
    node.advertise("sensor/imu", "demo.ImuSample");

    let recorder = Recorder::new(Arc::clone(&node) as Arc<dyn tether::Node>)?;
    let matched = recorder.add_topic_pattern(Regex::new("sensor/.*")?)?;
    println!("subscribed to {matched} existing topic(s)");

    let path = std::env::temp_dir().join("tether-demo.tlog");
    recorder.start(&path)?;

    for i in 0..10u8 {
        node.publish("sensor/imu", &[i, i, i]);
    }

    recorder.stop();

    let records: Vec<_> = LogReader::open(&path)?.records().collect::<Result<_, _>>()?;
    println!("recorded {} messages to {}", records.len(), path.display());
    for record in records.iter().take(3) {
        println!(
            "  {} ns  [{}] ({}) {} bytes",
            record.ts_utc_ns,
            record.topic,
            record.type_name,
            record.payload.len()
        );
    }

    Ok(())
}
