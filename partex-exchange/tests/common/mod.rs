//! Common test utilities for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use partex_core::{MessageReader, MessageRegistry, MessageWriter, Progress};
use partex_exchange::messages::register_exchange_messages;
use partex_exchange::{
    DiscoveryEvent, DiscoveryEventType, DiscoveryNode, ExchangeId, SinglePartitionRequest,
    TopologyVersion,
};
use uuid::Uuid;

pub fn node(n: u128, order: i64) -> DiscoveryNode {
    DiscoveryNode::server(Uuid::from_u128(n), order)
}

pub fn join(n: u128, version: i64) -> DiscoveryEvent {
    DiscoveryEvent::joined(node(n, version), TopologyVersion::new(version))
}

pub fn exchange_id(major: i64, n: u128) -> ExchangeId {
    ExchangeId::new(
        TopologyVersion::new(major),
        Uuid::from_u128(n),
        DiscoveryEventType::NodeJoined,
    )
}

pub fn registry() -> Arc<MessageRegistry> {
    let mut registry = MessageRegistry::new();
    register_exchange_messages(&mut registry);
    Arc::new(registry)
}

/// Encodes `msg` in one call into an unbounded buffer.
pub fn encode(msg: &SinglePartitionRequest, writer: &mut MessageWriter) -> Vec<u8> {
    let mut out = Vec::new();
    assert_eq!(writer.write(msg, &mut out), Progress::Complete);
    out
}

/// Decodes a whole message in one call.
pub fn decode(bytes: &[u8], reader: &mut MessageReader) -> SinglePartitionRequest {
    let mut msg = SinglePartitionRequest::default();
    let mut input = bytes;
    assert_eq!(
        reader.read(&mut msg, &mut input).expect("decode failed"),
        Progress::Complete
    );
    msg
}
