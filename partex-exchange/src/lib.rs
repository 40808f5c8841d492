//! Partition-exchange negotiation for a distributed cache cluster.
//!
//! When nodes join, leave or fail, the cluster runs an *exchange round* to
//! agree on who owns which data partitions. This crate holds the pieces every
//! round is built from:
//!
//! - [`topology`]: versioned identifiers ([`TopologyVersion`], [`ExchangeId`])
//!   that name a round on the wire.
//! - [`discovery`]: the [`DiscoveryEventAggregator`] that folds membership
//!   events into the ordered [`DiscoveryEventSet`] a round resolves.
//! - [`context`]: the [`ExchangeContext`] deciding, from the negotiated
//!   protocol version, whether joiners fetch affinity and whether rounds merge.
//! - [`messages`]: the exchange message base and [`SinglePartitionRequest`],
//!   encoded with the resumable cursors from [`partex_core`].
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use partex_core::MessageRegistry;
//! use partex_exchange::messages::register_exchange_messages;
//! use partex_exchange::{
//!     DiscoveryEvent, DiscoveryEventAggregator, DiscoveryEventType, DiscoveryNode,
//!     ExchangeConfig, ExchangeContext, ExchangeId, SinglePartitionRequest, TopologyVersion,
//! };
//! use uuid::Uuid;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ExchangeConfig::builder().protocol_version(2).build()?;
//!
//! let node = DiscoveryNode::server(Uuid::new_v4(), 3);
//! let mut aggregator = DiscoveryEventAggregator::new();
//! aggregator.record(DiscoveryEvent::joined(node, TopologyVersion::new(3)));
//!
//! let version = config.negotiate_protocol_version([2, 2]);
//! let ctx = ExchangeContext::new(version, aggregator.finish())?;
//! assert!(ctx.can_merge_exchanges());
//!
//! let mut registry = MessageRegistry::new();
//! register_exchange_messages(&mut registry);
//! let _codec = config.new_codec(Arc::new(registry));
//!
//! let id = ExchangeId::new(TopologyVersion::new(3), node.id(), DiscoveryEventType::NodeJoined);
//! let request = SinglePartitionRequest::new(id);
//! assert!(request.to_string().starts_with("SinglePartitionRequest["));
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod config_file;
pub mod context;
pub mod discovery;
pub mod messages;
pub mod topology;

pub use config::{ConfigError, ExchangeConfig, ExchangeConfigBuilder};
pub use config_file::FileConfig;
pub use context::{ExchangeContext, ProtocolMode};
pub use discovery::{
    DiscoveryEvent, DiscoveryEventAggregator, DiscoveryEventSet, DiscoveryEventType,
    DiscoveryNode,
};
pub use messages::{ExchangeHeader, ExchangeMessage, PartitionUpdateCounters, SinglePartitionRequest};
pub use topology::{CacheId, CacheVersion, ExchangeId, GroupId, NodeId, TopologyVersion};

pub use partex_core::{ExchangeError, Result};
