//! Topology and exchange identifiers carried by every exchange message.

use std::cmp::Ordering;
use std::fmt;

use bytes::{Buf, BufMut, BytesMut};
use partex_core::error::{ExchangeError, Result};
use partex_core::protocol::{decode_fixed, Decoded, WireField, SIZE_OF_INT, SIZE_OF_LONG, SIZE_OF_UUID};
use uuid::Uuid;

use crate::discovery::DiscoveryEventType;

/// Identity of a cluster node.
pub type NodeId = Uuid;

/// Identifier of a cache group.
pub type GroupId = i32;

/// Identifier of a cache.
pub type CacheId = i32;

/// Version of the cluster membership state.
///
/// The major part advances on every join, leave or failure; the minor part
/// advances on custom events that change affinity without changing membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TopologyVersion {
    major: i64,
    minor: i32,
}

impl TopologyVersion {
    /// The version of a topology that has not been assigned yet.
    pub const NONE: Self = Self {
        major: -1,
        minor: 0,
    };

    /// Size of an encoded topology version.
    pub const WIRE_SIZE: usize = SIZE_OF_LONG + SIZE_OF_INT;

    /// Creates a version with the given major part and a zero minor part.
    pub fn new(major: i64) -> Self {
        Self { major, minor: 0 }
    }

    /// Creates a version with both parts.
    pub fn with_minor(major: i64, minor: i32) -> Self {
        Self { major, minor }
    }

    /// Returns the major version.
    pub fn major(&self) -> i64 {
        self.major
    }

    /// Returns the minor version.
    pub fn minor(&self) -> i32 {
        self.minor
    }

    /// Returns `true` if this is [`TopologyVersion::NONE`].
    pub fn is_none(&self) -> bool {
        *self == Self::NONE
    }

    /// Returns the next minor version of the same topology, or `None` once
    /// the minor version is exhausted.
    pub fn next_minor(&self) -> Option<Self> {
        self.minor
            .checked_add(1)
            .map(|minor| Self::with_minor(self.major, minor))
    }
}

impl Default for TopologyVersion {
    fn default() -> Self {
        Self::NONE
    }
}

impl fmt::Display for TopologyVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TopologyVersion[major={}, minor={}]", self.major, self.minor)
    }
}

impl WireField for TopologyVersion {
    fn encode(&self, dst: &mut BytesMut) {
        dst.put_i64(self.major);
        dst.put_i32(self.minor);
    }

    fn decode(src: &[u8]) -> Result<Decoded<Self>> {
        decode_fixed(src, Self::WIRE_SIZE, |b| {
            let major = b.get_i64();
            let minor = b.get_i32();
            Ok(Self { major, minor })
        })
    }
}

/// Identifies one exchange round: the topology version it resolves, the
/// node whose event started it and the kind of that event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExchangeId {
    topology_version: TopologyVersion,
    node_id: NodeId,
    event_type: DiscoveryEventType,
}

impl ExchangeId {
    /// Size of an encoded exchange id.
    pub const WIRE_SIZE: usize = TopologyVersion::WIRE_SIZE + SIZE_OF_UUID + SIZE_OF_INT;

    /// Creates an exchange id.
    pub fn new(
        topology_version: TopologyVersion,
        node_id: NodeId,
        event_type: DiscoveryEventType,
    ) -> Self {
        Self {
            topology_version,
            node_id,
            event_type,
        }
    }

    /// Returns the topology version this round resolves.
    pub fn topology_version(&self) -> TopologyVersion {
        self.topology_version
    }

    /// Returns the node whose event started the round.
    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    /// Returns the kind of event that started the round.
    pub fn event_type(&self) -> DiscoveryEventType {
        self.event_type
    }

    /// Returns `true` if the round was started by a node joining.
    pub fn is_join(&self) -> bool {
        self.event_type == DiscoveryEventType::NodeJoined
    }

    /// Returns `true` if the round was started by a node leaving or failing.
    pub fn is_left(&self) -> bool {
        matches!(
            self.event_type,
            DiscoveryEventType::NodeLeft | DiscoveryEventType::NodeFailed
        )
    }

    /// Returns `true` if this id has not been assigned.
    pub fn is_unassigned(&self) -> bool {
        self.topology_version.is_none()
    }
}

impl Default for ExchangeId {
    fn default() -> Self {
        Self::new(
            TopologyVersion::NONE,
            Uuid::nil(),
            DiscoveryEventType::NodeJoined,
        )
    }
}

impl PartialOrd for ExchangeId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ExchangeId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.topology_version
            .cmp(&other.topology_version)
            .then_with(|| self.node_id.cmp(&other.node_id))
            .then_with(|| self.event_type.value().cmp(&other.event_type.value()))
    }
}

impl fmt::Display for ExchangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ExchangeId[topVer={}.{}, node={}, event={}]",
            self.topology_version.major,
            self.topology_version.minor,
            self.node_id,
            self.event_type
        )
    }
}

impl WireField for ExchangeId {
    fn encode(&self, dst: &mut BytesMut) {
        self.topology_version.encode(dst);
        self.node_id.encode(dst);
        dst.put_i32(self.event_type.value());
    }

    fn decode(src: &[u8]) -> Result<Decoded<Self>> {
        decode_fixed(src, Self::WIRE_SIZE, |b| {
            let major = b.get_i64();
            let minor = b.get_i32();
            let node_id = Uuid::from_u64_pair(b.get_u64(), b.get_u64());
            let code = b.get_i32();
            let event_type = DiscoveryEventType::from_value(code).ok_or_else(|| {
                ExchangeError::Serialization(format!("unknown discovery event type: {}", code))
            })?;
            Ok(Self::new(
                TopologyVersion::with_minor(major, minor),
                node_id,
                event_type,
            ))
        })
    }
}

/// Version stamp of the last cache update a node observed, carried so peers
/// can order their own updates after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheVersion {
    topology_version: i32,
    order: i64,
    node_order: i32,
}

impl CacheVersion {
    /// Size of an encoded cache version.
    pub const WIRE_SIZE: usize = SIZE_OF_INT + SIZE_OF_LONG + SIZE_OF_INT;

    /// Creates a cache version.
    pub fn new(topology_version: i32, order: i64, node_order: i32) -> Self {
        Self {
            topology_version,
            order,
            node_order,
        }
    }

    /// Returns the topology version the update was made in.
    pub fn topology_version(&self) -> i32 {
        self.topology_version
    }

    /// Returns the update order within that topology.
    pub fn order(&self) -> i64 {
        self.order
    }

    /// Returns the order of the node that made the update.
    pub fn node_order(&self) -> i32 {
        self.node_order
    }
}

impl fmt::Display for CacheVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CacheVersion[topVer={}, order={}, nodeOrder={}]",
            self.topology_version, self.order, self.node_order
        )
    }
}

impl WireField for CacheVersion {
    fn encode(&self, dst: &mut BytesMut) {
        dst.put_i32(self.topology_version);
        dst.put_i64(self.order);
        dst.put_i32(self.node_order);
    }

    fn decode(src: &[u8]) -> Result<Decoded<Self>> {
        decode_fixed(src, Self::WIRE_SIZE, |b| {
            let topology_version = b.get_i32();
            let order = b.get_i64();
            let node_order = b.get_i32();
            Ok(Self::new(topology_version, order, node_order))
        })
    }
}
