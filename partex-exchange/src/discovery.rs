//! Discovery events and their aggregation into one exchange round.
//!
//! The membership subsystem delivers raw topology notifications. A
//! [`DiscoveryEventAggregator`] collapses the notifications that belong to
//! one round into an ordered, deduplicated [`DiscoveryEventSet`], which the
//! negotiation context then holds without modifying.

use std::collections::BTreeMap;
use std::fmt;

use crate::topology::{NodeId, TopologyVersion};

/// Type of topology change that can start an exchange round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum DiscoveryEventType {
    /// A node joined the cluster.
    NodeJoined = 10,
    /// A node left the cluster gracefully.
    NodeLeft = 11,
    /// A node was detected as failed.
    NodeFailed = 12,
    /// A custom event that changes affinity, such as an explicit rebalance.
    Custom = 18,
}

impl DiscoveryEventType {
    /// Creates an event type from its wire format value.
    pub fn from_value(value: i32) -> Option<Self> {
        match value {
            10 => Some(Self::NodeJoined),
            11 => Some(Self::NodeLeft),
            12 => Some(Self::NodeFailed),
            18 => Some(Self::Custom),
            _ => None,
        }
    }

    /// Returns the wire format value for this event type.
    pub fn value(self) -> i32 {
        self as i32
    }

    /// Returns `true` for leave and failure events.
    pub fn is_departure(self) -> bool {
        matches!(self, Self::NodeLeft | Self::NodeFailed)
    }
}

impl fmt::Display for DiscoveryEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NodeJoined => write!(f, "NODE_JOINED"),
            Self::NodeLeft => write!(f, "NODE_LEFT"),
            Self::NodeFailed => write!(f, "NODE_FAILED"),
            Self::Custom => write!(f, "CUSTOM"),
        }
    }
}

/// The node a discovery event is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DiscoveryNode {
    id: NodeId,
    order: i64,
    client: bool,
}

impl DiscoveryNode {
    /// Creates a server node.
    pub fn server(id: NodeId, order: i64) -> Self {
        Self {
            id,
            order,
            client: false,
        }
    }

    /// Creates a client node. Client nodes own no partitions.
    pub fn client(id: NodeId, order: i64) -> Self {
        Self {
            id,
            order,
            client: true,
        }
    }

    /// Returns the node id.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Returns the order in which the node joined the topology.
    pub fn order(&self) -> i64 {
        self.order
    }

    /// Returns `true` if this is a client node.
    pub fn is_client(&self) -> bool {
        self.client
    }
}

impl fmt::Display for DiscoveryNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Node[id={}, order={}, client={}]",
            self.id, self.order, self.client
        )
    }
}

/// A single topology notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DiscoveryEvent {
    event_type: DiscoveryEventType,
    node: DiscoveryNode,
    topology_version: TopologyVersion,
}

impl DiscoveryEvent {
    /// Creates an event.
    pub fn new(
        event_type: DiscoveryEventType,
        node: DiscoveryNode,
        topology_version: TopologyVersion,
    ) -> Self {
        Self {
            event_type,
            node,
            topology_version,
        }
    }

    /// Creates an event for a node that joined.
    pub fn joined(node: DiscoveryNode, topology_version: TopologyVersion) -> Self {
        Self::new(DiscoveryEventType::NodeJoined, node, topology_version)
    }

    /// Creates an event for a node that left.
    pub fn left(node: DiscoveryNode, topology_version: TopologyVersion) -> Self {
        Self::new(DiscoveryEventType::NodeLeft, node, topology_version)
    }

    /// Creates an event for a node that failed.
    pub fn failed(node: DiscoveryNode, topology_version: TopologyVersion) -> Self {
        Self::new(DiscoveryEventType::NodeFailed, node, topology_version)
    }

    /// Creates a custom event raised on behalf of `node`.
    pub fn custom(node: DiscoveryNode, topology_version: TopologyVersion) -> Self {
        Self::new(DiscoveryEventType::Custom, node, topology_version)
    }

    /// Returns the event type.
    pub fn event_type(&self) -> DiscoveryEventType {
        self.event_type
    }

    /// Returns the node the event is about.
    pub fn node(&self) -> &DiscoveryNode {
        &self.node
    }

    /// Returns the topology version the event produced.
    pub fn topology_version(&self) -> TopologyVersion {
        self.topology_version
    }
}

impl fmt::Display for DiscoveryEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DiscoveryEvent[{} {} at {}]",
            self.event_type, self.node, self.topology_version
        )
    }
}

/// The ordered, deduplicated events one exchange round resolves.
///
/// Obtained from [`DiscoveryEventAggregator::finish`]; immutable afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryEventSet {
    events: Vec<DiscoveryEvent>,
    server_join: bool,
    server_left: bool,
}

impl DiscoveryEventSet {
    fn from_ordered(events: Vec<DiscoveryEvent>) -> Self {
        let server_join = events
            .iter()
            .any(|e| e.event_type == DiscoveryEventType::NodeJoined && !e.node.client);
        let server_left = events
            .iter()
            .any(|e| e.event_type.is_departure() && !e.node.client);
        Self {
            events,
            server_join,
            server_left,
        }
    }

    /// Returns the events in topology version order.
    pub fn events(&self) -> &[DiscoveryEvent] {
        &self.events
    }

    /// Returns an iterator over the events in topology version order.
    pub fn iter(&self) -> std::slice::Iter<'_, DiscoveryEvent> {
        self.events.iter()
    }

    /// Returns the number of events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Returns `true` if the set holds no events.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Returns the event with the lowest topology version.
    pub fn first_event(&self) -> Option<&DiscoveryEvent> {
        self.events.first()
    }

    /// Returns the event with the highest topology version.
    pub fn last_event(&self) -> Option<&DiscoveryEvent> {
        self.events.last()
    }

    /// Returns the topology version the round resolves to, or
    /// [`TopologyVersion::NONE`] for an empty set.
    pub fn topology_version(&self) -> TopologyVersion {
        self.last_event()
            .map(|e| e.topology_version)
            .unwrap_or(TopologyVersion::NONE)
    }

    /// Returns `true` if an event for `version` is in the set.
    pub fn contains_version(&self, version: TopologyVersion) -> bool {
        self.events
            .binary_search_by(|e| e.topology_version.cmp(&version))
            .is_ok()
    }

    /// Returns `true` if the set includes `node` joining.
    pub fn node_joined(&self, node: NodeId) -> bool {
        self.events
            .iter()
            .any(|e| e.event_type == DiscoveryEventType::NodeJoined && e.node.id == node)
    }

    /// Returns `true` if the set includes `node` leaving or failing.
    pub fn node_left(&self, node: NodeId) -> bool {
        self.events
            .iter()
            .any(|e| e.event_type.is_departure() && e.node.id == node)
    }

    /// Returns `true` if any server node joined.
    pub fn has_server_join(&self) -> bool {
        self.server_join
    }

    /// Returns `true` if any server node left or failed.
    pub fn has_server_left(&self) -> bool {
        self.server_left
    }
}

impl<'a> IntoIterator for &'a DiscoveryEventSet {
    type Item = &'a DiscoveryEvent;
    type IntoIter = std::slice::Iter<'a, DiscoveryEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}

/// Collects raw topology notifications for one exchange round.
///
/// Events are keyed by topology version: each version is produced by exactly
/// one discovery event, so re-deliveries collapse and out-of-order arrivals
/// are put back in order.
#[derive(Debug, Clone, Default)]
pub struct DiscoveryEventAggregator {
    events: BTreeMap<TopologyVersion, DiscoveryEvent>,
}

impl DiscoveryEventAggregator {
    /// Creates an empty aggregator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-opens a finished set, typically the event set of a round being
    /// merged into a newer one.
    pub fn resume(events: DiscoveryEventSet) -> Self {
        Self {
            events: events
                .events
                .into_iter()
                .map(|e| (e.topology_version, e))
                .collect(),
        }
    }

    /// Records an event. Returns `false` if it was already known or conflicts
    /// with the event recorded for the same topology version.
    pub fn record(&mut self, event: DiscoveryEvent) -> bool {
        match self.events.get(&event.topology_version) {
            Some(existing) if *existing == event => {
                tracing::trace!(event = %event, "ignoring duplicate discovery event");
                false
            }
            Some(existing) => {
                tracing::warn!(
                    recorded = %existing,
                    ignored = %event,
                    "conflicting discovery event for topology version"
                );
                false
            }
            None => {
                self.events.insert(event.topology_version, event);
                true
            }
        }
    }

    /// Returns the number of events recorded so far.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Returns `true` if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Returns the highest topology version recorded so far.
    pub fn latest_version(&self) -> Option<TopologyVersion> {
        self.events.keys().next_back().copied()
    }

    /// Finishes aggregation and returns the immutable event set.
    pub fn finish(self) -> DiscoveryEventSet {
        DiscoveryEventSet::from_ordered(self.events.into_values().collect())
    }
}

impl Extend<DiscoveryEvent> for DiscoveryEventAggregator {
    fn extend<I: IntoIterator<Item = DiscoveryEvent>>(&mut self, iter: I) {
        for event in iter {
            self.record(event);
        }
    }
}

impl FromIterator<DiscoveryEvent> for DiscoveryEventSet {
    fn from_iter<I: IntoIterator<Item = DiscoveryEvent>>(iter: I) -> Self {
        let mut aggregator = DiscoveryEventAggregator::new();
        aggregator.extend(iter);
        aggregator.finish()
    }
}
