//! Per-round exchange negotiation context.

use std::collections::HashSet;
use std::fmt;

use partex_core::error::{ExchangeError, Result};

use crate::discovery::{DiscoveryEventAggregator, DiscoveryEventSet};
use crate::topology::GroupId;

/// Lowest exchange protocol version.
pub const MIN_PROTOCOL_VERSION: i32 = 1;

/// Protocol version from which full-state messages carry affinity and
/// exchanges may be merged.
pub const MERGE_PROTOCOL_VERSION: i32 = 2;

/// How a round behaves, derived once from the negotiated protocol version.
///
/// The two behaviours belong to incompatible message shapes, so exactly one
/// of them applies to a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolMode {
    /// Version 1: a joining node fetches affinity per cache group because the
    /// full-state message does not carry it. Rounds are never merged.
    Legacy,
    /// Version 2 and later: affinity travels inline in the full-state message
    /// and newly observed events may be folded into an in-flight round.
    Merging,
}

impl ProtocolMode {
    /// Derives the mode for a negotiated protocol version.
    pub fn for_version(protocol_version: i32) -> Result<Self> {
        if protocol_version < MIN_PROTOCOL_VERSION {
            return Err(ExchangeError::VersionContract {
                version: protocol_version,
            });
        }

        if protocol_version == MIN_PROTOCOL_VERSION {
            Ok(Self::Legacy)
        } else {
            Ok(Self::Merging)
        }
    }
}

impl fmt::Display for ProtocolMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Legacy => write!(f, "LEGACY"),
            Self::Merging => write!(f, "MERGING"),
        }
    }
}

/// Negotiation state for one exchange round.
///
/// Created by the exchange driver when a round starts and dropped when the
/// round completes or is merged into a newer one. It owns the round's event
/// set and collects the cache groups whose affinity still has to be fetched.
#[derive(Debug, Clone)]
pub struct ExchangeContext {
    protocol_version: i32,
    mode: ProtocolMode,
    events: DiscoveryEventSet,
    affinity_request_groups: HashSet<GroupId>,
}

impl ExchangeContext {
    /// Creates the context for a round negotiated at `protocol_version`.
    ///
    /// Fails with [`ExchangeError::VersionContract`] for versions below 1.
    pub fn new(protocol_version: i32, events: DiscoveryEventSet) -> Result<Self> {
        let mode = ProtocolMode::for_version(protocol_version)?;

        tracing::debug!(
            protocol_version,
            mode = %mode,
            events = events.len(),
            topology_version = %events.topology_version(),
            "created exchange context"
        );

        Ok(Self {
            protocol_version,
            mode,
            events,
            affinity_request_groups: HashSet::new(),
        })
    }

    /// Returns the negotiated protocol version.
    pub fn protocol_version(&self) -> i32 {
        self.protocol_version
    }

    /// Returns the mode derived from the protocol version.
    pub fn mode(&self) -> ProtocolMode {
        self.mode
    }

    /// Returns the events this round resolves.
    pub fn events(&self) -> &DiscoveryEventSet {
        &self.events
    }

    /// Gives up the context, handing its event set to the caller.
    pub fn into_events(self) -> DiscoveryEventSet {
        self.events
    }

    /// Returns `true` if a joining node must request affinity per cache group
    /// instead of taking it from the full partition-map message.
    pub fn fetch_affinity_on_join(&self) -> bool {
        self.mode == ProtocolMode::Legacy
    }

    /// Returns `true` if newly observed topology events may be folded into
    /// this round instead of starting a new one.
    pub fn can_merge_exchanges(&self) -> bool {
        self.mode == ProtocolMode::Merging
    }

    /// Records that affinity for `group` must be fetched once the round
    /// resolves. Returns `false` if the group was already recorded.
    pub fn record_affinity_request(&mut self, group: GroupId) -> bool {
        if self.mode != ProtocolMode::Legacy {
            tracing::debug!(
                group,
                protocol_version = self.protocol_version,
                "affinity request recorded although affinity travels with the full message"
            );
        }

        let added = self.affinity_request_groups.insert(group);
        if added {
            tracing::trace!(group, "recorded affinity request on join");
        }
        added
    }

    /// Returns the groups recorded for an affinity fetch, or `None` if none were.
    pub fn affinity_request_groups(&self) -> Option<&HashSet<GroupId>> {
        if self.affinity_request_groups.is_empty() {
            None
        } else {
            Some(&self.affinity_request_groups)
        }
    }

    /// Folds a superseded round into this one and returns the surviving
    /// context, which owns the events of both.
    ///
    /// Only allowed when [`can_merge_exchanges`](Self::can_merge_exchanges)
    /// holds and both rounds were negotiated at the same protocol version.
    pub fn merge(self, superseded: ExchangeContext) -> Result<ExchangeContext> {
        if !self.can_merge_exchanges() {
            return Err(ExchangeError::MergeRejected(format!(
                "protocol version {} does not allow merging exchanges",
                self.protocol_version
            )));
        }

        if superseded.protocol_version != self.protocol_version {
            return Err(ExchangeError::MergeRejected(format!(
                "protocol version mismatch: {} and {}",
                self.protocol_version, superseded.protocol_version
            )));
        }

        let superseded_version = superseded.events.topology_version();
        let mut aggregator = DiscoveryEventAggregator::resume(self.events);
        aggregator.extend(superseded.events.iter().copied());

        let mut affinity_request_groups = self.affinity_request_groups;
        affinity_request_groups.extend(superseded.affinity_request_groups);

        let merged = Self {
            protocol_version: self.protocol_version,
            mode: self.mode,
            events: aggregator.finish(),
            affinity_request_groups,
        };

        tracing::debug!(
            superseded = %superseded_version,
            topology_version = %merged.events.topology_version(),
            events = merged.events.len(),
            "merged exchange rounds"
        );

        Ok(merged)
    }
}
