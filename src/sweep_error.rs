//! SweepCommError: Unified error type for sweep-comm public APIs
//!
//! Every violation detected by the scheduler is a protocol violation: a logic
//! error in scheduling or in the topology data. Drivers treat these as fatal
//! for the run; nothing in the crate retries.

use crate::topology::subdomain::{Direction, SubdomainId};
use thiserror::Error;

/// Unified error type for sweep-comm operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SweepCommError {
    /// `mark_complete` (or a lookup) named a subdomain that is not queued.
    #[error("Subdomain {0} is not in the dependency queue")]
    UnknownSubdomain(SubdomainId),
    /// The same subdomain was admitted twice in one cycle.
    #[error("Subdomain {0} was already added in this cycle")]
    DuplicateSubdomain(SubdomainId),
    /// A subdomain was completed before it was handed out as ready.
    #[error("Subdomain {id} completed with {remaining} unmet dependencies")]
    NotReady { id: SubdomainId, remaining: usize },
    /// A dependency counter would drop below zero.
    #[error("Dependency counter of subdomain {0} underflowed")]
    DependencyUnderflow(SubdomainId),
    /// A receive completed for a subdomain that is no longer queued.
    #[error("Receive on direction {direction} completed for subdomain {id} which is not queued")]
    OrphanReceive { id: SubdomainId, direction: Direction },
    /// A local downwind consumer already ran before its upwind producer.
    #[error("Downwind subdomain {downwind} completed before upwind subdomain {upwind}")]
    DownwindAlreadyComplete {
        upwind: SubdomainId,
        downwind: SubdomainId,
    },
    /// A subdomain was admitted after the iteration's exchange started.
    #[error("Subdomain {0} added after the iteration's sends were posted")]
    IterationInProgress(SubdomainId),
    /// `(rank, subdomain)` does not fit in the configured tag space.
    #[error("Tag for rank {rank}, subdomain {subdomain} exceeds max tag {max_tag}")]
    TagOutOfRange {
        rank: usize,
        subdomain: SubdomainId,
        max_tag: i32,
    },
    /// Rank outside `0..size`.
    #[error("Rank {rank} is outside communicator of size {size}")]
    RankOutOfRange { rank: usize, size: usize },
    /// A tag could not be decoded back into `(rank, subdomain)`.
    #[error("Tag {0} cannot be decoded")]
    TagDecode(i32),
    /// The plane store has no plane for this subdomain and direction.
    #[error("No {direction} plane registered for subdomain {id}")]
    MissingPlane { id: SubdomainId, direction: Direction },
    /// A received plane has a different length than the incoming buffer.
    #[error("Plane size mismatch for subdomain {id} ({direction}): expected {expected} bytes, got {got}")]
    PlaneSizeMismatch {
        id: SubdomainId,
        direction: Direction,
        expected: usize,
        got: usize,
    },
    /// A receive reported completion without delivering data.
    #[error("Receive for subdomain {id} ({direction}) completed without payload")]
    MissingPayload { id: SubdomainId, direction: Direction },
    /// Posted request counts disagree with completed plus outstanding ones.
    #[error("Request bookkeeping out of balance: {posted} {kind} posted, {completed} completed, {outstanding} outstanding")]
    RequestImbalance {
        kind: &'static str,
        posted: usize,
        completed: usize,
        outstanding: usize,
    },
    /// Transport-level failure talking to a peer.
    #[error("Communication error with rank {neighbor}: {message}")]
    CommError { neighbor: usize, message: String },
    /// The driver saw no progress for longer than the configured timeout.
    #[error("No progress on rank {rank} for {elapsed_ms} ms ({queued} queued, {pending_receives} receives and {pending_sends} sends pending)")]
    ProgressStalled {
        rank: usize,
        queued: usize,
        pending_receives: usize,
        pending_sends: usize,
        elapsed_ms: u64,
    },
    /// Two links were declared for the same subdomain and direction.
    #[error("Subdomain {id} already has an {side} link in direction {direction}")]
    DuplicateLink {
        id: SubdomainId,
        direction: Direction,
        side: &'static str,
    },
    /// A link refers to a subdomain the partition does not know.
    #[error("Link from rank {rank}, subdomain {id} refers to an unknown subdomain")]
    DanglingLink { rank: usize, id: SubdomainId },
    /// The upwind dependency graph contains a cycle; a sweep would never end.
    #[error("Topology error: cycle detected in sweep dependencies (expected DAG)")]
    CycleDetected,
    /// Invalid configuration value.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
